// SPDX-License-Identifier: BUSL-1.1
// Copyright 2025 Alfred Jean LLC

//! `Relay` trait implementation — all gRPC RPC handlers.

use tokio_stream::wrappers::ReceiverStream;
use tonic::{Request, Response, Status};

use super::validate::require_non_empty;
use super::{proto, GrpcStream, RelayGrpc};
use crate::auth::password::validate_password_policy;
use crate::auth::token;
use crate::directory::User;
use crate::error::{ErrorCode, RelayError};
use crate::session::{self, authenticate};
use crate::subscriber::{AckTicket, DeliveryResult, Envelope, Subscriber};

/// Returned for every Login failure, whether the name is unknown or the
/// password is wrong — the two must be indistinguishable.
const LOGIN_FAILURE: &str = "invalid username or password";

/// Returned for every UpdatePassword failure, collapsing old-password
/// mismatch, policy rejection, and storage errors into one message to
/// frustrate probing.
const UPDATE_PASSWORD_FAILURE: &str = "Failed to update user password";

#[tonic::async_trait]
impl proto::relay_server::Relay for RelayGrpc {
    async fn register_user(
        &self,
        request: Request<proto::RegisterUserRequest>,
    ) -> Result<Response<proto::RegisterUserResponse>, Status> {
        trace_dispatch(session::REGISTER_USER);
        let req = request.into_inner();
        require_non_empty("Name", &req.name)?;
        require_non_empty("Password", &req.password)?;
        validate_password_policy(&req.password)?;

        let protected = self.password_policy.protect_new(&req.password)?;
        let user = User::new(req.name, protected);
        self.directory.create(&user).await?;

        Ok(Response::new(proto::RegisterUserResponse { id: user.id, name: user.name }))
    }

    async fn unregister_user(
        &self,
        request: Request<proto::UnregisterUserRequest>,
    ) -> Result<Response<proto::UnregisterUserResponse>, Status> {
        trace_dispatch(session::UNREGISTER_USER);
        let caller_id = authenticate(&request)?;
        self.directory.delete(&caller_id).await?;
        Ok(Response::new(proto::UnregisterUserResponse {}))
    }

    async fn login(&self, request: Request<proto::LoginRequest>) -> Result<Response<proto::LoginResponse>, Status> {
        trace_dispatch(session::LOGIN);
        let req = request.into_inner();
        require_non_empty("Name", &req.name)?;
        require_non_empty("Password", &req.password)?;

        let before = self.directory.find_by_name(&req.name).await?.ok_or_else(|| RelayError::unauthenticated(LOGIN_FAILURE))?;
        if !self.password_policy.is_valid(&req.password, &before.password)? {
            return Err(RelayError::unauthenticated(LOGIN_FAILURE).into());
        }

        let pair = token::generate_pair(&before.id)?;
        let mut user = before.clone();
        user.refresh_token_id = Some(pair.refresh_token_id);
        self.directory.compare_and_update(&before, &user).await.map_err(|e| match e.code {
            ErrorCode::OptimisticLock => RelayError::unauthenticated(LOGIN_FAILURE),
            _ => e,
        })?;

        Ok(Response::new(proto::LoginResponse {
            name: user.name,
            token: Some(proto::TokenInfo {
                access_token: pair.access_token,
                refresh_token: pair.refresh_token,
                expires_in: pair.expires_in,
            }),
            require_change_password: user.require_change_password,
        }))
    }

    async fn refresh(&self, request: Request<proto::RefreshRequest>) -> Result<Response<proto::RefreshResponse>, Status> {
        trace_dispatch(session::REFRESH);
        let req = request.into_inner();
        require_non_empty("RefreshToken", &req.refresh_token)?;

        let refresh_id = token::verify(&req.refresh_token)?;
        let before = self
            .directory
            .find_by_refresh_token_id(&refresh_id)
            .await?
            .ok_or_else(|| RelayError::precondition("refresh token is no longer current"))?;

        let pair = token::generate_pair(&before.id)?;
        let mut user = before.clone();
        user.refresh_token_id = Some(pair.refresh_token_id);
        self.directory.compare_and_update(&before, &user).await.map_err(|e| match e.code {
            ErrorCode::OptimisticLock => RelayError::precondition("refresh token is no longer current"),
            _ => e,
        })?;

        Ok(Response::new(proto::RefreshResponse {
            token: Some(proto::TokenInfo {
                access_token: pair.access_token,
                refresh_token: pair.refresh_token,
                expires_in: pair.expires_in,
            }),
        }))
    }

    async fn logout(&self, request: Request<proto::LogoutRequest>) -> Result<Response<proto::LogoutResponse>, Status> {
        trace_dispatch(session::LOGOUT);
        // Logout is idempotent: a failure to verify or locate the refresh
        // token is not reported.
        let req = request.into_inner();
        if let Ok(refresh_id) = token::verify(&req.refresh_token) {
            if let Ok(Some(mut user)) = self.directory.find_by_refresh_token_id(&refresh_id).await {
                user.refresh_token_id = None;
                let _ = self.directory.update(&user).await;
            }
        }
        Ok(Response::new(proto::LogoutResponse {}))
    }

    async fn update_password(
        &self,
        request: Request<proto::UpdatePasswordRequest>,
    ) -> Result<Response<proto::UpdatePasswordResponse>, Status> {
        trace_dispatch(session::UPDATE_PASSWORD);
        let caller_id = authenticate(&request)?;
        let req = request.into_inner();

        (|| async {
            require_non_empty("OldPassword", &req.old_password)?;
            require_non_empty("NewPassword", &req.new_password)?;

            let before = self.directory.find_by_id(&caller_id).await?.ok_or_else(RelayError::internal_missing_caller)?;
            if !self.password_policy.is_valid(&req.old_password, &before.password)? {
                return Err(RelayError::invalid_argument(UPDATE_PASSWORD_FAILURE));
            }
            validate_password_policy(&req.new_password)?;

            let mut user = before.clone();
            user.password = self.password_policy.protect_new(&req.new_password)?;
            user.require_change_password = false;
            self.directory.compare_and_update(&before, &user).await?;
            Ok(())
        })()
        .await
        .map_err(|_: RelayError| RelayError::invalid_argument(UPDATE_PASSWORD_FAILURE))?;

        Ok(Response::new(proto::UpdatePasswordResponse {}))
    }

    type GetUserListStream = GrpcStream<proto::UserInfo>;

    async fn get_user_list(
        &self,
        request: Request<proto::GetUserListRequest>,
    ) -> Result<Response<Self::GetUserListStream>, Status> {
        trace_dispatch(session::GET_USER_LIST);
        let caller_id = authenticate(&request)?;
        let caller = self.directory.find_by_id(&caller_id).await?.ok_or_else(RelayError::internal_missing_caller)?;

        let names: Vec<Result<proto::UserInfo, Status>> = self
            .directory
            .list()
            .await?
            .into_iter()
            .filter(|u| u.name != caller.name)
            .map(|u| Ok(proto::UserInfo { name: u.name }))
            .collect();

        Ok(Response::new(Box::pin(tokio_stream::iter(names))))
    }

    type ReceiveDlcMessagesStream = GrpcStream<proto::DlcMessage>;

    async fn receive_dlc_messages(
        &self,
        request: Request<proto::ReceiveDlcMessagesRequest>,
    ) -> Result<Response<Self::ReceiveDlcMessagesStream>, Status> {
        trace_dispatch(session::RECEIVE_DLC_MESSAGES);
        let caller_id = authenticate(&request)?;
        let caller = self.directory.find_by_id(&caller_id).await?.ok_or_else(RelayError::internal_missing_caller)?;

        let (subscriber, mut inbox) = Subscriber::new(caller.name.clone());
        if self.registry.add(&caller.name, subscriber.clone()).await.is_err() {
            return Err(RelayError::unavailable("server is shutting down").into());
        }

        let (tx, rx) = tokio::sync::mpsc::channel(16);
        let registry = std::sync::Arc::clone(&self.registry);
        let user_name = caller.name.clone();

        tokio::spawn(async move {
            while let Some(AckTicket { envelope, reply }) = inbox.recv().await {
                if envelope.origin_name == user_name {
                    // Self-filter: probe frames and self-sends are dropped
                    // without a reply.
                    continue;
                }

                let frame =
                    proto::DlcMessage { origin_name: envelope.origin_name, dest_name: envelope.destination_name, payload: envelope.payload };

                if tx.send(Ok(frame)).await.is_ok() {
                    let _ = reply.send(DeliveryResult::Ok).await;
                } else {
                    let _ = reply.send(DeliveryResult::NotOk).await;
                    registry.remove(&user_name, &subscriber).await;
                    break;
                }
            }
        });

        Ok(Response::new(Box::pin(ReceiverStream::new(rx))))
    }

    async fn send_dlc_message(
        &self,
        request: Request<proto::DlcMessage>,
    ) -> Result<Response<proto::SendDlcMessageResponse>, Status> {
        trace_dispatch(session::SEND_DLC_MESSAGE);
        let caller_id = authenticate(&request)?;
        let req = request.into_inner();
        require_non_empty("DestName", &req.dest_name)?;
        if req.payload.len() > self.max_payload_bytes {
            return Err(RelayError::invalid_argument(format!(
                "Payload exceeds maximum size of {} bytes",
                self.max_payload_bytes
            ))
            .into());
        }

        let envelope = Envelope { origin_name: String::new(), destination_name: req.dest_name, payload: req.payload };
        self.router.send(&caller_id, envelope).await?;
        Ok(Response::new(proto::SendDlcMessageResponse {}))
    }

    type GetConnectedUsersStream = GrpcStream<proto::UserInfo>;

    async fn get_connected_users(
        &self,
        request: Request<proto::GetConnectedUsersRequest>,
    ) -> Result<Response<Self::GetConnectedUsersStream>, Status> {
        trace_dispatch(session::GET_CONNECTED_USERS);
        let caller_id = authenticate(&request)?;
        let caller = self.directory.find_by_id(&caller_id).await?.ok_or_else(RelayError::internal_missing_caller)?;

        let names: Vec<Result<proto::UserInfo, Status>> =
            self.prober.connected_users(Some(&caller.name)).await.into_iter().map(|name| Ok(proto::UserInfo { name })).collect();

        Ok(Response::new(Box::pin(tokio_stream::iter(names))))
    }
}

/// `FULL_METHOD` ↔ transaction-mode reference table, consulted here for
/// structured logging. Handlers that read a row and write it back
/// (login, refresh, update_password) get their atomicity from
/// `UserRepository::compare_and_update`, not from a transaction wrapping
/// this dispatch.
fn trace_dispatch(full_method: &str) {
    tracing::debug!(method = full_method, tx = ?session::tx_option(full_method), exempt = session::is_token_exempt(full_method), "dispatching RPC");
}
