// SPDX-License-Identifier: BUSL-1.1
// Copyright 2025 Alfred Jean LLC

//! Session Context: the per-request authentication check, plus the
//! per-method token-exemption and transaction-mode lookup tables expressed
//! here as plain `const fn` matches rather than a reflection-based
//! method-option store.
//!
//! tonic's [`tonic::service::Interceptor`] runs on a method-erased
//! `Request<()>` shared by every RPC on the service, with no way to learn
//! which method is being dispatched until after it returns, so a single
//! shared-secret check applied uniformly to every call won't work here:
//! exemption can only be decided with the real method name in hand. Each
//! handler in `grpc::service` calls [`authenticate`] itself instead, using
//! the full method path it already knows from its own RPC.

use tonic::Request;

use crate::auth::token;
use crate::error::RelayError;

/// Full gRPC method names, shared between this module's lookup tables and
/// `grpc::service`'s handler bodies so the two never drift apart.
pub const REGISTER_USER: &str = "/relay.v1.Relay/RegisterUser";
pub const UNREGISTER_USER: &str = "/relay.v1.Relay/UnregisterUser";
pub const LOGIN: &str = "/relay.v1.Relay/Login";
pub const REFRESH: &str = "/relay.v1.Relay/Refresh";
pub const LOGOUT: &str = "/relay.v1.Relay/Logout";
pub const UPDATE_PASSWORD: &str = "/relay.v1.Relay/UpdatePassword";
pub const GET_USER_LIST: &str = "/relay.v1.Relay/GetUserList";
pub const GET_CONNECTED_USERS: &str = "/relay.v1.Relay/GetConnectedUsers";
pub const RECEIVE_DLC_MESSAGES: &str = "/relay.v1.Relay/ReceiveDlcMessages";
pub const SEND_DLC_MESSAGE: &str = "/relay.v1.Relay/SendDlcMessage";

/// Full method name of every method callable without a verified access
/// token.
const TOKEN_EXEMPT_METHODS: &[&str] = &[REGISTER_USER, LOGIN, REFRESH];

pub const fn is_token_exempt(full_method: &str) -> bool {
    let mut i = 0;
    while i < TOKEN_EXEMPT_METHODS.len() {
        if str_eq(TOKEN_EXEMPT_METHODS[i], full_method) {
            return true;
        }
        i += 1;
    }
    false
}

const fn str_eq(a: &str, b: &str) -> bool {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    let mut i = 0;
    while i < a.len() {
        if a[i] != b[i] {
            return false;
        }
        i += 1;
    }
    true
}

/// Per-method transaction-mode annotation, consulted only as structured
/// logging metadata by `grpc::service::trace_dispatch` — there is no
/// interceptor here that opens, commits, or rolls back a transaction
/// around dispatch. Handlers whose work spans more than one statement
/// (login, refresh, update_password) get real atomicity instead from
/// `UserRepository::compare_and_update`, which performs the read-modify-write
/// as a single conditional SQL statement at the repository layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxOption {
    NoTx,
    ReadOnly,
    ReadWrite,
}

/// `const fn` lookup attaching a [`TxOption`] to each method, expressed as
/// a match since this stack has no protobuf method-option mechanism.
pub const fn tx_option(full_method: &str) -> TxOption {
    match () {
        _ if str_eq(full_method, REGISTER_USER) => TxOption::ReadWrite,
        _ if str_eq(full_method, UNREGISTER_USER) => TxOption::ReadWrite,
        _ if str_eq(full_method, LOGIN) => TxOption::ReadOnly,
        _ if str_eq(full_method, REFRESH) => TxOption::ReadWrite,
        _ if str_eq(full_method, LOGOUT) => TxOption::ReadWrite,
        _ if str_eq(full_method, UPDATE_PASSWORD) => TxOption::ReadWrite,
        _ if str_eq(full_method, GET_USER_LIST) => TxOption::ReadOnly,
        _ if str_eq(full_method, GET_CONNECTED_USERS) => TxOption::NoTx,
        _ if str_eq(full_method, RECEIVE_DLC_MESSAGES) => TxOption::NoTx,
        _ if str_eq(full_method, SEND_DLC_MESSAGE) => TxOption::NoTx,
        _ => TxOption::NoTx,
    }
}

/// Extract and verify the bearer access token from `request`'s metadata,
/// returning the authenticated caller's user id.
///
/// Reads a `Bearer <token>` header and verifies it as a signed JWT.
/// Invoked by name per-handler rather than uniformly by a service-wide
/// interceptor, since only the handler knows it isn't token-exempt.
pub fn authenticate<T>(request: &Request<T>) -> Result<String, RelayError> {
    let header = request
        .metadata()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(RelayError::token_required)?;

    let token_str = header.strip_prefix("Bearer ").ok_or_else(RelayError::token_invalid)?;

    token::verify(token_str)
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
