// SPDX-License-Identifier: BUSL-1.1
// Copyright 2025 Alfred Jean LLC

//! `relayctl` — one subcommand per `Relay` RPC, flags mirroring the
//! request fields, global `--server`/`--token`.

use clap::{Parser, Subcommand};
use relay::grpc::proto::relay_client::RelayClient;
use relay::grpc::proto::{
    DlcMessage, GetConnectedUsersRequest, GetUserListRequest, LoginRequest, LogoutRequest,
    ReceiveDlcMessagesRequest, RefreshRequest, RegisterUserRequest, UnregisterUserRequest,
    UpdatePasswordRequest,
};
use tonic::transport::Channel;
use tonic::Request;

#[derive(Parser)]
#[command(name = "relayctl", version, about = "Client for the relay peer-discovery and message-relay service.")]
struct Cli {
    /// gRPC server address, e.g. http://127.0.0.1:50051.
    #[arg(long, global = true, env = "RELAYCTL_SERVER", default_value = "http://127.0.0.1:50051")]
    server: String,

    /// Access token attached as `authorization: Bearer <token>` on
    /// authenticated calls.
    #[arg(long, global = true, env = "RELAYCTL_TOKEN")]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new account.
    RegisterUser { name: String, password: String },
    /// Delete the caller's own account.
    UnregisterUser,
    /// Exchange credentials for a token pair.
    Login { name: String, password: String },
    /// Mint a fresh token pair from a refresh token.
    Refresh { refresh_token: String },
    /// Invalidate a refresh token.
    Logout { refresh_token: String },
    /// Change the caller's own password.
    UpdatePassword { old_password: String, new_password: String },
    /// List every registered user except the caller.
    GetUserList,
    /// Open a long-lived stream of incoming messages.
    ReceiveDlcMessages,
    /// Send one message to a destination user.
    SendDlcMessage {
        dest_name: String,
        /// Message payload, sent as UTF-8 bytes.
        payload: String,
    },
    /// List currently connected users, excluding the caller.
    GetConnectedUsers,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    std::process::exit(run(cli).await);
}

async fn run(cli: Cli) -> i32 {
    let channel = match Channel::from_shared(cli.server.clone()) {
        Ok(endpoint) => match endpoint.connect().await {
            Ok(channel) => channel,
            Err(e) => {
                eprintln!("error: failed to connect to {}: {e}", cli.server);
                return 1;
            }
        },
        Err(e) => {
            eprintln!("error: invalid server address {}: {e}", cli.server);
            return 2;
        }
    };
    let mut client = RelayClient::new(channel);

    let result = match cli.command {
        Commands::RegisterUser { name, password } => {
            client.register_user(Request::new(RegisterUserRequest { name, password })).await.map(|r| println!("{:?}", r.into_inner()))
        }
        Commands::UnregisterUser => client
            .unregister_user(authenticated(UnregisterUserRequest {}, cli.token.as_deref()))
            .await
            .map(|r| println!("{:?}", r.into_inner())),
        Commands::Login { name, password } => {
            client.login(Request::new(LoginRequest { name, password })).await.map(|r| println!("{:?}", r.into_inner()))
        }
        Commands::Refresh { refresh_token } => {
            client.refresh(Request::new(RefreshRequest { refresh_token })).await.map(|r| println!("{:?}", r.into_inner()))
        }
        Commands::Logout { refresh_token } => {
            client.logout(Request::new(LogoutRequest { refresh_token })).await.map(|r| println!("{:?}", r.into_inner()))
        }
        Commands::UpdatePassword { old_password, new_password } => client
            .update_password(authenticated(UpdatePasswordRequest { old_password, new_password }, cli.token.as_deref()))
            .await
            .map(|r| println!("{:?}", r.into_inner())),
        Commands::GetUserList => {
            return stream_command(
                client.get_user_list(authenticated(GetUserListRequest {}, cli.token.as_deref())).await,
                |info| println!("{}", info.name),
            )
        }
        Commands::ReceiveDlcMessages => {
            return stream_command(
                client.receive_dlc_messages(authenticated(ReceiveDlcMessagesRequest {}, cli.token.as_deref())).await,
                |message: DlcMessage| println!("{}: {}", message.origin_name, String::from_utf8_lossy(&message.payload)),
            )
        }
        Commands::SendDlcMessage { dest_name, payload } => client
            .send_dlc_message(authenticated(DlcMessage { origin_name: String::new(), dest_name, payload: payload.into_bytes() }, cli.token.as_deref()))
            .await
            .map(|r| println!("{:?}", r.into_inner())),
        Commands::GetConnectedUsers => {
            return stream_command(
                client.get_connected_users(authenticated(GetConnectedUsersRequest {}, cli.token.as_deref())).await,
                |info| println!("{}", info.name),
            )
        }
    };

    match result {
        Ok(()) => 0,
        Err(status) => {
            eprintln!("error: {} ({:?})", status.message(), status.code());
            1
        }
    }
}

/// Attach `authorization: Bearer <token>` to a request destined for a
/// non-token-exempt RPC.
fn authenticated<T>(message: T, token: Option<&str>) -> Request<T> {
    let mut request = Request::new(message);
    if let Some(token) = token {
        if let Ok(value) = format!("Bearer {token}").parse() {
            request.metadata_mut().insert("authorization", value);
        }
    }
    request
}

/// Drain a server-streaming response, printing each item with `print_item`
/// until the stream ends, returning the process exit code.
async fn stream_command<T>(
    response: Result<tonic::Response<tonic::Streaming<T>>, tonic::Status>,
    mut print_item: impl FnMut(T),
) -> i32 {
    let mut stream = match response {
        Ok(r) => r.into_inner(),
        Err(status) => {
            eprintln!("error: {} ({:?})", status.message(), status.code());
            return 1;
        }
    };

    loop {
        match stream.message().await {
            Ok(Some(item)) => print_item(item),
            Ok(None) => return 0,
            Err(status) => {
                eprintln!("error: {} ({:?})", status.message(), status.code());
                return 1;
            }
        }
    }
}
