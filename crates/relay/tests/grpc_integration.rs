// SPDX-License-Identifier: BUSL-1.1
// Copyright 2025 Alfred Jean LLC

//! gRPC integration tests using a tonic client against an in-process server.

use std::time::Duration;

use tokio_stream::StreamExt;
use tonic::transport::Channel;
use tonic::Request;

use relay::grpc::proto::relay_client::RelayClient;
use relay::grpc::proto::{
    DlcMessage, GetConnectedUsersRequest, GetUserListRequest, LoginRequest, LogoutRequest,
    ReceiveDlcMessagesRequest, RefreshRequest, RegisterUserRequest,
};
use relay::test_support::spawn_grpc_server;

async fn grpc_client(addr: std::net::SocketAddr) -> anyhow::Result<RelayClient<Channel>> {
    let channel = Channel::from_shared(format!("http://{addr}"))
        .map_err(|e| anyhow::anyhow!("{e}"))?
        .connect()
        .await
        .map_err(|e| anyhow::anyhow!("grpc connect: {e}"))?;
    Ok(RelayClient::new(channel))
}

async fn register_and_login(client: &mut RelayClient<Channel>, name: &str, password: &str) -> String {
    client.register_user(RegisterUserRequest { name: name.to_owned(), password: password.to_owned() }).await.unwrap();
    let resp = client.login(LoginRequest { name: name.to_owned(), password: password.to_owned() }).await.unwrap().into_inner();
    resp.token.unwrap().access_token
}

fn authenticated<T>(message: T, token: &str) -> Request<T> {
    let mut request = Request::new(message);
    request.metadata_mut().insert("authorization", format!("Bearer {token}").parse().unwrap());
    request
}

#[tokio::test]
async fn happy_send_delivers_to_the_one_receiver() -> anyhow::Result<()> {
    let server = spawn_grpc_server().await?;
    let mut a = grpc_client(server.addr).await?;
    let mut b = grpc_client(server.addr).await?;

    let token_a = register_and_login(&mut a, "Name1", "P@ssw0rd1").await;
    let token_b = register_and_login(&mut b, "Name2", "P@ssw2rd2").await;

    let mut receive = b.receive_dlc_messages(authenticated(ReceiveDlcMessagesRequest {}, &token_b)).await?.into_inner();
    tokio::time::sleep(Duration::from_millis(20)).await;

    a.send_dlc_message(authenticated(
        DlcMessage { origin_name: String::new(), dest_name: "Name2".to_owned(), payload: b"Hello".to_vec() },
        &token_a,
    ))
    .await?;

    let message = tokio::time::timeout(Duration::from_secs(2), receive.next()).await?.unwrap()?;
    assert_eq!(message.origin_name, "Name1");
    assert_eq!(message.dest_name, "Name2");
    assert_eq!(message.payload, b"Hello");

    Ok(())
}

#[tokio::test]
async fn send_without_a_receiver_is_not_found() -> anyhow::Result<()> {
    let server = spawn_grpc_server().await?;
    let mut a = grpc_client(server.addr).await?;
    let mut b = grpc_client(server.addr).await?;

    let token_a = register_and_login(&mut a, "Name1", "P@ssw0rd1").await;
    register_and_login(&mut b, "Name2", "P@ssw2rd2").await;

    let err = a
        .send_dlc_message(authenticated(
            DlcMessage { origin_name: String::new(), dest_name: "Name2".to_owned(), payload: b"Hello".to_vec() },
            &token_a,
        ))
        .await
        .unwrap_err();
    assert_eq!(err.code(), tonic::Code::NotFound);

    Ok(())
}

#[tokio::test]
async fn send_above_the_payload_cap_is_rejected() -> anyhow::Result<()> {
    let server = spawn_grpc_server().await?;
    let mut a = grpc_client(server.addr).await?;
    let mut b = grpc_client(server.addr).await?;

    let token_a = register_and_login(&mut a, "Name1", "P@ssw0rd1").await;
    register_and_login(&mut b, "Name2", "P@ssw2rd2").await;

    let oversized = vec![0u8; 65536 + 1];
    let err = a
        .send_dlc_message(authenticated(DlcMessage { origin_name: String::new(), dest_name: "Name2".to_owned(), payload: oversized }, &token_a))
        .await
        .unwrap_err();
    assert_eq!(err.code(), tonic::Code::InvalidArgument);

    Ok(())
}

#[tokio::test]
async fn multi_receiver_fan_out_delivers_to_every_stream_once() -> anyhow::Result<()> {
    let server = spawn_grpc_server().await?;
    let mut a = grpc_client(server.addr).await?;
    let mut b1 = grpc_client(server.addr).await?;
    let mut b2 = grpc_client(server.addr).await?;

    let token_a = register_and_login(&mut a, "Name1", "P@ssw0rd1").await;
    let token_b = register_and_login(&mut b1, "Name2", "P@ssw2rd2").await;

    let mut receive1 = b1.receive_dlc_messages(authenticated(ReceiveDlcMessagesRequest {}, &token_b)).await?.into_inner();
    let mut receive2 = b2.receive_dlc_messages(authenticated(ReceiveDlcMessagesRequest {}, &token_b)).await?.into_inner();
    tokio::time::sleep(Duration::from_millis(20)).await;

    a.send_dlc_message(authenticated(
        DlcMessage { origin_name: String::new(), dest_name: "Name2".to_owned(), payload: b"Hello".to_vec() },
        &token_a,
    ))
    .await?;

    let m1 = tokio::time::timeout(Duration::from_secs(2), receive1.next()).await?.unwrap()?;
    let m2 = tokio::time::timeout(Duration::from_secs(2), receive2.next()).await?.unwrap()?;
    assert_eq!(m1.payload, b"Hello");
    assert_eq!(m2.payload, b"Hello");

    Ok(())
}

#[tokio::test]
async fn send_to_a_dead_receiver_is_unavailable_and_prunes_the_subscriber() -> anyhow::Result<()> {
    let server = spawn_grpc_server().await?;
    let mut a = grpc_client(server.addr).await?;
    let mut b = grpc_client(server.addr).await?;

    let token_a = register_and_login(&mut a, "Name1", "P@ssw0rd1").await;
    let token_b = register_and_login(&mut b, "Name2", "P@ssw2rd2").await;

    let receive = b.receive_dlc_messages(authenticated(ReceiveDlcMessagesRequest {}, &token_b)).await?.into_inner();
    tokio::time::sleep(Duration::from_millis(20)).await;
    drop(receive);
    drop(b);
    tokio::time::sleep(Duration::from_millis(20)).await;

    let err = a
        .send_dlc_message(authenticated(
            DlcMessage { origin_name: String::new(), dest_name: "Name2".to_owned(), payload: b"Hello".to_vec() },
            &token_a,
        ))
        .await
        .unwrap_err();
    assert_eq!(err.code(), tonic::Code::Unavailable);

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(server.registry.snapshot_for("Name2").await.is_none());

    Ok(())
}

#[tokio::test]
async fn connected_list_reflects_churn() -> anyhow::Result<()> {
    let server = spawn_grpc_server().await?;
    let mut a = grpc_client(server.addr).await?;
    let mut b = grpc_client(server.addr).await?;
    let mut c = grpc_client(server.addr).await?;
    let mut d = grpc_client(server.addr).await?;

    let token_a = register_and_login(&mut a, "Name_A", "P@ssw0rd1").await;
    let token_b = register_and_login(&mut b, "Name_B", "P@ssw0rd2").await;
    let token_c = register_and_login(&mut c, "Name_C", "P@ssw0rd3").await;
    let token_d = register_and_login(&mut d, "Name_D", "P@ssw0rd4").await;

    let _ra = a.receive_dlc_messages(authenticated(ReceiveDlcMessagesRequest {}, &token_a)).await?.into_inner();
    let _rb = b.receive_dlc_messages(authenticated(ReceiveDlcMessagesRequest {}, &token_b)).await?.into_inner();
    let rc = c.receive_dlc_messages(authenticated(ReceiveDlcMessagesRequest {}, &token_c)).await?.into_inner();
    tokio::time::sleep(Duration::from_millis(20)).await;

    let mut stream = d.get_connected_users(authenticated(GetConnectedUsersRequest {}, &token_d)).await?.into_inner();
    let mut names: Vec<_> = vec![];
    while let Some(item) = stream.next().await {
        names.push(item?.name);
    }
    names.sort();
    assert_eq!(names, vec!["Name_A", "Name_B", "Name_C"]);

    drop(rc);
    drop(c);
    tokio::time::sleep(Duration::from_millis(150)).await;

    let mut stream = d.get_connected_users(authenticated(GetConnectedUsersRequest {}, &token_d)).await?.into_inner();
    let mut names: Vec<_> = vec![];
    while let Some(item) = stream.next().await {
        names.push(item?.name);
    }
    names.sort();
    assert_eq!(names, vec!["Name_A", "Name_B"]);

    Ok(())
}

#[tokio::test]
async fn token_lifecycle_enforces_single_use_refresh() -> anyhow::Result<()> {
    let server = spawn_grpc_server().await?;
    let mut client = grpc_client(server.addr).await?;
    client.register_user(RegisterUserRequest { name: "Name1".to_owned(), password: "P@ssw0rd1".to_owned() }).await?;
    let login = client
        .login(LoginRequest { name: "Name1".to_owned(), password: "P@ssw0rd1".to_owned() })
        .await?
        .into_inner();
    let rt1 = login.token.unwrap().refresh_token;

    let refreshed = client.refresh(RefreshRequest { refresh_token: rt1.clone() }).await?.into_inner();
    let rt2 = refreshed.token.unwrap().refresh_token;

    let err = client.refresh(RefreshRequest { refresh_token: rt1 }).await.unwrap_err();
    assert_eq!(err.code(), tonic::Code::FailedPrecondition);

    client.logout(LogoutRequest { refresh_token: rt2.clone() }).await?;

    let err = client.refresh(RefreshRequest { refresh_token: rt2 }).await.unwrap_err();
    assert_eq!(err.code(), tonic::Code::FailedPrecondition);

    Ok(())
}

#[tokio::test]
async fn password_policy_rejects_every_malformed_candidate() -> anyhow::Result<()> {
    let server = spawn_grpc_server().await?;

    for (name, password, accepted) in [
        ("PolicyOk", "P@ssw0rdAlice", true),
        ("PolicyNoDigit", "P@sswordAlice", false),
        ("PolicyNoUpper", "p@ssw0rdalice", false),
        ("PolicyNoLower", "P@SSW0RDALICE", false),
        ("PolicyNoSpecial", "Passw0rdAlice", false),
        ("PolicyTooShort", "P@ssw0r", false),
        ("PolicyTooLong", "P@ssw0rdAlice12345678901234567890", false),
    ] {
        let mut client = grpc_client(server.addr).await?;
        let result = client.register_user(RegisterUserRequest { name: name.to_owned(), password: password.to_owned() }).await;
        if accepted {
            assert!(result.is_ok(), "expected {name} to be accepted");
        } else {
            let err = result.unwrap_err();
            assert_eq!(err.code(), tonic::Code::InvalidArgument, "expected {name} to be rejected");
        }
    }

    Ok(())
}

#[tokio::test]
async fn login_with_an_empty_name_is_a_validation_failure() -> anyhow::Result<()> {
    let server = spawn_grpc_server().await?;
    let mut client = grpc_client(server.addr).await?;

    let err = client.login(LoginRequest { name: String::new(), password: "P@ssw0rdAlice".to_owned() }).await.unwrap_err();
    assert_eq!(err.code(), tonic::Code::InvalidArgument);
    assert_eq!(err.message(), "invalid field Name: value '' must not be an empty string");

    Ok(())
}

#[tokio::test]
async fn get_user_list_excludes_the_caller_over_the_wire() -> anyhow::Result<()> {
    let server = spawn_grpc_server().await?;
    let mut a = grpc_client(server.addr).await?;
    let mut b = grpc_client(server.addr).await?;

    let token_a = register_and_login(&mut a, "Name1", "P@ssw0rd1").await;
    register_and_login(&mut b, "Name2", "P@ssw2rd2").await;

    let mut stream = a.get_user_list(authenticated(GetUserListRequest {}, &token_a)).await?.into_inner();
    let mut names = vec![];
    while let Some(item) = stream.next().await {
        names.push(item?.name);
    }
    assert_eq!(names, vec!["Name2".to_owned()]);

    Ok(())
}
