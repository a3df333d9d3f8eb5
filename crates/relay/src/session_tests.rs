// SPDX-License-Identifier: BUSL-1.1
// Copyright 2025 Alfred Jean LLC

use yare::parameterized;

use super::*;
use crate::error::ErrorCode;

#[parameterized(
    register_user = { "/relay.v1.Relay/RegisterUser", true },
    login = { "/relay.v1.Relay/Login", true },
    refresh = { "/relay.v1.Relay/Refresh", true },
    logout = { "/relay.v1.Relay/Logout", false },
    send_dlc_message = { "/relay.v1.Relay/SendDlcMessage", false },
    unknown_method = { "/relay.v1.Relay/DoesNotExist", false },
)]
fn exemption_table(case: (&str, bool)) {
    let (method, expected) = case;
    assert_eq!(is_token_exempt(method), expected);
}

#[parameterized(
    register_user = { "/relay.v1.Relay/RegisterUser", TxOption::ReadWrite },
    login = { "/relay.v1.Relay/Login", TxOption::ReadOnly },
    refresh = { "/relay.v1.Relay/Refresh", TxOption::ReadWrite },
    get_user_list = { "/relay.v1.Relay/GetUserList", TxOption::ReadOnly },
    get_connected_users = { "/relay.v1.Relay/GetConnectedUsers", TxOption::NoTx },
    send_dlc_message = { "/relay.v1.Relay/SendDlcMessage", TxOption::NoTx },
    unknown_method = { "/relay.v1.Relay/DoesNotExist", TxOption::NoTx },
)]
fn tx_option_table(case: (&str, TxOption)) {
    let (method, expected) = case;
    assert_eq!(tx_option(method), expected);
}

#[test]
fn authenticate_rejects_a_missing_header() {
    let request: Request<()> = Request::new(());
    let err = authenticate(&request).unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidArgument);
}

#[test]
fn authenticate_rejects_a_header_without_bearer_prefix() {
    let mut request = Request::new(());
    request.metadata_mut().insert("authorization", "not-a-bearer-token".parse().unwrap());
    let err = authenticate(&request).unwrap_err();
    assert_eq!(err.code, ErrorCode::Precondition);
}

