// SPDX-License-Identifier: BUSL-1.1
// Copyright 2025 Alfred Jean LLC

use super::*;
use crate::error::ErrorCode;

#[test]
fn accepts_a_non_empty_value() {
    require_non_empty("Name", "alice").unwrap();
}

#[test]
fn rejects_an_empty_value_with_the_stable_message() {
    let err = require_non_empty("Name", "").unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidArgument);
    assert_eq!(err.message, "invalid field Name: value '' must not be an empty string");
}
