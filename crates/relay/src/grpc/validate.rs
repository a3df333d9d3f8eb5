// SPDX-License-Identifier: BUSL-1.1
// Copyright 2025 Alfred Jean LLC

//! Request field validation: a stable, enumerable message format so
//! clients can match on it rather than parsing free text.

use crate::error::RelayError;

/// Fail with `InvalidArgument` if `value` is empty.
///
/// `field` is the proto field name as it appears in the message
/// definition (`Name`, `Password`, ...).
pub fn require_non_empty(field: &str, value: &str) -> Result<(), RelayError> {
    if value.is_empty() {
        return Err(RelayError::invalid_argument(format!("invalid field {field}: value '' must not be an empty string")));
    }
    Ok(())
}

#[cfg(test)]
#[path = "validate_tests.rs"]
mod tests;
