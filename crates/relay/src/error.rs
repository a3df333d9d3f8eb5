// SPDX-License-Identifier: BUSL-1.1
// Copyright 2025 Alfred Jean LLC

use std::fmt;

use serde::{Deserialize, Serialize};

/// Detail code attached to token-related authentication failures.
///
/// Carried to clients as a base64-encoded JSON payload in the
/// `x-error-detail` trailing metadata field; never inferred from the
/// status message alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum ErrorDetailCode {
    Unknown = 1,
    TokenRequired = 2,
    TokenExpired = 3,
    TokenInvalid = 4,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: ErrorDetailCode,
    #[serde(default)]
    pub values: Vec<String>,
}

/// Unified error codes shared across the directory, auth, and relay core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    Internal,
    InvalidArgument,
    DeadlineExceeded,
    Db,
    NotFound,
    AlreadyExists,
    OptimisticLock,
    Precondition,
    Unavailable,
    Unauthenticated,
    Unknown,
    PermissionDenied,
}

impl ErrorCode {
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Internal => 500,
            Self::InvalidArgument => 400,
            Self::DeadlineExceeded => 504,
            Self::Db => 500,
            Self::NotFound => 404,
            Self::AlreadyExists => 409,
            Self::OptimisticLock => 409,
            Self::Precondition => 412,
            Self::Unavailable => 503,
            Self::Unauthenticated => 401,
            Self::Unknown => 520,
            Self::PermissionDenied => 403,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Internal => "INTERNAL",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::DeadlineExceeded => "DEADLINE_EXCEEDED",
            Self::Db => "DB",
            Self::NotFound => "NOT_FOUND",
            Self::AlreadyExists => "ALREADY_EXISTS",
            Self::OptimisticLock => "OPTIMISTIC_LOCK",
            Self::Precondition => "PRECONDITION",
            Self::Unavailable => "UNAVAILABLE",
            Self::Unauthenticated => "UNAUTHENTICATED",
            Self::Unknown => "UNKNOWN",
            Self::PermissionDenied => "PERMISSION_DENIED",
        }
    }

    /// Convert this error code into a [`tonic::Status`] with the given message.
    pub fn to_grpc_status(&self, message: impl Into<String>) -> tonic::Status {
        let code = match self {
            Self::Internal => tonic::Code::Internal,
            Self::InvalidArgument => tonic::Code::InvalidArgument,
            Self::DeadlineExceeded => tonic::Code::DeadlineExceeded,
            Self::Db => tonic::Code::Internal,
            Self::NotFound => tonic::Code::NotFound,
            Self::AlreadyExists => tonic::Code::AlreadyExists,
            Self::OptimisticLock => tonic::Code::Aborted,
            Self::Precondition => tonic::Code::FailedPrecondition,
            Self::Unavailable => tonic::Code::Unavailable,
            Self::Unauthenticated => tonic::Code::Unauthenticated,
            Self::Unknown => tonic::Code::Unknown,
            Self::PermissionDenied => tonic::Code::PermissionDenied,
        };
        tonic::Status::new(code, message)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error produced anywhere in the relay core, carrying enough context to
/// build both a `tonic::Status` and a structured log line without leaking
/// internal causes to the client.
#[derive(Debug)]
pub struct RelayError {
    pub code: ErrorCode,
    pub message: String,
    pub detail: Option<ErrorDetail>,
    source: Option<anyhow::Error>,
}

impl RelayError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self { code, message: message.into(), detail: None, source: None }
    }

    pub fn with_detail(code: ErrorCode, message: impl Into<String>, detail: ErrorDetail) -> Self {
        Self { code, message: message.into(), detail: Some(detail), source: None }
    }

    /// Wrap an opaque internal cause. The cause is logged, never surfaced
    /// to the caller.
    pub fn internal(message: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        Self { code: ErrorCode::Internal, message: message.into(), detail: None, source: Some(source.into()) }
    }

    pub fn db(message: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        Self { code: ErrorCode::Db, message: message.into(), detail: None, source: Some(source.into()) }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    pub fn already_exists(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::AlreadyExists, message)
    }

    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthenticated, message)
    }

    /// An authenticated handler's own caller id no longer resolves to a
    /// user record. A programmer/runtime-invariant error (the access token
    /// verified, but the user vanished mid-request), never a silent
    /// anonymous fallback.
    pub fn internal_missing_caller() -> Self {
        Self::internal("authenticated caller no longer exists", anyhow::anyhow!("missing user record for verified caller id"))
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidArgument, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unavailable, message)
    }

    pub fn precondition(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Precondition, message)
    }

    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::PermissionDenied, message)
    }

    /// A missing `authorization` header on a non-token-exempt call.
    ///
    /// Partitioned from [`Self::token_expired`]/[`Self::token_invalid`]: a
    /// missing token is the caller's own argument error, while an expired
    /// or malformed one has failed a precondition of the call.
    pub fn token_required() -> Self {
        Self::with_detail(
            ErrorCode::InvalidArgument,
            "authentication token is required",
            ErrorDetail { code: ErrorDetailCode::TokenRequired, values: vec![] },
        )
    }

    pub fn token_expired() -> Self {
        Self::with_detail(
            ErrorCode::Precondition,
            "authentication token has expired",
            ErrorDetail { code: ErrorDetailCode::TokenExpired, values: vec![] },
        )
    }

    pub fn token_invalid() -> Self {
        Self::with_detail(
            ErrorCode::Precondition,
            "authentication token is invalid",
            ErrorDetail { code: ErrorDetailCode::TokenInvalid, values: vec![] },
        )
    }

    /// Convert into a [`tonic::Status`], logging any internal cause at
    /// `error` level rather than leaking it to the caller.
    pub fn into_status(self) -> tonic::Status {
        if let Some(ref source) = self.source {
            tracing::error!(code = %self.code, err = %source, "{}", self.message);
        }

        let mut status = self.code.to_grpc_status(self.message);
        if let Some(detail) = self.detail {
            if let Ok(json) = serde_json::to_vec(&detail) {
                use base64::Engine;
                let encoded = base64::engine::general_purpose::STANDARD.encode(json);
                if let Ok(value) = encoded.parse() {
                    status.metadata_mut().insert("x-error-detail", value);
                }
            }
        }
        status
    }
}

impl fmt::Display for RelayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for RelayError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref())
    }
}

impl From<RelayError> for tonic::Status {
    fn from(err: RelayError) -> Self {
        err.into_status()
    }
}

impl From<sqlx::Error> for RelayError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Self::not_found("record not found"),
            other => Self::db("database operation failed", other),
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
