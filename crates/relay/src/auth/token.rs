// SPDX-License-Identifier: BUSL-1.1
// Copyright 2025 Alfred Jean LLC

use std::sync::OnceLock;
use std::time::Duration;

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::TokenSettings;
use crate::error::RelayError;

/// Process-wide token signing configuration.
///
/// Written exactly once during server bring-up via [`init`]; there is no
/// teardown. Rotating the signing secret requires a restart with new
/// configuration.
static TOKEN_CONFIG: OnceLock<TokenConfig> = OnceLock::new();

#[derive(Debug, Clone)]
pub struct TokenConfig {
    secret: String,
    exp: Duration,
    refresh_exp: Duration,
}

impl From<&TokenSettings> for TokenConfig {
    fn from(settings: &TokenSettings) -> Self {
        Self { secret: settings.secret.clone(), exp: settings.exp(), refresh_exp: settings.refresh_exp() }
    }
}

/// Install the process-wide token configuration. Must be called exactly
/// once during bring-up, before any token is minted or verified.
///
/// Returns an error if called more than once.
pub fn init(config: TokenConfig) -> Result<(), RelayError> {
    TOKEN_CONFIG
        .set(config)
        .map_err(|_| RelayError::internal("token configuration already initialized", anyhow::anyhow!("double init")))
}

fn global_config() -> Result<&'static TokenConfig, RelayError> {
    TOKEN_CONFIG
        .get()
        .ok_or_else(|| RelayError::internal("token configuration not initialized", anyhow::anyhow!("missing init")))
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    exp: i64,
}

/// A freshly minted access/refresh token pair.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub refresh_token_id: String,
    pub expires_in: i64,
}

/// Mint an access token for `user_id`, returning the token and its TTL in
/// seconds.
pub fn generate_access_token(user_id: &str) -> Result<(String, i64), RelayError> {
    generate_access_token_with(global_config()?, user_id)
}

/// Mint a brand-new refresh token bound to a fresh random subject id
/// (never the user id itself), returning the token and that subject id so
/// the caller can persist it as the user's current refresh-token id.
pub fn generate_refresh_token() -> Result<(String, String), RelayError> {
    generate_refresh_token_with(global_config()?)
}

/// Mint a full [`TokenPair`] for a login or refresh response.
pub fn generate_pair(user_id: &str) -> Result<TokenPair, RelayError> {
    generate_pair_with(global_config()?, user_id)
}

/// Verify a token's signature and expiry, returning its subject claim.
///
/// Distinguishes an expired-but-valid signature from a structurally or
/// cryptographically invalid token, so callers can surface the correct
/// detail code.
pub fn verify(token: &str) -> Result<String, RelayError> {
    verify_with(global_config()?, token)
}

fn generate_access_token_with(cfg: &TokenConfig, user_id: &str) -> Result<(String, i64), RelayError> {
    let exp = (chrono::Utc::now() + cfg.exp).timestamp();
    let claims = Claims { sub: user_id.to_owned(), exp };
    let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(cfg.secret.as_bytes()))
        .map_err(|e| RelayError::internal("failed to sign access token", anyhow::anyhow!(e)))?;
    Ok((token, cfg.exp.as_secs() as i64))
}

fn generate_refresh_token_with(cfg: &TokenConfig) -> Result<(String, String), RelayError> {
    let refresh_id = Uuid::new_v4().to_string();
    let exp = (chrono::Utc::now() + cfg.refresh_exp).timestamp();
    let claims = Claims { sub: refresh_id.clone(), exp };
    let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(cfg.secret.as_bytes()))
        .map_err(|e| RelayError::internal("failed to sign refresh token", anyhow::anyhow!(e)))?;
    Ok((token, refresh_id))
}

fn generate_pair_with(cfg: &TokenConfig, user_id: &str) -> Result<TokenPair, RelayError> {
    let (access_token, expires_in) = generate_access_token_with(cfg, user_id)?;
    let (refresh_token, refresh_token_id) = generate_refresh_token_with(cfg)?;
    Ok(TokenPair { access_token, refresh_token, refresh_token_id, expires_in })
}

fn verify_with(cfg: &TokenConfig, token: &str) -> Result<String, RelayError> {
    let mut validation = Validation::default();
    validation.validate_exp = true;
    match decode::<Claims>(token, &DecodingKey::from_secret(cfg.secret.as_bytes()), &validation) {
        Ok(data) => Ok(data.claims.sub),
        Err(err) => match err.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => Err(RelayError::token_expired()),
            _ => Err(RelayError::token_invalid()),
        },
    }
}

#[cfg(test)]
#[path = "token_tests.rs"]
mod tests;
