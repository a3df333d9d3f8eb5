// SPDX-License-Identifier: BUSL-1.1
// Copyright 2025 Alfred Jean LLC

use std::time::Duration;

use super::*;

fn test_config() -> TokenConfig {
    TokenConfig { secret: "test-secret".to_owned(), exp: Duration::from_secs(1800), refresh_exp: Duration::from_secs(2_592_000) }
}

#[test]
fn access_token_round_trips_to_subject() {
    let cfg = test_config();
    let (token, expires_in) = generate_access_token_with(&cfg, "user-abc").unwrap();
    assert_eq!(expires_in, 1800);
    let subject = verify_with(&cfg, &token).unwrap();
    assert_eq!(subject, "user-abc");
}

#[test]
fn refresh_token_subject_is_not_the_user_id() {
    let cfg = test_config();
    let (token, refresh_id) = generate_refresh_token_with(&cfg).unwrap();
    let subject = verify_with(&cfg, &token).unwrap();
    assert_eq!(subject, refresh_id);
    assert_ne!(subject, "user-abc");
}

#[test]
fn pair_mints_distinct_tokens() {
    let cfg = test_config();
    let pair = generate_pair_with(&cfg, "user-abc").unwrap();
    assert_ne!(pair.access_token, pair.refresh_token);
}

#[test]
fn verify_rejects_token_signed_with_different_secret() {
    let cfg_a = test_config();
    let mut cfg_b = test_config();
    cfg_b.secret = "different-secret".to_owned();
    let (token, _) = generate_access_token_with(&cfg_a, "user-abc").unwrap();
    let err = verify_with(&cfg_b, &token).unwrap_err();
    assert_eq!(err.code, crate::error::ErrorCode::Precondition);
}

#[test]
fn verify_rejects_expired_token() {
    let cfg = test_config();
    let claims = Claims { sub: "user-abc".to_owned(), exp: chrono::Utc::now().timestamp() - 3600 };
    let token = jsonwebtoken::encode(
        &jsonwebtoken::Header::default(),
        &claims,
        &jsonwebtoken::EncodingKey::from_secret(cfg.secret.as_bytes()),
    )
    .unwrap();
    let err = verify_with(&cfg, &token).unwrap_err();
    assert_eq!(err.detail.as_ref().map(|d| d.code), Some(crate::error::ErrorDetailCode::TokenExpired));
}
