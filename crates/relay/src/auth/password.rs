// SPDX-License-Identifier: BUSL-1.1
// Copyright 2025 Alfred Jean LLC

use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;

use crate::config::UserSettings;
use crate::error::RelayError;

/// Memory-hard KDF parameters for password protection, taken from
/// `app.user.*` configuration.
#[derive(Debug, Clone, Copy)]
pub struct PasswordPolicy {
    pub salt_len: usize,
    pub key_len: u32,
    pub time_cost: u32,
    pub memory_cost: u32,
    pub threads: u32,
}

impl From<&UserSettings> for PasswordPolicy {
    fn from(settings: &UserSettings) -> Self {
        Self {
            salt_len: settings.password_salt_len as usize,
            key_len: settings.password_key_len,
            time_cost: settings.password_time,
            memory_cost: settings.password_memory,
            threads: settings.password_threads,
        }
    }
}

impl PasswordPolicy {
    fn argon2(&self) -> Result<Argon2<'static>, RelayError> {
        let params = Params::new(self.memory_cost, self.time_cost, self.threads, Some(self.key_len as usize))
            .map_err(|e| RelayError::internal("invalid password KDF parameters", anyhow::anyhow!(e)))?;
        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }

    /// Generate a fresh random salt, hex-encoded to `salt_len * 2` characters.
    pub fn generate_salt(&self) -> String {
        let mut bytes = vec![0u8; self.salt_len];
        rand::rng().fill_bytes(&mut bytes);
        hex::encode(bytes)
    }

    /// Compute the protected form of `password`: the hex salt followed by
    /// the hex-encoded Argon2id digest of `(password, salt)`.
    pub fn protect(&self, password: &str, salt: &str) -> Result<String, RelayError> {
        let argon2 = self.argon2()?;
        let mut output = vec![0u8; self.key_len as usize];
        argon2
            .hash_password_into(password.as_bytes(), salt.as_bytes(), &mut output)
            .map_err(|e| RelayError::internal("failed to hash password", anyhow::anyhow!(e)))?;
        Ok(format!("{salt}{}", hex::encode(output)))
    }

    /// Generate a salt and return the protected form for a brand-new password.
    pub fn protect_new(&self, password: &str) -> Result<String, RelayError> {
        let salt = self.generate_salt();
        self.protect(password, &salt)
    }

    /// Verify `password` against a stored `protected_form`, re-slicing the
    /// salt out of the stored form using the configured salt length.
    pub fn is_valid(&self, password: &str, protected_form: &str) -> Result<bool, RelayError> {
        let salt_string_len = self.salt_len * 2;
        if protected_form.len() < salt_string_len {
            return Ok(false);
        }
        let salt = &protected_form[..salt_string_len];
        let recomputed = self.protect(password, salt)?;
        Ok(constant_time_eq(recomputed.as_bytes(), protected_form.as_bytes()))
    }
}

/// Character classes required by the password policy: a digit, an
/// uppercase letter, a lowercase letter, and a punctuation/space character.
const SPECIAL_CHARS: &str = " !\"#$%&'()*+,-./:;<=>?@[]^_`{|}~";

/// Validate a candidate password against the length and character-class
/// policy. Returns `Ok(())` or an `InvalidArgument` error naming the rule
/// violated.
pub fn validate_password_policy(password: &str) -> Result<(), RelayError> {
    let len = password.chars().count();
    if !(8..=32).contains(&len) {
        return Err(RelayError::invalid_argument("password must be between 8 and 32 characters long"));
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(RelayError::invalid_argument("password must contain at least one digit"));
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        return Err(RelayError::invalid_argument("password must contain at least one uppercase letter"));
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        return Err(RelayError::invalid_argument("password must contain at least one lowercase letter"));
    }
    if !password.chars().any(|c| SPECIAL_CHARS.contains(c)) {
        return Err(RelayError::invalid_argument("password must contain at least one special character"));
    }
    Ok(())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
#[path = "password_tests.rs"]
mod tests;
