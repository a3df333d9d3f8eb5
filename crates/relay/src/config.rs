// SPDX-License-Identifier: BUSL-1.1
// Copyright 2025 Alfred Jean LLC

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use serde::Deserialize;

/// Peer-discovery and message-relay service.
///
/// Process-level knobs (which config file to load, how to log) come from
/// flags/env via `clap`; everything else is layered from the settings file
/// by [`Settings::load`].
#[derive(Debug, Parser)]
#[command(name = "relayd", version, about)]
pub struct Cli {
    /// Path to the TOML settings file (`server.*`, `app.*`, `database.*`, `log.*`).
    #[arg(long, env = "RELAY_CONFIG", default_value = "config/default.toml")]
    pub config: PathBuf,

    /// Override `server.address` (host:port to bind the gRPC listener to).
    #[arg(long, env = "RELAY_SERVER_ADDRESS")]
    pub address: Option<String>,

    /// Override `log.format` (json or text).
    #[arg(long, env = "RELAY_LOG_FORMAT")]
    pub log_format: Option<String>,

    /// Override `log.level` (trace, debug, info, warn, error).
    #[arg(long, env = "RELAY_LOG_LEVEL")]
    pub log_level: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub address: String,
    #[serde(default)]
    pub tls: bool,
    pub certfile: Option<String>,
    pub keyfile: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenSettings {
    pub secret: String,
    /// Access token time-to-live, in seconds.
    #[serde(default = "default_token_exp_secs")]
    pub exp_secs: u64,
    /// Refresh token time-to-live, in seconds.
    #[serde(default = "default_refresh_exp_secs")]
    pub refresh_exp_secs: u64,
}

impl TokenSettings {
    pub fn exp(&self) -> Duration {
        Duration::from_secs(self.exp_secs)
    }

    pub fn refresh_exp(&self) -> Duration {
        Duration::from_secs(self.refresh_exp_secs)
    }
}

fn default_token_exp_secs() -> u64 {
    30 * 60
}

fn default_refresh_exp_secs() -> u64 {
    30 * 24 * 60 * 60
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserSettings {
    #[serde(default = "default_salt_len")]
    pub password_salt_len: u32,
    #[serde(default = "default_key_len")]
    pub password_key_len: u32,
    #[serde(default = "default_password_time")]
    pub password_time: u32,
    #[serde(default = "default_password_memory")]
    pub password_memory: u32,
    #[serde(default = "default_password_threads")]
    pub password_threads: u32,
}

fn default_salt_len() -> u32 {
    32
}
fn default_key_len() -> u32 {
    32
}
fn default_password_time() -> u32 {
    3
}
fn default_password_memory() -> u32 {
    32768
}
fn default_password_threads() -> u32 {
    4
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageSettings {
    #[serde(default = "default_max_payload_bytes")]
    pub max_payload_bytes: usize,
}

fn default_max_payload_bytes() -> usize {
    65536
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppSettings {
    pub token: TokenSettings,
    pub user: UserSettings,
    #[serde(default)]
    pub message: MessageSettingsOrDefault,
}

/// Wrapper so `app.message` can be omitted entirely from the settings file.
#[derive(Debug, Clone, Deserialize)]
#[serde(from = "Option<MessageSettings>")]
pub struct MessageSettingsOrDefault(pub MessageSettings);

impl From<Option<MessageSettings>> for MessageSettingsOrDefault {
    fn from(value: Option<MessageSettings>) -> Self {
        Self(value.unwrap_or(MessageSettings { max_payload_bytes: default_max_payload_bytes() }))
    }
}

impl Default for MessageSettingsOrDefault {
    fn default() -> Self {
        Self(MessageSettings { max_payload_bytes: default_max_payload_bytes() })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    pub filepath: String,
    #[serde(default)]
    pub log: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogSettings {
    #[serde(default = "default_log_format")]
    pub format: String,
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_format() -> String {
    "json".to_owned()
}
fn default_log_level() -> String {
    "info".to_owned()
}

/// Fully resolved application settings, layered file + environment +
/// CLI overrides (in that order of increasing precedence).
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub app: AppSettings,
    pub database: DatabaseSettings,
    #[serde(default)]
    pub log: LogSettingsOrDefault,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(from = "Option<LogSettings>")]
pub struct LogSettingsOrDefault(pub LogSettings);

impl From<Option<LogSettings>> for LogSettingsOrDefault {
    fn from(value: Option<LogSettings>) -> Self {
        Self(value.unwrap_or(LogSettings { format: default_log_format(), level: default_log_level() }))
    }
}

impl Default for LogSettingsOrDefault {
    fn default() -> Self {
        Self(LogSettings { format: default_log_format(), level: default_log_level() })
    }
}

impl Settings {
    /// Build the layered settings: the TOML file named by `cli.config`, then
    /// `RELAY_<SECTION>_<KEY>` environment overrides, then explicit CLI flags.
    pub fn load(cli: &Cli) -> anyhow::Result<Self> {
        let builder = config::Config::builder()
            .add_source(config::File::from(cli.config.as_path()).required(false))
            .add_source(config::Environment::with_prefix("RELAY").separator("_").try_parsing(true));

        let mut settings: Settings = builder.build()?.try_deserialize()?;

        if let Some(address) = &cli.address {
            settings.server.address = address.clone();
        }
        if let Some(format) = &cli.log_format {
            settings.log.0.format = format.clone();
        }
        if let Some(level) = &cli.log_level {
            settings.log.0.level = level.clone();
        }

        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.app.user.password_salt_len < 32 {
            anyhow::bail!("app.user.password_salt_len must be >= 32");
        }
        if self.app.user.password_key_len < 32 {
            anyhow::bail!("app.user.password_key_len must be >= 32");
        }
        if self.app.user.password_time < 3 {
            anyhow::bail!("app.user.password_time must be >= 3");
        }
        if !matches!(self.log.0.format.as_str(), "json" | "text") {
            anyhow::bail!("log.format must be 'json' or 'text'");
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
