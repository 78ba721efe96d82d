//! # soon-config
//!
//! Layered settings: built-in defaults, then an optional `soonsite.toml`,
//! then `SOONSITE__*` environment variables (`__` separates sections, e.g.
//! `SOONSITE__NOTIFIER__REMINDER_WINDOW_DAYS=7`). A `.env` file is read
//! first if present.

use chrono::NaiveTime;
use config::{Config, Environment, File};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;

/// Settings file looked up next to the working directory.
pub const DEFAULT_FILE: &str = "soonsite";

const MIN_SESSION_SECRET_LEN: usize = 32;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load settings: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid setting {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub site_name: String,
    pub server: ServerSettings,
    pub storage: StorageSettings,
    pub auth: AuthSettings,
    pub mail: MailSettings,
    pub notifier: NotifierSettings,
}

#[derive(Debug, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Sqlite,
    Json,
}

#[derive(Debug, Deserialize)]
pub struct StorageSettings {
    pub backend: StorageBackend,
    /// Used by the sqlite backend
    pub database_url: String,
    /// Used by the json backend
    pub data_file: String,
    pub emails_file: String,
}

#[derive(Debug, Deserialize)]
pub struct AuthSettings {
    pub username: String,
    /// Argon2 PHC string, see the `hash-password` helper
    pub password_hash: SecretString,
    /// HMAC key for session cookies
    pub session_secret: SecretString,
    pub session_ttl_hours: i64,
}

#[derive(Debug, Deserialize)]
pub struct MailSettings {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub username: String,
    pub password: SecretString,
    /// Defaults to `username` when empty
    pub from: String,
}

impl MailSettings {
    pub fn sender(&self) -> &str {
        if self.from.trim().is_empty() {
            &self.username
        } else {
            &self.from
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct NotifierSettings {
    pub reminder_window_days: i64,
    /// Local wall-clock time of the daily run, `HH:MM`
    pub send_at: String,
}

impl NotifierSettings {
    pub fn send_at_time(&self) -> Result<NaiveTime, ConfigError> {
        NaiveTime::parse_from_str(self.send_at.trim(), "%H:%M").map_err(|e| ConfigError::Invalid {
            key: "notifier.send_at",
            reason: format!("{:?} is not HH:MM ({e})", self.send_at),
        })
    }
}

impl Settings {
    /// Loads `.env`, then `<file>.{toml,yaml,json}` if present, then the environment.
    pub fn load(file: &str) -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            log::debug!("loaded environment from {}", path.display());
        }
        Self::load_from(file)
    }

    pub fn load_from(file: &str) -> Result<Self, ConfigError> {
        let settings: Settings = Config::builder()
            .set_default("site_name", "SOONSITE")?
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 5000)?
            .set_default("storage.backend", "sqlite")?
            .set_default("storage.database_url", "sqlite:soonsite.db")?
            .set_default("storage.data_file", "data.json")?
            .set_default("storage.emails_file", "emails.json")?
            .set_default("auth.username", "admin")?
            .set_default("auth.session_ttl_hours", 12)?
            .set_default("mail.smtp_host", "smtp.gmail.com")?
            .set_default("mail.smtp_port", 465)?
            .set_default("mail.username", "")?
            .set_default("mail.password", "")?
            .set_default("mail.from", "")?
            .set_default("notifier.reminder_window_days", 10)?
            .set_default("notifier.send_at", "06:00")?
            .add_source(File::with_name(file).required(false))
            .add_source(
                Environment::with_prefix("SOONSITE")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.notifier.send_at_time()?;

        if self.notifier.reminder_window_days < 0 {
            return Err(ConfigError::Invalid {
                key: "notifier.reminder_window_days",
                reason: "must not be negative".into(),
            });
        }
        if self.auth.session_ttl_hours <= 0 {
            return Err(ConfigError::Invalid {
                key: "auth.session_ttl_hours",
                reason: "must be positive".into(),
            });
        }
        if self.auth.session_secret.expose_secret().len() < MIN_SESSION_SECRET_LEN {
            return Err(ConfigError::Invalid {
                key: "auth.session_secret",
                reason: format!("must be at least {MIN_SESSION_SECRET_LEN} bytes"),
            });
        }
        if !self.auth.password_hash.expose_secret().starts_with("$argon2") {
            return Err(ConfigError::Invalid {
                key: "auth.password_hash",
                reason: "expected an Argon2 PHC string".into(),
            });
        }
        Ok(())
    }

    pub fn bind_address(&self) -> (String, u16) {
        (self.server.host.clone(), self.server.port)
    }
}
