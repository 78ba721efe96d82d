//! # soon-auth-simple
//!
//! Single-operator implementation of `AuthProvider`.
//! Argon2 password verification and HMAC-SHA256 signed, expiring session tokens.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use hmac::{digest::InvalidLength, Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use soon_core::traits::AuthProvider;

type HmacSha256 = Hmac<Sha256>;

pub struct SimpleAuthProvider {
    /// MAC of the configured username, compared in constant time
    username_tag: Vec<u8>,
    password_hash: SecretString,
    /// Keyed with the session secret
    mac: HmacSha256,
    session_ttl: Duration,
}

impl SimpleAuthProvider {
    pub fn new(
        username: &str,
        password_hash: SecretString,
        session_secret: &SecretString,
        session_ttl: Duration,
    ) -> Result<Self, InvalidLength> {
        let mac = HmacSha256::new_from_slice(session_secret.expose_secret().as_bytes())?;
        let username_tag = username_mac(&mac, username);
        Ok(Self {
            username_tag,
            password_hash,
            mac,
            session_ttl,
        })
    }

    /// Token format: `<expiry unix seconds>.<hex hmac>`.
    pub fn issue_session_at(&self, now: DateTime<Utc>) -> String {
        let expires = (now + self.session_ttl).timestamp();
        let tag = self.mac.clone().chain_update(session_payload(expires)).finalize().into_bytes();
        format!("{expires}.{}", hex::encode(tag))
    }

    pub fn validate_session_at(&self, token: &str, now: DateTime<Utc>) -> bool {
        let Some((expires, tag)) = token.split_once('.') else {
            return false;
        };
        let Ok(expires) = expires.parse::<i64>() else {
            return false;
        };
        let Ok(tag) = hex::decode(tag) else {
            return false;
        };
        let authentic = self
            .mac
            .clone()
            .chain_update(session_payload(expires))
            .verify_slice(&tag)
            .is_ok();
        authentic && now.timestamp() < expires
    }
}

#[async_trait]
impl AuthProvider for SimpleAuthProvider {
    async fn verify_credentials(&self, username: &str, password: &str) -> bool {
        let username_ok = self
            .mac
            .clone()
            .chain_update(username_payload(username))
            .verify_slice(&self.username_tag)
            .is_ok();

        // Always run the password check so a wrong username costs the same.
        let password_ok = verify_password(password, self.password_hash.expose_secret());
        if !(username_ok && password_ok) {
            log::warn!("rejected operator login");
        }
        username_ok && password_ok
    }

    fn issue_session(&self) -> String {
        self.issue_session_at(Utc::now())
    }

    fn validate_session(&self, token: &str) -> bool {
        self.validate_session_at(token, Utc::now())
    }
}

/// Verifies if a provided password matches a stored Argon2 hash.
pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(p) => p,
        Err(_) => return false,
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

/// Produces the PHC string expected in `auth.password_hash`.
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    Ok(Argon2::default().hash_password(password.as_bytes(), &salt)?.to_string())
}

fn username_mac(mac: &HmacSha256, username: &str) -> Vec<u8> {
    mac.clone()
        .chain_update(username_payload(username))
        .finalize()
        .into_bytes()
        .to_vec()
}

fn username_payload(username: &str) -> String {
    format!("user:{username}")
}

fn session_payload(expires: i64) -> String {
    format!("session:{expires}")
}
