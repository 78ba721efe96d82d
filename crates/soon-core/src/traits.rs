//! # Core Traits (Ports)
//!
//! Any plugin must implement these traits to be used by the binary.

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{OutgoingMail, RecipientSet, Release};

/// Data persistence contract for releases and recipients.
///
/// Every call is atomic on its own; nothing spans calls.
#[async_trait]
pub trait RecordStore: Send + Sync {
    // Release Operations
    async fn load_releases(&self) -> anyhow::Result<Vec<Release>>;
    /// Replaces the stored releases with `releases`, keeping their order.
    ///
    /// A stored `notified = true` is never cleared, even when `releases` was
    /// loaded before the flag was set. Records the backend could not read
    /// are kept as they are.
    async fn save_releases(&self, releases: &[Release]) -> anyhow::Result<()>;

    // Recipient Operations
    async fn load_recipients(&self) -> anyhow::Result<RecipientSet>;
    async fn save_recipients(&self, recipients: &RecipientSet) -> anyhow::Result<()>;

    /// Sets `notified` on a single release. Returns false if the id is gone.
    ///
    /// The default goes through a full load/save; backends that can update
    /// one row in place should override it.
    async fn mark_notified(&self, id: Uuid) -> anyhow::Result<bool> {
        let mut releases = self.load_releases().await?;
        let Some(release) = releases.iter_mut().find(|r| r.id == id) else {
            return Ok(false);
        };
        release.notified = true;
        self.save_releases(&releases).await?;
        Ok(true)
    }
}

/// Outbound mail contract used by the notifier.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait MailTransport: Send + Sync {
    /// Delivers one message to every recipient in a single call.
    async fn send(&self, mail: &OutgoingMail) -> anyhow::Result<()>;
}

/// Operator identity contract.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Verifies the operator's login credentials
    async fn verify_credentials(&self, username: &str, password: &str) -> bool;

    /// Issues a signed session token for a freshly logged-in operator
    fn issue_session(&self) -> String;

    /// Checks a session token's signature and expiry
    fn validate_session(&self, token: &str) -> bool;
}
