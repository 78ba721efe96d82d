//! In-memory `RecordStore` for tests.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::models::{RecipientSet, Release};
use crate::traits::RecordStore;

#[derive(Default)]
pub struct MemoryRecordStore {
    releases: Mutex<Vec<Release>>,
    recipients: Mutex<RecipientSet>,
    release_writes: AtomicUsize,
}

impl MemoryRecordStore {
    pub fn with_recipients<I, S>(recipients: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            recipients: Mutex::new(recipients.into_iter().map(Into::into).collect()),
            ..Default::default()
        }
    }

    /// Number of `save_releases` calls so far.
    pub fn release_writes(&self) -> usize {
        self.release_writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn load_releases(&self) -> anyhow::Result<Vec<Release>> {
        Ok(self.releases.lock().await.clone())
    }

    async fn save_releases(&self, releases: &[Release]) -> anyhow::Result<()> {
        let mut stored = self.releases.lock().await;
        let notified: HashSet<Uuid> = stored.iter().filter(|r| r.notified).map(|r| r.id).collect();
        *stored = releases
            .iter()
            .cloned()
            .map(|mut r| {
                r.notified |= notified.contains(&r.id);
                r
            })
            .collect();
        self.release_writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn load_recipients(&self) -> anyhow::Result<RecipientSet> {
        Ok(self.recipients.lock().await.clone())
    }

    async fn save_recipients(&self, recipients: &RecipientSet) -> anyhow::Result<()> {
        *self.recipients.lock().await = recipients.clone();
        Ok(())
    }
}
