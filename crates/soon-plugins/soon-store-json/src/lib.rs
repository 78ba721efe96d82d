//! # soon-store-json
//!
//! Flat-file implementation of `RecordStore`: releases in one JSON array,
//! recipients in another. Files are replaced via write-to-temp-then-rename so
//! readers never see a half-written file.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use serde_json::Value;
use soon_core::models::{RecipientSet, Release};
use soon_core::traits::RecordStore;
use tokio::fs;
use tokio::sync::Mutex;
use uuid::Uuid;

pub struct JsonRecordStore {
    data_file: PathBuf,
    emails_file: PathBuf,
    /// Serializes file access within this process
    lock: Mutex<()>,
}

impl JsonRecordStore {
    /// Opens the store. Records written before ids existed are given one and
    /// written back, so ids stay stable from here on.
    pub async fn open(data_file: impl Into<PathBuf>, emails_file: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let store = Self {
            data_file: data_file.into(),
            emails_file: emails_file.into(),
            lock: Mutex::new(()),
        };

        let mut raw = read_array(&store.data_file).await?;
        let mut assigned = 0;
        for record in raw.iter_mut().filter_map(Value::as_object_mut) {
            if !record.contains_key("id") {
                record.insert("id".into(), Value::String(Uuid::now_v7().to_string()));
                assigned += 1;
            }
        }
        if assigned > 0 {
            // Raw values are written back untouched otherwise, malformed ones included.
            write_atomic(&store.data_file, &serde_json::to_vec_pretty(&raw)?).await?;
            log::info!("assigned ids to {assigned} legacy record(s) in {}", store.data_file.display());
        }

        log::info!("json record store ready at {}", store.data_file.display());
        Ok(store)
    }

    async fn read_releases(&self) -> anyhow::Result<Vec<Release>> {
        let raw = read_array(&self.data_file).await?;
        let mut releases = Vec::with_capacity(raw.len());
        for (index, record) in raw.into_iter().enumerate() {
            match serde_json::from_value::<Release>(record) {
                Ok(mut release) => {
                    release.refresh_formatted_date();
                    releases.push(release);
                }
                Err(err) => log::warn!(
                    "skipping record {index} in {}: {err}",
                    self.data_file.display()
                ),
            }
        }
        Ok(releases)
    }

    /// Writes `releases` followed by any on-disk records that do not parse,
    /// so a bad record survives until someone fixes it by hand. A `notified`
    /// flag already set on disk is never cleared.
    async fn write_releases(&self, releases: &[Release]) -> anyhow::Result<()> {
        let mut notified = HashSet::new();
        let mut unreadable = Vec::new();
        for record in read_array(&self.data_file).await? {
            match serde_json::from_value::<Release>(record.clone()) {
                Ok(stored) if stored.notified => {
                    notified.insert(stored.id);
                }
                Ok(_) => {}
                Err(_) => unreadable.push(record),
            }
        }

        let mut records = Vec::with_capacity(releases.len() + unreadable.len());
        for release in releases {
            let mut record = serde_json::to_value(release)?;
            if notified.contains(&release.id) {
                record["notified"] = Value::Bool(true);
            }
            records.push(record);
        }
        records.extend(unreadable);
        write_atomic(&self.data_file, &serde_json::to_vec_pretty(&records)?).await
    }
}

#[async_trait]
impl RecordStore for JsonRecordStore {
    async fn load_releases(&self) -> anyhow::Result<Vec<Release>> {
        let _guard = self.lock.lock().await;
        self.read_releases().await
    }

    async fn save_releases(&self, releases: &[Release]) -> anyhow::Result<()> {
        let _guard = self.lock.lock().await;
        self.write_releases(releases).await
    }

    async fn load_recipients(&self) -> anyhow::Result<RecipientSet> {
        let _guard = self.lock.lock().await;
        let raw = read_array(&self.emails_file).await?;
        Ok(raw
            .into_iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect())
    }

    async fn save_recipients(&self, recipients: &RecipientSet) -> anyhow::Result<()> {
        let _guard = self.lock.lock().await;
        write_atomic(&self.emails_file, &serde_json::to_vec_pretty(recipients)?).await
    }

    /// Holds the lock across the read-modify-write.
    async fn mark_notified(&self, id: Uuid) -> anyhow::Result<bool> {
        let _guard = self.lock.lock().await;
        let mut releases = self.read_releases().await?;
        let Some(release) = releases.iter_mut().find(|r| r.id == id) else {
            return Ok(false);
        };
        release.notified = true;
        self.write_releases(&releases).await?;
        Ok(true)
    }
}

/// Reads a top-level JSON array. A missing file is an empty array.
async fn read_array(path: &Path) -> anyhow::Result<Vec<Value>> {
    let bytes = match fs::read(path).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err).with_context(|| format!("reading {}", path.display())),
    };
    serde_json::from_slice(&bytes).with_context(|| format!("parsing {}", path.display()))
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, bytes)
        .await
        .with_context(|| format!("writing {}", tmp.display()))?;
    fs::rename(&tmp, path)
        .await
        .with_context(|| format!("replacing {}", path.display()))?;
    Ok(())
}
