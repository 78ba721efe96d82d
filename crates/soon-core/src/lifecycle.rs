//! # Release Lifecycle
//!
//! Listing, validation and CRUD for releases and recipients. All state lives
//! in the `RecordStore`; this layer owns the rules applied on the way in.

use std::sync::Arc;

use chrono::NaiveDate;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{filter_links, parse_date, Link, RecipientSet, Release, ReleaseDraft};
use crate::traits::RecordStore;

pub struct ReleaseService {
    store: Arc<dyn RecordStore>,
}

/// Required fields of a draft after validation.
struct ValidDraft {
    title: String,
    kind: String,
    release_date: NaiveDate,
    links: Vec<Link>,
}

impl ReleaseService {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Releases dated `today` or later, soonest first.
    ///
    /// Does not write. Expired releases are hidden here and removed by
    /// `purge_expired`.
    pub async fn list_upcoming(&self, today: NaiveDate) -> Result<Vec<Release>> {
        let mut upcoming: Vec<Release> = self
            .store
            .load_releases()
            .await?
            .into_iter()
            .filter(|r| r.release_date >= today)
            .collect();

        // sort_by_key is stable, so equal dates keep storage order
        upcoming.sort_by_key(|r| r.release_date);
        for release in &mut upcoming {
            release.refresh_formatted_date();
        }
        Ok(upcoming)
    }

    pub async fn get(&self, id: Uuid) -> Result<Release> {
        self.store
            .load_releases()
            .await?
            .into_iter()
            .find(|r| r.id == id)
            .ok_or_else(|| not_found(id))
    }

    pub async fn create(&self, draft: ReleaseDraft) -> Result<Release> {
        let valid = validate(draft)?;
        let mut releases = self.store.load_releases().await?;
        ensure_title_free(&releases, &valid.title, None)?;

        let release = Release::new(valid.title, valid.kind, valid.release_date, valid.links);
        releases.push(release.clone());
        self.store.save_releases(&releases).await?;

        log::info!("created release {} ({})", release.title, release.id);
        Ok(release)
    }

    /// Overwrites title, type, date and links. `id` and `notified` are kept.
    pub async fn update(&self, id: Uuid, draft: ReleaseDraft) -> Result<Release> {
        let valid = validate(draft)?;
        let mut releases = self.store.load_releases().await?;
        ensure_title_free(&releases, &valid.title, Some(id))?;

        let release = releases
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| not_found(id))?;
        release.title = valid.title;
        release.kind = valid.kind;
        release.release_date = valid.release_date;
        release.links = valid.links;
        release.refresh_formatted_date();
        let updated = release.clone();

        self.store.save_releases(&releases).await?;
        log::info!("updated release {} ({})", updated.title, updated.id);
        Ok(updated)
    }

    /// Removes a release. Returns false when there was nothing to remove.
    pub async fn delete(&self, id: Uuid) -> Result<bool> {
        let mut releases = self.store.load_releases().await?;
        let before = releases.len();
        releases.retain(|r| r.id != id);
        if releases.len() == before {
            return Ok(false);
        }
        self.store.save_releases(&releases).await?;
        log::info!("deleted release {id}");
        Ok(true)
    }

    /// Deletes every release dated strictly before `today`.
    pub async fn purge_expired(&self, today: NaiveDate) -> Result<usize> {
        let mut releases = self.store.load_releases().await?;
        let before = releases.len();
        releases.retain(|r| r.release_date >= today);
        let purged = before - releases.len();
        if purged > 0 {
            self.store.save_releases(&releases).await?;
            log::info!("purged {purged} expired release(s)");
        }
        Ok(purged)
    }

    pub async fn list_recipients(&self) -> Result<Vec<String>> {
        Ok(self.store.load_recipients().await?.into_iter().collect())
    }

    /// Adds every address in a comma separated list. Returns how many were new.
    pub async fn add_recipients(&self, input: &str) -> Result<usize> {
        let addresses: Vec<&str> = input
            .split(',')
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .collect();
        if addresses.is_empty() {
            return Err(AppError::ValidationError("no email address given".into()));
        }
        if let Some(bad) = addresses.iter().find(|a| !looks_like_address(a)) {
            return Err(AppError::ValidationError(format!("invalid email address: {bad}")));
        }

        let mut recipients = self.store.load_recipients().await?;
        let added = addresses
            .into_iter()
            .filter(|a| recipients.insert((*a).to_string()))
            .count();
        if added > 0 {
            self.store.save_recipients(&recipients).await?;
            log::info!("added {added} recipient(s)");
        }
        Ok(added)
    }

    /// Removes an address. Returns false when it was not subscribed.
    pub async fn delete_recipient(&self, address: &str) -> Result<bool> {
        let mut recipients: RecipientSet = self.store.load_recipients().await?;
        if !recipients.remove(address) {
            return Ok(false);
        }
        self.store.save_recipients(&recipients).await?;
        log::info!("removed recipient {address}");
        Ok(true)
    }
}

fn validate(draft: ReleaseDraft) -> Result<ValidDraft> {
    let title = draft.title.trim();
    let kind = draft.kind.trim();
    if title.is_empty() {
        return Err(AppError::ValidationError("title is required".into()));
    }
    if kind.is_empty() {
        return Err(AppError::ValidationError("type is required".into()));
    }
    if draft.release_date.trim().is_empty() {
        return Err(AppError::ValidationError("release date is required".into()));
    }
    let release_date = parse_date(&draft.release_date).ok_or_else(|| {
        AppError::ValidationError(format!("release date {:?} is not YYYY-MM-DD", draft.release_date))
    })?;

    Ok(ValidDraft {
        title: title.to_string(),
        kind: kind.to_string(),
        release_date,
        links: filter_links(draft.links),
    })
}

fn ensure_title_free(releases: &[Release], title: &str, except: Option<Uuid>) -> Result<()> {
    let wanted = title.to_lowercase();
    let taken = releases
        .iter()
        .filter(|r| Some(r.id) != except)
        .any(|r| r.title.trim().to_lowercase() == wanted);
    if taken {
        return Err(AppError::Conflict(format!("a release titled {title:?} already exists")));
    }
    Ok(())
}

/// `local@domain`, no whitespace. Deliverability is the transport's problem.
fn looks_like_address(address: &str) -> bool {
    match address.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !address.chars().any(char::is_whitespace)
        }
        None => false,
    }
}

fn not_found(id: Uuid) -> AppError {
    AppError::NotFound("Release".into(), id.to_string())
}
