//! # Domain Models
//!
//! These structs represent the core entities of SoonSite.
//! Releases use UUID v7 so that ids sort by creation time.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Wire and storage format of `release_date`.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Display format of `formatted_date` (e.g. "05 March 2025").
pub const DISPLAY_FORMAT: &str = "%d %B %Y";

/// The recipient list. Ordered so listings and stored files are stable.
pub type RecipientSet = BTreeSet<String>;

/// A tracked upcoming item (a game, a film, an album...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    /// Records written before ids existed get a fresh one on load.
    #[serde(default = "Uuid::now_v7")]
    pub id: Uuid,
    pub title: String,
    /// Free-text category label
    #[serde(rename = "type")]
    pub kind: String,
    pub release_date: NaiveDate,
    /// Cached display form of `release_date`
    #[serde(default)]
    pub formatted_date: String,
    #[serde(default)]
    pub notified: bool,
    #[serde(default)]
    pub links: Vec<Link>,
}

impl Release {
    /// Builds a fresh, un-notified release.
    pub fn new(title: String, kind: String, release_date: NaiveDate, links: Vec<Link>) -> Self {
        Self {
            id: Uuid::now_v7(),
            title,
            kind,
            release_date,
            formatted_date: format_display_date(release_date),
            notified: false,
            links,
        }
    }

    /// Whole days from `today` until the release. Negative once overdue.
    pub fn days_left(&self, today: NaiveDate) -> i64 {
        (self.release_date - today).num_days()
    }

    pub fn refresh_formatted_date(&mut self) {
        self.formatted_date = format_display_date(self.release_date);
    }
}

/// A labelled URL attached to a release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub text: String,
    pub url: String,
}

impl Link {
    pub fn new(text: impl Into<String>, url: impl Into<String>) -> Self {
        Self { text: text.into(), url: url.into() }
    }
}

/// Unvalidated operator input for create/update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReleaseDraft {
    pub title: String,
    pub kind: String,
    /// Raw `YYYY-MM-DD` string as submitted
    pub release_date: String,
    pub links: Vec<Link>,
}

/// A reminder ready to hand to a `MailTransport`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub from: String,
    pub recipients: RecipientSet,
    pub subject: String,
    pub body: String,
}

pub fn format_display_date(date: NaiveDate) -> String {
    date.format(DISPLAY_FORMAT).to_string()
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT).ok()
}

/// Keeps links whose text and url are both non-blank, trimmed, in input order.
pub fn filter_links<I>(links: I) -> Vec<Link>
where
    I: IntoIterator<Item = Link>,
{
    links
        .into_iter()
        .filter_map(|link| {
            let text = link.text.trim();
            let url = link.url.trim();
            if text.is_empty() || url.is_empty() {
                None
            } else {
                Some(Link::new(text, url))
            }
        })
        .collect()
}
