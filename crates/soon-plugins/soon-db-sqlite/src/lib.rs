//! # soon-db-sqlite Implementation
//!
//! This module implements the data mapping between the SQLite relational model
//! (a `releases` table and a `recipients` table) and the `soon-core` domain models.

use std::collections::HashSet;
use std::str::FromStr;

use async_trait::async_trait;
use soon_core::models::{parse_date, Link, RecipientSet, Release};
use soon_core::traits::RecordStore;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use uuid::Uuid;

const SCHEMA: [&str; 2] = [
    "CREATE TABLE IF NOT EXISTS releases (
        id             BLOB PRIMARY KEY,
        position       INTEGER NOT NULL,
        title          TEXT NOT NULL,
        type           TEXT NOT NULL,
        release_date   TEXT NOT NULL,
        formatted_date TEXT NOT NULL DEFAULT '',
        notified       INTEGER NOT NULL DEFAULT 0,
        links          TEXT NOT NULL DEFAULT '[]'
    )",
    "CREATE TABLE IF NOT EXISTS recipients (
        email TEXT PRIMARY KEY
    )",
];

pub struct SqliteRecordStore {
    pool: SqlitePool,
}

// Helper for UUID conversion
fn uuid_to_blob(id: Uuid) -> Vec<u8> {
    id.as_bytes().to_vec()
}

fn blob_to_uuid(blob: &[u8]) -> Option<Uuid> {
    Uuid::from_slice(blob).ok()
}

impl SqliteRecordStore {
    /// Connects (creating the file if needed) and ensures the schema exists.
    pub async fn new(url: &str) -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);

        // Every connection to `:memory:` is its own database, so keep exactly one alive.
        let pool = if url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new().max_connections(5).connect_with(options).await?
        };

        for statement in SCHEMA {
            sqlx::query(statement).execute(&pool).await?;
        }
        log::info!("sqlite record store ready at {url}");
        Ok(Self { pool })
    }

    /// Maps a row back to a `Release`, or `None` (logged) if it is unreadable.
    fn release_from_row(row: &SqliteRow) -> anyhow::Result<Option<Release>> {
        let raw_id: Vec<u8> = row.try_get("id")?;
        let title: String = row.try_get("title")?;
        let raw_date: String = row.try_get("release_date")?;

        let Some(id) = blob_to_uuid(&raw_id) else {
            log::warn!("skipping release {title:?}: malformed id");
            return Ok(None);
        };
        let Some(release_date) = parse_date(&raw_date) else {
            log::warn!("skipping release {title:?} ({id}): malformed release_date {raw_date:?}");
            return Ok(None);
        };
        let links: Vec<Link> = serde_json::from_str(&row.try_get::<String, _>("links")?).unwrap_or_else(|err| {
            log::warn!("release {id} has unreadable links, treating as none: {err}");
            Vec::new()
        });

        let mut release = Release {
            id,
            title,
            kind: row.try_get("type")?,
            release_date,
            formatted_date: row.try_get("formatted_date")?,
            notified: row.try_get("notified")?,
            links,
        };
        release.refresh_formatted_date();
        Ok(Some(release))
    }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn load_releases(&self) -> anyhow::Result<Vec<Release>> {
        let rows = sqlx::query("SELECT * FROM releases ORDER BY position ASC")
            .fetch_all(&self.pool)
            .await?;

        let mut releases = Vec::with_capacity(rows.len());
        for row in &rows {
            if let Some(release) = Self::release_from_row(row)? {
                releases.push(release);
            }
        }
        Ok(releases)
    }

    /// Makes the readable rows match `releases` in one transaction. Upserts by
    /// id and removes readable rows missing from `releases`; rows that failed
    /// to load are left alone. `notified` is never cleared.
    async fn save_releases(&self, releases: &[Release]) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;

        let keep: HashSet<Uuid> = releases.iter().map(|r| r.id).collect();
        let existing = sqlx::query("SELECT id, release_date FROM releases")
            .fetch_all(&mut *tx)
            .await?;
        for row in &existing {
            let raw_id: Vec<u8> = row.try_get("id")?;
            let raw_date: String = row.try_get("release_date")?;
            let Some(id) = blob_to_uuid(&raw_id).filter(|_| parse_date(&raw_date).is_some()) else {
                continue;
            };
            if !keep.contains(&id) {
                sqlx::query("DELETE FROM releases WHERE id = ?")
                    .bind(raw_id)
                    .execute(&mut *tx)
                    .await?;
            }
        }

        for (position, release) in releases.iter().enumerate() {
            sqlx::query(
                "INSERT INTO releases (id, position, title, type, release_date, formatted_date, notified, links) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?) \
                 ON CONFLICT(id) DO UPDATE SET \
                    position = excluded.position, \
                    title = excluded.title, \
                    type = excluded.type, \
                    release_date = excluded.release_date, \
                    formatted_date = excluded.formatted_date, \
                    notified = MAX(releases.notified, excluded.notified), \
                    links = excluded.links",
            )
            .bind(uuid_to_blob(release.id))
            .bind(position as i64)
            .bind(&release.title)
            .bind(&release.kind)
            .bind(release.release_date.format(soon_core::DATE_FORMAT).to_string())
            .bind(&release.formatted_date)
            .bind(release.notified)
            .bind(serde_json::to_string(&release.links)?)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn load_recipients(&self) -> anyhow::Result<RecipientSet> {
        let rows = sqlx::query("SELECT email FROM recipients")
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| row.try_get::<String, _>("email").map_err(anyhow::Error::from))
            .collect()
    }

    async fn save_recipients(&self, recipients: &RecipientSet) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM recipients").execute(&mut *tx).await?;
        for email in recipients {
            sqlx::query("INSERT INTO recipients (email) VALUES (?)")
                .bind(email)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Single-row update, so concurrent edits to other releases are untouched.
    async fn mark_notified(&self, id: Uuid) -> anyhow::Result<bool> {
        let result = sqlx::query("UPDATE releases SET notified = 1 WHERE id = ?")
            .bind(uuid_to_blob(id))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store() -> SqliteRecordStore {
        SqliteRecordStore::new("sqlite::memory:").await.unwrap()
    }

    fn release(title: &str, date: &str) -> Release {
        Release::new(
            title.into(),
            "Game".into(),
            parse_date(date).unwrap(),
            vec![Link::new("Trailer", "https://t.example")],
        )
    }

    #[tokio::test]
    async fn test_releases_round_trip_in_order() {
        let repo = store().await;
        let releases = vec![release("B", "2030-02-01"), release("A", "2030-01-01")];

        repo.save_releases(&releases).await.unwrap();
        assert_eq!(repo.load_releases().await.unwrap(), releases);

        repo.save_releases(&releases[1..]).await.unwrap();
        let loaded = repo.load_releases().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].title, "A");
    }

    #[tokio::test]
    async fn test_malformed_date_is_skipped() {
        let repo = store().await;
        repo.save_releases(&[release("Good", "2030-01-01")]).await.unwrap();

        sqlx::query("INSERT INTO releases (id, position, title, type, release_date) VALUES (?, ?, ?, ?, ?)")
            .bind(uuid_to_blob(Uuid::now_v7()))
            .bind(1_i64)
            .bind("Bad")
            .bind("Game")
            .bind("31/12/2030")
            .execute(&repo.pool)
            .await
            .unwrap();

        let loaded = repo.load_releases().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].title, "Good");
    }

    #[tokio::test]
    async fn test_skipped_row_survives_save() {
        let repo = store().await;
        sqlx::query("INSERT INTO releases (id, position, title, type, release_date) VALUES (?, ?, ?, ?, ?)")
            .bind(uuid_to_blob(Uuid::now_v7()))
            .bind(0_i64)
            .bind("Bad")
            .bind("Game")
            .bind("31/12/2030")
            .execute(&repo.pool)
            .await
            .unwrap();

        let mut releases = repo.load_releases().await.unwrap();
        assert!(releases.is_empty());
        let fresh = release("New", "2099-01-01");
        releases.push(fresh.clone());
        repo.save_releases(&releases).await.unwrap();
        repo.save_releases(&[]).await.unwrap();

        let titles: Vec<String> = sqlx::query_scalar("SELECT title FROM releases")
            .fetch_all(&repo.pool)
            .await
            .unwrap();
        assert_eq!(titles, ["Bad"]);
    }

    #[tokio::test]
    async fn test_stale_save_does_not_clear_notified() {
        let repo = store().await;
        repo.save_releases(&[release("Soon", "2099-01-01")]).await.unwrap();

        let stale = repo.load_releases().await.unwrap();
        assert!(repo.mark_notified(stale[0].id).await.unwrap());
        repo.save_releases(&stale).await.unwrap();

        assert!(repo.load_releases().await.unwrap()[0].notified);
    }

    #[tokio::test]
    async fn test_mark_notified_touches_one_row() {
        let repo = store().await;
        let first = release("First", "2030-01-01");
        let second = release("Second", "2030-01-02");
        repo.save_releases(&[first.clone(), second]).await.unwrap();

        assert!(repo.mark_notified(first.id).await.unwrap());
        assert!(!repo.mark_notified(Uuid::now_v7()).await.unwrap());

        let flags: Vec<bool> = repo.load_releases().await.unwrap().iter().map(|r| r.notified).collect();
        assert_eq!(flags, [true, false]);
    }

    #[tokio::test]
    async fn test_recipients_round_trip() {
        let repo = store().await;
        assert!(repo.load_recipients().await.unwrap().is_empty());

        let recipients: RecipientSet = ["b@example.com".to_string(), "a@example.com".to_string()].into();
        repo.save_recipients(&recipients).await.unwrap();
        assert_eq!(repo.load_recipients().await.unwrap(), recipients);

        repo.save_recipients(&RecipientSet::new()).await.unwrap();
        assert!(repo.load_recipients().await.unwrap().is_empty());
    }
}
