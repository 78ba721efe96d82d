//! # Notifier
//!
//! Sends one reminder per release that has entered the reminder window and
//! records the `notified` flag as soon as each send succeeds.

use std::sync::Arc;

use chrono::NaiveDate;

use crate::error::Result;
use crate::models::{OutgoingMail, RecipientSet, Release, DATE_FORMAT};
use crate::traits::{MailTransport, RecordStore};

/// Default value of `reminder_window_days`.
pub const DEFAULT_REMINDER_WINDOW_DAYS: i64 = 10;

#[derive(Debug, Clone)]
pub struct NotifierConfig {
    /// Sender address of every reminder
    pub from: String,
    /// A release is due once it is this many days away or closer
    pub reminder_window_days: i64,
}

/// Outcome of one `Notifier::run`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct NotifyReport {
    pub sent: usize,
    pub failed: usize,
    /// Un-notified releases still outside the window
    pub not_due: usize,
}

pub struct Notifier {
    store: Arc<dyn RecordStore>,
    transport: Arc<dyn MailTransport>,
    config: NotifierConfig,
}

impl Notifier {
    pub fn new(store: Arc<dyn RecordStore>, transport: Arc<dyn MailTransport>, config: NotifierConfig) -> Self {
        Self { store, transport, config }
    }

    pub async fn run(&self, today: NaiveDate) -> Result<NotifyReport> {
        let releases = self.store.load_releases().await?;
        let recipients = self.store.load_recipients().await?;
        let mut report = NotifyReport::default();

        if recipients.is_empty() {
            log::info!("no recipients configured, skipping reminders");
            return Ok(report);
        }

        for release in releases.iter().filter(|r| !r.notified) {
            let days_left = release.days_left(today);
            if days_left > self.config.reminder_window_days {
                report.not_due += 1;
                continue;
            }

            let mail = compose_reminder(release, days_left, &self.config.from, &recipients);
            if let Err(err) = self.transport.send(&mail).await {
                // stays un-notified, so the next run tries again
                log::error!("reminder for {} ({}) failed: {err:#}", release.title, release.id);
                report.failed += 1;
                continue;
            }

            match self.store.mark_notified(release.id).await {
                Ok(true) => log::info!(
                    "sent reminder for {} ({} day(s) left) to {} recipient(s)",
                    release.title,
                    days_left,
                    recipients.len()
                ),
                Ok(false) => log::warn!("release {} was deleted while its reminder was being sent", release.id),
                Err(err) => {
                    // mail went out but the flag did not stick; tomorrow's run sends it again
                    log::error!("could not mark {} ({}) as notified: {err:#}", release.title, release.id);
                    report.failed += 1;
                    continue;
                }
            }
            report.sent += 1;
        }

        Ok(report)
    }
}

/// Builds the plain-text reminder for one release.
pub fn compose_reminder(release: &Release, days_left: i64, from: &str, recipients: &RecipientSet) -> OutgoingMail {
    let subject = match days_left {
        n if n > 1 => format!("Reminder: '{}' is releasing in {n} days!", release.title),
        1 => format!("Reminder: '{}' is releasing tomorrow!", release.title),
        0 => format!("Reminder: '{}' is releasing today!", release.title),
        _ => format!("Reminder: '{}' has been released!", release.title),
    };

    let links = if release.links.is_empty() {
        "(none)".to_string()
    } else {
        release
            .links
            .iter()
            .map(|link| format!("{}: {}", link.text, link.url))
            .collect::<Vec<_>>()
            .join("\n")
    };

    let body = format!(
        "Don't forget!\n\nTitle: {}\nType: {}\nRelease Date: {}\n\nLinks:\n{}\n",
        release.title,
        release.kind,
        release.release_date.format(DATE_FORMAT),
        links
    );

    OutgoingMail {
        from: from.to_string(),
        recipients: recipients.clone(),
        subject,
        body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryRecordStore;
    use crate::models::{parse_date, Link};
    use crate::traits::MockMailTransport;
    use chrono::Duration;
    use uuid::Uuid;

    const FROM: &str = "reminders@soonsite.example";

    fn today() -> NaiveDate {
        parse_date("2026-10-16").unwrap()
    }

    fn release_in(title: &str, days: i64) -> Release {
        Release::new(title.into(), "Game".into(), today() + Duration::days(days), vec![])
    }

    async fn seeded(recipients: &[&str], releases: Vec<Release>) -> Arc<MemoryRecordStore> {
        let store = Arc::new(MemoryRecordStore::with_recipients(recipients.iter().copied()));
        store.save_releases(&releases).await.unwrap();
        store
    }

    fn notifier(store: Arc<MemoryRecordStore>, transport: MockMailTransport) -> Notifier {
        let config = NotifierConfig {
            from: FROM.into(),
            reminder_window_days: DEFAULT_REMINDER_WINDOW_DAYS,
        };
        Notifier::new(store, Arc::new(transport), config)
    }

    #[tokio::test]
    async fn only_releases_inside_the_window_are_sent() {
        let store = seeded(&["a@example.com"], vec![release_in("Soon", 3), release_in("Later", 20)]).await;
        let mut transport = MockMailTransport::new();
        transport
            .expect_send()
            .withf(|mail| mail.subject.contains("'Soon'") && mail.from == FROM)
            .times(1)
            .returning(|_| Ok(()));

        let report = notifier(store.clone(), transport).run(today()).await.unwrap();
        assert_eq!(report, NotifyReport { sent: 1, failed: 0, not_due: 1 });

        let releases = store.load_releases().await.unwrap();
        assert!(releases.iter().find(|r| r.title == "Soon").unwrap().notified);
        assert!(!releases.iter().find(|r| r.title == "Later").unwrap().notified);
    }

    #[tokio::test]
    async fn window_boundary_and_overdue_are_due() {
        let store = seeded(
            &["a@example.com"],
            vec![release_in("Edge", 10), release_in("Overdue", -2), release_in("Outside", 11)],
        )
        .await;
        let mut transport = MockMailTransport::new();
        transport.expect_send().times(2).returning(|_| Ok(()));

        let report = notifier(store, transport).run(today()).await.unwrap();
        assert_eq!(report.sent, 2);
        assert_eq!(report.not_due, 1);
    }

    #[tokio::test]
    async fn no_recipients_means_no_sends_and_no_writes() {
        let store = seeded(&[], vec![release_in("Soon", 1)]).await;
        let writes = store.release_writes();
        let mut transport = MockMailTransport::new();
        transport.expect_send().never();

        let report = notifier(store.clone(), transport).run(today()).await.unwrap();
        assert_eq!(report, NotifyReport::default());
        assert_eq!(store.release_writes(), writes);
    }

    #[tokio::test]
    async fn failed_send_stays_eligible_and_does_not_stop_the_run() {
        let store = seeded(&["a@example.com"], vec![release_in("Broken", 1), release_in("Fine", 2)]).await;
        let mut transport = MockMailTransport::new();
        transport
            .expect_send()
            .times(2)
            .returning(|mail| {
                if mail.subject.contains("'Broken'") {
                    Err(anyhow::anyhow!("smtp 554"))
                } else {
                    Ok(())
                }
            });

        let report = notifier(store.clone(), transport).run(today()).await.unwrap();
        assert_eq!(report, NotifyReport { sent: 1, failed: 1, not_due: 0 });

        let releases = store.load_releases().await.unwrap();
        assert!(!releases.iter().find(|r| r.title == "Broken").unwrap().notified);
        assert!(releases.iter().find(|r| r.title == "Fine").unwrap().notified);
    }

    /// Delegates to a memory store but cannot persist `notified` for one title.
    struct StuckFlag {
        inner: MemoryRecordStore,
        stuck_title: &'static str,
    }

    #[async_trait::async_trait]
    impl RecordStore for StuckFlag {
        async fn load_releases(&self) -> anyhow::Result<Vec<Release>> {
            self.inner.load_releases().await
        }

        async fn save_releases(&self, releases: &[Release]) -> anyhow::Result<()> {
            self.inner.save_releases(releases).await
        }

        async fn load_recipients(&self) -> anyhow::Result<RecipientSet> {
            self.inner.load_recipients().await
        }

        async fn save_recipients(&self, recipients: &RecipientSet) -> anyhow::Result<()> {
            self.inner.save_recipients(recipients).await
        }

        async fn mark_notified(&self, id: Uuid) -> anyhow::Result<bool> {
            let releases = self.inner.load_releases().await?;
            if releases.iter().any(|r| r.id == id && r.title == self.stuck_title) {
                anyhow::bail!("disk full");
            }
            self.inner.mark_notified(id).await
        }
    }

    #[tokio::test]
    async fn failed_mark_is_counted_and_does_not_stop_the_run() {
        let inner = MemoryRecordStore::with_recipients(["a@example.com"]);
        inner.save_releases(&[release_in("Stuck", 1), release_in("Fine", 2)]).await.unwrap();
        let store = Arc::new(StuckFlag { inner, stuck_title: "Stuck" });

        let mut transport = MockMailTransport::new();
        transport.expect_send().times(2).returning(|_| Ok(()));
        let config = NotifierConfig { from: FROM.into(), reminder_window_days: DEFAULT_REMINDER_WINDOW_DAYS };
        let notifier = Notifier::new(store.clone(), Arc::new(transport), config);

        let report = notifier.run(today()).await.unwrap();
        assert_eq!(report, NotifyReport { sent: 1, failed: 1, not_due: 0 });

        let releases = store.load_releases().await.unwrap();
        assert!(!releases.iter().find(|r| r.title == "Stuck").unwrap().notified);
        assert!(releases.iter().find(|r| r.title == "Fine").unwrap().notified);
    }

    #[tokio::test]
    async fn second_run_sends_nothing() {
        let store = seeded(&["a@example.com", "b@example.com"], vec![release_in("Soon", 3)]).await;
        let mut transport = MockMailTransport::new();
        transport
            .expect_send()
            .withf(|mail| mail.recipients.len() == 2)
            .times(1)
            .returning(|_| Ok(()));
        let notifier = notifier(store, transport);

        assert_eq!(notifier.run(today()).await.unwrap().sent, 1);
        assert_eq!(notifier.run(today()).await.unwrap().sent, 0);
    }

    #[test]
    fn reminder_lists_fields_and_links() {
        let mut release = release_in("Game X", 3);
        release.links = vec![Link::new("Trailer", "https://t.example"), Link::new("Store", "https://s.example")];
        let recipients: RecipientSet = ["a@example.com".to_string()].into();

        let mail = compose_reminder(&release, 3, FROM, &recipients);
        assert_eq!(mail.subject, "Reminder: 'Game X' is releasing in 3 days!");
        assert_eq!(
            mail.body,
            "Don't forget!\n\nTitle: Game X\nType: Game\nRelease Date: 2026-10-19\n\n\
             Links:\nTrailer: https://t.example\nStore: https://s.example\n"
        );
        assert_eq!(mail.recipients, recipients);

        assert!(compose_reminder(&release, 1, FROM, &recipients).subject.ends_with("tomorrow!"));
        assert!(compose_reminder(&release, 0, FROM, &recipients).subject.ends_with("today!"));
    }
}
