//! # Daily scheduler
//!
//! One job on one schedule: purge expired releases, then send reminders,
//! every day at a fixed local time. Runs never overlap because the next
//! fire time is only computed once the previous run has returned.

use std::sync::Arc;

use chrono::{DateTime, Duration, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike};

use crate::error::Result;
use crate::lifecycle::ReleaseService;
use crate::notifier::{Notifier, NotifyReport};

pub struct DailyScheduler {
    releases: Arc<ReleaseService>,
    notifier: Notifier,
    at: NaiveTime,
}

impl DailyScheduler {
    pub fn new(releases: Arc<ReleaseService>, notifier: Notifier, at: NaiveTime) -> Self {
        Self { releases, notifier, at }
    }

    /// One maintenance pass for `today`.
    pub async fn run_once(&self, today: NaiveDate) -> Result<NotifyReport> {
        self.releases.purge_expired(today).await?;
        self.notifier.run(today).await
    }

    /// Loops forever. Errors are logged and the loop keeps going.
    pub async fn run_forever(self) {
        log::info!("scheduler started, daily run at {}", self.at.format("%H:%M"));
        loop {
            let now = Local::now();
            let next = next_occurrence(&now, self.at);
            let wait = (next - now).to_std().unwrap_or_default();
            log::debug!("next scheduled run at {next}");
            tokio::time::sleep(wait).await;

            let today = Local::now().date_naive();
            match self.run_once(today).await {
                Ok(report) => log::info!(
                    "daily run finished: {} sent, {} failed, {} not yet due",
                    report.sent,
                    report.failed,
                    report.not_due
                ),
                Err(err) => log::error!("daily run failed: {err}"),
            }
        }
    }
}

/// The first instant strictly after `now` whose wall-clock time is `at`.
///
/// When `at` falls in a DST gap the run happens when the gap ends. When it
/// is repeated by a DST fold, the earlier of the two instants is used.
pub fn next_occurrence<Tz: TimeZone>(now: &DateTime<Tz>, at: NaiveTime) -> DateTime<Tz> {
    let tz = now.timezone();
    let mut day = now.date_naive();
    loop {
        let wall = day.and_time(at);
        let resolved = tz
            .from_local_datetime(&wall)
            .earliest()
            .or_else(|| end_of_gap(&tz, wall));
        if let Some(candidate) = resolved {
            if candidate > *now {
                return candidate;
            }
        }
        day = day.succ_opt().unwrap_or(day);
    }
}

/// First whole wall-clock minute after `wall` that exists in `tz`.
fn end_of_gap<Tz: TimeZone>(tz: &Tz, wall: NaiveDateTime) -> Option<DateTime<Tz>> {
    let start = wall.with_second(0)?.with_nanosecond(0)?;
    (1..=24 * 60).find_map(|minutes| tz.from_local_datetime(&(start + Duration::minutes(minutes))).earliest())
}
