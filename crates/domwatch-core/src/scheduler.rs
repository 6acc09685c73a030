//! Fixed daily trigger, re-anchored to the wall clock on every iteration.

use std::{future::Future, time::Duration};

use chrono::{DateTime, Days, Local, LocalResult, NaiveTime, TimeZone};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Next local occurrence of `hour:minute` strictly after `now`.
///
/// A wall-clock time skipped by a DST jump moves to the next day that has it; an ambiguous
/// one resolves to its first occurrence.
pub fn next_daily_run<Tz: TimeZone>(
    now: &DateTime<Tz>,
    hour: u32,
    minute: u32,
) -> Option<DateTime<Tz>> {
    let at = NaiveTime::from_hms_opt(hour, minute, 0)?;
    let tz = now.timezone();
    let mut date = now.date_naive();

    // A handful of days covers any DST gap.
    for _ in 0..4 {
        let candidate = match tz.from_local_datetime(&date.and_time(at)) {
            LocalResult::Single(dt) => Some(dt),
            LocalResult::Ambiguous(first, _) => Some(first),
            LocalResult::None => None,
        };
        if let Some(dt) = candidate {
            if dt > *now {
                return Some(dt);
            }
        }
        date = date.checked_add_days(Days::new(1))?;
    }
    None
}

/// Run `job` every day at `hour:minute` local time until cancelled.
///
/// The job is awaited inline; it is expected to handle its own errors.
pub async fn schedule_daily_at<F, Fut>(
    hour: u32,
    minute: u32,
    cancel: CancellationToken,
    mut job: F,
) where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    loop {
        let now = Local::now();
        let Some(next) = next_daily_run(&now, hour, minute) else {
            warn!("[SCHED] no next run for {hour:02}:{minute:02}; stopping");
            break;
        };
        let wait = (next.clone() - now).to_std().unwrap_or(Duration::ZERO);
        info!("[SCHED] next check at {}", next.format("%Y-%m-%d %H:%M %Z"));

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(wait) => job().await,
        }
    }
    info!("[SCHED] stopped");
}
