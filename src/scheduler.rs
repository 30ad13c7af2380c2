// src/scheduler.rs
//! Wall-clock triggers: a daily Brand New run and a weekly sweep over the other
//! sources, both at a fixed local time.

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveTime, Offset, TimeZone, Utc, Weekday};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::pipeline::{SyncRequest, SyncTarget};
use crate::types::Source;
use crate::worker::PipelineHandle;

pub const DAILY_LOOKBACK_DAYS: i64 = 2;
pub const WEEKLY_LOOKBACK_DAYS: i64 = 8;
pub const WEEKLY_DAY: Weekday = Weekday::Sun;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleConfig {
    pub utc_offset_hours: i32,
    pub hour: u32,
    pub minute: u32,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            utc_offset_hours: 3,
            hour: 6,
            minute: 0,
        }
    }
}

impl ScheduleConfig {
    /// Out-of-range offsets fall back to UTC.
    pub fn offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_hours.saturating_mul(3600))
            .unwrap_or_else(|| Utc.fix())
    }

    fn time(&self) -> NaiveTime {
        NaiveTime::from_hms_opt(self.hour.min(23), self.minute.min(59), 0).unwrap_or(NaiveTime::MIN)
    }
}

/// First fire time strictly after `now`.
pub fn next_daily(now: DateTime<Utc>, cfg: &ScheduleConfig) -> DateTime<Utc> {
    next_matching(now, cfg, |_| true)
}

/// First fire time strictly after `now` that falls on `day` in local time.
pub fn next_weekly(now: DateTime<Utc>, cfg: &ScheduleConfig, day: Weekday) -> DateTime<Utc> {
    next_matching(now, cfg, |d| d == day)
}

fn next_matching(now: DateTime<Utc>, cfg: &ScheduleConfig, accept: impl Fn(Weekday) -> bool) -> DateTime<Utc> {
    let offset = cfg.offset();
    let local_today = now.with_timezone(&offset).date_naive();
    for ahead in 0..=7 {
        let date = local_today + Duration::days(ahead);
        if !accept(date.weekday()) {
            continue;
        }
        let Some(at) = offset.from_local_datetime(&date.and_time(cfg.time())).single() else {
            continue;
        };
        let at = at.with_timezone(&Utc);
        if at > now {
            return at;
        }
    }
    // Unreachable for a fixed offset; keep the loop alive a week out.
    now + Duration::days(7)
}

/// The weekly sweep: every source except Brand New, each on its own request.
pub fn weekly_requests() -> Vec<SyncRequest> {
    Source::ALL
        .into_iter()
        .filter(|s| *s != Source::BrandNew)
        .map(|s| SyncRequest::new(SyncTarget::One(s), WEEKLY_LOOKBACK_DAYS, "scheduled_weekly"))
        .collect()
}

pub fn daily_request() -> SyncRequest {
    SyncRequest::new(
        SyncTarget::One(Source::BrandNew),
        DAILY_LOOKBACK_DAYS,
        "scheduled_daily",
    )
}

async fn sleep_until(at: DateTime<Utc>) {
    let wait = (at - Utc::now()).to_std().unwrap_or_default();
    tokio::time::sleep(wait).await;
}

/// Spawn both schedule loops. Jobs go through the pipeline worker so they never
/// overlap with manual syncs.
pub fn spawn_scheduler(handle: PipelineHandle, cfg: ScheduleConfig) -> Vec<JoinHandle<()>> {
    let daily = {
        let handle = handle.clone();
        tokio::spawn(async move {
            loop {
                let at = next_daily(Utc::now(), &cfg);
                info!(next_run = %at, job = "daily", "schedule_armed");
                sleep_until(at).await;
                if let Err(e) = handle.enqueue(daily_request()).await {
                    warn!(job = "daily", error = %e, "schedule_enqueue_failed");
                    return;
                }
            }
        })
    };

    let weekly = tokio::spawn(async move {
        loop {
            let at = next_weekly(Utc::now(), &cfg, WEEKLY_DAY);
            info!(next_run = %at, job = "weekly", "schedule_armed");
            sleep_until(at).await;
            for req in weekly_requests() {
                if let Err(e) = handle.enqueue(req).await {
                    warn!(job = "weekly", error = %e, "schedule_enqueue_failed");
                    return;
                }
            }
        }
    });

    vec![daily, weekly]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn daily_fires_at_local_six() {
        let cfg = ScheduleConfig::default();
        // 02:00 UTC is 05:00 at +3; the 06:00 local run is 03:00 UTC the same day.
        assert_eq!(next_daily(utc(2025, 3, 4, 2, 0), &cfg), utc(2025, 3, 4, 3, 0));
        assert_eq!(next_daily(utc(2025, 3, 4, 3, 0), &cfg), utc(2025, 3, 5, 3, 0));
    }

    #[test]
    fn local_date_rolls_over_before_utc() {
        let cfg = ScheduleConfig::default();
        // 22:00 UTC on the 4th is already 01:00 on the 5th locally.
        assert_eq!(next_daily(utc(2025, 3, 4, 22, 0), &cfg), utc(2025, 3, 5, 3, 0));
    }

    #[test]
    fn weekly_waits_for_sunday() {
        let cfg = ScheduleConfig::default();
        // 2025-03-04 is a Tuesday; the next Sunday is the 9th.
        assert_eq!(
            next_weekly(utc(2025, 3, 4, 12, 0), &cfg, Weekday::Sun),
            utc(2025, 3, 9, 3, 0)
        );
        // Sunday just after the run rolls a full week.
        assert_eq!(
            next_weekly(utc(2025, 3, 9, 3, 30), &cfg, Weekday::Sun),
            utc(2025, 3, 16, 3, 0)
        );
    }

    #[test]
    fn weekly_sweep_skips_brand_new() {
        let reqs = weekly_requests();
        assert_eq!(reqs.len(), 5);
        assert!(reqs.iter().all(|r| r.target != SyncTarget::One(Source::BrandNew)));
        assert!(reqs.iter().all(|r| r.days == WEEKLY_LOOKBACK_DAYS && !r.silent));
        assert_eq!(daily_request().days, DAILY_LOOKBACK_DAYS);
    }
}
