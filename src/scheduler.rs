//! Scheduler for cron-based start runs
//!
//! Manages the daily trigger with support for:
//! - Cron expression parsing
//! - Timezone-aware scheduling
//! - Sleep/wake detection via time-jump polling
//! - Missed run handling (runs if within grace period)
//!
//! The scheduler only decides *when* to fire; whether anything happens on a
//! given date is the workday calendar's call inside the run itself.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use cron::Schedule;
use tokio::sync::mpsc;

use crate::error::StartError;
use crate::state::AppState;
use crate::types::{ExecutionTrigger, ScheduleEntry};

/// Grace period for missed runs (2 hours)
const MISSED_RUN_GRACE_PERIOD_SECS: i64 = 7200;

/// Time jump threshold to detect sleep/wake (5 minutes)
const TIME_JUMP_THRESHOLD_SECS: i64 = 300;

/// Poll interval for the scheduler loop (1 minute)
const CHECK_INTERVAL_SECS: u64 = 60;

/// Channel buffer size for scheduler messages
pub const SCHEDULER_CHANNEL_SIZE: usize = 8;

/// Message sent to trigger a start run
#[derive(Debug, Clone)]
pub struct SchedulerMessage {
    pub trigger: ExecutionTrigger,
}

/// Scheduler for the recurring start run
pub struct Scheduler {
    state: Arc<AppState>,
    sender: mpsc::Sender<SchedulerMessage>,
}

impl Scheduler {
    pub fn new(state: Arc<AppState>, sender: mpsc::Sender<SchedulerMessage>) -> Self {
        Self { state, sender }
    }

    /// Start the scheduler loop
    ///
    /// This runs indefinitely, checking for a due run every minute.
    /// It also handles sleep/wake detection.
    pub async fn run(&self) {
        let mut last_check = Utc::now();

        loop {
            tokio::time::sleep(Duration::from_secs(CHECK_INTERVAL_SECS)).await;

            let now = Utc::now();

            // Detect sleep: time jumped more than 5 minutes
            let time_jump = (now - last_check).num_seconds();
            if time_jump > TIME_JUMP_THRESHOLD_SECS {
                log::info!(
                    "Detected system wake (time jumped {} seconds), checking for a missed run",
                    time_jump
                );
                self.check_missed_run(now).await;
            }

            self.check_due_run(now).await;

            last_check = now;
        }
    }

    fn schedule_entry(&self) -> Option<ScheduleEntry> {
        let config = self.state.config.read().ok()?.clone()?;
        if config.schedule.enabled {
            Some(config.schedule)
        } else {
            None
        }
    }

    /// Check whether the run is due now
    async fn check_due_run(&self, now: DateTime<Utc>) {
        let Some(entry) = self.schedule_entry() else {
            return;
        };

        match self.should_run_now(&entry, now) {
            Ok(true) => self.trigger_run(ExecutionTrigger::Scheduled).await,
            Ok(false) => {}
            Err(e) => log::warn!("Schedule check failed: {}", e),
        }
    }

    /// Check if the run should fire at the given time
    fn should_run_now(&self, entry: &ScheduleEntry, now: DateTime<Utc>) -> Result<bool, StartError> {
        let schedule = parse_cron(&entry.cron)?;
        let tz: Tz = entry.timezone.parse().map_err(|_| {
            StartError::Configuration(format!("Invalid timezone: {}", entry.timezone))
        })?;

        let now_local = now.with_timezone(&tz);
        let last_run = self.state.get_last_scheduled_run();

        // Find the most recent scheduled time that's <= now
        let mut scheduled_times = schedule.after(&(now_local - chrono::Duration::minutes(2)));

        if let Some(next_time) = scheduled_times.next() {
            let next_utc = next_time.with_timezone(&Utc);
            let diff = (now - next_utc).num_seconds().abs();

            // Within 2 minutes of scheduled time (wider window for sleep/wake)
            if diff < 120 {
                // Check if we already fired for this scheduled time
                if let Some(last) = last_run {
                    if (last - next_utc).num_seconds().abs() < 60 {
                        return Ok(false);
                    }
                }
                return Ok(true);
            }
        }

        Ok(false)
    }

    /// Check for a run that was missed during sleep
    async fn check_missed_run(&self, now: DateTime<Utc>) {
        let Some(entry) = self.schedule_entry() else {
            return;
        };

        match self.find_missed_run(&entry, now) {
            Ok(Some(_)) => {
                log::info!("Found missed start run, running now");
                self.trigger_run(ExecutionTrigger::Missed).await;
            }
            Ok(None) => {}
            Err(e) => log::warn!("Missed-run check failed: {}", e),
        }
    }

    /// Find a missed scheduled time within the grace period.
    fn find_missed_run(
        &self,
        entry: &ScheduleEntry,
        now: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>, StartError> {
        let schedule = parse_cron(&entry.cron)?;
        let tz: Tz = entry.timezone.parse().map_err(|_| {
            StartError::Configuration(format!("Invalid timezone: {}", entry.timezone))
        })?;

        let now_local = now.with_timezone(&tz);
        let grace_start = now_local - chrono::Duration::seconds(MISSED_RUN_GRACE_PERIOD_SECS);

        let last_run = self.state.get_last_scheduled_run();

        for scheduled in schedule.after(&grace_start) {
            let scheduled_utc = scheduled.with_timezone(&Utc);

            if scheduled_utc > now {
                break;
            }

            if let Some(last) = last_run {
                if last >= scheduled_utc {
                    continue; // Already ran
                }
            }

            return Ok(Some(scheduled_utc));
        }

        Ok(None)
    }

    /// Trigger a start run
    async fn trigger_run(&self, trigger: ExecutionTrigger) {
        if self
            .sender
            .send(SchedulerMessage { trigger })
            .await
            .is_err()
        {
            log::error!("Failed to send scheduler message (executor gone)");
        }
    }
}

/// Parse a cron expression
pub fn parse_cron(expr: &str) -> Result<Schedule, StartError> {
    // The cron crate expects 6 fields (with seconds), but config uses the
    // 5-field format. Add "0" for seconds at the start.
    let full_expr = format!("0 {}", expr);

    full_expr.parse::<Schedule>().map_err(|e| {
        StartError::Configuration(format!("Invalid cron expression '{}': {}", expr, e))
    })
}

/// Get the next scheduled run time
pub fn next_run_time(entry: &ScheduleEntry) -> Result<DateTime<Utc>, StartError> {
    let schedule = parse_cron(&entry.cron)?;
    let tz: Tz = entry.timezone.parse().map_err(|_| {
        StartError::Configuration(format!("Invalid timezone: {}", entry.timezone))
    })?;

    let next = schedule
        .upcoming(tz)
        .next()
        .ok_or_else(|| StartError::Configuration("No upcoming scheduled time".to_string()))?;

    Ok(next.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cron_daily_8am() {
        assert!(parse_cron("0 8 * * *").is_ok());
    }

    #[test]
    fn test_parse_cron_weekdays() {
        assert!(parse_cron("0 8 * * 1-5").is_ok());
    }

    #[test]
    fn test_parse_cron_invalid() {
        assert!(parse_cron("not a cron").is_err());
    }

    #[test]
    fn test_next_run_time() {
        let entry = ScheduleEntry {
            enabled: true,
            cron: "0 8 * * *".to_string(),
            timezone: "Asia/Shanghai".to_string(),
        };

        let next = next_run_time(&entry).unwrap();
        assert!(next > Utc::now());
    }

    #[test]
    fn test_next_run_time_bad_timezone() {
        let entry = ScheduleEntry {
            enabled: true,
            cron: "0 8 * * *".to_string(),
            timezone: "Not/AZone".to_string(),
        };

        assert!(matches!(
            next_run_time(&entry),
            Err(StartError::Configuration(_))
        ));
    }
}
