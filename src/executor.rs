//! Run executor
//!
//! Listens for trigger messages from the scheduler (or a manual CLI
//! invocation), resolves the reference date, runs the starter, and books
//! the result into execution history. Collaborator errors mark the record
//! failed and propagate; the tagged outcomes all count as success.

use std::sync::Arc;

use chrono::{Local, NaiveDate, Utc};
use chrono_tz::Tz;
use tokio::sync::mpsc;

use crate::error::StartError;
use crate::scheduler::SchedulerMessage;
use crate::starter::InstanceStarter;
use crate::state::{create_execution_record, AppState};
use crate::types::{ExecutionTrigger, StartOutcome};

/// Executor manages start runs
pub struct Executor {
    state: Arc<AppState>,
    starter: InstanceStarter,
}

impl Executor {
    pub fn new(state: Arc<AppState>, starter: InstanceStarter) -> Self {
        Self { state, starter }
    }

    /// Shared state handle, for wiring up the scheduler.
    pub fn state(&self) -> Arc<AppState> {
        self.state.clone()
    }

    /// Start the executor loop
    ///
    /// Listens for run requests from the scheduler.
    pub async fn run(&self, mut receiver: mpsc::Receiver<SchedulerMessage>) {
        while let Some(msg) = receiver.recv().await {
            log::info!("Executing start run (trigger: {:?})", msg.trigger);

            if let Err(e) = self.execute(msg.trigger).await {
                log::error!("Start run failed: {}", e);
            }
        }
    }

    /// Execute one start run and record the result
    pub async fn execute(&self, trigger: ExecutionTrigger) -> Result<StartOutcome, StartError> {
        let today = self.reference_date();

        let record = create_execution_record(trigger);
        let execution_id = record.id.clone();
        let started_at = record.started_at;
        self.state.add_execution_record(record);

        // Scheduled and missed fires both count against duplicate
        // suppression in the scheduler.
        if matches!(
            trigger,
            ExecutionTrigger::Scheduled | ExecutionTrigger::Missed
        ) {
            self.state.set_last_scheduled_run(started_at);
        }

        let result = self.starter.run(today).await;

        let finished_at = Utc::now();
        let duration_secs = (finished_at - started_at).num_seconds().max(0) as u64;

        match &result {
            Ok(outcome) => {
                let outcome = outcome.clone();
                self.state.update_execution_record(&execution_id, |r| {
                    r.finished_at = Some(finished_at);
                    r.duration_secs = Some(duration_secs);
                    r.success = true;
                    r.outcome = Some(outcome);
                });
            }
            Err(err) => {
                let message = err.to_string();
                let can_retry = err.is_retryable();
                self.state.update_execution_record(&execution_id, |r| {
                    r.finished_at = Some(finished_at);
                    r.duration_secs = Some(duration_secs);
                    r.success = false;
                    r.error_message = Some(message);
                    r.can_retry = Some(can_retry);
                });
            }
        }

        result
    }

    /// Resolve the reference date for "today".
    ///
    /// A configured `fixedDate` wins; otherwise the current date in the
    /// schedule's timezone, falling back to the host's local date.
    fn reference_date(&self) -> NaiveDate {
        let config = self
            .state
            .config
            .read()
            .ok()
            .and_then(|guard| guard.clone());

        if let Some(date) = config.as_ref().and_then(|c| c.fixed_date) {
            log::info!("Using fixed reference date {}", date);
            return date;
        }

        match config
            .as_ref()
            .and_then(|c| c.schedule.timezone.parse::<Tz>().ok())
        {
            Some(tz) => Utc::now().with_timezone(&tz).date_naive(),
            None => Local::now().date_naive(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::api::{InstanceApi, OperationStatus};
    use crate::calendar::HolidayCalendar;
    use crate::types::Config;

    struct CountingApi {
        start_calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl InstanceApi for CountingApi {
        async fn start_instance(&self, _name: &str) -> Result<String, StartError> {
            self.start_calls.fetch_add(1, Ordering::SeqCst);
            Ok("op-900".to_string())
        }

        async fn get_operation_status(
            &self,
            _operation_id: &str,
        ) -> Result<OperationStatus, StartError> {
            Ok(OperationStatus::Succeeded)
        }
    }

    fn executor_with_fixed_date(date: NaiveDate) -> (Executor, Arc<CountingApi>) {
        let config = Config {
            fixed_date: Some(date),
            ..Config::default()
        };
        let api = Arc::new(CountingApi {
            start_calls: AtomicUsize::new(0),
        });
        let starter = InstanceStarter::new(Arc::new(HolidayCalendar::new()), api.clone(), &config);
        let state = Arc::new(AppState::with_config(config));
        (Executor::new(state, starter), api)
    }

    #[tokio::test]
    async fn test_execute_uses_fixed_date_and_records_outcome() {
        // 2025-06-11 is a Wednesday
        let date = NaiveDate::from_ymd_opt(2025, 6, 11).unwrap();
        let (executor, api) = executor_with_fixed_date(date);

        let outcome = executor.execute(ExecutionTrigger::Manual).await.unwrap();

        assert_eq!(outcome, StartOutcome::Started);
        assert_eq!(api.start_calls.load(Ordering::SeqCst), 1);

        let history = executor.state.get_execution_history(1);
        assert!(history[0].success);
        assert_eq!(history[0].outcome, Some(StartOutcome::Started));
        assert!(history[0].finished_at.is_some());
    }

    #[tokio::test]
    async fn test_manual_trigger_does_not_mark_scheduled_run() {
        // 2025-06-15 is a Sunday: no API traffic either way
        let date = NaiveDate::from_ymd_opt(2025, 6, 15).unwrap();
        let (executor, api) = executor_with_fixed_date(date);

        let outcome = executor.execute(ExecutionTrigger::Manual).await.unwrap();

        assert_eq!(outcome, StartOutcome::NotWorkday { date });
        assert_eq!(api.start_calls.load(Ordering::SeqCst), 0);
        assert!(executor.state.get_last_scheduled_run().is_none());
    }

    #[tokio::test]
    async fn test_scheduled_trigger_marks_last_run() {
        let date = NaiveDate::from_ymd_opt(2025, 6, 15).unwrap();
        let (executor, _api) = executor_with_fixed_date(date);

        executor
            .execute(ExecutionTrigger::Scheduled)
            .await
            .unwrap();

        assert!(executor.state.get_last_scheduled_run().is_some());
    }
}
