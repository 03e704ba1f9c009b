//! Workday-gated instance start
//!
//! One run per trigger: consult the workday calendar once, issue at most
//! one start request, then poll the operation status until it succeeds or
//! the wall-clock budget runs out. Exhausting the budget is a reported
//! outcome carrying the operation id for manual follow-up, not an error.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use tokio::time::Instant;

use crate::api::{InstanceApi, OperationStatus};
use crate::calendar::WorkdayCalendar;
use crate::error::StartError;
use crate::types::{Config, StartOutcome};

/// Runs the workday check / start / poll sequence against injected
/// collaborators.
pub struct InstanceStarter {
    calendar: Arc<dyn WorkdayCalendar>,
    api: Arc<dyn InstanceApi>,
    instance_name: String,
    poll_timeout: Duration,
    poll_interval: Duration,
}

impl InstanceStarter {
    pub fn new(
        calendar: Arc<dyn WorkdayCalendar>,
        api: Arc<dyn InstanceApi>,
        config: &Config,
    ) -> Self {
        Self {
            calendar,
            api,
            instance_name: config.instance_name.clone(),
            poll_timeout: Duration::from_secs(config.poll_timeout_secs),
            poll_interval: Duration::from_secs(config.poll_interval_secs),
        }
    }

    /// Run one start pass for the given reference date.
    ///
    /// Stateless across invocations: running twice on the same non-workday
    /// date yields the same outcome and no side effects.
    pub async fn run(&self, today: NaiveDate) -> Result<StartOutcome, StartError> {
        let workday = self.calendar.is_workday(today).map_err(|e| {
            log::error!("Workday lookup for {} failed: {}", today, e);
            e
        })?;

        if !workday {
            log::info!("{} is not a workday, skipping instance start", today);
            return Ok(StartOutcome::NotWorkday { date: today });
        }

        let operation_id = self
            .api
            .start_instance(&self.instance_name)
            .await
            .map_err(|e| {
                log::error!("Start request for {} failed: {}", self.instance_name, e);
                e
            })?;
        log::info!(
            "Start requested for {}, polling operation {}",
            self.instance_name,
            operation_id
        );

        let poll_start = Instant::now();
        while poll_start.elapsed() < self.poll_timeout {
            let status = self
                .api
                .get_operation_status(&operation_id)
                .await
                .map_err(|e| {
                    log::error!("Status fetch for operation {} failed: {}", operation_id, e);
                    e
                })?;

            if status == OperationStatus::Succeeded {
                log::info!("Instance {} started", self.instance_name);
                return Ok(StartOutcome::Started);
            }

            tokio::time::sleep(self.poll_interval).await;
        }

        log::warn!(
            "Operation {} did not succeed within {}s",
            operation_id,
            self.poll_timeout.as_secs()
        );
        Ok(StartOutcome::Timeout { operation_id })
    }
}
