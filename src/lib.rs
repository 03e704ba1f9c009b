//! Workday-gated instance starter.
//!
//! Starts a managed cloud instance on workdays only. Weekends, declared
//! holidays, and compensatory workdays come from a local calendar file;
//! the start request and operation polling go through the provider's
//! instance-management API. A built-in cron scheduler drives daemon mode,
//! and every run ends in one of three tagged outcomes: `not_workday`,
//! `started`, or `timeout`.

pub mod api;
pub mod calendar;
pub mod error;
pub mod executor;
pub mod scheduler;
pub mod starter;
pub mod state;
pub mod types;

pub use api::{InstanceApi, InstanceApiClient, OperationStatus};
pub use calendar::{HolidayCalendar, WorkdayCalendar};
pub use error::StartError;
pub use starter::InstanceStarter;
pub use types::{Config, StartOutcome};
