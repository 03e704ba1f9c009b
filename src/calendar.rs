//! Workday calendar
//!
//! Weekends are rest days. A declared holiday turns a weekday into a rest
//! day, and a compensatory workday turns a weekend into a workday (the
//! shifted schedule regional holiday calendars use around multi-day
//! holidays). Date sets load from a JSON calendar file; with no file only
//! the weekend rule applies.

use std::collections::HashSet;
use std::path::Path;

use chrono::{Datelike, NaiveDate, Weekday};
use serde::Deserialize;

use crate::error::StartError;

/// Workday predicate consulted once per run.
pub trait WorkdayCalendar: Send + Sync {
    fn is_workday(&self, date: NaiveDate) -> Result<bool, StartError>;
}

/// Calendar file shape: `{"holidays": [...], "workdays": [...]}`, ISO dates.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CalendarFile {
    #[serde(default)]
    holidays: Vec<NaiveDate>,
    #[serde(default)]
    workdays: Vec<NaiveDate>,
}

/// Holiday-aware workday calendar backed by declared date sets.
#[derive(Debug, Clone, Default)]
pub struct HolidayCalendar {
    holidays: HashSet<NaiveDate>,
    workdays: HashSet<NaiveDate>,
}

impl HolidayCalendar {
    /// Weekend-only calendar with no declared dates.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dates(
        holidays: impl IntoIterator<Item = NaiveDate>,
        workdays: impl IntoIterator<Item = NaiveDate>,
    ) -> Self {
        Self {
            holidays: holidays.into_iter().collect(),
            workdays: workdays.into_iter().collect(),
        }
    }

    /// Load declared dates from a JSON calendar file.
    pub fn load(path: &Path) -> Result<Self, StartError> {
        let content = std::fs::read_to_string(path).map_err(|e| StartError::Calendar {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let file: CalendarFile =
            serde_json::from_str(&content).map_err(|e| StartError::Calendar {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;

        Ok(Self::with_dates(file.holidays, file.workdays))
    }
}

impl WorkdayCalendar for HolidayCalendar {
    fn is_workday(&self, date: NaiveDate) -> Result<bool, StartError> {
        // Compensatory workdays win over the weekend rule; declared holidays
        // win over the weekday rule.
        if self.workdays.contains(&date) {
            return Ok(true);
        }
        if self.holidays.contains(&date) {
            return Ok(false);
        }
        Ok(!matches!(date.weekday(), Weekday::Sat | Weekday::Sun))
    }
}
