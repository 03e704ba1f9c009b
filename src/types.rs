use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Configuration stored in ~/.workstart/config.json
///
/// Every field carries a serde default so a partial file parses; a missing
/// file falls back to `Config::default()` plus whatever the CLI overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Target instance to start.
    #[serde(default = "default_instance_name")]
    pub instance_name: String,
    #[serde(default)]
    pub api: ApiConfig,
    /// Wall-clock budget for the operation status poll, in seconds.
    #[serde(default = "default_poll_timeout_secs")]
    pub poll_timeout_secs: u64,
    /// Pause between status checks, in seconds.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default)]
    pub schedule: ScheduleEntry,
    /// Holiday calendar file. Absent means the plain weekend rule applies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calendar_path: Option<String>,
    /// Override the reference date instead of reading the clock. Meant for
    /// rehearsing a run against a specific date.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed_date: Option<NaiveDate>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            instance_name: default_instance_name(),
            api: ApiConfig::default(),
            poll_timeout_secs: default_poll_timeout_secs(),
            poll_interval_secs: default_poll_interval_secs(),
            schedule: ScheduleEntry::default(),
            calendar_path: None,
            fixed_date: None,
        }
    }
}

fn default_instance_name() -> String {
    "WordPress-1".to_string()
}

fn default_poll_timeout_secs() -> u64 {
    100
}

fn default_poll_interval_secs() -> u64 {
    5
}

/// Instance-management API endpoint settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiConfig {
    /// Base URL of the provider's instance-management endpoint.
    #[serde(default)]
    pub base_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Per-request HTTP timeout, in seconds.
    #[serde(default = "default_api_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: None,
            timeout_secs: default_api_timeout_secs(),
        }
    }
}

fn default_api_timeout_secs() -> u64 {
    30
}

/// Cron schedule for daemon mode
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleEntry {
    pub enabled: bool,
    pub cron: String,
    pub timezone: String,
}

impl Default for ScheduleEntry {
    /// 8 AM every day. The workday gate is the calendar's job, so the cron
    /// fires daily and the run decides whether to act.
    fn default() -> Self {
        Self {
            enabled: true,
            cron: "0 8 * * *".to_string(),
            timezone: "Asia/Shanghai".to_string(),
        }
    }
}

/// Terminal outcome of a start run
///
/// Serializes to the wire contract consumed by the invoking infrastructure:
/// `{"status":"not_workday","date":"2025-06-10"}`, `{"status":"started"}`,
/// `{"status":"timeout","operationId":"op-123"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum StartOutcome {
    NotWorkday { date: NaiveDate },
    Started,
    Timeout { operation_id: String },
}

/// What triggered the execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionTrigger {
    Scheduled,
    Manual,
    Missed,
}

/// Record of a start run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRecord {
    pub id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration_secs: Option<u64>,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<StartOutcome>,
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub can_retry: Option<bool>,
    pub trigger: ExecutionTrigger,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_not_workday_wire_shape() {
        let outcome = StartOutcome::NotWorkday {
            date: NaiveDate::from_ymd_opt(2025, 6, 10).unwrap(),
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"status": "not_workday", "date": "2025-06-10"})
        );
    }

    #[test]
    fn test_outcome_started_wire_shape() {
        let json = serde_json::to_value(StartOutcome::Started).unwrap();
        assert_eq!(json, serde_json::json!({"status": "started"}));
    }

    #[test]
    fn test_outcome_timeout_wire_shape() {
        let outcome = StartOutcome::Timeout {
            operation_id: "op-123".to_string(),
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"status": "timeout", "operationId": "op-123"})
        );
    }

    #[test]
    fn test_config_defaults_from_empty_file() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config.instance_name, "WordPress-1");
        assert_eq!(config.poll_timeout_secs, 100);
        assert_eq!(config.poll_interval_secs, 5);
        assert!(config.schedule.enabled);
        assert_eq!(config.schedule.cron, "0 8 * * *");
        assert!(config.calendar_path.is_none());
        assert!(config.fixed_date.is_none());
    }

    #[test]
    fn test_config_partial_file_parses() {
        let json = r#"{
            "instanceName": "blog-primary",
            "api": {"baseUrl": "https://api.example.net/v1", "apiKey": "k-123"},
            "pollIntervalSecs": 2,
            "fixedDate": "2025-06-10"
        }"#;

        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.instance_name, "blog-primary");
        assert_eq!(config.api.base_url, "https://api.example.net/v1");
        assert_eq!(config.api.api_key.as_deref(), Some("k-123"));
        assert_eq!(config.api.timeout_secs, 30);
        assert_eq!(config.poll_timeout_secs, 100);
        assert_eq!(config.poll_interval_secs, 2);
        assert_eq!(
            config.fixed_date,
            Some(NaiveDate::from_ymd_opt(2025, 6, 10).unwrap())
        );
    }

    #[test]
    fn test_execution_record_roundtrip() {
        let record = ExecutionRecord {
            id: "abc".to_string(),
            started_at: Utc::now(),
            finished_at: None,
            duration_secs: None,
            success: true,
            outcome: Some(StartOutcome::Started),
            error_message: None,
            can_retry: None,
            trigger: ExecutionTrigger::Scheduled,
        };

        let json = serde_json::to_string(&record).unwrap();
        let parsed: ExecutionRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.outcome, Some(StartOutcome::Started));
        assert_eq!(parsed.trigger, ExecutionTrigger::Scheduled);
    }
}
