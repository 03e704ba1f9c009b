//! Shared daemon state and on-disk config/state files.

use std::fs;
use std::path::PathBuf;
use std::sync::{Mutex, RwLock};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::StartError;
use crate::types::{Config, ExecutionRecord, ExecutionTrigger};

/// Maximum number of execution records to keep
const MAX_HISTORY_SIZE: usize = 100;

/// State shared between the scheduler and the executor
pub struct AppState {
    pub config: RwLock<Option<Config>>,
    pub execution_history: Mutex<Vec<ExecutionRecord>>,
    pub last_scheduled_run: Mutex<Option<DateTime<Utc>>>,
}

impl AppState {
    pub fn new() -> Self {
        let config = load_config().ok();
        let history = load_execution_history().unwrap_or_default();

        Self {
            config: RwLock::new(config),
            execution_history: Mutex::new(history),
            last_scheduled_run: Mutex::new(None),
        }
    }

    /// Build state around an already-loaded config (one-shot runs, tests).
    pub fn with_config(config: Config) -> Self {
        let history = load_execution_history().unwrap_or_default();

        Self {
            config: RwLock::new(Some(config)),
            execution_history: Mutex::new(history),
            last_scheduled_run: Mutex::new(None),
        }
    }

    /// Add an execution record to history, most recent first
    pub fn add_execution_record(&self, record: ExecutionRecord) {
        if let Ok(mut guard) = self.execution_history.lock() {
            guard.insert(0, record);

            if guard.len() > MAX_HISTORY_SIZE {
                guard.truncate(MAX_HISTORY_SIZE);
            }
        }

        // Persist to disk (fire and forget)
        if let Err(e) = self.save_execution_history() {
            log::warn!("Failed to persist execution history: {}", e);
        }
    }

    /// Update an existing execution record
    pub fn update_execution_record(&self, id: &str, f: impl FnOnce(&mut ExecutionRecord)) {
        if let Ok(mut guard) = self.execution_history.lock() {
            if let Some(record) = guard.iter_mut().find(|r| r.id == id) {
                f(record);
            }
        }

        if let Err(e) = self.save_execution_history() {
            log::warn!("Failed to persist execution history: {}", e);
        }
    }

    /// Get recent execution records
    pub fn get_execution_history(&self, limit: usize) -> Vec<ExecutionRecord> {
        self.execution_history
            .lock()
            .map(|guard| guard.iter().take(limit).cloned().collect())
            .unwrap_or_default()
    }

    /// Record when a scheduled run last fired
    pub fn set_last_scheduled_run(&self, time: DateTime<Utc>) {
        if let Ok(mut guard) = self.last_scheduled_run.lock() {
            *guard = Some(time);
        }
    }

    /// Get when the run last fired on schedule
    pub fn get_last_scheduled_run(&self) -> Option<DateTime<Utc>> {
        self.last_scheduled_run.lock().ok().and_then(|guard| *guard)
    }

    fn save_execution_history(&self) -> Result<(), StartError> {
        let history = self
            .execution_history
            .lock()
            .map_err(|_| StartError::Io("History lock poisoned".to_string()))?
            .clone();

        let path = state_dir()?.join("execution_history.json");
        let content = serde_json::to_string_pretty(&history)
            .map_err(|e| StartError::Io(format!("Serialize error: {}", e)))?;
        fs::write(&path, content)?;

        Ok(())
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

/// Create a fresh execution record for a triggered run
pub fn create_execution_record(trigger: ExecutionTrigger) -> ExecutionRecord {
    ExecutionRecord {
        id: Uuid::new_v4().to_string(),
        started_at: Utc::now(),
        finished_at: None,
        duration_secs: None,
        success: false,
        outcome: None,
        error_message: None,
        can_retry: None,
        trigger,
    }
}

/// Get the canonical config file path (~/.workstart/config.json)
pub fn config_path() -> Result<PathBuf, StartError> {
    let home = dirs::home_dir()
        .ok_or_else(|| StartError::Configuration("Could not find home directory".to_string()))?;
    Ok(home.join(".workstart").join("config.json"))
}

/// Load configuration from ~/.workstart/config.json.
///
/// A missing file yields the defaults (the API base URL then has to come
/// from somewhere before a run can talk to the provider, and client
/// construction says so).
pub fn load_config() -> Result<Config, StartError> {
    let path = config_path()?;

    if !path.exists() {
        return Ok(Config::default());
    }

    let content = fs::read_to_string(&path)?;
    serde_json::from_str(&content).map_err(|e| {
        StartError::Configuration(format!("Failed to parse {}: {}", path.display(), e))
    })
}

/// Expand a leading `~/` against the home directory.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

/// Get the state directory (~/.workstart/state), creating it if needed
fn state_dir() -> Result<PathBuf, StartError> {
    let home = dirs::home_dir()
        .ok_or_else(|| StartError::Configuration("Could not find home directory".to_string()))?;
    let dir = home.join(".workstart").join("state");

    if !dir.exists() {
        fs::create_dir_all(&dir)?;
    }

    Ok(dir)
}

/// Load execution history from disk
fn load_execution_history() -> Result<Vec<ExecutionRecord>, StartError> {
    let path = state_dir()?.join("execution_history.json");

    if !path.exists() {
        return Ok(Vec::new());
    }

    let content = fs::read_to_string(&path)?;
    serde_json::from_str(&content)
        .map_err(|e| StartError::Io(format!("Failed to parse history: {}", e)))
}
