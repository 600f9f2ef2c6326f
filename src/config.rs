use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::EngineError;

/// Generation attempts a task may consume before it is left failed for good.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Worker backoff between queue polls when no pending work exists.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;

/// Tunables for the illustration coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Total generation attempts budgeted per task, initial run included.
    pub max_attempts: u32,

    /// Whether a manual retry zeroes the attempt counter instead of resuming
    /// against whatever budget the task has left.
    pub reset_attempts_on_manual_retry: bool,

    /// Idle sleep between queue polls, in milliseconds.
    pub poll_interval_ms: u64,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            reset_attempts_on_manual_retry: false,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl CoordinatorConfig {
    /// Load configuration from a JSON file. A missing file yields defaults;
    /// a present but malformed file is an error rather than a silent reset.
    pub fn load(path: &Path) -> Result<Self, EngineError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&raw)?;
        Ok(config)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CoordinatorConfig::default();
        assert_eq!(config.max_attempts, 3);
        assert!(!config.reset_attempts_on_manual_retry);
        assert_eq!(config.poll_interval(), Duration::from_millis(500));
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: CoordinatorConfig = serde_json::from_str(r#"{"max_attempts": 5}"#).unwrap();
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.poll_interval_ms, DEFAULT_POLL_INTERVAL_MS);
        assert!(!config.reset_attempts_on_manual_retry);
    }

    #[test]
    fn test_load_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = CoordinatorConfig::load(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config, CoordinatorConfig::default());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("coordinator.json");
        std::fs::write(
            &path,
            r#"{"max_attempts": 2, "reset_attempts_on_manual_retry": true, "poll_interval_ms": 50}"#,
        )
        .unwrap();

        let config = CoordinatorConfig::load(&path).unwrap();
        assert_eq!(config.max_attempts, 2);
        assert!(config.reset_attempts_on_manual_retry);
        assert_eq!(config.poll_interval(), Duration::from_millis(50));
    }

    #[test]
    fn test_load_malformed_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("coordinator.json");
        std::fs::write(&path, "not json").unwrap();

        let err = CoordinatorConfig::load(&path).unwrap_err();
        assert_eq!(err.kind(), "serialization");
    }
}
