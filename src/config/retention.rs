//! Automatic purge configuration.
//!
//! # Example
//!
//! ```toml
//! [retention]
//! auto_purge = "30d"
//! table_prefix = "co_"
//! startup_delay_secs = 10
//! pause_timeout_action = "proceed"
//! compaction_threshold = 1000
//! batch_size = 10000
//! dry_run = false
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::retention::{RetentionDecision, parse_duration};

/// Automatic purge configuration.
///
/// When `auto_purge` resolves to at least 24 hours, one purge runs in the
/// background shortly after startup and removes activity rows older than
/// that window.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetentionConfig {
    /// Retention window as a duration expression (`"30d"`, `"1y6mo"`).
    /// Absent, empty or `"0"` disables the automatic purge.
    #[serde(default)]
    pub auto_purge: Option<String>,

    /// Prefix prepended to every activity table name.
    /// Default: "co_"
    #[serde(default = "default_table_prefix")]
    pub table_prefix: String,

    /// Delay before the purge starts, letting startup I/O settle.
    /// Default: 10
    #[serde(default = "default_startup_delay_secs")]
    pub startup_delay_secs: u64,

    /// How often the consumer's safe-point flag is polled.
    /// Default: 1
    #[serde(default = "default_pause_poll_interval_ms")]
    pub pause_poll_interval_ms: u64,

    /// Longest wait for the consumer to reach a safe point.
    /// Default: 30000 (30 seconds)
    #[serde(default = "default_pause_wait_timeout_ms")]
    pub pause_wait_timeout_ms: u64,

    /// What to do when the consumer never reaches a safe point.
    /// Default: proceed
    #[serde(default)]
    pub pause_timeout_action: PauseTimeoutAction,

    /// Connection attempts before giving up with "database busy".
    /// Default: 6
    #[serde(default = "default_connect_attempts")]
    pub connect_attempts: u32,

    /// Fixed sleep between connection attempts.
    /// Default: 1000
    #[serde(default = "default_connect_backoff_ms")]
    pub connect_backoff_ms: u64,

    /// Timeout for a single connection attempt.
    /// Default: 500
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Open a dedicated connection instead of borrowing one from the pool.
    /// Default: false
    #[serde(default)]
    pub exclusive_connection: bool,

    /// Rows removed above which the store is compacted. The comparison is
    /// strict: removing exactly this many rows does not compact.
    /// Default: 1000
    #[serde(default = "default_compaction_threshold")]
    pub compaction_threshold: u64,

    /// Rows per delete statement. Set to 0 for a single statement per table.
    /// Default: 10000
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,

    /// Count what would be removed without deleting or compacting.
    /// Default: false
    #[serde(default)]
    pub dry_run: bool,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            auto_purge: None,
            table_prefix: default_table_prefix(),
            startup_delay_secs: default_startup_delay_secs(),
            pause_poll_interval_ms: default_pause_poll_interval_ms(),
            pause_wait_timeout_ms: default_pause_wait_timeout_ms(),
            pause_timeout_action: PauseTimeoutAction::default(),
            connect_attempts: default_connect_attempts(),
            connect_backoff_ms: default_connect_backoff_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            exclusive_connection: false,
            compaction_threshold: default_compaction_threshold(),
            batch_size: default_batch_size(),
            dry_run: false,
        }
    }
}

fn default_table_prefix() -> String {
    "co_".to_string()
}

fn default_startup_delay_secs() -> u64 {
    10
}

fn default_pause_poll_interval_ms() -> u64 {
    1
}

fn default_pause_wait_timeout_ms() -> u64 {
    30_000
}

fn default_connect_attempts() -> u32 {
    6
}

fn default_connect_backoff_ms() -> u64 {
    1000
}

fn default_connect_timeout_ms() -> u64 {
    500
}

fn default_compaction_threshold() -> u64 {
    1000
}

fn default_batch_size() -> u32 {
    10_000
}

/// Behaviour when the pause handshake times out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PauseTimeoutAction {
    /// Pause the consumer anyway and purge.
    #[default]
    Proceed,
    /// Give up the run and report the consumer as busy.
    Abort,
}

impl RetentionConfig {
    /// Configured retention window in seconds (0 = disabled).
    pub fn retention_seconds(&self) -> u64 {
        parse_duration(self.auto_purge.as_deref())
    }

    pub fn decision(&self) -> RetentionDecision {
        RetentionDecision::evaluate(self.auto_purge.as_deref())
    }

    pub fn startup_delay(&self) -> Duration {
        Duration::from_secs(self.startup_delay_secs)
    }

    pub fn pause_poll_interval(&self) -> Duration {
        Duration::from_millis(self.pause_poll_interval_ms)
    }

    pub fn pause_wait_timeout(&self) -> Duration {
        Duration::from_millis(self.pause_wait_timeout_ms)
    }

    pub fn connect_backoff(&self) -> Duration {
        Duration::from_millis(self.connect_backoff_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self
            .table_prefix
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(ConfigError::Validation(format!(
                "retention.table_prefix may only contain letters, digits and '_', got {:?}",
                self.table_prefix
            )));
        }
        if self.connect_attempts == 0 {
            return Err(ConfigError::Validation(
                "retention.connect_attempts must be at least 1".into(),
            ));
        }
        if self.pause_poll_interval_ms == 0 {
            return Err(ConfigError::Validation(
                "retention.pause_poll_interval_ms must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
