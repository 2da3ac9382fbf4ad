use serde::{Deserialize, Serialize};

/// Ingestion consumer configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IngestConfig {
    /// Buffer configuration for batched writes.
    #[serde(default)]
    pub buffer: IngestBufferConfig,
}

/// Buffer configuration for batched activity writes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IngestBufferConfig {
    /// Maximum entries to buffer before flushing.
    #[serde(default = "default_buffer_size")]
    pub max_size: usize,

    /// Maximum time between flushes in milliseconds.
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,

    /// Maximum pending entries before new entries are dropped.
    /// Pending entries grow while a purge holds the consumer paused or the
    /// sink is failing. Set to 0 to disable (not recommended).
    /// Default: 10x max_size
    #[serde(default = "default_max_pending_entries")]
    pub max_pending_entries: usize,
}

impl Default for IngestBufferConfig {
    fn default() -> Self {
        Self {
            max_size: default_buffer_size(),
            flush_interval_ms: default_flush_interval_ms(),
            max_pending_entries: default_max_pending_entries(),
        }
    }
}

fn default_buffer_size() -> usize {
    1000
}

fn default_flush_interval_ms() -> u64 {
    1000 // 1 second
}

fn default_max_pending_entries() -> usize {
    10_000 // 10x default max_size
}
