//! Operator-facing progress notices.
//!
//! Notices are the console lines an operator sees while an automatic purge
//! runs. They are separate from diagnostic logging: the purge worker emits
//! both a [`Notice`] (what happened, in plain words) and structured `tracing`
//! events (what happened, with fields).

use std::fmt;

/// A single progress notice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// Retention is configured below the automatic-purge minimum.
    AutoPurgeMinimum,
    /// Another maintenance operation was running at start.
    AutoPurgeSkipped,
    /// The run has started; `retention` is the formatted window being kept.
    AutoPurgeStarted { retention: String },
    /// The consumer never reached a safe point and the run was abandoned.
    ConsumerBusy,
    /// No database connection could be obtained.
    DatabaseBusy,
    /// A table is about to be processed.
    PurgeProcessing { table: String },
    /// Rows were removed from the table last announced.
    PurgeRows { rows: u64 },
    /// Dry run: rows that would have been removed.
    PurgeDryRunRows { rows: u64 },
    /// A single table could not be purged.
    PurgeError { table: String },
    /// Enough data was removed to warrant compaction.
    PurgeOptimizing,
    /// The run finished; `total` rows were removed.
    AutoPurgeSuccess { total: u64 },
    /// The run aborted on an unexpected failure.
    PurgeFailed,
}

impl Notice {
    /// Whether this notice reports a problem rather than progress.
    pub fn is_problem(&self) -> bool {
        matches!(
            self,
            Notice::ConsumerBusy | Notice::DatabaseBusy | Notice::PurgeError { .. } | Notice::PurgeFailed
        )
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::AutoPurgeMinimum => {
                f.write_str("Auto-purge requires a retention period of at least 24 hours.")
            }
            Notice::AutoPurgeSkipped => f.write_str(
                "Auto-purge skipped: another maintenance operation is already in progress.",
            ),
            Notice::AutoPurgeStarted { retention } => {
                write!(f, "Auto-purge started. Removing data older than {retention}.")
            }
            Notice::ConsumerBusy => {
                f.write_str("Auto-purge cancelled: the consumer did not pause in time.")
            }
            Notice::DatabaseBusy => f.write_str("Database busy. Please try again later."),
            Notice::PurgeProcessing { table } => write!(f, "Processing {table} data..."),
            Notice::PurgeRows { rows } => write!(f, "{} rows of data deleted.", format_count(*rows)),
            Notice::PurgeDryRunRows { rows } => {
                write!(f, "{} rows of data would be deleted (dry run).", format_count(*rows))
            }
            Notice::PurgeError { table } => write!(f, "Unable to purge {table} data."),
            Notice::PurgeOptimizing => f.write_str("Optimizing database. Please wait..."),
            Notice::AutoPurgeSuccess { total } => write!(
                f,
                "Auto-purge complete. {} rows of data removed.",
                format_count(*total)
            ),
            Notice::PurgeFailed => f.write_str("Purge failed. Please try again later."),
        }
    }
}

/// Destination for progress notices.
pub trait NoticeSink: Send + Sync {
    fn notice(&self, notice: &Notice);
}

/// Writes notices to the log under the `autopurge::notice` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotices;

impl NoticeSink for TracingNotices {
    fn notice(&self, notice: &Notice) {
        if notice.is_problem() {
            tracing::warn!(target: "autopurge::notice", "{notice}");
        } else {
            tracing::info!(target: "autopurge::notice", "{notice}");
        }
    }
}

/// Format a count with `,` thousands separators (`1234567` -> `"1,234,567"`).
pub fn format_count(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Collects notices in memory so tests can assert on what an operator saw.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct RecordingNotices {
    seen: std::sync::Mutex<Vec<Notice>>,
}

#[cfg(test)]
impl RecordingNotices {
    pub(crate) fn notices(&self) -> Vec<Notice> {
        self.seen.lock().unwrap().clone()
    }

    pub(crate) fn contains(&self, notice: &Notice) -> bool {
        self.seen.lock().unwrap().contains(notice)
    }
}

#[cfg(test)]
impl NoticeSink for RecordingNotices {
    fn notice(&self, notice: &Notice) {
        self.seen.lock().unwrap().push(notice.clone());
    }
}
