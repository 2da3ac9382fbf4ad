//! Shared signalling between maintenance tasks and the ingestion consumer.
//!
//! Two small state objects are shared by `Arc` between independent tasks:
//!
//! - [`MaintenanceFlags`]: mutual exclusion between maintenance operations.
//!   The converter and migration flags belong to their own subsystems and are
//!   only read by the purge worker. `purge_running` is owned by the purge
//!   worker for the length of a run.
//! - [`ConsumerPauseState`]: the pause handshake with the ingestion consumer.
//!   The purge worker is the only writer of `is_paused`; the consumer is the
//!   only writer of `paused_success`.
//!
//! Every field has a single writer, so plain atomics suffice. The pause
//! handshake is a store-then-load on both sides and uses `SeqCst`.

use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

/// Process-wide maintenance flags.
#[derive(Debug, Default)]
pub struct MaintenanceFlags {
    converter_running: AtomicBool,
    migration_running: AtomicBool,
    purge_running: AtomicBool,
}

impl MaintenanceFlags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn converter_running(&self) -> bool {
        self.converter_running.load(Ordering::Acquire)
    }

    pub fn migration_running(&self) -> bool {
        self.migration_running.load(Ordering::Acquire)
    }

    pub fn purge_running(&self) -> bool {
        self.purge_running.load(Ordering::Acquire)
    }

    /// Set by the data converter while it rewrites stored rows.
    pub fn set_converter_running(&self, running: bool) {
        self.converter_running.store(running, Ordering::Release);
    }

    /// Set by the schema migration step while it runs.
    pub fn set_migration_running(&self, running: bool) {
        self.migration_running.store(running, Ordering::Release);
    }

    /// The first conflicting operation, if any maintenance is in progress.
    pub fn conflict(&self) -> Option<MaintenanceConflict> {
        if self.converter_running() {
            Some(MaintenanceConflict::Converter)
        } else if self.migration_running() {
            Some(MaintenanceConflict::Migration)
        } else if self.purge_running() {
            Some(MaintenanceConflict::Purge)
        } else {
            None
        }
    }

    /// Claim `purge_running` and open a purge window.
    ///
    /// Fails without touching any flag when another maintenance operation is
    /// in progress. On success both `purge_running` and the consumer's
    /// `is_paused` are cleared again when the returned window is dropped.
    pub(crate) fn begin_purge(
        self: &Arc<Self>,
        consumer: &Arc<ConsumerPauseState>,
    ) -> Result<PurgeWindow, MaintenanceConflict> {
        if let Some(conflict) = self.conflict() {
            return Err(conflict);
        }
        self.purge_running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| MaintenanceConflict::Purge)?;

        Ok(PurgeWindow {
            flags: Arc::clone(self),
            consumer: Arc::clone(consumer),
        })
    }
}

/// Which maintenance operation blocked a purge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaintenanceConflict {
    Converter,
    Migration,
    Purge,
}

impl fmt::Display for MaintenanceConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MaintenanceConflict::Converter => f.write_str("data conversion"),
            MaintenanceConflict::Migration => f.write_str("schema migration"),
            MaintenanceConflict::Purge => f.write_str("purge"),
        }
    }
}

/// Pause handshake flags shared with the ingestion consumer.
///
/// Each side stores its own flag and then loads the other's: the consumer
/// clears `paused_success` before checking `is_paused`, the purge sets
/// `is_paused` before re-checking `paused_success`. Sequentially consistent
/// ordering guarantees at least one side sees the other's store.
#[derive(Debug, Default)]
pub struct ConsumerPauseState {
    is_paused: AtomicBool,
    paused_success: AtomicBool,
}

impl ConsumerPauseState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a pause has been requested.
    pub fn is_paused(&self) -> bool {
        self.is_paused.load(Ordering::SeqCst)
    }

    /// Whether the consumer reports being at a safe point.
    pub fn paused_success(&self) -> bool {
        self.paused_success.load(Ordering::SeqCst)
    }

    /// Consumer side: report whether it is at a safe point (not mid-flush).
    pub fn acknowledge(&self, at_safe_point: bool) {
        self.paused_success.store(at_safe_point, Ordering::SeqCst);
    }

    pub(crate) fn request_pause(&self) {
        self.is_paused.store(true, Ordering::SeqCst);
    }

    fn release_pause(&self) {
        self.is_paused.store(false, Ordering::SeqCst);
    }
}

/// An open purge window. Dropping it restores the consumer and the flags.
///
/// Cleanup lives in `Drop` so it also runs when the purge task unwinds.
#[derive(Debug)]
pub(crate) struct PurgeWindow {
    flags: Arc<MaintenanceFlags>,
    consumer: Arc<ConsumerPauseState>,
}

impl PurgeWindow {
    /// Assert pause intent on the consumer for the rest of the window.
    pub(crate) fn pause_consumer(&self) {
        self.consumer.request_pause();
    }
}

impl Drop for PurgeWindow {
    fn drop(&mut self) {
        self.consumer.release_pause();
        self.flags.purge_running.store(false, Ordering::Release);
        tracing::debug!("Purge window closed, consumer resumed");
    }
}
