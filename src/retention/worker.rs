//! One-shot automatic purge of expired activity rows.
//!
//! A run waits out a startup delay, claims the purge slot in
//! [`MaintenanceFlags`], pauses the ingestion consumer at a safe point, then
//! removes rows older than the retention window from every activity table in
//! a fixed order. A failure on one table never stops the others. When enough
//! rows were removed an embedded store is compacted afterwards.

use std::{any::Any, panic::AssertUnwindSafe, sync::Arc, time::Duration};

use chrono::Utc;
use futures::FutureExt;
use tokio::{task::JoinHandle, time::Instant};

use super::{duration::format_duration, policy::RetentionDecision};
use crate::{
    config::{PauseTimeoutAction, RetentionConfig, StorageEngine},
    db::{ConnectionProvider, DbResult, PurgeConnection},
    maintenance::{ConsumerPauseState, MaintenanceFlags, PurgeWindow},
    models::ActivityTable,
    notice::{Notice, NoticeSink},
    observability::metrics,
};

/// How a purge run ended.
#[derive(Debug)]
pub enum PurgeOutcome {
    /// Another maintenance operation was running; nothing was touched.
    Skipped,
    /// Every connection attempt failed.
    StoreBusy,
    /// The consumer never reached a safe point and the run was abandoned.
    ConsumerBusy,
    /// The table loop ran to the end. Individual tables may still have failed.
    Completed(PurgeRun),
    /// The run aborted unexpectedly.
    Failed(String),
}

impl PurgeOutcome {
    /// Short label used for metrics and logs.
    pub fn label(&self) -> &'static str {
        match self {
            PurgeOutcome::Skipped => "skipped",
            PurgeOutcome::StoreBusy => "store_busy",
            PurgeOutcome::ConsumerBusy => "consumer_busy",
            PurgeOutcome::Completed(_) => "completed",
            PurgeOutcome::Failed(_) => "failed",
        }
    }
}

/// Results from a completed purge run.
#[derive(Debug, Clone)]
pub struct PurgeRun {
    /// Unix seconds; rows with `time` strictly below this were eligible.
    pub cutoff: i64,
    /// One entry per table, in purge order.
    pub tables: Vec<TableReport>,
    /// Rows removed across all tables.
    pub total_removed: u64,
    /// Whether compaction was issued.
    pub compaction_attempted: bool,
    pub dry_run: bool,
}

impl PurgeRun {
    fn new(cutoff: i64, dry_run: bool) -> Self {
        Self {
            cutoff,
            tables: Vec::with_capacity(ActivityTable::ALL.len()),
            total_removed: 0,
            compaction_attempted: false,
            dry_run,
        }
    }

    fn record(&mut self, table: ActivityTable, outcome: TableOutcome) {
        match &outcome {
            TableOutcome::Purged(removed) | TableOutcome::Failed { removed, .. } => {
                self.total_removed += *removed;
            }
            TableOutcome::Counted(_) => {}
        }
        self.tables.push(TableReport { table, outcome });
    }

    /// Outcome for one table, if it was visited.
    pub fn outcome(&self, table: ActivityTable) -> Option<&TableOutcome> {
        self.tables
            .iter()
            .find(|report| report.table == table)
            .map(|report| &report.outcome)
    }

    /// Tables whose purge failed.
    pub fn failed_tables(&self) -> impl Iterator<Item = ActivityTable> + '_ {
        self.tables
            .iter()
            .filter(|report| matches!(report.outcome, TableOutcome::Failed { .. }))
            .map(|report| report.table)
    }
}

#[derive(Debug, Clone)]
pub struct TableReport {
    pub table: ActivityTable,
    pub outcome: TableOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableOutcome {
    /// Rows removed.
    Purged(u64),
    /// Dry run: rows that would have been removed.
    Counted(u64),
    /// The table could not be purged. `removed` counts batches that
    /// committed before the failure.
    Failed { removed: u64, reason: String },
}

/// Runs a single automatic purge against one store.
pub struct PurgeCoordinator {
    config: RetentionConfig,
    engine: StorageEngine,
    provider: Arc<dyn ConnectionProvider>,
    flags: Arc<MaintenanceFlags>,
    consumer: Arc<ConsumerPauseState>,
    notices: Arc<dyn NoticeSink>,
}

impl PurgeCoordinator {
    pub fn new(
        config: RetentionConfig,
        engine: StorageEngine,
        provider: Arc<dyn ConnectionProvider>,
        flags: Arc<MaintenanceFlags>,
        consumer: Arc<ConsumerPauseState>,
        notices: Arc<dyn NoticeSink>,
    ) -> Self {
        Self {
            config,
            engine,
            provider,
            flags,
            consumer,
            notices,
        }
    }

    /// Run one purge removing rows older than `retention_secs`.
    ///
    /// Never fails: every way a run can end is a [`PurgeOutcome`]. Once the
    /// purge slot is claimed, `purge_running` and the consumer's pause are
    /// released on every path, including a panic inside the run.
    pub async fn run(&self, retention_secs: u64) -> PurgeOutcome {
        tokio::time::sleep(self.config.startup_delay()).await;
        let started = Instant::now();

        let window = match self.flags.begin_purge(&self.consumer) {
            Ok(window) => window,
            Err(conflict) => {
                tracing::info!(%conflict, "Auto-purge skipped, maintenance already in progress");
                self.notices.notice(&Notice::AutoPurgeSkipped);
                metrics::record_purge_run("skipped", 0.0);
                return PurgeOutcome::Skipped;
            }
        };

        let outcome = match AssertUnwindSafe(self.purge(&window, retention_secs))
            .catch_unwind()
            .await
        {
            Ok(outcome) => outcome,
            Err(panic) => {
                let reason = panic_message(&*panic);
                tracing::error!(reason = %reason, "Auto-purge aborted");
                self.notices.notice(&Notice::PurgeFailed);
                PurgeOutcome::Failed(reason)
            }
        };

        drop(window);

        metrics::record_purge_run(outcome.label(), started.elapsed().as_secs_f64());
        outcome
    }

    async fn purge(&self, window: &PurgeWindow, retention_secs: u64) -> PurgeOutcome {
        let retention = i64::try_from(retention_secs).unwrap_or(i64::MAX);
        let cutoff = Utc::now().timestamp().saturating_sub(retention);
        let dry_run = self.config.dry_run;

        self.notices.notice(&Notice::AutoPurgeStarted {
            retention: format_duration(retention_secs),
        });

        let at_safe_point = self.await_consumer_safe_point().await;
        if !at_safe_point && let Some(outcome) = self.consumer_timed_out() {
            return outcome;
        }
        window.pause_consumer();
        // A flush that began before the pause became visible still has to finish.
        if at_safe_point
            && !self.await_consumer_safe_point().await
            && let Some(outcome) = self.consumer_timed_out()
        {
            return outcome;
        }

        let Some(mut conn) = self.connect().await else {
            self.notices.notice(&Notice::DatabaseBusy);
            return PurgeOutcome::StoreBusy;
        };

        let mut run = PurgeRun::new(cutoff, dry_run);
        for table in ActivityTable::ALL {
            let outcome = self.purge_table(conn.as_mut(), table, cutoff).await;
            run.record(table, outcome);
        }

        if run.total_removed > self.config.compaction_threshold {
            self.notices.notice(&Notice::PurgeOptimizing);

            if self.engine.supports_compaction() {
                run.compaction_attempted = true;
                if let Err(e) = conn.compact().await {
                    tracing::debug!(error = %e, "Compaction failed, ignoring");
                }
            }
        }

        drop(conn);

        self.notices.notice(&Notice::AutoPurgeSuccess {
            total: run.total_removed,
        });
        tracing::info!(
            cutoff,
            total_removed = run.total_removed,
            failed_tables = run.failed_tables().count(),
            compacted = run.compaction_attempted,
            dry_run,
            "Auto-purge complete{}",
            if dry_run { " (DRY RUN)" } else { "" }
        );

        PurgeOutcome::Completed(run)
    }

    /// Apply the configured timeout action. `Some` ends the run.
    fn consumer_timed_out(&self) -> Option<PurgeOutcome> {
        match self.config.pause_timeout_action {
            PauseTimeoutAction::Proceed => {
                tracing::warn!(
                    timeout_ms = self.config.pause_wait_timeout_ms,
                    "Consumer did not reach a safe point, pausing it anyway"
                );
                None
            }
            PauseTimeoutAction::Abort => {
                tracing::warn!(
                    timeout_ms = self.config.pause_wait_timeout_ms,
                    "Consumer did not reach a safe point, abandoning auto-purge"
                );
                self.notices.notice(&Notice::ConsumerBusy);
                Some(PurgeOutcome::ConsumerBusy)
            }
        }
    }

    /// Poll until the consumer reports a safe point. Returns `false` if the
    /// wait timed out.
    async fn await_consumer_safe_point(&self) -> bool {
        let poll_interval = self.config.pause_poll_interval();
        let consumer = &self.consumer;

        tokio::time::timeout(self.config.pause_wait_timeout(), async {
            while !consumer.paused_success() {
                tokio::time::sleep(poll_interval).await;
            }
        })
        .await
        .is_ok()
    }

    /// Acquire the run's connection with bounded retries.
    async fn connect(&self) -> Option<Box<dyn PurgeConnection>> {
        let attempts = self.config.connect_attempts.max(1);
        let timeout = self.config.connect_timeout();

        for attempt in 1..=attempts {
            let result = tokio::time::timeout(
                timeout,
                self.provider
                    .acquire(self.config.exclusive_connection, timeout),
            )
            .await;

            match result {
                Ok(Ok(conn)) => return Some(conn),
                Ok(Err(e)) => {
                    tracing::debug!(attempt, attempts, error = %e, "Purge connection attempt failed");
                }
                Err(_) => {
                    tracing::debug!(attempt, attempts, "Purge connection attempt timed out");
                }
            }

            if attempt < attempts {
                tokio::time::sleep(self.config.connect_backoff()).await;
            }
        }

        tracing::warn!(attempts, "No database connection available for auto-purge");
        None
    }

    async fn purge_table(
        &self,
        conn: &mut dyn PurgeConnection,
        table: ActivityTable,
        cutoff: i64,
    ) -> TableOutcome {
        self.notices.notice(&Notice::PurgeProcessing {
            table: table.display_name(),
        });

        let name = table.qualified_name(&self.config.table_prefix);

        match self.remove_expired(conn, table, &name, cutoff).await {
            Ok(outcome) => {
                tracing::debug!(table = %name, ?outcome, "Table purged");
                outcome
            }
            Err(e) => {
                let removed = e.rows_removed();
                tracing::error!(table = %name, removed, error = %e, "Error purging table");
                metrics::record_purge_table_error(table.name());
                if removed > 0 {
                    metrics::record_purge_deletion(table.name(), removed);
                    self.notices.notice(&Notice::PurgeRows { rows: removed });
                }
                self.notices.notice(&Notice::PurgeError {
                    table: table.name().to_string(),
                });
                TableOutcome::Failed {
                    removed,
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Count, then delete, the rows in one table below `cutoff`.
    async fn remove_expired(
        &self,
        conn: &mut dyn PurgeConnection,
        table: ActivityTable,
        name: &str,
        cutoff: i64,
    ) -> DbResult<TableOutcome> {
        let eligible = conn.count_before(name, cutoff).await?;
        if eligible == 0 {
            return Ok(TableOutcome::Purged(0));
        }

        if self.config.dry_run {
            self.notices
                .notice(&Notice::PurgeDryRunRows { rows: eligible });
            return Ok(TableOutcome::Counted(eligible));
        }

        let deleted = conn
            .delete_before(name, cutoff, self.config.batch_size)
            .await?;
        if deleted != eligible {
            tracing::debug!(table = %name, eligible, deleted, "Row count changed during purge");
        }

        metrics::record_purge_deletion(table.name(), eligible);
        self.notices.notice(&Notice::PurgeRows { rows: eligible });
        Ok(TableOutcome::Purged(eligible))
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Start the automatic purge if the configured retention allows it.
///
/// Returns immediately. A disabled retention does nothing; one below
/// [`MIN_AUTO_PURGE_SECS`](super::MIN_AUTO_PURGE_SECS) only emits a notice.
/// Otherwise the run is spawned once on the current runtime and its handle
/// returned.
pub fn start_auto_purge(coordinator: PurgeCoordinator) -> Option<JoinHandle<PurgeOutcome>> {
    match coordinator.config.decision() {
        RetentionDecision::Disabled => {
            tracing::debug!("Auto-purge disabled by configuration");
            None
        }
        RetentionDecision::TooShort => {
            coordinator.notices.notice(&Notice::AutoPurgeMinimum);
            None
        }
        RetentionDecision::Eligible(retention_secs) => {
            tracing::info!(
                retention = %format_duration(retention_secs),
                retention_secs,
                startup_delay_secs = coordinator.config.startup_delay_secs,
                engine = %coordinator.engine,
                dry_run = coordinator.config.dry_run,
                "Scheduling auto-purge{}",
                if coordinator.config.dry_run { " (DRY RUN)" } else { "" }
            );
            Some(tokio::spawn(async move {
                coordinator.run(retention_secs).await
            }))
        }
    }
}

/// Wait for a spawned run to finish.
///
/// Once `shutdown` resolves the run gets `grace` to complete before it is
/// aborted. Returns `None` if the run was abandoned or its task failed.
pub async fn join_auto_purge(
    mut handle: JoinHandle<PurgeOutcome>,
    shutdown: impl Future<Output = ()>,
    grace: Duration,
) -> Option<PurgeOutcome> {
    let joined = tokio::select! {
        joined = &mut handle => joined,
        _ = shutdown => {
            tracing::info!(grace_secs = grace.as_secs(), "Shutdown requested, waiting for auto-purge");
            match tokio::time::timeout(grace, &mut handle).await {
                Ok(joined) => joined,
                Err(_) => {
                    tracing::warn!("Auto-purge did not finish in time, abandoning it");
                    handle.abort();
                    // The abort drops the run, which closes its purge window.
                    let _ = handle.await;
                    return None;
                }
            }
        }
    };

    match joined {
        Ok(outcome) => Some(outcome),
        Err(e) => {
            tracing::error!(error = %e, "Auto-purge task failed");
            None
        }
    }
}
