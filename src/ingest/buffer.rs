//! Batched activity ingestion that yields to the purge worker.
//!
//! Producers push records into a bounded, lock-free channel. A background
//! task drains it on an interval and writes each batch through an
//! [`ActivitySink`]. While a purge has the consumer paused the worker writes
//! nothing and advertises a safe point; pending records stay queued until the
//! pause is released.
//!
//! ## Handshake
//! - Idle between flushes: `paused_success = true`.
//! - Flushing: `paused_success = false` for the duration of the write.
//! - `is_paused` is only ever read here.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::Duration,
};

use crossbeam_channel::{Receiver, Sender, TryRecvError, TrySendError};

use super::sink::ActivitySink;
use crate::{maintenance::ConsumerPauseState, models::ActivityRecord, observability::metrics};

/// Configuration for the ingest buffer.
#[derive(Debug, Clone)]
pub struct IngestBufferConfig {
    /// Maximum number of records written per batch.
    /// Default: 1000
    pub max_size: usize,
    /// Time between flushes.
    /// Default: 1 second
    pub flush_interval: Duration,
    /// Maximum queued records before new ones are dropped.
    /// Default: 10,000 (10x max_size)
    pub max_pending_entries: usize,
}

impl Default for IngestBufferConfig {
    fn default() -> Self {
        Self {
            max_size: 1000,
            flush_interval: Duration::from_secs(1),
            max_pending_entries: 10_000,
        }
    }
}

impl From<&crate::config::IngestBufferConfig> for IngestBufferConfig {
    fn from(config: &crate::config::IngestBufferConfig) -> Self {
        Self {
            max_size: config.max_size,
            flush_interval: Duration::from_millis(config.flush_interval_ms),
            max_pending_entries: config.max_pending_entries,
        }
    }
}

/// Async buffer for activity records.
///
/// Uses a lock-free MPSC channel for pushes. If the channel is full
/// (`max_pending_entries`), new records are dropped to bound memory while a
/// purge holds the consumer paused or the sink is failing.
pub struct IngestBuffer {
    sender: Sender<ActivityRecord>,
    receiver: Receiver<ActivityRecord>,
    config: IngestBufferConfig,
    pause: Arc<ConsumerPauseState>,
    shutdown: AtomicBool,
    dropped_count: AtomicU64,
}

impl IngestBuffer {
    pub fn new(config: IngestBufferConfig, pause: Arc<ConsumerPauseState>) -> Self {
        let capacity = if config.max_pending_entries > 0 {
            config.max_pending_entries
        } else {
            1_000_000
        };
        let (sender, receiver) = crossbeam_channel::bounded(capacity);

        Self {
            sender,
            receiver,
            config,
            pause,
            shutdown: AtomicBool::new(false),
            dropped_count: AtomicU64::new(0),
        }
    }

    /// Queue a record for the next flush. Never blocks.
    pub fn push(&self, record: ActivityRecord) {
        match self.sender.try_send(record) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                metrics::record_ingest_entries("dropped", 1);
                let count = self.dropped_count.fetch_add(1, Ordering::Relaxed);
                // Every 100 drops
                if count.is_multiple_of(100) {
                    tracing::warn!(
                        dropped_count = count + 1,
                        max_pending = self.config.max_pending_entries,
                        paused = self.pause.is_paused(),
                        "Ingest buffer overflow: dropping activity records"
                    );
                }
            }
            Err(TrySendError::Disconnected(_)) => {}
        }
    }

    /// Records dropped because the buffer was full.
    pub fn dropped_count(&self) -> u64 {
        self.dropped_count.load(Ordering::Relaxed)
    }

    /// Start the background flush worker. Runs until [`shutdown`](Self::shutdown).
    pub fn start_worker(
        self: &Arc<Self>,
        sink: Arc<dyn ActivitySink>,
    ) -> tokio::task::JoinHandle<()> {
        let buffer = Arc::clone(self);
        let flush_interval = self.config.flush_interval;
        let max_batch_size = self.config.max_size;

        tokio::spawn(async move {
            let mut batch = Vec::with_capacity(max_batch_size);
            buffer.pause.acknowledge(true);

            loop {
                buffer.flush_unless_paused(&sink, &mut batch, max_batch_size).await;

                if buffer.shutdown.load(Ordering::Acquire) {
                    buffer.final_flush(&sink, &mut batch).await;
                    tracing::info!("Ingest buffer worker shutting down");
                    break;
                }

                tokio::time::sleep(flush_interval).await;
            }
        })
    }

    async fn flush_unless_paused(
        &self,
        sink: &Arc<dyn ActivitySink>,
        batch: &mut Vec<ActivityRecord>,
        max_batch_size: usize,
    ) {
        if self.receiver.is_empty() {
            return;
        }

        // Leave the safe point before reading the pause request.
        self.pause.acknowledge(false);
        if self.pause.is_paused() {
            tracing::trace!(pending = self.receiver.len(), "Consumer paused, holding records");
            self.pause.acknowledge(true);
            return;
        }

        self.drain_entries(batch, max_batch_size);
        if !batch.is_empty() {
            self.flush_batch(sink, batch).await;
        }
        self.pause.acknowledge(true);
    }

    async fn final_flush(&self, sink: &Arc<dyn ActivitySink>, batch: &mut Vec<ActivityRecord>) {
        self.drain_all(batch);
        if batch.is_empty() {
            return;
        }

        if self.pause.is_paused() {
            tracing::warn!(
                count = batch.len(),
                "Shutting down during a purge, discarding pending activity records"
            );
            metrics::record_ingest_entries("dropped", batch.len() as u64);
            batch.clear();
            return;
        }

        self.pause.acknowledge(false);
        self.flush_batch(sink, batch).await;
        self.pause.acknowledge(true);
    }

    fn drain_entries(&self, batch: &mut Vec<ActivityRecord>, max_size: usize) {
        while batch.len() < max_size {
            match self.receiver.try_recv() {
                Ok(record) => batch.push(record),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
    }

    fn drain_all(&self, batch: &mut Vec<ActivityRecord>) {
        while let Ok(record) = self.receiver.try_recv() {
            batch.push(record);
        }
    }

    /// Signal the worker to flush what is queued and exit.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
    }

    async fn flush_batch(&self, sink: &Arc<dyn ActivitySink>, batch: &mut Vec<ActivityRecord>) {
        let count = batch.len();
        tracing::debug!(count, sink = sink.name(), "Flushing ingest buffer");

        match sink.write_batch(batch).await {
            Ok(written) => {
                tracing::debug!(written, total = count, "Ingest flush successful");
            }
            Err(e) => {
                tracing::error!(error = %e, count, sink = sink.name(), "Ingest flush failed");
            }
        }

        batch.clear();
    }

    /// Records waiting to be flushed.
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::{
        ingest::sink::ActivitySinkError, maintenance::MaintenanceFlags, models::ActivityTable,
    };

    fn make_record() -> ActivityRecord {
        ActivityRecord {
            table: ActivityTable::Block,
            time: 1_700_000_000,
            actor: "alex".into(),
            detail: None,
        }
    }

    /// Remembers every batch and the consumer's advertised state while writing.
    struct RecordingSink {
        pause: Arc<ConsumerPauseState>,
        written: Mutex<Vec<ActivityRecord>>,
        safe_point_during_write: Mutex<Vec<bool>>,
    }

    impl RecordingSink {
        fn new(pause: &Arc<ConsumerPauseState>) -> Arc<Self> {
            Arc::new(Self {
                pause: Arc::clone(pause),
                written: Mutex::new(Vec::new()),
                safe_point_during_write: Mutex::new(Vec::new()),
            })
        }

        fn written(&self) -> usize {
            self.written.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ActivitySink for RecordingSink {
        async fn write_batch(
            &self,
            records: &[ActivityRecord],
        ) -> Result<usize, ActivitySinkError> {
            self.safe_point_during_write
                .lock()
                .unwrap()
                .push(self.pause.paused_success());
            self.written.lock().unwrap().extend_from_slice(records);
            Ok(records.len())
        }

        fn name(&self) -> &'static str {
            "recording"
        }
    }

    fn buffer(config: IngestBufferConfig) -> (Arc<IngestBuffer>, Arc<ConsumerPauseState>) {
        let pause = Arc::new(ConsumerPauseState::new());
        (Arc::new(IngestBuffer::new(config, Arc::clone(&pause))), pause)
    }

    #[test]
    fn test_buffer_config_defaults() {
        let config = IngestBufferConfig::default();
        assert_eq!(config.max_size, 1000);
        assert_eq!(config.flush_interval, Duration::from_secs(1));
        assert_eq!(config.max_pending_entries, 10_000);
    }

    #[test]
    fn test_buffer_push_and_len() {
        let (buffer, _) = buffer(IngestBufferConfig::default());

        assert!(buffer.is_empty());
        buffer.push(make_record());
        buffer.push(make_record());
        assert_eq!(buffer.len(), 2);
    }

    #[test]
    fn test_buffer_overflow_drops_new_entries() {
        let (buffer, _) = buffer(IngestBufferConfig {
            max_size: 10,
            flush_interval: Duration::from_secs(60),
            max_pending_entries: 5,
        });

        for _ in 0..5 {
            buffer.push(make_record());
        }
        assert_eq!(buffer.dropped_count(), 0);

        for _ in 0..4 {
            buffer.push(make_record());
        }
        assert_eq!(buffer.len(), 5);
        assert_eq!(buffer.dropped_count(), 4);
    }

    #[test]
    fn test_drain_entries_respects_batch_size() {
        let (buffer, _) = buffer(IngestBufferConfig {
            max_size: 10,
            flush_interval: Duration::from_secs(60),
            max_pending_entries: 100,
        });
        for _ in 0..15 {
            buffer.push(make_record());
        }

        let mut batch = Vec::new();
        buffer.drain_entries(&mut batch, 10);
        assert_eq!(batch.len(), 10);
        assert_eq!(buffer.len(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_worker_flushes_outside_safe_point() {
        let (buffer, pause) = buffer(IngestBufferConfig::default());
        let sink = RecordingSink::new(&pause);
        for _ in 0..3 {
            buffer.push(make_record());
        }

        let handle = buffer.start_worker(sink.clone());
        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert_eq!(sink.written(), 3);
        assert_eq!(*sink.safe_point_during_write.lock().unwrap(), vec![false]);
        // Back at a safe point between flushes.
        assert!(pause.paused_success());

        buffer.shutdown();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_worker_holds_records_while_paused() {
        let (buffer, pause) = buffer(IngestBufferConfig::default());
        let flags = Arc::new(MaintenanceFlags::new());
        let sink = RecordingSink::new(&pause);

        let window = flags.begin_purge(&pause).unwrap();
        window.pause_consumer();

        let handle = buffer.start_worker(sink.clone());
        for _ in 0..4 {
            buffer.push(make_record());
        }
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(sink.written(), 0);
        assert_eq!(buffer.len(), 4);
        assert!(pause.paused_success());

        drop(window);
        tokio::time::sleep(Duration::from_secs(2)).await;

        assert_eq!(sink.written(), 4);
        assert!(buffer.is_empty());

        buffer.shutdown();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_flushes_remaining() {
        let (buffer, pause) = buffer(IngestBufferConfig {
            max_size: 2,
            flush_interval: Duration::from_secs(60),
            max_pending_entries: 100,
        });
        let sink = RecordingSink::new(&pause);
        for _ in 0..5 {
            buffer.push(make_record());
        }

        // The first pass writes one batch, shutdown drains the rest.
        buffer.shutdown();
        buffer.start_worker(sink.clone()).await.unwrap();

        assert_eq!(sink.written(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_during_purge_discards_pending() {
        let (buffer, pause) = buffer(IngestBufferConfig::default());
        let flags = Arc::new(MaintenanceFlags::new());
        let sink = RecordingSink::new(&pause);

        let window = flags.begin_purge(&pause).unwrap();
        window.pause_consumer();
        buffer.push(make_record());

        buffer.shutdown();
        buffer.start_worker(sink.clone()).await.unwrap();

        assert_eq!(sink.written(), 0);
        assert!(buffer.is_empty());
        drop(window);
    }
}
