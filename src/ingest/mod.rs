//! Reference ingestion consumer.
//!
//! Activity rows are buffered in memory and written in batches. The consumer
//! takes part in the purge pause handshake through [`ConsumerPauseState`]
//! (`crate::maintenance::ConsumerPauseState`).

mod buffer;
mod sink;

pub use buffer::{IngestBuffer, IngestBufferConfig};
pub use sink::{ActivitySink, ActivitySinkError, DatabaseSink};
