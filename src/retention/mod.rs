//! Data retention: duration expressions, the retention policy, and the
//! one-shot automatic purge.
//!
//! A purge removes rows whose `time` is older than the retention window from
//! every activity table. It runs once, shortly after startup, and refuses to
//! start while a schema change or data conversion is running. Before deleting
//! it waits for the ingestion consumer to reach a safe point, publishes the
//! pause, then waits again for any flush that started before the pause became
//! visible. If the consumer misses the deadline, `pause_timeout_action`
//! decides whether the purge proceeds anyway or gives up.

mod duration;
mod policy;
mod worker;

pub use duration::{format_duration, parse_duration};
pub use policy::{MIN_AUTO_PURGE_SECS, RetentionDecision};
pub use worker::{
    PurgeCoordinator, PurgeOutcome, PurgeRun, TableOutcome, TableReport, join_auto_purge,
    start_auto_purge,
};
