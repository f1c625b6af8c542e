//! Status-file polling core for a distcc compile-farm monitor.
//!
//! distcc writes one fixed-layout binary file per in-flight job under its
//! state directory. This crate decodes those files, drops records whose
//! originating process has exited, and keeps a sorted snapshot refreshed on a
//! background interval for a presentation layer to render.

pub mod config;
pub mod lifecycle;
pub mod liveness;
pub mod order;
pub mod record;
pub mod scanner;
pub mod scheduler;
pub mod snapshot;

pub use config::{ConfigError, MonitorConfig, PollTiming};
pub use lifecycle::{Activation, MonitorLifecycle};
pub use liveness::{LivenessProbe, ProcessTable};
pub use order::{compare_records, sort_records};
pub use record::{DecodeError, InvalidReason, MagicPolicy, Phase, StatusRecord};
pub use scanner::list_candidates;
pub use scheduler::{Scheduler, SchedulerError, SchedulerState, SnapshotPublisher};
pub use snapshot::{CycleStats, Snapshot, SnapshotAggregator};
