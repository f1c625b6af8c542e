use crate::liveness::{LivenessProbe, ProcessTable};
use crate::order::sort_records;
use crate::record::{MagicPolicy, StatusRecord};
use crate::scanner::list_candidates;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CycleStats {
    pub candidates: usize,
    pub decode_failures: usize,
    pub invalid: usize,
    pub stale: usize,
    pub live: usize,
}

/// One polling cycle's sorted, filtered result. Immutable once published.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub sequence: u64,
    pub taken_at: DateTime<Utc>,
    pub records: Vec<StatusRecord>,
    pub stats: CycleStats,
}

impl Snapshot {
    pub fn empty() -> Self {
        Self {
            sequence: 0,
            taken_at: Utc::now(),
            records: Vec::new(),
            stats: CycleStats::default(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }
}

#[derive(Clone)]
pub struct SnapshotAggregator {
    probe: Arc<dyn LivenessProbe>,
    magic_policy: MagicPolicy,
}

impl Default for SnapshotAggregator {
    fn default() -> Self {
        Self::new(MagicPolicy::default())
    }
}

impl SnapshotAggregator {
    pub fn new(magic_policy: MagicPolicy) -> Self {
        Self::with_probe(magic_policy, Arc::new(ProcessTable))
    }

    pub fn with_probe(magic_policy: MagicPolicy, probe: Arc<dyn LivenessProbe>) -> Self {
        Self {
            probe,
            magic_policy,
        }
    }

    pub fn magic_policy(&self) -> MagicPolicy {
        self.magic_policy
    }

    /// Scan, decode, validate, liveness-filter and sort. Per-file failures are
    /// counted and skipped; the cycle always produces a snapshot.
    pub fn run_cycle(&self, dir: &Path) -> Snapshot {
        let started = Instant::now();
        let candidates = list_candidates(dir);
        let mut stats = CycleStats {
            candidates: candidates.len(),
            ..CycleStats::default()
        };
        let mut records = Vec::with_capacity(candidates.len());

        for path in &candidates {
            let record = match StatusRecord::read_from(path) {
                Ok(record) => record,
                Err(err) => {
                    debug!(event = "dcc_record_decode_failed", error = %err);
                    stats.decode_failures += 1;
                    continue;
                }
            };
            if let Err(reason) = record.validate(self.magic_policy) {
                debug!(
                    event = "dcc_record_invalid",
                    path = %path.display(),
                    reason = %reason
                );
                stats.invalid += 1;
                continue;
            }
            if !self.probe.is_live(&record) {
                stats.stale += 1;
                continue;
            }
            records.push(record);
        }

        sort_records(&mut records);
        stats.live = records.len();
        debug!(
            event = "dcc_cycle_complete",
            candidates = stats.candidates,
            decode_failures = stats.decode_failures,
            invalid = stats.invalid,
            stale = stats.stale,
            live = stats.live,
            elapsed_ms = started.elapsed().as_millis() as u64
        );

        Snapshot {
            sequence: 0,
            taken_at: Utc::now(),
            records,
            stats,
        }
    }
}
