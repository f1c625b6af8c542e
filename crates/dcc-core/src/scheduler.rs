use crate::config::PollTiming;
use crate::snapshot::{Snapshot, SnapshotAggregator};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tokio::runtime::{Handle, TryCurrentError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{info, warn};

/// Receives each completed snapshot, in cycle order.
///
/// Called with the scheduler's publish lock held, so implementations must hand
/// off (channel send, watch update) rather than block.
pub trait SnapshotPublisher: Send + Sync {
    fn publish(&self, snapshot: Arc<Snapshot>);
}

impl<F> SnapshotPublisher for F
where
    F: Fn(Arc<Snapshot>) + Send + Sync,
{
    fn publish(&self, snapshot: Arc<Snapshot>) {
        self(snapshot)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Stopped,
    Running,
}

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("scheduler needs a tokio runtime: {0}")]
    NoRuntime(#[from] TryCurrentError),
}

struct PublishGate {
    active_run: Option<u64>,
    latest: Arc<Snapshot>,
}

struct Shared {
    gate: Mutex<PublishGate>,
    publisher: Arc<dyn SnapshotPublisher>,
}

impl Shared {
    fn gate(&self) -> MutexGuard<'_, PublishGate> {
        self.gate.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Publishes only while `run_id` is still the active run.
    fn publish(&self, run_id: u64, snapshot: Arc<Snapshot>) -> bool {
        let mut gate = self.gate();
        if gate.active_run != Some(run_id) {
            return false;
        }
        gate.latest = Arc::clone(&snapshot);
        self.publisher.publish(snapshot);
        true
    }
}

struct RunningPoll {
    run_id: u64,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Drives [`SnapshotAggregator`] on a fixed interval in the background.
pub struct Scheduler {
    aggregator: SnapshotAggregator,
    shared: Arc<Shared>,
    running: Option<RunningPoll>,
    next_run_id: u64,
}

impl Scheduler {
    pub fn new(aggregator: SnapshotAggregator, publisher: Arc<dyn SnapshotPublisher>) -> Self {
        Self {
            aggregator,
            shared: Arc::new(Shared {
                gate: Mutex::new(PublishGate {
                    active_run: None,
                    latest: Arc::new(Snapshot::empty()),
                }),
                publisher,
            }),
            running: None,
            next_run_id: 1,
        }
    }

    pub fn state(&self) -> SchedulerState {
        if self.running.is_some() {
            SchedulerState::Running
        } else {
            SchedulerState::Stopped
        }
    }

    /// Latest snapshot handed to the publisher, or an empty one before the first cycle.
    pub fn latest(&self) -> Arc<Snapshot> {
        Arc::clone(&self.shared.gate().latest)
    }

    /// `Stopped -> Running`. A no-op when already running.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(
        &mut self,
        timing: PollTiming,
        state_dir: impl Into<PathBuf>,
    ) -> Result<(), SchedulerError> {
        if self.running.is_some() {
            return Ok(());
        }
        let handle = Handle::try_current()?;
        // Struct literals bypass the floor applied by `PollTiming::new`.
        let timing = PollTiming::new(timing.interval, timing.initial_delay);
        let state_dir = state_dir.into();
        let run_id = self.next_run_id;
        self.next_run_id += 1;

        self.shared.gate().active_run = Some(run_id);
        let (shutdown, shutdown_rx) = watch::channel(false);
        info!(
            event = "dcc_scheduler_start",
            run_id,
            path = %state_dir.display(),
            interval_ms = timing.interval.as_millis() as u64,
            initial_delay_ms = timing.initial_delay.as_millis() as u64
        );
        let task = handle.spawn(poll_loop(
            Arc::clone(&self.shared),
            self.aggregator.clone(),
            state_dir,
            timing,
            run_id,
            shutdown_rx,
        ));
        self.running = Some(RunningPoll {
            run_id,
            shutdown,
            task,
        });
        Ok(())
    }

    /// `Running -> Stopped`. Once this returns no further snapshot is published;
    /// a cycle still in flight finishes on its blocking thread and is discarded.
    pub fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };
        {
            let mut gate = self.shared.gate();
            if gate.active_run == Some(running.run_id) {
                gate.active_run = None;
            }
        }
        let _ = running.shutdown.send(true);
        running.task.abort();
        info!(event = "dcc_scheduler_stop", run_id = running.run_id);
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn poll_loop(
    shared: Arc<Shared>,
    aggregator: SnapshotAggregator,
    state_dir: PathBuf,
    timing: PollTiming,
    run_id: u64,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker =
        tokio::time::interval_at(Instant::now() + timing.initial_delay, timing.interval);
    // An overrunning cycle delays the next one instead of queueing a burst.
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut sequence: u64 = 0;

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            _ = ticker.tick() => {
                let cycle_aggregator = aggregator.clone();
                let cycle_dir = state_dir.clone();
                let snapshot = match tokio::task::spawn_blocking(move || {
                    cycle_aggregator.run_cycle(&cycle_dir)
                })
                .await
                {
                    Ok(snapshot) => snapshot,
                    Err(err) => {
                        warn!(event = "dcc_cycle_failed", run_id, error = %err);
                        continue;
                    }
                };
                sequence += 1;
                let snapshot = Arc::new(Snapshot { sequence, ..snapshot });
                if !shared.publish(run_id, snapshot) {
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::liveness::LivenessProbe;
    use crate::record::{MagicPolicy, STATUS_RECORD_LEN};
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn write_record(dir: &Path, name: &str, pid: i64, slot: i32) {
        let mut out = Vec::with_capacity(STATUS_RECORD_LEN);
        out.extend_from_slice(&64i64.to_be_bytes());
        out.extend_from_slice(&1i64.to_be_bytes());
        out.extend_from_slice(&pid.to_be_bytes());
        let mut text = [0u8; 128];
        text[..6].copy_from_slice(b"main.c");
        out.extend_from_slice(&text);
        let mut text = [0u8; 128];
        text[..5].copy_from_slice(b"node1");
        out.extend_from_slice(&text);
        out.extend_from_slice(&slot.to_be_bytes());
        out.extend_from_slice(&5i32.to_be_bytes());
        std::fs::write(dir.join(name), out).expect("write record");
    }

    fn recorder() -> (Arc<Mutex<Vec<Arc<Snapshot>>>>, Arc<dyn SnapshotPublisher>) {
        let seen: Arc<Mutex<Vec<Arc<Snapshot>>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let publisher: Arc<dyn SnapshotPublisher> = Arc::new(move |snapshot: Arc<Snapshot>| {
            sink.lock().expect("seen lock").push(snapshot);
        });
        (seen, publisher)
    }

    fn fast() -> PollTiming {
        PollTiming::new(Duration::from_millis(50), Duration::ZERO)
    }

    async fn wait_until(mut check: impl FnMut() -> bool) {
        for _ in 0..200 {
            if check() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn publishes_in_cycle_order_until_stopped() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_record(dir.path(), "binstate_1", 7, 0);
        let (seen, publisher) = recorder();
        let probe: Arc<dyn LivenessProbe> = Arc::new(|_pid: i64| true);
        let mut scheduler = Scheduler::new(
            SnapshotAggregator::with_probe(MagicPolicy::Permissive, probe),
            publisher,
        );
        assert_eq!(scheduler.state(), SchedulerState::Stopped);

        scheduler.start(fast(), dir.path()).expect("start");
        assert_eq!(scheduler.state(), SchedulerState::Running);
        wait_until(|| seen.lock().expect("seen lock").len() >= 3).await;

        scheduler.stop();
        assert_eq!(scheduler.state(), SchedulerState::Stopped);
        let after_stop = seen.lock().expect("seen lock").len();
        tokio::time::sleep(Duration::from_millis(200)).await;
        let seen = seen.lock().expect("seen lock");
        assert_eq!(seen.len(), after_stop);

        let sequences: Vec<u64> = seen.iter().map(|snapshot| snapshot.sequence).collect();
        let expected: Vec<u64> = (1..=sequences.len() as u64).collect();
        assert_eq!(sequences, expected);
        assert_eq!(seen[0].len(), 1);
        assert_eq!(scheduler.latest().sequence, after_stop as u64);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn zero_interval_is_raised_to_the_floor() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (seen, publisher) = recorder();
        let mut scheduler = Scheduler::new(SnapshotAggregator::default(), publisher);
        let timing = PollTiming {
            interval: Duration::ZERO,
            initial_delay: Duration::ZERO,
        };

        scheduler.start(timing, dir.path()).expect("start");
        wait_until(|| seen.lock().expect("seen lock").len() >= 2).await;
        assert_eq!(scheduler.state(), SchedulerState::Running);
        let task_finished = scheduler
            .running
            .as_ref()
            .map(|running| running.task.is_finished());
        assert_eq!(task_finished, Some(false));
        scheduler.stop();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn first_cycle_fires_without_waiting_for_interval() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (seen, publisher) = recorder();
        let mut scheduler = Scheduler::new(SnapshotAggregator::default(), publisher);
        scheduler
            .start(PollTiming::new(Duration::from_secs(60), Duration::ZERO), dir.path())
            .expect("start");
        wait_until(|| !seen.lock().expect("seen lock").is_empty()).await;
        scheduler.stop();
        assert!(seen.lock().expect("seen lock")[0].is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn in_flight_cycle_is_discarded_after_stop() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_record(dir.path(), "binstate_1", 7, 0);
        let entered = Arc::new(AtomicUsize::new(0));
        let probe_entered = Arc::clone(&entered);
        let probe: Arc<dyn LivenessProbe> = Arc::new(move |_pid: i64| {
            probe_entered.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(300));
            true
        });
        let (seen, publisher) = recorder();
        let mut scheduler = Scheduler::new(
            SnapshotAggregator::with_probe(MagicPolicy::Permissive, probe),
            publisher,
        );

        scheduler.start(fast(), dir.path()).expect("start");
        wait_until(|| entered.load(Ordering::SeqCst) > 0).await;
        scheduler.stop();

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert!(seen.lock().expect("seen lock").is_empty());
        assert_eq!(scheduler.latest().sequence, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn overrunning_cycles_never_overlap() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_record(dir.path(), "binstate_1", 7, 0);
        write_record(dir.path(), "binstate_2", 8, 1);
        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_in_flight = Arc::new(AtomicUsize::new(0));
        let (probe_in_flight, probe_max) = (Arc::clone(&in_flight), Arc::clone(&max_in_flight));
        let probe: Arc<dyn LivenessProbe> = Arc::new(move |_pid: i64| {
            let now = probe_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            probe_max.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(80));
            probe_in_flight.fetch_sub(1, Ordering::SeqCst);
            true
        });
        let (seen, publisher) = recorder();
        let mut scheduler = Scheduler::new(
            SnapshotAggregator::with_probe(MagicPolicy::Permissive, probe),
            publisher,
        );

        scheduler.start(fast(), dir.path()).expect("start");
        wait_until(|| seen.lock().expect("seen lock").len() >= 2).await;
        scheduler.stop();
        assert_eq!(max_in_flight.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn can_restart_after_stop() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (seen, publisher) = recorder();
        let mut scheduler = Scheduler::new(SnapshotAggregator::default(), publisher);

        scheduler.start(fast(), dir.path()).expect("start");
        wait_until(|| !seen.lock().expect("seen lock").is_empty()).await;
        scheduler.stop();
        let first_run = seen.lock().expect("seen lock").len();

        scheduler.start(fast(), dir.path()).expect("restart");
        wait_until(|| seen.lock().expect("seen lock").len() > first_run).await;
        scheduler.stop();

        let seen = seen.lock().expect("seen lock");
        assert_eq!(seen[first_run].sequence, 1);
    }

    #[test]
    fn start_outside_runtime_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (_seen, publisher) = recorder();
        let mut scheduler = Scheduler::new(SnapshotAggregator::default(), publisher);
        assert!(matches!(
            scheduler.start(fast(), dir.path()),
            Err(SchedulerError::NoRuntime(_))
        ));
        assert_eq!(scheduler.state(), SchedulerState::Stopped);
    }
}
