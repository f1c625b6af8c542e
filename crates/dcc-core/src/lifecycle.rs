use crate::config::MonitorConfig;
use crate::scheduler::{Scheduler, SchedulerError, SchedulerState, SnapshotPublisher};
use crate::snapshot::{Snapshot, SnapshotAggregator};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Activation {
    Started,
    AlreadyRunning,
    /// The state directory was absent; polling is not started for this activation.
    DirectoryMissing(PathBuf),
}

/// Starts and stops polling in response to the host view being shown or closed.
pub struct MonitorLifecycle {
    config: MonitorConfig,
    scheduler: Scheduler,
}

impl MonitorLifecycle {
    pub fn new(config: MonitorConfig, publisher: Arc<dyn SnapshotPublisher>) -> Self {
        let aggregator = SnapshotAggregator::new(config.magic_policy);
        Self::with_aggregator(config, aggregator, publisher)
    }

    pub fn with_aggregator(
        config: MonitorConfig,
        aggregator: SnapshotAggregator,
        publisher: Arc<dyn SnapshotPublisher>,
    ) -> Self {
        Self {
            config,
            scheduler: Scheduler::new(aggregator, publisher),
        }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn state(&self) -> SchedulerState {
        self.scheduler.state()
    }

    pub fn latest(&self) -> Arc<Snapshot> {
        self.scheduler.latest()
    }

    pub fn activate(&mut self) -> Result<Activation, SchedulerError> {
        if self.scheduler.state() == SchedulerState::Running {
            return Ok(Activation::AlreadyRunning);
        }
        let state_dir = &self.config.state_dir;
        if !state_dir.is_dir() {
            warn!(
                event = "dcc_state_dir_missing",
                path = %state_dir.display()
            );
            return Ok(Activation::DirectoryMissing(state_dir.clone()));
        }
        self.scheduler.start(self.config.timing, state_dir.clone())?;
        Ok(Activation::Started)
    }

    pub fn deactivate(&mut self) {
        self.scheduler.stop();
    }
}
