//! Timer bookkeeping for the watcher's two poll loops.
//!
//! Each loop is an optional absolute deadline rather than a spawned task:
//! the watcher arms a deadline, sleeps on it inside `tokio::select!`, and a
//! loop continues only if its predicate still holds when the deadline
//! fires. Disarming between ticks is what stops a loop; an in-flight fetch
//! is never cancelled, so at most one more result can be observed after a
//! stop.

use crate::app::{BuildState, WatchConfig};
use tokio::time::Instant;

/// The log loop keeps going only while the consumer-controlled gate is open
/// and the build is still executing.
pub fn log_poll_continues(should_poll: bool, state: BuildState) -> bool {
    should_poll && state.is_active()
}

/// The build loop runs for as long as the build does.
pub fn build_poll_continues(state: BuildState) -> bool {
    state.is_active()
}

/// The two deadlines the watcher sleeps on. `None` means the loop is
/// stopped.
#[derive(Debug)]
pub struct PollSchedule {
    config: WatchConfig,
    log_due: Option<Instant>,
    build_due: Option<Instant>,
}

impl PollSchedule {
    pub fn new(config: WatchConfig) -> Self {
        Self {
            config,
            log_due: None,
            build_due: None,
        }
    }

    pub fn arm_log(&mut self) {
        self.log_due = Some(Instant::now() + self.config.log_refresh);
    }

    pub fn arm_build(&mut self) {
        self.build_due = Some(Instant::now() + self.config.build_refresh);
    }

    pub fn disarm_log(&mut self) {
        self.log_due = None;
    }

    pub fn disarm_build(&mut self) {
        self.build_due = None;
    }

    pub fn disarm_all(&mut self) {
        self.log_due = None;
        self.build_due = None;
    }

    pub fn log_due(&self) -> Option<Instant> {
        self.log_due
    }

    pub fn build_due(&self) -> Option<Instant> {
        self.build_due
    }
}
