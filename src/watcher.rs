//! The watcher owns one build and its log window, reacts to consumer
//! commands, and keeps both fresh through two poll loops while the build
//! runs. Everything happens on a single task: commands and timer ticks
//! interleave but never overlap, and every fetch is awaited before the next
//! branch runs, so at most one request is in flight per watcher.
//!
//! Poll loops fail stop: a fetch error is reported once and the loop is not
//! re-armed. A fresh `Load`, `SetLogPolling(true)` or a navigation to the
//! bottom is what starts polling again.

use crate::api::BuildApi;
use crate::app::{Build, BuildState, WatchConfig, WatchTarget, LOG_CHUNK_LENGTH};
use crate::events::{BuildSnapshot, LogPosition, WatchEvent};
use crate::log::LogWindow;
use crate::poller::{build_poll_continues, log_poll_continues, PollSchedule};
use crate::resolver;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{self, Instant};

const LOG_UNAVAILABLE: &str =
    "The build log was not found. Most likely, the build failed to start. Try a manual rebuild.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchCommand {
    Load,
    Navigate(LogPosition),
    FetchPrevious,
    FetchNext,
    SetLogPolling(bool),
}

/// Command side of a watcher. Dropping every handle closes the command
/// channel, which ends the watcher task and all polling with it.
#[derive(Clone)]
pub struct WatcherHandle {
    tx: mpsc::UnboundedSender<WatchCommand>,
}

impl WatcherHandle {
    pub fn load(&self) {
        let _ = self.tx.send(WatchCommand::Load);
    }

    pub fn navigate(&self, position: LogPosition) {
        let _ = self.tx.send(WatchCommand::Navigate(position));
    }

    pub fn fetch_previous(&self) {
        let _ = self.tx.send(WatchCommand::FetchPrevious);
    }

    pub fn fetch_next(&self) {
        let _ = self.tx.send(WatchCommand::FetchNext);
    }

    pub fn set_log_polling(&self, enabled: bool) {
        let _ = self.tx.send(WatchCommand::SetLogPolling(enabled));
    }
}

pub struct BuildWatcher {
    api: Arc<dyn BuildApi>,
    target: WatchTarget,
    events: mpsc::UnboundedSender<WatchEvent>,
    commands: mpsc::UnboundedReceiver<WatchCommand>,
    schedule: PollSchedule,
    build: Option<Build>,
    log: Option<LogWindow>,
}

async fn sleep_until(due: Option<Instant>) {
    match due {
        Some(deadline) => time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

impl BuildWatcher {
    pub fn new(
        api: Arc<dyn BuildApi>,
        target: WatchTarget,
        config: WatchConfig,
    ) -> (
        Self,
        WatcherHandle,
        mpsc::UnboundedReceiver<WatchEvent>,
    ) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let watcher = Self {
            api,
            target,
            events: event_tx,
            commands: command_rx,
            schedule: PollSchedule::new(config),
            build: None,
            log: None,
        };
        (watcher, WatcherHandle { tx: command_tx }, event_rx)
    }

    pub async fn run(mut self) {
        loop {
            let log_due = self.schedule.log_due();
            let build_due = self.schedule.build_due();
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => break,
                },
                () = sleep_until(log_due), if log_due.is_some() => self.log_poll_tick().await,
                () = sleep_until(build_due), if build_due.is_some() => self.build_poll_tick().await,
            }
        }
    }

    async fn handle_command(&mut self, command: WatchCommand) {
        match command {
            WatchCommand::Load => self.load_build().await,
            WatchCommand::Navigate(position) => self.navigate(position).await,
            WatchCommand::FetchPrevious => self.fetch_previous().await,
            WatchCommand::FetchNext => self.fetch_next().await,
            WatchCommand::SetLogPolling(enabled) => self.set_log_polling(enabled).await,
        }
    }

    async fn load_build(&mut self) {
        self.schedule.disarm_all();
        self.build = None;
        self.log = None;

        let build = match resolver::resolve_build(self.api.as_ref(), &self.target).await {
            Ok(build) => build,
            Err(e) => {
                tracing::warn!(error = %e, "build resolution failed");
                self.emit_error(format!(
                    "Error retrieving build #{}.",
                    self.target.build_number
                ));
                return;
            }
        };
        let state = build.state;
        self.build = Some(build);

        // An unrecognized state says nothing about whether a log exists;
        // the build is surfaced untouched, like an on-deck one.
        let wants_log = !state.is_on_deck() && state != BuildState::Unknown;
        if wants_log && !self.create_log_window().await {
            return;
        }
        self.dispatch_state(state).await;
    }

    /// Initial window for a build that has produced (or is producing)
    /// output, anchored at the tail. On-deck and unrecognized builds never
    /// reach this; there is no log to size up yet.
    async fn create_log_window(&mut self) -> bool {
        let Some(build) = &self.build else {
            return false;
        };
        match self.api.log_size(build.id).await {
            Ok(log_size) => {
                self.log = Some(LogWindow::anchored(
                    build.id,
                    log_size.size,
                    LogPosition::Bottom,
                    LOG_CHUNK_LENGTH,
                ));
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, build_id = build.id, "log size fetch failed");
                self.emit_error(LOG_UNAVAILABLE.to_string());
                false
            }
        }
    }

    async fn dispatch_state(&mut self, state: BuildState) {
        match state {
            // Unknown states surface as-is; there is nothing to poll.
            BuildState::WaitingForUpstreamBuild
            | BuildState::WaitingForBuildSlot
            | BuildState::Queued
            | BuildState::Launching
            | BuildState::Unknown => self.emit(None),
            BuildState::InProgress => {
                self.log_poll_tick().await;
                self.build_poll_tick().await;
            }
            BuildState::Succeeded | BuildState::Failed | BuildState::Unstable => {
                self.finish_log().await;
            }
            BuildState::Cancelled => self.process_cancelled().await,
        }
    }

    /// A cancelled build may still be flushing its log remotely, so the
    /// first read after finishing can come up short. Read once more to see
    /// whether the log is actually complete.
    async fn process_cancelled(&mut self) {
        self.finish_log().await;
        self.fetch_next().await;
    }

    /// Final size refresh plus one read at the cursor, emitted together.
    async fn finish_log(&mut self) {
        if !self.refresh_log_size().await {
            return;
        }
        self.fetch_log_and_emit(None).await;
    }

    async fn log_poll_tick(&mut self) {
        let continues = match (&self.log, &self.build) {
            (Some(log), Some(build)) => log_poll_continues(log.should_poll(), build.state),
            _ => false,
        };
        if !continues {
            self.schedule.disarm_log();
            return;
        }
        if !self.refresh_log_size().await {
            self.schedule.disarm_log();
            return;
        }
        if self.fetch_log_and_emit(None).await {
            self.schedule.arm_log();
        } else {
            self.schedule.disarm_log();
        }
    }

    async fn build_poll_tick(&mut self) {
        let Some(build) = &self.build else {
            self.schedule.disarm_build();
            return;
        };
        if !build_poll_continues(build.state) {
            self.schedule.disarm_build();
            return;
        }
        let build_id = build.id;
        match self.api.module_build(build_id).await {
            Ok(fresh) => {
                let still_running = fresh.state.is_active();
                self.build = Some(fresh);
                if still_running {
                    self.schedule.arm_build();
                } else {
                    // One last read so the final log bytes and the terminal
                    // state land in the same snapshot, then both loops stop.
                    self.schedule.disarm_all();
                    self.finish_log().await;
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, build_id, "build refresh failed");
                self.emit_error(format!(
                    "Error retrieving build #{}.",
                    self.target.build_number
                ));
                self.schedule.disarm_build();
            }
        }
    }

    async fn navigate(&mut self, position: LogPosition) {
        if self.build.is_none() {
            return;
        }
        let in_progress = self
            .build
            .as_ref()
            .is_some_and(|build| build.state.is_active());

        let Some(log) = self.log.as_mut() else {
            // Nothing materialized yet (on-deck build): only report where
            // the consumer went.
            self.emit(Some(position));
            return;
        };
        let start_loaded = log.start_of_log_loaded();
        let end_loaded = log.end_of_log_loaded();

        match position {
            LogPosition::Top => {
                // A reader of history must not have content shift under
                // them; the gate closes before anything else.
                if in_progress {
                    log.set_should_poll(false);
                }
                if start_loaded {
                    self.emit(Some(position));
                } else {
                    self.reset_log_via_navigation(position).await;
                }
            }
            LogPosition::Bottom => {
                if in_progress {
                    log.set_should_poll(true);
                    self.schedule.arm_log();
                }
                if end_loaded {
                    self.emit(Some(position));
                } else {
                    self.reset_log_via_navigation(position).await;
                }
            }
        }
    }

    /// Replace the window with one anchored at `position` over the same
    /// size and materialize it. Crossing a gap never splices into the old
    /// window.
    async fn reset_log_via_navigation(&mut self, position: LogPosition) {
        let Some(log) = &self.log else {
            return;
        };
        let mut fresh =
            LogWindow::anchored(log.build_id(), log.size(), position, LOG_CHUNK_LENGTH);
        fresh.set_should_poll(log.should_poll());
        self.log = Some(fresh);
        self.fetch_log_and_emit(Some(position)).await;
    }

    async fn fetch_previous(&mut self) {
        let Some(log) = self.log.as_mut() else {
            return;
        };
        if log.start_of_log_loaded() {
            self.emit(None);
            return;
        }
        match log.fetch_previous(self.api.as_ref()).await {
            Ok(_) => self.emit(None),
            Err(e) => {
                tracing::warn!(error = %e, "log fetch failed");
                self.emit_error(format!(
                    "Error retrieving log for build #{}.",
                    self.target.build_number
                ));
            }
        }
    }

    async fn fetch_next(&mut self) {
        let Some(log) = &self.log else {
            return;
        };
        // End of data already reported: no request, no emission.
        if log.request_offset() < 0 {
            return;
        }
        self.fetch_log_and_emit(None).await;
    }

    async fn set_log_polling(&mut self, enabled: bool) {
        let Some(log) = self.log.as_mut() else {
            return;
        };
        log.set_should_poll(enabled);
        if !enabled {
            return;
        }
        // Coming back from a pause: one immediate iteration picks up the
        // size the log grew to and resumes from the current cursor.
        if self
            .build
            .as_ref()
            .is_some_and(|build| build.state.is_active())
        {
            self.log_poll_tick().await;
        }
    }

    /// Refresh the window's authoritative size. Emits the log-unavailable
    /// error and reports `false` on failure.
    async fn refresh_log_size(&mut self) -> bool {
        let Some(build) = &self.build else {
            return false;
        };
        let build_id = build.id;
        let Some(log) = self.log.as_mut() else {
            return false;
        };
        match self.api.log_size(build_id).await {
            Ok(log_size) => {
                log.refresh_size(log_size.size);
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, build_id, "log size fetch failed");
                self.emit_error(LOG_UNAVAILABLE.to_string());
                false
            }
        }
    }

    /// One forward read at the cursor followed by a snapshot. The snapshot
    /// goes out even when the cursor had already reported the end of the
    /// data.
    async fn fetch_log_and_emit(&mut self, position_change: Option<LogPosition>) -> bool {
        let Some(log) = self.log.as_mut() else {
            return false;
        };
        match log.fetch_next(self.api.as_ref()).await {
            Ok(_) => {
                self.emit(position_change);
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "log fetch failed");
                self.emit_error(format!(
                    "Error retrieving log for build #{}.",
                    self.target.build_number
                ));
                false
            }
        }
    }

    fn emit(&self, position_change: Option<LogPosition>) {
        let Some(build) = &self.build else {
            return;
        };
        let snapshot = BuildSnapshot {
            build: build.clone(),
            log: self.log.as_ref().map(LogWindow::view),
            loading: false,
            position_change,
        };
        let _ = self.events.send(WatchEvent::Snapshot(snapshot));
    }

    fn emit_error(&self, message: String) {
        let _ = self.events.send(WatchEvent::Error(message));
    }
}
