#![allow(dead_code)]

use async_trait::async_trait;
use blw::api::BuildApi;
use blw::app::{
    BranchModule, Build, BuildNumber, BuildState, LogChunk, LogSize, ModuleState, RepoBuild,
    WatchConfig, WatchTarget,
};
use blw::events::{BuildSnapshot, WatchEvent};
use blw::watcher::{BuildWatcher, WatcherHandle};
use color_eyre::eyre::{eyre, Result};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::timeout;

pub fn build_with(id: u64, build_number: u64, state: BuildState) -> Build {
    Build {
        id,
        module_id: 11,
        repo_build_id: 500 + build_number,
        build_number,
        state,
        start_timestamp: None,
        end_timestamp: None,
    }
}

pub fn api_module() -> BranchModule {
    BranchModule {
        id: 11,
        name: "api".to_string(),
        active: true,
    }
}

pub fn web_module() -> BranchModule {
    BranchModule {
        id: 12,
        name: "web".to_string(),
        active: true,
    }
}

pub fn module_state(
    module: BranchModule,
    in_progress: Option<Build>,
    last: Option<Build>,
) -> ModuleState {
    ModuleState {
        module,
        in_progress_build: in_progress,
        last_build: last,
    }
}

/// In-memory build service scripted per test. Successive `module_build`
/// calls pop a queue of builds (the last entry repeats) and the log is one
/// backing string served in offset slices.
#[derive(Default)]
pub struct ScriptedApi {
    pub history: Mutex<Vec<RepoBuild>>,
    pub modules: Mutex<Vec<BranchModule>>,
    pub module_builds: Mutex<Vec<Build>>,
    pub module_states: Mutex<Vec<ModuleState>>,
    pub builds: Mutex<VecDeque<Build>>,
    pub log: Mutex<String>,
    /// When set, reads that reach the end of the backing log report `-1`.
    pub log_complete: AtomicBool,
}

impl ScriptedApi {
    pub fn push_build(&self, build: Build) {
        self.builds.lock().unwrap().push_back(build);
    }

    pub fn set_log(&self, text: &str, complete: bool) {
        *self.log.lock().unwrap() = text.to_string();
        self.log_complete.store(complete, Ordering::SeqCst);
    }

    pub fn append_log(&self, text: &str) {
        self.log.lock().unwrap().push_str(text);
    }
}

#[async_trait]
impl BuildApi for ScriptedApi {
    async fn branch_history(&self, _branch_id: u64) -> Result<Vec<RepoBuild>> {
        Ok(self.history.lock().unwrap().clone())
    }

    async fn branch_modules(&self, _branch_id: u64) -> Result<Vec<BranchModule>> {
        Ok(self.modules.lock().unwrap().clone())
    }

    async fn repo_build_module_builds(&self, _repo_build_id: u64) -> Result<Vec<Build>> {
        Ok(self.module_builds.lock().unwrap().clone())
    }

    async fn branch_module_states(&self, _branch_id: u64) -> Result<Vec<ModuleState>> {
        Ok(self.module_states.lock().unwrap().clone())
    }

    async fn module_build(&self, build_id: u64) -> Result<Build> {
        let mut queue = self.builds.lock().unwrap();
        if queue.len() > 1 {
            return Ok(queue.pop_front().unwrap());
        }
        queue
            .front()
            .cloned()
            .ok_or_else(|| eyre!("no scripted build {build_id}"))
    }

    async fn log_size(&self, _build_id: u64) -> Result<LogSize> {
        let size = self.log.lock().unwrap().len() as u64;
        Ok(LogSize { size })
    }

    async fn log_chunk(&self, _build_id: u64, offset: u64, length: u64) -> Result<LogChunk> {
        let log = self.log.lock().unwrap();
        let total = log.len() as u64;
        let start = offset.min(total);
        let end = offset.saturating_add(length).min(total);
        let text = log[start as usize..end as usize].to_string();
        let next_offset = if end >= total && self.log_complete.load(Ordering::SeqCst) {
            -1
        } else {
            end as i64
        };
        Ok(LogChunk { text, next_offset })
    }
}

pub fn default_config() -> WatchConfig {
    WatchConfig {
        log_refresh: Duration::from_secs(5),
        build_refresh: Duration::from_secs(8),
    }
}

pub fn spawn_watcher_for(
    api: Arc<ScriptedApi>,
    build_number: BuildNumber,
) -> (WatcherHandle, UnboundedReceiver<WatchEvent>) {
    let target = WatchTarget {
        branch_id: 42,
        module_name: "api".to_string(),
        build_number,
    };
    let (watcher, handle, events) = BuildWatcher::new(api, target, default_config());
    tokio::spawn(watcher.run());
    (handle, events)
}

pub async fn next_snapshot(events: &mut UnboundedReceiver<WatchEvent>) -> BuildSnapshot {
    match events.recv().await {
        Some(WatchEvent::Snapshot(snapshot)) => snapshot,
        other => panic!("expected snapshot, got {other:?}"),
    }
}

pub async fn next_error(events: &mut UnboundedReceiver<WatchEvent>) -> String {
    match events.recv().await {
        Some(WatchEvent::Error(message)) => message,
        other => panic!("expected error, got {other:?}"),
    }
}

/// Asserts the watcher stays quiet for a minute of virtual time.
pub async fn no_more_events(events: &mut UnboundedReceiver<WatchEvent>) {
    let outcome = timeout(Duration::from_secs(60), events.recv()).await;
    assert!(outcome.is_err(), "unexpected event: {:?}", outcome.unwrap());
}
