use crate::api::BuildApi;
use crate::app::{BranchModule, Build, BuildState, LogChunk, LogSize, ModuleState, RepoBuild};
use async_trait::async_trait;
use color_eyre::eyre::{eyre, Result};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

pub(crate) fn make_build(id: u64, build_number: u64, state: BuildState) -> Build {
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

pub(crate) fn make_module(id: u64, name: &str, active: bool) -> BranchModule {
    BranchModule {
        id,
        name: name.to_string(),
        active,
    }
}

pub(crate) fn make_module_state(
    module: BranchModule,
    in_progress_build: Option<Build>,
    last_build: Option<Build>,
) -> ModuleState {
    ModuleState {
        module,
        in_progress_build,
        last_build,
    }
}

#[derive(Default)]
pub(crate) struct CallCounts {
    pub history: AtomicUsize,
    pub modules: AtomicUsize,
    pub module_builds: AtomicUsize,
    pub module_states: AtomicUsize,
    pub build: AtomicUsize,
    pub log_size: AtomicUsize,
    pub log_chunk: AtomicUsize,
}

/// Scripted in-memory `BuildApi`. Successive `module_build` calls pop a
/// queue of builds (the last entry repeats), the log is one backing string
/// sliced by offset, and each operation can be failed on demand.
#[derive(Default)]
pub(crate) struct MockApi {
    pub history: Mutex<Vec<RepoBuild>>,
    pub modules: Mutex<Vec<BranchModule>>,
    pub module_builds: Mutex<Vec<Build>>,
    pub module_states: Mutex<Vec<ModuleState>>,
    pub builds: Mutex<VecDeque<Build>>,
    pub log: Mutex<String>,
    /// When set, reads that reach the end of the backing log report `-1`.
    pub log_complete: AtomicBool,
    pub fail_build: AtomicBool,
    pub fail_log_size: AtomicBool,
    pub fail_log_chunk: AtomicBool,
    pub calls: CallCounts,
}

impl MockApi {
    pub fn new() -> Self {
        Self::default()
    }

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

    pub fn chunk_fetches(&self) -> usize {
        self.calls.log_chunk.load(Ordering::SeqCst)
    }

    pub fn size_fetches(&self) -> usize {
        self.calls.log_size.load(Ordering::SeqCst)
    }

    pub fn build_fetches(&self) -> usize {
        self.calls.build.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BuildApi for MockApi {
    async fn branch_history(&self, _branch_id: u64) -> Result<Vec<RepoBuild>> {
        self.calls.history.fetch_add(1, Ordering::SeqCst);
        Ok(self.history.lock().unwrap().clone())
    }

    async fn branch_modules(&self, _branch_id: u64) -> Result<Vec<BranchModule>> {
        self.calls.modules.fetch_add(1, Ordering::SeqCst);
        Ok(self.modules.lock().unwrap().clone())
    }

    async fn repo_build_module_builds(&self, _repo_build_id: u64) -> Result<Vec<Build>> {
        self.calls.module_builds.fetch_add(1, Ordering::SeqCst);
        Ok(self.module_builds.lock().unwrap().clone())
    }

    async fn branch_module_states(&self, _branch_id: u64) -> Result<Vec<ModuleState>> {
        self.calls.module_states.fetch_add(1, Ordering::SeqCst);
        Ok(self.module_states.lock().unwrap().clone())
    }

    async fn module_build(&self, build_id: u64) -> Result<Build> {
        self.calls.build.fetch_add(1, Ordering::SeqCst);
        if self.fail_build.load(Ordering::SeqCst) {
            return Err(eyre!("scripted build fetch failure"));
        }
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
        self.calls.log_size.fetch_add(1, Ordering::SeqCst);
        if self.fail_log_size.load(Ordering::SeqCst) {
            return Err(eyre!("scripted log size failure"));
        }
        let size = self.log.lock().unwrap().len() as u64;
        Ok(LogSize { size })
    }

    async fn log_chunk(&self, _build_id: u64, offset: u64, length: u64) -> Result<LogChunk> {
        self.calls.log_chunk.fetch_add(1, Ordering::SeqCst);
        if self.fail_log_chunk.load(Ordering::SeqCst) {
            return Err(eyre!("scripted log chunk failure"));
        }
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
