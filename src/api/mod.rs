pub mod http;

use crate::app::{BranchModule, Build, LogChunk, LogSize, ModuleState, RepoBuild};
use async_trait::async_trait;
use color_eyre::eyre::Result;

/// Read-only view of the CI server. Everything the watcher needs is a GET
/// returning JSON; swapping the implementation (HTTP, in-memory test double)
/// swaps the transport without touching the watcher.
#[async_trait]
pub trait BuildApi: Send + Sync {
    /// Repo builds for a branch, newest first.
    async fn branch_history(&self, branch_id: u64) -> Result<Vec<RepoBuild>>;
    /// Modules configured on a branch.
    async fn branch_modules(&self, branch_id: u64) -> Result<Vec<BranchModule>>;
    /// Per-module builds belonging to one repo build.
    async fn repo_build_module_builds(&self, repo_build_id: u64) -> Result<Vec<Build>>;
    /// Live module states for a branch (running and last finished builds).
    async fn branch_module_states(&self, branch_id: u64) -> Result<Vec<ModuleState>>;
    /// Full detail for a single module build.
    async fn module_build(&self, build_id: u64) -> Result<Build>;
    /// Current length of a build's log in bytes.
    async fn log_size(&self, build_id: u64) -> Result<LogSize>;
    /// One slice of a build's log starting at `offset`.
    async fn log_chunk(&self, build_id: u64, offset: u64, length: u64) -> Result<LogChunk>;
}
