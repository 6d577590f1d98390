use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

// Polling intervals (seconds)
pub const LOG_REFRESH_SECS: u64 = 5;
pub const BUILD_REFRESH_SECS: u64 = 10;

// Log pagination
pub const LOG_CHUNK_LENGTH: u64 = 90_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BuildState {
    WaitingForUpstreamBuild,
    WaitingForBuildSlot,
    Queued,
    Launching,
    InProgress,
    Succeeded,
    Failed,
    Unstable,
    Cancelled,
    #[serde(other)]
    Unknown,
}

impl BuildState {
    /// Queued or launching, not yet executing.
    pub fn is_on_deck(self) -> bool {
        matches!(
            self,
            BuildState::WaitingForUpstreamBuild
                | BuildState::WaitingForBuildSlot
                | BuildState::Queued
                | BuildState::Launching
        )
    }

    pub fn is_active(self) -> bool {
        self == BuildState::InProgress
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            BuildState::Succeeded
                | BuildState::Failed
                | BuildState::Unstable
                | BuildState::Cancelled
        )
    }
}

impl fmt::Display for BuildState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BuildState::WaitingForUpstreamBuild => "waiting for upstream build",
            BuildState::WaitingForBuildSlot => "waiting for build slot",
            BuildState::Queued => "queued",
            BuildState::Launching => "launching",
            BuildState::InProgress => "in progress",
            BuildState::Succeeded => "succeeded",
            BuildState::Failed => "failed",
            BuildState::Unstable => "unstable",
            BuildState::Cancelled => "cancelled",
            BuildState::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// A single module build as served by the CI API.
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Build {
    pub id: u64,
    pub module_id: u64,
    pub repo_build_id: u64,
    pub build_number: u64,
    pub state: BuildState,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub start_timestamp: Option<DateTime<Utc>>,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub end_timestamp: Option<DateTime<Utc>>,
}

/// One entry of a branch's repo-build history.
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoBuild {
    pub id: u64,
    pub build_number: u64,
}

#[derive(Debug, Clone, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchModule {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub active: bool,
}

/// Live per-module build state for a branch: the running build (if any)
/// and the most recently finished one.
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleState {
    pub module: BranchModule,
    pub in_progress_build: Option<Build>,
    pub last_build: Option<Build>,
}

#[derive(Debug, Clone, Copy, serde::Deserialize)]
pub struct LogSize {
    pub size: u64,
}

/// One paginated slice of a build log. `next_offset` is the cursor for the
/// following forward fetch; `-1` means the service has no more data.
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogChunk {
    pub text: String,
    pub next_offset: i64,
}

/// Which build of a module the user asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildNumber {
    Latest,
    Number(u64),
}

impl FromStr for BuildNumber {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("latest") {
            return Ok(BuildNumber::Latest);
        }
        s.parse::<u64>()
            .map(BuildNumber::Number)
            .map_err(|_| format!("expected a build number or \"latest\", got {s:?}"))
    }
}

impl fmt::Display for BuildNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildNumber::Latest => f.write_str("latest"),
            BuildNumber::Number(n) => write!(f, "{n}"),
        }
    }
}

/// Identifies the build a watcher follows: a branch, one of its modules by
/// name, and a build number (or the latest).
#[derive(Debug, Clone)]
pub struct WatchTarget {
    pub branch_id: u64,
    pub module_name: String,
    pub build_number: BuildNumber,
}

/// Immutable watcher configuration set at startup.
#[derive(Debug, Clone, Copy)]
pub struct WatchConfig {
    pub log_refresh: Duration,
    pub build_refresh: Duration,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            log_refresh: Duration::from_secs(LOG_REFRESH_SECS),
            build_refresh: Duration::from_secs(BUILD_REFRESH_SECS),
        }
    }
}
