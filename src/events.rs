use crate::app::Build;

/// Where the user navigated within the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogPosition {
    Top,
    Bottom,
}

/// Immutable copy of the log window at emission time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogView {
    pub text: String,
    pub size: u64,
    pub min_offset_loaded: u64,
    pub max_offset_loaded: u64,
    pub request_offset: i64,
}

impl LogView {
    pub fn start_of_log_loaded(&self) -> bool {
        self.min_offset_loaded == 0
    }

    pub fn end_of_log_loaded(&self) -> bool {
        self.max_offset_loaded == self.size
    }
}

/// One consistent view of the watched build, pushed after every fetch that
/// changed something worth showing. `log` is absent while the build is still
/// on deck.
#[derive(Debug, Clone)]
pub struct BuildSnapshot {
    pub build: Build,
    pub log: Option<LogView>,
    pub loading: bool,
    pub position_change: Option<LogPosition>,
}

#[derive(Debug, Clone)]
pub enum WatchEvent {
    Snapshot(BuildSnapshot),
    Error(String),
}
