//! Offset-addressed window onto a build's log.
//!
//! The service serves logs as byte slices plus a total size. The window
//! materializes one contiguous range and pages it a chunk at a time:
//! forward along the service-provided cursor (`request_offset`, `-1` once
//! the service reports no more data), backward by explicit offset math.
//! Crossing into a range that is not adjacent to the loaded one is handled
//! by rebuilding the window, never by splicing.

use crate::api::BuildApi;
use crate::events::{LogPosition, LogView};
use color_eyre::eyre::Result;

#[derive(Debug, Clone)]
pub struct LogWindow {
    build_id: u64,
    size: u64,
    min_offset_loaded: u64,
    max_offset_loaded: u64,
    request_offset: i64,
    should_poll: bool,
    chunk_len: u64,
    text: String,
}

impl LogWindow {
    /// Fresh, unmaterialized window with its cursor at the start (`Top`) or
    /// at the last `chunk_len` bytes (`Bottom`). Fetch to materialize.
    pub fn anchored(build_id: u64, size: u64, position: LogPosition, chunk_len: u64) -> Self {
        let start = match position {
            LogPosition::Top => 0,
            LogPosition::Bottom => size.saturating_sub(chunk_len),
        };
        Self {
            build_id,
            size,
            min_offset_loaded: start,
            max_offset_loaded: start,
            request_offset: start as i64,
            should_poll: true,
            chunk_len,
            text: String::new(),
        }
    }

    /// Fetch one chunk at the cursor and extend the window forward.
    /// Returns `false` without a network call once the service has reported
    /// the end of the data.
    pub async fn fetch_next(&mut self, api: &dyn BuildApi) -> Result<bool> {
        if self.request_offset < 0 {
            return Ok(false);
        }
        let offset = self.request_offset as u64;
        let chunk = api.log_chunk(self.build_id, offset, self.chunk_len).await?;
        self.text.push_str(&chunk.text);
        self.max_offset_loaded = offset + chunk.text.len() as u64;
        self.request_offset = chunk.next_offset;
        if self.max_offset_loaded > self.size {
            self.size = self.max_offset_loaded;
        }
        Ok(true)
    }

    /// Fetch the chunk preceding the window and extend it backward.
    /// Returns `false` without a network call when offset 0 is loaded.
    pub async fn fetch_previous(&mut self, api: &dyn BuildApi) -> Result<bool> {
        if self.min_offset_loaded == 0 {
            return Ok(false);
        }
        let start = self.min_offset_loaded.saturating_sub(self.chunk_len);
        let length = self.min_offset_loaded - start;
        let chunk = api.log_chunk(self.build_id, start, length).await?;
        // The returned cursor points into the already loaded range; the
        // forward cursor is unaffected by backward reads.
        self.text.insert_str(0, &chunk.text);
        self.min_offset_loaded = start;
        Ok(true)
    }

    /// Adopt a freshly fetched authoritative size. A window that has read
    /// past a stale size keeps its own high-water mark.
    pub fn refresh_size(&mut self, size: u64) {
        self.size = size.max(self.max_offset_loaded);
    }

    pub fn view(&self) -> LogView {
        LogView {
            text: self.text.clone(),
            size: self.size,
            min_offset_loaded: self.min_offset_loaded,
            max_offset_loaded: self.max_offset_loaded,
            request_offset: self.request_offset,
        }
    }

    pub fn build_id(&self) -> u64 {
        self.build_id
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn request_offset(&self) -> i64 {
        self.request_offset
    }

    pub fn should_poll(&self) -> bool {
        self.should_poll
    }

    pub fn set_should_poll(&mut self, should_poll: bool) {
        self.should_poll = should_poll;
    }

    pub fn start_of_log_loaded(&self) -> bool {
        self.min_offset_loaded == 0
    }

    pub fn end_of_log_loaded(&self) -> bool {
        self.max_offset_loaded == self.size
    }
}
