//! Scroll synchronization guard between the source editor and the preview.
//!
//! Editor scrolls are mapped to block positions and sent to the preview;
//! clicks in the preview reveal a source line in the editor, which in turn
//! scrolls the editor. A "scroll origin" token with a short quiet window
//! keeps the two directions from bouncing off each other.
//!
//! # Usage
//!
//! ```ignore
//! let mut sync = SyncScrollState::new();
//!
//! // Preview asked the editor to reveal a line
//! sync.mark_scroll(ScrollOrigin::Preview);
//!
//! // Editor viewport changed shortly after
//! if sync.should_sync_from(ScrollOrigin::Editor) {
//!     // send scrollToPosition to the preview
//! }
//! ```

use super::position::BlockPosition;
use std::time::{Duration, Instant};

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration for sync scrolling behavior.
#[derive(Debug, Clone)]
pub struct SyncScrollConfig {
    /// How long a scroll from one side blocks syncing from the other side
    pub quiet_window: Duration,
}

impl Default for SyncScrollConfig {
    fn default() -> Self {
        Self {
            quiet_window: Duration::from_millis(250),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Scroll Origin
// ─────────────────────────────────────────────────────────────────────────────

/// Origin of a scroll event, used to prevent feedback loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollOrigin {
    /// Scroll originated from the source editor viewport
    Editor,
    /// Scroll originated from a click or navigation in the preview
    Preview,
    /// No active scroll origin (idle state)
    None,
}

// ─────────────────────────────────────────────────────────────────────────────
// Sync Scroll State
// ─────────────────────────────────────────────────────────────────────────────

/// Tracks who scrolled last and what the preview was last told.
#[derive(Debug)]
pub struct SyncScrollState {
    /// Current scroll origin (who initiated the last scroll)
    scroll_origin: ScrollOrigin,
    /// Last scroll event time
    last_scroll_time: Option<Instant>,
    /// Last position sent to the preview
    last_sent: Option<BlockPosition>,
    /// Configuration settings
    config: SyncScrollConfig,
}

impl Default for SyncScrollState {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncScrollState {
    /// Create a new sync scroll state.
    pub fn new() -> Self {
        Self::with_config(SyncScrollConfig::default())
    }

    /// Create with custom configuration.
    pub fn with_config(config: SyncScrollConfig) -> Self {
        Self {
            scroll_origin: ScrollOrigin::None,
            last_scroll_time: None,
            last_sent: None,
            config,
        }
    }

    /// Check if we should sync from the given origin.
    ///
    /// Returns true if no scroll is in progress, the origin matches the
    /// current one, or the quiet window since the last scroll has passed.
    pub fn should_sync_from(&self, origin: ScrollOrigin) -> bool {
        if self.scroll_origin == ScrollOrigin::None || self.scroll_origin == origin {
            return true;
        }

        match self.last_scroll_time {
            Some(last_time) => last_time.elapsed() >= self.config.quiet_window,
            None => true,
        }
    }

    /// Mark a scroll event from the given origin.
    pub fn mark_scroll(&mut self, origin: ScrollOrigin) {
        self.scroll_origin = origin;
        self.last_scroll_time = Some(Instant::now());
    }

    /// Clear the scroll origin once the quiet window has passed.
    pub fn clear_origin(&mut self) {
        if let Some(last_time) = self.last_scroll_time {
            if last_time.elapsed() >= self.config.quiet_window {
                self.scroll_origin = ScrollOrigin::None;
            }
        }
    }

    /// Record a position about to be sent; returns false if it repeats the last one.
    pub fn record_sent(&mut self, position: BlockPosition) -> bool {
        if self.last_sent == Some(position) {
            return false;
        }
        self.last_sent = Some(position);
        true
    }

    /// Forget the last sent position so the next sync always goes out.
    ///
    /// Call after the preview content was replaced or patched.
    pub fn invalidate(&mut self) {
        self.last_sent = None;
    }

    /// Current scroll origin.
    pub fn origin(&self) -> ScrollOrigin {
        self.scroll_origin
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
