//! Message types
//!
//! Two layers of JSON messages:
//! - host ↔ view messages exchanged with the preview page,
//! - `serve` requests and responses exchanged with the editor integration
//!   over stdin/stdout, one JSON object per line.

use crate::config::{TemplateAction, TemplateKind};
use crate::error::{Error, Result};
use crate::preview::BlockPosition;
use crate::render::RenderedFragment;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Identifier of an open preview session.
pub type SessionId = u64;

// ─────────────────────────────────────────────────────────────────────────────
// Host ↔ View
// ─────────────────────────────────────────────────────────────────────────────

/// Message from the host to the preview page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase")]
pub enum HostMessage {
    /// Replace the listed blocks in place
    UpdateBlocks { blocks: Vec<RenderedFragment> },
    /// Scroll the given block position into the middle of the view
    #[serde(rename_all = "camelCase")]
    ScrollToPosition { block_index: i64, line_in_block: i64 },
}

impl HostMessage {
    /// Scroll request for a block position.
    pub fn scroll_to(position: BlockPosition) -> Self {
        HostMessage::ScrollToPosition {
            block_index: position.block_index,
            line_in_block: position.line_in_block,
        }
    }
}

/// Message from the preview page to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase")]
pub enum ViewMessage {
    /// The page finished applying an `updateBlocks` message
    UpdateComplete,
    /// The user picked a location in the preview
    #[serde(rename_all = "camelCase")]
    ScrollToPosition { block_index: i64, line_in_block: i64 },
}

// ─────────────────────────────────────────────────────────────────────────────
// Serve Protocol
// ─────────────────────────────────────────────────────────────────────────────

/// A request read from the `serve` input stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Request {
    /// Open a preview for a document; `text` defaults to the file content
    #[serde(rename_all = "camelCase")]
    Open {
        document: PathBuf,
        #[serde(default)]
        text: Option<String>,
        #[serde(default)]
        first_line: Option<usize>,
        #[serde(default)]
        last_line: Option<usize>,
    },
    /// The document text changed
    Change { document: PathBuf, text: String },
    /// The editor viewport moved
    #[serde(rename_all = "camelCase")]
    Viewport {
        document: PathBuf,
        first_line: usize,
        last_line: usize,
    },
    /// A message from a session's preview page
    View { session: SessionId, message: ViewMessage },
    /// Close a session
    Close { session: SessionId },
    /// Change the templates for this workspace
    Template {
        kind: TemplateKind,
        action: TemplateAction,
    },
}

impl Request {
    /// Parse one request line.
    pub fn parse(line: &str) -> Result<Self> {
        serde_json::from_str(line).map_err(|e| Error::Protocol(format!("{}: {}", e, line.trim())))
    }
}

/// A line written to the `serve` output stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Response {
    /// A session was opened
    Opened { session: SessionId, document: PathBuf },
    /// A session was closed
    Closed { session: SessionId },
    /// Replace the whole preview page
    Document { session: SessionId, html: String },
    /// Forward a message to the preview page
    Message { session: SessionId, message: HostMessage },
    /// Move the editor cursor to a source line (0-based)
    RevealLine { session: SessionId, line: usize },
    /// Labels for the template status bar items
    #[serde(rename_all = "camelCase")]
    Templates { latex_label: String, html_label: String },
    /// A failure to show to the user
    Error {
        #[serde(skip_serializing_if = "Option::is_none")]
        session: Option<SessionId>,
        message: String,
    },
}
