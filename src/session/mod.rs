//! Preview sessions
//!
//! This module provides:
//! - The per-document session actor (debounce, diff, render, scroll sync)
//! - The registry and controller routing editor events to sessions
//! - The JSON message types exchanged with the preview page and the editor

mod actor;
mod protocol;
mod registry;

pub use actor::SessionEvent;
pub use protocol::{HostMessage, Request, Response, SessionId};
pub use registry::PreviewController;

impl Response {
    /// Wrap a session event for the `serve` output stream.
    pub fn from_event(session: SessionId, event: SessionEvent) -> Self {
        match event {
            SessionEvent::Document { html } => Response::Document { session, html },
            SessionEvent::Message(message) => Response::Message { session, message },
            SessionEvent::RevealLine(line) => Response::RevealLine { session, line },
            SessionEvent::Error(message) => Response::Error {
                session: Some(session),
                message,
            },
        }
    }
}
