//! File system watcher for the previewed document.
//!
//! Watches the parent directory of a single document and reports
//! modifications and removals of that document.

use crate::error::{Error, Result};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

/// File system events that the preview cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentEvent {
    /// The document was written (or re-created by an atomic save)
    Modified,
    /// The document was deleted
    Removed,
    /// The watcher encountered an error
    Error(String),
}

/// Watches one document file.
///
/// Editors commonly save by writing a temp file and renaming it over the
/// original, so the parent directory is watched and events are filtered by
/// file name.
#[derive(Debug)]
pub struct DocumentWatcher {
    /// The internal notify watcher
    _watcher: RecommendedWatcher,
    /// Receiver for document events
    receiver: Receiver<DocumentEvent>,
    /// Document being watched
    path: PathBuf,
}

impl DocumentWatcher {
    /// Create a new watcher for `path`.
    pub fn new(path: PathBuf) -> Result<Self> {
        let (tx, rx) = channel();

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let file_name = path
            .file_name()
            .map(|name| name.to_os_string())
            .ok_or_else(|| Error::Watch(format!("Not a file path: {}", path.display())))?;

        let mut watcher = RecommendedWatcher::new(
            move |result: std::result::Result<Event, notify::Error>| {
                Self::handle_event(result, &file_name, &tx);
            },
            Config::default().with_poll_interval(Duration::from_millis(500)),
        )?;

        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .map_err(|e| Error::Watch(format!("Failed to watch {}: {}", dir.display(), e)))?;

        log::debug!("Watching {} for changes", path.display());

        Ok(Self {
            _watcher: watcher,
            receiver: rx,
            path,
        })
    }

    /// Convert a raw notify event into document events.
    fn handle_event(
        result: std::result::Result<Event, notify::Error>,
        file_name: &std::ffi::OsStr,
        tx: &Sender<DocumentEvent>,
    ) {
        match result {
            Ok(event) => {
                let ours = event
                    .paths
                    .iter()
                    .any(|p| p.file_name() == Some(file_name));
                if !ours {
                    return;
                }
                if let Some(evt) = classify(&event.kind) {
                    let _ = tx.send(evt);
                }
            }
            Err(e) => {
                let _ = tx.send(DocumentEvent::Error(e.to_string()));
            }
        }
    }

    /// Block until the next event arrives or `timeout` elapses.
    ///
    /// Returns `None` on timeout or when the watcher has shut down.
    pub fn next_event(&self, timeout: Duration) -> Option<DocumentEvent> {
        match self.receiver.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// The document being watched.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Map a notify event kind to a document event.
fn classify(kind: &EventKind) -> Option<DocumentEvent> {
    match kind {
        EventKind::Create(_) | EventKind::Modify(_) => Some(DocumentEvent::Modified),
        EventKind::Remove(_) => Some(DocumentEvent::Removed),
        // Access and other events don't change content
        _ => None,
    }
}
