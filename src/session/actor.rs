//! Preview session actor
//!
//! Each open preview runs on its own thread and owns its last rendered
//! snapshot, its debounce deadline and its scroll state. The handle only
//! sends commands; results come back as events on a shared channel tagged
//! with the session id.

use super::protocol::{HostMessage, SessionId, ViewMessage};
use crate::preview::{
    diff, locate, partition, source_line, viewport_mid_line, BlockPosition, DiffResult,
    RebuildReason, ScrollOrigin, SyncScrollState,
};
use crate::render::{Converter, RenderOptions, Renderer};
use log::{debug, error, info};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

// ─────────────────────────────────────────────────────────────────────────────
// Commands and Events
// ─────────────────────────────────────────────────────────────────────────────

/// Commands accepted by a session.
#[derive(Debug, Clone)]
pub enum SessionCommand {
    /// The document text changed (debounced)
    TextChanged(String),
    /// The editor viewport moved (0-based, inclusive)
    Viewport { first_line: usize, last_line: usize },
    /// A message from the preview page
    View(ViewMessage),
    /// Re-render everything with new options
    Rerender(RenderOptions),
    /// Stop the session
    Dispose,
}

/// Events produced by a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Replace the preview content with this HTML
    Document { html: String },
    /// Forward this message to the preview page
    Message(HostMessage),
    /// Reveal this 0-based source line in the editor
    RevealLine(usize),
    /// A render failed; the preview keeps its previous content
    Error(String),
}

/// Channel end receiving events from every session.
pub type EventSender = Sender<(SessionId, SessionEvent)>;

/// Per-session behaviour switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Quiet period after the last edit before rendering
    pub debounce: Duration,
    /// Allow partial re-renders
    pub incremental: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(500),
            incremental: true,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Session Handle
// ─────────────────────────────────────────────────────────────────────────────

/// Handle to a running preview session.
///
/// Dropping the handle disposes the session.
#[derive(Debug)]
pub struct PreviewSession {
    id: SessionId,
    commands: Sender<SessionCommand>,
    disposed: Arc<AtomicBool>,
}

impl PreviewSession {
    /// Start a session for `text`. The first full render runs immediately.
    pub fn spawn<C>(
        id: SessionId,
        text: String,
        renderer: Renderer<C>,
        config: SessionConfig,
        events: EventSender,
    ) -> Self
    where
        C: Converter + 'static,
    {
        let (tx, rx) = channel();
        let disposed = Arc::new(AtomicBool::new(false));

        let actor = SessionActor {
            id,
            partitioned: partition(&text),
            renderer,
            config,
            events,
            disposed: Arc::clone(&disposed),
            snapshot: None,
            viewport: None,
            scroll: SyncScrollState::new(),
        };

        let spawned = thread::Builder::new()
            .name(format!("preview-session-{}", id))
            .spawn(move || actor.run(rx));
        match spawned {
            Ok(_) => info!("Preview session {} started", id),
            Err(e) => error!("Failed to start preview session {}: {}", id, e),
        }

        Self {
            id,
            commands: tx,
            disposed,
        }
    }

    /// Session id.
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// The document text changed.
    pub fn on_text_changed(&self, text: String) {
        self.send(SessionCommand::TextChanged(text));
    }

    /// The editor viewport moved.
    pub fn on_viewport(&self, first_line: usize, last_line: usize) {
        self.send(SessionCommand::Viewport {
            first_line,
            last_line,
        });
    }

    /// A message arrived from the preview page.
    pub fn on_view_message(&self, message: ViewMessage) {
        self.send(SessionCommand::View(message));
    }

    /// Re-render the whole document with new options.
    pub fn rerender(&self, options: RenderOptions) {
        self.send(SessionCommand::Rerender(options));
    }

    /// Stop the session. Renders still in flight are discarded.
    pub fn dispose(&self) {
        if !self.disposed.swap(true, Ordering::SeqCst) {
            let _ = self.commands.send(SessionCommand::Dispose);
            info!("Preview session {} disposed", self.id);
        }
    }

    /// Whether the session was disposed.
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    fn send(&self, command: SessionCommand) {
        if self.is_disposed() {
            return;
        }
        if self.commands.send(command).is_err() {
            debug!("Preview session {} is no longer running", self.id);
        }
    }
}

impl Drop for PreviewSession {
    fn drop(&mut self) {
        self.dispose();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Actor
// ─────────────────────────────────────────────────────────────────────────────

struct SessionActor<C> {
    id: SessionId,
    /// Partitioned form of the latest text
    partitioned: String,
    renderer: Renderer<C>,
    config: SessionConfig,
    events: EventSender,
    disposed: Arc<AtomicBool>,
    /// Partitioned text of the last successful render
    snapshot: Option<String>,
    /// Last known editor viewport
    viewport: Option<(usize, usize)>,
    scroll: SyncScrollState,
}

impl<C: Converter> SessionActor<C> {
    fn run(mut self, commands: Receiver<SessionCommand>) {
        self.render_cycle();

        let mut deadline: Option<Instant> = None;
        loop {
            let received = match deadline {
                Some(at) => commands.recv_timeout(at.saturating_duration_since(Instant::now())),
                None => commands
                    .recv()
                    .map_err(|_| RecvTimeoutError::Disconnected),
            };

            match received {
                Ok(SessionCommand::TextChanged(text)) => {
                    self.partitioned = partition(&text);
                    deadline = Some(Instant::now() + self.config.debounce);
                    debug!("Session {}: debounce reset", self.id);
                }
                Ok(SessionCommand::Viewport {
                    first_line,
                    last_line,
                }) => {
                    self.viewport = Some((first_line, last_line));
                    self.sync_scroll();
                }
                Ok(SessionCommand::View(message)) => self.handle_view_message(message),
                Ok(SessionCommand::Rerender(options)) => {
                    self.renderer.set_options(options);
                    self.snapshot = None;
                    deadline = None;
                    self.render_cycle();
                }
                Err(RecvTimeoutError::Timeout) => {
                    deadline = None;
                    self.render_cycle();
                }
                Ok(SessionCommand::Dispose) | Err(RecvTimeoutError::Disconnected) => break,
            }

            if self.is_disposed() {
                break;
            }
        }

        debug!("Session {} stopped", self.id);
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    fn emit(&self, event: SessionEvent) {
        if self.is_disposed() {
            return;
        }
        let _ = self.events.send((self.id, event));
    }

    /// Partition → diff → render → emit.
    fn render_cycle(&mut self) {
        let current = self.partitioned.clone();
        let result = match &self.snapshot {
            Some(previous) => diff(previous, &current, self.config.incremental),
            None => DiffResult::full_rebuild(RebuildReason::NoSnapshot),
        };

        if result.is_unchanged() {
            debug!("Session {}: nothing to render", self.id);
            return;
        }

        let outcome = if result.needs_full_rebuild() {
            self.renderer
                .render_full(&current)
                .map(|html| SessionEvent::Document { html })
        } else {
            self.renderer
                .render_blocks(&current, &result.dirty_blocks)
                .map(|blocks| SessionEvent::Message(HostMessage::UpdateBlocks { blocks }))
        };

        if self.is_disposed() {
            debug!("Session {}: dropping render finished after dispose", self.id);
            return;
        }

        match outcome {
            Ok(event) => {
                let replaced = matches!(event, SessionEvent::Document { .. });
                self.snapshot = Some(current);
                self.emit(event);
                if replaced {
                    self.scroll.invalidate();
                    self.sync_scroll();
                }
            }
            Err(e) => {
                error!("Session {}: {}", self.id, e);
                self.snapshot = None;
                self.emit(SessionEvent::Error(e.to_string()));
            }
        }
    }

    /// Send the block position of the viewport middle to the preview.
    fn sync_scroll(&mut self) {
        let Some((first, last)) = self.viewport else {
            return;
        };
        if !self.scroll.should_sync_from(ScrollOrigin::Editor) {
            debug!(
                "Session {}: editor scroll suppressed (last scroll from {:?})",
                self.id,
                self.scroll.origin()
            );
            return;
        }
        self.scroll.clear_origin();

        let position = locate(&self.partitioned, viewport_mid_line(first, last));
        if self.scroll.record_sent(position) {
            self.emit(SessionEvent::Message(HostMessage::scroll_to(position)));
        }
    }

    fn handle_view_message(&mut self, message: ViewMessage) {
        match message {
            ViewMessage::UpdateComplete => {
                self.scroll.invalidate();
                self.sync_scroll();
            }
            ViewMessage::ScrollToPosition {
                block_index,
                line_in_block,
            } => {
                let position = BlockPosition {
                    block_index,
                    line_in_block,
                };
                match source_line(&self.partitioned, position) {
                    Some(line) => {
                        self.scroll.mark_scroll(ScrollOrigin::Preview);
                        self.emit(SessionEvent::RevealLine(line));
                    }
                    None => debug!("Session {}: no source line for {:?}", self.id, position),
                }
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
