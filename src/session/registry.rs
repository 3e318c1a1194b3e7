//! Session registry and preview controller
//!
//! The registry maps session ids to the document each session previews, so
//! editor events can be routed to every session showing that document. The
//! controller owns the registry together with the settings and workspace
//! overrides every session is started with.

use super::actor::{EventSender, PreviewSession, SessionConfig};
use super::protocol::{SessionId, ViewMessage};
use crate::config::{
    apply_action, normalize_path, status_label, Settings, TemplateAction, TemplateKind,
    TemplateSet,
};
use crate::error::{Error, Result};
use crate::render::{Converter, RenderOptions, Renderer};
use crate::workspaces::Workspace;
use log::{debug, info};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

// ─────────────────────────────────────────────────────────────────────────────
// Session Registry
// ─────────────────────────────────────────────────────────────────────────────

/// One registered session.
#[derive(Debug)]
pub struct SessionEntry {
    /// Document the session previews
    pub document: PathBuf,
    /// Session handle
    pub session: PreviewSession,
}

/// Association table from session id to document.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: BTreeMap<SessionId, SessionEntry>,
    last_id: SessionId,
}

impl SessionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The id the next reservation will return.
    pub fn peek_next_id(&self) -> SessionId {
        self.last_id + 1
    }

    /// Reserve a fresh session id.
    pub fn next_id(&mut self) -> SessionId {
        self.last_id += 1;
        self.last_id
    }

    /// Register a session for `document`.
    pub fn insert(&mut self, document: &Path, session: PreviewSession) {
        let document = normalize_path(document);
        debug!("Registering session {} for {}", session.id(), document.display());
        self.sessions.insert(
            session.id(),
            SessionEntry { document, session },
        );
    }

    /// Look up a session.
    pub fn get(&self, id: SessionId) -> Option<&SessionEntry> {
        self.sessions.get(&id)
    }

    /// Remove a session and dispose it.
    pub fn close(&mut self, id: SessionId) -> Option<SessionEntry> {
        let entry = self.sessions.remove(&id)?;
        entry.session.dispose();
        Some(entry)
    }

    /// Sessions previewing `document`.
    pub fn for_document(&self, document: &Path) -> impl Iterator<Item = &PreviewSession> {
        let document = normalize_path(document);
        self.sessions
            .values()
            .filter(move |entry| entry.document == document)
            .map(|entry| &entry.session)
    }

    /// All registered sessions.
    pub fn sessions(&self) -> impl Iterator<Item = &PreviewSession> {
        self.sessions.values().map(|entry| &entry.session)
    }

    /// Number of registered sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether no session is registered.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Dispose and remove every session.
    pub fn clear(&mut self) {
        for (_, entry) in std::mem::take(&mut self.sessions) {
            entry.session.dispose();
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Preview Controller
// ─────────────────────────────────────────────────────────────────────────────

/// Top-level owner of all preview sessions.
///
/// Dropping the controller disposes every session.
pub struct PreviewController<C> {
    settings: Settings,
    workspace: Workspace,
    converter: C,
    registry: SessionRegistry,
    events: EventSender,
}

impl<C: Converter + Clone + 'static> PreviewController<C> {
    /// Create a controller. Session events are sent to `events`.
    pub fn new(settings: Settings, workspace: Workspace, converter: C, events: EventSender) -> Self {
        Self {
            settings,
            workspace,
            converter,
            registry: SessionRegistry::new(),
            events,
        }
    }

    /// Templates in effect for this workspace.
    pub fn templates(&self) -> TemplateSet {
        TemplateSet::resolve(&self.settings, &self.workspace.settings)
    }

    /// Options new renders use.
    pub fn render_options(&self) -> RenderOptions {
        RenderOptions::from_settings(&self.settings, &self.templates())
    }

    /// A renderer with the current options.
    pub fn renderer(&self) -> Renderer<C> {
        Renderer::new(self.converter.clone(), self.render_options())
    }

    fn session_config(&self) -> SessionConfig {
        SessionConfig {
            debounce: Duration::from_millis(self.settings.debounce_ms),
            incremental: self.settings.incremental_compile,
        }
    }

    /// Open a preview session for `document`.
    pub fn open(&mut self, document: &Path, text: String) -> SessionId {
        let id = self.registry.next_id();
        let session = PreviewSession::spawn(
            id,
            text,
            self.renderer(),
            self.session_config(),
            self.events.clone(),
        );
        self.registry.insert(document, session);
        info!("Opened preview {} for {}", id, document.display());
        id
    }

    /// Route a text change to every session on `document`.
    ///
    /// Returns the number of sessions notified.
    pub fn text_changed(&self, document: &Path, text: &str) -> usize {
        let mut notified = 0;
        for session in self.registry.for_document(document) {
            session.on_text_changed(text.to_string());
            notified += 1;
        }
        notified
    }

    /// Route a viewport change to every session on `document`.
    pub fn viewport(&self, document: &Path, first_line: usize, last_line: usize) -> usize {
        let mut notified = 0;
        for session in self.registry.for_document(document) {
            session.on_viewport(first_line, last_line);
            notified += 1;
        }
        notified
    }

    /// Deliver a message from a session's preview page.
    pub fn view_message(&self, id: SessionId, message: ViewMessage) -> Result<()> {
        let entry = self
            .registry
            .get(id)
            .ok_or_else(|| Error::Protocol(format!("unknown session {}", id)))?;
        entry.session.on_view_message(message);
        Ok(())
    }

    /// Close a session. Returns false if the id is unknown.
    pub fn close(&mut self, id: SessionId) -> bool {
        match self.registry.close(id) {
            Some(entry) => {
                info!("Closed preview {} for {}", id, entry.document.display());
                true
            }
            None => false,
        }
    }

    /// Apply a template action, save the workspace override and re-render
    /// every open session.
    pub fn apply_template_action(&mut self, kind: TemplateKind, action: &TemplateAction) -> Result<()> {
        apply_action(&mut self.workspace.settings, kind, action);
        self.workspace.save_settings()?;

        let options = self.render_options();
        info!(
            "{}; re-rendering {} session(s)",
            status_label(kind, self.templates().get(kind)),
            self.registry.len()
        );
        for session in self.registry.sessions() {
            session.rerender(options.clone());
        }
        Ok(())
    }

    /// Status bar labels for the LaTeX and HTML template lists.
    pub fn status_labels(&self) -> (String, String) {
        let templates = self.templates();
        (
            status_label(TemplateKind::Latex, templates.get(TemplateKind::Latex)),
            status_label(TemplateKind::Html, templates.get(TemplateKind::Html)),
        )
    }

    /// The session registry.
    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }
}

impl<C> Drop for PreviewController<C> {
    fn drop(&mut self) {
        self.registry.clear();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::testing::FakeConverter;
    use crate::session::actor::SessionEvent;
    use std::sync::mpsc::{channel, Receiver};
    use tempfile::TempDir;

    const WAIT: Duration = Duration::from_secs(5);

    struct TestEnv {
        _temp_dir: TempDir,
        controller: PreviewController<FakeConverter>,
        events: Receiver<(SessionId, SessionEvent)>,
    }

    impl TestEnv {
        fn new() -> Self {
            let temp_dir = TempDir::new().expect("Failed to create temp dir");
            let settings = Settings {
                debounce_ms: Settings::MIN_DEBOUNCE_MS,
                latex_template: "user.tex".to_string(),
                ..Settings::default()
            };
            let workspace = Workspace::new(temp_dir.path().to_path_buf());
            let (tx, rx) = channel();
            let controller =
                PreviewController::new(settings, workspace, FakeConverter::default(), tx);
            Self {
                _temp_dir: temp_dir,
                controller,
                events: rx,
            }
        }

        fn next(&self) -> (SessionId, SessionEvent) {
            self.events.recv_timeout(WAIT).expect("event")
        }
    }

    #[test]
    fn test_open_assigns_ids_and_renders() {
        let mut env = TestEnv::new();
        let expected = env.controller.registry().peek_next_id();
        let a = env.controller.open(Path::new("a.md"), "A\n".to_string());
        let b = env.controller.open(Path::new("b.md"), "B\n".to_string());
        assert_eq!(a, expected);
        assert_ne!(a, b);
        assert_eq!(env.controller.registry().len(), 2);

        let mut opened = vec![env.next().0, env.next().0];
        opened.sort();
        assert_eq!(opened, vec![a, b]);
    }

    #[test]
    fn test_text_changes_route_by_document() {
        let mut env = TestEnv::new();
        let first = env.controller.open(Path::new("doc.md"), "x\n".to_string());
        let second = env.controller.open(Path::new("./doc.md"), "x\n".to_string());
        env.controller.open(Path::new("other.md"), "y\n".to_string());
        for _ in 0..3 {
            env.next();
        }

        assert_eq!(env.controller.text_changed(Path::new("doc.md"), "x y\n"), 2);
        assert_eq!(env.controller.viewport(Path::new("missing.md"), 0, 10), 0);

        let mut updated = vec![env.next().0, env.next().0];
        updated.sort();
        assert_eq!(updated, vec![first, second]);
    }

    #[test]
    fn test_close_disposes_session() {
        let mut env = TestEnv::new();
        let id = env.controller.open(Path::new("doc.md"), "x\n".to_string());
        env.next();

        assert!(env.controller.close(id));
        assert!(!env.controller.close(id));
        assert!(env.controller.registry().is_empty());
        assert_eq!(env.controller.text_changed(Path::new("doc.md"), "z\n"), 0);
    }

    #[test]
    fn test_registry_close_returns_disposed_entry() {
        let (tx, _rx) = channel();
        let mut registry = SessionRegistry::new();
        let id = registry.next_id();
        let renderer = Renderer::new(FakeConverter::default(), RenderOptions::default());
        let session = PreviewSession::spawn(id, String::new(), renderer, SessionConfig::default(), tx);
        registry.insert(Path::new("notes/../doc.md"), session);

        assert_eq!(registry.for_document(Path::new("doc.md")).count(), 1);
        let entry = registry.close(id).unwrap();
        assert_eq!(entry.document, PathBuf::from("doc.md"));
        assert!(entry.session.is_disposed());
    }

    #[test]
    fn test_view_message_for_unknown_session() {
        let env = TestEnv::new();
        let err = env
            .controller
            .view_message(99, ViewMessage::UpdateComplete)
            .unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[test]
    fn test_template_action_saves_override_and_rerenders() {
        let mut env = TestEnv::new();
        let id = env.controller.open(Path::new("doc.md"), "x\n".to_string());
        env.next();

        assert_eq!(
            env.controller.status_labels().0,
            "LaTeX Template: \"user.tex\""
        );

        env.controller
            .apply_template_action(TemplateKind::Latex, &TemplateAction::UseDefault)
            .unwrap();
        assert_eq!(env.controller.status_labels().0, "LaTeX Template: Default");
        assert!(env.controller.render_options().latex_templates.is_empty());

        // Override persisted for the next run
        let reopened = Workspace::new(env.controller.workspace.root().to_path_buf());
        assert_eq!(reopened.settings.latex_template.as_deref(), Some(""));

        let (session, event) = env.next();
        assert_eq!(session, id);
        assert!(matches!(event, SessionEvent::Document { .. }));

        env.controller
            .apply_template_action(TemplateKind::Latex, &TemplateAction::ClearOverride)
            .unwrap();
        assert_eq!(
            env.controller.render_options().latex_templates,
            vec![PathBuf::from("user.tex")]
        );
    }
}
