//! Workspace support for the preview host
//!
//! This module provides:
//! - Workspace-level template overrides stored under the workspace root
//! - File watching for the previewed document

mod settings;
mod watcher;

pub use settings::{load_workspace_settings, save_workspace_settings, WorkspaceSettings};
pub use watcher::{DocumentEvent, DocumentWatcher};

use std::path::{Path, PathBuf};

// ─────────────────────────────────────────────────────────────────────────────
// Workspace
// ─────────────────────────────────────────────────────────────────────────────

/// A workspace root and its loaded overrides.
#[derive(Debug, Clone)]
pub struct Workspace {
    /// Root path of the workspace
    pub root_path: PathBuf,

    /// Workspace-specific settings
    pub settings: WorkspaceSettings,
}

impl Workspace {
    /// Open a workspace rooted at `root_path`.
    ///
    /// Loads settings from disk if available, otherwise uses defaults.
    pub fn new(root_path: PathBuf) -> Self {
        let settings = load_workspace_settings(&root_path).unwrap_or_default();
        Self {
            root_path,
            settings,
        }
    }

    /// Root path of the workspace.
    pub fn root(&self) -> &Path {
        &self.root_path
    }

    /// Save the workspace settings to disk.
    pub fn save_settings(&self) -> crate::error::Result<()> {
        save_workspace_settings(&self.root_path, &self.settings)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
