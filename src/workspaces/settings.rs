//! Workspace settings management.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ─────────────────────────────────────────────────────────────────────────────
// Workspace Settings
// ─────────────────────────────────────────────────────────────────────────────

/// Settings specific to a workspace.
///
/// Stored in `{workspace_root}/.mdtex-preview/settings.json`. A present
/// template override wins over the user configuration, even when empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WorkspaceSettings {
    /// LaTeX template list override (None = use global setting)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latex_template: Option<String>,

    /// HTML template list override (None = use global setting)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html_template: Option<String>,
}

impl WorkspaceSettings {
    /// Whether no override is set.
    pub fn is_empty(&self) -> bool {
        self.latex_template.is_none() && self.html_template.is_none()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Persistence
// ─────────────────────────────────────────────────────────────────────────────

/// The subdirectory name for workspace configuration.
const WORKSPACE_CONFIG_DIR: &str = ".mdtex-preview";

/// The settings file name.
const SETTINGS_FILE: &str = "settings.json";

/// Path of the settings file for a workspace root.
pub fn workspace_settings_path(workspace_root: &Path) -> PathBuf {
    workspace_root
        .join(WORKSPACE_CONFIG_DIR)
        .join(SETTINGS_FILE)
}

/// Load workspace settings from disk.
///
/// Returns `None` if the settings file doesn't exist or is invalid.
pub fn load_workspace_settings(workspace_root: &Path) -> Option<WorkspaceSettings> {
    let settings_path = workspace_settings_path(workspace_root);

    if !settings_path.exists() {
        log::debug!("No workspace settings file at {:?}", settings_path);
        return None;
    }

    match std::fs::read_to_string(&settings_path) {
        Ok(content) => match serde_json::from_str(&content) {
            Ok(settings) => {
                log::debug!("Loaded workspace settings from {:?}", settings_path);
                Some(settings)
            }
            Err(e) => {
                log::warn!("Failed to parse workspace settings: {}", e);
                None
            }
        },
        Err(e) => {
            log::warn!("Failed to read workspace settings: {}", e);
            None
        }
    }
}

/// Save workspace settings to disk.
///
/// Creates the `.mdtex-preview` directory if it doesn't exist. Saving
/// settings without any override removes the file instead.
pub fn save_workspace_settings(workspace_root: &Path, settings: &WorkspaceSettings) -> Result<()> {
    let settings_path = workspace_settings_path(workspace_root);

    if settings.is_empty() {
        if settings_path.exists() {
            std::fs::remove_file(&settings_path)?;
            log::info!("Removed workspace settings at {:?}", settings_path);
        }
        return Ok(());
    }

    let config_dir = workspace_root.join(WORKSPACE_CONFIG_DIR);
    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir).map_err(|e| Error::ConfigSave {
            path: config_dir.clone(),
            source: Box::new(e),
        })?;
    }

    let content = serde_json::to_string_pretty(settings)?;
    std::fs::write(&settings_path, content).map_err(|e| Error::ConfigSave {
        path: settings_path.clone(),
        source: Box::new(e),
    })?;
    log::info!("Saved workspace settings to {:?}", settings_path);

    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
