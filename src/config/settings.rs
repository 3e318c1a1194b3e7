//! User settings for the preview host
//!
//! This module defines the `Settings` struct that holds all user-configurable
//! options, with serde support for JSON persistence.

use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};

/// Converter executable used when none is configured.
pub const DEFAULT_PANDOC_PATH: &str = "pandoc";

/// Syntax highlight style used when none is configured.
pub const DEFAULT_HIGHLIGHT_STYLE: &str = "tango";

/// Math rendering engine used when none is configured.
pub const DEFAULT_MATH_ENGINE: &str = "mathml";

// ─────────────────────────────────────────────────────────────────────────────
// Main Settings Struct
// ─────────────────────────────────────────────────────────────────────────────

/// User preferences for rendering and incremental updates.
///
/// Serialized to JSON and persisted to the user's config directory. All
/// fields have defaults via `Default` and `#[serde(default)]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    // ─────────────────────────────────────────────────────────────────────────
    // Converter
    // ─────────────────────────────────────────────────────────────────────────
    /// Path to the pandoc executable (empty = default)
    pub pandoc_path: String,

    /// Comma-separated LaTeX template paths for the markdown → LaTeX stage
    pub latex_template: String,

    /// Comma-separated HTML template paths for the LaTeX → HTML stage
    pub html_template: String,

    /// Syntax highlight style name
    pub highlight_style: String,

    /// Math engine flag passed to the HTML stage (e.g. `mathml`, `mathjax`)
    pub math_engine: String,

    // ─────────────────────────────────────────────────────────────────────────
    // Incremental Updates
    // ─────────────────────────────────────────────────────────────────────────
    /// Recompile only changed blocks when possible
    pub incremental_compile: bool,

    /// Quiet period after the last edit before a render starts (milliseconds)
    pub debounce_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            pandoc_path: DEFAULT_PANDOC_PATH.to_string(),
            latex_template: String::new(),
            html_template: String::new(),
            highlight_style: DEFAULT_HIGHLIGHT_STYLE.to_string(),
            math_engine: DEFAULT_MATH_ENGINE.to_string(),
            incremental_compile: true,
            debounce_ms: 500,
        }
    }
}

impl Settings {
    /// Minimum debounce interval.
    pub const MIN_DEBOUNCE_MS: u64 = 50;
    /// Maximum debounce interval.
    pub const MAX_DEBOUNCE_MS: u64 = 10_000;

    /// Sanitize settings by restoring defaults for empty values and clamping
    /// numbers to valid ranges.
    ///
    /// This is useful after loading settings from a file that might have
    /// been manually edited with invalid values.
    pub fn sanitize(&mut self) {
        if self.pandoc_path.trim().is_empty() {
            self.pandoc_path = DEFAULT_PANDOC_PATH.to_string();
        } else if self.pandoc_path != DEFAULT_PANDOC_PATH {
            self.pandoc_path = normalize_path(Path::new(self.pandoc_path.trim()))
                .to_string_lossy()
                .into_owned();
        }

        if self.highlight_style.trim().is_empty() {
            self.highlight_style = DEFAULT_HIGHLIGHT_STYLE.to_string();
        }

        if self.math_engine.trim().is_empty() {
            self.math_engine = DEFAULT_MATH_ENGINE.to_string();
        }

        self.debounce_ms = self
            .debounce_ms
            .clamp(Self::MIN_DEBOUNCE_MS, Self::MAX_DEBOUNCE_MS);
    }

    /// Load settings and sanitize them to ensure validity.
    ///
    /// This is a convenience method that deserializes and then sanitizes.
    pub fn from_json_sanitized(json: &str) -> Result<Self, serde_json::Error> {
        let mut settings: Self = serde_json::from_str(json)?;
        settings.sanitize();
        Ok(settings)
    }
}

/// Lexically normalize a path: drop `.` components and fold `..` into the
/// preceding component where possible.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let can_pop = matches!(
                    out.components().next_back(),
                    Some(Component::Normal(_))
                );
                if can_pop {
                    out.pop();
                } else if !matches!(
                    out.components().next_back(),
                    Some(Component::RootDir | Component::Prefix(_))
                ) {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
