//! Template path lists for the two conversion stages
//!
//! Template settings are comma-separated path lists. Entries that contain
//! characters outside a conservative allow-list are dropped rather than
//! failing the session. A workspace override (see `workspaces::settings`)
//! takes precedence over the user-level setting.

use super::settings::{normalize_path, Settings};
use crate::workspaces::WorkspaceSettings;
use log::warn;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// ─────────────────────────────────────────────────────────────────────────────
// Template Kind
// ─────────────────────────────────────────────────────────────────────────────

/// Which conversion stage a template list belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateKind {
    /// Markdown → LaTeX stage
    Latex,
    /// LaTeX → HTML stage
    Html,
}

impl TemplateKind {
    /// Get the display label for this kind.
    pub fn label(&self) -> &'static str {
        match self {
            TemplateKind::Latex => "LaTeX",
            TemplateKind::Html => "HTML",
        }
    }
}

/// A change requested for one template list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum TemplateAction {
    /// Use these files as the workspace override
    SelectNew { paths: Vec<PathBuf> },
    /// Override with "no template" for this workspace
    UseDefault,
    /// Remove the workspace override and fall back to the user setting
    ClearOverride,
}

// ─────────────────────────────────────────────────────────────────────────────
// Parsing
// ─────────────────────────────────────────────────────────────────────────────

fn allowed_path_regex() -> &'static Regex {
    static ALLOWED: OnceLock<Regex> = OnceLock::new();
    ALLOWED.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9_\-/\\:\s.()]+$").expect("path allow-list pattern is valid")
    })
}

/// Whether a template path only uses allow-listed characters.
pub fn is_allowed_path(path: &str) -> bool {
    allowed_path_regex().is_match(path)
}

/// Parse a comma-separated template setting.
///
/// Returns `None` when no usable template remains.
pub fn parse_template_list(raw: &str) -> Option<Vec<PathBuf>> {
    let templates: Vec<PathBuf> = raw
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .filter(|entry| {
            let allowed = is_allowed_path(entry);
            if !allowed {
                warn!("Ignoring template path with unsupported characters: {}", entry);
            }
            allowed
        })
        .map(|entry| normalize_path(Path::new(entry)))
        .collect();

    if templates.is_empty() {
        None
    } else {
        Some(templates)
    }
}

/// Join template paths into the comma-separated setting form.
pub fn join_template_list(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(",")
}

// ─────────────────────────────────────────────────────────────────────────────
// Effective Templates
// ─────────────────────────────────────────────────────────────────────────────

/// Template lists in effect for both stages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateSet {
    /// Templates for the markdown → LaTeX stage
    pub latex: Option<Vec<PathBuf>>,
    /// Templates for the LaTeX → HTML stage
    pub html: Option<Vec<PathBuf>>,
}

impl TemplateSet {
    /// Resolve the templates in effect, preferring workspace overrides.
    pub fn resolve(settings: &Settings, workspace: &WorkspaceSettings) -> Self {
        let pick = |over: &Option<String>, user: &str| match over {
            Some(raw) => parse_template_list(raw),
            None => parse_template_list(user),
        };
        Self {
            latex: pick(&workspace.latex_template, &settings.latex_template),
            html: pick(&workspace.html_template, &settings.html_template),
        }
    }

    /// Templates for one stage.
    pub fn get(&self, kind: TemplateKind) -> Option<&[PathBuf]> {
        match kind {
            TemplateKind::Latex => self.latex.as_deref(),
            TemplateKind::Html => self.html.as_deref(),
        }
    }
}

/// Apply a template action to the workspace overrides.
pub fn apply_action(workspace: &mut WorkspaceSettings, kind: TemplateKind, action: &TemplateAction) {
    let value = match action {
        TemplateAction::SelectNew { paths } if paths.is_empty() => return,
        TemplateAction::SelectNew { paths } => Some(join_template_list(paths)),
        TemplateAction::UseDefault => Some(String::new()),
        TemplateAction::ClearOverride => None,
    };
    match kind {
        TemplateKind::Latex => workspace.latex_template = value,
        TemplateKind::Html => workspace.html_template = value,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Status Label
// ─────────────────────────────────────────────────────────────────────────────

/// Short description of the templates in effect, for a status bar.
///
/// `LaTeX Template: Default` without templates, otherwise the first path
/// (shortened to its last two components when deeper than two levels) and a
/// `...[+N]` suffix for additional templates.
pub fn status_label(kind: TemplateKind, templates: Option<&[PathBuf]>) -> String {
    let Some(first) = templates.and_then(|t| t.first()) else {
        return format!("{} Template: Default", kind.label());
    };

    let full = first.to_string_lossy();
    let full = full.trim_matches(|c| c == '\'' || c == '"');
    let levels: Vec<&str> = full.split(['/', '\\']).filter(|l| !l.is_empty()).collect();
    let shown = if levels.len() <= 2 {
        full.to_string()
    } else {
        format!("...{}/{}", levels[levels.len() - 2], levels[levels.len() - 1])
    };

    let extra = templates.map_or(0, |t| t.len().saturating_sub(1));
    let suffix = if extra > 0 {
        format!("...[+{}]", extra)
    } else {
        String::new()
    };
    format!("{} Template: \"{}\"{}", kind.label(), shown, suffix)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_template_list() {
        let parsed = parse_template_list(" a.tex , ./dir/b.tex,, ").unwrap();
        assert_eq!(parsed, vec![PathBuf::from("a.tex"), PathBuf::from("dir/b.tex")]);
    }

    #[test]
    fn test_parse_template_list_empty_is_none() {
        assert_eq!(parse_template_list(""), None);
        assert_eq!(parse_template_list(" , "), None);
    }

    #[test]
    fn test_disallowed_paths_are_dropped() {
        let parsed = parse_template_list("ok.tex,bad;rm.tex,$HOME/x.tex").unwrap();
        assert_eq!(parsed, vec![PathBuf::from("ok.tex")]);
        assert_eq!(parse_template_list("`whoami`.tex"), None);
    }

    #[test]
    fn test_allow_list_accepts_windows_paths() {
        assert!(is_allowed_path(r"C:\Users\me\My Templates (v2)\t.tex"));
    }

    #[test]
    fn test_resolve_prefers_workspace_override() {
        let settings = Settings {
            latex_template: "user.tex".to_string(),
            html_template: "user.html".to_string(),
            ..Settings::default()
        };
        let workspace = WorkspaceSettings {
            latex_template: Some("ws.tex".to_string()),
            html_template: Some(String::new()),
        };
        let set = TemplateSet::resolve(&settings, &workspace);
        assert_eq!(set.latex, Some(vec![PathBuf::from("ws.tex")]));
        assert_eq!(set.html, None);

        let set = TemplateSet::resolve(&settings, &WorkspaceSettings::default());
        assert_eq!(set.get(TemplateKind::Html), Some(&[PathBuf::from("user.html")][..]));
    }

    #[test]
    fn test_apply_actions() {
        let mut workspace = WorkspaceSettings::default();
        apply_action(
            &mut workspace,
            TemplateKind::Latex,
            &TemplateAction::SelectNew {
                paths: vec![PathBuf::from("a.tex"), PathBuf::from("b.tex")],
            },
        );
        assert_eq!(workspace.latex_template.as_deref(), Some("a.tex,b.tex"));

        apply_action(&mut workspace, TemplateKind::Latex, &TemplateAction::UseDefault);
        assert_eq!(workspace.latex_template.as_deref(), Some(""));

        apply_action(&mut workspace, TemplateKind::Latex, &TemplateAction::ClearOverride);
        assert_eq!(workspace.latex_template, None);
    }

    #[test]
    fn test_select_new_with_no_files_keeps_override() {
        let mut workspace = WorkspaceSettings {
            html_template: Some("keep.html".to_string()),
            ..WorkspaceSettings::default()
        };
        apply_action(
            &mut workspace,
            TemplateKind::Html,
            &TemplateAction::SelectNew { paths: Vec::new() },
        );
        assert_eq!(workspace.html_template.as_deref(), Some("keep.html"));
    }

    #[test]
    fn test_status_label_default() {
        assert_eq!(
            status_label(TemplateKind::Latex, None),
            "LaTeX Template: Default"
        );
    }

    #[test]
    fn test_status_label_short_and_long_paths() {
        let short = vec![PathBuf::from("dir/t.html")];
        assert_eq!(
            status_label(TemplateKind::Html, Some(short.as_slice())),
            "HTML Template: \"dir/t.html\""
        );

        let long = vec![
            PathBuf::from("/home/me/templates/paper.tex"),
            PathBuf::from("b.tex"),
            PathBuf::from("c.tex"),
        ];
        assert_eq!(
            status_label(TemplateKind::Latex, Some(long.as_slice())),
            "LaTeX Template: \"...templates/paper.tex\"...[+2]"
        );
    }

    #[test]
    fn test_template_action_json() {
        let action: TemplateAction =
            serde_json::from_str(r#"{"action": "selectNew", "paths": ["a.tex"]}"#).unwrap();
        assert_eq!(
            action,
            TemplateAction::SelectNew {
                paths: vec![PathBuf::from("a.tex")]
            }
        );
        let action: TemplateAction = serde_json::from_str(r#"{"action": "clearOverride"}"#).unwrap();
        assert_eq!(action, TemplateAction::ClearOverride);
    }
}
