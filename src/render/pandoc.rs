//! External converter invocation
//!
//! Both conversion stages run the converter as a subprocess: input on
//! stdin, output on stdout, diagnostics on stderr, success iff the exit
//! status is zero.

use crate::config::{Settings, TemplateSet};
use crate::error::{Error, Result};
use log::debug;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::thread;

/// Stage name for the markdown → LaTeX conversion.
pub const STAGE_TO_LATEX: &str = "markdown to latex";

/// Stage name for the LaTeX → HTML conversion.
pub const STAGE_TO_HTML: &str = "latex to html";

// ─────────────────────────────────────────────────────────────────────────────
// Render Options
// ─────────────────────────────────────────────────────────────────────────────

/// Options passed to the two conversion stages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOptions {
    /// Math engine flag for the HTML stage, without leading dashes
    pub math_engine: String,
    /// Syntax highlight style name
    pub highlight_style: String,
    /// Templates for the markdown → LaTeX stage
    pub latex_templates: Vec<PathBuf>,
    /// Templates for the LaTeX → HTML stage
    pub html_templates: Vec<PathBuf>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self::from_settings(&Settings::default(), &TemplateSet::default())
    }
}

impl RenderOptions {
    /// Build options from user settings and the templates in effect.
    pub fn from_settings(settings: &Settings, templates: &TemplateSet) -> Self {
        Self {
            math_engine: settings.math_engine.clone(),
            highlight_style: settings.highlight_style.clone(),
            latex_templates: templates.latex.clone().unwrap_or_default(),
            html_templates: templates.html.clone().unwrap_or_default(),
        }
    }

    /// Arguments for the markdown → LaTeX stage.
    pub fn latex_args(&self) -> Vec<String> {
        let mut args: Vec<String> = ["-f", "markdown", "-t", "latex", "--listings"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        args.extend(template_args(&self.latex_templates));
        args
    }

    /// Arguments for the LaTeX → HTML stage.
    pub fn html_args(&self) -> Vec<String> {
        let mut args: Vec<String> = ["-f", "latex", "-t", "html"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        args.push(format!("--{}", self.math_engine));
        args.push(format!("--highlight-style={}", self.highlight_style));
        args.extend(template_args(&self.html_templates));
        args
    }
}

fn template_args(templates: &[PathBuf]) -> impl Iterator<Item = String> + '_ {
    templates
        .iter()
        .map(|t| format!("--template={}", t.to_string_lossy()))
}

// ─────────────────────────────────────────────────────────────────────────────
// Converter Trait
// ─────────────────────────────────────────────────────────────────────────────

/// The two-stage conversion pipeline.
pub trait Converter: Send {
    /// Convert block-partitioned markdown into LaTeX.
    fn to_latex(&self, markdown: &str, options: &RenderOptions) -> Result<String>;

    /// Convert LaTeX into HTML.
    fn to_html(&self, latex: &str, options: &RenderOptions) -> Result<String>;
}

/// Converter backed by the `pandoc` executable.
#[derive(Debug, Clone)]
pub struct PandocConverter {
    program: String,
}

impl PandocConverter {
    /// Create a converter running `program`.
    ///
    /// The path is passed to the OS as-is, never through a shell.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Run one stage, feeding `input` on stdin.
    fn run(&self, stage: &'static str, args: &[String], input: &str) -> Result<String> {
        debug!("Running {} ({}): {:?}", self.program, stage, args);

        let mut child = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| Error::Spawn {
                program: self.program.clone(),
                source,
            })?;

        // Feed stdin from a separate thread so a large output can't fill the
        // stdout pipe while we are still writing
        let writer = child.stdin.take().map(|mut stdin| {
            let input = input.to_owned();
            thread::spawn(move || stdin.write_all(input.as_bytes()))
        });

        let output = child.wait_with_output()?;

        if let Some(writer) = writer {
            match writer.join() {
                Ok(Ok(())) => {}
                // The converter may exit before reading everything; its
                // status and stderr tell the real story
                Ok(Err(e)) => debug!("Writing to {} stdin failed: {}", self.program, e),
                Err(_) => return Err(Error::Application("stdin writer panicked".to_string())),
            }
        }

        if !output.status.success() {
            return Err(Error::Conversion {
                stage,
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Converter for PandocConverter {
    fn to_latex(&self, markdown: &str, options: &RenderOptions) -> Result<String> {
        self.run(STAGE_TO_LATEX, &options.latex_args(), markdown)
    }

    fn to_html(&self, latex: &str, options: &RenderOptions) -> Result<String> {
        self.run(STAGE_TO_HTML, &options.html_args(), latex)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_args() {
        let options = RenderOptions::default();
        assert_eq!(
            options.latex_args(),
            vec!["-f", "markdown", "-t", "latex", "--listings"]
        );
        assert_eq!(
            options.html_args(),
            vec!["-f", "latex", "-t", "html", "--mathml", "--highlight-style=tango"]
        );
    }

    #[test]
    fn test_template_args() {
        let settings = Settings {
            math_engine: "katex".to_string(),
            highlight_style: "zenburn".to_string(),
            ..Settings::default()
        };
        let templates = TemplateSet {
            latex: Some(vec![PathBuf::from("a.tex"), PathBuf::from("b.tex")]),
            html: Some(vec![PathBuf::from("page.html")]),
        };
        let options = RenderOptions::from_settings(&settings, &templates);

        let latex = options.latex_args();
        assert_eq!(&latex[5..], ["--template=a.tex", "--template=b.tex"]);

        let html = options.html_args();
        assert!(html.contains(&"--katex".to_string()));
        assert!(html.contains(&"--highlight-style=zenburn".to_string()));
        assert_eq!(html.last().map(String::as_str), Some("--template=page.html"));
    }

    #[test]
    fn test_missing_program_is_spawn_error() {
        let converter = PandocConverter::new("/nonexistent/mdtex-preview-test-pandoc");
        let err = converter
            .to_latex("# x", &RenderOptions::default())
            .unwrap_err();
        assert!(matches!(err, Error::Spawn { .. }));
        assert!(err.is_conversion());
    }

    #[cfg(unix)]
    #[test]
    fn test_non_zero_exit_is_conversion_error() {
        // `false` ignores its arguments and exits with status 1
        let converter = PandocConverter::new("false");
        let err = converter
            .to_html("x", &RenderOptions::default())
            .unwrap_err();
        match err {
            Error::Conversion { stage, code, .. } => {
                assert_eq!(stage, STAGE_TO_HTML);
                assert_eq!(code, Some(1));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_output_is_captured() {
        // `cat` with no arguments echoes stdin
        let converter = PandocConverter::new("cat");
        let out = converter.run(STAGE_TO_LATEX, &[], "hello\nworld").unwrap();
        assert_eq!(out, "hello\nworld");
    }
}
