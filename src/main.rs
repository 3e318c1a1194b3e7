//! mdtex-preview - Main Entry Point
//!
//! Incremental Markdown + LaTeX preview host. Documents are converted with
//! pandoc (markdown → LaTeX → HTML); edits recompile only the blocks that
//! changed.

mod config;
mod error;
mod preview;
mod render;
mod session;
mod workspaces;

use clap::{Parser, Subcommand};
use config::{get_config_file_path, load_config, save_config, status_label, Settings, TemplateKind, TemplateSet};
use error::{Error, Result};
use log::{debug, error, info, warn};
use preview::partition;
use render::{page_title, render_page, splice_fragments, PandocConverter, RenderOptions, Renderer};
use session::{HostMessage, PreviewController, Request, Response, SessionEvent};
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::mpsc::channel;
use std::thread;
use std::time::Duration;
use workspaces::{DocumentEvent, DocumentWatcher, Workspace};

/// Application name constant.
const APP_NAME: &str = "mdtex-preview";

/// How long `watch` waits for a file event before draining session events.
const WATCH_POLL_INTERVAL: Duration = Duration::from_millis(50);

// ─────────────────────────────────────────────────────────────────────────────
// Command Line
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Parser)]
#[command(
    name = "mdtex-preview",
    version,
    about = "Incremental Markdown + LaTeX preview through pandoc"
)]
struct Cli {
    /// Workspace root holding template overrides (default: current directory)
    #[arg(long, global = true, value_name = "DIR")]
    workspace: Option<PathBuf>,

    /// Always re-render the whole document
    #[arg(long, global = true)]
    no_incremental: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Render a document once to a standalone HTML page
    Render {
        /// Markdown document
        file: PathBuf,
        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Keep an HTML page up to date while a document changes on disk
    Watch {
        /// Markdown document
        file: PathBuf,
        /// Output file (default: the document with an .html extension)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Speak line-delimited JSON on stdin/stdout for editor integrations
    Serve,
    /// Show the effective configuration
    Config {
        /// Write the effective configuration to the config file
        #[arg(long)]
        init: bool,
    },
}

fn main() -> ExitCode {
    // Logs go to stderr so they never mix with `serve` output
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    debug!("Starting {} with {:?}", APP_NAME, cli);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}: {}", APP_NAME, e);
            // Converter failures get their own status so scripts can tell
            // a broken document from a broken setup
            if e.is_conversion() {
                ExitCode::from(2)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut settings = load_config();
    if cli.no_incremental {
        settings.incremental_compile = false;
    }

    let root = match cli.workspace {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };
    let workspace = Workspace::new(root);
    debug!("Workspace root: {}", workspace.root().display());

    let converter = PandocConverter::new(settings.pandoc_path.clone());

    match cli.command {
        Command::Render { file, output } => {
            render_once(&settings, &workspace, converter, &file, output.as_deref())
        }
        Command::Watch { file, output } => {
            let output = output.unwrap_or_else(|| file.with_extension("html"));
            watch(settings, workspace, converter, file, output)
        }
        Command::Serve => serve(settings, workspace, converter),
        Command::Config { init } => show_config(&settings, &workspace, init),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// render
// ─────────────────────────────────────────────────────────────────────────────

fn render_once(
    settings: &Settings,
    workspace: &Workspace,
    converter: PandocConverter,
    file: &Path,
    output: Option<&Path>,
) -> Result<()> {
    let templates = TemplateSet::resolve(settings, &workspace.settings);
    let renderer = Renderer::new(converter, RenderOptions::from_settings(settings, &templates));

    let text = fs::read_to_string(file)?;
    let html = renderer.render_full(&partition(&text))?;
    let page = render_page(&html, page_title(file));

    match output {
        Some(path) => {
            fs::write(path, page)?;
            info!("Wrote {}", path.display());
        }
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(page.as_bytes())?;
            stdout.flush()?;
        }
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// watch
// ─────────────────────────────────────────────────────────────────────────────

fn watch(
    settings: Settings,
    workspace: Workspace,
    converter: PandocConverter,
    file: PathBuf,
    output: PathBuf,
) -> Result<()> {
    let (tx, events) = channel();
    let mut controller = PreviewController::new(settings, workspace, converter, tx);
    let (latex_label, html_label) = controller.status_labels();
    info!("{} | {}", latex_label, html_label);

    let watcher = DocumentWatcher::new(file.clone())?;
    controller.open(&file, fs::read_to_string(&file)?);
    info!(
        "Watching {}, writing {}",
        watcher.path().display(),
        output.display()
    );

    let title = page_title(&file).map(str::to_string);
    let mut content: Option<String> = None;

    loop {
        match watcher.next_event(WATCH_POLL_INTERVAL) {
            Some(DocumentEvent::Modified) => match fs::read_to_string(&file) {
                Ok(text) => {
                    controller.text_changed(&file, &text);
                }
                // Mid-save states can be briefly unreadable
                Err(e) => debug!("Skipping unreadable {}: {}", file.display(), e),
            },
            Some(DocumentEvent::Removed) => {
                warn!("{} was removed; waiting for it to reappear", file.display());
            }
            Some(DocumentEvent::Error(message)) => warn!("File watcher error: {}", message),
            None => {}
        }

        while let Ok((_, event)) = events.try_recv() {
            let updated = match event {
                SessionEvent::Document { html } => html,
                SessionEvent::Message(HostMessage::UpdateBlocks { blocks }) => match &content {
                    Some(current) => splice_fragments(current, &blocks),
                    None => continue,
                },
                SessionEvent::Message(HostMessage::ScrollToPosition { .. })
                | SessionEvent::RevealLine(_) => continue,
                SessionEvent::Error(message) => {
                    error!("{}", message);
                    continue;
                }
            };
            fs::write(&output, render_page(&updated, title.as_deref()))?;
            debug!("Updated {}", output.display());
            content = Some(updated);
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// serve
// ─────────────────────────────────────────────────────────────────────────────

/// Write one response line to stdout.
fn emit(response: &Response) {
    match serde_json::to_string(response) {
        Ok(json) => {
            let mut stdout = io::stdout().lock();
            if writeln!(stdout, "{}", json).and_then(|_| stdout.flush()).is_err() {
                debug!("stdout closed, dropping response");
            }
        }
        Err(e) => error!("Failed to encode response: {}", e),
    }
}

fn emit_template_labels(controller: &PreviewController<PandocConverter>) {
    let (latex_label, html_label) = controller.status_labels();
    emit(&Response::Templates {
        latex_label,
        html_label,
    });
}

fn serve(settings: Settings, workspace: Workspace, converter: PandocConverter) -> Result<()> {
    let (tx, events) = channel();
    let forwarder = thread::spawn(move || {
        for (session, event) in events {
            emit(&Response::from_event(session, event));
        }
    });

    let mut controller = PreviewController::new(settings, workspace, converter, tx);
    emit_template_labels(&controller);
    info!("Serving on stdin/stdout");

    for line in io::stdin().lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        if let Err(e) = handle_request(&mut controller, &line) {
            warn!("{}", e);
            emit(&Response::Error {
                session: None,
                message: e.to_string(),
            });
        }
    }

    if !controller.registry().is_empty() {
        info!("Input closed, disposing {} preview(s)", controller.registry().len());
    }
    drop(controller);

    // Sessions drop their event senders as they stop
    if forwarder.join().is_err() {
        return Err(Error::Application("event forwarder panicked".to_string()));
    }
    Ok(())
}

fn handle_request(controller: &mut PreviewController<PandocConverter>, line: &str) -> Result<()> {
    match Request::parse(line)? {
        Request::Open {
            document,
            text,
            first_line,
            last_line,
        } => {
            let text = match text {
                Some(text) => text,
                None => fs::read_to_string(&document)?,
            };
            // Announce the id before the session can emit anything
            emit(&Response::Opened {
                session: controller.registry().peek_next_id(),
                document: document.clone(),
            });
            controller.open(&document, text);
            if let (Some(first), Some(last)) = (first_line, last_line) {
                controller.viewport(&document, first, last);
            }
        }
        Request::Change { document, text } => {
            if controller.text_changed(&document, &text) == 0 {
                debug!("No preview open for {}", document.display());
            }
        }
        Request::Viewport {
            document,
            first_line,
            last_line,
        } => {
            controller.viewport(&document, first_line, last_line);
        }
        Request::View { session, message } => controller.view_message(session, message)?,
        Request::Close { session } => {
            if !controller.close(session) {
                return Err(Error::Protocol(format!("unknown session {}", session)));
            }
            emit(&Response::Closed { session });
        }
        Request::Template { kind, action } => {
            controller.apply_template_action(kind, &action)?;
            emit_template_labels(controller);
        }
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// config
// ─────────────────────────────────────────────────────────────────────────────

fn show_config(settings: &Settings, workspace: &Workspace, init: bool) -> Result<()> {
    if init {
        let path = save_config(settings)?;
        println!("Wrote {}", path.display());
        return Ok(());
    }

    let templates = TemplateSet::resolve(settings, &workspace.settings);
    println!("# {}", get_config_file_path()?.display());
    println!("{}", serde_json::to_string_pretty(settings)?);
    for kind in [TemplateKind::Latex, TemplateKind::Html] {
        println!("# {}", status_label(kind, templates.get(kind)));
    }
    Ok(())
}
