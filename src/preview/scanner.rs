//! Block Scanner
//!
//! Partitions a markdown document into independently recompilable blocks by
//! splicing marker lines (`&%&BLOCK_INDEX_<n>&%&`) in front of structurally
//! safe boundary lines.
//!
//! The scanner is a single-pass, line-oriented state machine. It tracks the
//! region the current line belongs to (front matter, fenced code, display
//! math) plus a stack of open raw LaTeX environments, and never places a
//! marker while any of them is open.
//!
//! # Example
//!
//! ```ignore
//! let partitioned = partition("Intro\n\n# Heading\nBody\n");
//! // "Intro\n\n&%&BLOCK_INDEX_0&%&\n\n# Heading\nBody\n"
//! ```

use log::debug;
use regex::Regex;
use std::sync::OnceLock;

// ─────────────────────────────────────────────────────────────────────────────
// Markers
// ─────────────────────────────────────────────────────────────────────────────

/// Leading sentinel of a marker line.
pub const MARKER_PREFIX: &str = "&%&BLOCK_INDEX_";

/// Trailing sentinel of a marker line.
pub const MARKER_SUFFIX: &str = "&%&";

/// Build the marker line for a block index.
pub fn marker_line(index: usize) -> String {
    format!("{}{}{}", MARKER_PREFIX, index, MARKER_SUFFIX)
}

/// Parse a line that is exactly a marker, returning its block index.
pub fn parse_marker(line: &str) -> Option<usize> {
    let digits = line
        .strip_prefix(MARKER_PREFIX)?
        .strip_suffix(MARKER_SUFFIX)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Whether a line is a marker line.
pub fn is_marker(line: &str) -> bool {
    parse_marker(line).is_some()
}

// ─────────────────────────────────────────────────────────────────────────────
// Region State
// ─────────────────────────────────────────────────────────────────────────────

/// Region the scanner is currently inside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Region {
    /// Ordinary markdown text
    Text,
    /// YAML front matter between `---` lines
    FrontMatter,
    /// Fenced code block
    Code,
    /// `$$` display math
    DisplayMath,
}

fn begin_env_regex() -> &'static Regex {
    static BEGIN: OnceLock<Regex> = OnceLock::new();
    BEGIN.get_or_init(|| Regex::new(r"\\begin\{([^}]+)\}").expect("begin pattern is valid"))
}

fn end_env_regex() -> &'static Regex {
    static END: OnceLock<Regex> = OnceLock::new();
    END.get_or_init(|| Regex::new(r"\\end\{([^}]+)\}").expect("end pattern is valid"))
}

/// Line-by-line scanner state. Lives for one `partition` call.
#[derive(Debug)]
struct BlockScanner {
    region: Region,
    front_matter_seen: bool,
    environments: Vec<String>,
    last_line_was_empty: bool,
    next_index: usize,
}

impl BlockScanner {
    fn new() -> Self {
        Self {
            region: Region::Text,
            front_matter_seen: false,
            environments: Vec::new(),
            // Leading structural lines never open a block: whatever precedes
            // the first marker is the preamble.
            last_line_was_empty: true,
            next_index: 0,
        }
    }

    /// Process one line. Returns the index of a marker to emit before it.
    fn scan_line(&mut self, line: &str) -> Option<usize> {
        let trimmed = line.trim();

        if trimmed == "---" {
            match self.region {
                Region::FrontMatter => {
                    self.region = Region::Text;
                    return None;
                }
                Region::Text if !self.front_matter_seen && self.environments.is_empty() => {
                    self.front_matter_seen = true;
                    self.region = Region::FrontMatter;
                    return None;
                }
                _ => {}
            }
        }

        if self.region == Region::FrontMatter {
            return None;
        }

        self.update_region(trimmed, line);

        if self.is_boundary(trimmed) {
            if !self.last_line_was_empty {
                self.last_line_was_empty = true;
                let index = self.next_index;
                self.next_index += 1;
                return Some(index);
            }
        } else if !trimmed.is_empty() {
            self.last_line_was_empty = false;
        }

        None
    }

    fn update_region(&mut self, trimmed: &str, line: &str) {
        if trimmed.starts_with("```") {
            match self.region {
                Region::Text => self.region = Region::Code,
                Region::Code => self.region = Region::Text,
                _ => {}
            }
        }

        if trimmed.starts_with("$$") {
            match self.region {
                Region::Text => self.region = Region::DisplayMath,
                Region::DisplayMath => self.region = Region::Text,
                _ => {}
            }
        }

        if self.region != Region::Text {
            return;
        }

        if let Some(caps) = begin_env_regex().captures(line) {
            self.environments.push(caps[1].to_string());
        }

        if let Some(caps) = end_env_regex().captures(line) {
            if self.environments.last().map(String::as_str) == Some(&caps[1]) {
                self.environments.pop();
            }
        }
    }

    fn is_boundary(&self, trimmed: &str) -> bool {
        if self.region != Region::Text || !self.environments.is_empty() {
            return false;
        }
        trimmed.is_empty()
            || trimmed.starts_with('#')
            || trimmed.starts_with("- ")
            || trimmed.starts_with("1. ")
            || trimmed.starts_with("\\[")
            || trimmed.starts_with("\\begin{")
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Partitioning
// ─────────────────────────────────────────────────────────────────────────────

/// Splice block markers into a document.
///
/// Every fired boundary line is replaced by three lines: an empty line, the
/// marker line, and the original line. Marker indices start at 0 and
/// increase by one.
pub fn partition(text: &str) -> String {
    let mut scanner = BlockScanner::new();
    let mut out = String::with_capacity(text.len() + text.len() / 8);

    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            out.push('\n');
        }
        if let Some(index) = scanner.scan_line(line) {
            out.push('\n');
            out.push_str(&marker_line(index));
            out.push('\n');
        }
        out.push_str(line);
    }

    debug!(
        "Partitioned document into {} marked blocks",
        scanner.next_index
    );
    out
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
