//! Block Differ
//!
//! Compares two marker-partitioned versions of a document and decides
//! whether the preview can be patched block by block or must be rebuilt.
//!
//! Missing markers, a changed preamble, a changed formatting command or a
//! change in the YAML front matter downgrade to a full rebuild.

use super::commands::commands_changed;
use super::scanner::parse_marker;
use log::debug;
use std::fmt;

// ─────────────────────────────────────────────────────────────────────────────
// Diff Result
// ─────────────────────────────────────────────────────────────────────────────

/// Why a diff decided a full rebuild is required.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebuildReason {
    /// Incremental compilation is switched off
    Disabled,
    /// Block headers do not line up between the two versions
    Desync,
    /// Content before the first marker changed
    PreambleChanged,
    /// The document lost blocks
    Shrunk,
    /// A formatting command changed inside the given block
    CommandChanged(usize),
    /// The YAML front matter payload changed
    FrontMatterChanged,
    /// There is no previously rendered version to compare against
    NoSnapshot,
}

impl fmt::Display for RebuildReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RebuildReason::Disabled => write!(f, "incremental compilation disabled"),
            RebuildReason::Desync => write!(f, "block markers out of sync"),
            RebuildReason::PreambleChanged => write!(f, "preamble changed"),
            RebuildReason::Shrunk => write!(f, "document lost blocks"),
            RebuildReason::CommandChanged(index) => {
                write!(f, "formatting command changed in block {}", index)
            }
            RebuildReason::FrontMatterChanged => write!(f, "front matter changed"),
            RebuildReason::NoSnapshot => write!(f, "no previous render"),
        }
    }
}

/// Outcome of diffing two partitioned documents.
///
/// When a full rebuild is required, `dirty_blocks` carries no meaning.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DiffResult {
    /// Block indices to recompile, ascending and unique
    pub dirty_blocks: Vec<usize>,
    /// Set when the whole document must be recompiled
    pub rebuild: Option<RebuildReason>,
}

impl DiffResult {
    /// A result requiring a full rebuild.
    pub fn full_rebuild(reason: RebuildReason) -> Self {
        Self {
            dirty_blocks: Vec::new(),
            rebuild: Some(reason),
        }
    }

    /// A result patching only the given blocks.
    pub fn partial(dirty_blocks: Vec<usize>) -> Self {
        Self {
            dirty_blocks,
            rebuild: None,
        }
    }

    /// Whether the whole document must be recompiled.
    pub fn needs_full_rebuild(&self) -> bool {
        self.rebuild.is_some()
    }

    /// Whether nothing needs to be recompiled at all.
    pub fn is_unchanged(&self) -> bool {
        !self.needs_full_rebuild() && self.dirty_blocks.is_empty()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Block Splitting
// ─────────────────────────────────────────────────────────────────────────────

/// A run of partitioned text starting at a marker line (or the preamble).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment<'a> {
    /// Index from the marker header, `None` for the preamble
    pub index: Option<usize>,
    /// Segment text including its marker line
    pub text: &'a str,
}

/// Split partitioned text so that every marker line begins a new segment.
pub fn split_blocks(text: &str) -> Vec<Segment<'_>> {
    let mut starts = Vec::new();
    let mut offset = 0;
    for line in text.split('\n') {
        if parse_marker(line).is_some() {
            starts.push(offset);
        }
        offset += line.len() + 1;
    }
    if starts.first() != Some(&0) {
        starts.insert(0, 0);
    }

    starts
        .iter()
        .enumerate()
        .map(|(i, &start)| {
            let end = starts.get(i + 1).copied().unwrap_or(text.len());
            let segment = &text[start..end];
            let header = segment.split('\n').next().unwrap_or_default();
            Segment {
                index: parse_marker(header),
                text: segment,
            }
        })
        .collect()
}

/// Text between the first and second `---` delimiter, if any.
fn front_matter(text: &str) -> Option<&str> {
    if !text.contains("---") {
        return None;
    }
    text.split("---").nth(1)
}

// ─────────────────────────────────────────────────────────────────────────────
// Diffing
// ─────────────────────────────────────────────────────────────────────────────

/// Diff two partitioned documents.
///
/// With `incremental` off this always asks for a full rebuild. Otherwise the
/// block sequences are walked in lockstep; blocks appended at the end are
/// dirty. A non-empty dirty set is collapsed to the indices at or above its
/// maximum. A change in the front matter always forces a full rebuild.
pub fn diff(previous: &str, current: &str, incremental: bool) -> DiffResult {
    if !incremental {
        return DiffResult::full_rebuild(RebuildReason::Disabled);
    }

    let mut result = diff_blocks(previous, current);

    if !result.needs_full_rebuild() {
        if let (Some(old), Some(new)) = (front_matter(previous), front_matter(current)) {
            if old != new {
                result = DiffResult::full_rebuild(RebuildReason::FrontMatterChanged);
            }
        }
    }

    match result.rebuild {
        Some(reason) => debug!("Full rebuild required: {}", reason),
        None => debug!("Dirty blocks: {:?}", result.dirty_blocks),
    }
    result
}

fn diff_blocks(previous: &str, current: &str) -> DiffResult {
    let old_blocks = split_blocks(previous);
    let new_blocks = split_blocks(current);

    if new_blocks.len() < old_blocks.len() {
        return DiffResult::full_rebuild(RebuildReason::Shrunk);
    }

    let mut dirty = Vec::new();
    let mut last_index: Option<usize> = None;

    for (old, new) in old_blocks.iter().zip(&new_blocks) {
        match (old.index, new.index) {
            (Some(old_index), Some(new_index)) if old_index == new_index => {
                if old.text != new.text {
                    if commands_changed(old.text, new.text) {
                        return DiffResult::full_rebuild(RebuildReason::CommandChanged(new_index));
                    }
                    dirty.push(new_index);
                }
                last_index = Some(new_index);
            }
            (None, None) => {
                if old.text != new.text {
                    return DiffResult::full_rebuild(RebuildReason::PreambleChanged);
                }
            }
            _ => return DiffResult::full_rebuild(RebuildReason::Desync),
        }
    }

    for new in &new_blocks[old_blocks.len()..] {
        let expected = last_index.map_or(0, |i| i + 1);
        match new.index {
            Some(index) if index == expected => {
                dirty.push(index);
                last_index = Some(index);
            }
            _ => return DiffResult::full_rebuild(RebuildReason::Desync),
        }
    }

    if let Some(&max) = dirty.iter().max() {
        dirty.retain(|&index| index >= max);
    }
    DiffResult::partial(dirty)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preview::scanner::partition;

    const DOC: &str = "Intro\n\n# One\nfirst body\n\n# Two\nsecond body\n\n# Three\nthird body";

    #[test]
    fn test_split_blocks_preamble_and_markers() {
        let text = partition(DOC);
        let blocks = split_blocks(&text);
        assert_eq!(blocks.len(), 4);
        assert_eq!(blocks[0].index, None);
        assert_eq!(blocks[0].text, "Intro\n\n");
        assert_eq!(
            blocks.iter().skip(1).map(|b| b.index).collect::<Vec<_>>(),
            vec![Some(0), Some(1), Some(2)]
        );
        assert!(blocks[1].text.starts_with("&%&BLOCK_INDEX_0&%&\n"));
        let joined: String = blocks.iter().map(|b| b.text).collect();
        assert_eq!(joined, text);
    }

    #[test]
    fn test_split_blocks_leading_marker_has_no_preamble() {
        let blocks = split_blocks("&%&BLOCK_INDEX_0&%&\nbody");
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].index, Some(0));
    }

    #[test]
    fn test_identical_documents_are_unchanged() {
        let text = partition(DOC);
        let result = diff(&text, &text, true);
        assert_eq!(result, DiffResult::partial(Vec::new()));
        assert!(result.is_unchanged());
    }

    #[test]
    fn test_kill_switch_always_rebuilds() {
        let text = partition(DOC);
        let result = diff(&text, &text, false);
        assert!(result.needs_full_rebuild());
        assert_eq!(result.rebuild, Some(RebuildReason::Disabled));
    }

    #[test]
    fn test_single_block_edit_is_partial() {
        let old = partition(DOC);
        let new = partition(&DOC.replace("second body", "second body edited"));
        let result = diff(&old, &new, true);
        assert_eq!(result, DiffResult::partial(vec![1]));
    }

    #[test]
    fn test_dirty_set_collapses_to_maximum() {
        let old = partition(DOC);
        let edited = DOC
            .replace("first body", "first body!")
            .replace("third body", "third body!");
        let result = diff(&old, &partition(&edited), true);
        assert_eq!(result.dirty_blocks, vec![2]);
        assert!(!result.needs_full_rebuild());
    }

    #[test]
    fn test_command_change_forces_rebuild() {
        let old = partition(DOC);
        let new = partition(&DOC.replace("second body", r"second \label{sec:two} body"));
        let result = diff(&old, &new, true);
        assert_eq!(result.rebuild, Some(RebuildReason::CommandChanged(1)));
    }

    #[test]
    fn test_preamble_change_forces_rebuild() {
        let old = partition(DOC);
        let new = partition(&DOC.replace("Intro", "Introduction"));
        let result = diff(&old, &new, true);
        assert_eq!(result.rebuild, Some(RebuildReason::PreambleChanged));
    }

    #[test]
    fn test_appended_blocks_are_dirty() {
        let old = partition(DOC);
        let new = partition(&format!("{}\n\n# Four\nfourth body", DOC));
        let result = diff(&old, &new, true);
        assert!(!result.needs_full_rebuild());
        assert_eq!(result.dirty_blocks, vec![3]);
    }

    #[test]
    fn test_shrinking_document_forces_rebuild() {
        let old = partition(DOC);
        let new = partition("Intro\n\n# One\nfirst body");
        assert_eq!(diff(&old, &new, true).rebuild, Some(RebuildReason::Shrunk));
    }

    #[test]
    fn test_shrink_to_unmarked_text_rebuilds() {
        let old = partition(DOC);
        let result = diff(&old, "no markers at all", true);
        assert_eq!(result.rebuild, Some(RebuildReason::Shrunk));
    }

    #[test]
    fn test_index_gap_in_appended_blocks_is_desync() {
        let broken = "Intro\n\n&%&BLOCK_INDEX_0&%&\nbody\n&%&BLOCK_INDEX_5&%&\nmore";
        let base = "Intro\n\n&%&BLOCK_INDEX_0&%&\nbody";
        assert_eq!(
            diff(base, broken, true).rebuild,
            Some(RebuildReason::Desync)
        );
    }

    #[test]
    fn test_first_render_against_empty_snapshot_rebuilds() {
        let result = diff("", &partition(DOC), true);
        assert!(result.needs_full_rebuild());
    }

    #[test]
    fn test_front_matter_change_forces_rebuild() {
        let doc = "---\ntitle: A\n---\nIntro\n\n# One\nbody";
        let old = partition(doc);
        let new = partition(&doc.replace("title: A", "title: B"));
        assert_eq!(
            diff(&old, &new, true).rebuild,
            Some(RebuildReason::PreambleChanged)
        );
    }

    #[test]
    fn test_front_matter_inside_block_forces_rebuild() {
        let doc = "Text\n\n# H\n---\ntitle: A\n---\nbody";
        let old = partition(doc);
        let new = partition(&doc.replace("title: A", "title: B"));
        assert_eq!(diff_blocks(&old, &new), DiffResult::partial(vec![0]));
        assert_eq!(
            diff(&old, &new, true).rebuild,
            Some(RebuildReason::FrontMatterChanged)
        );
    }

    #[test]
    fn test_front_matter_payload_extraction() {
        assert_eq!(front_matter("---\na: 1\n---\nrest"), Some("\na: 1\n"));
        assert_eq!(front_matter("no delimiter"), None);
    }
}
