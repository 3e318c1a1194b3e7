//! Position Mapper
//!
//! Converts between source line numbers (in the document as the user sees
//! it) and block coordinates in the partitioned document. Every marker the
//! scanner inserts shifts the following content down by two lines (the
//! injected blank line and the marker itself); the mapper undoes that shift
//! without rebuilding the unmarked text.
//!
//! Offsets within a block are 1-based: the line right after a marker is
//! line 1 of that block.

use super::scanner::{is_marker, parse_marker};
use serde::{Deserialize, Serialize};

/// Lines each marker adds to the partitioned text.
const LINES_PER_MARKER: usize = 2;

/// A location inside a rendered block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockPosition {
    /// Block index, `-1` for the preamble
    pub block_index: i64,
    /// 1-based line within the block, `-1` for the preamble
    pub line_in_block: i64,
}

impl BlockPosition {
    /// Position for content that no block can address.
    pub const PREAMBLE: BlockPosition = BlockPosition {
        block_index: -1,
        line_in_block: -1,
    };

    /// Whether this position lies in the preamble.
    pub fn is_preamble(&self) -> bool {
        self.block_index < 0
    }
}

/// Map a source line to its block and the line within that block.
///
/// Scans backwards from `source_line` (interpreted in partitioned
/// coordinates as a first guess) for the nearest marker, then walks forward
/// consuming the shift budget of `2 * (markers seen)` lines, extending the
/// budget whenever another marker is crossed. Returns
/// [`BlockPosition::PREAMBLE`] for content before the first marker.
pub fn locate(partitioned: &str, source_line: usize) -> BlockPosition {
    let lines: Vec<&str> = partitioned.split('\n').collect();
    let last = lines.len() - 1;
    let start = source_line.min(last);

    let mut block: Option<(usize, usize)> = (0..=start)
        .rev()
        .find_map(|i| parse_marker(lines[i]).map(|index| (index, i + 1)));

    let mut budget = block.map_or(0, |(index, _)| (index + 1) * LINES_PER_MARKER);
    let mut target = start + budget;
    let mut i = start + 1;
    while i < lines.len() && budget > 0 {
        if let Some(index) = parse_marker(lines[i]) {
            budget += LINES_PER_MARKER;
            target += LINES_PER_MARKER;
            block = Some((index, i + 1));
        }
        budget -= 1;
        i += 1;
    }

    // A line that fired a marker sits right below it; the walk above stops
    // on the injected blank line in that case.
    if let Some(index) = lines.get(target + 1).and_then(|l| parse_marker(l)) {
        target += LINES_PER_MARKER;
        block = Some((index, target));
    }

    match block {
        Some((index, block_start)) => {
            let target = target.min(last).max(block_start);
            BlockPosition {
                block_index: index as i64,
                line_in_block: (target - block_start + 1) as i64,
            }
        }
        None => BlockPosition::PREAMBLE,
    }
}

/// Map a block coordinate back to a source line.
///
/// Returns `None` for the preamble or an index with no marker. Offsets past
/// the end of the block clamp to its last line; offsets below 1 clamp to its
/// first line.
pub fn source_line(partitioned: &str, position: BlockPosition) -> Option<usize> {
    if position.is_preamble() {
        return None;
    }
    let block_index = usize::try_from(position.block_index).ok()?;
    let lines: Vec<&str> = partitioned.split('\n').collect();

    let marker = lines
        .iter()
        .position(|l| parse_marker(l) == Some(block_index))?;
    let block_start = marker + 1;

    // The block ends right before the next marker's injected blank line.
    let block_end = lines[block_start..]
        .iter()
        .position(|l| is_marker(l))
        .map_or(lines.len() - 1, |next| {
            (block_start + next)
                .saturating_sub(LINES_PER_MARKER)
                .max(block_start)
        });

    let offset = usize::try_from(position.line_in_block.max(1) - 1).unwrap_or(0);
    let target = (block_start + offset).min(block_end.max(block_start));
    let markers_before = block_index + 1;
    Some(target.saturating_sub(markers_before * LINES_PER_MARKER))
}

/// Line at the middle of a visible line range.
pub fn viewport_mid_line(first_line: usize, last_line: usize) -> usize {
    first_line + last_line.saturating_sub(first_line) / 2
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
