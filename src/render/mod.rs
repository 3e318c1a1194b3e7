//! Render orchestration
//!
//! Drives the two-stage conversion for either the whole partitioned
//! document or a selection of its blocks:
//!
//! ```text
//! partitioned markdown ─▶ to_latex ─▶ enumerate rewrite ─▶ to_html ─▶ marker divs
//! ```
//!
//! The partial path feeds only the requested blocks (each with its marker
//! line) to the converter and splits the result back into fragments keyed
//! by block index.

mod enumerate;
mod fragments;
mod page;
mod pandoc;

pub use enumerate::rewrite_enumerate;
pub use fragments::{normalize_markers, select_fragments, splice_fragments, RenderedFragment};
pub use page::{page_title, render_page};
pub use pandoc::{Converter, PandocConverter, RenderOptions};

use crate::error::Result;
use crate::preview::split_blocks;
use log::debug;

/// Runs the conversion pipeline with a fixed set of options.
#[derive(Debug, Clone)]
pub struct Renderer<C> {
    converter: C,
    options: RenderOptions,
}

impl<C: Converter> Renderer<C> {
    /// Create a renderer.
    pub fn new(converter: C, options: RenderOptions) -> Self {
        Self { converter, options }
    }

    /// Replace the options used by later renders.
    pub fn set_options(&mut self, options: RenderOptions) {
        self.options = options;
    }

    /// Render the whole partitioned document to normalized HTML.
    pub fn render_full(&self, partitioned: &str) -> Result<String> {
        debug!("Full render of {} bytes", partitioned.len());
        self.convert(partitioned)
    }

    /// Render the blocks named by `indices`.
    ///
    /// Blocks are selected by their marker index. Fragments come back in
    /// request order; an index the output doesn't contain is omitted.
    pub fn render_blocks(&self, partitioned: &str, indices: &[usize]) -> Result<Vec<RenderedFragment>> {
        let segments = split_blocks(partitioned);
        let selected: Vec<&str> = indices
            .iter()
            .filter_map(|&index| {
                segments
                    .iter()
                    .find(|segment| segment.index == Some(index))
                    .map(|segment| segment.text)
            })
            .collect();

        debug!(
            "Partial render of blocks {:?} ({} found)",
            indices,
            selected.len()
        );

        if selected.is_empty() {
            return Ok(Vec::new());
        }

        let html = self.convert(&selected.join("\n"))?;
        Ok(select_fragments(&html, indices))
    }

    fn convert(&self, markdown: &str) -> Result<String> {
        let latex = self.converter.to_latex(markdown, &self.options)?;
        let latex = rewrite_enumerate(&latex);
        let html = self.converter.to_html(&latex, &self.options)?;
        Ok(normalize_markers(&html))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Test Converter
// ─────────────────────────────────────────────────────────────────────────────


// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::testing::FakeConverter;
    use super::*;
    use crate::error::Error;
    use crate::preview::partition;

    fn renderer(converter: FakeConverter) -> Renderer<FakeConverter> {
        Renderer::new(converter, RenderOptions::default())
    }

    #[test]
    fn test_render_full_normalizes_markers() {
        let partitioned = partition("# Title\n\nSome text\n");
        let html = renderer(FakeConverter::default())
            .render_full(&partitioned)
            .unwrap();
        assert_eq!(
            html,
            "<p># Title</p>\n<p>Some text</p>\n<div data-block-index=\"0\"></div>"
        );
    }

    #[test]
    fn test_render_blocks_selects_by_marker_index() {
        let partitioned = partition("Intro\n\nFirst\nmore\n\nSecond\n\nThird\n");
        let converter = FakeConverter::default();
        let fragments = renderer(converter.clone())
            .render_blocks(&partitioned, &[1, 2])
            .unwrap();

        let indices: Vec<usize> = fragments.iter().map(|f| f.index).collect();
        assert_eq!(indices, vec![1, 2]);
        assert!(fragments[0].html.starts_with("<div data-block-index=\"1\"></div>"));
        assert!(fragments[0].html.contains("<p>Second</p>"));
        assert!(fragments[1].html.contains("<p>Third</p>"));

        // Only the requested blocks reached the converter
        let calls = converter.calls();
        assert_eq!(calls.len(), 1);
        assert!(!calls[0].contains("Intro"));
        assert!(!calls[0].contains("First"));
        assert!(calls[0].starts_with("&%&BLOCK_INDEX_1&%&"));
    }

    #[test]
    fn test_render_blocks_omits_unknown_index() {
        let partitioned = partition("Intro\n\nFirst\n");
        let fragments = renderer(FakeConverter::default())
            .render_blocks(&partitioned, &[0, 5])
            .unwrap();
        assert_eq!(fragments.len(), 1);
        assert_eq!(fragments[0].index, 0);
    }

    #[test]
    fn test_render_blocks_with_nothing_selected_skips_converter() {
        let converter = FakeConverter::default();
        let fragments = renderer(converter.clone())
            .render_blocks(&partition("Intro\n"), &[7])
            .unwrap();
        assert!(fragments.is_empty());
        assert!(converter.calls().is_empty());
    }

    #[test]
    fn test_stage_one_failure_reports_code_and_stderr() {
        let err = renderer(FakeConverter::failing_latex("template not found"))
            .render_full("# x\n")
            .unwrap_err();
        assert!(matches!(err, Error::Conversion { code: Some(1), .. }));
        let message = err.to_string();
        assert!(message.contains('1'));
        assert!(message.contains("template not found"));
        assert!(message.contains("markdown to latex"));
    }

    #[test]
    fn test_stage_two_failure() {
        let converter = FakeConverter {
            fail_html: Some("bad latex".to_string()),
            ..FakeConverter::default()
        };
        let err = renderer(converter).render_full("x\n").unwrap_err();
        assert!(err.to_string().contains("latex to html"));
        assert!(err.to_string().contains("bad latex"));
    }
}
