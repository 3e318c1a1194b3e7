//! Rendered block fragments
//!
//! After the HTML stage every marker is turned into an empty
//! `<div data-block-index="N"></div>`. Those divs split rendered output into
//! per-block fragments and locate the span to replace when a fragment is
//! spliced into previously rendered content.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// HTML for one recompiled block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedFragment {
    /// Block index the fragment replaces
    pub index: usize,
    /// Fragment HTML, starting with the block's marker div
    pub html: String,
}

/// Marker div for a block.
pub fn marker_div(index: usize) -> String {
    format!("<div data-block-index=\"{}\"></div>", index)
}

fn paragraph_marker_regex() -> &'static Regex {
    static PARAGRAPH: OnceLock<Regex> = OnceLock::new();
    PARAGRAPH.get_or_init(|| {
        Regex::new(r"<p>&amp;%&amp;BLOCK_INDEX_(\d+)&amp;%&amp;</p>")
            .expect("paragraph marker pattern is valid")
    })
}

fn inline_marker_regex() -> &'static Regex {
    static INLINE: OnceLock<Regex> = OnceLock::new();
    INLINE.get_or_init(|| {
        Regex::new(r"&amp;%&(?:amp;)?BLOCK_INDEX_(\d+)&(?:amp;)?%&(?:amp;)?")
            .expect("inline marker pattern is valid")
    })
}

fn marker_div_regex() -> &'static Regex {
    static DIV: OnceLock<Regex> = OnceLock::new();
    DIV.get_or_init(|| {
        Regex::new(r#"<div data-block-index="(\d+)"></div>"#).expect("marker div pattern is valid")
    })
}

/// Rewrite escaped marker text in converter output into marker divs.
///
/// A marker normally becomes its own paragraph; one that got merged into a
/// neighbouring paragraph is replaced in place.
pub fn normalize_markers(html: &str) -> String {
    let div = r#"<div data-block-index="$1"></div>"#;
    let html = paragraph_marker_regex().replace_all(html, div);
    inline_marker_regex().replace_all(&html, div).into_owned()
}

/// Split normalized HTML into fragments keyed by their marker div.
///
/// Content before the first marker div belongs to no block and is dropped.
pub fn split_fragments(html: &str) -> Vec<(usize, &str)> {
    let starts: Vec<(usize, usize)> = marker_div_regex()
        .captures_iter(html)
        .filter_map(|caps| {
            let start = caps.get(0)?.start();
            let index = caps[1].parse().ok()?;
            Some((index, start))
        })
        .collect();

    starts
        .iter()
        .enumerate()
        .map(|(i, &(index, start))| {
            let end = starts.get(i + 1).map_or(html.len(), |&(_, next)| next);
            (index, &html[start..end])
        })
        .collect()
}

/// Pick the fragments for `indices`, in request order.
///
/// An index without a fragment in `html` is omitted.
pub fn select_fragments(html: &str, indices: &[usize]) -> Vec<RenderedFragment> {
    let fragments = split_fragments(html);
    indices
        .iter()
        .filter_map(|&index| {
            fragments
                .iter()
                .find(|(found, _)| *found == index)
                .map(|(_, fragment)| RenderedFragment {
                    index,
                    html: (*fragment).to_string(),
                })
        })
        .collect()
}

/// Replace the blocks named by `fragments` inside rendered content.
///
/// Each block spans from its marker div up to the next marker div (or the
/// end of the content). Fragments for blocks not present are ignored.
pub fn splice_fragments(content: &str, fragments: &[RenderedFragment]) -> String {
    let mut content = content.to_string();
    for fragment in fragments {
        let marker = marker_div(fragment.index);
        let Some(start) = content.find(&marker) else {
            log::debug!("Block {} not in rendered content, skipping", fragment.index);
            continue;
        };
        let after = start + marker.len();
        let end = marker_div_regex()
            .find(&content[after..])
            .map_or(content.len(), |m| after + m.start());
        content.replace_range(start..end, &fragment.html);
    }
    content
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_paragraph_markers() {
        let html = "<h1>Title</h1>\n<p>&amp;%&amp;BLOCK_INDEX_0&amp;%&amp;</p>\n<p>Body</p>";
        assert_eq!(
            normalize_markers(html),
            "<h1>Title</h1>\n<div data-block-index=\"0\"></div>\n<p>Body</p>"
        );
    }

    #[test]
    fn test_normalize_inline_markers() {
        let html = "<p>&amp;%&amp;BLOCK_INDEX_3&amp;%&amp; # Heading</p>";
        assert_eq!(
            normalize_markers(html),
            "<p><div data-block-index=\"3\"></div> # Heading</p>"
        );
    }

    #[test]
    fn test_split_fragments_keyed_by_marker() {
        let html = "pre<div data-block-index=\"4\"></div>a<div data-block-index=\"7\"></div>b";
        let fragments = split_fragments(html);
        assert_eq!(
            fragments,
            vec![
                (4, "<div data-block-index=\"4\"></div>a"),
                (7, "<div data-block-index=\"7\"></div>b"),
            ]
        );
    }

    #[test]
    fn test_select_fragments_omits_missing() {
        let html = "<div data-block-index=\"2\"></div><p>two</p>";
        let selected = select_fragments(html, &[2, 3]);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].index, 2);
        assert_eq!(selected[0].html, "<div data-block-index=\"2\"></div><p>two</p>");
    }

    #[test]
    fn test_splice_replaces_block_span() {
        let content = concat!(
            "<p>intro</p>",
            "<div data-block-index=\"0\"></div><p>old zero</p>",
            "<div data-block-index=\"1\"></div><p>old one</p>",
        );
        let fragments = vec![
            RenderedFragment {
                index: 0,
                html: "<div data-block-index=\"0\"></div><p>new zero</p>".to_string(),
            },
            RenderedFragment {
                index: 1,
                html: "<div data-block-index=\"1\"></div><p>new one</p>".to_string(),
            },
            RenderedFragment {
                index: 9,
                html: "<p>ignored</p>".to_string(),
            },
        ];
        assert_eq!(
            splice_fragments(content, &fragments),
            concat!(
                "<p>intro</p>",
                "<div data-block-index=\"0\"></div><p>new zero</p>",
                "<div data-block-index=\"1\"></div><p>new one</p>",
            )
        );
    }

    #[test]
    fn test_splice_does_not_match_index_prefix() {
        let content = "<div data-block-index=\"1\"></div>a<div data-block-index=\"10\"></div>b";
        let fragments = vec![RenderedFragment {
            index: 1,
            html: "<div data-block-index=\"1\"></div>A".to_string(),
        }];
        assert_eq!(
            splice_fragments(content, &fragments),
            "<div data-block-index=\"1\"></div>A<div data-block-index=\"10\"></div>b"
        );
    }

    #[test]
    fn test_fragment_json_shape() {
        let fragment = RenderedFragment {
            index: 1,
            html: "<p>x</p>".to_string(),
        };
        assert_eq!(
            serde_json::to_string(&fragment).unwrap(),
            r#"{"index":1,"html":"<p>x</p>"}"#
        );
    }
}
