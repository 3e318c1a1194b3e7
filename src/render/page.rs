//! Preview page scaffold
//!
//! Wraps rendered content in a standalone HTML page whose script implements
//! the view side of the message protocol: block splicing, scroll requests
//! and click-to-source.

use std::path::Path;

// ─────────────────────────────────────────────────────────────────────────────
// Page Generation
// ─────────────────────────────────────────────────────────────────────────────

/// Generate a complete preview page around rendered content.
///
/// # Arguments
///
/// * `content` - Normalized HTML from the converter
/// * `title` - Optional document title
pub fn render_page(content: &str, title: Option<&str>) -> String {
    let doc_title = title.unwrap_or("Markdown Preview");

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <meta name="generator" content="mdtex-preview">
    <title>{title}</title>
    <style>
{base_css}
    </style>
</head>
<body>
    <div id="content">{content}</div>
    <script>
{view_script}
    </script>
</body>
</html>"#,
        title = html_escape(doc_title),
        base_css = BASE_CSS,
        content = content,
        view_script = VIEW_SCRIPT,
    )
}

/// Page title for a document path (its file stem).
pub fn page_title(path: &Path) -> Option<&str> {
    path.file_stem().and_then(|s| s.to_str())
}

// ─────────────────────────────────────────────────────────────────────────────
// Static Assets
// ─────────────────────────────────────────────────────────────────────────────

/// Base CSS for the preview (layout, typography).
const BASE_CSS: &str = r#"
*, *::before, *::after {
    box-sizing: border-box;
}

body {
    margin: 0;
    padding: 0;
    font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', 'Noto Sans', Helvetica, Arial, sans-serif;
    font-size: 16px;
    line-height: 1.6;
}

#content {
    max-width: 900px;
    margin: 0 auto;
    padding: 32px 24px;
}

#content pre {
    overflow: auto;
    padding: 16px;
}

#content table {
    border-collapse: collapse;
}

#content th, #content td {
    padding: 6px 13px;
    border: 1px solid;
}
"#;

/// View side of the message protocol.
///
/// Messages come in through `window.message` events; replies go to the
/// host through `acquireVsCodeApi` when the page runs inside a webview, or
/// to the parent window otherwise.
const VIEW_SCRIPT: &str = r#"(function() {
    const host = typeof acquireVsCodeApi === 'function'
        ? acquireVsCodeApi()
        : { postMessage: function(message) { window.parent.postMessage(message, '*'); } };
    const content = document.getElementById('content');

    function markers() {
        return Array.prototype.slice.call(content.querySelectorAll('[data-block-index]'));
    }

    function isMarker(node) {
        return node.nodeType === 1 && node.hasAttribute('data-block-index');
    }

    function scrollToPosition(blockIndex, lineInBlock) {
        if (blockIndex < 0 || lineInBlock < 0) {
            return;
        }
        const elements = markers();
        const at = elements.findIndex(function(el) {
            return Number(el.getAttribute('data-block-index')) === blockIndex;
        });
        if (at < 0) {
            return;
        }
        const target = elements[at];
        const next = elements[at + 1];
        const blockHeight = next ? next.offsetTop - target.offsetTop : target.clientHeight;
        const top = target.offsetTop + blockHeight * (lineInBlock / (lineInBlock + 1)) - window.innerHeight / 2;
        window.scrollTo({ top: top, behavior: 'auto' });
    }

    function replaceBlock(index, html) {
        const start = content.querySelector('[data-block-index="' + index + '"]');
        if (!start || start.parentNode !== content) {
            return;
        }
        let node = start.nextSibling;
        while (node && !isMarker(node)) {
            const following = node.nextSibling;
            content.removeChild(node);
            node = following;
        }
        start.insertAdjacentHTML('afterend', html);
        start.remove();
    }

    window.addEventListener('message', function(event) {
        const message = event.data;
        if (message.command === 'updateBlocks') {
            for (const block of message.blocks) {
                replaceBlock(block.index, block.html);
            }
            host.postMessage({ command: 'updateComplete' });
        } else if (message.command === 'scrollToPosition') {
            scrollToPosition(message.blockIndex, message.lineInBlock);
        }
    });

    content.addEventListener('dblclick', function(event) {
        let node = event.target;
        while (node && node.parentNode !== content) {
            node = node.parentNode;
        }
        while (node && !isMarker(node)) {
            node = node.previousSibling;
        }
        if (!node) {
            return;
        }
        const blockIndex = Number(node.getAttribute('data-block-index'));
        const next = markers().find(function(el) { return el.offsetTop > node.offsetTop; });
        const height = next ? next.offsetTop - node.offsetTop : node.clientHeight;
        const fraction = height > 0 ? Math.min(Math.max((event.pageY - node.offsetTop) / height, 0), 0.95) : 0;
        const lineInBlock = Math.max(1, Math.round(fraction / (1 - fraction)));
        host.postMessage({ command: 'scrollToPosition', blockIndex: blockIndex, lineInBlock: lineInBlock });
    });
})();"#;

/// Escape HTML special characters.
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_render_page_structure() {
        let html = render_page("<div data-block-index=\"0\"></div><p>Hi</p>", Some("Doc"));

        assert!(html.contains("<!DOCTYPE html>"));
        assert!(html.contains("<title>Doc</title>"));
        assert!(html.contains(
            "<div id=\"content\"><div data-block-index=\"0\"></div><p>Hi</p></div>"
        ));
        assert!(html.contains("updateBlocks"));
        assert!(html.contains("updateComplete"));
        assert!(html.contains("scrollToPosition"));
    }

    #[test]
    fn test_render_page_default_title() {
        let html = render_page("", None);
        assert!(html.contains("<title>Markdown Preview</title>"));
    }

    #[test]
    fn test_page_title() {
        assert_eq!(page_title(&PathBuf::from("/notes/paper.md")), Some("paper"));
    }

    #[test]
    fn test_html_escape() {
        assert_eq!(html_escape("Hello"), "Hello");
        assert_eq!(html_escape("<script>"), "&lt;script&gt;");
        assert_eq!(html_escape("a & b"), "a &amp; b");
        assert_eq!(html_escape("\"quoted\""), "&quot;quoted&quot;");
    }
}
