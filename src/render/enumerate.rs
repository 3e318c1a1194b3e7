//! Enumerate rewrite
//!
//! Numbered lists compiled block by block restart at 1 in every block. The
//! LaTeX stage records the real start in `\setcounter{enumi}{N}`, so each
//! `enumerate` environment is replaced by explicitly numbered paragraphs
//! before the HTML stage runs.

use regex::{Captures, Regex};
use std::sync::OnceLock;

fn enumerate_regex() -> &'static Regex {
    static ENUMERATE: OnceLock<Regex> = OnceLock::new();
    ENUMERATE.get_or_init(|| {
        Regex::new(concat!(
            r"\\begin\{enumerate\}\s*\\def\\labelenumi\{\\arabic\{enumi\}\.\}",
            r"(?:\s*\\setcounter\{enumi\}\{(\d+)\})?\s*(?:\\tightlist\s*)?",
            r"(\\item\s*[\s\S]*?)\\end\{enumerate\}",
        ))
        .expect("enumerate pattern is valid")
    })
}

fn item_regex() -> &'static Regex {
    static ITEM: OnceLock<Regex> = OnceLock::new();
    ITEM.get_or_init(|| Regex::new(r"(?m)^ *\\item\s+(.*)$").expect("item pattern is valid"))
}

/// Replace numbered `enumerate` environments with explicitly numbered
/// paragraphs, starting after the recorded counter (or at 1).
pub fn rewrite_enumerate(latex: &str) -> String {
    enumerate_regex()
        .replace_all(latex, |caps: &Captures| {
            let mut number = caps
                .get(1)
                .and_then(|m| m.as_str().parse::<u64>().ok())
                .map_or(1, |start| start.saturating_add(1));

            let mut paragraphs = Vec::new();
            for item in item_regex().captures_iter(&caps[2]) {
                paragraphs.push(format!(
                    "\\begingroup\n\\setlength{{\\parindent}}{{2em}}\n\\indent{{}} {}. {}\n\\endgroup\n",
                    number,
                    item[1].trim()
                ));
                number = number.saturating_add(1);
            }
            paragraphs.join("\n")
        })
        .into_owned()
}
