//! Formatting-command change detection.
//!
//! A block whose embedded LaTeX commands (`\name{arg}`) changed may affect
//! how later blocks render (counters, macros, styles), so the differ treats
//! such a change as unsafe for partial recompilation.

use regex::Regex;
use std::sync::OnceLock;

fn command_regex() -> &'static Regex {
    static COMMAND: OnceLock<Regex> = OnceLock::new();
    COMMAND.get_or_init(|| Regex::new(r"\\[a-zA-Z]+\{[^}]*\}").expect("command pattern is valid"))
}

/// Extract every `\identifier{argument}` invocation, in order, duplicates kept.
pub fn extract_commands(text: &str) -> Vec<&str> {
    command_regex()
        .find_iter(text)
        .map(|m| m.as_str())
        .collect()
}

/// Whether the ordered command lists of two block bodies differ.
pub fn commands_changed(old_block: &str, new_block: &str) -> bool {
    extract_commands(old_block) != extract_commands(new_block)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_commands_in_order() {
        let text = r"See \ref{fig:a} and \textbf{bold} then \ref{fig:a}.";
        assert_eq!(
            extract_commands(text),
            vec![r"\ref{fig:a}", r"\textbf{bold}", r"\ref{fig:a}"]
        );
    }

    #[test]
    fn test_plain_text_edit_is_not_a_command_change() {
        assert!(!commands_changed(
            r"Hello \emph{world}",
            r"Hello there \emph{world}"
        ));
    }

    #[test]
    fn test_argument_change_detected() {
        assert!(commands_changed(r"\setcounter{page}", r"\setcounter{chapter}"));
    }

    #[test]
    fn test_reordering_counts_as_change() {
        assert!(commands_changed(r"\a{1} \b{2}", r"\b{2} \a{1}"));
    }

    #[test]
    fn test_added_or_removed_command_detected() {
        assert!(commands_changed("text", r"text \newcommand{x}"));
        assert!(commands_changed(r"text \label{y}", "text"));
    }

    #[test]
    fn test_commands_without_braces_are_ignored() {
        assert!(!commands_changed(r"\alpha + 1", r"\beta + 1"));
    }
}
