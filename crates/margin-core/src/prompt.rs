//! Turns ranked matches into a prompt for the answering model.

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::index::{IndexError, NoteIndex};
use crate::query::Match;

/// Characters of chunk text kept in a [`Source`] snippet.
pub const SNIPPET_CHARS: usize = 240;

/// A model answer and the chunks it was given.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<Source>,
}

/// A chunk cited by an [`Answer`], shortened for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Source {
    pub note_path: String,
    pub heading: String,
    pub snippet: String,
    pub score: f64,
}

impl From<&Match> for Source {
    fn from(m: &Match) -> Self {
        Self {
            note_path: m.note_path.clone(),
            heading: m.heading.clone(),
            snippet: snippet(&m.text),
            score: m.score,
        }
    }
}

/// Trimmed text, cut to [`SNIPPET_CHARS`] characters with `...` appended when longer.
pub fn snippet(text: &str) -> String {
    let text = text.trim();
    match text.char_indices().nth(SNIPPET_CHARS) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

/// Question followed by numbered snippets, `[n] path — heading` then the text.
pub fn build_prompt(question: &str, matches: &[Match]) -> String {
    let mut out = String::from("Question:\n");
    out.push_str(question.trim());
    out.push_str("\n\nSnippets:\n");
    if matches.is_empty() {
        out.push_str("None\n");
    }
    for (i, m) in matches.iter().enumerate() {
        out.push_str(&format!("[{}] {}", i + 1, m.note_path));
        if !m.heading.is_empty() {
            out.push_str(" — ");
            out.push_str(&m.heading);
        }
        out.push('\n');
        out.push_str(&m.text);
        out.push_str("\n\n");
    }
    out.trim_end().to_string()
}

impl NoteIndex {
    /// Query, keep the best `max_context_chunks` matches and ask the model.
    pub async fn ask(&self, question: &str, cancel: &CancellationToken) -> Result<Answer, IndexError> {
        let mut matches = self.query(question, cancel).await?;
        let max = self.settings().max_context_chunks;
        if max > 0 {
            matches.truncate(max);
        }
        let prompt = build_prompt(question, &matches);
        let text = self
            .call_provider(cancel, self.provider().respond(&prompt))
            .await?;
        Ok(Answer {
            text,
            sources: matches.iter().map(Source::from).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(path: &str, heading: &str, text: &str) -> Match {
        Match {
            note_path: path.to_string(),
            heading: heading.to_string(),
            text: text.to_string(),
            score: 0.5,
        }
    }

    #[test]
    fn numbers_snippets_with_headings() {
        let p = build_prompt(
            " when is the dentist? ",
            &[m("Daily/2026-01-02.md", "Todo", "- [ ] dentist 3pm"), m("misc.md", "", "nothing")],
        );
        assert_eq!(
            p,
            "Question:\nwhen is the dentist?\n\nSnippets:\n\
             [1] Daily/2026-01-02.md — Todo\n- [ ] dentist 3pm\n\n\
             [2] misc.md\nnothing"
        );
    }

    #[test]
    fn no_matches_still_asks() {
        assert_eq!(build_prompt("hi", &[]), "Question:\nhi\n\nSnippets:\nNone");
    }

    #[test]
    fn snippet_keeps_short_text_and_cuts_long_text() {
        assert_eq!(snippet("  short note \n"), "short note");
        let exact = "x".repeat(SNIPPET_CHARS);
        assert_eq!(snippet(&exact), exact);

        let long = format!("{}tail", "é".repeat(SNIPPET_CHARS));
        let cut = snippet(&long);
        assert!(cut.ends_with("..."));
        assert_eq!(cut.chars().count(), SNIPPET_CHARS + 3);
        assert!(!cut.contains("tail"));
    }

    #[test]
    fn source_carries_snippet_not_full_text() {
        let long = "word ".repeat(100);
        let source = Source::from(&m("a.md", "H", &long));
        assert_eq!(source.note_path, "a.md");
        assert_eq!(source.heading, "H");
        assert_eq!(source.score, 0.5);
        assert_eq!(source.snippet, format!("{}...", &long[..SNIPPET_CHARS]));
    }
}
