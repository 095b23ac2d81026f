//! Text processing helpers
//!
//! HTML cleaning, truncation at sentence boundaries, and word counting.
//! Cleaning is idempotent: running it on already-clean text is a no-op
//! modulo whitespace collapsing.

use scraper::{Html, Node};

/// Extracts plain text from HTML content.
///
/// Drops `<script>` and `<style>` subtrees entirely, then collapses all
/// whitespace runs to single spaces.
pub fn clean_html(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut pieces: Vec<&str> = Vec::new();

    for node in document.tree.nodes() {
        if let Node::Text(text) = node.value() {
            let skip = node.ancestors().any(|ancestor| {
                ancestor
                    .value()
                    .as_element()
                    .map(|el| {
                        let name = el.name();
                        name == "script" || name == "style"
                    })
                    .unwrap_or(false)
            });
            if !skip {
                pieces.push(&text.text);
            }
        }
    }

    collapse_whitespace(&pieces.join(" "))
}

/// Collapses whitespace runs to single spaces and trims the ends
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Counts non-empty whitespace-separated tokens
pub fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Truncates to at most `max_chars` characters (not bytes)
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Truncates text for model submission.
///
/// Tries to end at the last sentence boundary within the cap, otherwise
/// hard-cuts and appends an ellipsis.
pub fn truncate_for_model(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    let head = truncate_chars(text, max_chars);
    match head.rfind('.') {
        Some(idx) => head[..=idx].to_string(),
        None => format!("{}...", head),
    }
}

/// First `n` sentences of the text, used as the summary fallback
pub fn leading_sentences(text: &str, n: usize) -> Option<String> {
    let sentences: Vec<&str> = text
        .split('.')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .take(n)
        .collect();

    if sentences.is_empty() {
        None
    } else {
        Some(format!("{}.", sentences.join(". ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_html_strips_markup() {
        let html = "<html><body><p>Hello <b>world</b></p></body></html>";
        assert_eq!(clean_html(html), "Hello world");
    }

    #[test]
    fn test_clean_html_drops_script_and_style() {
        let html = r#"<html><head><style>p { color: red; }</style></head>
            <body><script>var x = 1;</script><p>Visible text</p></body></html>"#;
        assert_eq!(clean_html(html), "Visible text");
    }

    #[test]
    fn test_clean_html_collapses_whitespace() {
        let html = "<p>Multiple\n\n   spaces\tand\nlines</p>";
        assert_eq!(clean_html(html), "Multiple spaces and lines");
    }

    #[test]
    fn test_clean_html_is_idempotent() {
        let html = "<p>Scientists discovered a new particle today.</p>";
        let once = clean_html(html);
        let twice = clean_html(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_count_words() {
        assert_eq!(count_words("one two  three\n four"), 4);
        assert_eq!(count_words("   "), 0);
        assert_eq!(count_words(""), 0);
    }

    #[test]
    fn test_truncate_chars_respects_boundaries() {
        assert_eq!(truncate_chars("hello", 3), "hel");
        assert_eq!(truncate_chars("hello", 10), "hello");
        // Multi-byte characters must not split
        assert_eq!(truncate_chars("héllo", 2), "hé");
    }

    #[test]
    fn test_truncate_for_model_sentence_boundary() {
        let text = "First sentence. Second sentence. Third one that runs long";
        let truncated = truncate_for_model(text, 40);
        assert_eq!(truncated, "First sentence. Second sentence.");
    }

    #[test]
    fn test_truncate_for_model_hard_cut() {
        let text = "no sentence boundary anywhere in this text at all here";
        let truncated = truncate_for_model(text, 20);
        assert!(truncated.ends_with("..."));
        assert_eq!(truncated.chars().count(), 23);
    }

    #[test]
    fn test_truncate_for_model_short_text_unchanged() {
        let text = "Short text.";
        assert_eq!(truncate_for_model(text, 100), text);
    }

    #[test]
    fn test_leading_sentences() {
        let text = "One fact. Another fact. A third fact.";
        assert_eq!(
            leading_sentences(text, 2),
            Some("One fact. Another fact.".to_string())
        );
        assert_eq!(leading_sentences("", 2), None);
    }
}
