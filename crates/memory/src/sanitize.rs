//! FTS5 query sanitization — spec.md §4.2.
//!
//! Strips everything outside `[alnum, space, ., -, _, @]`, splits into
//! words, quotes each (so punctuation-bearing tokens like emails stay
//! intact), and joins with `OR`.

pub fn sanitize_fts_query(raw: &str) -> String {
    let filtered: String = raw
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '.' | '-' | '_' | '@'))
        .collect();

    filtered
        .split_whitespace()
        .filter(|w| !w.is_empty())
        .map(|w| format!("\"{w}\""))
        .collect::<Vec<_>>()
        .join(" OR ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_disallowed_characters() {
        let sanitized = sanitize_fts_query("hello; DROP TABLE!");
        assert!(!sanitized.contains(';'));
        assert!(!sanitized.contains('!'));
    }

    #[test]
    fn quotes_each_word_and_joins_with_or() {
        assert_eq!(sanitize_fts_query("hello world"), "\"hello\" OR \"world\"");
    }

    #[test]
    fn keeps_emails_intact() {
        assert_eq!(sanitize_fts_query("marco@example.com"), "\"marco@example.com\"");
    }

    #[test]
    fn all_symbols_yields_empty() {
        assert_eq!(sanitize_fts_query("!!!###"), "");
    }
}
