//! Utility functions for the PolicyPal client.

/// Truncate a string to at most `max_chars` characters, appending "..." if truncated.
///
/// Works on character boundaries, so multi-byte input is never split.
pub fn truncate_with_ellipsis(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => {
            let truncated = &s[..idx];
            format!("{}...", truncated.trim_end())
        }
        None => s.to_string(),
    }
}

/// Collapse all whitespace runs (including newlines) into single spaces.
///
/// Used to keep multi-line queries on one log line.
pub fn single_line(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// One-line preview of user text for logs.
pub fn preview(s: &str) -> String {
    truncate_with_ellipsis(&single_line(s), 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_truncate_short_string_unchanged() {
        assert_eq!(truncate_with_ellipsis("refund", 10), "refund");
    }

    #[test]
    fn test_truncate_long_string() {
        assert_eq!(
            truncate_with_ellipsis("What is the refund policy?", 11),
            "What is the..."
        );
    }

    #[test]
    fn test_truncate_multibyte() {
        assert_eq!(truncate_with_ellipsis("héllo wörld", 5), "héllo...");
    }

    #[test]
    fn test_single_line() {
        assert_eq!(single_line("  a\n\tb  c \n"), "a b c");
    }

    #[test]
    fn test_preview() {
        let long = "word ".repeat(30);
        let p = preview(&long);
        assert!(p.ends_with("..."));
        assert!(p.chars().count() <= 63);
    }

    proptest! {
        #[test]
        fn truncate_never_exceeds_limit(s in "\\PC{0,80}", max in 0usize..40) {
            let out = truncate_with_ellipsis(&s, max);
            prop_assert!(out.chars().count() <= max + 3);
        }
    }
}
