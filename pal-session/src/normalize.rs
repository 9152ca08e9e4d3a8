//! Markdown normalization for assistant answers.
//!
//! Generated answers often run headings, bullets and numbered items together
//! on one line, or leave stray list markers behind. [`normalize`] rewrites the
//! raw text into a form any CommonMark renderer displays consistently.
//!
//! # Rules (applied in order)
//!
//! | # | Input                       | Output                          |
//! |---|-----------------------------|---------------------------------|
//! | 1 | `Intro **Heading** body`    | `Intro\n\n**Heading**\n\nbody`  |
//! | 2 | a line holding only `*`     | line removed                    |
//! | 3 | `text * item`               | `text\n- item`                  |
//! | 4 | `text 1. item`              | `text\n1. item`                 |
//! | 5 | a line holding only `-`     | line removed                    |
//! | 6 | 3+ line breaks              | one blank line                  |
//! | 7 | surrounding whitespace      | trimmed                         |

use regex::{Captures, Regex};
use std::borrow::Cow;
use std::sync::LazyLock;

// ============================================================================
// Regex Patterns
// ============================================================================

static BOLD_SPAN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\*\*(.*?)\*\*\s*").unwrap());
static LONE_ASTERISK_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]*\*[ \t]*(?:\n|$)").unwrap());
// Item text must not start with `*`, which keeps `**bold**` markers intact.
static INLINE_BULLET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|\s)\*[ \t]+([^\s*][^\n]*)").unwrap());
static NUMBERED_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)(^|\S)([ \t]*)(\d+)\.[ \t]+").unwrap());
static LONE_DASH_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]*-[ \t]*(?:\n|$)").unwrap());
static BLANK_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n(?:[ \t]*\n){2,}").unwrap());

/// Upper bound on rewrite passes; real answers settle in one or two.
const MAX_PASSES: usize = 8;

// ============================================================================
// Public API
// ============================================================================

/// Normalize raw assistant markdown for display.
///
/// Pure and deterministic. Idempotent: `normalize(&normalize(x)) == normalize(x)`.
pub fn normalize(raw: &str) -> String {
    // Removing a marker line can expose a pattern an earlier rule handles,
    // so the pipeline runs until the text stops changing.
    let mut current = rewrite_pass(raw);
    for _ in 1..MAX_PASSES {
        let next = rewrite_pass(&current);
        if next == current {
            break;
        }
        current = next;
    }
    current
}

/// One pass of the ordered rule pipeline.
fn rewrite_pass(raw: &str) -> String {
    let text = isolate_bold_spans(raw);
    let text = LONE_ASTERISK_LINE.replace_all(&text, "");
    let text = split_inline_bullets(&text);
    let text = break_before_numbered_items(&text);
    let text = LONE_DASH_LINE.replace_all(&text, "");
    let text = BLANK_RUN.replace_all(&text, "\n\n");
    text.trim().to_string()
}

// ============================================================================
// Rules
// ============================================================================

/// Rule 1: put every `**bold**` span on its own paragraph.
fn isolate_bold_spans(text: &str) -> Cow<'_, str> {
    BOLD_SPAN.replace_all(text, "\n\n**${1}**\n\n")
}

/// Rule 3: turn ` * item` into a `- item` line.
///
/// A match consumes the rest of its line, so later bullets on the same line
/// are picked up by the next round. Each round removes at least one `*`.
fn split_inline_bullets(text: &str) -> String {
    let mut current = text.to_string();
    loop {
        let next = match INLINE_BULLET.replace_all(&current, "\n- ${1}") {
            Cow::Borrowed(_) => break,
            Cow::Owned(next) => next,
        };
        current = next;
    }
    current
}

/// Rule 4: start every `N. ` marker on a fresh line.
///
/// A marker glued to a word (`v1. `, `**1. `) is not a list item and is left alone.
fn break_before_numbered_items(text: &str) -> Cow<'_, str> {
    NUMBERED_MARKER.replace_all(text, |caps: &Captures<'_>| {
        let prefix = &caps[1];
        let indent = &caps[2];
        let number = &caps[3];
        if prefix.is_empty() {
            format!("{indent}{number}. ")
        } else if indent.is_empty() {
            caps[0].to_string()
        } else {
            format!("{prefix}\n{number}. ")
        }
    })
}
