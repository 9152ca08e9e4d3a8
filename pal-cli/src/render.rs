//! Terminal rendering of the conversation.

use std::cell::Cell;
use std::rc::Rc;

use chrono::{DateTime, Local, Utc};
use console::{Style, Term};
use pal_session::{
    sources_label, FailureNotice, HistorySnapshot, LifecycleState, Role, SessionObserver,
    SourceRef, Turn,
};

use crate::theme::{Palette, Theme};

const ASSISTANT_NAME: &str = "PolicyPal";
const THINKING: &str = "PolicyPal is thinking...";

/// Local wall-clock `HH:MM` for a turn.
pub fn format_time(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%H:%M").to_string()
}

fn speaker(role: Role) -> &'static str {
    match role {
        Role::User => "You",
        Role::Assistant => ASSISTANT_NAME,
    }
}

fn speaker_style(role: Role, palette: &Palette) -> &Style {
    match role {
        Role::User => &palette.user,
        Role::Assistant => &palette.assistant,
    }
}

pub fn format_turn(turn: &Turn, palette: &Palette) -> String {
    let mut out = format!(
        "{} {}\n{}",
        speaker_style(turn.role, palette).apply_to(speaker(turn.role)),
        palette.muted.apply_to(format_time(turn.created_at)),
        palette.body.apply_to(&turn.content),
    );

    if let Some(rephrased) = &turn.rephrased_query {
        out.push_str(&format!(
            "\n{}",
            palette.muted.apply_to(format!("Searched for: {rephrased}"))
        ));
    }
    if let Some(id) = turn.disclosure {
        out.push_str(&format!(
            "\n{} {}",
            palette.accent.apply_to(format!("[{}]", sources_label(turn.sources.len()))),
            palette.muted.apply_to(format!("/sources {id}")),
        ));
    }
    out
}

pub fn format_sources(sources: &[SourceRef], palette: &Palette) -> String {
    sources
        .iter()
        .map(|source| {
            format!(
                "  {}  {}\n    {}",
                palette.body.apply_to(&source.title),
                palette
                    .accent
                    .apply_to(format!("{}% match", source.relevance_percent())),
                palette.muted.apply_to(source.meta_line()),
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_failure(notice: &FailureNotice, palette: &Palette) -> String {
    format!(
        "{} {}\n{}",
        palette.assistant.apply_to(ASSISTANT_NAME),
        palette.muted.apply_to(format_time(Utc::now())),
        palette.error.apply_to(notice.message),
    )
}

pub fn format_welcome(examples: &[&str], palette: &Palette) -> String {
    let mut out = format!(
        "{} {}\n{}",
        palette.assistant.apply_to(ASSISTANT_NAME),
        palette.muted.apply_to(format_time(Utc::now())),
        palette
            .body
            .apply_to("Hi! Ask me anything about your policy documents."),
    );
    if !examples.is_empty() {
        out.push_str(&format!("\n\n{}", palette.muted.apply_to("Try one of these:")));
        for (n, example) in examples.iter().enumerate() {
            out.push_str(&format!(
                "\n  {} {example}",
                palette.accent.apply_to(format!("/example {}", n + 1))
            ));
        }
    }
    out
}

pub fn format_history(history: &HistorySnapshot, palette: &Palette) -> String {
    if history.is_empty() {
        return palette.muted.apply_to("No messages yet.").to_string();
    }
    history
        .turns()
        .iter()
        .map(|turn| {
            let first_line = turn.content.lines().next().unwrap_or_default();
            format!(
                "{} {} {}",
                palette.muted.apply_to(format_time(turn.created_at)),
                speaker_style(turn.role, palette).apply_to(format!("{:>9}", speaker(turn.role))),
                pal_common::util::truncate_with_ellipsis(first_line, 72),
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Prints turns and the pending indicator to stdout.
///
/// Clones share the active theme.
#[derive(Debug, Clone)]
pub struct TerminalRenderer {
    term: Term,
    theme: Rc<Cell<Theme>>,
}

impl TerminalRenderer {
    pub fn new(theme: Theme) -> Self {
        Self {
            term: Term::stdout(),
            theme: Rc::new(Cell::new(theme)),
        }
    }

    pub fn theme(&self) -> Theme {
        self.theme.get()
    }

    pub fn set_theme(&self, theme: Theme) {
        self.theme.set(theme);
    }

    pub fn palette(&self) -> Palette {
        self.theme().palette()
    }

    pub fn line(&self, text: &str) {
        if let Err(e) = self.term.write_line(text) {
            tracing::debug!(error = %e, "Failed to write to terminal");
        }
    }

    /// Informational line in the muted style.
    pub fn note(&self, text: &str) {
        self.line(&self.palette().muted.apply_to(text).to_string());
    }

    pub fn prompt(&self) {
        let prompt = self.palette().user.apply_to("> ").to_string();
        if let Err(e) = self.term.write_str(&prompt) {
            tracing::debug!(error = %e, "Failed to write prompt");
        }
    }
}

impl SessionObserver for TerminalRenderer {
    fn on_state_changed(&self, from: LifecycleState, _to: LifecycleState) {
        if from.is_pending() {
            if let Err(e) = self.term.clear_line() {
                tracing::debug!(error = %e, "Failed to clear pending indicator");
            }
        }
    }

    // Entering Pending is always followed by the user turn, so the
    // indicator is drawn below it.
    fn on_user_turn(&self, turn: &Turn) {
        self.line(&format_turn(turn, &self.palette()));
        self.line("");
        let text = self.palette().muted.apply_to(THINKING).to_string();
        if let Err(e) = self.term.write_str(&text) {
            tracing::debug!(error = %e, "Failed to draw pending indicator");
        }
    }

    fn on_assistant_turn(&self, turn: &Turn) {
        self.line(&format_turn(turn, &self.palette()));
        self.line("");
    }

    fn on_failure(&self, notice: &FailureNotice) {
        self.line(&format_failure(notice, &self.palette()));
        self.line("");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use console::strip_ansi_codes;
    use pal_session::{DisclosureId, FailureKind, SourceDisclosure};

    fn plain(text: String) -> String {
        strip_ansi_codes(&text).into_owned()
    }

    fn disclosure() -> DisclosureId {
        SourceDisclosure::new().create()
    }

    #[test]
    fn time_is_hours_and_minutes() {
        let formatted = format_time(Utc::now());
        assert_eq!(formatted.len(), 5);
        assert_eq!(&formatted[2..3], ":");
    }

    #[test]
    fn user_turn_has_speaker_and_content() {
        let turn = Turn::user("What is the refund policy?");
        let out = plain(format_turn(&turn, &Theme::Light.palette()));
        assert!(out.starts_with("You "));
        assert!(out.ends_with("What is the refund policy?"));
    }

    #[test]
    fn assistant_turn_shows_sources_hint() {
        let turn = Turn::assistant(
            "Refunds are issued within 30 days.",
            vec![
                SourceRef::new("Refunds", "4.2", "c-17", 0.91),
                SourceRef::new("Returns", "5", "c-3", 0.5),
            ],
            Some("refund policy".into()),
            Some(disclosure()),
        );
        let out = plain(format_turn(&turn, &Theme::Dark.palette()));
        assert!(out.starts_with("PolicyPal "));
        assert!(out.contains("Searched for: refund policy"));
        assert!(out.contains("[2 sources referenced] /sources 1"));
    }

    #[test]
    fn assistant_turn_without_sources_has_no_hint() {
        let turn = Turn::assistant("No idea.", Vec::new(), None, None);
        let out = plain(format_turn(&turn, &Theme::Light.palette()));
        assert!(!out.contains("referenced"));
    }

    #[test]
    fn sources_list_percent_and_meta() {
        let sources = vec![SourceRef::new("Refunds", "4.2", "c-17", 0.915)];
        let out = plain(format_sources(&sources, &Theme::Light.palette()));
        assert!(out.contains("Refunds"));
        assert!(out.contains("92% match"));
        assert!(out.contains("Section 4.2 • Chunk c-17"));
    }

    #[test]
    fn failure_shows_generic_message() {
        let notice = FailureNotice::new(FailureKind::Transport);
        let out = plain(format_failure(&notice, &Theme::Light.palette()));
        assert!(out.contains("Sorry, I encountered an error. Please try again."));
        assert!(!out.contains("transport"));
    }

    #[test]
    fn welcome_lists_examples() {
        let out = plain(format_welcome(&["First?", "Second?"], &Theme::Light.palette()));
        assert!(out.contains("/example 1 First?"));
        assert!(out.contains("/example 2 Second?"));
    }

    #[test]
    fn welcome_without_examples() {
        let out = plain(format_welcome(&[], &Theme::Light.palette()));
        assert!(!out.contains("Try one of these"));
    }

    #[test]
    fn renderer_clones_share_theme() {
        let renderer = TerminalRenderer::new(Theme::Light);
        let clone = renderer.clone();
        clone.set_theme(Theme::Dark);
        assert_eq!(renderer.theme(), Theme::Dark);
    }
}
