//! Interactive chat loop over stdin.

use std::path::Path;

use anyhow::Result;
use pal_session::{Backend, ChatSession, DisclosureId};
use tokio::io::{self, AsyncBufReadExt, BufReader};

use crate::render::{format_history, format_sources, format_welcome, TerminalRenderer};
use crate::theme;

pub const EXAMPLE_QUESTIONS: &[&str] = &[
    "What is the conflict of interest policy?",
    "How many vacation days do employees get?",
    "Can I work remotely?",
];

const HELP: &str = "Commands: /sources <id>  /history  /example <n>  /theme  /help  /quit";

/// One line of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Ask(String),
    Sources(DisclosureId),
    History,
    Example(usize),
    Theme,
    Help,
    Quit,
    Invalid(String),
    Empty,
}

pub fn parse_command(line: &str) -> Command {
    let line = line.trim();
    if line.is_empty() {
        return Command::Empty;
    }
    let Some(rest) = line.strip_prefix('/') else {
        return Command::Ask(line.to_string());
    };

    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest, ""),
    };
    match name {
        "quit" | "exit" => Command::Quit,
        "history" => Command::History,
        "theme" => Command::Theme,
        "help" => Command::Help,
        "sources" => match arg.parse() {
            Ok(id) => Command::Sources(id),
            Err(_) => Command::Invalid("Usage: /sources <id>".into()),
        },
        "example" => match arg.parse::<usize>() {
            Ok(n) if (1..=EXAMPLE_QUESTIONS.len()).contains(&n) => Command::Example(n),
            _ => Command::Invalid(format!(
                "Usage: /example <1-{}>",
                EXAMPLE_QUESTIONS.len()
            )),
        },
        other => Command::Invalid(format!("Unknown command /{other}. {HELP}")),
    }
}

/// Run the chat loop until `/quit` or end of input.
pub async fn run<B: Backend>(
    session: &ChatSession<B>,
    renderer: &TerminalRenderer,
    preferences: &Path,
) -> Result<()> {
    let mut examples_visible = true;
    renderer.line(&format_welcome(EXAMPLE_QUESTIONS, &renderer.palette()));
    renderer.line("");
    renderer.note(HELP);

    let mut lines = BufReader::new(io::stdin()).lines();
    loop {
        renderer.prompt();
        let Some(line) = lines.next_line().await? else {
            break;
        };

        let query = match parse_command(&line) {
            Command::Empty => continue,
            Command::Quit => break,
            Command::Ask(query) => query,
            Command::Example(n) => EXAMPLE_QUESTIONS[n - 1].to_string(),
            Command::Sources(id) => {
                show_sources(session, renderer, id);
                continue;
            }
            Command::History => {
                renderer.line(&format_history(&session.history(), &renderer.palette()));
                continue;
            }
            Command::Theme => {
                let next = renderer.theme().toggled();
                renderer.set_theme(next);
                if let Err(e) = theme::save_to(preferences, next) {
                    tracing::warn!(error = %e, "Failed to save theme preference");
                }
                renderer.note(&format!("Theme: {next}"));
                continue;
            }
            Command::Help => {
                if examples_visible {
                    renderer.line(&format_welcome(EXAMPLE_QUESTIONS, &renderer.palette()));
                }
                renderer.note(HELP);
                continue;
            }
            Command::Invalid(message) => {
                renderer.note(&message);
                continue;
            }
        };

        examples_visible = false;
        // Turns and failures are drawn by the renderer as the session reports them.
        session.send(&query).await;
    }

    Ok(())
}

fn show_sources<B: Backend>(session: &ChatSession<B>, renderer: &TerminalRenderer, id: DisclosureId) {
    let Some(state) = session.toggle_sources(id) else {
        renderer.note(&format!("No sources with id {id}."));
        return;
    };
    if !state.is_expanded() {
        renderer.note(&format!("Sources {id} collapsed."));
        return;
    }

    let history = session.history();
    match history.turns().iter().find(|t| t.disclosure == Some(id)) {
        Some(turn) => renderer.line(&format_sources(&turn.sources, &renderer.palette())),
        None => renderer.note(&format!("Sources {id} are no longer in the conversation.")),
    }
}
