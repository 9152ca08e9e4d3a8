#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::missing_errors_doc, clippy::module_name_repetitions)]

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use pal_common::logging::init_logging;
use pal_common::config::config_path;
use pal_common::{Config, Validate};
use pal_session::{probe_health, Backend, ChatSession, HttpBackend, SendOutcome};

mod render;
mod repl;
mod theme;

use render::TerminalRenderer;
use theme::Theme;

/// `policypal` - ask questions about your policy documents.
#[derive(Parser, Debug)]
#[command(name = "policypal")]
#[command(version)]
#[command(about = "Chat with the PolicyPal document assistant.", long_about = None)]
struct Cli {
    /// Answering service base URL (overrides config and POLICYPAL_API_URL)
    #[arg(long, global = true)]
    endpoint: Option<String>,

    /// Path to the configuration file (default: ~/.policypal/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start an interactive chat (default)
    Chat,

    /// Ask a single question and exit
    Ask {
        /// The question
        #[arg(required = true)]
        question: Vec<String>,
    },

    /// Check that the answering service is reachable
    Health,

    /// Show or change the color theme
    Theme {
        #[arg(value_enum)]
        mode: Option<ThemeMode>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ThemeMode {
    Dark,
    Light,
    Toggle,
}

/// Resolve the configuration and the file it was read from, if any.
fn load_config(cli: &Cli) -> Result<(Config, Option<PathBuf>)> {
    let (mut config, source) = match &cli.config {
        Some(path) => (Config::load_from(path)?, Some(path.clone())),
        None => {
            let path = config_path();
            match Config::load_optional(&path)? {
                Some(config) => (config, Some(path)),
                None => (Config::default(), None),
            }
        }
    };
    config.apply_env_overrides();
    if let Some(endpoint) = &cli.endpoint {
        config.backend.endpoint.clone_from(endpoint);
    }
    config.validate().context("Invalid configuration")?;
    Ok((config, source))
}

fn build_session(config: &Config, renderer: &TerminalRenderer) -> Result<ChatSession<HttpBackend>> {
    let backend = HttpBackend::new(config.endpoint())?;
    Ok(ChatSession::from_config(backend, &config.session).with_observer(renderer.clone()))
}

fn spawn_health_probe(backend: HttpBackend) {
    tokio::spawn(async move {
        probe_health(&backend).await;
    });
}

async fn chat(config: &Config) -> Result<ExitCode> {
    let preferences = theme::preferences_path();
    let renderer = TerminalRenderer::new(theme::load_from(&preferences));
    let session = build_session(config, &renderer)?;

    if config.backend.health_check {
        spawn_health_probe(session.backend().clone());
    }

    repl::run(&session, &renderer, &preferences).await?;
    Ok(ExitCode::SUCCESS)
}

async fn ask(config: &Config, question: &str) -> Result<ExitCode> {
    let renderer = TerminalRenderer::new(theme::load());
    let session = build_session(config, &renderer)?;

    Ok(match session.send(question).await {
        SendOutcome::Answered(turn) => {
            if let Some(id) = turn.disclosure {
                if session.toggle_sources(id).is_some_and(|s| s.is_expanded()) {
                    renderer.line(&render::format_sources(&turn.sources, &renderer.palette()));
                }
            }
            ExitCode::SUCCESS
        }
        SendOutcome::Failed(_) => ExitCode::FAILURE,
        SendOutcome::Skipped(_) => {
            renderer.note("Nothing to ask.");
            ExitCode::from(2)
        }
    })
}

async fn health(config: &Config) -> Result<ExitCode> {
    let renderer = TerminalRenderer::new(theme::load());
    let palette = renderer.palette();
    let backend = HttpBackend::new(config.endpoint())?;

    Ok(match backend.health().await {
        Ok(()) => {
            renderer.line(&format!(
                "{} {} is healthy",
                palette.accent.apply_to("✓"),
                backend.endpoint()
            ));
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::debug!(kind = %e.kind(), error = %e, "Health check failed");
            renderer.line(&format!(
                "{} Cannot reach {}: {e}",
                palette.error.apply_to("✗"),
                backend.endpoint()
            ));
            ExitCode::FAILURE
        }
    })
}

fn set_theme(mode: Option<ThemeMode>) -> Result<ExitCode> {
    let current = theme::load();
    let next = match mode {
        None => current,
        Some(ThemeMode::Dark) => Theme::Dark,
        Some(ThemeMode::Light) => Theme::Light,
        Some(ThemeMode::Toggle) => current.toggled(),
    };
    if mode.is_some() {
        theme::save(next)?;
    }
    println!("{next}");
    Ok(ExitCode::SUCCESS)
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let (config, source) = load_config(&cli)?;

    init_logging(
        &config.observability.log_level,
        &config.observability.log_format,
    );
    match &source {
        Some(path) => tracing::debug!(path = %path.display(), "Configuration loaded"),
        None => tracing::info!("Config file not found, using defaults"),
    }

    match cli.command.unwrap_or(Commands::Chat) {
        Commands::Chat => chat(&config).await,
        Commands::Ask { question } => ask(&config, &question.join(" ")).await,
        Commands::Health => health(&config).await,
        Commands::Theme { mode } => set_theme(mode),
    }
}
