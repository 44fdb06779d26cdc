//! Lancea - asynchronous search and command engine
//!
//! CLI entry point: runs the engine or talks to a running one.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use colored::Colorize;
use eyre::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use lancea::cli::{Cli, Command, OutputFormat, SearchProgress, get_log_path};
use lancea::config::Config;
use lancea::engine::Engine;
use lancea::events::{EngineEvent, spawn_journal};
use lancea::ipc::{self, EngineClient};
use lancea_model::{BatchPayload, Epoch, OutcomeStatus};

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Note: Can't log params here since logging isn't initialized yet
    let log_path = get_log_path();
    if let Some(log_dir) = log_path.parent() {
        fs::create_dir_all(log_dir).context("Failed to create log directory")?;
    }

    // Priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    // Append: client subcommands share the file with a running engine
    let log_file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .context("Failed to open log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load log level from config file early (before full config load)
    let config_log_level = Config::load_log_level(cli.config.as_ref());
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    let client = EngineClient::with_socket_path(config.socket_path());

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        None | Some(Command::Serve) => cmd_serve(config, cli.config).await,
        Some(Command::Ping) => cmd_ping(&client).await,
        Some(Command::Resolve { text }) => cmd_resolve(&client, &text).await,
        Some(Command::Search {
            text,
            providers,
            epoch,
            wait_ms,
            format,
        }) => cmd_search(&client, &text, &providers, Epoch(epoch), wait_ms, format).await,
        Some(Command::Preview { provider, key, epoch }) => cmd_preview(&client, &provider, &key, Epoch(epoch)).await,
        Some(Command::Execute { provider, action, key }) => cmd_execute(&client, &provider, &action, &key).await,
    }
}

/// Run the engine until SIGINT or SIGTERM
async fn cmd_serve(config: Config, config_path: Option<PathBuf>) -> Result<()> {
    debug!("cmd_serve: called");
    let engine = Arc::new(
        Engine::builder(config.engine.clone())
            .commands(config.command_registry())
            .build(),
    );

    let journal_handle = if config.journal.enabled {
        let path = config.journal.expanded_path();
        info!(?path, "Event journal enabled");
        Some(spawn_journal(engine.bus(), &path)?)
    } else {
        None
    };

    let (listener, socket_path) = ipc::create_listener_at(&config.socket_path())?;
    let shutdown = CancellationToken::new();
    let server = tokio::spawn(ipc::serve(listener, engine.clone(), shutdown.clone()));

    info!(?socket_path, "Engine running. Press Ctrl+C to stop, SIGHUP to reload commands.");
    println!("Lancea engine listening on {}", socket_path.display());

    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sighup = signal(SignalKind::hangup())?;
        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;

        loop {
            tokio::select! {
                _ = sighup.recv() => {
                    info!("SIGHUP received - reloading commands");
                    match Config::load(config_path.as_ref()) {
                        Ok(reloaded) => engine.reload_commands(reloaded.command_registry()),
                        Err(e) => tracing::error!(error = %e, "Failed to reload config"),
                    }
                }
                _ = sigint.recv() => {
                    warn!("SIGINT received");
                    break;
                }
                _ = sigterm.recv() => {
                    warn!("SIGTERM received");
                    break;
                }
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
    }

    info!("Engine shutting down...");
    shutdown.cancel();
    engine.shutdown();
    let _ = server.await;
    ipc::cleanup_socket(&socket_path);
    if let Some(handle) = journal_handle {
        handle.abort();
    }
    debug!("cmd_serve: shutdown complete");
    Ok(())
}

async fn cmd_ping(client: &EngineClient) -> Result<()> {
    debug!("cmd_ping: called");
    if !client.socket_exists() {
        println!("{} Lancea engine is not running", "✗".red());
        println!("No socket at {}", client.socket_path().display());
        return Ok(());
    }

    match client.ping().await {
        Ok(version) => {
            println!("{} Lancea engine is alive", "✓".green());
            println!("Version: {}", version);
        }
        Err(e) => {
            println!("{} Socket exists but the engine is not responding", "✗".red());
            println!("Error: {}", e);
        }
    }
    Ok(())
}

async fn cmd_resolve(client: &EngineClient, text: &str) -> Result<()> {
    let mut conn = client.connect().await?;
    let resolved = conn.resolve_command(text).await?;
    if resolved.is_empty() {
        println!("{}", "no command".dimmed());
        return Ok(());
    }
    println!(
        "{} -> {} ({})",
        resolved.command_id.as_deref().unwrap_or_default().bold(),
        resolved.provider_id.as_deref().unwrap_or_default(),
        resolved.reason.as_deref().unwrap_or_default()
    );
    if let Some(argument) = resolved.argument.as_deref().filter(|a| !a.is_empty()) {
        println!("argument: {}", argument);
    }
    Ok(())
}

async fn cmd_search(
    client: &EngineClient,
    text: &str,
    providers: &[String],
    epoch: Epoch,
    wait_ms: u64,
    format: OutputFormat,
) -> Result<()> {
    let mut conn = client.connect().await?;
    let epoch = conn.search(text, providers, epoch).await?;
    if format == OutputFormat::Text {
        println!("{} {}", "epoch".dimmed(), epoch);
    }

    let quiet = Duration::from_millis(wait_ms);
    let mut progress = SearchProgress::new(epoch, providers);
    while let Some(wait) = progress.next_wait(quiet)
        && let Some(event) = conn.next_event(wait).await?
    {
        if !progress.observe(&event) {
            continue;
        }
        match format {
            OutputFormat::Json => println!("{}", serde_json::to_string(&event)?),
            OutputFormat::Text => print_event(&event),
        }
    }
    Ok(())
}

fn print_event(event: &EngineEvent) {
    match event {
        EngineEvent::ResultsUpdated {
            provider_id,
            token,
            batch,
            ..
        } => match &batch.data {
            BatchPayload::End => println!("[{}] #{} {}", provider_id.cyan(), token, "end".dimmed()),
            payload => {
                println!("[{}] #{} {}", provider_id.cyan(), token, payload.kind());
                for item in payload.items() {
                    match &item.subtitle {
                        Some(subtitle) => println!("  {}  {}  {}", item.key.dimmed(), item.title, subtitle.dimmed()),
                        None => println!("  {}  {}", item.key.dimmed(), item.title),
                    }
                }
            }
        },
        EngineEvent::PreviewUpdated {
            provider_id,
            key,
            preview,
            ..
        } => println!("[{}] preview {}: {}", provider_id.cyan(), key, preview.data.data),
        EngineEvent::ProviderError {
            provider_id, error, ..
        } => println!(
            "[{}] {} {}",
            provider_id.cyan(),
            error.data.code.red(),
            error.data.message
        ),
    }
}

async fn cmd_preview(client: &EngineClient, provider: &str, key: &str, epoch: Epoch) -> Result<()> {
    let mut conn = client.connect().await?;
    let tagged = conn.request_preview(provider, key, epoch).await?;
    let wait = Duration::from_secs(5);
    while let Some(event) = conn.next_event(wait).await? {
        if event.epoch() == tagged && event.provider_id() == provider {
            match &event {
                EngineEvent::PreviewUpdated { key: got, .. } if got == key => {
                    print_event(&event);
                    return Ok(());
                }
                EngineEvent::ProviderError { .. } => {
                    print_event(&event);
                    return Ok(());
                }
                _ => {}
            }
        }
    }
    println!("{}", "no preview received".dimmed());
    Ok(())
}

async fn cmd_execute(client: &EngineClient, provider: &str, action: &str, key: &str) -> Result<()> {
    let mut conn = client.connect().await?;
    let outcome = conn.execute(provider, action, key).await?;
    match outcome.status {
        OutcomeStatus::Ok => println!("{}", "ok".green()),
        OutcomeStatus::Error => println!("{}", "error".red()),
    }
    if let Some(message) = &outcome.message {
        println!("{}", message);
    }
    if let Some(data) = &outcome.data {
        println!("{}", serde_json::to_string_pretty(data)?);
    }
    Ok(())
}
