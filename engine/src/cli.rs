//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use lancea_model::Epoch;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

use crate::events::EngineEvent;

/// How long an open-ended search waits for late providers once every
/// provider seen so far has finished
const SETTLE: Duration = Duration::from_millis(50);

/// Lancea - asynchronous search and command engine
#[derive(Parser)]
#[command(
    name = "lancea",
    about = "Multi-provider search and command engine for the Lancea launcher",
    version = env!("CARGO_PKG_VERSION"),
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the engine in the foreground, listening on its socket
    Serve,

    /// Check that a running engine answers
    Ping,

    /// Resolve free text to a command
    Resolve {
        /// Text as typed into the launcher
        text: String,
    },

    /// Run a search and print the streamed events
    Search {
        /// Query text
        text: String,

        /// Restrict to these providers (repeatable)
        #[arg(short, long = "provider")]
        providers: Vec<String>,

        /// Continue this epoch instead of starting a new one
        #[arg(short, long, default_value = "0")]
        epoch: u64,

        /// Give up after this many quiet milliseconds
        #[arg(short, long, default_value = "500")]
        wait_ms: u64,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Ask a provider for a preview of one result
    Preview {
        provider: String,
        key: String,

        /// Epoch the key came from (0 for current)
        #[arg(short, long, default_value = "0")]
        epoch: u64,
    },

    /// Run an action on one result
    Execute {
        provider: String,
        action: String,
        key: String,
    },
}

/// Get the log file path
pub fn get_log_path() -> PathBuf {
    debug!("get_log_path: called");
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("lancea")
        .join("logs")
        .join("lancea.log")
}

/// Tracks which providers are still streaming one search epoch
///
/// A provider is finished once it sends `end`, times out or panics. Other
/// errors can be followed by more batches.
#[derive(Debug)]
pub struct SearchProgress {
    epoch: Epoch,
    /// Providers named on the command line; empty means "whoever answers"
    expected: BTreeSet<String>,
    seen: BTreeSet<String>,
    finished: BTreeSet<String>,
}

impl SearchProgress {
    pub fn new(epoch: Epoch, providers: &[String]) -> Self {
        Self {
            epoch,
            expected: providers.iter().cloned().collect(),
            seen: BTreeSet::new(),
            finished: BTreeSet::new(),
        }
    }

    /// Record an event; returns false when it belongs to another epoch
    pub fn observe(&mut self, event: &EngineEvent) -> bool {
        if event.epoch() != self.epoch {
            return false;
        }
        let provider_id = event.provider_id().to_string();
        let terminal = match event {
            EngineEvent::ResultsUpdated { batch, .. } => batch.data.is_end(),
            EngineEvent::ProviderError { error, .. } => matches!(error.data.code.as_str(), "timeout" | "panicked"),
            EngineEvent::PreviewUpdated { .. } => false,
        };
        if terminal {
            self.finished.insert(provider_id.clone());
        }
        self.seen.insert(provider_id);
        true
    }

    /// Every provider expected or seen so far has finished
    pub fn is_complete(&self) -> bool {
        let mut all = self.expected.iter().chain(self.seen.iter()).peekable();
        all.peek().is_some() && all.all(|p| self.finished.contains(p))
    }

    /// How long to wait for the next event, or None when the search is over
    ///
    /// With explicit providers, completion is final. Otherwise a provider
    /// that has not reported yet may still show up, so a short settle window
    /// replaces the quiet timeout.
    pub fn next_wait(&self, quiet: Duration) -> Option<Duration> {
        match (self.is_complete(), self.expected.is_empty()) {
            (false, _) => Some(quiet),
            (true, true) => Some(SETTLE.min(quiet)),
            (true, false) => None,
        }
    }
}

/// Output format for commands that print results
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown format: {}. Use: text or json", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
        }
    }
}
