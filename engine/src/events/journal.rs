//! Event Journal - appends push events to a JSONL file
//!
//! The journal subscribes to the EventBus like any other client and writes
//! one timestamped line per event. It is a debugging aid: nothing in the
//! engine reads it back at runtime.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use eyre::{Context, Result};
use tokio::sync::broadcast;
use tracing::{debug, error, warn};

use super::bus::EventBus;
use super::types::{EngineEvent, JournalEntry};

/// Appends events to a single JSONL file
pub struct EventJournal {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl EventJournal {
    /// Open (or create) the journal file, creating parent directories
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        debug!(?path, "EventJournal::open");

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).context(format!("Failed to create journal directory {:?}", parent))?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .context(format!("Failed to open journal {:?}", path))?;

        Ok(Self {
            path,
            writer: BufWriter::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one event as a JSON line
    pub fn write_event(&mut self, event: &EngineEvent) -> Result<()> {
        debug!(event_type = event.event_type(), epoch = %event.epoch(), "EventJournal::write_event");
        let entry = JournalEntry::new(event.clone());
        let json = serde_json::to_string(&entry)?;
        writeln!(self.writer, "{}", json)?;
        self.writer.flush()?;
        Ok(())
    }

    /// Consume events from the bus until it closes
    pub async fn run(mut self, event_bus: Arc<EventBus>) {
        let rx = event_bus.subscribe();
        // The bus itself must not be kept alive by the journal
        drop(event_bus);
        self.run_with(rx).await;
    }

    async fn run_with(&mut self, mut rx: broadcast::Receiver<EngineEvent>) {
        debug!(path = ?self.path, "EventJournal::run: starting");
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if let Err(e) = self.write_event(&event) {
                        error!(error = %e, "EventJournal: failed to write event");
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(missed = n, "EventJournal: lagged behind, missed events");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("EventJournal: channel closed, shutting down");
                    break;
                }
            }
        }
        let _ = self.writer.flush();
    }
}

/// Read a journal back, skipping lines that do not parse
pub fn read_journal(path: impl AsRef<Path>) -> Result<Vec<JournalEntry>> {
    let path = path.as_ref();
    debug!(?path, "read_journal");

    if !path.exists() {
        return Ok(Vec::new());
    }

    let content = fs::read_to_string(path).context(format!("Failed to read journal {:?}", path))?;
    let mut entries = Vec::new();

    for line in content.lines() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<JournalEntry>(line) {
            Ok(entry) => entries.push(entry),
            Err(e) => {
                warn!(line, error = %e, "read_journal: failed to parse line");
            }
        }
    }

    debug!(count = entries.len(), "read_journal: loaded entries");
    Ok(entries)
}

/// Default journal location: `<data-local-dir>/lancea/events.jsonl`
pub fn default_journal_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("lancea")
        .join("events.jsonl")
}

/// Spawn the journal as a background task
///
/// The receiver is taken before spawning so no event emitted after this
/// call returns is missed.
pub fn spawn_journal(event_bus: &EventBus, path: impl AsRef<Path>) -> Result<tokio::task::JoinHandle<()>> {
    let mut journal = EventJournal::open(path)?;
    let rx = event_bus.subscribe();
    Ok(tokio::spawn(async move {
        journal.run_with(rx).await;
    }))
}
