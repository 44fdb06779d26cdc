//! EpochManager - issues search-session epochs
//!
//! The current epoch is the only piece of engine state that every delivery
//! consults, so it lives in a single atomic.

use std::sync::atomic::{AtomicU64, Ordering};

use lancea_model::Epoch;
use tracing::debug;

/// Monotonic epoch clock owned by the engine root
///
/// Starts with no current epoch (`Epoch::NONE`); the first call to
/// [`EpochManager::new_epoch`] returns 1.
#[derive(Debug, Default)]
pub struct EpochManager {
    current: AtomicU64,
}

impl EpochManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance to a fresh epoch, superseding every earlier one
    pub fn new_epoch(&self) -> Epoch {
        let epoch = Epoch(self.current.fetch_add(1, Ordering::AcqRel) + 1);
        debug!(%epoch, "EpochManager::new_epoch");
        epoch
    }

    pub fn current(&self) -> Epoch {
        Epoch(self.current.load(Ordering::Acquire))
    }

    pub fn is_current(&self, epoch: Epoch) -> bool {
        !epoch.is_none() && self.current.load(Ordering::Acquire) == epoch.get()
    }

    /// True when `epoch` was issued and has since been replaced
    pub fn is_superseded(&self, epoch: Epoch) -> bool {
        !epoch.is_none() && epoch.get() < self.current.load(Ordering::Acquire)
    }
}
