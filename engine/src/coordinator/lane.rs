//! Per-epoch session state

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};

use lancea_model::{BatchPayload, Epoch};
use tokio_util::sync::CancellationToken;

/// Delivery state for one (epoch, provider) pair
#[derive(Debug, Default)]
pub(crate) struct Lane {
    last_token: u64,
    keys: HashSet<String>,
}

impl Lane {
    /// Take the next token and record the batch's keys
    pub(crate) fn stamp(&mut self, batch: &BatchPayload) -> u64 {
        self.last_token += 1;
        self.keys.extend(batch.items().iter().map(|item| item.key.clone()));
        self.last_token
    }

    pub(crate) fn contains_key(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    #[cfg(test)]
    pub(crate) fn last_token(&self) -> u64 {
        self.last_token
    }
}

pub(crate) type SharedLane = Arc<Mutex<Lane>>;

pub(crate) fn lock_lane(lane: &SharedLane) -> std::sync::MutexGuard<'_, Lane> {
    lane.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Everything that belongs to the current epoch
///
/// Replaced wholesale when a new epoch starts, which is what reclaims the
/// previous epoch's lanes.
#[derive(Debug)]
pub(crate) struct Session {
    pub(crate) epoch: Epoch,
    /// Parent of every unit's token in this epoch
    pub(crate) cancel: CancellationToken,
    pub(crate) lanes: HashMap<String, SharedLane>,
}

impl Session {
    pub(crate) fn new(epoch: Epoch) -> Self {
        Self {
            epoch,
            cancel: CancellationToken::new(),
            lanes: HashMap::new(),
        }
    }

    pub(crate) fn lane(&mut self, provider_id: &str) -> SharedLane {
        self.lanes.entry(provider_id.to_string()).or_default().clone()
    }

    /// Whether output for `epoch` may still be delivered
    pub(crate) fn accepts(&self, epoch: Epoch) -> bool {
        !epoch.is_none() && self.epoch == epoch && !self.cancel.is_cancelled()
    }
}
