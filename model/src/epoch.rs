//! Epoch identifier

use std::fmt;

use serde::{Deserialize, Serialize};

/// Monotonic identifier of a search session
///
/// Issued by the engine starting at 1. `Epoch::NONE` (0) only ever appears
/// in requests, where it means "start a new epoch".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Epoch(pub u64);

impl Epoch {
    /// Sentinel for "no epoch supplied"
    pub const NONE: Epoch = Epoch(0);

    pub const fn get(self) -> u64 {
        self.0
    }

    pub const fn is_none(self) -> bool {
        self.0 == 0
    }
}

impl From<u64> for Epoch {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for Epoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
