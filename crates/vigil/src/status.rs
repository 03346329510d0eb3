use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::duration;
use crate::probe::ProbeOutcome;
use crate::target::{Target, TargetId};

/// Last completed health snapshot of a target.
///
/// A fresh target starts at `Status::default()`: down, never checked.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub is_up: bool,
    #[serde(rename = "response_time_ms", default, with = "duration::millis_opt")]
    pub response_time: Option<Duration>,
    pub last_check: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl Status {
    pub fn from_outcome(outcome: ProbeOutcome, checked_at: DateTime<Utc>) -> Self {
        Self {
            is_up: outcome.is_up,
            response_time: outcome.response_time,
            last_check: Some(checked_at),
            last_error: outcome.error,
        }
    }

    /// True until the first probe result has been recorded.
    pub fn is_unchecked(&self) -> bool {
        self.last_check.is_none()
    }
}

/// Target joined with its current status, as returned by listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetWithStatus {
    #[serde(flatten)]
    pub target: Target,
    pub status: Status,
}

/// Per-target status cells.
///
/// The map lock is only held to look up or insert a cell, never across a
/// probe, so writers for unrelated targets do not contend. Each cell is a
/// `watch` channel: a write replaces the whole value and readers always
/// clone a complete snapshot.
#[derive(Debug, Default)]
pub struct StatusStore {
    cells: RwLock<HashMap<TargetId, watch::Sender<Status>>>,
}

impl StatusStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the zero-value status for a newly registered target.
    pub fn insert(&self, id: TargetId) {
        let mut cells = self.cells.write().unwrap_or_else(PoisonError::into_inner);
        cells.entry(id).or_insert_with(|| watch::Sender::new(Status::default()));
    }

    pub fn get(&self, id: &TargetId) -> Option<Status> {
        let cells = self.cells.read().unwrap_or_else(PoisonError::into_inner);
        cells.get(id).map(|cell| cell.borrow().clone())
    }

    /// Replace the status of `id`. Returns false when the target is gone, in
    /// which case the result is dropped.
    pub fn set(&self, id: &TargetId, status: Status) -> bool {
        let cells = self.cells.read().unwrap_or_else(PoisonError::into_inner);
        match cells.get(id) {
            Some(cell) => {
                cell.send_replace(status);
                true
            }
            None => false,
        }
    }

    pub fn remove(&self, id: &TargetId) -> Option<Status> {
        let mut cells = self.cells.write().unwrap_or_else(PoisonError::into_inner);
        cells.remove(id).map(|cell| cell.borrow().clone())
    }

    /// Watch a target's status. The receiver closes when the target is removed.
    pub fn subscribe(&self, id: &TargetId) -> Option<watch::Receiver<Status>> {
        let cells = self.cells.read().unwrap_or_else(PoisonError::into_inner);
        cells.get(id).map(watch::Sender::subscribe)
    }

    pub fn len(&self) -> usize {
        self.cells.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
