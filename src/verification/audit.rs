//! Round audit log for post-hoc analysis.
//!
//! Records metadata about each accepted update so operators can see who
//! moved the global model, and by how much.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// Metadata for a single accepted update.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoundRecord {
    /// Round produced by this update.
    pub round: u64,
    /// Submitting client.
    pub client_id: String,
    /// False-positive rate the client reported.
    pub local_fpr: f64,
    /// Contribution count after the merge.
    pub contributions: u64,
    /// L2 distance between the submitted and previous global parameters
    /// (`None` for the first submission).
    pub drift: Option<f32>,
}

/// Records kept by default; older ones are evicted first.
pub const DEFAULT_HISTORY_LIMIT: usize = 1024;

/// Bounded audit log of accepted updates, oldest first.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuditLog {
    entries: VecDeque<RoundRecord>,
    limit: usize,
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditLog {
    /// Create an empty log keeping [`DEFAULT_HISTORY_LIMIT`] records.
    pub fn new() -> Self {
        Self::with_limit(DEFAULT_HISTORY_LIMIT)
    }

    /// Create an empty log keeping at most `limit` records (at least one).
    pub fn with_limit(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            entries: VecDeque::with_capacity(limit.min(DEFAULT_HISTORY_LIMIT)),
            limit,
        }
    }

    /// Append an entry, evicting the oldest once the log is full.
    pub fn push(&mut self, entry: RoundRecord) {
        if self.entries.len() == self.limit {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    /// Retained entries, oldest first.
    pub fn entries(&self) -> impl Iterator<Item = &RoundRecord> {
        self.entries.iter()
    }

    /// Most recent entry.
    pub fn last(&self) -> Option<&RoundRecord> {
        self.entries.back()
    }

    /// Number of retained records.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the log is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of retained records.
    pub fn limit(&self) -> usize {
        self.limit
    }
}
