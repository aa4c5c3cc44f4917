//! Global model store and merge policies.
//!
//! The [`GlobalModelStore`] is the single authoritative copy of the shared
//! model. It starts **Uninitialized** (round 0, no shape signature), becomes
//! **Active** on the first accepted submission, and stays Active for the life
//! of the process:
//!
//! | Policy | Merge | Notes |
//! |--------|-------|-------|
//! | [`MergePolicy::RunningAverage`] | `(c*G + U)/(c+1)` | Default, order-independent |
//! | [`MergePolicy::Replace`] | `U` | Latest update wins |
//!
//! Submissions are serialized by a mutex; fetches read an immutable
//! [`Arc`] snapshot and never observe a half-merged model.

pub mod fedavg;

pub use fedavg::{fedavg, running_average};

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::FedError;
use crate::params::{ParameterSet, ShapeSignature};
use crate::verification::{validate_update, AuditLog, RoundRecord, DEFAULT_HISTORY_LIMIT};

/// How an accepted update is folded into the global model.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergePolicy {
    /// Running average over all contributions (default)
    #[default]
    RunningAverage,
    /// Submitted parameters replace the global ones
    Replace,
}

/// A client's locally trained parameters, consumed immediately on submit.
#[derive(Clone, Debug, PartialEq)]
pub struct ClientUpdate {
    /// Submitting client (not required to be unique across time)
    pub client_id: String,
    /// Full updated weights
    pub params: ParameterSet,
    /// Reported local false-positive rate in `[0, 1]`
    pub local_fpr: f64,
}

impl ClientUpdate {
    /// Create a new client update.
    pub fn new(client_id: impl Into<String>, params: ParameterSet, local_fpr: f64) -> Self {
        Self {
            client_id: client_id.into(),
            params,
            local_fpr,
        }
    }
}

/// Snapshot of the aggregator's current generation.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GlobalModelState {
    /// Number of accepted updates so far
    pub round: u64,
    /// Current global parameters (empty until the first submission)
    pub params: ParameterSet,
    /// Number of contributions folded into `params`
    pub contributions: u64,
}

impl GlobalModelState {
    /// Whether a shape signature has been fixed yet.
    pub fn is_initialized(&self) -> bool {
        self.contributions > 0
    }
}

/// Acknowledgment returned for an accepted submission.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitAck {
    /// Round after the merge
    pub round: u64,
    /// Contribution count after the merge
    pub contributions: u64,
}

/// Process-wide authoritative global model.
///
/// Create one per serving process and share it by [`Arc`] with every
/// handler and in-process client.
///
/// # Example
///
/// ```rust
/// use fallguard_fl::{ClientUpdate, GlobalModelStore, MergePolicy, ParameterSet};
/// use ndarray::arr1;
///
/// let store = GlobalModelStore::new(MergePolicy::RunningAverage);
///
/// let a = ParameterSet::from_tensors(vec![arr1(&[1.0, 2.0]).into_dyn()]);
/// let b = ParameterSet::from_tensors(vec![arr1(&[3.0, 4.0]).into_dyn()]);
/// store.submit(ClientUpdate::new("athlete", a, 0.05)).unwrap();
/// let ack = store.submit(ClientUpdate::new("senior", b, 0.2)).unwrap();
///
/// assert_eq!(ack.round, 2);
/// assert_eq!(store.fetch().params.flatten(), vec![2.0, 3.0]);
/// ```
pub struct GlobalModelStore {
    policy: MergePolicy,
    state: RwLock<Arc<GlobalModelState>>,
    merge_lock: Mutex<()>,
    audit: RwLock<AuditLog>,
}

impl Default for GlobalModelStore {
    fn default() -> Self {
        Self::new(MergePolicy::default())
    }
}

impl GlobalModelStore {
    /// Create an uninitialized store (round 0, empty parameters).
    pub fn new(policy: MergePolicy) -> Self {
        Self::with_history_limit(policy, DEFAULT_HISTORY_LIMIT)
    }

    /// Like [`new`](Self::new), keeping at most `limit` audit records.
    pub fn with_history_limit(policy: MergePolicy, limit: usize) -> Self {
        Self {
            policy,
            state: RwLock::new(Arc::new(GlobalModelState::default())),
            merge_lock: Mutex::new(()),
            audit: RwLock::new(AuditLog::with_limit(limit)),
        }
    }

    /// Merge policy in effect.
    pub fn policy(&self) -> MergePolicy {
        self.policy
    }

    /// Read-only snapshot of the current round and parameters.
    pub fn fetch(&self) -> Arc<GlobalModelState> {
        Arc::clone(&self.state.read())
    }

    /// Current round.
    pub fn round(&self) -> u64 {
        self.state.read().round
    }

    /// Number of contributions folded into the global model.
    pub fn contributions(&self) -> u64 {
        self.state.read().contributions
    }

    /// Fixed shape signature, once the first update has been accepted.
    pub fn shape_signature(&self) -> Option<ShapeSignature> {
        let state = self.fetch();
        state.is_initialized().then(|| state.params.signature())
    }

    /// Audit records of the most recent accepted updates, oldest first.
    pub fn history(&self) -> Vec<RoundRecord> {
        self.audit.read().entries().cloned().collect()
    }

    /// Validate and merge a client update.
    ///
    /// All validation happens before any mutation: a rejected update leaves
    /// round, parameters and contribution count untouched. An accepted update
    /// advances the round by exactly one.
    pub fn submit(&self, update: ClientUpdate) -> Result<SubmitAck, FedError> {
        if let Err(err) = validate_update(&update) {
            warn!(client_id = %update.client_id, error = %err, "rejected malformed update");
            return Err(err);
        }

        let _merge = self.merge_lock.lock();
        let current = self.fetch();

        if current.is_initialized() {
            let expected = current.params.signature();
            let actual = update.params.signature();
            if expected != actual {
                warn!(
                    client_id = %update.client_id,
                    %expected,
                    %actual,
                    "rejected update with mismatched shapes"
                );
                return Err(FedError::ShapeMismatch { expected, actual });
            }
        }

        let drift = if current.is_initialized() {
            update.params.l2_distance(&current.params)
        } else {
            None
        };

        let ClientUpdate {
            client_id,
            params,
            local_fpr,
        } = update;

        let merged = match self.policy {
            MergePolicy::RunningAverage => {
                running_average(&current.params, current.contributions, &params)?
            }
            MergePolicy::Replace => params,
        };

        let next = Arc::new(GlobalModelState {
            round: current.round + 1,
            params: merged,
            contributions: current.contributions + 1,
        });
        *self.state.write() = Arc::clone(&next);

        self.audit.write().push(RoundRecord {
            round: next.round,
            client_id: client_id.clone(),
            local_fpr,
            contributions: next.contributions,
            drift,
        });

        info!(
            %client_id,
            round = next.round,
            contributions = next.contributions,
            local_fpr,
            drift = drift.unwrap_or(0.0),
            "merged client update"
        );

        Ok(SubmitAck {
            round: next.round,
            contributions: next.contributions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr1, arr2};

    fn two_tensor(scale: f32) -> ParameterSet {
        ParameterSet::new()
            .with_tensor("w", arr2(&[[scale, 2.0 * scale]]).into_dyn())
            .with_tensor("b", arr1(&[scale]).into_dyn())
    }

    #[test]
    fn test_fresh_store_is_uninitialized() {
        let store = GlobalModelStore::default();
        let state = store.fetch();
        assert_eq!(state.round, 0);
        assert!(state.params.is_empty());
        assert!(!state.is_initialized());
        assert!(store.shape_signature().is_none());
    }

    #[test]
    fn test_first_submit_adopts_signature() {
        let store = GlobalModelStore::default();
        let ack = store.submit(ClientUpdate::new("a", two_tensor(1.0), 0.1)).unwrap();
        assert_eq!(ack, SubmitAck { round: 1, contributions: 1 });
        assert_eq!(store.shape_signature(), Some(two_tensor(1.0).signature()));
        assert_eq!(store.fetch().params, two_tensor(1.0));
    }

    #[test]
    fn test_running_average_policy() {
        let store = GlobalModelStore::new(MergePolicy::RunningAverage);
        store.submit(ClientUpdate::new("a", two_tensor(1.0), 0.1)).unwrap();
        store.submit(ClientUpdate::new("b", two_tensor(3.0), 0.1)).unwrap();
        let flat = store.fetch().params.flatten();
        assert!((flat[0] - 2.0).abs() < 1e-6);
        assert!((flat[1] - 4.0).abs() < 1e-6);
        assert!((flat[2] - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_replace_policy() {
        let store = GlobalModelStore::new(MergePolicy::Replace);
        store.submit(ClientUpdate::new("a", two_tensor(1.0), 0.1)).unwrap();
        let ack = store.submit(ClientUpdate::new("b", two_tensor(3.0), 0.1)).unwrap();
        assert_eq!(ack.contributions, 2);
        assert_eq!(store.fetch().params, two_tensor(3.0));
    }

    #[test]
    fn test_rejected_update_leaves_state() {
        let store = GlobalModelStore::default();
        store.submit(ClientUpdate::new("a", two_tensor(1.0), 0.1)).unwrap();
        let before = store.fetch();

        let bad = ParameterSet::from_tensors(vec![arr1(&[1.0, 2.0, 3.0]).into_dyn()]);
        let result = store.submit(ClientUpdate::new("b", bad, 0.1));

        assert!(matches!(result, Err(FedError::ShapeMismatch { .. })));
        assert_eq!(*store.fetch(), *before);
        assert_eq!(store.history().len(), 1);
    }

    #[test]
    fn test_history_records_drift() {
        let store = GlobalModelStore::default();
        store.submit(ClientUpdate::new("a", two_tensor(0.0), 0.1)).unwrap();
        store.submit(ClientUpdate::new("b", two_tensor(1.0), 0.3)).unwrap();

        let history = store.history();
        assert_eq!(history.len(), 2);
        assert!(history[0].drift.is_none());
        // distance between [0,0,0] and [1,2,1] = sqrt(6)
        let drift = history[1].drift.unwrap();
        assert!((drift - 6.0f32.sqrt()).abs() < 1e-5);
        assert_eq!(history[1].client_id, "b");
        assert_eq!(history[1].round, 2);
    }

    #[test]
    fn test_history_is_bounded() {
        let store = GlobalModelStore::with_history_limit(MergePolicy::RunningAverage, 2);
        for i in 0..5 {
            store.submit(ClientUpdate::new(format!("c{}", i), two_tensor(1.0), 0.1)).unwrap();
        }
        let rounds: Vec<u64> = store.history().iter().map(|r| r.round).collect();
        assert_eq!(rounds, vec![4, 5]);
        assert_eq!(store.round(), 5);
        assert_eq!(store.contributions(), 5);
    }

    #[test]
    fn test_snapshot_survives_later_submit() {
        let store = GlobalModelStore::default();
        store.submit(ClientUpdate::new("a", two_tensor(1.0), 0.1)).unwrap();
        let snapshot = store.fetch();
        store.submit(ClientUpdate::new("b", two_tensor(5.0), 0.1)).unwrap();
        assert_eq!(snapshot.round, 1);
        assert_eq!(snapshot.params, two_tensor(1.0));
    }
}
