//! Pre-merge validation of client updates.
//!
//! Every check here runs before the aggregator touches global state, so a
//! rejected update can never be partially applied.

use crate::aggregators::ClientUpdate;
use crate::error::FedError;

/// Check that a client update is well-formed.
///
/// Rejects with [`FedError::Validation`] when the client id is blank, the
/// reported false-positive rate is not a finite value in `[0, 1]`, the update
/// carries no tensors, or any parameter value is non-finite.
pub fn validate_update(update: &ClientUpdate) -> Result<(), FedError> {
    if update.client_id.trim().is_empty() {
        return Err(FedError::Validation("client_id must not be empty".to_string()));
    }

    if !update.local_fpr.is_finite() || !(0.0..=1.0).contains(&update.local_fpr) {
        return Err(FedError::Validation(format!(
            "local_fpr {} is outside [0, 1]",
            update.local_fpr
        )));
    }

    if update.params.is_empty() {
        return Err(FedError::Validation("update carries no tensors".to_string()));
    }

    if let Some(name) = update.params.first_non_finite() {
        return Err(FedError::Validation(format!(
            "non-finite value in tensor {}",
            name
        )));
    }

    Ok(())
}
