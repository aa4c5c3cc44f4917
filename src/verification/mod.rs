//! Verification primitives for client updates.
//!
//! - [`update`] - Reject malformed updates before any state mutation
//! - [`audit`] - Bounded log of accepted updates

pub mod audit;
pub mod update;

pub use audit::{AuditLog, RoundRecord, DEFAULT_HISTORY_LIMIT};
pub use update::validate_update;
