//! Numeric helpers shared by the aggregator.
//!
//! - [`norms`] - distances between flattened parameter vectors

pub mod norms;

pub use norms::{l2_distance, l2_distance_sq};
