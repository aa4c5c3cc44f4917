//! Distances between flattened parameter vectors.
//!
//! Used to report how far a client update drifted from the global model it
//! was trained against. Sums accumulate in f64 so large models do not lose
//! precision.

/// Squared L2 distance between two equal-length slices.
///
/// Returns `None` when the lengths differ.
pub fn l2_distance_sq(a: &[f32], b: &[f32]) -> Option<f64> {
    if a.len() != b.len() {
        return None;
    }
    Some(
        a.iter()
            .zip(b)
            .map(|(&x, &y)| {
                let d = f64::from(x) - f64::from(y);
                d * d
            })
            .sum(),
    )
}

/// L2 (Euclidean) distance between two equal-length slices.
pub fn l2_distance(a: &[f32], b: &[f32]) -> Option<f32> {
    l2_distance_sq(a, b).map(|sq| sq.sqrt() as f32)
}
