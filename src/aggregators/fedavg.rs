//! Federated averaging over parameter sets.
//!
//! [`running_average`] folds one update into a global model that already
//! represents `count` contributions, so N sequential merges give every
//! contribution equal weight regardless of arrival order. [`fedavg`] is the
//! batch form (McMahan et al., 2017) over a slice of updates.

use ndarray::Zip;
use rayon::prelude::*;

use crate::error::FedError;
use crate::params::{NamedTensor, ParameterSet};

/// Merge `update` into `global`, which currently represents `count` contributions.
///
/// Computes `(count * global + update) / (count + 1)` element-wise for every
/// tensor. With `count == 0` the update is returned unchanged. Intermediate
/// arithmetic is done in f64.
pub fn running_average(
    global: &ParameterSet,
    count: u64,
    update: &ParameterSet,
) -> Result<ParameterSet, FedError> {
    if count == 0 {
        return Ok(update.clone());
    }

    let expected = global.signature();
    let actual = update.signature();
    if expected != actual {
        return Err(FedError::ShapeMismatch { expected, actual });
    }

    let c = count as f64;
    let merged: Vec<NamedTensor> = global
        .tensors()
        .par_iter()
        .zip(update.tensors().par_iter())
        .map(|(g, u)| {
            let mut value = g.value.clone();
            Zip::from(&mut value).and(&u.value).for_each(|acc, &x| {
                *acc = ((c * f64::from(*acc) + f64::from(x)) / (c + 1.0)) as f32;
            });
            NamedTensor {
                name: g.name.clone(),
                value,
            }
        })
        .collect();

    let mut result = ParameterSet::new();
    for t in merged {
        result.push(t.name, t.value);
    }
    Ok(result)
}

/// Batch FedAvg: (optionally weighted) arithmetic mean of parameter sets.
///
/// # Arguments
///
/// * `updates` - Client parameter sets (one per client), identical signatures
/// * `weights` - Optional client weights (e.g., proportional to dataset size)
pub fn fedavg(updates: &[ParameterSet], weights: Option<&[f32]>) -> Result<ParameterSet, FedError> {
    if updates.is_empty() {
        return Err(FedError::Validation("no updates to average".to_string()));
    }

    let expected = updates[0].signature();
    for update in &updates[1..] {
        let actual = update.signature();
        if actual != expected {
            return Err(FedError::ShapeMismatch { expected, actual });
        }
    }

    let weights: Vec<f32> = match weights {
        Some(w) => {
            if w.len() != updates.len() {
                return Err(FedError::Validation(format!(
                    "{} weights for {} updates",
                    w.len(),
                    updates.len()
                )));
            }
            w.to_vec()
        }
        None => vec![1.0; updates.len()],
    };
    let weight_sum: f32 = weights.iter().sum();
    if weight_sum == 0.0 {
        return Err(FedError::Validation("client weights sum to zero".to_string()));
    }

    let mut result = ParameterSet::new();
    for (i, first) in updates[0].tensors().iter().enumerate() {
        let sum = updates
            .iter()
            .zip(&weights)
            .fold(first.value.mapv(|_| 0.0f32), |acc, (update, &w)| {
                acc + &(&update.tensors()[i].value * w)
            });
        result.push(first.name.clone(), sum / weight_sum);
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr1;

    fn single(values: &[f32]) -> ParameterSet {
        ParameterSet::from_tensors(vec![arr1(values).into_dyn()])
    }

    #[test]
    fn test_running_average_first_contribution() {
        let update = single(&[1.5, -2.0]);
        let result = running_average(&ParameterSet::new(), 0, &update).unwrap();
        assert_eq!(result, update);
    }

    #[test]
    fn test_running_average_formula() {
        // (3 * 2.0 + 6.0) / 4 = 3.0
        let result = running_average(&single(&[2.0]), 3, &single(&[6.0])).unwrap();
        assert!((result.flatten()[0] - 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_running_average_keeps_global_names() {
        let global = ParameterSet::new().with_tensor("dense_1/bias", arr1(&[0.0]).into_dyn());
        let result = running_average(&global, 1, &single(&[2.0])).unwrap();
        assert_eq!(result.tensors()[0].name, "dense_1/bias");
        assert!((result.flatten()[0] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_running_average_shape_mismatch() {
        let result = running_average(&single(&[1.0]), 1, &single(&[1.0, 2.0]));
        assert!(matches!(result, Err(FedError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_fedavg_unweighted() {
        let updates = vec![single(&[1.0, 2.0]), single(&[3.0, 4.0])];
        let result = fedavg(&updates, None).unwrap().flatten();
        assert!((result[0] - 2.0).abs() < 1e-6);
        assert!((result[1] - 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_fedavg_weighted() {
        let updates = vec![single(&[1.0]), single(&[3.0])];
        let weights = vec![1.0, 3.0]; // Second client has 3x weight
        let result = fedavg(&updates, Some(&weights)).unwrap();
        // (1*1 + 3*3) / 4 = 10/4 = 2.5
        assert!((result.flatten()[0] - 2.5).abs() < 1e-6);
    }

    #[test]
    fn test_fedavg_empty() {
        assert!(fedavg(&[], None).is_err());
    }

    #[test]
    fn test_fedavg_weight_length_mismatch() {
        let updates = vec![single(&[1.0]), single(&[2.0])];
        assert!(fedavg(&updates, Some(&[1.0])).is_err());
    }

    #[test]
    fn test_sequential_running_average_matches_fedavg() {
        let updates = vec![single(&[1.0, 10.0]), single(&[2.0, 20.0]), single(&[6.0, 0.0])];
        let mut global = ParameterSet::new();
        for (count, update) in updates.iter().enumerate() {
            global = running_average(&global, count as u64, update).unwrap();
        }
        let batch = fedavg(&updates, None).unwrap();
        for (a, b) in global.flatten().iter().zip(batch.flatten()) {
            assert!((a - b).abs() < 1e-5);
        }
    }
}
