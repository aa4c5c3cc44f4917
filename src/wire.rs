//! JSON wire format for the aggregator API.
//!
//! Tensors travel as nested JSON arrays whose nesting depth is the tensor
//! rank; a bare number is a rank-0 tensor. Tensor order is significant,
//! names are not transmitted.

use ndarray::{ArrayD, ArrayViewD, Axis, IxDyn};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::aggregators::{ClientUpdate, GlobalModelState, SubmitAck};
use crate::error::FedError;
use crate::params::{ParameterSet, ShapeSignature, Tensor};

/// Body of `GET /model/global`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GlobalModelResponse {
    /// Current round
    pub round: u64,
    /// One nested array per tensor; empty before the first update
    pub weights: Vec<Value>,
    /// Contributions folded into `weights`
    #[serde(default)]
    pub contributions: u64,
}

/// Body of `POST /model/update`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UpdateRequest {
    /// Submitting client
    pub client_id: String,
    /// One nested array per tensor
    pub weights: Vec<Value>,
    /// Reported local false-positive rate
    pub local_fpr: f64,
}

/// Successful response of `POST /model/update`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateResponse {
    /// Round after the merge
    pub round: u64,
    /// Contribution count after the merge; absent from `{round}`-only servers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contributions: Option<u64>,
}

impl From<SubmitAck> for UpdateResponse {
    fn from(ack: SubmitAck) -> Self {
        Self {
            round: ack.round,
            contributions: Some(ack.contributions),
        }
    }
}

impl UpdateResponse {
    /// Acknowledgment as seen by the client.
    ///
    /// Without a `contributions` field the count is taken from `round`; every
    /// accepted update advances both by one under either merge policy.
    pub fn into_ack(self) -> SubmitAck {
        SubmitAck {
            round: self.round,
            contributions: self.contributions.unwrap_or(self.round),
        }
    }
}

/// Error payload returned on rejected requests.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// `ShapeMismatchError`, `ValidationError`, ...
    pub error: String,
    /// Human-readable detail
    pub message: String,
    /// Fixed signature (shape mismatches only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<ShapeSignature>,
    /// Rejected signature (shape mismatches only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual: Option<ShapeSignature>,
}

impl From<&FedError> for ErrorResponse {
    fn from(err: &FedError) -> Self {
        let (message, expected, actual) = match err {
            FedError::ShapeMismatch { expected, actual } => {
                (err.to_string(), Some(expected.clone()), Some(actual.clone()))
            }
            FedError::Validation(msg)
            | FedError::Transport(msg)
            | FedError::Training(msg)
            | FedError::Config(msg) => (msg.clone(), None, None),
        };
        Self {
            error: err.kind().to_string(),
            message,
            expected,
            actual,
        }
    }
}

impl ErrorResponse {
    /// Rebuild the error on the client side.
    pub fn into_error(self) -> FedError {
        match (self.error.as_str(), self.expected, self.actual) {
            ("ShapeMismatchError", Some(expected), Some(actual)) => {
                FedError::ShapeMismatch { expected, actual }
            }
            ("ValidationError", _, _) => FedError::Validation(self.message),
            _ => FedError::Transport(format!("{}: {}", self.error, self.message)),
        }
    }
}

/// Body of `GET /health`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always `ok` while serving
    pub status: String,
    /// Current round
    pub round: u64,
}

impl From<&GlobalModelState> for GlobalModelResponse {
    fn from(state: &GlobalModelState) -> Self {
        Self {
            round: state.round,
            weights: params_to_wire(&state.params),
            contributions: state.contributions,
        }
    }
}

impl GlobalModelResponse {
    /// Decode into a model snapshot.
    pub fn into_state(self) -> Result<GlobalModelState, FedError> {
        Ok(GlobalModelState {
            round: self.round,
            params: params_from_wire(&self.weights)?,
            contributions: self.contributions,
        })
    }
}

impl UpdateRequest {
    /// Encode a client update.
    pub fn from_update(update: &ClientUpdate) -> Self {
        Self {
            client_id: update.client_id.clone(),
            weights: params_to_wire(&update.params),
            local_fpr: update.local_fpr,
        }
    }

    /// Decode into a client update.
    pub fn into_update(self) -> Result<ClientUpdate, FedError> {
        Ok(ClientUpdate {
            params: params_from_wire(&self.weights)?,
            client_id: self.client_id,
            local_fpr: self.local_fpr,
        })
    }
}

/// Encode every tensor as a nested array.
pub fn params_to_wire(params: &ParameterSet) -> Vec<Value> {
    params.values().map(|t| tensor_to_json(&t.view())).collect()
}

/// Decode nested arrays into a parameter set (`tensor_{i}` names).
pub fn params_from_wire(weights: &[Value]) -> Result<ParameterSet, FedError> {
    let tensors = weights
        .iter()
        .enumerate()
        .map(|(i, w)| {
            tensor_from_json(w)
                .map_err(|e| FedError::Validation(format!("weights[{}]: {}", i, e)))
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ParameterSet::from_tensors(tensors))
}

/// Encode one tensor as a nested JSON array.
pub fn tensor_to_json(tensor: &ArrayViewD<'_, f32>) -> Value {
    if tensor.ndim() == 0 {
        return tensor.iter().next().map_or(Value::Null, |&v| Value::from(v));
    }
    Value::Array(
        tensor
            .axis_iter(Axis(0))
            .map(|sub| tensor_to_json(&sub))
            .collect(),
    )
}

/// Decode a nested JSON array, rejecting ragged or non-numeric input.
///
/// The shape is inferred from the first element at each level, so nothing
/// is reserved up front; `flatten_into` only grows the buffer by leaves that
/// are actually present.
pub fn tensor_from_json(value: &Value) -> Result<Tensor, String> {
    let shape = infer_shape(value)?;
    shape
        .iter()
        .try_fold(1usize, |acc, &d| acc.checked_mul(d))
        .ok_or_else(|| format!("tensor shape {:?} overflows", shape))?;
    let mut data = Vec::new();
    flatten_into(value, &shape, &mut data)?;
    ArrayD::from_shape_vec(IxDyn(&shape), data).map_err(|e| e.to_string())
}

fn infer_shape(value: &Value) -> Result<Vec<usize>, String> {
    match value {
        Value::Number(_) => Ok(Vec::new()),
        Value::Array(items) => {
            let mut shape = vec![items.len()];
            if let Some(first) = items.first() {
                shape.extend(infer_shape(first)?);
            }
            Ok(shape)
        }
        other => Err(format!("expected number or array, found {}", json_type(other))),
    }
}

fn flatten_into(value: &Value, shape: &[usize], out: &mut Vec<f32>) -> Result<(), String> {
    match (shape.split_first(), value) {
        (None, Value::Number(n)) => {
            let v = n.as_f64().ok_or_else(|| format!("unrepresentable number {}", n))?;
            out.push(v as f32);
            Ok(())
        }
        (Some((&len, rest)), Value::Array(items)) => {
            if items.len() != len {
                return Err(format!(
                    "ragged array: expected {} elements, found {}",
                    len,
                    items.len()
                ));
            }
            items.iter().try_for_each(|item| flatten_into(item, rest, out))
        }
        (None, other) => Err(format!("expected number, found {}", json_type(other))),
        (Some(_), other) => Err(format!("expected array, found {}", json_type(other))),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr0, arr1, arr2};
    use serde_json::json;

    #[test]
    fn test_matrix_encoding() {
        let t = arr2(&[[1.0f32, 2.0], [3.0, 4.0]]).into_dyn();
        assert_eq!(tensor_to_json(&t.view()), json!([[1.0, 2.0], [3.0, 4.0]]));
    }

    #[test]
    fn test_scalar_encoding() {
        let t = arr0(1.5f32).into_dyn();
        assert_eq!(tensor_to_json(&t.view()), json!(1.5));
        assert_eq!(tensor_from_json(&json!(1.5)).unwrap(), t);
    }

    #[test]
    fn test_decode_shapes() {
        let t = tensor_from_json(&json!([[0.5, 1.0, 2.0], [3.0, 4.0, 5.0]])).unwrap();
        assert_eq!(t.shape(), &[2, 3]);
        assert_eq!(t[[1, 2]], 5.0);

        let empty = tensor_from_json(&json!([])).unwrap();
        assert_eq!(empty.shape(), &[0]);
    }

    #[test]
    fn test_decode_rejects_ragged() {
        let err = tensor_from_json(&json!([[1.0, 2.0], [3.0]])).unwrap_err();
        assert!(err.contains("ragged"));
    }

    #[test]
    fn test_decode_rejects_non_numeric() {
        assert!(tensor_from_json(&json!([1.0, "x"])).is_err());
        assert!(tensor_from_json(&json!({"a": 1})).is_err());
        assert!(tensor_from_json(&json!([[1.0], 2.0])).is_err());
    }

    /// `[[...[x, 0, 0, ...], 0, 0, ...], ...]` with `width` entries per level.
    fn lopsided(depth: usize, width: usize) -> Value {
        let mut value = json!(0.0);
        for _ in 0..depth {
            let mut level = vec![value];
            level.extend(std::iter::repeat(json!(0.0)).take(width - 1));
            value = Value::Array(level);
        }
        value
    }

    #[test]
    fn test_decode_rejects_deep_lopsided_nesting() {
        // inferred shape is [10; 12], far more than the leaves present
        let err = tensor_from_json(&lopsided(12, 10)).unwrap_err();
        assert!(err.contains("expected array"), "{}", err);
    }

    #[test]
    fn test_decode_rejects_overflowing_shape() {
        let err = tensor_from_json(&lopsided(20, 10)).unwrap_err();
        assert!(err.contains("overflows"), "{}", err);
    }

    #[test]
    fn test_params_from_wire_error_names_position() {
        let err = params_from_wire(&[json!([1.0]), json!([[1.0], []])]).unwrap_err();
        match err {
            FedError::Validation(msg) => assert!(msg.starts_with("weights[1]")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_update_request_uses_wire_field_names() {
        let update = ClientUpdate::new(
            "client_7",
            ParameterSet::from_tensors(vec![arr1(&[0.25f32]).into_dyn()]),
            0.05,
        );
        let body = serde_json::to_value(UpdateRequest::from_update(&update)).unwrap();
        assert_eq!(body, json!({"client_id": "client_7", "weights": [[0.25]], "local_fpr": 0.05}));
    }

    #[test]
    fn test_update_response_contributions() {
        let ack = SubmitAck {
            round: 5,
            contributions: 5,
        };
        let body = serde_json::to_value(UpdateResponse::from(ack)).unwrap();
        assert_eq!(body, json!({"round": 5, "contributions": 5}));

        let bare: UpdateResponse = serde_json::from_value(json!({"round": 3})).unwrap();
        assert_eq!(bare.contributions, None);
        assert_eq!(bare.into_ack(), SubmitAck { round: 3, contributions: 3 });
    }

    #[test]
    fn test_missing_field_is_rejected() {
        let parsed =
            serde_json::from_value::<UpdateRequest>(json!({"client_id": "a", "weights": []}));
        assert!(parsed.is_err());
    }

    #[test]
    fn test_empty_global_encodes_empty_weights() {
        let empty = GlobalModelResponse::from(&GlobalModelState::default());
        let body = serde_json::to_value(empty).unwrap();
        assert_eq!(body["round"], json!(0));
        assert_eq!(body["weights"], json!([]));
    }

    #[test]
    fn test_error_response_round_trip() {
        let err = FedError::ShapeMismatch {
            expected: ShapeSignature::new(vec![vec![3]]),
            actual: ShapeSignature::new(vec![vec![4]]),
        };
        let payload = ErrorResponse::from(&err);
        assert_eq!(payload.error, "ShapeMismatchError");
        assert_eq!(payload.into_error(), err);

        let err = FedError::Validation("local_fpr 2 is outside [0, 1]".into());
        assert_eq!(ErrorResponse::from(&err).into_error(), err);
    }
}
