//! HTTP surface of the aggregator.
//!
//! | Route | Body |
//! |-------|------|
//! | `GET /model/global` | [`GlobalModelResponse`] |
//! | `POST /model/update` | [`UpdateRequest`] -> [`UpdateResponse`] |
//! | `GET /model/history` | `[RoundRecord]` |
//! | `GET /health` | [`HealthResponse`] |
//!
//! Model routes are also mounted under `/api`.

use std::future::Future;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::aggregators::GlobalModelStore;
use crate::error::FedError;
use crate::verification::RoundRecord;
use crate::wire::{
    ErrorResponse, GlobalModelResponse, HealthResponse, UpdateRequest, UpdateResponse,
};

/// A [`FedError`] rendered as an HTTP error response.
#[derive(Debug)]
pub struct ApiError(pub FedError);

impl From<FedError> for ApiError {
    fn from(err: FedError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0 {
            FedError::ShapeMismatch { .. } => StatusCode::CONFLICT,
            FedError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(ErrorResponse::from(&self.0))).into_response()
    }
}

/// Build the router over a shared store.
pub fn router(store: Arc<GlobalModelStore>) -> Router {
    let model_routes = Router::new()
        .route("/model/global", get(get_global))
        .route("/model/update", post(post_update))
        .route("/model/history", get(get_history));

    Router::new()
        .merge(model_routes.clone())
        .nest("/api", model_routes)
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(store)
}

/// Serve the router on `listener` until `shutdown` resolves.
pub async fn serve<F>(
    listener: TcpListener,
    store: Arc<GlobalModelStore>,
    shutdown: F,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    info!(addr = ?listener.local_addr().ok(), policy = ?store.policy(), "aggregator listening");
    axum::serve(listener, router(store))
        .with_graceful_shutdown(shutdown)
        .await
}

async fn get_global(State(store): State<Arc<GlobalModelStore>>) -> Json<GlobalModelResponse> {
    let snapshot = store.fetch();
    Json(GlobalModelResponse::from(snapshot.as_ref()))
}

async fn post_update(
    State(store): State<Arc<GlobalModelStore>>,
    payload: Result<Json<UpdateRequest>, JsonRejection>,
) -> Result<Json<UpdateResponse>, ApiError> {
    let Json(request) = payload.map_err(|rejection| FedError::Validation(rejection.body_text()))?;
    let update = request.into_update()?;
    let ack = store.submit(update)?;
    Ok(Json(UpdateResponse::from(ack)))
}

async fn get_history(State(store): State<Arc<GlobalModelStore>>) -> Json<Vec<RoundRecord>> {
    Json(store.history())
}

async fn health(State(store): State<Arc<GlobalModelStore>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        round: store.round(),
    })
}
