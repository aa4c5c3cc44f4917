//! Remote [`ModelService`] over the aggregator's HTTP API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::debug;

use super::ModelService;
use crate::aggregators::{ClientUpdate, GlobalModelState, SubmitAck};
use crate::config::ClientConfig;
use crate::error::FedError;
use crate::wire::{ErrorResponse, GlobalModelResponse, UpdateRequest, UpdateResponse};

/// HTTP client for a remote aggregator.
#[derive(Clone, Debug)]
pub struct HttpModelClient {
    base_url: String,
    http: reqwest::Client,
}

impl HttpModelClient {
    /// Client for `base_url` (e.g. `http://localhost:8000`).
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, FedError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    /// Client from the `client` config section.
    pub fn from_config(cfg: &ClientConfig) -> Result<Self, FedError> {
        Self::new(
            cfg.aggregator_url.clone(),
            Duration::from_secs(cfg.request_timeout_secs),
        )
    }

    /// Base URL requests are sent to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl ModelService for HttpModelClient {
    async fn fetch_global(&self) -> Result<GlobalModelState, FedError> {
        let response = self.http.get(self.url("/model/global")).send().await?;
        if !response.status().is_success() {
            return Err(FedError::Transport(format!(
                "GET /model/global returned {}",
                response.status()
            )));
        }
        let body: GlobalModelResponse = response.json().await?;
        debug!(round = body.round, tensors = body.weights.len(), "fetched global model");
        // a malformed model from the server is a transport fault, not ours
        body.into_state().map_err(|e| FedError::Transport(e.to_string()))
    }

    async fn submit_update(&self, update: ClientUpdate) -> Result<SubmitAck, FedError> {
        let request = UpdateRequest::from_update(&update);
        let response = self
            .http
            .post(self.url("/model/update"))
            .json(&request)
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => {
                let body: UpdateResponse = response.json().await?;
                Ok(body.into_ack())
            }
            StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => {
                let body: ErrorResponse = response.json().await?;
                Err(body.into_error())
            }
            status => Err(FedError::Transport(format!(
                "POST /model/update returned {}",
                status
            ))),
        }
    }
}
