//! Inference collaborator seam.
//!
//! Image classification runs outside this crate. The ledger only needs it
//! when a diagnosis is recreated with a different model, and it calls it
//! before opening any transaction.

use std::sync::OnceLock;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("No inference service configured")]
    NotConfigured,

    #[error("Cannot connect to inference service at {0}")]
    Connection(String),

    #[error("Inference service returned {status}: {body}")]
    Service { status: u16, body: String },

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Malformed inference response: {0}")]
    ResponseParsing(String),
}

/// Output of one model run over one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Disease label as named in the catalog.
    pub label: String,
    pub confidence: f64,
    #[serde(default)]
    pub model_accuracy: Option<f64>,
    #[serde(default)]
    pub heatmap_ref: Option<String>,
}

/// Anything that can classify a stored image with a named model.
pub trait InferenceEngine: Send + Sync {
    fn predict(&self, image_ref: &str, model: &str) -> Result<Prediction, InferenceError>;
}

/// Placeholder used when no inference endpoint is configured.
pub struct UnconfiguredInference;

impl InferenceEngine for UnconfiguredInference {
    fn predict(&self, _image_ref: &str, _model: &str) -> Result<Prediction, InferenceError> {
        Err(InferenceError::NotConfigured)
    }
}

/// Blocking HTTP client for an external inference service.
///
/// Contract: `POST {base_url}/predict` with `{"image_ref", "model"}`,
/// answered by a JSON `Prediction`.
pub struct HttpInferenceClient {
    base_url: String,
    timeout_secs: u64,
    client: OnceLock<reqwest::blocking::Client>,
}

#[derive(Serialize)]
struct PredictRequest<'a> {
    image_ref: &'a str,
    model: &'a str,
}

impl HttpInferenceClient {
    pub fn new(base_url: &str, timeout_secs: u64) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout_secs,
            client: OnceLock::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // Built on first use so construction never happens on an async worker.
    fn client(&self) -> Result<&reqwest::blocking::Client, InferenceError> {
        if let Some(client) = self.client.get() {
            return Ok(client);
        }
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .build()
            .map_err(|e| InferenceError::HttpClient(e.to_string()))?;
        Ok(self.client.get_or_init(|| client))
    }
}

impl InferenceEngine for HttpInferenceClient {
    fn predict(&self, image_ref: &str, model: &str) -> Result<Prediction, InferenceError> {
        let url = format!("{}/predict", self.base_url);
        let response = self
            .client()?
            .post(&url)
            .json(&PredictRequest { image_ref, model })
            .send()
            .map_err(|e| {
                if e.is_connect() {
                    InferenceError::Connection(self.base_url.clone())
                } else if e.is_timeout() {
                    InferenceError::HttpClient(format!(
                        "Request timed out after {}s",
                        self.timeout_secs
                    ))
                } else {
                    InferenceError::HttpClient(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(InferenceError::Service {
                status: status.as_u16(),
                body,
            });
        }

        let prediction: Prediction = response
            .json()
            .map_err(|e| InferenceError::ResponseParsing(e.to_string()))?;

        tracing::debug!(image_ref, model, label = %prediction.label, "Inference completed");
        Ok(prediction)
    }
}

/// Deterministic engine for tests: returns the same prediction for any
/// image and records nothing.
#[cfg(test)]
pub struct FixedInference(pub Prediction);

#[cfg(test)]
impl InferenceEngine for FixedInference {
    fn predict(&self, _image_ref: &str, _model: &str) -> Result<Prediction, InferenceError> {
        Ok(self.0.clone())
    }
}
