//! Wire access to the remote analysis service.
//!
//! [`AnalysisTransport`] moves bytes and reports raw HTTP status, headers and
//! body. Deciding what counts as accepted, when to back off and when to give
//! up is left to [`crate::pipeline::analysis::AnalysisClient`].

use crate::config::ExtractionConfig;
use crate::error::ExtractError;
use async_trait::async_trait;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, RETRY_AFTER};
use reqwest::{Body, Client};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Header carrying the subscription key.
pub const SUBSCRIPTION_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";
/// Header naming the URL to poll for the submitted job.
pub const OPERATION_LOCATION_HEADER: &str = "Operation-Location";

/// A request that produced no HTTP response.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct TransportError(pub String);

/// Raw answer to a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitReply {
    pub status: u16,
    pub operation_location: Option<String>,
    pub body: String,
}

/// Raw answer to a status poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollReply {
    pub status: u16,
    /// Numeric `Retry-After` header, when present.
    pub retry_after: Option<Duration>,
    pub body: String,
}

impl PollReply {
    /// A 200 reply with a JSON body.
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            retry_after: None,
            body: body.into(),
        }
    }

    /// A bodiless reply with the given status.
    pub fn status(status: u16) -> Self {
        Self {
            status,
            retry_after: None,
            body: String::new(),
        }
    }
}

/// Moves artifacts and status requests to the analysis service.
#[async_trait]
pub trait AnalysisTransport: Send + Sync {
    /// Upload the artifact at `path` as the request body.
    async fn submit(&self, path: &Path, content_type: &str) -> Result<SubmitReply, TransportError>;

    /// GET the operation location.
    async fn fetch(&self, operation: &str) -> Result<PollReply, TransportError>;
}

/// [`AnalysisTransport`] over HTTPS with `reqwest`.
pub struct HttpTransport {
    client: Client,
    analyze_url: String,
    api_key: String,
}

impl HttpTransport {
    pub fn from_config(config: &ExtractionConfig) -> Result<Self, ExtractError> {
        if config.endpoint.is_empty() {
            return Err(ExtractError::InvalidConfig(
                "analysis endpoint is not set".into(),
            ));
        }
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ExtractError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            analyze_url: analyze_url(config),
            api_key: config.api_key.clone(),
        })
    }
}

/// `{endpoint}/documentintelligence/documentModels/{model}:analyze?api-version={v}`
pub fn analyze_url(config: &ExtractionConfig) -> String {
    format!(
        "{}/documentintelligence/documentModels/{}:analyze?api-version={}",
        config.endpoint.trim_end_matches('/'),
        config.model_id,
        config.api_version
    )
}

#[async_trait]
impl AnalysisTransport for HttpTransport {
    async fn submit(&self, path: &Path, content_type: &str) -> Result<SubmitReply, TransportError> {
        let file = tokio::fs::File::open(path)
            .await
            .map_err(|e| TransportError(format!("cannot open {}: {e}", path.display())))?;
        let len = file
            .metadata()
            .await
            .map_err(|e| TransportError(format!("cannot stat {}: {e}", path.display())))?
            .len();

        debug!("POST {} ({} bytes, {})", self.analyze_url, len, content_type);
        let response = self
            .client
            .post(&self.analyze_url)
            .header(SUBSCRIPTION_KEY_HEADER, &self.api_key)
            .header(CONTENT_TYPE, content_type)
            .header(CONTENT_LENGTH, len)
            .body(Body::from(file))
            .send()
            .await
            .map_err(|e| TransportError(format!("submit request failed: {e}")))?;

        let status = response.status().as_u16();
        let operation_location = response
            .headers()
            .get(OPERATION_LOCATION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response
            .text()
            .await
            .map_err(|e| TransportError(format!("submit body read failed: {e}")))?;

        Ok(SubmitReply {
            status,
            operation_location,
            body,
        })
    }

    async fn fetch(&self, operation: &str) -> Result<PollReply, TransportError> {
        let response = self
            .client
            .get(operation)
            .header(SUBSCRIPTION_KEY_HEADER, &self.api_key)
            .send()
            .await
            .map_err(|e| TransportError(format!("poll request failed: {e}")))?;

        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<u64>().ok())
            .map(Duration::from_secs);
        let body = response
            .text()
            .await
            .map_err(|e| TransportError(format!("poll body read failed: {e}")))?;

        Ok(PollReply {
            status,
            retry_after,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn analyze_url_shape() {
        let config = ExtractionConfig::builder()
            .endpoint("https://res.cognitiveservices.azure.com/")
            .build()
            .unwrap();
        assert_eq!(
            analyze_url(&config),
            "https://res.cognitiveservices.azure.com/documentintelligence/documentModels/prebuilt-layout:analyze?api-version=2024-11-30"
        );
    }

    #[test]
    fn missing_endpoint_is_config_error() {
        let config = ExtractionConfig::default();
        assert!(matches!(
            HttpTransport::from_config(&config),
            Err(ExtractError::InvalidConfig(_))
        ));
    }
}
