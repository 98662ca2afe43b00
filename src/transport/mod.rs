//! Generation transports.
//!
//! A [`TransportClient`] talks to exactly one backend, picked once when the
//! client is built:
//! - [`Transport::Adapter`] - a caller-supplied [`GenerationAdapter`], awaited
//!   directly with no retry (the adapter owns its own resilience)
//! - [`Transport::Proxy`] - `POST {endpoint}` with `{prompt, outputType}`,
//!   expecting `{code}` back
//! - [`Transport::Direct`] - `POST {endpoint}?key={apiKey}` with the backend's
//!   nested request shape
//!
//! Proxy and direct requests go through [`retry::with_backoff`].

pub mod retry;
mod types;

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::models::ArtifactType;

pub use retry::RetryPolicy;
pub use types::*;

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status}")]
    Status { status: u16, body: String },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("No API key configured for the direct endpoint")]
    MissingApiKey,

    #[error(transparent)]
    Adapter(anyhow::Error),

    #[error("Request cancelled")]
    Cancelled,
}

impl TransportError {
    /// Network faults and non-success statuses are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Http(_) | Self::Status { .. })
    }
}

/// Caller-supplied generation backend.
#[async_trait]
pub trait GenerationAdapter: Send + Sync {
    async fn generate(&self, request: GenerationRequest) -> anyhow::Result<GeneratedCode>;
}

/// Adapter backed by an async closure.
pub struct FnAdapter<F>(F);

/// Wrap an async closure as a [`GenerationAdapter`].
pub fn adapter_fn<F, Fut>(f: F) -> FnAdapter<F>
where
    F: Fn(GenerationRequest) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<GeneratedCode>> + Send,
{
    FnAdapter(f)
}

#[async_trait]
impl<F, Fut> GenerationAdapter for FnAdapter<F>
where
    F: Fn(GenerationRequest) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<GeneratedCode>> + Send,
{
    async fn generate(&self, request: GenerationRequest) -> anyhow::Result<GeneratedCode> {
        (self.0)(request).await
    }
}

#[derive(Clone)]
pub enum Transport {
    Adapter(Arc<dyn GenerationAdapter>),
    Proxy { endpoint: String },
    Direct { endpoint: String, api_key: Option<String> },
}

impl Transport {
    /// Resolve the transport: adapter, then proxy, then direct.
    pub fn resolve(config: &Config, adapter: Option<Arc<dyn GenerationAdapter>>) -> Self {
        if let Some(adapter) = adapter {
            return Self::Adapter(adapter);
        }
        if let Some(endpoint) = &config.proxy_endpoint {
            return Self::Proxy {
                endpoint: endpoint.clone(),
            };
        }
        Self::Direct {
            endpoint: config.api_endpoint.clone(),
            api_key: config.api_key.clone(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Adapter(_) => "adapter",
            Self::Proxy { .. } => "proxy",
            Self::Direct { .. } => "direct",
        }
    }
}

impl fmt::Debug for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Adapter(_) => f.write_str("Adapter(..)"),
            Self::Proxy { endpoint } => f.debug_struct("Proxy").field("endpoint", endpoint).finish(),
            Self::Direct { endpoint, api_key } => f
                .debug_struct("Direct")
                .field("endpoint", endpoint)
                .field("api_key", &api_key.as_ref().map(|_| "***"))
                .finish(),
        }
    }
}

/// Client for the resolved transport.
#[derive(Debug, Clone)]
pub struct TransportClient {
    transport: Transport,
    retry: RetryPolicy,
    client: Client,
}

impl TransportClient {
    pub fn new(transport: Transport) -> Self {
        Self {
            transport,
            retry: RetryPolicy::default(),
            client: Client::new(),
        }
    }

    pub fn from_config(config: &Config, adapter: Option<Arc<dyn GenerationAdapter>>) -> Self {
        Self::new(Transport::resolve(config, adapter))
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /// Send one compiled prompt and return the generated code.
    ///
    /// Returns [`TransportError::Cancelled`] as soon as `cancel` fires,
    /// including while waiting out a backoff.
    pub async fn generate(
        &self,
        prompt: &str,
        artifact_type: ArtifactType,
        cancel: &CancellationToken,
    ) -> Result<GeneratedCode, TransportError> {
        tracing::info!(
            "Requesting {} via {} transport",
            artifact_type.output_label(),
            self.transport.kind()
        );
        tokio::select! {
            _ = cancel.cancelled() => Err(TransportError::Cancelled),
            result = self.dispatch(prompt, artifact_type) => result,
        }
    }

    async fn dispatch(
        &self,
        prompt: &str,
        artifact_type: ArtifactType,
    ) -> Result<GeneratedCode, TransportError> {
        let request = GenerationRequest {
            prompt: prompt.to_string(),
            output_type: artifact_type.output_label().to_string(),
        };

        match &self.transport {
            Transport::Adapter(adapter) => adapter
                .generate(request)
                .await
                .map_err(TransportError::Adapter),
            Transport::Proxy { endpoint } => {
                let body = retry::with_backoff(&self.retry, |_| {
                    self.post_json(self.client.post(endpoint), &request)
                })
                .await?;
                let response: ProxyResponse = serde_json::from_str(&body)
                    .map_err(|e| TransportError::MalformedResponse(e.to_string()))?;
                response
                    .code
                    .map(GeneratedCode::new)
                    .ok_or_else(|| TransportError::MalformedResponse("missing `code` field".to_string()))
            }
            Transport::Direct { endpoint, api_key } => {
                let api_key = api_key.as_deref().ok_or(TransportError::MissingApiKey)?;
                let payload = DirectRequest::new(request.prompt);
                let body = retry::with_backoff(&self.retry, |_| {
                    self.post_json(
                        self.client.post(endpoint).query(&[("key", api_key)]),
                        &payload,
                    )
                })
                .await?;
                let response: DirectResponse = serde_json::from_str(&body)
                    .map_err(|e| TransportError::MalformedResponse(e.to_string()))?;
                response.first_text().map(GeneratedCode::new).ok_or_else(|| {
                    TransportError::MalformedResponse(
                        "expected candidates[0].content.parts[0].text".to_string(),
                    )
                })
            }
        }
    }

    /// One attempt: send, require a success status, return the body text.
    async fn post_json<T: serde::Serialize + ?Sized>(
        &self,
        request: reqwest::RequestBuilder,
        body: &T,
    ) -> Result<String, TransportError> {
        let response = request.json(body).send().await?;
        let status = response.status();
        if status.is_success() {
            Ok(response.text().await?)
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(TransportError::Status {
                status: status.as_u16(),
                body,
            })
        }
    }
}
