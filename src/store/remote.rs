//! Remote document-collection backend.
//!
//! Each feature is one document keyed by its stringified id. Saves are sent as
//! a single batch of upserts and deletes.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{Feature, FeatureId};

/// One operation in a [`WriteBatch`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum WriteOp {
    Set { id: String, document: Feature },
    Delete { id: String },
}

/// Writes applied together by [`RemoteCollection::commit`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteBatch {
    pub writes: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn set(&mut self, feature: &Feature) {
        self.writes.push(WriteOp::Set {
            id: feature.id.to_string(),
            document: feature.clone(),
        });
    }

    pub fn delete(&mut self, id: FeatureId) {
        self.writes.push(WriteOp::Delete { id: id.to_string() });
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }
}

#[async_trait]
pub trait RemoteCollection: Send + Sync {
    /// Every document in the collection.
    async fn fetch_all(&self) -> anyhow::Result<Vec<Feature>>;

    /// Apply a batch of writes.
    async fn commit(&self, batch: WriteBatch) -> anyhow::Result<()>;
}

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unauthorized: API key required or invalid")]
    Unauthorized,

    #[error("Remote collection error: {0}")]
    Server(String),
}

/// [`RemoteCollection`] over HTTP.
///
/// - `GET {base_url}` returns the documents as a JSON array
/// - `POST {base_url}/batch` accepts a [`WriteBatch`]
#[derive(Debug, Clone)]
pub struct HttpCollection {
    base_url: String,
    api_key: Option<String>,
    client: Client,
}

impl HttpCollection {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            client: Client::new(),
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let mut req = self.client.request(method, &url);
        if let Some(ref key) = self.api_key {
            req = req.bearer_auth(key);
        }
        req
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, RemoteError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        match status {
            StatusCode::UNAUTHORIZED => Err(RemoteError::Unauthorized),
            _ => Err(RemoteError::Server(format!("{}: {}", status, body))),
        }
    }
}

#[async_trait]
impl RemoteCollection for HttpCollection {
    async fn fetch_all(&self) -> anyhow::Result<Vec<Feature>> {
        let response = self.request(reqwest::Method::GET, "").send().await.map_err(RemoteError::from)?;
        let response = Self::check(response).await?;
        let features = response.json().await.map_err(RemoteError::from)?;
        Ok(features)
    }

    async fn commit(&self, batch: WriteBatch) -> anyhow::Result<()> {
        let response = self
            .request(reqwest::Method::POST, "/batch")
            .json(&batch)
            .send()
            .await
            .map_err(RemoteError::from)?;
        Self::check(response).await?;
        Ok(())
    }
}
