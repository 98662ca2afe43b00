//! Proxy server: lets pages generate code without holding the backend key.
//!
//! The proxy accepts the same `{prompt, outputType}` body the proxy
//! transport sends and forwards it through its own [`TransportClient`],
//! normally a direct one, retries included.

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::models::ArtifactType;
use crate::transport::{GeneratedCode, TransportClient, TransportError};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyRequest {
    pub prompt: String,
    pub output_type: ArtifactType,
}

pub fn create_router(client: TransportClient) -> Router {
    let api = Router::new()
        .route("/generate", post(generate))
        .route("/health", get(health));

    Router::new()
        .nest("/api/v1", api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(client)
}

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

pub async fn generate(
    State(client): State<TransportClient>,
    Json(input): Json<ProxyRequest>,
) -> Result<Json<GeneratedCode>, (StatusCode, String)> {
    // A dropped connection drops this future, which is cancellation enough.
    let cancel = CancellationToken::new();
    client
        .generate(&input.prompt, input.output_type, &cancel)
        .await
        .map(Json)
        .map_err(upstream_error)
}

fn upstream_error(e: TransportError) -> (StatusCode, String) {
    tracing::error!("Upstream generation failed: {}", e);
    (StatusCode::BAD_GATEWAY, e.to_string())
}
