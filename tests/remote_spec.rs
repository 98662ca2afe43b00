use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use genux::models::*;
use genux::store::*;

#[derive(Clone, Default)]
struct Collection {
    documents: Arc<Mutex<Vec<Feature>>>,
    auth: Arc<Mutex<Vec<Option<String>>>>,
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .map(str::to_string)
}

async fn list(State(c): State<Collection>, headers: HeaderMap) -> Json<Vec<Feature>> {
    c.auth.lock().unwrap().push(bearer(&headers));
    Json(c.documents.lock().unwrap().clone())
}

async fn batch(State(c): State<Collection>, Json(batch): Json<WriteBatch>) -> StatusCode {
    let mut documents = c.documents.lock().unwrap();
    for op in batch.writes {
        match op {
            WriteOp::Set { document, .. } => {
                documents.retain(|f| f.id != document.id);
                documents.push(document);
            }
            WriteOp::Delete { id } => documents.retain(|f| f.id.to_string() != id),
        }
    }
    StatusCode::NO_CONTENT
}

async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

async fn collection_server(state: Collection) -> String {
    let app = Router::new()
        .route("/features", get(list))
        .route("/features/batch", post(batch))
        .with_state(state);
    format!("{}/features/", serve(app).await)
}

fn feature(id: i64) -> Feature {
    Feature {
        id: FeatureId(id),
        prompt: format!("feature {}", id),
        artifact_type: ArtifactType::Stylesheet,
        code: "body { margin: 0; }".to_string(),
    }
}

#[tokio::test]
async fn store_round_trips_through_http_collection() {
    let state = Collection::default();
    let url = collection_server(state.clone()).await;
    let remote = Arc::new(HttpCollection::new(url, Some("token".to_string())));
    let store = FeatureStore::new(Backend::Remote(remote.clone()));

    store.add(feature(1)).await.unwrap();
    store.add(feature(2)).await.unwrap();
    store.remove(FeatureId(1)).await.unwrap();

    let ids: Vec<FeatureId> = state.documents.lock().unwrap().iter().map(|f| f.id).collect();
    assert_eq!(ids, vec![FeatureId(2)]);

    let fresh = FeatureStore::new(Backend::Remote(remote));
    assert_eq!(fresh.list().await.unwrap(), vec![feature(2)]);
    assert_eq!(state.auth.lock().unwrap()[0].as_deref(), Some("Bearer token"));
}

#[tokio::test]
async fn unauthorized_reads_surface_as_remote_errors() {
    let app = Router::new().route("/features", get(|| async { StatusCode::UNAUTHORIZED }));
    let url = format!("{}/features", serve(app).await);
    let store = FeatureStore::new(Backend::Remote(Arc::new(HttpCollection::new(url, None))));

    let err = store.list().await.unwrap_err();

    assert!(matches!(err, StoreError::Remote(_)));
    assert!(err.to_string().contains("Unauthorized"));
}

#[tokio::test]
async fn unreachable_collection_is_a_remote_error() {
    let store = FeatureStore::new(Backend::Remote(Arc::new(HttpCollection::new(
        "http://127.0.0.1:1/features",
        None,
    ))));

    assert!(matches!(store.list().await, Err(StoreError::Remote(_))));
}
