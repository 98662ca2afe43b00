use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use axum_test::TestServer;
use genux::proxy::create_router;
use genux::transport::*;
use serde_json::{json, Value};

fn setup(transport: Transport) -> TestServer {
    let client = TransportClient::new(transport).with_retry(RetryPolicy {
        max_attempts: 3,
        base_delay: Duration::from_millis(5),
    });
    TestServer::new(create_router(client)).expect("Failed to create test server")
}

fn echo() -> Transport {
    Transport::Adapter(Arc::new(adapter_fn(|req: GenerationRequest| async move {
        Ok::<_, anyhow::Error>(GeneratedCode::new(format!("/* {} */ {}", req.output_type, req.prompt)))
    })))
}

mod health {
    use super::*;

    #[tokio::test]
    async fn returns_ok() {
        let server = setup(echo());

        let response = server.get("/api/v1/health").await;

        response.assert_status_ok();
        response.assert_json(&json!({ "status": "ok" }));
    }
}

mod generate {
    use super::*;

    #[tokio::test]
    async fn forwards_prompt_and_returns_code() {
        let server = setup(echo());

        let response = server
            .post("/api/v1/generate")
            .json(&json!({ "prompt": "p { margin: 0 }", "outputType": "css" }))
            .await;

        response.assert_status_ok();
        let body: GeneratedCode = response.json();
        assert_eq!(body.code, "/* css */ p { margin: 0 }");
    }

    #[tokio::test]
    async fn accepts_stored_type_labels() {
        let server = setup(echo());

        let response = server
            .post("/api/v1/generate")
            .json(&json!({ "prompt": "x", "outputType": "script" }))
            .await;

        response.assert_status_ok();
        assert_eq!(response.json::<GeneratedCode>().code, "/* javascript */ x");
    }

    #[tokio::test]
    async fn rejects_missing_fields() {
        let server = setup(echo());

        let response = server
            .post("/api/v1/generate")
            .json(&json!({ "prompt": "x" }))
            .await;

        response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn upstream_failures_are_bad_gateway() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let upstream = Router::new().route(
            "/generate",
            post(move |Json(_body): Json<Value>| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, upstream).await.unwrap();
        });

        let server = setup(Transport::Proxy {
            endpoint: format!("http://{}/generate", addr),
        });

        let response = server
            .post("/api/v1/generate")
            .json(&json!({ "prompt": "x", "outputType": "html" }))
            .await;

        response.assert_status(StatusCode::BAD_GATEWAY);
        assert_eq!(response.text(), "HTTP 500");
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }
}
