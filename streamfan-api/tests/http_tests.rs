//! Router-level tests for the registration API

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use streamfan_api::create_router;
use streamfan_core::repository::SubscriberRegistry;
use streamfan_core::{Error, Result};

#[derive(Default)]
struct RecordingRegistry {
    registered: Mutex<Vec<(String, String, String)>>,
    fail: bool,
}

#[async_trait]
impl SubscriberRegistry for RecordingRegistry {
    async fn subscribers(&self, _stream: &str) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    async fn register(&self, stream: &str, id: &str, url: &str) -> Result<()> {
        if self.fail {
            return Err(Error::Timeout("Redis HSET timed out".to_string()));
        }
        self.registered
            .lock()
            .unwrap()
            .push((stream.to_string(), id.to_string(), url.to_string()));
        Ok(())
    }
}

fn post_json(body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/subscriptions")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), 64 * 1024).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_register_subscription() {
    let registry = Arc::new(RecordingRegistry::default());
    let app = create_router(registry.clone());

    let response = app
        .oneshot(post_json(serde_json::json!({
            "stream": "orders",
            "id": "billing",
            "url": "https://hooks.example.com/orders"
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, serde_json::json!({"status": "registered"}));
    assert_eq!(
        registry.registered.lock().unwrap().as_slice(),
        &[(
            "orders".to_string(),
            "billing".to_string(),
            "https://hooks.example.com/orders".to_string()
        )]
    );
}

#[tokio::test]
async fn test_register_rejects_bad_input() {
    let registry = Arc::new(RecordingRegistry::default());

    for body in [
        serde_json::json!({"stream": "", "id": "billing", "url": "https://a.example"}),
        serde_json::json!({"stream": "orders", "id": "", "url": "https://a.example"}),
        serde_json::json!({"stream": "orders", "id": "billing", "url": "mailto:ops@example.com"}),
    ] {
        let response = create_router(registry.clone())
            .oneshot(post_json(body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["status"], 400);
    }

    assert!(registry.registered.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_registry_failure_is_500() {
    let registry = Arc::new(RecordingRegistry {
        fail: true,
        ..RecordingRegistry::default()
    });

    let response = create_router(registry)
        .oneshot(post_json(serde_json::json!({
            "stream": "orders",
            "id": "billing",
            "url": "https://hooks.example.com/orders"
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        json_body(response).await["error"],
        "Service temporarily unavailable"
    );
}

#[tokio::test]
async fn test_health() {
    let response = create_router(Arc::new(RecordingRegistry::default()))
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}
