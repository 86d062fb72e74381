#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{HeaderMap, Request, StatusCode};
use keysweep_broker::telemetry::CORRELATION_ID_HEADER;
use keysweep_broker::{AppState, http};
use keysweep_core::{MemoryStore, SecretPayload, WalkOptions};
use serde_json::Value;
use tower::ServiceExt;

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
}

impl TestApp {
    /// Router over an in-memory store with a versioned `secret` mount.
    pub fn new() -> Self {
        Self::with_options(WalkOptions::default())
    }

    pub fn with_options(options: WalkOptions) -> Self {
        let store = Arc::new(MemoryStore::new().with_versioned_mount("secret"));
        let state = AppState::new(store.clone(), "secret", options);
        Self {
            router: http::router(state),
            store,
        }
    }

    pub fn seed(&self, path: &str, payload: Value) {
        self.store.seed(path, object(payload));
    }

    pub async fn post_json(&self, uri: &str, body: Value) -> TestResponse {
        self.post_raw(uri, body.to_string(), None).await
    }

    pub async fn post_raw(
        &self,
        uri: &str,
        body: String,
        correlation: Option<&str>,
    ) -> TestResponse {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json");
        if let Some(id) = correlation {
            builder = builder.header(CORRELATION_ID_HEADER, id);
        }
        let request = builder.body(Body::from(body)).expect("request");
        self.send(request).await
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.expect("response");
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        TestResponse {
            status,
            headers,
            body,
        }
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    pub fn correlation_id(&self) -> Option<&str> {
        self.headers
            .get(CORRELATION_ID_HEADER)
            .and_then(|value| value.to_str().ok())
    }
}

pub fn object(value: Value) -> SecretPayload {
    value.as_object().cloned().expect("object payload")
}
