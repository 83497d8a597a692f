//! Test utilities for driving the API router without an HTTP server
//!
//! `TestGateway` wires an in-memory store, an in-process bus, the bus
//! bridge and the API router together the way the server binary does.

use std::time::Duration;

use axum::http::{Method, StatusCode};
use serde_json::Value;
use tower::ServiceExt;

use crate::api::{self, AppState};
use crate::ingest::IngestRouter;
use crate::models::Channel;
use crate::router::{ApiRequest, ApiResponse, ApiRouter};
use crate::store::{Collection, MemStore, StoreExt};
use crate::transport::{self, LocalBus};

pub const TEST_SUBJECT: &str = "test/core/out";

/// Create a test request for the given method and path
pub fn create_test_request(method: Method, path: &str) -> ApiRequest {
    ApiRequest::new(method, path)
}

/// Create a test request with a JSON body
pub fn create_test_request_with_json(method: Method, path: &str, body: &Value) -> ApiRequest {
    ApiRequest::new(method, path).with_json(body)
}

/// Create a POST request with a raw payload and content type
pub fn create_test_request_with_content(path: &str, payload: Vec<u8>, content_type: &str) -> ApiRequest {
    ApiRequest::new(Method::POST, path)
        .with_header("content-type", content_type)
        .with_body(payload)
}

pub struct TestGateway {
    pub store: MemStore,
    pub bus: LocalBus,
    pub router: ApiRouter<AppState<MemStore, LocalBus>>,
}

impl TestGateway {
    /// Gateway with the bus bridge running
    pub async fn start() -> Self {
        let gateway = Self::without_bridge();

        let ingest = gateway.router.state().ingest.clone();
        if let Err(never) = transport::spawn_bus_bridge(&gateway.bus, TEST_SUBJECT, ingest).await {
            match never {}
        }

        gateway
    }

    /// Gateway whose relayed envelopes are never picked up
    pub fn without_bridge() -> Self {
        let store = MemStore::new();
        let bus = LocalBus::new(64);
        let ingest = IngestRouter::new(store.clone(), bus.clone(), TEST_SUBJECT);
        let router = api::router(AppState::new(store.clone(), ingest));
        Self { store, bus, router }
    }

    pub async fn call(&self, request: ApiRequest) -> ApiResponse {
        match self.router.clone().oneshot(request).await {
            Ok(response) => response,
            Err(never) => match never {},
        }
    }

    /// POST a JSON body and return the created id
    pub async fn create(&self, path: &str, body: Value) -> String {
        let response = self
            .call(create_test_request_with_json(Method::POST, path, &body))
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{:?}", response.body);
        response.body["id"].as_str().unwrap_or_default().to_string()
    }

    pub async fn create_device(&self, name: &str) -> String {
        self.create("/devices", serde_json::json!({ "name": name })).await
    }

    pub async fn create_channel(&self, name: &str) -> String {
        self.create("/channels", serde_json::json!({ "name": name })).await
    }

    /// Wait until `channel` holds at least `count` entries
    pub async fn wait_for_entries(&self, channel: &str, count: usize) -> Channel {
        for _ in 0..100 {
            let doc: Option<Channel> = self.store.get(Collection::Channels, channel).await.ok().flatten();
            if let Some(doc) = doc {
                if doc.entries.len() >= count {
                    return doc;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("channel {} never reached {} entries", channel, count);
    }
}
