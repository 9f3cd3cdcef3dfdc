//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use storesession_core::auth::{KeyValueStore, MemoryStore};
use storesession_core::{Config, StoreClient};
use wiremock::matchers::body_partial_json;
use wiremock::{Match, MockServer, Request, ResponseTemplate};

pub const SESSION_HEADER: &str = "woocommerce-session";

pub struct Harness {
    pub server: MockServer,
    pub config: Config,
    pub client: StoreClient,
    pub short: Arc<MemoryStore>,
    pub long: Arc<MemoryStore>,
}

impl Harness {
    pub async fn start() -> Self {
        Self::start_with_interval(Duration::from_secs(60)).await
    }

    pub async fn start_with_interval(interval: Duration) -> Self {
        let server = MockServer::start().await;
        let mut config = Config::new(format!("{}/graphql", server.uri()));
        config.refresh_interval_ms = interval.as_millis() as u64;

        let short = Arc::new(MemoryStore::new());
        let long = Arc::new(MemoryStore::new());
        let client = StoreClient::new(&config, short.clone(), long.clone())
            .expect("Failed to build test client");

        Self {
            server,
            config,
            client,
            short,
            long,
        }
    }

    pub fn set_session_token(&self, token: &str) {
        self.short.set(&self.config.session_token_key, token).unwrap();
    }

    pub fn set_refresh_token(&self, token: &str) {
        self.long.set(&self.config.refresh_token_key, token).unwrap();
    }

    pub fn stored_auth_token(&self) -> Option<String> {
        self.short.get(&self.config.auth_token_key).unwrap()
    }

    pub fn stored_session_token(&self) -> Option<String> {
        self.short.get(&self.config.session_token_key).unwrap()
    }

    pub fn stored_refresh_token(&self) -> Option<String> {
        self.long.get(&self.config.refresh_token_key).unwrap()
    }

    /// Requests received so far for one operation name
    pub async fn received(&self, operation: &str) -> usize {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|r| {
                serde_json::from_slice::<Value>(&r.body)
                    .ok()
                    .and_then(|b| b.get("operationName").cloned())
                    == Some(Value::String(operation.to_string()))
            })
            .count()
    }
}

/// Match a GraphQL request by its operation name
pub fn operation(name: &str) -> impl Match {
    body_partial_json(json!({ "operationName": name }))
}

/// Match requests that do not carry a header at all
pub struct NoHeader(pub &'static str);

impl Match for NoHeader {
    fn matches(&self, request: &Request) -> bool {
        !request.headers.contains_key(self.0)
    }
}

pub fn data(value: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "data": value }))
}

pub fn errors(messages: &[&str]) -> ResponseTemplate {
    let errors: Vec<Value> = messages.iter().map(|m| json!({ "message": m })).collect();
    ResponseTemplate::new(200).set_body_json(json!({ "data": null, "errors": errors }))
}
