//! Retry-once behavior of `StoreClient::execute` on token errors.

mod common;

use common::{data, errors, operation, Harness, NoHeader, SESSION_HEADER};
use serde_json::json;
use storesession_core::auth::KeyValueStore;
use storesession_core::{AuthError, Operation};
use wiremock::matchers::{header, method};
use wiremock::{Mock, ResponseTemplate};

fn products() -> Operation {
    Operation::new("query GetProducts { products { nodes { id } } }").with_name("GetProducts")
}

#[tokio::test]
async fn test_expired_token_refreshes_session_and_replays_once() {
    let h = Harness::start().await;
    h.set_session_token("S-old");

    Mock::given(method("POST"))
        .and(operation("GetCart"))
        .and(NoHeader("authorization"))
        .respond_with(data(json!({"cart": {"sessionToken": "S-new"}})))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(operation("GetProducts"))
        .and(header(SESSION_HEADER, "Session S-old"))
        .respond_with(errors(&["Expired token"]))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(operation("GetProducts"))
        .and(header(SESSION_HEADER, "Session S-new"))
        .respond_with(data(json!({"products": {"nodes": [{"id": "p1"}]}})))
        .expect(1)
        .mount(&h.server)
        .await;

    let response = h.client.execute(products()).await.unwrap();

    assert!(response.errors.is_empty());
    assert_eq!(response.data, Some(json!({"products": {"nodes": [{"id": "p1"}]}})));
    // The forced refresh is cached for later requests
    assert_eq!(h.stored_session_token().as_deref(), Some("S-new"));
    h.server.verify().await;
}

#[tokio::test]
async fn test_second_token_error_is_forwarded() {
    let h = Harness::start().await;
    h.set_session_token("S-old");

    Mock::given(method("POST"))
        .and(operation("GetCart"))
        .respond_with(data(json!({"cart": {"sessionToken": "S-new"}})))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(operation("GetProducts"))
        .respond_with(errors(&["Expired token"]))
        .expect(2)
        .mount(&h.server)
        .await;

    let response = h.client.execute(products()).await.unwrap();

    assert_eq!(response.errors.len(), 1);
    assert_eq!(response.errors[0].message, "Expired token");
    h.server.verify().await;
}

#[tokio::test]
async fn test_unrelated_errors_are_not_intercepted() {
    let h = Harness::start().await;
    h.set_session_token("S1");

    Mock::given(method("POST"))
        .and(operation("GetCart"))
        .respond_with(data(json!({"cart": {"sessionToken": "S2"}})))
        .expect(0)
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(operation("GetProducts"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({
                "data": {"products": null},
                "errors": [{"message": "Internal server error", "debugMessage": "Database went away", "path": ["products"]}]
            })),
        )
        .expect(1)
        .mount(&h.server)
        .await;

    let response = h.client.execute(products()).await.unwrap();

    assert_eq!(response.errors.len(), 1);
    assert_eq!(response.errors[0].message, "Internal server error");
    assert_eq!(response.errors[0].debug_message(), Some("Database went away"));
    assert_eq!(response.errors[0].path, Some(vec![json!("products")]));
    assert_eq!(h.stored_session_token().as_deref(), Some("S1"));
    h.server.verify().await;
}

#[tokio::test]
async fn test_several_matching_errors_trigger_one_cycle() {
    let h = Harness::start().await;
    h.set_session_token("S-old");

    Mock::given(method("POST"))
        .and(operation("GetCart"))
        .respond_with(data(json!({"cart": {"sessionToken": "S-new"}})))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(operation("GetProducts"))
        .and(header(SESSION_HEADER, "Session S-old"))
        .respond_with(errors(&[
            "Expired token",
            "Wrong number of segments",
            "invalid-secret-key | Expired token",
        ]))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(operation("GetProducts"))
        .and(header(SESSION_HEADER, "Session S-new"))
        .respond_with(data(json!({"products": {"nodes": []}})))
        .expect(1)
        .mount(&h.server)
        .await;

    let response = h.client.execute(products()).await.unwrap();

    assert!(response.errors.is_empty());
    h.server.verify().await;
}

#[tokio::test]
async fn test_debug_message_signature_is_intercepted() {
    let h = Harness::start().await;
    h.set_session_token("S-old");

    Mock::given(method("POST"))
        .and(operation("GetCart"))
        .respond_with(data(json!({"cart": {"sessionToken": "S-new"}})))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(operation("GetProducts"))
        .and(header(SESSION_HEADER, "Session S-old"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "errors": [{"message": "Internal server error", "debugMessage": "invalid-secret-key | Signature verification failed"}]
        })))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(operation("GetProducts"))
        .and(header(SESSION_HEADER, "Session S-new"))
        .respond_with(data(json!({"products": {"nodes": []}})))
        .expect(1)
        .mount(&h.server)
        .await;

    let response = h.client.execute(products()).await.unwrap();
    assert!(response.errors.is_empty());
    h.server.verify().await;
}

#[tokio::test]
async fn test_forbidden_status_with_token_error_is_intercepted() {
    let h = Harness::start().await;
    h.set_session_token("S-old");

    Mock::given(method("POST"))
        .and(operation("GetCart"))
        .respond_with(data(json!({"cart": {"sessionToken": "S-new"}})))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(operation("GetProducts"))
        .and(header(SESSION_HEADER, "Session S-old"))
        .respond_with(
            ResponseTemplate::new(403)
                .set_body_json(json!({"errors": [{"message": "The iss do not match with this server"}]})),
        )
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(operation("GetProducts"))
        .and(header(SESSION_HEADER, "Session S-new"))
        .respond_with(data(json!({"products": {"nodes": []}})))
        .expect(1)
        .mount(&h.server)
        .await;

    let response = h.client.execute(products()).await.unwrap();
    assert!(response.errors.is_empty());
    h.server.verify().await;
}

#[tokio::test]
async fn test_replay_drops_session_header_when_refresh_yields_nothing() {
    let h = Harness::start().await;
    h.set_session_token("S-old");

    Mock::given(method("POST"))
        .and(operation("GetCart"))
        .respond_with(data(json!({"cart": null})))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(operation("GetProducts"))
        .and(header(SESSION_HEADER, "Session S-old"))
        .respond_with(errors(&["Expired token"]))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(operation("GetProducts"))
        .and(NoHeader(SESSION_HEADER))
        .respond_with(data(json!({"products": {"nodes": []}})))
        .expect(1)
        .mount(&h.server)
        .await;

    let response = h.client.execute(products()).await.unwrap();
    assert!(response.errors.is_empty());
    h.server.verify().await;
}

/// Short-lived store whose writes always fail, to break the forced refresh
struct ReadOnlyStore {
    session_token: String,
}

impl KeyValueStore for ReadOnlyStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(key.contains("session").then(|| self.session_token.clone()))
    }

    fn set(&self, _key: &str, _value: &str) -> anyhow::Result<()> {
        anyhow::bail!("store is read-only")
    }

    fn remove(&self, _key: &str) -> anyhow::Result<()> {
        anyhow::bail!("store is read-only")
    }
}

#[tokio::test]
async fn test_failed_refresh_is_propagated_without_replay() {
    let server = wiremock::MockServer::start().await;
    let config = storesession_core::Config::new(format!("{}/graphql", server.uri()));
    let client = storesession_core::StoreClient::new(
        &config,
        std::sync::Arc::new(ReadOnlyStore {
            session_token: "S-old".to_string(),
        }),
        std::sync::Arc::new(storesession_core::auth::MemoryStore::new()),
    )
    .unwrap();

    Mock::given(method("POST"))
        .and(operation("GetCart"))
        .respond_with(data(json!({"cart": {"sessionToken": "S-new"}})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(operation("GetProducts"))
        .respond_with(errors(&["Expired token"]))
        .expect(1)
        .mount(&server)
        .await;

    let err = client.execute(products()).await.unwrap_err();
    assert!(matches!(err, AuthError::Storage(_)), "{err:?}");
    server.verify().await;
}

#[tokio::test]
async fn test_guest_request_gets_session_header_only() {
    let h = Harness::start().await;

    Mock::given(method("POST"))
        .and(operation("GetCart"))
        .respond_with(data(json!({"cart": {"sessionToken": "S-guest"}})))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(operation("GetProducts"))
        .and(header(SESSION_HEADER, "Session S-guest"))
        .and(NoHeader("authorization"))
        .respond_with(data(json!({"products": {"nodes": []}})))
        .expect(2)
        .mount(&h.server)
        .await;

    h.client.execute(products()).await.unwrap();
    // Second request reuses the cached guest session
    h.client.execute(products()).await.unwrap();

    assert_eq!(h.received("RefreshAuthToken").await, 0);
    h.server.verify().await;
}

#[tokio::test]
async fn test_no_tokens_leaves_headers_untouched() {
    let h = Harness::start().await;

    Mock::given(method("POST"))
        .and(operation("GetCart"))
        .respond_with(errors(&["Cart unavailable"]))
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(operation("GetProducts"))
        .and(NoHeader(SESSION_HEADER))
        .and(NoHeader("authorization"))
        .and(header("x-store-locale", "en_US"))
        .respond_with(data(json!({"products": {"nodes": []}})))
        .expect(1)
        .mount(&h.server)
        .await;

    let op = products().with_header("x-store-locale", "en_US").unwrap();
    let response = h.client.execute(op).await.unwrap();
    assert!(response.errors.is_empty());
    h.server.verify().await;
}

#[tokio::test]
async fn test_query_deserializes_data() {
    #[derive(serde::Deserialize)]
    struct Products {
        products: Nodes,
    }
    #[derive(serde::Deserialize)]
    struct Nodes {
        nodes: Vec<serde_json::Value>,
    }

    let h = Harness::start().await;
    h.set_session_token("S1");

    Mock::given(method("POST"))
        .and(operation("GetProducts"))
        .respond_with(data(json!({"products": {"nodes": [{"id": "p1"}, {"id": "p2"}]}})))
        .mount(&h.server)
        .await;

    let page: Products = h.client.query(products()).await.unwrap();
    assert_eq!(page.products.nodes.len(), 2);
}
