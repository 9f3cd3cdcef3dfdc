//! GraphQL-over-HTTP transport.
//!
//! This is deliberately thin: an [`Operation`] is serialized into the
//! standard `{ query, operationName, variables }` envelope, POSTed to the
//! store endpoint, and the `{ data, errors }` envelope is handed back
//! untouched. Token handling lives one layer up in [`crate::api::StoreClient`].

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::config::Config;

use super::ApiError;

/// An outgoing GraphQL operation plus the headers it will be sent with.
///
/// Headers are mutated in place by the request augmenter and, on a token
/// error, by the failure interceptor before the single replay.
#[derive(Debug, Clone)]
pub struct Operation {
    pub operation_name: Option<String>,
    pub query: String,
    pub variables: Value,
    pub headers: HeaderMap,
}

impl Operation {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            operation_name: None,
            query: query.into(),
            variables: Value::Null,
            headers: HeaderMap::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.operation_name = Some(name.into());
        self
    }

    pub fn with_variables(mut self, variables: Value) -> Self {
        self.variables = variables;
        self
    }

    /// Attach `Authorization: Bearer <token>`
    pub fn with_bearer(mut self, token: &str) -> Result<Self, ApiError> {
        self.headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token))?,
        );
        Ok(self)
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Result<Self, ApiError> {
        self.headers.insert(
            HeaderName::from_bytes(name.as_bytes())?,
            HeaderValue::from_str(value)?,
        );
        Ok(self)
    }

    /// Name used in logs
    pub fn name(&self) -> &str {
        self.operation_name.as_deref().unwrap_or("anonymous")
    }
}

#[derive(Serialize)]
struct RequestBody<'a> {
    query: &'a str,
    #[serde(rename = "operationName", skip_serializing_if = "Option::is_none")]
    operation_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Value::is_null")]
    variables: &'a Value,
}

/// A single entry of the response `errors` array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphqlError {
    pub message: String,
    #[serde(rename = "debugMessage", default, skip_serializing_if = "Option::is_none")]
    pub debug_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Value>,
}

impl GraphqlError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            debug_message: None,
            path: None,
            extensions: None,
        }
    }

    /// The server's debug message, wherever it was put.
    ///
    /// Older WPGraphQL releases emit `debugMessage` next to `message`,
    /// newer ones nest it under `extensions`.
    pub fn debug_message(&self) -> Option<&str> {
        self.debug_message.as_deref().or_else(|| {
            self.extensions
                .as_ref()
                .and_then(|ext| ext.get("debugMessage"))
                .and_then(Value::as_str)
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphqlResponse {
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<GraphqlError>,
}

impl GraphqlResponse {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Look up a non-empty string inside `data` by JSON pointer,
    /// e.g. `/cart/sessionToken`.
    pub fn string_at(&self, pointer: &str) -> Option<&str> {
        self.data
            .as_ref()
            .and_then(|data| data.pointer(pointer))
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    /// Joined error messages, for surfacing in an error value
    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| e.message.as_str())
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Deserialize `data`, treating any GraphQL error as a failure
    pub fn into_data<T: DeserializeOwned>(self) -> Result<T, ApiError> {
        if self.has_errors() {
            return Err(ApiError::Graphql(self.error_summary()));
        }
        let data = self
            .data
            .ok_or_else(|| ApiError::InvalidResponse("Response carried no data".to_string()))?;
        serde_json::from_value(data)
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse response data: {}", e)))
    }
}

/// HTTP transport for GraphQL operations.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct GraphqlClient {
    client: Client,
    endpoint: Arc<str>,
}

impl GraphqlClient {
    pub fn new(config: &Config) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: Arc::from(config.endpoint.as_str()),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Send one operation and return the decoded response envelope.
    ///
    /// Non-2xx responses whose body is still a GraphQL envelope with errors
    /// are returned as `Ok` so callers can inspect the errors; anything else
    /// off the success path maps through [`ApiError::from_status`].
    pub async fn execute(&self, operation: &Operation) -> Result<GraphqlResponse, ApiError> {
        let body = RequestBody {
            query: &operation.query,
            operation_name: operation.operation_name.as_deref(),
            variables: &operation.variables,
        };

        debug!(operation = operation.name(), "Sending GraphQL operation");

        let response = self
            .client
            .post(&*self.endpoint)
            .header(header::ACCEPT, "application/json")
            .headers(operation.headers.clone())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        let parsed = serde_json::from_str::<GraphqlResponse>(&text);

        if !status.is_success() {
            return match parsed {
                Ok(envelope) if envelope.has_errors() => Ok(envelope),
                _ => Err(ApiError::from_status(status, &text)),
            };
        }

        parsed.map_err(|e| {
            ApiError::InvalidResponse(format!("Failed to parse GraphQL response: {}", e))
        })
    }
}
