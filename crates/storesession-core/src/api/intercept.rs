//! Retry-once on token errors.
//!
//! When a response carries one of the backend's "token rejected" messages,
//! the session token is force-refreshed, the pending operation's session
//! header is rewritten, and the operation is replayed exactly once. The
//! replay is a `FnOnce`, so a second replay cannot happen by construction.

use std::future::Future;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tracing::{debug, info};

use crate::auth::{AuthError, CredentialStore};

use super::{ApiError, GraphqlError, GraphqlResponse, Operation};

/// Messages the backend uses when it rejects an auth or session token.
/// Matched exactly against `message` and `debugMessage`.
pub const TOKEN_ERROR_SIGNATURES: [&str; 5] = [
    "The iss do not match with this server",
    "invalid-secret-key | Expired token",
    "invalid-secret-key | Signature verification failed",
    "Expired token",
    "Wrong number of segments",
];

fn is_signature(text: &str) -> bool {
    TOKEN_ERROR_SIGNATURES.contains(&text)
}

pub fn is_token_error(error: &GraphqlError) -> bool {
    is_signature(&error.message) || error.debug_message().is_some_and(is_signature)
}

/// The first error in the response that calls for a session refresh
pub fn find_token_error(response: &GraphqlResponse) -> Option<&GraphqlError> {
    response.errors.iter().find(|e| is_token_error(e))
}

/// Set `<header>: Session <token>`, or drop the header when there is no token
pub fn set_session_header(
    headers: &mut HeaderMap,
    name: &HeaderName,
    token: Option<&str>,
) -> Result<(), ApiError> {
    match token {
        Some(token) => {
            headers.insert(name.clone(), HeaderValue::from_str(&format!("Session {}", token))?);
        }
        None => {
            headers.remove(name);
        }
    }
    Ok(())
}

#[derive(Clone)]
pub struct FailureInterceptor {
    store: CredentialStore,
    session_header: HeaderName,
}

impl FailureInterceptor {
    pub fn new(store: CredentialStore, session_header: HeaderName) -> Self {
        Self {
            store,
            session_header,
        }
    }

    /// Inspect `response` and, on a token error, refresh the session and
    /// hand the updated operation to `replay`.
    ///
    /// Responses without a token error come back untouched. A failing
    /// session refresh is returned instead of replaying. Whatever the replay
    /// yields is returned verbatim, token errors included.
    pub async fn intercept<F, Fut>(
        &self,
        operation: &mut Operation,
        response: GraphqlResponse,
        replay: F,
    ) -> Result<GraphqlResponse, AuthError>
    where
        F: FnOnce(Operation) -> Fut,
        Fut: Future<Output = Result<GraphqlResponse, ApiError>>,
    {
        let matched = find_token_error(&response).map(|e| e.message.clone());
        let Some(matched) = matched else {
            return Ok(response);
        };
        info!(
            operation = operation.name(),
            error = %matched,
            "Token rejected, refreshing session and replaying"
        );

        let session_token = self.store.get_session_token(true).await?;
        set_session_header(
            &mut operation.headers,
            &self.session_header,
            session_token.as_deref(),
        )?;
        debug!(
            operation = operation.name(),
            has_session = session_token.is_some(),
            "Replaying operation"
        );

        Ok(replay(operation.clone()).await?)
    }
}
