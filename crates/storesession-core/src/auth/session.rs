use tracing::{debug, warn};

use crate::api::{documents, GraphqlClient};

use super::AuthError;

/// Obtains a guest session token from the store.
#[derive(Clone)]
pub struct SessionFetcher {
    client: GraphqlClient,
}

impl SessionFetcher {
    pub fn new(client: GraphqlClient) -> Self {
        Self { client }
    }

    /// Ask the backend for the current cart session, without any auth context.
    ///
    /// Failures are logged and reported as `None`; callers must cope with
    /// running without a session token.
    pub async fn fetch_session_token(&self) -> Option<String> {
        match self.try_fetch().await {
            Ok(token) => {
                debug!("Fetched a new session token");
                Some(token)
            }
            Err(e) => {
                warn!(error = %e, "Failed to retrieve a new session token");
                None
            }
        }
    }

    async fn try_fetch(&self) -> Result<String, AuthError> {
        let response = self.client.execute(&documents::get_cart()).await?;

        if let Some(token) = response.string_at("/cart/sessionToken") {
            return Ok(token.to_string());
        }

        let reason = if response.has_errors() {
            response.error_summary()
        } else {
            "response carried no cart.sessionToken".to_string()
        };
        Err(AuthError::SessionFetchFailed(reason))
    }
}
