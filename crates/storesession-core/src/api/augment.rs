use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use tracing::{debug, warn};

use crate::auth::{AuthError, CredentialStore, TokenRefresher};

use super::intercept::set_session_header;
use super::ApiError;

/// Injects the current auth and session tokens into outgoing headers.
#[derive(Clone)]
pub struct RequestAugmenter {
    refresher: TokenRefresher,
    store: CredentialStore,
    session_header: HeaderName,
}

impl RequestAugmenter {
    pub fn new(refresher: TokenRefresher, store: CredentialStore, session_header: HeaderName) -> Self {
        Self {
            refresher,
            store,
            session_header,
        }
    }

    /// Resolve both tokens and set `Authorization: Bearer <auth>` and
    /// `<session-header>: Session <session>` for whichever exist. With
    /// neither, the headers are left as they were.
    pub async fn augment(&self, headers: &mut HeaderMap) -> Result<(), ApiError> {
        let (auth_token, session_token) =
            futures::future::join(self.resolve_auth_token(), self.resolve_session_token()).await;

        if let Some(token) = auth_token {
            headers.insert(
                header::AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {}", token))?,
            );
        }
        if let Some(ref token) = session_token {
            set_session_header(headers, &self.session_header, Some(token))?;
        }
        Ok(())
    }

    /// Guests have no auth token; any refresh failure degrades to a guest request.
    async fn resolve_auth_token(&self) -> Option<String> {
        match self.refresher.get_auth_token().await {
            Ok(token) => Some(token),
            Err(AuthError::NotAuthenticated) => {
                debug!("No refresh token stored, sending request as guest");
                None
            }
            Err(e) => {
                warn!(error = %e, "Could not resolve auth token, sending request without it");
                None
            }
        }
    }

    async fn resolve_session_token(&self) -> Option<String> {
        match self.store.get_session_token(false).await {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, "Could not resolve session token");
                None
            }
        }
    }
}
