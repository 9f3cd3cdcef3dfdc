use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::Config;

use super::{AuthError, KeyValueStore, SessionFetcher};

/// Storage key names, taken from [`Config`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageKeys {
    pub auth_token: String,
    pub session_token: String,
    pub refresh_token: String,
}

impl StorageKeys {
    pub fn from_config(config: &Config) -> Self {
        Self {
            auth_token: config.auth_token_key.clone(),
            session_token: config.session_token_key.clone(),
            refresh_token: config.refresh_token_key.clone(),
        }
    }
}

/// Auth, session and refresh tokens across the two storage scopes.
///
/// The auth and session tokens go to the short-lived store, the refresh
/// token to the long-lived one. Clone is cheap; clones share the stores.
#[derive(Clone)]
pub struct CredentialStore {
    short_lived: Arc<dyn KeyValueStore>,
    long_lived: Arc<dyn KeyValueStore>,
    keys: Arc<StorageKeys>,
    fetcher: SessionFetcher,
}

impl CredentialStore {
    pub fn new(
        keys: StorageKeys,
        short_lived: Arc<dyn KeyValueStore>,
        long_lived: Arc<dyn KeyValueStore>,
        fetcher: SessionFetcher,
    ) -> Self {
        Self {
            short_lived,
            long_lived,
            keys: Arc::new(keys),
            fetcher,
        }
    }

    /// Persist a token set. The refresh token is only written when given,
    /// so a plain re-save never drops the stored one.
    pub fn save(
        &self,
        auth_token: &str,
        session_token: &str,
        refresh_token: Option<&str>,
    ) -> Result<(), AuthError> {
        self.short_lived.set(&self.keys.auth_token, auth_token)?;
        self.short_lived.set(&self.keys.session_token, session_token)?;
        if let Some(refresh_token) = refresh_token.filter(|t| !t.is_empty()) {
            self.long_lived.set(&self.keys.refresh_token, refresh_token)?;
        }
        debug!(refresh_token_saved = refresh_token.is_some(), "Credentials saved");
        Ok(())
    }

    /// True when both an auth token and a refresh token are stored.
    pub fn has_credentials(&self) -> bool {
        match (self.auth_token(), self.refresh_token()) {
            (Ok(auth), Ok(refresh)) => auth.is_some() && refresh.is_some(),
            (Err(e), _) | (_, Err(e)) => {
                warn!(error = %e, "Failed to read credentials");
                false
            }
        }
    }

    pub fn auth_token(&self) -> Result<Option<String>, AuthError> {
        read(self.short_lived.as_ref(), &self.keys.auth_token)
    }

    pub fn refresh_token(&self) -> Result<Option<String>, AuthError> {
        read(self.long_lived.as_ref(), &self.keys.refresh_token)
    }

    /// The cached session token, without fetching
    pub fn cached_session_token(&self) -> Result<Option<String>, AuthError> {
        read(self.short_lived.as_ref(), &self.keys.session_token)
    }

    /// The session token, fetching a new guest session when none is cached or
    /// `force_refresh` is set. A fetched token replaces the cached one.
    pub async fn get_session_token(&self, force_refresh: bool) -> Result<Option<String>, AuthError> {
        if !force_refresh {
            if let Some(token) = self.cached_session_token()? {
                return Ok(Some(token));
            }
        }

        let token = self.fetcher.fetch_session_token().await;
        if let Some(ref token) = token {
            self.short_lived.set(&self.keys.session_token, token)?;
        }
        Ok(token)
    }

    /// Remove every stored token
    pub fn clear(&self) -> Result<(), AuthError> {
        self.short_lived.remove(&self.keys.auth_token)?;
        self.short_lived.remove(&self.keys.session_token)?;
        self.long_lived.remove(&self.keys.refresh_token)?;
        debug!("Credentials cleared");
        Ok(())
    }
}

fn read(store: &dyn KeyValueStore, key: &str) -> Result<Option<String>, AuthError> {
    Ok(store.get(key)?.filter(|value| !value.is_empty()))
}
