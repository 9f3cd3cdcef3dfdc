//! Client for the store's GraphQL API.
//!
//! `StoreClient` is the piece applications hold on to. Every operation goes
//! through the same path:
//!
//! 1. the [`RequestAugmenter`] attaches the auth and session headers,
//! 2. the [`GraphqlClient`] sends it,
//! 3. the [`FailureInterceptor`] replays it once if the backend rejected a
//!    token.

use std::sync::Arc;

use reqwest::header::HeaderName;
use serde::de::DeserializeOwned;
use tracing::info;

use crate::auth::{
    self, AuthError, CredentialStore, KeyValueStore, MemoryStore, SessionFetcher, StorageKeys,
    TokenRefresher,
};
use crate::config::Config;
use crate::models::Customer;

use super::{ApiError, FailureInterceptor, GraphqlClient, GraphqlResponse, Operation, RequestAugmenter};

/// Clone is cheap - every component shares its state through Arcs.
#[derive(Clone)]
pub struct StoreClient {
    transport: GraphqlClient,
    store: CredentialStore,
    refresher: TokenRefresher,
    augmenter: RequestAugmenter,
    interceptor: FailureInterceptor,
}

impl StoreClient {
    /// Build a client over the given short-lived and long-lived stores
    pub fn new(
        config: &Config,
        short_lived: Arc<dyn KeyValueStore>,
        long_lived: Arc<dyn KeyValueStore>,
    ) -> Result<Self, ApiError> {
        config
            .validate()
            .map_err(|e| ApiError::InvalidConfig(format!("{:#}", e)))?;
        let session_header = HeaderName::from_bytes(config.session_header.as_bytes())?;
        let transport = GraphqlClient::new(config)?;
        let store = CredentialStore::new(
            StorageKeys::from_config(config),
            short_lived,
            long_lived,
            SessionFetcher::new(transport.clone()),
        );
        let refresher =
            TokenRefresher::new(transport.clone(), store.clone(), config.refresh_interval());
        let augmenter =
            RequestAugmenter::new(refresher.clone(), store.clone(), session_header.clone());
        let interceptor = FailureInterceptor::new(store.clone(), session_header);

        Ok(Self {
            transport,
            store,
            refresher,
            augmenter,
            interceptor,
        })
    }

    /// A client whose tokens all live in memory
    pub fn in_memory(config: &Config) -> Result<Self, ApiError> {
        Self::new(config, Arc::new(MemoryStore::new()), Arc::new(MemoryStore::new()))
    }

    /// Send an operation with the current tokens attached, replaying it once
    /// after a session refresh if the backend rejects a token.
    pub async fn execute(&self, mut operation: Operation) -> Result<GraphqlResponse, AuthError> {
        self.augmenter.augment(&mut operation.headers).await?;
        let response = self.transport.execute(&operation).await?;

        let transport = &self.transport;
        self.interceptor
            .intercept(&mut operation, response, |replayed| async move {
                transport.execute(&replayed).await
            })
            .await
    }

    /// Like [`execute`](Self::execute), deserializing `data` and treating any
    /// remaining GraphQL error as a failure
    pub async fn query<T: DeserializeOwned>(&self, operation: Operation) -> Result<T, AuthError> {
        let response = self.execute(operation).await?;
        Ok(response.into_data()?)
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<Customer, AuthError> {
        auth::login(&self.transport, &self.store, username, password).await
    }

    /// Forget every token and stop the refresh timer
    pub fn logout(&self) -> Result<(), AuthError> {
        // Clear first so a refresh finishing in between cannot re-arm
        self.store.clear()?;
        self.refresher.disarm();
        info!("Logged out");
        Ok(())
    }

    pub fn is_authenticated(&self) -> bool {
        self.store.has_credentials()
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.store
    }

    pub fn refresher(&self) -> &TokenRefresher {
        &self.refresher
    }

    pub fn endpoint(&self) -> &str {
        self.transport.endpoint()
    }
}
