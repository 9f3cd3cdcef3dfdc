//! GraphQL client module for the store backend.
//!
//! This module provides the `StoreClient` for sending GraphQL operations to
//! a WooCommerce-style store with the auth and session tokens attached.
//!
//! The backend authenticates with a JWT bearer token and tracks the cart with
//! a separate session token sent in the `woocommerce-session` header.

mod augment;
pub mod client;
pub mod documents;
pub mod error;
pub mod graphql;
pub mod intercept;

pub use augment::RequestAugmenter;
pub use client::StoreClient;
pub use error::ApiError;
pub use graphql::{GraphqlClient, GraphqlError, GraphqlResponse, Operation};
pub use intercept::{FailureInterceptor, TOKEN_ERROR_SIGNATURES};
