//! storesession-core - auth and session token handling for a WooCommerce
//! GraphQL store.
//!
//! The crate keeps an auth token and a session token fresh, attaches them to
//! every outgoing GraphQL operation, and replays an operation once when the
//! backend rejects a token.
//!
//! ```no_run
//! use storesession_core::{Config, Operation, StoreClient};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let client = StoreClient::in_memory(&Config::new("https://shop.example.com/graphql"))?;
//! let response = client
//!     .execute(Operation::new("query { cart { total } }").with_name("Cart"))
//!     .await?;
//! println!("{:?}", response.data);
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod models;

pub use api::{ApiError, GraphqlError, GraphqlResponse, Operation, StoreClient};
pub use auth::{AuthError, CredentialStore, TokenRefresher};
pub use config::Config;
pub use models::Customer;
