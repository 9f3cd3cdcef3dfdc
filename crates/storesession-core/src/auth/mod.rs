//! Authentication module for managing store tokens.
//!
//! This module provides:
//! - `CredentialStore`: auth/session tokens in short-lived storage, the
//!   refresh token in long-lived storage
//! - `TokenRefresher`: refresh-token exchange on a recurring timer
//! - `SessionFetcher`: guest session tokens for anonymous visitors
//! - `login`: username/password login
//!
//! Tokens are refreshed every 30 seconds by default.

pub mod credentials;
pub mod error;
pub mod login;
pub mod refresher;
pub mod session;
pub mod storage;

pub use credentials::{CredentialStore, StorageKeys};
pub use error::AuthError;
pub use login::login;
pub use refresher::TokenRefresher;
pub use session::SessionFetcher;
pub use storage::{FileStore, KeyValueStore, KeyringStore, MemoryStore};
