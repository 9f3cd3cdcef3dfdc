use thiserror::Error;

use crate::api::ApiError;

#[derive(Error, Debug)]
pub enum AuthError {
    /// No refresh token is stored; the user has to log in.
    #[error("Not authenticated - no refresh token available")]
    NotAuthenticated,

    #[error("Token refresh failed: {0}")]
    RefreshFailed(String),

    /// Only ever logged; the session fetcher returns `None` instead.
    #[error("Session fetch failed: {0}")]
    SessionFetchFailed(String),

    #[error("Login failed: {0}")]
    LoginFailed(String),

    #[error("Token storage error: {0}")]
    Storage(String),

    #[error(transparent)]
    Api(#[from] ApiError),
}

impl From<anyhow::Error> for AuthError {
    fn from(err: anyhow::Error) -> Self {
        AuthError::Storage(format!("{:#}", err))
    }
}
