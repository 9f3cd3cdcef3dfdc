use tracing::{info, warn};

use crate::api::{documents, GraphqlClient};
use crate::models::customer::LoginData;
use crate::models::Customer;

use super::{AuthError, CredentialStore};

/// Log in with a username and password and persist the returned tokens.
///
/// Any failure along the way, whether transport, GraphQL errors or a
/// response missing one of the three tokens, is reported as
/// [`AuthError::LoginFailed`] and nothing is stored.
pub async fn login(
    client: &GraphqlClient,
    store: &CredentialStore,
    username: &str,
    password: &str,
) -> Result<Customer, AuthError> {
    let response = client
        .execute(&documents::login(username, password))
        .await
        .map_err(|e| AuthError::LoginFailed(e.to_string()))?;

    if response.has_errors() {
        let reason = response.error_summary();
        warn!(username, reason = %reason, "Login rejected");
        return Err(AuthError::LoginFailed(reason));
    }

    let payload = response
        .into_data::<LoginData>()
        .map_err(|e| AuthError::LoginFailed(e.to_string()))?
        .login
        .ok_or_else(|| AuthError::LoginFailed("Response carried no login payload".to_string()))?;

    let missing = || AuthError::LoginFailed("Failed to retrieve credentials".to_string());
    let auth_token = payload.auth_token.filter(|t| !t.is_empty()).ok_or_else(missing)?;
    let refresh_token = payload.refresh_token.filter(|t| !t.is_empty()).ok_or_else(missing)?;
    let customer = payload.customer.ok_or_else(missing)?;
    let session_token = customer
        .session_token
        .clone()
        .filter(|t| !t.is_empty())
        .ok_or_else(missing)?;

    store.save(&auth_token, &session_token, Some(&refresh_token))?;

    info!(username, "Logged in");
    Ok(customer)
}
