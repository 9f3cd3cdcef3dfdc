//! GraphQL documents used by the token machinery.

use serde_json::json;

use super::Operation;

const REFRESH_AUTH_TOKEN: &str = r#"mutation RefreshAuthToken($refreshToken: String!) {
  refreshJwtAuthToken(input: { jwtRefreshToken: $refreshToken }) {
    authToken
  }
}"#;

const LOGIN: &str = r#"mutation Login($username: String!, $password: String!) {
  login(input: { username: $username, password: $password }) {
    authToken
    refreshToken
    customer {
      id
      email
      firstName
      lastName
      sessionToken
    }
  }
}"#;

const GET_CART: &str = r#"query GetCart {
  cart {
    sessionToken
  }
}"#;

const GET_CUSTOMER: &str = r#"query GetCustomer {
  customer {
    sessionToken
  }
}"#;

pub fn refresh_auth_token(refresh_token: &str) -> Operation {
    Operation::new(REFRESH_AUTH_TOKEN)
        .with_name("RefreshAuthToken")
        .with_variables(json!({ "refreshToken": refresh_token }))
}

pub fn login(username: &str, password: &str) -> Operation {
    Operation::new(LOGIN)
        .with_name("Login")
        .with_variables(json!({ "username": username, "password": password }))
}

pub fn get_cart() -> Operation {
    Operation::new(GET_CART).with_name("GetCart")
}

pub fn get_customer() -> Operation {
    Operation::new(GET_CUSTOMER).with_name("GetCustomer")
}
