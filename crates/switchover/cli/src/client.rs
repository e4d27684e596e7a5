//! HTTP client for the registry's user endpoints
//!
//! Covers what the resource API does not: issuing a token for a given user
//! (so writes are attributed to them) and refreshing the system token.

use crate::error::{CliError, CliResult};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::time::Duration;
use switchover_migration::{AuthError, TokenProvider};
use switchover_types::Credential;
use tracing::debug;

/// Client for login and token endpoints, authorised with the system token
pub struct LoginClient {
    client: Client,
    base_url: String,
    credential: Credential,
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
}

impl LoginClient {
    /// Create a new login client
    pub fn new(endpoint: &str, credential: Credential, timeout: Duration) -> CliResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: endpoint.trim_end_matches('/').to_string(),
            credential,
        })
    }

    /// Issue a token for `username`
    pub async fn user_token(&self, username: &str) -> CliResult<Option<String>> {
        let response = self
            .client
            .patch(format!("{}/login_", self.base_url))
            .header(reqwest::header::AUTHORIZATION, self.credential.header_value())
            .json(&LoginRequest { username })
            .send()
            .await?;

        let token = self.handle_text(response).await?;
        Ok(Some(token).filter(|t| !t.is_empty()))
    }

    /// Exchange the system token for a fresh one
    pub async fn refresh_token(&self) -> CliResult<String> {
        let response = self
            .client
            .get(format!("{}/user/v1/refresh-token", self.base_url))
            .header(reqwest::header::AUTHORIZATION, self.credential.header_value())
            .send()
            .await?;

        let token = self.handle_text(response).await?;
        if token.is_empty() {
            return Err(CliError::Api {
                status: StatusCode::OK.as_u16(),
                message: "refresh returned an empty token".into(),
            });
        }
        Ok(token)
    }

    async fn handle_text(&self, response: reqwest::Response) -> CliResult<String> {
        let status = response.status();

        if status.is_success() {
            Ok(response.text().await?.trim().trim_matches('"').to_string())
        } else {
            let message = response.text().await.unwrap_or_default();
            Err(CliError::Api {
                status: status.as_u16(),
                message,
            })
        }
    }
}

#[async_trait]
impl TokenProvider for LoginClient {
    async fn token_for(&self, username: &str) -> Result<Credential, AuthError> {
        debug!(username = username, "Requesting user token");
        match self.user_token(username).await {
            Ok(Some(token)) => Ok(Credential::bearer(token)),
            Ok(None) => Err(AuthError::TokenNotFound {
                username: username.to_string(),
            }),
            Err(CliError::Api { status, .. }) => Err(AuthError::Rejected { status }),
            Err(err) => Err(AuthError::Transport(err.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_endpoint_normalization() {
        let client = LoginClient::new(
            "https://api.example.com/",
            Credential::bearer("t"),
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(client.base_url, "https://api.example.com");
    }

    #[test]
    fn test_login_body() {
        let body = serde_json::to_value(LoginRequest { username: "alice" }).unwrap();
        assert_eq!(body, serde_json::json!({ "username": "alice" }));
    }
}
