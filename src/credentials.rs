//! Ephemeral token acquisition.
//!
//! A trusted backend mints a short-lived client secret per session; the
//! long-lived API key never reaches this client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use url::Url;

use crate::{Error, Result};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Source of short-lived access tokens. Failure is fatal to the start
/// attempt; no retries are made here.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn get_token(&self) -> Result<String>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    client_secret: ClientSecret,
}

#[derive(Debug, Deserialize)]
struct ClientSecret {
    value: String,
}

/// Fetches `{"client_secret":{"value":...}}` from a token endpoint.
#[derive(Clone, Debug)]
pub struct TokenEndpoint {
    client: Client,
    url: Url,
}

impl TokenEndpoint {
    /// # Errors
    /// Returns an error if the URL is invalid or the HTTP client cannot be built.
    pub fn new(url: &str) -> Result<Self> {
        let url = Url::parse(url)?;
        let client = Client::builder().timeout(DEFAULT_TIMEOUT).build()?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl CredentialProvider for TokenEndpoint {
    async fn get_token(&self) -> Result<String> {
        let response = self
            .client
            .get(self.url.clone())
            .send()
            .await
            .map_err(|e| Error::Credential(format!("token endpoint unreachable: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Credential(format!(
                "token endpoint returned {status}"
            )));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| Error::Credential(format!("malformed token body: {e}")))?;
        Ok(body.client_secret.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_body_parses() {
        let body: TokenResponse =
            serde_json::from_str(r#"{"client_secret":{"value":"ek_abc123"}}"#).unwrap();
        assert_eq!(body.client_secret.value, "ek_abc123");
    }

    #[test]
    fn token_body_missing_secret_fails() {
        let parsed = serde_json::from_str::<TokenResponse>(r#"{"expires_at": 0}"#);
        assert!(parsed.is_err());
    }
}
