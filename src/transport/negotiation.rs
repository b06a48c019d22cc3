//! SDP offer/answer exchange with the realtime endpoint.
//!
//! The offer is posted as raw SDP, authorized with the ephemeral token, and
//! the answer comes back as the response body.

use std::time::Duration;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderValue};
use reqwest::{Client, Url};

use crate::{Error, Result};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1/realtime";
pub const DEFAULT_MODEL: &str = "gpt-4o-realtime-preview-2024-12-17";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Performs the HTTP half of session setup against one model endpoint.
#[derive(Clone, Debug)]
pub struct Negotiator {
    client: Client,
    base_url: String,
    model: String,
}

impl Negotiator {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    #[allow(clippy::result_large_err)]
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        let client = Client::builder().timeout(DEFAULT_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            model: model.into(),
        })
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Post `sdp_offer` and return the remote SDP answer.
    ///
    /// # Errors
    /// `Error::Negotiation` on a non-success status or an unusable answer
    /// body; transport-level failures surface as `Error::Http`.
    pub async fn exchange(&self, token: &str, sdp_offer: String) -> Result<String> {
        let mut url = Url::parse(&self.base_url)?;
        url.query_pairs_mut().append_pair("model", &self.model);
        let auth_header = HeaderValue::from_str(&format!("Bearer {token}"))?;

        let res = self
            .client
            .post(url)
            .header(AUTHORIZATION, auth_header)
            .header(CONTENT_TYPE, "application/sdp")
            .body(sdp_offer)
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(Error::Negotiation(format!(
                "answer request returned {status}: {body}"
            )));
        }

        let answer = res.text().await?;
        if answer.trim().is_empty() {
            return Err(Error::Negotiation("empty SDP answer".to_string()));
        }
        Ok(answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_constants_target_realtime_endpoint() {
        let negotiator = Negotiator::new(DEFAULT_BASE_URL, DEFAULT_MODEL).unwrap();
        assert_eq!(negotiator.base_url, DEFAULT_BASE_URL);
        assert_eq!(negotiator.model(), DEFAULT_MODEL);
    }

    #[test]
    fn model_is_carried_as_query_parameter() {
        let negotiator = Negotiator::new("https://example.test/v1/realtime", "test-model").unwrap();
        let mut url = Url::parse(&negotiator.base_url).unwrap();
        url.query_pairs_mut().append_pair("model", &negotiator.model);
        assert_eq!(
            url.as_str(),
            "https://example.test/v1/realtime?model=test-model"
        );
    }
}
