use std::sync::Arc;

use crate::credentials::TokenEndpoint;
use crate::protocol::models::{Modality, ToolChoice};
use crate::transport::{DEFAULT_BASE_URL, DEFAULT_MODEL, Negotiator};
use crate::{Error, Result};

use super::channel::Connector;
use super::connect::RealtimeConnector;
use super::controller::{SessionSettings, VoiceSession};
use super::registry::FunctionRegistry;

impl VoiceSession {
    #[must_use]
    pub fn builder() -> VoiceSessionBuilder {
        VoiceSessionBuilder::new()
    }
}

pub struct VoiceSessionBuilder {
    token_url: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    instructions: Option<String>,
    modalities: Option<Vec<Modality>>,
    tool_choice: Option<ToolChoice>,
    registry: FunctionRegistry,
    connector: Option<Arc<dyn Connector>>,
}

impl VoiceSessionBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            token_url: None,
            base_url: None,
            model: None,
            instructions: None,
            modalities: None,
            tool_choice: None,
            registry: FunctionRegistry::new(),
            connector: None,
        }
    }

    /// Backend endpoint that mints ephemeral session tokens.
    #[must_use]
    pub fn token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = Some(url.into());
        self
    }

    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    #[must_use]
    pub fn instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    #[must_use]
    pub fn modalities(mut self, modalities: Vec<Modality>) -> Self {
        self.modalities = Some(modalities);
        self
    }

    #[must_use]
    pub const fn tool_choice(mut self, tool_choice: ToolChoice) -> Self {
        self.tool_choice = Some(tool_choice);
        self
    }

    #[must_use]
    pub fn functions(mut self, registry: FunctionRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Substitute a custom connector and skip token/device/negotiation
    /// setup entirely.
    #[must_use]
    pub fn connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// # Errors
    /// Returns an error if no token endpoint was configured (and no custom
    /// connector given), or if the HTTP clients cannot be built.
    #[allow(clippy::result_large_err)]
    pub fn build(self) -> Result<VoiceSession> {
        let connector = match self.connector {
            Some(connector) => connector,
            None => {
                let token_url = self.token_url.ok_or_else(|| {
                    Error::Credential("token_url is required".to_string())
                })?;
                let credentials = Arc::new(TokenEndpoint::new(&token_url)?);
                let negotiator = Negotiator::new(
                    self.base_url
                        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
                    self.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
                )?;
                Arc::new(RealtimeConnector::new(credentials, negotiator))
            }
        };

        let defaults = SessionSettings::default();
        let settings = SessionSettings {
            instructions: self.instructions.unwrap_or(defaults.instructions),
            modalities: self.modalities.unwrap_or(defaults.modalities),
            tool_choice: self.tool_choice.unwrap_or(defaults.tool_choice),
        };

        Ok(VoiceSession::new(connector, self.registry, settings))
    }
}

impl Default for VoiceSessionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_requires_token_url_without_connector() {
        let err = VoiceSession::builder().build().unwrap_err();
        assert!(matches!(err, Error::Credential(_)));
    }

    #[test]
    fn build_with_token_url_succeeds() {
        let session = VoiceSession::builder()
            .token_url("http://localhost:3000/token")
            .instructions("Be brief.")
            .build()
            .unwrap();
        assert!(!session.is_active());
    }
}
