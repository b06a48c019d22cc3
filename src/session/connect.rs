//! Production connector: token fetch, audio device setup, SDP negotiation.

use std::sync::Arc;

use async_trait::async_trait;

use crate::Result;
use crate::credentials::CredentialProvider;
use crate::media::{MicSource, SpeakerSink};
use crate::transport::{Negotiator, TransportBuilder, WebRtcTransport};

use super::channel::{Connection, Connector};

pub struct RealtimeConnector {
    credentials: Arc<dyn CredentialProvider>,
    negotiator: Negotiator,
}

impl RealtimeConnector {
    #[must_use]
    pub fn new(credentials: Arc<dyn CredentialProvider>, negotiator: Negotiator) -> Self {
        Self {
            credentials,
            negotiator,
        }
    }
}

#[async_trait]
impl Connector for RealtimeConnector {
    async fn connect(&self) -> Result<Connection> {
        let token = self.credentials.get_token().await?;
        let source = MicSource::open()?;
        let sink = SpeakerSink::open()?;
        let transport = TransportBuilder::new(source, sink).build().await?;

        match negotiate(&self.negotiator, &token, &transport).await {
            Ok(()) => Ok(transport.into_connection()),
            Err(err) => {
                transport.close().await;
                Err(err)
            }
        }
    }
}

async fn negotiate(
    negotiator: &Negotiator,
    token: &str,
    transport: &WebRtcTransport,
) -> Result<()> {
    let offer = transport.create_offer().await?;
    tracing::debug!(model = negotiator.model(), "posting SDP offer");
    let answer = negotiator.exchange(token, offer).await?;
    transport.apply_answer(answer).await
}
