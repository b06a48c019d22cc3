//! Seams between the session controller and the transport.
//!
//! The controller never touches WebRTC types directly; it drives a
//! [`ControlChannel`] and consumes [`ChannelSignal`]s, so tests can stand in
//! a scripted transport.

use tokio::sync::mpsc;

use crate::Result;
use crate::media::BoxFuture;
use crate::protocol::client_events::ClientEvent;
use crate::protocol::server_events::ServerEvent;

/// Lifecycle and traffic notifications from the control channel, in the
/// order the transport observed them.
#[derive(Debug)]
pub enum ChannelSignal {
    /// Channel is open; the session can go active.
    Open,
    /// A decoded server event arrived.
    Message(ServerEvent),
    /// Channel closed (remote hangup or local teardown).
    Closed,
}

/// Outbound half of the control channel.
pub trait ControlChannel: Send + Sync {
    /// Serialize and send a client event.
    fn send(&self, event: ClientEvent) -> BoxFuture<'_, Result<()>>;

    /// Whether the channel is currently open. Senders must check this before
    /// sending from a task that may outlive the session.
    fn is_open(&self) -> bool;

    /// Close the channel. Idempotent.
    fn close(&self) -> BoxFuture<'_, Result<()>>;
}

/// Handle to the underlying transport, kept alive for the session's duration
/// and torn down on stop.
pub trait TransportHandle: Send + Sync {
    fn close(&self) -> BoxFuture<'_, Result<()>>;
}

/// A fully negotiated transport: an open (or opening) control channel plus
/// the signal stream feeding the session event loop.
pub struct Connection {
    pub channel: std::sync::Arc<dyn ControlChannel>,
    pub signals: mpsc::Receiver<ChannelSignal>,
    pub transport: std::sync::Arc<dyn TransportHandle>,
}

/// Produces a [`Connection`] per session start. The production impl runs
/// token fetch, device setup and SDP negotiation; tests substitute scripted
/// connectors.
#[async_trait::async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> Result<Connection>;
}
