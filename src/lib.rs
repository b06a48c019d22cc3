#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::multiple_crate_versions)]

//! Voice sessions with the `OpenAI` Realtime API over WebRTC.
//!
//! A [`VoiceSession`] drives one conversation: it fetches an ephemeral token
//! from a trusted backend, negotiates a peer connection carrying a PCMU
//! audio track and the `oai-events` control channel, then handles server
//! events (transcripts, completed responses, function calls) until stopped.
//!
//! ```no_run
//! use voicebot_rtc::{VoiceSession, functions};
//!
//! # async fn run() -> voicebot_rtc::Result<()> {
//! let session = VoiceSession::builder()
//!     .token_url("http://localhost:3000/token")
//!     .instructions("You are a helpful assistant.")
//!     .functions(functions::builtins(functions::DEFAULT_SIGNUP_URL))
//!     .build()?;
//!
//! session.start().await?;
//! session.send("What's the weather in Austin?", Vec::new()).await?;
//! # Ok(())
//! # }
//! ```

pub mod credentials;
pub mod error;
pub mod functions;
pub mod media;
pub mod protocol;
pub mod session;
pub mod transport;

pub use error::{Error, Result};
pub use protocol::client_events::ClientEvent;
pub use protocol::models::{
    ContentPart, Item, Modality, OutputItem, Response, Role, SessionUpdate, Tool, ToolChoice,
};
pub use protocol::server_events::ServerEvent;
pub use session::{
    Attachment, ChannelSignal, Connection, Connector, ControlChannel, FunctionCall,
    FunctionOutput, FunctionRegistry, RealtimeConnector, SessionSettings, TransportHandle,
    VoiceSession, VoiceSessionBuilder,
};
pub use transport::{Negotiator, TransportBuilder};
