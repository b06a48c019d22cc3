use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// The token backend was unreachable or returned a malformed body.
    /// Fatal to the start attempt; the session stays idle.
    #[error("failed to obtain ephemeral token: {0}")]
    Credential(String),

    /// Microphone or playback device unavailable. Fatal to the start attempt.
    #[error("media device access failed: {0}")]
    MediaAccess(String),

    /// The SDP offer/answer exchange with the realtime endpoint failed.
    #[error("session negotiation failed: {0}")]
    Negotiation(String),

    /// A registered function handler failed or returned malformed data.
    #[error("function handler error: {0}")]
    Handler(String),

    /// The model requested a function no one registered.
    #[error("no handler registered for function: {0}")]
    UnregisteredFunction(String),

    #[error("HTTP protocol error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("failed to parse or serialize JSON: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("WebRTC error: {0}")]
    WebRtc(#[from] webrtc::Error),

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("header error: {0}")]
    Header(#[from] reqwest::header::InvalidHeaderValue),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("the connection was closed unexpectedly")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, Error>;
