//! Transport layer: peer connection assembly plus SDP negotiation over HTTP.

mod negotiation;
mod peer;

pub use negotiation::{DEFAULT_BASE_URL, DEFAULT_MODEL, Negotiator};
pub use peer::{TransportBuilder, WebRtcTransport};
