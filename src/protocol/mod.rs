//! Wire types for the realtime control channel.
//!
//! The channel carries discrete JSON documents in both directions. Client
//! events are strongly typed; server events keep an `Unknown` passthrough so
//! new event types the service introduces are ignored rather than fatal.

pub mod client_events;
pub mod models;
pub mod server_events;
