//! Session layer: lifecycle controller, function registry and the seams the
//! transport plugs into.

pub mod channel;

mod builder;
mod connect;
mod controller;
mod registry;

pub use builder::VoiceSessionBuilder;
pub use channel::{ChannelSignal, Connection, Connector, ControlChannel, TransportHandle};
pub use connect::RealtimeConnector;
pub use controller::{Attachment, SessionSettings, VoiceSession};
pub use registry::{FunctionCall, FunctionDescriptor, FunctionOutput, FunctionRegistry};
