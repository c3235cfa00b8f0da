//! dapctl DAP - Debug Adapter Protocol client
//!
//! This crate provides the DAP message types, the transport channels that carry
//! them and the per-session connection that correlates requests with responses.
//!
//! # Architecture
//!
//! - [`protocol`]: envelope and body types, `Command`/`EventKind` vocabularies
//! - [`channel`]: `TransportChannel` trait, Content-Length framed streams and an
//!   in-memory channel pair
//! - [`adapter`]: opening channels to adapter processes and TCP adapters
//! - [`connection`]: `DebugSessionConnection`

pub mod adapter;
pub mod channel;
pub mod connection;
pub mod error;
pub mod protocol;

pub use adapter::{connect_tcp, open_adapter_channel, spawn_adapter};
pub use channel::{
    memory_channel, Channel, ChannelEvent, MemoryPeer, StreamChannel, TransportChannel,
    TransportChannelRef,
};
pub use connection::{DebugSessionConnection, RequestHandler, RequestHandlerResult};
pub use error::{Error, Result, CLOSED_MESSAGE};
pub use protocol::*;
