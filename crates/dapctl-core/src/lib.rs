//! Dapctl Core - Domain types for the debug client
//!
//! This crate holds the types every other layer speaks in:
//!
//! - [`DebugConfiguration`] / [`DebugCompound`] - entries of a workspace launch file
//! - [`DebugSessionOptions`] - a resolved choice of configuration or compound plus
//!   the workspace root it belongs to
//! - [`InternalDebugSessionOptions`] - options that already went through the
//!   resolution pipeline and carry a disambiguation id
//! - [`DebugState`] - ordered session lifecycle state
//! - [`Emitter`] / [`Subscription`] / [`Disposables`] - synchronous pub/sub with
//!   RAII unsubscription
//!
//! # Architecture
//!
//! The core has no knowledge of the wire protocol, the filesystem or the async
//! runtime. Infrastructure crates (`dapctl-dap`, `dapctl-cli`) and the
//! application layer build on these types.

pub mod compound;
pub mod configuration;
pub mod error;
pub mod event;
pub mod options;
pub mod state;

pub use compound::DebugCompoundRoot;
pub use configuration::{
    CompoundMember, DebugCompound, DebugConfiguration, TaskIdentifier, TaskRef,
};
pub use error::{Error, ErrorCode, Result};
pub use event::{fire_wait_until, Disposables, Emitter, Subscription, WaitUntilEvent};
pub use options::{
    DebugCompoundSessionOptions, DebugConfigurationSessionOptions, DebugSessionOptions,
    InternalDebugSessionOptions, Resolution,
};
pub use state::DebugState;
