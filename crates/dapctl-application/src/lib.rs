//! # Dapctl Application Layer
//!
//! Debug session orchestration and launch configuration management.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │  Presentation Layer                 │  <- dapctl-cli
//! │  (CLI, host port implementations)   │
//! ├─────────────────────────────────────┤
//! │  Application Layer                  │  <- THIS CRATE
//! │  (Session and configuration mgmt)   │
//! ├─────────────────────────────────────┤
//! │  Infrastructure Layer               │  <- dapctl-dap, dapctl-config
//! │  (DAP transport, config loading)    │
//! ├─────────────────────────────────────┤
//! │  Domain Layer                       │  <- dapctl-core
//! │  (Configurations, options, events)  │
//! └─────────────────────────────────────┘
//! ```
//!
//! ## Components
//!
//! - [`DebugConfigurationManager`] - per-root launch models, lookup, current
//!   selection, dynamic configurations and persistence
//! - [`DebugSessionManager`] - resolution pipeline, task gates, compounds,
//!   restart/terminate and the current session
//! - [`DebugSession`] - one DAP conversation: handshake, breakpoints, threads,
//!   frames and the stop sequence
//! - [`DebugContext`] - both managers wired to one set of host ports
//!
//! Components talk to the host only through the traits in [`ports`].

pub mod configuration;
pub mod context;
pub mod session;

// Output ports are in dapctl-ports crate
pub use dapctl_ports as ports;

pub use configuration::{
    DebugConfigurationManager, DebugConfigurationModel, RecentDynamicOptions, INITIAL_LAUNCH_FILE,
};
pub use context::{DebugContext, HostPorts};
pub use session::{
    DebugSession, DebugSessionCustomEvent, DebugSessionManager, DebugSessionSettings,
    DebugThread, DidChangeActiveDebugSessionEvent, DidChangeBreakpointsEvent, SessionPorts,
};
