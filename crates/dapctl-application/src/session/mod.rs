//! Debug sessions: one DAP conversation each, and the manager that starts,
//! tracks and stops them

mod debug_session;
mod manager;
mod settings;

pub use debug_session::{
    DebugSession, DebugThread, SessionServices, StopCallback, INITIALIZATION_FAILED,
};
pub use manager::{
    DebugSessionCustomEvent, DebugSessionManager, DidChangeActiveDebugSessionEvent,
    DidChangeBreakpointsEvent, SessionPorts, CANCEL, CONFIGURE_TASK, DEBUG_ANYWAY,
    OPEN_LAUNCH_JSON, START_FAILED, TASK_FAILURE_ACTIONS,
};
pub use settings::DebugSessionSettings;
