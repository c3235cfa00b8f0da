//! Shared stop signal for the members of a compound launch

use crate::event::{Emitter, Subscription};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared by every member session of a `stopAll` compound.
///
/// The first [`DebugCompoundRoot::stop_session`] call broadcasts the stop signal;
/// later calls are no-ops.
pub struct DebugCompoundRoot {
    stopped: AtomicBool,
    on_stop: Emitter<()>,
}

impl DebugCompoundRoot {
    pub fn new() -> Self {
        Self {
            stopped: AtomicBool::new(false),
            on_stop: Emitter::new(),
        }
    }

    pub fn stop_session(&self) {
        if !self.stopped.swap(true, Ordering::SeqCst) {
            self.on_stop.fire(&());
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    pub fn on_did_session_stop<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&()) + Send + Sync + 'static,
    {
        self.on_stop.on(listener)
    }
}

impl Default for DebugCompoundRoot {
    fn default() -> Self {
        Self::new()
    }
}

/// Roots compare by identity: two members belong to the same compound launch
/// only if they share the same root instance.
impl PartialEq for DebugCompoundRoot {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other)
    }
}

impl fmt::Debug for DebugCompoundRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DebugCompoundRoot")
            .field("stopped", &self.is_stopped())
            .finish()
    }
}
