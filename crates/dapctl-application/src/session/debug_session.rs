//! One debug session: DAP lifecycle, threads, frames and breakpoints
//!
//! # Lifecycle
//!
//! ```text
//! start()        initialize -> launch | attach
//! "initialized"  setBreakpoints* -> configurationDone -> threads
//! "stopped"      threads -> stackTrace (current thread)
//! stop()         terminate (launch + supportsTerminateRequest) | disconnect
//! ```
//!
//! Adapter events are queued and handled one at a time by a worker task, so a
//! `stopped` that arrives while `initialized` is being handled waits for the
//! configuration to finish.

use super::settings::DebugSessionSettings;
use dapctl_core::{
    DebugConfiguration, DebugState, Disposables, Emitter, InternalDebugSessionOptions, Result,
    Subscription,
};
use dapctl_dap::{
    Breakpoint, Capabilities, Command, ContinuedEventBody, DebugSessionConnection, Event,
    EventKind, InitializeRequestArguments, RunInTerminalRequestArguments,
    RunInTerminalResponseBody, SetBreakpointsArguments, SetBreakpointsResponseBody, Source,
    StackFrame, StackTraceArguments, StackTraceResponseBody, StoppedEventBody, Thread,
    ThreadEventBody, ThreadsResponseBody, RUN_IN_TERMINAL,
};
use dapctl_ports::{
    path_to_uri, uri_to_path, BreakpointSourceRef, EditorServiceRef, MessageServiceRef,
};
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Shown when `launch`/`attach` fails without a message
pub const INITIALIZATION_FAILED: &str =
    "Debug session initialization failed. See console for details.";

/// Frames fetched per `stackTrace` request
const FRAME_BATCH: u32 = 20;

/// Sequence number of events produced by the session itself
const LOCAL_EVENT_SEQ: i64 = -1;

/// Runs once a stop sequence completed
pub type StopCallback = Box<dyn FnOnce() + Send>;

/// Host services a session talks to
#[derive(Clone)]
pub struct SessionServices {
    pub editor: EditorServiceRef,
    pub breakpoints: BreakpointSourceRef,
    pub messages: MessageServiceRef,
}

// ============================================================================
// Threads
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct DebugThread {
    pub raw: Thread,
    /// Set while the thread is stopped
    pub stopped_details: Option<StoppedEventBody>,
    pub frames: Vec<StackFrame>,
    pub total_frames: Option<u32>,
    current_frame_id: Option<i64>,
}

impl DebugThread {
    fn new(raw: Thread) -> Self {
        Self {
            raw,
            stopped_details: None,
            frames: Vec::new(),
            total_frames: None,
            current_frame_id: None,
        }
    }

    pub fn id(&self) -> i64 {
        self.raw.id
    }

    pub fn name(&self) -> &str {
        &self.raw.name
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped_details.is_some()
    }

    pub fn top_frame(&self) -> Option<&StackFrame> {
        self.frames.first()
    }

    pub fn current_frame(&self) -> Option<&StackFrame> {
        let id = self.current_frame_id?;
        self.frames.iter().find(|frame| frame.id == id)
    }

    fn stop(&mut self, details: StoppedEventBody) {
        self.clear();
        self.stopped_details = Some(details);
    }

    fn clear(&mut self) {
        self.stopped_details = None;
        self.frames.clear();
        self.total_frames = None;
        self.current_frame_id = None;
    }
}

// ============================================================================
// Session
// ============================================================================

#[derive(Debug, Default)]
struct SessionState {
    capabilities: Capabilities,
    threads: Vec<DebugThread>,
    current_thread: Option<i64>,
    /// Breakpoints as verified by the adapter, by source URI
    breakpoints: BTreeMap<String, Vec<Breakpoint>>,
}

impl SessionState {
    fn thread_mut(&mut self, id: i64) -> Option<&mut DebugThread> {
        self.threads.iter_mut().find(|thread| thread.id() == id)
    }

    fn current_thread(&self) -> Option<&DebugThread> {
        let id = self.current_thread?;
        self.threads.iter().find(|thread| thread.id() == id)
    }
}

enum SessionEvent {
    Initialized,
    Stopped(StoppedEventBody),
    Continued(ContinuedEventBody),
    Thread(ThreadEventBody),
    Breakpoint(BreakpointEventBody),
    Capabilities(Capabilities),
}

#[derive(Debug, Deserialize)]
struct BreakpointEventBody {
    /// "changed", "new" or "removed"
    reason: String,
    breakpoint: Breakpoint,
}

#[derive(Debug, Deserialize)]
struct CapabilitiesEventBody {
    capabilities: Capabilities,
}

pub struct DebugSession {
    id: String,
    options: InternalDebugSessionOptions,
    parent: Option<Arc<DebugSession>>,
    connection: Arc<DebugSessionConnection>,
    services: SessionServices,
    settings: DebugSessionSettings,
    state: Mutex<SessionState>,
    initialized: AtomicBool,
    terminated: Arc<AtomicBool>,
    stopping: AtomicBool,
    restarting: AtomicBool,
    on_did_change: Emitter<()>,
    on_did_change_breakpoints: Emitter<String>,
    on_did_focus_thread: Emitter<DebugThread>,
    on_did_focus_frame: Emitter<StackFrame>,
    subscriptions: Mutex<Disposables>,
    worker: Mutex<Option<JoinHandle<()>>>,
    weak_self: Weak<Self>,
}

impl std::fmt::Debug for DebugSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DebugSession")
            .field("id", &self.id)
            .field("name", &self.name())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl DebugSession {
    /// Create a session over `connection` and start listening to its events.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(
        id: impl Into<String>,
        options: InternalDebugSessionOptions,
        parent: Option<Arc<DebugSession>>,
        connection: Arc<DebugSessionConnection>,
        services: SessionServices,
        settings: DebugSessionSettings,
    ) -> Arc<Self> {
        let session = Arc::new_cyclic(|weak_self| Self {
            id: id.into(),
            options,
            parent,
            connection,
            services,
            settings,
            state: Mutex::new(SessionState::default()),
            initialized: AtomicBool::new(false),
            terminated: Arc::new(AtomicBool::new(false)),
            stopping: AtomicBool::new(false),
            restarting: AtomicBool::new(false),
            on_did_change: Emitter::new(),
            on_did_change_breakpoints: Emitter::new(),
            on_did_focus_thread: Emitter::new(),
            on_did_focus_frame: Emitter::new(),
            subscriptions: Mutex::new(Disposables::new()),
            worker: Mutex::new(None),
            weak_self: weak_self.clone(),
        });
        session.register();
        session
    }

    fn register(&self) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut subscriptions = Disposables::new();

        let terminated = self.terminated.clone();
        self.subscribe(&mut subscriptions, EventKind::Terminated, move |_| {
            terminated.store(true, Ordering::SeqCst);
        });
        self.forward(&mut subscriptions, &tx, EventKind::Initialized, |_| {
            Some(SessionEvent::Initialized)
        });
        self.forward(&mut subscriptions, &tx, EventKind::Stopped, |event| {
            body(event).map(SessionEvent::Stopped)
        });
        self.forward(&mut subscriptions, &tx, EventKind::Continued, |event| {
            body(event).map(SessionEvent::Continued)
        });
        self.forward(&mut subscriptions, &tx, EventKind::Thread, |event| {
            body(event).map(SessionEvent::Thread)
        });
        self.forward(&mut subscriptions, &tx, EventKind::Breakpoint, |event| {
            body(event).map(SessionEvent::Breakpoint)
        });
        self.forward(&mut subscriptions, &tx, EventKind::Capabilities, |event| {
            body::<CapabilitiesEventBody>(event).map(|body| SessionEvent::Capabilities(body.capabilities))
        });

        if let Some(root) = self.options.compound_root() {
            let session = self.weak_self.clone();
            subscriptions.push(root.on_did_session_stop(move |_| {
                if let Some(session) = session.upgrade() {
                    tokio::spawn(session.stop(false, Box::new(|| {})));
                }
            }));
        }

        let editor = self.services.editor.clone();
        self.connection.on_request(RUN_IN_TERMINAL, move |request| {
            let editor = editor.clone();
            async move {
                let arguments: RunInTerminalRequestArguments =
                    serde_json::from_value(request.arguments.unwrap_or(Value::Null))
                        .map_err(|e| e.to_string())?;
                let process_id = editor
                    .run_in_terminal(arguments)
                    .await
                    .map_err(|e| e.to_string())?;
                let body = RunInTerminalResponseBody {
                    process_id,
                    shell_process_id: None,
                };
                serde_json::to_value(body)
                    .map(Some)
                    .map_err(|e| e.to_string())
            }
        });

        *self.subscriptions_guard() = subscriptions;
        let worker = tokio::spawn(Self::run_worker(self.weak_self.clone(), rx));
        *self
            .worker
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(worker);
    }

    fn subscribe<F>(&self, subscriptions: &mut Disposables, kind: EventKind, listener: F)
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        match self.connection.on(kind, listener) {
            Ok(subscription) => subscriptions.push(subscription),
            Err(e) => warn!(session_id = %self.id, "Failed to subscribe: {}", e),
        }
    }

    fn forward(
        &self,
        subscriptions: &mut Disposables,
        tx: &mpsc::UnboundedSender<SessionEvent>,
        kind: EventKind,
        convert: fn(&Event) -> Option<SessionEvent>,
    ) {
        let tx = tx.clone();
        self.subscribe(subscriptions, kind, move |event| match convert(event) {
            Some(session_event) => {
                let _ = tx.send(session_event);
            }
            None => debug!(event = %event.event, "Ignoring event with malformed body"),
        });
    }

    async fn run_worker(session: Weak<Self>, mut events: mpsc::UnboundedReceiver<SessionEvent>) {
        while let Some(event) = events.recv().await {
            let Some(session) = session.upgrade() else {
                break;
            };
            session.handle_event(event).await;
        }
    }

    async fn handle_event(&self, event: SessionEvent) {
        match event {
            SessionEvent::Initialized => self.configure().await,
            SessionEvent::Stopped(details) => {
                self.update_threads(Some(details)).await;
                self.update_frames().await;
            }
            SessionEvent::Continued(body) => self.handle_continued(body),
            SessionEvent::Thread(body) => match body.reason.as_str() {
                "started" => self.update_threads(None).await,
                "exited" => {
                    {
                        let mut state = self.state_guard();
                        state.threads.retain(|thread| thread.id() != body.thread_id);
                        if state.current_thread == Some(body.thread_id) {
                            state.current_thread = None;
                        }
                    }
                    self.update_current_thread(None);
                    self.fire_did_change();
                }
                _ => {}
            },
            SessionEvent::Breakpoint(body) => self.handle_breakpoint_event(body),
            SessionEvent::Capabilities(capabilities) => {
                self.state_guard().capabilities.merge(capabilities);
                self.fire_did_change();
            }
        }
    }

    fn state_guard(&self) -> MutexGuard<'_, SessionState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn subscriptions_guard(&self) -> MutexGuard<'_, Disposables> {
        self.subscriptions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        self.options.name()
    }

    pub fn options(&self) -> &InternalDebugSessionOptions {
        &self.options
    }

    pub fn configuration(&self) -> &DebugConfiguration {
        self.options.configuration()
    }

    pub fn parent(&self) -> Option<&Arc<DebugSession>> {
        self.parent.as_ref()
    }

    pub fn connection(&self) -> &Arc<DebugSessionConnection> {
        &self.connection
    }

    pub fn capabilities(&self) -> Capabilities {
        self.state_guard().capabilities.clone()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::SeqCst)
    }

    /// Set once the session is being stopped so a new one can replace it
    pub fn is_restarting(&self) -> bool {
        self.restarting.load(Ordering::SeqCst)
    }

    pub fn mark_restarting(&self) {
        self.restarting.store(true, Ordering::SeqCst);
    }

    pub fn state(&self) -> DebugState {
        if self.connection.is_disposed() {
            return DebugState::Inactive;
        }
        if !self.is_initialized() {
            return DebugState::Initializing;
        }
        let state = self.state_guard();
        let stopped = match state.current_thread() {
            Some(thread) => thread.is_stopped(),
            None => state.threads.iter().any(DebugThread::is_stopped),
        };
        if stopped {
            DebugState::Stopped
        } else {
            DebugState::Running
        }
    }

    pub fn threads(&self) -> Vec<DebugThread> {
        self.state_guard().threads.clone()
    }

    pub fn current_thread(&self) -> Option<DebugThread> {
        self.state_guard().current_thread().cloned()
    }

    pub fn current_frame(&self) -> Option<StackFrame> {
        self.state_guard()
            .current_thread()
            .and_then(|thread| thread.current_frame().cloned())
    }

    /// URIs with breakpoints known to the adapter
    pub fn breakpoint_uris(&self) -> Vec<String> {
        self.state_guard().breakpoints.keys().cloned().collect()
    }

    pub fn breakpoints(&self, uri: &str) -> Vec<Breakpoint> {
        self.state_guard()
            .breakpoints
            .get(uri)
            .cloned()
            .unwrap_or_default()
    }

    // ========================================================================
    // Events
    // ========================================================================

    pub fn on_did_change<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&()) + Send + Sync + 'static,
    {
        self.on_did_change.on(listener)
    }

    /// Fired with the source URI whose verified breakpoints changed
    pub fn on_did_change_breakpoints<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&String) + Send + Sync + 'static,
    {
        self.on_did_change_breakpoints.on(listener)
    }

    pub fn on_did_focus_thread<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&DebugThread) + Send + Sync + 'static,
    {
        self.on_did_focus_thread.on(listener)
    }

    pub fn on_did_focus_frame<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&StackFrame) + Send + Sync + 'static,
    {
        self.on_did_focus_frame.on(listener)
    }

    /// Subscribe to adapter events of one kind
    pub fn on<F>(&self, kind: EventKind, listener: F) -> dapctl_dap::Result<Subscription>
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.connection.on(kind, listener)
    }

    pub fn on_custom_event<F>(&self, listener: F) -> dapctl_dap::Result<Subscription>
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.connection.on_custom_event(listener)
    }

    fn fire_did_change(&self) {
        self.on_did_change.fire(&());
    }

    /// Deliver a locally produced `exited` event
    fn fire_exited(&self, reason: &str) {
        self.connection
            .fire(&Event::new(LOCAL_EVENT_SEQ, "exited").with_body(json!({ "reason": reason })));
    }

    /// Resolves with `true` once an event of `kind` arrives, `false` when the
    /// connection goes away first
    fn wait_for(&self, kind: EventKind) -> impl Future<Output = bool> + Send + 'static {
        let (tx, rx) = oneshot::channel::<()>();
        let tx = Mutex::new(Some(tx));
        let subscription = self.connection.on(kind, move |_| {
            let sender = tx
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .take();
            if let Some(sender) = sender {
                let _ = sender.send(());
            }
        });
        async move {
            let _subscription = subscription;
            rx.await.is_ok()
        }
    }

    // ========================================================================
    // Start
    // ========================================================================

    /// `initialize`, then `launch` or `attach`
    #[tracing::instrument(skip(self), fields(session_id = %self.id))]
    pub async fn start(&self) -> Result<()> {
        self.initialize().await?;
        self.launch_or_attach().await
    }

    async fn initialize(&self) -> Result<()> {
        let arguments = InitializeRequestArguments {
            client_id: Some(self.settings.client_id.clone()),
            client_name: Some(self.settings.client_name.clone()),
            adapter_id: self.configuration().debug_type.clone(),
            locale: Some(self.settings.locale.clone()),
            lines_start_at1: Some(true),
            columns_start_at1: Some(true),
            path_format: Some("path".to_string()),
            supports_variable_type: Some(false),
            supports_variable_paging: Some(false),
            supports_run_in_terminal_request: Some(true),
            supports_start_debugging_request: Some(false),
        };
        let response = self
            .connection
            .send_request(Command::Initialize, serde_json::to_value(arguments)?)
            .await?;
        let capabilities: Capabilities = match response.body {
            Some(body) => serde_json::from_value(body)?,
            None => Capabilities::default(),
        };
        self.state_guard().capabilities = capabilities;
        Ok(())
    }

    async fn launch_or_attach(&self) -> Result<()> {
        let configuration = self.configuration();
        let command = if configuration.is_attach() {
            Command::Attach
        } else {
            Command::Launch
        };
        let arguments = configuration.to_value()?;
        if let Err(e) = self.connection.send_request(command, arguments).await {
            let message = e
                .response()
                .and_then(|response| response.message.clone())
                .filter(|message| !message.is_empty())
                .unwrap_or_else(|| INITIALIZATION_FAILED.to_string());
            warn!(session_id = %self.id, "Debug session failed to start: {}", message);
            self.fire_exited(&message);
            self.services.messages.error(&message, &[]).await;
            return Err(e.into());
        }
        Ok(())
    }

    /// Send breakpoints and `configurationDone`, then mark the session
    /// initialized
    async fn configure(&self) {
        let uris = self.services.breakpoints.uris();
        for uri in uris {
            self.send_source_breakpoints(&uri, false).await;
        }
        if self.capabilities().supports_configuration_done_request == Some(true) {
            if let Err(e) = self
                .connection
                .send_request(Command::ConfigurationDone, json!({}))
                .await
            {
                warn!(session_id = %self.id, "configurationDone failed: {}", e);
            }
        }
        self.initialized.store(true, Ordering::SeqCst);
        info!(session_id = %self.id, name = %self.name(), "Debug session initialized");
        self.fire_did_change();
        self.update_threads(None).await;
    }

    // ========================================================================
    // Breakpoints
    // ========================================================================

    /// Send the breakpoints of `uri`, or of every known source, to the adapter.
    /// Ignored until the session is initialized.
    pub async fn update_breakpoints(&self, uri: Option<&str>, source_modified: bool) {
        if !self.is_initialized() {
            return;
        }
        let uris = match uri {
            Some(uri) => vec![uri.to_string()],
            None => self.services.breakpoints.uris(),
        };
        for uri in uris {
            self.send_source_breakpoints(&uri, source_modified).await;
        }
    }

    async fn send_source_breakpoints(&self, uri: &str, source_modified: bool) {
        let requested = self.services.breakpoints.source_breakpoints(uri);
        let arguments = SetBreakpointsArguments {
            source: Source::from_path(uri_to_path(uri)),
            breakpoints: Some(requested.clone()),
            source_modified: Some(source_modified),
        };
        let result = match serde_json::to_value(arguments) {
            Ok(arguments) => self
                .connection
                .send_request(Command::SetBreakpoints, arguments)
                .await
                .and_then(|response| Ok(response.body_as::<SetBreakpointsResponseBody>()?)),
            Err(e) => Err(e.into()),
        };
        let breakpoints = match result {
            Ok(body) => body.breakpoints,
            Err(e) => {
                debug!(session_id = %self.id, uri, "setBreakpoints failed: {}", e);
                requested
                    .iter()
                    .map(|requested| Breakpoint {
                        id: None,
                        verified: false,
                        message: Some(e.to_string()),
                        source: None,
                        line: Some(requested.line),
                    })
                    .collect()
            }
        };
        self.state_guard()
            .breakpoints
            .insert(uri.to_string(), breakpoints);
        self.on_did_change_breakpoints.fire(&uri.to_string());
    }

    fn handle_breakpoint_event(&self, body: BreakpointEventBody) {
        let BreakpointEventBody { reason, breakpoint } = body;
        let affected = {
            let mut state = self.state_guard();
            let existing = breakpoint.id.and_then(|id| {
                state.breakpoints.iter().find_map(|(uri, breakpoints)| {
                    breakpoints
                        .iter()
                        .position(|b| b.id == Some(id))
                        .map(|index| (uri.clone(), index))
                })
            });
            match (reason.as_str(), existing) {
                ("changed", Some((uri, index))) => {
                    if let Some(slot) = state
                        .breakpoints
                        .get_mut(&uri)
                        .and_then(|breakpoints| breakpoints.get_mut(index))
                    {
                        *slot = breakpoint;
                    }
                    Some(uri)
                }
                ("removed", Some((uri, index))) => {
                    if let Some(breakpoints) = state.breakpoints.get_mut(&uri) {
                        breakpoints.remove(index);
                    }
                    Some(uri)
                }
                ("new", None) => {
                    let uri = breakpoint
                        .source
                        .as_ref()
                        .and_then(|source| source.path.as_deref())
                        .map(path_to_uri);
                    if let Some(uri) = &uri {
                        state
                            .breakpoints
                            .entry(uri.clone())
                            .or_default()
                            .push(breakpoint);
                    }
                    uri
                }
                _ => None,
            }
        };
        if let Some(uri) = affected {
            self.on_did_change_breakpoints.fire(&uri);
        }
    }

    // ========================================================================
    // Threads and frames
    // ========================================================================

    async fn update_threads(&self, stopped: Option<StoppedEventBody>) {
        let threads = match self
            .connection
            .send_request(Command::Threads, Value::Null)
            .await
            .and_then(|response| Ok(response.body_as::<ThreadsResponseBody>()?))
        {
            Ok(body) => body.threads,
            Err(e) => {
                debug!(session_id = %self.id, "threads failed: {}", e);
                Vec::new()
            }
        };

        {
            let mut state = self.state_guard();
            let mut previous = std::mem::take(&mut state.threads);
            state.threads = threads
                .into_iter()
                .map(|raw| {
                    let mut thread = match previous.iter().position(|t| t.id() == raw.id) {
                        Some(index) => previous.swap_remove(index),
                        None => DebugThread::new(raw.clone()),
                    };
                    thread.raw = raw;
                    if let Some(details) = &stopped {
                        if details.all_threads_stopped == Some(true)
                            || details.thread_id == Some(thread.id())
                        {
                            thread.stop(details.clone());
                        }
                    }
                    thread
                })
                .collect();
        }
        self.update_current_thread(stopped.as_ref());
        self.fire_did_change();
    }

    /// Focus the stopped thread unless the adapter asked to preserve focus;
    /// otherwise keep the current thread while it exists, else the first one
    fn update_current_thread(&self, stopped: Option<&StoppedEventBody>) {
        let focused = {
            let mut state = self.state_guard();
            let mut thread_id = state.current_thread;
            if let Some(details) = stopped {
                if details.preserve_focus_hint != Some(true) && details.thread_id.is_some() {
                    thread_id = details.thread_id;
                }
            }
            let next = thread_id
                .filter(|id| state.threads.iter().any(|thread| thread.id() == *id))
                .or_else(|| state.threads.first().map(DebugThread::id));
            let changed = next != state.current_thread;
            state.current_thread = next;
            if changed {
                state.current_thread().cloned()
            } else {
                None
            }
        };
        if let Some(thread) = focused {
            self.on_did_focus_thread.fire(&thread);
        }
    }

    pub fn set_current_thread(&self, thread_id: i64) {
        let focused = {
            let mut state = self.state_guard();
            if state.threads.iter().all(|thread| thread.id() != thread_id) {
                return;
            }
            state.current_thread = Some(thread_id);
            state.current_thread().cloned()
        };
        if let Some(thread) = focused {
            self.on_did_focus_thread.fire(&thread);
        }
        self.fire_did_change();
    }

    pub fn set_current_frame(&self, frame_id: i64) {
        let focused = {
            let mut state = self.state_guard();
            let Some(thread_id) = state.current_thread else {
                return;
            };
            let Some(thread) = state.thread_mut(thread_id) else {
                return;
            };
            let Some(frame) = thread.frames.iter().find(|f| f.id == frame_id).cloned() else {
                return;
            };
            thread.current_frame_id = Some(frame_id);
            frame
        };
        self.on_did_focus_frame.fire(&focused);
        self.fire_did_change();
    }

    /// Load the frames of the current thread when it is stopped and has none
    async fn update_frames(&self) {
        let thread_id = {
            let state = self.state_guard();
            match state.current_thread() {
                Some(thread) if thread.is_stopped() && thread.frames.is_empty() => thread.id(),
                _ => return,
            }
        };
        if self.capabilities().supports_delayed_stack_trace_loading == Some(true) {
            self.fetch_frames(thread_id, 1).await;
            self.fetch_frames(thread_id, FRAME_BATCH - 1).await;
        } else {
            self.fetch_frames(thread_id, FRAME_BATCH).await;
        }
    }

    async fn fetch_frames(&self, thread_id: i64, levels: u32) {
        let start_frame = {
            let mut state = self.state_guard();
            match state.thread_mut(thread_id) {
                Some(thread) if thread.is_stopped() => {
                    let loaded = thread.frames.len() as u32;
                    if thread.total_frames.is_some_and(|total| loaded >= total) {
                        return;
                    }
                    loaded
                }
                _ => return,
            }
        };
        let arguments = StackTraceArguments {
            thread_id,
            start_frame: Some(start_frame),
            levels: Some(levels),
        };
        let result = match serde_json::to_value(arguments) {
            Ok(arguments) => self
                .connection
                .send_request(Command::StackTrace, arguments)
                .await
                .and_then(|response| Ok(response.body_as::<StackTraceResponseBody>()?)),
            Err(e) => Err(e.into()),
        };
        let body = match result {
            Ok(body) => body,
            Err(e) => {
                debug!(session_id = %self.id, thread_id, "stackTrace failed: {}", e);
                return;
            }
        };

        let focused = {
            let mut state = self.state_guard();
            let is_current = state.current_thread == Some(thread_id);
            let Some(thread) = state.thread_mut(thread_id) else {
                return;
            };
            // Continued while the request was in flight
            if !thread.is_stopped() || thread.frames.len() as u32 != start_frame {
                return;
            }
            thread.frames.extend(body.stack_frames);
            thread.total_frames = body.total_frames;
            if thread.current_frame_id.is_none() {
                thread.current_frame_id = thread.top_frame().map(|frame| frame.id);
                thread.top_frame().filter(|_| is_current).cloned()
            } else {
                None
            }
        };
        if let Some(frame) = focused {
            self.on_did_focus_frame.fire(&frame);
        }
        self.fire_did_change();
    }

    fn handle_continued(&self, body: ContinuedEventBody) {
        {
            let mut state = self.state_guard();
            if body.all_threads_continued != Some(false) {
                state.threads.iter_mut().for_each(DebugThread::clear);
            } else if let Some(thread) = body.thread_id.and_then(|id| state.thread_mut(id)) {
                thread.clear();
            }
        }
        self.fire_did_change();
    }

    // ========================================================================
    // Stop, disconnect, restart
    // ========================================================================

    /// Terminate or disconnect the debuggee, then run `callback`.
    ///
    /// Sessions whose lifecycle is managed by their parent stop the parent
    /// instead. A stop while another stop is in progress is ignored.
    pub fn stop(self: Arc<Self>, is_restart: bool, callback: StopCallback) -> BoxFuture<'static, ()> {
        async move {
            if self.configuration().lifecycle_managed_by_parent() {
                if let Some(parent) = self.parent.clone() {
                    return parent.stop(is_restart, callback).await;
                }
            }
            if self.stopping.swap(true, Ordering::SeqCst) {
                debug!(session_id = %self.id, "Stop already in progress");
                return;
            }

            if self.can_terminate() {
                let timeout = self.settings.terminate_timeout;
                let terminated = self.wait_for(EventKind::Terminated);
                let result = self
                    .connection
                    .send_request_with_timeout(
                        Command::Terminate,
                        json!({ "restart": is_restart }),
                        Some(timeout),
                    )
                    .await;
                let completed = match result {
                    Ok(_) => matches!(tokio::time::timeout(timeout, terminated).await, Ok(true)),
                    Err(e) => {
                        warn!(session_id = %self.id, "terminate failed: {}", e);
                        false
                    }
                };
                if !completed {
                    self.disconnect_request(is_restart).await;
                }
            } else {
                self.disconnect_request(is_restart).await;
            }

            callback();
            self.stopping.store(false, Ordering::SeqCst);
        }
        .boxed()
    }

    /// Disconnect without trying `terminate` first.
    ///
    /// Runs even while a stop is in progress: the `terminated` event a stop
    /// provokes is answered with a disconnect.
    pub async fn disconnect(&self, is_restart: bool, callback: StopCallback) {
        self.disconnect_request(is_restart).await;
        callback();
    }

    fn can_terminate(&self) -> bool {
        !self.is_terminated()
            && self.capabilities().supports_terminate_request == Some(true)
            && self.configuration().request == "launch"
    }

    async fn disconnect_request(&self, is_restart: bool) {
        let terminate_debuggee =
            self.is_initialized() && self.capabilities().support_terminate_debuggee == Some(true);
        let timeout = self.settings.disconnect_timeout;
        let exited = self.wait_for(EventKind::Exited);
        let arguments = json!({ "restart": is_restart, "terminateDebuggee": terminate_debuggee });
        match self
            .connection
            .send_request_with_timeout(Command::Disconnect, arguments, Some(timeout))
            .await
        {
            Ok(_) => {
                if !matches!(tokio::time::timeout(timeout, exited).await, Ok(true)) {
                    self.fire_exited(&format!("timeout after {} ms", timeout.as_millis()));
                }
            }
            Err(e) => {
                debug!(session_id = %self.id, "disconnect failed: {}", e);
                self.fire_exited(&e.to_string());
            }
        }
    }

    /// Restart in place through the adapter's `restart` request.
    ///
    /// Returns `false` when the adapter does not support it.
    pub async fn restart(&self) -> Result<bool> {
        if self.capabilities().supports_restart_request != Some(true) {
            return Ok(false);
        }
        let arguments = json!({ "arguments": self.configuration().to_value()? });
        self.connection
            .send_request(Command::Restart, arguments)
            .await?;
        Ok(true)
    }

    /// Release the connection and every listener
    pub fn dispose(&self) {
        if let Some(worker) = self
            .worker
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
        {
            worker.abort();
        }
        self.subscriptions_guard().dispose();
        self.connection.dispose();
        self.fire_did_change();
        self.on_did_change.dispose();
        self.on_did_change_breakpoints.dispose();
        self.on_did_focus_thread.dispose();
        self.on_did_focus_frame.dispose();
    }
}

fn body<T: DeserializeOwned>(event: &Event) -> Option<T> {
    serde_json::from_value(event.body.clone().unwrap_or(Value::Null)).ok()
}
