//! Debug session orchestration
//!
//! `DebugSessionManager` owns every running [`DebugSession`]: it resolves
//! launch configurations, runs pre-launch and post-debug tasks, starts
//! compounds, restarts and terminates sessions and tracks which session is
//! current.
//!
//! # Start flow
//!
//! ```text
//! save editors -> will-start -> resolve -> preLaunchTask -> create -> start
//!                               |
//!                               will-resolve(type)
//!                               resolve_debug_configuration
//!                               variable substitution ("launch")
//!                               resolve_debug_configuration_with_substituted_variables
//!                               disambiguation id
//! ```
//!
//! Any resolution step may abort the start quietly or ask for the launch
//! file to be opened instead.

use super::debug_session::{DebugSession, DebugThread, SessionServices, StopCallback};
use super::settings::DebugSessionSettings;
use crate::configuration::DebugConfigurationManager;
use dapctl_config::SaveBeforeStart;
use dapctl_core::{
    fire_wait_until, DebugCompoundRoot, DebugCompoundSessionOptions, DebugConfiguration,
    DebugConfigurationSessionOptions, DebugSessionOptions, DebugState, Disposables, Emitter, Error,
    InternalDebugSessionOptions, Resolution, Result, Subscription, TaskRef, WaitUntilEvent,
};
use dapctl_dap::{DebugSessionConnection, EventKind, StackFrame, TerminatedEventBody};
use dapctl_ports::{
    path_to_uri, BreakpointSourceRef, DebugServiceRef, EditorServiceRef, MessageServiceRef,
    TaskServiceRef, VariableResolveOptions, VariableResolverRef,
};
use futures::future::join_all;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tracing::{debug, error, info, warn};

/// Shown when starting fails for a reason other than an unsupported type
pub const START_FAILED: &str =
    "There was an error starting the debug session, check the logs for more details.";

pub const OPEN_LAUNCH_JSON: &str = "Open launch.json";
pub const CANCEL: &str = "Cancel";
pub const CONFIGURE_TASK: &str = "Configure Task";
pub const DEBUG_ANYWAY: &str = "Debug Anyway";

/// Actions offered when a task gating a start did not succeed
pub const TASK_FAILURE_ACTIONS: [&str; 4] = [OPEN_LAUNCH_JSON, CANCEL, CONFIGURE_TASK, DEBUG_ANYWAY];

/// Resolve one pipeline step, leaving the pipeline on a non-resolved outcome
macro_rules! resolved {
    ($resolution:expr) => {
        match $resolution {
            Resolution::Resolved(value) => value,
            Resolution::Aborted => return Ok(Resolution::Aborted),
            Resolution::OpenConfiguration => return Ok(Resolution::OpenConfiguration),
        }
    };
}

// ============================================================================
// Events
// ============================================================================

#[derive(Debug, Clone)]
pub struct DidChangeActiveDebugSessionEvent {
    pub previous: Option<Arc<DebugSession>>,
    pub current: Option<Arc<DebugSession>>,
}

/// A non-standard event sent by an adapter
#[derive(Debug, Clone)]
pub struct DebugSessionCustomEvent {
    pub session: Arc<DebugSession>,
    pub event: String,
    pub body: Option<Value>,
}

#[derive(Debug, Clone)]
pub struct DidChangeBreakpointsEvent {
    /// `None` when the breakpoint source itself changed
    pub session: Option<Arc<DebugSession>>,
    pub uri: String,
}

/// Collaborators of the session manager
#[derive(Clone)]
pub struct SessionPorts {
    pub debug: DebugServiceRef,
    pub variables: VariableResolverRef,
    pub tasks: TaskServiceRef,
    pub messages: MessageServiceRef,
    pub editor: EditorServiceRef,
    pub breakpoints: BreakpointSourceRef,
}

/// Options on their way to a session
enum PendingStart {
    Unresolved(DebugConfigurationSessionOptions),
    /// Restarts skip resolution
    Resolved(InternalDebugSessionOptions),
}

impl PendingStart {
    fn configuration(&self) -> &DebugConfiguration {
        match self {
            PendingStart::Unresolved(options) => &options.configuration,
            PendingStart::Resolved(options) => options.configuration(),
        }
    }
}

enum TaskEnded {
    Exited(Option<i32>),
    Background(bool),
}

// ============================================================================
// Manager
// ============================================================================

pub struct DebugSessionManager {
    ports: SessionPorts,
    configurations: Arc<DebugConfigurationManager>,
    settings: DebugSessionSettings,
    sessions: Mutex<Vec<Arc<DebugSession>>>,
    current: Mutex<Option<Arc<DebugSession>>>,
    current_subscriptions: Mutex<Disposables>,
    session_subscriptions: Mutex<HashMap<String, Disposables>>,
    /// Last disambiguation id per (name, workspace root)
    configuration_ids: Mutex<HashMap<String, u32>>,
    on_will_start: Emitter<WaitUntilEvent<()>>,
    on_will_resolve: Emitter<WaitUntilEvent<String>>,
    on_did_create: Emitter<Arc<DebugSession>>,
    on_did_start: Emitter<Arc<DebugSession>>,
    on_did_stop: Emitter<Arc<DebugSession>>,
    on_did_destroy: Emitter<Arc<DebugSession>>,
    on_did_change_active: Emitter<DidChangeActiveDebugSessionEvent>,
    on_did_receive_custom_event: Emitter<DebugSessionCustomEvent>,
    on_did_change: Emitter<Option<Arc<DebugSession>>>,
    on_did_change_breakpoints: Emitter<DidChangeBreakpointsEvent>,
    on_did_focus_stack_frame: Emitter<StackFrame>,
    on_did_focus_thread: Emitter<DebugThread>,
    weak_self: Weak<Self>,
}

impl std::fmt::Debug for DebugSessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DebugSessionManager")
            .field("sessions", &self.sessions_guard().len())
            .field("current", &self.current_session().map(|s| s.id().to_string()))
            .finish_non_exhaustive()
    }
}

impl DebugSessionManager {
    pub fn new(
        ports: SessionPorts,
        configurations: Arc<DebugConfigurationManager>,
        settings: DebugSessionSettings,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak_self| Self {
            ports,
            configurations,
            settings,
            sessions: Mutex::new(Vec::new()),
            current: Mutex::new(None),
            current_subscriptions: Mutex::new(Disposables::new()),
            session_subscriptions: Mutex::new(HashMap::new()),
            configuration_ids: Mutex::new(HashMap::new()),
            on_will_start: Emitter::new(),
            on_will_resolve: Emitter::new(),
            on_did_create: Emitter::new(),
            on_did_start: Emitter::new(),
            on_did_stop: Emitter::new(),
            on_did_destroy: Emitter::new(),
            on_did_change_active: Emitter::new(),
            on_did_receive_custom_event: Emitter::new(),
            on_did_change: Emitter::new(),
            on_did_change_breakpoints: Emitter::new(),
            on_did_focus_stack_frame: Emitter::new(),
            on_did_focus_thread: Emitter::new(),
            weak_self: weak_self.clone(),
        })
    }

    fn sessions_guard(&self) -> MutexGuard<'_, Vec<Arc<DebugSession>>> {
        self.sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn current_guard(&self) -> MutexGuard<'_, Option<Arc<DebugSession>>> {
        self.current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn configurations(&self) -> &Arc<DebugConfigurationManager> {
        &self.configurations
    }

    // ========================================================================
    // Events
    // ========================================================================

    /// Fired before resolution starts; listeners may delay the start with
    /// [`WaitUntilEvent::wait_until`]
    pub fn on_will_start_debug_session<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&WaitUntilEvent<()>) + Send + Sync + 'static,
    {
        self.on_will_start.on(listener)
    }

    /// Fired with the debug type before the first resolver pass
    pub fn on_will_resolve_debug_configuration<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&WaitUntilEvent<String>) + Send + Sync + 'static,
    {
        self.on_will_resolve.on(listener)
    }

    pub fn on_did_create_debug_session<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&Arc<DebugSession>) + Send + Sync + 'static,
    {
        self.on_did_create.on(listener)
    }

    pub fn on_did_start_debug_session<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&Arc<DebugSession>) + Send + Sync + 'static,
    {
        self.on_did_start.on(listener)
    }

    /// Fired when a session transitions into [`DebugState::Stopped`]
    pub fn on_did_stop_debug_session<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&Arc<DebugSession>) + Send + Sync + 'static,
    {
        self.on_did_stop.on(listener)
    }

    pub fn on_did_destroy_debug_session<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&Arc<DebugSession>) + Send + Sync + 'static,
    {
        self.on_did_destroy.on(listener)
    }

    pub fn on_did_change_active_debug_session<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&DidChangeActiveDebugSessionEvent) + Send + Sync + 'static,
    {
        self.on_did_change_active.on(listener)
    }

    pub fn on_did_receive_debug_session_custom_event<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&DebugSessionCustomEvent) + Send + Sync + 'static,
    {
        self.on_did_receive_custom_event.on(listener)
    }

    /// Fired with the current session whenever it or its state changes
    pub fn on_did_change<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&Option<Arc<DebugSession>>) + Send + Sync + 'static,
    {
        self.on_did_change.on(listener)
    }

    pub fn on_did_change_breakpoints<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&DidChangeBreakpointsEvent) + Send + Sync + 'static,
    {
        self.on_did_change_breakpoints.on(listener)
    }

    pub fn on_did_focus_stack_frame<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&StackFrame) + Send + Sync + 'static,
    {
        self.on_did_focus_stack_frame.on(listener)
    }

    pub fn on_did_focus_thread<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&DebugThread) + Send + Sync + 'static,
    {
        self.on_did_focus_thread.on(listener)
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Sessions that have not become inactive
    pub fn sessions(&self) -> Vec<Arc<DebugSession>> {
        self.sessions_guard()
            .iter()
            .filter(|session| session.state() > DebugState::Inactive)
            .cloned()
            .collect()
    }

    pub fn get_session(&self, session_id: &str) -> Option<Arc<DebugSession>> {
        self.sessions_guard()
            .iter()
            .find(|session| session.id() == session_id)
            .cloned()
    }

    pub fn current_session(&self) -> Option<Arc<DebugSession>> {
        self.current_guard().clone()
    }

    pub fn current_thread(&self) -> Option<DebugThread> {
        self.current_session()?.current_thread()
    }

    pub fn current_frame(&self) -> Option<StackFrame> {
        self.current_thread()?.current_frame().cloned()
    }

    pub fn top_frame(&self) -> Option<StackFrame> {
        self.current_thread()?.top_frame().cloned()
    }

    /// State of the current session, `Inactive` without one
    pub fn state(&self) -> DebugState {
        self.current_session()
            .map(|session| session.state())
            .unwrap_or(DebugState::Inactive)
    }

    pub fn in_debug_mode(&self) -> bool {
        self.state() > DebugState::Inactive
    }

    /// Whether the current frame is located in `uri`
    pub fn is_current_editor_frame(&self, uri: &str) -> bool {
        self.current_frame()
            .and_then(|frame| frame.source)
            .and_then(|source| source.path)
            .is_some_and(|path| path_to_uri(&path) == uri)
    }

    // ========================================================================
    // Start
    // ========================================================================

    /// Start a configuration or a compound.
    ///
    /// Returns whether everything requested was started.
    #[tracing::instrument(skip_all, fields(name = %options.name()))]
    pub async fn start(&self, options: DebugSessionOptions) -> Result<bool> {
        match options {
            DebugSessionOptions::Configuration(options) => {
                Ok(self.start_configuration(options).await?.is_some())
            }
            DebugSessionOptions::Compound(options) => self.start_compound(options).await,
        }
    }

    /// Start one configuration.
    ///
    /// `Ok(None)` means the start was abandoned without an error: a resolver
    /// aborted, the launch file was opened instead, a task gate declined or
    /// the debug type is not supported.
    pub async fn start_configuration(
        &self,
        options: DebugConfigurationSessionOptions,
    ) -> Result<Option<Arc<DebugSession>>> {
        self.start_pending(PendingStart::Unresolved(options)).await
    }

    async fn start_pending(&self, pending: PendingStart) -> Result<Option<Arc<DebugSession>>> {
        match self.try_start(pending).await {
            Ok(session) => Ok(session),
            Err(e @ Error::DebuggerNotSupported(_)) => {
                warn!("{}", e);
                self.ports.messages.error(&e.to_string(), &[]).await;
                Ok(None)
            }
            Err(e) => {
                error!("Error starting the debug session: {}", e);
                self.ports.messages.error(START_FAILED, &[]).await;
                Err(e)
            }
        }
    }

    async fn try_start(&self, pending: PendingStart) -> Result<Option<Arc<DebugSession>>> {
        if !self.save_before_start(pending.configuration()).await {
            return Ok(None);
        }
        fire_wait_until(&self.on_will_start, ()).await;

        let resolution = match pending {
            PendingStart::Resolved(options) => Resolution::Resolved(options),
            PendingStart::Unresolved(options) => self.resolve_configuration(options).await?,
        };
        let options = match resolution {
            Resolution::Resolved(options) => options,
            Resolution::Aborted => {
                debug!("Configuration resolution aborted the start");
                return Ok(None);
            }
            Resolution::OpenConfiguration => {
                self.configurations.open_configuration().await?;
                return Ok(None);
            }
        };

        // Restarts skip the pre-launch task like they skip the post-debug task
        if !options.configuration().is_restart() {
            let ready = self
                .run_task(
                    options.workspace_folder_uri(),
                    options.configuration().pre_launch_task.as_ref(),
                    true,
                )
                .await?;
            if !ready {
                return Ok(None);
            }
        }

        let session_id = self
            .ports
            .debug
            .create_debug_session(options.configuration(), options.workspace_folder_uri())
            .await?;
        self.do_start(session_id, options).await.map(Some)
    }

    /// Returns `false` when saving failed and the start should not proceed
    async fn save_before_start(&self, configuration: &DebugConfiguration) -> bool {
        if configuration.suppress_save_before_start() || configuration.parent_session_id.is_some() {
            return true;
        }
        let result = match self.settings.save_before_start {
            SaveBeforeStart::All => self.ports.editor.save_all(true).await,
            SaveBeforeStart::NonUntitled => self.ports.editor.save_all(false).await,
            SaveBeforeStart::None => Ok(()),
        };
        match result {
            Ok(()) => true,
            Err(e) => {
                warn!("Saving before start failed: {}", e);
                false
            }
        }
    }

    async fn resolve_configuration(
        &self,
        options: DebugConfigurationSessionOptions,
    ) -> Result<Resolution<InternalDebugSessionOptions>> {
        let root = options.workspace_folder_uri.clone();
        let debug = &self.ports.debug;

        fire_wait_until(&self.on_will_resolve, options.configuration.debug_type.clone()).await;
        let configuration = resolved!(
            debug
                .resolve_debug_configuration(options.configuration.clone(), root.as_deref())
                .await?
        );

        let command_id_variables = debug
            .provide_debugger_variables(&configuration.debug_type)
            .await?;
        let resolve_options = VariableResolveOptions {
            workspace_folder_uri: root.clone(),
            configuration_section: Some("launch".to_string()),
            command_id_variables,
        };
        let Some(value) = self
            .ports
            .variables
            .resolve(configuration.to_value()?, &resolve_options)
            .await?
        else {
            return Ok(Resolution::Aborted);
        };
        let configuration = DebugConfiguration::from_value(&value).ok_or_else(|| {
            Error::InvalidConfig(format!(
                "'{}' is not a launch configuration after variable substitution",
                options.name
            ))
        })?;

        let configuration = resolved!(
            debug
                .resolve_debug_configuration_with_substituted_variables(
                    configuration,
                    root.as_deref()
                )
                .await?
        );

        let id = self.next_configuration_id(&configuration.name, root.as_deref());
        Ok(Resolution::Resolved(InternalDebugSessionOptions {
            id,
            options: DebugConfigurationSessionOptions {
                configuration,
                ..options
            },
        }))
    }

    /// 0 for the first start of a (name, root) pair, then one more each time
    fn next_configuration_id(&self, name: &str, workspace_folder_uri: Option<&str>) -> u32 {
        let key = format!("{}|{}", name, workspace_folder_uri.unwrap_or_default());
        let mut ids = self
            .configuration_ids
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let id = ids.get(&key).map_or(0, |id| id + 1);
        ids.insert(key, id);
        id
    }

    async fn do_start(
        &self,
        session_id: String,
        options: InternalDebugSessionOptions,
    ) -> Result<Arc<DebugSession>> {
        let parent = options
            .configuration()
            .parent_session_id
            .as_deref()
            .and_then(|id| self.get_session(id));
        let channel = self.ports.debug.open_channel(&session_id).await?;
        let connection =
            DebugSessionConnection::new(session_id.clone(), channel, self.settings.request_timeout);
        let services = SessionServices {
            editor: self.ports.editor.clone(),
            breakpoints: self.ports.breakpoints.clone(),
            messages: self.ports.messages.clone(),
        };
        let session = DebugSession::new(
            session_id,
            options,
            parent,
            connection,
            services,
            self.settings.clone(),
        );
        info!(session_id = %session.id(), name = %session.name(), "Created debug session");

        self.sessions_guard().push(session.clone());
        self.on_did_create.fire(&session);
        self.wire(&session);

        let manager = self.weak_self.clone();
        let starting = session.clone();
        tokio::spawn(async move {
            match starting.start().await {
                Ok(()) => {
                    if let Some(manager) = manager.upgrade() {
                        manager.on_did_start.fire(&starting);
                    }
                }
                Err(e) => {
                    warn!(session_id = %starting.id(), "Debug session failed to start: {}", e);
                    if let Some(manager) = manager.upgrade() {
                        let callback = manager.terminate_callback(starting.id());
                        starting.clone().stop(false, callback).await;
                    }
                }
            }
        });
        Ok(session)
    }

    /// Subscribe the manager to one session's lifecycle
    fn wire(&self, session: &Arc<DebugSession>) {
        let mut subscriptions = Disposables::new();
        let target = Arc::downgrade(session);

        let manager = self.weak_self.clone();
        let source = target.clone();
        let last_state = Mutex::new(DebugState::Inactive);
        subscriptions.push(session.on_did_change(move |_| {
            let (Some(manager), Some(session)) = (manager.upgrade(), source.upgrade()) else {
                return;
            };
            let state = session.state();
            let entered_stopped = {
                let mut last = last_state
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
                let changed = *last != state;
                *last = state;
                changed && state == DebugState::Stopped
            };
            if entered_stopped {
                manager.on_did_stop.fire(&session);
            }
            manager.update_current_session(Some(session));
        }));

        let manager = self.weak_self.clone();
        let source = target.clone();
        subscriptions.push(session.on_did_change_breakpoints(move |uri| {
            if let Some(manager) = manager.upgrade() {
                manager
                    .on_did_change_breakpoints
                    .fire(&DidChangeBreakpointsEvent {
                        session: source.upgrade(),
                        uri: uri.clone(),
                    });
            }
        }));

        let manager = self.weak_self.clone();
        let source = target.clone();
        self.push_listener(&mut subscriptions, session, EventKind::Terminated, move |event| {
            let (Some(manager), Some(session)) = (manager.upgrade(), source.upgrade()) else {
                return;
            };
            let body: TerminatedEventBody = event
                .body
                .clone()
                .and_then(|body| serde_json::from_value(body).ok())
                .unwrap_or_default();
            tokio::spawn(async move {
                match body.restart {
                    // Auto restarts skip the post-debug task
                    Some(restart) => {
                        if let Err(e) = manager.do_restart(session, restart).await {
                            warn!("Restart requested by the adapter failed: {}", e);
                        }
                    }
                    None => manager.session_terminated(session).await,
                }
            });
        });

        let manager = self.weak_self.clone();
        let session_id = session.id().to_string();
        self.push_listener(&mut subscriptions, session, EventKind::Exited, move |_| {
            if let Some(manager) = manager.upgrade() {
                manager.destroy(&session_id);
            }
        });

        let manager = self.weak_self.clone();
        let source = target;
        match session.on_custom_event(move |event| {
            let (Some(manager), Some(session)) = (manager.upgrade(), source.upgrade()) else {
                return;
            };
            manager
                .on_did_receive_custom_event
                .fire(&DebugSessionCustomEvent {
                    session,
                    event: event.event.clone(),
                    body: event.body.clone(),
                });
        }) {
            Ok(subscription) => subscriptions.push(subscription),
            Err(e) => warn!(session_id = %session.id(), "Failed to subscribe: {}", e),
        }

        self.session_subscriptions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(session.id().to_string(), subscriptions);
    }

    fn push_listener<F>(
        &self,
        subscriptions: &mut Disposables,
        session: &DebugSession,
        kind: EventKind,
        listener: F,
    ) where
        F: Fn(&dapctl_dap::Event) + Send + Sync + 'static,
    {
        match session.on(kind, listener) {
            Ok(subscription) => subscriptions.push(subscription),
            Err(e) => warn!(session_id = %session.id(), "Failed to subscribe: {}", e),
        }
    }

    /// The adapter ended the debuggee without asking for a restart
    async fn session_terminated(&self, session: Arc<DebugSession>) {
        let callback = self.terminate_callback(session.id());
        // A session stopped by a restart keeps its compound and skips the post-debug task
        if session.is_restarting() {
            debug!(session_id = %session.id(), "Terminated for restart");
            session.disconnect(true, callback).await;
            return;
        }
        if let Some(root) = session.options().compound_root() {
            root.stop_session();
        }
        session.disconnect(false, callback).await;
        let post_debug_task = session.configuration().post_debug_task.clone();
        if let Err(e) = self
            .run_task(
                session.options().workspace_folder_uri(),
                post_debug_task.as_ref(),
                false,
            )
            .await
        {
            warn!(session_id = %session.id(), "Post-debug task failed: {}", e);
        }
    }

    /// Tells the debug service to release the session's adapter
    fn terminate_callback(&self, session_id: &str) -> StopCallback {
        let debug = self.ports.debug.clone();
        let session_id = session_id.to_string();
        Box::new(move || {
            tokio::spawn(async move {
                if let Err(e) = debug.terminate_debug_session(&session_id).await {
                    debug!(%session_id, "terminate_debug_session failed: {}", e);
                }
            });
        })
    }

    // ========================================================================
    // Compounds
    // ========================================================================

    /// Start every member of a compound concurrently.
    ///
    /// Returns `true` when all members started. A member that fails does not
    /// stop its siblings from starting.
    #[tracing::instrument(skip_all, fields(compound = %options.name))]
    pub async fn start_compound(&self, options: DebugCompoundSessionOptions) -> Result<bool> {
        let members = match self.expand_compound(&options) {
            Ok(members) => members,
            Err(e) => {
                warn!("{}", e);
                self.ports.messages.error(&e.to_string(), &[]).await;
                return Err(e);
            }
        };

        let ready = match self
            .run_task(
                options.workspace_folder_uri.as_deref(),
                options.compound.pre_launch_task.as_ref(),
                true,
            )
            .await
        {
            Ok(ready) => ready,
            Err(e) => {
                error!("Error starting the compound: {}", e);
                self.ports.messages.error(START_FAILED, &[]).await;
                return Err(e);
            }
        };
        if !ready {
            return Ok(false);
        }

        let results = join_all(
            members
                .into_iter()
                .map(|member| self.start_configuration(member)),
        )
        .await;
        Ok(results
            .into_iter()
            .all(|result| matches!(result, Ok(Some(_)))))
    }

    fn expand_compound(
        &self,
        options: &DebugCompoundSessionOptions,
    ) -> Result<Vec<DebugConfigurationSessionOptions>> {
        let compound = &options.compound;
        let Some(members) = &compound.configurations else {
            return Err(Error::CompoundWithoutConfigurations(compound.name.clone()));
        };
        let root = compound
            .stop_all()
            .then(|| Arc::new(DebugCompoundRoot::new()));

        members
            .iter()
            .map(|member| {
                let mut resolved = self.configurations.resolve_compound_member(
                    compound,
                    member,
                    options.workspace_folder_uri.as_deref(),
                )?;
                if let Some(no_debug) = options.no_debug {
                    resolved.configuration.no_debug = Some(no_debug);
                }
                resolved.compound_root = root.clone();
                Ok(resolved)
            })
            .collect()
    }

    // ========================================================================
    // Terminate and restart
    // ========================================================================

    /// Terminate `session`, or the current one.
    ///
    /// Members of a `stopAll` compound stop the whole compound. Sessions whose
    /// lifecycle is managed by their parent terminate the parent.
    #[tracing::instrument(skip_all)]
    pub async fn terminate_session(&self, session: Option<Arc<DebugSession>>) {
        let Some(mut session) = session.or_else(|| self.current_session()) else {
            return;
        };
        loop {
            if let Some(root) = session.options().compound_root() {
                if !root.is_stopped() {
                    info!(session_id = %session.id(), "Stopping compound");
                    root.stop_session();
                    return;
                }
            }
            match session.parent() {
                Some(parent) if session.configuration().lifecycle_managed_by_parent() => {
                    session = parent.clone();
                }
                _ => break,
            }
        }
        let callback = self.terminate_callback(session.id());
        session.stop(false, callback).await;
    }

    /// Restart `session`, or the current one, walking up to the parent when
    /// the lifecycle is managed by it.
    ///
    /// Returns the restarted session: the same one for an in-place restart,
    /// a new one otherwise.
    #[tracing::instrument(skip_all)]
    pub async fn restart_session(
        &self,
        session: Option<Arc<DebugSession>>,
    ) -> Result<Option<Arc<DebugSession>>> {
        let Some(mut session) = session.or_else(|| self.current_session()) else {
            return Ok(None);
        };
        while session.configuration().lifecycle_managed_by_parent() {
            match session.parent() {
                Some(parent) => session = parent.clone(),
                None => break,
            }
        }
        self.do_restart(session, Value::Bool(true)).await
    }

    async fn do_restart(
        &self,
        session: Arc<DebugSession>,
        restart: Value,
    ) -> Result<Option<Arc<DebugSession>>> {
        if session.restart().await? {
            return Ok(Some(session));
        }
        session.mark_restarting();
        let callback = self.terminate_callback(session.id());
        session.clone().stop(true, callback).await;

        let mut options = session.options().clone();
        options.options.configuration.restart = Some(restart);
        self.start_pending(PendingStart::Resolved(options)).await
    }

    // ========================================================================
    // Teardown
    // ========================================================================

    /// Forget a session once its adapter is gone. Later calls are no-ops.
    pub fn destroy(&self, session_id: &str) {
        let session = {
            let mut sessions = self.sessions_guard();
            let Some(index) = sessions.iter().position(|s| s.id() == session_id) else {
                return;
            };
            sessions.remove(index)
        };
        let subscriptions = self
            .session_subscriptions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(session_id);
        drop(subscriptions);

        (self.terminate_callback(session_id))();
        session.dispose();
        info!(session_id, "Destroyed debug session");

        let was_current = self
            .current_session()
            .is_some_and(|current| Arc::ptr_eq(&current, &session));
        if was_current {
            self.update_current_session(None);
        }
        self.on_did_destroy.fire(&session);
    }

    /// Destroy every session
    pub fn destroy_all(&self) {
        let ids: Vec<String> = self
            .sessions_guard()
            .iter()
            .map(|session| session.id().to_string())
            .collect();
        for id in ids {
            self.destroy(&id);
        }
    }

    // ========================================================================
    // Current session
    // ========================================================================

    /// Make `session` current, or fall back to the first live session
    pub fn update_current_session(&self, session: Option<Arc<DebugSession>>) {
        let next = session.or_else(|| self.sessions().into_iter().next());
        self.set_current_session(next);
    }

    fn set_current_session(&self, current: Option<Arc<DebugSession>>) {
        let previous = {
            let mut guard = self.current_guard();
            let unchanged = match (guard.as_ref(), current.as_ref()) {
                (Some(a), Some(b)) => Arc::ptr_eq(a, b),
                (None, None) => true,
                _ => false,
            };
            if unchanged {
                return;
            }
            std::mem::replace(&mut *guard, current.clone())
        };
        let stale = std::mem::take(
            &mut *self
                .current_subscriptions
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
        );
        drop(stale);

        self.on_did_change_active
            .fire(&DidChangeActiveDebugSessionEvent {
                previous: previous.clone(),
                current: current.clone(),
            });
        if let Some(session) = &current {
            self.follow(session);
        }
        self.fire_breakpoint_changes(previous.as_ref(), current.as_ref());
        self.open();
        self.on_did_change.fire(&current);
    }

    /// Subscribe to the events of the current session
    fn follow(&self, session: &Arc<DebugSession>) {
        let mut subscriptions = Disposables::new();

        let manager = self.weak_self.clone();
        let source = Arc::downgrade(session);
        subscriptions.push(session.on_did_change(move |_| {
            if let Some(manager) = manager.upgrade() {
                manager.on_did_change.fire(&source.upgrade());
            }
        }));

        let manager = self.weak_self.clone();
        subscriptions.push(session.on_did_focus_frame(move |frame| {
            if let Some(manager) = manager.upgrade() {
                manager.open_frame(frame);
                manager.on_did_focus_stack_frame.fire(frame);
            }
        }));

        let manager = self.weak_self.clone();
        subscriptions.push(session.on_did_focus_thread(move |thread| {
            if let Some(manager) = manager.upgrade() {
                manager.on_did_focus_thread.fire(thread);
            }
        }));

        *self
            .current_subscriptions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = subscriptions;
    }

    /// Breakpoints shown for the URIs of both sessions may have changed
    fn fire_breakpoint_changes(
        &self,
        previous: Option<&Arc<DebugSession>>,
        current: Option<&Arc<DebugSession>>,
    ) {
        let uris: BTreeSet<String> = [previous, current]
            .into_iter()
            .flatten()
            .flat_map(|session| session.breakpoint_uris())
            .collect();
        for uri in uris {
            self.on_did_change_breakpoints
                .fire(&DidChangeBreakpointsEvent {
                    session: current.cloned(),
                    uri,
                });
        }
    }

    /// Reveal the current frame when the current thread is stopped
    fn open(&self) {
        let Some(thread) = self.current_thread() else {
            return;
        };
        if !thread.is_stopped() {
            return;
        }
        if let Some(frame) = thread.current_frame() {
            self.open_frame(frame);
        }
    }

    fn open_frame(&self, frame: &StackFrame) {
        let Some(path) = frame.source.as_ref().and_then(|source| source.path.as_deref()) else {
            return;
        };
        let uri = path_to_uri(path);
        let (line, column) = (frame.line, frame.column);
        let editor = self.ports.editor.clone();
        tokio::spawn(async move {
            if let Err(e) = editor.open(&uri, Some(line), Some(column)).await {
                debug!(%uri, "Failed to open frame source: {}", e);
            }
        });
    }

    // ========================================================================
    // Breakpoints
    // ========================================================================

    /// The breakpoints of `uri` changed in the breakpoint source: notify
    /// listeners and resend them to every initialized session
    pub async fn breakpoints_changed(&self, uri: &str) {
        self.on_did_change_breakpoints
            .fire(&DidChangeBreakpointsEvent {
                session: None,
                uri: uri.to_string(),
            });
        let sessions: Vec<Arc<DebugSession>> = self
            .sessions_guard()
            .iter()
            .filter(|session| session.is_initialized())
            .cloned()
            .collect();
        for session in sessions {
            session.update_breakpoints(Some(uri), true).await;
        }
    }

    // ========================================================================
    // Tasks
    // ========================================================================

    /// Run `task` and decide whether the start it gates may proceed.
    ///
    /// Without a task the answer is `true`. With `check_errors` unset the task
    /// is only started. Otherwise the task must exit with code 0 or become
    /// active as a background task; any other outcome asks the user.
    pub async fn run_task(
        &self,
        workspace_folder_uri: Option<&str>,
        task: Option<&TaskRef>,
        check_errors: bool,
    ) -> Result<bool> {
        let Some(task) = task else {
            return Ok(true);
        };
        let tasks = &self.ports.tasks;
        let info = tasks.run_task(workspace_folder_uri, task).await?;
        if !check_errors {
            return Ok(true);
        }
        let Some(info) = info else {
            return self
                .post_task_action(
                    &format!("Could not run the task '{task}'."),
                    workspace_folder_uri,
                    task,
                )
                .await;
        };

        let ended = tokio::select! {
            code = tasks.get_exit_code(info.task_id) => TaskEnded::Exited(code),
            active = tasks.is_background_task_ended(info.task_id) => TaskEnded::Background(active),
        };
        let message = match ended {
            TaskEnded::Background(true) | TaskEnded::Exited(Some(0)) => return Ok(true),
            TaskEnded::Exited(Some(code)) => {
                format!("Task '{task}' terminated with exit code {code}.")
            }
            TaskEnded::Exited(None) | TaskEnded::Background(false) => {
                match tasks.get_terminate_signal(info.task_id).await {
                    Some(signal) => format!("Task '{task}' terminated by signal {signal}."),
                    None => format!("Task '{task}' terminated for unknown reason."),
                }
            }
        };
        self.post_task_action(&message, workspace_folder_uri, task)
            .await
    }

    /// Ask the user how to go on after a failed task. Only "Debug Anyway"
    /// proceeds.
    async fn post_task_action(
        &self,
        message: &str,
        workspace_folder_uri: Option<&str>,
        task: &TaskRef,
    ) -> Result<bool> {
        warn!("{}", message);
        let choice = self
            .ports
            .messages
            .error(message, &TASK_FAILURE_ACTIONS)
            .await;
        match choice.as_deref() {
            Some(OPEN_LAUNCH_JSON) => {
                self.configurations.open_configuration().await?;
                Ok(false)
            }
            Some(CONFIGURE_TASK) => {
                self.ports
                    .tasks
                    .configure(workspace_folder_uri, task)
                    .await?;
                Ok(false)
            }
            Some(DEBUG_ANYWAY) => Ok(true),
            _ => Ok(false),
        }
    }
}
