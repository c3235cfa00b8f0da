//! DAP (Debug Adapter Protocol) message types
//!
//! Based on <https://microsoft.github.io/debug-adapter-protocol/specification>
//!
//! Every message is a JSON object with a `seq` and a `type` discriminator:
//! ```text
//! {"seq":1,"type":"request","command":"initialize","arguments":{"adapterID":"python"}}
//! ```
//! On a byte stream each message is preceded by a `Content-Length` header
//! (see [`crate::channel`]).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

// ============================================================
// BASE PROTOCOL MESSAGE
// ============================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProtocolMessage {
    Request(Request),
    Response(Response),
    Event(Event),
}

impl ProtocolMessage {
    pub fn seq(&self) -> i64 {
        match self {
            ProtocolMessage::Request(r) => r.seq,
            ProtocolMessage::Response(r) => r.seq,
            ProtocolMessage::Event(e) => e.seq,
        }
    }
}

// ============================================================
// REQUEST
// ============================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub seq: i64,
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Value>,
}

impl Request {
    pub fn new(seq: i64, command: impl Into<String>) -> Self {
        Self {
            seq,
            command: command.into(),
            arguments: None,
        }
    }

    pub fn with_arguments(mut self, arguments: Value) -> Self {
        self.arguments = Some(arguments);
        self
    }
}

// ============================================================
// RESPONSE
// ============================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub seq: i64,
    /// Sequence number of the request this answers
    pub request_seq: i64,
    pub command: String,
    pub success: bool,
    /// Error text when `success` is false
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

impl Response {
    pub fn success(seq: i64, request_seq: i64, command: impl Into<String>) -> Self {
        Self {
            seq,
            request_seq,
            command: command.into(),
            success: true,
            message: None,
            body: None,
        }
    }

    pub fn error(
        seq: i64,
        request_seq: i64,
        command: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            seq,
            request_seq,
            command: command.into(),
            success: false,
            message: Some(message.into()),
            body: None,
        }
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Deserialize the body, treating a missing body as `null`
    pub fn body_as<T: serde::de::DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_value(self.body.clone().unwrap_or(Value::Null))
    }
}

// ============================================================
// EVENT
// ============================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub seq: i64,
    pub event: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

impl Event {
    pub fn new(seq: i64, event: impl Into<String>) -> Self {
        Self {
            seq,
            event: event.into(),
            body: None,
        }
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn kind(&self) -> EventKind {
        EventKind::from(self.event.as_str())
    }

    /// Look up a top-level body field
    pub fn body_field(&self, key: &str) -> Option<&Value> {
        self.body.as_ref().and_then(|body| body.get(key))
    }
}

// ============================================================
// VOCABULARIES
// ============================================================

/// Declares a closed wire vocabulary with a `Custom` fallback for
/// adapter-specific names.
macro_rules! wire_vocabulary {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $wire:literal,)* }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant,)*
            Custom(String),
        }

        impl $name {
            pub fn as_str(&self) -> &str {
                match self {
                    $($name::$variant => $wire,)*
                    $name::Custom(name) => name,
                }
            }

            /// Part of the standard vocabulary
            pub fn is_standard(&self) -> bool {
                !matches!(self, $name::Custom(_))
            }
        }

        impl From<&str> for $name {
            fn from(name: &str) -> Self {
                match name {
                    $($wire => $name::$variant,)*
                    other => $name::Custom(other.to_string()),
                }
            }
        }

        impl From<String> for $name {
            fn from(name: String) -> Self {
                $name::from(name.as_str())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

wire_vocabulary! {
    /// Requests a client sends to an adapter
    Command {
        Attach => "attach",
        BreakpointLocations => "breakpointLocations",
        Cancel => "cancel",
        Completions => "completions",
        ConfigurationDone => "configurationDone",
        Continue => "continue",
        DataBreakpointInfo => "dataBreakpointInfo",
        Disassemble => "disassemble",
        Disconnect => "disconnect",
        Evaluate => "evaluate",
        ExceptionInfo => "exceptionInfo",
        Goto => "goto",
        GotoTargets => "gotoTargets",
        Initialize => "initialize",
        Launch => "launch",
        LoadedSources => "loadedSources",
        Modules => "modules",
        Next => "next",
        Pause => "pause",
        ReadMemory => "readMemory",
        Restart => "restart",
        RestartFrame => "restartFrame",
        ReverseContinue => "reverseContinue",
        Scopes => "scopes",
        SetBreakpoints => "setBreakpoints",
        SetDataBreakpoints => "setDataBreakpoints",
        SetExceptionBreakpoints => "setExceptionBreakpoints",
        SetExpression => "setExpression",
        SetFunctionBreakpoints => "setFunctionBreakpoints",
        SetInstructionBreakpoints => "setInstructionBreakpoints",
        SetVariable => "setVariable",
        Source => "source",
        StackTrace => "stackTrace",
        StepBack => "stepBack",
        StepIn => "stepIn",
        StepInTargets => "stepInTargets",
        StepOut => "stepOut",
        Terminate => "terminate",
        TerminateThreads => "terminateThreads",
        Threads => "threads",
        Variables => "variables",
        WriteMemory => "writeMemory",
    }
}

impl Command {
    /// Commands after which adapters are not required to send `continued`
    pub fn is_step_like(&self) -> bool {
        matches!(
            self,
            Command::Next
                | Command::StepIn
                | Command::StepOut
                | Command::StepBack
                | Command::ReverseContinue
                | Command::RestartFrame
        )
    }
}

wire_vocabulary! {
    /// Events an adapter sends to a client
    EventKind {
        Breakpoint => "breakpoint",
        Capabilities => "capabilities",
        Continued => "continued",
        Exited => "exited",
        Initialized => "initialized",
        Invalidated => "invalidated",
        LoadedSource => "loadedSource",
        Memory => "memory",
        Module => "module",
        Output => "output",
        Process => "process",
        ProgressEnd => "progressEnd",
        ProgressStart => "progressStart",
        ProgressUpdate => "progressUpdate",
        Stopped => "stopped",
        Terminated => "terminated",
        Thread => "thread",
    }
}

/// Reverse request: run a command in a terminal
pub const RUN_IN_TERMINAL: &str = "runInTerminal";

/// Reverse request: start a child session
pub const START_DEBUGGING: &str = "startDebugging";

// ============================================================
// INITIALIZE
// ============================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeRequestArguments {
    #[serde(rename = "clientID", skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_name: Option<String>,
    /// Debug type of the configuration being started
    #[serde(rename = "adapterID")]
    pub adapter_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lines_start_at1: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub columns_start_at1: Option<bool>,
    /// "path" or "uri"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path_format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supports_variable_type: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supports_variable_paging: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supports_run_in_terminal_request: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supports_start_debugging_request: Option<bool>,
}

/// Capabilities from the `initialize` response or a `capabilities` event.
///
/// Unlisted capabilities are kept in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capabilities {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supports_configuration_done_request: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supports_terminate_request: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supports_restart_request: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub support_terminate_debuggee: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supports_delayed_stack_trace_loading: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supports_conditional_breakpoints: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supports_hit_conditional_breakpoints: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supports_log_points: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supports_function_breakpoints: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supports_step_back: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Capabilities {
    /// Overlay the capabilities present in `other`
    pub fn merge(&mut self, other: Capabilities) {
        macro_rules! overlay {
            ($($field:ident),*) => {
                $(if other.$field.is_some() {
                    self.$field = other.$field;
                })*
            };
        }
        overlay!(
            supports_configuration_done_request,
            supports_terminate_request,
            supports_restart_request,
            support_terminate_debuggee,
            supports_delayed_stack_trace_loading,
            supports_conditional_breakpoints,
            supports_hit_conditional_breakpoints,
            supports_log_points,
            supports_function_breakpoints,
            supports_step_back
        );
        self.extra.extend(other.extra);
    }
}

// ============================================================
// BREAKPOINTS
// ============================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetBreakpointsArguments {
    pub source: Source,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breakpoints: Option<Vec<SourceBreakpoint>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_modified: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Non-zero for sources only the adapter can provide
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_reference: Option<i64>,
}

impl Source {
    pub fn from_path(path: impl Into<String>) -> Self {
        let path = path.into();
        let name = std::path::Path::new(&path)
            .file_name()
            .and_then(|name| name.to_str())
            .map(str::to_string);
        Self {
            name,
            path: Some(path),
            source_reference: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceBreakpoint {
    pub line: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hit_condition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_message: Option<String>,
}

impl SourceBreakpoint {
    pub fn at_line(line: u32) -> Self {
        Self {
            line,
            column: None,
            condition: None,
            hit_condition: None,
            log_message: None,
        }
    }

    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Breakpoint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub verified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<Source>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetBreakpointsResponseBody {
    #[serde(default)]
    pub breakpoints: Vec<Breakpoint>,
}

// ============================================================
// THREADS AND STACK FRAMES
// ============================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thread {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadsResponseBody {
    #[serde(default)]
    pub threads: Vec<Thread>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackTraceArguments {
    pub thread_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_frame: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub levels: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackFrame {
    pub id: i64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<Source>,
    pub line: u32,
    pub column: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackTraceResponseBody {
    #[serde(default)]
    pub stack_frames: Vec<StackFrame>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_frames: Option<u32>,
}

// ============================================================
// EVENT BODIES
// ============================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoppedEventBody {
    /// "breakpoint", "step", "exception", ...
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preserve_focus_hint: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub all_threads_stopped: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContinuedEventBody {
    /// Absent on synthesized events for requests without a thread
    #[serde(default)]
    pub thread_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub all_threads_continued: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadEventBody {
    /// "started" or "exited"
    pub reason: String,
    pub thread_id: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TerminatedEventBody {
    /// Adapter asks for a restart; the value is passed back as `__restart`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restart: Option<Value>,
}

/// Body of the `exited` event synthesized when the channel closes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitedEventBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputEventBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub output: String,
}

// ============================================================
// LIFECYCLE REQUESTS
// ============================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisconnectArguments {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restart: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terminate_debuggee: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminateArguments {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restart: Option<bool>,
}

// ============================================================
// REVERSE REQUESTS
// ============================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunInTerminalRequestArguments {
    /// "integrated" or "external"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub cwd: String,
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunInTerminalResponseBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process_id: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shell_process_id: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_serialization() {
        let msg = ProtocolMessage::Request(
            Request::new(1, "initialize").with_arguments(json!({"adapterID": "python"})),
        );
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains(r#""type":"request""#));
        assert!(json.contains(r#""command":"initialize""#));
        assert_eq!(serde_json::from_str::<ProtocolMessage>(&json).unwrap(), msg);
    }

    #[test]
    fn test_response_without_body_parses() {
        let raw = r#"{"seq":4,"type":"response","request_seq":2,"command":"next","success":true}"#;
        match serde_json::from_str::<ProtocolMessage>(raw).unwrap() {
            ProtocolMessage::Response(response) => {
                assert_eq!(response.request_seq, 2);
                assert!(response.body.is_none());
            }
            other => panic!("expected response, got {:?}", other),
        }
    }

    #[test]
    fn test_command_vocabulary() {
        assert_eq!(Command::from("stepIn"), Command::StepIn);
        assert!(Command::StepIn.is_step_like());
        assert!(Command::RestartFrame.is_step_like());
        assert!(!Command::Continue.is_step_like());
        assert_eq!(Command::ConfigurationDone.as_str(), "configurationDone");

        let custom = Command::from("vendor/launchBrowser");
        assert!(!custom.is_standard());
        assert_eq!(custom.to_string(), "vendor/launchBrowser");
    }

    #[test]
    fn test_event_vocabulary() {
        assert!(EventKind::from("loadedSource").is_standard());
        assert!(EventKind::from("progressUpdate").is_standard());
        assert_eq!(EventKind::from("rust-analyzer/status"), EventKind::Custom("rust-analyzer/status".into()));
        assert_eq!(Event::new(1, "stopped").kind(), EventKind::Stopped);
    }

    #[test]
    fn test_initialize_arguments_use_dap_casing() {
        let args = InitializeRequestArguments {
            client_id: Some("dapctl".into()),
            client_name: Some("dapctl".into()),
            adapter_id: "python".into(),
            locale: Some("en-US".into()),
            lines_start_at1: Some(true),
            columns_start_at1: Some(true),
            path_format: Some("path".into()),
            supports_variable_type: None,
            supports_variable_paging: None,
            supports_run_in_terminal_request: Some(true),
            supports_start_debugging_request: None,
        };
        let value = serde_json::to_value(&args).unwrap();
        assert_eq!(value["clientID"], "dapctl");
        assert_eq!(value["adapterID"], "python");
        assert_eq!(value["linesStartAt1"], true);
        assert_eq!(value["supportsRunInTerminalRequest"], true);
        assert!(value.get("supportsStartDebuggingRequest").is_none());
    }

    #[test]
    fn test_capabilities_merge_overlays_present_fields() {
        let mut caps: Capabilities = serde_json::from_value(json!({
            "supportsConfigurationDoneRequest": true,
            "supportsTerminateRequest": false,
            "exceptionBreakpointFilters": []
        }))
        .unwrap();
        let update: Capabilities = serde_json::from_value(json!({
            "supportsTerminateRequest": true,
            "supportsRestartRequest": true
        }))
        .unwrap();
        caps.merge(update);
        assert_eq!(caps.supports_configuration_done_request, Some(true));
        assert_eq!(caps.supports_terminate_request, Some(true));
        assert_eq!(caps.supports_restart_request, Some(true));
        assert!(caps.extra.contains_key("exceptionBreakpointFilters"));
    }

    #[test]
    fn test_source_from_path_sets_name() {
        let source = Source::from_path("/work/app/main.py");
        assert_eq!(source.name.as_deref(), Some("main.py"));
        assert_eq!(source.path.as_deref(), Some("/work/app/main.py"));
    }

    #[test]
    fn test_response_body_as() {
        let response = Response::success(2, 1, "threads")
            .with_body(json!({"threads": [{"id": 1, "name": "main"}]}));
        let body: ThreadsResponseBody = response.body_as().unwrap();
        assert_eq!(body.threads[0].name, "main");

        let empty = Response::success(3, 2, "threads");
        let body: Option<ThreadsResponseBody> = empty.body_as().unwrap();
        assert!(body.is_none());
    }
}
