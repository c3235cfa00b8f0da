//! Scripted in-memory debug adapter
//!
//! [`ScriptedAdapter`] sits on the adapter side of a
//! [`dapctl_dap::memory_channel`] and answers requests the way a well behaved
//! adapter would:
//!
//! - `initialize` returns the scripted capabilities
//! - `launch` / `attach` succeed and are followed by an `initialized` event
//! - `setBreakpoints` verifies every requested line
//! - `threads` / `stackTrace` return the scripted threads and frames
//! - `terminate` is followed by a `terminated` event
//! - `disconnect` closes the channel
//! - anything else succeeds without a body
//!
//! Per-command overrides come from [`AdapterScript::reply`]. Tests can also push
//! events and reverse requests, or close the channel, at any time.

use dapctl_dap::{
    memory_channel, Channel, Event, MemoryPeer, ProtocolMessage, Request, Response, StackFrame,
    Thread,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tracing::debug;

const CHANNEL_CAPACITY: usize = 64;

/// How the adapter answers one command
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptedReply {
    /// `success: true` with an optional body
    Success(Option<Value>),
    /// `success: false` with this message
    Failure(String),
    /// Never answer
    Ignore,
}

/// Behavior of a [`ScriptedAdapter`]
#[derive(Debug, Clone)]
pub struct AdapterScript {
    capabilities: Value,
    replies: HashMap<String, ScriptedReply>,
    threads: Vec<Thread>,
    frames: Vec<StackFrame>,
    initialized_after_launch: bool,
    terminated_after_terminate: bool,
    close_on_disconnect: bool,
}

impl Default for AdapterScript {
    fn default() -> Self {
        Self {
            capabilities: json!({"supportsConfigurationDoneRequest": true}),
            replies: HashMap::new(),
            threads: vec![Thread {
                id: 1,
                name: "main".to_string(),
            }],
            frames: Vec::new(),
            initialized_after_launch: true,
            terminated_after_terminate: true,
            close_on_disconnect: true,
        }
    }
}

impl AdapterScript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Capabilities returned from `initialize`
    pub fn with_capabilities(mut self, capabilities: Value) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Override the answer to `command`
    pub fn reply(mut self, command: &str, reply: ScriptedReply) -> Self {
        self.replies.insert(command.to_string(), reply);
        self
    }

    /// Answer `command` with `success: false`
    pub fn fail(self, command: &str, message: &str) -> Self {
        self.reply(command, ScriptedReply::Failure(message.to_string()))
    }

    /// Never answer `command`
    pub fn ignore(self, command: &str) -> Self {
        self.reply(command, ScriptedReply::Ignore)
    }

    pub fn with_threads(mut self, threads: Vec<Thread>) -> Self {
        self.threads = threads;
        self
    }

    /// Frames returned from `stackTrace`, for every thread
    pub fn with_frames(mut self, frames: Vec<StackFrame>) -> Self {
        self.frames = frames;
        self
    }

    /// Do not send `initialized` after `launch` / `attach`
    pub fn without_initialized(mut self) -> Self {
        self.initialized_after_launch = false;
        self
    }

    /// Do not send `terminated` after `terminate`
    pub fn without_terminated(mut self) -> Self {
        self.terminated_after_terminate = false;
        self
    }

    /// Keep the channel open after `disconnect`
    pub fn keep_open_on_disconnect(mut self) -> Self {
        self.close_on_disconnect = false;
        self
    }

    fn default_reply(&self, request: &Request) -> ScriptedReply {
        let arguments = request.arguments.clone().unwrap_or(Value::Null);
        match request.command.as_str() {
            "initialize" => ScriptedReply::Success(Some(self.capabilities.clone())),
            "setBreakpoints" => {
                let breakpoints: Vec<Value> = arguments["breakpoints"]
                    .as_array()
                    .map(|requested| {
                        requested
                            .iter()
                            .enumerate()
                            .map(|(index, bp)| {
                                json!({"id": index + 1, "verified": true, "line": bp["line"]})
                            })
                            .collect()
                    })
                    .unwrap_or_default();
                ScriptedReply::Success(Some(json!({ "breakpoints": breakpoints })))
            }
            "threads" => ScriptedReply::Success(Some(json!({ "threads": self.threads }))),
            "stackTrace" => {
                let start = arguments["startFrame"].as_u64().unwrap_or(0) as usize;
                let levels = arguments["levels"]
                    .as_u64()
                    .map(|levels| levels as usize)
                    .unwrap_or(self.frames.len());
                let frames: Vec<&StackFrame> =
                    self.frames.iter().skip(start).take(levels).collect();
                ScriptedReply::Success(Some(
                    json!({"stackFrames": frames, "totalFrames": self.frames.len()}),
                ))
            }
            _ => ScriptedReply::Success(None),
        }
    }
}

enum Control {
    Event(String, Option<Value>),
    Request(String, Option<Value>),
    Close(Option<i32>),
}

#[derive(Default)]
struct Recorded {
    requests: Mutex<Vec<Request>>,
    responses: Mutex<Vec<Response>>,
    notify: Notify,
}

/// Handle to a running scripted adapter
pub struct ScriptedAdapter {
    recorded: Arc<Recorded>,
    control: mpsc::UnboundedSender<Control>,
    closed: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl std::fmt::Debug for ScriptedAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedAdapter")
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl ScriptedAdapter {
    /// Create a memory channel and serve its adapter side
    pub fn start(script: AdapterScript) -> (Channel, Self) {
        let (channel, peer) = memory_channel(CHANNEL_CAPACITY);
        (channel, Self::serve(peer, script))
    }

    /// Serve an existing peer
    pub fn serve(peer: MemoryPeer, script: AdapterScript) -> Self {
        let recorded = Arc::new(Recorded::default());
        let closed = Arc::new(AtomicBool::new(false));
        let (control, control_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(peer, script, recorded.clone(), closed.clone(), control_rx));
        Self {
            recorded,
            control,
            closed,
            task,
        }
    }

    /// Every request received so far, in arrival order
    pub fn requests(&self) -> Vec<Request> {
        self.recorded.requests.lock().unwrap().clone()
    }

    pub fn commands(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.command).collect()
    }

    pub fn requests_for(&self, command: &str) -> Vec<Request> {
        self.requests()
            .into_iter()
            .filter(|r| r.command == command)
            .collect()
    }

    /// Responses the client sent to reverse requests
    pub fn responses(&self) -> Vec<Response> {
        self.recorded.responses.lock().unwrap().clone()
    }

    /// Wait until `command` has been received, up to `timeout`
    pub async fn wait_for_request(&self, command: &str, timeout: Duration) -> Option<Request> {
        let wait = async {
            loop {
                let notified = self.recorded.notify.notified();
                if let Some(request) = self.requests_for(command).into_iter().next() {
                    return request;
                }
                notified.await;
            }
        };
        tokio::time::timeout(timeout, wait).await.ok()
    }

    /// Wait until a response to a reverse request arrived, up to `timeout`
    pub async fn wait_for_response(&self, command: &str, timeout: Duration) -> Option<Response> {
        let wait = async {
            loop {
                let notified = self.recorded.notify.notified();
                if let Some(response) = self.responses().into_iter().find(|r| r.command == command) {
                    return response;
                }
                notified.await;
            }
        };
        tokio::time::timeout(timeout, wait).await.ok()
    }

    /// Send an event to the client
    pub fn emit(&self, event: &str, body: Option<Value>) {
        let _ = self.control.send(Control::Event(event.to_string(), body));
    }

    /// Send a reverse request to the client
    pub fn send_request(&self, command: &str, arguments: Option<Value>) {
        let _ = self
            .control
            .send(Control::Request(command.to_string(), arguments));
    }

    /// Close the channel from the adapter side
    pub fn close(&self, code: Option<i32>) {
        let _ = self.control.send(Control::Close(code));
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Drop for ScriptedAdapter {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run(
    mut peer: MemoryPeer,
    script: AdapterScript,
    recorded: Arc<Recorded>,
    closed: Arc<AtomicBool>,
    mut control: mpsc::UnboundedReceiver<Control>,
) {
    let seq = AtomicI64::new(1);
    let next_seq = || seq.fetch_add(1, Ordering::SeqCst);

    loop {
        tokio::select! {
            message = peer.recv() => {
                let Some(message) = message else { break };
                match message {
                    ProtocolMessage::Request(request) => {
                        recorded.requests.lock().unwrap().push(request.clone());
                        recorded.notify.notify_waiters();
                        if !answer(&peer, &script, &request, &next_seq).await {
                            break;
                        }
                    }
                    ProtocolMessage::Response(response) => {
                        recorded.responses.lock().unwrap().push(response);
                        recorded.notify.notify_waiters();
                    }
                    ProtocolMessage::Event(event) => {
                        debug!("Scripted adapter ignores client event {}", event.event);
                    }
                }
            }
            Some(command) = control.recv() => match command {
                Control::Event(name, body) => {
                    let _ = send_event(&peer, &name, body, next_seq()).await;
                }
                Control::Request(command, arguments) => {
                    let mut request = Request::new(next_seq(), command);
                    request.arguments = arguments;
                    let _ = peer.send(&ProtocolMessage::Request(request)).await;
                }
                Control::Close(code) => {
                    let _ = peer.close(code, Some("closed by adapter")).await;
                    break;
                }
            },
        }
    }
    closed.store(true, Ordering::SeqCst);
}

/// Answer one request. Returns `false` once the channel was closed.
async fn answer(
    peer: &MemoryPeer,
    script: &AdapterScript,
    request: &Request,
    next_seq: &impl Fn() -> i64,
) -> bool {
    let reply = script
        .replies
        .get(&request.command)
        .cloned()
        .unwrap_or_else(|| script.default_reply(request));

    let succeeded = match reply {
        ScriptedReply::Ignore => return true,
        ScriptedReply::Success(body) => {
            let mut response = Response::success(next_seq(), request.seq, &request.command);
            response.body = body;
            let _ = peer.send(&ProtocolMessage::Response(response)).await;
            true
        }
        ScriptedReply::Failure(message) => {
            let response = Response::error(next_seq(), request.seq, &request.command, message);
            let _ = peer.send(&ProtocolMessage::Response(response)).await;
            false
        }
    };
    if !succeeded {
        return true;
    }

    match request.command.as_str() {
        "launch" | "attach" if script.initialized_after_launch => {
            let _ = send_event(peer, "initialized", None, next_seq()).await;
        }
        "terminate" if script.terminated_after_terminate => {
            let _ = send_event(peer, "terminated", None, next_seq()).await;
        }
        "disconnect" if script.close_on_disconnect => {
            let _ = peer.close(Some(0), Some("disconnected")).await;
            return false;
        }
        _ => {}
    }
    true
}

async fn send_event(
    peer: &MemoryPeer,
    name: &str,
    body: Option<Value>,
    seq: i64,
) -> dapctl_dap::Result<()> {
    let mut event = Event::new(seq, name);
    event.body = body;
    peer.send(&ProtocolMessage::Event(event)).await
}
