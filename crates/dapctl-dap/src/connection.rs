//! Debug session connection
//!
//! [`DebugSessionConnection`] owns one [`Channel`] and turns its frames into a
//! typed request/response/event API:
//!
//! - outgoing requests get increasing sequence numbers (starting at 1) and are
//!   matched to responses by `request_seq`, so responses may arrive out of order
//! - events are fanned out per kind to lazily created emitters; names outside the
//!   standard vocabulary go to a single custom-event emitter
//! - requests sent by the adapter are answered through registered handlers
//!
//! Closing the channel rejects every pending request and fires a synthesized
//! `exited` event. Requests issued after closure fail immediately without
//! touching the channel.

use crate::channel::{Channel, ChannelEvent, TransportChannelRef};
use crate::error::CLOSED_MESSAGE;
use crate::protocol::{
    Command, ContinuedEventBody, Event, EventKind, ExitedEventBody, ProtocolMessage, Request,
    Response,
};
use crate::{Error, Result};
use dapctl_core::{Emitter, Subscription};
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn, Span};

type ResponseSender = oneshot::Sender<Result<Response>>;

/// Outcome of a reverse-request handler: the response body, or the error
/// message sent back with `success: false`
pub type RequestHandlerResult = std::result::Result<Option<Value>, String>;

/// Handler for requests the adapter sends to the client
pub type RequestHandler =
    Arc<dyn Fn(Request) -> BoxFuture<'static, RequestHandlerResult> + Send + Sync>;

/// Sequence number of events synthesized by the client
const SYNTHESIZED_EVENT_SEQ: i64 = -1;

pub struct DebugSessionConnection {
    session_id: String,
    log_prefix: String,
    transport: TransportChannelRef,
    default_timeout: Option<Duration>,
    sequence: AtomicI64,
    pending_requests: DashMap<i64, ResponseSender>,
    request_handlers: DashMap<String, RequestHandler>,
    emitters: DashMap<EventKind, Emitter<Event>>,
    custom_emitter: Emitter<Event>,
    all_threads_continued: AtomicBool,
    closed: AtomicBool,
    disposed: AtomicBool,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for DebugSessionConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DebugSessionConnection")
            .field("session_id", &self.session_id)
            .field("pending", &self.pending_requests.len())
            .field("closed", &self.is_closed())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// Removes a pending entry when the waiting request finishes for any reason
/// (response, timeout, send failure or the caller dropping the future).
struct PendingGuard<'a> {
    pending: &'a DashMap<i64, ResponseSender>,
    seq: i64,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.pending.remove(&self.seq);
    }
}

impl DebugSessionConnection {
    /// Wrap `channel` and start dispatching its incoming frames.
    ///
    /// `default_timeout` applies to requests sent without an explicit timeout.
    /// Must be called from within a tokio runtime.
    pub fn new(
        session_id: impl Into<String>,
        channel: Channel,
        default_timeout: Option<Duration>,
    ) -> Arc<Self> {
        let session_id = session_id.into();
        let Channel { transport, events } = channel;

        let connection = Arc::new(Self {
            log_prefix: session_id.chars().take(8).collect(),
            session_id,
            transport,
            default_timeout,
            sequence: AtomicI64::new(1),
            pending_requests: DashMap::new(),
            request_handlers: DashMap::new(),
            emitters: DashMap::new(),
            custom_emitter: Emitter::new(),
            all_threads_continued: AtomicBool::new(true),
            closed: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
            pump: Mutex::new(None),
        });

        let pump = Self::spawn_pump(Arc::downgrade(&connection), events);
        *connection
            .pump
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(pump);

        debug!(session_id = %connection.session_id, "Debug session connection opened");
        connection
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// Whether the last `continue`/`continued` signal covered all threads
    pub fn all_threads_continued(&self) -> bool {
        self.all_threads_continued.load(Ordering::SeqCst)
    }

    /// Number of requests still waiting for a response
    pub fn pending_count(&self) -> usize {
        self.pending_requests.len()
    }

    fn next_sequence(&self) -> i64 {
        self.sequence.fetch_add(1, Ordering::SeqCst)
    }

    // ========================================================================
    // Requests
    // ========================================================================

    /// Send a request with the connection's default timeout
    pub async fn send_request(&self, command: Command, arguments: Value) -> Result<Response> {
        self.send_request_with_timeout(command, arguments, self.default_timeout)
            .await
    }

    /// Send a request and wait for its response.
    ///
    /// A `null` `arguments` value is omitted from the wire message. After a
    /// successful step-like command, or `continue`, a `continued` event is
    /// synthesized for the request's `threadId`.
    #[tracing::instrument(
        skip(self, arguments, timeout),
        fields(session_id = %self.session_id, seq)
    )]
    pub async fn send_request_with_timeout(
        &self,
        command: Command,
        arguments: Value,
        timeout: Option<Duration>,
    ) -> Result<Response> {
        let thread_id = arguments.get("threadId").and_then(Value::as_i64);
        let arguments = (!arguments.is_null()).then_some(arguments);

        let response = self
            .do_send_request(command.as_str(), arguments, timeout)
            .await?;
        self.after_request(&command, thread_id, &response);
        Ok(response)
    }

    /// Send an adapter-specific request. No events are synthesized.
    #[tracing::instrument(skip(self, arguments), fields(session_id = %self.session_id, seq))]
    pub async fn send_custom_request(
        &self,
        command: &str,
        arguments: Option<Value>,
    ) -> Result<Response> {
        self.do_send_request(command, arguments, self.default_timeout)
            .await
    }

    async fn do_send_request(
        &self,
        command: &str,
        arguments: Option<Value>,
        timeout: Option<Duration>,
    ) -> Result<Response> {
        let seq = self.next_sequence();
        Span::current().record("seq", seq);

        if self.is_closed() || self.is_disposed() {
            debug!(command, "Request rejected, connection is closed");
            return Err(closed_failure(seq, command));
        }

        let (tx, rx) = oneshot::channel();
        self.pending_requests.insert(seq, tx);
        let _guard = PendingGuard {
            pending: &self.pending_requests,
            seq,
        };

        // The close path may have drained the map between the check and the insert
        if self.is_closed() || self.is_disposed() {
            return Err(closed_failure(seq, command));
        }

        let request = ProtocolMessage::Request(Request {
            seq,
            command: command.to_string(),
            arguments,
        });
        self.send_message(&request).await?;

        let received = match timeout {
            Some(timeout) => match tokio::time::timeout(timeout, rx).await {
                Ok(received) => received,
                Err(_) => {
                    let ms = timeout.as_millis();
                    warn!(command, timeout_ms = ms as u64, "DAP request timed out");
                    return Err(Error::Timeout(Box::new(Response::error(
                        0,
                        seq,
                        command,
                        format!("Request '{}' timed out after {}ms", command, ms),
                    ))));
                }
            },
            None => rx.await,
        };

        match received {
            Ok(result) => result,
            // Sender dropped without an answer: the map was cleared
            Err(_) => Err(closed_failure(seq, command)),
        }
    }

    fn after_request(&self, command: &Command, thread_id: Option<i64>, response: &Response) {
        match command {
            Command::Continue => {
                let flag = response
                    .body
                    .as_ref()
                    .and_then(|body| body.get("allThreadsContinued"))
                    .and_then(Value::as_bool);
                if let Some(flag) = flag {
                    self.all_threads_continued.store(flag, Ordering::SeqCst);
                }
                self.fire_continued(thread_id, self.all_threads_continued());
            }
            command if command.is_step_like() => self.fire_continued(thread_id, false),
            _ => {}
        }
    }

    fn fire_continued(&self, thread_id: Option<i64>, all_threads_continued: bool) {
        let body = ContinuedEventBody {
            thread_id,
            all_threads_continued: Some(all_threads_continued),
        };
        match serde_json::to_value(body) {
            Ok(body) => {
                self.fire_event(&Event::new(SYNTHESIZED_EVENT_SEQ, "continued").with_body(body))
            }
            Err(e) => warn!("Failed to encode continued event: {}", e),
        }
    }

    async fn send_message(&self, message: &ProtocolMessage) -> Result<()> {
        let json = serde_json::to_string(message)?;
        trace!("[{}] dapctl -> adapter: {}", self.log_prefix, json);
        self.transport.send(json).await
    }

    // ========================================================================
    // Subscriptions
    // ========================================================================

    /// Subscribe to one kind of event.
    ///
    /// `EventKind::Custom(name)` subscribes to custom events with that name.
    pub fn on<F>(&self, kind: EventKind, listener: F) -> Result<Subscription>
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        if self.is_disposed() {
            return Err(Error::Disposed(self.session_id.clone()));
        }
        match kind {
            EventKind::Custom(name) => Ok(self.custom_emitter.on(move |event| {
                if event.event == name {
                    listener(event);
                }
            })),
            kind => {
                let emitter = self
                    .emitters
                    .entry(kind)
                    .or_insert_with(Emitter::new)
                    .value()
                    .clone();
                Ok(emitter.on(listener))
            }
        }
    }

    /// Subscribe to every event outside the standard vocabulary
    pub fn on_custom_event<F>(&self, listener: F) -> Result<Subscription>
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        if self.is_disposed() {
            return Err(Error::Disposed(self.session_id.clone()));
        }
        Ok(self.custom_emitter.on(listener))
    }

    /// Register the handler for a request the adapter may send.
    ///
    /// A later registration for the same command replaces the earlier one.
    pub fn on_request<F, Fut>(&self, command: impl Into<String>, handler: F)
    where
        F: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = RequestHandlerResult> + Send + 'static,
    {
        let handler: RequestHandler = Arc::new(move |request| handler(request).boxed());
        self.request_handlers.insert(command.into(), handler);
    }

    /// Deliver a locally produced event to subscribers as if the adapter had
    /// sent it.
    pub fn fire(&self, event: &Event) {
        self.fire_event(event);
    }

    // ========================================================================
    // Incoming frames
    // ========================================================================

    fn spawn_pump(
        connection: Weak<Self>,
        mut events: mpsc::Receiver<ChannelEvent>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                let Some(connection) = connection.upgrade() else {
                    return;
                };
                match event {
                    ChannelEvent::Message(raw) => connection.handle_message(&raw),
                    ChannelEvent::Error(message) => {
                        warn!(session_id = %connection.session_id, "Channel error: {}", message)
                    }
                    ChannelEvent::Closed { code, reason } => {
                        connection.handle_close(code, reason);
                        return;
                    }
                }
            }
            if let Some(connection) = connection.upgrade() {
                connection.handle_close(None, Some("channel dropped".to_string()));
            }
        })
    }

    fn handle_message(self: &Arc<Self>, raw: &str) {
        trace!("[{}] dapctl <- adapter: {}", self.log_prefix, raw);
        let message: ProtocolMessage = match serde_json::from_str(raw) {
            Ok(message) => message,
            Err(e) => {
                warn!(session_id = %self.session_id, "Ignoring invalid DAP message: {}", e);
                return;
            }
        };

        match message {
            ProtocolMessage::Response(response) => self.handle_response(response),
            ProtocolMessage::Event(event) => self.handle_event(event),
            ProtocolMessage::Request(request) => self.handle_request(request),
        }
    }

    fn handle_response(&self, response: Response) {
        let Some((_, tx)) = self.pending_requests.remove(&response.request_seq) else {
            debug!(
                request_seq = response.request_seq,
                "Dropping response for a request that is no longer pending"
            );
            return;
        };
        let result = if response.success {
            Ok(response)
        } else {
            Err(Error::Rejected(Box::new(response)))
        };
        if tx.send(result).is_err() {
            debug!("Response receiver dropped");
        }
    }

    fn handle_event(&self, event: Event) {
        if event.kind() == EventKind::Continued {
            let all = event
                .body_field("allThreadsContinued")
                .and_then(Value::as_bool)
                != Some(false);
            self.all_threads_continued.store(all, Ordering::SeqCst);
        }
        self.fire_event(&event);
    }

    fn fire_event(&self, event: &Event) {
        let kind = event.kind();
        if kind.is_standard() {
            // Clone out so listeners can subscribe without holding the shard lock
            let emitter = self.emitters.get(&kind).map(|entry| entry.value().clone());
            if let Some(emitter) = emitter {
                emitter.fire(event);
            }
        } else {
            self.custom_emitter.fire(event);
        }
    }

    fn handle_request(self: &Arc<Self>, request: Request) {
        let handler = self
            .request_handlers
            .get(&request.command)
            .map(|entry| entry.value().clone());
        let connection = self.clone();

        tokio::spawn(async move {
            let mut response = Response::success(0, request.seq, request.command.clone());
            match handler {
                Some(handler) => match handler(request).await {
                    Ok(body) => response.body = body,
                    Err(message) => {
                        response.success = false;
                        response.message = Some(message);
                    }
                },
                None => error!(
                    session_id = %connection.session_id,
                    "Unhandled request: {}",
                    request.command
                ),
            }
            response.seq = connection.next_sequence();
            if let Err(e) = connection
                .send_message(&ProtocolMessage::Response(response))
                .await
            {
                warn!(session_id = %connection.session_id, "Failed to answer reverse request: {}", e);
            }
        });
    }

    fn handle_close(&self, code: Option<i32>, reason: Option<String>) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        info!(
            session_id = %self.session_id,
            code = ?code,
            reason = reason.as_deref().unwrap_or(""),
            "Debug adapter channel closed"
        );
        self.reject_pending();

        match serde_json::to_value(ExitedEventBody { code, reason }) {
            Ok(body) => {
                self.fire_event(&Event::new(SYNTHESIZED_EVENT_SEQ, "exited").with_body(body))
            }
            Err(e) => warn!("Failed to encode exited event: {}", e),
        }
    }

    fn reject_pending(&self) {
        let seqs: Vec<i64> = self.pending_requests.iter().map(|entry| *entry.key()).collect();
        for seq in seqs {
            if let Some((_, tx)) = self.pending_requests.remove(&seq) {
                let _ = tx.send(Err(closed_failure(seq, "")));
            }
        }
    }

    // ========================================================================
    // Teardown
    // ========================================================================

    /// Close the underlying channel; the close itself is observed like an
    /// adapter-side close (pending requests rejected, `exited` fired).
    pub async fn close(&self) -> Result<()> {
        self.transport.close().await
    }

    /// Reject pending requests, drop every listener and handler, and close the
    /// channel in the background.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        debug!(session_id = %self.session_id, "Disposing debug session connection");
        self.reject_pending();

        let emitters: Vec<Emitter<Event>> = self
            .emitters
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        self.emitters.clear();
        for emitter in emitters {
            emitter.dispose();
        }
        self.custom_emitter.dispose();
        self.request_handlers.clear();

        if let Some(pump) = self
            .pump
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
        {
            pump.abort();
        }

        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let transport = self.transport.clone();
            let session_id = self.session_id.clone();
            handle.spawn(async move {
                if let Err(e) = transport.close().await {
                    debug!(session_id = %session_id, "Channel close failed: {}", e);
                }
            });
        }
    }
}

impl Drop for DebugSessionConnection {
    fn drop(&mut self) {
        if let Some(pump) = self
            .pump
            .get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
        {
            pump.abort();
        }
    }
}

fn closed_failure(seq: i64, command: &str) -> Error {
    Error::Closed(Box::new(Response::error(0, seq, command, CLOSED_MESSAGE)))
}
