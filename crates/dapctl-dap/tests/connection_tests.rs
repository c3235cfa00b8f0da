//! DebugSessionConnection Tests
//!
//! These tests drive a connection through an in-memory channel, with the test
//! playing the adapter side. They cover:
//! - Request/response correlation and failure shapes
//! - Timeouts and closure
//! - Synthesized `continued` and `exited` events
//! - Custom events and reverse requests
//!
//! Run with: cargo test --package dapctl-dap --test connection_tests

use dapctl_dap::{
    memory_channel, Command, DebugSessionConnection, Error, Event, EventKind, MemoryPeer,
    ProtocolMessage, Request, Response, CLOSED_MESSAGE,
};
use proptest::prelude::*;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;

// ============================================================================
// Helpers
// ============================================================================

fn open() -> (Arc<DebugSessionConnection>, MemoryPeer) {
    let (channel, peer) = memory_channel(64);
    let connection = DebugSessionConnection::new("5f0c2a9e-7d41-4c55", channel, None);
    (connection, peer)
}

async fn next_request(peer: &mut MemoryPeer) -> Request {
    match timeout(Duration::from_secs(1), peer.recv()).await {
        Ok(Some(ProtocolMessage::Request(request))) => request,
        other => panic!("expected a request, got {:?}", other),
    }
}

async fn next_response(peer: &mut MemoryPeer) -> Response {
    match timeout(Duration::from_secs(1), peer.recv()).await {
        Ok(Some(ProtocolMessage::Response(response))) => response,
        other => panic!("expected a response, got {:?}", other),
    }
}

async fn answer(peer: &MemoryPeer, request: &Request, body: Option<Value>) {
    let mut response = Response::success(100 + request.seq, request.seq, request.command.clone());
    response.body = body;
    peer.send(&ProtocolMessage::Response(response)).await.unwrap();
}

fn capture(
    connection: &DebugSessionConnection,
    kind: EventKind,
) -> (dapctl_core::Subscription, mpsc::UnboundedReceiver<Event>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let subscription = connection
        .on(kind, move |event| {
            let _ = tx.send(event.clone());
        })
        .unwrap();
    (subscription, rx)
}

async fn next_event(rx: &mut mpsc::UnboundedReceiver<Event>) -> Event {
    timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("event within timeout")
        .expect("emitter alive")
}

// ============================================================================
// Correlation
// ============================================================================

#[tokio::test]
async fn test_responses_routed_by_request_seq() {
    let (connection, mut peer) = open();

    let c = connection.clone();
    let first = tokio::spawn(async move { c.send_request(Command::Threads, Value::Null).await });
    let first_request = next_request(&mut peer).await;

    let c = connection.clone();
    let second = tokio::spawn(async move {
        c.send_request(Command::Evaluate, json!({"expression": "x"}))
            .await
    });
    let second_request = next_request(&mut peer).await;

    assert_eq!(first_request.seq, 1);
    assert_eq!(second_request.seq, 2);
    assert!(first_request.arguments.is_none());
    assert_eq!(connection.pending_count(), 2);

    // Answer out of order
    answer(&peer, &second_request, Some(json!({"result": "42"}))).await;
    answer(&peer, &first_request, Some(json!({"threads": []}))).await;

    let second = second.await.unwrap().unwrap();
    assert_eq!(second.request_seq, 2);
    assert_eq!(second.body.unwrap()["result"], "42");

    let first = first.await.unwrap().unwrap();
    assert_eq!(first.command, "threads");
    assert_eq!(connection.pending_count(), 0);
}

#[tokio::test]
async fn test_failure_response_rejects_with_adapter_message() {
    let (connection, mut peer) = open();

    let c = connection.clone();
    let pending = tokio::spawn(async move {
        c.send_request(Command::Launch, json!({"program": "missing.py"}))
            .await
    });
    let request = next_request(&mut peer).await;
    peer.send(&ProtocolMessage::Response(Response::error(
        9,
        request.seq,
        "launch",
        "program not found",
    )))
    .await
    .unwrap();

    let err = pending.await.unwrap().unwrap_err();
    assert!(matches!(err, Error::Rejected(_)));
    assert_eq!(err.to_string(), "program not found");
    assert_eq!(err.response().map(|r| r.request_seq), Some(request.seq));
}

#[tokio::test(start_paused = true)]
async fn test_request_times_out_and_late_response_is_ignored() {
    let (connection, mut peer) = open();

    let err = connection
        .send_request_with_timeout(Command::Threads, Value::Null, Some(Duration::from_millis(50)))
        .await
        .unwrap_err();
    assert!(err.is_timeout());
    assert_eq!(err.to_string(), "Request 'threads' timed out after 50ms");
    assert_eq!(connection.pending_count(), 0);

    let late = next_request(&mut peer).await;
    answer(&peer, &late, None).await;

    let c = connection.clone();
    let next = tokio::spawn(async move { c.send_request(Command::Threads, Value::Null).await });
    let request = next_request(&mut peer).await;
    assert_eq!(request.seq, late.seq + 1);
    answer(&peer, &request, Some(json!({"threads": [{"id": 1, "name": "main"}]}))).await;

    let response = next.await.unwrap().unwrap();
    assert_eq!(response.request_seq, request.seq);
}

#[tokio::test]
async fn test_default_timeout_applies_to_plain_requests() {
    let (channel, _peer) = memory_channel(8);
    let connection =
        DebugSessionConnection::new("short", channel, Some(Duration::from_millis(20)));

    let err = connection
        .send_request(Command::Threads, Value::Null)
        .await
        .unwrap_err();
    assert!(err.is_timeout());
}

// ============================================================================
// Closure and disposal
// ============================================================================

#[tokio::test]
async fn test_close_rejects_all_pending_and_fires_exited() {
    let (connection, mut peer) = open();
    let (_exited, mut exited_rx) = capture(&connection, EventKind::Exited);

    let mut pending = Vec::new();
    for command in [Command::Threads, Command::StackTrace] {
        let c = connection.clone();
        pending.push(tokio::spawn(async move {
            c.send_request(command, json!({"threadId": 1})).await
        }));
        next_request(&mut peer).await;
    }

    peer.close(Some(0), Some("adapter exited")).await.unwrap();

    for task in pending {
        let err = task.await.unwrap().unwrap_err();
        assert!(err.is_closed());
        assert_eq!(err.to_string(), CLOSED_MESSAGE);
    }

    let exited = next_event(&mut exited_rx).await;
    assert_eq!(exited.seq, -1);
    assert_eq!(exited.body_field("code"), Some(&json!(0)));
    assert_eq!(exited.body_field("reason"), Some(&json!("adapter exited")));
    assert!(connection.is_closed());
    assert_eq!(connection.pending_count(), 0);
}

#[tokio::test]
async fn test_send_after_close_fails_without_writing() {
    let (connection, mut peer) = open();
    let (_exited, mut exited_rx) = capture(&connection, EventKind::Exited);
    peer.close(None, None).await.unwrap();
    next_event(&mut exited_rx).await;

    let err = connection
        .send_request(Command::Threads, Value::Null)
        .await
        .unwrap_err();
    assert!(err.is_closed());

    let nothing = timeout(Duration::from_millis(20), peer.recv()).await;
    assert!(nothing.is_err(), "no frame should reach the adapter");
}

#[tokio::test]
async fn test_client_close_is_observed_like_adapter_close() {
    let (connection, _peer) = open();
    let (_exited, mut exited_rx) = capture(&connection, EventKind::Exited);

    connection.close().await.unwrap();

    let exited = next_event(&mut exited_rx).await;
    assert_eq!(exited.body_field("reason"), Some(&json!("closed by client")));
    assert!(connection.is_closed());
}

#[tokio::test]
async fn test_dispose_rejects_pending_and_refuses_subscriptions() {
    let (connection, mut peer) = open();

    let c = connection.clone();
    let pending = tokio::spawn(async move { c.send_request(Command::Threads, Value::Null).await });
    next_request(&mut peer).await;

    connection.dispose();

    assert!(pending.await.unwrap().unwrap_err().is_closed());
    assert!(connection.is_disposed());
    assert!(matches!(
        connection.on(EventKind::Stopped, |_| {}),
        Err(Error::Disposed(id)) if id == "5f0c2a9e-7d41-4c55"
    ));
    assert!(connection.on_custom_event(|_| {}).is_err());
    assert!(connection
        .send_request(Command::Threads, Value::Null)
        .await
        .unwrap_err()
        .is_closed());
}

// ============================================================================
// Synthesized continued events
// ============================================================================

#[tokio::test]
async fn test_step_commands_fire_continued_for_thread() {
    let (connection, mut peer) = open();
    let (_continued, mut continued_rx) = capture(&connection, EventKind::Continued);

    for command in [
        Command::Next,
        Command::StepIn,
        Command::StepOut,
        Command::StepBack,
        Command::ReverseContinue,
        Command::RestartFrame,
    ] {
        let c = connection.clone();
        let step = tokio::spawn(async move { c.send_request(command, json!({"threadId": 7})).await });
        let request = next_request(&mut peer).await;
        answer(&peer, &request, None).await;
        step.await.unwrap().unwrap();

        let event = next_event(&mut continued_rx).await;
        assert_eq!(event.seq, -1);
        assert_eq!(event.body_field("threadId"), Some(&json!(7)));
        assert_eq!(event.body_field("allThreadsContinued"), Some(&json!(false)));
    }
}

#[tokio::test]
async fn test_failed_step_fires_nothing() {
    let (connection, mut peer) = open();
    let (_continued, mut continued_rx) = capture(&connection, EventKind::Continued);

    let c = connection.clone();
    let step = tokio::spawn(async move { c.send_request(Command::Next, json!({"threadId": 1})).await });
    let request = next_request(&mut peer).await;
    peer.send(&ProtocolMessage::Response(Response::error(5, request.seq, "next", "busy")))
        .await
        .unwrap();

    assert!(step.await.unwrap().is_err());
    assert!(continued_rx.try_recv().is_err());
}

#[tokio::test]
async fn test_continue_tracks_all_threads_flag() {
    let (connection, mut peer) = open();
    let (_continued, mut continued_rx) = capture(&connection, EventKind::Continued);
    assert!(connection.all_threads_continued());

    // continue reporting a single thread
    let c = connection.clone();
    let task = tokio::spawn(async move { c.send_request(Command::Continue, json!({"threadId": 1})).await });
    let request = next_request(&mut peer).await;
    answer(&peer, &request, Some(json!({"allThreadsContinued": false}))).await;
    task.await.unwrap().unwrap();
    let event = next_event(&mut continued_rx).await;
    assert_eq!(event.body_field("allThreadsContinued"), Some(&json!(false)));
    assert!(!connection.all_threads_continued());

    // continue without the flag keeps the tracked value
    let c = connection.clone();
    let task = tokio::spawn(async move { c.send_request(Command::Continue, json!({"threadId": 1})).await });
    let request = next_request(&mut peer).await;
    answer(&peer, &request, None).await;
    task.await.unwrap().unwrap();
    let event = next_event(&mut continued_rx).await;
    assert_eq!(event.body_field("allThreadsContinued"), Some(&json!(false)));

    // a raw continued event without the flag resets it to true
    peer.send(&ProtocolMessage::Event(
        Event::new(40, "continued").with_body(json!({"threadId": 2})),
    ))
    .await
    .unwrap();
    let raw = next_event(&mut continued_rx).await;
    assert_eq!(raw.seq, 40);
    assert!(connection.all_threads_continued());

    let c = connection.clone();
    let task = tokio::spawn(async move { c.send_request(Command::Continue, json!({"threadId": 3})).await });
    let request = next_request(&mut peer).await;
    answer(&peer, &request, None).await;
    task.await.unwrap().unwrap();
    let event = next_event(&mut continued_rx).await;
    assert_eq!(event.body_field("threadId"), Some(&json!(3)));
    assert_eq!(event.body_field("allThreadsContinued"), Some(&json!(true)));
}

#[tokio::test]
async fn test_custom_request_has_no_side_effects() {
    let (connection, mut peer) = open();
    let (_continued, mut continued_rx) = capture(&connection, EventKind::Continued);

    let c = connection.clone();
    let task = tokio::spawn(async move {
        c.send_custom_request("next", Some(json!({"threadId": 1})))
            .await
    });
    let request = next_request(&mut peer).await;
    assert_eq!(request.command, "next");
    answer(&peer, &request, None).await;
    task.await.unwrap().unwrap();

    // Flush the pump with one more event before checking
    peer.send(&ProtocolMessage::Event(Event::new(1, "continued").with_body(json!({"threadId": 9}))))
        .await
        .unwrap();
    let event = next_event(&mut continued_rx).await;
    assert_eq!(event.body_field("threadId"), Some(&json!(9)));
}

// ============================================================================
// Events
// ============================================================================

#[tokio::test]
async fn test_events_fan_out_by_kind() {
    let (connection, peer) = open();
    let (_stopped, mut stopped_rx) = capture(&connection, EventKind::Stopped);
    let (_output, mut output_rx) = capture(&connection, EventKind::Output);

    peer.send(&ProtocolMessage::Event(
        Event::new(1, "output").with_body(json!({"output": "hello\n"})),
    ))
    .await
    .unwrap();
    peer.send(&ProtocolMessage::Event(
        Event::new(2, "stopped").with_body(json!({"reason": "breakpoint", "threadId": 1})),
    ))
    .await
    .unwrap();

    assert_eq!(next_event(&mut output_rx).await.seq, 1);
    assert_eq!(next_event(&mut stopped_rx).await.seq, 2);
    assert!(output_rx.try_recv().is_err());
}

#[tokio::test]
async fn test_custom_events_go_to_custom_emitter() {
    let (connection, peer) = open();
    let (tx, mut all_custom) = mpsc::unbounded_channel();
    let _all = connection
        .on_custom_event(move |event| {
            let _ = tx.send(event.event.clone());
        })
        .unwrap();
    let (_named, mut named_rx) =
        capture(&connection, EventKind::Custom("vendor/progress".to_string()));

    for (seq, name) in [(1, "vendor/status"), (2, "output"), (3, "vendor/progress")] {
        peer.send(&ProtocolMessage::Event(Event::new(seq, name)))
            .await
            .unwrap();
    }

    let named = next_event(&mut named_rx).await;
    assert_eq!(named.event, "vendor/progress");

    let mut seen = Vec::new();
    while let Ok(name) = all_custom.try_recv() {
        seen.push(name);
    }
    assert_eq!(seen, vec!["vendor/status", "vendor/progress"]);
}

#[tokio::test]
async fn test_invalid_frames_are_skipped() {
    let (connection, peer) = open();
    let (_stopped, mut stopped_rx) = capture(&connection, EventKind::Stopped);

    peer.send_raw("{not json").await.unwrap();
    peer.error("transient read error").await.unwrap();
    peer.send(&ProtocolMessage::Event(
        Event::new(3, "stopped").with_body(json!({"reason": "pause"})),
    ))
    .await
    .unwrap();

    assert_eq!(next_event(&mut stopped_rx).await.seq, 3);
    assert!(!connection.is_closed());
}

// ============================================================================
// Reverse requests
// ============================================================================

#[tokio::test]
async fn test_reverse_request_answered_with_handler_body() {
    let (connection, mut peer) = open();
    connection.on_request("runInTerminal", |request: Request| async move {
        assert_eq!(request.arguments.unwrap()["cwd"], "/tmp");
        Ok(Some(json!({"processId": 42})))
    });

    peer.send(&ProtocolMessage::Request(
        Request::new(5, "runInTerminal").with_arguments(json!({"cwd": "/tmp", "args": ["ls"]})),
    ))
    .await
    .unwrap();

    let response = next_response(&mut peer).await;
    assert_eq!(response.request_seq, 5);
    assert_eq!(response.command, "runInTerminal");
    assert!(response.success);
    assert_eq!(response.body.unwrap()["processId"], 42);
    assert!(response.seq >= 1);
}

#[tokio::test]
async fn test_reverse_request_handler_failure_is_reported() {
    let (connection, mut peer) = open();
    connection.on_request("startDebugging", |_request: Request| async move {
        Err::<Option<Value>, String>("child sessions are disabled".to_string())
    });

    peer.send(&ProtocolMessage::Request(Request::new(6, "startDebugging")))
        .await
        .unwrap();

    let response = next_response(&mut peer).await;
    assert!(!response.success);
    assert_eq!(response.message.as_deref(), Some("child sessions are disabled"));
}

#[tokio::test]
async fn test_unhandled_reverse_request_still_answered() {
    let (_connection, mut peer) = open();

    peer.send(&ProtocolMessage::Request(Request::new(7, "vendor/ask")))
        .await
        .unwrap();

    let response = next_response(&mut peer).await;
    assert_eq!(response.request_seq, 7);
    assert!(response.success);
    assert!(response.body.is_none());
}

// ============================================================================
// Properties
// ============================================================================

fn arb_answer_order() -> impl Strategy<Value = Vec<usize>> {
    (1usize..12).prop_flat_map(|n| Just((0..n).collect::<Vec<_>>()).prop_shuffle())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Property: sequence numbers are unique and every response reaches the
    /// request it answers, whatever order the adapter answers in
    #[test]
    fn proptest_responses_match_requests(order in arb_answer_order()) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let (connection, mut peer) = open();

            let mut tasks = Vec::new();
            let mut requests = Vec::new();
            for i in 0..order.len() {
                let c = connection.clone();
                tasks.push(tokio::spawn(async move {
                    c.send_request(Command::Evaluate, json!({"expression": i})).await
                }));
                requests.push(next_request(&mut peer).await);
            }

            let seqs: HashSet<i64> = requests.iter().map(|r| r.seq).collect();
            prop_assert_eq!(seqs.len(), requests.len());

            for index in &order {
                let request = &requests[*index];
                let echo = request.arguments.clone().unwrap()["expression"].clone();
                answer(&peer, request, Some(json!({"result": echo}))).await;
            }

            for (i, task) in tasks.into_iter().enumerate() {
                let response = task.await.unwrap().unwrap();
                prop_assert_eq!(response.body.unwrap()["result"].as_u64(), Some(i as u64));
            }
            prop_assert_eq!(connection.pending_count(), 0);
            Ok(())
        })?;
    }
}
