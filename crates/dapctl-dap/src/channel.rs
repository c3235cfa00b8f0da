//! Transport channels
//!
//! A connection talks to its adapter through a [`TransportChannel`] (outgoing
//! frames) and a receiver of [`ChannelEvent`]s (incoming frames, errors and the
//! final close). One frame is one complete JSON message; framing on byte
//! streams is handled by [`StreamChannel`].

use crate::{Error, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::Child;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

/// Something that happened on the incoming side of a channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// One complete JSON message
    Message(String),
    /// A recoverable transport error; the channel stays open
    Error(String),
    /// The channel closed; nothing follows
    Closed {
        code: Option<i32>,
        reason: Option<String>,
    },
}

/// Outgoing half of a channel
#[async_trait]
pub trait TransportChannel: Send + Sync {
    /// Write one complete JSON message
    async fn send(&self, message: String) -> Result<()>;

    /// Close the channel. The incoming side reports `ChannelEvent::Closed`.
    async fn close(&self) -> Result<()>;
}

pub type TransportChannelRef = Arc<dyn TransportChannel>;

/// Both halves of an open channel
pub struct Channel {
    pub transport: TransportChannelRef,
    pub events: mpsc::Receiver<ChannelEvent>,
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel").finish_non_exhaustive()
    }
}

// ============================================================
// Content-Length framing
// ============================================================

/// Write one message with its `Content-Length` header
pub async fn write_message<W>(writer: &mut W, json: &str) -> Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let content = format!("Content-Length: {}\r\n\r\n{}", json.len(), json);
    writer.write_all(content.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one framed message. Returns `None` on a clean EOF.
pub async fn read_message<R>(reader: &mut BufReader<R>) -> Result<Option<String>>
where
    R: AsyncRead + Unpin,
{
    let mut content_length: Option<usize> = None;
    let mut line = String::new();

    loop {
        line.clear();
        let bytes_read = reader.read_line(&mut line).await?;
        if bytes_read == 0 {
            return Ok(None);
        }

        let line = line.trim();
        if line.is_empty() {
            if content_length.is_some() {
                break;
            }
            // Stray blank line between messages
            continue;
        }

        if let Some(length_str) = line.strip_prefix("Content-Length:") {
            let length_str = length_str.trim();
            content_length = Some(length_str.parse().map_err(|_| {
                Error::Protocol(format!("Invalid Content-Length: {}", length_str))
            })?);
        }
    }

    let length = content_length
        .ok_or_else(|| Error::Protocol("Missing Content-Length header".to_string()))?;

    let mut buffer = vec![0u8; length];
    reader.read_exact(&mut buffer).await?;
    Ok(Some(String::from_utf8(buffer)?))
}

// ============================================================
// StreamChannel
// ============================================================

/// Channel over a byte stream pair (adapter stdio or a TCP socket)
pub struct StreamChannel {
    writer: Mutex<Box<dyn AsyncWrite + Send + Unpin>>,
    reader_task: std::sync::Mutex<Option<JoinHandle<()>>>,
    child: Arc<Mutex<Option<Child>>>,
    events: mpsc::Sender<ChannelEvent>,
    closed: AtomicBool,
}

impl StreamChannel {
    /// Open a channel over `reader`/`writer`
    pub fn open<R, W>(reader: R, writer: W, capacity: usize) -> Channel
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self::open_inner(reader, writer, None, capacity)
    }

    /// Open a channel over an adapter process' stdio. The process is killed
    /// when the channel closes; its exit code becomes the close code.
    pub fn open_process<R, W>(reader: R, writer: W, child: Child, capacity: usize) -> Channel
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self::open_inner(reader, writer, Some(child), capacity)
    }

    fn open_inner<R, W>(reader: R, writer: W, child: Option<Child>, capacity: usize) -> Channel
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let child = Arc::new(Mutex::new(child));
        let reader_task = Self::spawn_reader_task(reader, tx.clone(), child.clone());

        let channel = Arc::new(Self {
            writer: Mutex::new(Box::new(writer)),
            reader_task: std::sync::Mutex::new(Some(reader_task)),
            child,
            events: tx,
            closed: AtomicBool::new(false),
        });

        Channel {
            transport: channel,
            events: rx,
        }
    }

    fn spawn_reader_task<R>(
        reader: R,
        events: mpsc::Sender<ChannelEvent>,
        child: Arc<Mutex<Option<Child>>>,
    ) -> JoinHandle<()>
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        tokio::spawn(async move {
            debug!("Reader task started");
            let mut buf_reader = BufReader::new(reader);

            let reason = loop {
                match read_message(&mut buf_reader).await {
                    Ok(Some(message)) => {
                        trace!("Received frame: {}", message);
                        if events.send(ChannelEvent::Message(message)).await.is_err() {
                            // Nobody listens anymore
                            return;
                        }
                    }
                    Ok(None) => {
                        info!("Adapter connection closed (EOF received)");
                        break "adapter closed the connection".to_string();
                    }
                    Err(e) => {
                        info!("Adapter connection error: {}", e);
                        let _ = events.send(ChannelEvent::Error(e.to_string())).await;
                        break e.to_string();
                    }
                }
            };

            let code = match child.lock().await.as_mut() {
                Some(process) => match process.try_wait() {
                    Ok(Some(status)) => status.code(),
                    _ => None,
                },
                None => None,
            };

            let _ = events
                .send(ChannelEvent::Closed {
                    code,
                    reason: Some(reason),
                })
                .await;
        })
    }
}

#[async_trait]
impl TransportChannel for StreamChannel {
    async fn send(&self, message: String) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::Communication("channel is closed".to_string()));
        }
        let mut writer = self.writer.lock().await;
        write_message(writer.as_mut(), &message).await
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let task = self
            .reader_task
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(task) = task {
            task.abort();
        }

        if let Err(e) = self.writer.lock().await.shutdown().await {
            debug!("Failed to shut down adapter stream: {}", e);
        }

        let mut code = None;
        if let Some(mut process) = self.child.lock().await.take() {
            if let Err(e) = process.start_kill() {
                debug!("Adapter process already gone: {}", e);
            }
            code = process.wait().await.ok().and_then(|status| status.code());
        }

        if self
            .events
            .try_send(ChannelEvent::Closed {
                code,
                reason: Some("closed by client".to_string()),
            })
            .is_err()
        {
            warn!("Could not deliver close notification; event buffer full or dropped");
        }
        Ok(())
    }
}

impl Drop for StreamChannel {
    fn drop(&mut self) {
        if let Some(task) = self
            .reader_task
            .get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
        {
            task.abort();
        }
    }
}

// ============================================================
// In-memory channel
// ============================================================

/// Create an in-memory channel and the adapter-side peer that drives it
pub fn memory_channel(capacity: usize) -> (Channel, MemoryPeer) {
    let (outgoing_tx, outgoing_rx) = mpsc::channel(capacity.max(1));
    let (events_tx, events_rx) = mpsc::channel(capacity.max(1));

    let transport = Arc::new(MemoryTransport {
        outgoing: outgoing_tx,
        events: events_tx.clone(),
        closed: AtomicBool::new(false),
    });
    let peer = MemoryPeer {
        received: outgoing_rx,
        events: events_tx,
    };

    (
        Channel {
            transport: transport.clone(),
            events: events_rx,
        },
        peer,
    )
}

struct MemoryTransport {
    outgoing: mpsc::Sender<String>,
    events: mpsc::Sender<ChannelEvent>,
    closed: AtomicBool,
}

#[async_trait]
impl TransportChannel for MemoryTransport {
    async fn send(&self, message: String) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::Communication("channel is closed".to_string()));
        }
        self.outgoing
            .send(message)
            .await
            .map_err(|_| Error::Communication("peer dropped".to_string()))
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let _ = self
            .events
            .send(ChannelEvent::Closed {
                code: None,
                reason: Some("closed by client".to_string()),
            })
            .await;
        Ok(())
    }
}

/// Adapter side of [`memory_channel`]
pub struct MemoryPeer {
    received: mpsc::Receiver<String>,
    events: mpsc::Sender<ChannelEvent>,
}

impl MemoryPeer {
    /// Next raw frame the client sent
    pub async fn recv_raw(&mut self) -> Option<String> {
        self.received.recv().await
    }

    /// Next message the client sent; unparsable frames are skipped
    pub async fn recv(&mut self) -> Option<crate::ProtocolMessage> {
        while let Some(raw) = self.received.recv().await {
            match serde_json::from_str(&raw) {
                Ok(message) => return Some(message),
                Err(e) => warn!("Peer received invalid frame: {}", e),
            }
        }
        None
    }

    /// Deliver a message to the client
    pub async fn send(&self, message: &crate::ProtocolMessage) -> Result<()> {
        let raw = serde_json::to_string(message)?;
        self.send_raw(raw).await
    }

    pub async fn send_raw(&self, raw: impl Into<String>) -> Result<()> {
        self.events
            .send(ChannelEvent::Message(raw.into()))
            .await
            .map_err(|_| Error::Communication("client dropped".to_string()))
    }

    /// Report a transport error to the client
    pub async fn error(&self, message: impl Into<String>) -> Result<()> {
        self.events
            .send(ChannelEvent::Error(message.into()))
            .await
            .map_err(|_| Error::Communication("client dropped".to_string()))
    }

    /// Close the channel from the adapter side
    pub async fn close(&self, code: Option<i32>, reason: Option<&str>) -> Result<()> {
        self.events
            .send(ChannelEvent::Closed {
                code,
                reason: reason.map(str::to_string),
            })
            .await
            .map_err(|_| Error::Communication("client dropped".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::DuplexStream;

    fn create_test_streams() -> (DuplexStream, DuplexStream) {
        tokio::io::duplex(8192)
    }

    #[tokio::test]
    async fn test_framing_round_trip() {
        let (client, server) = create_test_streams();
        let (_client_read, mut client_write) = tokio::io::split(client);
        let (server_read, _server_write) = tokio::io::split(server);

        let json = r#"{"seq":1,"type":"request","command":"threads"}"#;
        write_message(&mut client_write, json).await.unwrap();

        let mut reader = BufReader::new(server_read);
        let message = read_message(&mut reader).await.unwrap();
        assert_eq!(message.as_deref(), Some(json));
    }

    #[tokio::test]
    async fn test_missing_content_length_is_protocol_error() {
        let (client, server) = create_test_streams();
        let (_client_read, mut client_write) = tokio::io::split(client);
        client_write.write_all(b"X-Other: 1\r\n\r\n{}").await.unwrap();
        drop(client_write);
        drop(_client_read);

        let (server_read, _server_write) = tokio::io::split(server);
        let mut reader = BufReader::new(server_read);
        // Header block without length: the blank line is skipped and EOF follows
        let result = read_message(&mut reader).await;
        assert!(matches!(result, Ok(None) | Err(Error::Protocol(_))));
    }

    #[tokio::test]
    async fn test_invalid_content_length() {
        let (client, server) = create_test_streams();
        let (_client_read, mut client_write) = tokio::io::split(client);
        client_write
            .write_all(b"Content-Length: abc\r\n\r\n{}")
            .await
            .unwrap();

        let (server_read, _server_write) = tokio::io::split(server);
        let mut reader = BufReader::new(server_read);
        let err = read_message(&mut reader).await.unwrap_err();
        assert!(matches!(err, Error::Protocol(msg) if msg.contains("Invalid Content-Length")));
    }

    #[tokio::test]
    async fn test_stream_channel_delivers_frames_then_close() {
        let (client, adapter) = create_test_streams();
        let (client_read, client_write) = tokio::io::split(client);
        let (_adapter_read, mut adapter_write) = tokio::io::split(adapter);

        let mut channel = StreamChannel::open(client_read, client_write, 16);
        write_message(&mut adapter_write, r#"{"seq":1,"type":"event","event":"initialized"}"#)
            .await
            .unwrap();
        drop(adapter_write);
        drop(_adapter_read);

        match channel.events.recv().await {
            Some(ChannelEvent::Message(raw)) => assert!(raw.contains("initialized")),
            other => panic!("expected message, got {:?}", other),
        }
        match channel.events.recv().await {
            Some(ChannelEvent::Closed { code, reason }) => {
                assert_eq!(code, None);
                assert!(reason.is_some());
            }
            other => panic!("expected close, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_stream_channel_send_after_close_fails() {
        let (client, _adapter) = create_test_streams();
        let (client_read, client_write) = tokio::io::split(client);
        let mut channel = StreamChannel::open(client_read, client_write, 16);

        channel.transport.close().await.unwrap();
        assert!(matches!(
            channel.events.recv().await,
            Some(ChannelEvent::Closed { .. })
        ));
        let err = channel.transport.send("{}".into()).await.unwrap_err();
        assert!(matches!(err, Error::Communication(_)));
    }

    #[tokio::test]
    async fn test_memory_channel_both_directions() {
        let (mut channel, mut peer) = memory_channel(8);
        channel.transport.send(r#"{"seq":1,"type":"request","command":"threads"}"#.into())
            .await
            .unwrap();
        match peer.recv().await {
            Some(crate::ProtocolMessage::Request(request)) => assert_eq!(request.command, "threads"),
            other => panic!("expected request, got {:?}", other),
        }

        peer.close(Some(0), Some("bye")).await.unwrap();
        assert_eq!(
            channel.events.recv().await,
            Some(ChannelEvent::Closed {
                code: Some(0),
                reason: Some("bye".into())
            })
        );
    }
}
