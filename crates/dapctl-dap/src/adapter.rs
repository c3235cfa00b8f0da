//! Opening channels to debug adapters
//!
//! Adapters are reached either by spawning an executable and speaking DAP over
//! its stdio, or by connecting to a TCP port an adapter listens on.

use crate::channel::{Channel, StreamChannel};
use crate::{Error, Result};
use dapctl_config::{AdapterCommand, ConnectionConfig};
use socket2::{SockRef, TcpKeepalive};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;
use tokio::process::Command;
use tracing::{debug, info, trace, warn};

/// Default host for TCP adapters without an explicit host
pub const DEFAULT_ADAPTER_HOST: &str = "127.0.0.1";

/// Open a channel for `adapter`: spawn it when it names a command, otherwise
/// connect to its port.
pub async fn open_adapter_channel(
    adapter: &AdapterCommand,
    config: &ConnectionConfig,
) -> Result<Channel> {
    match (&adapter.command, adapter.port) {
        (Some(_), _) => spawn_adapter(adapter, config).await,
        (None, Some(port)) => {
            let host = adapter.host.as_deref().unwrap_or(DEFAULT_ADAPTER_HOST);
            connect_tcp(host, port, config).await
        }
        (None, None) => Err(Error::Communication(
            "adapter has neither a command nor a port".to_string(),
        )),
    }
}

/// Spawn the adapter process and open a channel over its stdio.
///
/// The adapter's stderr is forwarded line by line to the log.
pub async fn spawn_adapter(adapter: &AdapterCommand, config: &ConnectionConfig) -> Result<Channel> {
    let program = adapter
        .command
        .as_deref()
        .ok_or_else(|| Error::Communication("adapter command is not set".to_string()))?;
    info!("Launching adapter: {} {}", program, adapter.args.join(" "));

    let mut cmd = Command::new(program);
    cmd.args(&adapter.args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(cwd) = &adapter.cwd {
        cmd.current_dir(cwd);
    }
    for (key, value) in &adapter.env {
        cmd.env(key, value);
    }

    let mut child = cmd.spawn()?;
    let stdin = child
        .stdin
        .take()
        .ok_or_else(|| Error::Communication("Failed to get stdin".to_string()))?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| Error::Communication("Failed to get stdout".to_string()))?;

    if let Some(stderr) = child.stderr.take() {
        let name = program.to_string();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(adapter = %name, "stderr: {}", line);
            }
        });
    }

    Ok(StreamChannel::open_process(
        stdout,
        stdin,
        child,
        config.channel_capacity,
    ))
}

/// Connect to an adapter listening on `host:port`
pub async fn connect_tcp(host: &str, port: u16, config: &ConnectionConfig) -> Result<Channel> {
    info!("Connecting to DAP server at {}:{}...", host, port);
    let stream = connect_with_retry(host, port, config).await?;
    configure_tcp_keepalive(&stream, config);
    info!("Connected to DAP server on port {}", port);

    let (reader, writer) = tokio::io::split(stream);
    Ok(StreamChannel::open(reader, writer, config.channel_capacity))
}

/// Connect with exponential backoff and jitter.
///
/// Gives up after `connect_timeout_ms`, or earlier when the connection is
/// refused `max_connection_refused_attempts` times in a row.
async fn connect_with_retry(host: &str, port: u16, config: &ConnectionConfig) -> Result<TcpStream> {
    use rand::Rng;

    let address = format!("{}:{}", host, port);
    let start = std::time::Instant::now();
    let timeout = Duration::from_millis(config.connect_timeout_ms);

    let mut retry_interval_ms = config.retry_interval_ms;
    let mut attempt = 0u32;
    let mut connection_refused_count = 0u32;

    loop {
        match TcpStream::connect(&address).await {
            Ok(stream) => return Ok(stream),
            Err(e) => {
                attempt += 1;

                if e.kind() == std::io::ErrorKind::ConnectionRefused {
                    connection_refused_count += 1;
                    if connection_refused_count >= config.max_connection_refused_attempts {
                        return Err(Error::Communication(format!(
                            "No debug adapter listening on {} (connection refused {} times)",
                            address, connection_refused_count
                        )));
                    }
                } else {
                    connection_refused_count = 0;
                }

                if start.elapsed() > timeout {
                    return Err(Error::Communication(format!(
                        "Timeout connecting to debug adapter at {} after {} attempts: {}",
                        address, attempt, e
                    )));
                }

                let jitter_ms = rand::rng().random_range(0..100);
                let wait_ms = retry_interval_ms.saturating_add(jitter_ms);
                trace!(
                    "Connection attempt {} failed, retrying in {}ms (backoff: {}ms + jitter: {}ms)",
                    attempt,
                    wait_ms,
                    retry_interval_ms,
                    jitter_ms
                );
                tokio::time::sleep(Duration::from_millis(wait_ms)).await;

                retry_interval_ms = retry_interval_ms
                    .saturating_mul(2)
                    .min(config.max_retry_delay_ms);
            }
        }
    }
}

fn configure_tcp_keepalive(stream: &TcpStream, config: &ConnectionConfig) {
    let socket = SockRef::from(stream);

    if let Err(e) = socket.set_nodelay(true) {
        warn!("Failed to set TCP_NODELAY: {}", e);
    }

    let keepalive = TcpKeepalive::new()
        .with_time(Duration::from_secs(config.tcp_keepalive_time_secs))
        .with_interval(Duration::from_secs(config.tcp_keepalive_interval_secs));

    if let Err(e) = socket.set_tcp_keepalive(&keepalive) {
        warn!("Failed to set TCP keep-alive: {}", e);
    } else {
        debug!("TCP keep-alive configured");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{read_message, write_message, ChannelEvent};
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_connect_tcp_exchanges_frames() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let (read, mut write) = tokio::io::split(socket);
            let mut reader = BufReader::new(read);
            let request = read_message(&mut reader).await.unwrap().unwrap();
            assert!(request.contains("initialize"));
            write_message(&mut write, r#"{"seq":1,"type":"event","event":"initialized"}"#)
                .await
                .unwrap();
        });

        let mut channel = connect_tcp("127.0.0.1", port, &ConnectionConfig::default())
            .await
            .unwrap();
        channel
            .transport
            .send(r#"{"seq":1,"type":"request","command":"initialize"}"#.into())
            .await
            .unwrap();

        match channel.events.recv().await {
            Some(ChannelEvent::Message(raw)) => assert!(raw.contains("initialized")),
            other => panic!("expected message, got {:?}", other),
        }
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_connection_refused_fails_fast() {
        // Bind then drop to get a port nobody listens on
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };
        let config = ConnectionConfig {
            retry_interval_ms: 1,
            max_retry_delay_ms: 2,
            max_connection_refused_attempts: 2,
            ..ConnectionConfig::default()
        };

        let err = connect_tcp("127.0.0.1", port, &config).await.unwrap_err();
        assert!(matches!(err, Error::Communication(msg) if msg.contains("connection refused")));
    }

    #[tokio::test]
    async fn test_adapter_without_command_or_port() {
        let err = open_adapter_channel(&AdapterCommand::default(), &ConnectionConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Communication(_)));
    }
}
