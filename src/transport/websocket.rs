// file: src/transport/websocket.rs
// description: WebSocket transport for the skill swap event endpoint with reconnect and backoff
// reference: https://datatracker.ietf.org/doc/html/rfc6455

use crate::{
    client_state::{ConnectionState, SharedConnectionState},
    config::WebSocketConfig,
    error::{Result, SkillSwapError},
    events::{SignalSender, TransportSignal},
    monitoring::{FRAMES_RECEIVED_COUNTER, RECONNECT_COUNTER},
    transport::{Transport, shutdown_requested},
};
use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD};
use bytes::Bytes;
use fastwebsockets::{Frame, OpCode, WebSocket, handshake};
use http_body_util::Empty;
use hyper::{
    Request,
    header::{CONNECTION, HOST, UPGRADE},
    upgrade::Upgraded,
};
use hyper_util::rt::TokioIo;
use sha1::{Digest, Sha1};
use std::{sync::Arc, time::Duration};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::TcpStream,
    sync::{Mutex, watch},
    time::{sleep, timeout},
};
use tracing::{debug, error, info, trace, warn};

const MAX_RECONNECT_JITTER_MS: u64 = 250;
const ACCEPT_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

pub trait AsyncStream: AsyncRead + AsyncWrite + Unpin + Send {}
impl<T: AsyncRead + AsyncWrite + Unpin + Send> AsyncStream for T {}

type Stream = Box<dyn AsyncStream>;
type Socket = WebSocket<TokioIo<Upgraded>>;

/// Runs hyper's upgrade connection task on the tokio runtime.
struct SpawnExecutor;

impl<Fut> hyper::rt::Executor<Fut> for SpawnExecutor
where
    Fut: Future + Send + 'static,
    Fut::Output: Send + 'static,
{
    fn execute(&self, fut: Fut) {
        tokio::spawn(fut);
    }
}

/// `Sec-WebSocket-Accept` value a server must answer `key` with.
fn accept_key(key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(key.as_bytes());
    hasher.update(ACCEPT_GUID.as_bytes());
    STANDARD.encode(hasher.finalize())
}

pub struct WebSocketTransport {
    label: String,
    config: WebSocketConfig,
    state: SharedConnectionState,
}

impl WebSocketTransport {
    pub fn new(label: impl Into<String>, config: WebSocketConfig) -> Self {
        Self {
            label: label.into(),
            config,
            state: Arc::new(Mutex::new(ConnectionState::new())),
        }
    }

    /// Connection bookkeeping shared with the transport task.
    pub fn state(&self) -> SharedConnectionState {
        self.state.clone()
    }

    async fn open_stream(&self) -> Result<Stream> {
        let url = &self.config.url;
        let host = url
            .host_str()
            .ok_or_else(|| SkillSwapError::InvalidConfig(format!("{} has no host", url)))?;
        let port = url.port_or_known_default().unwrap_or(80);

        let tcp = TcpStream::connect((host, port)).await?;
        tcp.set_nodelay(true)?;

        match url.scheme() {
            "ws" | "http" => Ok(Box::new(tcp)),
            "wss" | "https" => {
                let tls_config = rustls::ClientConfig::builder_with_provider(Arc::new(
                    rustls::crypto::ring::default_provider(),
                ))
                .with_safe_default_protocol_versions()?
                .with_root_certificates(rustls::RootCertStore {
                    roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
                })
                .with_no_client_auth();

                let connector = tokio_rustls::TlsConnector::from(Arc::new(tls_config));
                let domain = rustls::pki_types::ServerName::try_from(host.to_string())
                    .map_err(|e| SkillSwapError::HandshakeFailed {
                        reason: e.to_string(),
                    })?;
                let tls = connector.connect(domain, tcp).await?;
                Ok(Box::new(tls))
            }
            other => Err(SkillSwapError::InvalidConfig(format!(
                "unsupported channel scheme '{}'",
                other
            ))),
        }
    }

    fn upgrade_request(&self, key: &str) -> Result<Request<Empty<Bytes>>> {
        let url = &self.config.url;
        let host = url.host_str().unwrap_or_default();
        let host_header = match url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };
        let mut target = url.path().to_string();
        if let Some(query) = url.query() {
            target.push('?');
            target.push_str(query);
        }

        Request::builder()
            .method("GET")
            .uri(target)
            .header(HOST, host_header)
            .header(UPGRADE, "websocket")
            .header(CONNECTION, "upgrade")
            .header("Sec-WebSocket-Key", key)
            .header("Sec-WebSocket-Version", "13")
            .body(Empty::<Bytes>::new())
            .map_err(|e| SkillSwapError::HandshakeFailed {
                reason: e.to_string(),
            })
    }

    async fn connect(&self) -> Result<Socket> {
        let key = handshake::generate_key();
        let request = self.upgrade_request(&key)?;
        let connect = async {
            let stream = self.open_stream().await?;
            Ok::<_, SkillSwapError>(handshake::client(&SpawnExecutor, request, stream).await?)
        };
        let (mut ws, response) = timeout(self.config.timeout, connect)
            .await
            .map_err(|_| SkillSwapError::Timeout)??;

        // fastwebsockets checks the status and upgrade headers but not the key echo
        let expected = accept_key(&key);
        let accepted = response
            .headers()
            .get("Sec-WebSocket-Accept")
            .and_then(|value| value.to_str().ok());
        if accepted != Some(expected.as_str()) {
            return Err(SkillSwapError::HandshakeFailed {
                reason: format!("bad Sec-WebSocket-Accept {:?}", accepted),
            });
        }

        ws.set_writev(true);
        ws.set_auto_close(true);
        ws.set_auto_pong(true);
        Ok(ws)
    }

    /// Returns `Ok` only when shutdown was requested.
    async fn connect_and_run(
        &self,
        signals: &SignalSender,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<()> {
        debug!("[{}] Connecting to {}", self.label, self.config.url);
        let mut ws = self.connect().await.map_err(|e| {
            error!("[{}] Failed to connect to WebSocket: {}", self.label, e);
            e
        })?;

        let connection_id = self.state.lock().await.mark_connected();
        info!(
            "[{}] WebSocket connection established to {}",
            self.label, self.config.url
        );
        signals
            .send(TransportSignal::Opened { connection_id })
            .await
            .map_err(|_| SkillSwapError::LoopClosed)?;

        let outcome = self.handle_frame_stream(&mut ws, signals, shutdown).await;
        self.state.lock().await.disconnect();

        let reason = match &outcome {
            Ok(()) => {
                let _ = ws.write_frame(Frame::close(1000, b"")).await;
                "client disconnect".to_string()
            }
            Err(e) => e.to_string(),
        };
        signals
            .send(TransportSignal::Closed { reason })
            .await
            .map_err(|_| SkillSwapError::LoopClosed)?;

        outcome
    }

    async fn handle_frame_stream(
        &self,
        ws: &mut Socket,
        signals: &SignalSender,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<()> {
        loop {
            let frame = tokio::select! {
                _ = shutdown_requested(shutdown) => return Ok(()),
                frame = ws.read_frame() => frame?,
            };

            match frame.opcode {
                OpCode::Text => {
                    let text = String::from_utf8_lossy(&frame.payload).into_owned();
                    trace!("[{}] Received text frame: {}", self.label, text);
                    self.state.lock().await.record_frame();
                    FRAMES_RECEIVED_COUNTER.increment(1);
                    signals
                        .send(TransportSignal::Frame(text))
                        .await
                        .map_err(|_| SkillSwapError::LoopClosed)?;
                }
                OpCode::Binary => {
                    warn!(
                        "[{}] Binary frames not supported ({} bytes dropped)",
                        self.label,
                        frame.payload.len()
                    );
                }
                OpCode::Close => {
                    warn!("[{}] Received close frame", self.label);
                    return Err(SkillSwapError::ConnectionClosed);
                }
                _ => {
                    // ping/pong are answered by fastwebsockets
                    trace!("[{}] Received control frame", self.label);
                }
            }
        }
    }

    /// Returns `Ok(false)` when shutdown arrived during the backoff.
    async fn handle_connection_error(&self, shutdown: &mut watch::Receiver<bool>) -> Result<bool> {
        let attempt = self.state.lock().await.increment_reconnect();
        RECONNECT_COUNTER.increment(1);

        if self.config.max_reconnects > 0 && attempt >= self.config.max_reconnects {
            error!(
                "[{}] Maximum reconnection attempts ({}) reached",
                self.label, self.config.max_reconnects
            );
            return Err(SkillSwapError::MaxReconnectsExceeded);
        }

        let delay = self.config.reconnect_delay
            + Duration::from_millis(fastrand::u64(0..=MAX_RECONNECT_JITTER_MS));
        warn!(
            "[{}] Reconnecting in {:.1} seconds (attempt {})",
            self.label,
            delay.as_secs_f64(),
            attempt
        );

        tokio::select! {
            _ = sleep(delay) => Ok(true),
            _ = shutdown_requested(shutdown) => Ok(false),
        }
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    fn label(&self) -> &str {
        &self.label
    }

    async fn run(&self, signals: SignalSender, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        loop {
            if *shutdown.borrow() {
                return Ok(());
            }

            match self.connect_and_run(&signals, &mut shutdown).await {
                Ok(()) => return Ok(()),
                Err(SkillSwapError::LoopClosed) => return Err(SkillSwapError::LoopClosed),
                Err(e) => {
                    warn!("[{}] Connection error: {}", self.label, e);
                    if !self.handle_connection_error(&mut shutdown).await? {
                        return Ok(());
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::create_signal_channel;
    use std::{net::SocketAddr, sync::atomic::Ordering};
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::TcpListener,
    };
    use url::Url;

    fn config(url: Url) -> WebSocketConfig {
        WebSocketConfig {
            url,
            timeout: Duration::from_secs(2),
            reconnect_delay: Duration::from_millis(10),
            max_reconnects: 1,
        }
    }

    /// Accepts one upgrade, answering with the right accept value or a
    /// bogus one, then sends `greeting` as a text frame.
    async fn upgrade_server(honest: bool, greeting: &'static str) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.ends_with(b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    return;
                }
                request.extend_from_slice(&buf[..n]);
            }
            let request = String::from_utf8_lossy(&request).into_owned();
            let key = request
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    name.eq_ignore_ascii_case("sec-websocket-key")
                        .then(|| value.trim().to_string())
                })
                .unwrap();
            let accept = if honest {
                accept_key(&key)
            } else {
                accept_key("not-the-key")
            };
            let response = format!(
                "HTTP/1.1 101 Switching Protocols\r\n\
                 Upgrade: websocket\r\n\
                 Connection: Upgrade\r\n\
                 Sec-WebSocket-Accept: {}\r\n\r\n",
                accept
            );
            socket.write_all(response.as_bytes()).await.unwrap();

            let mut frame = vec![0x81, greeting.len() as u8];
            frame.extend_from_slice(greeting.as_bytes());
            let _ = socket.write_all(&frame).await;
            // hold the connection until the client goes away
            while matches!(socket.read(&mut buf).await, Ok(n) if n > 0) {}
        });
        addr
    }

    #[test]
    fn accept_key_matches_the_rfc_sample() {
        assert_eq!(
            accept_key("dGhlIHNhbXBsZSBub25jZQ=="),
            "s3pPLMBiTxaQ9kYGzzhZRbK+xOo="
        );
    }

    #[tokio::test]
    async fn frames_flow_after_a_verified_upgrade() {
        let greeting = r#"{"event":"new_swap_request","data":{}}"#;
        let addr = upgrade_server(true, greeting).await;
        let url = Url::parse(&format!("ws://{}/socket?user=7", addr)).unwrap();
        let transport = WebSocketTransport::new("test", config(url));
        let state = transport.state();
        let (tx, mut rx) = create_signal_channel();
        let (stop_tx, stop_rx) = watch::channel(false);
        let task = tokio::spawn(async move { transport.run(tx, stop_rx).await });

        assert!(matches!(
            rx.recv().await,
            Some(TransportSignal::Opened { .. })
        ));
        assert_eq!(rx.recv().await, Some(TransportSignal::Frame(greeting.into())));
        {
            let state = state.lock().await;
            assert!(state.is_connected);
            assert_eq!(state.total_frames_received.load(Ordering::Relaxed), 1);
        }

        stop_tx.send(true).unwrap();
        assert_eq!(
            rx.recv().await,
            Some(TransportSignal::Closed {
                reason: "client disconnect".into()
            })
        );
        task.await.unwrap().unwrap();
        assert!(!state.lock().await.is_connected);
    }

    #[tokio::test]
    async fn wrong_accept_value_fails_the_handshake() {
        let addr = upgrade_server(false, "{}").await;
        let url = Url::parse(&format!("ws://{}/socket", addr)).unwrap();
        let transport = WebSocketTransport::new("test", config(url));

        let err = transport.connect().await.err().expect("connect must fail");
        assert!(matches!(err, SkillSwapError::HandshakeFailed { .. }));
    }

    #[tokio::test]
    async fn rejected_upgrade_gives_up_after_max_reconnects() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = [0u8; 1024];
                let _ = socket.read(&mut buf).await;
                let _ = socket
                    .write_all(b"HTTP/1.1 403 Forbidden\r\nContent-Length: 0\r\n\r\n")
                    .await;
            }
        });

        let url = Url::parse(&format!("ws://{}/socket", addr)).unwrap();
        let transport = WebSocketTransport::new("test", config(url));
        let (tx, mut rx) = create_signal_channel();
        let (_stop_tx, stop_rx) = watch::channel(false);

        let err = transport.run(tx, stop_rx).await.unwrap_err();
        assert!(matches!(err, SkillSwapError::MaxReconnectsExceeded));
        // never opened, so nothing was signalled
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn unsupported_scheme_is_a_config_error() {
        let url = Url::parse("ftp://127.0.0.1:1/socket").unwrap();
        let transport = WebSocketTransport::new("test", config(url));
        let err = transport.connect().await.err().expect("connect must fail");
        assert!(matches!(
            err,
            SkillSwapError::InvalidConfig(_) | SkillSwapError::IoError(_)
        ));
    }
}
