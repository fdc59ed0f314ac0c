//! Test helpers for integration tests
//!
//! A fake gateway that accepts WebSocket connections on a local port and
//! hands each one to the test as a [`GatewayPeer`], plus shortcuts for
//! building a shard pointed at it.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chat_common::{CacheConfig, ShardConfig};
use chat_core::Intents;
use chat_gateway::connection::SessionConfig;
use chat_gateway::{GatewayEndpoint, RateLimiter, ShardConnection, ShardEvent};
use async_trait::async_trait;
use chat_http::{GatewayUrlProvider, HttpError, StaticGatewayUrl};
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

/// Upper bound for any single step of a scenario
///
/// Covers the identify limiter window plus the longest invalid-session delay.
pub const STEP_TIMEOUT: Duration = Duration::from_secs(15);

pub const TEST_TOKEN: &str = "test-token";

/// Local WebSocket server standing in for the real gateway
pub struct FakeGateway {
    addr: SocketAddr,
    peers: mpsc::UnboundedReceiver<GatewayPeer>,
    _handle: JoinHandle<()>,
}

impl FakeGateway {
    pub async fn start() -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let (tx, peers) = mpsc::unbounded_channel();

        let handle = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let Ok(ws) = tokio_tungstenite::accept_async(stream).await else {
                    continue;
                };
                if tx.send(GatewayPeer { ws, heartbeats: 0 }).is_err() {
                    break;
                }
            }
        });

        Ok(Self {
            addr,
            peers,
            _handle: handle,
        })
    }

    /// Base URL to hand to the client
    pub fn url(&self) -> String {
        format!("ws://{}/", self.addr)
    }

    /// Wait for the client's next connection
    pub async fn accept(&mut self) -> Result<GatewayPeer> {
        tokio::time::timeout(STEP_TIMEOUT, self.peers.recv())
            .await
            .context("timed out waiting for a connection")?
            .context("fake gateway stopped")
    }

    /// True if no connection arrives within `wait`
    pub async fn stays_quiet(&mut self, wait: Duration) -> bool {
        tokio::time::timeout(wait, self.peers.recv()).await.is_err()
    }
}

/// The server end of one client connection
pub struct GatewayPeer {
    ws: WebSocketStream<TcpStream>,
    heartbeats: usize,
}

impl GatewayPeer {
    pub async fn send(&mut self, frame: Value) -> Result<()> {
        self.ws.send(Message::Text(frame.to_string())).await?;
        Ok(())
    }

    /// Heartbeats skipped so far by [`expect_op`](Self::expect_op)
    pub fn heartbeats(&self) -> usize {
        self.heartbeats
    }

    /// Next JSON frame from the client
    pub async fn recv(&mut self) -> Result<Value> {
        loop {
            let next = tokio::time::timeout(STEP_TIMEOUT, self.ws.next())
                .await
                .context("timed out waiting for a frame")?;
            match next {
                Some(Ok(Message::Text(text))) => return Ok(serde_json::from_str(&text)?),
                Some(Ok(Message::Close(frame))) => {
                    bail!("client closed the connection: {frame:?}")
                }
                Some(Ok(_)) => {}
                Some(Err(err)) => return Err(err.into()),
                None => bail!("connection ended"),
            }
        }
    }

    /// Next frame with opcode `op`, skipping heartbeats
    ///
    /// Any other opcode is an error.
    pub async fn expect_op(&mut self, op: u64) -> Result<Value> {
        loop {
            let frame = self.recv().await?;
            match frame["op"].as_u64() {
                Some(found) if found == op => return Ok(frame),
                Some(1) => self.heartbeats += 1,
                _ => bail!("expected op {op}, got {frame}"),
            }
        }
    }

    pub async fn close(&mut self, code: u16, reason: &str) -> Result<()> {
        self.ws
            .close(Some(CloseFrame {
                code: CloseCode::from(code),
                reason: reason.to_string().into(),
            }))
            .await?;
        Ok(())
    }

    /// True if the client sends nothing but heartbeats for `wait`
    pub async fn stays_quiet(&mut self, wait: Duration) -> Result<bool> {
        let deadline = tokio::time::Instant::now() + wait;
        loop {
            let Ok(next) = tokio::time::timeout_at(deadline, self.ws.next()).await else {
                return Ok(true);
            };
            match next {
                Some(Ok(Message::Text(text))) => {
                    let frame: Value = serde_json::from_str(&text)?;
                    if frame["op"].as_u64() != Some(1) {
                        return Ok(false);
                    }
                    self.heartbeats += 1;
                }
                Some(Ok(Message::Close(_))) | None => return Ok(false),
                Some(Ok(_)) => {}
                Some(Err(err)) => return Err(err.into()),
            }
        }
    }

    /// Drop the TCP connection without a close frame
    pub fn drop_connection(self) {
        drop(self.ws);
    }

    /// Drain frames until the client closes; returns its close code
    pub async fn expect_closed(&mut self) -> Result<Option<u16>> {
        loop {
            let next = tokio::time::timeout(STEP_TIMEOUT, self.ws.next())
                .await
                .context("timed out waiting for close")?;
            match next {
                Some(Ok(Message::Close(frame))) => return Ok(frame.map(|f| u16::from(f.code))),
                Some(Ok(_)) => {}
                Some(Err(_)) | None => return Ok(None),
            }
        }
    }
}

/// A single unsharded shard pointed at `gateway`
pub fn shard_for(gateway: &FakeGateway) -> Arc<ShardConnection> {
    shard_with(gateway, Intents::default(), ShardConfig::SINGLE)
}

pub fn shard_with(gateway: &FakeGateway, intents: Intents, shard: ShardConfig) -> Arc<ShardConnection> {
    let endpoint = GatewayEndpoint::new(Arc::new(StaticGatewayUrl::new(gateway.url())), 6);
    shard_on(Arc::new(endpoint), intents, shard)
}

/// A single unsharded shard resolving its URL through `endpoint`
pub fn shard_on(endpoint: Arc<GatewayEndpoint>, intents: Intents, shard: ShardConfig) -> Arc<ShardConnection> {
    Arc::new(ShardConnection::new(
        SessionConfig {
            token: TEST_TOKEN.to_string(),
            intents,
            large_threshold: None,
            shard,
        },
        endpoint,
        Arc::new(RateLimiter::identify()),
        &CacheConfig::default(),
    ))
}

/// Hands out a fixed list of URLs, repeating the last one
pub struct ScriptedUrls {
    urls: Mutex<VecDeque<String>>,
    calls: AtomicUsize,
}

impl ScriptedUrls {
    pub fn new(urls: impl IntoIterator<Item = String>) -> Self {
        Self {
            urls: Mutex::new(urls.into_iter().collect()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GatewayUrlProvider for ScriptedUrls {
    async fn gateway_url(&self) -> Result<String, HttpError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut urls = self.urls.lock().unwrap();
        let url = if urls.len() > 1 { urls.pop_front() } else { urls.front().cloned() };
        Ok(url.unwrap_or_default())
    }
}

/// A `ws://` URL nothing is listening on
pub async fn dead_url() -> Result<String> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    drop(listener);
    Ok(format!("ws://{addr}/"))
}

/// Next event matching `predicate`, skipping the rest
pub async fn next_event<F>(events: &mut broadcast::Receiver<ShardEvent>, predicate: F) -> Result<ShardEvent>
where
    F: Fn(&ShardEvent) -> bool,
{
    tokio::time::timeout(STEP_TIMEOUT, async {
        loop {
            let event = events.recv().await?;
            if predicate(&event) {
                return Ok::<_, anyhow::Error>(event);
            }
        }
    })
    .await
    .context("timed out waiting for event")?
}
