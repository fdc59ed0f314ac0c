//! One WebSocket connection to the gateway
//!
//! Owns the transport, a writer task fed by a channel, and a receive loop
//! that decodes frames and hands them to a [`SocketHandler`].

use std::borrow::Cow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode as WsCloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::error::{FrameError, GatewayError, GatewayResult};
use crate::protocol::GatewayMessage;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// How long a graceful close may take before the connection is aborted
pub const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

const OUTBOUND_BUFFER: usize = 64;

/// Receives everything a socket observes
///
/// Callbacks run on the receive loop, so they must not wait for the socket
/// that is calling them to shut down.
#[async_trait]
pub trait SocketHandler: Send + Sync + 'static {
    /// A decoded frame, in arrival order
    async fn handle_payload(&self, message: GatewayMessage);

    /// The remote sent a close frame
    async fn on_close_received(&self, code: u16, reason: String);

    /// The transport dropped without a close frame
    async fn on_closed_prematurely(&self);
}

/// A connected gateway socket
pub struct GatewaySocket {
    outbound: mpsc::Sender<Message>,
    open: Arc<AtomicBool>,
    disconnecting: Arc<AtomicBool>,
    shutdown: CancellationToken,
    pending: Mutex<Option<SplitStream<WsStream>>>,
    reader: Mutex<Option<JoinHandle<()>>>,
    writer: Mutex<Option<JoinHandle<()>>>,
}

impl GatewaySocket {
    /// Open the transport; frames are not read until [`GatewaySocket::start`]
    pub async fn connect(url: &str, cancel: &CancellationToken) -> GatewayResult<Self> {
        tracing::debug!(url, "Opening gateway socket");

        let (stream, _) = tokio::select! {
            () = cancel.cancelled() => return Err(GatewayError::Cancelled),
            result = tokio_tungstenite::connect_async(url) => result?,
        };

        let (sink, stream) = stream.split();
        let (outbound, rx) = mpsc::channel(OUTBOUND_BUFFER);
        let open = Arc::new(AtomicBool::new(true));
        let disconnecting = Arc::new(AtomicBool::new(false));
        let shutdown = CancellationToken::new();

        let writer = tokio::spawn(
            writer_task(sink, rx, shutdown.clone(), Arc::clone(&open)).in_current_span(),
        );

        Ok(Self {
            outbound,
            open,
            disconnecting,
            shutdown,
            pending: Mutex::new(Some(stream)),
            reader: Mutex::new(None),
            writer: Mutex::new(Some(writer)),
        })
    }

    /// Start the receive loop. Only the first call has any effect.
    pub fn start(&self, handler: Arc<dyn SocketHandler>) {
        let Some(stream) = self.pending.lock().take() else {
            return;
        };
        let reader = tokio::spawn(
            reader_task(
                stream,
                handler,
                self.shutdown.clone(),
                Arc::clone(&self.open),
                Arc::clone(&self.disconnecting),
            )
            .in_current_span(),
        );
        *self.reader.lock() = Some(reader);
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    /// Queue a frame for sending
    pub async fn send(&self, message: &GatewayMessage) -> GatewayResult<()> {
        if !self.is_open() {
            return Err(GatewayError::SocketNotOpen);
        }
        let json = message.to_json()?;
        tracing::trace!(op = %message.op, "Sending frame");
        self.outbound
            .send(Message::Text(json))
            .await
            .map_err(|_| GatewayError::SocketNotOpen)
    }

    /// Close gracefully, aborting if the remote does not finish the close in time
    ///
    /// Close callbacks are suppressed from here on.
    pub async fn disconnect(&self, code: u16, reason: &str) {
        if self.disconnecting.swap(true, Ordering::SeqCst) {
            return;
        }
        let was_open = self.open.swap(false, Ordering::SeqCst);
        tracing::debug!(close_code = code, reason, "Closing gateway socket");

        if was_open {
            let frame = CloseFrame {
                code: WsCloseCode::from(code),
                reason: Cow::Owned(reason.to_string()),
            };
            // writer may already be gone, in which case the reader ends on its own
            let _ = self.outbound.send(Message::Close(Some(frame))).await;
        }

        let reader = self.reader.lock().take();
        if let Some(mut reader) = reader {
            if tokio::time::timeout(CLOSE_TIMEOUT, &mut reader).await.is_err() {
                tracing::warn!(close_code = code, "Close handshake timed out, aborting");
                reader.abort();
            }
        }

        self.shutdown.cancel();
        let writer = self.writer.lock().take();
        if let Some(writer) = writer {
            writer.abort();
        }
    }
}

impl Drop for GatewaySocket {
    fn drop(&mut self) {
        self.shutdown.cancel();
        if let Some(reader) = self.reader.get_mut().take() {
            reader.abort();
        }
        if let Some(writer) = self.writer.get_mut().take() {
            writer.abort();
        }
    }
}

async fn writer_task(
    mut sink: SplitSink<WsStream, Message>,
    mut rx: mpsc::Receiver<Message>,
    shutdown: CancellationToken,
    open: Arc<AtomicBool>,
) {
    loop {
        let message = tokio::select! {
            () = shutdown.cancelled() => break,
            message = rx.recv() => match message {
                Some(message) => message,
                None => break,
            },
        };

        let is_close = matches!(message, Message::Close(_));
        if let Err(err) = sink.send(message).await {
            tracing::debug!(error = %err, "Gateway socket write failed");
            open.store(false, Ordering::SeqCst);
            break;
        }
        if is_close {
            break;
        }
    }
}

async fn reader_task(
    mut stream: SplitStream<WsStream>,
    handler: Arc<dyn SocketHandler>,
    shutdown: CancellationToken,
    open: Arc<AtomicBool>,
    disconnecting: Arc<AtomicBool>,
) {
    let mut close_frame: Option<(u16, String)> = None;

    loop {
        let next = tokio::select! {
            () = shutdown.cancelled() => break,
            next = stream.next() => next,
        };

        let decoded = match next {
            Some(Ok(Message::Text(text))) => GatewayMessage::from_json(&text),
            Some(Ok(Message::Binary(bytes))) => GatewayMessage::from_slice(&bytes),
            Some(Ok(Message::Close(frame))) => {
                close_frame = Some(frame.map_or((1005, String::new()), |f| {
                    (u16::from(f.code), f.reason.into_owned())
                }));
                break;
            }
            Some(Ok(_)) => continue,
            Some(Err(err)) => {
                tracing::debug!(error = %err, "Gateway socket read failed");
                break;
            }
            None => break,
        };

        match decoded {
            Ok(message) => handler.handle_payload(message).await,
            Err(FrameError::UnknownOpcode(op)) => {
                tracing::warn!(op, "Unknown opcode, skipping frame");
            }
            Err(err) => {
                tracing::warn!(error = %err, "Undecodable frame, skipping");
            }
        }
    }

    open.store(false, Ordering::SeqCst);
    shutdown.cancel();

    if disconnecting.load(Ordering::SeqCst) {
        return;
    }
    match close_frame {
        Some((code, reason)) => handler.on_close_received(code, reason).await,
        None => handler.on_closed_prematurely().await,
    }
}
