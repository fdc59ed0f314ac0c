//! Gateway session state machine
//!
//! Owns at most one [`GatewaySocket`] at a time and drives it through
//! Hello, Identify or Resume, and Ready or Resumed. Close codes, heartbeat
//! timeouts and server requests are turned into a reconnect plan (resume,
//! fresh, or fatal) and carried out on a single background task.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use chat_common::ShardConfig;
use chat_core::Intents;
use chat_http::HttpError;
use parking_lot::Mutex;
use rand::Rng;
use serde_json::Value;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span};

use super::heartbeat::{run_heartbeat, HeartbeatExit, HeartbeatState, Sequence};
use super::{GatewayEndpoint, GatewaySocket, RateLimiter, SocketHandler};
use crate::error::{ConnectionFailure, FailureReason, GatewayError, GatewayResult};
use crate::protocol::{
    CloseCode, GatewayMessage, IdentifyPayload, OpCode, ReconnectAction, ResumePayload,
};

/// Wait between failed transport connect attempts
pub const CONNECT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Wait before retrying a command whose socket closed underneath it
pub const COMMAND_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Floor for the server-provided heartbeat interval
pub const MIN_HEARTBEAT_INTERVAL: Duration = Duration::from_millis(100);

/// Close code that keeps the session resumable server-side
const CLOSE_RESUMABLE: u16 = 4000;
const CLOSE_NORMAL: u16 = 1000;

/// Connection lifecycle as seen by consumers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    /// Transport or handshake in progress
    Connecting,
    /// Ready or Resumed received; commands may be sent
    Connected,
    /// Stopped after a fatal error
    Failed,
}

/// Identity a session authenticates with
#[derive(Clone)]
pub struct SessionConfig {
    pub token: String,
    pub intents: Intents,
    pub large_threshold: Option<u32>,
    pub shard: ShardConfig,
}

impl std::fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionConfig")
            .field("token", &"<redacted>")
            .field("intents", &self.intents)
            .field("large_threshold", &self.large_threshold)
            .field("shard", &self.shard)
            .finish()
    }
}

/// Receives what the session surfaces to the layer above
///
/// Called from the receive loop; dispatches arrive strictly in order.
pub trait SessionListener: Send + Sync + 'static {
    fn on_dispatch(&self, event: &str, data: Value);

    /// Handshake completed again after an automatic reconnect
    fn on_reconnected(&self);

    /// Called exactly once when the session gives up
    fn on_failed(&self, failure: &ConnectionFailure);
}

/// How to re-establish the connection
#[derive(Debug, Clone)]
struct Plan {
    resume: bool,
    delay: Option<Duration>,
    reason: String,
}

impl Plan {
    fn resume(reason: impl Into<String>) -> Self {
        Self {
            resume: true,
            delay: None,
            reason: reason.into(),
        }
    }
}

/// Outcome of [`SessionInner::begin`]
enum Attempt {
    /// This caller drives the connect
    Owner(CancellationToken),
    /// Another connect is running; wait on its lifetime
    Joined(CancellationToken),
}

/// Clears the running flag even when the connect future is dropped
struct RunningGuard(Arc<AtomicBool>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// One transport plus the tasks tied to it
struct Link {
    generation: u64,
    socket: Arc<GatewaySocket>,
    heartbeat: Arc<HeartbeatState>,
    /// Child of the session lifetime; stops this link's heartbeat and handshake
    cancel: CancellationToken,
    hello_seen: AtomicBool,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

struct SessionInner {
    config: SessionConfig,
    endpoint: Arc<GatewayEndpoint>,
    listener: Arc<dyn SessionListener>,
    identify_limiter: Arc<RateLimiter>,
    outbound_limiter: RateLimiter,
    span: Span,
    state: watch::Sender<ConnectionState>,
    session_id: Mutex<Option<String>>,
    resume_next: AtomicBool,
    sequence: Arc<Sequence>,
    generation: AtomicU64,
    link: Mutex<Option<Arc<Link>>>,
    lifetime: Mutex<CancellationToken>,
    reconnecting: AtomicBool,
    /// A consumer `connect()` is driving the handshake
    connect_running: Arc<AtomicBool>,
    reconnect_task: Mutex<Option<JoinHandle<()>>>,
    announce_reconnect: AtomicBool,
    failure: Mutex<Option<ConnectionFailure>>,
}

/// A gateway session for one shard
pub struct GatewaySession {
    inner: Arc<SessionInner>,
}

impl GatewaySession {
    pub fn new(
        config: SessionConfig,
        endpoint: Arc<GatewayEndpoint>,
        identify_limiter: Arc<RateLimiter>,
        listener: Arc<dyn SessionListener>,
    ) -> Self {
        let span = tracing::info_span!("gateway", shard_id = config.shard.id);
        let (state, _) = watch::channel(ConnectionState::Disconnected);

        Self {
            inner: Arc::new(SessionInner {
                config,
                endpoint,
                listener,
                identify_limiter,
                outbound_limiter: RateLimiter::outbound(),
                span,
                state,
                session_id: Mutex::new(None),
                resume_next: AtomicBool::new(false),
                sequence: Arc::new(Sequence::default()),
                generation: AtomicU64::new(0),
                link: Mutex::new(None),
                lifetime: Mutex::new(CancellationToken::new()),
                reconnecting: AtomicBool::new(false),
                connect_running: Arc::new(AtomicBool::new(false)),
                reconnect_task: Mutex::new(None),
                announce_reconnect: AtomicBool::new(false),
                failure: Mutex::new(None),
            }),
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    /// Watch state transitions
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    pub fn session_id(&self) -> Option<String> {
        self.inner.session_id.lock().clone()
    }

    /// Last dispatch sequence of the current session
    pub fn sequence(&self) -> Option<u64> {
        self.inner.sequence.get()
    }

    /// Heartbeat round trip on the current connection
    pub fn latency(&self) -> Option<Duration> {
        let link = self.inner.link.lock().clone();
        link.and_then(|link| link.heartbeat.latency())
    }

    /// The fatal failure, if the session stopped because of one
    pub fn failure(&self) -> Option<ConnectionFailure> {
        self.inner.failure.lock().clone()
    }

    /// Connect and wait for Ready or Resumed
    ///
    /// Transport failures are retried until `cancel` fires. Returns
    /// [`GatewayError::Fatal`] if the gateway rejects the session for good.
    pub async fn connect(&self, cancel: &CancellationToken) -> GatewayResult<()> {
        if self.state() == ConnectionState::Connected {
            return Ok(());
        }

        let inner = &self.inner;
        async move {
            let lifetime = match inner.begin() {
                Attempt::Owner(lifetime) => lifetime,
                Attempt::Joined(lifetime) => {
                    tracing::debug!("Connect already in progress, waiting for it");
                    return tokio::select! {
                        () = cancel.cancelled() => Err(GatewayError::Cancelled),
                        result = inner.wait_settled(&lifetime) => result,
                    };
                }
            };

            let running = RunningGuard(Arc::clone(&inner.connect_running));
            let result = tokio::select! {
                () = cancel.cancelled() => Err(GatewayError::Cancelled),
                result = inner.establish(&lifetime) => result,
            };
            drop(running);

            // Only the caller's own cancellation stops the session; a lifetime
            // ended elsewhere (disconnect, failure) has already been handled.
            if cancel.is_cancelled() && !lifetime.is_cancelled() {
                inner.shutdown().await;
            }
            result
        }
        .instrument(inner.span.clone())
        .await
    }

    /// Stop reconnecting, close the transport and forget the session
    pub async fn disconnect(&self) {
        self.inner.shutdown().await;
    }

    /// Send a consumer command once the handshake has completed
    ///
    /// Waits for the connection, then for `limiter` (if any) and the outbound
    /// limiter, then sends. A send that fails because the socket closed
    /// concurrently is retried from the top.
    pub async fn send_command(
        &self,
        message: &GatewayMessage,
        limiter: Option<&RateLimiter>,
        cancel: &CancellationToken,
    ) -> GatewayResult<()> {
        let lifetime = self.inner.lifetime();
        tokio::select! {
            () = cancel.cancelled() => Err(GatewayError::Cancelled),
            result = self.inner.send_with_retry(message, limiter, &lifetime) => result,
        }
    }
}

impl Drop for GatewaySession {
    fn drop(&mut self) {
        self.inner.lifetime().cancel();
    }
}

impl SessionInner {
    fn lifetime(&self) -> CancellationToken {
        self.lifetime.lock().clone()
    }

    fn current_link(&self, generation: u64) -> Option<Arc<Link>> {
        self.link
            .lock()
            .as_ref()
            .filter(|link| link.generation == generation)
            .cloned()
    }

    fn forget_session(&self) {
        *self.session_id.lock() = None;
        self.sequence.reset();
    }

    /// Error to report once the lifetime token has fired
    fn stopped_error(&self, otherwise: GatewayError) -> GatewayError {
        self.failure
            .lock()
            .clone()
            .map_or(otherwise, GatewayError::Fatal)
    }

    /// Start a new lifetime for a consumer-initiated connect
    ///
    /// Joins the running lifetime instead while a connect or reconnect is
    /// still in progress.
    fn begin(&self) -> Attempt {
        let mut slot = self.lifetime.lock();
        let in_progress = self.connect_running.load(Ordering::SeqCst)
            || self.reconnecting.load(Ordering::SeqCst)
            || self.link.lock().is_some();
        if in_progress
            && *self.state.borrow() == ConnectionState::Connecting
            && !slot.is_cancelled()
        {
            return Attempt::Joined(slot.clone());
        }

        let token = CancellationToken::new();
        let previous = std::mem::replace(&mut *slot, token.clone());
        previous.cancel();
        *self.failure.lock() = None;
        self.announce_reconnect.store(false, Ordering::SeqCst);
        self.state.send_replace(ConnectionState::Connecting);
        self.connect_running.store(true, Ordering::SeqCst);
        Attempt::Owner(token)
    }

    async fn establish(self: &Arc<Self>, lifetime: &CancellationToken) -> GatewayResult<()> {
        if let Err(err) = self.connect_loop(lifetime).await {
            if let GatewayError::Fatal(failure) = &err {
                self.fail(failure.clone());
            }
            return Err(err);
        }
        self.wait_settled(lifetime).await
    }

    /// Wait until the handshake completes or the session stops
    async fn wait_settled(&self, lifetime: &CancellationToken) -> GatewayResult<()> {
        let mut state = self.state.subscribe();
        let reached = tokio::select! {
            () = lifetime.cancelled() => None,
            result = state.wait_for(|s| matches!(s, ConnectionState::Connected | ConnectionState::Failed)) => {
                result.ok().map(|s| *s)
            }
        };

        match reached {
            Some(ConnectionState::Connected) => Ok(()),
            _ => Err(self.stopped_error(GatewayError::Cancelled)),
        }
    }

    /// Open a transport, retrying transport-level failures until cancelled
    async fn connect_loop(self: &Arc<Self>, lifetime: &CancellationToken) -> GatewayResult<()> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.open_link(lifetime).await {
                Ok(()) => return Ok(()),
                Err(err @ (GatewayError::Fatal(_) | GatewayError::Cancelled)) => return Err(err),
                Err(err) => {
                    tracing::warn!(
                        attempt,
                        error = %err,
                        retry_in_secs = CONNECT_RETRY_DELAY.as_secs(),
                        "Gateway connect failed"
                    );
                    self.endpoint.invalidate().await;
                    tokio::select! {
                        () = lifetime.cancelled() => return Err(GatewayError::Cancelled),
                        () = tokio::time::sleep(CONNECT_RETRY_DELAY) => {}
                    }
                }
            }
        }
    }

    async fn open_link(self: &Arc<Self>, lifetime: &CancellationToken) -> GatewayResult<()> {
        let url = tokio::select! {
            () = lifetime.cancelled() => return Err(GatewayError::Cancelled),
            url = self.endpoint.url() => match url {
                Ok(url) => url,
                Err(HttpError::Unauthorized) => {
                    return Err(GatewayError::Fatal(
                        ConnectionFailure::new(
                            FailureReason::AuthenticationFailed,
                            "gateway url lookup rejected the bot token",
                        )
                        .with_source(GatewayError::Http(HttpError::Unauthorized)),
                    ));
                }
                Err(err) => return Err(err.into()),
            },
        };

        let socket = Arc::new(GatewaySocket::connect(&url, lifetime).await?);
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let link = Arc::new(Link {
            generation,
            socket,
            heartbeat: Arc::new(HeartbeatState::default()),
            cancel: lifetime.child_token(),
            hello_seen: AtomicBool::new(false),
            tasks: Mutex::new(Vec::new()),
        });

        let installed = {
            let mut slot = self.link.lock();
            if lifetime.is_cancelled() {
                None
            } else {
                Some(slot.replace(Arc::clone(&link)))
            }
        };

        let Some(previous) = installed else {
            link.socket.disconnect(CLOSE_NORMAL, "client disconnect").await;
            return Err(GatewayError::Cancelled);
        };
        if let Some(previous) = previous {
            tracing::debug!(generation = previous.generation, "Replacing leftover connection");
            tokio::spawn(close_link(previous, CLOSE_NORMAL, "replaced".to_string()));
        }

        // Closes on the new link must be able to schedule the next reconnect
        self.reconnecting.store(false, Ordering::SeqCst);
        link.socket.start(Arc::new(LinkHandler {
            session: Arc::downgrade(self),
            generation,
        }));
        tracing::info!(generation, "Gateway socket connected");
        Ok(())
    }

    /// Close the current link, if any, and wait for its tasks
    async fn teardown(&self, code: u16, reason: &str) {
        let link = self.link.lock().take();
        if let Some(link) = link {
            close_link(link, code, reason.to_string()).await;
        }
    }

    async fn shutdown(self: &Arc<Self>) {
        tracing::info!("Disconnecting gateway session");
        self.lifetime().cancel();

        let task = self.reconnect_task.lock().take();
        if let Some(task) = task {
            let _ = task.await;
        }

        self.teardown(CLOSE_NORMAL, "client disconnect").await;
        self.forget_session();
        self.reconnecting.store(false, Ordering::SeqCst);
        self.state.send_replace(ConnectionState::Disconnected);
    }

    /// Record the fatal failure once and stop everything
    fn fail(self: &Arc<Self>, failure: ConnectionFailure) {
        {
            let mut slot = self.failure.lock();
            if slot.is_some() {
                return;
            }
            *slot = Some(failure.clone());
        }

        tracing::error!(reason = %failure.reason, message = %failure.message, "Gateway session failed");
        self.lifetime().cancel();
        self.state.send_replace(ConnectionState::Failed);
        self.listener.on_failed(&failure);

        let inner = Arc::clone(self);
        tokio::spawn(
            async move { inner.teardown(CLOSE_NORMAL, "session failed").await }
                .instrument(self.span.clone()),
        );
    }

    /// Schedule a reconnect unless one is already running or the request is stale
    fn request_reconnect(self: &Arc<Self>, generation: u64, plan: Plan) {
        if self.current_link(generation).is_none() {
            tracing::debug!(generation, reason = %plan.reason, "Ignoring reconnect from stale connection");
            return;
        }
        if self.lifetime().is_cancelled() {
            return;
        }
        if self.reconnecting.swap(true, Ordering::SeqCst) {
            tracing::debug!(reason = %plan.reason, "Reconnect already in progress");
            return;
        }

        let inner = Arc::clone(self);
        let task = tokio::spawn(
            async move {
                // A started link clears the flag itself in `open_link`
                if !inner.reconnect(plan).await {
                    inner.reconnecting.store(false, Ordering::SeqCst);
                }
            }
            .instrument(self.span.clone()),
        );
        *self.reconnect_task.lock() = Some(task);
    }

    /// Returns true once a new link has been started
    async fn reconnect(self: &Arc<Self>, plan: Plan) -> bool {
        let lifetime = self.lifetime();
        let resume = plan.resume && self.session_id.lock().is_some();
        tracing::info!(
            resume,
            delay_ms = plan.delay.map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX)),
            reason = %plan.reason,
            "Reconnecting to gateway"
        );

        self.state.send_replace(ConnectionState::Connecting);
        self.announce_reconnect.store(true, Ordering::SeqCst);
        if !resume {
            self.forget_session();
        }
        self.resume_next.store(resume, Ordering::SeqCst);

        let code = if resume { CLOSE_RESUMABLE } else { CLOSE_NORMAL };
        self.teardown(code, &plan.reason).await;

        if let Some(delay) = plan.delay {
            tokio::select! {
                () = lifetime.cancelled() => return false,
                () = tokio::time::sleep(delay) => {}
            }
        }

        match self.connect_loop(&lifetime).await {
            Ok(()) => return true,
            Err(GatewayError::Fatal(failure)) => self.fail(failure),
            Err(err) => tracing::debug!(error = %err, "Reconnect stopped"),
        }
        false
    }

    async fn send_with_retry(
        &self,
        message: &GatewayMessage,
        limiter: Option<&RateLimiter>,
        lifetime: &CancellationToken,
    ) -> GatewayResult<()> {
        loop {
            self.wait_connected(lifetime).await?;
            if let Some(limiter) = limiter {
                limiter
                    .invoke(lifetime)
                    .await
                    .map_err(|_| self.stopped_error(GatewayError::Disconnected))?;
            }
            self.outbound_limiter
                .invoke(lifetime)
                .await
                .map_err(|_| self.stopped_error(GatewayError::Disconnected))?;

            let link = self.link.lock().clone();
            let result = match link {
                Some(link) => link.socket.send(message).await,
                None => Err(GatewayError::SocketNotOpen),
            };

            match result {
                Ok(()) => return Ok(()),
                Err(err) if err.is_transient() => {
                    tracing::debug!(op = %message.op, error = %err, "Command send failed, retrying");
                    tokio::select! {
                        () = lifetime.cancelled() => return Err(self.stopped_error(GatewayError::Disconnected)),
                        () = tokio::time::sleep(COMMAND_RETRY_DELAY) => {}
                    }
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn wait_connected(&self, lifetime: &CancellationToken) -> GatewayResult<()> {
        let mut state = self.state.subscribe();
        tokio::select! {
            () = lifetime.cancelled() => Err(self.stopped_error(GatewayError::Disconnected)),
            result = state.wait_for(|s| *s == ConnectionState::Connected) => {
                result.map(|_| ()).map_err(|_| GatewayError::Disconnected)
            }
        }
    }

    // === Inbound ===

    fn handle_payload(self: &Arc<Self>, link: &Arc<Link>, message: GatewayMessage) {
        match message.op {
            OpCode::Hello => self.on_hello(link, &message),
            OpCode::HeartbeatAck => link.heartbeat.ack(),
            OpCode::Heartbeat => link.heartbeat.request(),
            OpCode::Dispatch => self.on_dispatch(message),
            OpCode::Reconnect => {
                self.request_reconnect(link.generation, Plan::resume("server requested reconnect"));
            }
            OpCode::InvalidSession => {
                let resumable = message.as_invalid_session().unwrap_or(false);
                self.on_invalid_session(link.generation, resumable);
            }
            op => tracing::warn!(op = %op, "Unexpected opcode from gateway"),
        }
    }

    fn on_hello(self: &Arc<Self>, link: &Arc<Link>, message: &GatewayMessage) {
        let Some(hello) = message.as_hello() else {
            tracing::warn!("Malformed Hello payload");
            return;
        };
        if link.hello_seen.swap(true, Ordering::SeqCst) {
            tracing::warn!("Duplicate Hello ignored");
            return;
        }

        tracing::debug!(heartbeat_interval_ms = hello.heartbeat_interval, "Received Hello");
        let interval = heartbeat_interval(hello.heartbeat_interval);

        let heartbeat = {
            let inner = Arc::clone(self);
            let socket = Arc::clone(&link.socket);
            let state = Arc::clone(&link.heartbeat);
            let sequence = Arc::clone(&self.sequence);
            let cancel = link.cancel.clone();
            let generation = link.generation;
            tokio::spawn(
                async move {
                    match run_heartbeat(socket, interval, state, sequence, cancel).await {
                        HeartbeatExit::AckTimeout => {
                            inner.request_reconnect(generation, Plan::resume("heartbeat ack timeout"));
                        }
                        HeartbeatExit::SendFailed(err) => {
                            tracing::debug!(error = %err, "Heartbeat send failed");
                        }
                        HeartbeatExit::Cancelled => {}
                    }
                }
                .instrument(self.span.clone()),
            )
        };

        let handshake = tokio::spawn(
            Arc::clone(self)
                .send_handshake(Arc::clone(link))
                .instrument(self.span.clone()),
        );

        link.tasks.lock().extend([heartbeat, handshake]);
    }

    async fn send_handshake(self: Arc<Self>, link: Arc<Link>) {
        let session_id = self.session_id.lock().clone();
        let message = match session_id {
            Some(session_id) if self.resume_next.load(Ordering::SeqCst) => {
                let seq = self.sequence.get().unwrap_or(0);
                tracing::info!(session_id = %session_id, seq, "Resuming session");
                GatewayMessage::command(
                    OpCode::Resume,
                    &ResumePayload {
                        token: self.config.token.clone(),
                        session_id,
                        seq,
                    },
                )
            }
            _ => {
                if self.identify_limiter.invoke(&link.cancel).await.is_err() {
                    return;
                }
                tracing::info!(shard = ?self.config.shard, "Identifying new session");
                GatewayMessage::command(
                    OpCode::Identify,
                    &IdentifyPayload::new(
                        self.config.token.clone(),
                        self.config.intents,
                        self.config.large_threshold,
                        self.config.shard,
                    ),
                )
            }
        };

        match message {
            Ok(message) => {
                if let Err(err) = link.socket.send(&message).await {
                    tracing::debug!(op = %message.op, error = %err, "Handshake send failed");
                }
            }
            Err(err) => tracing::error!(error = %err, "Failed to encode handshake"),
        }
    }

    fn on_dispatch(&self, message: GatewayMessage) {
        let Some(event) = message.t else {
            tracing::warn!("Dispatch without event name");
            return;
        };

        if let Some(seq) = message.s {
            if !self.sequence.observe(seq) {
                tracing::warn!(seq, last = ?self.sequence.get(), event = %event, "Out of order sequence ignored");
            }
        }

        match event.as_str() {
            "READY" => {
                match message.d.get("session_id").and_then(Value::as_str) {
                    Some(session_id) => {
                        tracing::info!(session_id, "Session ready");
                        *self.session_id.lock() = Some(session_id.to_string());
                    }
                    None => tracing::warn!("READY without session_id"),
                }
                self.listener.on_dispatch(&event, message.d);
                self.handshake_complete();
            }
            "RESUMED" => {
                tracing::info!(seq = ?self.sequence.get(), "Session resumed");
                self.listener.on_dispatch(&event, message.d);
                self.handshake_complete();
            }
            _ => self.listener.on_dispatch(&event, message.d),
        }
    }

    fn handshake_complete(&self) {
        self.state.send_replace(ConnectionState::Connected);
        if self.announce_reconnect.swap(false, Ordering::SeqCst) {
            self.listener.on_reconnected();
        }
    }

    fn on_invalid_session(self: &Arc<Self>, generation: u64, resumable: bool) {
        let mut rng = rand::thread_rng();
        let plan = if resumable {
            Plan {
                resume: true,
                delay: Some(Duration::from_millis(rng.gen_range(250..1000))),
                reason: "invalid session (resumable)".to_string(),
            }
        } else {
            Plan {
                resume: false,
                delay: Some(Duration::from_millis(rng.gen_range(1000..5000))),
                reason: "invalid session".to_string(),
            }
        };
        self.request_reconnect(generation, plan);
    }

    fn on_close(self: &Arc<Self>, generation: u64, code: u16, reason: &str) {
        tracing::info!(close_code = code, reason, "Gateway closed the connection");

        let plan = match CloseCode::action_for(code) {
            ReconnectAction::Fatal(failure_reason) => {
                if self.current_link(generation).is_some() {
                    let failure = ConnectionFailure::new(
                        failure_reason,
                        format!("gateway closed the connection with {code}: {reason}"),
                    );
                    self.fail(failure);
                }
                return;
            }
            ReconnectAction::Resume => Plan::resume(format!("close code {code}")),
            ReconnectAction::ResumeAfter(delay) => Plan {
                resume: true,
                delay: Some(delay),
                reason: format!("close code {code}"),
            },
            ReconnectAction::Fresh => Plan {
                resume: false,
                delay: None,
                reason: format!("close code {code}"),
            },
        };
        self.request_reconnect(generation, plan);
    }
}

/// Heartbeat period for a Hello interval, clamped to [`MIN_HEARTBEAT_INTERVAL`]
fn heartbeat_interval(millis: u64) -> Duration {
    let interval = Duration::from_millis(millis);
    if interval < MIN_HEARTBEAT_INTERVAL {
        tracing::warn!(
            heartbeat_interval_ms = millis,
            using = ?MIN_HEARTBEAT_INTERVAL,
            "Hello heartbeat interval too small, clamping"
        );
        return MIN_HEARTBEAT_INTERVAL;
    }
    interval
}

async fn close_link(link: Arc<Link>, code: u16, reason: String) {
    link.cancel.cancel();
    link.socket.disconnect(code, &reason).await;
    let tasks = std::mem::take(&mut *link.tasks.lock());
    for task in tasks {
        let _ = task.await;
    }
}

/// Routes one socket's callbacks to the session, tagged with its generation
struct LinkHandler {
    session: Weak<SessionInner>,
    generation: u64,
}

#[async_trait]
impl SocketHandler for LinkHandler {
    async fn handle_payload(&self, message: GatewayMessage) {
        let Some(inner) = self.session.upgrade() else {
            return;
        };
        match inner.current_link(self.generation) {
            Some(link) => inner.handle_payload(&link, message),
            None => tracing::trace!(generation = self.generation, "Frame from stale connection dropped"),
        }
    }

    async fn on_close_received(&self, code: u16, reason: String) {
        if let Some(inner) = self.session.upgrade() {
            inner.on_close(self.generation, code, &reason);
        }
    }

    async fn on_closed_prematurely(&self) {
        if let Some(inner) = self.session.upgrade() {
            tracing::info!("Gateway connection dropped without close frame");
            inner.request_reconnect(self.generation, Plan::resume("connection dropped"));
        }
    }
}
