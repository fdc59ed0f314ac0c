//! Heartbeat loop and sequence tracking

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::GatewaySocket;
use crate::error::GatewayError;
use crate::protocol::GatewayMessage;

/// Last dispatch sequence of the current session; 0 means none seen yet
#[derive(Debug, Default)]
pub struct Sequence(AtomicU64);

impl Sequence {
    pub fn get(&self) -> Option<u64> {
        match self.0.load(Ordering::SeqCst) {
            0 => None,
            seq => Some(seq),
        }
    }

    /// Record `seq`, keeping the running maximum. Returns false for a stale value.
    pub fn observe(&self, seq: u64) -> bool {
        self.0.fetch_max(seq, Ordering::SeqCst) <= seq
    }

    pub fn reset(&self) {
        self.0.store(0, Ordering::SeqCst);
    }
}

/// Per-connection heartbeat bookkeeping shared with the receive loop
#[derive(Debug)]
pub struct HeartbeatState {
    acked: AtomicBool,
    requested: Notify,
    sent_at: Mutex<Option<Instant>>,
    latency: Mutex<Option<Duration>>,
}

impl Default for HeartbeatState {
    fn default() -> Self {
        Self {
            acked: AtomicBool::new(true),
            requested: Notify::new(),
            sent_at: Mutex::new(None),
            latency: Mutex::new(None),
        }
    }
}

impl HeartbeatState {
    pub fn ack(&self) {
        self.acked.store(true, Ordering::SeqCst);
        if let Some(sent_at) = *self.sent_at.lock() {
            *self.latency.lock() = Some(sent_at.elapsed());
        }
    }

    /// Server asked for a beat out of band
    pub fn request(&self) {
        self.requested.notify_one();
    }

    /// Round trip of the last acknowledged beat
    pub fn latency(&self) -> Option<Duration> {
        *self.latency.lock()
    }
}

/// Why the heartbeat loop stopped
#[derive(Debug)]
pub enum HeartbeatExit {
    Cancelled,
    /// No ack arrived before the next beat was due
    AckTimeout,
    SendFailed(GatewayError),
}

/// Beat immediately, then every `interval` until cancelled or an ack is missed
///
/// Out-of-band requests are answered at once and leave the interval schedule alone.
pub async fn run_heartbeat(
    socket: Arc<GatewaySocket>,
    interval: Duration,
    state: Arc<HeartbeatState>,
    sequence: Arc<Sequence>,
    cancel: CancellationToken,
) -> HeartbeatExit {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            () = cancel.cancelled() => return HeartbeatExit::Cancelled,
            _ = ticker.tick() => {
                if !state.acked.swap(false, Ordering::SeqCst) {
                    tracing::warn!("Heartbeat ack not received in time");
                    return HeartbeatExit::AckTimeout;
                }
            }
            () = state.requested.notified() => {
                tracing::debug!("Server requested heartbeat");
            }
        }

        let seq = sequence.get();
        tracing::trace!(seq, "Sending heartbeat");
        *state.sent_at.lock() = Some(Instant::now());
        if let Err(err) = socket.send(&GatewayMessage::heartbeat(seq)).await {
            return HeartbeatExit::SendFailed(err);
        }
    }
}
