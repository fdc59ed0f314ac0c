//! Connection management
//!
//! Rate limiting, the WebSocket wrapper, heartbeats, the endpoint cache and
//! the session state machine built on top of them.

mod endpoint;
mod heartbeat;
mod rate_limiter;
mod session;
mod socket;

pub use endpoint::{connect_url, GatewayEndpoint, GATEWAY_URL_KEY};
pub use heartbeat::{run_heartbeat, HeartbeatExit, HeartbeatState, Sequence};
pub use rate_limiter::RateLimiter;
pub use session::{
    ConnectionState, GatewaySession, SessionConfig, SessionListener, COMMAND_RETRY_DELAY,
    CONNECT_RETRY_DELAY,
};
pub use socket::{GatewaySocket, SocketHandler, CLOSE_TIMEOUT};
