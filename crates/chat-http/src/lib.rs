//! # chat-http
//!
//! The one REST call the gateway layer makes itself: resolving the gateway
//! endpoint URL. Everything else over REST belongs to the consuming application.

mod client;
mod error;
mod provider;

pub use client::{GatewayBotInfo, RestClient, SessionStartLimit};
pub use error::HttpError;
pub use provider::{GatewayUrlProvider, StaticGatewayUrl};
