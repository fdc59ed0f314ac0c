//! Integration test utilities for the gateway client
//!
//! This crate provides an in-process fake gateway and payload builders for
//! running the client end to end over real WebSocket connections.

pub mod fixtures;
pub mod helpers;

pub use fixtures::*;
pub use helpers::*;
