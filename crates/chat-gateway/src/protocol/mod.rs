//! Gateway protocol definitions
//!
//! Op codes, close codes and their reconnect decisions, frame format and payloads.

mod close_codes;
mod messages;
mod opcodes;
mod payloads;

pub use close_codes::{CloseCode, ReconnectAction};
pub use messages::GatewayMessage;
pub use opcodes::OpCode;
pub use payloads::{
    HelloPayload, IdentifyPayload, IdentifyProperties, RequestGuildMembersPayload, ResumePayload,
    StatusUpdatePayload, VoiceStateUpdatePayload,
};
