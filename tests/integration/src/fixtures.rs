//! Gateway frames as the server sends them
//!
//! Built as raw JSON rather than through the client's own types, so the
//! tests also cover the wire format.

use serde_json::{json, Value};

pub const SESSION_ID: &str = "abc123";
pub const BOT_USER_ID: &str = "1";
pub const GUILD_ID: &str = "10";

/// Op 10 with the given heartbeat interval in milliseconds
pub fn hello(heartbeat_interval: u64) -> Value {
    json!({"op": 10, "d": {"heartbeat_interval": heartbeat_interval}})
}

pub fn heartbeat_ack() -> Value {
    json!({"op": 11, "d": null})
}

/// Op 1 sent by the server: asks for an immediate beat
pub fn heartbeat_request() -> Value {
    json!({"op": 1, "d": null})
}

pub fn reconnect() -> Value {
    json!({"op": 7, "d": null})
}

pub fn invalid_session(resumable: bool) -> Value {
    json!({"op": 9, "d": resumable})
}

pub fn dispatch(event: &str, seq: u64, data: Value) -> Value {
    json!({"op": 0, "s": seq, "t": event, "d": data})
}

/// READY for the bot user with guild 10 pending
pub fn ready(seq: u64) -> Value {
    dispatch(
        "READY",
        seq,
        json!({
            "v": 6,
            "user": {
                "id": BOT_USER_ID,
                "username": "test-bot",
                "discriminator": "0001",
                "avatar": null,
                "bot": true
            },
            "guilds": [{"id": GUILD_ID, "unavailable": true}],
            "private_channels": [],
            "session_id": SESSION_ID
        }),
    )
}

pub fn resumed(seq: u64) -> Value {
    dispatch("RESUMED", seq, json!({}))
}

/// Guild 10 with two text channels and two members
pub fn guild_create(seq: u64) -> Value {
    dispatch(
        "GUILD_CREATE",
        seq,
        json!({
            "id": GUILD_ID,
            "name": "Test",
            "owner_id": "2",
            "member_count": 2,
            "large": false,
            "unavailable": false,
            "joined_at": "2020-01-01T00:00:00+00:00",
            "roles": [
                {"id": GUILD_ID, "name": "@everyone", "permissions": 104_324_161, "position": 0}
            ],
            "channels": [
                {"id": "5", "type": 0, "name": "general", "position": 0},
                {"id": "6", "type": 0, "name": "random", "position": 1}
            ],
            "members": [
                member("1", "test-bot"),
                member("2", "owner")
            ],
            "emojis": [],
            "voice_states": [],
            "presences": [
                {"user": {"id": "2"}, "status": "online", "game": null}
            ]
        }),
    )
}

pub fn member(user_id: &str, username: &str) -> Value {
    json!({
        "user": {"id": user_id, "username": username, "discriminator": "0001"},
        "roles": [],
        "joined_at": "2020-01-01T00:00:00+00:00",
        "deaf": false,
        "mute": false
    })
}

pub fn message_create(seq: u64, id: &str, channel_id: &str, content: &str) -> Value {
    dispatch(
        "MESSAGE_CREATE",
        seq,
        json!({
            "id": id,
            "channel_id": channel_id,
            "guild_id": GUILD_ID,
            "author": {"id": "2", "username": "owner", "discriminator": "0001"},
            "content": content,
            "timestamp": "2020-01-01T00:00:00+00:00",
            "tts": false,
            "mention_everyone": false,
            "mentions": [],
            "pinned": false,
            "type": 0
        }),
    )
}

pub fn message_delete_bulk(seq: u64, channel_id: &str, ids: &[&str]) -> Value {
    dispatch(
        "MESSAGE_DELETE_BULK",
        seq,
        json!({"channel_id": channel_id, "guild_id": GUILD_ID, "ids": ids}),
    )
}
