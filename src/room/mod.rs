//! Message types a room actor receives and sends. The actor itself lives in
//! `actor.rs`; this module only holds the wire vocabulary so `registry` and
//! `session` can depend on it without depending on the implementation.

pub mod actor;

use actix::prelude::*;

use crate::ids::{AccountId, RoomId, SessionId};

/// Forwarded from the registry, or handed to a brand new room as its first
/// message. Grounds `chatchannel.go`'s "user requests permission to join
/// the channel" case of `processMessageFromChannelMaster`.
#[derive(Message)]
#[rtype(result = "()")]
pub struct Join {
    pub session_id: SessionId,
    pub account_id: AccountId,
    pub display_name: String,
    pub room_reply: Recipient<RoomEvent>,
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct Who {
    pub session_id: SessionId,
    pub room_reply: Recipient<RoomEvent>,
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct Exit {
    pub session_id: SessionId,
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct Shutdown;

/// Ordinary chat text, directly addressed to the room the session already
/// holds an `Addr` for (no registry hop needed once a session is seated).
#[derive(Message)]
#[rtype(result = "()")]
pub struct TextMessage {
    pub session_id: SessionId,
    pub account_id: AccountId,
    pub body: String,
}

/// What a room tells a seated (or seat-seeking) session.
#[derive(Message, Debug)]
#[rtype(result = "()")]
pub enum RoomEvent {
    Denied(String),
    Joined {
        room_id: RoomId,
        room_name: String,
        room_addr: Addr<actor::Room>,
    },
    /// `originator_account_id` of 0 marks system/roster text nobody typed,
    /// matching the original's "account id zero means nobody" convention so
    /// a session's self-echo check (`originator == my account id`) never
    /// mistakes it for its own line.
    Text {
        originator_account_id: AccountId,
        body: String,
    },
    /// `leaving_session_id` lets the session that is actually leaving tell
    /// itself apart from a roommate with the same account logged in twice.
    Exit {
        leaving_session_id: SessionId,
        body: String,
    },
}
