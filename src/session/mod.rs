//! Per-connection session actor and its supporting state machines.
//!
//! Replaces the original's `-1`/`0` room-id sentinels (not on a channel /
//! join in flight / seated in room N) with an explicit enum, per the
//! redesign direction spec.md calls out for that part of `doppelganger.go`.

pub mod actor;
pub mod commands;
pub mod line_editor;
pub mod login;

use std::sync::atomic::AtomicUsize;

use actix::prelude::*;

use crate::ids::RoomId;
use crate::room;

/// Count of live session actors, maintained from `Session::started`/
/// `stopped` for the heartbeat to log, standing in for actix's lack of a
/// direct "how many actors of this type are alive" query.
pub static ACTIVE_SESSIONS: AtomicUsize = AtomicUsize::new(0);

#[derive(Default)]
pub enum RoomMembership {
    #[default]
    None,
    Pending,
    Joined {
        room_id: RoomId,
        room_addr: Addr<room::actor::Room>,
    },
}

impl RoomMembership {
    pub fn room_id(&self) -> RoomId {
        match self {
            RoomMembership::Joined { room_id, .. } => *room_id,
            _ => 0,
        }
    }
}

/// One byte read off the wire by the transport adapter.
#[derive(Message)]
#[rtype(result = "()")]
pub struct InboundByte(pub u8);

/// The transport adapter observed EOF or a read/write error and believes
/// the TCP connection is gone.
#[derive(Message)]
#[rtype(result = "()")]
pub struct PeerGone;
