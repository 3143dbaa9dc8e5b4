//! The registry actor: the one piece of global state every session and
//! room shares. It owns the mapping from room name to room id (via the
//! persistence gateway) and from room id to the live `Room` actor, and it
//! is the only thing allowed to create or retire a room.
//!
//! Grounded on `channelmaster.go`'s `channelMasterGoroutine`, which is a
//! single select loop fed by every doppelganger and chat channel in the
//! process; here the same single-writer discipline falls out of actix's
//! one actor, one mailbox rule instead of an explicit `select`.

use actix::prelude::*;

use crate::ids::{AccountId, RoomId, SessionId};
use crate::persistence::Persistence;
use crate::room;
use crate::utils;

/// Sent back to a session directly by the registry, before any room gets
/// involved (covers the join failures the original reports from
/// `channelMasterGoroutine` itself: blank name, unknown channel, database
/// error) and the "you are not on a channel" reply to a stray `/exit`.
#[derive(Message, Debug)]
#[rtype(result = "()")]
pub enum RegistryEvent {
    Denied(String),
    Notice(String),
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct Join {
    pub session_id: SessionId,
    pub account_id: AccountId,
    pub display_name: String,
    pub room_name: String,
    pub registry_reply: Recipient<RegistryEvent>,
    pub room_reply: Recipient<room::RoomEvent>,
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct Who {
    pub session_id: SessionId,
    pub room_id: RoomId,
    pub room_reply: Recipient<room::RoomEvent>,
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct Exit {
    pub session_id: SessionId,
    pub room_id: RoomId,
    pub registry_reply: Recipient<RegistryEvent>,
}

/// Reported by a room when it refuses an admission it already had a
/// reservation for (capacity reached between the registry's forward and
/// the room's own check), so the registry can give the seat back.
#[derive(Message)]
#[rtype(result = "()")]
pub struct RoomJoinDenied {
    pub room_id: RoomId,
}

/// Heartbeat tick, logged the way `heartbeatGoroutine` logs goroutine
/// counts, except the only live count actix gives us cheaply is how many
/// rooms are open.
#[derive(Message)]
#[rtype(result = "()")]
pub struct Tick;

struct RoomHandle {
    addr: Addr<room::actor::Room>,
    refcount: usize,
}

pub struct Registry {
    persistence: Persistence,
    room_capacity: usize,
    transcripts_dir: std::path::PathBuf,
    rooms: ahash::HashMap<RoomId, RoomHandle>,
}

impl Registry {
    pub fn new(persistence: Persistence, room_capacity: usize) -> Self {
        Self::with_transcripts_dir(persistence, room_capacity, ".")
    }

    pub fn with_transcripts_dir(
        persistence: Persistence,
        room_capacity: usize,
        transcripts_dir: impl Into<std::path::PathBuf>,
    ) -> Self {
        Self {
            persistence,
            room_capacity,
            transcripts_dir: transcripts_dir.into(),
            rooms: utils::new_fast_hashmap(16),
        }
    }
}

impl Actor for Registry {
    type Context = Context<Self>;

    fn started(&mut self, _ctx: &mut Self::Context) {
        log::info!("registry online, room capacity {}", self.room_capacity);
    }
}

impl Handler<Join> for Registry {
    type Result = ResponseActFuture<Self, ()>;

    fn handle(&mut self, msg: Join, _ctx: &mut Self::Context) -> Self::Result {
        let room_name = utils::trim(&msg.room_name).to_string();
        if room_name.is_empty() {
            let _ = msg
                .registry_reply
                .do_send(RegistryEvent::Denied("please specify a channel name".into()));
            return Box::pin(async {}.into_actor(self));
        }

        let persistence = self.persistence.clone();
        Box::pin(
            async move { persistence.channel_id(&room_name).await }
                .into_actor(self)
                .map(move |result, actor, ctx| match result {
                    Err(err) => {
                        log::error!("channel lookup for {room_name:?} failed: {err}");
                        let _ = msg
                            .registry_reply
                            .do_send(RegistryEvent::Denied("database error".into()));
                    }
                    Ok(0) => {
                        let _ = msg.registry_reply.do_send(RegistryEvent::Denied(format!(
                            "#{room_name} does not exist"
                        )));
                    }
                    Ok(room_id) => actor.forward_join(room_id, room_name, msg, ctx),
                }),
        )
    }
}

impl Registry {
    fn forward_join(&mut self, room_id: RoomId, room_name: String, msg: Join, ctx: &mut Context<Self>) {
        if let Some(handle) = self.rooms.get_mut(&room_id) {
            handle.refcount += 1;
            handle.addr.do_send(room::Join {
                session_id: msg.session_id,
                account_id: msg.account_id,
                display_name: msg.display_name,
                room_reply: msg.room_reply,
            });
            return;
        }

        let bootstrap = room::Join {
            session_id: msg.session_id,
            account_id: msg.account_id,
            display_name: msg.display_name,
            room_reply: msg.room_reply,
        };
        match room::actor::Room::new(
            room_id,
            room_name,
            self.room_capacity,
            ctx.address(),
            bootstrap,
            &self.transcripts_dir,
        ) {
            Ok(room) => {
                let addr = room.start();
                self.rooms.insert(room_id, RoomHandle { addr, refcount: 1 });
            }
            Err(err) => {
                log::error!("could not open transcript for room {room_id}: {err}");
                let _ = msg
                    .registry_reply
                    .do_send(RegistryEvent::Denied("database error".into()));
            }
        }
    }
}

impl Handler<Who> for Registry {
    type Result = ();

    fn handle(&mut self, msg: Who, _ctx: &mut Self::Context) -> Self::Result {
        match self.rooms.get(&msg.room_id) {
            Some(handle) => handle.addr.do_send(room::Who {
                session_id: msg.session_id,
                room_reply: msg.room_reply,
            }),
            None => log::warn!("who request for unknown room {}", msg.room_id),
        }
    }
}

impl Handler<Exit> for Registry {
    type Result = ();

    fn handle(&mut self, msg: Exit, _ctx: &mut Self::Context) -> Self::Result {
        if msg.room_id == 0 {
            let _ = msg
                .registry_reply
                .do_send(RegistryEvent::Notice("you are not on a channel".into()));
            return;
        }
        let Some(handle) = self.rooms.get_mut(&msg.room_id) else {
            log::warn!("exit request for unknown room {}", msg.room_id);
            return;
        };
        handle.addr.do_send(room::Exit {
            session_id: msg.session_id,
        });
        handle.refcount -= 1;
        if handle.refcount == 0 {
            handle.addr.do_send(room::Shutdown);
            self.rooms.remove(&msg.room_id);
        }
    }
}

impl Handler<RoomJoinDenied> for Registry {
    type Result = ();

    fn handle(&mut self, msg: RoomJoinDenied, _ctx: &mut Self::Context) -> Self::Result {
        let Some(handle) = self.rooms.get_mut(&msg.room_id) else {
            return;
        };
        handle.refcount = handle.refcount.saturating_sub(1);
        if handle.refcount == 0 {
            handle.addr.do_send(room::Shutdown);
            self.rooms.remove(&msg.room_id);
        }
    }
}

impl Handler<Tick> for Registry {
    type Result = ();

    fn handle(&mut self, _msg: Tick, _ctx: &mut Self::Context) -> Self::Result {
        log::info!("heartbeat: {} channel(s) open", self.rooms.len());
    }
}
