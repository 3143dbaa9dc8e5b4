//! The room actor: one per live channel, owns the roster and the
//! transcript file. Grounded on `chatchannel.go`'s
//! `processMessageFromChannelMaster` / `distributeMessageToEveryoneInChatChannel`.

use std::fs::{File, OpenOptions};
#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;

use actix::prelude::*;

use crate::ids::{AccountId, RoomId, SessionId};
use crate::registry::{Registry, RoomJoinDenied};
use crate::room::{Exit, Join, RoomEvent, Shutdown, TextMessage, Who};
use crate::utils::{self, new_fast_hashmap, write_all_looped};

struct Member {
    account_id: AccountId,
    display_name: String,
    reply: Recipient<RoomEvent>,
}

pub struct Room {
    room_id: RoomId,
    room_name: String,
    capacity: usize,
    roster: ahash::HashMap<SessionId, Member>,
    transcript: File,
    registry: Addr<Registry>,
    bootstrap: Option<Join>,
}

impl Room {
    pub fn new(
        room_id: RoomId,
        room_name: String,
        capacity: usize,
        registry: Addr<Registry>,
        bootstrap: Join,
        transcripts_dir: &std::path::Path,
    ) -> std::io::Result<Self> {
        let filename = format!("{}.channel.log", utils::deslash(&room_name));
        let path = transcripts_dir.join(filename);
        let mut options = OpenOptions::new();
        options.append(true).create(true);
        #[cfg(unix)]
        options.mode(0o644);
        let transcript = options.open(path)?;
        Ok(Self {
            room_id,
            room_name,
            capacity,
            roster: new_fast_hashmap(capacity),
            transcript,
            registry,
            bootstrap: Some(bootstrap),
        })
    }

    /// Transcript lines are written as `<timestamp> <body>`, matching
    /// `logConversationMessage`'s callers in `chatchannel.go`: join/exit
    /// notices wrap their body in angle brackets, plain chat text does not
    /// (the caller decides which by what it hands in here).
    fn log_transcript(&mut self, body: &str) {
        let stamped = format!("{} {}\n", utils::timestamp_now(), body);
        if let Err(err) = write_all_looped(&mut self.transcript, stamped.as_bytes()) {
            log::error!("room {} transcript write failed: {err}", self.room_id);
        }
    }

    /// Common admission path for both the room's first member (handed in
    /// via the constructor, replayed from `started()`) and every later
    /// joiner forwarded by the registry.
    ///
    /// Ordering matches `processMessageFromChannelMaster`'s join case: the
    /// joiner is added to the roster before the roster listing is built, so
    /// "On this channel: ..." includes the joiner's own name, and only then
    /// do existing members get the "has joined" announcement.
    fn admit(&mut self, msg: Join, ctx: &mut Context<Self>) {
        if self.roster.len() >= self.capacity {
            let _ = msg
                .room_reply
                .do_send(RoomEvent::Denied("Channel is full".to_string()));
            self.registry.do_send(RoomJoinDenied {
                room_id: self.room_id,
            });
            return;
        }

        let _ = msg.room_reply.do_send(RoomEvent::Joined {
            room_id: self.room_id,
            room_name: self.room_name.clone(),
            room_addr: ctx.address(),
        });

        self.roster.insert(
            msg.session_id,
            Member {
                account_id: msg.account_id,
                display_name: msg.display_name.clone(),
                reply: msg.room_reply.clone(),
            },
        );

        self.tell_roster(&msg.room_reply);

        let announce = format!("{} has joined #{}", msg.display_name, self.room_name);
        self.broadcast(0, &announce, Some(msg.session_id));
        self.log_transcript(&format!("<{} has JOINED #{}>", msg.display_name, self.room_name));
    }

    fn tell_roster(&self, reply: &Recipient<RoomEvent>) {
        let mut names: Vec<&str> = self
            .roster
            .values()
            .map(|m| m.display_name.as_str())
            .collect();
        names.sort_unstable();
        let body = format!("On this channel: {}", names.join(", "));
        let _ = reply.do_send(RoomEvent::Text {
            originator_account_id: 0,
            body,
        });
    }

    /// Sends `body` to every current member, optionally skipping one
    /// session (the joiner itself already got its own admission text via
    /// `tell_roster`).
    fn broadcast(&self, originator_account_id: AccountId, body: &str, skip: Option<SessionId>) {
        for (session_id, member) in &self.roster {
            if Some(*session_id) == skip {
                continue;
            }
            let _ = member.reply.do_send(RoomEvent::Text {
                originator_account_id,
                body: body.to_string(),
            });
        }
    }
}

impl Actor for Room {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        log::info!("room {} (#{}) open", self.room_id, self.room_name);
        if let Some(bootstrap) = self.bootstrap.take() {
            self.admit(bootstrap, ctx);
        }
    }
}

impl Handler<Join> for Room {
    type Result = ();

    fn handle(&mut self, msg: Join, ctx: &mut Self::Context) -> Self::Result {
        self.admit(msg, ctx);
    }
}

impl Handler<Who> for Room {
    type Result = ();

    fn handle(&mut self, msg: Who, _ctx: &mut Self::Context) -> Self::Result {
        self.tell_roster(&msg.room_reply);
    }
}

impl Handler<Exit> for Room {
    type Result = ();

    fn handle(&mut self, msg: Exit, _ctx: &mut Self::Context) -> Self::Result {
        let Some(member) = self.roster.remove(&msg.session_id) else {
            return;
        };
        let departure = format!("{} has left #{}", member.display_name, self.room_name);
        for other in self.roster.values() {
            let _ = other.reply.do_send(RoomEvent::Exit {
                leaving_session_id: msg.session_id,
                body: departure.clone(),
            });
        }
        let _ = member.reply.do_send(RoomEvent::Exit {
            leaving_session_id: msg.session_id,
            body: format!("You left #{}", self.room_name),
        });
        self.log_transcript(&format!("<{} has EXITED #{}>", member.display_name, self.room_name));
    }
}

impl Handler<TextMessage> for Room {
    type Result = ();

    fn handle(&mut self, msg: TextMessage, _ctx: &mut Self::Context) -> Self::Result {
        if !self.roster.contains_key(&msg.session_id) {
            return;
        }
        self.log_transcript(&msg.body);
        self.broadcast(msg.account_id, &msg.body, None);
    }
}

impl Handler<Shutdown> for Room {
    type Result = ();

    fn handle(&mut self, _msg: Shutdown, ctx: &mut Self::Context) -> Self::Result {
        if let Err(err) = self.transcript.sync_all() {
            log::error!("room {} transcript close failed: {err}", self.room_id);
        }
        log::info!("room {} (#{}) closed", self.room_id, self.room_name);
        ctx.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    /// A stand-in for a session actor: captures every `RoomEvent` it's
    /// sent onto a channel the test can drain, instead of rendering it to
    /// a terminal.
    struct Catcher(mpsc::UnboundedSender<RoomEvent>);

    impl Actor for Catcher {
        type Context = Context<Self>;
    }

    impl Handler<RoomEvent> for Catcher {
        type Result = ();
        fn handle(&mut self, msg: RoomEvent, _ctx: &mut Self::Context) -> Self::Result {
            let _ = self.0.send(msg);
        }
    }

    fn catcher() -> (Recipient<RoomEvent>, mpsc::UnboundedReceiver<RoomEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Catcher(tx).start().recipient(), rx)
    }

    async fn room(capacity: usize) -> (Addr<Room>, mpsc::UnboundedReceiver<RoomEvent>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        // A real Registry actor is started so capacity-denial's
        // `RoomJoinDenied` send has somewhere to land; these tests never
        // need it to actually resolve a room name through persistence.
        let persistence = crate::persistence::Persistence::connect(":memory:")
            .await
            .unwrap();
        let registry = crate::registry::Registry::new(persistence, capacity).start();
        let (first_reply, rx) = catcher();
        let bootstrap = Join {
            session_id: 1,
            account_id: 100,
            display_name: "alice".to_string(),
            room_reply: first_reply,
        };
        let room = Room::new(7, "lobby".to_string(), capacity, registry, bootstrap, dir.path()).unwrap();
        (room.start(), rx, dir)
    }

    #[actix_rt::test]
    async fn solo_admission_lists_only_self() {
        let (_room, mut rx, _dir) = room(6).await;
        // Joined, then the roster listing.
        assert!(matches!(rx.recv().await.unwrap(), RoomEvent::Joined { .. }));
        match rx.recv().await.unwrap() {
            RoomEvent::Text { body, .. } => assert_eq!(body, "On this channel: alice"),
            other => panic!("expected roster text, got {other:?}"),
        }
    }

    #[actix_rt::test]
    async fn seventh_join_is_denied_without_leaking_refcount() {
        let (room_addr, _first, _dir) = room(6).await;
        for n in 2..=6u32 {
            let (reply, _rx) = catcher();
            room_addr.do_send(Join {
                session_id: n as i64,
                account_id: n as i64 * 100,
                display_name: format!("user{n}"),
                room_reply: reply,
            });
        }
        tokio::task::yield_now().await;
        let (reply, mut rx) = catcher();
        room_addr.do_send(Join {
            session_id: 99,
            account_id: 9900,
            display_name: "overflow".to_string(),
            room_reply: reply,
        });
        match rx.recv().await.unwrap() {
            RoomEvent::Denied(text) => assert_eq!(text, "Channel is full"),
            other => panic!("expected denial, got {other:?}"),
        }
    }

    #[actix_rt::test]
    async fn exit_sends_you_left_to_the_leaver() {
        let (room_addr, mut rx, _dir) = room(6).await;
        let _ = rx.recv().await; // Joined
        let _ = rx.recv().await; // roster text
        room_addr.do_send(Exit { session_id: 1 });
        match rx.recv().await.unwrap() {
            RoomEvent::Exit { leaving_session_id, body } => {
                assert_eq!(leaving_session_id, 1);
                assert_eq!(body, "You left #lobby");
            }
            other => panic!("expected exit notice, got {other:?}"),
        }
    }
}
