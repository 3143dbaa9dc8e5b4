//! The heartbeat actor: a one-second tick into the registry for
//! observability, plus a log line giving the operator a rough read on how
//! many sessions are alive. Grounded on `heartbeat.go`'s
//! `heartbeatGoroutine`, which ticks the channel master and prints a
//! goroutine count every second; we print the session actor count instead,
//! since actix gives us that directly rather than a runtime-wide goroutine
//! census.

use std::time::Duration;

use actix::prelude::*;

use crate::registry::{Registry, Tick};
use crate::session::ACTIVE_SESSIONS;

pub struct Heartbeat {
    registry: Addr<Registry>,
    interval: Duration,
}

impl Heartbeat {
    pub fn new(registry: Addr<Registry>, interval: Duration) -> Self {
        Self { registry, interval }
    }
}

impl Actor for Heartbeat {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        ctx.run_interval(self.interval, |actor, _ctx| {
            actor.registry.do_send(Tick);
            log::info!(
                "heartbeat: {} session(s) active",
                ACTIVE_SESSIONS.load(std::sync::atomic::Ordering::Relaxed)
            );
        });
    }
}
