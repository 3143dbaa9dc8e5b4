//! The transport adapter: reads the wire one byte at a time and forwards it
//! to a session actor, detecting disconnect. Grounded on `servetelnet.go`'s
//! `ServeTELNET`, which does exactly this and nothing more: all command
//! interpretation happens in the session (there, the doppelganger
//! goroutine).
//!
//! This also owns the raw write-side codec (writes pass through untouched;
//! there is no framing on the wire) and the telnet option-negotiation
//! preamble, since both are strictly about what goes on the socket, not
//! about session state.

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_util::codec::Encoder;

use crate::ids::SessionId;
use crate::persistence::Persistence;
use crate::registry::Registry;
use crate::session::actor::Session;
use crate::session::{InboundByte, PeerGone};

use actix::prelude::*;

/// Telnet option negotiation sent on connect: WILL suppress-go-ahead, WILL
/// echo, then a CRLF to settle the client's terminal. Lifted unchanged from
/// `servetelnet.go`'s connection preamble (the original relies on its
/// telnet library to send the equivalent bytes before handing the
/// connection to `ServeTELNET`).
pub const TELNET_PREAMBLE: &[u8] = &[255, 251, 3, 255, 251, 1, 13, 10];

/// A no-op `Encoder`: every write is already a complete, final byte
/// sequence (a prompt, a line, an echoed keystroke) by the time it reaches
/// the wire, so framing would only get in the way.
pub struct RawCodec;

impl Encoder<Vec<u8>> for RawCodec {
    type Error = std::io::Error;

    fn encode(&mut self, item: Vec<u8>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.extend_from_slice(&item);
        Ok(())
    }
}

/// Accepts one connection: negotiates telnet options, spawns the session
/// actor on the write half, then drives the read half's byte-at-a-time loop
/// until disconnect.
pub async fn handle_connection(
    session_id: SessionId,
    mut stream: TcpStream,
    persistence: Persistence,
    registry: Addr<Registry>,
) {
    if let Err(err) = stream.write_all(TELNET_PREAMBLE).await {
        log::warn!("session {session_id} telnet negotiation failed: {err}");
        return;
    }

    let (mut read_half, write_half) = tokio::io::split(stream);
    let addr = Session::create(|ctx| Session::new(session_id, persistence, registry, write_half, ctx));

    let mut byte = [0u8; 1];
    loop {
        match read_half.read(&mut byte).await {
            Ok(0) => break,
            Ok(_) => {
                let b = byte[0];
                addr.do_send(InboundByte(b));
                if b == 3 || b == 4 {
                    // ^C or ^D: the original treats these as an explicit
                    // disconnect request rather than waiting for the
                    // socket to actually close.
                    break;
                }
            }
            Err(err) => {
                log::debug!("session {session_id} read error: {err}");
                break;
            }
        }
    }
    addr.do_send(PeerGone);
}
