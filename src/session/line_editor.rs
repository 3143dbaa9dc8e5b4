//! Byte-at-a-time line assembly, replacing the original's inline handling
//! of backspace, the left-arrow escape sequence and CR/LF pairing inside
//! `doppelgangerGoroutine`'s big read loop.
//!
//! The server negotiates `IAC WILL ECHO` on connect, so every printed
//! character the client sees is something we chose to send back: this
//! module decides what that is.

#[derive(Default)]
enum EscapeState {
    #[default]
    None,
    SawEscape,
    SawBracket,
}

#[derive(Default)]
pub struct LineEditor {
    buffer: String,
    escape: EscapeState,
    swallow_next_lf: bool,
}

/// What happened as a result of feeding one byte in.
#[derive(Default)]
pub struct Feed {
    /// Bytes the transport should write back to the client.
    pub echo: Vec<u8>,
    /// `Some(line)` once a CR, LF or CRLF pair completes the buffer. Submit
    /// itself echoes nothing: the caller erases the prompt and echoed
    /// buffer in place and writes whatever the line resolves to (a
    /// command's reply, or the originator's own formatted chat line) over
    /// top of it, the same way the original's `genericTextOutput` replaces
    /// the typed line instead of leaving it on screen above the reply.
    pub submitted: Option<String>,
}

/// The three bytes that erase one already-echoed column: back up, overwrite
/// with a space, back up again. Also reused by the session actor to erase a
/// whole prompt line ahead of an asynchronous room event.
pub const BACKSPACE_ERASE: &[u8] = b"\x08 \x08";

impl LineEditor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, byte: u8, echo_on: bool) -> Feed {
        let mut feed = Feed::default();

        if self.swallow_next_lf {
            self.swallow_next_lf = false;
            if byte == b'\n' {
                return feed;
            }
        }

        match std::mem::take(&mut self.escape) {
            EscapeState::SawEscape => {
                self.escape = if byte == b'[' {
                    EscapeState::SawBracket
                } else {
                    EscapeState::None
                };
                return feed;
            }
            EscapeState::SawBracket => {
                // Left arrow is treated like backspace; the other three
                // cursor keys are accepted and silently ignored.
                if byte == b'D' {
                    self.backspace(echo_on, &mut feed);
                }
                return feed;
            }
            EscapeState::None => {}
        }

        match byte {
            b'\r' | b'\n' => {
                self.swallow_next_lf = byte == b'\r';
                feed.submitted = Some(std::mem::take(&mut self.buffer));
            }
            0x7f | 0x08 => self.backspace(echo_on, &mut feed),
            0x1b => self.escape = EscapeState::SawEscape,
            0x20..=0x7e => {
                self.buffer.push(byte as char);
                if echo_on {
                    feed.echo.push(byte);
                }
            }
            _ => {}
        }

        feed
    }

    fn backspace(&mut self, echo_on: bool, feed: &mut Feed) {
        if self.buffer.pop().is_some() && echo_on {
            feed.echo.extend_from_slice(BACKSPACE_ERASE);
        }
    }

    pub fn current(&self) -> &str {
        &self.buffer
    }
}
