//! Narrow integer id spaces shared across the registry, room and session
//! actors. Kept as plain aliases rather than newtypes because the original
//! daemon passes them around as bare `int64`s too, and the three actors
//! already distinguish them by message type rather than by the type checker.

pub type AccountId = i64;
pub type RoomId = i64;
pub type SessionId = i64;

/// Draws a fresh session id from the process's shared RNG, masked to 63
/// bits so it never collides with an account id's sign bit games. The
/// original seeds one generator per doppelganger "just in case"; per
/// spec.md's design notes a single cryptographically strong shared source
/// is preferable and removes that ceremony.
pub fn random_session_id() -> SessionId {
    use rand::Rng;
    rand::thread_rng().gen::<i64>() & i64::MAX
}
