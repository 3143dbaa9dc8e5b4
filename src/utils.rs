use chrono::Local;

pub fn new_fast_hashmap<K, V>(cap: usize) -> ahash::HashMap<K, V> {
    ahash::HashMap::with_capacity_and_hasher(cap, ahash::RandomState::default())
}

/// Strips leading/trailing whitespace, matching the original daemon's `trim` helper.
pub fn trim(s: &str) -> &str {
    s.trim_matches(|c: char| c == ' ' || c == '\t' || c == '\n' || c == '\r')
}

/// Removes `/` from a channel name so it can be used as a transcript file name.
pub fn deslash(s: &str) -> String {
    s.chars().filter(|&c| c != '/').collect()
}

pub fn timestamp_now() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Writes the whole buffer, looping on short writes the way
/// `logConversationMessage`'s caller is expected to (a plain `Write::write`
/// on a file is allowed to commit fewer bytes than asked).
pub fn write_all_looped<W: std::io::Write>(w: &mut W, mut buf: &[u8]) -> std::io::Result<()> {
    while !buf.is_empty() {
        let written = w.write(buf)?;
        if written == 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::WriteZero,
                "failed to write whole transcript line",
            ));
        }
        buf = &buf[written..];
    }
    Ok(())
}
