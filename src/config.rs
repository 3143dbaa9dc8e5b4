use std::env;

/// Process startup wiring, deliberately trivial per the core's scope.
pub struct Config {
    pub listen_port: u16,
    pub db_path: String,
    pub room_capacity: usize,
    pub heartbeat_interval_secs: u64,
    /// Directory `<room>.channel.log` transcripts are written into.
    /// Matches the original daemon's choice of the process's working
    /// directory, kept configurable for deployments that want logs
    /// elsewhere.
    pub transcripts_dir: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_port: 5555,
            db_path: "wtelnetd.db".to_string(),
            room_capacity: 6,
            heartbeat_interval_secs: 1,
            transcripts_dir: ".".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(port) = env::var("WTELNETD_PORT") {
            if let Ok(port) = port.parse() {
                config.listen_port = port;
            } else {
                log::warn!("WTELNETD_PORT={port} is not a valid port, ignoring");
            }
        }
        if let Ok(path) = env::var("WTELNETD_DB_PATH") {
            config.db_path = path;
        }
        if let Ok(dir) = env::var("WTELNETD_TRANSCRIPTS_DIR") {
            config.transcripts_dir = dir;
        }
        config
    }
}
