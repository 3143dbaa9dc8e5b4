mod config;
mod heartbeat;
mod ids;
mod persistence;
mod registry;
mod room;
mod session;
mod transport;
mod utils;

use std::time::Duration;

use actix::prelude::*;
use tokio::net::TcpListener;

use config::Config;
use persistence::Persistence;
use registry::Registry;

/// Accepts connections until told to stop. Grounded on `wtelnet.go`'s
/// `main`, whose `for keepGoing` loop re-enters `ListenAndServe` after a
/// transient "too many open files" accept error and gives up on anything
/// else.
async fn accept_loop(listener: TcpListener, persistence: Persistence, registry: Addr<Registry>) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                let session_id = ids::random_session_id();
                log::info!("accepted connection from {peer}, session {session_id}");
                let persistence = persistence.clone();
                let registry = registry.clone();
                tokio::spawn(async move {
                    transport::handle_connection(session_id, stream, persistence, registry).await;
                });
            }
            Err(err) if is_too_many_open_files(&err) => {
                log::error!("accept: too many open files, retrying in 10s");
                tokio::time::sleep(Duration::from_secs(10)).await;
            }
            Err(err) => {
                log::error!("accept loop fatal error: {err}");
                return;
            }
        }
    }
}

/// `EMFILE` is 24 on Linux and most BSDs. We also fall back to the original's
/// own approach of matching the error text, in case the OS reports this
/// condition some other way `raw_os_error` doesn't capture.
fn is_too_many_open_files(err: &std::io::Error) -> bool {
    err.raw_os_error() == Some(24) || err.to_string().contains("too many open files")
}

#[actix::main]
async fn main() -> std::io::Result<()> {
    env_logger::init();

    let config = Config::from_env();

    let persistence = match Persistence::connect(&config.db_path).await {
        Ok(persistence) => persistence,
        Err(err) => {
            log::error!("not starting server: problem starting database: {err}");
            return Err(std::io::Error::new(std::io::ErrorKind::Other, err));
        }
    };

    let registry = Registry::with_transcripts_dir(
        persistence.clone(),
        config.room_capacity,
        config.transcripts_dir.clone(),
    )
    .start();

    heartbeat::Heartbeat::new(registry.clone(), Duration::from_secs(config.heartbeat_interval_secs)).start();

    let listener = TcpListener::bind(("0.0.0.0", config.listen_port)).await?;
    log::info!("listening on port {}", config.listen_port);
    accept_loop(listener, persistence, registry).await;
    Ok(())
}
