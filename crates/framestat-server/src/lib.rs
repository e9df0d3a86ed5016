//! Local query listener — line protocol over loopback TCP.
//!
//! Automation drives a monitoring session from outside (a test harness on
//! the workstation, forwarded over adb). The protocol is one command per
//! line, one JSON object per reply line, loopback only. A companion
//! blocking client lives in [`ask`] for scripts and tests.

use std::io::{BufRead, BufReader, Write};
use std::net::TcpStream;
use std::sync::Arc;

use log::{debug, info, warn};
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader as AsyncBufReader};
use tokio::net::{TcpListener, TcpStream as AsyncTcpStream};

use framestat_core::surface::SharedSurface;

/// Where the listener binds. Loopback only: the protocol carries no
/// authentication, forwarding is the caller's job.
pub const LISTEN_ADDR: &str = "127.0.0.1:38421";

/// Query for the tracked package and surface.
pub const CMD_CURRENT_SURFACE: &str = "current_pkg_surface";

#[derive(Serialize)]
struct ErrorReply<'a> {
    error: &'a str,
}

/// State the listener answers from.
#[derive(Clone)]
pub struct QueryState {
    pub surface: SharedSurface,
}

/// Answer one command line with one JSON line (no trailing newline).
pub fn respond(state: &QueryState, command: &str) -> String {
    let reply = match command.trim() {
        CMD_CURRENT_SURFACE => state
            .surface
            .lock()
            .ok()
            .and_then(|identity| serde_json::to_string(&*identity).ok()),
        other => {
            debug!("unknown command {other:?}");
            None
        }
    };
    reply.unwrap_or_else(|| {
        serde_json::to_string(&ErrorReply {
            error: "unknown command",
        })
        .unwrap_or_else(|_| "{}".to_string())
    })
}

async fn serve_connection(state: QueryState, stream: AsyncTcpStream) {
    let peer = stream.peer_addr().ok();
    debug!("connection from {peer:?}");
    let (reader, mut writer) = stream.into_split();
    let mut lines = AsyncBufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let mut reply = respond(&state, &line);
                reply.push('\n');
                if writer.write_all(reply.as_bytes()).await.is_err() {
                    break;
                }
            }
            Ok(None) => break,
            Err(err) => {
                warn!("connection {peer:?}: {err}");
                break;
            }
        }
    }
    debug!("connection from {peer:?} done");
}

/// Serve on an already-bound listener until the task is dropped.
pub async fn run_on(listener: TcpListener, state: QueryState) {
    let state = Arc::new(state);
    loop {
        match listener.accept().await {
            Ok((stream, _)) => {
                let state = (*state).clone();
                tokio::spawn(serve_connection(state, stream));
            }
            Err(err) => {
                warn!("accept: {err}");
            }
        }
    }
}

/// Bind [`LISTEN_ADDR`] and serve forever.
pub async fn run(state: QueryState) -> std::io::Result<()> {
    let listener = TcpListener::bind(LISTEN_ADDR).await?;
    info!("query listener on {LISTEN_ADDR}");
    run_on(listener, state).await;
    Ok(())
}

/// Blocking one-shot client: send `command`, return the reply line.
pub fn ask(addr: &str, command: &str) -> std::io::Result<String> {
    let mut stream = TcpStream::connect(addr)?;
    stream.write_all(command.as_bytes())?;
    stream.write_all(b"\n")?;
    let mut reply = String::new();
    BufReader::new(stream).read_line(&mut reply)?;
    Ok(reply.trim_end().to_string())
}
