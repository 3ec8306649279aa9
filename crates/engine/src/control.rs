//! Control surface for the dev session – JSON lines over a Unix socket.
//!
//! The shell (or any dev tooling) connects and sends one request per line:
//! `{"method":"restart"}` relaunches the shell process,
//! `{"method":"source-changed","params":{...}}` is forwarded one-way to the
//! shell's stdin. Each line is acknowledged with `{"ok":true}` or
//! `{"ok":false,"error":"..."}`.

use crate::supervisor::Event;
use serde::Deserialize;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixListener;
use tokio::sync::mpsc;

#[derive(Debug, Deserialize)]
struct ControlRequest {
    method: String,
    #[serde(default)]
    params: serde_json::Value,
}

pub(crate) async fn serve(socket_path: PathBuf, tx: mpsc::Sender<Event>) {
    // Remove stale socket if it exists
    let _ = std::fs::remove_file(&socket_path);

    let listener = match UnixListener::bind(&socket_path) {
        Ok(l) => l,
        Err(e) => {
            tracing::warn!(
                socket = %socket_path.display(),
                error = %e,
                "cannot bind control socket; restart/source-changed requests disabled"
            );
            return;
        }
    };
    tracing::info!(socket = %socket_path.display(), "control socket listening");

    loop {
        match listener.accept().await {
            Ok((stream, _addr)) => {
                let tx = tx.clone();
                tokio::spawn(async move {
                    let (reader, mut writer) = stream.into_split();
                    let mut lines = BufReader::new(reader).lines();
                    while let Ok(Some(line)) = lines.next_line().await {
                        let mut reply = handle_line(&line, &tx).await;
                        reply.push('\n');
                        if writer.write_all(reply.as_bytes()).await.is_err() {
                            break;
                        }
                    }
                });
            }
            Err(e) => {
                tracing::warn!(error = %e, "control socket accept error");
            }
        }
    }
}

async fn handle_line(line: &str, tx: &mpsc::Sender<Event>) -> String {
    let req: ControlRequest = match serde_json::from_str(line) {
        Ok(r) => r,
        Err(e) => return error_reply(&format!("invalid JSON request: {e}")),
    };

    let event = match req.method.as_str() {
        "restart" => Event::RestartShell,
        "source-changed" => Event::SourceChanged(req.params),
        other => return error_reply(&format!("unknown method: {other}")),
    };

    match tx.send(event).await {
        Ok(()) => r#"{"ok":true}"#.to_string(),
        Err(_) => error_reply("session is shutting down"),
    }
}

fn error_reply(message: &str) -> String {
    serde_json::json!({ "ok": false, "error": message }).to_string()
}
