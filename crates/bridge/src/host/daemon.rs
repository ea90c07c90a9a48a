//! Daemon mode – newline-delimited JSON requests over a Unix socket.

use super::Host;
use crate::types::*;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};

/// Bind `socket_path`, replacing a stale socket file if one is left over.
pub fn bind(socket_path: &Path) -> std::io::Result<UnixListener> {
    let _ = std::fs::remove_file(socket_path);
    UnixListener::bind(socket_path)
}

/// Accept connections forever, one task per connection.
pub async fn serve(listener: UnixListener, host: Arc<Host>) {
    loop {
        match listener.accept().await {
            Ok((stream, _addr)) => {
                let host = Arc::clone(&host);
                tokio::spawn(async move { handle_connection(stream, host).await });
            }
            Err(e) => {
                tracing::warn!(error = %e, "accept error");
            }
        }
    }
}

async fn handle_connection(stream: UnixStream, host: Arc<Host>) {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Ok(Some(line)) = lines.next_line().await {
        let response = handle_request(&line, &host);
        let mut resp_json = match serde_json::to_string(&response) {
            Ok(j) => j,
            Err(e) => {
                tracing::warn!(error = %e, "cannot encode response");
                break;
            }
        };
        resp_json.push('\n');
        if writer.write_all(resp_json.as_bytes()).await.is_err() {
            break;
        }
    }
}

pub(crate) fn handle_request(line: &str, host: &Host) -> DaemonResponse {
    let req: DaemonRequest = match serde_json::from_str(line) {
        Ok(r) => r,
        Err(e) => {
            return DaemonResponse::failure(
                "unknown",
                ErrorCode::InvalidInput,
                format!("invalid JSON request: {}", e),
            );
        }
    };

    match req.method.as_str() {
        "call" => {
            let Some(cmd) = req.params.get("cmd").and_then(|v| v.as_str()) else {
                return DaemonResponse::failure(
                    req.id,
                    ErrorCode::InvalidInput,
                    "missing 'cmd' string param",
                );
            };
            let args = match req.params.get("args") {
                None | Some(Value::Null) => Value::Object(Default::default()),
                Some(v @ Value::Object(_)) => v.clone(),
                Some(_) => {
                    return DaemonResponse::failure(
                        req.id,
                        ErrorCode::InvalidInput,
                        "'args' must be an object",
                    );
                }
            };
            let result = host.execute(cmd, args);
            tracing::debug!(
                command = cmd,
                run_id = %result.run_id,
                status = %result.status,
                elapsed_ms = result.timing_ms,
                "handled call"
            );
            DaemonResponse {
                id: req.id,
                result: Some(result),
                error: None,
            }
        }
        other => DaemonResponse::failure(
            req.id.clone(),
            ErrorCode::InvalidInput,
            format!("unknown method: {}", other),
        ),
    }
}
