//! Unix socket channel – one connection and one JSON line each way per call.

use crate::channel::{unwrap_result, ChannelError, Command, CommandChannel};
use crate::types::{new_run_id, DaemonRequest, DaemonResponse};
use serde_json::Value;
use std::path::PathBuf;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;

#[derive(Debug, Clone)]
pub struct SocketChannel {
    socket_path: PathBuf,
}

impl SocketChannel {
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
        }
    }

    async fn round_trip(&self, line: &str) -> Result<String, ChannelError> {
        let stream = UnixStream::connect(&self.socket_path).await.map_err(|e| {
            ChannelError::transport(format!(
                "cannot reach host at {}: {}",
                self.socket_path.display(),
                e
            ))
        })?;
        let (reader, mut writer) = stream.into_split();

        writer
            .write_all(line.as_bytes())
            .await
            .map_err(|e| ChannelError::transport(format!("cannot send request: {}", e)))?;

        BufReader::new(reader)
            .lines()
            .next_line()
            .await
            .map_err(|e| ChannelError::transport(format!("cannot read response: {}", e)))?
            .ok_or_else(|| ChannelError::transport("host closed the connection before responding"))
    }
}

#[async_trait::async_trait]
impl CommandChannel for SocketChannel {
    async fn send(&self, command: Command) -> Result<Value, ChannelError> {
        let start = Instant::now();
        let (name, args) = command.into_parts();
        let request = DaemonRequest {
            id: new_run_id(),
            method: "call".to_string(),
            params: serde_json::json!({ "cmd": name, "args": Value::Object(args) }),
        };

        let mut line = serde_json::to_string(&request).map_err(|e| {
            ChannelError::transport(format!("cannot encode request for '{}': {}", name, e))
        })?;
        line.push('\n');

        let reply = self.round_trip(&line).await?;
        let response: DaemonResponse = serde_json::from_str(&reply).map_err(|e| {
            ChannelError::transport(format!("cannot decode response for '{}': {}", name, e))
        })?;

        if response.id != request.id {
            tracing::warn!(
                expected = %request.id,
                actual = %response.id,
                "response id mismatch"
            );
            return Err(ChannelError::transport(format!(
                "response id {} does not match request id {}",
                response.id, request.id
            )));
        }

        tracing::debug!(
            command = %name,
            request_id = %request.id,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "socket call"
        );

        if let Some(err) = response.error {
            return Err(ChannelError::Command {
                code: err.code,
                message: err.message,
            });
        }
        match response.result {
            Some(result) => unwrap_result(result),
            None => Err(ChannelError::transport(
                "response carried neither a result nor an error",
            )),
        }
    }
}
