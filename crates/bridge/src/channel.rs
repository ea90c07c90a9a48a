//! Command channel – the contract for invoking a named host command.
//!
//! A [`CommandChannel`] carries one [`Command`] across the process boundary
//! and resolves to the host's response value. Implementations are stateless
//! between calls, so any number of calls may be in flight at once.

use crate::types::{CommandResult, ErrorCode, Status};
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;

/// Named arguments for a command.
pub type Args = Map<String, Value>;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Broad failure category, for callers deciding between retry and reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transport,
    Command,
    MalformedResponse,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ErrorKind::Transport => "transport",
            ErrorKind::Command => "command",
            ErrorKind::MalformedResponse => "malformed_response",
        })
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ChannelError {
    /// The host could not be reached, or a message could not be encoded,
    /// decoded or matched to its request.
    #[error("transport error: {message}")]
    Transport { message: String },

    /// The host received the command and reported that it failed.
    #[error("command failed [{code}]: {message}")]
    Command { code: ErrorCode, message: String },
}

impl ChannelError {
    pub fn transport(message: impl Into<String>) -> Self {
        ChannelError::Transport {
            message: message.into(),
        }
    }

    pub fn command(code: ErrorCode, message: impl Into<String>) -> Self {
        ChannelError::Command {
            code,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ChannelError::Transport { .. } => ErrorKind::Transport,
            ChannelError::Command { .. } => ErrorKind::Command,
        }
    }

    /// Host error code, when the host reported one.
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            ChannelError::Command { code, .. } => Some(*code),
            ChannelError::Transport { .. } => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Command
// ---------------------------------------------------------------------------

/// A single named request with its arguments. Built per call.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    name: String,
    args: Args,
}

impl Command {
    pub fn new(name: impl Into<String>) -> Result<Self, ChannelError> {
        Self::with_args(name, Args::new())
    }

    pub fn with_args(name: impl Into<String>, args: Args) -> Result<Self, ChannelError> {
        let name = name.into();
        if name.is_empty() || name.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(ChannelError::command(
                ErrorCode::InvalidInput,
                format!("invalid command name: {:?}", name),
            ));
        }
        Ok(Self { name, args })
    }

    /// Return a copy of this command with one more argument.
    pub fn arg<T: Serialize>(mut self, key: &str, value: T) -> Result<Self, ChannelError> {
        let value = serde_json::to_value(value).map_err(|e| {
            ChannelError::transport(format!("cannot serialize argument '{}': {}", key, e))
        })?;
        self.args.insert(key.to_string(), value);
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn args(&self) -> &Args {
        &self.args
    }

    pub fn into_parts(self) -> (String, Args) {
        (self.name, self.args)
    }
}

// ---------------------------------------------------------------------------
// Channel trait
// ---------------------------------------------------------------------------

#[async_trait::async_trait]
pub trait CommandChannel: Send + Sync {
    /// Deliver `command` to the host and wait for its response value.
    async fn send(&self, command: Command) -> Result<Value, ChannelError>;

    /// Invoke `name` with `args` (an empty map when the command takes none).
    async fn invoke(&self, name: &str, args: Args) -> Result<Value, ChannelError> {
        let command = Command::with_args(name, args)?;
        self.send(command).await
    }
}

#[async_trait::async_trait]
impl<C: CommandChannel + ?Sized> CommandChannel for Arc<C> {
    async fn send(&self, command: Command) -> Result<Value, ChannelError> {
        (**self).send(command).await
    }
}

#[async_trait::async_trait]
impl<'a, C: CommandChannel + ?Sized> CommandChannel for &'a C {
    async fn send(&self, command: Command) -> Result<Value, ChannelError> {
        (**self).send(command).await
    }
}

/// Turn a host result envelope into the caller-facing outcome.
pub(crate) fn unwrap_result(result: CommandResult) -> Result<Value, ChannelError> {
    match result.status {
        Status::Pass => Ok(result.data.unwrap_or(Value::Null)),
        Status::Fail | Status::Error => match result.error {
            Some(info) => Err(ChannelError::Command {
                code: info.code,
                message: info.message,
            }),
            None => Err(ChannelError::transport(format!(
                "host reported status '{}' for '{}' without error info",
                result.status, result.command
            ))),
        },
    }
}

// ---------------------------------------------------------------------------
// Timeout layer
// ---------------------------------------------------------------------------

/// Bounds each call on the wrapped channel. The bridge never applies this on
/// its own; callers that need bounded latency opt in.
pub struct TimeoutChannel<C> {
    inner: C,
    timeout: Duration,
}

impl<C> TimeoutChannel<C> {
    pub fn new(inner: C, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

#[async_trait::async_trait]
impl<C: CommandChannel> CommandChannel for TimeoutChannel<C> {
    async fn send(&self, command: Command) -> Result<Value, ChannelError> {
        let name = command.name().to_string();
        match tokio::time::timeout(self.timeout, self.inner.send(command)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                let ms = self.timeout.as_millis();
                tracing::warn!(command = %name, timeout_ms = ms as u64, "command timed out");
                Err(ChannelError::transport(format!(
                    "'{}' timed out after {} ms",
                    name, ms
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{result_err, result_ok};
    use serde_json::json;

    struct SlowEcho {
        delay: Duration,
    }

    #[async_trait::async_trait]
    impl CommandChannel for SlowEcho {
        async fn send(&self, command: Command) -> Result<Value, ChannelError> {
            tokio::time::sleep(self.delay).await;
            Ok(Value::Object(command.args().clone()))
        }
    }

    #[test]
    fn test_empty_name_rejected_locally() {
        let err = Command::new("").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Command);
        assert_eq!(err.code(), Some(ErrorCode::InvalidInput));

        assert!(Command::new("list devices").is_err());
        assert!(Command::new("list_devices").is_ok());
    }

    #[test]
    fn test_arg_builder() {
        let cmd = Command::new("get_device").unwrap().arg("id", "dev1").unwrap();
        assert_eq!(cmd.name(), "get_device");
        assert_eq!(cmd.args()["id"], "dev1");
    }

    #[test]
    fn test_unwrap_pass_without_data_is_null() {
        let mut r = result_ok("noop", "run", 0, Value::Null);
        r.data = None;
        assert_eq!(unwrap_result(r).unwrap(), Value::Null);
    }

    #[test]
    fn test_unwrap_error_keeps_code_and_message() {
        let r = result_err("nope", "run", 0, ErrorCode::UnknownCommand, "unknown command: nope");
        let err = unwrap_result(r).unwrap_err();
        assert_eq!(
            err,
            ChannelError::command(ErrorCode::UnknownCommand, "unknown command: nope")
        );
    }

    #[test]
    fn test_unwrap_error_without_info_is_transport() {
        let mut r = result_err("x", "run", 0, ErrorCode::InternalError, "boom");
        r.error = None;
        assert_eq!(unwrap_result(r).unwrap_err().kind(), ErrorKind::Transport);
    }

    #[tokio::test]
    async fn test_invoke_validates_name_before_sending() {
        let ch = SlowEcho {
            delay: Duration::from_millis(0),
        };
        let err = ch.invoke("", Args::new()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Command);
    }

    #[tokio::test]
    async fn test_timeout_layer_passes_fast_calls() {
        let ch = TimeoutChannel::new(
            SlowEcho {
                delay: Duration::from_millis(1),
            },
            Duration::from_secs(5),
        );
        let mut args = Args::new();
        args.insert("k".into(), json!(1));
        assert_eq!(ch.invoke("echo", args).await.unwrap(), json!({ "k": 1 }));
    }

    #[tokio::test]
    async fn test_timeout_layer_elapses_as_transport() {
        let ch = TimeoutChannel::new(
            SlowEcho {
                delay: Duration::from_secs(5),
            },
            Duration::from_millis(20),
        );
        let err = ch.invoke("echo", Args::new()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn test_arc_channel_forwards() {
        let ch: Arc<dyn CommandChannel> = Arc::new(SlowEcho {
            delay: Duration::from_millis(0),
        });
        assert_eq!(ch.invoke("echo", Args::new()).await.unwrap(), json!({}));
    }
}
