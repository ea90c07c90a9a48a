//! Command registry and built-in host commands.
//!
//! Commands are registered by name and invoked with JSON input/output.

use super::store::StoreError;
use super::HostContext;
use crate::devices::{GET_DEVICE, LIST_DEVICES};
use crate::types::*;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Instant;

/// Signature for all host commands.
pub type CommandHandler = fn(Value, &HostContext) -> Result<Value, HandlerError>;

#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("{0}")]
    Other(String),
}

impl HandlerError {
    pub fn error_code(&self) -> ErrorCode {
        match self {
            HandlerError::InvalidInput(_) => ErrorCode::InvalidInput,
            HandlerError::NotFound(_) => ErrorCode::NotFound,
            HandlerError::Store(StoreError::Unavailable(_)) => ErrorCode::Unavailable,
            HandlerError::Store(StoreError::Io(_)) => ErrorCode::IoError,
            HandlerError::Store(StoreError::Parse { .. }) | HandlerError::Other(_) => {
                ErrorCode::InternalError
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

pub struct CommandRegistry {
    handlers: HashMap<String, CommandHandler>,
}

impl CommandRegistry {
    /// Registry with the built-in commands.
    pub fn new() -> Self {
        let mut reg = Self::empty();
        reg.register("ping", cmd_ping);
        reg.register(LIST_DEVICES, cmd_list_devices);
        reg.register(GET_DEVICE, cmd_get_device);
        reg
    }

    pub fn empty() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    pub fn register(&mut self, name: &str, handler: CommandHandler) {
        self.handlers.insert(name.to_string(), handler);
    }

    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(|s| s.as_str()).collect();
        names.sort();
        names
    }

    /// Execute a command by name and return a full CommandResult.
    pub fn execute(&self, name: &str, args: Value, ctx: &HostContext) -> CommandResult {
        let run_id = new_run_id();
        let start = Instant::now();

        let handler = match self.handlers.get(name) {
            Some(h) => h,
            None => {
                return result_err(
                    name,
                    &run_id,
                    start.elapsed().as_millis() as u64,
                    ErrorCode::UnknownCommand,
                    format!("unknown command: {}", name),
                );
            }
        };

        match handler(args, ctx) {
            Ok(data) => result_ok(name, &run_id, start.elapsed().as_millis() as u64, data),
            Err(e) => {
                tracing::debug!(command = name, error = %e, "command failed");
                result_err(
                    name,
                    &run_id,
                    start.elapsed().as_millis() as u64,
                    e.error_code(),
                    e.to_string(),
                )
            }
        }
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ===========================================================================
// Built-in commands
// ===========================================================================

/// `ping` – returns { "pong": true }.
fn cmd_ping(_args: Value, _ctx: &HostContext) -> Result<Value, HandlerError> {
    Ok(serde_json::json!({ "pong": true }))
}

/// `list_devices` – every device in the store, in store order.
///
/// Returns: `[{ "id": "...", "label": "...", ... }]`
fn cmd_list_devices(_args: Value, ctx: &HostContext) -> Result<Value, HandlerError> {
    let devices = ctx.store().list()?;
    tracing::info!(count = devices.len(), "found devices");
    serde_json::to_value(devices).map_err(|e| HandlerError::Other(e.to_string()))
}

/// `get_device` – one device by id.
///
/// Args: `{ "id": "dev1" }`
fn cmd_get_device(args: Value, ctx: &HostContext) -> Result<Value, HandlerError> {
    let id = args
        .get("id")
        .and_then(|v| v.as_str())
        .ok_or_else(|| HandlerError::InvalidInput("missing 'id' string field".into()))?;

    let device = ctx
        .store()
        .get(id)?
        .ok_or_else(|| HandlerError::NotFound(format!("no device with id '{}'", id)))?;
    serde_json::to_value(device).map_err(|e| HandlerError::Other(e.to_string()))
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::Device;
    use crate::host::store::{DeviceStore, MemoryDeviceStore, StoreResult};

    struct BrokenStore;

    impl DeviceStore for BrokenStore {
        fn list(&self) -> StoreResult<Vec<Device>> {
            Err(StoreError::Unavailable("bus offline".into()))
        }
    }

    fn ctx() -> HostContext {
        HostContext::new(Box::new(MemoryDeviceStore::new(vec![
            Device::new("dev1", "Camera"),
            Device::new("dev2", "Mic"),
        ])))
    }

    #[test]
    fn test_ping_command() {
        let reg = CommandRegistry::new();
        let result = reg.execute("ping", serde_json::json!({}), &ctx());
        assert_eq!(result.status, Status::Pass);
        assert_eq!(result.data.unwrap()["pong"], true);
    }

    #[test]
    fn test_unknown_command() {
        let reg = CommandRegistry::new();
        let result = reg.execute("nonexistent", serde_json::json!({}), &ctx());
        assert_eq!(result.status, Status::Error);
        assert!(result.data.is_none());
        assert_eq!(result.error.unwrap().code, ErrorCode::UnknownCommand);
    }

    #[test]
    fn test_list_devices_command() {
        let reg = CommandRegistry::new();
        let result = reg.execute(LIST_DEVICES, serde_json::json!({}), &ctx());
        assert_eq!(result.status, Status::Pass);
        assert_eq!(
            result.data.unwrap(),
            serde_json::json!([
                { "id": "dev1", "label": "Camera" },
                { "id": "dev2", "label": "Mic" }
            ])
        );
    }

    #[test]
    fn test_get_device_errors() {
        let reg = CommandRegistry::new();
        let missing_arg = reg.execute(GET_DEVICE, serde_json::json!({}), &ctx());
        assert_eq!(missing_arg.error.unwrap().code, ErrorCode::InvalidInput);

        let missing = reg.execute(GET_DEVICE, serde_json::json!({ "id": "nope" }), &ctx());
        assert_eq!(missing.error.unwrap().code, ErrorCode::NotFound);
    }

    #[test]
    fn test_store_failure_is_reported() {
        let reg = CommandRegistry::new();
        let ctx = HostContext::new(Box::new(BrokenStore));
        let result = reg.execute(LIST_DEVICES, serde_json::json!({}), &ctx);
        assert_eq!(result.status, Status::Error);
        assert_eq!(result.error.unwrap().code, ErrorCode::Unavailable);
    }

    #[test]
    fn test_list_commands() {
        let reg = CommandRegistry::new();
        assert_eq!(reg.list(), vec!["get_device", "list_devices", "ping"]);
        assert!(CommandRegistry::empty().list().is_empty());
    }
}
