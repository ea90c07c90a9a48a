//! Device inventory client – typed facade over a [`CommandChannel`].
//!
//! Every call is a fresh round trip; nothing is cached between calls and
//! nothing is retried. Payloads are validated before they reach the caller.

use crate::channel::{Args, ChannelError, Command, CommandChannel, ErrorKind};
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::time::Instant;

/// Host command that enumerates all known devices.
pub const LIST_DEVICES: &str = "list_devices";
/// Host command that looks up a single device by id.
pub const GET_DEVICE: &str = "get_device";

/// One piece of hardware as reported by the host.
///
/// `id` and `label` are required; anything else the host sends is kept in
/// `extra` untouched.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Device {
    pub id: String,
    pub label: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Device {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            extra: Map::new(),
        }
    }
}

// Written out by hand so that `id` or `label` keys in `extra` can never shadow
// the real fields in the flat output.
impl Serialize for Device {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let extra = self
            .extra
            .iter()
            .filter(|(key, _)| key.as_str() != "id" && key.as_str() != "label");
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("id", &self.id)?;
        map.serialize_entry("label", &self.label)?;
        for (key, value) in extra {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InventoryError {
    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error("malformed response from '{command}': {reason}")]
    MalformedResponse {
        command: String,
        /// Position of the offending record, when the payload was a list.
        index: Option<usize>,
        reason: String,
    },
}

impl InventoryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            InventoryError::Channel(e) => e.kind(),
            InventoryError::MalformedResponse { .. } => ErrorKind::MalformedResponse,
        }
    }
}

fn malformed(command: &str, index: Option<usize>, reason: impl Into<String>) -> InventoryError {
    let reason = reason.into();
    let reason = match index {
        Some(i) => format!("device #{}: {}", i, reason),
        None => reason,
    };
    InventoryError::MalformedResponse {
        command: command.to_string(),
        index,
        reason,
    }
}

fn json_type(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn parse_device(command: &str, index: Option<usize>, value: Value) -> Result<Device, InventoryError> {
    if !value.is_object() {
        return Err(malformed(
            command,
            index,
            format!("expected a device object, got {}", json_type(&value)),
        ));
    }
    let device: Device =
        serde_json::from_value(value).map_err(|e| malformed(command, index, e.to_string()))?;
    if device.id.is_empty() {
        return Err(malformed(command, index, "device id is empty"));
    }
    Ok(device)
}

/// Validate a `list_devices` payload. All-or-nothing: one bad record fails
/// the whole list.
pub fn parse_device_list(value: Value) -> Result<Vec<Device>, InventoryError> {
    let items = match value {
        Value::Array(items) => items,
        other => {
            return Err(malformed(
                LIST_DEVICES,
                None,
                format!("expected an array of devices, got {}", json_type(&other)),
            ))
        }
    };
    items
        .into_iter()
        .enumerate()
        .map(|(i, v)| parse_device(LIST_DEVICES, Some(i), v))
        .collect()
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct DeviceInventory<C> {
    channel: C,
}

impl<C: CommandChannel> DeviceInventory<C> {
    pub fn new(channel: C) -> Self {
        Self { channel }
    }

    /// Snapshot of every device the host knows about, in host order.
    pub async fn list(&self) -> Result<Vec<Device>, InventoryError> {
        let start = Instant::now();
        let value = self.channel.invoke(LIST_DEVICES, Args::new()).await?;
        let devices = parse_device_list(value)?;
        tracing::debug!(
            count = devices.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "listed devices"
        );
        Ok(devices)
    }

    /// Look up one device by id. A missing device surfaces as the host's
    /// `NOT_FOUND` command error.
    pub async fn get(&self, id: &str) -> Result<Device, InventoryError> {
        let command = Command::new(GET_DEVICE)?.arg("id", id)?;
        let value = self.channel.send(command).await?;
        parse_device(GET_DEVICE, None, value)
    }
}
