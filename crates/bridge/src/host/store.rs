//! Device stores – where the host reads its inventory from.
//!
//! - [`MemoryDeviceStore`]: a fixed list, for embedding and tests
//! - [`YamlDeviceStore`]: a YAML file, re-read on every call

use crate::devices::Device;
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot parse inventory {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub trait DeviceStore: Send + Sync {
    /// All devices, in store order.
    fn list(&self) -> StoreResult<Vec<Device>>;

    fn get(&self, id: &str) -> StoreResult<Option<Device>> {
        Ok(self.list()?.into_iter().find(|d| d.id == id))
    }
}

// ===========================================================================
// In-memory
// ===========================================================================

#[derive(Debug, Default)]
pub struct MemoryDeviceStore {
    devices: Vec<Device>,
}

impl MemoryDeviceStore {
    pub fn new(devices: Vec<Device>) -> Self {
        Self { devices }
    }
}

impl DeviceStore for MemoryDeviceStore {
    fn list(&self) -> StoreResult<Vec<Device>> {
        Ok(self.devices.clone())
    }

    fn get(&self, id: &str) -> StoreResult<Option<Device>> {
        Ok(self.devices.iter().find(|d| d.id == id).cloned())
    }
}

// ===========================================================================
// YAML file
// ===========================================================================

#[derive(Debug, Deserialize)]
struct InventoryFile {
    #[serde(default)]
    devices: Vec<Device>,
}

/// Reads `devices: [...]` from a YAML file each time it is asked.
#[derive(Debug, Clone)]
pub struct YamlDeviceStore {
    path: PathBuf,
}

impl YamlDeviceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DeviceStore for YamlDeviceStore {
    fn list(&self) -> StoreResult<Vec<Device>> {
        let text = std::fs::read_to_string(&self.path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => StoreError::Unavailable(format!(
                "inventory file {} does not exist",
                self.path.display()
            )),
            _ => StoreError::Io(e),
        })?;
        let file: InventoryFile = serde_yaml::from_str(&text).map_err(|e| StoreError::Parse {
            path: self.path.clone(),
            message: e.to_string(),
        })?;
        Ok(file.devices)
    }
}
