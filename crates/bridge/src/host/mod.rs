//! Reference host – the backend side of the command surface.
//!
//! Owns device state through a [`DeviceStore`] and answers commands from a
//! [`CommandRegistry`]. Served in-process by [`crate::local::LocalChannel`]
//! or over a Unix socket by [`daemon::serve`].

#[cfg(unix)]
pub mod daemon;
pub mod registry;
pub mod store;

pub use registry::{CommandHandler, CommandRegistry, HandlerError};
pub use store::{DeviceStore, MemoryDeviceStore, StoreError, StoreResult, YamlDeviceStore};

use crate::types::CommandResult;
use serde_json::Value;

/// State handed to every command handler.
pub struct HostContext {
    store: Box<dyn DeviceStore>,
}

impl HostContext {
    pub fn new(store: Box<dyn DeviceStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &dyn DeviceStore {
        self.store.as_ref()
    }
}

pub struct Host {
    registry: CommandRegistry,
    ctx: HostContext,
}

impl Host {
    pub fn new(registry: CommandRegistry, ctx: HostContext) -> Self {
        Self { registry, ctx }
    }

    /// Built-in commands over `store`.
    pub fn with_store(store: impl DeviceStore + 'static) -> Self {
        Self::new(CommandRegistry::new(), HostContext::new(Box::new(store)))
    }

    pub fn execute(&self, name: &str, args: Value) -> CommandResult {
        self.registry.execute(name, args, &self.ctx)
    }

    pub fn commands(&self) -> Vec<&str> {
        self.registry.list()
    }
}
