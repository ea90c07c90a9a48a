//! Bridge crate – the command channel between a UI process and the native
//! host that owns device state, plus the typed device inventory client.
//!
//! This crate does NOT depend on any GUI runtime, so it can be used by both
//! the desktop shell and the headless `devctl` CLI.

pub mod channel;
pub mod devices;
pub mod host;
pub mod local;
pub mod scenario;
#[cfg(unix)]
pub mod socket;
pub mod types;

// Re-exports for convenience
pub use channel::{Args, ChannelError, Command, CommandChannel, ErrorKind, TimeoutChannel};
pub use devices::{Device, DeviceInventory, InventoryError};
pub use host::Host;
pub use local::LocalChannel;
#[cfg(unix)]
pub use socket::SocketChannel;
pub use types::{CommandResult, ErrorCode, ErrorInfo, Status};
