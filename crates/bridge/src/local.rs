//! In-process channel – calls a [`Host`] directly, no socket involved.

use crate::channel::{unwrap_result, ChannelError, Command, CommandChannel};
use crate::host::Host;
use serde_json::Value;
use std::sync::Arc;

#[derive(Clone)]
pub struct LocalChannel {
    host: Arc<Host>,
}

impl LocalChannel {
    pub fn new(host: Arc<Host>) -> Self {
        Self { host }
    }
}

#[async_trait::async_trait]
impl CommandChannel for LocalChannel {
    async fn send(&self, command: Command) -> Result<Value, ChannelError> {
        let (name, args) = command.into_parts();
        let result = self.host.execute(&name, Value::Object(args));
        tracing::debug!(
            command = %name,
            run_id = %result.run_id,
            status = %result.status,
            elapsed_ms = result.timing_ms,
            "local call"
        );
        unwrap_result(result)
    }
}
