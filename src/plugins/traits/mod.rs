// src/plugins/traits/mod.rs
use async_trait::async_trait;

use crate::plugins::health::HealthCheck;
use crate::plugins::payload::TaskPayload;
use crate::plugins::types::PluginMetadata;

pub use crate::plugins::error::ExecutionError;

/// A named, versioned side-effect handler invoked through the dispatcher.
///
/// `execute(None)` is the startup call made by `execute_all`; runtime calls
/// carry a payload. Pool-backed plugins return as soon as the work is queued.
#[async_trait]
pub trait Plugin: Send + Sync {
    fn metadata(&self) -> &PluginMetadata;

    async fn execute(&self, payload: Option<&TaskPayload>) -> Result<(), ExecutionError>;

    /// Capability query for plugins that report readiness.
    fn health(&self) -> Option<&dyn HealthCheck> {
        None
    }
}
