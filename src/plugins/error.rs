// src/plugins/error.rs
use thiserror::Error;

/// Failure reported by a plugin's own `execute`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutionError {
    #[error("plugin is disabled: {0}")]
    Disabled(String),

    #[error("plugin {plugin} does not handle {kind} payloads")]
    UnsupportedPayload { plugin: String, kind: String },

    #[error("{0}")]
    Failed(String),
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("plugin {0} not found")]
    PluginNotFound(String),

    #[error("plugin {plugin} failed: {source}")]
    Execution {
        plugin: String,
        #[source]
        source: ExecutionError,
    },

    #[error("plugin {plugin} panicked: {message}")]
    Panicked { plugin: String, message: String },
}
