// src/plugins/mod.rs
pub mod error;
pub mod health;
pub mod isolation;
pub mod loader;
pub mod manager;
pub mod official;
pub mod payload;
pub mod pool;
pub mod registry;
pub mod traits;
pub mod types;

pub use error::{DispatchError, ExecutionError};
pub use health::{HealthCheck, HealthStatus, PluginHealth};
pub use loader::{LoadError, PluginLoader};
pub use manager::{
    default_manager, execute_plugin, execute_plugin_list, get_plugin, get_plugin_status,
    install_default_manager, load_plugins, register_plugin, PluginManager,
};
pub use payload::{PayloadError, ResponseNotice, TaskPayload};
pub use pool::{PoolConfig, PoolError, WorkerPool};
pub use registry::{PluginRegistry, RegistryError};
pub use traits::Plugin;
pub use types::{PluginMetadata, PluginOutcome};
