// src/plugins/manager.rs
use std::sync::{Arc, OnceLock};

use futures::future::join_all;
use parking_lot::RwLock;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::plugins::error::DispatchError;
use crate::plugins::health::{PluginHealth, NO_HEALTH_CAPABILITY};
use crate::plugins::isolation::catch_panic;
use crate::plugins::loader::{LoadError, PluginLoader};
use crate::plugins::payload::TaskPayload;
use crate::plugins::registry::{PluginRegistry, RegistryError};
use crate::plugins::traits::Plugin;
use crate::plugins::types::PluginOutcome;

/// Dispatcher over a registry: single calls by name, and the concurrent
/// startup fan-out over the configured plugin order.
pub struct PluginManager {
    registry: Arc<PluginRegistry>,
    loader: PluginLoader,
    order: RwLock<Vec<String>>,
}

impl PluginManager {
    pub fn new(registry: Arc<PluginRegistry>) -> Self {
        Self {
            loader: PluginLoader::new(registry.clone()),
            registry,
            order: RwLock::new(Vec::new()),
        }
    }

    pub fn with_order(self, order: Vec<String>) -> Self {
        *self.order.write() = order;
        self
    }

    pub fn set_order(&self, order: Vec<String>) {
        *self.order.write() = order;
    }

    pub fn order(&self) -> Vec<String> {
        self.order.read().clone()
    }

    pub fn registry(&self) -> &Arc<PluginRegistry> {
        &self.registry
    }

    pub fn register(&self, plugin: Arc<dyn Plugin>) -> Result<(), RegistryError> {
        self.registry.register(plugin)
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Plugin>> {
        self.registry.get(name)
    }

    pub fn load_ordered<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<Arc<dyn Plugin>>, LoadError> {
        self.loader.load_ordered(names)
    }

    /// Resolves the configured order.
    pub fn load_plugins(&self) -> Result<Vec<Arc<dyn Plugin>>, LoadError> {
        let order = self.order();
        self.loader.load_ordered(&order)
    }

    /// Runs one plugin. Returns once the plugin's `execute` returns; work the
    /// plugin hands to its own pool may still be in flight.
    pub async fn execute_by_name(
        &self,
        name: &str,
        payload: Option<TaskPayload>,
    ) -> Result<(), DispatchError> {
        let plugin = self
            .registry
            .get(name)
            .ok_or_else(|| DispatchError::PluginNotFound(name.to_string()))?;
        let metadata = plugin.metadata();

        info!(
            plugin = %metadata.name,
            version = %metadata.version,
            payload = ?payload.as_ref().map(TaskPayload::kind),
            "executing plugin"
        );

        match catch_panic(plugin.execute(payload.as_ref())).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(source)) => {
                error!(
                    plugin = %metadata.name,
                    version = %metadata.version,
                    error = %source,
                    "plugin execution failed"
                );
                Err(DispatchError::Execution {
                    plugin: metadata.name.clone(),
                    source,
                })
            }
            Err(report) => {
                error!(
                    plugin = %metadata.name,
                    version = %metadata.version,
                    panic_reason = %report.message,
                    stack_trace = %report.backtrace,
                    "plugin execution panicked"
                );
                Err(DispatchError::Panicked {
                    plugin: metadata.name.clone(),
                    message: report.message,
                })
            }
        }
    }

    /// Loads `names` and runs every plugin's startup call concurrently,
    /// returning once all of them have finished. Only an unresolved name is
    /// an error; plugin failures and panics are logged and reported per plugin.
    pub async fn execute_all<S: AsRef<str>>(
        &self,
        names: &[S],
    ) -> Result<Vec<PluginOutcome>, LoadError> {
        let plugins = self.loader.load_ordered(names)?;
        let names: Vec<String> = plugins.iter().map(|p| p.metadata().name.clone()).collect();
        let run_id = Uuid::new_v4();
        info!(%run_id, plugins = ?names, "starting plugin services");

        let handles: Vec<_> = plugins
            .into_iter()
            .map(|plugin| tokio::spawn(start_plugin(run_id, plugin)))
            .collect();

        let outcomes = join_all(handles)
            .await
            .into_iter()
            .zip(names)
            .map(|(joined, name)| {
                joined.unwrap_or_else(|e| {
                    error!(%run_id, plugin = %name, error = %e, "plugin startup task aborted");
                    PluginOutcome::Panicked {
                        name,
                        message: e.to_string(),
                    }
                })
            })
            .collect();

        Ok(outcomes)
    }

    pub async fn execute_plugin_list(&self) -> Result<Vec<PluginOutcome>, LoadError> {
        let order = self.order();
        self.execute_all(&order).await
    }

    /// `(status, healthy)` for a registered plugin. Plugins without the health
    /// capability count as healthy.
    pub fn plugin_status(&self, name: &str) -> Option<(String, bool)> {
        let plugin = self.registry.get(name)?;
        Some(status_of(plugin.as_ref()))
    }

    /// Health of every plugin in the configured order, logged as it is read.
    pub fn health_report(&self) -> Result<Vec<PluginHealth>, LoadError> {
        let plugins = self.load_plugins()?;

        let report = plugins
            .iter()
            .map(|plugin| {
                let metadata = plugin.metadata();
                let (status, healthy) = status_of(plugin.as_ref());
                if healthy {
                    info!(
                        plugin = %metadata.name,
                        version = %metadata.version,
                        status = %status,
                        "plugin loaded successfully"
                    );
                } else {
                    warn!(
                        plugin = %metadata.name,
                        version = %metadata.version,
                        status = %status,
                        "plugin loaded but unhealthy"
                    );
                }
                PluginHealth {
                    name: metadata.name.clone(),
                    version: metadata.version.clone(),
                    healthy,
                    status,
                }
            })
            .collect();

        Ok(report)
    }
}

fn status_of(plugin: &dyn Plugin) -> (String, bool) {
    match plugin.health() {
        Some(health) => (health.status(), health.is_healthy()),
        None => (NO_HEALTH_CAPABILITY.to_string(), true),
    }
}

async fn start_plugin(run_id: Uuid, plugin: Arc<dyn Plugin>) -> PluginOutcome {
    let metadata = plugin.metadata().clone();
    info!(
        %run_id,
        plugin = %metadata.name,
        version = %metadata.version,
        "starting plugin service"
    );

    match catch_panic(plugin.execute(None)).await {
        Ok(Ok(())) => PluginOutcome::Started {
            name: metadata.name,
        },
        Ok(Err(e)) => {
            error!(
                %run_id,
                plugin = %metadata.name,
                version = %metadata.version,
                error = %e,
                "plugin service failed"
            );
            PluginOutcome::Failed {
                name: metadata.name,
                error: e.to_string(),
            }
        }
        Err(report) => {
            error!(
                %run_id,
                plugin = %metadata.name,
                version = %metadata.version,
                author = %metadata.author,
                panic_reason = %report.message,
                stack_trace = %report.backtrace,
                "plugin service panicked"
            );
            PluginOutcome::Panicked {
                name: metadata.name,
                message: report.message,
            }
        }
    }
}

// Process-wide default, for the outermost composition point only.

static DEFAULT_MANAGER: OnceLock<RwLock<Arc<PluginManager>>> = OnceLock::new();

fn default_slot() -> &'static RwLock<Arc<PluginManager>> {
    DEFAULT_MANAGER.get_or_init(|| {
        RwLock::new(Arc::new(PluginManager::new(Arc::new(PluginRegistry::new()))))
    })
}

/// The lazily created default manager; every call returns the same instance
/// until `install_default_manager` replaces it.
pub fn default_manager() -> Arc<PluginManager> {
    default_slot().read().clone()
}

/// Replaces the default manager (test injection, custom bootstrap).
pub fn install_default_manager(manager: Arc<PluginManager>) {
    *default_slot().write() = manager;
}

pub fn register_plugin(plugin: Arc<dyn Plugin>) -> Result<(), RegistryError> {
    default_manager().register(plugin)
}

pub fn get_plugin(name: &str) -> Option<Arc<dyn Plugin>> {
    default_manager().get(name)
}

pub fn get_plugin_status(name: &str) -> Option<(String, bool)> {
    default_manager().plugin_status(name)
}

pub fn load_plugins() -> Result<Vec<Arc<dyn Plugin>>, LoadError> {
    default_manager().load_plugins()
}

pub async fn execute_plugin(name: &str, payload: Option<TaskPayload>) -> Result<(), DispatchError> {
    default_manager().execute_by_name(name, payload).await
}

pub async fn execute_plugin_list() -> Result<Vec<PluginOutcome>, LoadError> {
    default_manager().execute_plugin_list().await
}
