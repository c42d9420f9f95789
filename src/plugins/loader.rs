// src/plugins/loader.rs
use std::sync::Arc;

use thiserror::Error;
use tracing::{error, info};

use crate::plugins::registry::PluginRegistry;
use crate::plugins::traits::Plugin;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("plugin {0} not found")]
    PluginNotFound(String),
}

/// Resolves configured plugin names against a registry, all or nothing.
pub struct PluginLoader {
    registry: Arc<PluginRegistry>,
}

impl PluginLoader {
    pub fn new(registry: Arc<PluginRegistry>) -> Self {
        Self { registry }
    }

    /// Output order matches `names`; any unknown name fails the whole load.
    pub fn load_ordered<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<Arc<dyn Plugin>>, LoadError> {
        let names: Vec<&str> = names.iter().map(AsRef::as_ref).collect();
        info!(plugin_names = ?names, "detecting plugins from config");

        names
            .iter()
            .map(|name| {
                self.registry.get(name).ok_or_else(|| {
                    error!(plugin = %name, "configured plugin is not registered");
                    LoadError::PluginNotFound(name.to_string())
                })
            })
            .collect()
    }
}
