// src/plugins/registry.rs
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tracing::{error, info};

use crate::plugins::traits::Plugin;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("invalid plugin metadata: name or version is empty (name={name:?}, version={version:?})")]
    InvalidMetadata { name: String, version: String },

    #[error("plugin {0} is already registered; the earlier registration stays in effect")]
    DuplicateName(String),
}

/// Name-keyed plugin table. First registration under a name wins; entries
/// live for the lifetime of the registry.
#[derive(Default)]
pub struct PluginRegistry {
    plugins: Mutex<HashMap<String, Arc<dyn Plugin>>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, plugin: Arc<dyn Plugin>) -> Result<(), RegistryError> {
        let metadata = plugin.metadata().clone();

        if !metadata.is_valid() {
            error!(
                plugin = %metadata.name,
                version = %metadata.version,
                "invalid plugin metadata: name or version is empty"
            );
            return Err(RegistryError::InvalidMetadata {
                name: metadata.name,
                version: metadata.version,
            });
        }

        {
            let mut plugins = self.plugins.lock();
            if plugins.contains_key(&metadata.name) {
                drop(plugins);
                error!(
                    plugin = %metadata.name,
                    version = %metadata.version,
                    "duplicated plugin, the later registration is ignored"
                );
                return Err(RegistryError::DuplicateName(metadata.name));
            }
            plugins.insert(metadata.name.clone(), plugin);
        }

        info!(
            plugin = %metadata.name,
            version = %metadata.version,
            "plugin registered successfully"
        );
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Plugin>> {
        self.plugins.lock().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.plugins.lock().contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.plugins.lock().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.plugins.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.lock().is_empty()
    }
}
