// src/plugins/types.rs
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginMetadata {
    pub name: String,
    pub version: String,
    pub author: String,
    pub description: String,
}

impl PluginMetadata {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            author: String::new(),
            description: String::new(),
        }
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// A plugin is only admitted with a non-empty name and version.
    pub fn is_valid(&self) -> bool {
        !self.name.is_empty() && !self.version.is_empty()
    }
}

/// Result of one plugin's startup run inside `execute_all`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PluginOutcome {
    Started { name: String },
    Failed { name: String, error: String },
    Panicked { name: String, message: String },
}

impl PluginOutcome {
    pub fn name(&self) -> &str {
        match self {
            PluginOutcome::Started { name }
            | PluginOutcome::Failed { name, .. }
            | PluginOutcome::Panicked { name, .. } => name,
        }
    }

    pub fn is_started(&self) -> bool {
        matches!(self, PluginOutcome::Started { .. })
    }
}
