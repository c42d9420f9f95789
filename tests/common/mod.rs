// tests/common/mod.rs
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use survey_plugin_host::plugins::{
    ExecutionError, HealthCheck, Plugin, PluginManager, PluginMetadata, PluginRegistry,
    TaskPayload,
};

/// Counts `execute` calls; optionally sleeps first.
pub struct CountingPlugin {
    metadata: PluginMetadata,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl CountingPlugin {
    pub fn new(name: &str) -> Arc<Self> {
        Self::with_version(name, "0.1.0")
    }

    pub fn with_version(name: &str, version: &str) -> Arc<Self> {
        Arc::new(Self {
            metadata: PluginMetadata::new(name, version),
            delay: None,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn slow(name: &str, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            metadata: PluginMetadata::new(name, "0.1.0"),
            delay: Some(delay),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Plugin for CountingPlugin {
    fn metadata(&self) -> &PluginMetadata {
        &self.metadata
    }

    async fn execute(&self, _payload: Option<&TaskPayload>) -> Result<(), ExecutionError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub struct PanickingPlugin(PluginMetadata);

impl PanickingPlugin {
    pub fn new(name: &str) -> Arc<Self> {
        Arc::new(Self(PluginMetadata::new(name, "0.1.0").with_author("tests")))
    }
}

#[async_trait]
impl Plugin for PanickingPlugin {
    fn metadata(&self) -> &PluginMetadata {
        &self.0
    }

    async fn execute(&self, _payload: Option<&TaskPayload>) -> Result<(), ExecutionError> {
        panic!("plugin {} blew up", self.0.name);
    }
}

pub struct FailingPlugin(PluginMetadata);

impl FailingPlugin {
    pub fn new(name: &str) -> Arc<Self> {
        Arc::new(Self(PluginMetadata::new(name, "0.1.0")))
    }
}

#[async_trait]
impl Plugin for FailingPlugin {
    fn metadata(&self) -> &PluginMetadata {
        &self.0
    }

    async fn execute(&self, payload: Option<&TaskPayload>) -> Result<(), ExecutionError> {
        match payload {
            Some(payload) => Err(ExecutionError::UnsupportedPayload {
                plugin: self.0.name.clone(),
                kind: payload.kind().to_string(),
            }),
            None => Err(ExecutionError::Failed("startup refused".into())),
        }
    }
}

/// Reports a fixed health state.
pub struct ProbedPlugin {
    metadata: PluginMetadata,
    healthy: bool,
    status: String,
}

impl ProbedPlugin {
    pub fn new(name: &str, healthy: bool, status: &str) -> Arc<Self> {
        Arc::new(Self {
            metadata: PluginMetadata::new(name, "0.1.0"),
            healthy,
            status: status.to_string(),
        })
    }
}

#[async_trait]
impl Plugin for ProbedPlugin {
    fn metadata(&self) -> &PluginMetadata {
        &self.metadata
    }

    async fn execute(&self, _payload: Option<&TaskPayload>) -> Result<(), ExecutionError> {
        Ok(())
    }

    fn health(&self) -> Option<&dyn HealthCheck> {
        Some(self)
    }
}

impl HealthCheck for ProbedPlugin {
    fn is_healthy(&self) -> bool {
        self.healthy
    }

    fn status(&self) -> String {
        self.status.clone()
    }
}

pub fn manager() -> PluginManager {
    PluginManager::new(Arc::new(PluginRegistry::new()))
}
