pub mod plugins;
pub mod utils;

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::{
    plugins::{
        isolation::install_panic_hook,
        manager::PluginManager,
        official::EmailNotifier,
        registry::PluginRegistry,
        traits::Plugin,
        types::PluginOutcome,
        PluginHealth,
    },
    utils::{config::Settings, error::Result},
};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Host process wiring: settings, the plugin registry and the dispatcher.
pub struct Application {
    settings: Arc<Settings>,
    plugin_manager: Arc<PluginManager>,
    email_notifier: Arc<EmailNotifier>,
}

impl Application {
    pub fn new(settings: Settings) -> Self {
        let settings = Arc::new(settings);

        info!("Initializing plugin system...");
        let registry = Arc::new(PluginRegistry::new());
        let plugin_manager =
            Arc::new(PluginManager::new(registry).with_order(settings.plugins.order.clone()));

        let email_notifier = Arc::new(EmailNotifier::from_settings(&settings.email_notifier));
        register_builtin_plugins(&plugin_manager, vec![email_notifier.clone() as Arc<dyn Plugin>]);

        Self {
            settings,
            plugin_manager,
            email_notifier,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn plugin_manager(&self) -> &Arc<PluginManager> {
        &self.plugin_manager
    }

    /// Loads the configured plugins, reports their health and runs every
    /// startup call. Fails only when a configured name is not registered.
    pub async fn start(&self) -> Result<Vec<PluginOutcome>> {
        install_panic_hook();

        info!("Loading plugins...");
        let report: Vec<PluginHealth> = self.plugin_manager.health_report()?;
        let unhealthy = report.iter().filter(|entry| !entry.healthy).count();
        if unhealthy > 0 {
            warn!(unhealthy, total = report.len(), "some plugins are not healthy");
        }

        info!("Starting plugin services...");
        let outcomes = self.plugin_manager.execute_plugin_list().await?;
        for outcome in outcomes.iter().filter(|o| !o.is_started()) {
            let version = self
                .plugin_manager
                .get(outcome.name())
                .map(|plugin| plugin.metadata().version.clone())
                .unwrap_or_default();
            error!(
                plugin = %outcome.name(),
                version = %version,
                outcome = ?outcome,
                "plugin did not start"
            );
        }

        info!(plugins = outcomes.len(), "Application successfully started");
        Ok(outcomes)
    }

    /// Gives queued notifications up to `SHUTDOWN_GRACE` to drain.
    pub async fn shutdown(&self) -> Result<()> {
        info!("Shutting down application...");

        if let Some(pool) = self.email_notifier.pool() {
            let queued = pool.queued();
            if tokio::time::timeout(SHUTDOWN_GRACE, pool.wait_idle()).await.is_err() {
                warn!(
                    pool = %pool.name(),
                    queued,
                    remaining = pool.queued(),
                    "shutdown grace period elapsed with tasks still pending"
                );
            }
            info!(
                pool = %pool.name(),
                metrics = ?pool.metrics(),
                average_task_ms = pool.average_task_time().as_millis() as u64,
                uptime_secs = pool.uptime().as_secs(),
                "worker pool stopped"
            );
        }

        info!("Application shutdown complete");
        Ok(())
    }
}

/// Registers the plugins shipped with the host. A rejected registration is
/// logged and skipped so one bad plugin cannot keep the rest from loading.
pub fn register_builtin_plugins(manager: &PluginManager, plugins: Vec<Arc<dyn Plugin>>) {
    for plugin in plugins {
        if let Err(e) = manager.register(plugin) {
            error!(error = %e, "failed to register built-in plugin");
        }
    }
}
