// src/plugins/official/email_notifier/notifier.rs
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info, warn};

use super::mailer::{parse_mailbox, MailError, Mailer, OutgoingMail, SmtpMailer};
use crate::plugins::health::{HealthCheck, HealthStatus};
use crate::plugins::payload::{ResponseNotice, TaskPayload};
use crate::plugins::pool::{PoolConfig, WorkerPool};
use crate::plugins::traits::{ExecutionError, Plugin};
use crate::plugins::types::PluginMetadata;
use crate::utils::config::EmailNotifierSettings;

pub const PLUGIN_NAME: &str = "email_notifier";
pub const PLUGIN_VERSION: &str = "0.1.0";

const READY: &str = "ready to send emails";
const INCOMPLETE_SMTP: &str = "incomplete SMTP configuration";

/// Notifies survey creators by email when a response arrives. Each send runs
/// on the plugin's own worker pool; `execute` only queues it.
pub struct EmailNotifier {
    metadata: PluginMetadata,
    status: HealthStatus,
    sender: Option<Sender>,
}

struct Sender {
    pool: WorkerPool,
    mailer: Arc<dyn Mailer>,
    from: String,
}

impl EmailNotifier {
    /// Builds the notifier over a STARTTLS SMTP relay. Configuration problems
    /// leave the plugin registered but unhealthy rather than failing.
    pub fn from_settings(settings: &EmailNotifierSettings) -> Self {
        Self::build(settings, || {
            let mailer = SmtpMailer::new(&settings.smtp, settings.smtp_port())?;
            Ok(Arc::new(mailer) as Arc<dyn Mailer>)
        })
    }

    pub fn with_mailer(settings: &EmailNotifierSettings, mailer: Arc<dyn Mailer>) -> Self {
        Self::build(settings, move || Ok(mailer))
    }

    fn build<F>(settings: &EmailNotifierSettings, make_mailer: F) -> Self
    where
        F: FnOnce() -> Result<Arc<dyn Mailer>, MailError>,
    {
        let metadata = PluginMetadata::new(PLUGIN_NAME, PLUGIN_VERSION)
            .with_description("Send email notifications for new survey responses");

        let missing = settings.missing_fields();
        if !missing.is_empty() {
            warn!(
                plugin = %metadata.name,
                version = %metadata.version,
                missing = ?missing,
                "SMTP configuration is incomplete, email notifier disabled"
            );
            return Self::unavailable(metadata, HealthStatus::Disabled(INCOMPLETE_SMTP.into()));
        }

        match Self::connect(settings, make_mailer) {
            Ok(sender) => {
                info!(
                    plugin = %metadata.name,
                    version = %metadata.version,
                    host = %settings.smtp.host,
                    port = settings.smtp_port(),
                    from = %settings.smtp.from,
                    "email notifier initialized"
                );
                Self {
                    metadata,
                    status: HealthStatus::Active(READY.into()),
                    sender: Some(sender),
                }
            }
            Err(reason) => {
                error!(
                    plugin = %metadata.name,
                    version = %metadata.version,
                    error = %reason,
                    "failed to initialize email notifier"
                );
                Self::unavailable(metadata, HealthStatus::Error(reason))
            }
        }
    }

    fn connect<F>(settings: &EmailNotifierSettings, make_mailer: F) -> Result<Sender, String>
    where
        F: FnOnce() -> Result<Arc<dyn Mailer>, MailError>,
    {
        parse_mailbox(&settings.smtp.from).map_err(|e| e.to_string())?;

        let config = PoolConfig::new(settings.worker_num(), settings.scale_threshold())
            .with_task_timeout(settings.task_timeout());
        let pool = WorkerPool::new(PLUGIN_NAME, PLUGIN_VERSION, config).map_err(|e| e.to_string())?;
        let mailer = make_mailer().map_err(|e| e.to_string())?;

        Ok(Sender {
            pool,
            mailer,
            from: settings.smtp.from.clone(),
        })
    }

    fn unavailable(metadata: PluginMetadata, status: HealthStatus) -> Self {
        Self {
            metadata,
            status,
            sender: None,
        }
    }

    pub fn health_status(&self) -> &HealthStatus {
        &self.status
    }

    /// The send pool, present only when the notifier is active.
    pub fn pool(&self) -> Option<&WorkerPool> {
        self.sender.as_ref().map(|sender| &sender.pool)
    }

    fn enqueue(&self, sender: &Sender, notice: &ResponseNotice) -> Result<(), ExecutionError> {
        let mail = OutgoingMail::response_notice(&sender.from, notice);
        let mailer = sender.mailer.clone();

        let task_id = sender
            .pool
            .submit(deliver(mailer, mail, self.metadata.version.clone()))
            .map_err(|e| ExecutionError::Failed(e.to_string()))?;

        info!(
            plugin = %self.metadata.name,
            version = %self.metadata.version,
            task_id,
            recipient = %notice.creator_email(),
            "notification queued"
        );
        Ok(())
    }
}

async fn deliver(mailer: Arc<dyn Mailer>, mail: OutgoingMail, version: String) {
    match mailer.send(mail.clone()).await {
        Ok(()) => info!(
            plugin = PLUGIN_NAME,
            version = %version,
            recipient = %mail.to,
            subject = %mail.subject,
            "notification email sent"
        ),
        Err(e) => error!(
            plugin = PLUGIN_NAME,
            version = %version,
            recipient = %mail.to,
            error = %e,
            "failed to send notification email"
        ),
    }
}

#[async_trait]
impl Plugin for EmailNotifier {
    fn metadata(&self) -> &PluginMetadata {
        &self.metadata
    }

    async fn execute(&self, payload: Option<&TaskPayload>) -> Result<(), ExecutionError> {
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| ExecutionError::Disabled(self.status.reason().to_string()))?;

        match payload {
            None => {
                info!(
                    plugin = %self.metadata.name,
                    version = %self.metadata.version,
                    workers = sender.pool.config().worker_count,
                    "email notifier started"
                );
                Ok(())
            }
            Some(TaskPayload::ResponseNotice(notice)) => self.enqueue(sender, notice),
        }
    }

    fn health(&self) -> Option<&dyn HealthCheck> {
        Some(self)
    }
}

impl HealthCheck for EmailNotifier {
    fn is_healthy(&self) -> bool {
        self.status.is_active()
    }

    fn status(&self) -> String {
        self.status.to_string()
    }
}
