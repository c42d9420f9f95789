// src/utils/config.rs
use std::path::Path;
use std::time::Duration;

use config::{Config as ConfigLib, ConfigBuilder, ConfigError, Environment, File};
use config::builder::DefaultState;
use serde::Deserialize;

use crate::utils::error::{HostError, Result};

pub const DEFAULT_WORKER_NUM: i64 = 20;
pub const DEFAULT_SCALE_THRESHOLD: i64 = 100;
pub const DEFAULT_SMTP_PORT: u16 = 587;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    pub plugins: PluginsSettings,
    pub email_notifier: EmailNotifierSettings,
    pub log: LogSettings,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PluginsSettings {
    /// Startup order; also the set of plugins taking part in `execute_plugin_list`.
    #[serde(default)]
    pub order: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SmtpSettings {
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub port: u16,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub from: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EmailNotifierSettings {
    #[serde(default)]
    pub smtp: SmtpSettings,
    pub worker_num: Option<i64>,
    pub scale_threshold: Option<i64>,
    /// Opt-in deadline for a single send, in seconds. Unset means no deadline.
    pub task_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogSettings {
    pub level: String,
    pub directory: String,
    pub file_prefix: String,
    pub format: LogFormat,
    pub max_files: usize,
    pub stdout: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Text,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".into(),
            directory: "logs".into(),
            file_prefix: "plugin.log".into(),
            format: LogFormat::Json,
            max_files: 7,
            stdout: true,
        }
    }
}

impl Settings {
    /// Loads `config/default` and `config/local` (both optional) and applies
    /// `QA__`-prefixed environment overrides, e.g. `QA__EMAIL_NOTIFIER__SMTP__HOST`.
    pub fn new() -> Result<Self> {
        let builder = Self::defaults()?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(Self::environment());

        Self::finish(builder)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let builder = Self::defaults()?
            .add_source(File::from(path.as_ref()))
            .add_source(Self::environment());

        Self::finish(builder)
    }

    fn defaults() -> Result<ConfigBuilder<DefaultState>> {
        let log = LogSettings::default();
        let builder = ConfigLib::builder()
            .set_default("plugins.order", Vec::<String>::new())?
            .set_default("email_notifier.smtp.host", "")?
            .set_default("email_notifier.smtp.port", 0i64)?
            .set_default("email_notifier.smtp.username", "")?
            .set_default("email_notifier.smtp.password", "")?
            .set_default("email_notifier.smtp.from", "")?
            .set_default("log.level", log.level)?
            .set_default("log.directory", log.directory)?
            .set_default("log.file_prefix", log.file_prefix)?
            .set_default("log.format", "json")?
            .set_default("log.max_files", log.max_files as i64)?
            .set_default("log.stdout", log.stdout)?;
        Ok(builder)
    }

    fn environment() -> Environment {
        Environment::with_prefix("QA")
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("plugins.order")
            .try_parsing(true)
    }

    fn finish(builder: ConfigBuilder<DefaultState>) -> Result<Self> {
        let settings: Self = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        if let Some(name) = self.plugins.order.iter().find(|n| n.trim().is_empty()) {
            return Err(HostError::Config(format!(
                "plugins.order contains an empty plugin name ({:?})",
                name
            )));
        }

        if self.log.max_files == 0 {
            return Err(HostError::Config("log.max_files must be greater than 0".into()));
        }

        Ok(())
    }
}

impl EmailNotifierSettings {
    /// Worker ceiling; out-of-range values fall back to the default.
    pub fn worker_num(&self) -> usize {
        positive_or(self.worker_num, DEFAULT_WORKER_NUM)
    }

    pub fn scale_threshold(&self) -> usize {
        positive_or(self.scale_threshold, DEFAULT_SCALE_THRESHOLD)
    }

    pub fn smtp_port(&self) -> u16 {
        if self.smtp.port == 0 {
            DEFAULT_SMTP_PORT
        } else {
            self.smtp.port
        }
    }

    pub fn task_timeout(&self) -> Option<Duration> {
        self.task_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    /// Names of the required SMTP fields that are empty.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let smtp = &self.smtp;
        [
            ("host", &smtp.host),
            ("username", &smtp.username),
            ("password", &smtp.password),
            ("from", &smtp.from),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(field, _)| field)
        .collect()
    }
}

fn positive_or(value: Option<i64>, default: i64) -> usize {
    match value {
        Some(v) if v > 0 && v < i32::MAX as i64 => v as usize,
        _ => default as usize,
    }
}

impl From<ConfigError> for HostError {
    fn from(error: ConfigError) -> Self {
        HostError::Config(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults_applied_for_missing_sections() {
        let file = write_config("[plugins]\norder = [\"email_notifier\"]\n");
        let settings = Settings::from_file(file.path()).unwrap();

        assert_eq!(settings.plugins.order, vec!["email_notifier"]);
        assert_eq!(settings.email_notifier.worker_num(), 20);
        assert_eq!(settings.email_notifier.scale_threshold(), 100);
        assert_eq!(settings.email_notifier.smtp_port(), 587);
        assert_eq!(settings.email_notifier.task_timeout(), None);
        assert_eq!(settings.log.format, LogFormat::Json);
        assert_eq!(settings.log.max_files, 7);
    }

    #[test]
    fn test_smtp_section_parsed() {
        let file = write_config(
            r#"
[email_notifier]
worker_num = 4
scale_threshold = 2
task_timeout_secs = 30

[email_notifier.smtp]
host = "smtp.example.com"
port = 2525
username = "mailer"
password = "secret"
from = "noreply@example.com"

[log]
format = "text"
"#,
        );
        let settings = Settings::from_file(file.path()).unwrap();
        let email = &settings.email_notifier;

        assert_eq!(email.smtp.host, "smtp.example.com");
        assert_eq!(email.smtp_port(), 2525);
        assert_eq!(email.worker_num(), 4);
        assert_eq!(email.scale_threshold(), 2);
        assert_eq!(email.task_timeout(), Some(Duration::from_secs(30)));
        assert!(email.missing_fields().is_empty());
        assert_eq!(settings.log.format, LogFormat::Text);
    }

    #[test]
    fn test_out_of_range_pool_sizes_fall_back() {
        let email = EmailNotifierSettings {
            worker_num: Some(0),
            scale_threshold: Some(-5),
            ..Default::default()
        };
        assert_eq!(email.worker_num(), 20);
        assert_eq!(email.scale_threshold(), 100);

        let email = EmailNotifierSettings {
            worker_num: Some(i32::MAX as i64),
            ..Default::default()
        };
        assert_eq!(email.worker_num(), 20);
    }

    #[test]
    fn test_missing_fields_reported() {
        let email = EmailNotifierSettings {
            smtp: SmtpSettings {
                host: "smtp.example.com".into(),
                ..Default::default()
            },
            ..Default::default()
        };
        assert_eq!(email.missing_fields(), vec!["username", "password", "from"]);
    }

    #[test]
    fn test_empty_plugin_name_rejected() {
        let file = write_config("[plugins]\norder = [\"email_notifier\", \" \"]\n");
        let err = Settings::from_file(file.path()).unwrap_err();
        assert!(matches!(err, HostError::Config(_)));
    }

    #[test]
    fn test_environment_overrides_file() {
        let file = write_config("[email_notifier.smtp]\nusername = \"file-user\"\n");
        std::env::set_var("QA__EMAIL_NOTIFIER__SMTP__USERNAME", "env-user");
        let settings = Settings::from_file(file.path());
        std::env::remove_var("QA__EMAIL_NOTIFIER__SMTP__USERNAME");

        assert_eq!(settings.unwrap().email_notifier.smtp.username, "env-user");
    }
}
