// src/utils/logging.rs
use std::path::Path;

use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

use crate::utils::config::{LogFormat, LogSettings};
use crate::utils::error::{HostError, Result};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Installs the global subscriber: rolling daily file (non-blocking) plus an
/// optional stdout mirror. The returned guard must outlive the process' logging.
pub fn init_logging(settings: &LogSettings) -> Result<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.level))
        .map_err(|e| HostError::Logging(format!("invalid log level '{}': {}", settings.level, e)))?;

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(&settings.file_prefix)
        .max_log_files(settings.max_files)
        .build(Path::new(&settings.directory))
        .map_err(|e| HostError::Logging(e.to_string()))?;
    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    let mut layers: Vec<BoxedLayer> = Vec::new();
    layers.push(format_layer(settings.format, file_writer, false));
    if settings.stdout {
        layers.push(format_layer(settings.format, std::io::stdout, true));
    }

    tracing_subscriber::registry()
        .with(layers.with_filter(filter))
        .try_init()
        .map_err(|e| HostError::Logging(e.to_string()))?;

    info!(
        path = %Path::new(&settings.directory).join(&settings.file_prefix).display(),
        level = %settings.level,
        format = ?settings.format,
        "Plugin logger initialized"
    );

    Ok(guard)
}

fn format_layer<W>(format: LogFormat, writer: W, ansi: bool) -> BoxedLayer
where
    W: for<'w> fmt::MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = fmt::layer()
        .with_writer(writer)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    match format {
        LogFormat::Json => layer.json().boxed(),
        LogFormat::Text => layer.with_ansi(ansi).boxed(),
    }
}
