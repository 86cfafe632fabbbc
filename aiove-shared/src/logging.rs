//! Logging setup driven by the `[logging]` section of the prelude.
//!
//! Everything goes to stderr; with `log_to_file` a copy without ANSI colors
//! also goes to the log file, which is truncated at every start so it only
//! ever holds the last run.

use std::fs::{self, File};
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::{self, MakeWriter};
use tracing_subscriber::layer::{Layered, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::error::{AioError, Result};
use crate::prelude::{LogFormat, LoggingSection};

type Filtered = Layered<EnvFilter, Registry>;
type BoxedLayer = Box<dyn Layer<Filtered> + Send + Sync>;

/// Installs the global subscriber. Keep the returned guard alive until exit,
/// dropping it flushes the file writer.
pub fn init_logging(config: &LoggingSection, log_file: &Path) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_filter()));

    let mut layers: Vec<BoxedLayer> = vec![format_layer(config.log_format, std::io::stderr, true)];

    let mut guard = None;
    if config.log_to_file {
        if let Some(parent) = log_file.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(log_file)?;
        let (writer, file_guard) = tracing_appender::non_blocking(file);
        layers.push(format_layer(config.log_format, writer, false));
        guard = Some(file_guard);
    }

    tracing_subscriber::registry()
        .with(filter)
        .with(layers)
        .try_init()
        .map_err(|e| AioError::Config(format!("logging already initialized: {e}")))?;

    Ok(guard)
}

fn format_layer<W>(format: LogFormat, writer: W, ansi: bool) -> BoxedLayer
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let base = fmt::layer().with_writer(writer).with_ansi(ansi);
    match format {
        LogFormat::Informational => base
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_timer(fmt::time::uptime())
            .boxed(),
        LogFormat::Pretty => base
            .with_target(false)
            .with_timer(fmt::time::uptime())
            .boxed(),
        LogFormat::Economic => base.compact().with_target(true).without_time().boxed(),
        LogFormat::Onlymessage => base
            .with_target(false)
            .with_level(false)
            .without_time()
            .boxed(),
    }
}
