use std::fs;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::LoggingConfig;

/// Initializes logging: human-readable console output on stderr, plus daily
/// rotated JSON files when a log directory is configured.
///
/// stdout is left alone because the CLI writes its JSON results there. Hold
/// the returned guard until exit so buffered file logs are flushed.
pub fn init_logging(config: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.filter))
        .unwrap_or_else(|_| EnvFilter::new("seoul_now=info"));

    let console_layer = fmt::layer().with_writer(std::io::stderr);

    let (file_layer, guard) = match &config.dir {
        Some(dir) => match fs::create_dir_all(dir) {
            Ok(()) => {
                let file_appender = tracing_appender::rolling::daily(dir, "seoul_now.log");
                let (non_blocking_writer, guard) = tracing_appender::non_blocking(file_appender);
                (Some(fmt::layer().json().with_writer(non_blocking_writer)), Some(guard))
            }
            Err(e) => {
                eprintln!("Could not create log directory {}: {}", dir.display(), e);
                (None, None)
            }
        },
        None => (None, None),
    };

    // A subscriber may already be set (tests, embedding applications)
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(console_layer)
        .try_init();

    guard
}
