//! Structured logging setup for the CLI front-end. Stdout always gets an
//! `INFO`-and-above feed; `--debug` additionally writes a daily-rotating
//! file under `./logs`, grounded on the engine crate's own `tracing`
//! stack plus `tracing-appender` for the rotating file sink.

use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::prelude::*;

/// Holds the non-blocking file appender's worker guard alive for the
/// process lifetime; dropping it early would stop flushing to the file.
pub struct LoggingGuard {
    _file_guard: Option<tracing_appender::non_blocking::WorkerGuard>,
}

/// Initializes the global `tracing` subscriber. `debug` enables the
/// rotating file sink at `./logs/flowcore.log` in addition to stdout.
pub fn init(debug: bool) -> LoggingGuard {
    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout.with_max_level(tracing::Level::INFO));

    if !debug {
        tracing_subscriber::registry().with(stdout_layer).init();
        return LoggingGuard { _file_guard: None };
    }

    let file_appender = tracing_appender::rolling::daily("./logs", "flowcore.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_max_level(tracing::Level::DEBUG);

    tracing_subscriber::registry()
        .with(stdout_layer)
        .with(file_layer)
        .init();

    LoggingGuard {
        _file_guard: Some(guard),
    }
}
