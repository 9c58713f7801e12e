use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Keeps the non-blocking file writer alive. Dropping it flushes and stops
/// the background logging thread.
pub struct FileLogGuard {
    _guard: WorkerGuard,
}

fn file_logging_enabled() -> bool {
    std::env::var("PROGRESS_FILE_LOGS")
        .map(|value| value == "true" || value == "1")
        .unwrap_or(false)
}

/// Initialize the tracing subscriber: stdout always, plus a daily-rotated
/// log file when `PROGRESS_FILE_LOGS` is set. Call once per process.
pub fn init_tracing(log_level: &str) -> Option<FileLogGuard> {
    let env_filter =
        EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    let stdout_layer = fmt::layer().with_target(true);

    if file_logging_enabled() {
        let log_dir =
            std::env::var("PROGRESS_LOG_DIR").unwrap_or_else(|_| "logs".to_string());
        let file_appender = RollingFileAppender::new(Rotation::DAILY, &log_dir, "progress.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        let file_layer = fmt::layer().with_ansi(false).with_writer(non_blocking);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stdout_layer)
            .with(file_layer)
            .init();

        tracing::info!(dir = %log_dir, "file logging enabled");
        Some(FileLogGuard { _guard: guard })
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stdout_layer)
            .init();
        None
    }
}
