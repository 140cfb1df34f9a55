use std::fs;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const LOG_DIR: &str = "logs";

/// Initializes logging: human-readable console output on stderr plus a
/// daily-rotated JSON file under `logs/` for post-hoc run inspection.
pub fn init_logging() {
    let _ = fs::create_dir_all(LOG_DIR);

    let file_appender = tracing_appender::rolling::daily(LOG_DIR, "pipeline.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::from_default_env()
        .add_directive("survey_pipeline=info".parse().unwrap());

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().with_writer(file_writer))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    // The guard flushes buffered log lines on drop; the subscriber lives for
    // the whole process, so leak it.
    std::mem::forget(guard);
}
