/// Logging setup for the CLI.
///
/// Diagnostics go to stderr so report JSON on stdout stays clean. An optional
/// log directory additionally receives `logstats.log`, appended per session.
use anyhow::{Context, Result};
use is_terminal::IsTerminal;
use std::path::Path;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// File name used inside the log directory.
pub const LOG_FILE: &str = "logstats.log";

/// Initializes tracing.
///
/// # Arguments
///
/// * `log_dir` - Directory for the log file; stderr only when `None`
/// * `session` - Label written into the session separator
pub fn init(log_dir: Option<&Path>, session: &str) -> Result<()> {
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_target(false);

    let file_layer = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory: {}", dir.display()))?;
            write_separator(dir, session);

            let file_appender = tracing_appender::rolling::never(dir, LOG_FILE);
            Some(
                fmt::layer()
                    .with_writer(file_appender)
                    .with_ansi(false) // No ANSI codes in log files
                    .with_target(true)
                    .with_line_number(true)
                    .boxed(),
            )
        }
        None => None,
    };

    // Default to INFO level, but allow override via RUST_LOG env var
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .ok(); // Ignore error if already initialized

    tracing::debug!("Logging initialized for session: {}", session);
    Ok(())
}

fn write_separator(dir: &Path, session: &str) {
    use std::io::Write;

    let separator = format!(
        "\n{sep}\n[{ts}] New session: {session}\n{sep}\n",
        sep = "=".repeat(80),
        ts = chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        session = session
    );

    if let Ok(mut file) = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join(LOG_FILE))
    {
        let _ = writeln!(file, "{}", separator);
    }
}
