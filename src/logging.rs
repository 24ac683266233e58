use crate::config::Config;
use std::fs;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

/// Installs the global tracing subscriber for the binary.
///
/// Logs are appended to the log file in the data directory so the interactive
/// prompt stays readable; stderr is the fallback. `RUST_LOG` overrides the
/// configured level.
pub fn init(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str()));

    let _ = fs::create_dir_all(&config.data_dir);
    let log_path = config.log_path();
    let installed = match fs::OpenOptions::new().create(true).append(true).open(&log_path) {
        Ok(file) => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(Mutex::new(file))
            .with_ansi(false)
            .try_init(),
        Err(_) => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init(),
    };

    if installed.is_err() {
        // Another subscriber was set first (tests, embedding apps)
        return;
    }
    tracing::debug!(path = %log_path.display(), "logging initialized");
}
