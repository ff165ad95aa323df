// ABOUTME: Diagnostic logging setup for herd, kept off stdout
// ABOUTME: stdout belongs to the supervisor's worker stream; tracing goes to stderr or a file

use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Diagnostics to stderr. Default: WARN level, RUST_LOG override.
///
/// The supervisor prints worker output and status lines on stdout, so the
/// tracing layer stays quiet unless asked.
pub fn init() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter_with_default(Level::WARN))
        .init();
}

/// File-based diagnostics. Default: INFO level, RUST_LOG override.
/// Logs to ~/.config/herd/{app_name}.log
/// If setup fails, prints a warning to stderr and continues without diagnostics.
pub fn init_file(app_name: &str) {
    if let Err(e) = init_file_inner(app_name) {
        eprintln!("Warning: failed to set up file logging: {e}");
    }
}

fn init_file_inner(app_name: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config_dir = dirs::config_dir().ok_or("could not determine config directory")?;
    let log_dir = config_dir.join("herd");
    std::fs::create_dir_all(&log_dir)?;

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join(format!("{app_name}.log")))?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_env_filter(filter_with_default(Level::INFO))
        .with_ansi(false)
        .try_init()?;

    Ok(())
}

fn filter_with_default(level: Level) -> EnvFilter {
    EnvFilter::from_default_env().add_directive(level.into())
}
