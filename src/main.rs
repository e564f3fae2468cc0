//! app-inventory binary entrypoint kept minimal. Commands live in `app_inventory::args`.

use std::fmt;
use std::path::Path;
use std::process::ExitCode;
use std::sync::OnceLock;

use app_inventory::args::{Args, determine_log_level, open_synchronizer, run_command};
use app_inventory::config::{self, paths};
use clap::Parser;

struct InventoryTimer;

impl tracing_subscriber::fmt::time::FormatTime for InventoryTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> fmt::Result {
        let ts = chrono::Local::now()
            .format("%Y-%m-%d-T %H:%M:%S")
            .to_string();
        w.write_str(&ts)
    }
}

static LOG_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

/// What: Install the tracing subscriber writing to `<config_dir>/logs/app-inventory.log`.
///
/// Inputs:
/// - `config_dir`: Configuration directory.
/// - `level`: Fallback filter when `RUST_LOG` is unset.
///
/// Details:
/// - Falls back to stderr when the log file cannot be opened.
fn init_logging(config_dir: &Path, level: &str) {
    let log_path = paths::logs_dir(config_dir).join("app-inventory.log");
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
    {
        Ok(file) => {
            let (non_blocking, guard) = tracing_appender::non_blocking(file);
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_ansi(false)
                .with_writer(non_blocking)
                .with_timer(InventoryTimer)
                .init();
            let _ = LOG_GUARD.set(guard);
            tracing::info!(path = %log_path.display(), "logging initialized");
        }
        Err(e) => {
            // Fallback: init stderr logger to avoid blocking startup
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_ansi(true)
                .with_writer(std::io::stderr)
                .with_timer(InventoryTimer)
                .init();
            tracing::warn!(error = %e, "failed to open log file; using stderr");
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let config_dir = args.config_dir.clone().unwrap_or_else(paths::config_dir);
    if let Err(e) = std::fs::create_dir_all(&config_dir) {
        eprintln!("cannot create config dir {}: {e}", config_dir.display());
        return ExitCode::FAILURE;
    }
    init_logging(&config_dir, &determine_log_level(&args));

    let settings = config::load_settings(&config_dir);
    tracing::info!(
        command = ?args.command,
        state_dir = %settings.state_dir.display(),
        "app-inventory starting"
    );

    let sync = match open_synchronizer(&settings).await {
        Ok(sync) => sync,
        Err(e) => {
            tracing::error!(error = %e, "failed to open collections");
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };

    if settings.repair_on_start && !args.no_repair {
        match sync.repair().await {
            Ok(report) if !report.is_clean() => tracing::info!(?report, "startup repair applied"),
            Ok(_) => {}
            // Not fatal: the command itself may still succeed.
            Err(e) => tracing::warn!(error = %e, "startup repair failed"),
        }
    }

    let code = match run_command(&sync, &args.command).await {
        Ok(lines) => {
            for line in lines {
                println!("{line}");
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "command failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    };
    tracing::info!("app-inventory exited");
    code
}
