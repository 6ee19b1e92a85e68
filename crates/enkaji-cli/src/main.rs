//! Enkaji admin - a terminal front end for the store's back office.
//!
//! Every protected command goes through the core's route guard and
//! session-aware transport, so an expired session is refreshed silently and
//! an unrecoverable one sends the user back to `login`.

mod commands;

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use enkaji_core::{AdminConsole, Config, FileStorage};
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use commands::Command;

/// Log file name prefix inside `<cache_dir>/logs`
const LOG_FILE_PREFIX: &str = "enkaji-admin.log";

/// Directory under the cache dir holding the persisted session
const SESSION_DIR: &str = "session";

/// Initialize the tracing subscriber for logging.
///
/// Use RUST_LOG to control the level (e.g. RUST_LOG=enkaji_core=debug).
/// Returns the guard that flushes the log file on drop.
fn init_tracing(cache_dir: &Path) -> WorkerGuard {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let appender = tracing_appender::rolling::daily(cache_dir.join("logs"), LOG_FILE_PREFIX);
    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(fmt::layer().with_ansi(false).with_writer(file_writer))
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let config_result = Config::load();
    let mut config = config_result.as_ref().cloned().unwrap_or_default();
    let cache_dir = config
        .cache_dir()
        .unwrap_or_else(|_| PathBuf::from("./cache"));

    let _log_guard = init_tracing(&cache_dir);
    if let Err(e) = config_result {
        warn!(error = %e, "Failed to load config, using defaults");
    }
    info!("Enkaji admin starting");

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = match Command::parse(&args) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("{}\n", e);
            commands::print_usage();
            return Ok(());
        }
    };
    if matches!(command, Command::Help) {
        commands::print_usage();
        return Ok(());
    }

    let storage = Arc::new(FileStorage::new(cache_dir.join(SESSION_DIR)));
    let console = AdminConsole::new(&config, storage)?;

    // The session must be rehydrated before any guarded command runs
    let status = console.start().await;
    debug!(?status, "Session ready");

    let result = commands::run(&console, &mut config, command).await;

    info!("Enkaji admin shutting down");
    result
}
