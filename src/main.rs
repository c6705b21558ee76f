//! Remote KVM bridge server
//!
//! Mediates between one remote operator on a framed TCP channel and a
//! physically attached target: keyboard/mouse/ATX commands go out as
//! checksummed serial frames to the HID emulation board, video is served by
//! a supervised `mjpg_streamer` helper process.
//!
//! Usage:
//!   okvm-server [PORT]                 Listen on PORT (default 7130)
//!   okvm-server -B ::  --log-level 4   Bind all addresses, debug logging

mod capture;
mod cli;
mod config;
mod constants;
mod error;
mod logging;
mod mjpg;
mod protocol;
mod server;
mod signal;
mod uart;

use clap::Parser;
use cli::{Cli, Settings};
use std::path::Path;
use tracing::error;

/// Exit code when the requested address cannot be bound
const EXIT_BIND_FAILURE: i32 = 48;

fn main() {
    let args = Cli::parse();
    let config = config::load();
    let settings = Settings::merge(args, config);

    if let Err(reason) = preflight(&settings) {
        eprintln!("{}", reason);
        std::process::exit(1);
    }

    if let Err(e) = logging::init(settings.log_level, settings.logfile.as_deref()) {
        eprintln!("{}", e);
        std::process::exit(1);
    }

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            error!("Failed to create runtime: {}", e);
            std::process::exit(1);
        }
    };
    std::process::exit(rt.block_on(run(settings)));
}

async fn run(settings: Settings) -> i32 {
    let shutdown = signal::ShutdownFlag::new();
    signal::spawn_handler(shutdown.clone());

    let server = match server::Server::bind(&settings, shutdown) {
        Ok(server) => server,
        Err(e) => {
            error!("{}", e);
            return EXIT_BIND_FAILURE;
        }
    };
    match server.run().await {
        Ok(()) => 0,
        Err(e) => {
            error!("{}", e);
            1
        }
    }
}

// =============================================================================
// Preflight checks (exit 1 before any socket is touched)
// =============================================================================

fn preflight(settings: &Settings) -> Result<(), String> {
    if !cfg!(target_os = "linux") {
        return Err("okvm-server requires Linux".into());
    }
    if !helper_available(&settings.mjpg_root) {
        let place = if settings.mjpg_root.as_os_str().is_empty() {
            "system environment path".to_string()
        } else {
            format!("path \"{}\"", settings.mjpg_root.display())
        };
        return Err(format!(
            "Executable file \"mjpg_streamer\" not found in {}",
            place
        ));
    }
    check_logfile(settings.logfile.as_deref())?;
    check_logfile(settings.mjpg_logfile.as_deref())?;
    Ok(())
}

/// Is `mjpg_streamer` executable in the configured root (or on PATH)?
fn helper_available(root: &Path) -> bool {
    if root.as_os_str().is_empty() {
        let Some(path) = std::env::var_os("PATH") else {
            return false;
        };
        std::env::split_paths(&path).any(|dir| is_executable(&dir.join("mjpg_streamer")))
    } else {
        is_executable(&root.join("mjpg_streamer"))
    }
}

fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

/// A configured log file must sit in an existing directory and must not be
/// a directory itself
fn check_logfile(path: Option<&Path>) -> Result<(), String> {
    let Some(path) = path else {
        return Ok(());
    };
    if path.is_dir() {
        return Err(format!(
            "Log file \"{}\" should not be a folder",
            path.display()
        ));
    }
    let folder = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    if !folder.is_dir() {
        return Err(format!("Path \"{}\" does not exist", folder.display()));
    }
    Ok(())
}
