//! `tunnelkey-tui` — Terminal UI for managing a tunnelkey device key.
//!
//! Connects to the VPN daemon over its management socket and presents the
//! device key screen: show the public key, generate a replacement, verify
//! it against the backend, all while tracking tunnel connectivity.
//!
//! Logs are written to a file (default `/tmp/tunnelkey-tui.log`) to avoid
//! corrupting the terminal UI.
//!
//! Entry point: CLI argument parsing, tracing setup, panic hooks, and app
//! launch.

mod action;
mod app;
mod bridge;
mod component;
mod event;
mod screens;
mod theme;
mod tui;
mod widgets;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use color_eyre::eyre::{Result, WrapErr as _};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use tunnelkey_core::daemon::DaemonClient;
use tunnelkey_core::{Config, KeyManager, config};

use crate::app::App;

/// Terminal UI for managing a tunnelkey device key.
#[derive(Parser, Debug)]
#[command(name = "tunnelkey-tui", version, about)]
struct Cli {
    /// Daemon management socket path
    #[arg(short = 's', long, env = "TUNNELKEY_SOCKET_PATH")]
    socket: Option<PathBuf>,

    /// Log file path (defaults to /tmp/tunnelkey-tui.log)
    #[arg(long, default_value = "/tmp/tunnelkey-tui.log")]
    log_file: PathBuf,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Set up file-based tracing. We MUST NOT log to stdout/stderr — that would
/// corrupt the TUI output. Returns a guard that must be held for the
/// lifetime of the application to ensure logs are flushed.
fn setup_tracing(cli: &Cli) -> WorkerGuard {
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("tunnelkey_tui={log_level},tunnelkey_core={log_level}"))
    });

    let log_dir = cli
        .log_file
        .parent()
        .unwrap_or(std::path::Path::new("/tmp"));
    let log_filename = cli
        .log_file
        .file_name()
        .unwrap_or(std::ffi::OsStr::new("tunnelkey-tui.log"));

    let file_appender = tracing_appender::rolling::never(log_dir, log_filename);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true),
        )
        .init();

    guard
}

/// Config file merged with env, then CLI flags applied on top.
fn effective_config(cli: &Cli) -> Config {
    let mut cfg = config::load_config_or_default();
    if let Some(ref socket) = cli.socket {
        cfg.socket_path.clone_from(socket);
    }
    cfg
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Install panic/error hooks BEFORE entering the terminal
    tui::install_hooks()?;

    // Tracing to file — hold the guard so logs flush on exit
    let _log_guard = setup_tracing(&cli);

    let cfg = effective_config(&cli);
    info!(socket = %cfg.socket_path.display(), "starting tunnelkey-tui");

    let (client, daemon_events) = DaemonClient::connect(&cfg.daemon_config())
        .await
        .wrap_err("failed to connect to the tunnelkey daemon")?;

    let manager = KeyManager::new(Arc::new(client));
    manager.spawn_event_pump(daemon_events);

    let mut app = App::new(manager.clone(), cfg.account_url.clone());
    app.run().await?;

    manager.shutdown();
    Ok(())
}
