mod config;
mod core;
mod ewmh;
mod window;

use std::future::Future;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context as _, Result};
use clap::Parser;
use tokio::signal::unix::{signal, SignalKind};
use tokio::task::JoinHandle;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::{Configuration, MarkerSize, Overrides, Rgba};
use crate::core::context::Context;
use crate::window::sync::SyncController;

const PROGRAM_NAME: &str = env!("CARGO_PKG_NAME");

/// Mark the focused window, and optionally every other window, with a colored overlay
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Color of the marker on the active window (#RRGGBB or #RRGGBBAA)
    #[arg(short, long, value_name = "COLOR")]
    active: Option<Rgba>,

    /// Color covering inactive windows; inactive windows are only marked when set
    #[arg(short, long, value_name = "COLOR")]
    inactive: Option<Rgba>,

    /// Size of the active marker
    #[arg(short, long, value_name = "WxH")]
    size: Option<MarkerSize>,

    /// Configuration file [default: $XDG_CONFIG_HOME/xfce-rs/focusmark.toml]
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// X display to connect to instead of $DISPLAY
    #[arg(short, long)]
    display: Option<String>,
}

fn run_engine(ctx: Context, config: Configuration) -> Result<()> {
    let mut controller = SyncController::new(&ctx, config);
    let outcome = controller.start().and_then(|_| controller.run());
    // Best effort even when the loop died: a dead connection just fails
    // every request quietly.
    controller.terminate();
    outcome?;
    Ok(())
}

async fn shutdown_signal() -> std::io::Result<()> {
    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result,
        _ = terminate.recv() => Ok(()),
    }
}

async fn run(args: Args) -> Result<()> {
    let overrides = Overrides {
        active_color: args.active,
        inactive_color: args.inactive,
        marker_size: args.size,
    };
    let config = Configuration::load(args.config.as_deref(), overrides)?;
    info!(
        "Starting {}: active {}, inactive {}, marker {}",
        PROGRAM_NAME,
        config.active_color,
        config.inactive_color.map_or_else(|| "off".to_string(), |c| c.to_string()),
        config.marker
    );

    let ctx = Context::new(args.display.as_deref())?;
    info!("Connected to X11 server, screen {}, root window 0x{:x}", ctx.screen_num, ctx.root_window);
    let shutdown = ctx.shutdown_handle();

    // The engine blocks on the X connection; signals are watched here and
    // forwarded to it as a client message.
    let engine = tokio::task::spawn_blocking(move || run_engine(ctx, config));
    supervise(engine, shutdown_signal(), move || shutdown.request()).await
}

/// Wait for the engine to finish or a signal to arrive. In the latter case
/// the engine is always woken with `stop` and awaited before returning, even
/// when watching for signals failed.
async fn supervise<S, F>(mut engine: JoinHandle<Result<()>>, signal: S, stop: F) -> Result<()>
where
    S: Future<Output = std::io::Result<()>>,
    F: FnOnce() -> Result<()>,
{
    tokio::select! {
        joined = &mut engine => joined?,
        received = signal => {
            if received.is_ok() {
                info!("Signal received, stopping");
            }
            stop()?;
            let outcome = engine.await?;
            received.context("failed to watch for signals")?;
            outcome
        }
    }
}

fn failure_line(e: &anyhow::Error) -> String {
    format!("{}: {:#}", PROGRAM_NAME, e)
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", failure_line(&e));
            ExitCode::FAILURE
        }
    }
}
