#![deny(clippy::all, clippy::pedantic)]
#![allow(clippy::unnecessary_wraps)]
//! # Runtime Binary
//!
//! ```text
//! runtime_main --scene scenes/pile.json --ticks 600 --watch
//! ```
//!
//! Logging follows `RUST_LOG`; `--verbose` raises the default to `debug`.

use std::path::PathBuf;
use std::sync::mpsc;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use runtime::app::{self, RunOptions};
use runtime::scene::{default_scene, Scene};
use runtime::watcher;

#[derive(Parser, Debug)]
#[command(name = "runtime_main", about = "Step a contact2d scene headlessly")]
struct Args {
    /// JSON scene file; the built-in pile is used when omitted.
    #[arg(long)]
    scene: Option<PathBuf>,

    #[arg(long, default_value_t = 600)]
    ticks: u64,

    /// Seconds per tick.
    #[arg(long, default_value_t = 1.0 / 60.0)]
    dt: f32,

    /// Reload the scene's config whenever the file changes.
    #[arg(long)]
    watch: bool,

    /// Ticks between progress lines; 0 disables them.
    #[arg(long, default_value_t = 60)]
    log_every: u64,

    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let scene = match &args.scene {
        Some(path) => Scene::load(path)?,
        None => default_scene(),
    };

    let (tx, rx) = mpsc::channel();
    let _scene_watcher = match (&args.scene, args.watch) {
        (Some(path), true) => match watcher::start(path, tx) {
            Ok(w) => Some(w),
            Err(e) => {
                tracing::error!("failed to start scene watcher: {e:#}");
                None
            }
        },
        (None, true) => {
            tracing::warn!("--watch needs --scene, ignoring");
            None
        }
        _ => None,
    };

    let options = RunOptions {
        ticks: args.ticks,
        dt: args.dt,
        log_every: args.log_every,
    };
    app::run(&scene, &options, Some(&rx))?;
    Ok(())
}
