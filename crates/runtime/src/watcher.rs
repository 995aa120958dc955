//! # Scene Hot-Reloading
//!
//! Watches the scene file and, when it changes, re-parses it and hands the
//! new [`WorldConfig`] to the simulation loop over a channel. Bodies are not
//! respawned; only solver, constraint and collision settings are swapped in,
//! so a running simulation can be tuned without restarting it.
//!
//! The watcher runs on `notify`'s own thread. The returned
//! [`RecommendedWatcher`] must be kept alive for as long as reloads are
//! wanted.

use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;

use anyhow::{Context, Result};
use contact2d::WorldConfig;
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher as NotifyWatcher};
use tracing::{error, info, warn};

use crate::scene::Scene;

/// Starts watching `path` and sends every successfully parsed config on `tx`.
pub fn start(path: &Path, tx: Sender<WorldConfig>) -> Result<RecommendedWatcher> {
    let scene_path = path.to_path_buf();
    let mut watcher =
        notify::recommended_watcher(move |result: notify::Result<Event>| match result {
            Ok(event) => handle_event(&event, &scene_path, &tx),
            Err(e) => error!("scene watcher error: {e:?}"),
        })
        .context("creating scene watcher")?;

    // Editors often replace the file, so watch the directory and filter.
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
    watcher
        .watch(dir, RecursiveMode::NonRecursive)
        .with_context(|| format!("watching {}", dir.display()))?;

    info!(scene = %path.display(), "scene watcher active");
    Ok(watcher)
}

fn handle_event(event: &Event, scene_path: &Path, tx: &Sender<WorldConfig>) {
    if !event.kind.is_modify() && !event.kind.is_create() {
        return;
    }
    if !event.paths.iter().any(|p| same_file(p, scene_path)) {
        return;
    }
    match reload(scene_path) {
        Ok(config) => {
            info!(scene = %scene_path.display(), "scene config reloaded");
            if tx.send(config).is_err() {
                warn!("simulation loop gone, dropping reloaded config");
            }
        }
        // Half-written files are common mid-save; keep the old config.
        Err(e) => warn!("ignoring scene change: {e:#}"),
    }
}

/// Parses the scene file and returns only its config.
pub fn reload(path: &Path) -> Result<WorldConfig> {
    Ok(Scene::load(path)?.config)
}

fn same_file(event_path: &Path, scene_path: &Path) -> bool {
    let canonical = |p: &Path| -> PathBuf { p.canonicalize().unwrap_or_else(|_| p.to_path_buf()) };
    event_path == scene_path || canonical(event_path) == canonical(scene_path)
}
