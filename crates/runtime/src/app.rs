//! # Simulation Loop
//!
//! [`run`] builds a world from a [`Scene`], steps it a fixed number of
//! ticks and logs progress. When a config channel is supplied, configs sent
//! by the scene watcher are applied between ticks.

use std::sync::mpsc::Receiver;
use std::time::Duration;

use anyhow::Result;
use contact2d::{PhysicsWorld, WorldConfig};
use tracing::info;

use crate::scene::Scene;

#[derive(Clone, Debug)]
pub struct RunOptions {
    pub ticks: u64,
    pub dt: f32,
    /// Log a summary line every this many ticks; zero disables it.
    pub log_every: u64,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            ticks: 600,
            dt: 1.0 / 60.0,
            log_every: 60,
        }
    }
}

/// Totals over a finished run.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RunSummary {
    pub ticks: u64,
    pub bodies: usize,
    pub peak_contacts: usize,
    pub final_constraints: usize,
    pub reloads: usize,
    pub elapsed: Duration,
}

/// Runs the scene to completion.
pub fn run(
    scene: &Scene,
    options: &RunOptions,
    reloads: Option<&Receiver<WorldConfig>>,
) -> Result<RunSummary> {
    let (mut world, handles) = scene.build()?;
    info!(bodies = handles.len(), ticks = options.ticks, dt = options.dt, "starting simulation");

    let mut summary = RunSummary {
        bodies: handles.len(),
        ..RunSummary::default()
    };
    for _ in 0..options.ticks {
        if let Some(rx) = reloads {
            summary.reloads += apply_reloads(&mut world, rx);
        }

        let report = world.step(options.dt)?;
        summary.ticks = report.tick;
        summary.peak_contacts = summary.peak_contacts.max(report.collision.contacts);
        summary.elapsed += report.timings.total();

        if options.log_every > 0 && report.tick % options.log_every == 0 {
            let info = world.debug_info();
            info!(
                tick = report.tick,
                contacts = info.contacts,
                constraints = info.constraints,
                iterations = report.solve.iterations,
                collision_us = report.timings.collision.as_micros() as u64,
                solve_us = report.timings.solve.as_micros() as u64,
                "tick"
            );
        }
    }
    summary.final_constraints = world.constraints().len();

    info!(
        ticks = summary.ticks,
        peak_contacts = summary.peak_contacts,
        elapsed_ms = summary.elapsed.as_millis() as u64,
        "simulation finished"
    );
    Ok(summary)
}

/// Applies every pending config, newest last. Returns how many were applied.
fn apply_reloads(world: &mut PhysicsWorld, rx: &Receiver<WorldConfig>) -> usize {
    let mut applied = 0;
    for config in rx.try_iter() {
        world.set_config(config);
        applied += 1;
    }
    if applied > 0 {
        info!(applied, gravity = ?world.config().solver.gravity, "applied reloaded config");
    }
    applied
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::default_scene;
    use std::sync::mpsc;

    #[test]
    fn default_scene_runs_and_settles_into_contacts() -> Result<()> {
        let options = RunOptions {
            ticks: 120,
            log_every: 0,
            ..RunOptions::default()
        };
        let summary = run(&default_scene(), &options, None)?;
        assert_eq!(summary.ticks, 120);
        assert_eq!(summary.bodies, 27);
        assert!(summary.peak_contacts > 0);
        assert!(summary.final_constraints > 0);
        Ok(())
    }

    #[test]
    fn queued_configs_are_applied_before_the_first_tick() -> Result<()> {
        let (tx, rx) = mpsc::channel();
        let mut config = WorldConfig::default();
        config.solver.iterations = 2;
        tx.send(config.clone())?;
        tx.send(config)?;

        let options = RunOptions {
            ticks: 5,
            log_every: 1,
            ..RunOptions::default()
        };
        let summary = run(&default_scene(), &options, Some(&rx))?;
        assert_eq!(summary.reloads, 2);
        Ok(())
    }
}
