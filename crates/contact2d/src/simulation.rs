//! # Physics World
//!
//! [`PhysicsWorld`] owns the body store and every pipeline stage and runs
//! them in a fixed order each tick:
//!
//! 1. collision update (classification, indices, narrow phase);
//! 2. constraint update (create, refresh, drop);
//! 3. solve (force fields, warm start, velocity passes);
//! 4. integrate positions.
//!
//! Stages receive their inputs explicitly; nothing is global.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::body::{Mass, Movement, Transform};
use crate::collision::{
    CollisionConfig, CollisionStats, CollisionSystem, Contact, DebugShape, ProbeHit,
};
use crate::constraint::{ConstraintConfig, ConstraintSet, ConstraintUpdate};
use crate::error::PhysicsError;
use crate::integrator::integrate_positions;
use crate::solver::{SolveStats, Solver, SolverConfig};
use crate::store::{BodySet, BodyStore, Handle};
use crate::types::{BodyCategory, CategoryMask, Shape, Vec2};

/// Every tunable of the pipeline.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    pub collision: CollisionConfig,
    pub constraint: ConstraintConfig,
    pub solver: SolverConfig,
}

/// Wall time of each stage of one tick.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct PhaseTimings {
    pub collision: Duration,
    pub constraints: Duration,
    pub solve: Duration,
    pub integrate: Duration,
}

impl PhaseTimings {
    #[must_use]
    pub fn total(&self) -> Duration {
        self.collision + self.constraints + self.solve + self.integrate
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct TickReport {
    pub tick: u64,
    pub collision: CollisionStats,
    pub constraints: ConstraintUpdate,
    pub solve: SolveStats,
    /// Bodies whose position was advanced.
    pub moved: usize,
    pub timings: PhaseTimings,
}

/// Snapshot of world-level counters.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DebugInfo {
    pub tick: u64,
    pub bodies: usize,
    /// Classified bodies per category as of the last tick.
    pub categories: [usize; 4],
    pub contacts: usize,
    pub constraints: usize,
    /// Live nodes per spatial index.
    pub index_nodes: [usize; 4],
    pub enabled: CategoryMask,
    pub gravity: Vec2,
    pub last_solve: SolveStats,
}

#[derive(Debug)]
pub struct PhysicsWorld {
    pub(crate) bodies: BodySet,
    collision: CollisionSystem,
    constraints: ConstraintSet,
    solver: Solver,
    config: WorldConfig,
    tick: u64,
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        Self::new(WorldConfig::default())
    }
}

impl PhysicsWorld {
    #[must_use]
    pub fn new(config: WorldConfig) -> Self {
        Self {
            bodies: BodySet::new(),
            collision: CollisionSystem::new(config.collision.clone()),
            constraints: ConstraintSet::new(config.constraint),
            solver: Solver::new(config.solver),
            config,
            tick: 0,
        }
    }

    #[must_use]
    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// Swaps in new settings; accumulated impulses are kept.
    pub fn set_config(&mut self, config: WorldConfig) {
        self.collision.set_config(config.collision.clone());
        self.constraints.set_config(config.constraint);
        self.solver.set_config(config.solver);
        self.config = config;
    }

    #[must_use]
    pub fn bodies(&self) -> &BodySet {
        &self.bodies
    }

    /// Direct store access; edits are picked up on the next tick.
    pub fn bodies_mut(&mut self) -> &mut BodySet {
        &mut self.bodies
    }

    #[must_use]
    pub fn collision(&self) -> &CollisionSystem {
        &self.collision
    }

    pub fn collision_mut(&mut self) -> &mut CollisionSystem {
        &mut self.collision
    }

    #[must_use]
    pub fn constraints(&self) -> &ConstraintSet {
        &self.constraints
    }

    #[must_use]
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Advances the world by `dt` seconds.
    pub fn step(&mut self, dt: f32) -> Result<TickReport, PhysicsError> {
        if !dt.is_finite() || dt <= 0.0 {
            return Err(PhysicsError::InvalidTimeStep(dt));
        }

        let start = Instant::now();
        let collision = self.collision.update(&self.bodies);
        let after_collision = Instant::now();

        let constraints = self.constraints.update(self.collision.contacts(), &self.bodies);
        let after_constraints = Instant::now();

        let solve = self.solver.solve(&mut self.bodies, &mut self.constraints, dt)?;
        let after_solve = Instant::now();

        let moved = integrate_positions(&mut self.bodies, dt);
        let end = Instant::now();

        self.tick += 1;
        let report = TickReport {
            tick: self.tick,
            collision,
            constraints,
            solve,
            moved,
            timings: PhaseTimings {
                collision: after_collision - start,
                constraints: after_constraints - after_collision,
                solve: after_solve - after_constraints,
                integrate: end - after_solve,
            },
        };
        debug!(
            tick = self.tick,
            contacts = collision.contacts,
            constraints = self.constraints.len(),
            iterations = solve.iterations,
            elapsed_us = report.timings.total().as_micros() as u64,
            "world step"
        );
        Ok(report)
    }

    /// Runs `steps` ticks and returns the last report.
    pub fn run(&mut self, dt: f32, steps: usize) -> Result<TickReport, PhysicsError> {
        if !dt.is_finite() || dt <= 0.0 {
            return Err(PhysicsError::InvalidTimeStep(dt));
        }
        let mut last = TickReport {
            tick: self.tick,
            ..TickReport::default()
        };
        for _ in 0..steps {
            last = self.step(dt)?;
        }
        Ok(last)
    }

    #[must_use]
    pub fn contacts(&self) -> &[Contact] {
        self.collision.contacts()
    }

    /// Contacts the body found while querying during the last tick.
    pub fn contacts_for(&self, handle: Handle) -> Result<&[Contact], PhysicsError> {
        self.collision.contacts_for(&self.bodies, handle)
    }

    /// Bodies overlapping a probe shape, from the indices built last tick.
    pub fn overlap_query(
        &self,
        shape: &Shape,
        transform: &Transform,
        mask: CategoryMask,
    ) -> Result<Vec<ProbeHit>, PhysicsError> {
        self.collision.overlap_query(&self.bodies, shape, transform, mask)
    }

    pub fn set_category_enabled(&mut self, category: BodyCategory, enabled: bool) {
        self.collision.set_category_enabled(category, enabled);
    }

    pub fn transform(&self, handle: Handle) -> Result<Transform, PhysicsError> {
        self.bodies.transform_of(handle).copied()
    }

    pub fn set_transform(
        &mut self,
        handle: Handle,
        transform: Transform,
    ) -> Result<(), PhysicsError> {
        *self.bodies.transform_of_mut(handle)? = transform;
        Ok(())
    }

    pub fn velocity(&self, handle: Handle) -> Result<Vec2, PhysicsError> {
        Ok(self.bodies.movement_of(handle)?.velocity)
    }

    pub fn set_velocity(&mut self, handle: Handle, velocity: Vec2) -> Result<(), PhysicsError> {
        self.bodies.movement_of_mut(handle)?.velocity = velocity;
        Ok(())
    }

    pub fn set_sleeping(&mut self, handle: Handle, sleeping: bool) -> Result<(), PhysicsError> {
        self.bodies.movement_of_mut(handle)?.sleeping = sleeping;
        Ok(())
    }

    /// Changes the body's mass and movement components, and so its category.
    pub fn set_components(
        &mut self,
        handle: Handle,
        mass: Option<Mass>,
        movement: Option<Movement>,
    ) -> Result<(), PhysicsError> {
        self.bodies.set_mass(handle, mass)?;
        self.bodies.set_movement(handle, movement)?;
        self.collision.mark_statics_changed();
        Ok(())
    }

    /// Category assigned during the last tick; `None` for bodies spawned since.
    pub fn category(&self, handle: Handle) -> Result<Option<BodyCategory>, PhysicsError> {
        let index = self.bodies.resolve(handle)?;
        if !self.collision.saw(handle) {
            return Ok(None);
        }
        Ok(self.collision.category(index))
    }

    #[must_use]
    pub fn debug_info(&self) -> DebugInfo {
        let stats = self.collision.stats();
        let mut index_nodes = [0; 4];
        for (category, tree) in self.collision.indices().iter() {
            index_nodes[category.index()] = tree.node_count();
        }
        DebugInfo {
            tick: self.tick,
            bodies: self.bodies.len(),
            categories: stats.bodies,
            contacts: self.collision.contacts().len(),
            constraints: self.constraints.len(),
            index_nodes,
            enabled: self.collision.enabled_categories(),
            gravity: self.config.solver.gravity,
            last_solve: self.solver.stats(),
        }
    }

    #[must_use]
    pub fn debug_shapes(&self) -> Vec<DebugShape> {
        self.collision.debug_shapes()
    }

    pub(crate) fn forget_body(&mut self, index: u32) {
        self.constraints.erase_body(index);
        self.collision.mark_statics_changed();
    }
}
