//! # Contact Solver
//!
//! Sequential impulses over the persistent constraint set. Each tick:
//!
//! 1. force fields act on every awake movable body;
//! 2. the bodies touched by a constraint are gathered into a dense array;
//!    sleepers woken here get this tick's force fields too;
//! 3. effective masses, bias and restitution targets are prepared and last
//!    tick's impulses are re-applied (warm starting);
//! 4. optionally, overlapping bodies are nudged apart directly;
//! 5. a bounded number of passes apply normal then friction impulses;
//! 6. with Baumgarte on, a bounded number of pseudo impulse passes push
//!    penetrating bodies apart through pseudo velocities;
//! 7. velocities and corrected positions are written back to the store.
//!
//! Pseudo velocities move positions once and are then discarded, so
//! penetration recovery never leaves separating speed in `Movement`.
//! Convergence is not checked; `iterations` bounds the work per tick.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::collision::classify;
use crate::constraint::{ConstraintRecord, ConstraintSet};
use crate::error::PhysicsError;
use crate::integrator::{apply_force_fields, field_velocity};
use crate::store::BodyStore;
use crate::types::{cross, cross_scalar, tangent, BodyCategory, Vec2};

const NO_SLOT: u32 = u32::MAX;

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Upper bound on velocity passes per tick.
    pub iterations: u32,
    pub warm_starting: bool,
    /// Remove penetration through per-tick pseudo velocities.
    pub baumgarte: bool,
    pub bias_factor: f32,
    /// Penetration tolerated without correction.
    pub slop: f32,
    /// Move overlapping bodies apart directly, before the velocity passes.
    pub position_correction: bool,
    pub correction_rate: f32,
    pub max_correction: f32,
    pub gravity: Vec2,
    /// Uniform force applied to every movable body.
    pub force: Vec2,
    pub linear_damping: f32,
    pub angular_damping: f32,
    /// A pass whose largest impulse change is below this ends the solve.
    /// Zero always runs every pass.
    pub velocity_tolerance: f32,
    /// Approach speed above which restitution applies.
    pub restitution_threshold: f32,
    /// Mass given to particles, which carry no mass component.
    pub particle_mass: f32,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            iterations: 15,
            warm_starting: true,
            baumgarte: true,
            bias_factor: 0.2,
            slop: 0.01,
            position_correction: false,
            correction_rate: 0.8,
            max_correction: 0.2,
            gravity: Vec2::new(0.0, -9.81),
            force: Vec2::ZERO,
            linear_damping: 0.0,
            angular_damping: 0.0,
            velocity_tolerance: 1.0e-4,
            restitution_threshold: 1.0,
            particle_mass: 1.0,
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct SolveStats {
    /// Velocity passes actually run.
    pub iterations: u32,
    pub constraints: usize,
    pub points: usize,
    pub bodies: usize,
    /// Sleeping bodies woken by an awake dynamic partner.
    pub woken: usize,
    /// Largest impulse change in the final pass.
    pub last_delta: f32,
    /// Pseudo impulse passes actually run.
    pub position_iterations: u32,
}

/// Dense per-solve copy of one body.
#[derive(Copy, Clone, Debug, Default)]
struct SolverBody {
    index: u32,
    position: Vec2,
    velocity: Vec2,
    angular_velocity: f32,
    pseudo_velocity: Vec2,
    pseudo_angular_velocity: f32,
    /// Values used while awake.
    awake_inv_mass: f32,
    awake_inv_inertia: f32,
    inv_mass: f32,
    inv_inertia: f32,
    has_movement: bool,
    sleeping: bool,
    dynamic: bool,
    woken: bool,
}

impl SolverBody {
    #[inline]
    fn point_velocity(&self, r: Vec2) -> Vec2 {
        self.velocity + cross_scalar(self.angular_velocity, r)
    }

    #[inline]
    fn apply_impulse(&mut self, impulse: Vec2, r: Vec2) {
        self.velocity += impulse * self.inv_mass;
        self.angular_velocity += self.inv_inertia * cross(r, impulse);
    }

    #[inline]
    fn pseudo_point_velocity(&self, r: Vec2) -> Vec2 {
        self.pseudo_velocity + cross_scalar(self.pseudo_angular_velocity, r)
    }

    #[inline]
    fn apply_pseudo_impulse(&mut self, impulse: Vec2, r: Vec2) {
        self.pseudo_velocity += impulse * self.inv_mass;
        self.pseudo_angular_velocity += self.inv_inertia * cross(r, impulse);
    }
}

#[derive(Debug, Default)]
pub struct Solver {
    config: SolverConfig,
    bodies: Vec<SolverBody>,
    slots: Vec<u32>,
    /// Body slots of each record, in constraint iteration order; `None`
    /// when a body vanished from the store.
    pairs: Vec<Option<(usize, usize)>>,
    stats: SolveStats,
}

impl Solver {
    #[must_use]
    pub fn new(config: SolverConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: SolverConfig) {
        self.config = config;
    }

    #[must_use]
    pub fn stats(&self) -> SolveStats {
        self.stats
    }

    /// Runs one tick of force fields and contact resolution.
    pub fn solve<S: BodyStore + ?Sized>(
        &mut self,
        store: &mut S,
        constraints: &mut ConstraintSet,
        dt: f32,
    ) -> Result<SolveStats, PhysicsError> {
        if !dt.is_finite() || dt <= 0.0 {
            return Err(PhysicsError::InvalidTimeStep(dt));
        }

        apply_force_fields(store, &self.config, dt);

        let woken = self.gather(store, constraints, dt);
        self.prepare(constraints, dt);
        if self.config.position_correction {
            self.correct_positions(constraints);
        }
        let (iterations, last_delta) = self.iterate(constraints);
        let position_iterations = if self.config.baumgarte {
            self.iterate_positions(constraints)
        } else {
            0
        };
        self.scatter(store, dt);

        self.stats = SolveStats {
            iterations,
            constraints: constraints.len(),
            points: constraints.iter().map(|r| r.points().len()).sum(),
            bodies: self.bodies.len(),
            woken,
            last_delta,
            position_iterations,
        };
        debug!(
            iterations,
            constraints = self.stats.constraints,
            bodies = self.stats.bodies,
            woken,
            "contact solve"
        );
        Ok(self.stats)
    }

    fn slot_for<S: BodyStore + ?Sized>(&mut self, store: &S, index: u32) -> Option<usize> {
        let i = index as usize;
        if i >= self.slots.len() {
            self.slots.resize(i + 1, NO_SLOT);
        }
        if self.slots[i] != NO_SLOT {
            return Some(self.slots[i] as usize);
        }

        let category = classify(store, index)?;
        let transform = store.transform(index)?;
        let movement = store.movement(index).copied();

        let (inv_mass, inv_inertia) = match category {
            BodyCategory::Dynamic => {
                store.mass(index).map_or((0.0, 0.0), |m| (m.inv_mass, m.inv_inertia))
            }
            BodyCategory::Particle if self.config.particle_mass > 0.0 => {
                (1.0 / self.config.particle_mass, 0.0)
            }
            _ => (0.0, 0.0),
        };

        let body = SolverBody {
            index,
            position: transform.position,
            velocity: movement.map_or(Vec2::ZERO, |m| m.velocity),
            angular_velocity: movement.map_or(0.0, |m| m.angular_velocity),
            pseudo_velocity: Vec2::ZERO,
            pseudo_angular_velocity: 0.0,
            awake_inv_mass: inv_mass,
            awake_inv_inertia: inv_inertia,
            inv_mass: 0.0,
            inv_inertia: 0.0,
            has_movement: movement.is_some(),
            sleeping: movement.is_some_and(|m| m.sleeping),
            dynamic: category == BodyCategory::Dynamic,
            woken: false,
        };
        let slot = self.bodies.len();
        self.bodies.push(body);
        self.slots[i] = slot as u32;
        Some(slot)
    }

    /// Builds the dense body array and the per-record slot pairs. Returns the
    /// number of bodies woken.
    ///
    /// Woken bodies missed the force fields at the start of the solve, so
    /// they receive them here.
    fn gather<S: BodyStore + ?Sized>(
        &mut self,
        store: &S,
        constraints: &ConstraintSet,
        dt: f32,
    ) -> usize {
        for body in &self.bodies {
            self.slots[body.index as usize] = NO_SLOT;
        }
        self.bodies.clear();
        self.pairs.clear();

        for record in constraints.iter() {
            let first = self.slot_for(store, record.first);
            let second = self.slot_for(store, record.second);
            let pair = match (first, second) {
                (Some(a), Some(b)) => Some((a, b)),
                _ => {
                    warn!(
                        first = record.first,
                        second = record.second,
                        "constraint body missing from store, skipped"
                    );
                    None
                }
            };
            self.pairs.push(pair);
        }

        let mut woken = 0;
        for &(a, b) in self.pairs.iter().flatten() {
            for (sleeper, partner) in [(a, b), (b, a)] {
                let p = self.bodies[partner];
                let awake_dynamic = p.dynamic && !p.sleeping;
                let s = &mut self.bodies[sleeper];
                if s.sleeping && awake_dynamic {
                    s.sleeping = false;
                    s.woken = true;
                    woken += 1;
                }
            }
        }

        let config = self.config;
        for body in &mut self.bodies {
            if body.sleeping {
                body.inv_mass = 0.0;
                body.inv_inertia = 0.0;
            } else {
                body.inv_mass = body.awake_inv_mass;
                body.inv_inertia = body.awake_inv_inertia;
            }
            if body.woken {
                (body.velocity, body.angular_velocity) = field_velocity(
                    body.velocity,
                    body.angular_velocity,
                    body.awake_inv_mass,
                    &config,
                    dt,
                );
            }
        }
        woken
    }

    fn prepare(&mut self, constraints: &mut ConstraintSet, dt: f32) {
        let config = self.config;
        for (record, pair) in constraints.iter_mut().zip(&self.pairs) {
            let Some((a, b)) = *pair else {
                continue;
            };
            let (first, second) = (self.bodies[a], self.bodies[b]);
            let normal = record.normal;
            let t = tangent(normal);
            let restitution = record.restitution;

            for point in record.points_mut() {
                let (ra, rb) = (point.r_first, point.r_second);
                point.normal_mass = effective_mass(&first, &second, ra, rb, normal);
                point.tangent_mass = effective_mass(&first, &second, ra, rb, t);

                let relative = first.point_velocity(ra) - second.point_velocity(rb);
                let vn = relative.dot(normal);
                point.bias = if -vn > config.restitution_threshold {
                    -restitution * vn
                } else {
                    0.0
                };
                point.position_bias = if config.baumgarte {
                    config.bias_factor * (point.depth - config.slop).max(0.0) / dt
                } else {
                    0.0
                };
                point.pseudo_impulse = 0.0;

                if !config.warm_starting {
                    point.normal_impulse = 0.0;
                    point.tangent_impulse = 0.0;
                }
            }

            if config.warm_starting {
                warm_start(record, &mut self.bodies, a, b);
            }
        }
    }

    fn correct_positions(&mut self, constraints: &ConstraintSet) {
        let config = self.config;
        for (record, pair) in constraints.iter().zip(&self.pairs) {
            let Some((a, b)) = *pair else {
                continue;
            };
            let total = self.bodies[a].inv_mass + self.bodies[b].inv_mass;
            let count = record.points().len();
            if total <= 0.0 || count == 0 {
                continue;
            }
            for point in record.points() {
                let excess = (point.depth - config.slop).max(0.0);
                let push = (config.correction_rate * excess * excess).min(config.max_correction)
                    / count as f32;
                let offset = record.normal * push / total;
                let inv_a = self.bodies[a].inv_mass;
                let inv_b = self.bodies[b].inv_mass;
                self.bodies[a].position += offset * inv_a;
                self.bodies[b].position -= offset * inv_b;
            }
        }
    }

    /// Returns passes run and the largest impulse change of the last pass.
    fn iterate(&mut self, constraints: &mut ConstraintSet) -> (u32, f32) {
        let tolerance = self.config.velocity_tolerance;
        let mut passes = 0;
        let mut last_delta = 0.0;

        for _ in 0..self.config.iterations {
            let mut max_delta: f32 = 0.0;
            for (record, pair) in constraints.iter_mut().zip(&self.pairs) {
                let Some((a, b)) = *pair else {
                    continue;
                };
                max_delta = max_delta.max(solve_record(record, &mut self.bodies, a, b));
            }
            passes += 1;
            last_delta = max_delta;
            if tolerance > 0.0 && max_delta < tolerance {
                break;
            }
        }
        (passes, last_delta)
    }

    /// Pseudo impulse passes; no warm start. Returns passes run.
    fn iterate_positions(&mut self, constraints: &mut ConstraintSet) -> u32 {
        let tolerance = self.config.velocity_tolerance;
        let mut passes = 0;
        for _ in 0..self.config.iterations {
            let mut max_delta: f32 = 0.0;
            for (record, pair) in constraints.iter_mut().zip(&self.pairs) {
                let Some((a, b)) = *pair else {
                    continue;
                };
                max_delta = max_delta.max(solve_record_positions(record, &mut self.bodies, a, b));
            }
            passes += 1;
            if tolerance > 0.0 && max_delta < tolerance {
                break;
            }
        }
        passes
    }

    fn scatter<S: BodyStore + ?Sized>(&self, store: &mut S, dt: f32) {
        let write_positions = self.config.position_correction || self.config.baumgarte;
        for body in &self.bodies {
            if !body.has_movement || (body.inv_mass == 0.0 && !body.woken) {
                continue;
            }
            if let Some(movement) = store.movement_mut(body.index) {
                movement.velocity = body.velocity;
                movement.angular_velocity = body.angular_velocity;
                if body.woken {
                    movement.sleeping = false;
                }
            }
            if write_positions {
                if let Some(transform) = store.transform_mut(body.index) {
                    transform.position = body.position + body.pseudo_velocity * dt;
                    transform.rotation += body.pseudo_angular_velocity * dt;
                }
            }
        }
    }
}

fn effective_mass(
    first: &SolverBody,
    second: &SolverBody,
    ra: Vec2,
    rb: Vec2,
    direction: Vec2,
) -> f32 {
    let rna = cross(ra, direction);
    let rnb = cross(rb, direction);
    let k = first.inv_mass
        + second.inv_mass
        + first.inv_inertia * rna * rna
        + second.inv_inertia * rnb * rnb;
    if k > 0.0 {
        1.0 / k
    } else {
        0.0
    }
}

fn warm_start(record: &ConstraintRecord, bodies: &mut [SolverBody], a: usize, b: usize) {
    let normal = record.normal;
    let t = tangent(normal);
    let (mut first, mut second) = (bodies[a], bodies[b]);
    for point in record.points() {
        let impulse = normal * point.normal_impulse + t * point.tangent_impulse;
        first.apply_impulse(impulse, point.r_first);
        second.apply_impulse(-impulse, point.r_second);
    }
    bodies[a] = first;
    bodies[b] = second;
}

/// One pass over a record's points. Returns the largest impulse change.
fn solve_record(
    record: &mut ConstraintRecord,
    bodies: &mut [SolverBody],
    a: usize,
    b: usize,
) -> f32 {
    let normal = record.normal;
    let t = tangent(normal);
    let friction = record.friction;
    let (mut first, mut second) = (bodies[a], bodies[b]);
    let mut max_delta: f32 = 0.0;

    for point in record.points_mut() {
        let (ra, rb) = (point.r_first, point.r_second);

        // Normal: accumulated impulse never pulls the bodies together.
        let vn = (first.point_velocity(ra) - second.point_velocity(rb)).dot(normal);
        let lambda = point.normal_mass * (point.bias - vn);
        let accumulated = (point.normal_impulse + lambda).max(0.0);
        let delta = accumulated - point.normal_impulse;
        point.normal_impulse = accumulated;
        first.apply_impulse(normal * delta, ra);
        second.apply_impulse(-normal * delta, rb);
        max_delta = max_delta.max(delta.abs());

        // Friction: bounded by the current normal impulse.
        let vt = (first.point_velocity(ra) - second.point_velocity(rb)).dot(t);
        let limit = friction * point.normal_impulse;
        let accumulated = (point.tangent_impulse - point.tangent_mass * vt).clamp(-limit, limit);
        let delta = accumulated - point.tangent_impulse;
        point.tangent_impulse = accumulated;
        first.apply_impulse(t * delta, ra);
        second.apply_impulse(-t * delta, rb);
        max_delta = max_delta.max(delta.abs());
    }

    bodies[a] = first;
    bodies[b] = second;
    max_delta
}

/// One pseudo impulse pass over a record's points. Returns the largest
/// impulse change.
fn solve_record_positions(
    record: &mut ConstraintRecord,
    bodies: &mut [SolverBody],
    a: usize,
    b: usize,
) -> f32 {
    let normal = record.normal;
    let (mut first, mut second) = (bodies[a], bodies[b]);
    let mut max_delta: f32 = 0.0;

    for point in record.points_mut() {
        let (ra, rb) = (point.r_first, point.r_second);
        let vn = (first.pseudo_point_velocity(ra) - second.pseudo_point_velocity(rb)).dot(normal);
        let lambda = point.normal_mass * (point.position_bias - vn);
        let accumulated = (point.pseudo_impulse + lambda).max(0.0);
        let delta = accumulated - point.pseudo_impulse;
        point.pseudo_impulse = accumulated;
        first.apply_pseudo_impulse(normal * delta, ra);
        second.apply_pseudo_impulse(-normal * delta, rb);
        max_delta = max_delta.max(delta.abs());
    }

    bodies[a] = first;
    bodies[b] = second;
    max_delta
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::{BodyDesc, Collider, Mass, Movement, Transform};
    use crate::collision::{CollisionConfig, CollisionSystem};
    use crate::store::BodySet;
    use crate::types::Shape;

    fn ball_on_floor(y: f32) -> (BodySet, crate::store::Handle) {
        let mut set = BodySet::new();
        set.spawn(BodyDesc::new(
            Transform::from_position(Vec2::new(0.0, -1.0)),
            Collider::new(Shape::rect(2.0, 2.0)),
        )
        .with_mass(Mass::infinite()))
        .unwrap();
        let ball = set
            .spawn(
                BodyDesc::new(
                    Transform::from_position(Vec2::new(0.0, y)),
                    Collider::new(Shape::circle(0.5)),
                )
                .with_mass(Mass::new(1.0, 0.125))
                .with_movement(Movement::default()),
            )
            .unwrap();
        (set, ball)
    }

    fn contacts_into(set: &BodySet, constraints: &mut ConstraintSet) {
        let mut collision = CollisionSystem::new(CollisionConfig::default());
        collision.update(set);
        constraints.update(collision.contacts(), set);
    }

    #[test]
    fn resting_ball_does_not_sink() {
        let (mut set, ball) = ball_on_floor(0.25);
        let mut constraints = ConstraintSet::default();
        contacts_into(&set, &mut constraints);
        assert_eq!(constraints.len(), 1);

        let mut solver = Solver::new(SolverConfig::default());
        let stats = solver.solve(&mut set, &mut constraints, 1.0 / 60.0).unwrap();
        assert!(stats.iterations >= 1);
        assert!(set.movement_of(ball).unwrap().velocity.y >= -1e-5);
    }

    #[test]
    fn rejects_bad_time_step() {
        let (mut set, _) = ball_on_floor(0.25);
        let mut solver = Solver::default();
        let mut constraints = ConstraintSet::default();
        for dt in [0.0, -1.0, f32::NAN, f32::INFINITY] {
            assert!(matches!(
                solver.solve(&mut set, &mut constraints, dt),
                Err(PhysicsError::InvalidTimeStep(_))
            ));
        }
    }

    #[test]
    fn awake_dynamic_wakes_sleeping_partner() {
        let mut set = BodySet::new();
        let collider = Collider::new(Shape::circle(0.5));
        let moving = Movement::with_velocity(Vec2::new(1.0, 0.0));
        let sleeping = Movement {
            sleeping: true,
            ..Movement::default()
        };
        set.spawn(
            BodyDesc::new(Transform::default(), collider.clone())
                .with_mass(Mass::new(1.0, 1.0))
                .with_movement(moving),
        )
        .unwrap();
        let sleeper = set
            .spawn(
                BodyDesc::new(Transform::from_position(Vec2::new(0.9, 0.0)), collider)
                    .with_mass(Mass::new(1.0, 1.0))
                    .with_movement(sleeping),
            )
            .unwrap();

        let mut constraints = ConstraintSet::default();
        contacts_into(&set, &mut constraints);
        let mut solver = Solver::new(SolverConfig {
            gravity: Vec2::ZERO,
            ..SolverConfig::default()
        });
        let stats = solver.solve(&mut set, &mut constraints, 1.0 / 60.0).unwrap();
        assert_eq!(stats.woken, 1);
        let movement = set.movement_of(sleeper).unwrap();
        assert!(!movement.sleeping);
        assert!(movement.velocity.x > 0.0);
    }

    #[test]
    fn friction_stays_inside_the_cone() {
        let (mut set, ball) = ball_on_floor(0.45);
        set.movement_of_mut(ball).unwrap().velocity = Vec2::new(3.0, 0.0);
        let mut constraints = ConstraintSet::default();
        contacts_into(&set, &mut constraints);

        let mut solver = Solver::default();
        solver.solve(&mut set, &mut constraints, 1.0 / 60.0).unwrap();
        for record in constraints.iter() {
            for point in record.points() {
                assert!(point.normal_impulse >= 0.0);
                let limit = record.friction * point.normal_impulse;
                assert!(point.tangent_impulse.abs() <= limit + 1e-6);
            }
        }
    }

    #[test]
    fn position_correction_separates_overlap() {
        let (mut set, ball) = ball_on_floor(0.0);
        let mut constraints = ConstraintSet::default();
        contacts_into(&set, &mut constraints);

        let mut solver = Solver::new(SolverConfig {
            position_correction: true,
            baumgarte: false,
            ..SolverConfig::default()
        });
        solver.solve(&mut set, &mut constraints, 1.0 / 60.0).unwrap();
        let y = set.transform_of(ball).unwrap().position.y;
        assert!(y > 0.0);
        assert!(y <= SolverConfig::default().max_correction + 1e-6);
    }

    #[test]
    fn woken_body_gets_force_fields() {
        let mut set = BodySet::new();
        let collider = Collider::new(Shape::circle(0.5));
        set.spawn(
            BodyDesc::new(Transform::default(), collider.clone())
                .with_mass(Mass::new(1.0, 1.0))
                .with_movement(Movement::with_velocity(Vec2::new(1.0, 0.0))),
        )
        .unwrap();
        let sleeper = set
            .spawn(
                BodyDesc::new(Transform::from_position(Vec2::new(0.9, 0.0)), collider)
                    .with_mass(Mass::new(1.0, 1.0))
                    .with_movement(Movement {
                        sleeping: true,
                        ..Movement::default()
                    }),
            )
            .unwrap();

        let mut constraints = ConstraintSet::default();
        contacts_into(&set, &mut constraints);
        let config = SolverConfig::default();
        let dt = 1.0 / 60.0;
        Solver::new(config).solve(&mut set, &mut constraints, dt).unwrap();

        // Both fall together, so friction adds nothing along y.
        let v = set.movement_of(sleeper).unwrap().velocity;
        assert!((v.y - config.gravity.y * dt).abs() < 1e-5, "woken body missed gravity: {v}");
    }

    #[test]
    fn penetration_recovery_moves_without_velocity() {
        let (mut set, ball) = ball_on_floor(0.0);
        let mut constraints = ConstraintSet::default();
        contacts_into(&set, &mut constraints);

        let mut solver = Solver::new(SolverConfig {
            gravity: Vec2::ZERO,
            ..SolverConfig::default()
        });
        let stats = solver.solve(&mut set, &mut constraints, 1.0 / 60.0).unwrap();
        assert!(stats.position_iterations >= 1);
        assert!(set.transform_of(ball).unwrap().position.y > 0.0);
        assert!(set.movement_of(ball).unwrap().velocity.length() < 1e-6);
    }
}
