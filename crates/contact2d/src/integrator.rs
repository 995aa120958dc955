//! # Physics Integration
//!
//! Force fields act on every awake movable body before the contact solve;
//! positions are advanced after it with semi-implicit Euler, so the
//! corrected velocities are the ones that move the bodies.

use crate::solver::SolverConfig;
use crate::store::BodyStore;
use crate::types::Vec2;

/// Inverse mass used by force fields, or `None` for bodies that do not move
/// this tick (no movement component, or sleeping).
pub(crate) fn movable_inv_mass<S: BodyStore + ?Sized>(
    store: &S,
    index: u32,
    particle_mass: f32,
) -> Option<f32> {
    let movement = store.movement(index)?;
    if movement.sleeping {
        return None;
    }
    Some(match store.mass(index) {
        Some(mass) => mass.inv_mass,
        None if particle_mass > 0.0 => 1.0 / particle_mass,
        None => 0.0,
    })
}

/// One body's velocities after gravity, the uniform force and damping.
pub(crate) fn field_velocity(
    velocity: Vec2,
    angular_velocity: f32,
    inv_mass: f32,
    config: &SolverConfig,
    dt: f32,
) -> (Vec2, f32) {
    let linear_decay = 1.0 / (1.0 + dt * config.linear_damping.max(0.0));
    let angular_decay = 1.0 / (1.0 + dt * config.angular_damping.max(0.0));
    let mut velocity = velocity;
    if inv_mass > 0.0 {
        velocity += (config.gravity + config.force * inv_mass) * dt;
    }
    (velocity * linear_decay, angular_velocity * angular_decay)
}

/// Applies gravity, the uniform force and damping. Returns the number of
/// bodies affected.
pub fn apply_force_fields<S: BodyStore + ?Sized>(
    store: &mut S,
    config: &SolverConfig,
    dt: f32,
) -> usize {
    let mut affected = 0;

    for index in 0..store.capacity() as u32 {
        if store.handle_at(index).is_none() {
            continue;
        }
        let Some(inv_mass) = movable_inv_mass(store, index, config.particle_mass) else {
            continue;
        };
        let Some(movement) = store.movement_mut(index) else {
            continue;
        };
        (movement.velocity, movement.angular_velocity) =
            field_velocity(movement.velocity, movement.angular_velocity, inv_mass, config, dt);
        affected += 1;
    }
    affected
}

/// Advances positions and rotations of awake bodies by one step.
pub fn integrate_positions<S: BodyStore + ?Sized>(store: &mut S, dt: f32) -> usize {
    let mut moved = 0;
    for index in 0..store.capacity() as u32 {
        if store.handle_at(index).is_none() {
            continue;
        }
        let Some(movement) = store.movement(index).copied() else {
            continue;
        };
        if movement.sleeping {
            continue;
        }
        if let Some(transform) = store.transform_mut(index) {
            transform.position += movement.velocity * dt;
            transform.rotation += movement.angular_velocity * dt;
            moved += 1;
        }
    }
    moved
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::{BodyDesc, Collider, Mass, Movement, Transform};
    use crate::store::BodySet;
    use crate::types::Shape;

    #[test]
    fn gravity_then_euler_step() {
        let mut set = BodySet::new();
        let h = set
            .spawn(
                BodyDesc::new(Transform::default(), Collider::new(Shape::circle(0.5)))
                    .with_mass(Mass::new(2.0, 1.0))
                    .with_movement(Movement::default()),
            )
            .unwrap();
        let config = SolverConfig::default();
        let dt = 0.1;

        assert_eq!(apply_force_fields(&mut set, &config, dt), 1);
        assert_eq!(integrate_positions(&mut set, dt), 1);

        let v = set.movement_of(h).unwrap().velocity;
        assert!((v.y - config.gravity.y * dt).abs() < 1e-6);
        // Semi-implicit: the new velocity moves the body.
        assert!((set.transform_of(h).unwrap().position.y - v.y * dt).abs() < 1e-6);
    }

    #[test]
    fn sleeping_and_static_bodies_stay_put() {
        let mut set = BodySet::new();
        let sleeping = Movement {
            velocity: Vec2::X,
            angular_velocity: 0.0,
            sleeping: true,
        };
        set.spawn(
            BodyDesc::new(Transform::default(), Collider::new(Shape::circle(0.5)))
                .with_mass(Mass::new(1.0, 1.0))
                .with_movement(sleeping),
        )
        .unwrap();
        let block = Collider::new(Shape::rect(1.0, 1.0));
        set.spawn(BodyDesc::new(Transform::default(), block).with_mass(Mass::infinite()))
            .unwrap();

        assert_eq!(apply_force_fields(&mut set, &SolverConfig::default(), 0.1), 0);
        assert_eq!(integrate_positions(&mut set, 0.1), 0);
    }

    #[test]
    fn damping_scales_velocity() {
        let mut set = BodySet::new();
        let h = set
            .spawn(
                BodyDesc::new(Transform::default(), Collider::new(Shape::circle(0.5)))
                    .with_movement(Movement::with_velocity(Vec2::new(2.0, 0.0))),
            )
            .unwrap();
        let config = SolverConfig {
            gravity: Vec2::ZERO,
            linear_damping: 1.0,
            ..SolverConfig::default()
        };
        apply_force_fields(&mut set, &config, 1.0);
        assert!((set.movement_of(h).unwrap().velocity.x - 1.0).abs() < 1e-6);
    }
}
