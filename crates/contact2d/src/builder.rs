//! # World Builder
//!
//! Convenience constructors for the common body kinds. Each picks the
//! component set that gives the body its category: mass and movement make a
//! dynamic body, mass alone a static one, movement alone a particle and
//! neither a sensor.

use crate::body::{BodyDesc, Collider, Mass, Movement, Transform};
use crate::error::PhysicsError;
use crate::store::Handle;
use crate::types::{Material, Shape, Vec2};
use crate::PhysicsWorld;

/// Builder methods for adding bodies to the world
impl PhysicsWorld {
    /// Add a dynamic circle with default material properties
    pub fn add_circle(
        &mut self,
        position: Vec2,
        velocity: Vec2,
        radius: f32,
    ) -> Result<Handle, PhysicsError> {
        self.add_circle_with_material(position, velocity, radius, Material::default())
    }

    /// Add a dynamic circle whose mass follows from the material density
    pub fn add_circle_with_material(
        &mut self,
        position: Vec2,
        velocity: Vec2,
        radius: f32,
        material: Material,
    ) -> Result<Handle, PhysicsError> {
        let collider = Collider::new(Shape::circle(radius)).with_material(material);
        self.add_dynamic(Transform::from_position(position), collider, velocity)
    }

    /// Add a dynamic rectangle of full `width` by `height`
    pub fn add_rect(
        &mut self,
        position: Vec2,
        width: f32,
        height: f32,
        angle: f32,
        velocity: Vec2,
    ) -> Result<Handle, PhysicsError> {
        let collider = Collider::new(Shape::rect(width, height));
        self.add_dynamic(Transform::new(position, angle), collider, velocity)
    }

    /// Add any collider as a dynamic body
    pub fn add_dynamic(
        &mut self,
        transform: Transform,
        collider: Collider,
        velocity: Vec2,
    ) -> Result<Handle, PhysicsError> {
        let mass = Mass::from_collider(&collider);
        self.spawn(
            BodyDesc::new(transform, collider)
                .with_mass(mass)
                .with_movement(Movement::with_velocity(velocity)),
        )
    }

    /// Add an immovable rectangle
    pub fn add_static_rect(
        &mut self,
        position: Vec2,
        width: f32,
        height: f32,
        angle: f32,
    ) -> Result<Handle, PhysicsError> {
        let collider = Collider::new(Shape::rect(width, height));
        let transform = Transform::new(position, angle);
        self.spawn(BodyDesc::new(transform, collider).with_mass(Mass::infinite()))
    }

    /// Add an immovable circle
    pub fn add_static_circle(
        &mut self,
        position: Vec2,
        radius: f32,
    ) -> Result<Handle, PhysicsError> {
        let collider = Collider::new(Shape::circle(radius));
        let transform = Transform::from_position(position);
        self.spawn(BodyDesc::new(transform, collider).with_mass(Mass::infinite()))
    }

    /// Add a trigger volume: reports overlaps, never pushes or is pushed
    pub fn add_sensor(&mut self, position: Vec2, shape: Shape) -> Result<Handle, PhysicsError> {
        self.spawn(BodyDesc::new(Transform::from_position(position), Collider::new(shape)))
    }

    /// Add a particle: moves and collides with dynamic bodies, no rotation
    pub fn add_particle(
        &mut self,
        position: Vec2,
        velocity: Vec2,
        radius: f32,
    ) -> Result<Handle, PhysicsError> {
        let collider = Collider::new(Shape::circle(radius));
        self.spawn(
            BodyDesc::new(Transform::from_position(position), collider)
                .with_movement(Movement::with_velocity(velocity)),
        )
    }

    /// Add a body from a full description
    pub fn spawn(&mut self, desc: BodyDesc) -> Result<Handle, PhysicsError> {
        self.bodies.spawn(desc)
    }

    /// Remove a body and every constraint that references it
    pub fn despawn(&mut self, handle: Handle) -> Result<(), PhysicsError> {
        self.bodies.despawn(handle)?;
        self.forget_body(handle.index);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::store::BodyStore;
    use crate::types::{BodyCategory, Shape, Vec2};
    use crate::PhysicsWorld;

    #[test]
    fn builders_pick_categories() {
        let mut world = PhysicsWorld::default();
        let circle = world.add_circle(Vec2::ZERO, Vec2::ZERO, 0.5).unwrap();
        let ground = world.add_static_rect(Vec2::new(0.0, -5.0), 4.0, 1.0, 0.0).unwrap();
        let trigger = world.add_sensor(Vec2::new(5.0, 0.0), Shape::circle(1.0)).unwrap();
        let dust = world.add_particle(Vec2::new(-5.0, 0.0), Vec2::ZERO, 0.1).unwrap();
        world.step(1.0 / 60.0).unwrap();

        assert_eq!(world.category(circle).unwrap(), Some(BodyCategory::Dynamic));
        assert_eq!(world.category(ground).unwrap(), Some(BodyCategory::Static));
        assert_eq!(world.category(trigger).unwrap(), Some(BodyCategory::Sensor));
        assert_eq!(world.category(dust).unwrap(), Some(BodyCategory::Particle));
    }

    #[test]
    fn despawn_drops_constraints_and_handle() {
        let mut world = PhysicsWorld::default();
        world.add_static_rect(Vec2::new(0.0, -1.0), 4.0, 2.0, 0.0).unwrap();
        let ball = world.add_circle(Vec2::new(0.0, 0.4), Vec2::ZERO, 0.5).unwrap();
        world.step(1.0 / 60.0).unwrap();
        assert_eq!(world.constraints().len(), 1);

        world.despawn(ball).unwrap();
        assert!(world.constraints().is_empty());
        assert!(!world.bodies().is_alive(ball));
        assert!(world.despawn(ball).is_err());
    }

    #[test]
    fn rejects_negative_radius() {
        let mut world = PhysicsWorld::default();
        assert!(world.add_circle(Vec2::ZERO, Vec2::ZERO, -1.0).is_err());
        assert!(world.bodies().is_empty());
    }
}
