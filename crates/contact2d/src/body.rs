//! Body components as the entity store holds them.
//!
//! The core never creates or destroys bodies on its own; it reads these
//! components and writes back velocity (and, with direct position
//! correction, position) after a solve.

use serde::{Deserialize, Serialize};

use crate::types::{Material, Shape, ShapeKind, Vec2};

#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Transform {
    pub position: Vec2,
    /// Orientation in radians, counter-clockwise.
    pub rotation: f32,
}

impl Transform {
    #[must_use]
    pub const fn new(position: Vec2, rotation: f32) -> Self {
        Self { position, rotation }
    }

    #[must_use]
    pub const fn from_position(position: Vec2) -> Self {
        Self {
            position,
            rotation: 0.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Collider {
    pub shape: Shape,
    /// Auxiliary sub-colliders attached to the same body.
    #[serde(default)]
    pub sub_shapes: Vec<Shape>,
    #[serde(default)]
    pub material: Material,
    /// Two bodies whose masks share a bit never collide.
    #[serde(default)]
    pub ignore_mask: u32,
}

impl Collider {
    #[must_use]
    pub fn new(shape: Shape) -> Self {
        Self {
            shape,
            sub_shapes: Vec::new(),
            material: Material::default(),
            ignore_mask: 0,
        }
    }

    #[must_use]
    pub fn with_material(mut self, material: Material) -> Self {
        self.material = material;
        self
    }

    #[must_use]
    pub fn with_sub_shape(mut self, shape: Shape) -> Self {
        self.sub_shapes.push(shape);
        self
    }

    #[must_use]
    pub fn with_ignore_mask(mut self, mask: u32) -> Self {
        self.ignore_mask = mask;
        self
    }

    /// Primary shape followed by every sub-shape.
    pub fn shapes(&self) -> impl Iterator<Item = &Shape> {
        std::iter::once(&self.shape).chain(self.sub_shapes.iter())
    }
}

/// Physics-mass component. A body without one is never pushed by contacts.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Mass {
    pub mass: f32,
    pub inv_mass: f32,
    pub inv_inertia: f32,
}

impl Mass {
    /// Immovable: zero inverse mass and inertia.
    #[must_use]
    pub const fn infinite() -> Self {
        Self {
            mass: 0.0,
            inv_mass: 0.0,
            inv_inertia: 0.0,
        }
    }

    #[must_use]
    pub fn new(mass: f32, inertia: f32) -> Self {
        Self {
            mass,
            inv_mass: if mass > 0.0 { 1.0 / mass } else { 0.0 },
            inv_inertia: if inertia > 0.0 { 1.0 / inertia } else { 0.0 },
        }
    }

    /// Mass properties of a collider at uniform density, taken about the
    /// body origin (parallel axis theorem for offset shapes).
    #[must_use]
    pub fn from_collider(collider: &Collider) -> Self {
        let density = collider.material.density;
        let mut mass = 0.0;
        let mut inertia = 0.0;
        for shape in collider.shapes() {
            let m = density * shape.kind.area();
            mass += m;
            inertia += shape_inertia(&shape.kind, m) + m * shape.offset.length_squared();
        }
        Self::new(mass, inertia)
    }

    /// Overrides the total mass, scaling inertia to match.
    #[must_use]
    pub fn with_total_mass(collider: &Collider, mass: f32) -> Self {
        let unit = Self::from_collider(collider);
        if unit.mass <= 0.0 || unit.inv_inertia <= 0.0 {
            return Self::new(mass, 0.0);
        }
        let inertia = (1.0 / unit.inv_inertia) * (mass / unit.mass);
        Self::new(mass, inertia)
    }

    #[must_use]
    pub fn is_infinite(&self) -> bool {
        self.inv_mass == 0.0
    }
}

fn shape_inertia(kind: &ShapeKind, mass: f32) -> f32 {
    match *kind {
        ShapeKind::Circle { radius } => 0.5 * mass * radius * radius,
        ShapeKind::Rect { half_extents } => {
            let w = half_extents.x * 2.0;
            let h = half_extents.y * 2.0;
            mass * (w * w + h * h) / 12.0
        }
    }
}

/// Movement component: anything that has one can change position.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Movement {
    pub velocity: Vec2,
    pub angular_velocity: f32,
    pub sleeping: bool,
}

impl Movement {
    #[must_use]
    pub const fn with_velocity(velocity: Vec2) -> Self {
        Self {
            velocity,
            angular_velocity: 0.0,
            sleeping: false,
        }
    }
}

/// Everything needed to spawn one body into a store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BodyDesc {
    #[serde(default)]
    pub transform: Transform,
    pub collider: Collider,
    #[serde(default)]
    pub mass: Option<Mass>,
    #[serde(default)]
    pub movement: Option<Movement>,
}

impl BodyDesc {
    #[must_use]
    pub fn new(transform: Transform, collider: Collider) -> Self {
        Self {
            transform,
            collider,
            mass: None,
            movement: None,
        }
    }

    #[must_use]
    pub fn with_mass(mut self, mass: Mass) -> Self {
        self.mass = Some(mass);
        self
    }

    #[must_use]
    pub fn with_movement(mut self, movement: Movement) -> Self {
        self.movement = Some(movement);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_circle_mass() {
        let collider = Collider::new(Shape::circle(1.0));
        let m = Mass::from_collider(&collider);
        assert!((m.mass - std::f32::consts::PI).abs() < 1e-5);
        assert!((1.0 / m.inv_inertia - 0.5 * m.mass).abs() < 1e-5);
    }

    #[test]
    fn total_mass_override_scales_inertia() {
        let collider = Collider::new(Shape::rect(2.0, 2.0));
        let m = Mass::with_total_mass(&collider, 1.0);
        assert!((m.inv_mass - 1.0).abs() < 1e-6);
        // I = m (w² + h²) / 12 = 8 / 12
        assert!((1.0 / m.inv_inertia - 8.0 / 12.0).abs() < 1e-5);
    }

    #[test]
    fn infinite_mass_has_no_inverse() {
        let m = Mass::infinite();
        assert!(m.is_infinite());
        assert_eq!(m.inv_inertia, 0.0);
    }
}
