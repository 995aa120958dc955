//! Math and shape primitives shared by every stage of the pipeline.

use std::ops::BitOr;

pub use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::error::PhysicsError;

/// 2D cross product (z component of the 3D cross).
#[inline]
#[must_use]
pub fn cross(a: Vec2, b: Vec2) -> f32 {
    a.x * b.y - a.y * b.x
}

/// Velocity contribution `w × r` of an angular velocity at lever arm `r`.
#[inline]
#[must_use]
pub fn cross_scalar(w: f32, r: Vec2) -> Vec2 {
    Vec2::new(-w * r.y, w * r.x)
}

/// Friction direction for a contact normal.
#[inline]
#[must_use]
pub fn tangent(normal: Vec2) -> Vec2 {
    Vec2::new(normal.y, -normal.x)
}

/// Sign that never returns zero, so ties resolve to the positive side.
#[inline]
#[must_use]
pub(crate) fn sign_non_zero(v: f32) -> f32 {
    if v < 0.0 {
        -1.0
    } else {
        1.0
    }
}

/// Axis-aligned bounding box in world coordinates.
///
/// `min` is component-wise less than or equal to `max` for every box the
/// pipeline builds.
#[repr(C)]
#[derive(
    Copy,
    Clone,
    Debug,
    Default,
    PartialEq,
    bytemuck::Pod,
    bytemuck::Zeroable,
    Serialize,
    Deserialize,
)]
pub struct Aabb {
    pub min: Vec2,
    pub max: Vec2,
}

impl Aabb {
    #[must_use]
    pub const fn new(min: Vec2, max: Vec2) -> Self {
        Self { min, max }
    }

    #[must_use]
    pub fn from_center_half_extents(center: Vec2, half_extents: Vec2) -> Self {
        Self {
            min: center - half_extents,
            max: center + half_extents,
        }
    }

    /// Smallest box containing every point. Returns `None` for an empty slice.
    #[must_use]
    pub fn from_points(points: &[Vec2]) -> Option<Self> {
        let (first, rest) = points.split_first()?;
        let mut bounds = Self::new(*first, *first);
        for p in rest {
            bounds.min = bounds.min.min(*p);
            bounds.max = bounds.max.max(*p);
        }
        Some(bounds)
    }

    /// Inclusive overlap test: touching faces count as overlap.
    #[inline]
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
    }

    /// Returns `true` when `other` lies entirely inside this box.
    #[inline]
    #[must_use]
    pub fn contains(&self, other: &Self) -> bool {
        other.min.x >= self.min.x
            && other.min.y >= self.min.y
            && other.max.x <= self.max.x
            && other.max.y <= self.max.y
    }

    #[inline]
    #[must_use]
    pub fn contains_point(&self, p: Vec2) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Grows the box by `margin` on every side.
    #[must_use]
    pub fn inflate(&self, margin: f32) -> Self {
        let m = Vec2::splat(margin);
        Self {
            min: self.min - m,
            max: self.max + m,
        }
    }

    #[must_use]
    pub fn center(&self) -> Vec2 {
        (self.min + self.max) * 0.5
    }

    #[must_use]
    pub fn half_extents(&self) -> Vec2 {
        (self.max - self.min) * 0.5
    }
}

/// Geometric kind of a collider shape.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ShapeKind {
    Circle { radius: f32 },
    /// Oriented rectangle given by its half width and half height.
    Rect { half_extents: Vec2 },
}

impl ShapeKind {
    /// Rejects negative or non-finite sizes. Zero-size shapes are allowed and
    /// handled by the narrow phase.
    pub fn validate(&self) -> Result<(), PhysicsError> {
        match *self {
            Self::Circle { radius } => {
                if !radius.is_finite() || radius < 0.0 {
                    return Err(PhysicsError::InvalidShape("circle radius must be finite and >= 0"));
                }
            }
            Self::Rect { half_extents } => {
                if !half_extents.is_finite() || half_extents.x < 0.0 || half_extents.y < 0.0 {
                    return Err(PhysicsError::InvalidShape(
                        "rect half extents must be finite and >= 0",
                    ));
                }
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn area(&self) -> f32 {
        match *self {
            Self::Circle { radius } => std::f32::consts::PI * radius * radius,
            Self::Rect { half_extents } => 4.0 * half_extents.x * half_extents.y,
        }
    }
}

/// A shape placed relative to its body's transform.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Shape {
    pub kind: ShapeKind,
    /// Offset from the body origin, in body space.
    #[serde(default)]
    pub offset: Vec2,
    /// Rotation relative to the body, in radians.
    #[serde(default)]
    pub angle: f32,
}

impl Shape {
    #[must_use]
    pub const fn circle(radius: f32) -> Self {
        Self {
            kind: ShapeKind::Circle { radius },
            offset: Vec2::ZERO,
            angle: 0.0,
        }
    }

    /// Rectangle with full `width` and `height`.
    #[must_use]
    pub fn rect(width: f32, height: f32) -> Self {
        Self {
            kind: ShapeKind::Rect {
                half_extents: Vec2::new(width * 0.5, height * 0.5),
            },
            offset: Vec2::ZERO,
            angle: 0.0,
        }
    }

    #[must_use]
    pub fn with_offset(mut self, offset: Vec2) -> Self {
        self.offset = offset;
        self
    }

    #[must_use]
    pub fn with_angle(mut self, angle: f32) -> Self {
        self.angle = angle;
        self
    }

    pub fn validate(&self) -> Result<(), PhysicsError> {
        if !self.offset.is_finite() || !self.angle.is_finite() {
            return Err(PhysicsError::InvalidShape("shape offset and angle must be finite"));
        }
        self.kind.validate()
    }
}

/// Surface properties combined per contact.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Material {
    pub friction: f32,
    /// Coefficient of restitution.
    pub elasticity: f32,
    pub density: f32,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            friction: 0.5,
            elasticity: 0.0,
            density: 1.0,
        }
    }
}

/// Combine friction coefficients using geometric mean
#[must_use]
pub fn combine_friction(a: f32, b: f32) -> f32 {
    (a * b).max(0.0).sqrt()
}

/// The bouncier surface wins.
#[must_use]
pub fn combine_elasticity(a: f32, b: f32) -> f32 {
    a.max(b)
}

/// Broad classification of a body, one spatial index per category.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BodyCategory {
    Dynamic,
    Static,
    Sensor,
    Particle,
}

impl BodyCategory {
    pub const ALL: [Self; 4] = [Self::Dynamic, Self::Static, Self::Sensor, Self::Particle];

    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Dynamic => 0,
            Self::Static => 1,
            Self::Sensor => 2,
            Self::Particle => 3,
        }
    }

    #[must_use]
    pub const fn mask(self) -> CategoryMask {
        CategoryMask(1 << self.index())
    }

    /// Solid bodies take part in the solver.
    #[must_use]
    pub const fn is_solid(self) -> bool {
        matches!(self, Self::Dynamic | Self::Static)
    }
}

/// Bit set over [`BodyCategory`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryMask(pub u8);

impl CategoryMask {
    pub const NONE: Self = Self(0);
    pub const DYNAMIC: Self = BodyCategory::Dynamic.mask();
    pub const STATIC: Self = BodyCategory::Static.mask();
    pub const SENSOR: Self = BodyCategory::Sensor.mask();
    pub const PARTICLE: Self = BodyCategory::Particle.mask();
    pub const ALL: Self = Self(0b1111);

    #[must_use]
    pub const fn contains(self, category: BodyCategory) -> bool {
        self.0 & category.mask().0 != 0
    }

    #[must_use]
    pub const fn with(self, category: BodyCategory) -> Self {
        Self(self.0 | category.mask().0)
    }

    #[must_use]
    pub const fn without(self, category: BodyCategory) -> Self {
        Self(self.0 & !category.mask().0)
    }

    #[must_use]
    pub const fn intersect(self, other: Self) -> Self {
        Self(self.0 & other.0)
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 & Self::ALL.0 == 0
    }

    pub fn iter(self) -> impl Iterator<Item = BodyCategory> {
        BodyCategory::ALL.into_iter().filter(move |c| self.contains(*c))
    }
}

impl BitOr for CategoryMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aabb_overlap_is_inclusive() {
        let a = Aabb::new(Vec2::ZERO, Vec2::ONE);
        let b = Aabb::new(Vec2::new(1.0, 0.0), Vec2::new(2.0, 1.0));
        let c = Aabb::new(Vec2::new(1.01, 0.0), Vec2::new(2.0, 1.0));
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
    }

    #[test]
    fn aabb_from_points_and_union() {
        let bounds = Aabb::from_points(&[Vec2::new(1.0, -2.0), Vec2::new(-3.0, 4.0)]).unwrap();
        assert_eq!(bounds.min, Vec2::new(-3.0, -2.0));
        assert_eq!(bounds.max, Vec2::new(1.0, 4.0));
        assert!(Aabb::from_points(&[]).is_none());

        let u = bounds.union(&Aabb::new(Vec2::splat(5.0), Vec2::splat(6.0)));
        assert!(u.contains(&bounds));
        assert_eq!(u.max, Vec2::splat(6.0));
    }

    #[test]
    fn category_mask_ops() {
        let mask = CategoryMask::DYNAMIC | CategoryMask::STATIC;
        assert!(mask.contains(BodyCategory::Dynamic));
        assert!(!mask.contains(BodyCategory::Sensor));
        assert_eq!(mask.without(BodyCategory::Dynamic), CategoryMask::STATIC);
        assert_eq!(mask.iter().count(), 2);
        assert!(CategoryMask::NONE.is_empty());
    }

    #[test]
    fn negative_radius_is_rejected() {
        assert!(Shape::circle(-1.0).validate().is_err());
        assert!(Shape::circle(0.0).validate().is_ok());
        assert!(Shape::rect(1.0, f32::NAN).validate().is_err());
    }
}
