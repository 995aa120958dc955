//! Geometry adapter: a read-only snapshot of one shape in world space.
//!
//! Views are built fresh for every narrow-phase call and never stored.

use crate::body::{Collider, Transform};
use crate::types::{Aabb, Shape, ShapeKind, Vec2};

/// World-space view of a single shape.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ShapeView {
    pub center: Vec2,
    /// Orientation as a unit complex number `(cos θ, sin θ)`.
    pub rotation: Vec2,
    pub kind: ShapeKind,
}

impl ShapeView {
    #[must_use]
    pub fn new(transform: &Transform, shape: &Shape) -> Self {
        let body_rotation = Vec2::from_angle(transform.rotation);
        Self {
            center: transform.position + body_rotation.rotate(shape.offset),
            rotation: Vec2::from_angle(transform.rotation + shape.angle),
            kind: shape.kind,
        }
    }

    #[must_use]
    pub fn circle(center: Vec2, radius: f32) -> Self {
        Self {
            center,
            rotation: Vec2::X,
            kind: ShapeKind::Circle { radius },
        }
    }

    #[must_use]
    pub fn rect(center: Vec2, half_extents: Vec2, angle: f32) -> Self {
        Self {
            center,
            rotation: Vec2::from_angle(angle),
            kind: ShapeKind::Rect { half_extents },
        }
    }

    /// World point into this shape's local frame.
    #[inline]
    #[must_use]
    pub fn to_local(&self, p: Vec2) -> Vec2 {
        Vec2::new(self.rotation.x, -self.rotation.y).rotate(p - self.center)
    }

    /// Local point back into world space.
    #[inline]
    #[must_use]
    pub fn to_world(&self, local: Vec2) -> Vec2 {
        self.center + self.rotation.rotate(local)
    }

    /// Local x and y axes in world space.
    #[inline]
    #[must_use]
    pub fn axes(&self) -> [Vec2; 2] {
        [self.rotation, self.rotation.perp()]
    }

    /// Tight axis-aligned bounds of the rotated shape.
    #[must_use]
    pub fn aabb(&self) -> Aabb {
        match self.kind {
            ShapeKind::Circle { radius } => {
                Aabb::from_center_half_extents(self.center, Vec2::splat(radius))
            }
            ShapeKind::Rect { half_extents } => {
                let c = self.rotation.x.abs();
                let s = self.rotation.y.abs();
                let extent = Vec2::new(
                    c * half_extents.x + s * half_extents.y,
                    s * half_extents.x + c * half_extents.y,
                );
                Aabb::from_center_half_extents(self.center, extent)
            }
        }
    }

    /// Rectangle corners, counter-clockwise from the local `(+x, +y)` corner.
    /// A circle reports its center four times.
    #[must_use]
    pub fn corners(&self) -> [Vec2; 4] {
        match self.kind {
            ShapeKind::Circle { .. } => [self.center; 4],
            ShapeKind::Rect { half_extents: h } => [
                self.to_world(Vec2::new(h.x, h.y)),
                self.to_world(Vec2::new(-h.x, h.y)),
                self.to_world(Vec2::new(-h.x, -h.y)),
                self.to_world(Vec2::new(h.x, -h.y)),
            ],
        }
    }
}

/// Every shape of one body plus the bounds covering all of them.
#[derive(Clone, Debug, PartialEq)]
pub struct BodyGeometry {
    pub primary: ShapeView,
    pub sub_shapes: Vec<ShapeView>,
    pub aabb: Aabb,
}

impl BodyGeometry {
    #[must_use]
    pub fn new(transform: &Transform, collider: &Collider) -> Self {
        let primary = ShapeView::new(transform, &collider.shape);
        let sub_shapes: Vec<ShapeView> = collider
            .sub_shapes
            .iter()
            .map(|shape| ShapeView::new(transform, shape))
            .collect();
        let aabb = sub_shapes
            .iter()
            .fold(primary.aabb(), |bounds, view| bounds.union(&view.aabb()));
        Self {
            primary,
            sub_shapes,
            aabb,
        }
    }

    #[must_use]
    pub fn from_view(view: ShapeView) -> Self {
        Self {
            aabb: view.aabb(),
            primary: view,
            sub_shapes: Vec::new(),
        }
    }

    pub fn views(&self) -> impl Iterator<Item = &ShapeView> {
        std::iter::once(&self.primary).chain(self.sub_shapes.iter())
    }
}

/// Bounds of a collider's true rotated extent, sub-shapes included.
#[must_use]
pub fn collider_aabb(transform: &Transform, collider: &Collider) -> Aabb {
    collider
        .shapes()
        .map(|shape| ShapeView::new(transform, shape).aabb())
        .reduce(|a, b| a.union(&b))
        .unwrap_or_else(|| Aabb::new(transform.position, transform.position))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_4;

    #[test]
    fn rotated_rect_bounds_cover_corners() {
        let view = ShapeView::rect(Vec2::new(1.0, 2.0), Vec2::new(1.0, 0.5), FRAC_PI_4);
        let bounds = view.aabb();
        for corner in view.corners() {
            assert!(bounds.inflate(1e-5).contains_point(corner));
        }
    }

    #[test]
    fn local_world_round_trip() {
        let view = ShapeView::rect(Vec2::new(-3.0, 1.0), Vec2::ONE, 0.7);
        let p = Vec2::new(2.0, -4.0);
        assert!((view.to_world(view.to_local(p)) - p).length() < 1e-5);
    }

    #[test]
    fn sub_shape_extends_body_bounds() {
        let side = Shape::rect(1.0, 1.0).with_offset(Vec2::new(2.0, 0.0));
        let collider = Collider::new(Shape::circle(0.5)).with_sub_shape(side);
        let transform = Transform::new(Vec2::ZERO, std::f32::consts::FRAC_PI_2);
        let bounds = collider_aabb(&transform, &collider);
        // Rotated a quarter turn the sub-shape sits above the body origin.
        assert!(bounds.max.y >= 2.5 - 1e-5);
        assert!(bounds.max.x <= 0.5 + 1e-5);
    }
}
