//! Collision detection dispatcher that routes to the appropriate algorithm

use super::{circle_circle, circle_rect, rect_circle, rect_rect, Manifold};
use crate::geometry::{BodyGeometry, ShapeView};
use crate::types::ShapeKind;

/// Test two world-space shapes. The normal points from `b` toward `a`.
///
/// Shapes whose bounds do not overlap are rejected before any exact test.
#[must_use]
pub fn test_shapes(a: &ShapeView, b: &ShapeView) -> Option<Manifold> {
    if !a.aabb().overlaps(&b.aabb()) {
        return None;
    }

    match (a.kind, b.kind) {
        (ShapeKind::Circle { radius: ra }, ShapeKind::Circle { radius: rb }) => {
            circle_circle(a.center, ra, b.center, rb)
        }
        (ShapeKind::Circle { radius }, ShapeKind::Rect { half_extents }) => {
            circle_rect(a.center, radius, b, half_extents)
        }
        (ShapeKind::Rect { half_extents }, ShapeKind::Circle { radius }) => {
            rect_circle(a, half_extents, b.center, radius)
        }
        (ShapeKind::Rect { half_extents: ha }, ShapeKind::Rect { half_extents: hb }) => {
            rect_rect(a, ha, b, hb)
        }
    }
}

/// Test two bodies including their sub-shapes.
///
/// Every pairing of A's shapes with B's shapes is tested and the deepest
/// manifold is kept, so a body pair still yields at most two points. On equal
/// depth the earlier pairing (primary shapes first) wins.
#[must_use]
pub fn test_bodies(a: &BodyGeometry, b: &BodyGeometry) -> Option<Manifold> {
    if !a.aabb.overlaps(&b.aabb) {
        return None;
    }

    let mut deepest: Option<Manifold> = None;
    for view_a in a.views() {
        for view_b in b.views() {
            if let Some(manifold) = test_shapes(view_a, view_b) {
                if deepest.map_or(true, |d| manifold.depth > d.depth) {
                    deepest = Some(manifold);
                }
            }
        }
    }
    deepest
}
