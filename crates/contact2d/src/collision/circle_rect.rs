//! Circle-rectangle collision detection

use super::{Manifold, DEGENERATE_EPSILON};
use crate::geometry::ShapeView;
use crate::types::{sign_non_zero, Vec2};

/// Detect overlap between circle A and oriented rectangle B.
///
/// Always yields exactly one point, on the rectangle's boundary.
#[must_use]
pub fn circle_rect(
    center: Vec2,
    radius: f32,
    rect: &ShapeView,
    half_extents: Vec2,
) -> Option<Manifold> {
    // Work in the rectangle's frame
    let local = rect.to_local(center);
    let clamped = local.clamp(-half_extents, half_extents);
    let delta = local - clamped;
    let distance_squared = delta.length_squared();

    let outside = distance_squared > DEGENERATE_EPSILON * DEGENERATE_EPSILON;
    let (closest, local_normal, depth) = if outside {
        if distance_squared >= radius * radius {
            return None;
        }
        let distance = distance_squared.sqrt();
        (clamped, delta / distance, radius - distance)
    } else {
        // Center is inside: the clamp vector is zero, so pick the nearest
        // edge explicitly and push out through it.
        let slack = half_extents - local.abs();
        if slack.x <= slack.y {
            let side = sign_non_zero(local.x);
            (
                Vec2::new(side * half_extents.x, local.y),
                Vec2::new(side, 0.0),
                radius + slack.x,
            )
        } else {
            let side = sign_non_zero(local.y);
            (
                Vec2::new(local.x, side * half_extents.y),
                Vec2::new(0.0, side),
                radius + slack.y,
            )
        }
    };

    let normal = rect.rotation.rotate(local_normal);
    Some(Manifold::single(normal, depth, rect.to_world(closest)))
}

/// Detect overlap between oriented rectangle A and circle B.
#[must_use]
pub fn rect_circle(
    rect: &ShapeView,
    half_extents: Vec2,
    center: Vec2,
    radius: f32,
) -> Option<Manifold> {
    circle_rect(center, radius, rect, half_extents).map(Manifold::flipped)
}
