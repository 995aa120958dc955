//! Circle-circle collision detection

use super::{Manifold, DEGENERATE_EPSILON, FALLBACK_NORMAL};
use crate::types::Vec2;

/// Detect overlap between circle A and circle B.
///
/// The single contact point sits on B's boundary along the normal.
#[must_use]
pub fn circle_circle(
    center_a: Vec2,
    radius_a: f32,
    center_b: Vec2,
    radius_b: f32,
) -> Option<Manifold> {
    let delta = center_a - center_b;
    let distance_squared = delta.length_squared();
    let radii = radius_a + radius_b;

    if distance_squared >= radii * radii {
        return None;
    }

    let distance = distance_squared.sqrt();
    // Coincident centers have no direction to push along
    let normal = if distance > DEGENERATE_EPSILON {
        delta / distance
    } else {
        FALLBACK_NORMAL
    };

    let depth = radii - distance;
    Some(Manifold::single(normal, depth, center_b + normal * radius_b))
}
