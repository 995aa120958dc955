//! Rectangle-rectangle collision detection (separating axis test)
//!
//! Two rectangles only have four candidate axes: each body's local x and y.
//! A's axes are tested first, then B's. Any axis without interval overlap
//! proves separation. The axis of least overlap picks the reference
//! rectangle; the other body's most anti-parallel face is clipped against
//! the reference side bounds to produce up to two points.

use super::{Manifold, DEGENERATE_EPSILON};
use crate::geometry::ShapeView;
use crate::types::{sign_non_zero, Vec2};

/// B's axis only replaces A's when its overlap is smaller by more than this,
/// so equal overlaps keep the first tested axis and the normal stays put
/// from frame to frame.
pub const AXIS_TIE_TOLERANCE: f32 = 1.0e-5;

/// Minimum overlap axis from one body's pass.
#[derive(Copy, Clone, Debug)]
struct AxisOverlap {
    overlap: f32,
    /// Oriented from B toward A.
    normal: Vec2,
    axis: usize,
}

#[inline]
fn component(v: Vec2, axis: usize) -> f32 {
    if axis == 0 {
        v.x
    } else {
        v.y
    }
}

/// Projects both rectangles on `reference`'s two local axes.
/// `offset` is A's center minus B's center.
fn axis_pass(
    reference: &ShapeView,
    half_ref: Vec2,
    other: &ShapeView,
    half_other: Vec2,
    offset: Vec2,
) -> Option<AxisOverlap> {
    let other_axes = other.axes();
    let mut best: Option<AxisOverlap> = None;

    for (axis, u) in reference.axes().into_iter().enumerate() {
        let radius_ref = component(half_ref, axis);
        let radius_other =
            half_other.x * u.dot(other_axes[0]).abs() + half_other.y * u.dot(other_axes[1]).abs();
        let along = offset.dot(u);
        let overlap = radius_ref + radius_other - along.abs();

        if overlap <= 0.0 {
            return None;
        }
        if best.map_or(true, |b| overlap < b.overlap) {
            best = Some(AxisOverlap {
                overlap,
                normal: u * sign_non_zero(along),
                axis,
            });
        }
    }
    best
}

/// Clips segment `v0..v1` to the slab `|(p - origin)·axis| <= extent`.
fn clip_segment(
    mut v0: Vec2,
    mut v1: Vec2,
    origin: Vec2,
    axis: Vec2,
    extent: f32,
) -> Option<(Vec2, Vec2)> {
    for side in [1.0_f32, -1.0] {
        let d0 = side * (v0 - origin).dot(axis) - extent;
        let d1 = side * (v1 - origin).dot(axis) - extent;
        if d0 > 0.0 && d1 > 0.0 {
            return None;
        }
        if d0 > 0.0 {
            v0 += (v1 - v0) * (d0 / (d0 - d1));
        } else if d1 > 0.0 {
            v1 += (v0 - v1) * (d1 / (d1 - d0));
        }
    }
    Some((v0, v1))
}

/// Builds the manifold given the reference rectangle and the outward normal
/// of its face that looks at the incident rectangle.
fn clip_incident(
    reference: &ShapeView,
    half_ref: Vec2,
    ref_axis: usize,
    ref_face_normal: Vec2,
    incident: &ShapeView,
    half_inc: Vec2,
    mut manifold: Manifold,
) -> Manifold {
    // Incident face: the one whose outward normal opposes the reference face.
    let inc_axes = incident.axes();
    let mut face_axis = 0;
    let mut face_sign = 1.0;
    let mut best_alignment = f32::NEG_INFINITY;
    for (axis, u) in inc_axes.iter().enumerate() {
        let alignment = -u.dot(ref_face_normal);
        if alignment.abs() > best_alignment {
            best_alignment = alignment.abs();
            face_axis = axis;
            face_sign = sign_non_zero(alignment);
        }
    }

    let edge_axis = 1 - face_axis;
    let face_center =
        incident.center + inc_axes[face_axis] * (face_sign * component(half_inc, face_axis));
    let edge = inc_axes[edge_axis] * component(half_inc, edge_axis);
    let (v0, v1) = (face_center + edge, face_center - edge);

    let ref_axes = reference.axes();
    let side_axis = ref_axes[1 - ref_axis];
    let side_extent = component(half_ref, 1 - ref_axis);
    let front_extent = component(half_ref, ref_axis);

    if let Some((p0, p1)) = clip_segment(v0, v1, reference.center, side_axis, side_extent) {
        let depth_at = |p: Vec2| front_extent - (p - reference.center).dot(ref_face_normal);
        let d0 = depth_at(p0);
        if d0 >= 0.0 {
            manifold.push(p0, d0);
        }
        let d1 = depth_at(p1);
        if d1 >= 0.0 && (p1 - p0).length_squared() > DEGENERATE_EPSILON * DEGENERATE_EPSILON {
            manifold.push(p1, d1);
        }
    }

    if manifold.is_empty() {
        // Clipping lost every point to round-off; keep the deepest corner.
        let deepest = incident
            .corners()
            .into_iter()
            .min_by(|p, q| {
                let dp = (*p - reference.center).dot(ref_face_normal);
                let dq = (*q - reference.center).dot(ref_face_normal);
                dp.total_cmp(&dq)
            })
            .unwrap_or(incident.center);
        let depth = manifold.depth;
        manifold.push(deepest, depth);
    }
    manifold
}

/// Detect overlap between oriented rectangles A and B.
#[must_use]
pub fn rect_rect(a: &ShapeView, half_a: Vec2, b: &ShapeView, half_b: Vec2) -> Option<Manifold> {
    let offset = a.center - b.center;

    let on_a = axis_pass(a, half_a, b, half_b, offset)?;
    let on_b = axis_pass(b, half_b, a, half_a, offset)?;

    if on_b.overlap < on_a.overlap - AXIS_TIE_TOLERANCE {
        // B owns the axis: its face pointing at A is the reference face.
        let manifold = Manifold::new(on_b.normal, on_b.overlap);
        Some(clip_incident(b, half_b, on_b.axis, on_b.normal, a, half_a, manifold))
    } else {
        // A owns the axis: its face pointing at B faces away from the normal.
        let manifold = Manifold::new(on_a.normal, on_a.overlap);
        Some(clip_incident(a, half_a, on_a.axis, -on_a.normal, b, half_b, manifold))
    }
}
