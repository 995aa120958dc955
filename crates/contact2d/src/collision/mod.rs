//! # Collision Detection
//!
//! Exact pairwise tests (circle-circle, circle-rectangle, rectangle-rectangle)
//! and the per-tick [`CollisionSystem`] that classifies bodies, rebuilds the
//! spatial indices and produces the flat contact list.
//!
//! Every normal produced here points from body B toward body A, and every
//! reported depth is non-negative.

mod circle_circle;
mod circle_rect;
mod debug;
mod dispatcher;
mod rect_rect;
mod system;

pub use circle_circle::*;
pub use circle_rect::*;
pub use debug::{DebugShape, DebugShapeKind};
pub use dispatcher::{test_bodies, test_shapes};
pub use rect_rect::*;
pub use system::{
    classify, CollisionConfig, CollisionStats, CollisionSystem, ContactToken, ProbeHit,
};

use crate::types::Vec2;

/// Maximum contact points one manifold can carry.
pub const MAX_MANIFOLD_POINTS: usize = 2;

/// Distances at or below this are treated as zero.
pub const DEGENERATE_EPSILON: f32 = 1.0e-6;

/// Normal reported when two centers coincide and no direction exists.
pub const FALLBACK_NORMAL: Vec2 = Vec2::Y;

#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct ContactPoint {
    /// World-space position.
    pub position: Vec2,
    /// Penetration at this point, never negative.
    pub depth: f32,
}

/// Result of one narrow-phase test: a normal, the overlap along it and up to
/// two contact points.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Manifold {
    /// Unit normal pointing from B toward A.
    pub normal: Vec2,
    /// Overlap along the normal.
    pub depth: f32,
    points: [ContactPoint; MAX_MANIFOLD_POINTS],
    count: u8,
}

impl Manifold {
    #[must_use]
    pub fn new(normal: Vec2, depth: f32) -> Self {
        Self {
            normal,
            depth: depth.max(0.0),
            points: [ContactPoint::default(); MAX_MANIFOLD_POINTS],
            count: 0,
        }
    }

    #[must_use]
    pub fn single(normal: Vec2, depth: f32, position: Vec2) -> Self {
        let mut manifold = Self::new(normal, depth);
        manifold.push(position, depth);
        manifold
    }

    /// Adds a point; extra points beyond capacity are dropped.
    pub fn push(&mut self, position: Vec2, depth: f32) {
        let i = self.count as usize;
        if i < MAX_MANIFOLD_POINTS {
            self.points[i] = ContactPoint {
                position,
                depth: depth.max(0.0),
            };
            self.count += 1;
        }
    }

    #[must_use]
    pub fn points(&self) -> &[ContactPoint] {
        &self.points[..self.count as usize]
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.count as usize
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Same contact seen from the other body.
    #[must_use]
    pub fn flipped(mut self) -> Self {
        self.normal = -self.normal;
        self
    }
}

/// One touching pair for the current tick.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Contact {
    /// Body that ran the query; this contact sits in its token range.
    pub a: u32,
    pub b: u32,
    pub manifold: Manifold,
    /// Set on the `a > b` copy of a pair that was found from both sides, so
    /// the constraint set only consumes one of them.
    pub mirrored: bool,
    /// At least one body is a sensor; reported but never solved.
    pub sensor: bool,
}
