//! Flat debug-draw records a renderer can upload without conversion.

use crate::types::{Aabb, Vec2};

#[repr(u32)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DebugShapeKind {
    /// `center` is the circle center, `extent.x` the radius.
    Circle = 0,
    /// `extent` holds the half extents, `rotation` the angle in radians.
    Rect = 1,
    /// Cached body bounds as center and half extents.
    Aabb = 2,
    /// One spatial index node's bounds.
    IndexNode = 3,
    /// `center` is the contact point, `extent` the normal scaled by depth.
    ContactNormal = 4,
}

impl DebugShapeKind {
    #[must_use]
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(Self::Circle),
            1 => Some(Self::Rect),
            2 => Some(Self::Aabb),
            3 => Some(Self::IndexNode),
            4 => Some(Self::ContactNormal),
            _ => None,
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct DebugShape {
    pub kind: u32,
    /// [`crate::BodyCategory::index`] of the owning body, or the tree index
    /// for index nodes. `u32::MAX` for contacts.
    pub category: u32,
    pub center: [f32; 2],
    pub extent: [f32; 2],
    pub rotation: f32,
    pub _pad: f32,
}

impl DebugShape {
    fn new(kind: DebugShapeKind, category: u32, center: Vec2, extent: Vec2, rotation: f32) -> Self {
        Self {
            kind: kind as u32,
            category,
            center: center.to_array(),
            extent: extent.to_array(),
            rotation,
            _pad: 0.0,
        }
    }

    #[must_use]
    pub fn circle(category: u32, center: Vec2, radius: f32) -> Self {
        Self::new(DebugShapeKind::Circle, category, center, Vec2::new(radius, radius), 0.0)
    }

    #[must_use]
    pub fn rect(category: u32, center: Vec2, half_extents: Vec2, rotation: f32) -> Self {
        Self::new(DebugShapeKind::Rect, category, center, half_extents, rotation)
    }

    #[must_use]
    pub fn aabb(category: u32, bounds: &Aabb) -> Self {
        Self::new(DebugShapeKind::Aabb, category, bounds.center(), bounds.half_extents(), 0.0)
    }

    #[must_use]
    pub fn index_node(tree: u32, bounds: &Aabb) -> Self {
        Self::new(DebugShapeKind::IndexNode, tree, bounds.center(), bounds.half_extents(), 0.0)
    }

    #[must_use]
    pub fn contact_normal(point: Vec2, normal: Vec2, depth: f32) -> Self {
        Self::new(DebugShapeKind::ContactNormal, u32::MAX, point, normal * depth, 0.0)
    }

    #[must_use]
    pub fn shape_kind(&self) -> Option<DebugShapeKind> {
        DebugShapeKind::from_raw(self.kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_cast_to_bytes() {
        let shapes = [
            DebugShape::circle(0, Vec2::ONE, 0.5),
            DebugShape::contact_normal(Vec2::ZERO, Vec2::Y, 0.25),
        ];
        let bytes: &[u8] = bytemuck::cast_slice(&shapes);
        assert_eq!(bytes.len(), 2 * std::mem::size_of::<DebugShape>());
        assert_eq!(std::mem::size_of::<DebugShape>(), 32);

        let back: &[DebugShape] = bytemuck::cast_slice(bytes);
        assert_eq!(back[1].shape_kind(), Some(DebugShapeKind::ContactNormal));
        assert_eq!(back[1].extent, [0.0, 0.25]);
    }
}
