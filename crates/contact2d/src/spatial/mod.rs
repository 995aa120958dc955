//! # Spatial Indexing
//!
//! One [`SpatialIndex`] quadtree per [`BodyCategory`], rebuilt every tick
//! from the cached body bounds. Queries go through a [`CategoryMask`] so a
//! body only looks in the trees its category collides with.

mod quadtree;

pub use quadtree::{IndexConfig, SpatialIndex};

use crate::types::{Aabb, BodyCategory, CategoryMask};

/// The four per-category trees.
#[derive(Clone, Debug, Default)]
pub struct SpatialIndexSet {
    trees: [SpatialIndex; 4],
}

impl SpatialIndexSet {
    #[must_use]
    pub fn new(config: IndexConfig) -> Self {
        Self {
            trees: std::array::from_fn(|_| SpatialIndex::new(config)),
        }
    }

    #[must_use]
    pub fn tree(&self, category: BodyCategory) -> &SpatialIndex {
        &self.trees[category.index()]
    }

    pub fn tree_mut(&mut self, category: BodyCategory) -> &mut SpatialIndex {
        &mut self.trees[category.index()]
    }

    /// Re-roots one tree to the union of `ids`' boxes and refills it.
    ///
    /// An empty id list leaves an empty tree with its old bounds.
    pub fn rebuild(&mut self, category: BodyCategory, ids: &[u32], boxes: &[Aabb]) {
        let extent = ids
            .iter()
            .filter_map(|&id| boxes.get(id as usize))
            .copied()
            .reduce(|a, b| a.union(&b));

        let tree = self.tree_mut(category);
        match extent {
            Some(bounds) => tree.reset_bounds(bounds.min, bounds.max),
            None => {
                let bounds = tree.bounds();
                tree.reset_bounds(bounds.min, bounds.max);
            }
        }
        tree.remove_empty_branches();
        tree.bulk_insert(ids, boxes);
    }

    /// Appends candidates from every tree in `mask`, trees in category order.
    pub fn query(&self, mask: CategoryMask, aabb: &Aabb, out: &mut Vec<u32>) {
        for category in mask.iter() {
            self.tree(category).query(out, aabb);
        }
    }

    pub fn clear(&mut self) {
        for tree in &mut self.trees {
            tree.clear();
        }
    }

    /// Total stored items across all trees.
    #[must_use]
    pub fn len(&self) -> usize {
        self.trees.iter().map(SpatialIndex::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (BodyCategory, &SpatialIndex)> {
        BodyCategory::ALL.into_iter().zip(self.trees.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Vec2;

    #[test]
    fn mask_selects_trees() {
        let boxes = vec![
            Aabb::from_center_half_extents(Vec2::ZERO, Vec2::ONE),
            Aabb::from_center_half_extents(Vec2::new(0.5, 0.0), Vec2::ONE),
            Aabb::from_center_half_extents(Vec2::new(-0.5, 0.0), Vec2::ONE),
        ];
        let mut set = SpatialIndexSet::new(IndexConfig::default());
        set.rebuild(BodyCategory::Dynamic, &[0], &boxes);
        set.rebuild(BodyCategory::Static, &[1], &boxes);
        set.rebuild(BodyCategory::Sensor, &[2], &boxes);
        assert_eq!(set.len(), 3);

        let mut out = Vec::new();
        set.query(CategoryMask::DYNAMIC | CategoryMask::STATIC, &boxes[0], &mut out);
        assert_eq!(out, vec![0, 1]);

        out.clear();
        set.query(CategoryMask::NONE, &boxes[0], &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn each_tree_roots_at_its_own_extent() {
        let boxes = vec![
            Aabb::new(Vec2::new(-10.0, -1.0), Vec2::new(10.0, 0.0)),
            Aabb::new(Vec2::new(0.0, 5.0), Vec2::new(1.0, 6.0)),
        ];
        let mut set = SpatialIndexSet::new(IndexConfig::default());
        set.rebuild(BodyCategory::Static, &[0], &boxes);
        set.rebuild(BodyCategory::Dynamic, &[1], &boxes);
        assert_eq!(set.tree(BodyCategory::Static).bounds(), boxes[0]);
        assert_eq!(set.tree(BodyCategory::Dynamic).bounds(), boxes[1]);
    }
}
