//! Region quadtree over axis-aligned boxes.
//!
//! Nodes live in one arena and are addressed by `u32`; freed nodes go on a
//! free list and are reused by later subdivisions, so rebuilding the tree
//! every tick does not allocate once it has warmed up.
//!
//! An item is pushed into a child only when that child fully contains its
//! box. Boxes that straddle a split line stay at the parent and boxes that
//! leave the root bounds stay at the root, so every item is stored exactly
//! once and queries never see duplicates.

use serde::{Deserialize, Serialize};

use crate::types::{Aabb, Vec2};

const ROOT: u32 = 0;

/// Subdivision limits for one tree.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Items a leaf holds before it splits. A soft limit: leaves at
    /// `max_depth` keep growing.
    pub capacity: usize,
    pub max_depth: u32,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            capacity: 8,
            max_depth: 8,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
struct Item {
    id: u32,
    aabb: Aabb,
}

#[derive(Clone, Debug)]
struct Node {
    bounds: Aabb,
    depth: u32,
    items: Vec<Item>,
    children: Option<[u32; 4]>,
}

impl Node {
    fn new(bounds: Aabb, depth: u32) -> Self {
        Self {
            bounds,
            depth,
            items: Vec::new(),
            children: None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct SpatialIndex {
    nodes: Vec<Node>,
    free: Vec<u32>,
    len: usize,
    config: IndexConfig,
}

impl Default for SpatialIndex {
    fn default() -> Self {
        Self::new(IndexConfig::default())
    }
}

impl SpatialIndex {
    #[must_use]
    pub fn new(config: IndexConfig) -> Self {
        Self {
            nodes: vec![Node::new(Aabb::default(), 0)],
            free: Vec::new(),
            len: 0,
            config: IndexConfig {
                capacity: config.capacity.max(1),
                max_depth: config.max_depth,
            },
        }
    }

    #[must_use]
    pub fn config(&self) -> IndexConfig {
        self.config
    }

    #[must_use]
    pub fn bounds(&self) -> Aabb {
        self.nodes[ROOT as usize].bounds
    }

    /// Number of stored items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Live nodes, root included.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len() - self.free.len()
    }

    /// Re-roots the tree at new bounds and empties it.
    ///
    /// When the bounds are unchanged the node structure is kept so the next
    /// rebuild reuses it; otherwise the old subtree is dropped.
    pub fn reset_bounds(&mut self, min: Vec2, max: Vec2) {
        let bounds = Aabb::new(min, max);
        if self.nodes[ROOT as usize].bounds == bounds {
            for node in &mut self.nodes {
                node.items.clear();
            }
            self.len = 0;
        } else {
            self.clear();
            self.nodes[ROOT as usize].bounds = bounds;
        }
    }

    /// Drops every item and every child node; the root bounds stay.
    pub fn clear(&mut self) {
        self.nodes.truncate(1);
        self.free.clear();
        let root = &mut self.nodes[ROOT as usize];
        root.items.clear();
        root.children = None;
        self.len = 0;
    }

    pub fn insert(&mut self, id: u32, aabb: Aabb) {
        let item = Item { id, aabb };
        let mut node = ROOT;
        loop {
            match self.nodes[node as usize].children {
                Some(children) => {
                    let fitting = children
                        .into_iter()
                        .find(|&c| self.nodes[c as usize].bounds.contains(&aabb));
                    match fitting {
                        Some(child) => node = child,
                        None => {
                            self.nodes[node as usize].items.push(item);
                            break;
                        }
                    }
                }
                None => {
                    self.nodes[node as usize].items.push(item);
                    self.split_if_full(node);
                    break;
                }
            }
        }
        self.len += 1;
    }

    /// Inserts every id with its box taken from `boxes[id]`. Ids without a
    /// box are skipped.
    pub fn bulk_insert(&mut self, ids: &[u32], boxes: &[Aabb]) {
        for &id in ids {
            if let Some(aabb) = boxes.get(id as usize) {
                self.insert(id, *aabb);
            }
        }
    }

    /// Appends the id of every stored item whose box overlaps `aabb`.
    ///
    /// Traversal order is deterministic for a given insertion sequence.
    pub fn query(&self, out: &mut Vec<u32>, aabb: &Aabb) {
        let mut stack = vec![ROOT];
        while let Some(index) = stack.pop() {
            let node = &self.nodes[index as usize];
            out.extend(
                node.items
                    .iter()
                    .filter(|item| item.aabb.overlaps(aabb))
                    .map(|item| item.id),
            );
            if let Some(children) = node.children {
                for child in children.into_iter().rev() {
                    if self.nodes[child as usize].bounds.overlaps(aabb) {
                        stack.push(child);
                    }
                }
            }
        }
    }

    /// Frees every subtree that holds no items.
    pub fn remove_empty_branches(&mut self) {
        self.prune(ROOT);
    }

    /// Bounds of every live node, root first, for debug drawing.
    #[must_use]
    pub fn node_bounds(&self) -> Vec<Aabb> {
        let mut bounds = Vec::with_capacity(self.node_count());
        let mut stack = vec![ROOT];
        while let Some(index) = stack.pop() {
            let node = &self.nodes[index as usize];
            bounds.push(node.bounds);
            if let Some(children) = node.children {
                stack.extend(children.into_iter().rev());
            }
        }
        bounds
    }

    fn alloc(&mut self, bounds: Aabb, depth: u32) -> u32 {
        if let Some(index) = self.free.pop() {
            self.nodes[index as usize] = Node::new(bounds, depth);
            index
        } else {
            self.nodes.push(Node::new(bounds, depth));
            (self.nodes.len() - 1) as u32
        }
    }

    fn split_if_full(&mut self, index: u32) {
        let node = &self.nodes[index as usize];
        if node.children.is_some()
            || node.items.len() <= self.config.capacity
            || node.depth >= self.config.max_depth
        {
            return;
        }

        let Aabb { min, max } = node.bounds;
        let depth = node.depth + 1;
        let c = (min + max) * 0.5;
        let quadrants = [
            Aabb::new(min, c),
            Aabb::new(Vec2::new(c.x, min.y), Vec2::new(max.x, c.y)),
            Aabb::new(Vec2::new(min.x, c.y), Vec2::new(c.x, max.y)),
            Aabb::new(c, max),
        ];
        let children = quadrants.map(|bounds| self.alloc(bounds, depth));

        let items = std::mem::take(&mut self.nodes[index as usize].items);
        let mut kept = Vec::new();
        for item in items {
            match children
                .into_iter()
                .find(|&c| self.nodes[c as usize].bounds.contains(&item.aabb))
            {
                Some(child) => self.nodes[child as usize].items.push(item),
                None => kept.push(item),
            }
        }
        let node = &mut self.nodes[index as usize];
        node.items = kept;
        node.children = Some(children);

        for child in children {
            self.split_if_full(child);
        }
    }

    /// Returns `true` when the subtree at `index` holds nothing.
    fn prune(&mut self, index: u32) -> bool {
        if let Some(children) = self.nodes[index as usize].children {
            let mut all_empty = true;
            for child in children {
                all_empty &= self.prune(child);
            }
            if all_empty {
                for child in children {
                    self.nodes[child as usize].items = Vec::new();
                    self.free.push(child);
                }
                self.nodes[index as usize].children = None;
            }
        }
        let node = &self.nodes[index as usize];
        node.children.is_none() && node.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_box(x: f32, y: f32) -> Aabb {
        Aabb::from_center_half_extents(Vec2::new(x, y), Vec2::splat(0.1))
    }

    fn tree() -> SpatialIndex {
        let mut tree = SpatialIndex::new(IndexConfig {
            capacity: 2,
            max_depth: 4,
        });
        tree.reset_bounds(Vec2::splat(-8.0), Vec2::splat(8.0));
        tree
    }

    #[test]
    fn splits_past_capacity() {
        let mut tree = tree();
        for (i, x) in [-6.0, -5.0, 5.0, 6.0].into_iter().enumerate() {
            tree.insert(i as u32, unit_box(x, x));
        }
        assert_eq!(tree.len(), 4);
        assert_eq!(tree.node_count(), 5);

        let mut out = Vec::new();
        tree.query(&mut out, &Aabb::new(Vec2::splat(4.0), Vec2::splat(7.0)));
        out.sort_unstable();
        assert_eq!(out, vec![2, 3]);
    }

    #[test]
    fn straddling_and_outside_items_are_found_once() {
        let mut tree = tree();
        tree.insert(0, unit_box(-6.0, -6.0));
        tree.insert(1, unit_box(6.0, 6.0));
        tree.insert(2, unit_box(0.0, 0.0)); // straddles the center split
        tree.insert(3, unit_box(20.0, 20.0)); // outside the root bounds
        assert!(tree.node_count() > 1);

        let mut out = Vec::new();
        tree.query(&mut out, &Aabb::new(Vec2::splat(-30.0), Vec2::splat(30.0)));
        out.sort_unstable();
        assert_eq!(out, vec![0, 1, 2, 3]);

        out.clear();
        tree.query(&mut out, &unit_box(20.05, 20.0));
        assert_eq!(out, vec![3]);
    }

    #[test]
    fn reset_with_same_bounds_keeps_structure() {
        let mut tree = tree();
        let boxes = [unit_box(-6.0, -6.0), unit_box(-5.0, -5.0), unit_box(6.0, 6.0)];
        tree.bulk_insert(&[0, 1, 2], &boxes);
        let nodes = tree.node_count();
        assert!(nodes > 1);

        tree.reset_bounds(Vec2::splat(-8.0), Vec2::splat(8.0));
        assert_eq!(tree.node_count(), nodes);
        assert!(tree.is_empty());

        tree.remove_empty_branches();
        assert_eq!(tree.node_count(), 1);

        tree.reset_bounds(Vec2::splat(-4.0), Vec2::splat(4.0));
        assert_eq!(tree.bounds(), Aabb::new(Vec2::splat(-4.0), Vec2::splat(4.0)));
    }

    #[test]
    fn freed_nodes_are_reused() {
        let mut tree = tree();
        let boxes = [unit_box(-6.0, -6.0), unit_box(-5.0, -5.0), unit_box(6.0, 6.0)];
        for _ in 0..4 {
            tree.reset_bounds(Vec2::splat(-8.0), Vec2::splat(8.0));
            tree.remove_empty_branches();
            tree.bulk_insert(&[0, 1, 2], &boxes);
        }
        // Arena never grows past what a single build needs.
        assert!(tree.nodes.len() <= 1 + 4 * 4);
        assert_eq!(tree.len(), 3);
    }

    #[test]
    fn degenerate_bounds_stop_at_max_depth() {
        let mut tree = SpatialIndex::new(IndexConfig {
            capacity: 1,
            max_depth: 3,
        });
        tree.reset_bounds(Vec2::ZERO, Vec2::ZERO);
        for id in 0..10 {
            tree.insert(id, Aabb::new(Vec2::ZERO, Vec2::ZERO));
        }
        let mut out = Vec::new();
        tree.query(&mut out, &Aabb::new(Vec2::ZERO, Vec2::ZERO));
        assert_eq!(out.len(), 10);
    }
}
