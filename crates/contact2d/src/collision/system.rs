//! Per-tick broad and narrow phase over every body in a store.

#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::{test_bodies, Contact, DebugShape, Manifold};
use crate::body::Transform;
use crate::error::PhysicsError;
use crate::geometry::{BodyGeometry, ShapeView};
use crate::spatial::{IndexConfig, SpatialIndexSet};
use crate::store::{BodyStore, ComponentKind, Handle};
use crate::types::{Aabb, BodyCategory, CategoryMask, Shape, ShapeKind};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollisionConfig {
    /// Cached bounds are grown by this much on every side.
    pub aabb_margin: f32,
    pub index: IndexConfig,
    /// Trees each category queries.
    pub dynamic_query: CategoryMask,
    pub static_query: CategoryMask,
    pub sensor_query: CategoryMask,
    pub particle_query: CategoryMask,
    /// Adds the static tree to the particle query.
    pub particles_collide_static: bool,
    /// Queriers handed to one worker at a time.
    pub chunk_size: usize,
}

impl Default for CollisionConfig {
    fn default() -> Self {
        Self {
            aabb_margin: 0.0,
            index: IndexConfig::default(),
            dynamic_query: CategoryMask::DYNAMIC | CategoryMask::STATIC,
            static_query: CategoryMask::NONE,
            sensor_query: CategoryMask::DYNAMIC | CategoryMask::PARTICLE,
            particle_query: CategoryMask::DYNAMIC,
            particles_collide_static: false,
            chunk_size: 64,
        }
    }
}

impl CollisionConfig {
    #[must_use]
    pub fn query_mask(&self, category: BodyCategory) -> CategoryMask {
        match category {
            BodyCategory::Dynamic => self.dynamic_query,
            BodyCategory::Static => self.static_query,
            BodyCategory::Sensor => self.sensor_query,
            BodyCategory::Particle if self.particles_collide_static => {
                self.particle_query.with(BodyCategory::Static)
            }
            BodyCategory::Particle => self.particle_query,
        }
    }
}

/// Category of a live body, from whether it carries mass and movement.
///
/// Bodies without a transform or collider take no part in collision.
pub fn classify<S: BodyStore + ?Sized>(store: &S, index: u32) -> Option<BodyCategory> {
    if !store.has(index, ComponentKind::Transform) || !store.has(index, ComponentKind::Collider) {
        return None;
    }
    let has_mass = store.mass(index).is_some();
    let moves = store.movement(index).is_some();
    Some(match (has_mass, moves) {
        (true, true) => BodyCategory::Dynamic,
        (false, true) => BodyCategory::Particle,
        (true, false) => BodyCategory::Static,
        (false, false) => BodyCategory::Sensor,
    })
}

/// Range of one body's contacts in [`CollisionSystem::contacts`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ContactToken {
    pub begin: usize,
    pub end: usize,
}

impl ContactToken {
    #[must_use]
    pub fn len(&self) -> usize {
        self.end - self.begin
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.begin == self.end
    }

    #[must_use]
    pub fn range(&self) -> std::ops::Range<usize> {
        self.begin..self.end
    }
}

/// One body touched by an overlap query. The normal points from the body
/// toward the probe shape.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ProbeHit {
    pub handle: Handle,
    pub manifold: Manifold,
}

/// Counters from the last [`CollisionSystem::update`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct CollisionStats {
    /// Classified bodies per category, in [`BodyCategory::index`] order.
    pub bodies: [usize; 4],
    pub candidates: usize,
    pub contacts: usize,
    pub static_rebuilt: bool,
}

#[derive(Debug, Default)]
pub struct CollisionSystem {
    config: CollisionConfig,
    enabled: CategoryMask,
    categories: Vec<Option<BodyCategory>>,
    /// Handle of each slot as of the last update.
    handles: Vec<Option<Handle>>,
    lists: [Vec<u32>; 4],
    geometry: Vec<Option<BodyGeometry>>,
    ignore_masks: Vec<u32>,
    aabbs: Vec<Aabb>,
    indices: SpatialIndexSet,
    static_snapshot: Vec<(u32, Aabb)>,
    statics_dirty: bool,
    contacts: Vec<Contact>,
    tokens: Vec<ContactToken>,
    stats: CollisionStats,
}

impl CollisionSystem {
    #[must_use]
    pub fn new(config: CollisionConfig) -> Self {
        Self {
            indices: SpatialIndexSet::new(config.index),
            config,
            enabled: CategoryMask::ALL,
            statics_dirty: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn config(&self) -> &CollisionConfig {
        &self.config
    }

    /// Replaces the configuration; the next update rebuilds every tree.
    pub fn set_config(&mut self, config: CollisionConfig) {
        if config.index != self.config.index {
            self.indices = SpatialIndexSet::new(config.index);
        }
        self.config = config;
        self.statics_dirty = true;
    }

    /// Classifies every body, rebuilds the spatial indices and runs the
    /// narrow phase. Replaces last tick's contacts.
    pub fn update<S: BodyStore + Sync + ?Sized>(&mut self, store: &S) -> CollisionStats {
        let capacity = store.capacity();
        self.classify_all(store, capacity);
        self.cache_geometry(store, capacity);
        let static_rebuilt = self.rebuild_indices();

        let queriers: Vec<u32> = self
            .categories
            .iter()
            .enumerate()
            .filter_map(|(i, category)| {
                let category = (*category)?;
                let mask = self.effective_mask(category);
                (self.enabled.contains(category) && !mask.is_empty()).then_some(i as u32)
            })
            .collect();

        let chunk_size = self.config.chunk_size.max(1);

        #[cfg(feature = "parallel")]
        let buffers: Vec<(Vec<Contact>, usize)> = queriers
            .par_chunks(chunk_size)
            .map(|chunk| self.narrow_phase_chunk(chunk))
            .collect();

        #[cfg(not(feature = "parallel"))]
        let buffers: Vec<(Vec<Contact>, usize)> = queriers
            .chunks(chunk_size)
            .map(|chunk| self.narrow_phase_chunk(chunk))
            .collect();

        self.contacts.clear();
        let mut candidates = 0;
        for (buffer, tested) in buffers {
            self.contacts.extend(buffer);
            candidates += tested;
        }
        self.build_tokens(capacity);

        let mut bodies = [0; 4];
        for (slot, list) in bodies.iter_mut().zip(&self.lists) {
            *slot = list.len();
        }
        self.stats = CollisionStats {
            bodies,
            candidates,
            contacts: self.contacts.len(),
            static_rebuilt,
        };
        debug!(
            dynamic = bodies[0],
            statics = bodies[1],
            sensors = bodies[2],
            particles = bodies[3],
            candidates,
            contacts = self.contacts.len(),
            "collision update"
        );
        self.stats
    }

    fn classify_all<S: BodyStore + Sync + ?Sized>(&mut self, store: &S, capacity: usize) {
        #[cfg(feature = "parallel")]
        {
            (0..capacity)
                .into_par_iter()
                .map(|i| classify(store, i as u32))
                .collect_into_vec(&mut self.categories);
        }

        #[cfg(not(feature = "parallel"))]
        {
            self.categories.clear();
            self.categories.extend((0..capacity).map(|i| classify(store, i as u32)));
        }

        self.handles.clear();
        self.handles.extend((0..capacity).map(|i| store.handle_at(i as u32)));

        for list in &mut self.lists {
            list.clear();
        }
        for (i, category) in self.categories.iter().enumerate() {
            if let Some(category) = category {
                self.lists[category.index()].push(i as u32);
            }
        }
    }

    fn cache_geometry<S: BodyStore + Sync + ?Sized>(&mut self, store: &S, capacity: usize) {
        let categories = &self.categories;
        let build = |i: usize| -> Option<BodyGeometry> {
            categories[i]?;
            let index = i as u32;
            Some(BodyGeometry::new(store.transform(index)?, store.collider(index)?))
        };

        #[cfg(feature = "parallel")]
        {
            (0..capacity).into_par_iter().map(build).collect_into_vec(&mut self.geometry);
        }

        #[cfg(not(feature = "parallel"))]
        {
            self.geometry.clear();
            self.geometry.extend((0..capacity).map(build));
        }

        self.ignore_masks.clear();
        self.ignore_masks
            .extend((0..capacity).map(|i| store.collider(i as u32).map_or(0, |c| c.ignore_mask)));

        let margin = self.config.aabb_margin;
        self.aabbs.clear();
        self.aabbs.extend(
            self.geometry
                .iter()
                .map(|g| g.as_ref().map_or_else(Aabb::default, |g| g.aabb.inflate(margin))),
        );
    }

    /// Returns `true` when the static tree was rebuilt.
    fn rebuild_indices(&mut self) -> bool {
        let mut static_rebuilt = false;
        for category in BodyCategory::ALL {
            let ids: &[u32] = if self.enabled.contains(category) {
                &self.lists[category.index()]
            } else {
                &[]
            };

            if category == BodyCategory::Static {
                let snapshot: Vec<(u32, Aabb)> =
                    ids.iter().map(|&id| (id, self.aabbs[id as usize])).collect();
                if !self.statics_dirty && snapshot == self.static_snapshot {
                    trace!(statics = ids.len(), "static index unchanged, skipping rebuild");
                    continue;
                }
                if self.statics_dirty {
                    trace!("static index rebuild forced");
                }
                self.static_snapshot = snapshot;
                self.statics_dirty = false;
                static_rebuilt = true;
            }

            self.indices.rebuild(category, ids, &self.aabbs);
            trace!(
                ?category,
                items = ids.len(),
                nodes = self.indices.tree(category).node_count(),
                "index rebuilt"
            );
        }
        static_rebuilt
    }

    fn effective_mask(&self, category: BodyCategory) -> CategoryMask {
        self.config.query_mask(category).intersect(self.enabled)
    }

    /// Contacts for one worker's queriers plus the number of candidates tested.
    fn narrow_phase_chunk(&self, queriers: &[u32]) -> (Vec<Contact>, usize) {
        let mut contacts = Vec::new();
        let mut candidates = Vec::new();
        let mut tested = 0;

        for &a in queriers {
            let (Some(category_a), Some(geometry_a)) =
                (self.categories[a as usize], self.geometry[a as usize].as_ref())
            else {
                continue;
            };
            let ignore_a = self.ignore_masks[a as usize];

            candidates.clear();
            self.indices
                .query(self.effective_mask(category_a), &self.aabbs[a as usize], &mut candidates);
            candidates.sort_unstable();
            candidates.dedup();

            for &b in &candidates {
                if b == a {
                    continue;
                }
                let (Some(category_b), Some(geometry_b)) =
                    (self.categories[b as usize], self.geometry[b as usize].as_ref())
                else {
                    continue;
                };
                if ignore_a & self.ignore_masks[b as usize] != 0 {
                    continue;
                }
                tested += 1;

                if let Some(manifold) = test_bodies(geometry_a, geometry_b) {
                    let both_sides = self.effective_mask(category_b).contains(category_a);
                    let sensor =
                        category_a == BodyCategory::Sensor || category_b == BodyCategory::Sensor;
                    contacts.push(Contact {
                        a,
                        b,
                        manifold,
                        mirrored: both_sides && a > b,
                        sensor,
                    });
                }
            }
        }
        (contacts, tested)
    }

    fn build_tokens(&mut self, capacity: usize) {
        self.tokens.clear();
        self.tokens.resize(capacity, ContactToken::default());
        let mut k = 0;
        while k < self.contacts.len() {
            let a = self.contacts[k].a;
            let begin = k;
            while k < self.contacts.len() && self.contacts[k].a == a {
                k += 1;
            }
            self.tokens[a as usize] = ContactToken { begin, end: k };
        }
    }

    /// Every contact from the last update, grouped by querying body in
    /// ascending index order.
    #[must_use]
    pub fn contacts(&self) -> &[Contact] {
        &self.contacts
    }

    #[must_use]
    pub fn token(&self, index: u32) -> ContactToken {
        self.tokens.get(index as usize).copied().unwrap_or_default()
    }

    #[must_use]
    pub fn tokens(&self) -> &[ContactToken] {
        &self.tokens
    }

    /// Contacts the body found as querier during the last update. A body
    /// spawned since then, even into a reused slot, has none yet.
    pub fn contacts_for<S: BodyStore + ?Sized>(
        &self,
        store: &S,
        handle: Handle,
    ) -> Result<&[Contact], PhysicsError> {
        let index = store.resolve(handle)?;
        if !self.saw(handle) {
            return Ok(&[]);
        }
        Ok(&self.contacts[self.token(index).range()])
    }

    /// Whether the last update ran with this exact handle in its slot.
    #[must_use]
    pub fn saw(&self, handle: Handle) -> bool {
        self.handles.get(handle.index as usize).copied().flatten() == Some(handle)
    }

    /// One-shot probe against the current indices. Touches no persistent
    /// state and does not require the probe to be a body.
    pub fn overlap_query<S: BodyStore + ?Sized>(
        &self,
        store: &S,
        shape: &Shape,
        transform: &Transform,
        mask: CategoryMask,
    ) -> Result<Vec<ProbeHit>, PhysicsError> {
        shape.validate()?;
        let probe = BodyGeometry::from_view(ShapeView::new(transform, shape));

        let mut candidates = Vec::new();
        self.indices.query(mask.intersect(self.enabled), &probe.aabb, &mut candidates);
        candidates.sort_unstable();
        candidates.dedup();

        Ok(candidates
            .into_iter()
            .filter_map(|b| {
                let geometry = self.geometry.get(b as usize)?.as_ref()?;
                let handle = self.handles.get(b as usize).copied().flatten()?;
                if !store.is_alive(handle) {
                    return None;
                }
                let manifold = test_bodies(&probe, geometry)?;
                Some(ProbeHit { handle, manifold })
            })
            .collect())
    }

    pub fn set_category_enabled(&mut self, category: BodyCategory, enabled: bool) {
        self.enabled = if enabled {
            self.enabled.with(category)
        } else {
            self.enabled.without(category)
        };
        if category == BodyCategory::Static {
            self.statics_dirty = true;
        }
    }

    #[must_use]
    pub fn enabled_categories(&self) -> CategoryMask {
        self.enabled
    }

    /// Forces the static tree to rebuild on the next update.
    pub fn mark_statics_changed(&mut self) {
        self.statics_dirty = true;
    }

    /// Cached, margin-inflated bounds of a classified body.
    #[must_use]
    pub fn aabb(&self, index: u32) -> Option<Aabb> {
        self.category(index)?;
        self.aabbs.get(index as usize).copied()
    }

    #[must_use]
    pub fn category(&self, index: u32) -> Option<BodyCategory> {
        self.categories.get(index as usize).copied().flatten()
    }

    /// Classified body indices of one category, ascending.
    #[must_use]
    pub fn bodies(&self, category: BodyCategory) -> &[u32] {
        &self.lists[category.index()]
    }

    #[must_use]
    pub fn geometry(&self, index: u32) -> Option<&BodyGeometry> {
        self.geometry.get(index as usize)?.as_ref()
    }

    #[must_use]
    pub fn indices(&self) -> &SpatialIndexSet {
        &self.indices
    }

    #[must_use]
    pub fn stats(&self) -> CollisionStats {
        self.stats
    }

    /// Shapes, cached bounds, index nodes and contact normals from the last
    /// update, ready for `bytemuck::cast_slice`.
    #[must_use]
    pub fn debug_shapes(&self) -> Vec<DebugShape> {
        let mut shapes = Vec::new();
        for (i, geometry) in self.geometry.iter().enumerate() {
            let (Some(geometry), Some(category)) = (geometry, self.category(i as u32)) else {
                continue;
            };
            let tag = category.index() as u32;
            for view in geometry.views() {
                shapes.push(match view.kind {
                    ShapeKind::Circle { radius } => DebugShape::circle(tag, view.center, radius),
                    ShapeKind::Rect { half_extents } => {
                        let angle = view.rotation.y.atan2(view.rotation.x);
                        DebugShape::rect(tag, view.center, half_extents, angle)
                    }
                });
            }
            shapes.push(DebugShape::aabb(tag, &self.aabbs[i]));
        }
        for (category, tree) in self.indices.iter() {
            let tag = category.index() as u32;
            shapes.extend(
                tree.node_bounds()
                    .iter()
                    .map(|bounds| DebugShape::index_node(tag, bounds)),
            );
        }
        for contact in &self.contacts {
            let manifold = &contact.manifold;
            shapes.extend(
                manifold
                    .points()
                    .iter()
                    .map(|p| DebugShape::contact_normal(p.position, manifold.normal, p.depth)),
            );
        }
        shapes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::{BodyDesc, Collider, Mass, Movement};
    use crate::store::BodySet;
    use crate::types::Vec2;

    fn dynamic_circle(set: &mut BodySet, x: f32, y: f32) -> Handle {
        let collider = Collider::new(Shape::circle(0.5));
        let mass = Mass::from_collider(&collider);
        set.spawn(
            BodyDesc::new(Transform::from_position(Vec2::new(x, y)), collider)
                .with_mass(mass)
                .with_movement(Movement::default()),
        )
        .unwrap()
    }

    #[test]
    fn default_query_masks() {
        let config = CollisionConfig::default();
        assert_eq!(config.query_mask(BodyCategory::Static), CategoryMask::NONE);
        assert!(!config.query_mask(BodyCategory::Particle).contains(BodyCategory::Static));
        let config = CollisionConfig {
            particles_collide_static: true,
            ..CollisionConfig::default()
        };
        assert!(config.query_mask(BodyCategory::Particle).contains(BodyCategory::Static));
    }

    #[test]
    fn dynamic_pair_is_found_from_both_sides() {
        let mut set = BodySet::new();
        dynamic_circle(&mut set, 0.0, 0.0);
        dynamic_circle(&mut set, 0.8, 0.0);
        let mut system = CollisionSystem::new(CollisionConfig::default());
        system.update(&set);

        let contacts = system.contacts();
        assert_eq!(contacts.len(), 2);
        assert!(!contacts[0].mirrored);
        assert!(contacts[1].mirrored);
        assert!((contacts[0].manifold.normal + contacts[1].manifold.normal).length() < 1e-6);
        assert_eq!(system.token(0), ContactToken { begin: 0, end: 1 });
        assert_eq!(system.token(1), ContactToken { begin: 1, end: 2 });
    }

    #[test]
    fn static_tree_rebuild_is_skipped_when_unchanged() {
        let mut set = BodySet::new();
        let floor = Collider::new(Shape::rect(4.0, 1.0));
        set.spawn(BodyDesc::new(Transform::default(), floor).with_mass(Mass::infinite()))
            .unwrap();
        dynamic_circle(&mut set, 0.0, 0.6);

        let mut system = CollisionSystem::new(CollisionConfig::default());
        assert!(system.update(&set).static_rebuilt);
        assert!(!system.update(&set).static_rebuilt);
        system.mark_statics_changed();
        assert!(system.update(&set).static_rebuilt);
        assert_eq!(system.contacts().len(), 1);
    }

    #[test]
    fn shared_ignore_bits_skip_the_pair() {
        let mut set = BodySet::new();
        for x in [0.0, 0.5] {
            let collider = Collider::new(Shape::circle(0.5)).with_ignore_mask(0b10);
            set.spawn(
                BodyDesc::new(Transform::from_position(Vec2::new(x, 0.0)), collider)
                    .with_mass(Mass::new(1.0, 1.0))
                    .with_movement(Movement::default()),
            )
            .unwrap();
        }
        let mut system = CollisionSystem::new(CollisionConfig::default());
        assert_eq!(system.update(&set).candidates, 0);
        assert!(system.contacts().is_empty());
    }

    #[test]
    fn disabled_category_is_neither_queried_nor_indexed() {
        let mut set = BodySet::new();
        dynamic_circle(&mut set, 0.0, 0.0);
        dynamic_circle(&mut set, 0.5, 0.0);
        let mut system = CollisionSystem::new(CollisionConfig::default());
        system.set_category_enabled(BodyCategory::Dynamic, false);
        system.update(&set);
        assert!(system.contacts().is_empty());
        assert!(system.indices().tree(BodyCategory::Dynamic).is_empty());
        assert!(!system.enabled_categories().contains(BodyCategory::Dynamic));
    }
}
