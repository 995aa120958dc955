//! # Contact Constraints
//!
//! Persistent per-pair records that outlive a single tick so the solver can
//! warm start from last tick's impulses. Records are keyed by the canonical
//! (smaller id, larger id) pair and kept in a `BTreeMap` so iteration order,
//! and therefore the solve order, is deterministic.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::collision::{Contact, MAX_MANIFOLD_POINTS};
use crate::store::BodyStore;
use crate::types::{combine_elasticity, combine_friction, Material, Vec2};

/// Canonical pair key: `(min << 32) | max`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PairKey(pub u64);

impl PairKey {
    #[must_use]
    pub fn new(a: u32, b: u32) -> Self {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        Self((u64::from(lo) << 32) | u64::from(hi))
    }

    /// Returns `(min, max)`.
    #[must_use]
    pub fn decode(self) -> (u32, u32) {
        ((self.0 >> 32) as u32, self.0 as u32)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConstraintState {
    /// Created this tick; nothing to warm start from.
    New,
    /// Survived at least one refresh.
    Active,
}

#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct ConstraintPoint {
    pub position: Vec2,
    pub depth: f32,
    /// Lever arm from the first body's center.
    pub r_first: Vec2,
    /// Lever arm from the second body's center.
    pub r_second: Vec2,
    pub normal_impulse: f32,
    pub tangent_impulse: f32,
    pub normal_mass: f32,
    pub tangent_mass: f32,
    /// Target separating velocity along the normal, from restitution.
    pub bias: f32,
    /// Separating pseudo velocity that removes penetration beyond the slop.
    pub position_bias: f32,
    /// Accumulated pseudo impulse; starts from zero every tick.
    pub pseudo_impulse: f32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ConstraintRecord {
    pub first: u32,
    pub second: u32,
    /// Unit normal pointing from `second` toward `first`.
    pub normal: Vec2,
    pub depth: f32,
    pub friction: f32,
    pub restitution: f32,
    pub state: ConstraintState,
    /// Refreshed during the current update.
    pub updated: bool,
    points: [ConstraintPoint; MAX_MANIFOLD_POINTS],
    count: u8,
}

impl ConstraintRecord {
    #[must_use]
    pub fn new(first: u32, second: u32) -> Self {
        Self {
            first,
            second,
            normal: Vec2::Y,
            depth: 0.0,
            friction: 0.0,
            restitution: 0.0,
            state: ConstraintState::New,
            updated: false,
            points: [ConstraintPoint::default(); MAX_MANIFOLD_POINTS],
            count: 0,
        }
    }

    #[must_use]
    pub fn points(&self) -> &[ConstraintPoint] {
        &self.points[..self.count as usize]
    }

    pub fn points_mut(&mut self) -> &mut [ConstraintPoint] {
        &mut self.points[..self.count as usize]
    }

    #[must_use]
    pub fn key(&self) -> PairKey {
        PairKey::new(self.first, self.second)
    }

    /// Replaces the geometry, carrying each old point's accumulated impulses
    /// onto the nearest new point within `match_distance`.
    fn refresh(
        &mut self,
        normal: Vec2,
        depth: f32,
        new_points: &[ConstraintPoint],
        match_distance: f32,
    ) {
        let old = self.points;
        let old_count = self.count as usize;
        let max_sq = match_distance * match_distance;

        self.count = 0;
        for point in new_points.iter().take(MAX_MANIFOLD_POINTS) {
            let mut point = *point;
            let nearest = old[..old_count]
                .iter()
                .map(|o| (o, (o.position - point.position).length_squared()))
                .filter(|(_, d)| *d <= max_sq)
                .min_by(|a, b| a.1.total_cmp(&b.1));
            if let Some((matched, _)) = nearest {
                point.normal_impulse = matched.normal_impulse;
                point.tangent_impulse = matched.tangent_impulse;
            }
            self.points[self.count as usize] = point;
            self.count += 1;
        }
        self.normal = normal;
        self.depth = depth;
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConstraintConfig {
    /// Old and new points closer than this are treated as the same point.
    pub warm_start_match_distance: f32,
}

impl Default for ConstraintConfig {
    fn default() -> Self {
        Self {
            warm_start_match_distance: 0.05,
        }
    }
}

/// Churn from one [`ConstraintSet::update`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ConstraintUpdate {
    pub created: usize,
    pub refreshed: usize,
    pub removed: usize,
}

#[derive(Clone, Debug, Default)]
pub struct ConstraintSet {
    records: BTreeMap<PairKey, ConstraintRecord>,
    config: ConstraintConfig,
}

impl ConstraintSet {
    #[must_use]
    pub fn new(config: ConstraintConfig) -> Self {
        Self {
            records: BTreeMap::new(),
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> ConstraintConfig {
        self.config
    }

    pub fn set_config(&mut self, config: ConstraintConfig) {
        self.config = config;
    }

    pub fn get_or_create(&mut self, a: u32, b: u32) -> &mut ConstraintRecord {
        let key = PairKey::new(a, b);
        let (first, second) = key.decode();
        self.records
            .entry(key)
            .or_insert_with(|| ConstraintRecord::new(first, second))
    }

    #[must_use]
    pub fn contains(&self, a: u32, b: u32) -> bool {
        self.records.contains_key(&PairKey::new(a, b))
    }

    pub fn erase(&mut self, a: u32, b: u32) -> Option<ConstraintRecord> {
        self.records.remove(&PairKey::new(a, b))
    }

    #[must_use]
    pub fn get(&self, a: u32, b: u32) -> Option<&ConstraintRecord> {
        self.records.get(&PairKey::new(a, b))
    }

    pub fn get_mut(&mut self, a: u32, b: u32) -> Option<&mut ConstraintRecord> {
        self.records.get_mut(&PairKey::new(a, b))
    }

    /// Records in ascending key order.
    pub fn iter(&self) -> impl Iterator<Item = &ConstraintRecord> {
        self.records.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut ConstraintRecord> {
        self.records.values_mut()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Drops every record involving `index`. Returns how many went.
    pub fn erase_body(&mut self, index: u32) -> usize {
        let before = self.records.len();
        self.records
            .retain(|_, record| record.first != index && record.second != index);
        before - self.records.len()
    }

    /// Reconciles the records with this tick's contacts.
    ///
    /// Mirrored and sensor contacts are skipped. Records that received no
    /// contact are removed before returning.
    pub fn update<S: BodyStore + ?Sized>(
        &mut self,
        contacts: &[Contact],
        store: &S,
    ) -> ConstraintUpdate {
        let mut churn = ConstraintUpdate::default();
        for record in self.records.values_mut() {
            record.updated = false;
        }

        let match_distance = self.config.warm_start_match_distance;
        for contact in contacts.iter().filter(|c| !c.mirrored && !c.sensor) {
            let key = PairKey::new(contact.a, contact.b);
            let (first, second) = key.decode();
            let normal = if contact.a > contact.b {
                -contact.manifold.normal
            } else {
                contact.manifold.normal
            };

            let center_first = store.transform(first).map_or(Vec2::ZERO, |t| t.position);
            let center_second = store.transform(second).map_or(Vec2::ZERO, |t| t.position);
            let mut points = [ConstraintPoint::default(); MAX_MANIFOLD_POINTS];
            let count = contact.manifold.len();
            for (slot, p) in points.iter_mut().zip(contact.manifold.points()) {
                *slot = ConstraintPoint {
                    position: p.position,
                    depth: p.depth,
                    r_first: p.position - center_first,
                    r_second: p.position - center_second,
                    ..ConstraintPoint::default()
                };
            }

            let material_of =
                |index: u32| store.collider(index).map_or_else(Material::default, |c| c.material);
            let (material_first, material_second) = (material_of(first), material_of(second));

            let record = match self.records.entry(key) {
                Entry::Vacant(vacant) => {
                    churn.created += 1;
                    let record = vacant.insert(ConstraintRecord::new(first, second));
                    record.refresh(normal, contact.manifold.depth, &points[..count], 0.0);
                    record
                }
                Entry::Occupied(occupied) => {
                    let record = occupied.into_mut();
                    if !record.updated {
                        churn.refreshed += 1;
                    }
                    let depth = contact.manifold.depth;
                    record.refresh(normal, depth, &points[..count], match_distance);
                    record.state = ConstraintState::Active;
                    record
                }
            };
            record.friction = combine_friction(material_first.friction, material_second.friction);
            record.restitution =
                combine_elasticity(material_first.elasticity, material_second.elasticity);
            record.updated = true;
        }

        let before = self.records.len();
        self.records.retain(|_, record| record.updated);
        churn.removed = before - self.records.len();

        debug!(
            created = churn.created,
            refreshed = churn.refreshed,
            removed = churn.removed,
            live = self.records.len(),
            "constraint update"
        );
        churn
    }
}
