//! # Entity store interface
//!
//! The collision system and solver read bodies through [`BodyStore`], which
//! mirrors what an entity/component engine offers: presence tests, component
//! fetches by index, iteration over live slots and generation checks.
//! [`BodySet`] is the in-crate implementation used by [`crate::PhysicsWorld`]
//! and the tests.
//!
//! Component columns are a [`Storage`] variant picked per component type, so
//! the hot loops match on a tag instead of calling through a vtable.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::body::{BodyDesc, Collider, Mass, Movement, Transform};
use crate::error::PhysicsError;

/// Generational reference to a body slot.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Handle {
    pub index: u32,
    pub generation: u32,
}

impl Handle {
    #[must_use]
    pub const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    pub(crate) fn invalid(self) -> PhysicsError {
        PhysicsError::InvalidHandle {
            index: self.index,
            generation: self.generation,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComponentKind {
    Transform,
    Collider,
    Mass,
    Movement,
}

/// Read/write access the physics core needs from the entity store.
pub trait BodyStore {
    /// Exclusive upper bound of slot indices, live or not.
    fn capacity(&self) -> usize;

    /// Current handle of a live slot.
    fn handle_at(&self, index: u32) -> Option<Handle>;

    fn transform(&self, index: u32) -> Option<&Transform>;
    fn collider(&self, index: u32) -> Option<&Collider>;
    fn mass(&self, index: u32) -> Option<&Mass>;
    fn movement(&self, index: u32) -> Option<&Movement>;

    fn transform_mut(&mut self, index: u32) -> Option<&mut Transform>;
    fn movement_mut(&mut self, index: u32) -> Option<&mut Movement>;

    fn is_alive(&self, handle: Handle) -> bool {
        self.handle_at(handle.index) == Some(handle)
    }

    /// Checks liveness and generation, returning the slot index.
    fn resolve(&self, handle: Handle) -> Result<u32, PhysicsError> {
        if self.is_alive(handle) {
            Ok(handle.index)
        } else {
            Err(handle.invalid())
        }
    }

    fn has(&self, index: u32, kind: ComponentKind) -> bool {
        if self.handle_at(index).is_none() {
            return false;
        }
        match kind {
            ComponentKind::Transform => self.transform(index).is_some(),
            ComponentKind::Collider => self.collider(index).is_some(),
            ComponentKind::Mass => self.mass(index).is_some(),
            ComponentKind::Movement => self.movement(index).is_some(),
        }
    }
}

/// Column storage for one component type.
#[derive(Clone, Debug)]
pub enum Storage<T> {
    /// One slot per body index; best for components most bodies carry.
    Dense(Vec<Option<T>>),
    /// Ordered map; best for rare components.
    Sparse(BTreeMap<u32, T>),
}

impl<T> Storage<T> {
    #[must_use]
    pub const fn dense() -> Self {
        Self::Dense(Vec::new())
    }

    #[must_use]
    pub const fn sparse() -> Self {
        Self::Sparse(BTreeMap::new())
    }

    #[inline]
    #[must_use]
    pub fn get(&self, index: u32) -> Option<&T> {
        match self {
            Self::Dense(slots) => slots.get(index as usize).and_then(Option::as_ref),
            Self::Sparse(map) => map.get(&index),
        }
    }

    #[inline]
    pub fn get_mut(&mut self, index: u32) -> Option<&mut T> {
        match self {
            Self::Dense(slots) => slots.get_mut(index as usize).and_then(Option::as_mut),
            Self::Sparse(map) => map.get_mut(&index),
        }
    }

    pub fn insert(&mut self, index: u32, value: T) -> Option<T> {
        match self {
            Self::Dense(slots) => {
                let i = index as usize;
                if slots.len() <= i {
                    slots.resize_with(i + 1, || None);
                }
                slots[i].replace(value)
            }
            Self::Sparse(map) => map.insert(index, value),
        }
    }

    pub fn remove(&mut self, index: u32) -> Option<T> {
        match self {
            Self::Dense(slots) => slots.get_mut(index as usize).and_then(Option::take),
            Self::Sparse(map) => map.remove(&index),
        }
    }

    pub fn set(&mut self, index: u32, value: Option<T>) {
        match value {
            Some(v) => {
                self.insert(index, v);
            }
            None => {
                self.remove(index);
            }
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Dense(slots) => slots.iter().filter(|s| s.is_some()).count(),
            Self::Sparse(map) => map.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Generational body storage with per-component columns.
#[derive(Clone, Debug)]
pub struct BodySet {
    generations: Vec<u32>,
    alive: Vec<bool>,
    free: Vec<u32>,
    transforms: Storage<Transform>,
    colliders: Storage<Collider>,
    masses: Storage<Mass>,
    movements: Storage<Movement>,
}

impl Default for BodySet {
    fn default() -> Self {
        Self::new()
    }
}

impl BodySet {
    /// All columns dense.
    #[must_use]
    pub fn new() -> Self {
        Self {
            generations: Vec::new(),
            alive: Vec::new(),
            free: Vec::new(),
            transforms: Storage::dense(),
            colliders: Storage::dense(),
            masses: Storage::dense(),
            movements: Storage::dense(),
        }
    }

    /// Stores the listed component kinds in sparse columns.
    #[must_use]
    pub fn with_sparse(kinds: &[ComponentKind]) -> Self {
        let mut set = Self::new();
        for kind in kinds {
            match kind {
                ComponentKind::Transform => set.transforms = Storage::sparse(),
                ComponentKind::Collider => set.colliders = Storage::sparse(),
                ComponentKind::Mass => set.masses = Storage::sparse(),
                ComponentKind::Movement => set.movements = Storage::sparse(),
            }
        }
        set
    }

    /// Validates the collider and inserts a body, reusing a freed slot if any.
    pub fn spawn(&mut self, desc: BodyDesc) -> Result<Handle, PhysicsError> {
        for shape in desc.collider.shapes() {
            shape.validate()?;
        }
        if !desc.transform.position.is_finite() || !desc.transform.rotation.is_finite() {
            return Err(PhysicsError::InvalidShape("transform must be finite"));
        }

        let index = if let Some(index) = self.free.pop() {
            index
        } else {
            let index = u32::try_from(self.generations.len())
                .map_err(|_| PhysicsError::InvalidShape("body store is full"))?;
            self.generations.push(0);
            self.alive.push(false);
            index
        };
        let i = index as usize;
        self.alive[i] = true;

        self.transforms.insert(index, desc.transform);
        self.colliders.insert(index, desc.collider);
        self.masses.set(index, desc.mass);
        self.movements.set(index, desc.movement);

        Ok(Handle::new(index, self.generations[i]))
    }

    /// Removes a body; its slot's generation is bumped so old handles go stale.
    pub fn despawn(&mut self, handle: Handle) -> Result<(), PhysicsError> {
        let index = self.resolve(handle)?;
        let i = index as usize;
        self.alive[i] = false;
        self.generations[i] = self.generations[i].wrapping_add(1);
        self.transforms.remove(index);
        self.colliders.remove(index);
        self.masses.remove(index);
        self.movements.remove(index);
        self.free.push(index);
        Ok(())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.alive.iter().filter(|a| **a).count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Live handles in ascending index order.
    pub fn handles(&self) -> impl Iterator<Item = Handle> + '_ {
        self.alive
            .iter()
            .enumerate()
            .filter(|(_, alive)| **alive)
            .map(|(i, _)| Handle::new(i as u32, self.generations[i]))
    }

    pub fn transform_of(&self, handle: Handle) -> Result<&Transform, PhysicsError> {
        let index = self.resolve(handle)?;
        self.transforms
            .get(index)
            .ok_or(PhysicsError::MissingComponent { index, component: ComponentKind::Transform })
    }

    pub fn transform_of_mut(&mut self, handle: Handle) -> Result<&mut Transform, PhysicsError> {
        let index = self.resolve(handle)?;
        self.transforms
            .get_mut(index)
            .ok_or(PhysicsError::MissingComponent { index, component: ComponentKind::Transform })
    }

    pub fn collider_of(&self, handle: Handle) -> Result<&Collider, PhysicsError> {
        let index = self.resolve(handle)?;
        self.colliders
            .get(index)
            .ok_or(PhysicsError::MissingComponent { index, component: ComponentKind::Collider })
    }

    pub fn movement_of(&self, handle: Handle) -> Result<&Movement, PhysicsError> {
        let index = self.resolve(handle)?;
        self.movements
            .get(index)
            .ok_or(PhysicsError::MissingComponent { index, component: ComponentKind::Movement })
    }

    pub fn movement_of_mut(&mut self, handle: Handle) -> Result<&mut Movement, PhysicsError> {
        let index = self.resolve(handle)?;
        self.movements
            .get_mut(index)
            .ok_or(PhysicsError::MissingComponent { index, component: ComponentKind::Movement })
    }

    pub fn mass_of(&self, handle: Handle) -> Result<Option<&Mass>, PhysicsError> {
        let index = self.resolve(handle)?;
        Ok(self.masses.get(index))
    }

    /// Adds or removes the physics-mass component, which changes the body's
    /// category on the next tick.
    pub fn set_mass(&mut self, handle: Handle, mass: Option<Mass>) -> Result<(), PhysicsError> {
        let index = self.resolve(handle)?;
        self.masses.set(index, mass);
        Ok(())
    }

    /// Adds or removes the movement component.
    pub fn set_movement(
        &mut self,
        handle: Handle,
        movement: Option<Movement>,
    ) -> Result<(), PhysicsError> {
        let index = self.resolve(handle)?;
        self.movements.set(index, movement);
        Ok(())
    }
}

impl BodyStore for BodySet {
    fn capacity(&self) -> usize {
        self.generations.len()
    }

    fn handle_at(&self, index: u32) -> Option<Handle> {
        let i = index as usize;
        match self.alive.get(i) {
            Some(true) => Some(Handle::new(index, self.generations[i])),
            _ => None,
        }
    }

    fn transform(&self, index: u32) -> Option<&Transform> {
        self.transforms.get(index)
    }

    fn collider(&self, index: u32) -> Option<&Collider> {
        self.colliders.get(index)
    }

    fn mass(&self, index: u32) -> Option<&Mass> {
        self.masses.get(index)
    }

    fn movement(&self, index: u32) -> Option<&Movement> {
        self.movements.get(index)
    }

    fn transform_mut(&mut self, index: u32) -> Option<&mut Transform> {
        self.transforms.get_mut(index)
    }

    fn movement_mut(&mut self, index: u32) -> Option<&mut Movement> {
        self.movements.get_mut(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Shape, Vec2};

    fn circle_at(x: f32) -> BodyDesc {
        let transform = Transform::from_position(Vec2::new(x, 0.0));
        BodyDesc::new(transform, Collider::new(Shape::circle(0.5)))
    }

    #[test]
    fn despawn_invalidates_handle_and_reuses_slot() {
        let mut set = BodySet::new();
        let a = set.spawn(circle_at(0.0)).unwrap();
        set.despawn(a).unwrap();
        assert!(!set.is_alive(a));
        assert_eq!(
            set.despawn(a),
            Err(PhysicsError::InvalidHandle { index: a.index, generation: a.generation })
        );

        let b = set.spawn(circle_at(1.0)).unwrap();
        assert_eq!(b.index, a.index);
        assert_ne!(b.generation, a.generation);
        assert!(set.transform_of(a).is_err());
        assert_eq!(set.transform_of(b).unwrap().position.x, 1.0);
    }

    #[test]
    fn sparse_and_dense_columns_agree() {
        let mut dense = BodySet::new();
        let mut sparse = BodySet::with_sparse(&[ComponentKind::Mass, ComponentKind::Movement]);
        for set in [&mut dense, &mut sparse] {
            let h = set.spawn(circle_at(0.0).with_mass(Mass::new(2.0, 1.0))).unwrap();
            assert!(set.has(h.index, ComponentKind::Mass));
            assert!(!set.has(h.index, ComponentKind::Movement));
            set.set_movement(h, Some(Movement::default())).unwrap();
            assert!(set.has(h.index, ComponentKind::Movement));
        }
    }

    #[test]
    fn spawn_rejects_bad_shapes() {
        let mut set = BodySet::new();
        let desc = BodyDesc::new(Transform::default(), Collider::new(Shape::circle(-1.0)));
        assert!(matches!(set.spawn(desc), Err(PhysicsError::InvalidShape(_))));
        assert!(set.is_empty());
    }
}
