#![deny(clippy::all, clippy::pedantic)]
#![allow(
    clippy::module_name_repetitions,
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::missing_errors_doc,
    clippy::must_use_candidate,
    clippy::similar_names,
    clippy::float_cmp
)]
//! # contact2d
//!
//! Contact detection and resolution for 2D circles and oriented rectangles.
//!
//! Each tick runs a fixed pipeline over the bodies of an entity store:
//! bodies are classified into categories, their bounds are cached and
//! indexed in one quadtree per category, candidate pairs are tested exactly,
//! the resulting contacts refresh a persistent constraint set, and a
//! sequential impulse solver resolves them with warm starting.
//!
//! ## Key Components
//!
//! -   **Store:** [`BodyStore`] is the interface the pipeline reads bodies
//!     through; [`BodySet`] is the in-crate implementation.
//! -   **Narrow phase:** exact tests live in [`collision`]; every normal
//!     points from body B toward body A.
//! -   **Spatial index:** [`spatial::SpatialIndex`] is an arena quadtree.
//! -   **Collision system:** [`CollisionSystem`] produces the flat contact
//!     list and per-body [`ContactToken`]s.
//! -   **Constraints and solver:** [`ConstraintSet`] persists per-pair
//!     impulses; [`Solver`] resolves them.
//! -   **World:** [`PhysicsWorld`] wires the stages together.
//!
//! ## Usage
//!
//! ```rust
//! use contact2d::{PhysicsWorld, Vec2};
//!
//! let mut world = PhysicsWorld::default();
//! world.add_static_rect(Vec2::new(0.0, -1.0), 20.0, 2.0, 0.0)?;
//! let ball = world.add_circle(Vec2::new(0.0, 2.0), Vec2::ZERO, 0.5)?;
//!
//! world.run(1.0 / 60.0, 120)?;
//! assert!(world.transform(ball)?.position.y > 0.0);
//! # Ok::<(), contact2d::PhysicsError>(())
//! ```

pub mod body;
pub mod builder;
pub mod collision;
pub mod constraint;
pub mod error;
pub mod geometry;
pub mod integrator;
pub mod simulation;
pub mod solver;
pub mod spatial;
pub mod store;
pub mod types;

pub use body::{BodyDesc, Collider, Mass, Movement, Transform};
pub use collision::{
    classify, CollisionConfig, CollisionStats, CollisionSystem, Contact, ContactPoint, ContactToken,
    DebugShape, DebugShapeKind, Manifold, ProbeHit,
};
pub use constraint::{
    ConstraintConfig, ConstraintRecord, ConstraintSet, ConstraintState, ConstraintUpdate, PairKey,
};
pub use error::PhysicsError;
pub use geometry::{BodyGeometry, ShapeView};
pub use simulation::{DebugInfo, PhaseTimings, PhysicsWorld, TickReport, WorldConfig};
pub use solver::{SolveStats, Solver, SolverConfig};
pub use spatial::{IndexConfig, SpatialIndex, SpatialIndexSet};
pub use store::{BodySet, BodyStore, ComponentKind, Handle, Storage};
pub use types::{Aabb, BodyCategory, CategoryMask, Material, Shape, ShapeKind, Vec2};
