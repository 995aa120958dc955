use thiserror::Error;

use crate::store::ComponentKind;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PhysicsError {
    /// The handle's slot is dead or was reused by a newer body.
    #[error("invalid or stale body handle (index {index}, generation {generation})")]
    InvalidHandle { index: u32, generation: u32 },
    #[error("invalid shape: {0}")]
    InvalidShape(&'static str),
    #[error("time step must be finite and positive, got {0}")]
    InvalidTimeStep(f32),
    #[error("body {index} has no {component:?} component")]
    MissingComponent { index: u32, component: ComponentKind },
}
