//! # Scene Files
//!
//! A scene is a JSON document holding a [`WorldConfig`] and a list of
//! bodies. Each body names its role instead of spelling out components:
//!
//! ```json
//! {
//!   "config": { "solver": { "iterations": 10 } },
//!   "bodies": [
//!     {
//!       "role": "static",
//!       "collider": { "shape": { "kind": { "type": "rect", "half_extents": [10.0, 1.0] } } },
//!       "position": [0.0, -1.0]
//!     },
//!     {
//!       "role": "dynamic",
//!       "collider": { "shape": { "kind": { "type": "circle", "radius": 0.5 } } },
//!       "position": [0.0, 3.0]
//!     }
//!   ]
//! }
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use contact2d::{
    BodyDesc, Collider, Handle, Mass, Movement, PhysicsWorld, Transform, Vec2, WorldConfig,
};
use serde::{Deserialize, Serialize};

/// How a body takes part in the simulation.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BodyRole {
    #[default]
    Dynamic,
    Static,
    Sensor,
    Particle,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SceneBody {
    #[serde(default)]
    pub role: BodyRole,
    pub collider: Collider,
    #[serde(default)]
    pub position: Vec2,
    #[serde(default)]
    pub rotation: f32,
    #[serde(default)]
    pub velocity: Vec2,
    #[serde(default)]
    pub angular_velocity: f32,
    /// Total mass of a dynamic body; defaults to what the material density gives.
    #[serde(default)]
    pub mass: Option<f32>,
    #[serde(default)]
    pub sleeping: bool,
}

impl SceneBody {
    /// Component set matching the role.
    #[must_use]
    pub fn to_desc(&self) -> BodyDesc {
        let transform = Transform::new(self.position, self.rotation);
        let desc = BodyDesc::new(transform, self.collider.clone());
        let movement = Movement {
            velocity: self.velocity,
            angular_velocity: self.angular_velocity,
            sleeping: self.sleeping,
        };
        match self.role {
            BodyRole::Dynamic => {
                let mass = match self.mass {
                    Some(total) => Mass::with_total_mass(&self.collider, total),
                    None => Mass::from_collider(&self.collider),
                };
                desc.with_mass(mass).with_movement(movement)
            }
            BodyRole::Static => desc.with_mass(Mass::infinite()),
            BodyRole::Sensor => desc,
            BodyRole::Particle => desc.with_movement(movement),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    #[serde(default)]
    pub config: WorldConfig,
    #[serde(default)]
    pub bodies: Vec<SceneBody>,
}

impl Scene {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading scene {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("parsing scene {}", path.display()))
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Builds a world holding every body, in file order.
    pub fn build(&self) -> Result<(PhysicsWorld, Vec<Handle>)> {
        let mut world = PhysicsWorld::new(self.config.clone());
        let handles = self
            .bodies
            .iter()
            .enumerate()
            .map(|(i, body)| world.spawn(body.to_desc()).with_context(|| format!("body #{i}")))
            .collect::<Result<Vec<_>>>()?;
        Ok((world, handles))
    }
}

/// Built-in scene used when no file is given: a floor, a ramp and a small
/// mixed pile.
#[must_use]
pub fn default_scene() -> Scene {
    use contact2d::Shape;

    let fixed = |shape: Shape, position: Vec2, rotation: f32| SceneBody {
        role: BodyRole::Static,
        collider: Collider::new(shape),
        position,
        rotation,
        velocity: Vec2::ZERO,
        angular_velocity: 0.0,
        mass: None,
        sleeping: false,
    };
    let mut bodies = vec![
        fixed(Shape::rect(40.0, 2.0), Vec2::new(0.0, -1.0), 0.0),
        fixed(Shape::rect(8.0, 0.5), Vec2::new(-9.0, 4.0), -0.3),
    ];
    for i in 0..24 {
        let shape = if i % 2 == 0 { Shape::circle(0.4) } else { Shape::rect(0.8, 0.8) };
        bodies.push(SceneBody {
            role: BodyRole::Dynamic,
            ..fixed(shape, Vec2::new((i % 6) as f32 - 2.5, 2.0 + (i / 6) as f32 * 1.2), 0.0)
        });
    }
    bodies.push(SceneBody {
        role: BodyRole::Sensor,
        ..fixed(Shape::rect(4.0, 1.0), Vec2::new(0.0, 0.5), 0.0)
    });
    Scene {
        config: WorldConfig::default(),
        bodies,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contact2d::BodyCategory;

    #[test]
    fn roles_map_to_categories() -> Result<()> {
        let scene = Scene::from_json(
            r#"{
                "bodies": [
                    {
                        "role": "static",
                        "collider": {
                            "shape": { "kind": { "type": "rect", "half_extents": [5.0, 1.0] } }
                        },
                        "position": [0.0, -1.0]
                    },
                    {
                        "collider": { "shape": { "kind": { "type": "circle", "radius": 0.5 } } },
                        "position": [0.0, 2.0],
                        "mass": 3.0
                    },
                    {
                        "role": "sensor",
                        "collider": { "shape": { "kind": { "type": "circle", "radius": 1.0 } } },
                        "position": [4.0, 0.0]
                    },
                    {
                        "role": "particle",
                        "collider": { "shape": { "kind": { "type": "circle", "radius": 0.1 } } },
                        "position": [-4.0, 2.0]
                    }
                ]
            }"#,
        )?;
        let (mut world, handles) = scene.build()?;
        world.step(1.0 / 60.0)?;

        let categories = handles
            .iter()
            .map(|h| world.category(*h))
            .collect::<Result<Vec<_>, _>>()?;
        assert_eq!(
            categories,
            vec![
                Some(BodyCategory::Static),
                Some(BodyCategory::Dynamic),
                Some(BodyCategory::Sensor),
                Some(BodyCategory::Particle),
            ]
        );
        assert_eq!(world.bodies().mass_of(handles[1])?.map(|m| m.mass), Some(3.0));
        Ok(())
    }

    #[test]
    fn bad_body_names_its_index() {
        let scene = Scene::from_json(
            r#"{
                "bodies": [
                    { "collider": { "shape": { "kind": { "type": "circle", "radius": -1.0 } } } }
                ]
            }"#,
        )
        .unwrap();
        let err = scene.build().unwrap_err();
        assert!(format!("{err:#}").contains("body #0"));
    }

    #[test]
    fn default_scene_builds() -> Result<()> {
        let (mut world, handles) = default_scene().build()?;
        assert_eq!(handles.len(), 27);
        world.run(1.0 / 60.0, 10)?;
        Ok(())
    }
}
