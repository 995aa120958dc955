//! # contact2d runtime
//!
//! Headless driver for the `contact2d` pipeline. Loads a JSON [`scene`],
//! steps a [`contact2d::PhysicsWorld`] through [`app::run`] and, with
//! `--watch`, hot-reloads the scene's configuration through [`watcher`].

pub mod app;
pub mod scene;
pub mod watcher;
