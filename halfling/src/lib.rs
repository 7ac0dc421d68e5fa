//! Core of the Halfling deferred renderer.
//!
//! Owns everything that is not a render pass: lights and their GPU buffers, the
//! clustered light assignment, resource caches for textures, shaders and models,
//! and the background scene loader. The passes themselves live in `halfling-routine`.

pub mod camera;
pub mod cluster;
mod error;
pub mod geometry;
pub mod managers;
pub mod model;
pub mod scene;
mod setup;
pub mod util;

pub use error::*;
pub use setup::*;

/// Reexport of the halfling-types crate, with glam.
pub use halfling_types as types;
pub use halfling_types::glam;
