//! Type declarations for the halfling deferred rendering engine.
//!
//! Everything in here is plain data: no GPU resources are created by this crate.

/// Reexport of the glam version halfling is using.
pub use glam;

mod light;
mod material;
mod vertex;

pub use light::*;
pub use material::*;
pub use vertex::*;
