//! Deferred render routine for Halfling.
//!
//! Fills a G-Buffer, gathers lights into an HDR target either through clustered
//! light lists or by brute force, then tonemaps into the swapchain.

mod base;
pub mod gather;
pub mod gbuffer;
pub mod shaders;
pub mod targets;
pub mod tonemapping;
pub mod uniforms;

pub use base::*;
pub use gather::ShadingMode;
pub use uniforms::CameraData;
