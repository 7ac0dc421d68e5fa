//! Long lived engine state: resource caches and the scene's lights.

pub mod cache;
pub mod light;
pub mod material;
pub mod model;
pub mod shader;
pub mod texture;

pub use cache::ResourceCache;
pub use light::{pack_lights, LightManager};
pub use material::{Material, MaterialResources, MaterialTexture, SamplerStates, TextureFlags};
pub use model::{ModelLoader, ModelManager, WgpuModelLoader};
pub use shader::{ShaderLoader, ShaderManager, WgpuShaderLoader};
pub use texture::{GpuTexture, TextureLoader, TextureManager, TextureParams, WgpuTextureLoader};
