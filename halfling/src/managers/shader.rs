use std::{borrow::Cow, fs, sync::Arc};

use wgpu::{Device, ShaderModule, ShaderModuleDescriptor, ShaderSource};

use crate::{managers::cache::ResourceCache, util::error_scope::DeviceErrorScope, util::typedefs::SsoString, EngineError};

/// Creates shader modules from files.
pub trait ShaderLoader: Send + Sync {
    type Shader: Send + Sync;

    fn load_shader(&self, path: &str) -> Result<Self::Shader, EngineError>;
}

/// Reads WGSL source from disk and compiles it on the device.
pub struct WgpuShaderLoader {
    device: Arc<Device>,
}

impl WgpuShaderLoader {
    pub fn new(device: Arc<Device>) -> Self {
        Self { device }
    }
}

impl ShaderLoader for WgpuShaderLoader {
    type Shader = ShaderModule;

    fn load_shader(&self, path: &str) -> Result<ShaderModule, EngineError> {
        profiling::scope!("load_shader", path);

        let source = fs::read_to_string(path).map_err(|e| EngineError::io(path, e))?;

        let scope = DeviceErrorScope::new(&self.device, "shader module creation");
        let module = self.device.create_shader_module(ShaderModuleDescriptor {
            label: Some(path),
            source: ShaderSource::Wgsl(Cow::Owned(source)),
        });
        scope.end()?;

        log::debug!("Compiled shader {}", path);
        Ok(module)
    }
}

/// Cache of shader modules keyed by file path.
pub struct ShaderManager<L: ShaderLoader = WgpuShaderLoader> {
    loader: L,
    cache: ResourceCache<SsoString, L::Shader>,
}

impl<L: ShaderLoader> ShaderManager<L> {
    pub fn new(loader: L) -> Self {
        Self {
            loader,
            cache: ResourceCache::new(),
        }
    }

    pub fn get_shader(&self, path: &str) -> Result<Arc<L::Shader>, EngineError> {
        self.cache
            .get_or_try_create(&SsoString::from(path), || self.loader.load_shader(path))
    }

    pub fn loaded_count(&self) -> usize {
        self.cache.len()
    }
}
