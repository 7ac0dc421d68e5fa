use std::{path::Path, sync::Arc};

use wgpu::{
    Device, Extent3d, ImageCopyTexture, ImageDataLayout, Origin3d, Queue, Texture, TextureAspect, TextureDescriptor,
    TextureDimension, TextureFormat, TextureUsages, TextureView, TextureViewDescriptor,
};

use crate::{managers::cache::ResourceCache, util::error_scope::DeviceErrorScope, util::typedefs::SsoString, EngineError};

/// How a cached texture will be used. Part of the cache key.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct TextureParams {
    pub usage: TextureUsages,
    /// Interpret the texels as sRGB encoded.
    pub srgb: bool,
}

impl Default for TextureParams {
    fn default() -> Self {
        Self {
            usage: TextureUsages::TEXTURE_BINDING,
            srgb: true,
        }
    }
}

/// Creates textures from files. Implemented by the GPU loader and by test doubles.
pub trait TextureLoader: Send + Sync {
    type Texture: Send + Sync;

    fn load_texture(&self, path: &str, params: TextureParams) -> Result<Self::Texture, EngineError>;
}

/// Texture uploaded to the GPU with a default view.
#[derive(Debug)]
pub struct GpuTexture {
    pub texture: Texture,
    pub view: TextureView,
    pub size: Extent3d,
}

/// Decodes images from disk with the `image` crate and uploads them.
pub struct WgpuTextureLoader {
    device: Arc<Device>,
    queue: Arc<Queue>,
}

impl WgpuTextureLoader {
    pub fn new(device: Arc<Device>, queue: Arc<Queue>) -> Self {
        Self { device, queue }
    }
}

/// Uploads tightly packed RGBA8 texels as a single mip texture.
pub fn create_rgba8_texture(
    device: &Device,
    queue: &Queue,
    label: &str,
    width: u32,
    height: u32,
    texels: &[u8],
    params: TextureParams,
) -> Result<GpuTexture, EngineError> {
    let size = Extent3d {
        width,
        height,
        depth_or_array_layers: 1,
    };
    let format = match params.srgb {
        true => TextureFormat::Rgba8UnormSrgb,
        false => TextureFormat::Rgba8Unorm,
    };

    let scope = DeviceErrorScope::new(device, "texture creation");
    let texture = device.create_texture(&TextureDescriptor {
        label: Some(label),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: TextureDimension::D2,
        format,
        usage: params.usage | TextureUsages::COPY_DST,
        view_formats: &[],
    });
    queue.write_texture(
        ImageCopyTexture {
            texture: &texture,
            mip_level: 0,
            origin: Origin3d::ZERO,
            aspect: TextureAspect::All,
        },
        texels,
        ImageDataLayout {
            offset: 0,
            bytes_per_row: Some(4 * width),
            rows_per_image: Some(height),
        },
        size,
    );
    scope.end()?;

    let view = texture.create_view(&TextureViewDescriptor::default());
    Ok(GpuTexture { texture, view, size })
}

impl TextureLoader for WgpuTextureLoader {
    type Texture = GpuTexture;

    fn load_texture(&self, path: &str, params: TextureParams) -> Result<GpuTexture, EngineError> {
        profiling::scope!("load_texture", path);

        let image = image::open(Path::new(path))
            .map_err(|source| match source {
                image::ImageError::IoError(source) => EngineError::io(path, source),
                source => EngineError::Image {
                    path: path.into(),
                    source,
                },
            })?
            .to_rgba8();
        let (width, height) = image.dimensions();
        log::debug!("Loaded texture {} ({}x{})", path, width, height);

        create_rgba8_texture(&self.device, &self.queue, path, width, height, image.as_raw(), params)
    }
}

/// Cache of textures keyed by file path and [`TextureParams`].
pub struct TextureManager<L: TextureLoader = WgpuTextureLoader> {
    loader: L,
    cache: ResourceCache<(SsoString, TextureParams), L::Texture>,
}

impl<L: TextureLoader> TextureManager<L> {
    pub fn new(loader: L) -> Self {
        Self {
            loader,
            cache: ResourceCache::new(),
        }
    }

    /// Returns the texture for `path`, loading it on first request.
    ///
    /// Concurrent first requests for the same key load the file once and share the result.
    pub fn get_texture(&self, path: &str, params: TextureParams) -> Result<Arc<L::Texture>, EngineError> {
        let key = (SsoString::from(path), params);
        self.cache
            .get_or_try_create(&key, || self.loader.load_texture(path, params))
    }

    pub fn loaded_count(&self) -> usize {
        self.cache.len()
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }
}
