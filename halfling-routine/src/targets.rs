use wgpu::{
    Device, Extent3d, Texture, TextureDescriptor, TextureDimension, TextureFormat, TextureUsages, TextureView,
    TextureViewDescriptor,
};

pub const ALBEDO_FORMAT: TextureFormat = TextureFormat::Rgba8Unorm;
/// World space normals, unencoded.
pub const NORMAL_FORMAT: TextureFormat = TextureFormat::Rgba16Float;
/// Specular intensity in red, roughness in green.
pub const MATERIAL_FORMAT: TextureFormat = TextureFormat::Rgba8Unorm;
pub const DEPTH_FORMAT: TextureFormat = TextureFormat::Depth32Float;
pub const HDR_FORMAT: TextureFormat = TextureFormat::Rgba16Float;

pub struct RenderTarget {
    pub texture: Texture,
    pub view: TextureView,
}

impl RenderTarget {
    fn new(device: &Device, label: &str, width: u32, height: u32, format: TextureFormat, usage: TextureUsages) -> Self {
        let texture = device.create_texture(&TextureDescriptor {
            label: Some(label),
            size: Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: TextureDimension::D2,
            format,
            usage,
            view_formats: &[],
        });
        let view = texture.create_view(&TextureViewDescriptor::default());
        Self { texture, view }
    }
}

/// The G-Buffer plus the HDR target the gather pass writes.
///
/// Recreated whenever the output resolution changes.
pub struct RenderTargets {
    pub albedo: RenderTarget,
    pub normal: RenderTarget,
    pub material: RenderTarget,
    pub depth: RenderTarget,
    pub hdr: RenderTarget,
    width: u32,
    height: u32,
}

impl RenderTargets {
    pub fn new(device: &Device, width: u32, height: u32) -> Self {
        profiling::scope!("RenderTargets::new");

        let width = width.max(1);
        let height = height.max(1);
        let gbuffer_usage = TextureUsages::RENDER_ATTACHMENT | TextureUsages::TEXTURE_BINDING;

        Self {
            albedo: RenderTarget::new(device, "gbuffer albedo", width, height, ALBEDO_FORMAT, gbuffer_usage),
            normal: RenderTarget::new(device, "gbuffer normal", width, height, NORMAL_FORMAT, gbuffer_usage),
            material: RenderTarget::new(device, "gbuffer material", width, height, MATERIAL_FORMAT, gbuffer_usage),
            depth: RenderTarget::new(device, "gbuffer depth", width, height, DEPTH_FORMAT, gbuffer_usage),
            hdr: RenderTarget::new(
                device,
                "hdr",
                width,
                height,
                HDR_FORMAT,
                gbuffer_usage | TextureUsages::STORAGE_BINDING,
            ),
            width,
            height,
        }
    }

    pub fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}
