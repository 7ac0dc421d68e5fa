use std::{num::NonZeroU64, sync::Arc};

use bitflags::bitflags;
use bytemuck::{Pod, Zeroable};
use halfling_types::TextureSampler;
use wgpu::{
    util::{BufferInitDescriptor, DeviceExt},
    AddressMode, BindGroup, BindGroupLayout, BindingType, Buffer, BufferUsages, Device, FilterMode, Features, Queue,
    Sampler, SamplerBindingType, SamplerBorderColor, SamplerDescriptor, ShaderModule, ShaderStages, TextureSampleType,
    TextureUsages, TextureViewDimension,
};

use crate::{
    managers::texture::{create_rgba8_texture, GpuTexture, TextureParams},
    util::{
        bind_merge::{BindGroupBuilder, BindGroupLayoutBuilder},
        error_scope::DeviceErrorScope,
    },
    EngineError,
};

/// Texture slots a material can fill, in binding order.
pub const MAX_MATERIAL_TEXTURES: usize = 4;

bitflags! {
    /// Which material texture slots hold a real texture. Slot `i` is bit `1 << i`.
    #[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
    pub struct TextureFlags: u32 {
        const ALBEDO = 0x1;
        const SPECULAR = 0x2;
        const ROUGHNESS = 0x4;
        const NORMAL = 0x8;
    }
}

impl TextureFlags {
    pub fn from_slot_count(count: usize) -> Self {
        Self::from_bits_truncate((1_u32 << count.min(MAX_MATERIAL_TEXTURES)) - 1)
    }
}

#[derive(Debug, Default, Copy, Clone, Pod, Zeroable)]
#[repr(C)]
struct MaterialUniforms {
    texture_flags: u32,
    _padding: [u32; 3],
}

/// One sampler state per [`TextureSampler`].
pub struct SamplerStates {
    samplers: [Sampler; 6],
}

impl SamplerStates {
    pub fn new(device: &Device) -> Self {
        profiling::scope!("SamplerStates::new");

        let border = match device.features().contains(Features::ADDRESS_MODE_CLAMP_TO_BORDER) {
            true => AddressMode::ClampToBorder,
            false => {
                log::warn!("Device lacks clamp-to-border addressing, LinearBorder falls back to clamp-to-edge");
                AddressMode::ClampToEdge
            }
        };

        let samplers = TextureSampler::ALL.map(|kind| {
            let (address, filter, anisotropy) = match kind {
                TextureSampler::LinearClamp => (AddressMode::ClampToEdge, FilterMode::Linear, 1),
                TextureSampler::LinearBorder => (border, FilterMode::Linear, 1),
                TextureSampler::LinearWrap => (AddressMode::Repeat, FilterMode::Linear, 1),
                TextureSampler::PointClamp => (AddressMode::ClampToEdge, FilterMode::Nearest, 1),
                TextureSampler::PointWrap => (AddressMode::Repeat, FilterMode::Nearest, 1),
                TextureSampler::AnisotropicWrap => (AddressMode::Repeat, FilterMode::Linear, 16),
            };
            create_sampler(device, kind, address, filter, anisotropy)
        });

        Self { samplers }
    }

    pub fn get(&self, kind: TextureSampler) -> &Sampler {
        &self.samplers[kind as usize - 1]
    }
}

fn create_sampler(device: &Device, kind: TextureSampler, address: AddressMode, filter: FilterMode, anisotropy: u16) -> Sampler {
    device.create_sampler(&SamplerDescriptor {
        label: Some(match kind {
            TextureSampler::LinearClamp => "linear clamp",
            TextureSampler::LinearBorder => "linear border",
            TextureSampler::LinearWrap => "linear wrap",
            TextureSampler::PointClamp => "point clamp",
            TextureSampler::PointWrap => "point wrap",
            TextureSampler::AnisotropicWrap => "anisotropic wrap",
        }),
        address_mode_u: address,
        address_mode_v: address,
        address_mode_w: address,
        mag_filter: filter,
        min_filter: filter,
        mipmap_filter: filter,
        lod_min_clamp: 0.0,
        lod_max_clamp: 100.0,
        compare: None,
        anisotropy_clamp: anisotropy,
        border_color: match address {
            AddressMode::ClampToBorder => Some(SamplerBorderColor::TransparentBlack),
            _ => None,
        },
    })
}

/// A texture bound into a material slot.
#[derive(Debug, Clone)]
pub struct MaterialTexture {
    pub texture: Arc<GpuTexture>,
    pub sampler: TextureSampler,
}

/// GPU side material: optional custom shader plus its bound textures.
pub struct Material {
    pub shader: Option<Arc<ShaderModule>>,
    pub textures: Vec<MaterialTexture>,
    pub texture_flags: TextureFlags,
    _uniforms: Buffer,
    pub bind_group: BindGroup,
}

/// Layout, samplers and fallback texture shared by every material.
pub struct MaterialResources {
    pub layout: BindGroupLayout,
    pub samplers: SamplerStates,
    fallback: GpuTexture,
}

impl MaterialResources {
    pub fn new(device: &Device, queue: &Queue) -> Result<Self, EngineError> {
        profiling::scope!("MaterialResources::new");

        let mut bglb = BindGroupLayoutBuilder::new();
        bglb.append_uniform(
            ShaderStages::FRAGMENT,
            false,
            NonZeroU64::new(std::mem::size_of::<MaterialUniforms>() as u64),
        );
        for _ in 0..MAX_MATERIAL_TEXTURES {
            bglb.append(
                ShaderStages::FRAGMENT,
                BindingType::Texture {
                    sample_type: TextureSampleType::Float { filterable: true },
                    view_dimension: TextureViewDimension::D2,
                    multisampled: false,
                },
                None,
            );
        }
        for _ in 0..MAX_MATERIAL_TEXTURES {
            bglb.append(ShaderStages::FRAGMENT, BindingType::Sampler(SamplerBindingType::Filtering), None);
        }
        let layout = bglb.build(device, Some("material bgl"));

        let fallback = create_rgba8_texture(
            device,
            queue,
            "fallback white",
            1,
            1,
            &[255; 4],
            TextureParams {
                usage: TextureUsages::TEXTURE_BINDING,
                srgb: false,
            },
        )?;

        Ok(Self {
            layout,
            samplers: SamplerStates::new(device),
            fallback,
        })
    }

    /// Creates a material. Textures past [`MAX_MATERIAL_TEXTURES`] are dropped with a warning.
    pub fn create_material(
        &self,
        device: &Device,
        shader: Option<Arc<ShaderModule>>,
        mut textures: Vec<MaterialTexture>,
    ) -> Result<Material, EngineError> {
        if textures.len() > MAX_MATERIAL_TEXTURES {
            log::warn!(
                "Material has {} textures, only the first {} are bound",
                textures.len(),
                MAX_MATERIAL_TEXTURES
            );
            textures.truncate(MAX_MATERIAL_TEXTURES);
        }
        let texture_flags = TextureFlags::from_slot_count(textures.len());

        let scope = DeviceErrorScope::new(device, "material creation");
        let uniforms = device.create_buffer_init(&BufferInitDescriptor {
            label: Some("material uniforms"),
            contents: bytemuck::bytes_of(&MaterialUniforms {
                texture_flags: texture_flags.bits(),
                _padding: [0; 3],
            }),
            usage: BufferUsages::UNIFORM,
        });

        let mut bgb = BindGroupBuilder::new();
        bgb.append_buffer(&uniforms);
        for slot in 0..MAX_MATERIAL_TEXTURES {
            match textures.get(slot) {
                Some(t) => bgb.append_texture_view(&t.texture.view),
                None => bgb.append_texture_view(&self.fallback.view),
            };
        }
        for slot in 0..MAX_MATERIAL_TEXTURES {
            let kind = textures.get(slot).map_or(TextureSampler::LinearWrap, |t| t.sampler);
            bgb.append_sampler(self.samplers.get(kind));
        }
        let bind_group = bgb.build(device, Some("material bg"), &self.layout);
        scope.end()?;

        Ok(Material {
            shader,
            textures,
            texture_flags,
            _uniforms: uniforms,
            bind_group,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::TextureFlags;

    #[test]
    fn slot_flags() {
        assert_eq!(TextureFlags::from_slot_count(0), TextureFlags::empty());
        assert_eq!(TextureFlags::from_slot_count(2), TextureFlags::ALBEDO | TextureFlags::SPECULAR);
        assert_eq!(TextureFlags::from_slot_count(9), TextureFlags::all());
    }
}
