use std::mem::size_of;

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};
use halfling::{
    camera::OrbitCamera,
    types::ShaderDirectionalLight,
    util::bind_merge::{BindGroupBuilder, BindGroupLayoutBuilder},
};
use wgpu::{
    BindGroup, BindGroupLayout, Buffer, BufferAddress, BufferDescriptor, BufferUsages, Device, Queue, ShaderStages,
};

/// What the routine needs to know about the camera for one frame.
#[derive(Debug, Copy, Clone)]
pub struct CameraData {
    pub view: Mat4,
    pub projection: Mat4,
    pub eye_position: Vec3,
    pub near_clip: f32,
    pub far_clip: f32,
}

impl CameraData {
    pub fn view_proj(&self) -> Mat4 {
        self.projection * self.view
    }
}

impl From<&OrbitCamera> for CameraData {
    fn from(camera: &OrbitCamera) -> Self {
        Self {
            view: camera.view(),
            projection: camera.projection(),
            eye_position: camera.position(),
            near_clip: camera.near_clip(),
            far_clip: camera.far_clip(),
        }
    }
}

/// Per frame constants, bound at group 0 in every pass. Matches `FrameUniforms` in common.wgsl.
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
#[repr(C)]
pub struct FrameUniforms {
    pub view: Mat4,
    pub projection: Mat4,
    pub view_proj: Mat4,
    pub inv_view_proj: Mat4,
    pub directional: ShaderDirectionalLight,
    pub eye_position: [f32; 3],
    pub num_point_lights: u32,
    pub num_spot_lights: u32,
    pub near_clip: f32,
    pub far_clip: f32,
    pub tiles_x: u32,
    pub tiles_y: u32,
    pub screen_width: u32,
    pub screen_height: u32,
    pub _padding: u32,
}

pub struct FrameUniformArgs {
    pub camera: CameraData,
    pub directional: ShaderDirectionalLight,
    pub num_point_lights: u32,
    pub num_spot_lights: u32,
    pub tiles: (u32, u32),
    pub resolution: (u32, u32),
}

impl FrameUniforms {
    pub fn new(args: FrameUniformArgs) -> Self {
        let view_proj = args.camera.view_proj();
        Self {
            view: args.camera.view,
            projection: args.camera.projection,
            view_proj,
            inv_view_proj: view_proj.inverse(),
            directional: args.directional,
            eye_position: args.camera.eye_position.to_array(),
            num_point_lights: args.num_point_lights,
            num_spot_lights: args.num_spot_lights,
            near_clip: args.camera.near_clip,
            far_clip: args.camera.far_clip,
            tiles_x: args.tiles.0,
            tiles_y: args.tiles.1,
            screen_width: args.resolution.0,
            screen_height: args.resolution.1,
            _padding: 0,
        }
    }
}

/// Uniform buffer holding [`FrameUniforms`] and the group 0 bind group pointing at it.
pub struct FrameUniformBuffer {
    buffer: Buffer,
    layout: BindGroupLayout,
    bind_group: BindGroup,
}

impl FrameUniformBuffer {
    pub fn new(device: &Device) -> Self {
        let buffer = device.create_buffer(&BufferDescriptor {
            label: Some("frame uniforms"),
            size: size_of::<FrameUniforms>() as BufferAddress,
            usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let layout = BindGroupLayoutBuilder::new()
            .append_uniform(
                ShaderStages::VERTEX | ShaderStages::FRAGMENT | ShaderStages::COMPUTE,
                false,
                std::num::NonZeroU64::new(size_of::<FrameUniforms>() as u64),
            )
            .build(device, Some("frame uniforms bgl"));
        let bind_group = BindGroupBuilder::new()
            .append_buffer(&buffer)
            .build(device, Some("frame uniforms bg"), &layout);

        Self {
            buffer,
            layout,
            bind_group,
        }
    }

    pub fn write(&self, queue: &Queue, uniforms: &FrameUniforms) {
        queue.write_buffer(&self.buffer, 0, bytemuck::bytes_of(uniforms));
    }

    pub fn layout(&self) -> &BindGroupLayout {
        &self.layout
    }

    pub fn bind_group(&self) -> &BindGroup {
        &self.bind_group
    }
}

/// Per draw transforms for non-instanced models. Matches `ObjectUniforms` in gbuffer.wgsl.
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
#[repr(C)]
pub struct ObjectUniforms {
    pub world: Mat4,
    pub world_view_proj: Mat4,
}

impl ObjectUniforms {
    pub fn new(world: Mat4, view_proj: Mat4) -> Self {
        Self {
            world,
            world_view_proj: view_proj * world,
        }
    }
}

/// Splits instance world matrices into the three rows the instanced vertex shader reads.
pub fn instance_rows(global_world: Mat4, instances: &[Mat4]) -> impl Iterator<Item = [f32; 4]> + '_ {
    instances.iter().flat_map(move |&instance| {
        let world = global_world * instance;
        [world.row(0).to_array(), world.row(1).to_array(), world.row(2).to_array()]
    })
}

/// Rounds `size` up to a multiple of `alignment`, which must be a power of two.
pub fn align_to(size: u64, alignment: u64) -> u64 {
    (size + alignment - 1) & !(alignment - 1)
}

#[cfg(test)]
mod tests {
    use std::mem::size_of;

    use bytemuck::Zeroable;
    use glam::{Mat4, Vec3, Vec4};

    use super::*;

    #[test]
    fn layouts_match_wgsl() {
        assert_eq!(size_of::<FrameUniforms>(), 336);
        assert_eq!(offset_of_directional(), 256);
        assert_eq!(size_of::<ObjectUniforms>(), 128);
    }

    fn offset_of_directional() -> usize {
        let uniforms = FrameUniforms::zeroed();
        let base = &uniforms as *const FrameUniforms as usize;
        &uniforms.directional as *const ShaderDirectionalLight as usize - base
    }

    #[test]
    fn instance_rows_apply_global_transform() {
        let global = Mat4::from_scale(Vec3::splat(2.0));
        let instance = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));
        let rows: Vec<_> = instance_rows(global, &[instance]).collect();
        assert_eq!(rows.len(), 3);

        // Dotting each row with a point gives the transformed point.
        let p = Vec4::new(1.0, 1.0, 1.0, 1.0);
        let transformed = Vec3::new(
            Vec4::from_array(rows[0]).dot(p),
            Vec4::from_array(rows[1]).dot(p),
            Vec4::from_array(rows[2]).dot(p),
        );
        assert_eq!(transformed, (global * instance).transform_point3(Vec3::ONE));
        assert_eq!(transformed, Vec3::new(4.0, 6.0, 8.0));
    }

    #[test]
    fn alignment() {
        assert_eq!(align_to(128, 256), 256);
        assert_eq!(align_to(256, 256), 256);
        assert_eq!(align_to(0, 64), 0);
        assert_eq!(align_to(300, 256), 512);
    }
}
