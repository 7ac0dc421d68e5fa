use glam::Mat4;
use halfling_types::{DirectionalLight, PackedLight, PointLight, ShaderPointLight, ShaderSpotLight, SpotLight};
use wgpu::{BufferUsages, Device, Queue};

use crate::{
    util::{buffer::StructuredBuffer, frustum::BoundingSphere},
    EngineError, LightBufferError,
};

/// Packs the first `count` lights for upload, repacking only the ones that changed.
pub fn pack_lights<L: PackedLight>(
    lights: &mut [L],
    count: usize,
    capacity: usize,
) -> Result<Vec<L::Packed>, LightBufferError> {
    if count > capacity {
        return Err(LightBufferError::CountExceedsCapacity { count, capacity });
    }
    if count > lights.len() {
        return Err(LightBufferError::CountExceedsLights {
            count,
            available: lights.len(),
        });
    }
    Ok(lights[..count].iter_mut().map(|l| *l.shader_packed()).collect())
}

/// View space bounding spheres of the first `count` lights.
pub fn light_bounds<L: PackedLight>(lights: &[L], count: usize, view: Mat4) -> Vec<BoundingSphere> {
    lights[..count.min(lights.len())]
        .iter()
        .map(|l| BoundingSphere::new(view.transform_point3(l.position()), l.range()))
        .collect()
}

/// Owns the scene's lights and the GPU buffers they are uploaded to each frame.
pub struct LightManager {
    pub directional: DirectionalLight,
    pub point_lights: Vec<PointLight>,
    pub spot_lights: Vec<SpotLight>,

    num_point_lights_to_draw: usize,
    num_spot_lights_to_draw: usize,

    point_buffer: StructuredBuffer<ShaderPointLight>,
    spot_buffer: StructuredBuffer<ShaderSpotLight>,
}

impl LightManager {
    pub fn new(device: &Device, max_point_lights: usize, max_spot_lights: usize) -> Self {
        profiling::scope!("LightManager::new");
        Self {
            directional: DirectionalLight::default(),
            point_lights: Vec::new(),
            spot_lights: Vec::new(),
            num_point_lights_to_draw: 0,
            num_spot_lights_to_draw: 0,
            point_buffer: StructuredBuffer::new(device, max_point_lights, BufferUsages::STORAGE, "point lights"),
            spot_buffer: StructuredBuffer::new(device, max_spot_lights, BufferUsages::STORAGE, "spot lights"),
        }
    }

    /// Replaces the scene's lights. Every light is drawn, up to the buffer capacity.
    pub fn set_lights(&mut self, directional: DirectionalLight, point_lights: Vec<PointLight>, spot_lights: Vec<SpotLight>) {
        if point_lights.len() > self.point_buffer.capacity() || spot_lights.len() > self.spot_buffer.capacity() {
            log::warn!(
                "Scene has {} point and {} spot lights, buffers hold {} and {}",
                point_lights.len(),
                spot_lights.len(),
                self.point_buffer.capacity(),
                self.spot_buffer.capacity()
            );
        }
        self.directional = directional;
        self.point_lights = point_lights;
        self.spot_lights = spot_lights;
        self.set_num_point_lights_to_draw(usize::MAX);
        self.set_num_spot_lights_to_draw(usize::MAX);
    }

    pub fn num_point_lights_to_draw(&self) -> usize {
        self.num_point_lights_to_draw
    }

    pub fn num_spot_lights_to_draw(&self) -> usize {
        self.num_spot_lights_to_draw
    }

    /// Clamped to the number of lights and the buffer capacity.
    pub fn set_num_point_lights_to_draw(&mut self, count: usize) {
        self.num_point_lights_to_draw = count.min(self.point_lights.len()).min(self.point_buffer.capacity());
    }

    pub fn set_num_spot_lights_to_draw(&mut self, count: usize) {
        self.num_spot_lights_to_draw = count.min(self.spot_lights.len()).min(self.spot_buffer.capacity());
    }

    pub fn point_capacity(&self) -> usize {
        self.point_buffer.capacity()
    }

    pub fn spot_capacity(&self) -> usize {
        self.spot_buffer.capacity()
    }

    /// Writes the active lights into their buffers. Call once per frame, before any pass reads them.
    pub fn upload(&mut self, queue: &Queue) -> Result<(), EngineError> {
        profiling::scope!("LightManager::upload");

        let points = pack_lights(
            &mut self.point_lights,
            self.num_point_lights_to_draw,
            self.point_buffer.capacity(),
        )?;
        self.point_buffer.write_discard(queue, &points)?;

        let spots = pack_lights(
            &mut self.spot_lights,
            self.num_spot_lights_to_draw,
            self.spot_buffer.capacity(),
        )?;
        self.spot_buffer.write_discard(queue, &spots)?;

        Ok(())
    }

    pub fn point_bounds(&self, view: Mat4) -> Vec<BoundingSphere> {
        light_bounds(&self.point_lights, self.num_point_lights_to_draw, view)
    }

    pub fn spot_bounds(&self, view: Mat4) -> Vec<BoundingSphere> {
        light_bounds(&self.spot_lights, self.num_spot_lights_to_draw, view)
    }

    pub fn point_buffer(&self) -> &wgpu::Buffer {
        self.point_buffer.buffer()
    }

    pub fn spot_buffer(&self) -> &wgpu::Buffer {
        self.spot_buffer.buffer()
    }
}

#[cfg(test)]
mod tests {
    use glam::{Mat4, Vec3};
    use halfling_types::{PointLight, SpotLight};

    use super::*;

    fn point_lights(n: usize) -> Vec<PointLight> {
        (0..n)
            .map(|i| PointLight::new(Vec3::ONE, Vec3::new(i as f32, 0.0, 0.0), 100.0, 1.0 + i as f32))
            .collect()
    }

    #[test]
    fn packs_exactly_count_lights() {
        let mut lights = point_lights(5);
        let packed = pack_lights(&mut lights, 3, 8).unwrap();
        assert_eq!(packed.len(), 3);
        assert_eq!(packed[2].position, [2.0, 0.0, 0.0]);
        assert_eq!(packed[2].range, 3.0);

        assert!(pack_lights(&mut lights, 0, 0).unwrap().is_empty());
    }

    #[test]
    fn count_over_capacity_is_an_error() {
        let mut lights = point_lights(10);
        assert_eq!(
            pack_lights(&mut lights, 9, 8),
            Err(LightBufferError::CountExceedsCapacity { count: 9, capacity: 8 })
        );
    }

    #[test]
    fn count_over_light_count_is_an_error() {
        let mut lights: Vec<SpotLight> = Vec::new();
        assert_eq!(
            pack_lights(&mut lights, 1, 8),
            Err(LightBufferError::CountExceedsLights { count: 1, available: 0 })
        );
    }

    #[test]
    fn bounds_are_in_view_space() {
        let lights = point_lights(3);
        let view = Mat4::from_translation(Vec3::new(0.0, 0.0, 10.0));
        let bounds = light_bounds(&lights, 2, view);
        assert_eq!(bounds.len(), 2);
        assert_eq!(bounds[1].center, Vec3::new(1.0, 0.0, 10.0));
        assert_eq!(bounds[1].radius, 2.0);
    }
}
