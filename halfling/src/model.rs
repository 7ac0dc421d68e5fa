use std::sync::Arc;

use halfling_types::{Aabb, Vertex};
use wgpu::{
    util::{BufferInitDescriptor, DeviceExt},
    Buffer, BufferUsages, Device,
};

use crate::{managers::material::Material, util::error_scope::DeviceErrorScope, EngineError};

/// Anything with a model space bounding box.
pub trait ModelBounds {
    fn aabb(&self) -> Aabb;
}

/// A range of a model drawn with one material.
pub struct ModelSubset {
    pub vertex_start: u32,
    pub vertex_count: u32,
    pub index_start: u32,
    pub index_count: u32,
    pub aabb: Aabb,
    pub material: Arc<Material>,
}

/// Indexed triangle mesh resident on the GPU.
pub struct Model {
    pub vertex_buffer: Buffer,
    pub index_buffer: Buffer,
    pub vertex_count: u32,
    pub index_count: u32,
    pub subsets: Vec<ModelSubset>,
    /// Union of the subset bounds, in model space.
    pub aabb: Aabb,
}

impl Model {
    /// Uploads vertex and index data. Indices are relative to each subset's `vertex_start`.
    pub fn new(
        device: &Device,
        label: &str,
        vertex_data: &[u8],
        index_data: &[u8],
        vertex_count: u32,
        index_count: u32,
        subsets: Vec<ModelSubset>,
    ) -> Result<Self, EngineError> {
        profiling::scope!("Model::new", label);

        let scope = DeviceErrorScope::new(device, "model buffer creation");
        let vertex_buffer = device.create_buffer_init(&BufferInitDescriptor {
            label: Some(label),
            contents: vertex_data,
            usage: BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&BufferInitDescriptor {
            label: Some(label),
            contents: index_data,
            usage: BufferUsages::INDEX,
        });
        scope.end()?;

        let aabb = subsets.iter().fold(Aabb::EMPTY, |aabb, s| aabb.union(s.aabb));

        Ok(Self {
            vertex_buffer,
            index_buffer,
            vertex_count,
            index_count,
            subsets,
            aabb,
        })
    }

    pub fn from_vertices(
        device: &Device,
        label: &str,
        vertices: &[Vertex],
        indices: &[u32],
        subsets: Vec<ModelSubset>,
    ) -> Result<Self, EngineError> {
        Self::new(
            device,
            label,
            bytemuck::cast_slice(vertices),
            bytemuck::cast_slice(indices),
            vertices.len() as u32,
            indices.len() as u32,
            subsets,
        )
    }
}

impl ModelBounds for Model {
    fn aabb(&self) -> Aabb {
        self.aabb
    }
}
