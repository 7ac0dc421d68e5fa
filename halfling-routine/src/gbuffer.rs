//! Fills the G-Buffer: albedo, normals, material parameters and depth.
//!
//! Models with few placements are drawn once per placement with their transforms in a
//! dynamic uniform buffer. Instanced models stream the rows of their world matrices
//! through a per-instance vertex buffer.

use std::{mem::size_of, num::NonZeroU64, ops::Range, sync::Arc};

use glam::Mat4;
use halfling::{
    model::Model,
    scene::LoadedScene,
    types::Vertex,
    util::{
        bind_merge::{BindGroupBuilder, BindGroupLayoutBuilder},
        buffer::StructuredBuffer,
        error_scope::DeviceErrorScope,
        typedefs::FastHashMap,
    },
    DeviceError, EngineError,
};
use wgpu::{
    vertex_attr_array, BindGroup, BindGroupLayout, Buffer, BufferAddress, BufferDescriptor, BufferUsages, Color,
    ColorTargetState, ColorWrites, CommandEncoder, CompareFunction, DepthBiasState, DepthStencilState, Device, Face,
    Features, FragmentState, FrontFace, IndexFormat, LoadOp, MultisampleState, Operations, PipelineLayout,
    PipelineLayoutDescriptor, PolygonMode, PrimitiveState, PrimitiveTopology, Queue, RenderPassColorAttachment,
    RenderPassDepthStencilAttachment, RenderPassDescriptor, RenderPipeline, RenderPipelineDescriptor, ShaderModule,
    ShaderStages, StencilState, StoreOp, TextureView, VertexAttribute, VertexBufferLayout, VertexState, VertexStepMode,
};

use crate::{
    shaders::{ShaderPreProcessor, ShaderSourceError},
    targets::{RenderTargets, ALBEDO_FORMAT, DEPTH_FORMAT, MATERIAL_FORMAT, NORMAL_FORMAT},
    uniforms::{align_to, instance_rows, ObjectUniforms},
};

/// World matrix rows the instance buffer holds. Each instance takes three.
pub const MAX_INSTANCE_VECTORS_PER_FRAME: usize = 5000;
const ROWS_PER_INSTANCE: usize = 3;

const VERTEX_ATTRIBUTES: [VertexAttribute; 4] = vertex_attr_array![
    0 => Float32x3,
    1 => Float32x3,
    2 => Float32x2,
    3 => Float32x3
];

const INSTANCE_ATTRIBUTES: [VertexAttribute; 3] = vertex_attr_array![
    4 => Float32x4,
    5 => Float32x4,
    6 => Float32x4
];

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
struct PipelineKey {
    /// Address of the material's custom shader module, if any.
    shader: Option<usize>,
    instanced: bool,
    wireframe: bool,
}

pub struct GBufferPassNewArgs<'a> {
    pub device: &'a Device,
    pub preprocessor: &'a ShaderPreProcessor,
    pub frame_layout: &'a BindGroupLayout,
    pub material_layout: &'a BindGroupLayout,
}

pub struct GBufferDrawArgs<'a> {
    pub device: &'a Device,
    pub queue: &'a Queue,
    pub encoder: &'a mut CommandEncoder,
    pub targets: &'a RenderTargets,
    pub frame_bind_group: &'a BindGroup,
    /// `None` while the scene is still loading: the targets are only cleared.
    pub scene: Option<&'a LoadedScene<Model>>,
    pub global_world: Mat4,
    pub view_proj: Mat4,
    pub wireframe: bool,
}

/// Draw ranges of one instanced model inside the instance buffer.
struct InstancedDraw<'a> {
    model: &'a Model,
    instances: Range<u32>,
}

pub struct GBufferPass {
    module: ShaderModule,
    pipeline_layout: PipelineLayout,
    pipelines: FastHashMap<PipelineKey, RenderPipeline>,
    // Keeps custom modules alive so their addresses stay unique while cached.
    custom_shaders: FastHashMap<usize, Arc<ShaderModule>>,

    object_layout: BindGroupLayout,
    object_buffer: Buffer,
    object_bind_group: BindGroup,
    object_capacity: usize,
    object_stride: u64,

    instance_buffer: StructuredBuffer<[f32; 4]>,
    polygon_mode_line: bool,
}

impl GBufferPass {
    pub fn new(args: GBufferPassNewArgs<'_>) -> Result<Self, ShaderSourceError> {
        profiling::scope!("GBufferPass::new");

        let module = args.preprocessor.create_module(args.device, "gbuffer.wgsl")?;

        let object_size = size_of::<ObjectUniforms>() as u64;
        let object_layout = BindGroupLayoutBuilder::new()
            .append_uniform(ShaderStages::VERTEX, true, NonZeroU64::new(object_size))
            .build(args.device, Some("object uniforms bgl"));

        let pipeline_layout = args.device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some("gbuffer pass"),
            bind_group_layouts: &[args.frame_layout, args.material_layout, &object_layout],
            push_constant_ranges: &[],
        });

        let alignment = args.device.limits().min_uniform_buffer_offset_alignment as u64;
        let object_stride = align_to(object_size, alignment);
        let object_capacity = 64;
        let (object_buffer, object_bind_group) =
            create_object_buffer(args.device, &object_layout, object_capacity, object_stride);

        let polygon_mode_line = args.device.features().contains(Features::POLYGON_MODE_LINE);

        Ok(Self {
            module,
            pipeline_layout,
            pipelines: FastHashMap::default(),
            custom_shaders: FastHashMap::default(),
            object_layout,
            object_buffer,
            object_bind_group,
            object_capacity,
            object_stride,
            instance_buffer: StructuredBuffer::new(
                args.device,
                MAX_INSTANCE_VECTORS_PER_FRAME,
                BufferUsages::VERTEX,
                "instance rows",
            ),
            polygon_mode_line,
        })
    }

    pub fn supports_wireframe(&self) -> bool {
        self.polygon_mode_line
    }

    pub fn draw(&mut self, args: GBufferDrawArgs<'_>) -> Result<(), EngineError> {
        profiling::scope!("GBuffer Pass");

        let wireframe = args.wireframe && self.polygon_mode_line;
        let empty = LoadedScene::default();
        let scene = args.scene.unwrap_or(&empty);

        self.upload_objects(args.device, args.queue, scene, args.global_world, args.view_proj);
        let instanced = self.upload_instances(args.queue, scene, args.global_world)?;

        let models = scene.models.iter().map(|m| (&*m.model, false));
        let instanced_models = instanced.iter().map(|d| (d.model, true));
        for (model, is_instanced) in models.chain(instanced_models) {
            for subset in &model.subsets {
                self.ensure_pipeline(args.device, subset.material.shader.as_ref(), is_instanced, wireframe);
            }
        }

        let targets = args.targets;
        let mut rpass = args.encoder.begin_render_pass(&RenderPassDescriptor {
            label: Some("gbuffer pass"),
            color_attachments: &[
                cleared_attachment(&targets.albedo.view),
                cleared_attachment(&targets.normal.view),
                cleared_attachment(&targets.material.view),
            ],
            depth_stencil_attachment: Some(RenderPassDepthStencilAttachment {
                view: &targets.depth.view,
                depth_ops: Some(Operations {
                    load: LoadOp::Clear(0.0),
                    store: StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        rpass.set_bind_group(0, args.frame_bind_group, &[]);

        for (index, scene_model) in scene.models.iter().enumerate() {
            let model = &*scene_model.model;
            let offset = (index as u64 * self.object_stride) as u32;
            rpass.set_bind_group(2, &self.object_bind_group, &[offset]);
            rpass.set_vertex_buffer(0, model.vertex_buffer.slice(..));
            rpass.set_index_buffer(model.index_buffer.slice(..), IndexFormat::Uint32);
            for subset in &model.subsets {
                let key = pipeline_key(subset.material.shader.as_ref(), false, wireframe);
                let Some(pipeline) = self.pipelines.get(&key) else {
                    continue;
                };
                rpass.set_pipeline(pipeline);
                rpass.set_bind_group(1, &subset.material.bind_group, &[]);
                rpass.draw_indexed(
                    subset.index_start..subset.index_start + subset.index_count,
                    subset.vertex_start as i32,
                    0..1,
                );
            }
        }

        if !instanced.is_empty() {
            rpass.set_bind_group(2, &self.object_bind_group, &[0]);
            rpass.set_vertex_buffer(1, self.instance_buffer.buffer().slice(..));
        }
        for draw in &instanced {
            rpass.set_vertex_buffer(0, draw.model.vertex_buffer.slice(..));
            rpass.set_index_buffer(draw.model.index_buffer.slice(..), IndexFormat::Uint32);
            for subset in &draw.model.subsets {
                let key = pipeline_key(subset.material.shader.as_ref(), true, wireframe);
                let Some(pipeline) = self.pipelines.get(&key) else {
                    continue;
                };
                rpass.set_pipeline(pipeline);
                rpass.set_bind_group(1, &subset.material.bind_group, &[]);
                rpass.draw_indexed(
                    subset.index_start..subset.index_start + subset.index_count,
                    subset.vertex_start as i32,
                    draw.instances.clone(),
                );
            }
        }

        Ok(())
    }

    /// Writes one [`ObjectUniforms`] per non-instanced placement, growing the buffer when needed.
    fn upload_objects(&mut self, device: &Device, queue: &Queue, scene: &LoadedScene<Model>, global_world: Mat4, view_proj: Mat4) {
        let count = scene.models.len();
        if count == 0 {
            return;
        }
        if count > self.object_capacity {
            self.object_capacity = count.next_power_of_two();
            log::debug!("Growing object uniform buffer to {} objects", self.object_capacity);
            let (buffer, bind_group) =
                create_object_buffer(device, &self.object_layout, self.object_capacity, self.object_stride);
            self.object_buffer = buffer;
            self.object_bind_group = bind_group;
        }

        let stride = self.object_stride as usize;
        let mut data = vec![0_u8; count * stride];
        for (chunk, model) in data.chunks_exact_mut(stride).zip(&scene.models) {
            let uniforms = ObjectUniforms::new(global_world * model.world, view_proj);
            chunk[..size_of::<ObjectUniforms>()].copy_from_slice(bytemuck::bytes_of(&uniforms));
        }
        queue.write_buffer(&self.object_buffer, 0, &data);
    }

    /// Packs instance rows for as many instanced models as fit this frame.
    fn upload_instances<'s>(
        &self,
        queue: &Queue,
        scene: &'s LoadedScene<Model>,
        global_world: Mat4,
    ) -> Result<Vec<InstancedDraw<'s>>, EngineError> {
        let mut rows: Vec<[f32; 4]> = Vec::new();
        let mut draws = Vec::with_capacity(scene.instanced_models.len());
        for instanced in &scene.instanced_models {
            let needed = instanced.instances.len() * ROWS_PER_INSTANCE;
            if rows.len() + needed > self.instance_buffer.capacity() {
                log::warn!(
                    "Instance buffer full, skipping a model with {} instances",
                    instanced.instances.len()
                );
                continue;
            }
            let first = (rows.len() / ROWS_PER_INSTANCE) as u32;
            rows.extend(instance_rows(global_world, &instanced.instances));
            draws.push(InstancedDraw {
                model: &instanced.model,
                instances: first..first + instanced.instances.len() as u32,
            });
        }
        self.instance_buffer.write_discard(queue, &rows)?;
        Ok(draws)
    }

    fn ensure_pipeline(&mut self, device: &Device, shader: Option<&Arc<ShaderModule>>, instanced: bool, wireframe: bool) {
        let key = pipeline_key(shader, instanced, wireframe);
        if self.pipelines.contains_key(&key) {
            return;
        }
        if let (Some(shader), Some(address)) = (shader, key.shader) {
            self.custom_shaders.insert(address, Arc::clone(shader));
        }
        let layout = &self.pipeline_layout;
        let module = &self.module;
        let pipeline = match shader {
            Some(custom) => with_fallback(
                || {
                    let scope = DeviceErrorScope::new(device, "material pipeline creation");
                    let pipeline = build_gbuffer_pipeline(device, layout, module, custom, instanced, wireframe);
                    scope.end().map(|()| pipeline)
                },
                || build_gbuffer_pipeline(device, layout, module, module, instanced, wireframe),
            ),
            None => build_gbuffer_pipeline(device, layout, module, module, instanced, wireframe),
        };
        self.pipelines.insert(key, pipeline);
        log::debug!(
            "Built gbuffer pipeline {:?}, {} custom material shaders in use",
            key,
            self.custom_shaders.len()
        );
    }
}

/// Uses the pipeline built around a material's own fragment shader, or the default
/// one when the device rejected it. The fallback is cached under the material's key.
fn with_fallback<P>(custom: impl FnOnce() -> Result<P, DeviceError>, fallback: impl FnOnce() -> P) -> P {
    match custom() {
        Ok(pipeline) => pipeline,
        Err(e) => {
            log::warn!("Material shader can't be used in the gbuffer pass, drawing with the default shader: {}", e);
            fallback()
        }
    }
}

fn cleared_attachment(view: &TextureView) -> Option<RenderPassColorAttachment<'_>> {
    Some(RenderPassColorAttachment {
        view,
        resolve_target: None,
        ops: Operations {
            load: LoadOp::Clear(Color::TRANSPARENT),
            store: StoreOp::Store,
        },
    })
}

fn pipeline_key(shader: Option<&Arc<ShaderModule>>, instanced: bool, wireframe: bool) -> PipelineKey {
    PipelineKey {
        shader: shader.map(|s| Arc::as_ptr(s) as usize),
        instanced,
        wireframe,
    }
}

fn create_object_buffer(device: &Device, layout: &BindGroupLayout, capacity: usize, stride: u64) -> (Buffer, BindGroup) {
    let buffer = device.create_buffer(&BufferDescriptor {
        label: Some("object uniforms"),
        size: capacity as BufferAddress * stride,
        usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });
    let bind_group = BindGroupBuilder::new()
        .append_buffer_with_size(&buffer, size_of::<ObjectUniforms>() as u64)
        .build(device, Some("object uniforms bg"), layout);
    (buffer, bind_group)
}

fn build_gbuffer_pipeline(
    device: &Device,
    layout: &PipelineLayout,
    vertex: &ShaderModule,
    fragment: &ShaderModule,
    instanced: bool,
    wireframe: bool,
) -> RenderPipeline {
    profiling::scope!("build gbuffer pipeline");

    let vertex_layout = VertexBufferLayout {
        array_stride: Vertex::STRIDE as BufferAddress,
        step_mode: VertexStepMode::Vertex,
        attributes: &VERTEX_ATTRIBUTES,
    };
    let instance_layout = VertexBufferLayout {
        array_stride: (ROWS_PER_INSTANCE * size_of::<[f32; 4]>()) as BufferAddress,
        step_mode: VertexStepMode::Instance,
        attributes: &INSTANCE_ATTRIBUTES,
    };
    let vertex_buffers = [vertex_layout, instance_layout];

    let target = |format| {
        Some(ColorTargetState {
            format,
            blend: None,
            write_mask: ColorWrites::all(),
        })
    };

    device.create_render_pipeline(&RenderPipelineDescriptor {
        label: Some(match (instanced, wireframe) {
            (false, false) => "gbuffer",
            (true, false) => "gbuffer instanced",
            (false, true) => "gbuffer wireframe",
            (true, true) => "gbuffer instanced wireframe",
        }),
        layout: Some(layout),
        vertex: VertexState {
            module: vertex,
            entry_point: if instanced { "vs_instanced" } else { "vs_main" },
            buffers: if instanced { &vertex_buffers } else { &vertex_buffers[..1] },
        },
        primitive: PrimitiveState {
            topology: PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: FrontFace::Cw,
            cull_mode: if wireframe { None } else { Some(Face::Back) },
            unclipped_depth: false,
            polygon_mode: if wireframe { PolygonMode::Line } else { PolygonMode::Fill },
            conservative: false,
        },
        depth_stencil: Some(DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: true,
            depth_compare: CompareFunction::GreaterEqual,
            stencil: StencilState::default(),
            bias: DepthBiasState::default(),
        }),
        multisample: MultisampleState::default(),
        fragment: Some(FragmentState {
            module: fragment,
            entry_point: "fs_main",
            targets: &[target(ALBEDO_FORMAT), target(NORMAL_FORMAT), target(MATERIAL_FORMAT)],
        }),
        multiview: None,
    })
}

#[cfg(test)]
mod tests {
    use std::{cell::Cell, io};

    use super::*;

    fn rejected(operation: &'static str) -> DeviceError {
        DeviceError::from_wgpu(
            operation,
            wgpu::Error::Validation {
                source: Box::new(io::Error::new(io::ErrorKind::Other, "entry point fs_main not found")),
                description: String::from("entry point fs_main not found"),
            },
        )
    }

    #[test]
    fn accepted_material_shader_is_used() {
        let fallback_built = Cell::new(false);
        let pipeline = with_fallback(|| Ok("custom"), || {
            fallback_built.set(true);
            "default"
        });
        assert_eq!(pipeline, "custom");
        assert!(!fallback_built.get());
    }

    #[test]
    fn rejected_material_shader_falls_back() {
        let pipeline = with_fallback(|| Err(rejected("material pipeline creation")), || "default");
        assert_eq!(pipeline, "default");
    }
}
