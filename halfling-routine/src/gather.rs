//! Light gather: shades the G-Buffer into the HDR target.
//!
//! The tiled path runs one compute workgroup per screen tile and only walks the
//! lights assigned to each pixel's cluster. The no-cull path is a fullscreen
//! fragment shader which evaluates every light for every pixel.

use std::str::FromStr;

use halfling::{
    cluster::{tile_counts, ClusterLightLists, ClusterRange},
    managers::light::LightManager,
    util::{
        bind_merge::{BindGroupBuilder, BindGroupLayoutBuilder},
        buffer::StructuredBuffer,
    },
    BufferWriteError,
};
use wgpu::{
    BindGroup, BindGroupLayout, BindingType, BufferUsages, Color, ColorTargetState, ColorWrites, CommandEncoder,
    ComputePassDescriptor, ComputePipeline, ComputePipelineDescriptor, Device, FragmentState, FrontFace, LoadOp,
    MultisampleState, Operations, PipelineLayoutDescriptor, PolygonMode, PrimitiveState, PrimitiveTopology, Queue,
    RenderPassColorAttachment, RenderPassDescriptor, RenderPipeline, RenderPipelineDescriptor, ShaderStages,
    StorageTextureAccess, StoreOp, TextureSampleType, TextureViewDimension, VertexState,
};

use crate::{
    shaders::{ShaderPreProcessor, ShaderSourceError},
    targets::{RenderTargets, HDR_FORMAT},
};

/// How the gather pass finds the lights affecting a pixel.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub enum ShadingMode {
    /// Clustered light lists walked by a compute shader.
    #[default]
    TiledCompute,
    /// Every light for every pixel.
    NoCull,
}

impl FromStr for ShadingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tiled" | "tiled-compute" => Ok(Self::TiledCompute),
            "no-cull" | "nocull" => Ok(Self::NoCull),
            _ => Err(format!("unknown shading mode {s:?}, expected \"tiled\" or \"no-cull\"")),
        }
    }
}

pub struct GatherPassNewArgs<'a> {
    pub device: &'a Device,
    pub preprocessor: &'a ShaderPreProcessor,
    pub frame_layout: &'a BindGroupLayout,
}

pub struct GatherPassArgs<'a> {
    pub device: &'a Device,
    pub encoder: &'a mut CommandEncoder,
    pub mode: ShadingMode,
    pub frame_bind_group: &'a BindGroup,
    pub targets: &'a RenderTargets,
    pub lights: &'a LightManager,
}

pub struct GatherPass {
    tiled_bgl: BindGroupLayout,
    nocull_bgl: BindGroupLayout,
    tiled_pipeline: ComputePipeline,
    nocull_pipeline: RenderPipeline,

    cluster_ranges: StructuredBuffer<ClusterRange>,
    cluster_indices: StructuredBuffer<u32>,
}

/// The G-Buffer textures and both light buffers, shared by both layouts.
fn append_gbuffer_bindings(bglb: &mut BindGroupLayoutBuilder, visibility: ShaderStages) {
    for _ in 0..3 {
        bglb.append(
            visibility,
            BindingType::Texture {
                sample_type: TextureSampleType::Float { filterable: false },
                view_dimension: TextureViewDimension::D2,
                multisampled: false,
            },
            None,
        );
    }
    bglb.append(
        visibility,
        BindingType::Texture {
            sample_type: TextureSampleType::Depth,
            view_dimension: TextureViewDimension::D2,
            multisampled: false,
        },
        None,
    );
    bglb.append_storage(visibility, true);
    bglb.append_storage(visibility, true);
}

impl GatherPass {
    pub fn new(args: GatherPassNewArgs<'_>) -> Result<Self, ShaderSourceError> {
        profiling::scope!("GatherPass::new");

        let mut tiled_bglb = BindGroupLayoutBuilder::new();
        append_gbuffer_bindings(&mut tiled_bglb, ShaderStages::COMPUTE);
        tiled_bglb
            .append_storage(ShaderStages::COMPUTE, true)
            .append_storage(ShaderStages::COMPUTE, true)
            .append(
                ShaderStages::COMPUTE,
                BindingType::StorageTexture {
                    access: StorageTextureAccess::WriteOnly,
                    format: HDR_FORMAT,
                    view_dimension: TextureViewDimension::D2,
                },
                None,
            );
        let tiled_bgl = tiled_bglb.build(args.device, Some("tiled gather bgl"));

        let mut nocull_bglb = BindGroupLayoutBuilder::new();
        append_gbuffer_bindings(&mut nocull_bglb, ShaderStages::FRAGMENT);
        let nocull_bgl = nocull_bglb.build(args.device, Some("nocull gather bgl"));

        let tiled_module = args.preprocessor.create_module(args.device, "tiled_gather.wgsl")?;
        let tiled_pll = args.device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some("tiled gather"),
            bind_group_layouts: &[args.frame_layout, &tiled_bgl],
            push_constant_ranges: &[],
        });
        let tiled_pipeline = args.device.create_compute_pipeline(&ComputePipelineDescriptor {
            label: Some("tiled gather"),
            layout: Some(&tiled_pll),
            module: &tiled_module,
            entry_point: "cs_main",
        });

        let nocull_module = args.preprocessor.create_module(args.device, "nocull_gather.wgsl")?;
        let nocull_pll = args.device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some("nocull gather"),
            bind_group_layouts: &[args.frame_layout, &nocull_bgl],
            push_constant_ranges: &[],
        });
        let nocull_pipeline = args.device.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some("nocull gather"),
            layout: Some(&nocull_pll),
            vertex: VertexState {
                module: &nocull_module,
                entry_point: "vs_fullscreen",
                buffers: &[],
            },
            primitive: PrimitiveState {
                topology: PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: FrontFace::Cw,
                cull_mode: None,
                unclipped_depth: false,
                polygon_mode: PolygonMode::Fill,
                conservative: false,
            },
            depth_stencil: None,
            multisample: MultisampleState::default(),
            fragment: Some(FragmentState {
                module: &nocull_module,
                entry_point: "fs_main",
                targets: &[Some(ColorTargetState {
                    format: HDR_FORMAT,
                    blend: None,
                    write_mask: ColorWrites::all(),
                })],
            }),
            multiview: None,
        });

        Ok(Self {
            tiled_bgl,
            nocull_bgl,
            tiled_pipeline,
            nocull_pipeline,
            cluster_ranges: StructuredBuffer::new(args.device, 1, BufferUsages::STORAGE, "cluster ranges"),
            cluster_indices: StructuredBuffer::new(args.device, 1, BufferUsages::STORAGE, "cluster light indices"),
        })
    }

    /// Uploads the light lists, reallocating either buffer if it is too small.
    pub fn upload_clusters(&mut self, device: &Device, queue: &Queue, lists: &ClusterLightLists) -> Result<(), BufferWriteError> {
        profiling::scope!("upload clusters");

        if lists.grid.len() > self.cluster_ranges.capacity() {
            let capacity = grown_capacity(lists.grid.len());
            log::debug!("Growing cluster range buffer to {} clusters", capacity);
            self.cluster_ranges = StructuredBuffer::new(device, capacity, BufferUsages::STORAGE, "cluster ranges");
        }
        if lists.indices.len() > self.cluster_indices.capacity() {
            let capacity = grown_capacity(lists.indices.len());
            log::debug!("Growing cluster index buffer to {} indices", capacity);
            self.cluster_indices = StructuredBuffer::new(device, capacity, BufferUsages::STORAGE, "cluster light indices");
        }

        self.cluster_ranges.write_discard(queue, &lists.grid)?;
        self.cluster_indices.write_discard(queue, &lists.indices)?;
        Ok(())
    }

    pub fn gather(&self, args: GatherPassArgs<'_>) {
        let targets = args.targets;
        let mut bgb = BindGroupBuilder::new();
        bgb.append_texture_view(&targets.albedo.view)
            .append_texture_view(&targets.normal.view)
            .append_texture_view(&targets.material.view)
            .append_texture_view(&targets.depth.view)
            .append_buffer(args.lights.point_buffer())
            .append_buffer(args.lights.spot_buffer());

        match args.mode {
            ShadingMode::TiledCompute => {
                profiling::scope!("Tiled Gather");

                let bg = bgb
                    .append_buffer(self.cluster_ranges.buffer())
                    .append_buffer(self.cluster_indices.buffer())
                    .append_texture_view(&targets.hdr.view)
                    .build(args.device, Some("tiled gather bg"), &self.tiled_bgl);

                let (width, height) = targets.resolution();
                let (groups_x, groups_y) = tile_counts(width, height);

                let mut cpass = args.encoder.begin_compute_pass(&ComputePassDescriptor {
                    label: Some("tiled gather"),
                    timestamp_writes: None,
                });
                cpass.set_pipeline(&self.tiled_pipeline);
                cpass.set_bind_group(0, args.frame_bind_group, &[]);
                cpass.set_bind_group(1, &bg, &[]);
                cpass.dispatch_workgroups(groups_x, groups_y, 1);
            }
            ShadingMode::NoCull => {
                profiling::scope!("NoCull Gather");

                let bg = bgb.build(args.device, Some("nocull gather bg"), &self.nocull_bgl);

                let mut rpass = args.encoder.begin_render_pass(&RenderPassDescriptor {
                    label: Some("nocull gather"),
                    color_attachments: &[Some(RenderPassColorAttachment {
                        view: &targets.hdr.view,
                        resolve_target: None,
                        ops: Operations {
                            load: LoadOp::Clear(Color::BLACK),
                            store: StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: None,
                    timestamp_writes: None,
                    occlusion_query_set: None,
                });
                rpass.set_pipeline(&self.nocull_pipeline);
                rpass.set_bind_group(0, args.frame_bind_group, &[]);
                rpass.set_bind_group(1, &bg, &[]);
                rpass.draw(0..3, 0..1);
            }
        }
    }
}

fn grown_capacity(required: usize) -> usize {
    required.max(1).next_power_of_two()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shading_mode_names() {
        assert_eq!("tiled".parse::<ShadingMode>(), Ok(ShadingMode::TiledCompute));
        assert_eq!("no-cull".parse::<ShadingMode>(), Ok(ShadingMode::NoCull));
        assert!("forward".parse::<ShadingMode>().is_err());
        assert_eq!(ShadingMode::default(), ShadingMode::TiledCompute);
    }

    #[test]
    fn buffers_grow_to_powers_of_two() {
        assert_eq!(grown_capacity(0), 1);
        assert_eq!(grown_capacity(1000), 1024);
        assert_eq!(grown_capacity(1024), 1024);
    }
}
