use halfling::util::bind_merge::{BindGroupBuilder, BindGroupLayoutBuilder};
use wgpu::{
    BindGroupLayout, BindingType, Color, ColorTargetState, ColorWrites, CommandEncoder, Device, FragmentState,
    FrontFace, LoadOp, MultisampleState, Operations, PipelineLayoutDescriptor, PolygonMode, PrimitiveState,
    PrimitiveTopology, RenderPassColorAttachment, RenderPassDescriptor, RenderPipeline, RenderPipelineDescriptor,
    ShaderStages, StoreOp, TextureFormat, TextureSampleType, TextureView, TextureViewDimension, VertexState,
};

use crate::shaders::{ShaderPreProcessor, ShaderSourceError};

pub struct TonemappingPassNewArgs<'a> {
    pub device: &'a Device,
    pub preprocessor: &'a ShaderPreProcessor,

    pub output_format: TextureFormat,
}

pub struct TonemappingPassBlitArgs<'a> {
    pub device: &'a Device,
    pub encoder: &'a mut CommandEncoder,

    pub source: &'a TextureView,
    pub target: &'a TextureView,
}

/// Maps the HDR target into the swapchain format with Reinhard's operator.
pub struct TonemappingPass {
    bgl: BindGroupLayout,
    pipeline: RenderPipeline,
}

impl TonemappingPass {
    pub fn new(args: TonemappingPassNewArgs<'_>) -> Result<Self, ShaderSourceError> {
        profiling::scope!("TonemappingPass::new");

        let module = args.preprocessor.create_module(args.device, "tonemap.wgsl")?;

        let bgl = BindGroupLayoutBuilder::new()
            .append(
                ShaderStages::FRAGMENT,
                BindingType::Texture {
                    sample_type: TextureSampleType::Float { filterable: false },
                    view_dimension: TextureViewDimension::D2,
                    multisampled: false,
                },
                None,
            )
            .build(args.device, Some("tonemapping bgl"));

        let pll = args.device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some("tonemapping pass"),
            bind_group_layouts: &[&bgl],
            push_constant_ranges: &[],
        });

        let pipeline = args.device.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some("tonemapping pass"),
            layout: Some(&pll),
            vertex: VertexState {
                module: &module,
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
                module: &module,
                entry_point: match args.output_format.is_srgb() {
                    true => "fs_linear",
                    false => "fs_gamma",
                },
                targets: &[Some(ColorTargetState {
                    format: args.output_format,
                    blend: None,
                    write_mask: ColorWrites::all(),
                })],
            }),
            multiview: None,
        });

        Ok(Self { bgl, pipeline })
    }

    pub fn blit(&self, args: TonemappingPassBlitArgs<'_>) {
        profiling::scope!("tonemapping");

        let blit_src_bg = BindGroupBuilder::new()
            .append_texture_view(args.source)
            .build(args.device, Some("blit src bg"), &self.bgl);

        let mut rpass = args.encoder.begin_render_pass(&RenderPassDescriptor {
            label: Some("tonemapping pass"),
            color_attachments: &[Some(RenderPassColorAttachment {
                view: args.target,
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

        rpass.set_pipeline(&self.pipeline);
        rpass.set_bind_group(0, &blit_src_bg, &[]);
        rpass.draw(0..3, 0..1);

        drop(rpass);
    }
}
