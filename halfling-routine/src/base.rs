//! Starter routine which ties every pass together into a complete deferred frame.
//!
//! Each frame runs, in order: G-Buffer fill, light upload, cluster rebuild and
//! light assignment, light gather into the HDR target, then tonemapping into the
//! caller's target.

use glam::Mat4;
use halfling::{
    cluster::{assign_lights, ClusterPlanes},
    managers::{light::LightManager, material::MaterialResources},
    model::Model,
    scene::LoadedScene,
    EngineError,
};
use thiserror::Error;
use wgpu::{
    Color, CommandEncoder, Device, LoadOp, Operations, Queue, RenderPassColorAttachment, RenderPassDescriptor, StoreOp,
    TextureFormat, TextureView,
};

use crate::{
    gather::{GatherPass, GatherPassArgs, GatherPassNewArgs, ShadingMode},
    gbuffer::{GBufferDrawArgs, GBufferPass, GBufferPassNewArgs},
    shaders::{ShaderPreProcessor, ShaderSourceError},
    targets::RenderTargets,
    tonemapping::{TonemappingPass, TonemappingPassBlitArgs, TonemappingPassNewArgs},
    uniforms::{CameraData, FrameUniformArgs, FrameUniformBuffer, FrameUniforms},
};

#[derive(Debug, Error)]
pub enum RoutineError {
    #[error(transparent)]
    Shader(#[from] ShaderSourceError),
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Knobs which can change between frames.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct RenderConfig {
    pub shading: ShadingMode,
    pub wireframe: bool,
}

/// Everything [`DeferredRoutine::render`] needs for one frame.
pub struct DeferredRoutineRenderArgs<'a> {
    pub device: &'a Device,
    pub queue: &'a Queue,
    pub encoder: &'a mut CommandEncoder,

    pub camera: CameraData,
    pub lights: &'a mut LightManager,
    /// `None` while the scene is loading.
    pub scene: Option<&'a LoadedScene<Model>>,
    /// Applied on top of every model's own transform.
    pub global_world: Mat4,

    pub target: &'a TextureView,
}

pub struct DeferredRoutine {
    config: RenderConfig,
    targets: RenderTargets,
    frame_uniforms: FrameUniformBuffer,
    clusters: ClusterPlanes,

    gbuffer: GBufferPass,
    gather: GatherPass,
    tonemapping: TonemappingPass,
}

impl DeferredRoutine {
    pub fn new(
        device: &Device,
        materials: &MaterialResources,
        output_format: TextureFormat,
        resolution: (u32, u32),
        config: RenderConfig,
    ) -> Result<Self, RoutineError> {
        profiling::scope!("DeferredRoutine::new");

        let preprocessor = ShaderPreProcessor::new()?;
        let frame_uniforms = FrameUniformBuffer::new(device);

        let gbuffer = GBufferPass::new(GBufferPassNewArgs {
            device,
            preprocessor: &preprocessor,
            frame_layout: frame_uniforms.layout(),
            material_layout: &materials.layout,
        })?;
        let gather = GatherPass::new(GatherPassNewArgs {
            device,
            preprocessor: &preprocessor,
            frame_layout: frame_uniforms.layout(),
        })?;
        let tonemapping = TonemappingPass::new(TonemappingPassNewArgs {
            device,
            preprocessor: &preprocessor,
            output_format,
        })?;

        if config.wireframe && !gbuffer.supports_wireframe() {
            log::warn!("Device lacks line polygon mode, wireframe is drawn filled");
        }

        Ok(Self {
            config,
            targets: RenderTargets::new(device, resolution.0, resolution.1),
            frame_uniforms,
            clusters: ClusterPlanes::new(),
            gbuffer,
            gather,
            tonemapping,
        })
    }

    pub fn config(&self) -> RenderConfig {
        self.config
    }

    pub fn set_config(&mut self, config: RenderConfig) {
        if config.wireframe && !self.gbuffer.supports_wireframe() {
            log::warn!("Device lacks line polygon mode, wireframe is drawn filled");
        }
        self.config = config;
    }

    pub fn resolution(&self) -> (u32, u32) {
        self.targets.resolution()
    }

    /// Recreates every screen sized target. Call whenever the output is resized.
    pub fn resize(&mut self, device: &Device, resolution: (u32, u32)) {
        profiling::scope!("DeferredRoutine::resize");
        self.targets = RenderTargets::new(device, resolution.0, resolution.1);
        self.clusters.mark_dirty();
    }

    /// The cluster grid depends on the projection. Call when the field of view or clip planes change.
    pub fn projection_changed(&mut self) {
        self.clusters.mark_dirty();
    }

    pub fn render(&mut self, args: DeferredRoutineRenderArgs<'_>) -> Result<(), EngineError> {
        profiling::scope!("DeferredRoutine::render");

        let (width, height) = self.targets.resolution();
        let camera = args.camera;

        self.gbuffer.draw(GBufferDrawArgs {
            device: args.device,
            queue: args.queue,
            encoder: &mut *args.encoder,
            targets: &self.targets,
            frame_bind_group: self.frame_uniforms.bind_group(),
            scene: args.scene,
            global_world: args.global_world,
            view_proj: camera.view_proj(),
            wireframe: self.config.wireframe,
        })?;

        args.lights.upload(args.queue)?;

        self.clusters.update(camera.projection, width, height);
        if self.config.shading == ShadingMode::TiledCompute {
            let mut bounds = args.lights.point_bounds(camera.view);
            bounds.extend(args.lights.spot_bounds(camera.view));
            let lists = assign_lights(&self.clusters, &bounds);
            self.gather.upload_clusters(args.device, args.queue, &lists)?;
        }

        let uniforms = FrameUniforms::new(FrameUniformArgs {
            camera,
            directional: *args.lights.directional.shader_packed(),
            num_point_lights: args.lights.num_point_lights_to_draw() as u32,
            num_spot_lights: args.lights.num_spot_lights_to_draw() as u32,
            tiles: (self.clusters.tiles_x(), self.clusters.tiles_y()),
            resolution: (width, height),
        });
        self.frame_uniforms.write(args.queue, &uniforms);

        self.gather.gather(GatherPassArgs {
            device: args.device,
            encoder: &mut *args.encoder,
            mode: self.config.shading,
            frame_bind_group: self.frame_uniforms.bind_group(),
            targets: &self.targets,
            lights: &*args.lights,
        });

        self.tonemapping.blit(TonemappingPassBlitArgs {
            device: args.device,
            encoder: &mut *args.encoder,
            source: &self.targets.hdr.view,
            target: args.target,
        });

        Ok(())
    }
}

/// Clears `target` to `color`. Used for frames drawn before the scene has loaded.
pub fn clear_target(encoder: &mut CommandEncoder, target: &TextureView, color: Color) {
    profiling::scope!("clear target");
    let _ = encoder.begin_render_pass(&RenderPassDescriptor {
        label: Some("clear target"),
        color_attachments: &[Some(RenderPassColorAttachment {
            view: target,
            resolve_target: None,
            ops: Operations {
                load: LoadOp::Clear(color),
                store: StoreOp::Store,
            },
        })],
        depth_stencil_attachment: None,
        timestamp_writes: None,
        occlusion_query_set: None,
    });
}
