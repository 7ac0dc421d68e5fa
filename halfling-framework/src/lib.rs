//! Window, device and event loop boilerplate for halfling applications.
//!
//! Implement [`App`] and hand it to [`start`]. The framework owns the window, the
//! surface and a [`DeferredRoutine`] sized to the window, and gives the app a
//! [`Renderer`] in every callback.

use std::{future::Future, pin::Pin, sync::Arc, time::Instant};

use halfling::{
    configure_surface, create_iad, create_instance, log_uncaptured_errors, managers::material::MaterialResources,
    InstanceAdapterDevice,
};
use halfling_routine::{DeferredRoutine, RenderConfig};
use wgpu::{
    Backend, CommandEncoder, CommandEncoderDescriptor, Instance, PowerPreference, Surface, SurfaceConfiguration,
    SurfaceError, TextureView, TextureViewDescriptor,
};
use winit::{
    event::{Event, WindowEvent},
    event_loop::{EventLoop, EventLoopWindowTarget},
    window::{Window, WindowBuilder},
};

mod camera_controller;
pub mod console;

pub use camera_controller::*;

/// Everything an [`App`] needs to draw: the device, the window's surface and the deferred routine.
pub struct Renderer {
    pub window: Arc<Window>,
    pub iad: InstanceAdapterDevice,
    pub surface: Surface<'static>,
    pub surface_config: SurfaceConfiguration,
    pub materials: Arc<MaterialResources>,
    pub routine: DeferredRoutine,
    vsync: bool,
}

impl Renderer {
    pub fn resolution(&self) -> (u32, u32) {
        (self.surface_config.width, self.surface_config.height)
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.surface_config.width as f32 / self.surface_config.height as f32
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.surface_config = configure_surface(
            &self.surface,
            &self.iad.adapter,
            &self.iad.device,
            width,
            height,
            self.vsync,
        );
        self.routine.resize(&self.iad.device, (width, height));
    }

    fn reconfigure(&mut self) {
        self.surface.configure(&self.iad.device, &self.surface_config);
    }
}

pub trait App {
    fn register_logger(&mut self) {
        env_logger::init();
    }

    /// Backend to force, or `None` to let wgpu pick.
    fn backend(&self) -> Option<Backend> {
        None
    }

    fn vsync(&self) -> bool {
        true
    }

    fn render_config(&self) -> RenderConfig {
        RenderConfig::default()
    }

    fn create_iad<'a>(
        &'a mut self,
        instance: Instance,
        surface: &'a Surface<'static>,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<InstanceAdapterDevice>> + 'a>> {
        Box::pin(async move { Ok(create_iad(instance, PowerPreference::HighPerformance, Some(surface)).await?) })
    }

    fn setup(&mut self, renderer: &mut Renderer) -> anyhow::Result<()> {
        let _ = renderer;
        Ok(())
    }

    /// Sees every event for the window, after the framework has handled resizes.
    fn handle_event(&mut self, renderer: &mut Renderer, event: &WindowEvent) {
        let _ = (renderer, event);
    }

    /// Records one frame into `encoder`, ending in `target`. Errors stop the event loop.
    fn render(
        &mut self,
        renderer: &mut Renderer,
        encoder: &mut CommandEncoder,
        target: &TextureView,
    ) -> anyhow::Result<()>;
}

pub async fn async_start<A: App + 'static>(mut app: A, window_builder: WindowBuilder) -> anyhow::Result<()> {
    app.register_logger();

    let event_loop = EventLoop::new()?;
    // Invisible until we are rendering
    let window = Arc::new({
        profiling::scope!("creating window");
        window_builder.with_visible(false).build(&event_loop)?
    });
    let window_size = window.inner_size();

    let instance = create_instance(app.backend());
    let surface = instance.create_surface(Arc::clone(&window))?;
    let iad = app.create_iad(instance, &surface).await?;
    log_uncaptured_errors(&iad.device);

    let vsync = app.vsync();
    let surface_config = configure_surface(
        &surface,
        &iad.adapter,
        &iad.device,
        window_size.width,
        window_size.height,
        vsync,
    );
    log::info!("Surface format {:?}", surface_config.format);

    let materials = Arc::new(MaterialResources::new(&iad.device, &iad.queue)?);
    let routine = DeferredRoutine::new(
        &iad.device,
        &materials,
        surface_config.format,
        (surface_config.width, surface_config.height),
        app.render_config(),
    )?;

    let mut renderer = Renderer {
        window,
        iad,
        surface,
        surface_config,
        materials,
        routine,
        vsync,
    };
    app.setup(&mut renderer)?;

    renderer.window.set_visible(true);

    let mut minimized = false;
    event_loop.run(move |event, elwt| match event {
        Event::WindowEvent { window_id, event } if window_id == renderer.window.id() => {
            match event {
                WindowEvent::CloseRequested => elwt.exit(),
                WindowEvent::Resized(size) => {
                    log::debug!("resize {:?}", size);
                    minimized = size.width == 0 || size.height == 0;
                    if !minimized {
                        renderer.resize(size.width, size.height);
                    }
                }
                WindowEvent::RedrawRequested if !minimized => redraw(&mut app, &mut renderer, elwt),
                _ => {}
            }
            app.handle_event(&mut renderer, &event);
        }
        Event::AboutToWait => renderer.window.request_redraw(),
        _ => {}
    })?;

    Ok(())
}

fn redraw<A: App>(app: &mut A, renderer: &mut Renderer, elwt: &EventLoopWindowTarget<()>) {
    profiling::scope!("frame");

    let frame = match renderer.surface.get_current_texture() {
        Ok(frame) => frame,
        Err(SurfaceError::Lost | SurfaceError::Outdated) => {
            log::debug!("Surface lost, reconfiguring");
            renderer.reconfigure();
            return;
        }
        Err(SurfaceError::Timeout) => {
            log::warn!("Timed out acquiring the next frame");
            return;
        }
        Err(e @ SurfaceError::OutOfMemory) => {
            log::error!("Failed to acquire the next frame: {}", e);
            elwt.exit();
            return;
        }
    };
    let view = frame.texture.create_view(&TextureViewDescriptor::default());

    let start = Instant::now();
    let mut encoder = renderer
        .iad
        .device
        .create_command_encoder(&CommandEncoderDescriptor { label: Some("frame") });
    if let Err(e) = app.render(renderer, &mut encoder, &view) {
        log::error!("Rendering failed: {:#}", e);
        elwt.exit();
        return;
    }
    renderer.iad.queue.submit(Some(encoder.finish()));
    frame.present();
    log::trace!("Frame recorded in {:?}", start.elapsed());

    profiling::finish_frame!();
}

/// Runs `app` until its window is closed.
pub fn start<A: App + 'static>(app: A, window_builder: WindowBuilder) -> anyhow::Result<()> {
    pollster::block_on(async_start(app, window_builder))
}
