use std::{
    cell::RefCell,
    rc::Rc,
    sync::Arc,
    time::{Duration, Instant},
};

use anyhow::Context;
use glam::Mat4;
use halfling::{
    camera::OrbitCamera,
    managers::{
        light::LightManager,
        model::{ModelManager, WgpuModelLoader},
    },
    model::Model,
    scene::{
        animate_point_lights, animate_spot_lights, LoadedScene, PointLightAnimator, SceneDescription, SceneLoader,
        SpotLightAnimator,
    },
};
use halfling_framework::{
    console::{Console, MonospaceMetrics, DEFAULT_MAX_LINES},
    App, OrbitCameraController, Renderer,
};
use halfling_routine::{clear_target, CameraData, DeferredRoutineRenderArgs, RenderConfig, ShadingMode};
use wgpu::{Backend, Color, CommandEncoder, TextureView};
use winit::{
    dpi::PhysicalSize,
    event::{ElementState, KeyEvent, WindowEvent},
    keyboard::{Key, NamedKey},
    window::WindowBuilder,
};

mod options;

use options::{DemoOptions, HELP};

const LOADING_COLOR: Color = Color {
    r: 0.1,
    g: 0.1,
    b: 0.15,
    a: 1.0,
};
const LOADING_POLL_INTERVAL: Duration = Duration::from_millis(50);
const TITLE_UPDATE_INTERVAL: Duration = Duration::from_millis(500);

const CONSOLE_FONT: MonospaceMetrics = MonospaceMetrics {
    advance: 8.0,
    line_height: 16.0,
};
const CONSOLE_WIDTH: f32 = 640.0;

/// Settings changes typed into the console, applied once the console lets go of them.
#[derive(Debug, Copy, Clone, PartialEq)]
enum ConsoleRequest {
    Shading(ShadingMode),
    ToggleWireframe,
    PointLights(usize),
    SpotLights(usize),
    Animate(bool),
}

type RequestQueue = Rc<RefCell<Vec<ConsoleRequest>>>;

enum SceneState {
    Loading(SceneLoader<Model>),
    Loaded(LoadedScene<Model>),
}

struct FrameTimer {
    last_frame: Instant,
    window_start: Instant,
    frames: u32,
}

impl FrameTimer {
    fn new() -> Self {
        let now = Instant::now();
        Self {
            last_frame: now,
            window_start: now,
            frames: 0,
        }
    }

    /// Returns the frame delta, and the average frame time once per title update.
    fn tick(&mut self) -> (Duration, Option<Duration>) {
        let now = Instant::now();
        let delta = now - self.last_frame;
        self.last_frame = now;
        self.frames += 1;

        let elapsed = now - self.window_start;
        if elapsed < TITLE_UPDATE_INTERVAL {
            return (delta, None);
        }
        let average = elapsed / self.frames;
        self.window_start = now;
        self.frames = 0;
        (delta, Some(average))
    }
}

/// State that needs a device to exist.
struct DemoState {
    scene: SceneState,
    lights: LightManager,
    point_animators: Vec<PointLightAnimator>,
    spot_animators: Vec<SpotLightAnimator>,
    animate: bool,

    camera: OrbitCamera,
    controller: OrbitCameraController,
    global_world: Mat4,
    scene_scale: f32,

    console: Console<MonospaceMetrics>,
    console_open: bool,
    requests: RequestQueue,

    timer: FrameTimer,
    last_frame_time: Duration,
}

struct DeferredDemo {
    options: DemoOptions,
    state: Option<DemoState>,
}

fn register_commands(console: &mut Console<MonospaceMetrics>, requests: &RequestQueue) -> anyhow::Result<()> {
    let queue = Rc::clone(requests);
    console.register_command(
        "shading",
        Box::new(move |args: &[&str]| match args.first().map(|s| s.parse::<ShadingMode>()) {
            Some(Ok(mode)) => {
                queue.borrow_mut().push(ConsoleRequest::Shading(mode));
                None
            }
            Some(Err(e)) => Some(format!("\t{e}")),
            None => Some("\tusage: shading <tiled|no-cull>".into()),
        }),
    )?;

    let queue = Rc::clone(requests);
    console.register_command(
        "wireframe",
        Box::new(move |_: &[&str]| {
            queue.borrow_mut().push(ConsoleRequest::ToggleWireframe);
            None
        }),
    )?;

    let queue = Rc::clone(requests);
    console.register_command(
        "lights",
        Box::new(move |args: &[&str]| {
            let counts: Result<Vec<usize>, _> = args.iter().map(|s| s.parse::<usize>()).collect();
            match counts.as_deref() {
                Ok([point, spot]) => {
                    let mut queue = queue.borrow_mut();
                    queue.push(ConsoleRequest::PointLights(*point));
                    queue.push(ConsoleRequest::SpotLights(*spot));
                    None
                }
                _ => Some("\tusage: lights <point count> <spot count>".into()),
            }
        }),
    )?;

    let queue = Rc::clone(requests);
    console.register_command(
        "animate",
        Box::new(move |args: &[&str]| match args.first().copied() {
            Some("on") => {
                queue.borrow_mut().push(ConsoleRequest::Animate(true));
                None
            }
            Some("off") => {
                queue.borrow_mut().push(ConsoleRequest::Animate(false));
                None
            }
            _ => Some("\tusage: animate <on|off>".into()),
        }),
    )?;

    console.register_command(
        "help",
        Box::new(|_: &[&str]| {
            Some(
                "\tshading <tiled|no-cull>\n\twireframe\n\tlights <point count> <spot count>\n\tanimate <on|off>"
                    .into(),
            )
        }),
    )?;

    Ok(())
}

impl DemoState {
    fn apply_requests(&mut self, renderer: &mut Renderer) {
        let requests: Vec<ConsoleRequest> = self.requests.borrow_mut().drain(..).collect();
        for request in requests {
            log::info!("Applying {:?}", request);
            let mut config = renderer.routine.config();
            match request {
                ConsoleRequest::Shading(mode) => config.shading = mode,
                ConsoleRequest::ToggleWireframe => config.wireframe = !config.wireframe,
                ConsoleRequest::PointLights(count) => {
                    self.lights.set_num_point_lights_to_draw(count);
                    self.console
                        .print_text(&format!("\tdrawing {} point lights", self.lights.num_point_lights_to_draw()));
                }
                ConsoleRequest::SpotLights(count) => {
                    self.lights.set_num_spot_lights_to_draw(count);
                    self.console
                        .print_text(&format!("\tdrawing {} spot lights", self.lights.num_spot_lights_to_draw()));
                }
                ConsoleRequest::Animate(animate) => self.animate = animate,
            }
            renderer.routine.set_config(config);
        }
    }

    fn handle_key(&mut self, event: &KeyEvent) {
        if event.state != ElementState::Pressed {
            return;
        }
        if let Key::Character(ref c) = event.logical_key {
            if c.as_str() == "`" {
                self.console_open = !self.console_open;
                return;
            }
        }

        if self.console_open {
            match event.logical_key {
                Key::Named(NamedKey::Enter) => self.console.input_character('\n'),
                Key::Named(NamedKey::Backspace) => self.console.input_character('\u{8}'),
                Key::Named(NamedKey::Escape) => self.console_open = false,
                _ => {
                    if let Some(ref text) = event.text {
                        text.chars().for_each(|c| self.console.input_character(c));
                    }
                }
            }
            return;
        }

        let request = match event.logical_key {
            Key::Character(ref c) => match c.as_str() {
                "1" => ConsoleRequest::Shading(ShadingMode::TiledCompute),
                "2" => ConsoleRequest::Shading(ShadingMode::NoCull),
                "f" | "F" => ConsoleRequest::ToggleWireframe,
                _ => return,
            },
            Key::Named(NamedKey::Space) => ConsoleRequest::Animate(!self.animate),
            _ => return,
        };
        self.requests.borrow_mut().push(request);
    }

    fn update_title(&self, renderer: &Renderer) {
        let mut title = match self.scene {
            SceneState::Loading(_) => String::from("Halfling - loading scene..."),
            SceneState::Loaded(_) => {
                let config = renderer.routine.config();
                let ms = self.last_frame_time.as_secs_f64() * 1000.0;
                format!(
                    "Halfling - {:?}{} - {:.0} fps ({:.2} ms) - {} point / {} spot lights",
                    config.shading,
                    if config.wireframe { " wireframe" } else { "" },
                    if ms > 0.0 { 1000.0 / ms } else { 0.0 },
                    ms,
                    self.lights.num_point_lights_to_draw(),
                    self.lights.num_spot_lights_to_draw(),
                )
            }
        };
        if self.console_open {
            title.push_str(" | ");
            if let Some(line) = self.console.visible_lines(2.0 * CONSOLE_FONT.line_height).next() {
                title.push_str(line.trim());
                title.push_str(" | ");
            }
            title.push_str(&self.console.input_line());
            if self.console.cursor_visible() {
                title.push('_');
            }
        }
        renderer.window.set_title(&title);
    }
}

impl App for DeferredDemo {
    fn backend(&self) -> Option<Backend> {
        self.options.backend
    }

    fn vsync(&self) -> bool {
        self.options.vsync
    }

    fn render_config(&self) -> RenderConfig {
        RenderConfig {
            shading: self.options.shading,
            wireframe: false,
        }
    }

    fn setup(&mut self, renderer: &mut Renderer) -> anyhow::Result<()> {
        profiling::scope!("DeferredDemo::setup");

        let scene_path = &self.options.scene_path;
        let description = SceneDescription::load(scene_path)
            .with_context(|| format!("Failed to read scene {}", scene_path.display()))?;

        let device = &renderer.iad.device;
        let lights = description.build_lights(&mut rand::thread_rng());
        log::info!(
            "{} point lights, {} spot lights",
            lights.point_lights.len(),
            lights.spot_lights.len()
        );
        let mut light_manager =
            LightManager::new(device, lights.point_lights.len().max(1), lights.spot_lights.len().max(1));
        light_manager.set_lights(lights.directional, lights.point_lights, lights.spot_lights);

        let (loader, _textures, _shaders) = WgpuModelLoader::new(
            Arc::clone(device),
            Arc::clone(&renderer.iad.queue),
            Arc::clone(&renderer.materials),
        );
        let manager = Arc::new(ModelManager::new(loader));
        let global_world = description.global_world_transform();
        let (near_clip, far_clip) = (description.near_clip, description.far_clip);
        let scene_scale = description.scene_scale_factor;
        let scene_loader = SceneLoader::spawn(description, scene_path.clone(), manager)?;

        let mut camera = OrbitCamera::new(0.0, 0.45 * std::f32::consts::PI, 100.0);
        camera.set_projection(
            std::f32::consts::FRAC_PI_4,
            renderer.aspect_ratio(),
            near_clip,
            far_clip,
        );
        renderer.routine.projection_changed();

        let requests = RequestQueue::default();
        let mut console = Console::new(CONSOLE_FONT, CONSOLE_WIDTH, DEFAULT_MAX_LINES);
        register_commands(&mut console, &requests)?;

        self.state = Some(DemoState {
            scene: SceneState::Loading(scene_loader),
            lights: light_manager,
            point_animators: lights.point_animators,
            spot_animators: lights.spot_animators,
            animate: true,
            camera,
            controller: OrbitCameraController::default(),
            global_world,
            scene_scale,
            console,
            console_open: false,
            requests,
            timer: FrameTimer::new(),
            last_frame_time: Duration::ZERO,
        });
        Ok(())
    }

    fn handle_event(&mut self, renderer: &mut Renderer, event: &WindowEvent) {
        let state = match self.state.as_mut() {
            Some(state) => state,
            None => return,
        };

        match event {
            WindowEvent::Resized(size) if size.width != 0 && size.height != 0 => {
                state.camera.set_aspect_ratio(renderer.aspect_ratio());
                renderer.routine.projection_changed();
            }
            WindowEvent::KeyboardInput { event, .. } => {
                state.handle_key(event);
                state.apply_requests(renderer);
            }
            _ => {
                state.controller.handle_event(&mut state.camera, event);
            }
        }
    }

    fn render(
        &mut self,
        renderer: &mut Renderer,
        encoder: &mut CommandEncoder,
        target: &TextureView,
    ) -> anyhow::Result<()> {
        let state = match self.state.as_mut() {
            Some(state) => state,
            None => return Ok(()),
        };

        let (delta, average) = state.timer.tick();
        state.console.update(delta);
        if let Some(average) = average {
            state.last_frame_time = average;
            state.update_title(renderer);
        }

        if let SceneState::Loading(ref mut loader) = state.scene {
            match loader.poll() {
                None => {
                    clear_target(encoder, target, LOADING_COLOR);
                    std::thread::sleep(LOADING_POLL_INTERVAL);
                    return Ok(());
                }
                Some(result) => {
                    let scene = result.context("Failed to load the scene")?;
                    let factors = scene.camera_movement_factors(state.scene_scale);
                    log::info!("Camera factors {:?}", factors);
                    state.controller.set_factors(factors);
                    state.scene = SceneState::Loaded(scene);
                }
            }
        }
        let scene = match state.scene {
            SceneState::Loaded(ref scene) => scene,
            SceneState::Loading(_) => return Ok(()),
        };

        if state.animate {
            let dt = delta.as_secs_f32();
            animate_point_lights(&mut state.point_animators, &mut state.lights.point_lights, dt);
            animate_spot_lights(&mut state.spot_animators, &mut state.lights.spot_lights, dt);
        }

        renderer.routine.render(DeferredRoutineRenderArgs {
            device: &renderer.iad.device,
            queue: &renderer.iad.queue,
            encoder,
            camera: CameraData::from(&state.camera),
            lights: &mut state.lights,
            scene: Some(scene),
            global_world: state.global_world,
            target,
        })?;

        Ok(())
    }
}

fn main() -> anyhow::Result<()> {
    let options = match DemoOptions::parse(std::env::args_os().skip(1).collect()) {
        Ok(Some(options)) => options,
        Ok(None) => {
            println!("{HELP}");
            return Ok(());
        }
        Err(e) => {
            eprintln!("{e:#}\n\n{HELP}");
            std::process::exit(1);
        }
    };

    let window_builder = WindowBuilder::new()
        .with_title("Halfling")
        .with_inner_size(PhysicalSize::new(options.width, options.height));

    let app = DeferredDemo { options, state: None };
    halfling_framework::start(app, window_builder)
}
