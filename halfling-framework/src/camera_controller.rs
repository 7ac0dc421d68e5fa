use glam::Vec2;
use halfling::{camera::OrbitCamera, scene::CameraMovementFactors};
use winit::event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent};

/// Pixels of drag per radian of rotation.
const PIXELS_PER_RADIAN: f32 = 300.0;

/// Scroll units of one wheel notch, so the scene's scroll factor means the same for lines and pixels.
const WHEEL_DELTA: f32 = 120.0;

/// Drives an [`OrbitCamera`] with the mouse: left drag orbits, right or middle drag pans,
/// the wheel zooms.
#[derive(Debug, Default, Clone)]
pub struct OrbitCameraController {
    factors: CameraMovementFactors,
    rotating: bool,
    panning: bool,
    last_cursor: Option<Vec2>,
}

impl OrbitCameraController {
    pub fn new(factors: CameraMovementFactors) -> Self {
        Self {
            factors,
            ..Self::default()
        }
    }

    /// Pan and zoom speed usually depend on the size of the loaded scene.
    pub fn set_factors(&mut self, factors: CameraMovementFactors) {
        self.factors = factors;
    }

    pub fn mouse_button(&mut self, button: MouseButton, pressed: bool) {
        match button {
            MouseButton::Left => self.rotating = pressed,
            MouseButton::Right | MouseButton::Middle => self.panning = pressed,
            _ => {}
        }
    }

    pub fn cursor_moved(&mut self, camera: &mut OrbitCamera, position: Vec2) -> bool {
        let last = self.last_cursor.replace(position);
        let delta = match last {
            Some(last) => last - position,
            None => return false,
        };

        if self.rotating {
            camera.rotate(delta.x / PIXELS_PER_RADIAN, delta.y / PIXELS_PER_RADIAN);
            true
        } else if self.panning {
            camera.pan(-delta.x * self.factors.pan, delta.y * self.factors.pan);
            true
        } else {
            false
        }
    }

    /// `delta` is in wheel units, positive away from the user.
    pub fn scrolled(&mut self, camera: &mut OrbitCamera, delta: f32) -> bool {
        camera.zoom(delta * self.factors.scroll);
        delta != 0.0
    }

    /// Returns true if the camera moved.
    pub fn handle_event(&mut self, camera: &mut OrbitCamera, event: &WindowEvent) -> bool {
        match *event {
            WindowEvent::MouseInput { state, button, .. } => {
                self.mouse_button(button, state == ElementState::Pressed);
                false
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.cursor_moved(camera, Vec2::new(position.x as f32, position.y as f32))
            }
            WindowEvent::CursorLeft { .. } => {
                self.last_cursor = None;
                false
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let delta = match delta {
                    MouseScrollDelta::LineDelta(_, y) => y * WHEEL_DELTA,
                    MouseScrollDelta::PixelDelta(p) => p.y as f32,
                };
                self.scrolled(camera, delta)
            }
            WindowEvent::Focused(false) => {
                self.rotating = false;
                self.panning = false;
                false
            }
            _ => false,
        }
    }
}
