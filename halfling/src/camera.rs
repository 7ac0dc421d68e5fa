use glam::{Mat4, Vec3};

/// Smallest angle the camera keeps from the poles, so the up vector never degenerates.
const POLE_EPSILON: f32 = 0.1;

/// Camera orbiting a target point, described in spherical coordinates.
///
/// Left handed, +Y up. Projection uses reversed depth: the near plane maps to 1 and
/// the far plane to 0.
#[derive(Debug, Clone)]
pub struct OrbitCamera {
    theta: f32,
    phi: f32,
    radius: f32,
    target: Vec3,

    fov_y: f32,
    aspect_ratio: f32,
    near_clip: f32,
    far_clip: f32,
}

impl OrbitCamera {
    pub fn new(theta: f32, phi: f32, radius: f32) -> Self {
        Self {
            theta,
            phi: phi.clamp(POLE_EPSILON, std::f32::consts::PI - POLE_EPSILON),
            radius: radius.max(0.0),
            target: Vec3::ZERO,
            fov_y: std::f32::consts::FRAC_PI_4,
            aspect_ratio: 16.0 / 9.0,
            near_clip: 0.1,
            far_clip: 1000.0,
        }
    }

    pub fn rotate(&mut self, d_theta: f32, d_phi: f32) {
        self.theta = (self.theta + d_theta).rem_euclid(std::f32::consts::TAU);
        self.phi = (self.phi + d_phi).clamp(POLE_EPSILON, std::f32::consts::PI - POLE_EPSILON);
    }

    /// Moves towards the target by `distance`, stopping at it.
    pub fn zoom(&mut self, distance: f32) {
        self.radius = (self.radius - distance).max(0.0);
    }

    /// Moves the target in the camera's screen plane.
    pub fn pan(&mut self, dx: f32, dy: f32) {
        let forward = (self.target - self.position()).normalize_or_zero();
        let right = Vec3::Y.cross(forward).normalize_or_zero();
        let up = forward.cross(right);
        self.target += right * -dx + up * dy;
    }

    pub fn set_target(&mut self, target: Vec3) {
        self.target = target;
    }

    pub fn set_projection(&mut self, fov_y: f32, aspect_ratio: f32, near_clip: f32, far_clip: f32) {
        self.fov_y = fov_y;
        self.aspect_ratio = aspect_ratio;
        self.near_clip = near_clip;
        self.far_clip = far_clip;
    }

    pub fn set_aspect_ratio(&mut self, aspect_ratio: f32) {
        self.aspect_ratio = aspect_ratio;
    }

    pub fn target(&self) -> Vec3 {
        self.target
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    pub fn near_clip(&self) -> f32 {
        self.near_clip
    }

    pub fn far_clip(&self) -> f32 {
        self.far_clip
    }

    pub fn position(&self) -> Vec3 {
        let (sin_phi, cos_phi) = self.phi.sin_cos();
        let (sin_theta, cos_theta) = self.theta.sin_cos();
        self.target + self.radius * Vec3::new(sin_phi * cos_theta, cos_phi, sin_phi * sin_theta)
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_at_lh(self.position(), self.target, Vec3::Y)
    }

    pub fn projection(&self) -> Mat4 {
        Mat4::perspective_lh(self.fov_y, self.aspect_ratio, self.far_clip, self.near_clip)
    }
}

/// Recovers view space depth from a reversed depth buffer value.
pub fn linearize_reversed_depth(depth: f32, near_clip: f32, far_clip: f32) -> f32 {
    near_clip * far_clip / (near_clip + depth * (far_clip - near_clip))
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::*;

    #[test]
    fn reversed_depth_maps_near_to_one() {
        let mut camera = OrbitCamera::new(0.0, 1.0, 10.0);
        camera.set_projection(1.0, 1.5, 0.5, 200.0);
        let proj = camera.projection();

        let near = proj.project_point3(Vec3::new(0.0, 0.0, 0.5));
        let far = proj.project_point3(Vec3::new(0.0, 0.0, 200.0));
        assert!((near.z - 1.0).abs() < 1e-5);
        assert!(far.z.abs() < 1e-5);

        let mid = proj.project_point3(Vec3::new(0.0, 0.0, 17.0));
        assert!((linearize_reversed_depth(mid.z, 0.5, 200.0) - 17.0).abs() < 1e-2);
    }

    #[test]
    fn orbit_stays_at_radius() {
        let mut camera = OrbitCamera::new(0.3, 1.2, 12.0);
        camera.set_target(Vec3::new(1.0, 2.0, 3.0));
        camera.rotate(2.0, 5.0);
        assert!(((camera.position() - camera.target()).length() - 12.0).abs() < 1e-4);

        // Looking at the target puts it on the view space +Z axis.
        let target_view = camera.view().transform_point3(camera.target());
        assert!(target_view.x.abs() < 1e-4 && target_view.y.abs() < 1e-4);
        assert!((target_view.z - 12.0).abs() < 1e-3);
    }

    #[test]
    fn zoom_stops_at_target() {
        let mut camera = OrbitCamera::new(0.0, 1.0, 5.0);
        camera.zoom(2.0);
        assert_eq!(camera.radius(), 3.0);
        camera.zoom(10.0);
        assert_eq!(camera.radius(), 0.0);
    }
}
