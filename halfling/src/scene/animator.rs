use glam::{EulerRot, Quat, Vec3};
use halfling_types::{PackedLight, PointLight, SpotLight};

/// Moves `position` by `velocity * dt`, mirroring it back inside `[min, max]` on every
/// axis it left through. The velocity component of each such axis is negated.
fn bounce(position: Vec3, velocity: &mut Vec3, min: Vec3, max: Vec3, dt: f32) -> Vec3 {
    let mut next = position + *velocity * dt;
    for axis in 0..3 {
        if next[axis] > max[axis] {
            next[axis] = max[axis] - (next[axis] - max[axis]);
            velocity[axis] = -velocity[axis];
        } else if next[axis] < min[axis] {
            next[axis] = min[axis] + (min[axis] - next[axis]);
            velocity[axis] = -velocity[axis];
        }
    }
    next
}

/// Bounces a point light around inside a box.
#[derive(Debug, Clone, PartialEq)]
pub struct PointLightAnimator {
    light_index: usize,
    velocity: Vec3,
    min: Vec3,
    max: Vec3,
}

impl PointLightAnimator {
    pub fn new(light_index: usize, velocity: Vec3, min: Vec3, max: Vec3) -> Self {
        Self {
            light_index,
            velocity,
            min,
            max,
        }
    }

    pub fn light_index(&self) -> usize {
        self.light_index
    }

    pub fn velocity(&self) -> Vec3 {
        self.velocity
    }

    pub fn animate(&mut self, light: &mut PointLight, dt: f32) {
        let position = bounce(light.position(), &mut self.velocity, self.min, self.max, dt);
        light.set_position(position);
    }
}

/// Bounces a spot light around inside a box while spinning its direction.
#[derive(Debug, Clone, PartialEq)]
pub struct SpotLightAnimator {
    light_index: usize,
    velocity: Vec3,
    min: Vec3,
    max: Vec3,
    /// Radians per second of pitch (x), yaw (y) and roll (z).
    angular_velocity: Vec3,
}

impl SpotLightAnimator {
    pub fn new(light_index: usize, velocity: Vec3, min: Vec3, max: Vec3, angular_velocity: Vec3) -> Self {
        Self {
            light_index,
            velocity,
            min,
            max,
            angular_velocity,
        }
    }

    pub fn light_index(&self) -> usize {
        self.light_index
    }

    pub fn velocity(&self) -> Vec3 {
        self.velocity
    }

    pub fn animate(&mut self, light: &mut SpotLight, dt: f32) {
        if self.velocity != Vec3::ZERO {
            let position = bounce(light.position(), &mut self.velocity, self.min, self.max, dt);
            light.set_position(position);
        }
        if self.angular_velocity != Vec3::ZERO {
            let w = self.angular_velocity * dt;
            // Roll first, then pitch, then yaw.
            let rotation = Quat::from_euler(EulerRot::YXZ, w.y, w.x, w.z);
            light.set_direction(rotation * light.direction());
        }
    }
}

/// Runs every animator against the light it points at. Animators pointing past the end are skipped.
pub fn animate_point_lights(animators: &mut [PointLightAnimator], lights: &mut [PointLight], dt: f32) {
    profiling::scope!("animate_point_lights");
    for animator in animators {
        if let Some(light) = lights.get_mut(animator.light_index) {
            animator.animate(light, dt);
        }
    }
}

pub fn animate_spot_lights(animators: &mut [SpotLightAnimator], lights: &mut [SpotLight], dt: f32) {
    profiling::scope!("animate_spot_lights");
    for animator in animators {
        if let Some(light) = lights.get_mut(animator.light_index) {
            animator.animate(light, dt);
        }
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;
    use halfling_types::{PackedLight, PointLight, SpotLight};

    use super::*;

    fn assert_close(a: Vec3, b: Vec3) {
        assert!((a - b).length() < 1e-4, "{:?} != {:?}", a, b);
    }

    #[test]
    fn moves_inside_the_box() {
        let mut light = PointLight::new(Vec3::ONE, Vec3::ZERO, 100.0, 5.0);
        let mut animator = PointLightAnimator::new(0, Vec3::new(1.0, 2.0, 0.0), Vec3::splat(-10.0), Vec3::splat(10.0));
        animator.animate(&mut light, 0.5);
        assert_close(light.position(), Vec3::new(0.5, 1.0, 0.0));
        assert_eq!(animator.velocity(), Vec3::new(1.0, 2.0, 0.0));
    }

    #[test]
    fn reflects_off_the_faces() {
        let mut light = PointLight::new(Vec3::ONE, Vec3::new(9.0, -9.0, 0.0), 100.0, 5.0);
        let mut animator = PointLightAnimator::new(0, Vec3::new(4.0, -4.0, 0.0), Vec3::splat(-10.0), Vec3::splat(10.0));
        animator.animate(&mut light, 1.0);

        // 9 + 4 overshoots 10 by 3 and comes back to 7, same on the negative side.
        assert_close(light.position(), Vec3::new(7.0, -7.0, 0.0));
        assert_eq!(animator.velocity(), Vec3::new(-4.0, 4.0, 0.0));

        animator.animate(&mut light, 1.0);
        assert_close(light.position(), Vec3::new(3.0, -3.0, 0.0));
    }

    #[test]
    fn spins_spot_lights() {
        let mut light = SpotLight::new(Vec3::ONE, Vec3::ZERO, 100.0, 10.0, Vec3::Z, 0.5, 0.1);
        let mut animator = SpotLightAnimator::new(
            0,
            Vec3::ZERO,
            Vec3::ZERO,
            Vec3::ZERO,
            Vec3::new(0.0, std::f32::consts::FRAC_PI_2, 0.0),
        );
        animator.animate(&mut light, 1.0);

        // A quarter turn of yaw takes +Z to +X.
        assert_close(light.direction(), Vec3::X);
        assert_eq!(light.position(), Vec3::ZERO);
    }

    #[test]
    fn stale_indices_are_skipped() {
        let mut lights = vec![PointLight::new(Vec3::ONE, Vec3::ZERO, 100.0, 5.0)];
        let mut animators = vec![
            PointLightAnimator::new(0, Vec3::X, Vec3::splat(-1.0), Vec3::splat(1.0)),
            PointLightAnimator::new(3, Vec3::X, Vec3::splat(-1.0), Vec3::splat(1.0)),
        ];
        animate_point_lights(&mut animators, &mut lights, 0.25);
        assert_close(lights[0].position(), Vec3::new(0.25, 0.0, 0.0));
    }
}
