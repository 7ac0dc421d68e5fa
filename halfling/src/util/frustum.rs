//! Planes and bounding spheres used for culling lights against clusters.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3, Vec4, Vec4Swizzles};

/// Normals shorter than this are left alone by [`ShaderPlane::normalize`].
pub const MIN_PLANE_NORMAL_LENGTH: f32 = 1e-6;

/// Represents a point in space and a radius from that point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingSphere {
    pub center: Vec3,
    pub radius: f32,
}
impl BoundingSphere {
    pub fn new(center: Vec3, radius: f32) -> Self {
        Self { center, radius }
    }

    pub fn apply_transform(self, transform: Mat4) -> Self {
        let max_scale = transform
            .x_axis
            .xyz()
            .length_squared()
            .max(
                transform
                    .y_axis
                    .xyz()
                    .length_squared()
                    .max(transform.z_axis.xyz().length_squared()),
            )
            .sqrt();

        Self {
            center: transform.transform_point3(self.center),
            radius: max_scale * self.radius,
        }
    }
}

/// Represents a plane as a vec4 (or vec3 + f32)
#[derive(Debug, Default, Copy, Clone, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct ShaderPlane {
    pub abc: Vec3,
    pub d: f32,
}

impl ShaderPlane {
    pub fn new(a: f32, b: f32, c: f32, d: f32) -> Self {
        Self {
            abc: Vec3::new(a, b, c),
            d,
        }
    }

    /// Scales the plane so its normal has unit length.
    ///
    /// A degenerate plane is returned unchanged instead of being divided by ~0.
    pub fn normalize(mut self) -> Self {
        let mag = self.abc.length();
        if mag < MIN_PLANE_NORMAL_LENGTH {
            return self;
        }

        self.abc /= mag;
        self.d /= mag;

        self
    }

    /// Signed distance from the plane, positive on the side the normal points to.
    pub fn distance(self, point: Vec3) -> f32 {
        self.abc.dot(point) + self.d
    }

    pub fn as_vec4(self) -> Vec4 {
        self.abc.extend(self.d)
    }
}

#[cfg(test)]
mod tests {
    use glam::{Mat4, Vec3};

    use super::*;

    #[test]
    fn normalize_and_distance() {
        let plane = ShaderPlane::new(0.0, 0.0, 2.0, -4.0).normalize();
        assert_eq!(plane.abc, Vec3::Z);
        assert_eq!(plane.d, -2.0);
        assert_eq!(plane.distance(Vec3::new(5.0, 5.0, 3.0)), 1.0);
    }

    #[test]
    fn degenerate_plane_is_untouched() {
        let plane = ShaderPlane::new(0.0, 0.0, 0.0, 1.0);
        let normalized = plane.normalize();
        assert_eq!(normalized, plane);
        assert!(normalized.d.is_finite());
    }

    #[test]
    fn sphere_transform_uses_largest_scale() {
        let sphere = BoundingSphere::new(Vec3::new(1.0, 0.0, 0.0), 1.0);
        let transform = Mat4::from_translation(Vec3::new(0.0, 2.0, 0.0)) * Mat4::from_scale(Vec3::new(1.0, 3.0, 2.0));
        let moved = sphere.apply_transform(transform);
        assert_eq!(moved.center, Vec3::new(1.0, 2.0, 0.0));
        assert!((moved.radius - 3.0).abs() < 1e-6);
    }
}
