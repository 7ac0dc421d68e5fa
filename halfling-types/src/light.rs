use bytemuck::{Pod, Zeroable};
use glam::Vec3;

/// Per-channel weights applied after scaling by `lumens / 179`.
const PHOTOMETRIC_CHANNEL_WEIGHTS: Vec3 = Vec3::new(37.735849, 1.492537, 15.384615);

/// Converts a light color and photometric power into the irradiance the shaders consume.
///
/// Linear in `lumens`.
pub fn convert_photometric_to_irradiance(color: Vec3, lumens: f32) -> Vec3 {
    color * (lumens / 179.0) * PHOTOMETRIC_CHANNEL_WEIGHTS
}

fn inverse_or_zero(value: f32) -> f32 {
    if value.abs() <= f32::EPSILON {
        0.0
    } else {
        1.0 / value
    }
}

/// GPU layout of a directional light. Matches `DirectionalLight` in the WGSL shaders.
#[derive(Debug, Default, Copy, Clone, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct ShaderDirectionalLight {
    pub irradiance: [f32; 3],
    pub _padding0: f32,
    pub direction: [f32; 3],
    pub _padding1: f32,
}

/// GPU layout of a point light. Matches `PointLight` in the WGSL shaders.
#[derive(Debug, Default, Copy, Clone, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct ShaderPointLight {
    pub irradiance: [f32; 3],
    pub range: f32,
    pub position: [f32; 3],
    pub inv_range: f32,
}

/// GPU layout of a spot light. Matches `SpotLight` in the WGSL shaders.
#[derive(Debug, Default, Copy, Clone, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct ShaderSpotLight {
    pub irradiance: [f32; 3],
    pub range: f32,
    pub position: [f32; 3],
    pub inv_range: f32,
    pub direction: [f32; 3],
    pub cos_outer_cone_angle: f32,
    pub inv_cos_cone_difference: f32,
    pub _padding: [f32; 3],
}

/// A light which can produce a cached GPU record of itself.
pub trait PackedLight {
    type Packed: Pod;

    /// Returns the GPU record, repacking only if a parameter changed since the last call.
    fn shader_packed(&mut self) -> &Self::Packed;
    fn position(&self) -> Vec3;
    fn range(&self) -> f32;
}

/// Light coming from infinitely far away in a single direction.
#[derive(Debug, Clone)]
pub struct DirectionalLight {
    color: Vec3,
    direction: Vec3,
    intensity: f32,

    packed: ShaderDirectionalLight,
    dirty: bool,
}

impl DirectionalLight {
    pub fn new(color: Vec3, direction: Vec3, intensity: f32) -> Self {
        Self {
            color,
            direction: direction.normalize_or_zero(),
            intensity,
            packed: ShaderDirectionalLight::default(),
            dirty: true,
        }
    }

    pub fn color(&self) -> Vec3 {
        self.color
    }

    pub fn direction(&self) -> Vec3 {
        self.direction
    }

    pub fn intensity(&self) -> f32 {
        self.intensity
    }

    pub fn set_color(&mut self, color: Vec3) {
        self.color = color;
        self.dirty = true;
    }

    pub fn set_direction(&mut self, direction: Vec3) {
        self.direction = direction.normalize_or_zero();
        self.dirty = true;
    }

    pub fn set_intensity(&mut self, intensity: f32) {
        self.intensity = intensity;
        self.dirty = true;
    }

    pub fn shader_packed(&mut self) -> &ShaderDirectionalLight {
        if self.dirty {
            self.packed = ShaderDirectionalLight {
                irradiance: (self.color * self.intensity).to_array(),
                _padding0: 0.0,
                direction: self.direction.to_array(),
                _padding1: 0.0,
            };
            self.dirty = false;
        }
        &self.packed
    }
}

impl Default for DirectionalLight {
    fn default() -> Self {
        Self::new(Vec3::ONE, Vec3::new(0.0, -1.0, 0.0), 1.0)
    }
}

/// Omnidirectional light with a finite range.
#[derive(Debug, Clone)]
pub struct PointLight {
    color: Vec3,
    position: Vec3,
    lumens: f32,
    range: f32,

    packed: ShaderPointLight,
    dirty: bool,
}

impl PointLight {
    pub fn new(color: Vec3, position: Vec3, lumens: f32, range: f32) -> Self {
        Self {
            color,
            position,
            lumens,
            range,
            packed: ShaderPointLight::default(),
            dirty: true,
        }
    }

    pub fn color(&self) -> Vec3 {
        self.color
    }

    pub fn lumens(&self) -> f32 {
        self.lumens
    }

    pub fn set_color(&mut self, color: Vec3) {
        self.color = color;
        self.dirty = true;
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
        self.dirty = true;
    }

    pub fn set_lumens(&mut self, lumens: f32) {
        self.lumens = lumens;
        self.dirty = true;
    }

    pub fn set_range(&mut self, range: f32) {
        self.range = range;
        self.dirty = true;
    }
}

impl PackedLight for PointLight {
    type Packed = ShaderPointLight;

    fn shader_packed(&mut self) -> &ShaderPointLight {
        if self.dirty {
            self.packed = ShaderPointLight {
                irradiance: convert_photometric_to_irradiance(self.color, self.lumens).to_array(),
                range: self.range,
                position: self.position.to_array(),
                inv_range: inverse_or_zero(self.range),
            };
            self.dirty = false;
        }
        &self.packed
    }

    fn position(&self) -> Vec3 {
        self.position
    }

    fn range(&self) -> f32 {
        self.range
    }
}

/// Cone shaped light. The cone is described by its outer angle and the angular
/// width of the falloff band inside it, both in radians.
#[derive(Debug, Clone)]
pub struct SpotLight {
    color: Vec3,
    position: Vec3,
    lumens: f32,
    range: f32,
    direction: Vec3,
    outer_cone_angle: f32,
    cone_difference: f32,

    packed: ShaderSpotLight,
    dirty: bool,
}

impl SpotLight {
    pub fn new(
        color: Vec3,
        position: Vec3,
        lumens: f32,
        range: f32,
        direction: Vec3,
        outer_cone_angle: f32,
        cone_difference: f32,
    ) -> Self {
        Self {
            color,
            position,
            lumens,
            range,
            direction: direction.normalize_or_zero(),
            outer_cone_angle,
            cone_difference,
            packed: ShaderSpotLight::default(),
            dirty: true,
        }
    }

    pub fn color(&self) -> Vec3 {
        self.color
    }

    pub fn lumens(&self) -> f32 {
        self.lumens
    }

    pub fn direction(&self) -> Vec3 {
        self.direction
    }

    pub fn outer_cone_angle(&self) -> f32 {
        self.outer_cone_angle
    }

    pub fn cone_difference(&self) -> f32 {
        self.cone_difference
    }

    pub fn set_color(&mut self, color: Vec3) {
        self.color = color;
        self.dirty = true;
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
        self.dirty = true;
    }

    pub fn set_lumens(&mut self, lumens: f32) {
        self.lumens = lumens;
        self.dirty = true;
    }

    pub fn set_range(&mut self, range: f32) {
        self.range = range;
        self.dirty = true;
    }

    pub fn set_direction(&mut self, direction: Vec3) {
        self.direction = direction.normalize_or_zero();
        self.dirty = true;
    }

    pub fn set_outer_cone_angle(&mut self, angle: f32) {
        self.outer_cone_angle = angle;
        self.dirty = true;
    }

    pub fn set_cone_difference(&mut self, difference: f32) {
        self.cone_difference = difference;
        self.dirty = true;
    }
}

impl PackedLight for SpotLight {
    type Packed = ShaderSpotLight;

    fn shader_packed(&mut self) -> &ShaderSpotLight {
        if self.dirty {
            let cos_outer = self.outer_cone_angle.cos();
            let cos_inner = (self.outer_cone_angle - self.cone_difference).cos();

            self.packed = ShaderSpotLight {
                irradiance: convert_photometric_to_irradiance(self.color, self.lumens).to_array(),
                range: self.range,
                position: self.position.to_array(),
                inv_range: inverse_or_zero(self.range),
                direction: self.direction.to_array(),
                cos_outer_cone_angle: cos_outer,
                inv_cos_cone_difference: inverse_or_zero(cos_inner - cos_outer),
                _padding: [0.0; 3],
            };
            self.dirty = false;
        }
        &self.packed
    }

    fn position(&self) -> Vec3 {
        self.position
    }

    fn range(&self) -> f32 {
        self.range
    }
}

#[cfg(test)]
mod tests {
    use std::mem::size_of;

    use glam::Vec3;

    use super::*;

    #[test]
    fn record_sizes() {
        assert_eq!(size_of::<ShaderDirectionalLight>(), 32);
        assert_eq!(size_of::<ShaderPointLight>(), 32);
        assert_eq!(size_of::<ShaderSpotLight>(), 64);
    }

    #[test]
    fn photometric_is_deterministic() {
        let color = Vec3::new(0.25, 0.5, 1.0);
        let a = convert_photometric_to_irradiance(color, 800.0);
        let b = convert_photometric_to_irradiance(color, 800.0);
        assert_eq!(a.to_array(), b.to_array());
    }

    #[test]
    fn photometric_is_linear_in_lumens() {
        let color = Vec3::new(0.9, 0.3, 0.6);
        let single = convert_photometric_to_irradiance(color, 120.0);
        let double = convert_photometric_to_irradiance(color, 240.0);
        assert!((double - single * 2.0).abs().max_element() < 1e-3);

        assert_eq!(convert_photometric_to_irradiance(color, 0.0), Vec3::ZERO);
    }

    #[test]
    fn photometric_channel_weights() {
        let irradiance = convert_photometric_to_irradiance(Vec3::ONE, 179.0);
        assert!((irradiance - PHOTOMETRIC_CHANNEL_WEIGHTS).abs().max_element() < 1e-4);
    }

    #[test]
    fn point_light_caches_until_modified() {
        let mut light = PointLight::new(Vec3::ONE, Vec3::new(1.0, 2.0, 3.0), 100.0, 4.0);

        let first = *light.shader_packed();
        let second = *light.shader_packed();
        assert_eq!(bytemuck::bytes_of(&first), bytemuck::bytes_of(&second));
        assert_eq!(first.inv_range, 0.25);
        assert_eq!(first.position, [1.0, 2.0, 3.0]);

        light.set_range(8.0);
        let third = *light.shader_packed();
        assert_eq!(third.range, 8.0);
        assert_eq!(third.inv_range, 0.125);

        light.set_lumens(200.0);
        let fourth = *light.shader_packed();
        let expected = convert_photometric_to_irradiance(Vec3::ONE, 200.0).to_array();
        assert_eq!(fourth.irradiance, expected);
    }

    #[test]
    fn point_light_zero_range_does_not_divide() {
        let mut light = PointLight::new(Vec3::ONE, Vec3::ZERO, 100.0, 0.0);
        assert_eq!(light.shader_packed().inv_range, 0.0);
    }

    #[test]
    fn directional_light_irradiance() {
        let mut light = DirectionalLight::new(Vec3::new(1.0, 0.5, 0.25), Vec3::new(0.0, -2.0, 0.0), 2.0);
        let packed = *light.shader_packed();
        assert_eq!(packed.irradiance, [2.0, 1.0, 0.5]);
        assert_eq!(packed.direction, [0.0, -1.0, 0.0]);

        light.set_intensity(4.0);
        assert_eq!(light.shader_packed().irradiance, [4.0, 2.0, 1.0]);
    }

    #[test]
    fn spot_light_cone_terms() {
        let outer = 0.6_f32;
        let difference = 0.2_f32;
        let mut light = SpotLight::new(Vec3::ONE, Vec3::ZERO, 100.0, 10.0, Vec3::Z, outer, difference);

        let packed = *light.shader_packed();
        let cos_outer = outer.cos();
        let cos_inner = (outer - difference).cos();
        assert!((packed.cos_outer_cone_angle - cos_outer).abs() < 1e-6);
        assert!((packed.inv_cos_cone_difference - 1.0 / (cos_inner - cos_outer)).abs() < 1e-2);
        assert!(packed.inv_cos_cone_difference > 0.0);

        light.set_cone_difference(0.0);
        assert_eq!(light.shader_packed().inv_cos_cone_difference, 0.0);

        light.set_direction(Vec3::new(0.0, 0.0, -5.0));
        assert_eq!(light.shader_packed().direction, [0.0, 0.0, -1.0]);
    }
}
