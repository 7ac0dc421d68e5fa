//! Scene files: which models to load, where to place them and which lights light them.
//!
//! Matrices are 16 floats in row major order with row vectors, the translation in
//! elements 12 to 14. Light blocks are either a single light or a `NumberOfLights`
//! block that is expanded into randomized lights by [`SceneDescription::build_lights`].

use std::path::Path;

use glam::{Mat4, Vec3};
use halfling_types::{DirectionalLight, MaterialDescription, PointLight, SpotLight, TextureDescription, TextureSampler};
use rand::Rng;
use serde::{de, Deserialize, Deserializer};

use crate::{
    geometry::{self, MeshData},
    scene::animator::{PointLightAnimator, SpotLightAnimator},
    EngineError,
};

fn default_near_clip() -> f32 {
    0.1
}

fn default_far_clip() -> f32 {
    5000.0
}

fn default_instance_threshold() -> usize {
    100
}

fn one() -> f32 {
    1.0
}

fn default_lumens_range() -> [f32; 2] {
    [1000.0, 1000.0]
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SceneDescription {
    #[serde(default = "default_near_clip")]
    pub near_clip: f32,
    #[serde(default = "default_far_clip")]
    pub far_clip: f32,
    #[serde(default = "one")]
    pub scene_scale_factor: f32,
    /// Models with more instances than this are drawn instanced.
    #[serde(default = "default_instance_threshold")]
    pub model_instance_threshold: usize,
    #[serde(default)]
    pub models: Vec<ModelDescription>,
    #[serde(default)]
    pub directional_light: Option<DirectionalLightDescription>,
    #[serde(default)]
    pub point_lights: Vec<PointLightDescription>,
    #[serde(default)]
    pub spot_lights: Vec<SpotLightDescription>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ModelDescription {
    #[serde(flatten)]
    pub source: ModelSource,
    /// Only used by generated shapes, model files carry their own materials.
    #[serde(default)]
    pub material: Option<SceneMaterial>,
    #[serde(default)]
    pub instances: Vec<[f32; 16]>,
}

impl ModelDescription {
    /// World transforms of every instance. A model without instances is placed once at the origin.
    pub fn transforms(&self) -> Vec<Mat4> {
        if self.instances.is_empty() {
            return vec![Mat4::IDENTITY];
        }
        // Row major with row vectors reads as column major with column vectors.
        self.instances.iter().map(Mat4::from_cols_array).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ModelSource {
    File {
        #[serde(rename = "FilePath")]
        file_path: String,
    },
    Shape(ShapeDescription),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "Type")]
pub enum ShapeDescription {
    Plane(PlaneDescription),
    Box(BoxDescription),
    Sphere(SphereDescription),
}

impl ShapeDescription {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Plane(_) => "plane",
            Self::Box(_) => "box",
            Self::Sphere(_) => "sphere",
        }
    }

    pub fn build_mesh(&self) -> MeshData {
        match *self {
            Self::Plane(ref p) => geometry::create_grid(
                p.width,
                p.depth,
                p.x_subdivisions,
                p.z_subdivisions,
                p.x_texture_tiling,
                p.z_texture_tiling,
            ),
            Self::Box(ref b) => geometry::create_box(b.width, b.height, b.depth),
            Self::Sphere(ref s) => geometry::create_sphere(s.radius, s.slice_count, s.stack_count),
        }
    }
}

fn default_subdivisions() -> u32 {
    2
}

fn default_slices() -> u32 {
    20
}

fn default_stacks() -> u32 {
    20
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PlaneDescription {
    pub width: f32,
    pub depth: f32,
    #[serde(default = "default_subdivisions")]
    pub x_subdivisions: u32,
    #[serde(default = "default_subdivisions")]
    pub z_subdivisions: u32,
    #[serde(default = "one")]
    pub x_texture_tiling: f32,
    #[serde(default = "one")]
    pub z_texture_tiling: f32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BoxDescription {
    pub width: f32,
    pub height: f32,
    pub depth: f32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SphereDescription {
    pub radius: f32,
    #[serde(default = "default_slices")]
    pub slice_count: u32,
    #[serde(default = "default_stacks")]
    pub stack_count: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SceneMaterial {
    #[serde(default, rename = "HMATFilePath")]
    pub hmat_file_path: Option<String>,
    #[serde(default)]
    pub textures: Vec<SceneTexture>,
}

impl SceneMaterial {
    pub fn to_description(&self) -> MaterialDescription {
        MaterialDescription {
            shader_path: self.hmat_file_path.clone(),
            textures: self
                .textures
                .iter()
                .map(|t| TextureDescription {
                    file_path: t.file_path.clone(),
                    sampler: t.sampler,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SceneTexture {
    pub file_path: String,
    #[serde(default, deserialize_with = "deserialize_sampler")]
    pub sampler: TextureSampler,
}

/// Samplers are written either by name (`"linear_wrap"`) or by their file value (`3`).
fn deserialize_sampler<'de, D: Deserializer<'de>>(deserializer: D) -> Result<TextureSampler, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Name(String),
        Value(u8),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Name(name) => TextureSampler::from_name(&name),
        Raw::Value(value) => TextureSampler::from_u8(value),
    }
    .map_err(de::Error::custom)
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DirectionalLightDescription {
    pub color: [f32; 3],
    pub direction: [f32; 3],
    #[serde(default = "one")]
    pub intensity: f32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum PointLightDescription {
    Random(RandomPointLights),
    Single(SinglePointLight),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SinglePointLight {
    pub color: [f32; 3],
    pub lumens: f32,
    pub position: [f32; 3],
    pub range: f32,
    #[serde(default)]
    pub linear_velocity: Option<[f32; 3]>,
    #[serde(default, rename = "AABB_min")]
    pub aabb_min: Option<[f32; 3]>,
    #[serde(default, rename = "AABB_max")]
    pub aabb_max: Option<[f32; 3]>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RandomPointLights {
    pub number_of_lights: usize,
    #[serde(rename = "AABB_min")]
    pub aabb_min: [f32; 3],
    #[serde(rename = "AABB_max")]
    pub aabb_max: [f32; 3],
    pub range_range: [f32; 2],
    #[serde(default = "default_lumens_range")]
    pub lumens_range: [f32; 2],
    #[serde(default)]
    pub linear_velocity_min_range: [f32; 3],
    #[serde(default)]
    pub linear_velocity_max_range: [f32; 3],
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum SpotLightDescription {
    Random(RandomSpotLights),
    Single(SingleSpotLight),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SingleSpotLight {
    pub color: [f32; 3],
    pub lumens: f32,
    pub position: [f32; 3],
    pub range: f32,
    pub direction: [f32; 3],
    pub outer_cone_angle: f32,
    pub inner_cone_angle: f32,
    #[serde(default)]
    pub linear_velocity: Option<[f32; 3]>,
    #[serde(default)]
    pub angular_velocity: Option<[f32; 3]>,
    #[serde(default, rename = "AABB_min")]
    pub aabb_min: Option<[f32; 3]>,
    #[serde(default, rename = "AABB_max")]
    pub aabb_max: Option<[f32; 3]>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RandomSpotLights {
    pub number_of_lights: usize,
    #[serde(rename = "AABB_min")]
    pub aabb_min: [f32; 3],
    #[serde(rename = "AABB_max")]
    pub aabb_max: [f32; 3],
    pub range_range: [f32; 2],
    #[serde(default = "default_lumens_range")]
    pub lumens_range: [f32; 2],
    pub outer_angle_range: [f32; 2],
    pub inner_angle_difference: f32,
    #[serde(default)]
    pub linear_velocity_min_range: [f32; 3],
    #[serde(default)]
    pub linear_velocity_max_range: [f32; 3],
    #[serde(default)]
    pub angular_velocity_min_range: [f32; 3],
    #[serde(default)]
    pub angular_velocity_max_range: [f32; 3],
}

/// Every light in a scene, plus the animators that move some of them.
#[derive(Debug, Clone, Default)]
pub struct SceneLights {
    pub directional: DirectionalLight,
    pub point_lights: Vec<PointLight>,
    pub spot_lights: Vec<SpotLight>,
    pub point_animators: Vec<PointLightAnimator>,
    pub spot_animators: Vec<SpotLightAnimator>,
}

/// Uniform in `[min, max]`. Tolerates `min >= max` instead of panicking like `gen_range`.
fn rand_between(rng: &mut impl Rng, min: f32, max: f32) -> f32 {
    min + rng.gen::<f32>() * (max - min)
}

fn rand_vec3_between(rng: &mut impl Rng, min: Vec3, max: Vec3) -> Vec3 {
    Vec3::new(
        rand_between(rng, min.x, max.x),
        rand_between(rng, min.y, max.y),
        rand_between(rng, min.z, max.z),
    )
}

fn rand_color(rng: &mut impl Rng) -> Vec3 {
    Vec3::new(rng.gen(), rng.gen(), rng.gen())
}

impl SceneDescription {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let path = path.as_ref();
        profiling::scope!("SceneDescription::load");

        let json = std::fs::read_to_string(path).map_err(|e| EngineError::io(path, e))?;
        let description = Self::from_json(&json).map_err(|source| EngineError::SceneJson {
            path: path.to_path_buf(),
            source,
        })?;

        log::info!(
            "Loaded scene {}: {} models, {} point light blocks, {} spot light blocks",
            path.display(),
            description.models.len(),
            description.point_lights.len(),
            description.spot_lights.len()
        );
        Ok(description)
    }

    /// Scales world space by the scene scale factor.
    pub fn global_world_transform(&self) -> Mat4 {
        Mat4::from_scale(Vec3::splat(self.scene_scale_factor))
    }

    /// Expands every light block into concrete lights. Randomized blocks draw from `rng`.
    pub fn build_lights(&self, rng: &mut impl Rng) -> SceneLights {
        profiling::scope!("SceneDescription::build_lights");

        let mut lights = SceneLights::default();
        if let Some(ref d) = self.directional_light {
            lights.directional = DirectionalLight::new(Vec3::from(d.color), Vec3::from(d.direction), d.intensity);
        }

        for block in &self.point_lights {
            match block {
                PointLightDescription::Single(l) => {
                    lights.point_lights.push(PointLight::new(
                        Vec3::from(l.color),
                        Vec3::from(l.position),
                        l.lumens,
                        l.range,
                    ));
                    // Velocity only means something with bounds to bounce in.
                    if let (Some(v), Some(min), Some(max)) = (l.linear_velocity, l.aabb_min, l.aabb_max) {
                        lights.point_animators.push(PointLightAnimator::new(
                            lights.point_lights.len() - 1,
                            Vec3::from(v),
                            Vec3::from(min),
                            Vec3::from(max),
                        ));
                    }
                }
                PointLightDescription::Random(block) => {
                    let (min, max) = (Vec3::from(block.aabb_min), Vec3::from(block.aabb_max));
                    let (v_min, v_max) = (
                        Vec3::from(block.linear_velocity_min_range),
                        Vec3::from(block.linear_velocity_max_range),
                    );
                    let animated = v_min != Vec3::ZERO || v_max != Vec3::ZERO;

                    for _ in 0..block.number_of_lights {
                        let color = rand_color(rng);
                        let position = rand_vec3_between(rng, min, max);
                        let range = rand_between(rng, block.range_range[0], block.range_range[1]);
                        let lumens = rand_between(rng, block.lumens_range[0], block.lumens_range[1]);
                        lights.point_lights.push(PointLight::new(color, position, lumens, range));

                        if animated {
                            let velocity = rand_vec3_between(rng, v_min, v_max);
                            lights.point_animators.push(PointLightAnimator::new(
                                lights.point_lights.len() - 1,
                                velocity,
                                min,
                                max,
                            ));
                        }
                    }
                }
            }
        }

        for block in &self.spot_lights {
            match block {
                SpotLightDescription::Single(l) => {
                    lights.spot_lights.push(SpotLight::new(
                        Vec3::from(l.color),
                        Vec3::from(l.position),
                        l.lumens,
                        l.range,
                        Vec3::from(l.direction),
                        l.outer_cone_angle,
                        l.outer_cone_angle - l.inner_cone_angle,
                    ));

                    let linear = match (l.linear_velocity, l.aabb_min, l.aabb_max) {
                        (Some(v), Some(min), Some(max)) => Some((Vec3::from(v), Vec3::from(min), Vec3::from(max))),
                        _ => None,
                    };
                    let angular = l.angular_velocity.map(Vec3::from).unwrap_or(Vec3::ZERO);
                    let (velocity, min, max) = linear.unwrap_or((Vec3::ZERO, Vec3::ZERO, Vec3::ZERO));

                    if velocity != Vec3::ZERO || angular != Vec3::ZERO {
                        // Without bounds the light only spins in place.
                        let (min, max) = match linear {
                            Some(_) => (min, max),
                            None => (Vec3::splat(f32::NEG_INFINITY), Vec3::splat(f32::INFINITY)),
                        };
                        lights.spot_animators.push(SpotLightAnimator::new(
                            lights.spot_lights.len() - 1,
                            velocity,
                            min,
                            max,
                            angular,
                        ));
                    }
                }
                SpotLightDescription::Random(block) => {
                    let (min, max) = (Vec3::from(block.aabb_min), Vec3::from(block.aabb_max));
                    let (v_min, v_max) = (
                        Vec3::from(block.linear_velocity_min_range),
                        Vec3::from(block.linear_velocity_max_range),
                    );
                    let (w_min, w_max) = (
                        Vec3::from(block.angular_velocity_min_range),
                        Vec3::from(block.angular_velocity_max_range),
                    );
                    let animated = [v_min, v_max, w_min, w_max].iter().any(|v| *v != Vec3::ZERO);

                    for _ in 0..block.number_of_lights {
                        let color = rand_color(rng);
                        let position = rand_vec3_between(rng, min, max);
                        let range = rand_between(rng, block.range_range[0], block.range_range[1]);
                        let lumens = rand_between(rng, block.lumens_range[0], block.lumens_range[1]);
                        let mut direction = rand_vec3_between(rng, Vec3::NEG_ONE, Vec3::ONE);
                        if direction.length_squared() < 1e-6 {
                            direction = Vec3::NEG_Y;
                        }
                        let outer = rand_between(rng, block.outer_angle_range[0], block.outer_angle_range[1]);

                        lights.spot_lights.push(SpotLight::new(
                            color,
                            position,
                            lumens,
                            range,
                            direction,
                            outer,
                            block.inner_angle_difference,
                        ));

                        if animated {
                            let velocity = rand_vec3_between(rng, v_min, v_max);
                            let angular = rand_vec3_between(rng, w_min, w_max);
                            lights.spot_animators.push(SpotLightAnimator::new(
                                lights.spot_lights.len() - 1,
                                velocity,
                                min,
                                max,
                                angular,
                            ));
                        }
                    }
                }
            }
        }

        log::debug!(
            "Built {} point lights ({} animated), {} spot lights ({} animated)",
            lights.point_lights.len(),
            lights.point_animators.len(),
            lights.spot_lights.len(),
            lights.spot_animators.len()
        );
        lights
    }
}

#[cfg(test)]
mod tests {
    use glam::{Mat4, Vec3};
    use halfling_types::{PackedLight, TextureSampler};
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;

    const SCENE: &str = r#"{
        "NearClip": 0.5,
        "FarClip": 2000,
        "SceneScaleFactor": 0.01,
        "ModelInstanceThreshold": 2,
        "Models": [
            {
                "FilePath": "sponza/sponza.hmf",
                "Instances": [[1, 0, 0, 0, 0, 1, 0, 0, 0, 0, 1, 0, 10, 20, 30, 1]]
            },
            {
                "Type": "Plane",
                "Width": 100, "Depth": 50,
                "XSubdivisions": 4, "ZSubdivisions": 3,
                "Material": {
                    "HMATFilePath": "floor.wgsl",
                    "Textures": [
                        { "FilePath": "floor_albedo.png", "Sampler": "anisotropic_wrap" },
                        { "FilePath": "floor_normal.png", "Sampler": 1 }
                    ]
                }
            },
            { "Type": "Sphere", "Radius": 2.0 }
        ],
        "DirectionalLight": { "Color": [1, 0.9, 0.8], "Direction": [0, -1, 0], "Intensity": 2.0 },
        "PointLights": [
            { "Color": [1, 0, 0], "Lumens": 800, "Position": [1, 2, 3], "Range": 25 },
            {
                "NumberOfLights": 10,
                "AABB_min": [-10, 0, -10], "AABB_max": [10, 5, 10],
                "RangeRange": [2, 4], "LumensRange": [100, 200],
                "LinearVelocityMinRange": [-1, 0, -1], "LinearVelocityMaxRange": [1, 0, 1]
            }
        ],
        "SpotLights": [
            {
                "Color": [0, 1, 0], "Lumens": 400, "Position": [0, 10, 0], "Range": 30,
                "Direction": [0, -1, 0], "OuterConeAngle": 0.6, "InnerConeAngle": 0.4,
                "AngularVelocity": [0, 1, 0]
            },
            {
                "NumberOfLights": 5,
                "AABB_min": [-1, -1, -1], "AABB_max": [1, 1, 1],
                "RangeRange": [5, 5], "OuterAngleRange": [0.5, 0.8], "InnerAngleDifference": 0.1
            }
        ]
    }"#;

    #[test]
    fn parses_every_section() {
        let scene = SceneDescription::from_json(SCENE).unwrap();
        assert_eq!(scene.near_clip, 0.5);
        assert_eq!(scene.far_clip, 2000.0);
        assert_eq!(scene.model_instance_threshold, 2);
        assert_eq!(scene.models.len(), 3);

        match &scene.models[0].source {
            ModelSource::File { file_path } => assert_eq!(file_path, "sponza/sponza.hmf"),
            other => panic!("expected a file model, got {:?}", other),
        }
        match &scene.models[1].source {
            ModelSource::Shape(ShapeDescription::Plane(p)) => {
                assert_eq!((p.width, p.depth), (100.0, 50.0));
                assert_eq!((p.x_subdivisions, p.z_subdivisions), (4, 3));
                assert_eq!(p.x_texture_tiling, 1.0);
            }
            other => panic!("expected a plane, got {:?}", other),
        }
        match &scene.models[2].source {
            ModelSource::Shape(ShapeDescription::Sphere(s)) => assert_eq!(s.slice_count, 20),
            other => panic!("expected a sphere, got {:?}", other),
        }

        let material = scene.models[1].material.as_ref().unwrap().to_description();
        assert_eq!(material.shader_path.as_deref(), Some("floor.wgsl"));
        assert_eq!(material.textures[0].sampler, TextureSampler::AnisotropicWrap);
        assert_eq!(material.textures[1].sampler, TextureSampler::LinearClamp);

        assert!(matches!(scene.point_lights[0], PointLightDescription::Single(_)));
        assert!(matches!(scene.point_lights[1], PointLightDescription::Random(_)));
        assert!(matches!(scene.spot_lights[0], SpotLightDescription::Single(_)));
        assert!(matches!(scene.spot_lights[1], SpotLightDescription::Random(_)));
    }

    #[test]
    fn defaults_for_missing_keys() {
        let scene = SceneDescription::from_json("{}").unwrap();
        assert_eq!(scene.near_clip, 0.1);
        assert_eq!(scene.far_clip, 5000.0);
        assert_eq!(scene.scene_scale_factor, 1.0);
        assert_eq!(scene.model_instance_threshold, 100);
        assert!(scene.models.is_empty());
        assert!(scene.directional_light.is_none());
    }

    #[test]
    fn instances_are_row_major() {
        let scene = SceneDescription::from_json(SCENE).unwrap();
        let transforms = scene.models[0].transforms();
        assert_eq!(transforms.len(), 1);
        assert_eq!(transforms[0].transform_point3(Vec3::ZERO), Vec3::new(10.0, 20.0, 30.0));

        // No instances means one, untransformed.
        assert_eq!(scene.models[1].transforms(), vec![Mat4::IDENTITY]);
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(SceneDescription::from_json("{ \"Models\": [ { \"Type\": \"Cone\" } ] }").is_err());
        assert!(SceneDescription::from_json("{ \"NearClip\": ").is_err());
        assert!(SceneDescription::from_json(
            r#"{ "Models": [ { "Type": "Box", "Width": 1, "Height": 1, "Depth": 1,
                 "Material": { "Textures": [ { "FilePath": "a.png", "Sampler": "bilinear" } ] } } ] }"#
        )
        .is_err());
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = SceneDescription::load("definitely/not/a/scene.json").unwrap_err();
        assert!(matches!(err, EngineError::Io { .. }), "{:?}", err);
    }

    #[test]
    fn random_lights_stay_in_their_ranges() {
        let scene = SceneDescription::from_json(SCENE).unwrap();
        let mut lights = scene.build_lights(&mut StdRng::seed_from_u64(7));

        assert_eq!(lights.directional.intensity(), 2.0);
        assert_eq!(lights.point_lights.len(), 11);
        assert_eq!(lights.spot_lights.len(), 6);

        // The single light is not animated, every random one is.
        assert_eq!(lights.point_animators.len(), 10);
        assert!(lights.point_animators.iter().all(|a| a.light_index() >= 1));

        for light in &mut lights.point_lights[1..] {
            let p = light.position();
            assert!(p.cmpge(Vec3::new(-10.0, 0.0, -10.0)).all() && p.cmple(Vec3::new(10.0, 5.0, 10.0)).all());
            assert!((2.0..=4.0).contains(&light.range()));
            assert!((100.0..=200.0).contains(&light.lumens()));
        }

        for light in &lights.spot_lights[1..] {
            assert_eq!(light.range(), 5.0);
            assert!((0.5..=0.8).contains(&light.outer_cone_angle()));
            assert!((light.cone_difference() - 0.1).abs() < 1e-6);
            assert!((light.direction().length() - 1.0).abs() < 1e-4);
        }

        // Only the single spot light spins, the random block has no velocity ranges.
        assert_eq!(lights.spot_animators.len(), 1);
        assert_eq!(lights.spot_animators[0].light_index(), 0);
    }

    #[test]
    fn same_seed_same_lights() {
        let scene = SceneDescription::from_json(SCENE).unwrap();
        let mut a = scene.build_lights(&mut StdRng::seed_from_u64(42));
        let mut b = scene.build_lights(&mut StdRng::seed_from_u64(42));
        for (a, b) in a.point_lights.iter_mut().zip(&mut b.point_lights) {
            assert_eq!(a.shader_packed(), b.shader_packed());
        }
    }

    #[test]
    fn single_spot_cone_difference() {
        let scene = SceneDescription::from_json(SCENE).unwrap();
        let lights = scene.build_lights(&mut StdRng::seed_from_u64(0));
        let spot = &lights.spot_lights[0];
        assert_eq!(spot.outer_cone_angle(), 0.6);
        assert!((spot.cone_difference() - 0.2).abs() < 1e-6);
    }
}
