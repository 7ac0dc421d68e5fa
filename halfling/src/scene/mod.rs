//! Scene files and the background thread that loads them.

pub mod animator;
pub mod description;
pub mod loader;

pub use animator::{animate_point_lights, animate_spot_lights, PointLightAnimator, SpotLightAnimator};
pub use description::{ModelDescription, ModelSource, SceneDescription, SceneLights, ShapeDescription};
pub use loader::{load_scene_models, CameraMovementFactors, InstancedModel, LoadedScene, SceneLoader, SceneModel};
