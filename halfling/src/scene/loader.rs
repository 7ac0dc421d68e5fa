use std::{
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
};

use glam::Mat4;
use halfling_types::Aabb;

use crate::{
    managers::model::{resolve_asset_path, ModelLoader, ModelManager},
    model::ModelBounds,
    scene::description::{ModelSource, SceneDescription},
    EngineError,
};

/// Converts the scene's extent into camera pan and scroll speeds.
pub const CAMERA_MOVEMENT_SCALE: f32 = 0.0002857;

/// A model drawn once with its own world transform.
pub struct SceneModel<M> {
    pub model: Arc<M>,
    pub world: Mat4,
}

/// A model drawn with one instanced draw per subset.
pub struct InstancedModel<M> {
    pub model: Arc<M>,
    pub instances: Vec<Mat4>,
}

/// Everything the loading thread produced.
pub struct LoadedScene<M> {
    pub models: Vec<SceneModel<M>>,
    pub instanced_models: Vec<InstancedModel<M>>,
}

impl<M> Default for LoadedScene<M> {
    fn default() -> Self {
        Self {
            models: Vec::new(),
            instanced_models: Vec::new(),
        }
    }
}

/// Camera speeds derived from the size of the scene.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct CameraMovementFactors {
    pub pan: f32,
    pub scroll: f32,
}

impl Default for CameraMovementFactors {
    fn default() -> Self {
        Self { pan: 1.0, scroll: 1.0 }
    }
}

impl<M: ModelBounds> LoadedScene<M> {
    /// World space bounds of every placed model, scaled by `scene_scale`. Always contains the origin.
    pub fn bounds(&self, scene_scale: f32) -> Aabb {
        let placed = self
            .models
            .iter()
            .map(|m| (m.model.aabb(), m.world))
            .chain(
                self.instanced_models
                    .iter()
                    .flat_map(|m| m.instances.iter().map(move |&world| (m.model.aabb(), world))),
            );

        placed.fold(Aabb::new(glam::Vec3::ZERO, glam::Vec3::ZERO), |bounds, (aabb, world)| {
            if aabb.is_empty() {
                return bounds;
            }
            bounds.union(aabb.transform(world).scale(scene_scale))
        })
    }

    /// Pan and scroll speeds proportional to the largest extent of the scene.
    pub fn camera_movement_factors(&self, scene_scale: f32) -> CameraMovementFactors {
        let bounds = self.bounds(scene_scale);
        let range = bounds.max.max_element() - bounds.min.min_element();
        if range <= 0.0 {
            return CameraMovementFactors::default();
        }
        CameraMovementFactors {
            pan: range * CAMERA_MOVEMENT_SCALE,
            scroll: range * CAMERA_MOVEMENT_SCALE,
        }
    }
}

/// Loads every model in `description` through `manager`, splitting them into plain and instanced lists.
///
/// Paths in the scene are relative to `scene_path`'s directory.
pub fn load_scene_models<L: ModelLoader>(
    description: &SceneDescription,
    scene_path: &Path,
    manager: &ModelManager<L>,
) -> Result<LoadedScene<L::Model>, EngineError> {
    profiling::scope!("load_scene_models");

    let mut scene = LoadedScene::default();
    for model in &description.models {
        let loaded = match model.source {
            ModelSource::File { ref file_path } => {
                let path = resolve_asset_path(scene_path, file_path);
                manager.get_model(&path.to_string_lossy())?
            }
            ModelSource::Shape(ref shape) => {
                let material = model.material.clone().unwrap_or_default().to_description();
                let mesh = shape.build_mesh();
                let generated = manager
                    .loader()
                    .create_generated_model(shape.name(), &mesh, scene_path, &material)?;
                manager.create_unnamed_model(generated)
            }
        };

        let transforms = model.transforms();
        if transforms.len() > description.model_instance_threshold {
            scene.instanced_models.push(InstancedModel {
                model: loaded,
                instances: transforms,
            });
        } else {
            scene.models.extend(transforms.into_iter().map(|world| SceneModel {
                model: Arc::clone(&loaded),
                world,
            }));
        }
    }

    log::info!(
        "Scene loaded: {} models, {} instanced models",
        scene.models.len(),
        scene.instanced_models.len()
    );
    Ok(scene)
}

/// Sets the flag when dropped, so a panicking loader still reports completion.
struct SetOnDrop(Arc<AtomicBool>);

impl Drop for SetOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

/// Loads a scene's models on one background thread.
///
/// The render thread calls [`poll`](Self::poll) once per frame. The flag is only a hint,
/// the join in `poll` is what makes the loader's writes visible.
pub struct SceneLoader<M> {
    loaded: Arc<AtomicBool>,
    handle: Option<JoinHandle<Result<LoadedScene<M>, EngineError>>>,
}

impl<M: Send + Sync + 'static> SceneLoader<M> {
    pub fn spawn<L>(
        description: SceneDescription,
        scene_path: impl Into<PathBuf>,
        manager: Arc<ModelManager<L>>,
    ) -> Result<Self, EngineError>
    where
        L: ModelLoader<Model = M> + 'static,
    {
        let scene_path = scene_path.into();
        let loaded = Arc::new(AtomicBool::new(false));
        let flag = SetOnDrop(Arc::clone(&loaded));

        let handle = thread::Builder::new()
            .name("scene loader".into())
            .spawn(move || {
                let _flag = flag;
                load_scene_models(&description, &scene_path, &manager)
            })
            .map_err(EngineError::LoaderSpawn)?;

        Ok(Self {
            loaded,
            handle: Some(handle),
        })
    }
}

impl<M> SceneLoader<M> {
    /// True once the thread finished, whether or not `poll` has collected it yet.
    pub fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::Relaxed)
    }

    /// `None` while loading. Returns the result exactly once, joining the thread.
    pub fn poll(&mut self) -> Option<Result<LoadedScene<M>, EngineError>> {
        if !self.is_loaded() {
            return None;
        }
        let handle = self.handle.take()?;
        Some(match handle.join() {
            Ok(result) => result,
            Err(_) => Err(EngineError::LoaderPanicked),
        })
    }
}

impl<M> Drop for SceneLoader<M> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            if self.is_loaded() {
                let _ = handle.join();
            } else {
                log::warn!("Scene loader dropped while still loading, detaching its thread");
            }
        }
    }
}
