use std::{
    path::Path,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Barrier,
    },
    thread,
    time::Duration,
};

use halfling::{
    geometry::MeshData,
    managers::{ModelLoader, ModelManager, ShaderLoader, ShaderManager, TextureLoader, TextureManager, TextureParams},
    model::ModelBounds,
    scene::{LoadedScene, SceneDescription, SceneLoader},
    types::{glam::Vec3, Aabb, MaterialDescription},
    EngineError,
};

#[derive(Default)]
struct CountingTextureLoader {
    loads: AtomicUsize,
}

impl TextureLoader for CountingTextureLoader {
    type Texture = String;

    fn load_texture(&self, path: &str, params: TextureParams) -> Result<String, EngineError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        // Widen the window in which a second thread could sneak in.
        thread::sleep(Duration::from_millis(5));
        Ok(format!("{}:{}", path, params.srgb))
    }
}

#[derive(Default)]
struct FlakyShaderLoader {
    attempts: AtomicUsize,
}

impl ShaderLoader for FlakyShaderLoader {
    type Shader = &'static str;

    fn load_shader(&self, path: &str) -> Result<&'static str, EngineError> {
        if self.attempts.fetch_add(1, Ordering::SeqCst) == 0 {
            return Err(EngineError::InvalidMaterial {
                path: path.into(),
                reason: "first attempt always fails".into(),
            });
        }
        Ok("module")
    }
}

#[derive(Debug)]
struct MockModel {
    name: String,
    aabb: Aabb,
}

impl ModelBounds for MockModel {
    fn aabb(&self) -> Aabb {
        self.aabb
    }
}

#[derive(Default)]
struct MockModelLoader {
    loads: AtomicUsize,
    generated: AtomicUsize,
}

impl ModelLoader for MockModelLoader {
    type Model = MockModel;

    fn load_model(&self, path: &str) -> Result<MockModel, EngineError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if path.ends_with("panic.hmf") {
            panic!("loader blew up on {}", path);
        }
        if path.ends_with("missing.hmf") {
            return Err(EngineError::io(path, std::io::ErrorKind::NotFound.into()));
        }
        Ok(MockModel {
            name: path.to_owned(),
            aabb: Aabb::new(Vec3::splat(-1.0), Vec3::splat(1.0)),
        })
    }

    fn create_generated_model(
        &self,
        label: &str,
        mesh: &MeshData,
        _base: &Path,
        _material: &MaterialDescription,
    ) -> Result<MockModel, EngineError> {
        self.generated.fetch_add(1, Ordering::SeqCst);
        Ok(MockModel {
            name: label.to_owned(),
            aabb: mesh.aabb(),
        })
    }
}

#[test]
fn repeated_requests_share_one_texture() {
    let manager = TextureManager::new(CountingTextureLoader::default());

    let a = manager.get_texture("brick.png", TextureParams::default()).unwrap();
    let b = manager.get_texture("brick.png", TextureParams::default()).unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(manager.loader().loads.load(Ordering::SeqCst), 1);

    // Different parameters are a different texture.
    let linear = TextureParams {
        srgb: false,
        ..TextureParams::default()
    };
    let c = manager.get_texture("brick.png", linear).unwrap();
    assert!(!Arc::ptr_eq(&a, &c));
    assert_eq!(*c, "brick.png:false");
    assert_eq!(manager.loaded_count(), 2);
}

#[test]
fn concurrent_requests_load_once() {
    const THREADS: usize = 8;

    let manager = TextureManager::new(CountingTextureLoader::default());
    let barrier = Barrier::new(THREADS);

    let textures: Vec<_> = thread::scope(|s| {
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                s.spawn(|| {
                    barrier.wait();
                    manager.get_texture("shared.png", TextureParams::default()).unwrap()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(manager.loader().loads.load(Ordering::SeqCst), 1);
    assert!(textures.iter().all(|t| Arc::ptr_eq(t, &textures[0])));
}

#[test]
fn failed_loads_are_retried() {
    let manager = ShaderManager::new(FlakyShaderLoader::default());
    assert!(manager.get_shader("gbuffer.wgsl").is_err());
    assert_eq!(*manager.get_shader("gbuffer.wgsl").unwrap(), "module");
    assert_eq!(manager.loaded_count(), 1);
}

#[test]
fn unnamed_models_get_unique_entries() {
    let manager = ModelManager::new(MockModelLoader::default());
    let mesh = halfling::geometry::create_box(1.0, 1.0, 1.0);
    let a = manager.create_unnamed_model(
        manager
            .loader()
            .create_generated_model("box", &mesh, Path::new("scene.json"), &MaterialDescription::default())
            .unwrap(),
    );
    let b = manager.create_unnamed_model(
        manager
            .loader()
            .create_generated_model("box", &mesh, Path::new("scene.json"), &MaterialDescription::default())
            .unwrap(),
    );
    assert!(!Arc::ptr_eq(&a, &b));
    assert_eq!(manager.loaded_count(), 2);
}

fn wait_for<M>(loader: &mut SceneLoader<M>) -> Result<LoadedScene<M>, EngineError> {
    for _ in 0..2000 {
        if let Some(result) = loader.poll() {
            return result;
        }
        thread::sleep(Duration::from_millis(5));
    }
    panic!("scene loader never finished");
}

const SCENE: &str = r#"{
    "ModelInstanceThreshold": 1,
    "SceneScaleFactor": 2.0,
    "Models": [
        { "FilePath": "models/crate.hmf", "Instances": [[1,0,0,0, 0,1,0,0, 0,0,1,0, 5,0,0,1]] },
        {
            "FilePath": "models/crate.hmf",
            "Instances": [
                [1,0,0,0, 0,1,0,0, 0,0,1,0, 0,0,0,1],
                [1,0,0,0, 0,1,0,0, 0,0,1,0, 0,0,-20,1]
            ]
        },
        { "Type": "Box", "Width": 2, "Height": 2, "Depth": 2 }
    ]
}"#;

#[test]
fn scene_loader_splits_instanced_models() {
    let description = SceneDescription::from_json(SCENE).unwrap();
    let manager = Arc::new(ModelManager::new(MockModelLoader::default()));

    let mut loader = SceneLoader::spawn(description, "scenes/test.json", Arc::clone(&manager)).unwrap();
    let scene = wait_for(&mut loader).unwrap();

    // The crate file is shared by both entries and loaded once.
    assert_eq!(manager.loader().loads.load(Ordering::SeqCst), 1);
    assert_eq!(manager.loader().generated.load(Ordering::SeqCst), 1);

    assert_eq!(scene.models.len(), 2);
    assert_eq!(scene.instanced_models.len(), 1);
    assert_eq!(scene.instanced_models[0].instances.len(), 2);
    assert!(Arc::ptr_eq(&scene.models[0].model, &scene.instanced_models[0].model));
    assert!(scene.models[0].model.name.ends_with("crate.hmf"));
    assert_eq!(scene.models[1].model.name, "box");

    // Result is handed out once.
    assert!(loader.poll().is_none());

    let bounds = scene.bounds(2.0);
    assert_eq!(bounds.min, Vec3::new(-2.0, -2.0, -42.0));
    assert_eq!(bounds.max, Vec3::new(12.0, 2.0, 2.0));

    let factors = scene.camera_movement_factors(2.0);
    assert!((factors.pan - 54.0 * 0.0002857).abs() < 1e-6);
    assert_eq!(factors.pan, factors.scroll);
}

#[test]
fn scene_loader_reports_errors() {
    let description = SceneDescription::from_json(r#"{ "Models": [ { "FilePath": "missing.hmf" } ] }"#).unwrap();
    let manager = Arc::new(ModelManager::new(MockModelLoader::default()));

    let mut loader = SceneLoader::spawn(description, "scene.json", manager).unwrap();
    assert!(matches!(wait_for(&mut loader), Err(EngineError::Io { .. })));
}

#[test]
fn scene_loader_reports_panics() {
    let description = SceneDescription::from_json(r#"{ "Models": [ { "FilePath": "panic.hmf" } ] }"#).unwrap();
    let manager = Arc::new(ModelManager::new(MockModelLoader::default()));

    let mut loader = SceneLoader::spawn(description, "scene.json", manager).unwrap();
    assert!(matches!(wait_for(&mut loader), Err(EngineError::LoaderPanicked)));
}

#[test]
fn empty_scene_keeps_default_camera_speed() {
    let scene: LoadedScene<MockModel> = LoadedScene::default();
    let factors = scene.camera_movement_factors(1.0);
    assert_eq!((factors.pan, factors.scroll), (1.0, 1.0));
}
