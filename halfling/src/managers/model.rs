use std::{
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use halfling_hmf::{verify_model, HalflingModelFile, ModelFile};
use halfling_types::{MaterialDescription, Vertex};
use wgpu::{Device, Queue};

use crate::{
    format_sso,
    geometry::MeshData,
    managers::{
        cache::ResourceCache,
        material::{Material, MaterialResources, MaterialTexture},
        shader::{ShaderManager, WgpuShaderLoader},
        texture::{TextureManager, TextureParams, WgpuTextureLoader},
    },
    model::{Model, ModelBounds, ModelSubset},
    util::typedefs::SsoString,
    EngineError,
};

/// Creates models from files.
pub trait ModelLoader: Send + Sync {
    type Model: ModelBounds + Send + Sync;

    fn load_model(&self, path: &str) -> Result<Self::Model, EngineError>;

    /// Uploads a procedurally generated mesh. Material paths resolve against `base`.
    fn create_generated_model(
        &self,
        label: &str,
        mesh: &MeshData,
        base: &Path,
        material: &MaterialDescription,
    ) -> Result<Self::Model, EngineError>;
}

/// Resolves a path stored inside an asset relative to the asset's directory.
pub fn resolve_asset_path(asset_path: &Path, relative: &str) -> PathBuf {
    let relative = Path::new(relative);
    match asset_path.parent() {
        Some(dir) if relative.is_relative() => dir.join(relative),
        _ => relative.to_path_buf(),
    }
}

/// Rejects files the G-Buffer pass can't draw: other vertex layouts, and subsets,
/// materials or strings that point outside the file.
pub fn check_model_file(path: &str, file: &ModelFile) -> Result<(), EngineError> {
    let stride = file.vertex_stride();
    if stride != Vertex::STRIDE {
        return Err(EngineError::UnsupportedVertexLayout {
            path: path.into(),
            stride,
            expected: Vertex::STRIDE,
        });
    }
    verify_model(file)?;
    Ok(())
}

/// Loads model files onto the GPU, pulling textures and shaders through their caches.
pub struct WgpuModelLoader {
    device: Arc<Device>,
    textures: Arc<TextureManager<WgpuTextureLoader>>,
    shaders: Arc<ShaderManager<WgpuShaderLoader>>,
    materials: Arc<MaterialResources>,
}

impl WgpuModelLoader {
    pub fn new(
        device: Arc<Device>,
        queue: Arc<Queue>,
        materials: Arc<MaterialResources>,
    ) -> (Self, Arc<TextureManager<WgpuTextureLoader>>, Arc<ShaderManager<WgpuShaderLoader>>) {
        let textures = Arc::new(TextureManager::new(WgpuTextureLoader::new(Arc::clone(&device), queue)));
        let shaders = Arc::new(ShaderManager::new(WgpuShaderLoader::new(Arc::clone(&device))));
        let loader = Self {
            device,
            textures: Arc::clone(&textures),
            shaders: Arc::clone(&shaders),
            materials,
        };
        (loader, textures, shaders)
    }

    /// Builds a material, resolving texture and shader paths against `base`.
    pub fn create_material(&self, base: &Path, description: &MaterialDescription) -> Result<Material, EngineError> {
        let shader = match description.shader_path.as_deref() {
            Some(path) if !path.is_empty() => {
                let resolved = resolve_asset_path(base, path);
                Some(self.shaders.get_shader(&resolved.to_string_lossy())?)
            }
            _ => None,
        };

        let textures = description
            .textures
            .iter()
            .map(|t| {
                let resolved = resolve_asset_path(base, &t.file_path);
                Ok(MaterialTexture {
                    texture: self
                        .textures
                        .get_texture(&resolved.to_string_lossy(), TextureParams::default())?,
                    sampler: t.sampler,
                })
            })
            .collect::<Result<Vec<_>, EngineError>>()?;

        self.materials.create_material(&self.device, shader, textures)
    }
}

impl ModelLoader for WgpuModelLoader {
    type Model = Model;

    fn load_model(&self, path: &str) -> Result<Model, EngineError> {
        profiling::scope!("load_model", path);

        let file = HalflingModelFile::load(path)?;
        check_model_file(path, &file)?;

        let invalid = |reason: String| EngineError::InvalidMaterial {
            path: path.into(),
            reason,
        };
        let string = |index: u32| {
            file.string(index)
                .map(str::to_owned)
                .ok_or_else(|| invalid(format!("string index {} out of range", index)))
        };

        // Materials are shared by every subset that references them.
        let base = Path::new(path);
        let mut materials: Vec<Option<Arc<Material>>> = vec![None; file.materials.len()];
        let mut subsets = Vec::with_capacity(file.subsets.len());
        for subset in &file.subsets {
            let index = subset.material_index as usize;
            let entry = file
                .material(subset.material_index)
                .ok_or_else(|| invalid(format!("material index {} out of range", index)))?;

            let material = match &materials[index] {
                Some(material) => Arc::clone(material),
                None => {
                    let description = MaterialDescription {
                        shader_path: Some(string(entry.shader_path_index)?),
                        textures: entry
                            .textures
                            .iter()
                            .map(|t| {
                                Ok(halfling_types::TextureDescription {
                                    file_path: string(t.path_index)?,
                                    sampler: t.sampler().map_err(|e| invalid(e.to_string()))?,
                                })
                            })
                            .collect::<Result<_, EngineError>>()?,
                    };
                    let material = Arc::new(self.create_material(base, &description)?);
                    materials[index] = Some(Arc::clone(&material));
                    material
                }
            };

            subsets.push(ModelSubset {
                vertex_start: subset.vertex_start,
                vertex_count: subset.vertex_count,
                index_start: subset.index_start,
                index_count: subset.index_count,
                aabb: subset.aabb(),
                material,
            });
        }

        log::info!(
            "Loaded model {}: {} vertices, {} indices, {} subsets",
            path,
            file.num_vertices,
            file.num_indices,
            subsets.len()
        );

        Model::new(
            &self.device,
            path,
            &file.vertex_data,
            &file.index_data,
            file.num_vertices,
            file.num_indices,
            subsets,
        )
    }

    fn create_generated_model(
        &self,
        label: &str,
        mesh: &MeshData,
        base: &Path,
        material: &MaterialDescription,
    ) -> Result<Model, EngineError> {
        let material = Arc::new(self.create_material(base, material)?);
        let subset = ModelSubset {
            vertex_start: 0,
            vertex_count: mesh.vertices.len() as u32,
            index_start: 0,
            index_count: mesh.indices.len() as u32,
            aabb: mesh.aabb(),
            material,
        };
        Model::from_vertices(&self.device, label, &mesh.vertices, &mesh.indices, vec![subset])
    }
}

/// Cache of models keyed by file path. Generated models get `unnamedModel{N}` keys.
pub struct ModelManager<L: ModelLoader = WgpuModelLoader> {
    loader: L,
    cache: ResourceCache<SsoString, L::Model>,
    next_unnamed: AtomicU64,
}

impl<L: ModelLoader> ModelManager<L> {
    pub fn new(loader: L) -> Self {
        Self {
            loader,
            cache: ResourceCache::new(),
            next_unnamed: AtomicU64::new(0),
        }
    }

    pub fn get_model(&self, path: &str) -> Result<Arc<L::Model>, EngineError> {
        self.cache
            .get_or_try_create(&SsoString::from(path), || self.loader.load_model(path))
    }

    /// Stores a model that has no backing file.
    pub fn create_unnamed_model(&self, model: L::Model) -> Arc<L::Model> {
        let id = self.next_unnamed.fetch_add(1, Ordering::Relaxed);
        self.cache.insert(format_sso!("unnamedModel{}", id), model)
    }

    pub fn loaded_count(&self) -> usize {
        self.cache.len()
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;
    use halfling_hmf::{MaterialEntry, ParseError, Subset};

    use super::*;

    fn triangle_file() -> ModelFile {
        let vertices: Vec<Vertex> = [Vec3::ZERO, Vec3::X, Vec3::Z]
            .into_iter()
            .map(|p| Vertex::new(p, Vec3::Y, [0.0, 0.0], Vec3::X))
            .collect();
        let mut file = ModelFile::from_geometry(&vertices, &[0, 1, 2]);
        let shader = file.intern_string("shaders/brick.wgsl");
        file.materials.push(MaterialEntry {
            shader_path_index: shader,
            textures: Vec::new(),
        });
        file.subsets.push(Subset {
            vertex_start: 0,
            vertex_count: 3,
            index_start: 0,
            index_count: 3,
            aabb_min: Vec3::ZERO,
            aabb_max: Vec3::new(1.0, 0.0, 1.0),
            material_index: 0,
        });
        file
    }

    #[test]
    fn well_formed_file_passes() {
        check_model_file("triangle.hmf", &triangle_file()).unwrap();
    }

    #[test]
    fn subset_past_the_index_buffer_is_rejected() {
        let mut file = triangle_file();
        file.subsets[0].index_count = 6;

        let err = check_model_file("triangle.hmf", &file).unwrap_err();
        assert!(matches!(
            err,
            EngineError::Parse(ParseError::SubsetOutOfRange { subset: 0, what: "indices", end: 6, count: 3, .. })
        ));
    }

    #[test]
    fn subset_past_the_vertex_buffer_is_rejected() {
        let mut file = triangle_file();
        file.subsets[0].vertex_start = 2;

        let err = check_model_file("triangle.hmf", &file).unwrap_err();
        assert!(matches!(
            err,
            EngineError::Parse(ParseError::SubsetOutOfRange { what: "vertices", .. })
        ));
    }

    #[test]
    fn foreign_vertex_layout_is_rejected() {
        let mut file = triangle_file();
        file.vertex_buffer_desc.structure_byte_stride = 32;

        let err = check_model_file("triangle.hmf", &file).unwrap_err();
        assert!(matches!(err, EngineError::UnsupportedVertexLayout { stride: 32, .. }));
    }
}
