use std::path::Path;

use crate::{HalflingModelFile, ModelFile, ParseError};

/// Parses `data` and checks every cross reference inside it.
///
/// Loading does not do this; it's meant for tooling and tests.
pub fn verify_file_integrity(data: &[u8]) -> Result<ModelFile, ParseError> {
    let model = HalflingModelFile::read(data)?;
    verify_model(&model)?;
    Ok(model)
}

/// Like [`verify_file_integrity`], reading the file at `path` first.
pub fn verify_path(path: impl AsRef<Path>) -> Result<ModelFile, ParseError> {
    let model = HalflingModelFile::load(path)?;
    verify_model(&model)?;
    Ok(model)
}

fn check_range(subset: usize, what: &'static str, start: u32, len: u32, count: u32) -> Result<(), ParseError> {
    let end = start as u64 + len as u64;
    if end > count as u64 {
        return Err(ParseError::SubsetOutOfRange {
            subset,
            what,
            start: start as u64,
            end,
            count,
        });
    }
    Ok(())
}

fn check_string(model: &ModelFile, what: &'static str, index: u32) -> Result<(), ParseError> {
    if index as usize >= model.strings.len() {
        return Err(ParseError::StringIndexOutOfRange {
            what,
            index,
            len: model.strings.len(),
        });
    }
    Ok(())
}

/// Checks the references inside an already parsed model.
pub fn verify_model(model: &ModelFile) -> Result<(), ParseError> {
    let expected_index_bytes = model.num_indices as u64 * 4;
    if model.index_data.len() as u64 != expected_index_bytes {
        return Err(ParseError::DataSizeMismatch {
            what: "Index",
            expected: expected_index_bytes,
            actual: model.index_data.len() as u64,
        });
    }

    let stride = model.vertex_buffer_desc.structure_byte_stride;
    if stride != 0 {
        let expected_vertex_bytes = model.num_vertices as u64 * stride as u64;
        if model.vertex_data.len() as u64 != expected_vertex_bytes {
            return Err(ParseError::DataSizeMismatch {
                what: "Vertex",
                expected: expected_vertex_bytes,
                actual: model.vertex_data.len() as u64,
            });
        }
    }

    for (index, subset) in model.subsets.iter().enumerate() {
        if subset.vertex_count == 0 || subset.index_count == 0 {
            return Err(ParseError::EmptySubset { subset: index });
        }
        check_range(index, "vertices", subset.vertex_start, subset.vertex_count, model.num_vertices)?;
        check_range(index, "indices", subset.index_start, subset.index_count, model.num_indices)?;
        if subset.material_index as usize >= model.materials.len() {
            return Err(ParseError::MaterialIndexOutOfRange {
                subset: index,
                index: subset.material_index,
                len: model.materials.len(),
            });
        }
    }

    for (material_index, material) in model.materials.iter().enumerate() {
        check_string(model, "Material shader path", material.shader_path_index)?;
        for (texture_index, texture) in material.textures.iter().enumerate() {
            check_string(model, "Material texture path", texture.path_index)?;
            if texture.sampler().is_err() {
                return Err(ParseError::InvalidSampler {
                    material: material_index,
                    texture: texture_index,
                    value: texture.sampler,
                });
            }
        }
    }

    Ok(())
}
