use std::io::{Seek, SeekFrom, Write};

use crate::{ModelFile, Subset, WriteError, FILE_FORMAT_VERSION, FILE_TAG};

fn count(len: usize, what: &'static str) -> Result<u32, WriteError> {
    u32::try_from(len).map_err(|_| WriteError::TooMany { what, count: len })
}

fn check_byte_width(described: u32, data: &[u8], what: &'static str) -> Result<(), WriteError> {
    if described as usize != data.len() {
        return Err(WriteError::ByteWidthMismatch {
            what,
            described,
            actual: data.len(),
        });
    }
    Ok(())
}

fn write_subset<W: Write>(writer: &mut W, subset: &Subset) -> Result<(), WriteError> {
    let mut record = [0_u8; Subset::SIZE];
    let values = [
        subset.vertex_start.to_le_bytes(),
        subset.vertex_count.to_le_bytes(),
        subset.index_start.to_le_bytes(),
        subset.index_count.to_le_bytes(),
        subset.aabb_min.x.to_le_bytes(),
        subset.aabb_min.y.to_le_bytes(),
        subset.aabb_min.z.to_le_bytes(),
        subset.aabb_max.x.to_le_bytes(),
        subset.aabb_max.y.to_le_bytes(),
        subset.aabb_max.z.to_le_bytes(),
        subset.material_index.to_le_bytes(),
    ];
    for (chunk, value) in record.chunks_exact_mut(4).zip(values) {
        chunk.copy_from_slice(&value);
    }
    writer.write_all(&record)?;
    Ok(())
}

pub(crate) fn write_model_file<W: Write + Seek>(mut writer: W, model: &ModelFile) -> Result<(), WriteError> {
    check_byte_width(model.vertex_buffer_desc.byte_width, &model.vertex_data, "Vertex")?;
    check_byte_width(model.index_buffer_desc.byte_width, &model.index_data, "Index")?;
    if let Some((index, s)) = model.strings.iter().enumerate().find(|(_, s)| s.len() > u16::MAX as usize) {
        return Err(WriteError::StringTooLong { index, len: s.len() });
    }

    writer.write_all(&FILE_TAG.to_le_bytes())?;
    writer.write_all(&[FILE_FORMAT_VERSION])?;

    // Placeholder, rewritten once every section is out.
    let flags_position = writer.stream_position()?;
    writer.write_all(&0_u64.to_le_bytes())?;

    let flags = model.flags();

    if !model.strings.is_empty() {
        writer.write_all(&count(model.strings.len(), "strings")?.to_le_bytes())?;
        for string in &model.strings {
            writer.write_all(&(string.len() as u16).to_le_bytes())?;
            writer.write_all(string.as_bytes())?;
        }
    }

    writer.write_all(&model.num_vertices.to_le_bytes())?;
    writer.write_all(&model.num_indices.to_le_bytes())?;

    for desc in [&model.vertex_buffer_desc, &model.index_buffer_desc] {
        for field in desc.fields() {
            writer.write_all(&field.to_le_bytes())?;
        }
    }

    writer.write_all(&model.vertex_data)?;
    writer.write_all(&model.index_data)?;

    if !model.materials.is_empty() {
        writer.write_all(&count(model.materials.len(), "materials")?.to_le_bytes())?;
        for material in &model.materials {
            writer.write_all(&material.shader_path_index.to_le_bytes())?;
            writer.write_all(&count(material.textures.len(), "material textures")?.to_le_bytes())?;
            for texture in &material.textures {
                writer.write_all(&texture.path_index.to_le_bytes())?;
                writer.write_all(&[texture.sampler])?;
            }
        }
    }

    writer.write_all(&count(model.subsets.len(), "subsets")?.to_le_bytes())?;
    for subset in &model.subsets {
        write_subset(&mut writer, subset)?;
    }

    writer.seek(SeekFrom::Start(flags_position))?;
    writer.write_all(&flags.bits().to_le_bytes())?;
    writer.seek(SeekFrom::End(0))?;

    log::debug!(
        "Wrote model file: {} strings, {} materials, {} subsets",
        model.strings.len(),
        model.materials.len(),
        model.subsets.len()
    );

    Ok(())
}
