use glam::Vec3;

use crate::{
    BufferDesc, FileFlags, MaterialEntry, ModelFile, ParseError, Subset, TextureEntry, FILE_FORMAT_VERSION, FILE_TAG,
};

/// Bounds checked little-endian cursor over the file bytes.
struct Reader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    fn bytes(&mut self, len: usize, what: &'static str) -> Result<&'a [u8], ParseError> {
        if len > self.remaining() {
            return Err(ParseError::Truncated {
                what,
                offset: self.offset,
                needed: len,
                available: self.remaining(),
            });
        }
        let slice = &self.data[self.offset..self.offset + len];
        self.offset += len;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self, what: &'static str) -> Result<[u8; N], ParseError> {
        let mut array = [0; N];
        array.copy_from_slice(self.bytes(N, what)?);
        Ok(array)
    }

    fn u8(&mut self, what: &'static str) -> Result<u8, ParseError> {
        Ok(self.array::<1>(what)?[0])
    }

    fn u16(&mut self, what: &'static str) -> Result<u16, ParseError> {
        self.array(what).map(u16::from_le_bytes)
    }

    fn u32(&mut self, what: &'static str) -> Result<u32, ParseError> {
        self.array(what).map(u32::from_le_bytes)
    }

    fn u64(&mut self, what: &'static str) -> Result<u64, ParseError> {
        self.array(what).map(u64::from_le_bytes)
    }

    fn f32(&mut self, what: &'static str) -> Result<f32, ParseError> {
        self.array(what).map(f32::from_le_bytes)
    }

    fn vec3(&mut self, what: &'static str) -> Result<Vec3, ParseError> {
        Ok(Vec3::new(self.f32(what)?, self.f32(what)?, self.f32(what)?))
    }

    /// Fails early when `count` records of `size` bytes cannot possibly fit in the rest of the file.
    fn check_count(&self, count: u32, size: usize, what: &'static str) -> Result<usize, ParseError> {
        let needed = (count as usize).saturating_mul(size);
        if needed > self.remaining() {
            return Err(ParseError::Truncated {
                what,
                offset: self.offset,
                needed,
                available: self.remaining(),
            });
        }
        Ok(count as usize)
    }

    fn buffer_desc(&mut self, what: &'static str) -> Result<BufferDesc, ParseError> {
        let mut fields = [0; 6];
        for field in &mut fields {
            *field = self.u32(what)?;
        }
        Ok(BufferDesc::from_fields(fields))
    }

    fn subset(&mut self) -> Result<Subset, ParseError> {
        const WHAT: &str = "subset table";
        Ok(Subset {
            vertex_start: self.u32(WHAT)?,
            vertex_count: self.u32(WHAT)?,
            index_start: self.u32(WHAT)?,
            index_count: self.u32(WHAT)?,
            aabb_min: self.vec3(WHAT)?,
            aabb_max: self.vec3(WHAT)?,
            material_index: self.u32(WHAT)?,
        })
    }
}

pub(crate) fn read_model_file(data: &[u8]) -> Result<ModelFile, ParseError> {
    let mut reader = Reader::new(data);

    let tag = reader.u32("file tag")?;
    if tag != FILE_TAG {
        return Err(ParseError::BadTag { found: tag });
    }

    let version = reader.u8("file format version")?;
    if version != FILE_FORMAT_VERSION {
        return Err(ParseError::BadVersion {
            found: version,
            expected: FILE_FORMAT_VERSION,
        });
    }

    let raw_flags = reader.u64("flags")?;
    let flags = FileFlags::from_bits(raw_flags).ok_or(ParseError::UnknownFlags(raw_flags))?;

    let mut strings = Vec::new();
    if flags.contains(FileFlags::HAS_STRING_TABLE) {
        let count = reader.u32("string count")?;
        // Every string costs at least its two length bytes.
        let count = reader.check_count(count, 2, "string table")?;
        strings.reserve(count);
        for index in 0..count {
            let len = reader.u16("string length")?;
            let bytes = reader.bytes(len as usize, "string data")?;
            let string = std::str::from_utf8(bytes).map_err(|_| ParseError::InvalidUtf8 { index })?;
            strings.push(string.to_owned());
        }
    }

    let num_vertices = reader.u32("vertex count")?;
    let num_indices = reader.u32("index count")?;

    let vertex_buffer_desc = reader.buffer_desc("vertex buffer description")?;
    let index_buffer_desc = reader.buffer_desc("index buffer description")?;

    let vertex_data = reader.bytes(vertex_buffer_desc.byte_width as usize, "vertex data")?.to_vec();
    let index_data = reader.bytes(index_buffer_desc.byte_width as usize, "index data")?.to_vec();

    let mut materials = Vec::new();
    if flags.contains(FileFlags::HAS_MATERIAL_TABLE) {
        let count = reader.u32("material count")?;
        // Shader path index plus texture count.
        let count = reader.check_count(count, 8, "material table")?;
        materials.reserve(count);
        for _ in 0..count {
            let shader_path_index = reader.u32("material shader path")?;
            let texture_count = reader.u32("material texture count")?;
            let texture_count = reader.check_count(texture_count, 5, "material textures")?;
            let mut textures = Vec::with_capacity(texture_count);
            for _ in 0..texture_count {
                textures.push(TextureEntry {
                    path_index: reader.u32("texture path")?,
                    sampler: reader.u8("texture sampler")?,
                });
            }
            materials.push(MaterialEntry {
                shader_path_index,
                textures,
            });
        }
    }

    let subset_count = reader.u32("subset count")?;
    let subset_count = reader.check_count(subset_count, Subset::SIZE, "subset table")?;
    let subsets = (0..subset_count)
        .map(|_| reader.subset())
        .collect::<Result<Vec<_>, _>>()?;

    if reader.remaining() != 0 {
        log::warn!("Model file has {} trailing bytes", reader.remaining());
    }

    Ok(ModelFile {
        strings,
        num_vertices,
        num_indices,
        vertex_buffer_desc,
        index_buffer_desc,
        vertex_data,
        index_data,
        materials,
        subsets,
    })
}
