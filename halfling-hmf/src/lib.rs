//! Reader and writer for Halfling Model Files.
//!
//! A model file holds one indexed triangle mesh, the string table its materials
//! refer to, a material table and the list of subsets the mesh is drawn with.
//! All multi-byte values are little-endian:
//!
//! ```text
//! u32 tag ("HMF\0")  u8 version  u64 flags
//! [string table]     u32 num_vertices  u32 num_indices
//! BufferDesc vertex  BufferDesc index  vertex bytes  index bytes
//! [material table]   u32 num_subsets   Subset * num_subsets
//! ```

use std::{fs, path::Path};

use bitflags::bitflags;
use glam::Vec3;
use halfling_types::{Aabb, SamplerParseError, TextureSampler, Vertex};

mod error;
mod read;
mod verify;
mod write;

pub use error::*;
pub use verify::*;

/// Builds a little-endian four character code, first character in the lowest byte.
pub const fn make_tag(a: u8, b: u8, c: u8, d: u8) -> u32 {
    (a as u32) << 24 | (b as u32) << 16 | (c as u32) << 8 | d as u32
}

/// Tag every model file begins with. Reads as `HMF\0` on disk.
pub const FILE_TAG: u32 = make_tag(b'\0', b'F', b'M', b'H');
/// The only format version this crate reads and writes.
pub const FILE_FORMAT_VERSION: u8 = 3;

bitflags! {
    /// Optional sections present in a model file.
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub struct FileFlags: u64 {
        const HAS_STRING_TABLE = 0x1;
        const HAS_MATERIAL_TABLE = 0x2;
    }
}

/// Buffer creation parameters stored alongside the raw vertex and index bytes.
///
/// Field order and size match a D3D11 buffer description, 24 bytes on disk.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct BufferDesc {
    pub byte_width: u32,
    pub usage: u32,
    pub bind_flags: u32,
    pub cpu_access_flags: u32,
    pub misc_flags: u32,
    pub structure_byte_stride: u32,
}

impl BufferDesc {
    pub const SIZE: usize = 24;

    pub const USAGE_IMMUTABLE: u32 = 1;
    pub const BIND_VERTEX_BUFFER: u32 = 0x1;
    pub const BIND_INDEX_BUFFER: u32 = 0x2;

    pub fn immutable_vertex(byte_width: u32) -> Self {
        Self {
            byte_width,
            usage: Self::USAGE_IMMUTABLE,
            bind_flags: Self::BIND_VERTEX_BUFFER,
            ..Self::default()
        }
    }

    pub fn immutable_index(byte_width: u32) -> Self {
        Self {
            byte_width,
            usage: Self::USAGE_IMMUTABLE,
            bind_flags: Self::BIND_INDEX_BUFFER,
            ..Self::default()
        }
    }

    fn fields(&self) -> [u32; 6] {
        [
            self.byte_width,
            self.usage,
            self.bind_flags,
            self.cpu_access_flags,
            self.misc_flags,
            self.structure_byte_stride,
        ]
    }

    fn from_fields([byte_width, usage, bind_flags, cpu_access_flags, misc_flags, structure_byte_stride]: [u32; 6]) -> Self {
        Self {
            byte_width,
            usage,
            bind_flags,
            cpu_access_flags,
            misc_flags,
            structure_byte_stride,
        }
    }
}

/// A contiguous range of the mesh drawn with one material.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Subset {
    pub vertex_start: u32,
    pub vertex_count: u32,
    pub index_start: u32,
    pub index_count: u32,
    pub aabb_min: Vec3,
    pub aabb_max: Vec3,
    pub material_index: u32,
}

impl Subset {
    pub const SIZE: usize = 44;

    pub fn aabb(&self) -> Aabb {
        Aabb::new(self.aabb_min, self.aabb_max)
    }
}

/// Texture slot of a material table entry.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TextureEntry {
    /// Index into the string table.
    pub path_index: u32,
    /// Raw sampler value as stored on disk. See [`TextureEntry::sampler`].
    pub sampler: u8,
}

impl TextureEntry {
    pub fn new(path_index: u32, sampler: TextureSampler) -> Self {
        Self {
            path_index,
            sampler: sampler.as_u8(),
        }
    }

    pub fn sampler(&self) -> Result<TextureSampler, SamplerParseError> {
        TextureSampler::from_u8(self.sampler)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterialEntry {
    /// Index into the string table of the material's shader file.
    pub shader_path_index: u32,
    pub textures: Vec<TextureEntry>,
}

/// In-memory form of a model file.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelFile {
    pub strings: Vec<String>,
    pub num_vertices: u32,
    pub num_indices: u32,
    pub vertex_buffer_desc: BufferDesc,
    pub index_buffer_desc: BufferDesc,
    pub vertex_data: Vec<u8>,
    pub index_data: Vec<u8>,
    pub materials: Vec<MaterialEntry>,
    pub subsets: Vec<Subset>,
}

impl ModelFile {
    /// Creates a file around the given geometry with empty string, material and subset tables.
    pub fn from_geometry(vertices: &[Vertex], indices: &[u32]) -> Self {
        let vertex_data = bytemuck::cast_slice::<Vertex, u8>(vertices).to_vec();
        let index_data: Vec<u8> = indices.iter().flat_map(|i| i.to_le_bytes()).collect();

        let mut vertex_buffer_desc = BufferDesc::immutable_vertex(vertex_data.len() as u32);
        vertex_buffer_desc.structure_byte_stride = Vertex::STRIDE;

        Self {
            strings: Vec::new(),
            num_vertices: vertices.len() as u32,
            num_indices: indices.len() as u32,
            vertex_buffer_desc,
            index_buffer_desc: BufferDesc::immutable_index(index_data.len() as u32),
            vertex_data,
            index_data,
            materials: Vec::new(),
            subsets: Vec::new(),
        }
    }

    /// Returns the index of `value` in the string table, appending it if it is not there yet.
    pub fn intern_string(&mut self, value: &str) -> u32 {
        match self.strings.iter().position(|s| s == value) {
            Some(index) => index as u32,
            None => {
                self.strings.push(value.to_owned());
                (self.strings.len() - 1) as u32
            }
        }
    }

    pub fn string(&self, index: u32) -> Option<&str> {
        self.strings.get(index as usize).map(String::as_str)
    }

    pub fn material(&self, index: u32) -> Option<&MaterialEntry> {
        self.materials.get(index as usize)
    }

    /// Union of every subset's bounds.
    pub fn model_aabb(&self) -> Aabb {
        self.subsets.iter().fold(Aabb::EMPTY, |aabb, s| aabb.union(s.aabb()))
    }

    /// Stride of a vertex as recorded in the file, falling back to the size implied by the vertex count.
    pub fn vertex_stride(&self) -> u32 {
        match self.vertex_buffer_desc.structure_byte_stride {
            0 if self.num_vertices != 0 => self.vertex_buffer_desc.byte_width / self.num_vertices,
            stride => stride,
        }
    }

    /// Decodes the vertex bytes. Returns `None` when the stored layout is not [`Vertex`].
    pub fn vertices(&self) -> Option<Vec<Vertex>> {
        if self.vertex_stride() != Vertex::STRIDE || self.vertex_data.len() % Vertex::STRIDE as usize != 0 {
            return None;
        }
        Some(
            self.vertex_data
                .chunks_exact(Vertex::STRIDE as usize)
                .map(bytemuck::pod_read_unaligned)
                .collect(),
        )
    }

    /// Decodes the 32 bit indices. Index data that isn't a whole number of indices is an error.
    pub fn indices(&self) -> Result<Vec<u32>, ParseError> {
        if self.index_data.len() % 4 != 0 {
            return Err(ParseError::DataSizeMismatch {
                what: "Index",
                expected: (self.index_data.len() as u64 / 4) * 4,
                actual: self.index_data.len() as u64,
            });
        }
        Ok(self
            .index_data
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect())
    }

    pub fn flags(&self) -> FileFlags {
        let mut flags = FileFlags::empty();
        flags.set(FileFlags::HAS_STRING_TABLE, !self.strings.is_empty());
        flags.set(FileFlags::HAS_MATERIAL_TABLE, !self.materials.is_empty());
        flags
    }
}

/// Entry points for reading and writing model files.
pub struct HalflingModelFile;

impl HalflingModelFile {
    /// Parses a model file already in memory.
    pub fn read(data: &[u8]) -> Result<ModelFile, ParseError> {
        read::read_model_file(data)
    }

    /// Reads and parses the model file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<ModelFile, ParseError> {
        let path = path.as_ref();
        let data = fs::read(path).map_err(|source| ParseError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        log::debug!("Parsing model file {} ({} bytes)", path.display(), data.len());
        Self::read(&data)
    }

    /// Serializes `model` into `writer`.
    pub fn write<W: std::io::Write + std::io::Seek>(writer: W, model: &ModelFile) -> Result<(), WriteError> {
        write::write_model_file(writer, model)
    }

    /// Serializes `model` into a new file at `path`, replacing any existing file.
    pub fn write_to_path(path: impl AsRef<Path>, model: &ModelFile) -> Result<(), WriteError> {
        let path = path.as_ref();
        let file = fs::File::create(path).map_err(WriteError::Io)?;
        let mut writer = std::io::BufWriter::new(file);
        Self::write(&mut writer, model)?;
        std::io::Write::flush(&mut writer).map_err(WriteError::Io)
    }
}
