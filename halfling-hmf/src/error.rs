use std::{io, path::PathBuf};

use thiserror::Error;

/// Failure to read or validate a model file.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Failed to read model file {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("File tag {found:#010x} is not a halfling model file tag")]
    BadTag { found: u32 },
    #[error("File format version {found} is not supported, expected {expected}")]
    BadVersion { found: u8, expected: u8 },
    #[error("Unknown flag bits {0:#x}")]
    UnknownFlags(u64),
    #[error("Model file truncated while reading {what} at offset {offset}: needed {needed} bytes, {available} available")]
    Truncated {
        what: &'static str,
        offset: usize,
        needed: usize,
        available: usize,
    },
    #[error("String table entry {index} is not valid UTF-8")]
    InvalidUtf8 { index: usize },
    #[error("{what} references string {index} but the string table has {len} entries")]
    StringIndexOutOfRange { what: &'static str, index: u32, len: usize },
    #[error("Subset {subset} references material {index} but the material table has {len} entries")]
    MaterialIndexOutOfRange { subset: usize, index: u32, len: usize },
    #[error("Subset {subset} has an empty vertex or index range")]
    EmptySubset { subset: usize },
    #[error("Subset {subset} range {start}..{end} lies outside the {count} {what} in the file")]
    SubsetOutOfRange {
        subset: usize,
        what: &'static str,
        start: u64,
        end: u64,
        count: u32,
    },
    #[error("Texture {texture} of material {material} has invalid sampler value {value}")]
    InvalidSampler { material: usize, texture: usize, value: u8 },
    #[error("{what} data is {actual} bytes, expected {expected} bytes for the stored element count")]
    DataSizeMismatch {
        what: &'static str,
        expected: u64,
        actual: u64,
    },
}

/// Failure to serialize a model file.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("Failed to write model file")]
    Io(#[source] io::Error),
    #[error("String table entry {index} is {len} bytes, longer than the 65535 bytes a string can store")]
    StringTooLong { index: usize, len: usize },
    #[error("{what} buffer description says {described} bytes but {actual} bytes of data were given")]
    ByteWidthMismatch {
        what: &'static str,
        described: u32,
        actual: usize,
    },
    #[error("Too many {what} ({count}) to store in a u32 count")]
    TooMany { what: &'static str, count: usize },
}

impl From<io::Error> for WriteError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}
