use std::{io, path::PathBuf};

use halfling_hmf::ParseError;
use thiserror::Error;

use crate::util::typedefs::SsoString;

/// Reason why the device failed to initialize.
#[derive(Error, Debug)]
pub enum RendererInitializationError {
    #[error("No supported adapter found")]
    MissingAdapter,
    #[error("Device is missing required features: {features:?}")]
    MissingDeviceFeatures { features: wgpu::Features },
    #[error("Device limits are lower than required")]
    LowDeviceLimits,
    #[error("Requesting a device failed")]
    RequestDeviceFailed(#[source] wgpu::RequestDeviceError),
    #[error("Failed to create a surface for the window")]
    SurfaceCreationFailed(#[source] wgpu::CreateSurfaceError),
}

/// Which error filter caught a [`DeviceError`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DeviceErrorKind {
    OutOfMemory,
    Validation,
}

/// A GPU operation failed. Carries what the device reported.
#[derive(Error, Debug)]
#[error("GPU {kind:?} error during {operation}")]
pub struct DeviceError {
    pub operation: &'static str,
    pub kind: DeviceErrorKind,
    #[source]
    pub source: wgpu::Error,
}

impl DeviceError {
    pub fn from_wgpu(operation: &'static str, source: wgpu::Error) -> Self {
        let kind = match source {
            wgpu::Error::OutOfMemory { .. } => DeviceErrorKind::OutOfMemory,
            _ => DeviceErrorKind::Validation,
        };
        Self {
            operation,
            kind,
            source,
        }
    }
}

/// More records were written than a GPU buffer was created for.
#[derive(Error, Debug)]
#[error("Buffer {buffer} holds {capacity} records, {requested} were written")]
pub struct CapacityError {
    pub buffer: SsoString,
    pub requested: usize,
    pub capacity: usize,
}

/// Failure to write records into a [`StructuredBuffer`](crate::util::buffer::StructuredBuffer).
#[derive(Error, Debug)]
pub enum BufferWriteError {
    #[error(transparent)]
    BufferWrite(#[from] CapacityError),
    #[error("Queue could not provide a staging view to write buffer {buffer}")]
    StagingUnavailable { buffer: SsoString },
}

/// Failure to pack lights for upload.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum LightBufferError {
    #[error("Asked to pack {count} lights but the light buffer holds {capacity}")]
    CountExceedsCapacity { count: usize, capacity: usize },
    #[error("Asked to pack {count} lights but only {available} exist")]
    CountExceedsLights { count: usize, available: usize },
}

/// Top level error for everything the engine loads or creates.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Failed to read {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to parse model file")]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Device(#[from] DeviceError),
    #[error(transparent)]
    BufferWrite(#[from] BufferWriteError),
    #[error(transparent)]
    LightBuffer(#[from] LightBufferError),
    #[error("Scene description {} is malformed", path.display())]
    SceneJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Failed to decode texture {}", path.display())]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("Model {path} uses a {stride} byte vertex, only {expected} byte vertices are supported")]
    UnsupportedVertexLayout { path: SsoString, stride: u32, expected: u32 },
    #[error("Material in {path} is invalid: {reason}")]
    InvalidMaterial { path: SsoString, reason: String },
    #[error("Failed to spawn the scene loading thread")]
    LoaderSpawn(#[source] io::Error),
    #[error("Scene loading thread panicked")]
    LoaderPanicked,
}

impl EngineError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
