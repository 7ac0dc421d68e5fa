use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Sampler state a material texture is read with.
///
/// The discriminants are the values stored in model files.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum TextureSampler {
    LinearClamp = 1,
    LinearBorder = 2,
    LinearWrap = 3,
    PointClamp = 4,
    PointWrap = 5,
    AnisotropicWrap = 6,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SamplerParseError {
    #[error("Sampler value {0} does not name a sampler")]
    InvalidValue(u8),
    #[error("Sampler name {0:?} does not name a sampler")]
    InvalidName(String),
}

impl TextureSampler {
    pub const ALL: [TextureSampler; 6] = [
        TextureSampler::LinearClamp,
        TextureSampler::LinearBorder,
        TextureSampler::LinearWrap,
        TextureSampler::PointClamp,
        TextureSampler::PointWrap,
        TextureSampler::AnisotropicWrap,
    ];

    pub fn from_u8(value: u8) -> Result<Self, SamplerParseError> {
        Self::ALL
            .into_iter()
            .find(|s| *s as u8 == value)
            .ok_or(SamplerParseError::InvalidValue(value))
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Parses names such as `linear_wrap` or `ANISOTROPIC_WRAP`.
    pub fn from_name(name: &str) -> Result<Self, SamplerParseError> {
        Ok(match name.to_ascii_lowercase().as_str() {
            "linear_clamp" => Self::LinearClamp,
            "linear_border" => Self::LinearBorder,
            "linear_wrap" => Self::LinearWrap,
            "point_clamp" => Self::PointClamp,
            "point_wrap" => Self::PointWrap,
            "anisotropic_wrap" => Self::AnisotropicWrap,
            _ => return Err(SamplerParseError::InvalidName(name.to_owned())),
        })
    }

    pub fn is_wrapping(self) -> bool {
        matches!(self, Self::LinearWrap | Self::PointWrap | Self::AnisotropicWrap)
    }
}

impl Default for TextureSampler {
    fn default() -> Self {
        Self::LinearWrap
    }
}

/// A texture reference in a material, before any GPU resources exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureDescription {
    pub file_path: String,
    pub sampler: TextureSampler,
}

/// A material as stored in a model file or scene description.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaterialDescription {
    /// Path of the material's shader, if it overrides the default G-Buffer shader.
    pub shader_path: Option<String>,
    pub textures: Vec<TextureDescription>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sampler_wire_values() {
        for sampler in TextureSampler::ALL {
            assert_eq!(TextureSampler::from_u8(sampler.as_u8()), Ok(sampler));
        }
        assert_eq!(TextureSampler::from_u8(0), Err(SamplerParseError::InvalidValue(0)));
        assert_eq!(TextureSampler::from_u8(7), Err(SamplerParseError::InvalidValue(7)));
    }

    #[test]
    fn sampler_names() {
        assert_eq!(TextureSampler::from_name("Point_Clamp"), Ok(TextureSampler::PointClamp));
        assert!(TextureSampler::from_name("trilinear").is_err());
    }
}
