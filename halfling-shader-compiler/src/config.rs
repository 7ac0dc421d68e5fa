//! The JSON file listing which shaders to compile.

use std::{fmt, str::FromStr};

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MacroError {
    #[error("Unterminated macro in {0:?}")]
    Unterminated(String),
    #[error("Environment variable {name:?} used in {input:?} is not set")]
    UnknownVariable { name: String, input: String },
}

/// Replaces every `$(NAME)` in `input` with `lookup(NAME)`.
pub fn expand_macros(input: &str, lookup: impl Fn(&str) -> Option<String>) -> Result<String, MacroError> {
    let mut output = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(start) = rest.find("$(") {
        output.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after.find(')').ok_or_else(|| MacroError::Unterminated(input.to_owned()))?;
        let name = &after[..end];
        let value = lookup(name).ok_or_else(|| MacroError::UnknownVariable {
            name: name.to_owned(),
            input: input.to_owned(),
        })?;
        output.push_str(&value);
        rest = &after[end + 1..];
    }
    output.push_str(rest);
    Ok(output)
}

/// [`expand_macros`] against the process environment.
pub fn expand_env_macros(input: &str) -> Result<String, MacroError> {
    expand_macros(input, |name| std::env::var(name).ok())
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ShaderType {
    Vertex,
    Hull,
    Domain,
    Geometry,
    Pixel,
    Compute,
}

impl ShaderType {
    /// Profile prefix fxc expects.
    pub fn profile_prefix(self) -> &'static str {
        match self {
            Self::Vertex => "vs",
            Self::Hull => "hs",
            Self::Domain => "ds",
            Self::Geometry => "gs",
            Self::Pixel => "ps",
            Self::Compute => "cs",
        }
    }
}

impl FromStr for ShaderType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_lowercase().as_str() {
            "vs" | "vertex" => Self::Vertex,
            "hs" | "hull" => Self::Hull,
            "ds" | "domain" => Self::Domain,
            "gs" | "geometry" => Self::Geometry,
            "ps" | "pixel" => Self::Pixel,
            "cs" | "compute" => Self::Compute,
            _ => return Err(format!("undefined shader type {s:?}")),
        })
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum ShaderModel {
    Sm2_0,
    Sm3_0,
    Sm4_0,
    Sm4_1,
    #[default]
    Sm5_0,
}

impl ShaderModel {
    /// Unknown models fall back to 5.0.
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim() {
            "2.0" => Self::Sm2_0,
            "3.0" => Self::Sm3_0,
            "4.0" => Self::Sm4_0,
            "4.1" => Self::Sm4_1,
            "5.0" => Self::Sm5_0,
            other => {
                log::warn!("Unknown shader model {:?}, using 5.0", other);
                Self::Sm5_0
            }
        }
    }
}

impl fmt::Display for ShaderModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Sm2_0 => "2_0",
            Self::Sm3_0 => "3_0",
            Self::Sm4_0 => "4_0",
            Self::Sm4_1 => "4_1",
            Self::Sm5_0 => "5_0",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CompilerConfig {
    #[serde(rename = "FXCPath")]
    pub fxc_path: String,
    pub output_directory: String,
    #[serde(default)]
    pub additional_include_directories: Vec<String>,
    #[serde(default)]
    pub shaders_to_compile: Vec<ShaderEntry>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ShaderEntry {
    pub input_file_path: String,
    /// Defaults to the input path with a `.cso` extension.
    #[serde(default)]
    pub output_file_path: Option<String>,
    pub entry_point_name: String,
    /// Parsed per shader so one bad entry doesn't reject the whole file.
    pub shader_type: String,
    #[serde(default)]
    pub shader_model: Option<String>,
    #[serde(default)]
    pub additional_includes: Vec<String>,
    #[serde(default, rename = "Pre-ProcessorDefines")]
    pub pre_processor_defines: Vec<String>,
}

impl CompilerConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl ShaderEntry {
    pub fn shader_model(&self) -> ShaderModel {
        self.shader_model
            .as_deref()
            .map_or(ShaderModel::default(), ShaderModel::parse_lenient)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(name: &str) -> Option<String> {
        match name {
            "SDK" => Some("C:/sdk".into()),
            "ARCH" => Some("x64".into()),
            _ => None,
        }
    }

    #[test]
    fn macros_expand() {
        assert_eq!(
            expand_macros("$(SDK)/bin/$(ARCH)/fxc.exe", lookup).unwrap(),
            "C:/sdk/bin/x64/fxc.exe"
        );
        assert_eq!(expand_macros("plain/path", lookup).unwrap(), "plain/path");
        assert_eq!(expand_macros("cost $5", lookup).unwrap(), "cost $5");
    }

    #[test]
    fn macro_errors() {
        assert_eq!(
            expand_macros("$(NOPE)/x", lookup),
            Err(MacroError::UnknownVariable {
                name: "NOPE".into(),
                input: "$(NOPE)/x".into()
            })
        );
        assert_eq!(
            expand_macros("$(SDK/x", lookup),
            Err(MacroError::Unterminated("$(SDK/x".into()))
        );
    }

    #[test]
    fn shader_types() {
        assert_eq!("ps".parse::<ShaderType>(), Ok(ShaderType::Pixel));
        assert_eq!("Compute".parse::<ShaderType>(), Ok(ShaderType::Compute));
        assert!("tessellation".parse::<ShaderType>().is_err());
        assert_eq!(ShaderType::Hull.profile_prefix(), "hs");
    }

    #[test]
    fn shader_models() {
        assert_eq!(ShaderModel::parse_lenient("4.1").to_string(), "4_1");
        assert_eq!(ShaderModel::parse_lenient("6.0"), ShaderModel::Sm5_0);
    }

    #[test]
    fn parses_config() {
        let config = CompilerConfig::from_json(
            r#"{
                "FXCPath": "$(DXSDK_DIR)/fxc.exe",
                "OutputDirectory": "compiled",
                "AdditionalIncludeDirectories": ["shaders/include"],
                "ShadersToCompile": [
                    {
                        "InputFilePath": "shaders/gbuffer_vs.hlsl",
                        "EntryPointName": "main",
                        "ShaderType": "vs",
                        "AdditionalIncludes": ["types.hlsli"],
                        "Pre-ProcessorDefines": ["INSTANCED=1"]
                    },
                    {
                        "InputFilePath": "shaders/gather_cs.hlsl",
                        "OutputFilePath": "gather.cso",
                        "EntryPointName": "CSMain",
                        "ShaderType": "cs",
                        "ShaderModel": "5.0"
                    }
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(config.additional_include_directories, ["shaders/include"]);
        let [vs, cs] = &config.shaders_to_compile[..] else {
            panic!("expected two shaders");
        };
        assert_eq!(vs.output_file_path, None);
        assert_eq!(vs.shader_model(), ShaderModel::Sm5_0);
        assert_eq!(vs.pre_processor_defines, ["INSTANCED=1"]);
        assert_eq!(cs.output_file_path.as_deref(), Some("gather.cso"));
        assert!(cs.additional_includes.is_empty());
    }
}
