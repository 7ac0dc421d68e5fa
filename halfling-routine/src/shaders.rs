//! Embedded WGSL sources and the preprocessor which expands them.
//!
//! Sources are handlebars templates. `{{include "file.wgsl"}}` pastes another
//! embedded file, at most once per rendered shader, and the cluster constants are
//! filled in from [`halfling::cluster`] so the shaders and the CPU side assignment
//! always agree.

use std::collections::{HashMap, HashSet};

use halfling::cluster::{
    COMPUTE_SHADER_TILE_GROUP_DIM, DEPTH_CLUSTER_CALC_BIAS, DEPTH_CLUSTER_CALC_SCALE, NUM_DEPTH_CLUSTERS,
};
use handlebars::{Context, Handlebars, Helper, HelperDef, Output, RenderContext, RenderError};
use parking_lot::Mutex;
use rust_embed::RustEmbed;
use serde::Serialize;
use thiserror::Error;
use wgpu::{Device, ShaderModule, ShaderModuleDescriptor, ShaderSource};

#[derive(RustEmbed)]
#[folder = "$CARGO_MANIFEST_DIR/shaders"]
struct HalflingShaderSources;

#[derive(Debug, Error)]
pub enum ShaderSourceError {
    #[error("Embedded shader {0} is not valid UTF-8")]
    InvalidUtf8(String),
    #[error("Failed to expand shader {name}")]
    Render {
        name: String,
        #[source]
        source: RenderError,
    },
}

/// Values substituted into every shader.
#[derive(Debug, Serialize)]
pub struct ShaderConfig {
    pub tile_dim: u32,
    pub num_depth_clusters: u32,
    pub depth_scale: f32,
    pub depth_bias: f32,
}

impl Default for ShaderConfig {
    fn default() -> Self {
        Self {
            tile_dim: COMPUTE_SHADER_TILE_GROUP_DIM,
            num_depth_clusters: NUM_DEPTH_CLUSTERS,
            depth_scale: DEPTH_CLUSTER_CALC_SCALE,
            depth_bias: DEPTH_CLUSTER_CALC_BIAS,
        }
    }
}

pub struct ShaderPreProcessor {
    files: HashMap<String, String>,
    config: ShaderConfig,
}

impl ShaderPreProcessor {
    pub fn new() -> Result<Self, ShaderSourceError> {
        let mut files = HashMap::new();
        for file in HalflingShaderSources::iter() {
            let Some(contents) = HalflingShaderSources::get(&file) else {
                continue;
            };
            let contents =
                String::from_utf8(contents.data.into_owned()).map_err(|_| ShaderSourceError::InvalidUtf8(file.to_string()))?;
            files.insert(file.to_string(), contents);
        }
        Ok(Self {
            files,
            config: ShaderConfig::default(),
        })
    }

    pub fn add_shader(&mut self, name: &str, contents: &str) {
        self.files.insert(name.to_owned(), contents.to_owned());
    }

    pub fn files(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    /// Expands `base` and everything it includes into a single WGSL source.
    pub fn render_shader(&self, base: &str) -> Result<String, ShaderSourceError> {
        let wrap = |source| ShaderSourceError::Render {
            name: base.to_owned(),
            source,
        };

        let contents = self.files.get(base).ok_or_else(|| {
            wrap(RenderError::new(format!(
                "Base shader {base} is not registered. All registered shaders: {}",
                registered_shader_string(&self.files)
            )))
        })?;

        let mut registry = Handlebars::new();
        registry.set_strict_mode(true);
        registry.register_escape_fn(handlebars::no_escape);
        registry.register_helper("include", Box::new(ShaderIncluder::new(base, &self.files)));

        registry.render_template(contents, &self.config).map_err(wrap)
    }

    pub fn create_module(&self, device: &Device, base: &str) -> Result<ShaderModule, ShaderSourceError> {
        profiling::scope!("create shader module", base);
        let source = self.render_shader(base)?;
        Ok(device.create_shader_module(ShaderModuleDescriptor {
            label: Some(base),
            source: ShaderSource::Wgsl(source.into()),
        }))
    }
}

fn registered_shader_string(files: &HashMap<String, String>) -> String {
    let mut v: Vec<_> = files.keys().cloned().collect();
    v.sort_unstable();
    v.join(", ")
}

struct ShaderIncluder<'a> {
    files: &'a HashMap<String, String>,
    include_state: Mutex<HashSet<String>>,
}

impl<'a> ShaderIncluder<'a> {
    fn new(base: &str, files: &'a HashMap<String, String>) -> Self {
        Self {
            files,
            include_state: Mutex::new(HashSet::from([base.to_owned()])),
        }
    }
}

impl<'a> HelperDef for ShaderIncluder<'a> {
    fn call<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'reg, 'rc>,
        r: &'reg Handlebars<'reg>,
        ctx: &'rc Context,
        _rc: &mut RenderContext<'reg, 'rc>,
        out: &mut dyn Output,
    ) -> handlebars::HelperResult {
        let file_name = match h.param(0).map(|p| p.value()) {
            Some(handlebars::JsonValue::String(s)) => s,
            Some(_) => return Err(RenderError::new("include helper's argument must be a string")),
            None => return Err(RenderError::new("include helper needs the path to include")),
        };

        {
            let mut include_state = self.include_state.lock();
            if !include_state.insert(file_name.clone()) {
                return Ok(());
            }
        }

        let contents = self.files.get(file_name).ok_or_else(|| {
            RenderError::new(format!(
                "Included file \"{file_name}\" is not registered. All registered files: {}",
                registered_shader_string(self.files)
            ))
        })?;

        out.write(&r.render_template(contents, ctx.data())?)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::ShaderPreProcessor;

    #[test]
    fn includes_are_expanded_once() {
        let mut pp = ShaderPreProcessor::new().unwrap();
        pp.add_shader("a.wgsl", "fn a() {}\n");
        pp.add_shader("b.wgsl", "{{include \"a.wgsl\"}}fn b() {}\n");
        pp.add_shader("main.wgsl", "{{include \"a.wgsl\"}}{{include \"b.wgsl\"}}fn main() {}\n");

        let output = pp.render_shader("main.wgsl").unwrap();
        assert_eq!(output, "fn a() {}\nfn b() {}\nfn main() {}\n");
    }

    #[test]
    fn cluster_constants_are_substituted() {
        let pp = ShaderPreProcessor::new().unwrap();
        let output = pp.render_shader("common.wgsl").unwrap();
        assert!(output.contains("const TILE_DIM: u32 = 16u;"));
        assert!(output.contains("const NUM_DEPTH_CLUSTERS: u32 = 64u;"));
        assert!(!output.contains("{{"));
    }

    #[test]
    fn missing_files_are_errors() {
        let mut pp = ShaderPreProcessor::new().unwrap();
        assert!(pp.render_shader("nope.wgsl").is_err());

        pp.add_shader("broken.wgsl", "{{include \"nope.wgsl\"}}");
        assert!(pp.render_shader("broken.wgsl").is_err());
    }

    /// Every entry shader must expand and pass naga's validation.
    #[test]
    fn shaders_validate() {
        let pp = ShaderPreProcessor::new().unwrap();
        for base in ["gbuffer.wgsl", "tiled_gather.wgsl", "nocull_gather.wgsl", "tonemap.wgsl"] {
            let source = pp.render_shader(base).unwrap();
            let module = match naga::front::wgsl::parse_str(&source) {
                Ok(module) => module,
                Err(e) => panic!("{base} failed to parse:\n{}", e.emit_to_string(&source)),
            };
            let mut validator = naga::valid::Validator::new(
                naga::valid::ValidationFlags::all(),
                naga::valid::Capabilities::all(),
            );
            if let Err(e) = validator.validate(&module) {
                panic!("{base} failed to validate: {e:?}");
            }
        }
    }
}
