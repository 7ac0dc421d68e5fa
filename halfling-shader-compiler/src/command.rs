//! Turns config entries into fxc invocations and runs them.

use std::{
    ffi::OsString,
    fs,
    io,
    path::{Path, PathBuf},
    process::{Command, ExitStatus, Stdio},
};

use thiserror::Error;

use crate::config::{expand_macros, CompilerConfig, MacroError, ShaderEntry, ShaderModel, ShaderType};

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("{0}")]
    InvalidEntry(String),
    #[error(transparent)]
    Macro(#[from] MacroError),
    #[error("Could not read shader file {path}")]
    ReadInput {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Could not write temporary file {path}")]
    WriteTemp {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Could not run the compiler {path}")]
    Spawn {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Compile failed ({status}). Command was:\n\n{command}")]
    Failed { status: ExitStatus, command: String },
}

/// Settings shared by every shader in a config file.
#[derive(Debug, Clone, PartialEq)]
pub struct CompilerSettings {
    pub fxc_path: PathBuf,
    pub output_directory: PathBuf,
    pub include_directories: Vec<String>,
    /// Adds `/Od /Zi`.
    pub debug: bool,
}

/// One fully resolved shader compile.
#[derive(Debug, Clone, PartialEq)]
pub struct CompileJob {
    pub input: PathBuf,
    pub output: PathBuf,
    pub entry_point: String,
    pub shader_type: ShaderType,
    pub shader_model: ShaderModel,
    pub includes: Vec<String>,
    pub defines: Vec<String>,
}

fn resolve_path(base: &Path, path: impl Into<PathBuf>) -> PathBuf {
    let path = path.into();
    match path.is_relative() {
        true => base.join(path),
        false => path,
    }
}

impl CompilerSettings {
    /// Relative paths are resolved against `config_dir`, the directory of the config file.
    pub fn new(
        config: &CompilerConfig,
        config_dir: &Path,
        debug: bool,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, MacroError> {
        let include_directories = config
            .additional_include_directories
            .iter()
            .map(|dir| expand_macros(dir, &lookup))
            .collect::<Result<_, _>>()?;
        Ok(Self {
            fxc_path: PathBuf::from(expand_macros(&config.fxc_path, &lookup)?),
            output_directory: resolve_path(config_dir, expand_macros(&config.output_directory, &lookup)?),
            include_directories,
            debug,
        })
    }

    /// Input paths resolve against `config_dir`, output paths against the output directory.
    pub fn job(
        &self,
        entry: &ShaderEntry,
        config_dir: &Path,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<CompileJob, CompileError> {
        let shader_type: ShaderType = entry.shader_type.parse().map_err(|e| {
            CompileError::InvalidEntry(format!("{} for input file {:?}", e, entry.input_file_path))
        })?;

        let input = resolve_path(config_dir, expand_macros(&entry.input_file_path, &lookup)?);
        let output = match entry.output_file_path {
            Some(ref output) => PathBuf::from(expand_macros(output, &lookup)?),
            None => {
                let file_name = input.file_name().map(PathBuf::from).unwrap_or_default();
                file_name.with_extension("cso")
            }
        };

        Ok(CompileJob {
            input,
            output: resolve_path(&self.output_directory, output),
            entry_point: entry.entry_point_name.clone(),
            shader_type,
            shader_model: entry.shader_model(),
            includes: entry.additional_includes.clone(),
            defines: entry.pre_processor_defines.clone(),
        })
    }

    /// Arguments for fxc, compiling `source` for `job`.
    pub fn fxc_args(&self, job: &CompileJob, source: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = Vec::new();
        if self.debug {
            args.push("/Od".into());
            args.push("/Zi".into());
        }
        args.push(format!("/E{}", job.entry_point).into());

        let mut output = OsString::from("/Fo");
        output.push(&job.output);
        args.push(output);

        args.push(format!("/T{}_{}", job.shader_type.profile_prefix(), job.shader_model).into());
        args.push("/nologo".into());

        if !self.include_directories.is_empty() {
            args.push(format!("/I{}", self.include_directories.join(";")).into());
        }
        // Defines can't be joined like include directories.
        for define in &job.defines {
            args.push(format!("/D{define}").into());
        }

        args.push(source.into());
        args
    }

    /// Writes the temporary source next to the output and runs fxc on it.
    pub fn compile(&self, job: &CompileJob) -> Result<(), CompileError> {
        let shader = fs::read_to_string(&job.input).map_err(|source| CompileError::ReadInput {
            path: job.input.clone(),
            source,
        })?;

        let temp = job.output.with_extension("tmp.hlsl");
        if let Some(dir) = temp.parent() {
            fs::create_dir_all(dir).map_err(|source| CompileError::WriteTemp {
                path: dir.to_path_buf(),
                source,
            })?;
        }
        let mut contents = include_prelude(&job.includes);
        contents.push_str(&shader);
        fs::write(&temp, contents).map_err(|source| CompileError::WriteTemp {
            path: temp.clone(),
            source,
        })?;

        let args = self.fxc_args(job, &temp);
        log::debug!("Running {} {:?}", self.fxc_path.display(), args);
        let status = Command::new(&self.fxc_path)
            .args(&args)
            .stdout(Stdio::null())
            .status();

        if let Err(e) = fs::remove_file(&temp) {
            log::warn!("Could not remove {}: {}", temp.display(), e);
        }

        let status = status.map_err(|source| CompileError::Spawn {
            path: self.fxc_path.clone(),
            source,
        })?;
        if !status.success() {
            return Err(CompileError::Failed {
                status,
                command: command_line(&self.fxc_path, &args),
            });
        }
        Ok(())
    }
}

/// `#include` lines for every additional include, in order.
pub fn include_prelude(includes: &[String]) -> String {
    includes
        .iter()
        .map(|include| format!("#include \"{include}\"\r\n"))
        .collect()
}

fn command_line(program: &Path, args: &[OsString]) -> String {
    let mut line = format!("\"{}\"", program.display());
    for arg in args {
        line.push(' ');
        line.push_str(&arg.to_string_lossy());
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn settings(debug: bool) -> CompilerSettings {
        CompilerSettings {
            fxc_path: PathBuf::from("fxc.exe"),
            output_directory: PathBuf::from("out"),
            include_directories: vec!["inc".into(), "common/inc".into()],
            debug,
        }
    }

    fn entry(shader_type: &str) -> ShaderEntry {
        ShaderEntry {
            input_file_path: "shaders/gbuffer_ps.hlsl".into(),
            output_file_path: None,
            entry_point_name: "PSMain".into(),
            shader_type: shader_type.into(),
            shader_model: None,
            additional_includes: vec!["types.hlsli".into()],
            pre_processor_defines: vec!["A=1".into(), "B".into()],
        }
    }

    #[test]
    fn settings_resolve_against_config_dir() {
        let config = CompilerConfig {
            fxc_path: "$(SDK)/fxc.exe".into(),
            output_directory: "compiled".into(),
            additional_include_directories: vec!["$(SDK)/include".into()],
            shaders_to_compile: Vec::new(),
        };
        let lookup = |name: &str| (name == "SDK").then(|| "sdk".to_owned());
        let settings = CompilerSettings::new(&config, Path::new("project"), false, lookup).unwrap();

        assert_eq!(settings.fxc_path, PathBuf::from("sdk/fxc.exe"));
        assert_eq!(settings.output_directory, Path::new("project").join("compiled"));
        assert_eq!(settings.include_directories, ["sdk/include"]);
    }

    #[test]
    fn output_defaults_to_cso_in_output_directory() {
        let job = settings(false).job(&entry("ps"), Path::new("project"), no_env).unwrap();
        assert_eq!(job.input, Path::new("project").join("shaders/gbuffer_ps.hlsl"));
        assert_eq!(job.output, Path::new("out").join("gbuffer_ps.cso"));
        assert_eq!(job.shader_type, ShaderType::Pixel);
        assert_eq!(job.shader_model, ShaderModel::Sm5_0);

        let mut named = entry("ps");
        named.output_file_path = Some("custom/name.cso".into());
        let job = settings(false).job(&named, Path::new("project"), no_env).unwrap();
        assert_eq!(job.output, Path::new("out").join("custom/name.cso"));
    }

    #[test]
    fn bad_shader_type_is_reported() {
        let err = settings(false).job(&entry("xs"), Path::new("."), no_env).unwrap_err();
        assert!(matches!(err, CompileError::InvalidEntry(ref msg) if msg.contains("gbuffer_ps.hlsl")));
    }

    #[test]
    fn fxc_arguments() {
        let settings = settings(false);
        let job = settings.job(&entry("ps"), Path::new("project"), no_env).unwrap();
        let args = settings.fxc_args(&job, Path::new("tmp.hlsl"));
        let args: Vec<String> = args.iter().map(|a| a.to_string_lossy().into_owned()).collect();

        let output = format!("/Fo{}", Path::new("out").join("gbuffer_ps.cso").display());
        assert_eq!(
            args,
            [
                "/EPSMain",
                output.as_str(),
                "/Tps_5_0",
                "/nologo",
                "/Iinc;common/inc",
                "/DA=1",
                "/DB",
                "tmp.hlsl",
            ]
        );
    }

    #[test]
    fn debug_builds_disable_optimization() {
        let mut cs = entry("cs");
        cs.shader_model = Some("4.1".into());
        cs.pre_processor_defines.clear();
        let mut settings = settings(true);
        settings.include_directories.clear();

        let job = settings.job(&cs, Path::new("."), no_env).unwrap();
        let args = settings.fxc_args(&job, Path::new("t.hlsl"));
        assert_eq!(args[0], "/Od");
        assert_eq!(args[1], "/Zi");
        assert!(args.contains(&OsString::from("/Tcs_4_1")));
        assert!(!args.iter().any(|a| a.to_string_lossy().starts_with("/I")));
    }

    #[test]
    fn includes_become_a_prelude() {
        assert_eq!(
            include_prelude(&["a.hlsli".into(), "b/c.hlsli".into()]),
            "#include \"a.hlsli\"\r\n#include \"b/c.hlsli\"\r\n"
        );
        assert_eq!(include_prelude(&[]), "");
    }
}
