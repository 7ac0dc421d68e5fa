use std::{
    env,
    ffi::OsString,
    fs,
    path::{Path, PathBuf},
    process::ExitCode,
};

use anyhow::Context;

mod command;
mod config;

use command::CompilerSettings;
use config::CompilerConfig;

const HELP: &str = "\
halfling-shader-compiler

Compiles every shader listed in a JSON config file with fxc.
$(NAME) in paths is replaced by the environment variable NAME.

usage: halfling-shader-compiler [--debug] <config.json>

Options:
    --debug       compile without optimizations and with debug info.
    -h --help     print this help.
";

struct Options {
    config_path: PathBuf,
    debug: bool,
}

fn parse_options(raw: Vec<OsString>) -> anyhow::Result<Option<Options>> {
    let mut args = pico_args::Arguments::from_vec(raw);
    if args.contains(["-h", "--help"]) {
        return Ok(None);
    }
    let debug = args.contains("--debug");
    let config_path: PathBuf = args.free_from_str().context("Missing config file")?;

    let remaining = args.finish();
    if !remaining.is_empty() {
        anyhow::bail!("Unknown arguments {:?}", remaining);
    }
    Ok(Some(Options { config_path, debug }))
}

/// Number of shaders that failed.
fn run(options: &Options) -> anyhow::Result<usize> {
    let json = fs::read_to_string(&options.config_path)
        .with_context(|| format!("Could not read {}", options.config_path.display()))?;
    let config = CompilerConfig::from_json(&json)
        .with_context(|| format!("Could not parse {}", options.config_path.display()))?;
    let config_dir = options.config_path.parent().unwrap_or_else(|| Path::new("."));

    let lookup = |name: &str| env::var(name).ok();
    let settings = CompilerSettings::new(&config, config_dir, options.debug, lookup)?;
    fs::create_dir_all(&settings.output_directory)
        .with_context(|| format!("Could not create {}", settings.output_directory.display()))?;

    let mut failures = 0;
    for entry in &config.shaders_to_compile {
        let result = settings
            .job(entry, config_dir, lookup)
            .and_then(|job| settings.compile(&job).map(|()| job));
        match result {
            Ok(job) => log::info!("Compiled {} -> {}", job.input.display(), job.output.display()),
            Err(e) => {
                log::error!("{}: {:#}", entry.input_file_path, anyhow::Error::from(e));
                failures += 1;
            }
        }
    }

    log::info!(
        "{} of {} shaders compiled",
        config.shaders_to_compile.len() - failures,
        config.shaders_to_compile.len()
    );
    Ok(failures)
}

fn main() -> ExitCode {
    env_logger::init();

    let options = match parse_options(env::args_os().skip(1).collect()) {
        Ok(Some(options)) => options,
        Ok(None) => {
            print!("{}", HELP);
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            eprintln!("{:#}\n\n{}", e, HELP);
            return ExitCode::FAILURE;
        }
    };

    match run(&options) {
        Ok(0) => ExitCode::SUCCESS,
        Ok(_) => ExitCode::FAILURE,
        Err(e) => {
            log::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(args: &[&str]) -> Vec<OsString> {
        args.iter().map(OsString::from).collect()
    }

    #[test]
    fn parses_arguments() {
        let options = parse_options(args(&["--debug", "shaders.json"])).unwrap().unwrap();
        assert!(options.debug);
        assert_eq!(options.config_path, PathBuf::from("shaders.json"));

        assert!(parse_options(args(&["-h"])).unwrap().is_none());
    }

    #[test]
    fn usage_errors() {
        assert!(parse_options(args(&[])).is_err());
        assert!(parse_options(args(&["a.json", "b.json"])).is_err());
    }
}
