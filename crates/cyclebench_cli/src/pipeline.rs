//! Shared pipeline helpers for CLI commands.
//!
//! Contains the steps `run`, `check` and `regress` have in common: locating and loading
//! the configuration, hex argument parsing, building the preloaded memory,
//! and mapping configuration types onto the harness types.

use std::path::{Path, PathBuf};

use cyclebench_config::{ConfigError, RunConfig, ScriptOp, CONFIG_FILE_NAME};
use cyclebench_sim::{preload_file, BusOp, PreloadError, SimConfig, SparseMemory};
use log::debug;

use crate::GlobalArgs;

/// Parses a hex command-line value such as `0x8000_0ff0`.
pub fn parse_hex_arg(s: &str) -> Result<u32, String> {
    cyclebench_config::parse_hex_u32(s)
}

/// Resolves the configuration file path from global CLI args.
///
/// If `--config` names a directory, `cyclebench.toml` inside it is used.
/// Without `--config`, `cyclebench.toml` in the current directory is used.
pub fn resolve_config_path(global: &GlobalArgs) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let path = match global.config {
        Some(ref config_path) => PathBuf::from(config_path),
        None => std::env::current_dir()?.join(CONFIG_FILE_NAME),
    };
    if path.is_dir() {
        Ok(path.join(CONFIG_FILE_NAME))
    } else {
        Ok(path)
    }
}

/// Loads and validates the configuration selected by the global args.
pub fn load(global: &GlobalArgs) -> Result<(PathBuf, RunConfig), Box<dyn std::error::Error>> {
    let path = resolve_config_path(global)?;
    if !path.exists() {
        return Err(format!("could not find configuration file {}", path.display()).into());
    }
    debug!("loading configuration from {}", path.display());
    let config = cyclebench_config::load_config(&path)?;
    Ok((path, config))
}

/// Builds the harness configuration from a validated run configuration.
pub fn sim_config(config: &RunConfig) -> Result<SimConfig, ConfigError> {
    let pass = config
        .run
        .pass_addr
        .ok_or_else(|| ConfigError::missing_sentinel("run.pass_addr"))?;
    let fail = config
        .run
        .fail_addr
        .ok_or_else(|| ConfigError::missing_sentinel("run.fail_addr"))?;
    Ok(SimConfig {
        timeout_ticks: config.run.timeout_ticks,
        half_period: config.run.half_period,
        reset_ticks: config.run.reset_ticks,
        trace_path: config
            .trace
            .enabled
            .then(|| config.trace.path.clone()),
        trace_compress: config.trace.compress,
        trace_timescale: config.trace.timescale.clone(),
        coverage_path: config.coverage.path.clone(),
        ..SimConfig::new(pass, fail)
    })
}

/// Builds the memory and loads the configured image into it.
///
/// Returns the memory and the number of image words stored.
pub fn build_memory(config: &RunConfig) -> Result<(SparseMemory, usize), PreloadError> {
    let section = &config.memory;
    let mut memory = SparseMemory::new(section.lo, section.hi, section.default);
    let words = match &section.image {
        Some(image) => preload_file(&mut memory, image, section.offset)?,
        None => 0,
    };
    Ok((memory, words))
}

/// Converts the `[[script]]` entries into bus operations.
pub fn bus_ops(script: &[ScriptOp]) -> Vec<BusOp> {
    script
        .iter()
        .map(|op| match *op {
            ScriptOp::Read { addr, expect } => BusOp::Read { addr, expect },
            ScriptOp::Write { addr, data, strobe } => BusOp::Write { addr, data, strobe },
            ScriptOp::Idle { cycles } => BusOp::Idle { cycles },
            ScriptOp::Finish => BusOp::Finish,
        })
        .collect()
}

/// Creates the parent directory of an output file if it does not exist.
pub fn ensure_parent_dir(path: &Path) -> std::io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent),
        _ => Ok(()),
    }
}
