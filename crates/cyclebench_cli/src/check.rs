//! `cyclebench check`: validate a configuration without simulating.

use crate::pipeline::{build_memory, load, sim_config};
use crate::GlobalArgs;

/// Runs the `cyclebench check` command.
///
/// Loads and validates the configuration, preloads the memory image into a
/// scratch memory, checks the harness settings and makes sure every
/// `[[test]]` image exists. Returns exit code 0 when everything is valid; any
/// problem is returned as an error.
pub fn run(global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let (config_path, config) = load(global)?;
    let (_, words) = build_memory(&config)?;

    // A file holding only `[[test]]` entries may leave the `[run]` sentinels out.
    let has_sentinels = config.run.pass_addr.is_some() && config.run.fail_addr.is_some();
    let sentinels = if config.test.is_empty() || has_sentinels {
        let sim = sim_config(&config)?;
        sim.validate()?;
        format!("pass {:#010x}, fail {:#010x}, ", sim.pass_addr, sim.fail_addr)
    } else {
        String::new()
    };

    for (index, test) in config.test.iter().enumerate() {
        if !test.image.is_file() {
            return Err(format!(
                "test[{index}] ({}): image {} not found",
                test.display_name(),
                test.image.display()
            )
            .into());
        }
    }

    if !global.quiet {
        eprintln!(
            "   Checked {}: {sentinels}{} script ops, {words} image words, {} tests",
            config_path.display(),
            config.script.len(),
            config.test.len()
        );
    }
    Ok(0)
}
