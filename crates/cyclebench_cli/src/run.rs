//! `cyclebench run`: preload memory and clock the scripted device to a verdict.
//!
//! Loads the configuration, applies command-line overrides, preloads the
//! memory image, builds a scripted bus master from `[[script]]` and runs it
//! through the harness. Prints the run report and a final `TEST PASS` or
//! `TEST FAIL` line.

use std::path::PathBuf;

use cyclebench_config::RunConfig;
use cyclebench_sim::{RunReport, ScriptedMaster};

use crate::pipeline::{bus_ops, build_memory, ensure_parent_dir, load, sim_config};
use crate::{GlobalArgs, ReportFormat, RunArgs};

/// Runs the `cyclebench run` command.
///
/// Returns exit code 0 if the device read the pass sentinel, 1 otherwise.
pub fn run(args: &RunArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let (config_path, mut config) = load(global)?;
    apply_overrides(&mut config, args);
    cyclebench_config::validate_config(&config)?;

    let (memory, words) = build_memory(&config)?;
    let sim = sim_config(&config)?;
    for path in sim.trace_path.iter().chain(sim.coverage_path.iter()) {
        ensure_parent_dir(path)?;
    }

    if !global.quiet {
        eprintln!(
            "   Simulating {} ({} script ops, {words} image words)",
            config_path.display(),
            config.script.len()
        );
    }

    let device = ScriptedMaster::new(bus_ops(&config.script), sim.pass_addr, sim.fail_addr);
    let report = cyclebench_sim::simulate(device, memory, &sim)?;

    match args.format {
        ReportFormat::Text => print_text(&report),
        ReportFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }

    if !global.quiet {
        if let Some(ref path) = sim.trace_path {
            eprintln!("   Trace written to {}", path.display());
        }
        if let Some(ref path) = sim.coverage_path {
            eprintln!("   Coverage written to {}", path.display());
        }
    }

    let verdict = if report.outcome.passed() {
        "TEST PASS"
    } else {
        "TEST FAIL"
    };
    match args.format {
        ReportFormat::Text => println!("{verdict}"),
        ReportFormat::Json => eprintln!("{verdict}"),
    }

    Ok(report.outcome.exit_code())
}

/// Applies command-line overrides on top of the loaded configuration.
fn apply_overrides(config: &mut RunConfig, args: &RunArgs) {
    if let Some(ref image) = args.image {
        config.memory.image = Some(PathBuf::from(image));
    }
    if let Some(offset) = args.offset {
        config.memory.offset = offset;
    }
    if let Some(pass) = args.pass {
        config.run.pass_addr = Some(pass);
    }
    if let Some(fail) = args.fail {
        config.run.fail_addr = Some(fail);
    }
    if let Some(timeout) = args.timeout {
        config.run.timeout_ticks = timeout;
    }
    if let Some(half_period) = args.half_period {
        config.run.half_period = half_period;
    }
    if let Some(ref waves) = args.waves {
        config.trace.enabled = true;
        config.trace.path = PathBuf::from(waves);
    }
    if args.no_waves {
        config.trace.enabled = false;
    }
    if let Some(ref coverage) = args.coverage {
        config.coverage.path = Some(PathBuf::from(coverage));
    }
}

fn print_text(report: &RunReport) {
    println!("outcome:    {}", report.outcome);
    println!("ticks:      {}", report.ticks);
    println!("reads:      {}", report.bus.reads);
    println!("writes:     {}", report.bus.writes);
    if !report.bus.violations.is_empty() {
        println!("violations: {}", report.bus.violations.len());
        for v in &report.bus.violations {
            println!(
                "  tick {}: {:?} {:#010x}: {}",
                v.tick, v.channel, v.addr, v.reason
            );
        }
    }
}
