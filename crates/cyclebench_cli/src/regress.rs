//! `cyclebench regress`: run every `[[test]]` entry and summarize.
//!
//! Each entry preloads its own image on top of the shared `[run]`,
//! `[memory]` and `[[script]]` settings and runs to a verdict. Sentinels may
//! come from the entry, from the `<pass>:`/`<fail>:` labels of a disassembly
//! listing, or from `[run]`, in that order. Results are printed as a table
//! as they complete; a test that cannot be set up is reported as `ERROR` and
//! the remaining tests still run.

use std::fmt;
use std::path::{Path, PathBuf};

use cyclebench_config::{parse_hex_u32, ConfigError, RunConfig, TestEntry};
use cyclebench_sim::{RunReport, ScriptedMaster, SimConfig};
use log::{debug, warn};

use crate::pipeline::{build_memory, bus_ops, ensure_parent_dir, load, sim_config};
use crate::{GlobalArgs, RegressArgs};

const TABLE_HEADER: &str = "RESULT | PASS       | FAIL       | TICKS    | TEST";
const TABLE_RULE: &str = "-------|------------|------------|----------|--------------------";

/// How a single regression test ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Pass,
    Fail,
    Error,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Status::Pass => "PASS",
            Status::Fail => "FAIL",
            Status::Error => "ERROR",
        };
        f.pad(text)
    }
}

/// Result of running a single `[[test]]` entry.
#[derive(Debug)]
struct TestResult {
    /// Name shown in the table.
    name: String,
    status: Status,
    /// Sentinels the test ran with; unknown if setup failed first.
    pass_addr: Option<u32>,
    fail_addr: Option<u32>,
    /// Ticks executed, if the test ran.
    ticks: Option<u64>,
    /// Fail reason or setup error.
    detail: Option<String>,
}

/// Sentinel addresses found in a disassembly listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct SentinelLabels {
    pass: Option<u32>,
    fail: Option<u32>,
}

/// Runs the `cyclebench regress` command.
///
/// Returns exit code 0 if every selected test passed, 1 if any failed or
/// could not be run.
pub fn run(args: &RegressArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let (config_path, config) = load(global)?;

    if config.test.is_empty() {
        if !global.quiet {
            eprintln!("warning: no [[test]] entries in {}", config_path.display());
        }
        return Ok(0);
    }

    let selected = filter_tests(&config.test, args.name.as_deref(), args.filter.as_deref());
    if selected.is_empty() {
        if !global.quiet {
            eprintln!("warning: no tests match the given filter");
        }
        return Ok(0);
    }

    if !global.quiet {
        eprintln!(
            "   Running {} test(s) from {}",
            selected.len(),
            config_path.display()
        );
    }

    println!("{TABLE_HEADER}");
    println!("{TABLE_RULE}");
    let mut results = Vec::with_capacity(selected.len());
    for (index, test) in selected {
        let result = run_single_test(&config, index, test, !args.no_waves);
        println!("{}", format_row(&result));
        results.push(result);
    }

    let passed = count(&results, Status::Pass);
    let failed = count(&results, Status::Fail);
    let errored = count(&results, Status::Error);
    if !global.quiet {
        eprintln!();
        eprintln!(
            "   Result: {passed} passed, {failed} failed, {errored} errored out of {} test(s)",
            results.len()
        );
    }

    if passed == results.len() {
        Ok(0)
    } else {
        Ok(1)
    }
}

fn count(results: &[TestResult], status: Status) -> usize {
    results.iter().filter(|r| r.status == status).count()
}

/// Selects tests by exact name or by name substring, keeping their
/// positions in the file.
///
/// If both are `None`, every test is returned.
fn filter_tests<'a>(
    tests: &'a [TestEntry],
    name: Option<&str>,
    filter: Option<&str>,
) -> Vec<(usize, &'a TestEntry)> {
    tests
        .iter()
        .enumerate()
        .filter(|(_, test)| {
            let test_name = test.display_name();
            if let Some(n) = name {
                return test_name == n;
            }
            if let Some(f) = filter {
                return test_name.contains(f);
            }
            true
        })
        .collect()
}

/// Runs one entry, turning setup and simulation errors into an `ERROR` row.
fn run_single_test(base: &RunConfig, index: usize, test: &TestEntry, waves: bool) -> TestResult {
    let name = test.display_name();
    match simulate_test(base, index, test, &name, waves) {
        Ok((sim, report)) => {
            let passed = report.outcome.passed();
            TestResult {
                name,
                status: if passed { Status::Pass } else { Status::Fail },
                pass_addr: Some(sim.pass_addr),
                fail_addr: Some(sim.fail_addr),
                ticks: Some(report.ticks),
                detail: (!passed).then(|| report.outcome.to_string()),
            }
        }
        Err(e) => {
            warn!("test {name}: {e}");
            TestResult {
                name,
                status: Status::Error,
                pass_addr: None,
                fail_addr: None,
                ticks: None,
                detail: Some(e.to_string()),
            }
        }
    }
}

fn simulate_test(
    base: &RunConfig,
    index: usize,
    test: &TestEntry,
    name: &str,
    waves: bool,
) -> Result<(SimConfig, RunReport), Box<dyn std::error::Error>> {
    let config = test_config(base, index, test)?;
    let (memory, words) = build_memory(&config)?;
    let mut sim = sim_config(&config)?;
    sim.trace_path = match sim.trace_path.take() {
        Some(path) if waves => Some(per_test_path(&path, name)),
        _ => None,
    };
    sim.coverage_path = sim.coverage_path.take().map(|path| per_test_path(&path, name));
    for path in sim.trace_path.iter().chain(sim.coverage_path.iter()) {
        ensure_parent_dir(path)?;
    }

    debug!(
        "test {name}: {words} image words, pass {:#010x}, fail {:#010x}",
        sim.pass_addr, sim.fail_addr
    );
    let device = ScriptedMaster::new(bus_ops(&config.script), sim.pass_addr, sim.fail_addr);
    let report = cyclebench_sim::simulate(device, memory, &sim)?;
    Ok((sim, report))
}

/// Builds the configuration for one entry on top of the shared settings.
fn test_config(
    base: &RunConfig,
    index: usize,
    test: &TestEntry,
) -> Result<RunConfig, Box<dyn std::error::Error>> {
    let mut config = base.clone();
    config.test.clear();
    config.memory.image = Some(test.image.clone());
    if let Some(offset) = test.offset {
        config.memory.offset = offset;
    }
    if let Some(timeout) = test.timeout_ticks {
        config.run.timeout_ticks = timeout;
    }
    if let Some(script) = &test.script {
        config.script = script.clone();
    }

    let labels = match &test.disassembly {
        Some(path) => read_labels(path)?,
        None => SentinelLabels::default(),
    };
    config.run.pass_addr = test.pass_addr.or(labels.pass).or(base.run.pass_addr);
    config.run.fail_addr = test.fail_addr.or(labels.fail).or(base.run.fail_addr);
    if config.run.pass_addr.is_none() {
        return Err(ConfigError::missing_sentinel(format!("test[{index}].pass_addr")).into());
    }
    if config.run.fail_addr.is_none() {
        return Err(ConfigError::missing_sentinel(format!("test[{index}].fail_addr")).into());
    }

    cyclebench_config::validate_config(&config)?;
    Ok(config)
}

fn read_labels(path: &Path) -> Result<SentinelLabels, Box<dyn std::error::Error>> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read disassembly {}: {e}", path.display()))?;
    let labels = sentinel_labels(&text)
        .map_err(|e| format!("{}: {e}", path.display()))?;
    Ok(labels)
}

/// Finds the `<pass>:` and `<fail>:` symbol lines of an objdump listing,
/// such as `80000ff0 <pass>:`, and returns their addresses.
fn sentinel_labels(text: &str) -> Result<SentinelLabels, String> {
    let mut labels = SentinelLabels::default();
    for (number, line) in text.lines().enumerate() {
        let slot = if line.contains(" <pass>:") {
            &mut labels.pass
        } else if line.contains(" <fail>:") {
            &mut labels.fail
        } else {
            continue;
        };
        let token = line.split_whitespace().next().unwrap_or("");
        let addr = parse_hex_u32(token)
            .map_err(|e| format!("line {}: bad label address: {e}", number + 1))?;
        *slot = Some(addr);
    }
    Ok(labels)
}

/// Renames an output file after a test, keeping its extensions:
/// `out/waves.vcd.gz` becomes `out/<name>.vcd.gz`.
fn per_test_path(path: &Path, name: &str) -> PathBuf {
    let file = path
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extensions = file.find('.').map(|i| &file[i..]).unwrap_or("");
    path.with_file_name(format!("{name}{extensions}"))
}

fn format_addr(addr: Option<u32>) -> String {
    match addr {
        Some(addr) => format!("{addr:#010x}"),
        None => "-".to_string(),
    }
}

fn format_row(result: &TestResult) -> String {
    let ticks = match result.ticks {
        Some(ticks) => ticks.to_string(),
        None => "-".to_string(),
    };
    let mut row = format!(
        "{:<6} | {:<10} | {:<10} | {:>8} | {}",
        result.status,
        format_addr(result.pass_addr),
        format_addr(result.fail_addr),
        ticks,
        result.name
    );
    if let Some(ref detail) = result.detail {
        row.push_str(": ");
        row.push_str(detail);
    }
    row
}
