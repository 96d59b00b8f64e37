//! End-to-end runs of the tick loop against scripted and hand-written devices.
//!
//! With the default schedule (half period 10, reset through tick 40) rising
//! edges fall on ticks 1, 21, 41, 61, 81, ... and the first one out of reset
//! is tick 41.

use std::io::Read;

use cyclebench_sim::{
    preload_str, simulate, BusOp, BusPins, Channel, Device, FailReason, Outcome, Phase,
    ScriptedMaster, SimConfig, SimDriver, SparseMemory, StepResult,
};
use tempfile::TempDir;

const PASS: u32 = 0x0000_0ff0;
const FAIL: u32 = 0x0000_0ff4;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn config() -> SimConfig {
    SimConfig::new(PASS, FAIL)
}

fn driver(ops: Vec<BusOp>, memory: SparseMemory) -> SimDriver<ScriptedMaster> {
    SimDriver::new(ScriptedMaster::new(ops, PASS, FAIL), memory, &config()).unwrap()
}

/// Never drives a request and never finishes.
#[derive(Default)]
struct Silent {
    pins: BusPins,
}

impl Device for Silent {
    fn pins(&self) -> &BusPins {
        &self.pins
    }
    fn pins_mut(&mut self) -> &mut BusPins {
        &mut self.pins
    }
    fn evaluate(&mut self) {}
}

// ---------------------------------------------------------------------------
// Verdicts
// ---------------------------------------------------------------------------

#[test]
fn empty_script_passes_on_first_sentinel_read() {
    init_logging();
    let mut driver = driver(Vec::new(), SparseMemory::full_range(0));
    let report = driver.run().unwrap();
    assert_eq!(report.outcome, Outcome::Pass);
    // Request issued at tick 41, answered and observed at tick 61.
    assert_eq!(report.ticks, 62);
    assert_eq!(report.bus.reads, 1);
    assert_eq!(driver.phase(), Phase::Halted);
}

#[test]
fn write_then_read_back_passes() {
    init_logging();
    let mut driver = driver(
        vec![
            BusOp::Write {
                addr: 0x100,
                data: 0xcafe_f00d,
                strobe: 0xf,
            },
            BusOp::Read {
                addr: 0x100,
                expect: Some(0xcafe_f00d),
            },
        ],
        SparseMemory::full_range(0),
    );
    let report = driver.run().unwrap();
    assert_eq!(report.outcome, Outcome::Pass);
    assert_eq!(report.ticks, 102);
    assert_eq!(report.bus.writes, 1);
    assert_eq!(report.bus.reads, 2);
    assert_eq!(driver.memory().load(0x100).unwrap(), 0xcafe_f00d);
    assert_eq!(driver.device().completed(), 2);
}

#[test]
fn mismatched_read_fails_through_sentinel() {
    init_logging();
    let mut driver = driver(
        vec![BusOp::Read {
            addr: 0x200,
            expect: Some(1),
        }],
        SparseMemory::full_range(0),
    );
    let report = driver.run().unwrap();
    assert_eq!(report.outcome, Outcome::Fail(FailReason::Sentinel));
    assert!(driver.device().mismatch().is_some());
    assert_eq!(report.outcome.exit_code(), 1);
}

#[test]
fn native_finish_without_sentinel_is_no_verdict() {
    init_logging();
    let mut driver = driver(vec![BusOp::Finish], SparseMemory::full_range(0));
    let report = driver.run().unwrap();
    assert_eq!(report.outcome, Outcome::Fail(FailReason::NoVerdict));
    assert_eq!(report.ticks, 42);
    assert!(driver.device().finalized());
}

#[test]
fn silent_device_times_out_at_limit() {
    init_logging();
    let cfg = SimConfig {
        timeout_ticks: 250,
        ..config()
    };
    let mut driver = SimDriver::new(Silent::default(), SparseMemory::full_range(0), &cfg).unwrap();
    let report = driver.run().unwrap();
    assert_eq!(report.outcome, Outcome::Fail(FailReason::Timeout));
    assert_eq!(report.ticks, 250);
}

#[test]
fn idle_script_longer_than_timeout_times_out() {
    let cfg = SimConfig {
        timeout_ticks: 500,
        ..config()
    };
    let device = ScriptedMaster::new(vec![BusOp::Idle { cycles: 1000 }], PASS, FAIL);
    let report = simulate(device, SparseMemory::full_range(0), &cfg).unwrap();
    assert_eq!(report.outcome, Outcome::Fail(FailReason::Timeout));
    assert_eq!(report.ticks, 500);
}

#[test]
fn zero_cycle_idle_adds_no_time() {
    let mut driver = driver(vec![BusOp::Idle { cycles: 0 }], SparseMemory::full_range(0));
    let report = driver.run().unwrap();
    assert_eq!(report.outcome, Outcome::Pass);
    assert_eq!(report.ticks, 62);
    assert_eq!(driver.device().completed(), 1);
}

#[test]
fn no_ticks_run_after_sentinel() {
    let mut driver = driver(Vec::new(), SparseMemory::full_range(0));
    while driver.step().unwrap() == StepResult::Continued {}
    let halted_at = driver.tick();
    assert_eq!(driver.step().unwrap(), StepResult::Done);
    assert_eq!(driver.tick(), halted_at);
}

// ---------------------------------------------------------------------------
// Bus behaviour
// ---------------------------------------------------------------------------

#[test]
fn partial_write_merges_byte_lanes() {
    let mut memory = SparseMemory::full_range(0);
    memory.store(0x40, 0x1122_3344).unwrap();
    let mut driver = driver(
        vec![
            BusOp::Write {
                addr: 0x40,
                data: 0xaabb_ccdd,
                strobe: 0b0101,
            },
            BusOp::Read {
                addr: 0x40,
                expect: Some(0x11bb_33dd),
            },
        ],
        memory,
    );
    assert_eq!(driver.run().unwrap().outcome, Outcome::Pass);
    assert_eq!(driver.memory().load(0x40).unwrap(), 0x11bb_33dd);
}

#[test]
fn unaligned_request_is_served_from_containing_word() {
    let mut memory = SparseMemory::full_range(0);
    memory.store(0x80, 0x0bad_f00d).unwrap();
    let mut driver = driver(
        vec![BusOp::Read {
            addr: 0x83,
            expect: Some(0x0bad_f00d),
        }],
        memory,
    );
    assert_eq!(driver.run().unwrap().outcome, Outcome::Pass);
}

#[test]
fn read_data_valid_lasts_one_cycle() {
    let mut driver = driver(
        vec![
            BusOp::Read {
                addr: 0x40,
                expect: None,
            },
            BusOp::Idle { cycles: 3 },
        ],
        SparseMemory::full_range(0),
    );
    let mut valid_ticks = Vec::new();
    while driver.step().unwrap() == StepResult::Continued {
        if driver.pins().read_data_valid && driver.pins().read_addr != PASS {
            valid_ticks.push(driver.tick() - 1);
        }
        if driver.tick() > 140 {
            break;
        }
    }
    // Answered on the rising edge at 61, cleared on the rising edge at 81.
    assert_eq!(valid_ticks.first(), Some(&61));
    assert_eq!(valid_ticks.last(), Some(&80));
    assert_eq!(valid_ticks.len(), 20);
}

#[test]
fn out_of_range_accesses_are_recorded_and_survived() {
    init_logging();
    let memory = SparseMemory::new(0, 0xfff, 0xdead_c0de);
    let mut driver = driver(
        vec![
            BusOp::Write {
                addr: 0x2000,
                data: 1,
                strobe: 0xf,
            },
            BusOp::Read {
                addr: 0x3000,
                expect: Some(0xdead_c0de),
            },
        ],
        memory,
    );
    let report = driver.run().unwrap();
    assert_eq!(report.outcome, Outcome::Pass);
    assert_eq!(report.bus.violations.len(), 2);
    assert_eq!(report.bus.violations[0].channel, Channel::Write);
    assert_eq!(report.bus.violations[0].addr, 0x2000);
    assert_eq!(report.bus.violations[0].tick, 61);
    assert_eq!(report.bus.violations[1].channel, Channel::Read);
    assert_eq!(report.bus.violations[1].addr, 0x3000);
    assert!(driver.memory().is_empty());
}

#[test]
fn preloaded_image_is_visible_to_the_device() {
    let mut memory = SparseMemory::full_range(0);
    preload_str(&mut memory, "00000001\nDEADBEEF\n", 0x1000).unwrap();
    let device = ScriptedMaster::new(
        vec![
            BusOp::Read {
                addr: 0x1000,
                expect: Some(1),
            },
            BusOp::Read {
                addr: 0x1004,
                expect: Some(0xdead_beef),
            },
        ],
        PASS,
        FAIL,
    );
    let report = simulate(device, memory, &config()).unwrap();
    assert_eq!(report.outcome, Outcome::Pass);
}

// ---------------------------------------------------------------------------
// Stimulus
// ---------------------------------------------------------------------------

#[test]
fn clock_inverts_every_half_period() {
    let cfg = SimConfig {
        half_period: 20,
        timeout_ticks: 200,
        ..config()
    };
    let mut driver = SimDriver::new(Silent::default(), SparseMemory::full_range(0), &cfg).unwrap();
    let mut level = driver.pins().clock;
    let mut inversions = Vec::new();
    let mut rises = Vec::new();
    while driver.step().unwrap() == StepResult::Continued {
        let now = driver.pins().clock;
        if now != level {
            let tick = driver.tick() - 1;
            inversions.push(tick);
            if now {
                rises.push(tick);
            }
        }
        level = now;
    }
    assert_eq!(inversions, vec![1, 21, 41, 61, 81, 101, 121, 141, 161, 181]);
    assert_eq!(rises, vec![1, 41, 81, 121, 161]);
}

#[test]
fn reset_is_held_then_released() {
    let mut driver = SimDriver::new(Silent::default(), SparseMemory::full_range(0), &config())
        .unwrap();
    let mut released = None;
    while driver.step().unwrap() == StepResult::Continued && driver.tick() < 100 {
        if !driver.pins().reset && released.is_none() {
            released = Some(driver.tick() - 1);
        }
    }
    assert_eq!(released, Some(41));
}

// ---------------------------------------------------------------------------
// Sinks
// ---------------------------------------------------------------------------

#[test]
fn compressed_trace_and_coverage_are_written() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let cfg = SimConfig {
        trace_path: Some(dir.path().join("waves.vcd.gz")),
        trace_compress: true,
        coverage_path: Some(dir.path().join("coverage.json")),
        ..config()
    };
    let device = ScriptedMaster::new(
        vec![BusOp::Write {
            addr: 0x10,
            data: 0xff,
            strobe: 0x1,
        }],
        PASS,
        FAIL,
    );
    let report = simulate(device, SparseMemory::full_range(0), &cfg).unwrap();
    assert!(report.outcome.passed());

    let file = std::fs::File::open(dir.path().join("waves.vcd.gz")).unwrap();
    let mut vcd = String::new();
    flate2::read::GzDecoder::new(file)
        .read_to_string(&mut vcd)
        .unwrap();
    assert!(vcd.contains("$timescale\n  1ns\n$end"));
    assert!(vcd.contains("$dumpvars"));
    assert!(vcd.contains(&format!("#{}", report.ticks - 1)));

    let json: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(dir.path().join("coverage.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(json["samples"], report.ticks);
    assert_eq!(json["write_handshakes"], 1);
    assert_eq!(json["read_handshakes"], 1);
}

#[test]
fn coverage_counts_back_to_back_handshakes() {
    let dir = TempDir::new().unwrap();
    let cfg = SimConfig {
        coverage_path: Some(dir.path().join("coverage.json")),
        ..config()
    };
    let mut ops = Vec::new();
    for i in 0..3u32 {
        ops.push(BusOp::Write {
            addr: 0x100 + 4 * i,
            data: i,
            strobe: 0xf,
        });
    }
    for i in 0..3u32 {
        ops.push(BusOp::Read {
            addr: 0x100 + 4 * i,
            expect: Some(i),
        });
    }
    let device = ScriptedMaster::new(ops, PASS, FAIL);
    let report = simulate(device, SparseMemory::full_range(0), &cfg).unwrap();
    assert!(report.outcome.passed());
    assert_eq!(report.bus.writes, 3);
    assert_eq!(report.bus.reads, 4);

    let json: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(dir.path().join("coverage.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(json["write_handshakes"], report.bus.writes);
    assert_eq!(json["read_handshakes"], report.bus.reads);
}

#[test]
fn report_serializes_to_json() {
    let mut driver = driver(Vec::new(), SparseMemory::full_range(0));
    let report = driver.run().unwrap();
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["outcome"]["verdict"], "pass");
    assert_eq!(json["ticks"], 62);
    assert_eq!(json["bus"]["reads"], 1);
}
