//! Configuration file loading and validation.

use crate::error::ConfigError;
use crate::resolve::resolve_paths;
use crate::types::{RunConfig, ScriptOp};
use std::path::Path;

/// File name looked up when no configuration path is given.
pub const CONFIG_FILE_NAME: &str = "cyclebench.toml";

/// Loads and validates a `cyclebench.toml` configuration file.
///
/// Relative paths inside the file are resolved against the file's directory.
pub fn load_config(path: &Path) -> Result<RunConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let mut config = load_config_from_str(&content)?;
    let base = path.parent().unwrap_or_else(|| Path::new(""));
    resolve_paths(&mut config, base);
    Ok(config)
}

/// Parses and validates a `cyclebench.toml` configuration from a string.
///
/// Paths are left as written. Useful for testing without filesystem dependencies.
pub fn load_config_from_str(content: &str) -> Result<RunConfig, ConfigError> {
    let config: RunConfig = toml::from_str(content)?;
    validate_config(&config)?;
    Ok(config)
}

/// Validates that required fields are present and configuration values are consistent.
///
/// The `[run]` sentinels are required unless the file lists `[[test]]`
/// entries, which may bring their own.
pub fn validate_config(config: &RunConfig) -> Result<(), ConfigError> {
    let run = &config.run;
    if config.test.is_empty() {
        if run.pass_addr.is_none() {
            return Err(ConfigError::missing_sentinel("run.pass_addr"));
        }
        if run.fail_addr.is_none() {
            return Err(ConfigError::missing_sentinel("run.fail_addr"));
        }
    }
    check_sentinels("", run.pass_addr, run.fail_addr)?;
    if run.timeout_ticks == 0 {
        return Err(ConfigError::invalid("run.timeout_ticks", "must be non-zero"));
    }
    if run.half_period == 0 {
        return Err(ConfigError::invalid("run.half_period", "must be non-zero"));
    }

    let memory = &config.memory;
    if memory.lo > memory.hi {
        return Err(ConfigError::invalid(
            "memory.lo",
            format!("{:#010x} is above memory.hi {:#010x}", memory.lo, memory.hi),
        ));
    }
    if memory.lo & 0b11 != 0 {
        return Err(ConfigError::invalid(
            "memory.lo",
            format!("{:#010x} is not word aligned", memory.lo),
        ));
    }
    if memory.hi & 0b11 != 0b11 {
        return Err(ConfigError::invalid(
            "memory.hi",
            format!("{:#010x} does not end a word", memory.hi),
        ));
    }
    check_offset("memory.offset", memory.offset)?;

    if config.trace.enabled && config.trace.timescale.trim().is_empty() {
        return Err(ConfigError::invalid("trace.timescale", "must not be empty"));
    }

    check_script("script", &config.script)?;

    for (index, test) in config.test.iter().enumerate() {
        check_sentinels(
            &format!("test[{index}]: "),
            test.pass_addr.or(run.pass_addr),
            test.fail_addr.or(run.fail_addr),
        )?;
        if let Some(offset) = test.offset {
            check_offset(&format!("test[{index}].offset"), offset)?;
        }
        if test.timeout_ticks == Some(0) {
            return Err(ConfigError::invalid(
                format!("test[{index}].timeout_ticks"),
                "must be non-zero",
            ));
        }
        if let Some(script) = &test.script {
            check_script(&format!("test[{index}].script"), script)?;
        }
    }
    Ok(())
}

fn check_sentinels(context: &str, pass: Option<u32>, fail: Option<u32>) -> Result<(), ConfigError> {
    match (pass, fail) {
        (Some(pass), Some(fail)) if pass == fail => Err(ConfigError::SentinelClash {
            context: context.to_string(),
            addr: pass,
        }),
        _ => Ok(()),
    }
}

fn check_offset(key: &str, offset: u32) -> Result<(), ConfigError> {
    if offset & 0b11 != 0 {
        return Err(ConfigError::invalid(
            key,
            format!("{offset:#010x} is not word aligned"),
        ));
    }
    Ok(())
}

fn check_script(key: &str, script: &[ScriptOp]) -> Result<(), ConfigError> {
    for (index, op) in script.iter().enumerate() {
        if let ScriptOp::Write { strobe, .. } = op {
            if *strobe > 0xf {
                return Err(ConfigError::invalid(
                    format!("{key}[{index}].strobe"),
                    format!("{strobe:#x} has more than four lanes"),
                ));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const MINIMAL: &str = r#"
[run]
pass_addr = 0x8000_0ff0
fail_addr = 0x8000_0ff4
"#;

    #[test]
    fn parse_minimal_config() {
        let config = load_config_from_str(MINIMAL).unwrap();
        assert_eq!(config.run.pass_addr, Some(0x8000_0ff0));
        assert_eq!(config.run.fail_addr, Some(0x8000_0ff4));
        assert_eq!(config.run.timeout_ticks, 10_000);
        assert_eq!(config.run.half_period, 10);
        assert_eq!(config.run.reset_ticks, 40);
        assert_eq!(config.memory.hi, u32::MAX);
        assert!(!config.trace.enabled);
        assert!(config.coverage.path.is_none());
        assert!(config.script.is_empty());
    }

    #[test]
    fn parse_full_config() {
        let toml = r#"
[run]
pass_addr = "0x8000_0ff0"
fail_addr = 0x80000ff4
timeout_ticks = 5000
half_period = 5
reset_ticks = 20

[memory]
lo = 0x8000_0000
hi = 0x8000_ffff
default = 0xdeadc0de
image = "build/test.hex"
offset = 0x8000_0000

[trace]
enabled = true
path = "out/waves.vcd.gz"
compress = true
timescale = "10ps"

[coverage]
path = "out/coverage.json"

[[script]]
op = "write"
addr = 0x8000_0100
data = 0xaabbccdd
strobe = 0x3

[[script]]
op = "read"
addr = 0x8000_0100
expect = 0x0000ccdd
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.run.pass_addr, Some(0x8000_0ff0));
        assert_eq!(config.run.timeout_ticks, 5000);
        assert_eq!(config.run.half_period, 5);
        assert_eq!(config.run.reset_ticks, 20);
        assert_eq!(config.memory.lo, 0x8000_0000);
        assert_eq!(config.memory.default, 0xdead_c0de);
        assert_eq!(config.memory.image, Some(PathBuf::from("build/test.hex")));
        assert!(config.trace.enabled);
        assert!(config.trace.compress);
        assert_eq!(config.trace.timescale, "10ps");
        assert_eq!(
            config.coverage.path,
            Some(PathBuf::from("out/coverage.json"))
        );
        assert_eq!(config.script.len(), 2);
    }

    #[test]
    fn missing_pass_errors() {
        let toml = "[run]\nfail_addr = 0x10\n";
        let err = load_config_from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::MissingSentinel { key } if key == "run.pass_addr"));
    }

    #[test]
    fn empty_file_is_missing_sentinels() {
        let err = load_config_from_str("").unwrap_err();
        assert!(matches!(err, ConfigError::MissingSentinel { .. }));
    }

    #[test]
    fn equal_sentinels_error() {
        let toml = "[run]\npass_addr = 0x10\nfail_addr = 0x10\n";
        let err = load_config_from_str(toml).unwrap_err();
        assert_eq!(
            err.to_string(),
            "pass and fail sentinels are both 0x00000010"
        );
    }

    #[test]
    fn zero_half_period_errors() {
        let toml = format!("{MINIMAL}half_period = 0\n");
        let err = load_config_from_str(&toml).unwrap_err();
        assert_eq!(err.key(), Some("run.half_period"));
    }

    #[test]
    fn zero_timeout_errors() {
        let toml = format!("{MINIMAL}timeout_ticks = 0\n");
        assert!(load_config_from_str(&toml).is_err());
    }

    #[test]
    fn inverted_range_errors() {
        let toml = format!("{MINIMAL}\n[memory]\nlo = 0x2000\nhi = 0x1fff\n");
        let err = load_config_from_str(&toml).unwrap_err();
        assert_eq!(
            err.to_string(),
            "memory.lo: 0x00002000 is above memory.hi 0x00001fff"
        );
    }

    #[test]
    fn unaligned_bounds_error() {
        let lo = format!("{MINIMAL}\n[memory]\nlo = 0x2\n");
        assert!(load_config_from_str(&lo).is_err());
        let hi = format!("{MINIMAL}\n[memory]\nhi = 0x1000\n");
        assert!(load_config_from_str(&hi).is_err());
    }

    #[test]
    fn unaligned_offset_errors() {
        let toml = format!("{MINIMAL}\n[memory]\noffset = 0x1001\n");
        let err = load_config_from_str(&toml).unwrap_err();
        assert_eq!(err.key(), Some("memory.offset"));
    }

    #[test]
    fn wide_strobe_errors() {
        let toml = format!(
            "{MINIMAL}\n[[script]]\nop = \"write\"\naddr = 0\ndata = 0\nstrobe = 0x1f\n"
        );
        let err = load_config_from_str(&toml).unwrap_err();
        assert_eq!(err.key(), Some("script[0].strobe"));
    }

    #[test]
    fn unknown_field_errors() {
        let toml = format!("{MINIMAL}bogus = 1\n");
        let err = load_config_from_str(&toml).unwrap_err();
        assert!(matches!(err, ConfigError::Syntax(_)));
    }

    #[test]
    fn invalid_toml_errors() {
        let toml = "this is not valid toml {{{}}}";
        let err = load_config_from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::Syntax(_)));
    }

    #[test]
    fn tests_may_omit_run_sentinels() {
        let toml = "[[test]]\nimage = \"a.hex\"\npass_addr = 0x10\nfail_addr = 0x14\n";
        let config = load_config_from_str(toml).unwrap();
        assert!(config.run.pass_addr.is_none());
        assert_eq!(config.test.len(), 1);
    }

    #[test]
    fn test_sentinel_clash_names_the_test() {
        let toml = format!(
            "{MINIMAL}\n[[test]]\nimage = \"a.hex\"\n\n\
             [[test]]\nimage = \"b.hex\"\nfail_addr = 0x8000_0ff0\n"
        );
        let err = load_config_from_str(&toml).unwrap_err();
        assert_eq!(
            err.to_string(),
            "test[1]: pass and fail sentinels are both 0x80000ff0"
        );
    }

    #[test]
    fn test_fields_are_checked() {
        let offset = format!("{MINIMAL}\n[[test]]\nimage = \"a.hex\"\noffset = 0x2\n");
        let err = load_config_from_str(&offset).unwrap_err();
        assert_eq!(err.key(), Some("test[0].offset"));

        let timeout = format!("{MINIMAL}\n[[test]]\nimage = \"a.hex\"\ntimeout_ticks = 0\n");
        let err = load_config_from_str(&timeout).unwrap_err();
        assert_eq!(err.key(), Some("test[0].timeout_ticks"));
    }

    #[test]
    fn load_from_disk_resolves_paths() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        let toml = format!("{MINIMAL}\n[memory]\nimage = \"test.hex\"\n");
        std::fs::write(&path, toml).unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.memory.image, Some(dir.path().join("test.hex")));
        assert_eq!(config.trace.path, dir.path().join("waves.vcd"));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_config(Path::new("/nonexistent/cyclebench.toml")).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Read { ref path, .. } if path.ends_with("cyclebench.toml")
        ));
    }
}
