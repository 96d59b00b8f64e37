//! Path resolution: anchoring relative paths to the configuration file.

use crate::types::RunConfig;
use std::path::{Path, PathBuf};

fn anchor(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// Rewrites every relative path in `config` to be relative to `base`.
///
/// `base` is normally the directory holding `cyclebench.toml`, so a config
/// behaves the same no matter where the harness is launched from.
pub fn resolve_paths(config: &mut RunConfig, base: &Path) {
    if let Some(image) = &config.memory.image {
        config.memory.image = Some(anchor(base, image));
    }
    config.trace.path = anchor(base, &config.trace.path);
    if let Some(path) = &config.coverage.path {
        config.coverage.path = Some(anchor(base, path));
    }
    for test in &mut config.test {
        test.image = anchor(base, &test.image);
        if let Some(dis) = &test.disassembly {
            test.disassembly = Some(anchor(base, dis));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TestEntry;

    #[test]
    fn relative_paths_are_anchored() {
        let mut config = RunConfig::default();
        config.memory.image = Some(PathBuf::from("build/test.hex"));
        config.coverage.path = Some(PathBuf::from("out/cov.json"));
        resolve_paths(&mut config, Path::new("/work/bench"));
        assert_eq!(
            config.memory.image.as_deref(),
            Some(Path::new("/work/bench/build/test.hex"))
        );
        assert_eq!(config.trace.path, Path::new("/work/bench/waves.vcd"));
        assert_eq!(
            config.coverage.path.as_deref(),
            Some(Path::new("/work/bench/out/cov.json"))
        );
    }

    #[test]
    fn absolute_paths_are_kept() {
        let mut config = RunConfig::default();
        config.memory.image = Some(PathBuf::from("/images/boot.hex"));
        resolve_paths(&mut config, Path::new("/work/bench"));
        assert_eq!(
            config.memory.image.as_deref(),
            Some(Path::new("/images/boot.hex"))
        );
    }

    #[test]
    fn test_paths_are_anchored() {
        let mut config = RunConfig::default();
        config.test.push(TestEntry {
            name: None,
            image: PathBuf::from("build/add.hex"),
            disassembly: Some(PathBuf::from("build/add.dis")),
            pass_addr: None,
            fail_addr: None,
            offset: None,
            timeout_ticks: None,
            script: None,
        });
        resolve_paths(&mut config, Path::new("/work/bench"));
        assert_eq!(config.test[0].image, Path::new("/work/bench/build/add.hex"));
        assert_eq!(
            config.test[0].disassembly.as_deref(),
            Some(Path::new("/work/bench/build/add.dis"))
        );
    }

    #[test]
    fn unset_paths_stay_unset() {
        let mut config = RunConfig::default();
        resolve_paths(&mut config, Path::new("/work"));
        assert!(config.memory.image.is_none());
        assert!(config.coverage.path.is_none());
    }
}
