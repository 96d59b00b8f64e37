//! Error types for configuration loading and validation.

use std::path::PathBuf;

/// Errors that can occur when loading or validating a `cyclebench.toml` configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("cannot read {}: {source}", path.display())]
    Read {
        /// File that was being read.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The file is not TOML, or its tables do not match the expected layout.
    #[error("malformed configuration: {0}")]
    Syntax(#[from] toml::de::Error),

    /// A sentinel address is set neither in `[run]` nor anywhere else.
    #[error("{key} is not set")]
    MissingSentinel {
        /// Dotted key of the missing address, e.g. `run.pass_addr`.
        key: String,
    },

    /// The pass and fail sentinels name the same address.
    #[error("{context}pass and fail sentinels are both {addr:#010x}")]
    SentinelClash {
        /// Where the sentinels came from, e.g. `test[2]: `; empty for `[run]`.
        context: String,
        /// The shared address.
        addr: u32,
    },

    /// A key holds a value outside what the harness accepts.
    #[error("{key}: {reason}")]
    Invalid {
        /// Dotted key of the offending value, e.g. `memory.offset`.
        key: String,
        /// What is wrong with it.
        reason: String,
    },
}

impl ConfigError {
    /// Shorthand for [`ConfigError::Invalid`].
    pub fn invalid(key: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for [`ConfigError::MissingSentinel`].
    pub fn missing_sentinel(key: impl Into<String>) -> Self {
        ConfigError::MissingSentinel { key: key.into() }
    }

    /// The dotted key the error is about, when there is one.
    pub fn key(&self) -> Option<&str> {
        match self {
            ConfigError::MissingSentinel { key } | ConfigError::Invalid { key, .. } => {
                Some(key.as_str())
            }
            ConfigError::Read { .. }
            | ConfigError::Syntax(_)
            | ConfigError::SentinelClash { .. } => None,
        }
    }
}
