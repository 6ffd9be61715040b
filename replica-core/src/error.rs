//! Error types for replica-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise while loading replica configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying I/O failure reading the config file.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parse error on load, with the offending file path.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// A required setting was set neither in the file nor in the environment.
    #[error("missing required setting `{field}` (set {env} or add it to the config file)")]
    Missing {
        field: &'static str,
        env: &'static str,
    },

    /// A setting was present but could not be used.
    #[error("invalid value for `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },

    /// `dirs::home_dir()` returned `None`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,
}
