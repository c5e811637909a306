//! CLI error types with miette diagnostics.
//!
//! Maps config and core errors into user-facing errors with help text.

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

use shapesync_config::ConfigError;
use shapesync_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const CONFIG: i32 = 3;
    pub const WRITE: i32 = 4;
    pub const INTERRUPTED: i32 = 130;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Configuration ────────────────────────────────────────────────
    #[error("No config file at {}", path.display())]
    #[diagnostic(
        code(shapesync::no_config),
        help(
            "Create a config.json listing your routers, or point at one with\n\
             --config <path> / SHAPESYNC_CONFIG."
        )
    )]
    NoConfig { path: PathBuf },

    #[error("Configuration error: {0}")]
    #[diagnostic(
        code(shapesync::config_error),
        help("The config file is not valid JSON or a field has the wrong type.")
    )]
    Config(Box<figment::Error>),

    #[error("Invalid {field}: {reason}")]
    #[diagnostic(code(shapesync::validation_failed))]
    Validation { field: String, reason: String },

    #[error("Cannot load static devices from {}", path.display())]
    #[diagnostic(
        code(shapesync::static_devices),
        help("Fix the JSON in the static device file or remove it to run without static entries.")
    )]
    StaticDevices {
        path: PathBuf,
        #[source]
        source: CoreError,
    },

    // ── Sync ─────────────────────────────────────────────────────────
    #[error("Failed to write shaping artifacts")]
    #[diagnostic(
        code(shapesync::write_failed),
        help("Check that the output directory exists and is writable. Previous files were kept.")
    )]
    WriteFailed {
        #[source]
        source: CoreError,
    },

    #[error("Interrupted before the cycle finished")]
    #[diagnostic(code(shapesync::interrupted))]
    Interrupted,

    #[error("{0}")]
    #[diagnostic(code(shapesync::sync_error))]
    Sync(CoreError),

    // ── Output ───────────────────────────────────────────────────────
    #[error("I/O error: {0}")]
    #[diagnostic(code(shapesync::io))]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::NoConfig { .. } | Self::Config(_) | Self::StaticDevices { .. } => {
                exit_code::CONFIG
            }
            Self::Validation { .. } => exit_code::USAGE,
            Self::WriteFailed { .. } => exit_code::WRITE,
            Self::Interrupted => exit_code::INTERRUPTED,
            Self::Sync(_) | Self::Io(_) => exit_code::GENERAL,
        }
    }
}

// ── From conversions ─────────────────────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NotFound { path } => Self::NoConfig { path },
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            ConfigError::Figment(e) => Self::Config(e),
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Cancelled => Self::Interrupted,
            CoreError::ConfigValidation { field, reason } => Self::Validation { field, reason },
            e @ (CoreError::Io { .. } | CoreError::Serialization { .. }) => {
                Self::WriteFailed { source: e }
            }
            other => Self::Sync(other),
        }
    }
}
