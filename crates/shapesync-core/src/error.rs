// ── Core error types ──
//
// Every failure the sync engine can observe. Only `Io` and
// `Serialization` escalate to a whole-cycle failure; connectivity errors
// are isolated to one router, parse and validation errors to one record.
// `CoreError::from_api` translates transport errors into router-scoped
// variants.

use std::path::PathBuf;

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connectivity (isolated per router) ───────────────────────────
    #[error("Router {router} unreachable: {reason}")]
    Connectivity { router: String, reason: String },

    #[error("Authentication failed for router {router}: {message}")]
    AuthenticationFailed { router: String, message: String },

    #[error("Router {router} timed out after {timeout_secs}s")]
    Timeout { router: String, timeout_secs: u64 },

    /// The router answered but refused the request, e.g. REST disabled or
    /// the user lacks the `rest-api` policy.
    #[error("Router {router} rejected the request: {reason}")]
    Rejected { router: String, reason: String },

    // ── Data errors (isolated per record) ────────────────────────────
    #[error("Cannot parse {input:?}: {reason}")]
    Parse { input: String, reason: String },

    #[error("Invalid {field}: {reason}")]
    ConfigValidation { field: String, reason: String },

    // ── Artifact errors (fail the whole cycle) ───────────────────────
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize {artifact}: {message}")]
    Serialization { artifact: String, message: String },

    // ── Lifecycle ────────────────────────────────────────────────────
    #[error("Reload command failed: {message}")]
    ReloadHook { message: String },

    #[error("Sync cycle cancelled by shutdown")]
    Cancelled,
}

impl CoreError {
    /// Translate a transport-layer error into a router-scoped variant.
    pub fn from_api(router: &str, err: shapesync_api::Error) -> Self {
        let router = router.to_owned();
        let transient = err.is_transient();
        match err {
            shapesync_api::Error::Authentication { message } => {
                Self::AuthenticationFailed { router, message }
            }
            shapesync_api::Error::Transport(e) => Self::Connectivity {
                router,
                reason: e.to_string(),
            },
            shapesync_api::Error::InvalidUrl(e) => Self::ConfigValidation {
                field: format!("routers.{router}.address"),
                reason: e.to_string(),
            },
            shapesync_api::Error::Tls(msg) => Self::Connectivity {
                router,
                reason: format!("TLS error: {msg}"),
            },
            shapesync_api::Error::RouterOs { status, message } => {
                let reason = format!("HTTP {status}: {message}");
                if transient {
                    Self::Connectivity { router, reason }
                } else {
                    Self::Rejected { router, reason }
                }
            }
            shapesync_api::Error::Deserialization { message, body: _ } => Self::Parse {
                input: format!("response from {router}"),
                reason: message,
            },
        }
    }

    /// Returns `true` for errors scoped to a single router's contribution.
    pub fn is_source_failure(&self) -> bool {
        matches!(
            self,
            Self::Connectivity { .. }
                | Self::AuthenticationFailed { .. }
                | Self::Timeout { .. }
                | Self::Rejected { .. }
                | Self::Parse { .. }
        )
    }

    /// Returns `true` if retrying the same request cannot succeed.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            Self::AuthenticationFailed { .. }
                | Self::Rejected { .. }
                | Self::ConfigValidation { .. }
        )
    }
}
