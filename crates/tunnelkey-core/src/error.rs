// ── Core error types ──
//
// User-facing errors from tunnelkey-core. Consumers never see raw IO or
// JSON parse failures directly; the daemon client translates them into
// domain-appropriate variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to daemon at {path}: {reason}")]
    ConnectionFailed { path: String, reason: String },

    #[error("Daemon disconnected")]
    DaemonDisconnected,

    #[error("Daemon request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    // ── Protocol errors ──────────────────────────────────────────────
    #[error("Daemon rejected the request: {message}")]
    Rejected { message: String },

    #[error("Malformed daemon message: {message}")]
    Protocol { message: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<std::io::Error> for CoreError {
    fn from(err: std::io::Error) -> Self {
        CoreError::Protocol {
            message: format!("socket IO failed: {err}"),
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::Protocol {
            message: format!("JSON decode failed: {err}"),
        }
    }
}
