//! Rich diagnostic error types for kg-duo.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes and help text so users know exactly what went wrong
//! and how to fix it.

use miette::Diagnostic;
use thiserror::Error;

/// Error raised while building a graph store from configuration.
///
/// Each variant wraps a subsystem-specific error, preserving the full diagnostic
/// chain through to the user.
#[derive(Debug, Error, Diagnostic)]
pub enum DuoError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Lookup(#[from] LookupError),

}

// ---------------------------------------------------------------------------
// Config errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("missing required environment variable {var}")]
    #[diagnostic(
        code(duo::config::missing_var),
        help("Export {var} (or put it in the file passed with --config) before running.")
    )]
    MissingVar { var: String },

    #[error("invalid value for {key}: \"{value}\"")]
    #[diagnostic(
        code(duo::config::invalid_value),
        help("{expected}")
    )]
    InvalidValue {
        key: String,
        value: String,
        expected: String,
    },

    #[error("failed to read config file {path}: {source}")]
    #[diagnostic(
        code(duo::config::read),
        help("Check that the file exists and is readable.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {message}")]
    #[diagnostic(
        code(duo::config::parse),
        help("The file must be TOML with optional [graph], [llm] and [run] tables.")
    )]
    Parse { path: String, message: String },
}

// ---------------------------------------------------------------------------
// Graph lookup errors
// ---------------------------------------------------------------------------

/// Failure kinds of a one-hop graph lookup.
#[derive(Debug, Error, Diagnostic)]
pub enum LookupError {
    #[error("entity not found: \"{entity}\"")]
    #[diagnostic(
        code(duo::graph::not_found),
        help("No node has this exact name. Names are matched case-sensitively.")
    )]
    NotFound { entity: String },

    #[error("graph store unreachable at {uri}: {message}")]
    #[diagnostic(
        code(duo::graph::connection),
        help("Check NEO4J_URI and that the database is running and reachable.")
    )]
    Connection { uri: String, message: String },

    #[error("graph store rejected credentials for user \"{user}\"")]
    #[diagnostic(
        code(duo::graph::auth),
        help("Check NEO4J_USERNAME and NEO4J_PASSWORD.")
    )]
    Auth { user: String },

    #[error("graph query failed: {message}")]
    #[diagnostic(
        code(duo::graph::query),
        help("The one-hop query was rejected or returned rows of an unexpected shape.")
    )]
    Query { message: String },

    #[error("graph lookup timed out after {timeout_secs}s")]
    #[diagnostic(
        code(duo::graph::timeout),
        help("Increase graph.timeout_secs or check database load.")
    )]
    Timeout { timeout_secs: u64 },
}

impl LookupError {
    /// Whether retrying the same lookup may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::Timeout { .. })
    }
}
