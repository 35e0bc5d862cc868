//! Error types for the simulator.
//!
//! Three error families cross the engine boundary:
//! 1. **Configuration errors:** rejected before simulation starts, always
//!    naming the offending key.
//! 2. **Trace errors:** malformed lines (skippable, or fatal in strict mode)
//!    and I/O failures while reading the trace stream.
//! 3. **The umbrella [`SimError`]:** what binaries match on to pick an exit
//!    code.
//!
//! Internal invariant violations (a policy returning an out-of-range way, an
//! inconsistent coherence state) are deliberately *not* represented here:
//! those are bugs and panic with a diagnostic instead of propagating.

use thiserror::Error;

/// A rejected configuration.
///
/// Carries the JSON key path of the offending option so the message points
/// the user at exactly what to fix.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("configuration error at `{key}`: {reason}")]
pub struct ConfigError {
    /// Dotted key path of the offending option (e.g. `l1.blockSize`).
    pub key: String,
    /// Human-readable description of the violation.
    pub reason: String,
}

impl ConfigError {
    /// Creates a configuration error for the given key.
    pub fn new(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

/// Errors arising from trace input.
#[derive(Debug, Error)]
pub enum TraceError {
    /// A line that could not be parsed as an access record.
    ///
    /// In lenient mode the reader counts and skips these; in strict mode the
    /// first one aborts the run.
    #[error("trace parse error at line {line}: {reason}")]
    Parse {
        /// 1-based line number within the trace stream.
        line: usize,
        /// What was wrong with the line.
        reason: String,
    },

    /// The trace file could not be opened or read.
    #[error("trace I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Top-level simulator error, mapped to process exit codes by the CLI.
#[derive(Debug, Error)]
pub enum SimError {
    /// Invalid configuration (exit code 2).
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Trace input failure (exit code 3).
    #[error(transparent)]
    Trace(#[from] TraceError),

    /// Statistics export failure (nonfatal at the engine level; the CLI
    /// warns and continues).
    #[error("export error: {0}")]
    Export(String),
}
