//! Unified error types for the traceward workspace.
//!
//! Lifecycle, pipeline, and store failures all surface through
//! [`TracewardError`]. Raw events that fail normalization are not errors
//! and never reach this type.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum TracewardError {
    /// A raw event source or the container discovery failed to initialize.
    #[error("{component} unavailable: {reason}")]
    SourceUnavailable {
        /// Name of the component that could not be started.
        component: String,
        /// Description of the underlying failure.
        reason: String,
    },

    /// An operation that requires a running component was invoked while
    /// it was not running.
    #[error("{operation} requires a running tracer")]
    NotRunning {
        /// Operation that was attempted.
        operation: &'static str,
    },

    /// A lifecycle transition was requested from a state that does not
    /// allow it.
    #[error("cannot {operation} while {state}")]
    InvalidState {
        /// Operation that was attempted.
        operation: &'static str,
        /// State the component was in.
        state: String,
    },

    /// One or more components failed to stop cleanly.
    ///
    /// Shutdown still completed; this only reports what went wrong.
    #[error("teardown finished with {} failure(s): {}", failures.len(), failures.join("; "))]
    Teardown {
        /// One message per component that failed to stop.
        failures: Vec<String>,
    },

    /// The event store could not grow a bucket.
    #[error("event store exhausted for {key}: {reason}")]
    StoreExhausted {
        /// Container key whose bucket could not grow.
        key: String,
        /// Description of the allocation failure.
        reason: String,
    },

    /// The ingestion queue is full and the event was rejected.
    #[error("ingestion queue is full")]
    QueueFull,

    /// The ingestion pipeline is not accepting events.
    #[error("ingestion pipeline is not running")]
    PipelineStopped,

    /// An I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A configuration value is invalid.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the invalid configuration.
        message: String,
    },

    /// Serialization or deserialization failed.
    #[error("serialization error: {source}")]
    Serialization {
        /// Underlying serialization error.
        #[from]
        source: serde_json::Error,
    },
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, TracewardError>;
