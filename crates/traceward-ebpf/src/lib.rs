//! # traceward-ebpf
//!
//! Boundary between the recorder and the kernel instrumentation that
//! produces its events.
//!
//! Three independent sources feed the recorder:
//! - **Exec**: successful and failed `execve` calls ([`exec`]).
//! - **TCP**: accepted and initiated connections ([`tcp`]).
//! - **Syscall**: per mount namespace syscall usage ([`syscall`]).
//!
//! Each source is an external backend that, once attached, invokes a
//! registered [`EventCallback`] from its own threads with raw records.
//! The records are deliberately close to what the probes emit; turning
//! them into canonical events is the tracer's job.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub mod exec;
pub mod programs;
pub mod selector;
pub mod syscall;
pub mod tcp;

/// Callback a backend invokes for every raw record it produces.
///
/// Backends may call it concurrently from several threads.
pub type EventCallback<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Classification of a raw record as emitted by the probes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    /// A regular traced event.
    #[default]
    Normal,
    /// The probe reported an error instead of an event.
    Err,
    /// The probe reported a warning.
    Warn,
    /// Probe debug output.
    Debug,
    /// Probe informational output.
    Info,
}
