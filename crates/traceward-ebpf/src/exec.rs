//! Process execution source.
//!
//! Reports every `execve` of a traced container, including failed ones;
//! the return value tells them apart.

use serde::{Deserialize, Serialize};
use traceward_common::error::Result;

use crate::selector::ContainerSelector;
use crate::{EventCallback, EventType};

/// A raw `execve` record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawExecEvent {
    /// Record classification.
    #[serde(rename = "type", default)]
    pub event_type: EventType,
    /// Return value of the `execve` call; negative on failure.
    pub retval: i64,
    /// Container name.
    pub container: String,
    /// Pod name.
    pub pod: String,
    /// Kubernetes namespace.
    pub namespace: String,
    /// Full argument vector, including `argv[0]`.
    #[serde(default)]
    pub args: Vec<String>,
    /// Kernel timestamp in nanoseconds.
    #[serde(default)]
    pub timestamp: u64,
    /// Mount namespace of the calling process.
    #[serde(default)]
    pub mount_ns_id: u64,
}

/// Kernel backend delivering [`RawExecEvent`]s.
pub trait ExecBackend: Send {
    /// Attaches the probe for the selected containers and starts
    /// delivering records to `on_event`.
    ///
    /// # Errors
    ///
    /// Returns an error if the probe cannot be loaded or attached.
    fn attach(
        &mut self,
        selector: &ContainerSelector,
        on_event: EventCallback<RawExecEvent>,
    ) -> Result<()>;

    /// Detaches the probe. No record is delivered once this returns.
    ///
    /// # Errors
    ///
    /// Returns an error if the probe cannot be detached cleanly.
    fn detach(&mut self) -> Result<()>;
}
