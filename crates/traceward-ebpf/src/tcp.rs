//! TCP connection source.
//!
//! Reports connections accepted or initiated by traced containers.

use serde::{Deserialize, Serialize};
use traceward_common::error::Result;

use crate::selector::ContainerSelector;
use crate::{EventCallback, EventType};

/// A raw TCP connection record.
///
/// Every field is optional on the wire: records of operations that carry
/// no addresses still parse and are dropped during normalization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawTcpEvent {
    /// Record classification.
    #[serde(rename = "type")]
    pub event_type: EventType,
    /// Probe operation, e.g. `accept`, `connect`, `close`.
    pub operation: String,
    /// Local address of the socket.
    pub saddr: String,
    /// Local port of the socket.
    pub sport: u16,
    /// Remote address of the socket.
    pub daddr: String,
    /// Remote port of the socket.
    pub dport: u16,
    /// Container name.
    pub container: String,
    /// Pod name.
    pub pod: String,
    /// Kubernetes namespace.
    pub namespace: String,
    /// Kernel timestamp in nanoseconds.
    pub timestamp: u64,
}

/// Kernel backend delivering [`RawTcpEvent`]s.
pub trait TcpBackend: Send {
    /// Attaches the probe for the selected containers and starts
    /// delivering records to `on_event`.
    ///
    /// # Errors
    ///
    /// Returns an error if the probe cannot be loaded or attached.
    fn attach(
        &mut self,
        selector: &ContainerSelector,
        on_event: EventCallback<RawTcpEvent>,
    ) -> Result<()>;

    /// Detaches the probe. No record is delivered once this returns.
    ///
    /// # Errors
    ///
    /// Returns an error if the probe cannot be detached cleanly.
    fn detach(&mut self) -> Result<()>;
}
