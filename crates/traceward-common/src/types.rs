//! Canonical per-container event model.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity of one event bucket: `(namespace, pod, container)`.
///
/// Components are opaque and case-sensitive; no normalization is applied.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContainerKey {
    /// Kubernetes namespace.
    pub namespace: String,
    /// Pod name.
    pub pod_name: String,
    /// Container name.
    pub container_name: String,
}

impl ContainerKey {
    /// Creates a key from its three components.
    #[must_use]
    pub fn new(
        namespace: impl Into<String>,
        pod_name: impl Into<String>,
        container_name: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            pod_name: pod_name.into(),
            container_name: container_name.into(),
        }
    }
}

impl fmt::Display for ContainerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.namespace, self.pod_name, self.container_name)
    }
}

/// A successful process execution inside a container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecEvent {
    /// Container the process ran in, as reported by the source.
    pub container_id: String,
    /// Pod name.
    pub pod_name: String,
    /// Kubernetes namespace.
    pub namespace: String,
    /// Executed path (`argv[0]`).
    pub path_name: String,
    /// Remaining arguments (`argv[1..]`).
    pub args: Vec<String>,
    /// Environment of the process, when captured.
    pub env: Vec<String>,
    /// Kernel timestamp in nanoseconds.
    pub timestamp_ns: i64,
}

impl ExecEvent {
    /// Returns the key of the bucket this event belongs to.
    #[must_use]
    pub fn key(&self) -> ContainerKey {
        ContainerKey::new(&self.namespace, &self.pod_name, &self.container_id)
    }
}

/// Direction of an established TCP connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TcpOperation {
    /// The container accepted an inbound connection.
    Accept,
    /// The container connected to a peer.
    Connect,
}

impl TcpOperation {
    /// Parses the operation name used by raw TCP records.
    ///
    /// Returns `None` for operations that are not recorded.
    #[must_use]
    pub fn from_raw(operation: &str) -> Option<Self> {
        match operation {
            "accept" => Some(Self::Accept),
            "connect" => Some(Self::Connect),
            _ => None,
        }
    }

    /// Returns the lowercase operation name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Accept => "accept",
            Self::Connect => "connect",
        }
    }
}

impl fmt::Display for TcpOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An established TCP connection of a container.
///
/// `source` and `source_port` are always empty/zero: only the peer side
/// of the connection is recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TcpEvent {
    /// Container the connection belongs to, as reported by the source.
    pub container_id: String,
    /// Pod name.
    pub pod_name: String,
    /// Kubernetes namespace.
    pub namespace: String,
    /// Source address (always empty).
    pub source: String,
    /// Source port (always zero).
    pub source_port: u16,
    /// Destination address.
    pub destination: String,
    /// Destination port.
    pub dest_port: u16,
    /// Whether the connection was accepted or initiated.
    pub operation: TcpOperation,
    /// Kernel timestamp in nanoseconds.
    pub timestamp_ns: i64,
}

impl TcpEvent {
    /// Returns the key of the bucket this event belongs to.
    #[must_use]
    pub fn key(&self) -> ContainerKey {
        ContainerKey::new(&self.namespace, &self.pod_name, &self.container_id)
    }
}

/// Container lifecycle transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContainerActivity {
    /// The container appeared.
    Start,
    /// The container went away.
    Stop,
}

impl fmt::Display for ContainerActivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => write!(f, "start"),
            Self::Stop => write!(f, "stop"),
        }
    }
}

/// Notification delivered to activity listeners when a container starts
/// or stops. Never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerActivityEvent {
    /// Pod name.
    pub pod_name: String,
    /// Kubernetes namespace.
    pub namespace: String,
    /// Container name.
    pub container_name: String,
    /// Runtime container ID.
    pub container_id: String,
    /// Inode of the container's mount namespace.
    pub mount_ns_id: u64,
    /// What happened to the container.
    pub activity: ContainerActivity,
}

impl ContainerActivityEvent {
    /// Returns the key of the bucket holding this container's events.
    #[must_use]
    pub fn key(&self) -> ContainerKey {
        ContainerKey::new(&self.namespace, &self.pod_name, &self.container_name)
    }
}
