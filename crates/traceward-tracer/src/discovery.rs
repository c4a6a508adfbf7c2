//! Container discovery boundary.
//!
//! Discovery maps kernel-visible containers to their pod metadata and
//! reports them as they appear and disappear. The tracer subscribes to it
//! on start and releases the subscription on stop.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use traceward_common::config::TracerConfig;
use traceward_common::error::Result;
use traceward_common::types::{ContainerActivity, ContainerActivityEvent, ContainerKey};
use traceward_ebpf::EventCallback;

/// Enriched metadata of a discovered container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerMetadata {
    /// Kubernetes namespace.
    pub namespace: String,
    /// Pod name.
    pub pod_name: String,
    /// Container name.
    pub container_name: String,
    /// Runtime container ID.
    pub container_id: String,
    /// Inode of the container's mount namespace.
    pub mount_ns_id: u64,
    /// Pod labels.
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

impl ContainerMetadata {
    /// Returns the key of the bucket holding this container's events.
    #[must_use]
    pub fn key(&self) -> ContainerKey {
        ContainerKey::new(&self.namespace, &self.pod_name, &self.container_name)
    }
}

/// Whether a container appeared or went away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationKind {
    /// The container was added.
    Added,
    /// The container was removed.
    Removed,
}

/// A container add/remove notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerNotification {
    /// What happened.
    pub kind: NotificationKind,
    /// The container it happened to.
    pub container: ContainerMetadata,
}

impl ContainerNotification {
    /// Builds the activity event listeners receive for this notification.
    #[must_use]
    pub fn activity_event(&self) -> ContainerActivityEvent {
        let activity = match self.kind {
            NotificationKind::Added => ContainerActivity::Start,
            NotificationKind::Removed => ContainerActivity::Stop,
        };
        ContainerActivityEvent {
            pod_name: self.container.pod_name.clone(),
            namespace: self.container.namespace.clone(),
            container_name: self.container.container_name.clone(),
            container_id: self.container.container_id.clone(),
            mount_ns_id: self.container.mount_ns_id,
            activity,
        }
    }
}

/// Source of container add/remove notifications.
pub trait ContainerDiscovery: Send {
    /// Starts discovering containers on `config.node_name` and delivers
    /// every add/remove to `notify`.
    ///
    /// # Errors
    ///
    /// Returns an error if discovery cannot be initialized.
    fn subscribe(
        &mut self,
        config: &TracerConfig,
        notify: EventCallback<ContainerNotification>,
    ) -> Result<()>;

    /// Ends the subscription. No notification is delivered afterwards.
    ///
    /// # Errors
    ///
    /// Returns an error if discovery cannot be shut down cleanly.
    fn close(&mut self) -> Result<()>;
}

/// Discovery over a fixed set of containers.
///
/// Reports every container as added when subscribed and as removed when
/// closed.
#[derive(Default)]
pub struct StaticDiscovery {
    containers: Vec<ContainerMetadata>,
    notify: Option<EventCallback<ContainerNotification>>,
}

impl StaticDiscovery {
    /// Creates a discovery reporting `containers`.
    #[must_use]
    pub const fn new(containers: Vec<ContainerMetadata>) -> Self {
        Self {
            containers,
            notify: None,
        }
    }

    /// Returns the containers this discovery reports.
    #[must_use]
    pub fn containers(&self) -> &[ContainerMetadata] {
        &self.containers
    }

    fn announce(&self, notify: &EventCallback<ContainerNotification>, kind: NotificationKind) {
        for container in &self.containers {
            notify(&ContainerNotification {
                kind,
                container: container.clone(),
            });
        }
    }
}

impl ContainerDiscovery for StaticDiscovery {
    fn subscribe(
        &mut self,
        config: &TracerConfig,
        notify: EventCallback<ContainerNotification>,
    ) -> Result<()> {
        tracing::debug!(
            node = %config.node_name,
            containers = self.containers.len(),
            "static discovery subscribed"
        );
        self.announce(&notify, NotificationKind::Added);
        self.notify = Some(notify);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if let Some(notify) = self.notify.take() {
            self.announce(&notify, NotificationKind::Removed);
        }
        Ok(())
    }
}
