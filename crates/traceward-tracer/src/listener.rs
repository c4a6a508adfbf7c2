//! Container activity listeners.
//!
//! The registry is copy-on-write: a notification walks a snapshot of the
//! list taken when it began, so listeners may add or remove listeners
//! (including themselves) while being notified. Changes apply from the
//! next notification on.

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use parking_lot::RwLock;
use traceward_common::types::ContainerActivityEvent;

/// Receives container start/stop notifications.
///
/// Called synchronously on the discovery's notification path; keep it
/// short.
pub trait ContainerActivityListener: Send + Sync {
    /// Handles one container activity event.
    fn on_container_activity(&self, event: &ContainerActivityEvent);
}

impl<F> ContainerActivityListener for F
where
    F: Fn(&ContainerActivityEvent) + Send + Sync,
{
    fn on_container_activity(&self, event: &ContainerActivityEvent) {
        self(event);
    }
}

/// Ordered set of registered listeners.
#[derive(Default)]
pub struct ListenerRegistry {
    listeners: RwLock<Arc<Vec<Arc<dyn ContainerActivityListener>>>>,
}

impl ListenerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a listener. The same listener may be registered twice and
    /// is then notified twice.
    pub fn add(&self, listener: Arc<dyn ContainerActivityListener>) {
        let mut listeners = self.listeners.write();
        let mut next = (**listeners).clone();
        next.push(listener);
        *listeners = Arc::new(next);
    }

    /// Removes the first registration of `listener`, compared by
    /// identity. Returns `false` if it was not registered.
    pub fn remove(&self, listener: &Arc<dyn ContainerActivityListener>) -> bool {
        let mut listeners = self.listeners.write();
        let Some(index) = listeners.iter().position(|l| same_listener(l, listener)) else {
            return false;
        };
        let mut next = (**listeners).clone();
        let _ = next.remove(index);
        *listeners = Arc::new(next);
        true
    }

    /// Returns the number of registrations.
    pub fn len(&self) -> usize {
        self.listeners.read().len()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.listeners.read().is_empty()
    }

    /// Delivers `event` to every listener in registration order.
    ///
    /// A panicking listener is logged and skipped; the rest still run.
    pub fn notify(&self, event: &ContainerActivityEvent) {
        let snapshot = Arc::clone(&*self.listeners.read());
        for (index, listener) in snapshot.iter().enumerate() {
            let delivered = catch_unwind(AssertUnwindSafe(|| {
                listener.on_container_activity(event);
            }));
            if delivered.is_err() {
                tracing::error!(
                    listener = index,
                    container = %event.key(),
                    activity = %event.activity,
                    "container activity listener panicked"
                );
            }
        }
    }
}

impl fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("listeners", &self.len())
            .finish()
    }
}

fn same_listener(
    a: &Arc<dyn ContainerActivityListener>,
    b: &Arc<dyn ContainerActivityListener>,
) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

/// Listener that logs every container activity.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingListener;

impl ContainerActivityListener for LoggingListener {
    fn on_container_activity(&self, event: &ContainerActivityEvent) {
        tracing::info!(
            container = %event.key(),
            container_id = %event.container_id,
            mount_ns_id = event.mount_ns_id,
            activity = %event.activity,
            "container activity"
        );
    }
}
