//! Tracer lifecycle coordinator.
//!
//! Owns the container discovery subscription and the three raw event
//! sources, and starts and stops them as one unit:
//!
//! ```text
//! Stopped -> Starting -> Running -> Stopping -> Stopped
//!               |
//!               +-- any failure: roll back, back to Stopped
//! ```
//!
//! Sources start in a fixed order (exec, tcp, syscall). A failed start
//! stops whatever already started, in reverse order, and releases the
//! discovery subscription. Stopping is best effort: every component is
//! asked to stop even when an earlier one fails.

use std::fmt;
use std::sync::Arc;

use traceward_common::config::TracerConfig;
use traceward_common::constants::DISCOVERY_COMPONENT;
use traceward_common::error::{Result, TracewardError};
use traceward_ebpf::EventCallback;
use traceward_ebpf::selector::ContainerSelector;

use crate::discovery::{ContainerDiscovery, ContainerNotification};
use crate::listener::{ContainerActivityListener, ListenerRegistry};
use crate::source::{EventSender, TraceSource};

/// Lifecycle state of a [`Tracer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TracerState {
    /// Nothing attached.
    Stopped,
    /// Discovery and sources are being brought up.
    Starting,
    /// Every source is attached.
    Running,
    /// Discovery and sources are being torn down.
    Stopping,
}

impl fmt::Display for TracerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stopped => write!(f, "stopped"),
            Self::Starting => write!(f, "starting"),
            Self::Running => write!(f, "running"),
            Self::Stopping => write!(f, "stopping"),
        }
    }
}

/// Coordinates discovery, raw event sources, and activity listeners.
///
/// Build one with [`TracerBuilder`](crate::builder::TracerBuilder).
pub struct Tracer {
    config: TracerConfig,
    state: TracerState,
    discovery: Box<dyn ContainerDiscovery>,
    sources: Vec<TraceSource>,
    sender: Arc<dyn EventSender>,
    listeners: Arc<ListenerRegistry>,
    selector: ContainerSelector,
}

impl Tracer {
    pub(crate) fn new(
        config: TracerConfig,
        discovery: Box<dyn ContainerDiscovery>,
        sources: Vec<TraceSource>,
        sender: Arc<dyn EventSender>,
    ) -> Self {
        Self {
            config,
            state: TracerState::Stopped,
            discovery,
            sources,
            sender,
            listeners: Arc::new(ListenerRegistry::new()),
            selector: ContainerSelector::all(),
        }
    }

    /// Subscribes to container discovery and attaches every source.
    ///
    /// # Errors
    ///
    /// Returns [`TracewardError::InvalidState`] unless the tracer is
    /// stopped, and [`TracewardError::SourceUnavailable`] naming the
    /// component that failed. After a failure the tracer is stopped and
    /// nothing is left attached.
    pub fn start(&mut self) -> Result<()> {
        if self.state != TracerState::Stopped {
            return Err(TracewardError::InvalidState {
                operation: "start tracer",
                state: self.state.to_string(),
            });
        }
        self.state = TracerState::Starting;
        tracing::info!(
            node = %self.config.node_name,
            filter_by_label = self.config.filter_by_label,
            "starting tracer"
        );

        let listeners = Arc::clone(&self.listeners);
        let notify: EventCallback<ContainerNotification> =
            Arc::new(move |notification: &ContainerNotification| {
                listeners.notify(&notification.activity_event());
            });
        if let Err(e) = self.discovery.subscribe(&self.config, notify) {
            self.state = TracerState::Stopped;
            tracing::error!(error = %e, "failed to subscribe to container discovery");
            return Err(unavailable(DISCOVERY_COMPONENT, e));
        }

        self.selector = if self.config.filter_by_label {
            ContainerSelector::enabled_only()
        } else {
            ContainerSelector::all()
        };

        let mut failure = None;
        for (index, source) in self.sources.iter_mut().enumerate() {
            if let Err(e) = source.start(&self.selector, &self.sender) {
                failure = Some((index, source.name(), e));
                break;
            }
            tracing::debug!(source = source.name(), "source started");
        }

        if let Some((started, name, e)) = failure {
            tracing::error!(source = name, error = %e, "failed to start source, rolling back");
            self.rollback(started);
            self.state = TracerState::Stopped;
            return Err(unavailable(name, e));
        }

        self.state = TracerState::Running;
        tracing::info!(sources = self.sources.len(), "tracer running");
        Ok(())
    }

    /// Stops the first `started` sources in reverse order and releases
    /// discovery. Failures are only logged.
    fn rollback(&mut self, started: usize) {
        for source in self.sources[..started].iter_mut().rev() {
            if let Err(e) = source.stop() {
                tracing::warn!(source = source.name(), error = %e, "rollback failed to stop source");
            }
        }
        if let Err(e) = self.discovery.close() {
            tracing::warn!(error = %e, "rollback failed to close container discovery");
        }
    }

    /// Releases discovery and detaches every source.
    ///
    /// The tracer ends up stopped even when components fail to stop.
    ///
    /// # Errors
    ///
    /// Returns [`TracewardError::InvalidState`] unless the tracer is
    /// running, and [`TracewardError::Teardown`] listing every component
    /// that failed to stop.
    pub fn stop(&mut self) -> Result<()> {
        if self.state != TracerState::Running {
            return Err(TracewardError::InvalidState {
                operation: "stop tracer",
                state: self.state.to_string(),
            });
        }
        self.state = TracerState::Stopping;
        tracing::info!("stopping tracer");

        let mut failures = Vec::new();
        if let Err(e) = self.discovery.close() {
            tracing::warn!(error = %e, "failed to close container discovery");
            failures.push(format!("{DISCOVERY_COMPONENT}: {e}"));
        }
        for source in &mut self.sources {
            if let Err(e) = source.stop() {
                tracing::warn!(source = source.name(), error = %e, "failed to stop source");
                failures.push(format!("{}: {e}", source.name()));
            }
        }

        self.state = TracerState::Stopped;
        if failures.is_empty() {
            tracing::info!("tracer stopped");
            Ok(())
        } else {
            Err(TracewardError::Teardown { failures })
        }
    }

    /// Returns the syscalls observed so far in a mount namespace.
    ///
    /// # Errors
    ///
    /// Returns [`TracewardError::NotRunning`] unless the tracer is
    /// running, or the syscall backend's error.
    pub fn peek_syscalls(&self, mount_ns_id: u64) -> Result<Vec<String>> {
        if self.state != TracerState::Running {
            return Err(TracewardError::NotRunning {
                operation: "peek_syscalls",
            });
        }
        self.sources
            .iter()
            .find_map(TraceSource::as_syscall)
            .ok_or(TracewardError::NotRunning {
                operation: "peek_syscalls",
            })?
            .peek(mount_ns_id)
    }

    /// Registers a container activity listener.
    pub fn add_listener(&self, listener: Arc<dyn ContainerActivityListener>) {
        self.listeners.add(listener);
    }

    /// Unregisters a listener by identity. Unknown listeners are ignored.
    pub fn remove_listener(&self, listener: &Arc<dyn ContainerActivityListener>) {
        if !self.listeners.remove(listener) {
            tracing::debug!("listener was not registered");
        }
    }

    /// Returns the listener registry shared with the discovery callback.
    #[must_use]
    pub const fn listeners(&self) -> &Arc<ListenerRegistry> {
        &self.listeners
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> TracerState {
        self.state
    }

    /// Returns the selector handed to the streaming sources on the last
    /// start.
    #[must_use]
    pub const fn selector(&self) -> &ContainerSelector {
        &self.selector
    }

    /// Returns the configuration the tracer was built with.
    #[must_use]
    pub const fn config(&self) -> &TracerConfig {
        &self.config
    }
}

impl fmt::Debug for Tracer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tracer")
            .field("config", &self.config)
            .field("state", &self.state)
            .field(
                "sources",
                &self.sources.iter().map(TraceSource::name).collect::<Vec<_>>(),
            )
            .field("listeners", &self.listeners)
            .finish_non_exhaustive()
    }
}

fn unavailable(component: &str, e: TracewardError) -> TracewardError {
    TracewardError::SourceUnavailable {
        component: component.to_string(),
        reason: e.to_string(),
    }
}
