//! Fluent API for assembling a [`Tracer`].

use std::sync::Arc;

use traceward_common::config::TracerConfig;
use traceward_common::error::{Result, TracewardError};
use traceward_ebpf::exec::ExecBackend;
use traceward_ebpf::syscall::SyscallBackend;
use traceward_ebpf::tcp::TcpBackend;

use crate::discovery::ContainerDiscovery;
use crate::source::{EventSender, TraceSource};
use crate::tracer::Tracer;

/// Builder collecting the collaborators of a [`Tracer`].
///
/// Every collaborator is required. The sources are always started in the
/// order exec, tcp, syscall, whatever order they are supplied in.
pub struct TracerBuilder {
    config: TracerConfig,
    discovery: Option<Box<dyn ContainerDiscovery>>,
    exec: Option<Box<dyn ExecBackend>>,
    tcp: Option<Box<dyn TcpBackend>>,
    syscall: Option<Box<dyn SyscallBackend>>,
    sender: Option<Arc<dyn EventSender>>,
}

impl TracerBuilder {
    /// Creates a builder for the given configuration.
    #[must_use]
    pub fn new(config: TracerConfig) -> Self {
        Self {
            config,
            discovery: None,
            exec: None,
            tcp: None,
            syscall: None,
            sender: None,
        }
    }

    /// Sets the container discovery.
    #[must_use]
    pub fn discovery(mut self, discovery: impl ContainerDiscovery + 'static) -> Self {
        self.discovery = Some(Box::new(discovery));
        self
    }

    /// Sets the process execution backend.
    #[must_use]
    pub fn exec_backend(mut self, backend: impl ExecBackend + 'static) -> Self {
        self.exec = Some(Box::new(backend));
        self
    }

    /// Sets the TCP connection backend.
    #[must_use]
    pub fn tcp_backend(mut self, backend: impl TcpBackend + 'static) -> Self {
        self.tcp = Some(Box::new(backend));
        self
    }

    /// Sets the syscall usage backend.
    #[must_use]
    pub fn syscall_backend(mut self, backend: impl SyscallBackend + 'static) -> Self {
        self.syscall = Some(Box::new(backend));
        self
    }

    /// Sets where normalized events go, usually an
    /// [`EventSink`](traceward_eventsink::EventSink).
    #[must_use]
    pub fn sender(mut self, sender: Arc<dyn EventSender>) -> Self {
        self.sender = Some(sender);
        self
    }

    /// Builds a stopped tracer.
    ///
    /// # Errors
    ///
    /// Returns [`TracewardError::Config`] naming the first missing
    /// collaborator.
    pub fn build(self) -> Result<Tracer> {
        let discovery = required(self.discovery, "container discovery")?;
        let exec = required(self.exec, "exec backend")?;
        let tcp = required(self.tcp, "tcp backend")?;
        let syscall = required(self.syscall, "syscall backend")?;
        let sender = required(self.sender, "event sender")?;

        let sources = vec![
            TraceSource::Exec(exec),
            TraceSource::Tcp(tcp),
            TraceSource::Syscall(syscall),
        ];
        Ok(Tracer::new(self.config, discovery, sources, sender))
    }
}

fn required<T>(value: Option<T>, what: &str) -> Result<T> {
    value.ok_or_else(|| TracewardError::Config {
        message: format!("{what} is required"),
    })
}
