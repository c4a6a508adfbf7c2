//! The three raw event sources behind one start/stop surface.
//!
//! Starting a streaming source registers a callback with its backend that
//! normalizes each raw record and hands the result to an [`EventSender`].
//! Nothing is written to storage on the backend's threads.

use std::sync::Arc;

use traceward_common::error::Result;
use traceward_common::types::{ExecEvent, TcpEvent};
use traceward_ebpf::exec::{ExecBackend, RawExecEvent};
use traceward_ebpf::programs::exec::EXEC_PROGRAM_NAME;
use traceward_ebpf::programs::network::TCP_PROGRAM_NAME;
use traceward_ebpf::programs::syscall::SYSCALL_PROGRAM_NAME;
use traceward_ebpf::selector::ContainerSelector;
use traceward_ebpf::syscall::SyscallBackend;
use traceward_ebpf::tcp::{RawTcpEvent, TcpBackend};
use traceward_eventsink::EventSink;

use crate::normalize;

/// Destination of normalized events.
///
/// Implementations must return without blocking: they are called on the
/// kernel sources' delivery threads.
pub trait EventSender: Send + Sync {
    /// Accepts one exec event.
    fn send_exec(&self, event: ExecEvent);

    /// Accepts one TCP event.
    fn send_tcp(&self, event: TcpEvent);
}

impl EventSender for EventSink {
    fn send_exec(&self, event: ExecEvent) {
        if let Err(e) = self.submit_exec(event) {
            tracing::trace!(error = %e, "exec event not queued");
        }
    }

    fn send_tcp(&self, event: TcpEvent) {
        if let Err(e) = self.submit_tcp(event) {
            tracing::trace!(error = %e, "tcp event not queued");
        }
    }
}

/// One raw event source.
pub enum TraceSource {
    /// Process executions.
    Exec(Box<dyn ExecBackend>),
    /// TCP accepts and connects.
    Tcp(Box<dyn TcpBackend>),
    /// Per mount namespace syscall usage.
    Syscall(Box<dyn SyscallBackend>),
}

impl TraceSource {
    /// Returns the name of the kernel program behind this source.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Exec(_) => EXEC_PROGRAM_NAME,
            Self::Tcp(_) => TCP_PROGRAM_NAME,
            Self::Syscall(_) => SYSCALL_PROGRAM_NAME,
        }
    }

    /// Attaches the backend.
    ///
    /// Streaming sources deliver normalized events for containers matched
    /// by `selector` to `sender`.
    ///
    /// # Errors
    ///
    /// Returns the backend's attach error.
    pub fn start(
        &mut self,
        selector: &ContainerSelector,
        sender: &Arc<dyn EventSender>,
    ) -> Result<()> {
        match self {
            Self::Exec(backend) => {
                let sender = Arc::clone(sender);
                backend.attach(
                    selector,
                    Arc::new(move |raw: &RawExecEvent| {
                        if let Some(event) = normalize::exec_event(raw) {
                            sender.send_exec(event);
                        }
                    }),
                )
            }
            Self::Tcp(backend) => {
                let sender = Arc::clone(sender);
                backend.attach(
                    selector,
                    Arc::new(move |raw: &RawTcpEvent| {
                        if let Some(event) = normalize::tcp_event(raw) {
                            sender.send_tcp(event);
                        }
                    }),
                )
            }
            Self::Syscall(backend) => backend.attach(),
        }
    }

    /// Detaches the backend.
    ///
    /// # Errors
    ///
    /// Returns the backend's detach error.
    pub fn stop(&mut self) -> Result<()> {
        match self {
            Self::Exec(backend) => backend.detach(),
            Self::Tcp(backend) => backend.detach(),
            Self::Syscall(backend) => backend.detach(),
        }
    }

    /// Returns the syscall backend if this is the syscall source.
    #[must_use]
    pub fn as_syscall(&self) -> Option<&dyn SyscallBackend> {
        match self {
            Self::Syscall(backend) => Some(&**backend),
            Self::Exec(_) | Self::Tcp(_) => None,
        }
    }
}
