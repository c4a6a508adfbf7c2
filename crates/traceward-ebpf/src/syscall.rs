//! Syscall usage source.
//!
//! Unlike the exec and TCP sources this one does not stream events: it
//! accumulates the syscalls seen per mount namespace in kernel maps and
//! answers point-in-time queries.

use traceward_common::error::Result;

/// Kernel backend recording syscall usage per mount namespace.
pub trait SyscallBackend: Send {
    /// Loads and attaches the syscall probe.
    ///
    /// # Errors
    ///
    /// Returns an error if the probe cannot be loaded or attached.
    fn attach(&mut self) -> Result<()>;

    /// Detaches the probe and releases its maps.
    ///
    /// # Errors
    ///
    /// Returns an error if the probe cannot be detached cleanly.
    fn detach(&mut self) -> Result<()>;

    /// Returns the names of the syscalls observed so far in the given
    /// mount namespace.
    ///
    /// # Errors
    ///
    /// Returns an error if the kernel map cannot be read.
    fn peek(&self, mount_ns_id: u64) -> Result<Vec<String>>;
}
