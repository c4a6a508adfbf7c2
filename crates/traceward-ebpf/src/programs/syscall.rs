//! Syscall tracepoint program.

/// Name of the program attached to `sys_enter` that records syscall
/// usage per mount namespace.
pub const SYSCALL_PROGRAM_NAME: &str = "trace_syscalls";
