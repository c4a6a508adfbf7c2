//! Exec tracing program.

/// Name of the program attached to the `execve` tracepoints.
pub const EXEC_PROGRAM_NAME: &str = "trace_exec";
