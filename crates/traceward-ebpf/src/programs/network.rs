//! Network tracing program.

/// Name of the program attached to the TCP accept/connect kprobes.
pub const TCP_PROGRAM_NAME: &str = "trace_tcp";
