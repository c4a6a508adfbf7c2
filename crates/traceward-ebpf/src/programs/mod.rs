//! Names of the kernel programs behind each source.
//!
//! They identify the sources in logs and lifecycle errors.

pub mod exec;
pub mod network;
pub mod syscall;
