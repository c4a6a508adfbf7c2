//! # traceward-tracer
//!
//! Feeds the event sink from the kernel sources and tells interested
//! parties when containers come and go.
//!
//! - [`normalize`]: raw records to canonical events.
//! - [`source`]: the exec, TCP, and syscall sources behind one
//!   start/stop surface.
//! - [`discovery`]: the container discovery boundary.
//! - [`listener`]: container activity listeners and their registry.
//! - [`tracer`]: the lifecycle coordinator tying them together.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod builder;
pub mod discovery;
pub mod listener;
pub mod normalize;
pub mod source;
pub mod tracer;

pub use builder::TracerBuilder;
pub use tracer::{Tracer, TracerState};
