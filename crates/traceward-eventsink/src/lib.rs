//! # traceward-eventsink
//!
//! Storage side of the recorder.
//!
//! - [`EventStore`](store::EventStore): container-keyed event buckets
//!   with snapshot reads, atomic cleanup, and an optional retention bound.
//! - [`EventSink`](sink::EventSink): non-blocking front door that queues
//!   events from any number of producer threads and drains them into the
//!   store from a single consumer task.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod sink;
pub mod store;

pub use sink::EventSink;
pub use store::EventStore;
