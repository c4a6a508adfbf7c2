//! # traceward-common
//!
//! Canonical event model, error definitions, configuration models, and
//! constants used across the entire traceward workspace.
//!
//! This crate is the leaf of the dependency graph: it depends on no other
//! internal crate and defines the per-container event schema that every
//! other crate produces, stores, or consumes.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod config;
pub mod constants;
pub mod error;
pub mod types;
