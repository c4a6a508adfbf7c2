//! Configuration model for the traceward recorder.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TracewardError};

/// Root configuration for the recorder.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TracewardConfig {
    /// Ingestion pipeline and event store settings.
    pub sink: SinkConfig,
    /// Tracer lifecycle settings.
    pub tracer: TracerConfig,
}

impl TracewardConfig {
    /// Checks every section for values that cannot be honored.
    ///
    /// # Errors
    ///
    /// Returns [`TracewardError::Config`] describing the first invalid value.
    pub fn validate(&self) -> Result<()> {
        self.sink.validate()
    }
}

/// Settings of the ingestion pipeline and the event store behind it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SinkConfig {
    /// Number of events the ingestion queue holds before rejecting new ones.
    pub queue_capacity: usize,
    /// Upper bound on each event sequence of a bucket.
    ///
    /// When set, the oldest event of a full sequence is evicted to make
    /// room. `None` keeps every event until the bucket is cleaned up.
    pub max_events_per_bucket: Option<usize>,
}

impl SinkConfig {
    /// Checks that the queue can hold at least one event and that a
    /// retention bound, if any, is non-zero.
    ///
    /// # Errors
    ///
    /// Returns [`TracewardError::Config`] if a value is zero.
    pub fn validate(&self) -> Result<()> {
        if self.queue_capacity == 0 {
            return Err(TracewardError::Config {
                message: "queue_capacity must be greater than zero".into(),
            });
        }
        if self.max_events_per_bucket == Some(0) {
            return Err(TracewardError::Config {
                message: "max_events_per_bucket must be greater than zero".into(),
            });
        }
        Ok(())
    }
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            queue_capacity: crate::constants::DEFAULT_QUEUE_CAPACITY,
            max_events_per_bucket: None,
        }
    }
}

/// Inputs the tracer hands to container discovery and source selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TracerConfig {
    /// Node whose containers are discovered.
    pub node_name: String,
    /// Trace only containers labelled with
    /// [`ENABLE_LABEL_KEY`](crate::constants::ENABLE_LABEL_KEY).
    pub filter_by_label: bool,
    /// Credentials for the discovery's cluster API, if it needs any.
    pub kubeconfig: Option<PathBuf>,
}
