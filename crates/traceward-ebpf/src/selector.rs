//! Container selection for the streaming sources.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use traceward_common::constants::{ENABLE_LABEL_KEY, ENABLE_LABEL_VALUE};

/// Decides which containers a source traces.
///
/// An empty selector matches every container. Otherwise a container
/// matches when it carries every required label with the same value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSelector {
    labels: BTreeMap<String, String>,
}

impl ContainerSelector {
    /// Selects every container.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Selects only containers carrying the enablement label.
    #[must_use]
    pub fn enabled_only() -> Self {
        Self::all().with_label(ENABLE_LABEL_KEY, ENABLE_LABEL_VALUE)
    }

    /// Adds a required label.
    #[must_use]
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let _ = self.labels.insert(key.into(), value.into());
        self
    }

    /// Returns `true` if the selector places no restriction.
    #[must_use]
    pub fn is_all(&self) -> bool {
        self.labels.is_empty()
    }

    /// Returns the required labels.
    #[must_use]
    pub const fn labels(&self) -> &BTreeMap<String, String> {
        &self.labels
    }

    /// Returns `true` if a container with `labels` is selected.
    #[must_use]
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.labels
            .iter()
            .all(|(key, value)| labels.get(key) == Some(value))
    }
}
