//! File-backed event sources.
//!
//! Stand-ins for the kernel programs that feed recorded records back
//! through the tracer. Streaming records are delivered on a worker thread
//! per source, the way the kernel sources deliver on their own threads.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::thread::JoinHandle;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use traceward_common::error::{Result, TracewardError};
use traceward_common::types::ContainerKey;
use traceward_ebpf::EventCallback;
use traceward_ebpf::exec::{ExecBackend, RawExecEvent};
use traceward_ebpf::selector::ContainerSelector;
use traceward_ebpf::syscall::SyscallBackend;
use traceward_ebpf::tcp::{RawTcpEvent, TcpBackend};
use traceward_tracer::discovery::ContainerMetadata;

/// One container entry of a containers file.
#[derive(Debug, Clone, Deserialize)]
pub struct RecordedContainer {
    /// Discovery metadata.
    #[serde(flatten)]
    pub metadata: ContainerMetadata,
    /// Syscalls recorded for the container's mount namespace.
    #[serde(default)]
    pub syscalls: Vec<String>,
}

/// Loads a JSON array of [`RecordedContainer`].
///
/// # Errors
///
/// Returns [`TracewardError::Io`] if the file cannot be read and
/// [`TracewardError::Serialization`] if it is not valid JSON.
pub fn load_containers(path: &Path) -> Result<Vec<RecordedContainer>> {
    let content = fs::read_to_string(path).map_err(|source| TracewardError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_json::from_str(&content)?)
}

/// Reads one JSON record per line. Blank lines are skipped.
///
/// # Errors
///
/// Returns [`TracewardError::Io`] if the file cannot be read and
/// [`TracewardError::Config`] naming the first malformed line.
pub fn read_jsonl<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let content = fs::read_to_string(path).map_err(|source| TracewardError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            serde_json::from_str(line).map_err(|e| TracewardError::Config {
                message: format!("{}:{}: {e}", path.display(), index + 1),
            })
        })
        .collect()
}

/// Raw records that name the container they came from.
pub trait Located {
    /// Returns the container the record belongs to.
    fn location(&self) -> ContainerKey;
}

impl Located for RawExecEvent {
    fn location(&self) -> ContainerKey {
        ContainerKey::new(&self.namespace, &self.pod, &self.container)
    }
}

impl Located for RawTcpEvent {
    fn location(&self) -> ContainerKey {
        ContainerKey::new(&self.namespace, &self.pod, &self.container)
    }
}

/// Streams recorded raw records to the attached callback.
///
/// With a label selector only records of known containers whose labels
/// match are delivered; with the match-all selector every record is.
pub struct ReplayStream<T> {
    name: &'static str,
    records: Arc<Vec<T>>,
    containers: Vec<ContainerMetadata>,
    worker: Option<JoinHandle<usize>>,
}

impl<T: Located + Send + Sync + 'static> ReplayStream<T> {
    /// Creates a stream over `records` for the given known containers.
    #[must_use]
    pub fn new(name: &'static str, records: Vec<T>, containers: Vec<ContainerMetadata>) -> Self {
        Self {
            name,
            records: Arc::new(records),
            containers,
            worker: None,
        }
    }

    fn spawn(&mut self, selector: &ContainerSelector, on_event: EventCallback<T>) -> Result<()> {
        if self.worker.is_some() {
            return Err(TracewardError::InvalidState {
                operation: "attach replay stream",
                state: "attached".into(),
            });
        }
        let match_all = selector.is_all();
        let selected: HashSet<ContainerKey> = self
            .containers
            .iter()
            .filter(|c| selector.matches(&c.labels))
            .map(ContainerMetadata::key)
            .collect();
        let records = Arc::clone(&self.records);

        let worker = std::thread::Builder::new()
            .name(format!("replay-{}", self.name))
            .spawn(move || {
                let mut delivered = 0;
                for record in records.iter() {
                    if match_all || selected.contains(&record.location()) {
                        on_event(record);
                        delivered += 1;
                    }
                }
                delivered
            })
            .map_err(|e| TracewardError::SourceUnavailable {
                component: self.name.to_string(),
                reason: e.to_string(),
            })?;
        self.worker = Some(worker);
        Ok(())
    }

    fn join(&mut self) -> Result<()> {
        let Some(worker) = self.worker.take() else {
            return Ok(());
        };
        match worker.join() {
            Ok(delivered) => {
                tracing::debug!(source = self.name, delivered, "replay finished");
                Ok(())
            }
            Err(_) => Err(TracewardError::SourceUnavailable {
                component: self.name.to_string(),
                reason: "replay worker panicked".into(),
            }),
        }
    }
}

impl ExecBackend for ReplayStream<RawExecEvent> {
    fn attach(
        &mut self,
        selector: &ContainerSelector,
        on_event: EventCallback<RawExecEvent>,
    ) -> Result<()> {
        self.spawn(selector, on_event)
    }

    fn detach(&mut self) -> Result<()> {
        self.join()
    }
}

impl TcpBackend for ReplayStream<RawTcpEvent> {
    fn attach(
        &mut self,
        selector: &ContainerSelector,
        on_event: EventCallback<RawTcpEvent>,
    ) -> Result<()> {
        self.spawn(selector, on_event)
    }

    fn detach(&mut self) -> Result<()> {
        self.join()
    }
}

/// Serves recorded syscall lists keyed by mount namespace.
#[derive(Debug, Default)]
pub struct ReplaySyscalls {
    recorded: HashMap<u64, Vec<String>>,
    attached: bool,
}

impl ReplaySyscalls {
    /// Collects the syscall lists of `containers`. Containers sharing a
    /// mount namespace have their lists merged.
    #[must_use]
    pub fn new(containers: &[RecordedContainer]) -> Self {
        let mut merged: HashMap<u64, BTreeSet<String>> = HashMap::new();
        for container in containers {
            merged
                .entry(container.metadata.mount_ns_id)
                .or_default()
                .extend(container.syscalls.iter().cloned());
        }
        Self {
            recorded: merged
                .into_iter()
                .map(|(ns, set)| (ns, set.into_iter().collect()))
                .collect(),
            attached: false,
        }
    }
}

impl SyscallBackend for ReplaySyscalls {
    fn attach(&mut self) -> Result<()> {
        self.attached = true;
        Ok(())
    }

    fn detach(&mut self) -> Result<()> {
        self.attached = false;
        Ok(())
    }

    fn peek(&self, mount_ns_id: u64) -> Result<Vec<String>> {
        if !self.attached {
            return Err(TracewardError::NotRunning {
                operation: "peek recorded syscalls",
            });
        }
        Ok(self.recorded.get(&mount_ns_id).cloned().unwrap_or_default())
    }
}
