//! Asynchronous ingestion pipeline in front of the [`EventStore`].
//!
//! Producers hand events to [`EventSink::submit_exec`] and
//! [`EventSink::submit_tcp`] from any thread. Both calls only try to push
//! onto a bounded queue and return immediately; a full queue rejects the
//! event with [`TracewardError::QueueFull`] and counts it as dropped.
//!
//! One consumer task drains the queue into the store, so every write
//! happens in submission order. Submitting while the sink is not running
//! returns [`TracewardError::PipelineStopped`] and queues nothing.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use traceward_common::config::SinkConfig;
use traceward_common::error::{Result, TracewardError};
use traceward_common::types::{ContainerKey, ExecEvent, TcpEvent};

use crate::store::EventStore;

/// Unit of work travelling through the queue.
#[derive(Debug)]
enum SinkCommand {
    Exec(ExecEvent),
    Tcp(TcpEvent),
}

#[derive(Debug, Default)]
struct Counters {
    processed: AtomicU64,
    dropped: AtomicU64,
    failed: AtomicU64,
}

/// Non-blocking event sink backed by an [`EventStore`].
#[derive(Debug)]
pub struct EventSink {
    store: Arc<EventStore>,
    queue_capacity: usize,
    tx: RwLock<Option<mpsc::Sender<SinkCommand>>>,
    consumer: Mutex<Option<JoinHandle<()>>>,
    counters: Arc<Counters>,
}

impl EventSink {
    /// Creates a stopped sink with its own store.
    ///
    /// # Errors
    ///
    /// Returns [`TracewardError::Config`] if `config` is invalid.
    pub fn new(config: &SinkConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::with_store(
            Arc::new(EventStore::with_retention(
                config.max_events_per_bucket.and_then(NonZeroUsize::new),
            )),
            config.queue_capacity,
        ))
    }

    /// Creates a stopped sink writing into an existing store.
    ///
    /// A zero `queue_capacity` is raised to one.
    #[must_use]
    pub fn with_store(store: Arc<EventStore>, queue_capacity: usize) -> Self {
        Self {
            store,
            queue_capacity: queue_capacity.max(1),
            tx: RwLock::new(None),
            consumer: Mutex::new(None),
            counters: Arc::new(Counters::default()),
        }
    }

    /// Spawns the consumer task on the current tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`TracewardError::InvalidState`] if the sink is already
    /// running, or [`TracewardError::Config`] when called outside a tokio
    /// runtime.
    pub fn start(&self) -> Result<()> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|e| TracewardError::Config {
            message: format!("event sink must start inside a tokio runtime: {e}"),
        })?;

        let mut tx = self.tx.write();
        if tx.is_some() {
            return Err(TracewardError::InvalidState {
                operation: "start event sink",
                state: "running".into(),
            });
        }

        let (sender, receiver) = mpsc::channel(self.queue_capacity);
        let task = runtime.spawn(consume(
            receiver,
            Arc::clone(&self.store),
            Arc::clone(&self.counters),
        ));
        *tx = Some(sender);
        *self.consumer.lock() = Some(task);
        tracing::info!(capacity = self.queue_capacity, "event sink started");
        Ok(())
    }

    /// Stops accepting events, waits until every queued event has been
    /// written, then returns.
    ///
    /// Stopping a sink that is not running does nothing.
    pub async fn stop(&self) {
        let sender = self.tx.write().take();
        let task = self.consumer.lock().take();
        drop(sender);

        let Some(task) = task else {
            tracing::debug!("event sink already stopped");
            return;
        };
        if let Err(e) = task.await {
            tracing::error!(error = %e, "event sink consumer terminated abnormally");
        }
        tracing::info!(
            processed = self.processed(),
            dropped = self.dropped(),
            failed = self.failed(),
            "event sink stopped"
        );
    }

    /// Returns `true` while the sink accepts events.
    pub fn is_running(&self) -> bool {
        self.tx.read().is_some()
    }

    /// Queues an exec event without blocking.
    ///
    /// # Errors
    ///
    /// Returns [`TracewardError::PipelineStopped`] if the sink is not
    /// running and [`TracewardError::QueueFull`] if the queue is full.
    pub fn submit_exec(&self, event: ExecEvent) -> Result<()> {
        self.submit(SinkCommand::Exec(event))
    }

    /// Queues a TCP event without blocking.
    ///
    /// # Errors
    ///
    /// Returns [`TracewardError::PipelineStopped`] if the sink is not
    /// running and [`TracewardError::QueueFull`] if the queue is full.
    pub fn submit_tcp(&self, event: TcpEvent) -> Result<()> {
        self.submit(SinkCommand::Tcp(event))
    }

    fn submit(&self, command: SinkCommand) -> Result<()> {
        let tx = self.tx.read();
        let Some(sender) = tx.as_ref() else {
            return Err(TracewardError::PipelineStopped);
        };
        sender.try_send(command).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                let dropped = self.counters.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                tracing::warn!(dropped, "ingestion queue full, event dropped");
                TracewardError::QueueFull
            }
            mpsc::error::TrySendError::Closed(_) => TracewardError::PipelineStopped,
        })
    }

    /// Returns the exec events recorded for a container.
    pub fn exec_events(&self, namespace: &str, pod: &str, container: &str) -> Vec<ExecEvent> {
        self.store
            .exec_events(&ContainerKey::new(namespace, pod, container))
    }

    /// Returns the TCP events recorded for a container.
    pub fn tcp_events(&self, namespace: &str, pod: &str, container: &str) -> Vec<TcpEvent> {
        self.store
            .tcp_events(&ContainerKey::new(namespace, pod, container))
    }

    /// Drops every event recorded for a container.
    ///
    /// Returns `true` if the container had a bucket.
    pub fn cleanup_container(&self, namespace: &str, pod: &str, container: &str) -> bool {
        self.store
            .cleanup(&ContainerKey::new(namespace, pod, container))
    }

    /// Returns the store the sink writes into.
    #[must_use]
    pub const fn store(&self) -> &Arc<EventStore> {
        &self.store
    }

    /// Returns the number of events written to the store.
    pub fn processed(&self) -> u64 {
        self.counters.processed.load(Ordering::Relaxed)
    }

    /// Returns the number of events rejected because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.counters.dropped.load(Ordering::Relaxed)
    }

    /// Returns the number of events the store refused.
    pub fn failed(&self) -> u64 {
        self.counters.failed.load(Ordering::Relaxed)
    }
}

/// Drains the queue into the store until every sender is gone.
async fn consume(
    mut rx: mpsc::Receiver<SinkCommand>,
    store: Arc<EventStore>,
    counters: Arc<Counters>,
) {
    tracing::debug!("event sink consumer started");

    while let Some(command) = rx.recv().await {
        let result = match command {
            SinkCommand::Exec(event) => store.put_exec(&event.key(), event),
            SinkCommand::Tcp(event) => store.put_tcp(&event.key(), event),
        };
        match result {
            Ok(()) => {
                let _ = counters.processed.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                let _ = counters.failed.fetch_add(1, Ordering::Relaxed);
                tracing::error!(error = %e, "failed to store event");
            }
        }
    }

    tracing::debug!("event sink consumer stopped");
}

#[cfg(test)]
mod tests {
    use traceward_common::types::TcpOperation;

    use super::*;

    fn exec_event(pod: &str, ts: i64) -> ExecEvent {
        ExecEvent {
            container_id: "test".into(),
            pod_name: pod.into(),
            namespace: "test".into(),
            path_name: "test".into(),
            args: vec!["test".into()],
            env: vec!["test".into()],
            timestamp_ns: ts,
        }
    }

    fn tcp_event(port: u16) -> TcpEvent {
        TcpEvent {
            container_id: "test".into(),
            pod_name: "test".into(),
            namespace: "test".into(),
            source: String::new(),
            source_port: 0,
            destination: "10.0.0.1".into(),
            dest_port: port,
            operation: TcpOperation::Accept,
            timestamp_ns: 0,
        }
    }

    fn sink(capacity: usize) -> EventSink {
        EventSink::new(&SinkConfig {
            queue_capacity: capacity,
            max_events_per_bucket: None,
        })
        .expect("valid config")
    }

    #[tokio::test]
    async fn submit_get_cleanup_roundtrip() {
        let sink = sink(64);
        sink.start().expect("start");

        sink.submit_exec(exec_event("test", 0)).expect("submit exec");
        sink.submit_tcp(tcp_event(0)).expect("submit tcp");
        sink.stop().await;

        let events = sink.exec_events("test", "test", "test");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].container_id, "test");
        assert_eq!(events[0].pod_name, "test");
        assert_eq!(events[0].namespace, "test");
        assert_eq!(events[0].path_name, "test");
        assert_eq!(events[0].args, vec!["test"]);
        assert_eq!(events[0].env, vec!["test"]);
        assert_eq!(events[0].timestamp_ns, 0);
        assert_eq!(sink.tcp_events("test", "test", "test").len(), 1);

        assert!(sink.cleanup_container("test", "test", "test"));
        assert!(sink.exec_events("test", "test", "test").is_empty());
        assert!(sink.tcp_events("test", "test", "test").is_empty());
    }

    #[tokio::test]
    async fn submit_before_start_is_rejected() {
        let sink = sink(8);
        assert!(matches!(
            sink.submit_exec(exec_event("test", 0)),
            Err(TracewardError::PipelineStopped)
        ));
        assert!(sink.store().is_empty());
    }

    #[tokio::test]
    async fn submit_after_stop_is_rejected() {
        let sink = sink(8);
        sink.start().expect("start");
        sink.stop().await;
        assert!(!sink.is_running());
        assert!(matches!(
            sink.submit_tcp(tcp_event(1)),
            Err(TracewardError::PipelineStopped)
        ));
    }

    #[tokio::test]
    async fn double_start_is_rejected() {
        let sink = sink(8);
        sink.start().expect("start");
        assert!(matches!(
            sink.start(),
            Err(TracewardError::InvalidState { .. })
        ));
        sink.stop().await;
    }

    #[test]
    fn start_outside_runtime_fails() {
        let sink = sink(8);
        assert!(matches!(sink.start(), Err(TracewardError::Config { .. })));
    }

    #[tokio::test]
    async fn stop_drains_every_queued_event() {
        let sink = sink(2_000);
        sink.start().expect("start");
        for ts in 0..1_000 {
            sink.submit_exec(exec_event("test", ts)).expect("submit");
        }
        sink.stop().await;

        let stamps: Vec<_> = sink
            .exec_events("test", "test", "test")
            .iter()
            .map(|e| e.timestamp_ns)
            .collect();
        assert_eq!(stamps, (0..1_000).collect::<Vec<_>>());
        assert_eq!(sink.processed(), 1_000);
    }

    #[tokio::test]
    async fn full_queue_drops_and_counts() {
        // The consumer cannot run until this task yields, so the queue
        // fills deterministically on the current-thread runtime.
        let sink = sink(2);
        sink.start().expect("start");
        sink.submit_exec(exec_event("test", 1)).expect("first");
        sink.submit_exec(exec_event("test", 2)).expect("second");
        assert!(matches!(
            sink.submit_exec(exec_event("test", 3)),
            Err(TracewardError::QueueFull)
        ));
        sink.stop().await;

        assert_eq!(sink.dropped(), 1);
        assert_eq!(sink.exec_events("test", "test", "test").len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_producers_keep_per_key_order() {
        let sink = Arc::new(sink(100_000));
        sink.start().expect("start");

        std::thread::scope(|scope| {
            for producer in 0..4 {
                let sink = Arc::clone(&sink);
                let _ = scope.spawn(move || {
                    let pod = format!("pod-{producer}");
                    for ts in 0..1_000 {
                        sink.submit_exec(exec_event(&pod, ts)).expect("submit");
                    }
                });
            }
        });
        sink.stop().await;

        for producer in 0..4 {
            let pod = format!("pod-{producer}");
            let stamps: Vec<_> = sink
                .exec_events("test", &pod, "test")
                .iter()
                .map(|e| e.timestamp_ns)
                .collect();
            assert_eq!(stamps, (0..1_000).collect::<Vec<_>>());
        }
        assert_eq!(sink.dropped(), 0);
    }
}
