//! `twd replay` — drive the recorder from recorded event files.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Args;
use serde::Serialize;
use traceward_common::config::{SinkConfig, TracerConfig, TracewardConfig};
use traceward_common::constants::DEFAULT_QUEUE_CAPACITY;
use traceward_common::error::Result as TracewardResult;
use traceward_common::types::{ContainerKey, ExecEvent, TcpEvent};
use traceward_ebpf::exec::RawExecEvent;
use traceward_ebpf::programs::exec::EXEC_PROGRAM_NAME;
use traceward_ebpf::programs::network::TCP_PROGRAM_NAME;
use traceward_ebpf::tcp::RawTcpEvent;
use traceward_eventsink::EventSink;
use traceward_tracer::discovery::{ContainerMetadata, StaticDiscovery};
use traceward_tracer::listener::LoggingListener;
use traceward_tracer::source::EventSender;
use traceward_tracer::{Tracer, TracerBuilder};

use crate::output::{format_command, format_endpoint, format_timestamp};
use crate::replay::{RecordedContainer, ReplayStream, ReplaySyscalls, load_containers, read_jsonl};

/// Arguments for the replay command.
#[derive(Args, Debug)]
pub struct ReplayArgs {
    /// JSON array of containers with their labels and recorded syscalls.
    #[arg(long)]
    pub containers: Option<PathBuf>,

    /// Raw exec records, one JSON object per line.
    #[arg(long)]
    pub exec: Option<PathBuf>,

    /// Raw TCP records, one JSON object per line.
    #[arg(long)]
    pub tcp: Option<PathBuf>,

    /// Node whose containers are traced.
    #[arg(long, env = "NODE_NAME", default_value = "")]
    pub node_name: String,

    /// Trace only containers carrying the enable label.
    #[arg(long)]
    pub filter_by_label: bool,

    /// Events the ingestion queue holds before rejecting new ones.
    #[arg(long, default_value_t = DEFAULT_QUEUE_CAPACITY)]
    pub queue_capacity: usize,

    /// Keep at most this many events per container and kind.
    #[arg(long)]
    pub max_events_per_bucket: Option<usize>,

    /// Print the report as JSON.
    #[arg(long)]
    pub json: bool,
}

impl ReplayArgs {
    fn config(&self) -> TracewardConfig {
        TracewardConfig {
            sink: SinkConfig {
                queue_capacity: self.queue_capacity,
                max_events_per_bucket: self.max_events_per_bucket,
            },
            tracer: TracerConfig {
                node_name: self.node_name.clone(),
                filter_by_label: self.filter_by_label,
                kubeconfig: None,
            },
        }
    }
}

/// What the recorder holds for one container after a replay.
#[derive(Debug, Serialize)]
pub struct ContainerReport {
    /// Container the events belong to.
    pub container: ContainerKey,
    /// Stored process executions, oldest first.
    pub exec: Vec<ExecEvent>,
    /// Stored TCP events, oldest first.
    pub tcp: Vec<TcpEvent>,
    /// Syscalls peeked while the tracer was running.
    pub syscalls: Vec<String>,
}

/// Outcome of one replay.
#[derive(Debug, Serialize)]
pub struct ReplayReport {
    /// One entry per container key, sorted.
    pub containers: Vec<ContainerReport>,
    /// Events written to the store.
    pub processed: u64,
    /// Events rejected by a full queue.
    pub dropped: u64,
    /// Events the store refused.
    pub failed: u64,
    /// Events evicted by the retention bound.
    pub evicted: u64,
}

/// Executes the replay command.
///
/// # Errors
///
/// Returns an error if an input cannot be loaded, the configuration is
/// invalid, or the tracer fails to start or stop.
pub async fn execute(args: ReplayArgs) -> anyhow::Result<()> {
    let report = run(&args).await?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

async fn run(args: &ReplayArgs) -> anyhow::Result<ReplayReport> {
    let config = args.config();
    config.validate()?;

    let containers = match &args.containers {
        Some(path) => load_containers(path)?,
        None => Vec::new(),
    };
    let metadata: Vec<ContainerMetadata> = containers.iter().map(|c| c.metadata.clone()).collect();
    let exec: Vec<RawExecEvent> = match &args.exec {
        Some(path) => read_jsonl(path)?,
        None => Vec::new(),
    };
    let tcp: Vec<RawTcpEvent> = match &args.tcp {
        Some(path) => read_jsonl(path)?,
        None => Vec::new(),
    };
    tracing::info!(
        containers = containers.len(),
        exec = exec.len(),
        tcp = tcp.len(),
        "replaying recorded events"
    );

    let sink = Arc::new(EventSink::new(&config.sink)?);
    sink.start()?;

    let mut tracer = TracerBuilder::new(config.tracer)
        .discovery(StaticDiscovery::new(metadata.clone()))
        .exec_backend(ReplayStream::new(EXEC_PROGRAM_NAME, exec, metadata.clone()))
        .tcp_backend(ReplayStream::new(TCP_PROGRAM_NAME, tcp, metadata))
        .syscall_backend(ReplaySyscalls::new(&containers))
        .sender(Arc::clone(&sink) as Arc<dyn EventSender>)
        .build()?;
    tracer.add_listener(Arc::new(LoggingListener));

    if let Err(e) = tracer.start() {
        sink.stop().await;
        return Err(e).context("failed to start tracer");
    }
    let peeked = peek_all(&tracer, &containers);
    let stopped = tracer.stop();
    sink.stop().await;
    stopped.context("tracer did not stop cleanly")?;
    let syscalls = peeked.context("failed to peek syscalls")?;

    let store = sink.store();
    let keys: BTreeSet<ContainerKey> = store
        .keys()
        .into_iter()
        .chain(syscalls.keys().cloned())
        .collect();
    let containers = keys
        .into_iter()
        .map(|key| ContainerReport {
            exec: store.exec_events(&key),
            tcp: store.tcp_events(&key),
            syscalls: syscalls.get(&key).cloned().unwrap_or_default(),
            container: key,
        })
        .collect();

    Ok(ReplayReport {
        containers,
        processed: sink.processed(),
        dropped: sink.dropped(),
        failed: sink.failed(),
        evicted: store.evicted(),
    })
}

fn peek_all(
    tracer: &Tracer,
    containers: &[RecordedContainer],
) -> TracewardResult<BTreeMap<ContainerKey, Vec<String>>> {
    containers
        .iter()
        .map(|c| {
            tracer
                .peek_syscalls(c.metadata.mount_ns_id)
                .map(|syscalls| (c.metadata.key(), syscalls))
        })
        .collect()
}

fn print_report(report: &ReplayReport) {
    if report.containers.is_empty() {
        println!("No events recorded.");
    }
    for container in &report.containers {
        println!("{}", container.container);
        if !container.syscalls.is_empty() {
            println!("  syscalls: {}", container.syscalls.join(", "));
        }
        if container.exec.is_empty() && container.tcp.is_empty() {
            continue;
        }
        println!("  {:<26} {:<8} DETAIL", "TIME", "KIND");
        for event in &container.exec {
            println!(
                "  {:<26} {:<8} {}",
                format_timestamp(event.timestamp_ns),
                "exec",
                format_command(&event.path_name, &event.args)
            );
        }
        for event in &container.tcp {
            println!(
                "  {:<26} {:<8} {}",
                format_timestamp(event.timestamp_ns),
                event.operation.as_str(),
                format_endpoint(&event.destination, event.dest_port)
            );
        }
    }
    println!(
        "processed: {}  dropped: {}  failed: {}  evicted: {}",
        report.processed, report.dropped, report.failed, report.evicted
    );
}
