//! Lifecycle integration tests for the tracer.
//!
//! These tests drive a [`Tracer`] over scripted backends and verify:
//! 1. Start order and rollback on partial failure
//! 2. Best-effort teardown
//! 3. State guards for start/stop/peek
//! 4. Container activity fan-out
//! 5. Raw records flowing through normalization into the event sink

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::Mutex;
use traceward_common::config::{SinkConfig, TracerConfig};
use traceward_common::constants::ENABLE_LABEL_KEY;
use traceward_common::error::{Result, TracewardError};
use traceward_common::types::{ContainerActivity, ContainerActivityEvent, TcpOperation};
use traceward_ebpf::EventCallback;
use traceward_ebpf::exec::{ExecBackend, RawExecEvent};
use traceward_ebpf::selector::ContainerSelector;
use traceward_ebpf::syscall::SyscallBackend;
use traceward_ebpf::tcp::{RawTcpEvent, TcpBackend};
use traceward_eventsink::EventSink;
use traceward_tracer::discovery::{
    ContainerDiscovery, ContainerMetadata, ContainerNotification, StaticDiscovery,
};
use traceward_tracer::listener::ContainerActivityListener;
use traceward_tracer::source::EventSender;
use traceward_tracer::{Tracer, TracerBuilder, TracerState};

// ── Scripted collaborators ───────────────────────────────────────────

type Journal = Arc<Mutex<Vec<String>>>;

#[derive(Debug, Clone, Copy, Default)]
struct Script {
    fail_attach: bool,
    fail_detach: bool,
    /// Attaches that fail before the backend starts succeeding.
    flaky_attaches: u32,
}

fn step(journal: &Journal, entry: &str, fail: bool) -> Result<()> {
    journal.lock().push(entry.to_string());
    if fail {
        return Err(TracewardError::Config {
            message: format!("{entry} rejected"),
        });
    }
    Ok(())
}

struct FakeExec {
    journal: Journal,
    script: Script,
    records: Vec<RawExecEvent>,
    selector: Arc<Mutex<Option<ContainerSelector>>>,
}

impl ExecBackend for FakeExec {
    fn attach(
        &mut self,
        selector: &ContainerSelector,
        on_event: EventCallback<RawExecEvent>,
    ) -> Result<()> {
        step(&self.journal, "exec attach", self.script.fail_attach)?;
        *self.selector.lock() = Some(selector.clone());
        for record in &self.records {
            on_event(record);
        }
        Ok(())
    }

    fn detach(&mut self) -> Result<()> {
        step(&self.journal, "exec detach", self.script.fail_detach)
    }
}

struct FakeTcp {
    journal: Journal,
    script: Script,
    records: Vec<RawTcpEvent>,
}

impl TcpBackend for FakeTcp {
    fn attach(
        &mut self,
        _selector: &ContainerSelector,
        on_event: EventCallback<RawTcpEvent>,
    ) -> Result<()> {
        step(&self.journal, "tcp attach", self.script.fail_attach)?;
        for record in &self.records {
            on_event(record);
        }
        Ok(())
    }

    fn detach(&mut self) -> Result<()> {
        step(&self.journal, "tcp detach", self.script.fail_detach)
    }
}

struct FakeSyscall {
    journal: Journal,
    script: Script,
    syscalls: HashMap<u64, Vec<String>>,
}

impl SyscallBackend for FakeSyscall {
    fn attach(&mut self) -> Result<()> {
        let flaky = self.script.flaky_attaches > 0;
        self.script.flaky_attaches = self.script.flaky_attaches.saturating_sub(1);
        step(&self.journal, "syscall attach", self.script.fail_attach || flaky)
    }

    fn detach(&mut self) -> Result<()> {
        step(&self.journal, "syscall detach", self.script.fail_detach)
    }

    fn peek(&self, mount_ns_id: u64) -> Result<Vec<String>> {
        Ok(self.syscalls.get(&mount_ns_id).cloned().unwrap_or_default())
    }
}

struct FakeDiscovery {
    journal: Journal,
    script: Script,
    inner: StaticDiscovery,
}

impl ContainerDiscovery for FakeDiscovery {
    fn subscribe(
        &mut self,
        config: &TracerConfig,
        notify: EventCallback<ContainerNotification>,
    ) -> Result<()> {
        step(&self.journal, "discovery subscribe", self.script.fail_attach)?;
        self.inner.subscribe(config, notify)
    }

    fn close(&mut self) -> Result<()> {
        let result = step(&self.journal, "discovery close", self.script.fail_detach);
        self.inner.close()?;
        result
    }
}

#[derive(Default)]
struct Rig {
    discovery: Script,
    exec: Script,
    tcp: Script,
    syscall: Script,
    containers: Vec<ContainerMetadata>,
    exec_records: Vec<RawExecEvent>,
    tcp_records: Vec<RawTcpEvent>,
    filter_by_label: bool,
}

struct Built {
    tracer: Tracer,
    journal: Journal,
    exec_selector: Arc<Mutex<Option<ContainerSelector>>>,
}

struct NullSender;

impl EventSender for NullSender {
    fn send_exec(&self, _event: traceward_common::types::ExecEvent) {}
    fn send_tcp(&self, _event: traceward_common::types::TcpEvent) {}
}

impl Rig {
    fn build(self, sender: Arc<dyn EventSender>) -> Built {
        let journal: Journal = Arc::default();
        let exec_selector = Arc::new(Mutex::new(None));
        let mut syscalls = HashMap::new();
        for container in &self.containers {
            let _ = syscalls.insert(
                container.mount_ns_id,
                vec!["execve".to_string(), "openat".to_string()],
            );
        }

        let tracer = TracerBuilder::new(TracerConfig {
            node_name: "node-1".into(),
            filter_by_label: self.filter_by_label,
            kubeconfig: None,
        })
        .discovery(FakeDiscovery {
            journal: Arc::clone(&journal),
            script: self.discovery,
            inner: StaticDiscovery::new(self.containers),
        })
        .exec_backend(FakeExec {
            journal: Arc::clone(&journal),
            script: self.exec,
            records: self.exec_records,
            selector: Arc::clone(&exec_selector),
        })
        .tcp_backend(FakeTcp {
            journal: Arc::clone(&journal),
            script: self.tcp,
            records: self.tcp_records,
        })
        .syscall_backend(FakeSyscall {
            journal: Arc::clone(&journal),
            script: self.syscall,
            syscalls,
        })
        .sender(sender)
        .build()
        .expect("all collaborators supplied");

        Built {
            tracer,
            journal,
            exec_selector,
        }
    }

    fn build_silent(self) -> Built {
        self.build(Arc::new(NullSender))
    }
}

fn container(name: &str, mount_ns_id: u64) -> ContainerMetadata {
    ContainerMetadata {
        namespace: "default".into(),
        pod_name: "web-0".into(),
        container_name: name.into(),
        container_id: format!("containerd://{name}"),
        mount_ns_id,
        labels: BTreeMap::new(),
    }
}

fn failing() -> Script {
    Script {
        fail_attach: true,
        fail_detach: true,
        flaky_attaches: 0,
    }
}

// ── Start / rollback ─────────────────────────────────────────────────

#[test]
fn start_attaches_in_fixed_order() {
    let mut built = Rig::default().build_silent();
    built.tracer.start().expect("start");

    assert_eq!(built.tracer.state(), TracerState::Running);
    assert_eq!(
        *built.journal.lock(),
        vec![
            "discovery subscribe",
            "exec attach",
            "tcp attach",
            "syscall attach"
        ]
    );
}

#[test]
fn second_source_failure_rolls_back_first() {
    let mut built = Rig {
        tcp: failing(),
        ..Rig::default()
    }
    .build_silent();

    let err = built.tracer.start().expect_err("tcp fails");
    match err {
        TracewardError::SourceUnavailable { component, .. } => assert_eq!(component, "trace_tcp"),
        other => unreachable!("unexpected error: {other}"),
    }
    assert_eq!(built.tracer.state(), TracerState::Stopped);
    assert_eq!(
        *built.journal.lock(),
        vec![
            "discovery subscribe",
            "exec attach",
            "tcp attach",
            "exec detach",
            "discovery close"
        ]
    );
}

#[test]
fn last_source_failure_rolls_back_in_reverse_order() {
    let mut built = Rig {
        syscall: failing(),
        ..Rig::default()
    }
    .build_silent();

    assert!(built.tracer.start().is_err());
    let journal = built.journal.lock();
    assert_eq!(
        journal[journal.len() - 3..],
        ["tcp detach", "exec detach", "discovery close"]
    );
}

#[test]
fn discovery_failure_attaches_nothing() {
    let mut built = Rig {
        discovery: failing(),
        ..Rig::default()
    }
    .build_silent();

    let err = built.tracer.start().expect_err("discovery fails");
    assert!(matches!(
        err,
        TracewardError::SourceUnavailable { ref component, .. } if component == "container_discovery"
    ));
    assert_eq!(*built.journal.lock(), vec!["discovery subscribe"]);
    assert_eq!(built.tracer.state(), TracerState::Stopped);
}

#[test]
fn tracer_can_start_again_after_rollback() {
    let mut built = Rig {
        syscall: Script {
            flaky_attaches: 1,
            ..Script::default()
        },
        ..Rig::default()
    }
    .build_silent();

    assert!(built.tracer.start().is_err());
    assert_eq!(built.tracer.state(), TracerState::Stopped);
    built.journal.lock().clear();

    built.tracer.start().expect("second start");
    assert_eq!(built.tracer.state(), TracerState::Running);
    assert_eq!(
        *built.journal.lock(),
        vec![
            "discovery subscribe",
            "exec attach",
            "tcp attach",
            "syscall attach"
        ]
    );
    built.tracer.stop().expect("stop");
}

#[test]
fn persistent_failure_keeps_tracer_stopped() {
    let mut built = Rig {
        syscall: Script {
            fail_attach: true,
            ..Script::default()
        },
        ..Rig::default()
    }
    .build_silent();

    assert!(built.tracer.start().is_err());
    assert!(built.tracer.start().is_err());
    assert_eq!(built.tracer.state(), TracerState::Stopped);
}

#[test]
fn start_twice_is_rejected() {
    let mut built = Rig::default().build_silent();
    built.tracer.start().expect("start");
    assert!(matches!(
        built.tracer.start(),
        Err(TracewardError::InvalidState { .. })
    ));
    assert_eq!(built.tracer.state(), TracerState::Running);
}

// ── Stop ─────────────────────────────────────────────────────────────

#[test]
fn stop_releases_discovery_then_sources() {
    let mut built = Rig::default().build_silent();
    built.tracer.start().expect("start");
    built.journal.lock().clear();

    built.tracer.stop().expect("stop");
    assert_eq!(built.tracer.state(), TracerState::Stopped);
    assert_eq!(
        *built.journal.lock(),
        vec![
            "discovery close",
            "exec detach",
            "tcp detach",
            "syscall detach"
        ]
    );
}

#[test]
fn stop_collects_every_failure() {
    let detach_fails = Script {
        fail_detach: true,
        ..Script::default()
    };
    let mut built = Rig {
        exec: detach_fails,
        syscall: detach_fails,
        ..Rig::default()
    }
    .build_silent();
    built.tracer.start().expect("start");

    let err = built.tracer.stop().expect_err("two sources fail to stop");
    match err {
        TracewardError::Teardown { failures } => {
            assert_eq!(failures.len(), 2);
            assert!(failures[0].starts_with("trace_exec"));
            assert!(failures[1].starts_with("trace_syscalls"));
        }
        other => unreachable!("unexpected error: {other}"),
    }
    assert_eq!(built.tracer.state(), TracerState::Stopped);
    assert!(built.journal.lock().contains(&"tcp detach".to_string()));
}

#[test]
fn stop_when_stopped_is_rejected() {
    let mut built = Rig::default().build_silent();
    assert!(matches!(
        built.tracer.stop(),
        Err(TracewardError::InvalidState { .. })
    ));
    assert!(built.journal.lock().is_empty());
}

// ── Peek ─────────────────────────────────────────────────────────────

#[test]
fn peek_requires_running_tracer() {
    let mut built = Rig {
        containers: vec![container("nginx", 4_026_532_100)],
        ..Rig::default()
    }
    .build_silent();

    assert!(matches!(
        built.tracer.peek_syscalls(4_026_532_100),
        Err(TracewardError::NotRunning { .. })
    ));

    built.tracer.start().expect("start");
    assert_eq!(
        built.tracer.peek_syscalls(4_026_532_100).expect("peek"),
        vec!["execve", "openat"]
    );
    assert!(built.tracer.peek_syscalls(1).expect("peek").is_empty());

    built.tracer.stop().expect("stop");
    assert!(built.tracer.peek_syscalls(4_026_532_100).is_err());
}

// ── Selector ─────────────────────────────────────────────────────────

#[test]
fn label_filter_narrows_selector() {
    let mut built = Rig {
        filter_by_label: true,
        ..Rig::default()
    }
    .build_silent();
    built.tracer.start().expect("start");

    let selector = built.exec_selector.lock().clone().expect("attached");
    assert!(!selector.is_all());
    assert_eq!(
        selector.labels().get(ENABLE_LABEL_KEY).map(String::as_str),
        Some("true")
    );
}

#[test]
fn no_label_filter_selects_everything() {
    let mut built = Rig::default().build_silent();
    built.tracer.start().expect("start");
    assert!(built.tracer.selector().is_all());
}

// ── Listener fan-out ─────────────────────────────────────────────────

fn recorder(
    log: &Arc<Mutex<Vec<(String, ContainerActivityEvent)>>>,
    name: &str,
) -> Arc<dyn ContainerActivityListener> {
    let log = Arc::clone(log);
    let name = name.to_string();
    Arc::new(move |event: &ContainerActivityEvent| {
        log.lock().push((name.clone(), event.clone()));
    })
}

#[test]
fn container_start_reaches_listeners_in_order() {
    let mut built = Rig {
        containers: vec![container("nginx", 4_026_532_100)],
        ..Rig::default()
    }
    .build_silent();
    let log = Arc::new(Mutex::new(Vec::new()));
    built.tracer.add_listener(recorder(&log, "first"));
    built.tracer.add_listener(recorder(&log, "second"));

    built.tracer.start().expect("start");

    let log = log.lock();
    assert_eq!(log.len(), 2);
    assert_eq!(log[0].0, "first");
    assert_eq!(log[1].0, "second");
    for (_, event) in log.iter() {
        assert_eq!(event.activity, ContainerActivity::Start);
        assert_eq!(event.namespace, "default");
        assert_eq!(event.pod_name, "web-0");
        assert_eq!(event.container_name, "nginx");
        assert_eq!(event.container_id, "containerd://nginx");
        assert_eq!(event.mount_ns_id, 4_026_532_100);
    }
}

#[test]
fn removed_listener_misses_container_stop() {
    let mut built = Rig {
        containers: vec![container("nginx", 7)],
        ..Rig::default()
    }
    .build_silent();
    let log = Arc::new(Mutex::new(Vec::new()));
    let first = recorder(&log, "first");
    built.tracer.add_listener(Arc::clone(&first));
    built.tracer.add_listener(recorder(&log, "second"));
    built.tracer.start().expect("start");
    log.lock().clear();

    built.tracer.remove_listener(&first);
    built.tracer.remove_listener(&first);
    built.tracer.stop().expect("stop");

    let log = log.lock();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].0, "second");
    assert_eq!(log[0].1.activity, ContainerActivity::Stop);
}

// ── End to end ───────────────────────────────────────────────────────

#[tokio::test]
async fn raw_records_land_in_the_sink() {
    let sink = Arc::new(EventSink::new(&SinkConfig::default()).expect("sink"));
    sink.start().expect("sink start");

    let exec_ok = RawExecEvent {
        retval: 0,
        container: "test".into(),
        pod: "test".into(),
        namespace: "test".into(),
        args: vec!["test".into(), "test".into()],
        timestamp: 12_345,
        ..RawExecEvent::default()
    };
    let exec_failed = RawExecEvent {
        retval: -1,
        args: vec!["/nope".into()],
        ..exec_ok.clone()
    };
    let accept = RawTcpEvent {
        operation: "accept".into(),
        saddr: "10.0.0.1".into(),
        sport: 80,
        daddr: "10.0.0.9".into(),
        dport: 51_000,
        container: "test".into(),
        pod: "test".into(),
        namespace: "test".into(),
        ..RawTcpEvent::default()
    };
    let unknown = RawTcpEvent {
        operation: "unknown".into(),
        ..accept.clone()
    };

    let mut built = Rig {
        exec_records: vec![exec_ok, exec_failed],
        tcp_records: vec![accept, unknown],
        ..Rig::default()
    }
    .build(Arc::clone(&sink) as Arc<dyn EventSender>);

    built.tracer.start().expect("start");
    built.tracer.stop().expect("stop");
    sink.stop().await;

    let exec = sink.exec_events("test", "test", "test");
    assert_eq!(exec.len(), 1);
    assert_eq!(exec[0].path_name, "test");
    assert_eq!(exec[0].args, vec!["test"]);
    assert_eq!(exec[0].timestamp_ns, 12_345);

    let tcp = sink.tcp_events("test", "test", "test");
    assert_eq!(tcp.len(), 1);
    assert_eq!(tcp[0].destination, "10.0.0.1");
    assert_eq!(tcp[0].dest_port, 80);
    assert_eq!(tcp[0].source, "");
    assert_eq!(tcp[0].source_port, 0);
    assert_eq!(tcp[0].operation, TcpOperation::Accept);

    assert!(sink.cleanup_container("test", "test", "test"));
    assert!(sink.exec_events("test", "test", "test").is_empty());
    assert!(sink.tcp_events("test", "test", "test").is_empty());
}
