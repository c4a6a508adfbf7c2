//! Conversion of raw source records into canonical events.
//!
//! Both functions are pure and run on the source's callback thread.
//! Records that are not worth keeping yield `None`; that is the common
//! case, not an error.

use traceward_common::types::{ExecEvent, TcpEvent, TcpOperation};
use traceward_ebpf::EventType;
use traceward_ebpf::exec::RawExecEvent;
use traceward_ebpf::tcp::RawTcpEvent;

/// Turns a successful `execve` record into an [`ExecEvent`].
///
/// Drops non-normal records, failed calls (`retval < 0`), and records
/// without an argument vector.
#[must_use]
pub fn exec_event(raw: &RawExecEvent) -> Option<ExecEvent> {
    if raw.event_type != EventType::Normal || raw.retval < 0 {
        return None;
    }
    let (path_name, args) = raw.args.split_first()?;
    Some(ExecEvent {
        container_id: raw.container.clone(),
        pod_name: raw.pod.clone(),
        namespace: raw.namespace.clone(),
        path_name: path_name.clone(),
        args: args.to_vec(),
        env: Vec::new(),
        timestamp_ns: timestamp_ns(raw.timestamp),
    })
}

/// Turns an accept or connect record into a [`TcpEvent`].
///
/// The peer is reported as destination: for `accept` the raw local side
/// (`saddr`, `sport`), for `connect` the raw remote side. Source address
/// and port are always left empty. Other operations are dropped.
#[must_use]
pub fn tcp_event(raw: &RawTcpEvent) -> Option<TcpEvent> {
    if raw.event_type != EventType::Normal {
        return None;
    }
    let operation = TcpOperation::from_raw(&raw.operation)?;
    let (destination, dest_port) = match operation {
        TcpOperation::Accept => (&raw.saddr, raw.sport),
        TcpOperation::Connect => (&raw.daddr, raw.dport),
    };
    Some(TcpEvent {
        container_id: raw.container.clone(),
        pod_name: raw.pod.clone(),
        namespace: raw.namespace.clone(),
        source: String::new(),
        source_port: 0,
        destination: destination.clone(),
        dest_port,
        operation,
        timestamp_ns: timestamp_ns(raw.timestamp),
    })
}

fn timestamp_ns(raw: u64) -> i64 {
    i64::try_from(raw).unwrap_or(i64::MAX)
}
