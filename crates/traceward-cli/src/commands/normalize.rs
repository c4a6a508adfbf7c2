//! `twd normalize` — run raw event files through the normalizers.

use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use traceward_ebpf::exec::RawExecEvent;
use traceward_ebpf::tcp::RawTcpEvent;
use traceward_tracer::normalize;

use crate::replay::read_jsonl;

/// Arguments for the normalize command.
#[derive(Args, Debug)]
pub struct NormalizeArgs {
    /// Raw exec records, one JSON object per line.
    #[arg(long)]
    pub exec: Option<PathBuf>,

    /// Raw TCP records, one JSON object per line.
    #[arg(long)]
    pub tcp: Option<PathBuf>,
}

/// Prints every canonical event as one JSON line, exec events first.
///
/// # Errors
///
/// Returns an error if an input file cannot be read or parsed.
pub fn execute(args: &NormalizeArgs) -> anyhow::Result<()> {
    if args.exec.is_none() && args.tcp.is_none() {
        anyhow::bail!("nothing to normalize, pass --exec and/or --tcp");
    }
    for line in normalize_files(args)? {
        println!("{line}");
    }
    Ok(())
}

fn normalize_files(args: &NormalizeArgs) -> anyhow::Result<Vec<String>> {
    let mut lines = Vec::new();
    if let Some(path) = &args.exec {
        let raw: Vec<RawExecEvent> = read_jsonl(path)?;
        let total = raw.len();
        for event in raw.iter().filter_map(normalize::exec_event) {
            lines.push(serde_json::to_string(&event).context("failed to encode exec event")?);
        }
        tracing::info!(path = %path.display(), total, kept = lines.len(), "normalized exec records");
    }
    if let Some(path) = &args.tcp {
        let raw: Vec<RawTcpEvent> = read_jsonl(path)?;
        let before = lines.len();
        for event in raw.iter().filter_map(normalize::tcp_event) {
            lines.push(serde_json::to_string(&event).context("failed to encode tcp event")?);
        }
        tracing::info!(
            path = %path.display(),
            total = raw.len(),
            kept = lines.len() - before,
            "normalized tcp records"
        );
    }
    Ok(lines)
}
