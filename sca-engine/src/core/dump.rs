//! Dump request queue and controller (C8, §4.7).
//!
//! The queue is a bounded `tokio::sync::mpsc` channel; pushes beyond
//! capacity are dropped and logged rather than blocking the pusher (§4.7,
//! §7.4).

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::mpsc;
use tracing::warn;

use crate::api::traits::EventSink;
use crate::api::types::DumpRequest;
use crate::state::EngineState;

pub const DUMP_QUEUE_CAPACITY: usize = 1024;

pub fn dump_queue() -> (mpsc::Sender<DumpRequest>, mpsc::Receiver<DumpRequest>) {
    mpsc::channel(DUMP_QUEUE_CAPACITY)
}

/// Push a dump request, dropping and logging on overflow (§4.7, §7.4)
/// instead of blocking the caller.
pub fn try_push(tx: &mpsc::Sender<DumpRequest>, request: DumpRequest) {
    if let Err(e) = tx.try_send(request) {
        warn!(policy_index = request.policy_index, error = %e, "dump queue overflow, request dropped");
    }
}

/// Decode one line of the inbound control channel: `<prefix>:<policy_id>:<first_scan_flag>`
/// (§7.2). Unknown lines, or a line missing the `first_scan_flag`, are
/// ignored (returns `None`); the caller is expected to log at the call site.
pub fn parse_dump_request_line(line: &str, prefix: &str, policy_ids: &[String]) -> Option<DumpRequest> {
    let rest = line.trim().strip_prefix(prefix)?.strip_prefix(':')?;
    let mut parts = rest.splitn(2, ':');
    let policy_id = parts.next()?;
    let first_scan_flag = parts.next()?;
    let policy_index = policy_ids.iter().position(|id| id == policy_id)?;
    let first_scan = match first_scan_flag {
        "1" | "true" => true,
        "0" | "false" => false,
        _ => return None,
    };
    Some(DumpRequest { policy_index, first_scan })
}

/// Drain the dump queue, servicing each request in turn with a jittered
/// delay, then a single `dump_policy` call under the coordinator's writer
/// lock (§4.7, §5).
pub async fn run_dump_controller(
    state: Arc<EngineState>,
    mut requests: mpsc::Receiver<DumpRequest>,
    sink: Arc<tokio::sync::Mutex<Box<dyn EventSink>>>,
    request_db_interval_secs: u64,
) {
    while let Some(request) = requests.recv().await {
        let delay = jitter_delay(request.first_scan, request_db_interval_secs);
        tokio::time::sleep(delay).await;

        let mut guard = sink.lock().await;
        if let Err(e) = state.dump_policy(request.policy_index, request.first_scan, &mut **guard).await {
            warn!(policy_index = request.policy_index, error = %e, "dump failed");
        }
    }
}

/// First-scan dump requests get a short fixed warm-up; subsequent requests
/// jitter within `[0, request_db_interval)`, falling back to 5s on a
/// zero-width interval or a zero roll (§4.7).
fn jitter_delay(first_scan: bool, request_db_interval_secs: u64) -> Duration {
    if first_scan {
        return Duration::from_secs(2);
    }
    let bound = request_db_interval_secs.max(1);
    let roll = rand::thread_rng().gen_range(0..bound);
    Duration::from_secs(if roll == 0 { 5 } else { roll })
}
