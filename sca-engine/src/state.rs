//! Engine state: the policies, per-policy integrity stores, and the
//! coordinator lock shared between the scheduler (reader side) and the dump
//! controller (writer side), per §5.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::warn;

/// Seconds to wait between a policy's check events and its summary (§4.6,
/// §5 "Ordering guarantees").
const SUMMARY_DELAY: Duration = Duration::from_secs(3);

use crate::api::traits::EventSink;
use crate::api::types::{Policy, Summary};
use crate::config::Capabilities;
use crate::core::engine::{scan_policy, ScanOutcome};
use crate::core::events::{build_dump_end_event, build_policies_event, build_summary_event};
use crate::core::integrity::IntegrityStore;
use crate::core::probes::registry::{RegistryProbe, UnavailableRegistry};
use crate::error::ScaError;

/// Shared engine state. Scans take the reader side of `stores` and mutate
/// through the per-policy `Mutex`; dumps take the writer side for exclusive
/// access across the whole position array (§5, §4.7).
pub struct EngineState {
    pub policies: Vec<Policy>,
    pub capabilities: Capabilities,
    stores: RwLock<HashMap<String, Mutex<IntegrityStore>>>,
    last_summaries: Mutex<HashMap<String, Summary>>,
    first_scan_done: AtomicBool,
    registry_probe: Box<dyn RegistryProbe>,
}

impl EngineState {
    pub fn new(policies: Vec<Policy>, capabilities: Capabilities) -> Self {
        Self::with_registry_probe(policies, capabilities, Box::new(UnavailableRegistry))
    }

    pub fn with_registry_probe(
        policies: Vec<Policy>,
        capabilities: Capabilities,
        registry_probe: Box<dyn RegistryProbe>,
    ) -> Self {
        let mut stores = HashMap::new();
        for policy in &policies {
            stores.insert(policy.policy_id.clone(), Mutex::new(IntegrityStore::new()));
        }
        Self {
            policies,
            capabilities,
            stores: RwLock::new(stores),
            last_summaries: Mutex::new(HashMap::new()),
            first_scan_done: AtomicBool::new(false),
            registry_probe,
        }
    }

    /// Run one scan cycle over every loaded policy, emitting changed check
    /// events and a summary per policy, then a trailing `policies` envelope
    /// (§4.5, §7). Takes the reader side of the coordinator lock.
    pub async fn run_scan_cycle(&self, sink: &mut dyn EventSink) {
        let first_scan = !self.first_scan_done.swap(true, Ordering::SeqCst);
        let guard = self.stores.read().await;

        for policy in &self.policies {
            let Some(store_lock) = guard.get(&policy.policy_id) else {
                continue;
            };
            let mut store = store_lock.lock().expect("integrity store mutex poisoned");

            match scan_policy(policy, &self.capabilities, &mut store, first_scan, self.registry_probe.as_ref()) {
                Ok(ScanOutcome::Skipped { reason }) => {
                    warn!(policy_id = %policy.policy_id, reason, "policy skipped");
                }
                Ok(ScanOutcome::Completed(out)) => {
                    for event in &out.check_events {
                        send_event(sink, event);
                    }
                    tokio::time::sleep(SUMMARY_DELAY).await;
                    let summary_event = build_summary_event(&out.summary);
                    send_event(sink, &summary_event);
                    self.last_summaries
                        .lock()
                        .expect("last_summaries mutex poisoned")
                        .insert(policy.policy_id.clone(), out.summary);
                }
                Err(e) => {
                    warn!(policy_id = %policy.policy_id, error = %e, "scan failed");
                }
            }
        }

        let policy_ids: Vec<String> = self.policies.iter().map(|p| p.policy_id.clone()).collect();
        let policies_event = build_policies_event(&policy_ids);
        send_event(sink, &policies_event);
    }

    /// Dump every stored record for the policy at `index` (C8, §4.7). Takes
    /// the writer side of the coordinator lock, excluding concurrent scans.
    pub async fn dump_policy(&self, index: usize, first_scan: bool, sink: &mut dyn EventSink) -> Result<(), ScaError> {
        let guard = self.stores.write().await;
        let policy = self
            .policies
            .get(index)
            .ok_or_else(|| ScaError::Fatal(format!("no policy at index {index}")))?;
        let store_lock = guard
            .get(&policy.policy_id)
            .ok_or_else(|| ScaError::Fatal(format!("no integrity store for policy '{}'", policy.policy_id)))?;
        let records: Vec<_> = store_lock.lock().expect("integrity store mutex poisoned").records().to_vec();
        drop(guard);

        for record in &records {
            send_event(sink, &record.event);
        }

        tokio::time::sleep(std::time::Duration::from_secs(5)).await;

        // §4.7.5: the dump's scan_id is extracted from the first stored
        // event, not freshly generated, so it correlates with the scan that
        // produced the dumped records.
        let scan_id = records
            .first()
            .and_then(|r| r.event.get("id"))
            .and_then(|v| v.as_i64())
            .unwrap_or_else(crate::core::engine::current_scan_id);
        let dump_end = build_dump_end_event(&policy.policy_id, records.len(), scan_id);
        send_event(sink, &dump_end);

        tokio::time::sleep(std::time::Duration::from_secs(2)).await;

        if first_scan {
            let cached = self
                .last_summaries
                .lock()
                .expect("last_summaries mutex poisoned")
                .get(&policy.policy_id)
                .cloned();
            if let Some(mut summary) = cached {
                summary.first_scan = None;
                summary.force_alert = Some("1".to_string());
                send_event(sink, &build_summary_event(&summary));
            }
        }

        Ok(())
    }
}

fn send_event(sink: &mut dyn EventSink, event: &serde_json::Value) {
    let line = event.to_string();
    if let Err(e) = sink.send(&line) {
        warn!(error = %e, "sink send failed, event dropped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::traits::CollectingSink;
    use crate::api::types::{Check, Condition, Rule, RuleKind};
    use std::collections::BTreeMap;
    use std::io::Write;
    use std::time::Duration;

    fn caps() -> Capabilities {
        Capabilities {
            skip_nfs: false,
            commands_timeout: Duration::from_secs(5),
            remote_commands: false,
        }
    }

    fn simple_policy(cfg_path: &str, policy_file: &std::path::Path) -> Policy {
        Policy {
            policy_id: "p".to_string(),
            name: "P".to_string(),
            description: None,
            file: policy_file.to_path_buf(),
            references: vec![],
            requirements: None,
            checks: vec![Check {
                id: 1,
                title: "t".to_string(),
                description: None,
                rationale: None,
                remediation: None,
                compliance: Default::default(),
                references: vec![],
                condition: Condition::All,
                rules: vec![Rule {
                    kind: RuleKind::File {
                        paths: vec![cfg_path.to_string()],
                        pattern: Some("r:^EnableFoo=1$".to_string()),
                    },
                    negate: false,
                    literal: format!("f:{cfg_path} -> r:^EnableFoo=1$"),
                }],
            }],
            variables: BTreeMap::new(),
            remote: false,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn run_scan_cycle_emits_summary_and_policies_events() {
        let mut cfg_file = tempfile::NamedTempFile::new().unwrap();
        writeln!(cfg_file, "EnableFoo=1").unwrap();
        let cfg_path = cfg_file.path().to_string_lossy().to_string();
        let policy_file = tempfile::NamedTempFile::new().unwrap();
        let policy = simple_policy(&cfg_path, policy_file.path());

        let state = EngineState::new(vec![policy], caps());
        let mut sink = CollectingSink::default();
        state.run_scan_cycle(&mut sink).await;

        assert!(sink.lines.iter().any(|l| l.contains("\"type\":\"policies\"")));
        assert!(sink.lines.iter().any(|l| l.contains("\"scan_id\"")));
    }

    #[tokio::test(start_paused = true)]
    async fn dump_policy_emits_every_stored_record_then_dump_end() {
        let mut cfg_file = tempfile::NamedTempFile::new().unwrap();
        writeln!(cfg_file, "EnableFoo=1").unwrap();
        let cfg_path = cfg_file.path().to_string_lossy().to_string();
        let policy_file = tempfile::NamedTempFile::new().unwrap();
        let policy = simple_policy(&cfg_path, policy_file.path());

        let state = EngineState::new(vec![policy], caps());
        let mut sink = CollectingSink::default();
        state.run_scan_cycle(&mut sink).await;
        sink.lines.clear();

        state.dump_policy(0, false, &mut sink).await.unwrap();
        assert!(sink.lines.iter().any(|l| l.contains("\"type\":\"dump_end\"")));
        assert_eq!(sink.lines.iter().filter(|l| l.contains("\"check\"")).count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn dump_policy_scan_id_matches_the_dumped_check_events() {
        let mut cfg_file = tempfile::NamedTempFile::new().unwrap();
        writeln!(cfg_file, "EnableFoo=1").unwrap();
        let cfg_path = cfg_file.path().to_string_lossy().to_string();
        let policy_file = tempfile::NamedTempFile::new().unwrap();
        let policy = simple_policy(&cfg_path, policy_file.path());

        let state = EngineState::new(vec![policy], caps());
        let mut sink = CollectingSink::default();
        state.run_scan_cycle(&mut sink).await;

        let check_line = sink.lines.iter().find(|l| l.contains("\"type\":\"check\"")).unwrap();
        let check_event: serde_json::Value = serde_json::from_str(check_line).unwrap();
        let scan_id = check_event["id"].as_i64().unwrap();
        sink.lines.clear();

        state.dump_policy(0, false, &mut sink).await.unwrap();
        let dump_end_line = sink.lines.iter().find(|l| l.contains("\"type\":\"dump_end\"")).unwrap();
        let dump_end: serde_json::Value = serde_json::from_str(dump_end_line).unwrap();
        assert_eq!(dump_end["scan_id"], scan_id);
    }

    #[tokio::test(start_paused = true)]
    async fn dump_policy_rejects_out_of_range_index() {
        let state = EngineState::new(vec![], caps());
        let mut sink = CollectingSink::default();
        let err = state.dump_policy(0, false, &mut sink).await.unwrap_err();
        assert!(matches!(err, ScaError::Fatal(_)));
    }
}
