//! Scan orchestrator: drives C1-C6 for one policy over one scan cycle.

use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::api::types::{Check, Condition, Policy, Summary, TargetLists, Tristate};
use crate::config::Capabilities;
use crate::core::aggregator::aggregate;
use crate::core::dispatch::{evaluate_rule, EvalState};
use crate::core::events::build_check_event;
use crate::core::integrity::{hash_file, IntegrityStore};
use crate::core::probes::registry::RegistryProbe;
use crate::error::ScaError;

pub struct ScanOutput {
    pub check_events: Vec<Value>,
    pub summary: Summary,
}

/// Evaluate a single check (or the requirements pseudo-check) against a
/// policy's variables and capabilities, returning the aggregated verdict,
/// an optional human-readable reason, and the collected target lists.
pub fn evaluate_check(
    check: &Check,
    policy: &Policy,
    capabilities: &Capabilities,
    registry_probe: &dyn RegistryProbe,
) -> (Tristate, Option<String>, TargetLists) {
    let mut verdicts = Vec::with_capacity(check.rules.len());
    let mut targets = TargetLists::default();
    let mut state = EvalState::default();
    let mut reason: Option<String> = None;

    for (idx, rule) in check.rules.iter().enumerate() {
        let outcome = evaluate_rule(rule, &policy.variables, capabilities, policy.remote, &mut targets, &mut state, registry_probe);
        match outcome.verdict {
            Some(v) => {
                verdicts.push(v);
                if v == Tristate::Invalid {
                    if let Some(r) = outcome.reason {
                        reason.get_or_insert(r);
                    }
                }
            }
            None => {
                warn!(check_id = check.id, rule_index = idx, rule = %rule.literal, "unresolved variable, soft-skipping rule");
            }
        }
    }

    let verdict = aggregate(check.condition, &verdicts);
    if verdict == Tristate::Invalid && reason.is_none() {
        reason = Some("one or more rules could not be evaluated".to_string());
    }
    (verdict, reason, targets)
}

/// Result of [`scan_policy`]: either the policy was skipped (malformed, or
/// its requirements were not satisfied), or a full scan completed.
pub enum ScanOutcome {
    Skipped { reason: String },
    Completed(ScanOutput),
}

/// Run one full scan cycle for `policy`, updating `store` in place.
///
/// `store` must be the caller-held, lock-protected integrity store for this
/// policy id; the caller is responsible for acquiring the reader side of
/// the coordinator lock (§5) before calling this.
pub fn scan_policy(
    policy: &Policy,
    capabilities: &Capabilities,
    store: &mut IntegrityStore,
    first_scan: bool,
    registry_probe: &dyn RegistryProbe,
) -> Result<ScanOutcome, ScaError> {
    let file_hash = hash_file(&policy.file).unwrap_or_else(|_| crate::core::integrity::hex_sha256(policy.policy_id.as_bytes()));
    if store.file_hash.as_deref() != Some(file_hash.as_str()) {
        info!(policy_id = %policy.policy_id, "policy file changed, rebuilding integrity store");
        store.reset();
        store.file_hash = Some(file_hash.clone());
    }

    if let Some(requirements) = &policy.requirements {
        let (verdict, _reason, _targets) = evaluate_check(requirements, policy, capabilities, registry_probe);
        let satisfied = matches!(verdict, Tristate::Found | Tristate::Invalid);
        if !satisfied {
            info!(policy_id = %policy.policy_id, "requirements not satisfied, skipping policy");
            return Ok(ScanOutcome::Skipped {
                reason: "requirements not satisfied".to_string(),
            });
        }
    }

    let scan_id = current_scan_id();
    let start_time = now_secs();
    let mut passed = 0u32;
    let mut failed = 0u32;
    let mut invalid = 0u32;
    let mut check_events = Vec::new();

    for (position, check) in policy.checks.iter().enumerate() {
        let (verdict, reason, targets) = evaluate_check(check, policy, capabilities, registry_probe);
        match verdict {
            Tristate::Found => passed += 1,
            Tristate::NotFound => failed += 1,
            Tristate::Invalid => invalid += 1,
        }

        let tag = verdict.result_tag().to_string();
        let previous_tag = store.lookup_tag(check.id).map(|s| s.to_string());
        let event = build_check_event(scan_id, &policy.name, &policy.policy_id, check, verdict, reason.as_deref(), &targets);
        store.upsert(position, check.id, tag.clone(), event.clone());

        let changed = previous_tag.as_deref() != Some(tag.as_str());
        if changed && !first_scan {
            debug!(check_id = check.id, result = %tag, "check result changed, transmitting");
            check_events.push(event);
        }
    }
    store.truncate(policy.checks.len());

    let end_time = now_secs();
    let summary = Summary {
        scan_id,
        name: policy.name.clone(),
        policy_id: policy.policy_id.clone(),
        file: policy.file.to_string_lossy().to_string(),
        description: policy.description.clone(),
        references: if policy.references.is_empty() {
            None
        } else {
            Some(policy.references.join(","))
        },
        passed,
        failed,
        invalid,
        total_checks: passed + failed + invalid,
        score: Summary::compute_score(passed, failed),
        start_time,
        end_time,
        hash: store.integrity_hash(),
        hash_file: file_hash,
        first_scan: if first_scan { Some(true) } else { None },
        force_alert: None,
    };

    Ok(ScanOutcome::Completed(ScanOutput { check_events, summary }))
}

fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Random non-negative scan id (§3 Summary: "random non-negative integer
/// unique to this scan").
pub fn current_scan_id() -> i64 {
    rand::thread_rng().gen_range(0..i64::MAX)
}
