//! Event builder (C6, §4.5).

use serde_json::{json, Value};

use crate::api::types::{Check, Summary, TargetLists, Tristate};

/// Build a `check` envelope. `scan_id` is the id of the scan that produced
/// this result (also used as the JSON object's `id` field, mirroring the
/// wire format's historical field name).
pub fn build_check_event(
    scan_id: i64,
    policy_name: &str,
    policy_id: &str,
    check: &Check,
    verdict: Tristate,
    reason: Option<&str>,
    targets: &TargetLists,
) -> Value {
    let mut check_obj = json!({
        "id": check.id,
        "title": check.title,
        "rules": check.rules.iter().map(|r| r.literal.clone()).collect::<Vec<_>>(),
    });
    let obj = check_obj.as_object_mut().unwrap();

    if let Some(d) = &check.description {
        obj.insert("description".into(), json!(d));
    }
    if let Some(r) = &check.rationale {
        obj.insert("rationale".into(), json!(r));
    }
    if let Some(r) = &check.remediation {
        obj.insert("remediation".into(), json!(r));
    }
    if !check.compliance.is_empty() {
        obj.insert("compliance".into(), json!(check.compliance));
    }
    if !check.references.is_empty() {
        obj.insert("references".into(), json!(check.references.join(",")));
    }
    if let Some(f) = targets.file.joined() {
        obj.insert("file".into(), json!(f));
    }
    if let Some(d) = targets.directory.joined() {
        obj.insert("directory".into(), json!(d));
    }
    if let Some(p) = targets.process.joined() {
        obj.insert("process".into(), json!(p));
    }
    if let Some(r) = targets.registry.joined() {
        obj.insert("registry".into(), json!(r));
    }
    if let Some(c) = targets.command.joined() {
        obj.insert("command".into(), json!(c));
    }

    match verdict {
        Tristate::Invalid => {
            obj.insert("status".into(), json!("Not applicable"));
            if let Some(reason) = reason {
                obj.insert("reason".into(), json!(reason));
            }
        }
        other => {
            obj.insert("result".into(), json!(other.result_tag()));
        }
    }

    json!({
        "type": "check",
        "id": scan_id,
        "policy": policy_name,
        "policy_id": policy_id,
        "check": check_obj,
    })
}

pub fn build_summary_event(summary: &Summary) -> Value {
    serde_json::to_value(summary).expect("Summary serializes infallibly")
}

pub fn build_dump_end_event(policy_id: &str, elements_sent: usize, scan_id: i64) -> Value {
    json!({
        "type": "dump_end",
        "policy_id": policy_id,
        "elements_sent": elements_sent,
        "scan_id": scan_id,
    })
}

pub fn build_policies_event(policy_ids: &[String]) -> Value {
    json!({
        "type": "policies",
        "policies": policy_ids.iter().map(|id| json!({"policy": id})).collect::<Vec<_>>(),
    })
}
