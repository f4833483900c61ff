//! Policy document loading.
//!
//! Policy ingestion is formally out of scope (§1b) — the engine consumes an
//! already-validated [`Policy`] value — but a complete crate needs a
//! concrete loader to exercise and demonstrate the engine against, and the
//! engine's own entry point still performs the minimal structural
//! validation the original defensively repeats even though it trusts its
//! loader (§10.5): duplicate check ids and out-of-range rule counts are
//! rejected here rather than trusted blindly.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::api::types::{Check, Policy};
use crate::error::ScaError;

use super::rule::parse_rule_literal;

const MAX_RULES_PER_CHECK: usize = 255;

#[derive(Debug, Deserialize)]
struct RawPolicy {
    policy_id: String,
    name: String,
    description: Option<String>,
    #[serde(default)]
    references: Vec<String>,
    #[serde(default)]
    remote: bool,
    #[serde(default)]
    variables: BTreeMap<String, String>,
    requirements: Option<RawCheck>,
    #[serde(default)]
    checks: Vec<RawCheck>,
}

#[derive(Debug, Deserialize)]
struct RawCheck {
    #[serde(default)]
    id: u32,
    #[serde(default)]
    title: String,
    description: Option<String>,
    rationale: Option<String>,
    remediation: Option<String>,
    #[serde(default)]
    compliance: BTreeMap<String, String>,
    #[serde(default)]
    references: Vec<String>,
    condition: String,
    rules: Vec<String>,
}

/// Parse a policy document from TOML source.
pub fn parse_policy(policy_id_hint: &str, file: &Path, toml_str: &str) -> Result<Policy, ScaError> {
    let raw: RawPolicy = toml::from_str(toml_str).map_err(|e| ScaError::PolicyMalformed {
        policy_id: policy_id_hint.to_string(),
        reason: format!("TOML parse error: {e}"),
    })?;

    let requirements = raw
        .requirements
        .map(|r| convert_check(&raw.policy_id, r))
        .transpose()?;

    let mut checks = Vec::with_capacity(raw.checks.len());
    let mut seen_ids = std::collections::HashSet::new();
    for raw_check in raw.checks {
        let check = convert_check(&raw.policy_id, raw_check)?;
        if check.id == 0 {
            return Err(ScaError::PolicyMalformed {
                policy_id: raw.policy_id.clone(),
                reason: "check id must be a positive integer, got 0".to_string(),
            });
        }
        if !seen_ids.insert(check.id) {
            return Err(ScaError::PolicyMalformed {
                policy_id: raw.policy_id.clone(),
                reason: format!("duplicate check id {}", check.id),
            });
        }
        checks.push(check);
    }

    Ok(Policy {
        policy_id: raw.policy_id,
        name: raw.name,
        description: raw.description,
        file: file.to_path_buf(),
        references: raw.references,
        requirements,
        checks,
        variables: raw.variables,
        remote: raw.remote,
    })
}

fn convert_check(policy_id: &str, raw: RawCheck) -> Result<Check, ScaError> {
    let condition = crate::api::types::Condition::parse(&raw.condition).ok_or_else(|| ScaError::PolicyMalformed {
        policy_id: policy_id.to_string(),
        reason: format!("check {}: unknown condition '{}'", raw.id, raw.condition),
    })?;

    if raw.rules.is_empty() || raw.rules.len() > MAX_RULES_PER_CHECK {
        return Err(ScaError::PolicyMalformed {
            policy_id: policy_id.to_string(),
            reason: format!(
                "check {}: rule count {} out of bounds [1, {}]",
                raw.id,
                raw.rules.len(),
                MAX_RULES_PER_CHECK
            ),
        });
    }

    let rules = raw
        .rules
        .iter()
        .map(|lit| parse_rule_literal(policy_id, raw.id, lit))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Check {
        id: raw.id,
        title: raw.title,
        description: raw.description,
        rationale: raw.rationale,
        remediation: raw.remediation,
        compliance: raw.compliance,
        references: raw.references,
        condition,
        rules,
    })
}

/// Load and parse a policy document from disk.
pub fn load_policy(path: &PathBuf) -> Result<Policy, ScaError> {
    let contents = std::fs::read_to_string(path)?;
    let hint = path.to_string_lossy().to_string();
    parse_policy(&hint, path, &contents)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
policy_id = "example"
name = "Example policy"
description = "demo"

[variables]
cfg = "/tmp/a.cfg"

[[checks]]
id = 1
title = "enable foo"
condition = "all"
rules = ["f:$cfg -> r:^EnableFoo=1$"]
"#;

    #[test]
    fn parses_valid_policy() {
        let policy = parse_policy("example", Path::new("example.toml"), SAMPLE).unwrap();
        assert_eq!(policy.policy_id, "example");
        assert_eq!(policy.checks.len(), 1);
        assert_eq!(policy.checks[0].id, 1);
    }

    #[test]
    fn rejects_duplicate_check_ids() {
        let toml = r#"
policy_id = "example"
name = "Example"

[[checks]]
id = 1
title = "a"
condition = "all"
rules = ["f:/tmp/a"]

[[checks]]
id = 1
title = "b"
condition = "all"
rules = ["f:/tmp/b"]
"#;
        let err = parse_policy("example", Path::new("x.toml"), toml).unwrap_err();
        assert!(matches!(err, ScaError::PolicyMalformed { .. }));
    }

    #[test]
    fn rejects_zero_check_id() {
        let toml = r#"
policy_id = "example"
name = "Example"

[[checks]]
id = 0
title = "a"
condition = "all"
rules = ["f:/tmp/a"]
"#;
        let err = parse_policy("example", Path::new("x.toml"), toml).unwrap_err();
        assert!(matches!(err, ScaError::PolicyMalformed { .. }));
    }

    #[test]
    fn rejects_missing_check_id() {
        let toml = r#"
policy_id = "example"
name = "Example"

[[checks]]
title = "a"
condition = "all"
rules = ["f:/tmp/a"]
"#;
        let err = parse_policy("example", Path::new("x.toml"), toml).unwrap_err();
        assert!(matches!(err, ScaError::PolicyMalformed { .. }));
    }

    #[test]
    fn rejects_empty_rule_list() {
        let toml = r#"
policy_id = "example"
name = "Example"

[[checks]]
id = 1
title = "a"
condition = "all"
rules = []
"#;
        let err = parse_policy("example", Path::new("x.toml"), toml).unwrap_err();
        assert!(matches!(err, ScaError::PolicyMalformed { .. }));
    }

    #[test]
    fn rejects_unknown_condition() {
        let toml = r#"
policy_id = "example"
name = "Example"

[[checks]]
id = 1
title = "a"
condition = "maybe"
rules = ["f:/tmp/a"]
"#;
        let err = parse_policy("example", Path::new("x.toml"), toml).unwrap_err();
        assert!(matches!(err, ScaError::PolicyMalformed { .. }));
    }

    #[test]
    fn folds_deprecated_condition_spellings() {
        let toml = r#"
policy_id = "example"
name = "Example"

[[checks]]
id = 1
title = "a"
condition = "any required"
rules = ["f:/tmp/a"]
"#;
        let policy = parse_policy("example", Path::new("x.toml"), toml).unwrap();
        assert_eq!(policy.checks[0].condition, crate::api::types::Condition::Any);
    }
}
