//! Rule literal parsing and dispatch (C3, §4.2).

use std::collections::BTreeMap;

use crate::api::types::{Rule, RuleKind};
use crate::error::ScaError;

/// Parse a single rule literal (e.g. `f:/etc/passwd -> r:^root:`) into a
/// [`Rule`]. The optional leading `NOT ` flips the `negate` flag.
pub fn parse_rule_literal(policy_id: &str, check_id: u32, literal: &str) -> Result<Rule, ScaError> {
    let trimmed = literal.trim();
    let (negate, rest) = match trimmed.strip_prefix("NOT ") {
        Some(r) => (true, r),
        None => (false, trimmed),
    };

    let mut tag_split = rest.splitn(2, ':');
    let tag = tag_split.next().unwrap_or_default();
    let value = tag_split.next().ok_or_else(|| ScaError::PolicyMalformed {
        policy_id: policy_id.to_string(),
        reason: format!("check {check_id}: rule '{literal}' missing ':' after tag"),
    })?;

    let parts: Vec<&str> = value.split(" -> ").collect();

    let kind = match tag {
        "f" => RuleKind::File {
            paths: parts[0].split(',').map(|s| s.trim().to_string()).collect(),
            pattern: join_rest(&parts, 1),
        },
        "d" => RuleKind::Dir {
            dirs: parts[0].split(',').map(|s| s.trim().to_string()).collect(),
            selector: parts.get(1).map(|s| s.trim().to_string()),
            pattern: join_rest(&parts, 2),
        },
        "p" => RuleKind::Process {
            pattern: join_rest(&parts, 0).unwrap_or_default(),
        },
        "r" => RuleKind::Registry {
            key: parts[0].trim().to_string(),
            option: parts.get(1).map(|s| s.trim().to_string()),
            value_pattern: join_rest(&parts, 2),
        },
        "c" => RuleKind::Command {
            cmdline: parts[0].trim().to_string(),
            pattern: join_rest(&parts, 1),
        },
        other => {
            return Err(ScaError::PolicyMalformed {
                policy_id: policy_id.to_string(),
                reason: format!("check {check_id}: unknown rule tag '{other}' in '{literal}'"),
            })
        }
    };

    Ok(Rule {
        kind,
        negate,
        literal: literal.to_string(),
    })
}

fn join_rest(parts: &[&str], from: usize) -> Option<String> {
    if parts.len() <= from {
        None
    } else {
        Some(parts[from..].join(" -> "))
    }
}

/// Resolve a `$name` reference through the policy's variable map.
///
/// Returns `Ok(None)` for the documented soft-skip hazard (§9b): a value
/// beginning with `$` whose name is not present in `variables`. The caller
/// must treat `Ok(None)` as "this rule contributes nothing to the
/// aggregator" rather than as an error.
pub fn resolve_variable<'a>(value: &'a str, variables: &'a BTreeMap<String, String>) -> Option<&'a str> {
    match value.strip_prefix('$') {
        Some(name) => variables.get(name).map(|s| s.as_str()),
        None => Some(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_file_rule_with_pattern() {
        let rule = parse_rule_literal("p", 1, "f:/tmp/a.cfg -> r:^EnableFoo=1$").unwrap();
        assert!(!rule.negate);
        match rule.kind {
            RuleKind::File { paths, pattern } => {
                assert_eq!(paths, vec!["/tmp/a.cfg"]);
                assert_eq!(pattern.as_deref(), Some("r:^EnableFoo=1$"));
            }
            other => panic!("unexpected kind: {other:?}"),
        }
    }

    #[test]
    fn parses_negated_process_rule() {
        let rule = parse_rule_literal("p", 1, "NOT p:r:^sshd$").unwrap();
        assert!(rule.negate);
        match rule.kind {
            RuleKind::Process { pattern } => assert_eq!(pattern, "r:^sshd$"),
            other => panic!("unexpected kind: {other:?}"),
        }
    }

    #[test]
    fn parses_dir_rule_with_selector_and_pattern() {
        let rule = parse_rule_literal("p", 1, "d:/mnt/nfs -> audit.conf -> r:.*").unwrap();
        match rule.kind {
            RuleKind::Dir { dirs, selector, pattern } => {
                assert_eq!(dirs, vec!["/mnt/nfs"]);
                assert_eq!(selector.as_deref(), Some("audit.conf"));
                assert_eq!(pattern.as_deref(), Some("r:.*"));
            }
            other => panic!("unexpected kind: {other:?}"),
        }
    }

    #[test]
    fn parses_command_rule_without_pattern() {
        let rule = parse_rule_literal("p", 1, "c:/bin/false").unwrap();
        match rule.kind {
            RuleKind::Command { cmdline, pattern } => {
                assert_eq!(cmdline, "/bin/false");
                assert!(pattern.is_none());
            }
            other => panic!("unexpected kind: {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_tag() {
        assert!(parse_rule_literal("p", 1, "x:/tmp").is_err());
    }

    #[test]
    fn rejects_missing_colon() {
        assert!(parse_rule_literal("p", 1, "fnocolon").is_err());
    }

    #[test]
    fn resolves_plain_variable() {
        let mut vars = BTreeMap::new();
        vars.insert("cfg".to_string(), "/etc/ssh/sshd_config".to_string());
        assert_eq!(resolve_variable("$cfg", &vars), Some("/etc/ssh/sshd_config"));
    }

    #[test]
    fn soft_skip_on_unresolved_variable() {
        let vars = BTreeMap::new();
        assert_eq!(resolve_variable("$missing", &vars), None);
    }

    #[test]
    fn non_variable_value_passes_through() {
        let vars = BTreeMap::new();
        assert_eq!(resolve_variable("/etc/passwd", &vars), Some("/etc/passwd"));
    }
}
