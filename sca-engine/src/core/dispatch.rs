//! Per-rule dispatch: variable resolution + probe invocation (C3, §4.2).

use std::collections::BTreeMap;

use crate::api::types::{Rule, RuleKind, TargetLists, Tristate};
use crate::config::Capabilities;
use crate::core::probes::{command, dir, file, process, registry};
use crate::core::rule::resolve_variable;

/// Per-check mutable state threaded across rule evaluations: the process
/// list is listed at most once per check (§4.2, "cached ... lazily once per
/// check").
#[derive(Default)]
pub struct EvalState {
    process_cache: Option<Vec<String>>,
}

pub struct RuleOutcome {
    /// `None` is the soft-skip hazard (§9b): an unresolved `$variable`.
    pub verdict: Option<Tristate>,
    pub reason: Option<String>,
}

#[allow(clippy::too_many_arguments)]
pub fn evaluate_rule(
    rule: &Rule,
    variables: &BTreeMap<String, String>,
    capabilities: &Capabilities,
    remote: bool,
    targets: &mut TargetLists,
    state: &mut EvalState,
    registry_probe: &dyn registry::RegistryProbe,
) -> RuleOutcome {
    let resolved = match resolve_each_value(&rule.kind, variables) {
        Some(k) => k,
        None => return RuleOutcome { verdict: None, reason: None },
    };

    let (mut verdict, reason) = match resolved {
        ResolvedKind::File { paths, pattern } => {
            (file::check_file(&paths, pattern.as_deref(), &mut targets.file), None)
        }
        ResolvedKind::Dir { dirs, selector, pattern } => (
            dir::check_dir(&dirs, selector.as_deref(), pattern.as_deref(), capabilities.skip_nfs, &mut targets.directory),
            None,
        ),
        ResolvedKind::Process { pattern } => {
            if state.process_cache.is_none() {
                state.process_cache = Some(process::list_processes());
            }
            let procs = state.process_cache.as_ref().unwrap();
            (process::check_process(&pattern, procs, &mut targets.process), None)
        }
        ResolvedKind::Registry { key, option, value_pattern } => (
            registry::check_registry(registry_probe, &key, option.as_deref(), value_pattern.as_deref(), &mut targets.registry),
            None,
        ),
        ResolvedKind::Command { cmdline, pattern } => {
            let outcome = command::check_command(
                &cmdline,
                pattern.as_deref(),
                capabilities.commands_timeout,
                remote,
                capabilities.remote_commands,
                &mut targets.command,
            );
            (outcome.tristate, outcome.reason)
        }
    };

    if rule.negate {
        verdict = verdict.negate();
    }

    RuleOutcome { verdict: Some(verdict), reason }
}

enum ResolvedKind {
    File { paths: Vec<String>, pattern: Option<String> },
    Dir { dirs: Vec<String>, selector: Option<String>, pattern: Option<String> },
    Process { pattern: String },
    Registry { key: String, option: Option<String>, value_pattern: Option<String> },
    Command { cmdline: String, pattern: Option<String> },
}

fn resolve_one(value: &str, variables: &BTreeMap<String, String>) -> Option<String> {
    resolve_variable(value, variables).map(|s| s.to_string())
}

fn resolve_list(values: &[String], variables: &BTreeMap<String, String>) -> Option<Vec<String>> {
    values.iter().map(|v| resolve_one(v, variables)).collect()
}

fn resolve_opt(value: &Option<String>, variables: &BTreeMap<String, String>) -> Option<Option<String>> {
    match value {
        None => Some(None),
        Some(v) => resolve_one(v, variables).map(Some),
    }
}

fn resolve_each_value(kind: &RuleKind, variables: &BTreeMap<String, String>) -> Option<ResolvedKind> {
    Some(match kind {
        RuleKind::File { paths, pattern } => ResolvedKind::File {
            paths: resolve_list(paths, variables)?,
            pattern: resolve_opt(pattern, variables)?,
        },
        RuleKind::Dir { dirs, selector, pattern } => ResolvedKind::Dir {
            dirs: resolve_list(dirs, variables)?,
            selector: resolve_opt(selector, variables)?,
            pattern: resolve_opt(pattern, variables)?,
        },
        RuleKind::Process { pattern } => ResolvedKind::Process {
            pattern: resolve_one(pattern, variables)?,
        },
        RuleKind::Registry { key, option, value_pattern } => ResolvedKind::Registry {
            key: resolve_one(key, variables)?,
            option: resolve_opt(option, variables)?,
            value_pattern: resolve_opt(value_pattern, variables)?,
        },
        RuleKind::Command { cmdline, pattern } => ResolvedKind::Command {
            cmdline: resolve_one(cmdline, variables)?,
            pattern: resolve_opt(pattern, variables)?,
        },
    })
}
