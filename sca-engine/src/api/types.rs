use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// The three-valued result of evaluating a single rule or check.
///
/// Negation flips `Found`/`NotFound`; `Invalid` is preserved (§4.1 of the
/// rule language: "any FOUND=1/NOT_FOUND=0 product", `Invalid` has no
/// numeric counterpart and is handled by the aggregator table directly).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tristate {
    Found,
    NotFound,
    Invalid,
}

impl Tristate {
    /// Negate, leaving `Invalid` unchanged.
    pub fn negate(self) -> Tristate {
        match self {
            Tristate::Found => Tristate::NotFound,
            Tristate::NotFound => Tristate::Found,
            Tristate::Invalid => Tristate::Invalid,
        }
    }

    /// Serialized verdict tag used for dedup comparison and integrity hashing.
    /// `Invalid` serializes to the empty string.
    pub fn result_tag(self) -> &'static str {
        match self {
            Tristate::Found => "passed",
            Tristate::NotFound => "failed",
            Tristate::Invalid => "",
        }
    }
}

/// Aggregation mode combining rule tri-states into a check verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    All,
    Any,
    None,
}

impl Condition {
    /// Parse a condition spelling, folding the deprecated aliases
    /// `any required` / `all required` into `Any`/`All`.
    pub fn parse(s: &str) -> Option<Condition> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" | "all required" => Some(Condition::All),
            "any" | "any required" => Some(Condition::Any),
            "none" => Some(Condition::None),
            _ => None,
        }
    }
}

/// A single probe invocation, already parsed from its rule literal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleKind {
    File {
        paths: Vec<String>,
        pattern: Option<String>,
    },
    Dir {
        dirs: Vec<String>,
        selector: Option<String>,
        pattern: Option<String>,
    },
    Process {
        pattern: String,
    },
    Registry {
        key: String,
        option: Option<String>,
        value_pattern: Option<String>,
    },
    Command {
        cmdline: String,
        pattern: Option<String>,
    },
}

/// A single rule belonging to a check: a probe invocation plus a negate flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub kind: RuleKind,
    pub negate: bool,
    /// Original literal, retained for the check envelope's `rules` field.
    pub literal: String,
}

/// Compliance cross-reference attached to a check, e.g. `{cis: "1.1.1"}`.
pub type Compliance = BTreeMap<String, String>;

/// One atomic boolean question within a policy.
#[derive(Debug, Clone)]
pub struct Check {
    pub id: u32,
    pub title: String,
    pub description: Option<String>,
    pub rationale: Option<String>,
    pub remediation: Option<String>,
    pub compliance: Compliance,
    pub references: Vec<String>,
    pub condition: Condition,
    pub rules: Vec<Rule>,
}

/// A loaded, validated policy document.
#[derive(Debug, Clone)]
pub struct Policy {
    pub policy_id: String,
    pub name: String,
    pub description: Option<String>,
    pub file: PathBuf,
    pub references: Vec<String>,
    /// Requirement check evaluated before the policy's checks; `None` means
    /// the policy has no gating requirement.
    pub requirements: Option<Check>,
    pub checks: Vec<Check>,
    pub variables: BTreeMap<String, String>,
    /// Whether this policy document originated from a remote source,
    /// gating `Command` rules under `remote_commands` (§4.2).
    pub remote: bool,
}

/// Result of evaluating one check, before event serialization.
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub check_id: u32,
    pub verdict: Tristate,
    /// Human-readable reason, populated when `verdict == Invalid`.
    pub reason: Option<String>,
    /// Concrete targets exercised by the rules (file paths, directories,
    /// process pattern, registry key, command line), deduplicated in
    /// insertion order and capped at 255 entries per §10.5.
    pub targets: TargetLists,
}

/// Per-check, per-kind target buffers used to populate the check envelope's
/// `file`/`directory`/`process`/`registry`/`command` fields.
#[derive(Debug, Clone, Default)]
pub struct TargetLists {
    pub file: TargetList,
    pub directory: TargetList,
    pub process: TargetList,
    pub registry: TargetList,
    pub command: TargetList,
}

/// An ordered, deduplicated, bounded list of concrete rule targets.
#[derive(Debug, Clone, Default)]
pub struct TargetList {
    items: Vec<String>,
}

/// Targets beyond this count are dropped silently (logged once per check).
pub const TARGET_LIST_CAP: usize = 255;

impl TargetList {
    pub fn push(&mut self, item: impl Into<String>) -> bool {
        let item = item.into();
        if self.items.contains(&item) {
            return true;
        }
        if self.items.len() >= TARGET_LIST_CAP {
            return false;
        }
        self.items.push(item);
        true
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn joined(&self) -> Option<String> {
        if self.items.is_empty() {
            None
        } else {
            Some(self.items.join(","))
        }
    }
}

/// Per-scan summary counters and integrity evidence (§3 Summary).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Summary {
    pub scan_id: i64,
    pub name: String,
    pub policy_id: String,
    pub file: String,
    pub description: Option<String>,
    pub references: Option<String>,
    pub passed: u32,
    pub failed: u32,
    pub invalid: u32,
    pub total_checks: u32,
    pub score: f64,
    pub start_time: i64,
    pub end_time: i64,
    pub hash: String,
    pub hash_file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_scan: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub force_alert: Option<String>,
}

impl Summary {
    pub fn compute_score(passed: u32, failed: u32) -> f64 {
        if passed + failed == 0 {
            0.0
        } else {
            (passed as f64 / (passed + failed) as f64) * 100.0
        }
    }
}

/// `{policy_index, first_scan}`, pushed onto the dump queue (§3, §4.7).
#[derive(Debug, Clone, Copy)]
pub struct DumpRequest {
    pub policy_index: usize,
    pub first_scan: bool,
}

impl fmt::Display for Tristate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Tristate::Found => "FOUND",
            Tristate::NotFound => "NOT_FOUND",
            Tristate::Invalid => "INVALID",
        };
        write!(f, "{s}")
    }
}
