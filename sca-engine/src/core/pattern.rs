//! Minterm-conjunction pattern matcher (C2, §4.1).

use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};

use regex::Regex;

use crate::api::types::Tristate;

/// Global cache of compiled regexes keyed by source pattern, mirroring the
/// `LazyLock<Regex>` static-cache idiom used for fixed patterns elsewhere in
/// this codebase, generalized here to arbitrary policy-supplied patterns.
fn regex_cache() -> &'static Mutex<HashMap<String, Regex>> {
    static CACHE: OnceLock<Mutex<HashMap<String, Regex>>> = OnceLock::new();
    CACHE.get_or_init(|| Mutex::new(HashMap::new()))
}

fn compiled(pattern: &str) -> Result<Regex, regex::Error> {
    let mut cache = regex_cache().lock().unwrap();
    if let Some(re) = cache.get(pattern) {
        return Ok(re.clone());
    }
    let re = Regex::new(pattern)?;
    cache.insert(pattern.to_string(), re.clone());
    Ok(re)
}

/// Evaluate a full pattern (conjunction of ` && `-separated minterms)
/// against `candidate`. Returns FOUND iff every minterm (after its own
/// negation) matches; never returns INVALID — a malformed regex minterm is
/// treated as non-matching (NOT_FOUND contribution), consistent with the
/// rule-level "caught at parse time, never propagates above a check"
/// error-handling rule (§7).
pub fn matches(pattern: &str, candidate: &str) -> Tristate {
    for raw_minterm in pattern.split(" && ") {
        let (negate, minterm) = match raw_minterm.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, raw_minterm),
        };
        let mut hit = minterm_matches(minterm, candidate);
        if negate {
            hit = !hit;
        }
        if !hit {
            return Tristate::NotFound;
        }
    }
    Tristate::Found
}

fn minterm_matches(minterm: &str, candidate: &str) -> bool {
    if let Some(rest) = minterm.strip_prefix("=:") {
        return candidate.eq_ignore_ascii_case(rest);
    }
    if let Some(rest) = minterm.strip_prefix("r:") {
        return compiled(rest).map(|re| re.is_match(candidate)).unwrap_or(false);
    }
    if let Some(rest) = minterm.strip_prefix("<:") {
        return candidate < rest;
    }
    if let Some(rest) = minterm.strip_prefix(">:") {
        return candidate > rest;
    }
    let expanded = expand_env(minterm);
    candidate.eq_ignore_ascii_case(&expanded)
}

/// Expand `${VAR}`/`$VAR`-style environment references. Only applied to the
/// bare (no-prefix) minterm form, on platforms where such expansion applies
/// (§4.1); a reference to an unset variable is left untouched.
fn expand_env(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '$' {
            let mut name = String::new();
            let braced = chars.peek() == Some(&'{');
            if braced {
                chars.next();
            }
            while let Some(&next) = chars.peek() {
                if next.is_alphanumeric() || next == '_' {
                    name.push(next);
                    chars.next();
                } else {
                    break;
                }
            }
            if braced && chars.peek() == Some(&'}') {
                chars.next();
            }
            match std::env::var(&name) {
                Ok(v) => out.push_str(&v),
                Err(_) => {
                    out.push('$');
                    out.push_str(&name);
                }
            }
        } else {
            out.push(c);
        }
    }
    out
}
