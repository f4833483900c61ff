//! File probe (C1 contribution to C3's `File` rule kind, §4.2).

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use crate::api::types::{TargetList, Tristate};
use crate::core::pattern;

pub fn check_file(paths: &[String], content_pattern: Option<&str>, targets: &mut TargetList) -> Tristate {
    for p in paths {
        targets.push(p.clone());
    }

    match content_pattern {
        None => check_existence(paths),
        Some(pat) => check_contents(paths, pat),
    }
}

fn check_existence(paths: &[String]) -> Tristate {
    let mut any_invalid = false;
    for p in paths {
        match fs::metadata(Path::new(p)) {
            Ok(meta) if meta.is_file() => return Tristate::Found,
            Ok(_) => any_invalid = true,
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(_) => any_invalid = true,
        }
    }
    if any_invalid {
        Tristate::Invalid
    } else {
        Tristate::NotFound
    }
}

fn check_contents(paths: &[String], content_pattern: &str) -> Tristate {
    let mut any_invalid = false;
    for p in paths {
        match fs::read_to_string(Path::new(p)) {
            Ok(contents) => {
                for line in contents.lines() {
                    let line = line.trim_end_matches('\r');
                    if pattern::matches(content_pattern, line) == Tristate::Found {
                        return Tristate::Found;
                    }
                }
            }
            Err(_) => any_invalid = true,
        }
    }
    if any_invalid {
        Tristate::Invalid
    } else {
        Tristate::NotFound
    }
}
