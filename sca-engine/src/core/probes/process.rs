//! Process probe (C1 contribution to C3's `Process` rule kind, §4.2).

use crate::api::types::{TargetList, Tristate};
use crate::core::pattern;

/// List running process command lines. Linux-only via `/proc`; other
/// platforms are a capability contract with no backend wired in here (§1d).
pub fn list_processes() -> Vec<String> {
    #[cfg(target_os = "linux")]
    {
        let mut out = Vec::new();
        let entries = match std::fs::read_dir("/proc") {
            Ok(e) => e,
            Err(_) => return out,
        };
        for entry in entries.flatten() {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if !name.chars().all(|c| c.is_ascii_digit()) {
                continue;
            }
            if let Ok(bytes) = std::fs::read(entry.path().join("cmdline")) {
                let cmdline = String::from_utf8_lossy(&bytes).replace('\0', " ");
                let cmdline = cmdline.trim();
                if !cmdline.is_empty() {
                    out.push(cmdline.to_string());
                    continue;
                }
            }
            if let Ok(comm) = std::fs::read_to_string(entry.path().join("comm")) {
                out.push(comm.trim().to_string());
            }
        }
        out
    }
    #[cfg(not(target_os = "linux"))]
    {
        Vec::new()
    }
}

pub fn check_process(process_pattern: &str, processes: &[String], targets: &mut TargetList) -> Tristate {
    targets.push(process_pattern.to_string());
    for p in processes {
        if pattern::matches(process_pattern, p) == Tristate::Found {
            return Tristate::Found;
        }
    }
    Tristate::NotFound
}
