//! Command probe (C1 contribution to C3's `Command` rule kind, §4.2).
//!
//! The only probe with a hard timeout (§5): execution runs on a detached
//! thread and the result is awaited with a deadline, so a wedged child
//! process cannot stall the scan loop beyond `commands_timeout`.

use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::time::Duration;

use crate::api::types::{TargetList, Tristate};
use crate::core::pattern;

pub struct CommandOutcome {
    pub tristate: Tristate,
    pub reason: Option<String>,
}

#[allow(clippy::too_many_arguments)]
pub fn check_command(
    cmdline: &str,
    content_pattern: Option<&str>,
    timeout: Duration,
    remote: bool,
    remote_commands_enabled: bool,
    targets: &mut TargetList,
) -> CommandOutcome {
    targets.push(cmdline.to_string());

    if remote && !remote_commands_enabled {
        return CommandOutcome {
            tristate: Tristate::Invalid,
            reason: Some(format!("command '{cmdline}' blocked: remote_commands disabled")),
        };
    }

    let (tx, rx) = mpsc::channel();
    let owned = cmdline.to_string();
    std::thread::spawn(move || {
        let output = Command::new("sh")
            .arg("-c")
            .arg(&owned)
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .output();
        let _ = tx.send(output);
    });

    match rx.recv_timeout(timeout) {
        Ok(Ok(output)) => {
            if !output.status.success() {
                return CommandOutcome {
                    tristate: Tristate::Invalid,
                    reason: Some(format!("command '{cmdline}' exited with non-zero status")),
                };
            }
            let stdout = String::from_utf8_lossy(&output.stdout).to_string();
            match content_pattern {
                None => CommandOutcome {
                    tristate: Tristate::Found,
                    reason: None,
                },
                Some(pat) => {
                    if stdout.trim().is_empty() {
                        return CommandOutcome {
                            tristate: Tristate::NotFound,
                            reason: None,
                        };
                    }
                    for line in stdout.lines() {
                        if pattern::matches(pat, line) == Tristate::Found {
                            return CommandOutcome {
                                tristate: Tristate::Found,
                                reason: None,
                            };
                        }
                    }
                    CommandOutcome {
                        tristate: Tristate::NotFound,
                        reason: None,
                    }
                }
            }
        }
        Ok(Err(e)) => CommandOutcome {
            tristate: Tristate::Invalid,
            reason: Some(format!("command '{cmdline}' failed to execute: {e}")),
        },
        Err(_) => CommandOutcome {
            tristate: Tristate::Invalid,
            reason: Some(format!("command '{cmdline}' timed out after {:?}", timeout)),
        },
    }
}
