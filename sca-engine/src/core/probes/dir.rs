//! Directory probe (C1 contribution to C3's `Dir` rule kind, §4.2).

use std::path::Path;

use walkdir::WalkDir;

use crate::api::types::{TargetList, Tristate};
use crate::core::pattern;

use super::file;

/// Best-effort NFS detection via `/proc/mounts` longest-prefix match. Yields
/// `false` unconditionally on platforms without that file.
pub fn is_nfs_mount(dir: &Path) -> bool {
    #[cfg(target_os = "linux")]
    {
        let dir = dir.to_string_lossy();
        let mounts = match std::fs::read_to_string("/proc/mounts") {
            Ok(m) => m,
            Err(_) => return false,
        };
        let mut best: Option<(&str, &str)> = None;
        for line in mounts.lines() {
            let mut fields = line.split_whitespace();
            let (_, mount_point, fstype) = match (fields.next(), fields.next(), fields.next()) {
                (Some(a), Some(b), Some(c)) => (a, b, c),
                _ => continue,
            };
            if dir.starts_with(mount_point)
                && best.map_or(true, |(mp, _)| mount_point.len() > mp.len())
            {
                best = Some((mount_point, fstype));
            }
        }
        best.map(|(_, fstype)| fstype.starts_with("nfs")).unwrap_or(false)
    }
    #[cfg(not(target_os = "linux"))]
    {
        let _ = dir;
        false
    }
}

pub fn check_dir(
    dirs: &[String],
    selector: Option<&str>,
    content_pattern: Option<&str>,
    skip_nfs: bool,
    targets: &mut TargetList,
) -> Tristate {
    let mut any_invalid = false;
    for d in dirs {
        targets.push(d.clone());
        let path = Path::new(d);
        if skip_nfs && is_nfs_mount(path) {
            any_invalid = true;
            continue;
        }
        match walk(path, selector, content_pattern) {
            Tristate::Found => return Tristate::Found,
            Tristate::Invalid => any_invalid = true,
            Tristate::NotFound => {}
        }
    }
    if any_invalid {
        Tristate::Invalid
    } else {
        Tristate::NotFound
    }
}

fn walk(dir: &Path, selector: Option<&str>, content_pattern: Option<&str>) -> Tristate {
    let mut any_invalid = false;
    let mut saw_any_entry = false;
    for entry in WalkDir::new(dir).min_depth(1).into_iter() {
        let entry = match entry {
            Ok(e) => e,
            Err(_) => {
                any_invalid = true;
                continue;
            }
        };
        if entry.file_type().is_dir() {
            continue;
        }
        saw_any_entry = true;
        let name = entry.file_name().to_string_lossy().to_string();
        let selected = match selector {
            None => true,
            Some(sel) => match sel.strip_prefix("r:") {
                Some(_) => pattern::matches(sel, &name) == Tristate::Found,
                None => name == sel,
            },
        };
        if !selected {
            continue;
        }
        match content_pattern {
            None => return Tristate::Found,
            Some(pat) => {
                let mut scratch = TargetList::default();
                let path_str = entry.path().to_string_lossy().to_string();
                match file::check_file(&[path_str], Some(pat), &mut scratch) {
                    Tristate::Found => return Tristate::Found,
                    Tristate::Invalid => any_invalid = true,
                    Tristate::NotFound => {}
                }
            }
        }
    }
    if !saw_any_entry && !dir.exists() {
        return Tristate::Invalid;
    }
    if any_invalid {
        Tristate::Invalid
    } else {
        Tristate::NotFound
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn selector_literal_match() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("audit.conf"), "max_log_file = 8\n").unwrap();
        let mut target = TargetList::default();
        let dirs = vec![dir.path().to_string_lossy().to_string()];
        assert_eq!(
            check_dir(&dirs, Some("audit.conf"), Some("r:max_log_file"), false, &mut target),
            Tristate::Found
        );
    }

    #[test]
    fn no_matching_entries_is_not_found() {
        let dir = TempDir::new().unwrap();
        let mut target = TargetList::default();
        let dirs = vec![dir.path().to_string_lossy().to_string()];
        assert_eq!(check_dir(&dirs, None, None, false, &mut target), Tristate::NotFound);
    }

    #[test]
    fn missing_dir_is_invalid() {
        let mut target = TargetList::default();
        let dirs = vec!["/no/such/dir/sca-engine-test".to_string()];
        assert_eq!(check_dir(&dirs, None, None, false, &mut target), Tristate::Invalid);
    }
}
