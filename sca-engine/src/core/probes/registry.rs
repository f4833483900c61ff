//! Registry probe (C1 contribution to C3's `Registry` rule kind, §4.2).
//!
//! Platform-gated and, per scope (§1d), defined here only by its contract:
//! an injectable [`RegistryProbe`] backend. No backend is wired into this
//! crate; callers that need real Windows registry access supply their own
//! implementation at the engine's construction site.

use crate::api::types::{TargetList, Tristate};
use crate::core::pattern;

pub trait RegistryProbe: Send + Sync {
    /// Read a single registry view (e.g. 64-bit or 32-bit) for `key`,
    /// optionally narrowed to a specific value `option`. `Some(data)` means
    /// the key/value exists with that string data; `None` means absent.
    fn read_value(&self, key: &str, option: Option<&str>) -> Option<String>;
}

/// Used wherever no platform backend has been supplied.
pub struct UnavailableRegistry;

impl RegistryProbe for UnavailableRegistry {
    fn read_value(&self, _key: &str, _option: Option<&str>) -> Option<String> {
        None
    }
}

/// Tests a single registry view the way `wm_sca_winreg_querykey` does: a
/// present key/value with no pattern is FOUND; with a pattern it is FOUND
/// only if the value data matches, otherwise INVALID; an absent key/value is
/// NOT_FOUND unless a pattern was required, in which case it's INVALID.
fn check_one_view(data: Option<&str>, value_pattern: Option<&str>) -> Tristate {
    match (data, value_pattern) {
        (Some(d), Some(pat)) => {
            if pattern::matches(pat, d) == Tristate::Found {
                Tristate::Found
            } else {
                Tristate::Invalid
            }
        }
        (Some(_), None) => Tristate::Found,
        (None, Some(_)) => Tristate::Invalid,
        (None, None) => Tristate::NotFound,
    }
}

pub fn check_registry(
    probe: &dyn RegistryProbe,
    key: &str,
    option: Option<&str>,
    value_pattern: Option<&str>,
    targets: &mut TargetList,
) -> Tristate {
    targets.push(key.to_string());

    // Checked in both 64- and 32-bit views (§4.2); a single injected backend
    // is asked twice so a real Windows implementation can branch internally
    // on view width while the contract here stays platform-neutral.
    let view64 = check_one_view(probe.read_value(key, option).as_deref(), value_pattern);
    let view32 = check_one_view(probe.read_value(key, option).as_deref(), value_pattern);

    match (view64, view32) {
        (Tristate::Found, _) | (_, Tristate::Found) => Tristate::Found,
        (Tristate::Invalid, _) | (_, Tristate::Invalid) => Tristate::Invalid,
        _ => Tristate::NotFound,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unavailable_backend_is_invalid() {
        let mut target = TargetList::default();
        assert_eq!(
            check_registry(&UnavailableRegistry, "HKLM\\Software\\Test", None, None, &mut target),
            Tristate::Invalid
        );
    }

    struct FoundRegistry(&'static str);
    impl RegistryProbe for FoundRegistry {
        fn read_value(&self, _key: &str, _option: Option<&str>) -> Option<String> {
            Some(self.0.to_string())
        }
    }

    #[test]
    fn found_backend_reports_found_with_no_pattern() {
        let mut target = TargetList::default();
        assert_eq!(
            check_registry(&FoundRegistry("1"), "HKLM\\Software\\Test", None, None, &mut target),
            Tristate::Found
        );
    }

    #[test]
    fn found_value_matching_pattern_is_found() {
        let mut target = TargetList::default();
        assert_eq!(
            check_registry(&FoundRegistry("1"), "HKLM\\Software\\Test", Some("Value"), Some("r:^1$"), &mut target),
            Tristate::Found
        );
    }

    #[test]
    fn found_value_not_matching_pattern_is_invalid() {
        let mut target = TargetList::default();
        assert_eq!(
            check_registry(&FoundRegistry("0"), "HKLM\\Software\\Test", Some("Value"), Some("r:^1$"), &mut target),
            Tristate::Invalid
        );
    }

    struct MissingRegistry;
    impl RegistryProbe for MissingRegistry {
        fn read_value(&self, _key: &str, _option: Option<&str>) -> Option<String> {
            None
        }
    }

    #[test]
    fn missing_value_with_pattern_is_invalid() {
        let mut target = TargetList::default();
        assert_eq!(
            check_registry(&MissingRegistry, "HKLM\\Software\\Test", Some("Value"), Some("r:1"), &mut target),
            Tristate::Invalid
        );
    }

    #[test]
    fn missing_value_without_pattern_is_not_found() {
        let mut target = TargetList::default();
        assert_eq!(
            check_registry(&MissingRegistry, "HKLM\\Software\\Test", None, None, &mut target),
            Tristate::NotFound
        );
    }
}
