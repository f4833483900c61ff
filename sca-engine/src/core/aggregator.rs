//! Check aggregator (C4, §4.3).

use crate::api::types::{Condition, Tristate};

/// Combine a check's rule verdicts into a single check verdict under its
/// aggregation condition. Not short-circuited by INVALID: a later FOUND or
/// NOT_FOUND can still resolve the verdict (§4.3).
///
/// An empty verdict list (every rule soft-skipped, §9b) aggregates as if all
/// rules vacuously passed under ALL/NONE and vacuously failed under ANY —
/// the documented hazard where an all-missing-variables check silently
/// reports FOUND under ALL.
pub fn aggregate(condition: Condition, verdicts: &[Tristate]) -> Tristate {
    match condition {
        Condition::All => {
            let mut any_invalid = false;
            for v in verdicts {
                match v {
                    Tristate::NotFound => return Tristate::NotFound,
                    Tristate::Invalid => any_invalid = true,
                    Tristate::Found => {}
                }
            }
            if any_invalid {
                Tristate::Invalid
            } else {
                Tristate::Found
            }
        }
        Condition::Any => {
            let mut any_invalid = false;
            for v in verdicts {
                match v {
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
        Condition::None => {
            let mut any_invalid = false;
            for v in verdicts {
                match v {
                    Tristate::Found => return Tristate::NotFound,
                    Tristate::Invalid => any_invalid = true,
                    Tristate::NotFound => {}
                }
            }
            if any_invalid {
                Tristate::Invalid
            } else {
                Tristate::Found
            }
        }
    }
}
