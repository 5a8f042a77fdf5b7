//! Test support for polsync scenarios: a fault-injecting device, a call
//! log, and terse rule builders.

use polsync_model::{Action, CompositeKey, Rule, RuleBaseSelector, RuleList};

mod faulty;

pub use faulty::{Call, FaultyDevice};

/// `vsys1:rulebase`, the key most scenarios use.
pub fn key() -> CompositeKey {
    key_for("vsys1", RuleBaseSelector::Default)
}

/// Panics on an invalid container; test inputs only.
pub fn key_for(container: &str, selector: RuleBaseSelector) -> CompositeKey {
    match CompositeKey::new(container, selector) {
        Ok(k) => k,
        Err(e) => panic!("bad test key {container:?}: {e}"),
    }
}

pub fn rule(name: &str, action: Action) -> Rule {
    Rule::new(name, action)
}

/// Rule base from `(name, action)` pairs, in order.
pub fn rules(entries: &[(&str, Action)]) -> RuleList {
    entries.iter().map(|(n, a)| rule(n, *a)).collect()
}

/// Rule base of `allow` rules named by `names`, in order.
pub fn allow_all(names: &[&str]) -> RuleList {
    names.iter().map(|n| rule(n, Action::Allow)).collect()
}
