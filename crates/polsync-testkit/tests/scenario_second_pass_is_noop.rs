//! Scenario: re-running a converged pass changes nothing.
//!
//! # Invariants under test
//! - The second pass with the same declared list plans nothing.
//! - It issues reads only, never a write.
//! - `plan` reports drift without writing.

use polsync_execution::RuleBaseUnit;
use polsync_model::{Action, RuleList};
use polsync_reconcile::{DiffOptions, ListOrder, OpKind};
use polsync_testkit::{allow_all, key, rule, rules, FaultyDevice};

#[test]
fn second_pass_is_empty_and_read_only() {
    let dev = FaultyDevice::new();
    let mut unit = RuleBaseUnit::new(&dev, key());
    let declared = rules(&[
        ("A", Action::Allow),
        ("B", Action::Deny),
        ("C", Action::Drop),
    ]);

    unit.update(&declared).unwrap();
    dev.clear_calls();

    let again = unit.update(&declared).unwrap();
    assert!(!again.changed());
    assert!(dev.writes().is_empty(), "{:?}", dev.writes());
}

#[test]
fn plan_reports_drift_without_writing() {
    let dev = FaultyDevice::new();
    let mut unit = RuleBaseUnit::new(&dev, key());
    let declared = allow_all(&["A", "B", "C"]);
    unit.update(&declared).unwrap();

    // Someone moves C to the head behind our back.
    dev.inner()
        .seed(&key(), allow_all(&["C", "A", "B"]).into_rules());
    dev.clear_calls();

    let plan = unit.plan(&declared).unwrap();
    assert_eq!(plan.count(OpKind::Move), 1);
    assert!(dev.writes().is_empty());
    assert_eq!(dev.inner().names(&key()), vec!["C", "A", "B"]);
}

#[test]
fn canonical_mode_ignores_list_order_inside_fields() {
    let dev = FaultyDevice::new();
    let mut remote = rule("A", Action::Allow);
    remote.source_address = vec!["10.0.0.0/8".into(), "192.168.0.0/16".into()];
    dev.inner().seed(&key(), vec![remote.clone()]);

    let mut declared = remote.clone();
    declared.source_address.reverse();
    let declared: RuleList = vec![declared].into();

    let strict = RuleBaseUnit::new(&dev, key());
    assert_eq!(strict.plan(&declared).unwrap().count(OpKind::Update), 1);

    let canonical = RuleBaseUnit::new(&dev, key()).with_diff_options(DiffOptions {
        list_order: ListOrder::Canonical,
    });
    assert!(canonical.plan(&declared).unwrap().is_empty());
}
