//! Scenario: a plan executed on the offline device lands exactly where
//! the in-memory replay says it will.
//!
//! # Invariants under test
//! - `simulate(remote, plan)` equals the device state after executing `plan`.
//! - Both equal the declared list (one pass converges).
//! - Every op the diff emits is accepted by the strict device.

use polsync_device_offline::OfflineDevice;
use polsync_execution::PlanExecutor;
use polsync_model::{Action, CompositeKey, Rule, RuleBaseSelector, RuleList};
use polsync_reconcile::{diff, simulate};

fn key() -> CompositeKey {
    CompositeKey::new("vsys1", RuleBaseSelector::Default).unwrap()
}

fn list(entries: &[(&str, Action)]) -> RuleList {
    entries.iter().map(|(n, a)| Rule::new(*n, *a)).collect()
}

fn replay_matches_device(remote: RuleList, declared: RuleList) {
    let dev = OfflineDevice::new();
    dev.seed(&key(), remote.rules().to_vec());

    let plan = diff(&declared, &remote);
    let predicted = simulate(&remote, &plan).unwrap();

    let report = PlanExecutor::new(&dev).execute(&key(), &plan).unwrap();
    assert_eq!(report.applied, plan.len());

    let actual = RuleList::new(dev.rules(&key()));
    assert_eq!(actual, predicted, "plan: {:?}", plan.ops());
    assert_eq!(actual, declared);
}

#[test]
fn create_into_empty_device() {
    replay_matches_device(
        RuleList::empty(),
        list(&[("A", Action::Allow), ("B", Action::Deny)]),
    );
}

#[test]
fn reorder_with_field_change() {
    replay_matches_device(
        list(&[("C", Action::Allow), ("A", Action::Allow), ("B", Action::Allow)]),
        list(&[("A", Action::Allow), ("B", Action::Drop), ("C", Action::Allow)]),
    );
}

#[test]
fn mixed_delete_create_and_move() {
    replay_matches_device(
        list(&[
            ("old", Action::Allow),
            ("D", Action::Allow),
            ("B", Action::Allow),
            ("A", Action::Allow),
        ]),
        list(&[
            ("A", Action::Allow),
            ("new", Action::Deny),
            ("B", Action::Allow),
            ("D", Action::Allow),
        ]),
    );
}

#[test]
fn teardown_to_empty() {
    replay_matches_device(
        list(&[("A", Action::Allow), ("B", Action::Allow)]),
        RuleList::empty(),
    );
}
