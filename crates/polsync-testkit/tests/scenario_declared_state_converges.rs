//! Scenario: a declared rule base converges on the device end to end.
//!
//! # Invariants under test
//! - Empty remote: creates only, each anchored on its declared predecessor.
//! - One changed field: exactly one update, no reorder.
//! - Swapped pair: exactly one move, no field updates.
//! - After every pass the device holds exactly the declared list.

use polsync_execution::RuleBaseUnit;
use polsync_model::Action;
use polsync_reconcile::{OpKind, PlanOp};
use polsync_testkit::{key, rules, Call, FaultyDevice};

#[test]
fn empty_remote_creates_in_declared_order() {
    let dev = FaultyDevice::new();
    let mut unit = RuleBaseUnit::new(&dev, key());

    let declared = rules(&[("A", Action::Allow), ("B", Action::Deny)]);
    let report = unit.create(&declared).unwrap();

    assert_eq!(
        report.plan.ops(),
        &[
            PlanOp::Create {
                rule: declared.rules()[0].clone(),
                after: None,
            },
            PlanOp::Create {
                rule: declared.rules()[1].clone(),
                after: Some("A".to_string()),
            },
        ]
    );
    assert_eq!(dev.inner().names(&key()), vec!["A", "B"]);
    assert_eq!(report.observed, declared);
    assert_eq!(unit.last_applied(), Some(&declared));
}

#[test]
fn action_change_is_a_single_update() {
    let dev = FaultyDevice::new();
    dev.inner().seed(
        &key(),
        rules(&[("A", Action::Allow), ("B", Action::Deny)]).into_rules(),
    );
    let mut unit = RuleBaseUnit::new(&dev, key());

    let declared = rules(&[("A", Action::Drop), ("B", Action::Deny)]);
    let report = unit.update(&declared).unwrap();

    assert_eq!(report.plan.len(), 1);
    match &report.plan.ops()[0] {
        PlanOp::Update { name, changes, .. } => {
            assert_eq!(name, "A");
            let fields: Vec<&str> = changes.iter().map(|c| c.field.as_str()).collect();
            assert_eq!(fields, vec!["action"]);
            assert_eq!(changes[0].declared, "drop");
            assert_eq!(changes[0].remote, "allow");
        }
        other => panic!("expected update, got {other}"),
    }
    assert_eq!(
        dev.writes(),
        vec![Call::Update {
            name: "A".to_string()
        }]
    );
    assert_eq!(dev.inner().rules(&key()), declared.into_rules());
}

#[test]
fn swapped_pair_is_one_move() {
    let dev = FaultyDevice::new();
    dev.inner().seed(
        &key(),
        rules(&[("A", Action::Allow), ("B", Action::Deny)]).into_rules(),
    );
    let mut unit = RuleBaseUnit::new(&dev, key());

    let declared = rules(&[("B", Action::Deny), ("A", Action::Allow)]);
    let report = unit.update(&declared).unwrap();

    assert_eq!(report.plan.count(OpKind::Move), 1);
    assert_eq!(report.plan.len(), 1);
    assert_eq!(dev.writes().len(), 1);
    assert_eq!(dev.inner().names(&key()), vec!["B", "A"]);
}

#[test]
fn mixed_changes_converge_in_one_pass() {
    let dev = FaultyDevice::new();
    dev.inner().seed(
        &key(),
        rules(&[
            ("old", Action::Allow),
            ("web", Action::Allow),
            ("dns", Action::Allow),
            ("ssh", Action::Allow),
        ])
        .into_rules(),
    );
    let mut unit = RuleBaseUnit::new(&dev, key());

    let declared = rules(&[
        ("ssh", Action::Deny),
        ("new", Action::Allow),
        ("web", Action::Allow),
        ("dns", Action::Allow),
    ]);
    let report = unit.update(&declared).unwrap();

    let s = report.plan.summary();
    assert_eq!((s.deletes, s.creates, s.updates), (1, 1, 1));
    assert_eq!(dev.inner().rules(&key()), declared.rules().to_vec());
}

#[test]
fn create_over_existing_rules_converges_instead_of_overwriting() {
    let dev = FaultyDevice::new();
    dev.inner().seed(
        &key(),
        rules(&[("A", Action::Allow), ("stray", Action::Deny)]).into_rules(),
    );
    let mut unit = RuleBaseUnit::new(&dev, key());

    let declared = rules(&[("A", Action::Allow)]);
    let report = unit.create(&declared).unwrap();

    // Only the stray rule is touched; A is left alone.
    assert_eq!(
        dev.writes(),
        vec![Call::Delete {
            name: "stray".to_string()
        }]
    );
    assert_eq!(report.observed, declared);
}
