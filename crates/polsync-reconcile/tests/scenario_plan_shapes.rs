//! Scenario: plan shapes for the canonical rule-base transitions.
//!
//! # Invariants under test
//!
//! 1. Empty remote: creates only, chained after each other, no moves.
//! 2. Single field change: exactly one update, nothing else.
//! 3. Swapped pair: exactly one move, no field updates.
//! 4. Empty declared: deletes only, one per remote rule, remote order.
//! 5. Identical lists: empty plan.
//! 6. Plan ordering: deletes, creates, updates, moves.
//!
//! All tests are pure in-process; no device required.

use polsync_model::{Action, Rule, RuleList};
use polsync_reconcile::{diff, simulate, OpKind, PlanOp};

fn rule(name: &str, action: Action) -> Rule {
    Rule::new(name, action)
}

fn list(rules: &[Rule]) -> RuleList {
    RuleList::new(rules.to_vec())
}

// ---------------------------------------------------------------------------
// 1. Empty remote
// ---------------------------------------------------------------------------

#[test]
fn empty_remote_creates_in_declared_order() {
    let a = rule("A", Action::Allow);
    let b = rule("B", Action::Deny);
    let declared = list(&[a.clone(), b.clone()]);

    let plan = diff(&declared, &RuleList::empty());

    assert_eq!(
        plan.ops(),
        &[
            PlanOp::Create {
                rule: a,
                after: None
            },
            PlanOp::Create {
                rule: b,
                after: Some("A".to_string())
            },
        ]
    );

    let after = simulate(&RuleList::empty(), &plan).unwrap();
    assert_eq!(after.names(), vec!["A", "B"]);
}

// ---------------------------------------------------------------------------
// 2. Single field change
// ---------------------------------------------------------------------------

#[test]
fn action_change_is_a_single_update() {
    let remote = list(&[rule("A", Action::Allow), rule("B", Action::Deny)]);
    let declared = list(&[rule("A", Action::Drop), rule("B", Action::Deny)]);

    let plan = diff(&declared, &remote);

    assert_eq!(plan.len(), 1, "plan: {:?}", plan);
    match &plan.ops()[0] {
        PlanOp::Update {
            name,
            rule,
            changes,
        } => {
            assert_eq!(name, "A");
            assert_eq!(rule.action, Action::Drop);
            assert_eq!(changes.len(), 1);
            assert_eq!(changes[0].field, "action");
        }
        other => panic!("expected update, got {other}"),
    }
}

#[test]
fn description_and_address_changes_are_one_update_per_rule() {
    let mut a1 = rule("A", Action::Allow);
    a1.description = "first description".into();
    a1.source_address = vec!["10.2.2.2".into()];
    let mut a2 = a1.clone();
    a2.description = "second description".into();
    a2.source_address = vec!["10.4.4.4".into()];

    let plan = diff(&list(&[a2]), &list(&[a1]));
    assert_eq!(plan.count(OpKind::Update), 1);
    assert_eq!(plan.len(), 1);
}

// ---------------------------------------------------------------------------
// 3. Swapped pair
// ---------------------------------------------------------------------------

#[test]
fn swapped_pair_is_one_move_and_converges() {
    let a = rule("A", Action::Allow);
    let b = rule("B", Action::Allow);
    let remote = list(&[a.clone(), b.clone()]);
    let declared = list(&[b, a]);

    let plan = diff(&declared, &remote);

    assert_eq!(plan.len(), 1);
    assert_eq!(plan.count(OpKind::Move), 1);
    assert_eq!(simulate(&remote, &plan).unwrap(), declared);
}

// ---------------------------------------------------------------------------
// 4. Full teardown
// ---------------------------------------------------------------------------

#[test]
fn empty_declared_deletes_every_remote_rule() {
    let remote = list(&[
        rule("A", Action::Allow),
        rule("B", Action::Deny),
        rule("C", Action::Drop),
    ]);

    let plan = diff(&RuleList::empty(), &remote);

    let deleted: Vec<&str> = plan.iter().map(|op| op.rule_name()).collect();
    assert_eq!(deleted, vec!["A", "B", "C"]);
    assert!(plan.iter().all(|op| op.kind() == OpKind::Delete));
    assert!(simulate(&remote, &plan).unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// 5. No-op
// ---------------------------------------------------------------------------

#[test]
fn identical_lists_produce_empty_plan() {
    let rules = list(&[rule("A", Action::Allow), rule("B", Action::Deny)]);
    assert!(diff(&rules, &rules.clone()).is_empty());
}

// ---------------------------------------------------------------------------
// 6. Mixed transition ordering
// ---------------------------------------------------------------------------

#[test]
fn mixed_plan_is_ordered_delete_create_update_move() {
    let remote = list(&[
        rule("old", Action::Deny),
        rule("A", Action::Allow),
        rule("B", Action::Allow),
        rule("C", Action::Allow),
    ]);
    let declared = list(&[
        rule("C", Action::Allow),
        rule("new", Action::Allow),
        rule("A", Action::ResetBoth),
        rule("B", Action::Allow),
    ]);

    let plan = diff(&declared, &remote);
    let kinds: Vec<OpKind> = plan.iter().map(|op| op.kind()).collect();

    let mut sorted = kinds.clone();
    sorted.sort();
    assert_eq!(kinds, sorted, "ops must be grouped delete < create < update < move");

    assert_eq!(plan.summary().deletes, 1);
    assert_eq!(plan.summary().creates, 1);
    assert_eq!(plan.summary().updates, 1);
    assert_eq!(simulate(&remote, &plan).unwrap(), declared);
}

#[test]
fn create_anchored_on_a_rule_that_moves_is_repaired() {
    // remote [A, B]; declared [B, N, A]. N is created after B while B is still
    // behind A; the move pass must still converge.
    let a = rule("A", Action::Allow);
    let b = rule("B", Action::Allow);
    let n = rule("N", Action::Allow);
    let remote = list(&[a.clone(), b.clone()]);
    let declared = list(&[b, n, a]);

    let plan = diff(&declared, &remote);
    assert_eq!(plan.count(OpKind::Create), 1);
    assert_eq!(plan.count(OpKind::Move), 1);
    assert_eq!(simulate(&remote, &plan).unwrap(), declared);
}
