//! Scenario: a write fails mid-plan, and re-running finishes the job.
//!
//! # Invariants under test
//! - Execution halts at the first failed op; later ops are not attempted.
//! - The error names the failed op, its position and the applied count.
//! - Already-applied ops stay applied (no rollback).
//! - A re-run plans only what is still missing and converges.
//! - A read-back failure after a fully applied plan is reported as such,
//!   with the applied count, not as a pre-write read failure.

use polsync_execution::{ReconcileError, RuleBaseUnit};
use polsync_model::Action;
use polsync_reconcile::OpKind;
use polsync_testkit::{allow_all, key, rules, FaultyDevice};

#[test]
fn failure_reports_position_and_rerun_converges() {
    let dev = FaultyDevice::new();
    dev.inner()
        .seed(&key(), allow_all(&["gone", "A"]).into_rules());
    let mut unit = RuleBaseUnit::new(&dev, key());

    // Plan: delete gone, create B, create C, update A.
    let declared = rules(&[
        ("A", Action::Deny),
        ("B", Action::Allow),
        ("C", Action::Allow),
    ]);
    dev.fail_write_at(2);

    let err = unit.update(&declared).unwrap_err();
    assert!(err.is_retryable());
    let failure = match err {
        ReconcileError::Execution(f) => f,
        other => panic!("expected execution failure, got {other}"),
    };
    assert_eq!(failure.position, 2);
    assert_eq!(failure.applied, 2);
    assert_eq!(failure.total, 4);
    assert_eq!(failure.op.rule_name(), "C");
    assert!(failure.to_string().contains("REMOTE_CALL_FAILED"));

    // Delete and first create stayed applied; nothing after the failure ran.
    assert_eq!(dev.inner().names(&key()), vec!["A", "B"]);
    assert_eq!(dev.writes().len(), 3);
    assert!(unit.last_applied().is_none());

    dev.clear_calls();
    let report = unit.update(&declared).unwrap();

    let s = report.plan.summary();
    assert_eq!(s.deletes, 0);
    assert_eq!(s.creates, 1, "only C is still missing");
    assert_eq!(report.plan.count(OpKind::Update), 1);
    assert_eq!(report.observed, declared);
}

#[test]
fn failed_read_writes_nothing() {
    let dev = FaultyDevice::new();
    let mut unit = RuleBaseUnit::new(&dev, key());
    dev.fail_next_list();

    let err = unit.update(&allow_all(&["A"])).unwrap_err();
    match &err {
        ReconcileError::Remote { call, key, .. } => {
            assert_eq!(*call, "list");
            assert_eq!(key, "vsys1:rulebase");
        }
        other => panic!("expected remote read failure, got {other}"),
    }
    assert!(dev.writes().is_empty());
}

#[test]
fn read_back_failure_after_apply_keeps_evidence() {
    let dev = FaultyDevice::new();
    let mut unit = RuleBaseUnit::new(&dev, key());
    // First list reads the empty rule base, the read-back list fails.
    dev.fail_list_at(1);

    let err = unit.update(&allow_all(&["A", "B"])).unwrap_err();
    assert!(err.is_retryable());
    assert!(err.to_string().contains("VERIFY_FAILED"), "{err}");
    match &err {
        ReconcileError::VerifyFailed {
            key,
            applied,
            summary,
            cause,
        } => {
            assert_eq!(key, "vsys1:rulebase");
            assert_eq!(*applied, 2);
            assert_eq!(summary.creates, 2);
            assert!(matches!(**cause, ReconcileError::Remote { call: "list", .. }));
        }
        other => panic!("expected verify failure, got {other}"),
    }

    assert_eq!(dev.inner().names(&key()), vec!["A", "B"]);
    assert!(unit.last_applied().is_none());

    // Nothing is left to do once the device answers again.
    dev.clear_calls();
    let report = unit.update(&allow_all(&["A", "B"])).unwrap();
    assert!(!report.changed());
    assert!(dev.writes().is_empty());
}
