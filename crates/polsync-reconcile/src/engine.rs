use std::collections::{BTreeMap, BTreeSet};

use polsync_model::{Rule, RuleList};
use serde_json::Value;

use crate::order::plan_moves;
use crate::{DiffOptions, FieldChange, ListOrder, Plan, PlanOp};

fn same_fields(declared: &Rule, remote: &Rule, list_order: ListOrder) -> bool {
    match list_order {
        ListOrder::Strict => polsync_model::equals(declared, remote),
        ListOrder::Canonical => declared.canonicalized() == remote.canonicalized(),
    }
}

/// Field-by-field evidence for an update, in field-name order.
///
/// Walks the rule's generic field view, so every field (including
/// `extra.*`) is covered without naming any of them here.
pub fn field_changes(declared: &Rule, remote: &Rule, list_order: ListOrder) -> Vec<FieldChange> {
    let (d, r) = match list_order {
        ListOrder::Strict => (declared.fields(), remote.fields()),
        ListOrder::Canonical => (
            declared.canonicalized().fields(),
            remote.canonicalized().fields(),
        ),
    };

    let keys: BTreeSet<&String> = d.keys().chain(r.keys()).collect();
    keys.into_iter()
        .filter_map(|k| {
            let dv = d.get(k).cloned().unwrap_or(Value::Null);
            let rv = r.get(k).cloned().unwrap_or(Value::Null);
            (dv != rv).then(|| FieldChange {
                field: k.clone(),
                declared: dv,
                remote: rv,
            })
        })
        .collect()
}

/// Diff with default options (strict list comparison).
pub fn diff(declared: &RuleList, remote: &RuleList) -> Plan {
    diff_with(declared, remote, &DiffOptions::default())
}

/// Deterministic diff of declared vs remote rule lists.
///
/// Both lists must have unique names (validated upstream). Output order:
/// 1) deletes, remote order
/// 2) creates, declared order, each placed after its declared predecessor
/// 3) updates, declared order
/// 4) moves, one left-to-right pass over declared order
///
/// Field changes and position changes are independent: a rule may get both
/// an update and a move.
pub fn diff_with(declared: &RuleList, remote: &RuleList, opts: &DiffOptions) -> Plan {
    let declared_names: BTreeSet<&str> = declared.rules().iter().map(|r| r.name.as_str()).collect();
    let remote_by_name: BTreeMap<&str, &Rule> =
        remote.rules().iter().map(|r| (r.name.as_str(), r)).collect();

    let mut ops: Vec<PlanOp> = Vec::new();

    // 1) Deletes
    for r in remote.rules() {
        if !declared_names.contains(r.name.as_str()) {
            ops.push(PlanOp::Delete {
                name: r.name.clone(),
            });
        }
    }

    // Remote order after deletes; creates are inserted as they would land.
    let mut staged: Vec<&str> = remote
        .rules()
        .iter()
        .map(|r| r.name.as_str())
        .filter(|n| declared_names.contains(n))
        .collect();

    // 2) Creates
    for (i, r) in declared.rules().iter().enumerate() {
        if remote_by_name.contains_key(r.name.as_str()) {
            continue;
        }
        let after = i.checked_sub(1).map(|p| declared.rules()[p].name.as_str());
        let at = after
            .and_then(|a| staged.iter().position(|n| *n == a))
            .map_or(0, |p| p + 1);
        staged.insert(at, r.name.as_str());

        ops.push(PlanOp::Create {
            rule: r.clone(),
            after: after.map(str::to_string),
        });
    }

    // 3) Updates
    for r in declared.rules() {
        let Some(existing) = remote_by_name.get(r.name.as_str()) else {
            continue;
        };
        if !same_fields(r, existing, opts.list_order) {
            ops.push(PlanOp::Update {
                name: r.name.clone(),
                rule: r.clone(),
                changes: field_changes(r, existing, opts.list_order),
            });
        }
    }

    // 4) Moves
    let target: Vec<&str> = declared.rules().iter().map(|r| r.name.as_str()).collect();
    ops.extend(plan_moves(&target, &staged));

    Plan::new(ops)
}

/// `true` when remote already matches declared, order included.
pub fn is_converged(declared: &RuleList, remote: &RuleList, opts: &DiffOptions) -> bool {
    diff_with(declared, remote, opts).is_empty()
}
