//! Order reconciliation.
//!
//! `current` and `target` hold the same set of names. Rules on a longest
//! increasing run of `current` (measured by target index) already sit in the
//! right relative order and stay put. Every other rule is moved, exactly
//! once, to directly follow its target predecessor, walking target order
//! left to right.
//!
//! One pass converges: a moved rule is glued behind its predecessor, and
//! later moves only insert behind rules further right in target order, so
//! nothing is ever inserted between a glued pair. The result is the chain
//! of stable rules, each followed by its glued tail, which is the target
//! order. `target.len() - run.len()` moves is also the lower bound, since
//! every rule off the run must be touched.

use std::collections::{BTreeMap, BTreeSet};

use crate::PlanOp;

/// Moves that turn `current` into `target`, in execution order.
pub(crate) fn plan_moves(target: &[&str], current: &[&str]) -> Vec<PlanOp> {
    let target_index: BTreeMap<&str, usize> =
        target.iter().enumerate().map(|(i, n)| (*n, i)).collect();

    let seq: Vec<usize> = current
        .iter()
        .filter_map(|n| target_index.get(n).copied())
        .collect();

    let stable: BTreeSet<usize> = longest_increasing_run(&seq)
        .into_iter()
        .map(|pos| seq[pos])
        .collect();

    target
        .iter()
        .enumerate()
        .filter(|(i, _)| !stable.contains(i))
        .map(|(i, name)| PlanOp::Move {
            name: (*name).to_string(),
            after: i.checked_sub(1).map(|p| target[p].to_string()),
        })
        .collect()
}

/// Positions in `seq` forming one longest strictly increasing subsequence.
/// Patience sorting with back-pointers: O(n log n), deterministic.
fn longest_increasing_run(seq: &[usize]) -> Vec<usize> {
    let mut tails: Vec<usize> = Vec::new();
    let mut prev: Vec<Option<usize>> = vec![None; seq.len()];

    for (i, &v) in seq.iter().enumerate() {
        let k = tails.partition_point(|&t| seq[t] < v);
        prev[i] = k.checked_sub(1).map(|p| tails[p]);
        if k == tails.len() {
            tails.push(i);
        } else {
            tails[k] = i;
        }
    }

    let mut run = Vec::with_capacity(tails.len());
    let mut cursor = tails.last().copied();
    while let Some(i) = cursor {
        run.push(i);
        cursor = prev[i];
    }
    run.reverse();
    run
}
