//! Plan executor: the single path from a plan to remote writes.
//!
//! Ops are applied strictly in plan order. The first failing call stops
//! execution; already-applied ops stay applied (no rollback) and nothing is
//! retried here. Recovery is a fresh reconciliation pass, which re-reads the
//! remote state and only plans what is still missing.

use polsync_model::CompositeKey;
use polsync_reconcile::{Plan, PlanOp, PlanSummary};
use thiserror::Error;
use tracing::{debug, warn};

use crate::adapter::{RemoteError, RemoteResult, RuleBaseAdapter};

/// A remote call failed mid-plan.
///
/// `applied` ops (plan positions `0..applied`) reached the device;
/// `op` (at `position`) did not, and nothing after it was attempted.
#[derive(Debug, Error)]
#[error("REMOTE_CALL_FAILED: op #{position} ({op}) failed after {applied}/{total} ops applied: {source}")]
pub struct ExecutionFailure {
    pub op: PlanOp,
    pub position: usize,
    pub applied: usize,
    pub total: usize,
    #[source]
    pub source: RemoteError,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExecutionReport {
    pub applied: usize,
    pub summary: PlanSummary,
}

pub struct PlanExecutor<A: RuleBaseAdapter> {
    adapter: A,
}

impl<A: RuleBaseAdapter> PlanExecutor<A> {
    pub fn new(adapter: A) -> Self {
        Self { adapter }
    }

    pub fn execute(&self, key: &CompositeKey, plan: &Plan) -> Result<ExecutionReport, ExecutionFailure> {
        self.execute_with(key, plan, |_, _| {})
    }

    /// Like [`execute`](Self::execute), calling `on_applied(position, op)`
    /// after each op the device accepted.
    pub fn execute_with<F>(
        &self,
        key: &CompositeKey,
        plan: &Plan,
        mut on_applied: F,
    ) -> Result<ExecutionReport, ExecutionFailure>
    where
        F: FnMut(usize, &PlanOp),
    {
        let total = plan.len();

        for (position, op) in plan.iter().enumerate() {
            debug!(key = %key, position, total, op = %op, "apply plan op");

            if let Err(source) = self.apply(key, op) {
                warn!(
                    key = %key,
                    position,
                    applied = position,
                    total,
                    op = %op,
                    error = %source,
                    "plan execution halted"
                );
                return Err(ExecutionFailure {
                    op: op.clone(),
                    position,
                    applied: position,
                    total,
                    source,
                });
            }

            on_applied(position, op);
        }

        Ok(ExecutionReport {
            applied: total,
            summary: plan.summary(),
        })
    }

    fn apply(&self, key: &CompositeKey, op: &PlanOp) -> RemoteResult<()> {
        match op {
            PlanOp::Delete { name } => self.adapter.delete(key, name),
            PlanOp::Create { rule, after } => self.adapter.create(key, rule, after.as_deref()),
            PlanOp::Update { name, rule, .. } => self.adapter.update(key, name, rule),
            PlanOp::Move { name, after } => self.adapter.move_rule(key, name, after.as_deref()),
        }
    }
}

// ---------------------------------------------------------------------------
// Internal unit tests
// ---------------------------------------------------------------------------
