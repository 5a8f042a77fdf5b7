//! Reconciliation unit: owns one composite key and runs passes against it.
//!
//! A pass is strictly sequential: validate declared -> read remote fresh
//! -> diff -> execute -> read remote again -> verify. Only the key (and the
//! last successfully applied declared list) survives between passes.
//!
//! # Concurrency
//! Units for different keys share nothing and may run in parallel. Two
//! passes against the SAME key must be serialized by the caller: this type
//! does no locking, and interleaved passes can leave the device in an order
//! neither caller declared. Post-apply verification reports that case as
//! [`ReconcileError::Diverged`], it does not prevent it.

use polsync_model::{
    decode, validate_rule_list, CompositeKey, IdentifierError, RuleList, ValidationError,
    ValidationPolicy,
};
use polsync_reconcile::{diff_with, is_converged, DiffOptions, Plan, PlanOp, PlanSummary};
use thiserror::Error;
use tracing::{info, warn};

use crate::adapter::{fetch_rule_list, FetchError, RemoteError, RuleBaseAdapter};
use crate::executor::{ExecutionFailure, PlanExecutor};

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Identifier(#[from] IdentifierError),

    /// Declared state rejected before any remote call.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A read failed while fetching remote state. Nothing was written.
    #[error("REMOTE_CALL_FAILED: {call} on {key}: {source}")]
    Remote {
        key: String,
        call: &'static str,
        #[source]
        source: RemoteError,
    },

    /// The device returned a rule base that breaks the name invariants.
    #[error("REMOTE_INVARIANT: {key}: {reason}")]
    RemoteInvariant { key: String, reason: String },

    /// A write failed mid-plan; see [`ExecutionFailure`] for how far it got.
    #[error(transparent)]
    Execution(#[from] ExecutionFailure),

    /// Every op of the plan was applied but the read-back failed, so
    /// convergence is unknown. `last_applied` is left untouched.
    #[error("VERIFY_FAILED: {key}: {applied} ops applied ({summary}), read-back failed: {cause}")]
    VerifyFailed {
        key: String,
        applied: usize,
        summary: PlanSummary,
        #[source]
        cause: Box<ReconcileError>,
    },

    /// The plan ran to completion but the re-read state still differs.
    #[error("DIVERGED: {key} still differs from declared state after apply ({residual})")]
    Diverged { key: String, residual: PlanSummary },
}

impl ReconcileError {
    /// `true` when re-running the pass unchanged may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ReconcileError::Remote { .. }
                | ReconcileError::Execution(_)
                | ReconcileError::VerifyFailed { .. }
                | ReconcileError::Diverged { .. }
        )
    }
}

/// Outcome of a successful pass.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PassReport {
    pub key: CompositeKey,
    /// What was executed (empty when already converged).
    pub plan: Plan,
    /// Remote state read back after execution.
    pub observed: RuleList,
}

impl PassReport {
    pub fn changed(&self) -> bool {
        !self.plan.is_empty()
    }
}

pub struct RuleBaseUnit<A: RuleBaseAdapter> {
    adapter: A,
    key: CompositeKey,
    validation: ValidationPolicy,
    diff: DiffOptions,
    last_applied: Option<RuleList>,
}

impl<A: RuleBaseAdapter> RuleBaseUnit<A> {
    pub fn new(adapter: A, key: CompositeKey) -> Self {
        Self {
            adapter,
            key,
            validation: ValidationPolicy::default(),
            diff: DiffOptions::default(),
            last_applied: None,
        }
    }

    /// Build a unit from its external identifier string.
    pub fn from_id(adapter: A, id: &str) -> Result<Self, ReconcileError> {
        Ok(Self::new(adapter, decode(id)?))
    }

    pub fn with_validation(mut self, policy: ValidationPolicy) -> Self {
        self.validation = policy;
        self
    }

    pub fn with_diff_options(mut self, opts: DiffOptions) -> Self {
        self.diff = opts;
        self
    }

    pub fn key(&self) -> &CompositeKey {
        &self.key
    }

    pub fn id(&self) -> String {
        self.key.id()
    }

    /// Declared list of the last pass that converged, if any.
    pub fn last_applied(&self) -> Option<&RuleList> {
        self.last_applied.as_ref()
    }

    fn fetch(&self) -> Result<RuleList, ReconcileError> {
        fetch_rule_list(&self.adapter, &self.key).map_err(|e| match e {
            FetchError::Call { call, source } => ReconcileError::Remote {
                key: self.key.id(),
                call,
                source,
            },
            FetchError::Invariant(reason) => ReconcileError::RemoteInvariant {
                key: self.key.id(),
                reason,
            },
        })
    }

    /// Observed remote rules, or `None` when the rule base holds no rules.
    pub fn read(&self) -> Result<Option<RuleList>, ReconcileError> {
        let remote = self.fetch()?;
        if remote.is_empty() {
            return Ok(None);
        }
        Ok(Some(remote))
    }

    /// Plan only: what a pass with `declared` would execute right now.
    pub fn plan(&self, declared: &RuleList) -> Result<Plan, ReconcileError> {
        validate_rule_list(declared, &self.validation)?;
        let remote = self.fetch()?;
        Ok(diff_with(declared, &remote, &self.diff))
    }

    /// Converge a rule base expected to be absent or empty.
    ///
    /// Existing rules are not overwritten blindly: the same diff-and-converge
    /// pass as [`update`](Self::update) runs either way.
    pub fn create(&mut self, declared: &RuleList) -> Result<PassReport, ReconcileError> {
        self.create_with(declared, |_, _| {})
    }

    pub fn create_with<F>(&mut self, declared: &RuleList, on_applied: F) -> Result<PassReport, ReconcileError>
    where
        F: FnMut(usize, &PlanOp),
    {
        validate_rule_list(declared, &self.validation)?;
        let remote = self.fetch()?;
        if !remote.is_empty() {
            warn!(
                key = %self.key,
                existing = remote.len(),
                "create found an existing rule base, converging it"
            );
        }
        self.converge(declared, remote, on_applied)
    }

    /// Converge the remote rule base to `declared`.
    pub fn update(&mut self, declared: &RuleList) -> Result<PassReport, ReconcileError> {
        self.update_with(declared, |_, _| {})
    }

    pub fn update_with<F>(&mut self, declared: &RuleList, on_applied: F) -> Result<PassReport, ReconcileError>
    where
        F: FnMut(usize, &PlanOp),
    {
        validate_rule_list(declared, &self.validation)?;
        let remote = self.fetch()?;
        self.converge(declared, remote, on_applied)
    }

    /// Remove every rule under the key. Same as `update` with an empty list.
    pub fn delete(&mut self) -> Result<PassReport, ReconcileError> {
        self.delete_with(|_, _| {})
    }

    pub fn delete_with<F>(&mut self, on_applied: F) -> Result<PassReport, ReconcileError>
    where
        F: FnMut(usize, &PlanOp),
    {
        let report = self.update_with(&RuleList::empty(), on_applied)?;
        self.last_applied = None;
        Ok(report)
    }

    fn converge<F>(
        &mut self,
        declared: &RuleList,
        remote: RuleList,
        on_applied: F,
    ) -> Result<PassReport, ReconcileError>
    where
        F: FnMut(usize, &PlanOp),
    {
        let plan = diff_with(declared, &remote, &self.diff);

        if plan.is_empty() {
            info!(key = %self.key, rules = declared.len(), "rule base already converged");
            self.last_applied = Some(declared.clone());
            return Ok(PassReport {
                key: self.key.clone(),
                plan,
                observed: remote,
            });
        }

        info!(
            key = %self.key,
            remote = remote.len(),
            declared = declared.len(),
            plan = %plan.summary(),
            "executing reconciliation plan"
        );

        PlanExecutor::new(&self.adapter).execute_with(&self.key, &plan, on_applied)?;

        let observed = self.fetch().map_err(|cause| {
            warn!(key = %self.key, error = %cause, "read-back after apply failed");
            ReconcileError::VerifyFailed {
                key: self.key.id(),
                applied: plan.len(),
                summary: plan.summary(),
                cause: Box::new(cause),
            }
        })?;
        if !is_converged(declared, &observed, &self.diff) {
            let residual = diff_with(declared, &observed, &self.diff);
            warn!(
                key = %self.key,
                residual = %residual.summary(),
                "remote state diverged after apply"
            );
            return Err(ReconcileError::Diverged {
                key: self.key.id(),
                residual: residual.summary(),
            });
        }

        info!(key = %self.key, applied = plan.len(), "rule base converged");
        self.last_applied = Some(declared.clone());

        Ok(PassReport {
            key: self.key.clone(),
            plan,
            observed,
        })
    }
}
