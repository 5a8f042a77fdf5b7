//! Audit events for one reconciliation pass.
//!
//! Event sequence: `PASS_STARTED`, one `OP_APPLIED` per op the device
//! accepted, then `PASS_CONVERGED` or `PASS_FAILED`.

use anyhow::Result;
use polsync_reconcile::{Plan, PlanOp, PlanSummary};
use serde_json::json;
use uuid::Uuid;

use crate::{AuditEvent, AuditWriter};

pub const EV_PASS_STARTED: &str = "PASS_STARTED";
pub const EV_OP_APPLIED: &str = "OP_APPLIED";
pub const EV_PASS_CONVERGED: &str = "PASS_CONVERGED";
pub const EV_PASS_FAILED: &str = "PASS_FAILED";

pub struct PassRecorder<'a> {
    writer: &'a mut AuditWriter,
    pass_id: Uuid,
    key: String,
    config_hash: Option<String>,
}

impl<'a> PassRecorder<'a> {
    pub fn new(writer: &'a mut AuditWriter, key: impl Into<String>, config_hash: Option<String>) -> Self {
        Self {
            writer,
            pass_id: Uuid::new_v4(),
            key: key.into(),
            config_hash,
        }
    }

    pub fn pass_id(&self) -> Uuid {
        self.pass_id
    }

    pub fn started(&mut self, operation: &str, plan: &Plan) -> Result<AuditEvent> {
        let summary = plan.summary();
        let payload = json!({
            "operation": operation,
            "config_hash": self.config_hash,
            "plan": summary_json(&summary),
        });
        self.writer
            .append(self.pass_id, &self.key, EV_PASS_STARTED, payload)
    }

    pub fn op_applied(&mut self, position: usize, op: &PlanOp) -> Result<AuditEvent> {
        let payload = json!({
            "position": position,
            "op": op,
        });
        self.writer
            .append(self.pass_id, &self.key, EV_OP_APPLIED, payload)
    }

    pub fn converged(&mut self, applied: usize, rules: usize) -> Result<AuditEvent> {
        let payload = json!({ "applied": applied, "rules": rules });
        self.writer
            .append(self.pass_id, &self.key, EV_PASS_CONVERGED, payload)
    }

    pub fn failed(&mut self, error: &str) -> Result<AuditEvent> {
        let payload = json!({ "error": error });
        self.writer
            .append(self.pass_id, &self.key, EV_PASS_FAILED, payload)
    }
}

fn summary_json(s: &PlanSummary) -> serde_json::Value {
    json!({
        "delete": s.deletes,
        "create": s.creates,
        "update": s.updates,
        "move": s.moves,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{verify_hash_chain, VerifyResult};
    use polsync_model::{Action, Rule};

    #[test]
    fn pass_events_share_pass_id_and_chain() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        let mut writer = AuditWriter::new(&path, true).unwrap();

        let plan = Plan::new(vec![PlanOp::Create {
            rule: Rule::new("a", Action::Allow),
            after: None,
        }]);

        let mut rec = PassRecorder::new(&mut writer, "vsys1:rulebase", Some("cafe".into()));
        let started = rec.started("apply", &plan).unwrap();
        let op = rec.op_applied(0, &plan.ops()[0]).unwrap();
        let done = rec.converged(1, 1).unwrap();

        assert_eq!(started.pass_id, op.pass_id);
        assert_eq!(op.pass_id, done.pass_id);
        assert_eq!(started.payload["plan"]["create"], 1);
        assert_eq!(op.payload["op"]["op"], "create");
        assert_eq!(done.event_type, EV_PASS_CONVERGED);

        assert_eq!(verify_hash_chain(&path).unwrap(), VerifyResult::Valid { lines: 3, passes: 1 });
    }
}
