use std::fmt;

use polsync_model::Rule;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How list-valued fields are compared when deciding "needs update".
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListOrder {
    /// Verbatim: `[a, b]` differs from `[b, a]`.
    #[default]
    Strict,
    /// Sorted with duplicates kept: `[a, b]` equals `[b, a]`,
    /// `[a, a]` still differs from `[a]`.
    Canonical,
}

impl ListOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListOrder::Strict => "strict",
            ListOrder::Canonical => "canonical",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffOptions {
    pub list_order: ListOrder,
}

/// Evidence of one differing field (kept minimal but explicit).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldChange {
    pub field: String,
    /// `null` when the field is absent on this side (only possible for `extra.*`).
    pub declared: Value,
    pub remote: Value,
}

/// Kind tag used for counting and logging.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpKind {
    Delete,
    Create,
    Update,
    Move,
}

impl OpKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OpKind::Delete => "delete",
            OpKind::Create => "create",
            OpKind::Update => "update",
            OpKind::Move => "move",
        }
    }
}

/// One remote write. Positions are expressed as "directly after `after`"
/// (`None` = head of the rule base), never as numeric indices.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum PlanOp {
    Delete {
        name: String,
    },
    Create {
        rule: Rule,
        after: Option<String>,
    },
    Update {
        name: String,
        rule: Rule,
        changes: Vec<FieldChange>,
    },
    Move {
        name: String,
        after: Option<String>,
    },
}

impl PlanOp {
    pub fn kind(&self) -> OpKind {
        match self {
            PlanOp::Delete { .. } => OpKind::Delete,
            PlanOp::Create { .. } => OpKind::Create,
            PlanOp::Update { .. } => OpKind::Update,
            PlanOp::Move { .. } => OpKind::Move,
        }
    }

    /// Name of the rule this operation targets.
    pub fn rule_name(&self) -> &str {
        match self {
            PlanOp::Delete { name } | PlanOp::Update { name, .. } | PlanOp::Move { name, .. } => {
                name
            }
            PlanOp::Create { rule, .. } => &rule.name,
        }
    }
}

fn fmt_after(after: &Option<String>) -> String {
    match after {
        Some(a) => format!("after={a}"),
        None => "after=<head>".to_string(),
    }
}

impl fmt::Display for PlanOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanOp::Delete { name } => write!(f, "delete {name}"),
            PlanOp::Create { rule, after } => {
                write!(f, "create {} {}", rule.name, fmt_after(after))
            }
            PlanOp::Update { name, changes, .. } => {
                let fields: Vec<&str> = changes.iter().map(|c| c.field.as_str()).collect();
                write!(f, "update {name} fields=[{}]", fields.join(","))
            }
            PlanOp::Move { name, after } => write!(f, "move {name} {}", fmt_after(after)),
        }
    }
}

/// Ordered operation plan. Execution order is the vector order:
/// deletes, creates (declared order), updates, moves (declared order).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    ops: Vec<PlanOp>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanSummary {
    pub deletes: usize,
    pub creates: usize,
    pub updates: usize,
    pub moves: usize,
}

impl PlanSummary {
    pub fn total(&self) -> usize {
        self.deletes + self.creates + self.updates + self.moves
    }
}

impl fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "delete={} create={} update={} move={}",
            self.deletes, self.creates, self.updates, self.moves
        )
    }
}

impl Plan {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Wrap an already-ordered op sequence. The engine is the normal
    /// producer; this exists for replaying stored plans.
    pub fn new(ops: Vec<PlanOp>) -> Self {
        Self { ops }
    }

    pub fn ops(&self) -> &[PlanOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<PlanOp> {
        self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PlanOp> {
        self.ops.iter()
    }

    pub fn count(&self, kind: OpKind) -> usize {
        self.ops.iter().filter(|op| op.kind() == kind).count()
    }

    pub fn summary(&self) -> PlanSummary {
        PlanSummary {
            deletes: self.count(OpKind::Delete),
            creates: self.count(OpKind::Create),
            updates: self.count(OpKind::Update),
            moves: self.count(OpKind::Move),
        }
    }
}

impl<'a> IntoIterator for &'a Plan {
    type Item = &'a PlanOp;
    type IntoIter = std::slice::Iter<'a, PlanOp>;

    fn into_iter(self) -> Self::IntoIter {
        self.ops.iter()
    }
}
