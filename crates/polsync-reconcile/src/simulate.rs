//! In-memory plan replay.
//!
//! Applies a plan to a rule list with the same positional semantics the
//! device capability promises ("directly after `after`", `None` = head).
//! Used to preview the post-apply state and to prove convergence in tests
//! without a device.

use polsync_model::{Rule, RuleList};
use thiserror::Error;

use crate::{Plan, PlanOp};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SimulationError {
    #[error("op #{position} ({op}): rule {name:?} does not exist")]
    MissingRule {
        position: usize,
        op: String,
        name: String,
    },

    #[error("op #{position} ({op}): anchor {after:?} does not exist")]
    MissingAnchor {
        position: usize,
        op: String,
        after: String,
    },

    #[error("op #{position} ({op}): rule {name:?} already exists")]
    AlreadyExists {
        position: usize,
        op: String,
        name: String,
    },
}

fn insert_after(rules: &mut Vec<Rule>, rule: Rule, after: Option<&str>) -> Result<(), String> {
    let at = match after {
        None => 0,
        Some(a) => match rules.iter().position(|r| r.name == a) {
            Some(p) => p + 1,
            None => return Err(a.to_string()),
        },
    };
    rules.insert(at, rule);
    Ok(())
}

/// Replay `plan` on top of `remote`, returning the resulting list.
pub fn simulate(remote: &RuleList, plan: &Plan) -> Result<RuleList, SimulationError> {
    let mut rules: Vec<Rule> = remote.rules().to_vec();

    for (position, op) in plan.iter().enumerate() {
        let missing = |name: &str| SimulationError::MissingRule {
            position,
            op: op.to_string(),
            name: name.to_string(),
        };
        let missing_anchor = |after: String| SimulationError::MissingAnchor {
            position,
            op: op.to_string(),
            after,
        };

        match op {
            PlanOp::Delete { name } => {
                let idx = rules
                    .iter()
                    .position(|r| &r.name == name)
                    .ok_or_else(|| missing(name.as_str()))?;
                rules.remove(idx);
            }
            PlanOp::Create { rule, after } => {
                if rules.iter().any(|r| r.name == rule.name) {
                    return Err(SimulationError::AlreadyExists {
                        position,
                        op: op.to_string(),
                        name: rule.name.clone(),
                    });
                }
                insert_after(&mut rules, rule.clone(), after.as_deref())
                    .map_err(missing_anchor)?;
            }
            PlanOp::Update { name, rule, .. } => {
                let slot = rules
                    .iter_mut()
                    .find(|r| &r.name == name)
                    .ok_or_else(|| missing(name.as_str()))?;
                *slot = rule.clone();
            }
            PlanOp::Move { name, after } => {
                let idx = rules
                    .iter()
                    .position(|r| &r.name == name)
                    .ok_or_else(|| missing(name.as_str()))?;
                let rule = rules.remove(idx);
                if after.as_deref() == Some(name.as_str()) {
                    return Err(missing_anchor(name.clone()));
                }
                insert_after(&mut rules, rule, after.as_deref()).map_err(missing_anchor)?;
            }
        }
    }

    Ok(RuleList::new(rules))
}

#[cfg(test)]
mod tests {
    use super::*;
    use polsync_model::Action;

    #[test]
    fn move_relative_to_missing_anchor_fails() {
        let remote = RuleList::new(vec![Rule::new("a", Action::Allow)]);
        let plan = Plan::new(vec![PlanOp::Move {
            name: "a".into(),
            after: Some("ghost".into()),
        }]);
        let err = simulate(&remote, &plan).unwrap_err();
        assert!(matches!(err, SimulationError::MissingAnchor { position: 0, .. }));
    }

    #[test]
    fn create_of_existing_rule_fails() {
        let remote = RuleList::new(vec![Rule::new("a", Action::Allow)]);
        let plan = Plan::new(vec![PlanOp::Create {
            rule: Rule::new("a", Action::Deny),
            after: None,
        }]);
        assert!(matches!(
            simulate(&remote, &plan),
            Err(SimulationError::AlreadyExists { .. })
        ));
    }

    #[test]
    fn move_ahead_of_create_is_rejected() {
        // Ordering matters: moving behind a rule that is created later fails.
        let remote = RuleList::new(vec![Rule::new("a", Action::Allow)]);
        let plan = Plan::new(vec![
            PlanOp::Move {
                name: "a".into(),
                after: Some("n".into()),
            },
            PlanOp::Create {
                rule: Rule::new("n", Action::Allow),
                after: None,
            },
        ]);
        assert!(simulate(&remote, &plan).is_err());
    }
}
