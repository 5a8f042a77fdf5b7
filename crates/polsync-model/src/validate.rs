//! Structural validation of declared rules.
//!
//! Runs before any remote call. A declaration that fails here never
//! reaches the device, so it cannot leave the rule base half-mutated.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Rule, RuleList};

/// Device limit on rule-name length.
pub const MAX_RULE_NAME_LEN: usize = 63;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("INVALID_RULE: rule at position {position} has an empty name")]
    EmptyName { position: usize },

    #[error("INVALID_RULE: rule name {name:?} {reason}")]
    InvalidName { name: String, reason: &'static str },

    #[error("INVALID_RULE: unknown action {value:?} (expected one of allow, deny, drop, reset-client, reset-server, reset-both)")]
    UnknownAction { value: String },

    #[error("INVALID_RULE: rule {rule:?} has an empty {field} list (use \"any\" to match everything)")]
    EmptyMatchList { rule: String, field: &'static str },

    #[error("INVALID_RULE: rule {rule:?} has an empty entry in {field}")]
    EmptyToken { rule: String, field: String },

    #[error("DUPLICATE_RULE_NAME: {name:?} appears at positions {first} and {second}")]
    DuplicateName {
        name: String,
        first: usize,
        second: usize,
    },
}

/// The device-convention contract applied to declared rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationPolicy {
    /// Reject a rule whose required match lists ([`crate::REQUIRED_MATCH_FIELDS`])
    /// are empty. The device stores an empty list as "unset" and refuses the
    /// rule, so the default is on.
    pub require_match_criteria: bool,
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self {
            require_match_criteria: true,
        }
    }
}

impl ValidationPolicy {
    pub fn permissive() -> Self {
        Self {
            require_match_criteria: false,
        }
    }
}

/// Validate a single rule. `position` is only used for error evidence.
pub fn validate_rule(
    rule: &Rule,
    position: usize,
    policy: &ValidationPolicy,
) -> Result<(), ValidationError> {
    check_name(&rule.name, position)?;

    for (field, list) in rule.match_lists() {
        if policy.require_match_criteria && list.is_empty() {
            return Err(ValidationError::EmptyMatchList {
                rule: rule.name.clone(),
                field,
            });
        }
        if list.iter().any(|t| t.trim().is_empty()) {
            return Err(ValidationError::EmptyToken {
                rule: rule.name.clone(),
                field: field.to_string(),
            });
        }
    }

    if rule.tags.iter().any(|t| t.trim().is_empty()) {
        return Err(ValidationError::EmptyToken {
            rule: rule.name.clone(),
            field: "tags".to_string(),
        });
    }

    Ok(())
}

/// Validate every rule and the list-level name uniqueness invariant.
/// Returns the first violation in list order.
pub fn validate_rule_list(
    rules: &RuleList,
    policy: &ValidationPolicy,
) -> Result<(), ValidationError> {
    let mut seen: BTreeMap<&str, usize> = BTreeMap::new();

    for (i, rule) in rules.rules().iter().enumerate() {
        validate_rule(rule, i, policy)?;

        if let Some(first) = seen.insert(rule.name.as_str(), i) {
            return Err(ValidationError::DuplicateName {
                name: rule.name.clone(),
                first,
                second: i,
            });
        }
    }

    Ok(())
}

fn check_name(name: &str, position: usize) -> Result<(), ValidationError> {
    if name.is_empty() {
        return Err(ValidationError::EmptyName { position });
    }

    let reason = if name.trim() != name {
        Some("has leading or trailing whitespace")
    } else if name.chars().any(char::is_control) {
        Some("contains control characters")
    } else if name.chars().count() > MAX_RULE_NAME_LEN {
        Some("is longer than 63 characters")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(ValidationError::InvalidName {
            name: name.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}
