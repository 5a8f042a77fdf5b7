//! polsync-model
//!
//! Shared vocabulary for security-rule reconciliation:
//! - `CompositeKey` + identity codec (`encode` / `decode`)
//! - `Rule`, `Action`, `RuleList`
//! - structural validation of declared rules
//!
//! Pure data and pure checks. No IO.

mod key;
mod rule;
mod validate;

pub use key::{decode, encode, CompositeKey, IdentifierError, RuleBaseSelector, ID_SEPARATOR};
pub use rule::{equals, Action, Rule, RuleList, RuleType, REQUIRED_MATCH_FIELDS};
pub use validate::{
    validate_rule, validate_rule_list, ValidationError, ValidationPolicy, MAX_RULE_NAME_LEN,
};
