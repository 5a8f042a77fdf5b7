//! Composite key + identity codec.
//!
//! A reconciliation unit is addressed by `(container, rule-base selector)`.
//! The surrounding resource layer only ever sees the encoded identifier:
//!
//! ```text
//! <container>:<selector-token>
//!
//! vsys1:rulebase
//! shared-dg:pre-rulebase
//! ```
//!
//! The codec rejects instead of escaping. A container holding the separator
//! would make the split point ambiguous, so `encode` refuses it and `decode`
//! refuses anything `encode` could not have produced.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Separator between container and selector token.
pub const ID_SEPARATOR: char = ':';

/// Which rule base of a container is being reconciled.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleBaseSelector {
    Pre,
    Post,
    Default,
}

impl RuleBaseSelector {
    pub const ALL: [RuleBaseSelector; 3] = [
        RuleBaseSelector::Pre,
        RuleBaseSelector::Post,
        RuleBaseSelector::Default,
    ];

    /// Device token used inside the encoded identifier.
    pub fn token(&self) -> &'static str {
        match self {
            RuleBaseSelector::Pre => "pre-rulebase",
            RuleBaseSelector::Post => "post-rulebase",
            RuleBaseSelector::Default => "rulebase",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.token() == token)
    }
}

impl fmt::Display for RuleBaseSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl FromStr for RuleBaseSelector {
    type Err = IdentifierError;

    /// Accepts the device token (`pre-rulebase`) or the short form (`pre`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(sel) = Self::from_token(s) {
            return Ok(sel);
        }
        match s {
            "pre" => Ok(RuleBaseSelector::Pre),
            "post" => Ok(RuleBaseSelector::Post),
            "default" => Ok(RuleBaseSelector::Default),
            other => Err(IdentifierError::UnknownSelector {
                token: other.to_string(),
            }),
        }
    }
}

/// Errors raised by the identity codec.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentifierError {
    #[error("MALFORMED_IDENTIFIER: {id:?}: {reason}")]
    Malformed { id: String, reason: &'static str },

    #[error("MALFORMED_IDENTIFIER: unknown rule-base selector {token:?}")]
    UnknownSelector { token: String },

    #[error("AMBIGUOUS_IDENTIFIER: container {container:?} {reason}")]
    InvalidContainer {
        container: String,
        reason: &'static str,
    },
}

/// `(container, selector)`: the remote scope of one reconciliation unit.
///
/// Deserialization goes through [`CompositeKey::new`], so a decoded key is
/// always encodable.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawKey")]
pub struct CompositeKey {
    container: String,
    selector: RuleBaseSelector,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawKey {
    container: String,
    selector: RuleBaseSelector,
}

impl TryFrom<RawKey> for CompositeKey {
    type Error = IdentifierError;

    fn try_from(raw: RawKey) -> Result<Self, Self::Error> {
        CompositeKey::new(raw.container, raw.selector)
    }
}

impl CompositeKey {
    /// Build a key, refusing containers that would not survive encoding.
    pub fn new(
        container: impl Into<String>,
        selector: RuleBaseSelector,
    ) -> Result<Self, IdentifierError> {
        let container = container.into();
        check_container(&container)?;
        Ok(Self {
            container,
            selector,
        })
    }

    pub fn container(&self) -> &str {
        &self.container
    }

    pub fn selector(&self) -> RuleBaseSelector {
        self.selector
    }

    /// Stable external handle, see [`encode`].
    pub fn id(&self) -> String {
        format!("{}{}{}", self.container, ID_SEPARATOR, self.selector.token())
    }
}

impl fmt::Display for CompositeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id())
    }
}

impl FromStr for CompositeKey {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode(s)
    }
}

fn check_container(container: &str) -> Result<(), IdentifierError> {
    let reject = |reason| {
        Err(IdentifierError::InvalidContainer {
            container: container.to_string(),
            reason,
        })
    };

    if container.is_empty() {
        return reject("is empty");
    }
    if container.contains(ID_SEPARATOR) {
        return reject("contains the identifier separator ':'");
    }
    if container.chars().any(char::is_control) {
        return reject("contains control characters");
    }
    if container.trim() != container {
        return reject("has leading or trailing whitespace");
    }
    Ok(())
}

/// Encode `(container, selector)` into the identifier string.
pub fn encode(container: &str, selector: RuleBaseSelector) -> Result<String, IdentifierError> {
    Ok(CompositeKey::new(container, selector)?.id())
}

/// Decode an identifier string back into its composite key.
pub fn decode(id: &str) -> Result<CompositeKey, IdentifierError> {
    let Some((container, token)) = id.split_once(ID_SEPARATOR) else {
        return Err(IdentifierError::Malformed {
            id: id.to_string(),
            reason: "missing ':' separator",
        });
    };

    // Only exact device tokens are valid here: the short forms are a CLI
    // convenience and would break decode(encode(k)) uniqueness.
    let selector = RuleBaseSelector::from_token(token).ok_or_else(|| {
        IdentifierError::UnknownSelector {
            token: token.to_string(),
        }
    })?;

    CompositeKey::new(container, selector).map_err(|_| IdentifierError::Malformed {
        id: id.to_string(),
        reason: "container part is not encodable",
    })
}
