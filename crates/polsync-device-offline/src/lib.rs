//! Deterministic in-memory device.
//!
//! Behaves like a strict management API:
//! - `create` of an existing name, `update`/`delete`/`move` of a missing
//!   name, and any `after` anchor that does not exist are errors.
//! - `update` keeps the rule's position; renaming through `update` is refused.
//! - A rule base that was never written lists as empty.
//! - No randomness. No timestamps.
//!
//! State can be persisted as a JSON snapshot (see [`snapshot`]).

use std::collections::BTreeMap;

use parking_lot::Mutex;
use polsync_execution::{RemoteResult, RuleBaseAdapter};
use polsync_model::{CompositeKey, Rule};
use thiserror::Error;

pub mod snapshot;

pub use snapshot::{DeviceSnapshot, SnapshotError};

/// Rejections raised by the offline device.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceError {
    #[error("{key}: rule {name:?} already exists")]
    AlreadyExists { key: String, name: String },

    #[error("{key}: no rule named {name:?}")]
    NoSuchRule { key: String, name: String },

    #[error("{key}: anchor rule {after:?} does not exist")]
    NoSuchAnchor { key: String, after: String },

    #[error("{key}: rule {name:?} cannot be placed after itself")]
    SelfAnchor { key: String, name: String },

    #[error("{key}: update of {name:?} carries rule named {got:?}")]
    NameMismatch { key: String, name: String, got: String },
}

#[derive(Debug, Default)]
pub struct OfflineDevice {
    rulebases: Mutex<BTreeMap<String, Vec<Rule>>>, // keyed by encoded id
}

impl OfflineDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the rules under `key` without any checks. Lets tests stage
    /// states a real device could end up in (including duplicate names).
    pub fn seed(&self, key: &CompositeKey, rules: Vec<Rule>) {
        self.rulebases.lock().insert(key.id(), rules);
    }

    /// Current rules under `key`, in order.
    pub fn rules(&self, key: &CompositeKey) -> Vec<Rule> {
        self.rulebases
            .lock()
            .get(&key.id())
            .cloned()
            .unwrap_or_default()
    }

    pub fn names(&self, key: &CompositeKey) -> Vec<String> {
        self.rules(key).into_iter().map(|r| r.name).collect()
    }

    /// Encoded ids of every non-empty rule base.
    pub fn keys(&self) -> Vec<String> {
        self.rulebases
            .lock()
            .iter()
            .filter(|(_, rules)| !rules.is_empty())
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn to_snapshot(&self) -> DeviceSnapshot {
        let rulebases = self
            .rulebases
            .lock()
            .iter()
            .filter(|(_, rules)| !rules.is_empty())
            .map(|(id, rules)| (id.clone(), rules.clone()))
            .collect();
        DeviceSnapshot { rulebases }
    }

    pub fn from_snapshot(snapshot: DeviceSnapshot) -> Self {
        Self {
            rulebases: Mutex::new(snapshot.rulebases),
        }
    }
}

fn position(rules: &[Rule], name: &str) -> Option<usize> {
    rules.iter().position(|r| r.name == name)
}

/// Index a rule placed after `after` would occupy.
fn insert_index(key: &CompositeKey, rules: &[Rule], after: Option<&str>) -> Result<usize, DeviceError> {
    match after {
        None => Ok(0),
        Some(anchor) => position(rules, anchor)
            .map(|i| i + 1)
            .ok_or_else(|| DeviceError::NoSuchAnchor {
                key: key.id(),
                after: anchor.to_string(),
            }),
    }
}

fn no_such_rule(key: &CompositeKey, name: &str) -> DeviceError {
    DeviceError::NoSuchRule {
        key: key.id(),
        name: name.to_string(),
    }
}

impl RuleBaseAdapter for OfflineDevice {
    fn list(&self, key: &CompositeKey) -> RemoteResult<Vec<String>> {
        Ok(self.names(key))
    }

    fn get(&self, key: &CompositeKey, name: &str) -> RemoteResult<Option<Rule>> {
        let guard = self.rulebases.lock();
        Ok(guard
            .get(&key.id())
            .and_then(|rules| rules.iter().find(|r| r.name == name))
            .cloned())
    }

    fn create(&self, key: &CompositeKey, rule: &Rule, after: Option<&str>) -> RemoteResult<()> {
        let mut guard = self.rulebases.lock();
        let rules = guard.entry(key.id()).or_default();

        if position(rules, &rule.name).is_some() {
            return Err(DeviceError::AlreadyExists {
                key: key.id(),
                name: rule.name.clone(),
            }
            .into());
        }

        let at = insert_index(key, rules, after)?;
        rules.insert(at, rule.clone());
        Ok(())
    }

    fn update(&self, key: &CompositeKey, name: &str, rule: &Rule) -> RemoteResult<()> {
        if rule.name != name {
            return Err(DeviceError::NameMismatch {
                key: key.id(),
                name: name.to_string(),
                got: rule.name.clone(),
            }
            .into());
        }

        let mut guard = self.rulebases.lock();
        let rules = guard.entry(key.id()).or_default();
        let at = position(rules, name).ok_or_else(|| no_such_rule(key, name))?;
        rules[at] = rule.clone();
        Ok(())
    }

    fn delete(&self, key: &CompositeKey, name: &str) -> RemoteResult<()> {
        let mut guard = self.rulebases.lock();
        let rules = guard.entry(key.id()).or_default();
        let at = position(rules, name).ok_or_else(|| no_such_rule(key, name))?;
        rules.remove(at);
        Ok(())
    }

    fn move_rule(&self, key: &CompositeKey, name: &str, after: Option<&str>) -> RemoteResult<()> {
        if after == Some(name) {
            return Err(DeviceError::SelfAnchor {
                key: key.id(),
                name: name.to_string(),
            }
            .into());
        }

        let mut guard = self.rulebases.lock();
        let rules = guard.entry(key.id()).or_default();
        let from = position(rules, name).ok_or_else(|| no_such_rule(key, name))?;

        // Resolve the anchor before removing, so a missing anchor leaves
        // the rule base untouched.
        insert_index(key, rules, after)?;

        let rule = rules.remove(from);
        let at = insert_index(key, rules, after)?;
        rules.insert(at, rule);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Internal unit tests
// ---------------------------------------------------------------------------
