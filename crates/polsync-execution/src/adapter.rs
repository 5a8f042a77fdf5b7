//! Remote rule-base capability.
//!
//! The transport collaborator (XML API client, offline device, test fake)
//! implements [`RuleBaseAdapter`]. Every method is one atomic,
//! independently-failing remote call; nothing here assumes transactions
//! across calls, and implementations own their timeouts and retries.

use polsync_model::{CompositeKey, Rule, RuleList};

/// Boxed error returned by remote calls.
pub type RemoteError = Box<dyn std::error::Error + Send + Sync>;

/// Convenience alias used throughout this module.
pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

/// Read/write access to the rule bases of one device.
///
/// Positions are relative: `after = None` means the head of the rule base,
/// `after = Some(n)` means directly behind rule `n`.
pub trait RuleBaseAdapter {
    /// Rule names under `key`, in rule-base order. An absent rule base is
    /// reported as an empty list.
    fn list(&self, key: &CompositeKey) -> RemoteResult<Vec<String>>;

    fn get(&self, key: &CompositeKey, name: &str) -> RemoteResult<Option<Rule>>;

    fn create(&self, key: &CompositeKey, rule: &Rule, after: Option<&str>) -> RemoteResult<()>;

    /// Replace the fields of an existing rule in place. Position is kept.
    fn update(&self, key: &CompositeKey, name: &str, rule: &Rule) -> RemoteResult<()>;

    fn delete(&self, key: &CompositeKey, name: &str) -> RemoteResult<()>;

    fn move_rule(&self, key: &CompositeKey, name: &str, after: Option<&str>) -> RemoteResult<()>;
}

impl<T: RuleBaseAdapter + ?Sized> RuleBaseAdapter for &T {
    fn list(&self, key: &CompositeKey) -> RemoteResult<Vec<String>> {
        (**self).list(key)
    }

    fn get(&self, key: &CompositeKey, name: &str) -> RemoteResult<Option<Rule>> {
        (**self).get(key, name)
    }

    fn create(&self, key: &CompositeKey, rule: &Rule, after: Option<&str>) -> RemoteResult<()> {
        (**self).create(key, rule, after)
    }

    fn update(&self, key: &CompositeKey, name: &str, rule: &Rule) -> RemoteResult<()> {
        (**self).update(key, name, rule)
    }

    fn delete(&self, key: &CompositeKey, name: &str) -> RemoteResult<()> {
        (**self).delete(key, name)
    }

    fn move_rule(&self, key: &CompositeKey, name: &str, after: Option<&str>) -> RemoteResult<()> {
        (**self).move_rule(key, name, after)
    }
}

/// Why a fresh remote read could not produce a rule list.
#[derive(Debug)]
pub(crate) enum FetchError {
    Call {
        call: &'static str,
        source: RemoteError,
    },
    Invariant(String),
}

/// Fetch the full ordered rule list under `key`: one `list`, then one
/// `get` per name. Never cached; each pass reads fresh.
pub(crate) fn fetch_rule_list<A: RuleBaseAdapter>(
    adapter: &A,
    key: &CompositeKey,
) -> Result<RuleList, FetchError> {
    let names = adapter.list(key).map_err(|source| FetchError::Call {
        call: "list",
        source,
    })?;

    let mut rules = Vec::with_capacity(names.len());
    for name in &names {
        let rule = adapter.get(key, name).map_err(|source| FetchError::Call {
            call: "get",
            source,
        })?;
        match rule {
            Some(r) if &r.name == name => rules.push(r),
            Some(r) => {
                return Err(FetchError::Invariant(format!(
                    "listed rule {name:?} came back as {:?}",
                    r.name
                )))
            }
            None => {
                return Err(FetchError::Invariant(format!(
                    "listed rule {name:?} disappeared before it could be read"
                )))
            }
        }
    }

    let mut seen = std::collections::BTreeSet::new();
    if let Some(dup) = names.iter().find(|n| !seen.insert(n.as_str())) {
        return Err(FetchError::Invariant(format!(
            "remote rule base lists {dup:?} more than once"
        )));
    }

    Ok(RuleList::new(rules))
}
