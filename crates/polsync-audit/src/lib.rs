use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use uuid::Uuid;

mod pass;

pub use pass::{PassRecorder, EV_OP_APPLIED, EV_PASS_CONVERGED, EV_PASS_FAILED, EV_PASS_STARTED};

/// Namespace for v5 event ids. Fixed forever: changing it changes every id.
const EVENT_ID_NAMESPACE: Uuid = Uuid::from_bytes([
    0x6f, 0x1c, 0x52, 0x1e, 0x9b, 0x3d, 0x4a, 0x57, 0x8e, 0x0a, 0x2c, 0x61, 0x70, 0x6f, 0x6c,
    0x73,
]);

/// Append-only audit writer. Writes JSON Lines (one event per line).
/// Optional hash chain: each event carries hash_prev + hash_self.
pub struct AuditWriter {
    path: PathBuf,
    hash_chain: bool,
    last_hash: Option<String>,
    /// Number of events appended to this log so far; feeds `event_id`.
    seq: u64,
}

impl AuditWriter {
    /// Creates the writer for a fresh log and ensures parent dirs exist.
    pub fn new(path: impl AsRef<Path>, hash_chain: bool) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| format!("create_dir_all {:?}", parent))?;
        }

        Ok(Self {
            path,
            hash_chain,
            last_hash: None,
            seq: 0,
        })
    }

    /// Open `path` for appending, continuing an existing chain if present.
    ///
    /// The existing log is verified first; appending to a broken chain is
    /// refused so a tampered log cannot be papered over.
    pub fn resume(path: impl AsRef<Path>, hash_chain: bool) -> Result<Self> {
        let mut w = Self::new(path, hash_chain)?;
        if !w.path.exists() {
            return Ok(w);
        }

        let content = fs::read_to_string(&w.path)
            .with_context(|| format!("read audit log {:?}", w.path))?;
        if let VerifyResult::Broken { line, reason, .. } = verify_hash_chain_str(&content)? {
            bail!(
                "AUDIT_CHAIN_BROKEN: {:?} line {line}: {reason}; refusing to append",
                w.path
            );
        }

        let mut seq = 0u64;
        let mut last: Option<AuditEvent> = None;
        for line in content.lines().filter(|l| !l.trim().is_empty()) {
            last = Some(serde_json::from_str(line.trim()).context("parse audit event")?);
            seq += 1;
        }
        w.seq = seq;
        w.last_hash = last.and_then(|ev| ev.hash_self);
        Ok(w)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn last_hash(&self) -> Option<String> {
        self.last_hash.clone()
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Append one event.
    pub fn append(
        &mut self,
        pass_id: Uuid,
        topic: &str,
        event_type: &str,
        payload: Value,
    ) -> Result<AuditEvent> {
        let ts_utc = Utc::now();
        let event_id = derive_event_id(self.last_hash.as_deref(), &payload, self.seq)?;
        self.seq += 1;

        let mut ev = AuditEvent {
            event_id,
            pass_id,
            ts_utc,
            topic: topic.to_string(),
            event_type: event_type.to_string(),
            payload,
            hash_prev: None,
            hash_self: None,
        };

        if self.hash_chain {
            ev.hash_prev = self.last_hash.clone();

            let self_hash = compute_event_hash(&ev)?;
            ev.hash_self = Some(self_hash.clone());
            self.last_hash = Some(self_hash);
        }

        let line = canonical_json_line(&ev)?;
        append_line(&self.path, &line)?;

        Ok(ev)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_id: Uuid,
    /// Groups every event of one reconciliation pass.
    pub pass_id: Uuid,
    pub ts_utc: DateTime<Utc>,
    /// Encoded composite key the pass ran against.
    pub topic: String,
    pub event_type: String,
    pub payload: Value,
    pub hash_prev: Option<String>,
    pub hash_self: Option<String>,
}

/// v5 id over (previous hash, sequence, canonical payload). No RNG: the
/// same log position and content always yields the same id.
pub fn derive_event_id(last_hash: Option<&str>, payload: &Value, seq: u64) -> Result<Uuid> {
    let canonical = canonical_json_line(payload)?;
    let mut name = Vec::with_capacity(canonical.len() + 96);
    name.extend_from_slice(last_hash.unwrap_or("").as_bytes());
    name.push(b'|');
    name.extend_from_slice(&seq.to_be_bytes());
    name.push(b'|');
    name.extend_from_slice(canonical.as_bytes());
    Ok(Uuid::new_v5(&EVENT_ID_NAMESPACE, &name))
}

fn append_line(path: &Path, line: &str) -> Result<()> {
    let mut f = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open audit log {:?}", path))?;
    f.write_all(line.as_bytes())
        .context("write audit line failed")?;
    f.write_all(b"\n").context("write newline failed")?;
    Ok(())
}

/// Sorted keys, compact JSON. One event == one line.
fn canonical_json_line<T: Serialize>(v: &T) -> Result<String> {
    let raw = serde_json::to_value(v).context("serialize audit event failed")?;
    serde_json::to_string(&canonical_value(raw)).context("json stringify failed")
}

fn canonical_value(v: Value) -> Value {
    match v {
        Value::Object(map) => {
            let sorted: BTreeMap<String, Value> = map
                .into_iter()
                .map(|(k, v)| (k, canonical_value(v)))
                .collect();
            Value::Object(sorted.into_iter().collect())
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonical_value).collect()),
        other => other,
    }
}

/// SHA-256 over the canonical event with `hash_self` cleared.
pub fn compute_event_hash(ev: &AuditEvent) -> Result<String> {
    let unsealed = AuditEvent {
        hash_self: None,
        ..ev.clone()
    };
    let digest = Sha256::digest(canonical_json_line(&unsealed)?.as_bytes());
    Ok(hex::encode(digest))
}

pub fn verify_hash_chain(path: impl AsRef<Path>) -> Result<VerifyResult> {
    let content = fs::read_to_string(path.as_ref())
        .with_context(|| format!("read audit log {:?}", path.as_ref()))?;
    verify_hash_chain_str(&content)
}

/// Same as [`verify_hash_chain`] over in-memory JSONL.
///
/// Per event, in order: `hash_prev` must link to the previous event,
/// `hash_self` (when present) must match the recomputed hash, and
/// `event_id` must match its log position. The last check also catches
/// edits and deletions in logs written without a hash chain.
pub fn verify_hash_chain_str(content: &str) -> Result<VerifyResult> {
    let mut prev_hash: Option<String> = None;
    let mut seq = 0u64;
    let mut passes = BTreeSet::new();

    for (i, raw) in content.lines().enumerate() {
        let line = i + 1;
        if raw.trim().is_empty() {
            continue;
        }

        let ev: AuditEvent = serde_json::from_str(raw.trim())
            .with_context(|| format!("parse audit event at line {line}"))?;
        let broken = |reason: String| VerifyResult::Broken {
            line,
            topic: ev.topic.clone(),
            pass_id: ev.pass_id,
            reason,
        };

        if ev.hash_prev != prev_hash {
            return Ok(broken(format!(
                "hash_prev mismatch: expected {prev_hash:?}, got {:?}",
                ev.hash_prev
            )));
        }
        if let Some(claimed) = &ev.hash_self {
            let recomputed = compute_event_hash(&ev)?;
            if *claimed != recomputed {
                return Ok(broken(format!(
                    "hash_self mismatch: claimed {claimed}, recomputed {recomputed}"
                )));
            }
        }
        let expected_id = derive_event_id(prev_hash.as_deref(), &ev.payload, seq)?;
        if ev.event_id != expected_id {
            return Ok(broken(format!(
                "event_id mismatch at seq {seq}: expected {expected_id}, got {}",
                ev.event_id
            )));
        }

        passes.insert(ev.pass_id);
        prev_hash = ev.hash_self;
        seq += 1;
    }

    Ok(VerifyResult::Valid {
        lines: seq as usize,
        passes: passes.len(),
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyResult {
    /// `lines` events spread over `passes` distinct reconciliation passes.
    Valid { lines: usize, passes: usize },
    /// First broken line (1-based), with the rule base and pass it belongs to.
    Broken {
        line: usize,
        topic: String,
        pass_id: Uuid,
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn event_id_is_deterministic_and_position_sensitive() {
        let p = json!({"b": 1, "a": 2});
        let a = derive_event_id(Some("abc"), &p, 3).unwrap();
        let b = derive_event_id(Some("abc"), &json!({"a": 2, "b": 1}), 3).unwrap();
        assert_eq!(a, b, "key order must not matter");
        assert_ne!(a, derive_event_id(Some("abc"), &p, 4).unwrap());
        assert_ne!(a, derive_event_id(None, &p, 3).unwrap());
    }

    #[test]
    fn canonical_value_sorts_nested_keys() {
        let v = json!({"z": {"b": 1, "a": [{"d": 1, "c": 2}]}, "y": 0});
        let s = serde_json::to_string(&canonical_value(v)).unwrap();
        assert_eq!(s, r#"{"y":0,"z":{"a":[{"c":2,"d":1}],"b":1}}"#);
    }
}
