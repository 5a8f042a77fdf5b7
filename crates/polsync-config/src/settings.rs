//! Typed settings read out of the merged document.
//!
//! Every section is optional; absent keys take their defaults. Wrong types
//! and unknown enum values are errors naming the pointer.

use anyhow::{bail, Result};
use polsync_model::ValidationPolicy;
use polsync_reconcile::{DiffOptions, ListOrder};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditSettings {
    /// Audit log file. `None` disables auditing.
    pub path: Option<String>,
    pub hash_chain: bool,
}

impl Default for AuditSettings {
    fn default() -> Self {
        Self {
            path: None,
            hash_chain: true,
        }
    }
}

/// Transport-facing device settings. Only names are stored here; the API
/// key itself lives in the environment variable `api_key_env`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceSettings {
    pub hostname: Option<String>,
    pub api_key_env: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    pub validation: ValidationPolicy,
    pub diff: DiffOptions,
    pub audit: AuditSettings,
    pub device: DeviceSettings,
}

impl Settings {
    pub fn from_config_json(config: &Value) -> Result<Self> {
        let require_match_criteria =
            read_bool(config, "/validation/require_match_criteria")?.unwrap_or(true);

        let list_order = match read_str(config, "/diff/list_order")?.as_deref() {
            None | Some("strict") => ListOrder::Strict,
            Some("canonical") => ListOrder::Canonical,
            Some(other) => bail!(
                "CONFIG_INVALID /diff/list_order: expected strict|canonical, got {other:?}"
            ),
        };

        Ok(Settings {
            validation: ValidationPolicy {
                require_match_criteria,
            },
            diff: DiffOptions { list_order },
            audit: AuditSettings {
                path: read_str(config, "/audit/path")?,
                hash_chain: read_bool(config, "/audit/hash_chain")?.unwrap_or(true),
            },
            device: DeviceSettings {
                hostname: read_str(config, "/device/hostname")?,
                api_key_env: read_str(config, "/device/api_key_env")?,
            },
        })
    }
}

fn read_bool(config: &Value, pointer: &str) -> Result<Option<bool>> {
    match config.pointer(pointer) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(other) => bail!("CONFIG_INVALID {pointer}: expected bool, got {other}"),
    }
}

/// Blank strings count as absent.
fn read_str(config: &Value, pointer: &str) -> Result<Option<String>> {
    match config.pointer(pointer) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.trim().to_string())),
        Some(other) => bail!("CONFIG_INVALID {pointer}: expected string, got {other}"),
    }
}
