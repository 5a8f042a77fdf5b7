//! Command handler modules for polsync.
//!
//! Shared loading helpers live here; pass logic lives in [`rulebase`].

pub mod rulebase;

use anyhow::{Context, Result};
use polsync_config::{
    load_layered_yaml, report_unused_keys, resolve_device_secrets, DeviceSettings, Settings,
    UnusedKeyPolicy,
};
use polsync_device_offline::OfflineDevice;
use polsync_model::RuleList;
use serde::Deserialize;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tracing::warn;

/// Desired-state document.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RulesDoc {
    #[serde(default)]
    rules: RuleList,
}

/// Settings and config hash for `paths`; defaults (and no hash) when empty.
pub fn load_settings(paths: &[String]) -> Result<(Settings, Option<String>)> {
    if paths.is_empty() {
        return Ok((Settings::default(), None));
    }

    let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
    let loaded = load_layered_yaml(&path_refs)?;
    warn_unused_keys(&loaded.config_json)?;
    let settings = loaded.settings()?;
    Ok((settings, Some(loaded.config_hash)))
}

pub fn warn_unused_keys(config_json: &Value) -> Result<()> {
    let report = report_unused_keys(config_json, UnusedKeyPolicy::Warn)?;
    for ptr in &report.unused_leaf_pointers {
        warn!(pointer = %ptr, "unused config key");
    }
    Ok(())
}

pub fn load_rules_doc(path: &str) -> Result<RuleList> {
    let raw = fs::read_to_string(path).with_context(|| format!("read rules file: {path}"))?;
    let doc: RulesDoc =
        serde_yaml::from_str(&raw).with_context(|| format!("parse rules file: {path}"))?;
    Ok(doc.rules)
}

pub fn open_device(path: &str) -> Result<OfflineDevice> {
    Ok(OfflineDevice::load(Path::new(path))?)
}

pub fn save_device(device: &OfflineDevice, path: &str) -> Result<()> {
    Ok(device.save(Path::new(path))?)
}

/// `true` when the configured API key env var resolves. Logs the reason
/// (env var name only) when it does not.
pub fn device_credentials_resolve(device: &DeviceSettings) -> bool {
    match resolve_device_secrets(device) {
        Ok(s) => s.api_key.is_some(),
        Err(e) => {
            warn!(error = %e, "device credentials unresolved");
            false
        }
    }
}
