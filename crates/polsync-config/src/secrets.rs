//! Device credential resolution.
//!
//! Config stores only the NAME of the environment variable holding the API
//! key (`device.api_key_env`). It is resolved once at startup; error
//! messages mention the name, never the value, and `Debug` redacts.

use anyhow::{bail, Result};

use crate::DeviceSettings;

#[derive(Clone)]
pub struct ResolvedDeviceSecrets {
    pub api_key: Option<String>,
}

impl std::fmt::Debug for ResolvedDeviceSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedDeviceSecrets")
            .field("api_key", &self.api_key.as_ref().map(|_| "<REDACTED>"))
            .finish()
    }
}

fn resolve_env(var_name: &str) -> Option<String> {
    match std::env::var(var_name) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => None,
    }
}

/// Resolve the device API key. When a hostname is configured the key is
/// required; without one (offline device) it is optional.
pub fn resolve_device_secrets(device: &DeviceSettings) -> Result<ResolvedDeviceSecrets> {
    let api_key = device.api_key_env.as_deref().and_then(resolve_env);

    if let Some(host) = &device.hostname {
        match (&device.api_key_env, &api_key) {
            (None, _) => bail!(
                "SECRET_NOT_CONFIGURED: device {host} has no device.api_key_env"
            ),
            (Some(var), None) => bail!(
                "SECRET_MISSING: env var {var} for device {host} is unset or empty"
            ),
            _ => {}
        }
    }

    Ok(ResolvedDeviceSecrets { api_key })
}
