//! JSON snapshot persistence for [`OfflineDevice`](crate::OfflineDevice).
//!
//! Format: `{"rulebases": {"<encoded id>": [rule, ...]}}`. Keys are the
//! encoded composite identifiers and are checked on load; rule lists are
//! stored in rule-base order.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use polsync_model::{decode, IdentifierError, Rule};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::OfflineDevice;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeviceSnapshot {
    #[serde(default)]
    pub rulebases: BTreeMap<String, Vec<Rule>>,
}

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("SNAPSHOT_IO: {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("SNAPSHOT_PARSE: {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("SNAPSHOT_SERIALIZE: {path}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("SNAPSHOT_KEY: {path}: rule base {id:?}: {source}")]
    InvalidKey {
        path: PathBuf,
        id: String,
        #[source]
        source: IdentifierError,
    },
}

impl DeviceSnapshot {
    fn check_keys(&self, path: &Path) -> Result<(), SnapshotError> {
        for id in self.rulebases.keys() {
            decode(id).map_err(|source| SnapshotError::InvalidKey {
                path: path.to_path_buf(),
                id: id.clone(),
                source,
            })?;
        }
        Ok(())
    }
}

impl OfflineDevice {
    /// Load a device from `path`. A missing file is an empty device.
    pub fn load(path: &Path) -> Result<Self, SnapshotError> {
        let raw = match fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(OfflineDevice::new());
            }
            Err(source) => {
                return Err(SnapshotError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let snapshot: DeviceSnapshot =
            serde_json::from_str(&raw).map_err(|source| SnapshotError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        snapshot.check_keys(path)?;

        Ok(OfflineDevice::from_snapshot(snapshot))
    }

    /// Write the device state to `path` (temp file + rename).
    pub fn save(&self, path: &Path) -> Result<(), SnapshotError> {
        let io = |source| SnapshotError::Io {
            path: path.to_path_buf(),
            source,
        };

        let text = render(&self.to_snapshot(), path)?;

        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, text).map_err(io)?;
        fs::rename(&tmp, path).map_err(io)?;
        Ok(())
    }
}

/// Pretty JSON with a trailing newline.
fn render<T: Serialize>(value: &T, path: &Path) -> Result<String, SnapshotError> {
    let mut text =
        serde_json::to_string_pretty(value).map_err(|source| SnapshotError::Serialize {
            path: path.to_path_buf(),
            source,
        })?;
    text.push('\n');
    Ok(text)
}
