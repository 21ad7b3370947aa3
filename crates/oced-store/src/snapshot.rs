//! JSON snapshots of a whole store.
//!
//! A snapshot document carries a format version, a digest covering both the
//! store configuration and the state, then the configuration and the state
//! themselves. Loading refuses any document whose version, digest or
//! integrity check does not hold.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::StoreConfig;
use crate::error::{OcedError, Result};
use crate::memory::OcedStore;
use crate::state::{hash_json, StoreState};
use crate::validation::IntegrityChecker;

pub const FORMAT_VERSION: u32 = 1;

const SNAPSHOT_DOMAIN: &[u8] = b"oced-snapshot-v1:";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub format_version: u32,
    pub digest: String,
    #[serde(default)]
    pub config: StoreConfig,
    pub state: StoreState,
}

impl Snapshot {
    /// Capture the committed state of `store`.
    pub fn capture(store: &OcedStore) -> Result<Self> {
        let state = store.state()?;
        let config = store.config().clone();
        Ok(Self {
            format_version: FORMAT_VERSION,
            digest: Self::content_digest(&config, &state)?,
            config,
            state,
        })
    }

    /// Digest recorded in a snapshot of `state` taken under `config`.
    pub fn content_digest(config: &StoreConfig, state: &StoreState) -> Result<String> {
        hash_json(SNAPSHOT_DOMAIN, &(config, state))
    }

    /// Check version, digest and integrity, then build a store.
    pub fn restore(self) -> Result<OcedStore> {
        if self.format_version != FORMAT_VERSION {
            return Err(OcedError::CorruptSnapshot(format!(
                "unsupported format version {} (expected {FORMAT_VERSION})",
                self.format_version
            )));
        }
        let digest = Self::content_digest(&self.config, &self.state)?;
        if digest != self.digest {
            return Err(OcedError::CorruptSnapshot(format!(
                "digest mismatch: recorded {}, computed {digest}",
                self.digest
            )));
        }
        let report = IntegrityChecker::check(&self.state);
        if let Some(first) = report.violations.first() {
            return Err(OcedError::CorruptSnapshot(format!(
                "{} integrity violation(s), first on {}: {}",
                report.violations.len(),
                first.subject,
                first.description
            )));
        }
        debug!(%digest, events = report.event_count, "snapshot verified");
        Ok(OcedStore::from_state(self.config, self.state))
    }
}

/// Serialize `store` as a pretty-printed snapshot document.
pub fn dump_json(store: &OcedStore) -> Result<String> {
    Ok(serde_json::to_string_pretty(&Snapshot::capture(store)?)?)
}

/// Parse and verify a snapshot document.
pub fn load_json(input: &str) -> Result<OcedStore> {
    let snapshot: Snapshot =
        serde_json::from_str(input).map_err(|e| OcedError::CorruptSnapshot(e.to_string()))?;
    snapshot.restore()
}

pub fn dump_to_path(store: &OcedStore, path: &Path) -> Result<()> {
    let encoded = dump_json(store)?;
    std::fs::write(path, encoded)?;
    info!(path = %path.display(), "snapshot written");
    Ok(())
}

pub fn load_from_path(path: &Path) -> Result<OcedStore> {
    let raw = std::fs::read_to_string(path)?;
    let store = load_json(&raw)?;
    info!(path = %path.display(), "snapshot loaded");
    Ok(store)
}
