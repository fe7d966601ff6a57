#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Sidecar metadata written next to every snapshot's data copy.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SnapshotInfo {
    pub id: String,
    pub reason: String,
    pub agent_id: Option<String>,
    pub size_bytes: u64,
    pub schema_version: i64,
    pub created_at_ms: i64,
}

#[derive(Clone, Debug)]
pub struct RestoreOutcome {
    pub backup_path: Option<PathBuf>,
}
