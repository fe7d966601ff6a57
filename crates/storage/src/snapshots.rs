#![forbid(unsafe_code)]

use crate::audit::{AuditRecordTx, append_audit_tx};
use crate::error::StoreError;
use crate::types::{RestoreOutcome, SnapshotInfo};
use crate::{
    CreateSnapshotRequest, ListSnapshotsRequest, RestoreOptions, SqliteStore, now_ms,
};
use rusqlite::{Connection, OpenFlags};
use std::fs;
use std::path::{Path, PathBuf};

const SNAPSHOT_DIR: &str = "snapshots";

impl SqliteStore {
    pub fn snapshots_dir(&self) -> PathBuf {
        self.storage_dir.join(SNAPSHOT_DIR)
    }

    /// Point-in-time copy of the live database plus a JSON sidecar.
    /// `VACUUM INTO` gives a consistent copy without closing the
    /// connection or pausing other readers.
    pub fn create_snapshot(
        &mut self,
        request: CreateSnapshotRequest,
    ) -> Result<SnapshotInfo, StoreError> {
        let now = now_ms();
        let id = match request.id {
            Some(id) => {
                validate_snapshot_id(&id)?;
                id
            }
            None => format!("snap-{now}"),
        };

        let dir = self.snapshots_dir();
        fs::create_dir_all(&dir)?;
        let data_path = dir.join(format!("{id}.db"));
        let meta_path = dir.join(format!("{id}.json"));
        if data_path.exists() || meta_path.exists() {
            return Err(StoreError::SnapshotAlreadyExists);
        }

        let escaped = data_path.to_string_lossy().replace('\'', "''");
        self.conn.execute_batch(&format!("VACUUM INTO '{escaped}'"))?;

        let size_bytes = fs::metadata(&data_path)?.len();
        let info = SnapshotInfo {
            id: id.clone(),
            reason: request.reason,
            agent_id: request.agent_id,
            size_bytes,
            schema_version: self.schema_version_current()?,
            created_at_ms: now,
        };
        let encoded = serde_json::to_string_pretty(&info)
            .map_err(|_| StoreError::InvalidInput("snapshot metadata encoding failed"))?;
        fs::write(&meta_path, encoded)?;

        append_audit_tx(
            &self.conn,
            AuditRecordTx {
                agent_id: info.agent_id.as_deref(),
                action: "create_snapshot",
                target_agent_id: None,
                success: true,
                details: Some(
                    serde_json::json!({ "snapshot": id, "size_bytes": size_bytes }).to_string(),
                ),
                now_ms: now,
            },
        )?;
        Ok(info)
    }

    /// Reads sidecar metadata only; the database copies stay closed.
    /// Newest first; unreadable sidecars are skipped.
    pub fn list_snapshots(
        &self,
        request: ListSnapshotsRequest,
    ) -> Result<Vec<SnapshotInfo>, StoreError> {
        let dir = self.snapshots_dir();
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut out = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let Ok(raw) = fs::read_to_string(&path) else {
                continue;
            };
            let Ok(info) = serde_json::from_str::<SnapshotInfo>(&raw) else {
                continue;
            };
            if let Some(agent_id) = request.agent_id.as_deref()
                && info.agent_id.as_deref() != Some(agent_id)
            {
                continue;
            }
            out.push(info);
        }

        out.sort_by(|a, b| {
            b.created_at_ms
                .cmp(&a.created_at_ms)
                .then_with(|| a.id.cmp(&b.id))
        });
        if let Some(limit) = request.limit {
            out.truncate(limit);
        }
        Ok(out)
    }

    /// Integrity probe: read-only open, `PRAGMA integrity_check`, and a
    /// `schema_version` lookup. Corruption yields `false`, never an error.
    pub fn validate_snapshot(path: &Path) -> bool {
        if !path.is_file() {
            return false;
        }
        let Ok(conn) = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY) else {
            return false;
        };
        let Ok(check) = conn.query_row("PRAGMA integrity_check", [], |row| {
            row.get::<_, String>(0)
        }) else {
            return false;
        };
        if check != "ok" {
            return false;
        }
        conn.query_row("SELECT COUNT(*) FROM schema_version", [], |row| {
            row.get::<_, i64>(0)
        })
        .is_ok()
    }

    /// Replace `target_db_path` with the snapshot's content. Operates
    /// beside the live store: the caller must guarantee no process holds
    /// an open write handle on the target, and reopens it afterwards.
    pub fn restore_snapshot(
        snapshot_path: &Path,
        target_db_path: &Path,
        options: RestoreOptions,
    ) -> Result<RestoreOutcome, StoreError> {
        if !snapshot_path.is_file() {
            return Err(StoreError::UnknownSnapshot);
        }
        if options.validate_integrity && !Self::validate_snapshot(snapshot_path) {
            return Err(StoreError::SnapshotCorrupted);
        }

        let mut backup_path = None;
        if options.create_backup && target_db_path.exists() {
            let backup = sibling_file(target_db_path, &format!(".backup-{}", now_ms()))?;
            fs::copy(target_db_path, &backup)?;
            backup_path = Some(backup);
        }

        // Copy into the target directory first, then rename over the
        // target so readers see either the old or the new file whole.
        let staged = sibling_file(target_db_path, ".restore-tmp")?;
        fs::copy(snapshot_path, &staged)?;
        fs::rename(&staged, target_db_path)?;

        // Stale journal files from the replaced database must not shadow
        // the restored content on the next open.
        for suffix in ["-wal", "-shm"] {
            if let Ok(side) = sibling_file(target_db_path, suffix) {
                let _ = fs::remove_file(side);
            }
        }

        Ok(RestoreOutcome { backup_path })
    }

    /// Keep the `keep_count` newest snapshots, delete the rest (data copy
    /// and sidecar). Returns how many were deleted.
    pub fn cleanup_snapshots(&mut self, keep_count: usize) -> Result<usize, StoreError> {
        if keep_count < 1 {
            return Err(StoreError::InvalidInput("keep_count must be at least 1"));
        }
        let snapshots = self.list_snapshots(ListSnapshotsRequest::default())?;
        let dir = self.snapshots_dir();

        let mut deleted = 0;
        for info in snapshots.iter().skip(keep_count) {
            let _ = fs::remove_file(dir.join(format!("{}.db", info.id)));
            fs::remove_file(dir.join(format!("{}.json", info.id)))?;
            deleted += 1;
        }
        Ok(deleted)
    }
}

fn validate_snapshot_id(id: &str) -> Result<(), StoreError> {
    if id.is_empty() || id.len() > 128 {
        return Err(StoreError::InvalidInput(
            "snapshot id must be 1-128 characters",
        ));
    }
    if !id
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.'))
    {
        return Err(StoreError::InvalidInput(
            "snapshot id must be a bare file name",
        ));
    }
    Ok(())
}

fn sibling_file(path: &Path, suffix: &str) -> Result<PathBuf, StoreError> {
    let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
        return Err(StoreError::InvalidInput("path must name a file"));
    };
    Ok(path.with_file_name(format!("{name}{suffix}")))
}
