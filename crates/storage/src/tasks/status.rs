#![forbid(unsafe_code)]

use super::task_row;
use crate::audit::{AuditRecordTx, append_audit_tx};
use crate::error::StoreError;
use crate::types::TaskRow;
use crate::{SqliteStore, now_ms};
use oc_core::model::TaskStatus;
use rusqlite::params;
use serde_json::json;

impl SqliteStore {
    /// Compare-and-swap status transition. The UPDATE is guarded by both
    /// id and version; a stale version raises `VersionConflict` and the
    /// row is untouched. The caller re-reads and retries; this layer never
    /// retries on its own.
    pub fn update_task_status(
        &mut self,
        id: &str,
        new_status: &str,
        expected_version: i64,
    ) -> Result<TaskRow, StoreError> {
        let status = TaskStatus::parse(new_status)
            .ok_or(StoreError::InvalidInput("unknown task status"))?;

        let now = now_ms();
        let tx = self.conn.transaction()?;

        let current = task_row(&tx, id)?.ok_or(StoreError::UnknownTask)?;
        if current.version != expected_version {
            return Err(StoreError::VersionConflict {
                expected: expected_version,
                actual: current.version,
            });
        }
        let old_status = TaskStatus::parse(&current.status)
            .ok_or(StoreError::InvalidInput("stored task status is corrupt"))?;

        let started_at = if status == TaskStatus::InProgress {
            // stamped once; re-entering in-progress keeps the first value
            Some(current.started_at.unwrap_or(now))
        } else {
            current.started_at
        };
        let completed_at = if status == TaskStatus::Completed {
            Some(now)
        } else {
            None
        };
        let blocked_since = if status == TaskStatus::Blocked {
            Some(current.blocked_since.unwrap_or(now))
        } else {
            None
        };
        let percent_complete = if status == TaskStatus::Completed {
            100.0
        } else {
            current.percent_complete
        };

        let affected = tx.execute(
            "UPDATE tasks SET status = ?3, version = version + 1, started_at = ?4, \
             completed_at = ?5, blocked_since = ?6, percent_complete = ?7, last_updated = ?8 \
             WHERE id = ?1 AND version = ?2",
            params![
                id,
                expected_version,
                status.as_str(),
                started_at,
                completed_at,
                blocked_since,
                percent_complete,
                now,
            ],
        )?;
        if affected == 0 {
            let live = task_row(&tx, id)?.ok_or(StoreError::UnknownTask)?;
            return Err(StoreError::VersionConflict {
                expected: expected_version,
                actual: live.version,
            });
        }

        // Keep the parent's completion counter on both sides of the
        // completed boundary.
        if let Some(parent_id) = current.parent_task_id.as_deref() {
            if status == TaskStatus::Completed && old_status != TaskStatus::Completed {
                tx.execute(
                    "UPDATE tasks SET subtasks_completed = subtasks_completed + 1, \
                     last_updated = ?2 WHERE id = ?1",
                    params![parent_id, now],
                )?;
            } else if old_status == TaskStatus::Completed && status != TaskStatus::Completed {
                tx.execute(
                    "UPDATE tasks SET subtasks_completed = subtasks_completed - 1, \
                     last_updated = ?2 WHERE id = ?1",
                    params![parent_id, now],
                )?;
            }
        }

        append_audit_tx(
            &tx,
            AuditRecordTx {
                agent_id: Some(current.agent_id.as_str()),
                action: "update_task_status",
                target_agent_id: None,
                success: true,
                details: Some(
                    json!({
                        "task": id,
                        "from": old_status.as_str(),
                        "to": status.as_str(),
                        "version": expected_version + 1,
                    })
                    .to_string(),
                ),
                now_ms: now,
            },
        )?;

        let row = task_row(&tx, id)?.ok_or(StoreError::UnknownTask)?;
        tx.commit()?;
        Ok(row)
    }
}
