#![forbid(unsafe_code)]

use super::{encode_blockers, task_row};
use crate::audit::{AuditRecordTx, append_audit_tx};
use crate::error::StoreError;
use crate::types::TaskRow;
use crate::{SqliteStore, now_ms};
use oc_core::model::TaskStatus;
use rusqlite::params;
use serde_json::json;

impl SqliteStore {
    /// Compare-and-swap progress write; the percentage is clamped to
    /// [0, 100] before it is stored.
    pub fn update_task_progress(
        &mut self,
        id: &str,
        percent: f64,
        expected_version: i64,
    ) -> Result<TaskRow, StoreError> {
        if !percent.is_finite() {
            return Err(StoreError::InvalidInput("percent must be a finite number"));
        }
        let percent = percent.clamp(0.0, 100.0);

        let now = now_ms();
        let tx = self.conn.transaction()?;

        let current = task_row(&tx, id)?.ok_or(StoreError::UnknownTask)?;
        if current.version != expected_version {
            return Err(StoreError::VersionConflict {
                expected: expected_version,
                actual: current.version,
            });
        }

        let affected = tx.execute(
            "UPDATE tasks SET percent_complete = ?3, version = version + 1, last_updated = ?4 \
             WHERE id = ?1 AND version = ?2",
            params![id, expected_version, percent, now],
        )?;
        if affected == 0 {
            let live = task_row(&tx, id)?.ok_or(StoreError::UnknownTask)?;
            return Err(StoreError::VersionConflict {
                expected: expected_version,
                actual: live.version,
            });
        }

        append_audit_tx(
            &tx,
            AuditRecordTx {
                agent_id: Some(current.agent_id.as_str()),
                action: "update_task_progress",
                target_agent_id: None,
                success: true,
                details: Some(
                    json!({
                        "task": id,
                        "percent": percent,
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

    /// Replace the blocker list. A list becoming non-empty moves a pending
    /// task into `blocked` (stamping `blocked_since`); a list emptying out
    /// moves a blocked task back to `pending` and clears the stamp.
    pub fn update_task_blockers(
        &mut self,
        id: &str,
        blocked_by: Vec<String>,
        expected_version: i64,
    ) -> Result<TaskRow, StoreError> {
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

        let (status, blocked_since) = if !blocked_by.is_empty() {
            if old_status == TaskStatus::Pending || old_status == TaskStatus::Blocked {
                (
                    TaskStatus::Blocked,
                    Some(current.blocked_since.unwrap_or(now)),
                )
            } else {
                (old_status, current.blocked_since)
            }
        } else if old_status == TaskStatus::Blocked {
            (TaskStatus::Pending, None)
        } else {
            (old_status, current.blocked_since)
        };

        let affected = tx.execute(
            "UPDATE tasks SET blocked_by = ?3, status = ?4, blocked_since = ?5, \
             version = version + 1, last_updated = ?6 WHERE id = ?1 AND version = ?2",
            params![
                id,
                expected_version,
                encode_blockers(&blocked_by),
                status.as_str(),
                blocked_since,
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

        append_audit_tx(
            &tx,
            AuditRecordTx {
                agent_id: Some(current.agent_id.as_str()),
                action: "update_task_blockers",
                target_agent_id: None,
                success: true,
                details: Some(
                    json!({
                        "task": id,
                        "blocked_by": blocked_by,
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

    /// Execution bookkeeping for the orchestrator; versioned like every
    /// other task write so concurrent executors surface conflicts.
    pub fn record_task_execution(
        &mut self,
        id: &str,
        expected_version: i64,
    ) -> Result<TaskRow, StoreError> {
        let now = now_ms();
        let tx = self.conn.transaction()?;

        let current = task_row(&tx, id)?.ok_or(StoreError::UnknownTask)?;
        if current.version != expected_version {
            return Err(StoreError::VersionConflict {
                expected: expected_version,
                actual: current.version,
            });
        }

        let affected = tx.execute(
            "UPDATE tasks SET last_executed = ?3, execution_count = execution_count + 1, \
             version = version + 1, last_updated = ?3 WHERE id = ?1 AND version = ?2",
            params![id, expected_version, now],
        )?;
        if affected == 0 {
            let live = task_row(&tx, id)?.ok_or(StoreError::UnknownTask)?;
            return Err(StoreError::VersionConflict {
                expected: expected_version,
                actual: live.version,
            });
        }

        append_audit_tx(
            &tx,
            AuditRecordTx {
                agent_id: Some(current.agent_id.as_str()),
                action: "record_task_execution",
                target_agent_id: None,
                success: true,
                details: Some(json!({ "task": id }).to_string()),
                now_ms: now,
            },
        )?;

        let row = task_row(&tx, id)?.ok_or(StoreError::UnknownTask)?;
        tx.commit()?;
        Ok(row)
    }
}
