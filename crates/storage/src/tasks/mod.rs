#![forbid(unsafe_code)]

mod progress;
mod queries;
mod status;

use crate::audit::{AuditRecordTx, append_audit_tx};
use crate::error::StoreError;
use crate::hierarchy::{agent_row, is_fired};
use crate::types::TaskRow;
use crate::{CreateTaskRequest, SqliteStore, next_counter_tx, now_ms};
use oc_core::model::{TaskPriority, TaskStatus};
use oc_core::org::MAX_TASK_DEPTH;
use rusqlite::{Connection, OptionalExtension, params};
use serde_json::json;

pub(crate) const TASK_COLUMNS: &str = "id, agent_id, title, status, priority, created_at, \
     started_at, completed_at, parent_task_id, depth, percent_complete, subtasks_completed, \
     subtasks_total, delegated_to, delegated_at, blocked_by, blocked_since, task_path, version, \
     last_updated, last_executed, execution_count";

pub(crate) fn map_task_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<TaskRow> {
    let blocked_by_json = row.get::<_, String>(15)?;
    Ok(TaskRow {
        id: row.get(0)?,
        agent_id: row.get(1)?,
        title: row.get(2)?,
        status: row.get(3)?,
        priority: row.get(4)?,
        created_at: row.get(5)?,
        started_at: row.get(6)?,
        completed_at: row.get(7)?,
        parent_task_id: row.get(8)?,
        depth: row.get(9)?,
        percent_complete: row.get(10)?,
        subtasks_completed: row.get(11)?,
        subtasks_total: row.get(12)?,
        delegated_to: row.get(13)?,
        delegated_at: row.get(14)?,
        blocked_by: serde_json::from_str(&blocked_by_json).unwrap_or_default(),
        blocked_since: row.get(16)?,
        task_path: row.get(17)?,
        version: row.get(18)?,
        last_updated: row.get(19)?,
        last_executed: row.get(20)?,
        execution_count: row.get(21)?,
    })
}

pub(crate) fn task_row(conn: &Connection, id: &str) -> Result<Option<TaskRow>, StoreError> {
    Ok(conn
        .query_row(
            &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"),
            params![id],
            map_task_row,
        )
        .optional()?)
}

pub(crate) fn encode_blockers(blockers: &[String]) -> String {
    serde_json::to_string(blockers).unwrap_or_else(|_| "[]".to_string())
}

impl SqliteStore {
    /// Create a task under an owning agent, optionally nested below a
    /// parent task. Depth derives from the parent and is capped; the
    /// parent's subtask counter moves in the same transaction.
    pub fn create_task(&mut self, request: CreateTaskRequest) -> Result<TaskRow, StoreError> {
        if request.title.trim().is_empty() {
            return Err(StoreError::InvalidInput("task title must not be empty"));
        }
        let priority = match request.priority.as_deref() {
            None => TaskPriority::Medium,
            Some(raw) => TaskPriority::parse(raw)
                .ok_or(StoreError::InvalidInput("unknown task priority"))?,
        };

        let now = now_ms();
        let tx = self.conn.transaction()?;

        let owner = agent_row(&tx, &request.agent_id)?.ok_or(StoreError::UnknownAgent)?;
        if is_fired(&owner) {
            return Err(StoreError::InvalidInput(
                "tasks cannot be created for a fired agent",
            ));
        }
        if let Some(delegate_id) = request.delegated_to.as_deref()
            && agent_row(&tx, delegate_id)?.is_none()
        {
            return Err(StoreError::UnknownAgent);
        }

        let (depth, parent_path) = match request.parent_task_id.as_deref() {
            None => (0, None),
            Some(parent_id) => {
                let parent = task_row(&tx, parent_id)?.ok_or(StoreError::UnknownTask)?;
                if parent.depth >= MAX_TASK_DEPTH {
                    return Err(StoreError::DepthExceeded {
                        depth: parent.depth + 1,
                    });
                }
                (parent.depth + 1, Some(parent.task_path))
            }
        };

        let seq = next_counter_tx(&tx, "task_seq")?;
        let id = format!("task-{seq:06}");
        let task_path = match parent_path {
            Some(parent_path) => format!("{parent_path}/{id}"),
            None => id.clone(),
        };

        let status = if request.blocked_by.is_empty() {
            TaskStatus::Pending
        } else {
            TaskStatus::Blocked
        };
        let blocked_since = (status == TaskStatus::Blocked).then_some(now);

        tx.execute(
            "INSERT INTO tasks(id, agent_id, title, status, priority, created_at, \
             parent_task_id, depth, delegated_to, delegated_at, blocked_by, blocked_since, \
             task_path, version, last_updated) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, 0, ?6)",
            params![
                id,
                request.agent_id,
                request.title,
                status.as_str(),
                priority.as_str(),
                now,
                request.parent_task_id,
                depth,
                request.delegated_to,
                request.delegated_to.as_deref().map(|_| now),
                encode_blockers(&request.blocked_by),
                blocked_since,
                task_path,
            ],
        )?;

        if let Some(parent_id) = request.parent_task_id.as_deref() {
            tx.execute(
                "UPDATE tasks SET subtasks_total = subtasks_total + 1, last_updated = ?2 \
                 WHERE id = ?1",
                params![parent_id, now],
            )?;
        }

        append_audit_tx(
            &tx,
            AuditRecordTx {
                agent_id: Some(request.agent_id.as_str()),
                action: "create_task",
                target_agent_id: request.delegated_to.as_deref(),
                success: true,
                details: Some(
                    json!({
                        "task": id.as_str(),
                        "parent": request.parent_task_id,
                        "depth": depth,
                    })
                    .to_string(),
                ),
                now_ms: now,
            },
        )?;

        let row = task_row(&tx, &id)?.ok_or(StoreError::UnknownTask)?;
        tx.commit()?;
        Ok(row)
    }
}
