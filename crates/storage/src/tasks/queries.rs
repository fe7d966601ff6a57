#![forbid(unsafe_code)]

use super::{TASK_COLUMNS, map_task_row, task_row};
use crate::error::StoreError;
use crate::hierarchy::agent_row;
use crate::types::TaskRow;
use crate::SqliteStore;
use rusqlite::params;

const PRIORITY_RANK: &str =
    "CASE priority WHEN 'urgent' THEN 0 WHEN 'high' THEN 1 WHEN 'medium' THEN 2 ELSE 3 END";

impl SqliteStore {
    pub fn get_task(&self, id: &str) -> Result<Option<TaskRow>, StoreError> {
        task_row(&self.conn, id)
    }

    /// Work queue for one agent: pending, in-progress and blocked tasks,
    /// most urgent first, oldest first within a priority.
    pub fn get_active_tasks(&self, agent_id: &str) -> Result<Vec<TaskRow>, StoreError> {
        self.tasks_in_statuses(agent_id, "('pending', 'in-progress', 'blocked')")
    }

    pub fn get_blocked_tasks(&self, agent_id: &str) -> Result<Vec<TaskRow>, StoreError> {
        self.tasks_in_statuses(agent_id, "('blocked')")
    }

    fn tasks_in_statuses(
        &self,
        agent_id: &str,
        status_list: &str,
    ) -> Result<Vec<TaskRow>, StoreError> {
        if agent_row(&self.conn, agent_id)?.is_none() {
            return Err(StoreError::UnknownAgent);
        }
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks \
             WHERE agent_id = ?1 AND status IN {status_list} \
             ORDER BY {PRIORITY_RANK} ASC, created_at ASC, id ASC"
        ))?;
        let mut rows = stmt.query(params![agent_id])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(map_task_row(row)?);
        }
        Ok(out)
    }
}
