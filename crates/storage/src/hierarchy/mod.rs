#![forbid(unsafe_code)]

pub(crate) mod closure;

use crate::audit::{AuditRecordTx, append_audit_tx};
use crate::error::StoreError;
use crate::types::{AgentRow, OrgChartEntry, OrgHierarchyRow};
use crate::{
    CreateAgentRequest, SqliteStore, UpdateAgentRequest, is_constraint_violation, now_ms,
};
use oc_core::ids::AgentId;
use oc_core::model::AgentStatus;
use rusqlite::{Connection, OptionalExtension, params};
use serde_json::json;

pub(crate) const AGENT_COLUMNS: &str = "id, role, display_name, created_at, created_by, \
     reporting_to, status, main_goal, config_path, last_execution_at, total_executions, \
     total_runtime_minutes";

pub(crate) fn map_agent_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<AgentRow> {
    Ok(AgentRow {
        id: row.get(0)?,
        role: row.get(1)?,
        display_name: row.get(2)?,
        created_at: row.get(3)?,
        created_by: row.get(4)?,
        reporting_to: row.get(5)?,
        status: row.get(6)?,
        main_goal: row.get(7)?,
        config_path: row.get(8)?,
        last_execution_at: row.get(9)?,
        total_executions: row.get(10)?,
        total_runtime_minutes: row.get(11)?,
    })
}

pub(crate) fn agent_row(conn: &Connection, id: &str) -> Result<Option<AgentRow>, StoreError> {
    Ok(conn
        .query_row(
            &format!("SELECT {AGENT_COLUMNS} FROM agents WHERE id = ?1"),
            params![id],
            map_agent_row,
        )
        .optional()?)
}

pub(crate) fn is_fired(agent: &AgentRow) -> bool {
    agent.status == AgentStatus::Fired.as_str()
}

impl SqliteStore {
    /// Hire an agent: insert the row, seed the depth-0 self closure and
    /// copy the manager's ancestor chain, all in one transaction.
    pub fn create_agent(&mut self, request: CreateAgentRequest) -> Result<AgentRow, StoreError> {
        let agent_id = AgentId::try_new(request.id)?;
        if request.role.trim().is_empty() {
            return Err(StoreError::InvalidInput("agent role must not be empty"));
        }

        let now = now_ms();
        let tx = self.conn.transaction()?;

        if let Some(manager_id) = request.reporting_to.as_deref() {
            let manager = agent_row(&tx, manager_id)?.ok_or(StoreError::UnknownAgent)?;
            if is_fired(&manager) {
                return Err(StoreError::InvalidInput(
                    "new agents cannot report to a fired agent",
                ));
            }
        }

        let insert = tx.execute(
            "INSERT INTO agents(id, role, display_name, created_at, created_by, reporting_to, \
             status, main_goal, config_path) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                agent_id.as_str(),
                request.role,
                request.display_name,
                now,
                request.created_by,
                request.reporting_to,
                AgentStatus::Active.as_str(),
                request.main_goal,
                request.config_path,
            ],
        );
        if let Err(err) = insert {
            if is_constraint_violation(&err) {
                return Err(StoreError::AgentAlreadyExists);
            }
            return Err(StoreError::Sql(err));
        }

        closure::rebuild_agent_closure_tx(&tx, agent_id.as_str())?;

        append_audit_tx(
            &tx,
            AuditRecordTx {
                agent_id: request.created_by.as_deref(),
                action: "hire",
                target_agent_id: Some(agent_id.as_str()),
                success: true,
                details: Some(
                    json!({
                        "role": request.role,
                        "reporting_to": request.reporting_to,
                    })
                    .to_string(),
                ),
                now_ms: now,
            },
        )?;

        let row = agent_row(&tx, agent_id.as_str())?.ok_or(StoreError::UnknownAgent)?;
        tx.commit()?;
        Ok(row)
    }

    /// Field updates in one UPDATE; a `reporting_to` or role change
    /// additionally rebuilds the closure of the whole reparented subtree
    /// inside the same transaction.
    pub fn update_agent(
        &mut self,
        id: &str,
        request: UpdateAgentRequest,
    ) -> Result<AgentRow, StoreError> {
        let UpdateAgentRequest {
            status,
            role,
            display_name,
            main_goal,
            config_path,
            reporting_to,
        } = request;

        if status.is_none()
            && role.is_none()
            && display_name.is_none()
            && main_goal.is_none()
            && config_path.is_none()
            && reporting_to.is_none()
        {
            return Err(StoreError::InvalidInput("no fields to edit"));
        }

        let new_status = match status.as_deref() {
            None => None,
            Some(raw) => {
                let parsed = AgentStatus::parse(raw)
                    .ok_or(StoreError::InvalidInput("unknown agent status"))?;
                if parsed == AgentStatus::Fired {
                    return Err(StoreError::ForbiddenTransition(
                        "agents are fired through the fire operation",
                    ));
                }
                Some(parsed)
            }
        };
        if let Some(new_role) = role.as_deref()
            && new_role.trim().is_empty()
        {
            return Err(StoreError::InvalidInput("agent role must not be empty"));
        }

        let now = now_ms();
        let tx = self.conn.transaction()?;

        let current = agent_row(&tx, id)?.ok_or(StoreError::UnknownAgent)?;
        if is_fired(&current) {
            return Err(StoreError::ForbiddenTransition(
                "fired agents accept no updates",
            ));
        }

        let next_reporting_to = reporting_to
            .clone()
            .unwrap_or_else(|| current.reporting_to.clone());
        let reparented = next_reporting_to != current.reporting_to;
        if reparented && let Some(manager_id) = next_reporting_to.as_deref() {
            let manager = agent_row(&tx, manager_id)?.ok_or(StoreError::UnknownAgent)?;
            if is_fired(&manager) {
                return Err(StoreError::InvalidInput(
                    "agents cannot report to a fired agent",
                ));
            }
            closure::ensure_no_cycle_tx(&tx, id, manager_id)?;
        }

        let next_role = role.unwrap_or_else(|| current.role.clone());
        let role_changed = next_role != current.role;

        tx.execute(
            "UPDATE agents SET role = ?2, display_name = ?3, status = ?4, main_goal = ?5, \
             config_path = ?6, reporting_to = ?7 WHERE id = ?1",
            params![
                id,
                next_role,
                display_name.unwrap_or(current.display_name),
                new_status
                    .map(AgentStatus::as_str)
                    .unwrap_or(current.status.as_str()),
                main_goal.unwrap_or(current.main_goal),
                config_path.unwrap_or(current.config_path),
                next_reporting_to,
            ],
        )?;

        // Ancestor paths embed roles, so a role change invalidates the
        // subtree's closure exactly like a reparent does.
        if reparented || role_changed {
            closure::rebuild_subtree_closure_tx(&tx, id)?;
        }

        append_audit_tx(
            &tx,
            AuditRecordTx {
                agent_id: None,
                action: if reparented { "reparent" } else { "update_agent" },
                target_agent_id: Some(id),
                success: true,
                details: Some(
                    json!({
                        "reporting_to": next_reporting_to,
                        "role_changed": role_changed,
                    })
                    .to_string(),
                ),
                now_ms: now,
            },
        )?;

        let row = agent_row(&tx, id)?.ok_or(StoreError::UnknownAgent)?;
        tx.commit()?;
        Ok(row)
    }

    /// Execution-counter bump for the orchestrator.
    pub fn record_agent_execution(
        &mut self,
        id: &str,
        runtime_minutes: f64,
    ) -> Result<AgentRow, StoreError> {
        if !runtime_minutes.is_finite() || runtime_minutes < 0.0 {
            return Err(StoreError::InvalidInput(
                "runtime minutes must be a non-negative number",
            ));
        }
        let now = now_ms();
        let tx = self.conn.transaction()?;
        let current = agent_row(&tx, id)?.ok_or(StoreError::UnknownAgent)?;
        if is_fired(&current) {
            return Err(StoreError::ForbiddenTransition(
                "fired agents accept no updates",
            ));
        }
        tx.execute(
            "UPDATE agents SET last_execution_at = ?2, total_executions = total_executions + 1, \
             total_runtime_minutes = total_runtime_minutes + ?3 WHERE id = ?1",
            params![id, now, runtime_minutes],
        )?;
        append_audit_tx(
            &tx,
            AuditRecordTx {
                agent_id: Some(id),
                action: "record_execution",
                target_agent_id: None,
                success: true,
                details: Some(json!({ "runtime_minutes": runtime_minutes }).to_string()),
                now_ms: now,
            },
        )?;
        let row = agent_row(&tx, id)?.ok_or(StoreError::UnknownAgent)?;
        tx.commit()?;
        Ok(row)
    }

    pub fn get_agent(&self, id: &str) -> Result<Option<AgentRow>, StoreError> {
        agent_row(&self.conn, id)
    }

    /// Direct and transitive reports in breadth order: closure rows with
    /// depth > 0 under the manager, ordered by depth then display name.
    pub fn get_subordinates(&self, manager_id: &str) -> Result<Vec<AgentRow>, StoreError> {
        if agent_row(&self.conn, manager_id)?.is_none() {
            return Err(StoreError::UnknownAgent);
        }
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {AGENT_COLUMNS} FROM agents \
             JOIN org_hierarchy ON org_hierarchy.agent_id = agents.id \
             WHERE org_hierarchy.ancestor_id = ?1 AND org_hierarchy.depth > 0 \
             ORDER BY org_hierarchy.depth ASC, agents.display_name ASC"
        ))?;
        let mut rows = stmt.query(params![manager_id])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(map_agent_row(row)?);
        }
        Ok(out)
    }

    /// Every agent with its distance from the root and full root-to-agent
    /// role path (the deepest closure row), ordered by path so subtrees
    /// group together.
    pub fn get_org_chart(&self) -> Result<Vec<OrgChartEntry>, StoreError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {AGENT_COLUMNS}, org_hierarchy.depth, org_hierarchy.path FROM agents \
             JOIN org_hierarchy ON org_hierarchy.agent_id = agents.id \
             WHERE org_hierarchy.depth = \
               (SELECT MAX(h.depth) FROM org_hierarchy h WHERE h.agent_id = agents.id) \
             ORDER BY org_hierarchy.path ASC"
        ))?;
        let mut rows = stmt.query([])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(OrgChartEntry {
                agent: map_agent_row(row)?,
                depth: row.get(12)?,
                path: row.get(13)?,
            });
        }
        Ok(out)
    }

    /// One agent's closure rows, nearest ancestor first.
    pub fn get_agent_closure(&self, agent_id: &str) -> Result<Vec<OrgHierarchyRow>, StoreError> {
        if agent_row(&self.conn, agent_id)?.is_none() {
            return Err(StoreError::UnknownAgent);
        }
        let mut stmt = self.conn.prepare(
            "SELECT agent_id, ancestor_id, depth, path FROM org_hierarchy \
             WHERE agent_id = ?1 ORDER BY depth ASC",
        )?;
        let mut rows = stmt.query(params![agent_id])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(OrgHierarchyRow {
                agent_id: row.get(0)?,
                ancestor_id: row.get(1)?,
                depth: row.get(2)?,
                path: row.get(3)?,
            });
        }
        Ok(out)
    }
}
