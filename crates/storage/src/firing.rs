#![forbid(unsafe_code)]

use crate::audit::{AuditRecordTx, append_audit_tx};
use crate::error::StoreError;
use crate::hierarchy::closure::rebuild_subtree_closure_tx;
use crate::hierarchy::{AGENT_COLUMNS, agent_row, is_fired, map_agent_row};
use crate::types::{AgentRow, FireOutcome};
use crate::{FireAgentRequest, SqliteStore, now_ms};
use oc_core::model::{AgentStatus, FireStrategy};
use rusqlite::{Transaction, params};
use serde_json::json;

impl SqliteStore {
    /// Fire an agent with one of the subordinate-handling strategies. The
    /// whole restructuring (status flips, reparenting, task reassignment
    /// or archival, and the audit record) commits as one transaction.
    /// A rejected fire still leaves a `success = false` audit row; that
    /// best-effort write never masks the original error.
    pub fn fire_agent(&mut self, request: FireAgentRequest) -> Result<FireOutcome, StoreError> {
        let strategy = match request.strategy.as_deref() {
            None => FireStrategy::Reassign,
            Some(raw) => FireStrategy::parse(raw)
                .ok_or(StoreError::InvalidInput("unknown fire strategy"))?,
        };

        match self.fire_agent_tx(&request.agent_id, strategy, request.fired_by.as_deref()) {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                let _ = append_audit_tx(
                    &self.conn,
                    AuditRecordTx {
                        agent_id: request.fired_by.as_deref(),
                        action: "fire",
                        target_agent_id: Some(request.agent_id.as_str()),
                        success: false,
                        details: Some(
                            json!({
                                "strategy": strategy.as_str(),
                                "error": err.code(),
                            })
                            .to_string(),
                        ),
                        now_ms: now_ms(),
                    },
                );
                Err(err)
            }
        }
    }

    fn fire_agent_tx(
        &mut self,
        agent_id: &str,
        strategy: FireStrategy,
        fired_by: Option<&str>,
    ) -> Result<FireOutcome, StoreError> {
        let now = now_ms();
        let tx = self.conn.transaction()?;

        let agent = agent_row(&tx, agent_id)?.ok_or(StoreError::UnknownAgent)?;
        if is_fired(&agent) {
            return Err(StoreError::ForbiddenTransition("agent is already fired"));
        }
        let Some(manager_id) = agent.reporting_to.clone() else {
            return Err(StoreError::ForbiddenTransition(
                "the root agent cannot be fired",
            ));
        };

        let direct = direct_subordinates_tx(&tx, agent_id)?;
        let mut outcome = FireOutcome {
            agent_id: agent_id.to_string(),
            strategy: strategy.as_str().to_string(),
            subordinates_reassigned: 0,
            tasks_reassigned: 0,
            tasks_archived: 0,
            agents_fired: 0,
            promoted_agent_id: None,
        };

        match strategy {
            FireStrategy::Reassign => {
                for subordinate in &direct {
                    reparent_tx(&tx, &subordinate.id, &manager_id)?;
                    outcome.subordinates_reassigned += 1;
                }
                outcome.tasks_reassigned =
                    reassign_surviving_tasks_tx(&tx, agent_id, &manager_id, now)?;
                set_fired_tx(&tx, agent_id)?;
                outcome.agents_fired = 1;
            }
            FireStrategy::Promote => {
                // direct_subordinates_tx orders by created_at then id, so
                // the successor pick is deterministic.
                let Some(successor) = direct.first() else {
                    return Err(StoreError::InvalidInput(
                        "promote requires at least one direct subordinate",
                    ));
                };
                reparent_tx(&tx, &successor.id, &manager_id)?;
                for subordinate in direct.iter().skip(1) {
                    reparent_tx(&tx, &subordinate.id, &successor.id)?;
                    outcome.subordinates_reassigned += 1;
                }
                outcome.tasks_reassigned =
                    reassign_surviving_tasks_tx(&tx, agent_id, &successor.id, now)?;
                outcome.promoted_agent_id = Some(successor.id.clone());
                set_fired_tx(&tx, agent_id)?;
                outcome.agents_fired = 1;
            }
            FireStrategy::Cascade => {
                // Closure descendants include the agent itself at depth 0.
                let mut stmt = tx.prepare(
                    "SELECT agent_id FROM org_hierarchy WHERE ancestor_id = ?1 \
                     ORDER BY depth ASC, agent_id ASC",
                )?;
                let mut rows = stmt.query(params![agent_id])?;
                let mut members = Vec::new();
                while let Some(row) = rows.next()? {
                    members.push(row.get::<_, String>(0)?);
                }
                drop(rows);
                drop(stmt);

                for member in &members {
                    set_fired_tx(&tx, member)?;
                    outcome.tasks_archived += archive_surviving_tasks_tx(&tx, member, now)?;
                }
                outcome.agents_fired = members.len() as i64;
            }
        }

        append_audit_tx(
            &tx,
            AuditRecordTx {
                agent_id: fired_by,
                action: "fire",
                target_agent_id: Some(agent_id),
                success: true,
                details: Some(
                    json!({
                        "strategy": outcome.strategy.as_str(),
                        "subordinates_reassigned": outcome.subordinates_reassigned,
                        "tasks_reassigned": outcome.tasks_reassigned,
                        "tasks_archived": outcome.tasks_archived,
                        "agents_fired": outcome.agents_fired,
                        "promoted": &outcome.promoted_agent_id,
                    })
                    .to_string(),
                ),
                now_ms: now,
            },
        )?;

        tx.commit()?;
        Ok(outcome)
    }
}

fn direct_subordinates_tx(
    tx: &Transaction<'_>,
    manager_id: &str,
) -> Result<Vec<AgentRow>, StoreError> {
    let mut stmt = tx.prepare(&format!(
        "SELECT {AGENT_COLUMNS} FROM agents WHERE reporting_to = ?1 \
         ORDER BY created_at ASC, id ASC"
    ))?;
    let mut rows = stmt.query(params![manager_id])?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        out.push(map_agent_row(row)?);
    }
    Ok(out)
}

fn reparent_tx(
    tx: &Transaction<'_>,
    agent_id: &str,
    new_manager_id: &str,
) -> Result<(), StoreError> {
    tx.execute(
        "UPDATE agents SET reporting_to = ?2 WHERE id = ?1",
        params![agent_id, new_manager_id],
    )?;
    rebuild_subtree_closure_tx(tx, agent_id)
}

fn set_fired_tx(tx: &Transaction<'_>, agent_id: &str) -> Result<(), StoreError> {
    tx.execute(
        "UPDATE agents SET status = ?2 WHERE id = ?1",
        params![agent_id, AgentStatus::Fired.as_str()],
    )?;
    Ok(())
}

/// Move every still-in-flight task to a new owner. The version bump makes
/// stale optimistic readers conflict instead of writing to a moved row.
fn reassign_surviving_tasks_tx(
    tx: &Transaction<'_>,
    from_agent_id: &str,
    to_agent_id: &str,
    now: i64,
) -> Result<i64, StoreError> {
    let affected = tx.execute(
        "UPDATE tasks SET agent_id = ?2, version = version + 1, last_updated = ?3 \
         WHERE agent_id = ?1 AND status IN ('pending', 'in-progress', 'blocked')",
        params![from_agent_id, to_agent_id, now],
    )?;
    Ok(affected as i64)
}

fn archive_surviving_tasks_tx(
    tx: &Transaction<'_>,
    agent_id: &str,
    now: i64,
) -> Result<i64, StoreError> {
    let affected = tx.execute(
        "UPDATE tasks SET status = 'archived', blocked_since = NULL, version = version + 1, \
         last_updated = ?2 WHERE agent_id = ?1 AND status IN ('pending', 'in-progress', 'blocked')",
        params![agent_id, now],
    )?;
    Ok(affected as i64)
}
