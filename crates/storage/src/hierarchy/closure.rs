#![forbid(unsafe_code)]

use crate::error::StoreError;
use rusqlite::{OptionalExtension, Transaction, params};
use std::collections::VecDeque;

/// Rebuild one agent's closure rows from its (current) manager's rows:
/// the depth-0 self row plus one row per manager ancestor with depth+1
/// and the agent's role appended to the path.
pub(crate) fn rebuild_agent_closure_tx(
    tx: &Transaction<'_>,
    agent_id: &str,
) -> Result<(), StoreError> {
    let row = tx
        .query_row(
            "SELECT role, reporting_to FROM agents WHERE id = ?1",
            params![agent_id],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, Option<String>>(1)?)),
        )
        .optional()?;
    let Some((role, reporting_to)) = row else {
        return Err(StoreError::UnknownAgent);
    };

    tx.execute(
        "DELETE FROM org_hierarchy WHERE agent_id = ?1",
        params![agent_id],
    )?;
    tx.execute(
        "INSERT INTO org_hierarchy(agent_id, ancestor_id, depth, path) VALUES (?1, ?1, 0, ?2)",
        params![agent_id, role],
    )?;
    if let Some(manager_id) = reporting_to {
        tx.execute(
            "INSERT INTO org_hierarchy(agent_id, ancestor_id, depth, path) \
             SELECT ?1, ancestor_id, depth + 1, path || '/' || ?2 \
             FROM org_hierarchy WHERE agent_id = ?3",
            params![agent_id, role, manager_id],
        )?;
    }
    Ok(())
}

/// Breadth-first worklist over the subordinate graph: every descendant's
/// ancestor chain passes through `root_agent_id`, so each gets its closure
/// rebuilt from its parent's already-rebuilt rows. Queue order guarantees
/// a parent is current before its children copy from it.
pub(crate) fn rebuild_subtree_closure_tx(
    tx: &Transaction<'_>,
    root_agent_id: &str,
) -> Result<(), StoreError> {
    let mut queue = VecDeque::new();
    queue.push_back(root_agent_id.to_string());

    while let Some(agent_id) = queue.pop_front() {
        rebuild_agent_closure_tx(tx, &agent_id)?;

        let mut stmt = tx.prepare("SELECT id FROM agents WHERE reporting_to = ?1 ORDER BY id")?;
        let mut rows = stmt.query(params![agent_id])?;
        while let Some(row) = rows.next()? {
            queue.push_back(row.get::<_, String>(0)?);
        }
    }
    Ok(())
}

/// The new manager must not sit inside the agent's own subtree.
pub(crate) fn ensure_no_cycle_tx(
    tx: &Transaction<'_>,
    agent_id: &str,
    new_manager_id: &str,
) -> Result<(), StoreError> {
    if agent_id == new_manager_id {
        return Err(StoreError::HierarchyCycle);
    }
    let descendant = tx
        .query_row(
            "SELECT 1 FROM org_hierarchy WHERE agent_id = ?1 AND ancestor_id = ?2 AND depth > 0",
            params![new_manager_id, agent_id],
            |row| row.get::<_, i64>(0),
        )
        .optional()?
        .is_some();
    if descendant {
        return Err(StoreError::HierarchyCycle);
    }
    Ok(())
}
