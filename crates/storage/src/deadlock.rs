#![forbid(unsafe_code)]

use crate::error::StoreError;
use crate::SqliteStore;
use rusqlite::{OptionalExtension, params};
use std::collections::BTreeSet;

impl SqliteStore {
    /// Depth-first search over task -> blocker edges starting at `task_id`.
    /// Returns the minimal cycle (closing duplicate excluded) when the
    /// current path revisits a node, `None` when the reachable subgraph is
    /// acyclic. Read-only; blocker ids that resolve to no task contribute
    /// no edge.
    pub fn detect_task_deadlock(
        &self,
        task_id: &str,
    ) -> Result<Option<Vec<String>>, StoreError> {
        let Some(initial) = self.task_blockers(task_id)? else {
            return Err(StoreError::UnknownTask);
        };

        let mut visited: BTreeSet<String> = BTreeSet::new();
        let mut on_path: BTreeSet<String> = BTreeSet::new();
        let mut path: Vec<String> = vec![task_id.to_string()];
        on_path.insert(task_id.to_string());

        // (node, its blockers, next blocker index): an explicit frame
        // stack instead of recursion, so graph size bounds memory, not the
        // call stack.
        let mut stack: Vec<(String, Vec<String>, usize)> =
            vec![(task_id.to_string(), initial, 0)];

        loop {
            let next = {
                let Some(frame) = stack.last_mut() else {
                    break;
                };
                if frame.2 < frame.1.len() {
                    let next = frame.1[frame.2].clone();
                    frame.2 += 1;
                    Some(next)
                } else {
                    None
                }
            };

            let Some(next) = next else {
                if let Some((node, _, _)) = stack.pop() {
                    on_path.remove(&node);
                    path.pop();
                    visited.insert(node);
                }
                continue;
            };

            if on_path.contains(&next) {
                let start = path.iter().position(|node| node == &next).unwrap_or(0);
                return Ok(Some(path[start..].to_vec()));
            }
            if visited.contains(&next) {
                continue;
            }
            let Some(blockers) = self.task_blockers(&next)? else {
                continue;
            };
            on_path.insert(next.clone());
            path.push(next.clone());
            stack.push((next, blockers, 0));
        }

        Ok(None)
    }

    /// Scheduler sweep: run the detector from every blocked task and
    /// return the distinct cycles found.
    pub fn detect_all_deadlocks(&self) -> Result<Vec<Vec<String>>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id FROM tasks WHERE status = 'blocked' ORDER BY id")?;
        let mut rows = stmt.query([])?;
        let mut blocked = Vec::new();
        while let Some(row) = rows.next()? {
            blocked.push(row.get::<_, String>(0)?);
        }

        let mut seen = BTreeSet::new();
        let mut cycles = Vec::new();
        for task_id in blocked {
            if let Some(cycle) = self.detect_task_deadlock(&task_id)?
                && seen.insert(canonical_cycle_key(&cycle))
            {
                cycles.push(cycle);
            }
        }
        Ok(cycles)
    }

    /// `None` when the task does not exist (a dangling reference).
    fn task_blockers(&self, task_id: &str) -> Result<Option<Vec<String>>, StoreError> {
        let raw = self
            .conn
            .query_row(
                "SELECT blocked_by FROM tasks WHERE id = ?1",
                params![task_id],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        match raw {
            None => Ok(None),
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|_| StoreError::InvalidInput("stored blocked_by list is corrupt")),
        }
    }
}

/// The same cycle reported from different entry points differs only by
/// rotation; keying on the rotation that starts at the smallest member
/// deduplicates them.
fn canonical_cycle_key(cycle: &[String]) -> String {
    let Some(min_index) = cycle
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.cmp(b.1))
        .map(|(index, _)| index)
    else {
        return String::new();
    };
    let mut rotated = Vec::with_capacity(cycle.len());
    rotated.extend_from_slice(&cycle[min_index..]);
    rotated.extend_from_slice(&cycle[..min_index]);
    rotated.join("->")
}
