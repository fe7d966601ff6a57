#![forbid(unsafe_code)]

use crate::error::StoreError;
use crate::types::{AuditEventRow, AuditStats};
use crate::{AuditEventInput, AuditQuery, SqliteStore, now_ms, to_sqlite_i64};
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};

const AUDIT_COLUMNS: &str =
    "id, timestamp, agent_id, action, target_agent_id, success, details, created_at";

pub(crate) struct AuditRecordTx<'a> {
    pub agent_id: Option<&'a str>,
    pub action: &'a str,
    pub target_agent_id: Option<&'a str>,
    pub success: bool,
    pub details: Option<String>,
    pub now_ms: i64,
}

/// Append one audit row. Works on a live transaction or a bare connection;
/// the trail has no other write path.
pub(crate) fn append_audit_tx(
    conn: &Connection,
    record: AuditRecordTx<'_>,
) -> Result<i64, StoreError> {
    conn.execute(
        "INSERT INTO audit_log(timestamp, agent_id, action, target_agent_id, success, details, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?1)",
        params![
            record.now_ms,
            record.agent_id,
            record.action,
            record.target_agent_id,
            record.success,
            record.details,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

fn map_audit_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<AuditEventRow> {
    Ok(AuditEventRow {
        id: row.get(0)?,
        timestamp: row.get(1)?,
        agent_id: row.get(2)?,
        action: row.get(3)?,
        target_agent_id: row.get(4)?,
        success: row.get::<_, i64>(5)? != 0,
        details: row.get(6)?,
        created_at: row.get(7)?,
    })
}

impl SqliteStore {
    /// Collaborator-facing append (`execute_start`, `execute_end`, ...);
    /// the engine's own mutations append inside their transactions.
    pub fn append_audit(&mut self, input: AuditEventInput) -> Result<AuditEventRow, StoreError> {
        if input.action.trim().is_empty() {
            return Err(StoreError::InvalidInput("audit action must not be empty"));
        }
        let id = append_audit_tx(
            &self.conn,
            AuditRecordTx {
                agent_id: input.agent_id.as_deref(),
                action: &input.action,
                target_agent_id: input.target_agent_id.as_deref(),
                success: input.success,
                details: input.details,
                now_ms: now_ms(),
            },
        )?;
        self.get_audit_event(id)?
            .ok_or(StoreError::InvalidInput("audit row vanished after insert"))
    }

    pub fn get_audit_event(&self, id: i64) -> Result<Option<AuditEventRow>, StoreError> {
        Ok(self
            .conn
            .query_row(
                &format!("SELECT {AUDIT_COLUMNS} FROM audit_log WHERE id = ?1"),
                params![id],
                map_audit_row,
            )
            .optional()?)
    }

    /// Conjunctive filters, newest first, limit/offset pagination.
    pub fn query_audit_log(&self, query: AuditQuery) -> Result<Vec<AuditEventRow>, StoreError> {
        let mut sql = format!("SELECT {AUDIT_COLUMNS} FROM audit_log");
        let mut clauses: Vec<String> = Vec::new();
        let mut binds: Vec<Value> = Vec::new();

        if let Some(agent_id) = query.agent_id {
            binds.push(Value::from(agent_id));
            clauses.push(format!("agent_id = ?{}", binds.len()));
        }
        if let Some(action) = query.action {
            binds.push(Value::from(action));
            clauses.push(format!("action = ?{}", binds.len()));
        }
        if let Some(target) = query.target_agent_id {
            binds.push(Value::from(target));
            clauses.push(format!("target_agent_id = ?{}", binds.len()));
        }
        if let Some(success) = query.success {
            binds.push(Value::from(success));
            clauses.push(format!("success = ?{}", binds.len()));
        }
        if let Some(since) = query.since {
            binds.push(Value::from(since));
            clauses.push(format!("timestamp >= ?{}", binds.len()));
        }
        if let Some(until) = query.until {
            binds.push(Value::from(until));
            clauses.push(format!("timestamp <= ?{}", binds.len()));
        }

        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }

        binds.push(Value::from(to_sqlite_i64(query.limit.unwrap_or(100))?));
        sql.push_str(&format!(" ORDER BY timestamp DESC, id DESC LIMIT ?{}", binds.len()));
        binds.push(Value::from(to_sqlite_i64(query.offset)?));
        sql.push_str(&format!(" OFFSET ?{}", binds.len()));

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(binds))?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(map_audit_row(row)?);
        }
        Ok(out)
    }

    /// Totals and a per-action histogram over an optional time range.
    pub fn audit_stats(
        &self,
        since: Option<i64>,
        until: Option<i64>,
    ) -> Result<AuditStats, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT action, success FROM audit_log \
             WHERE timestamp >= COALESCE(?1, timestamp) AND timestamp <= COALESCE(?2, timestamp)",
        )?;
        let mut rows = stmt.query(params![since, until])?;

        let mut stats = AuditStats::default();
        while let Some(row) = rows.next()? {
            let action = row.get::<_, String>(0)?;
            let success = row.get::<_, i64>(1)? != 0;
            stats.total += 1;
            if success {
                stats.succeeded += 1;
            } else {
                stats.failed += 1;
            }
            *stats.by_action.entry(action).or_insert(0) += 1;
        }
        Ok(stats)
    }
}
