#![forbid(unsafe_code)]

use super::sql;
use crate::error::StoreError;
use crate::{SqliteStore, now_ms};
use rusqlite::{Connection, params};
use std::collections::BTreeSet;

/// One versioned, transactional schema change. An empty `down` list marks
/// the migration as irreversible.
#[derive(Clone, Debug)]
pub struct Migration {
    pub version: i64,
    pub description: String,
    pub up: Vec<String>,
    pub down: Vec<String>,
}

pub fn validate_migrations(migrations: &[Migration]) -> Result<(), StoreError> {
    let mut seen = BTreeSet::new();
    for migration in migrations {
        if migration.version <= 0 {
            return Err(StoreError::InvalidInput(
                "migration version must be positive",
            ));
        }
        if !seen.insert(migration.version) {
            return Err(StoreError::InvalidInput("duplicate migration version"));
        }
        if migration.description.trim().is_empty() {
            return Err(StoreError::InvalidInput(
                "migration description must not be empty",
            ));
        }
        if migration.up.is_empty() {
            return Err(StoreError::InvalidInput(
                "migration has no up statements",
            ));
        }
        for statement in migration.up.iter().chain(migration.down.iter()) {
            if statement.trim().is_empty() {
                return Err(StoreError::InvalidInput(
                    "migration statement must not be blank",
                ));
            }
        }
    }
    Ok(())
}

impl SqliteStore {
    /// Applies every migration whose version exceeds the recorded schema
    /// version, in ascending order, one transaction each. Returns how many
    /// were applied; re-invoking with the same set is a no-op.
    pub fn run_migrations(&mut self, migrations: &[Migration]) -> Result<usize, StoreError> {
        validate_migrations(migrations)?;
        ensure_version_table(&self.conn)?;
        let current = current_version(&self.conn)?;

        let mut pending: Vec<&Migration> = migrations
            .iter()
            .filter(|migration| migration.version > current)
            .collect();
        pending.sort_by_key(|migration| migration.version);

        let mut applied = 0;
        for migration in pending {
            let tx = self.conn.transaction()?;
            for statement in &migration.up {
                if let Err(err) = tx.execute_batch(statement) {
                    return Err(StoreError::MigrationFailed {
                        version: migration.version,
                        message: err.to_string(),
                    });
                }
            }
            tx.execute(
                "INSERT INTO schema_version(version, applied_at, description) VALUES (?1, ?2, ?3)",
                params![migration.version, now_ms(), migration.description],
            )?;
            tx.commit()?;
            applied += 1;
        }
        Ok(applied)
    }

    /// Reverses the `count` most recently applied migrations in descending
    /// order, one transaction each. Every targeted migration must carry
    /// down statements and appear in the provided set.
    pub fn rollback_migrations(
        &mut self,
        migrations: &[Migration],
        count: usize,
    ) -> Result<usize, StoreError> {
        validate_migrations(migrations)?;
        ensure_version_table(&self.conn)?;

        let versions = applied_versions_desc(&self.conn, count)?;
        let mut plan = Vec::with_capacity(versions.len());
        for version in versions {
            let Some(migration) = migrations
                .iter()
                .find(|migration| migration.version == version)
            else {
                return Err(StoreError::MigrationFailed {
                    version,
                    message: "applied version has no descriptor in the provided set".to_string(),
                });
            };
            if migration.down.is_empty() {
                return Err(StoreError::RollbackUnsupported { version });
            }
            plan.push(migration);
        }

        let rolled_back = plan.len();
        for migration in plan {
            let tx = self.conn.transaction()?;
            for statement in &migration.down {
                if let Err(err) = tx.execute_batch(statement) {
                    return Err(StoreError::MigrationFailed {
                        version: migration.version,
                        message: err.to_string(),
                    });
                }
            }
            tx.execute(
                "DELETE FROM schema_version WHERE version = ?1",
                params![migration.version],
            )?;
            tx.commit()?;
        }
        Ok(rolled_back)
    }

    /// Highest applied schema version, 0 when none.
    pub fn schema_version_current(&self) -> Result<i64, StoreError> {
        ensure_version_table(&self.conn)?;
        current_version(&self.conn)
    }
}

fn ensure_version_table(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(sql::CREATE_SCHEMA_VERSION)?;
    Ok(())
}

fn current_version(conn: &Connection) -> Result<i64, StoreError> {
    Ok(conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get::<_, i64>(0),
    )?)
}

fn applied_versions_desc(conn: &Connection, count: usize) -> Result<Vec<i64>, StoreError> {
    let mut stmt =
        conn.prepare("SELECT version FROM schema_version ORDER BY version DESC LIMIT ?1")?;
    let mut rows = stmt.query(params![crate::to_sqlite_i64(count)?])?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        out.push(row.get::<_, i64>(0)?);
    }
    Ok(out)
}
