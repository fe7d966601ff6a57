#![forbid(unsafe_code)]

mod runner;
pub(crate) mod sql;

pub use runner::{Migration, validate_migrations};

/// The registry `SqliteStore::open` applies at startup. External tooling
/// replaying or rolling back schema history consumes the same list.
pub fn builtin_migrations() -> Vec<Migration> {
    vec![
        Migration {
            version: 1,
            description: "core tables".to_string(),
            up: vec![
                sql::CREATE_AGENTS.to_string(),
                sql::CREATE_ORG_HIERARCHY.to_string(),
                sql::CREATE_TASKS.to_string(),
                sql::CREATE_AUDIT_LOG.to_string(),
                sql::CREATE_COUNTERS.to_string(),
            ],
            down: vec![
                "DROP TABLE IF EXISTS counters".to_string(),
                "DROP TABLE IF EXISTS audit_log".to_string(),
                "DROP TABLE IF EXISTS tasks".to_string(),
                "DROP TABLE IF EXISTS org_hierarchy".to_string(),
                "DROP TABLE IF EXISTS agents".to_string(),
            ],
        },
        Migration {
            version: 2,
            description: "query indexes".to_string(),
            up: sql::INDEXES.iter().map(|s| s.to_string()).collect(),
            down: sql::DROP_INDEXES.iter().map(|s| s.to_string()).collect(),
        },
        Migration {
            version: 3,
            description: "audit immutability triggers".to_string(),
            up: vec![
                sql::AUDIT_BLOCK_UPDATE.to_string(),
                sql::AUDIT_BLOCK_DELETE.to_string(),
            ],
            down: vec![
                "DROP TRIGGER IF EXISTS audit_log_block_delete".to_string(),
                "DROP TRIGGER IF EXISTS audit_log_block_update".to_string(),
            ],
        },
    ]
}
