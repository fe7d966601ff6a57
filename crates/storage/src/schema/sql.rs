#![forbid(unsafe_code)]

pub(crate) const CREATE_SCHEMA_VERSION: &str = "\
CREATE TABLE IF NOT EXISTS schema_version (
  version INTEGER PRIMARY KEY,
  applied_at INTEGER NOT NULL,
  description TEXT NOT NULL
)";

pub(super) const CREATE_AGENTS: &str = "\
CREATE TABLE IF NOT EXISTS agents (
  id TEXT PRIMARY KEY,
  role TEXT NOT NULL,
  display_name TEXT NOT NULL,
  created_at INTEGER NOT NULL,
  created_by TEXT,
  reporting_to TEXT REFERENCES agents(id),
  status TEXT NOT NULL DEFAULT 'active',
  main_goal TEXT,
  config_path TEXT,
  last_execution_at INTEGER,
  total_executions INTEGER NOT NULL DEFAULT 0,
  total_runtime_minutes REAL NOT NULL DEFAULT 0
)";

pub(super) const CREATE_ORG_HIERARCHY: &str = "\
CREATE TABLE IF NOT EXISTS org_hierarchy (
  agent_id TEXT NOT NULL REFERENCES agents(id),
  ancestor_id TEXT NOT NULL REFERENCES agents(id),
  depth INTEGER NOT NULL,
  path TEXT NOT NULL,
  PRIMARY KEY (agent_id, ancestor_id)
)";

pub(super) const CREATE_TASKS: &str = "\
CREATE TABLE IF NOT EXISTS tasks (
  id TEXT PRIMARY KEY,
  agent_id TEXT NOT NULL REFERENCES agents(id),
  title TEXT NOT NULL,
  status TEXT NOT NULL DEFAULT 'pending',
  priority TEXT NOT NULL DEFAULT 'medium',
  created_at INTEGER NOT NULL,
  started_at INTEGER,
  completed_at INTEGER,
  parent_task_id TEXT REFERENCES tasks(id),
  depth INTEGER NOT NULL DEFAULT 0,
  percent_complete REAL NOT NULL DEFAULT 0,
  subtasks_completed INTEGER NOT NULL DEFAULT 0,
  subtasks_total INTEGER NOT NULL DEFAULT 0,
  delegated_to TEXT,
  delegated_at INTEGER,
  blocked_by TEXT NOT NULL DEFAULT '[]',
  blocked_since INTEGER,
  task_path TEXT NOT NULL,
  version INTEGER NOT NULL DEFAULT 0,
  last_updated INTEGER NOT NULL,
  last_executed INTEGER,
  execution_count INTEGER NOT NULL DEFAULT 0
)";

pub(super) const CREATE_AUDIT_LOG: &str = "\
CREATE TABLE IF NOT EXISTS audit_log (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  timestamp INTEGER NOT NULL,
  agent_id TEXT,
  action TEXT NOT NULL,
  target_agent_id TEXT,
  success INTEGER NOT NULL,
  details TEXT,
  created_at INTEGER NOT NULL
)";

pub(super) const CREATE_COUNTERS: &str = "\
CREATE TABLE IF NOT EXISTS counters (
  name TEXT PRIMARY KEY,
  value INTEGER NOT NULL
)";

pub(super) const INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_org_hierarchy_ancestor ON org_hierarchy(ancestor_id, depth)",
    "CREATE INDEX IF NOT EXISTS idx_agents_reporting_to ON agents(reporting_to)",
    "CREATE INDEX IF NOT EXISTS idx_tasks_agent_status ON tasks(agent_id, status)",
    "CREATE INDEX IF NOT EXISTS idx_tasks_parent ON tasks(parent_task_id)",
    "CREATE INDEX IF NOT EXISTS idx_audit_log_timestamp ON audit_log(timestamp)",
    "CREATE INDEX IF NOT EXISTS idx_audit_log_agent ON audit_log(agent_id, timestamp)",
];

pub(super) const DROP_INDEXES: &[&str] = &[
    "DROP INDEX IF EXISTS idx_audit_log_agent",
    "DROP INDEX IF EXISTS idx_audit_log_timestamp",
    "DROP INDEX IF EXISTS idx_tasks_parent",
    "DROP INDEX IF EXISTS idx_tasks_agent_status",
    "DROP INDEX IF EXISTS idx_agents_reporting_to",
    "DROP INDEX IF EXISTS idx_org_hierarchy_ancestor",
];

// The audit trail is append-only; mutating statements abort at the store
// level so no access path can rewrite history.
pub(super) const AUDIT_BLOCK_UPDATE: &str = "\
CREATE TRIGGER IF NOT EXISTS audit_log_block_update
BEFORE UPDATE ON audit_log
BEGIN
  SELECT RAISE(ABORT, 'audit_log is append-only');
END";

pub(super) const AUDIT_BLOCK_DELETE: &str = "\
CREATE TRIGGER IF NOT EXISTS audit_log_block_delete
BEFORE DELETE ON audit_log
BEGIN
  SELECT RAISE(ABORT, 'audit_log is append-only');
END";
