#![forbid(unsafe_code)]

use std::collections::BTreeMap;

#[derive(Clone, Debug)]
pub struct AuditEventRow {
    pub id: i64,
    pub timestamp: i64,
    pub agent_id: Option<String>,
    pub action: String,
    pub target_agent_id: Option<String>,
    pub success: bool,
    pub details: Option<String>,
    pub created_at: i64,
}

#[derive(Clone, Debug, Default)]
pub struct AuditStats {
    pub total: i64,
    pub succeeded: i64,
    pub failed: i64,
    pub by_action: BTreeMap<String, i64>,
}
