#![forbid(unsafe_code)]

#[derive(Clone, Debug)]
pub struct CreateAgentRequest {
    pub id: String,
    pub role: String,
    pub display_name: String,
    pub reporting_to: Option<String>,
    pub created_by: Option<String>,
    pub main_goal: Option<String>,
    pub config_path: Option<String>,
}

/// Partial update; `Some(None)` on a doubly-optional field clears it.
#[derive(Clone, Debug, Default)]
pub struct UpdateAgentRequest {
    pub status: Option<String>,
    pub role: Option<String>,
    pub display_name: Option<String>,
    pub main_goal: Option<Option<String>>,
    pub config_path: Option<Option<String>>,
    pub reporting_to: Option<Option<String>>,
}

#[derive(Clone, Debug)]
pub struct CreateTaskRequest {
    pub agent_id: String,
    pub title: String,
    pub priority: Option<String>,
    pub parent_task_id: Option<String>,
    pub delegated_to: Option<String>,
    pub blocked_by: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct FireAgentRequest {
    pub agent_id: String,
    pub strategy: Option<String>,
    pub fired_by: Option<String>,
}

#[derive(Clone, Debug)]
pub struct AuditEventInput {
    pub agent_id: Option<String>,
    pub action: String,
    pub target_agent_id: Option<String>,
    pub success: bool,
    pub details: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct AuditQuery {
    pub agent_id: Option<String>,
    pub action: Option<String>,
    pub target_agent_id: Option<String>,
    pub success: Option<bool>,
    pub since: Option<i64>,
    pub until: Option<i64>,
    pub limit: Option<usize>,
    pub offset: usize,
}

#[derive(Clone, Debug)]
pub struct CreateSnapshotRequest {
    pub id: Option<String>,
    pub reason: String,
    pub agent_id: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct ListSnapshotsRequest {
    pub agent_id: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Clone, Copy, Debug)]
pub struct RestoreOptions {
    pub create_backup: bool,
    pub validate_integrity: bool,
}

impl Default for RestoreOptions {
    fn default() -> Self {
        Self {
            create_backup: true,
            validate_integrity: true,
        }
    }
}
