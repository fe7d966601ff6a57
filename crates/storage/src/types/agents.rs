#![forbid(unsafe_code)]

#[derive(Clone, Debug)]
pub struct AgentRow {
    pub id: String,
    pub role: String,
    pub display_name: String,
    pub created_at: i64,
    pub created_by: Option<String>,
    pub reporting_to: Option<String>,
    pub status: String,
    pub main_goal: Option<String>,
    pub config_path: Option<String>,
    pub last_execution_at: Option<i64>,
    pub total_executions: i64,
    pub total_runtime_minutes: f64,
}

/// One closure-table row: `depth` is the distance from `agent_id` up to
/// `ancestor_id`, `path` the role chain from the ancestor down to the agent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrgHierarchyRow {
    pub agent_id: String,
    pub ancestor_id: String,
    pub depth: i64,
    pub path: String,
}

#[derive(Clone, Debug)]
pub struct OrgChartEntry {
    pub agent: AgentRow,
    /// Distance from the organization root.
    pub depth: i64,
    /// Full root-to-agent role chain.
    pub path: String,
}

#[derive(Clone, Debug)]
pub struct FireOutcome {
    pub agent_id: String,
    pub strategy: String,
    pub subordinates_reassigned: i64,
    pub tasks_reassigned: i64,
    pub tasks_archived: i64,
    pub agents_fired: i64,
    pub promoted_agent_id: Option<String>,
}
