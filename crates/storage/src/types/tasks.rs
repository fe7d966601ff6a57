#![forbid(unsafe_code)]

#[derive(Clone, Debug)]
pub struct TaskRow {
    pub id: String,
    pub agent_id: String,
    pub title: String,
    pub status: String,
    pub priority: String,
    pub created_at: i64,
    pub started_at: Option<i64>,
    pub completed_at: Option<i64>,
    pub parent_task_id: Option<String>,
    pub depth: i64,
    pub percent_complete: f64,
    pub subtasks_completed: i64,
    pub subtasks_total: i64,
    pub delegated_to: Option<String>,
    pub delegated_at: Option<i64>,
    pub blocked_by: Vec<String>,
    pub blocked_since: Option<i64>,
    pub task_path: String,
    pub version: i64,
    pub last_updated: i64,
    pub last_executed: Option<i64>,
    pub execution_count: i64,
}
