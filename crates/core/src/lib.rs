#![forbid(unsafe_code)]

pub mod ids {
    /// Stable agent slug: 2-64 characters, lowercase ASCII alphanumerics
    /// and hyphens, no leading or trailing hyphen.
    #[derive(Clone, Debug, PartialEq, Eq, Hash)]
    pub struct AgentId(String);

    impl AgentId {
        pub fn as_str(&self) -> &str {
            &self.0
        }

        pub fn into_string(self) -> String {
            self.0
        }

        pub fn try_new(value: impl Into<String>) -> Result<Self, AgentIdError> {
            let value = value.into();
            validate_agent_id(&value)?;
            Ok(Self(value))
        }
    }

    #[derive(Clone, Debug, PartialEq, Eq)]
    pub enum AgentIdError {
        Empty,
        TooShort,
        TooLong,
        LeadingHyphen,
        TrailingHyphen,
        InvalidChar { ch: char, index: usize },
    }

    impl std::fmt::Display for AgentIdError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                Self::Empty => write!(f, "agent id must not be empty"),
                Self::TooShort => write!(f, "agent id must be at least 2 characters"),
                Self::TooLong => write!(f, "agent id must be at most 64 characters"),
                Self::LeadingHyphen => write!(f, "agent id must not start with a hyphen"),
                Self::TrailingHyphen => write!(f, "agent id must not end with a hyphen"),
                Self::InvalidChar { ch, index } => {
                    write!(f, "agent id has invalid character {ch:?} at index {index}")
                }
            }
        }
    }

    impl std::error::Error for AgentIdError {}

    fn validate_agent_id(value: &str) -> Result<(), AgentIdError> {
        if value.is_empty() {
            return Err(AgentIdError::Empty);
        }
        if value.len() < 2 {
            return Err(AgentIdError::TooShort);
        }
        if value.len() > 64 {
            return Err(AgentIdError::TooLong);
        }
        if value.starts_with('-') {
            return Err(AgentIdError::LeadingHyphen);
        }
        if value.ends_with('-') {
            return Err(AgentIdError::TrailingHyphen);
        }
        for (index, ch) in value.chars().enumerate() {
            if ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-' {
                continue;
            }
            return Err(AgentIdError::InvalidChar { ch, index });
        }
        Ok(())
    }
}

pub mod model {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub enum AgentStatus {
        Active,
        Paused,
        Fired,
    }

    impl AgentStatus {
        pub fn as_str(self) -> &'static str {
            match self {
                AgentStatus::Active => "active",
                AgentStatus::Paused => "paused",
                AgentStatus::Fired => "fired",
            }
        }

        pub fn parse(value: &str) -> Option<Self> {
            match value {
                "active" => Some(AgentStatus::Active),
                "paused" => Some(AgentStatus::Paused),
                "fired" => Some(AgentStatus::Fired),
                _ => None,
            }
        }
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub enum TaskStatus {
        Pending,
        InProgress,
        Completed,
        Blocked,
        Failed,
        Archived,
    }

    impl TaskStatus {
        pub fn as_str(self) -> &'static str {
            match self {
                TaskStatus::Pending => "pending",
                TaskStatus::InProgress => "in-progress",
                TaskStatus::Completed => "completed",
                TaskStatus::Blocked => "blocked",
                TaskStatus::Failed => "failed",
                TaskStatus::Archived => "archived",
            }
        }

        pub fn parse(value: &str) -> Option<Self> {
            match value {
                "pending" => Some(TaskStatus::Pending),
                "in-progress" => Some(TaskStatus::InProgress),
                "completed" => Some(TaskStatus::Completed),
                "blocked" => Some(TaskStatus::Blocked),
                "failed" => Some(TaskStatus::Failed),
                "archived" => Some(TaskStatus::Archived),
                _ => None,
            }
        }

        /// A task still in flight: pending, in-progress or blocked.
        pub fn is_active(self) -> bool {
            matches!(
                self,
                TaskStatus::Pending | TaskStatus::InProgress | TaskStatus::Blocked
            )
        }

        pub fn is_terminal(self) -> bool {
            matches!(
                self,
                TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Archived
            )
        }
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub enum TaskPriority {
        Low,
        Medium,
        High,
        Urgent,
    }

    impl TaskPriority {
        pub fn as_str(self) -> &'static str {
            match self {
                TaskPriority::Low => "low",
                TaskPriority::Medium => "medium",
                TaskPriority::High => "high",
                TaskPriority::Urgent => "urgent",
            }
        }

        pub fn parse(value: &str) -> Option<Self> {
            match value {
                "low" => Some(TaskPriority::Low),
                "medium" => Some(TaskPriority::Medium),
                "high" => Some(TaskPriority::High),
                "urgent" => Some(TaskPriority::Urgent),
                _ => None,
            }
        }

        /// Sort key for work queues: urgent first.
        pub fn rank(self) -> i64 {
            match self {
                TaskPriority::Urgent => 0,
                TaskPriority::High => 1,
                TaskPriority::Medium => 2,
                TaskPriority::Low => 3,
            }
        }
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub enum FireStrategy {
        Reassign,
        Promote,
        Cascade,
    }

    impl FireStrategy {
        pub fn as_str(self) -> &'static str {
            match self {
                FireStrategy::Reassign => "reassign",
                FireStrategy::Promote => "promote",
                FireStrategy::Cascade => "cascade",
            }
        }

        pub fn parse(value: &str) -> Option<Self> {
            match value {
                "reassign" => Some(FireStrategy::Reassign),
                "promote" => Some(FireStrategy::Promote),
                "cascade" => Some(FireStrategy::Cascade),
                _ => None,
            }
        }
    }
}

pub mod org {
    /// Maximum task nesting depth; a root task sits at depth 0.
    pub const MAX_TASK_DEPTH: i64 = 5;
}
