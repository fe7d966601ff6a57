#![forbid(unsafe_code)]

use oc_core::ids::AgentIdError;

#[derive(Debug)]
pub enum StoreError {
    Io(std::io::Error),
    Sql(rusqlite::Error),
    InvalidInput(&'static str),
    InvalidAgentId(AgentIdError),
    UnknownAgent,
    UnknownTask,
    UnknownSnapshot,
    AgentAlreadyExists,
    SnapshotAlreadyExists,
    VersionConflict { expected: i64, actual: i64 },
    DepthExceeded { depth: i64 },
    HierarchyCycle,
    ForbiddenTransition(&'static str),
    MigrationFailed { version: i64, message: String },
    RollbackUnsupported { version: i64 },
    SnapshotCorrupted,
}

impl StoreError {
    /// Stable machine-readable code; callers branch on this, not on the
    /// display text.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Io(_) => "IO",
            Self::Sql(_) => "SQL",
            Self::InvalidInput(_) | Self::InvalidAgentId(_) => "INVALID_INPUT",
            Self::UnknownAgent | Self::UnknownTask | Self::UnknownSnapshot => "NOT_FOUND",
            Self::AgentAlreadyExists | Self::SnapshotAlreadyExists => "ALREADY_EXISTS",
            Self::VersionConflict { .. } => "VERSION_CONFLICT",
            Self::DepthExceeded { .. } => "DEPTH_EXCEEDED",
            Self::HierarchyCycle => "HIERARCHY_CYCLE",
            Self::ForbiddenTransition(_) => "FORBIDDEN",
            Self::MigrationFailed { .. } => "MIGRATION_FAILED",
            Self::RollbackUnsupported { .. } => "ROLLBACK_UNSUPPORTED",
            Self::SnapshotCorrupted => "CORRUPT_SNAPSHOT",
        }
    }
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "io: {err}"),
            Self::Sql(err) => write!(f, "sqlite: {err}"),
            Self::InvalidInput(message) => write!(f, "invalid input: {message}"),
            Self::InvalidAgentId(err) => write!(f, "invalid agent id: {err}"),
            Self::UnknownAgent => write!(f, "unknown agent"),
            Self::UnknownTask => write!(f, "unknown task"),
            Self::UnknownSnapshot => write!(f, "unknown snapshot"),
            Self::AgentAlreadyExists => write!(f, "agent already exists"),
            Self::SnapshotAlreadyExists => write!(f, "snapshot already exists"),
            Self::VersionConflict { expected, actual } => {
                write!(f, "version conflict (expected={expected}, actual={actual})")
            }
            Self::DepthExceeded { depth } => {
                write!(f, "task depth {depth} exceeds the maximum")
            }
            Self::HierarchyCycle => write!(f, "reporting cycle"),
            Self::ForbiddenTransition(message) => {
                write!(f, "forbidden transition: {message}")
            }
            Self::MigrationFailed { version, message } => {
                write!(f, "migration {version} failed: {message}")
            }
            Self::RollbackUnsupported { version } => {
                write!(f, "migration {version} has no down statements")
            }
            Self::SnapshotCorrupted => write!(f, "snapshot failed integrity validation"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<std::io::Error> for StoreError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sql(value)
    }
}

impl From<AgentIdError> for StoreError {
    fn from(value: AgentIdError) -> Self {
        Self::InvalidAgentId(value)
    }
}
