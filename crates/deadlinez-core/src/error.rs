use crate::task::TaskId;

/// Failure reported by a [`KeyValueStore`](crate::kv::KeyValueStore)
/// backend or while decoding what it returned.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid storage key {0:?}: use ASCII letters, digits, '-' or '_'")]
    InvalidKey(String),
    #[error("duplicate task id in stored collection: {0}")]
    DuplicateId(TaskId),
    #[error("{0}")]
    Backend(String),
}

#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("task storage unavailable (key {key:?})")]
    StorageUnavailable {
        key: String,
        #[source]
        source: StorageError,
    },
    #[error("task not found: {0}")]
    NotFound(TaskId),
    #[error("invalid task: {0}")]
    Validation(String),
}

impl TaskError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, TaskError::NotFound(_))
    }

    pub fn is_storage_unavailable(&self) -> bool {
        matches!(self, TaskError::StorageUnavailable { .. })
    }
}

/// An invite that could not be handed to the notification service.
/// Never invalidates a task mutation that already happened.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("invalid invite: {0}")]
    InvalidInvite(String),
    #[error("HTTP: {0}")]
    Http(#[from] reqwest::Error),
    #[error("notification service rejected invite ({status}): {reason}")]
    Rejected { status: u16, reason: String },
}
