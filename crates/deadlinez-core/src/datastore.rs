use std::collections::HashSet;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::error::{StorageError, TaskError};
use crate::kv::KeyValueStore;
use crate::task::{Task, TaskDraft, TaskId};

pub const DEFAULT_TASKS_KEY: &str = "tasks";

/// The authoritative task collection, kept as one JSON array under a
/// single key of the backing store.
///
/// Every mutation reads the current collection, changes it and writes
/// the whole array back. There is no concurrency token: with two
/// overlapping writers the last write wins.
#[derive(Debug)]
pub struct TaskStore<S> {
    backend: S,
    key: String,
}

impl<S: KeyValueStore> TaskStore<S> {
    pub fn new(backend: S) -> Self {
        Self::with_key(backend, DEFAULT_TASKS_KEY)
    }

    pub fn with_key(backend: S, key: impl Into<String>) -> Self {
        Self {
            backend,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn backend(&self) -> &S {
        &self.backend
    }

    pub fn into_backend(self) -> S {
        self.backend
    }

    /// Reads the whole collection in storage (insertion) order. A missing
    /// key is an empty collection.
    #[tracing::instrument(skip(self), fields(key = %self.key))]
    pub fn load(&self) -> Result<Vec<Task>, TaskError> {
        let raw = self.backend.get(&self.key).map_err(|source| self.unavailable(source))?;
        let Some(raw) = raw else {
            debug!("no stored collection yet");
            return Ok(Vec::new());
        };
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }

        let tasks: Vec<Task> = serde_json::from_str(&raw)
            .map_err(|err| self.unavailable(StorageError::from(err)))?;

        let mut seen = HashSet::with_capacity(tasks.len());
        if let Some(dup) = tasks.iter().find(|t| !seen.insert(t.id())) {
            return Err(self.unavailable(StorageError::DuplicateId(dup.id().clone())));
        }
        debug!(count = tasks.len(), "loaded tasks");
        Ok(tasks)
    }

    /// [`load`](Self::load) for readers: an unreadable store shows as an
    /// empty collection instead of failing the view.
    pub fn load_or_empty(&self) -> Vec<Task> {
        match self.load() {
            Ok(tasks) => tasks,
            Err(err) => {
                warn!(error = %err, source = ?std::error::Error::source(&err), "treating unreadable task store as empty");
                Vec::new()
            }
        }
    }

    #[tracing::instrument(skip(self, tasks), fields(key = %self.key, count = tasks.len()))]
    pub fn save(&mut self, tasks: &[Task]) -> Result<(), TaskError> {
        let serialized = serde_json::to_string(tasks).map_err(|err| self.unavailable(err.into()))?;
        self.backend
            .set(&self.key, &serialized)
            .map_err(|source| self.unavailable(source))
    }

    #[tracing::instrument(skip(self, draft), fields(key = %self.key))]
    pub fn create(&mut self, draft: TaskDraft) -> Result<Task, TaskError> {
        let task = Task::from_draft(draft)?;
        self.insert(task)
    }

    /// Appends a validated task, refusing an id already in the collection.
    fn insert(&mut self, task: Task) -> Result<Task, TaskError> {
        let mut tasks = self.load()?;
        if tasks.iter().any(|t| t.id() == task.id()) {
            return Err(TaskError::Validation(format!("task id {} already exists", task.id())));
        }

        tasks.push(task.clone());
        self.save(&tasks)?;

        info!(id = %task.id(), title = %task.title(), due = %task.due_date(), "created task");
        Ok(task)
    }

    pub fn complete(&mut self, id: &TaskId) -> Result<Task, TaskError> {
        self.complete_at(id, Utc::now())
    }

    /// Completes a pending task. An unknown id and an already completed
    /// task both fail with `NotFound`.
    #[tracing::instrument(skip(self, now), fields(key = %self.key, id = %id))]
    pub fn complete_at(&mut self, id: &TaskId, now: DateTime<Utc>) -> Result<Task, TaskError> {
        let mut tasks = self.load()?;
        let task = tasks
            .iter_mut()
            .find(|t| t.id() == id)
            .ok_or_else(|| TaskError::NotFound(id.clone()))?;

        task.complete(now)?;
        let done = task.clone();
        self.save(&tasks)?;

        info!(completed_at = %now, "completed task");
        Ok(done)
    }

    #[tracing::instrument(skip(self), fields(key = %self.key, id = %id))]
    pub fn delete(&mut self, id: &TaskId) -> Result<(), TaskError> {
        let mut tasks = self.load()?;
        let idx = tasks
            .iter()
            .position(|t| t.id() == id)
            .ok_or_else(|| TaskError::NotFound(id.clone()))?;

        let removed = tasks.remove(idx);
        self.save(&tasks)?;

        info!(title = %removed.title(), remaining = tasks.len(), "deleted task");
        Ok(())
    }

    fn unavailable(&self, source: StorageError) -> TaskError {
        TaskError::StorageUnavailable {
            key: self.key.clone(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::kv::MemoryStore;
    use crate::task::Color;
    use crate::task::fixtures::date;

    struct BrokenStore;

    impl KeyValueStore for BrokenStore {
        fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Err(StorageError::Backend("disk unplugged".to_string()))
        }

        fn set(&mut self, _key: &str, _value: &str) -> Result<(), StorageError> {
            Err(StorageError::Backend("disk unplugged".to_string()))
        }
    }

    fn store() -> TaskStore<MemoryStore> {
        TaskStore::new(MemoryStore::new())
    }

    #[test]
    fn create_then_load_roundtrips_the_draft() {
        let mut store = store();
        let draft = TaskDraft::new("Capstone phase 1", date(2025, 3, 7))
            .assigned_to("pal@example.com")
            .with_color(Color::Green);

        let created = store.create(draft).expect("create");
        let loaded = store.load().expect("load");

        assert_eq!(loaded, vec![created.clone()]);
        assert_eq!(created.title(), "Capstone phase 1");
        assert_eq!(created.due_date(), date(2025, 3, 7));
        assert_eq!(created.assigned_email(), Some("pal@example.com"));
        assert_eq!(created.color(), Some(Color::Green));
        assert!(!created.is_completed());
        assert!(!created.id().as_str().is_empty());
    }

    #[test]
    fn padded_title_survives_create_and_load() {
        let mut store = store();
        let created = store.create(TaskDraft::new(" Report  ", date(2025, 3, 7))).expect("create");

        assert_eq!(created.title(), " Report  ");
        assert_eq!(store.load().expect("load")[0].title(), " Report  ");
    }

    #[test]
    fn storage_order_is_insertion_order() {
        let mut store = store();
        let late = store.create(TaskDraft::new("late", date(2025, 5, 1))).expect("create");
        let early = store.create(TaskDraft::new("early", date(2025, 1, 1))).expect("create");

        let ids: Vec<_> = store.load().expect("load").into_iter().map(|t| t.id().clone()).collect();
        assert_eq!(ids, vec![late.id().clone(), early.id().clone()]);
        assert_ne!(late.id(), early.id());
    }

    #[test]
    fn invalid_draft_writes_nothing() {
        let mut store = store();
        let err = store.create(TaskDraft::new("", date(2025, 3, 7))).expect_err("blank title");
        assert!(matches!(err, TaskError::Validation(_)));
        assert_eq!(store.backend().get(DEFAULT_TASKS_KEY).expect("get"), None);
    }

    #[test]
    fn complete_sets_date_and_is_not_idempotent() {
        let mut store = store();
        let task = store.create(TaskDraft::new("Report", date(2025, 3, 5))).expect("create");
        let now = Utc.with_ymd_and_hms(2025, 4, 2, 9, 0, 0).single().expect("valid instant");

        let done = store.complete_at(task.id(), now).expect("complete");
        assert_eq!(done.completed_at(), Some(now));
        assert_eq!(store.load().expect("load")[0].completed_at(), Some(now));

        let later = now + chrono::Duration::hours(1);
        let err = store.complete_at(task.id(), later).expect_err("second completion");
        assert!(err.is_not_found());
        assert_eq!(store.load().expect("load")[0].completed_at(), Some(now));
    }

    #[test]
    fn complete_unknown_id_is_not_found() {
        let mut store = store();
        let err = store.complete(&TaskId::from("missing")).expect_err("unknown id");
        assert!(err.is_not_found());
    }

    #[test]
    fn delete_missing_leaves_collection_unchanged() {
        let mut store = store();
        store.create(TaskDraft::new("a", date(2025, 3, 5))).expect("create");
        store.create(TaskDraft::new("b", date(2025, 3, 6))).expect("create");
        let before = store.load().expect("load");

        let err = store.delete(&TaskId::from("missing")).expect_err("unknown id");
        assert!(err.is_not_found());

        let after = store.load().expect("load");
        assert_eq!(before.len(), after.len());
        assert_eq!(before, after);
    }

    #[test]
    fn delete_removes_only_the_target() {
        let mut store = store();
        let a = store.create(TaskDraft::new("a", date(2025, 3, 5))).expect("create");
        let b = store.create(TaskDraft::new("b", date(2025, 3, 6))).expect("create");

        store.delete(a.id()).expect("delete");
        assert_eq!(store.load().expect("load"), vec![b]);
        assert!(store.delete(a.id()).expect_err("already deleted").is_not_found());
    }

    #[test]
    fn unreadable_store_reads_as_empty_but_mutations_fail() {
        let mut store = TaskStore::new(BrokenStore);
        assert!(store.load().expect_err("broken").is_storage_unavailable());
        assert!(store.load_or_empty().is_empty());

        let err = store.create(TaskDraft::new("a", date(2025, 3, 5))).expect_err("broken");
        assert!(err.is_storage_unavailable());
    }

    #[test]
    fn duplicate_ids_in_storage_are_rejected() {
        let record = r#"{"id":"0.5","title":"x","date":"2025-03-05","assignedEmail":null,"selectedColor":null,"completed":false}"#;
        let mut backend = MemoryStore::new();
        backend.set(DEFAULT_TASKS_KEY, &format!("[{record},{record}]")).expect("set");
        let mut store = TaskStore::new(backend);

        let err = store.load().expect_err("duplicate ids");
        assert!(matches!(
            err,
            TaskError::StorageUnavailable { source: StorageError::DuplicateId(ref id), .. } if id.as_str() == "0.5"
        ));
        assert!(store.delete(&TaskId::from("0.5")).expect_err("no write").is_storage_unavailable());
        assert!(store.load_or_empty().is_empty());
    }

    #[test]
    fn insert_refuses_an_existing_id() {
        let mut store = store();
        let first = store.create(TaskDraft::new("a", date(2025, 3, 5))).expect("create");

        let err = store.insert(first.clone()).expect_err("same id");
        assert!(matches!(err, TaskError::Validation(_)));
        assert_eq!(store.load().expect("load"), vec![first]);
    }

    #[test]
    fn corrupt_payload_is_storage_unavailable() {
        let mut backend = MemoryStore::new();
        backend.set(DEFAULT_TASKS_KEY, "{not json").expect("set");
        let store = TaskStore::new(backend);

        assert!(store.load().expect_err("corrupt").is_storage_unavailable());
        assert!(store.load_or_empty().is_empty());
    }
}
