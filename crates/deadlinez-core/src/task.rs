use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::datetime::{iso_date_serde, iso_datetime_serde, start_of_local_day};
use crate::error::TaskError;
use crate::urgency::{Urgency, urgency};

/// Opaque task identifier. New ids are UUID v4 strings, but any string
/// read back from storage is kept as-is.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn random() -> Self {
        Self(Uuid::new_v4().hyphenated().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for TaskId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// The fixed colour palette a task can be tagged with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Color {
    Pink,
    Green,
    Blue,
    Purple,
    Yellow,
}

impl Color {
    pub const ALL: [Color; 5] = [
        Color::Pink,
        Color::Green,
        Color::Blue,
        Color::Purple,
        Color::Yellow,
    ];

    pub fn hex(self) -> &'static str {
        match self {
            Color::Pink => "#F5C6D6",
            Color::Green => "#B4E1C5",
            Color::Blue => "#B5D8E8",
            Color::Purple => "#C2AFF0",
            Color::Yellow => "#F4D58D",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Color::Pink => "pink",
            Color::Green => "green",
            Color::Blue => "blue",
            Color::Purple => "purple",
            Color::Yellow => "yellow",
        }
    }
}

impl FromStr for Color {
    type Err = TaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        Color::ALL
            .into_iter()
            .find(|c| c.name().eq_ignore_ascii_case(needle) || c.hex().eq_ignore_ascii_case(needle))
            .ok_or_else(|| TaskError::Validation(format!("unknown color: {needle}")))
    }
}

impl Serialize for Color {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.hex())
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Whether a task is done, and when. Being completed without a
/// completion instant is not representable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Pending,
    Completed { at: DateTime<Utc> },
}

impl Completion {
    pub fn is_completed(&self) -> bool {
        matches!(self, Completion::Completed { .. })
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Completion::Completed { at } => Some(*at),
            Completion::Pending => None,
        }
    }
}

/// User input for a new task, before validation.
#[derive(Debug, Clone, Default)]
pub struct TaskDraft {
    pub title: String,
    pub due_date: Option<NaiveDate>,
    pub assigned_email: Option<String>,
    pub color: Option<Color>,
}

impl TaskDraft {
    pub fn new(title: impl Into<String>, due_date: NaiveDate) -> Self {
        Self {
            title: title.into(),
            due_date: Some(due_date),
            ..Self::default()
        }
    }

    pub fn assigned_to(mut self, email: impl Into<String>) -> Self {
        self.assigned_email = Some(email.into());
        self
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.color = Some(color);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "TaskRecord", into = "TaskRecord")]
pub struct Task {
    id: TaskId,
    title: String,
    due_date: NaiveDate,
    assigned_email: Option<String>,
    color: Option<Color>,
    completion: Completion,
}

impl Task {
    /// Validates a draft into a fresh pending task with a new id.
    pub fn from_draft(draft: TaskDraft) -> Result<Self, TaskError> {
        if draft.title.trim().is_empty() {
            return Err(TaskError::Validation("title must not be empty".to_string()));
        }
        let due_date = draft
            .due_date
            .ok_or_else(|| TaskError::Validation("due date is required".to_string()))?;

        Ok(Self {
            id: TaskId::random(),
            title: draft.title,
            due_date,
            assigned_email: normalize_email(draft.assigned_email),
            color: draft.color,
            completion: Completion::Pending,
        })
    }

    pub fn id(&self) -> &TaskId {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn due_date(&self) -> NaiveDate {
        self.due_date
    }

    pub fn assigned_email(&self) -> Option<&str> {
        self.assigned_email.as_deref()
    }

    pub fn color(&self) -> Option<Color> {
        self.color
    }

    pub fn completion(&self) -> &Completion {
        &self.completion
    }

    pub fn is_completed(&self) -> bool {
        self.completion.is_completed()
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completion.completed_at()
    }

    /// Start of the due date in local time.
    pub fn due_at(&self) -> DateTime<Utc> {
        start_of_local_day(self.due_date)
    }

    pub fn urgency(&self, now: DateTime<Utc>) -> Urgency {
        urgency(self.due_at(), now)
    }

    /// Marks the task completed at `now`. Completing twice is an error,
    /// the second call would otherwise move the completion date.
    pub fn complete(&mut self, now: DateTime<Utc>) -> Result<(), TaskError> {
        if self.is_completed() {
            return Err(TaskError::NotFound(self.id.clone()));
        }
        self.completion = Completion::Completed { at: now };
        Ok(())
    }
}

fn normalize_email(email: Option<String>) -> Option<String> {
    email
        .map(|e| e.trim().to_string())
        .filter(|e| !e.is_empty())
}

/// On-disk shape of a task, shared with the original app's storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TaskRecord {
    id: TaskId,
    title: String,
    #[serde(with = "iso_date_serde")]
    date: NaiveDate,
    #[serde(default)]
    assigned_email: Option<String>,
    #[serde(default)]
    selected_color: Option<Color>,
    #[serde(default)]
    completed: bool,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "iso_datetime_serde::option"
    )]
    completed_date: Option<DateTime<Utc>>,
}

impl TryFrom<TaskRecord> for Task {
    type Error = String;

    fn try_from(record: TaskRecord) -> Result<Self, Self::Error> {
        let completion = match (record.completed, record.completed_date) {
            (true, Some(at)) => Completion::Completed { at },
            (true, None) => {
                return Err(format!("task {} is completed but has no completedDate", record.id));
            }
            (false, Some(_)) => {
                tracing::warn!(id = %record.id, "dropping completedDate on pending task");
                Completion::Pending
            }
            (false, None) => Completion::Pending,
        };

        Ok(Self {
            id: record.id,
            title: record.title,
            due_date: record.date,
            assigned_email: normalize_email(record.assigned_email),
            color: record.selected_color,
            completion,
        })
    }
}

impl From<Task> for TaskRecord {
    fn from(task: Task) -> Self {
        Self {
            id: task.id,
            title: task.title,
            date: task.due_date,
            assigned_email: task.assigned_email,
            selected_color: task.color,
            completed: task.completion.is_completed(),
            completed_date: task.completion.completed_at(),
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use chrono::{DateTime, NaiveDate, Utc};

    use super::{Completion, Task, TaskDraft};

    pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
    }

    pub fn pending(title: &str, due: NaiveDate) -> Task {
        Task::from_draft(TaskDraft::new(title, due)).expect("valid draft")
    }

    pub fn completed(title: &str, due: NaiveDate, at: DateTime<Utc>) -> Task {
        let mut task = pending(title, due);
        task.completion = Completion::Completed { at };
        task
    }
}
