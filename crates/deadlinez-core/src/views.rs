//! Read-only projections over a task collection.
//!
//! Nothing here is stored: every list is computed from the collection
//! and a reference "now" at the moment it is asked for, so urgency is
//! always current and two screens can never disagree.

use std::cmp::Reverse;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::Serialize;

use crate::datetime::{in_month, to_local_date};
use crate::error::TaskError;
use crate::task::{Task, TaskId};
use crate::urgency::Urgency;

/// A task as displayed, with urgency computed for the projection's now.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TaskRow<'a> {
    pub task: &'a Task,
    pub urgency: Urgency,
}

#[derive(Debug, Clone, Copy)]
pub struct ViewProjector<'a> {
    tasks: &'a [Task],
    now: DateTime<Utc>,
}

impl<'a> ViewProjector<'a> {
    pub fn new(tasks: &'a [Task], now: DateTime<Utc>) -> Self {
        Self { tasks, now }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    /// The first `n` pending tasks, soonest due first.
    pub fn upcoming(&self, n: usize) -> Vec<TaskRow<'a>> {
        let mut rows = self.pending();
        rows.truncate(n);
        rows
    }

    /// Every pending task, soonest due first. Equal due dates keep
    /// insertion order.
    pub fn pending(&self) -> Vec<TaskRow<'a>> {
        let mut tasks: Vec<&'a Task> = self.tasks.iter().filter(|t| !t.is_completed()).collect();
        tasks.sort_by_key(|t| t.due_date());
        self.rows(tasks)
    }

    /// The first `n` completed tasks by due date, latest due first.
    pub fn recent_completed(&self, n: usize) -> Vec<TaskRow<'a>> {
        let mut tasks: Vec<&'a Task> = self.tasks.iter().filter(|t| t.is_completed()).collect();
        tasks.sort_by_key(|t| Reverse(t.due_date()));
        tasks.truncate(n);
        self.rows(tasks)
    }

    pub fn by_id(&self, id: &TaskId) -> Result<TaskRow<'a>, TaskError> {
        self.tasks
            .iter()
            .find(|t| t.id() == id)
            .map(|t| self.row(t))
            .ok_or_else(|| TaskError::NotFound(id.clone()))
    }

    /// Pending tasks due within the given month.
    pub fn due_in_month(&self, month: u32, year: i32) -> Result<Vec<TaskRow<'a>>, TaskError> {
        check_month(month)?;
        Ok(self
            .pending()
            .into_iter()
            .filter(|row| in_month(row.task.due_date(), month, year))
            .collect())
    }

    /// Pending tasks due after the given month ends.
    pub fn due_after_month(&self, month: u32, year: i32) -> Result<Vec<TaskRow<'a>>, TaskError> {
        check_month(month)?;
        Ok(self
            .pending()
            .into_iter()
            .filter(|row| month_key(row.task.due_date()) > (year, month))
            .collect())
    }

    /// Tasks completed (by local completion date) within the given month,
    /// in completion order.
    pub fn completed_in_month(&self, month: u32, year: i32) -> Result<Vec<TaskRow<'a>>, TaskError> {
        check_month(month)?;
        let mut tasks: Vec<&'a Task> = self
            .tasks
            .iter()
            .filter(|t| {
                t.completed_at()
                    .is_some_and(|at| in_month(to_local_date(at), month, year))
            })
            .collect();
        tasks.sort_by_key(|t| t.completed_at());
        Ok(self.rows(tasks))
    }

    fn rows(&self, tasks: Vec<&'a Task>) -> Vec<TaskRow<'a>> {
        tasks.into_iter().map(|t| self.row(t)).collect()
    }

    fn row(&self, task: &'a Task) -> TaskRow<'a> {
        TaskRow {
            task,
            urgency: task.urgency(self.now),
        }
    }
}

pub(crate) fn check_month(month: u32) -> Result<(), TaskError> {
    if (1..=12).contains(&month) {
        Ok(())
    } else {
        Err(TaskError::Validation(format!("month must be 1-12, got {month}")))
    }
}

fn month_key(date: NaiveDate) -> (i32, u32) {
    (date.year(), date.month())
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::task::fixtures::{completed, date, pending};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 5, 12, 0, 0).single().expect("valid instant")
    }

    fn at(month: u32, day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, month, day, 12, 0, 0).single().expect("valid instant")
    }

    fn titles(rows: &[TaskRow<'_>]) -> Vec<String> {
        rows.iter().map(|r| r.task.title().to_string()).collect()
    }

    #[test]
    fn empty_collection_projects_to_empty_lists() {
        let tasks: Vec<Task> = vec![];
        let view = ViewProjector::new(&tasks, now());
        assert!(view.upcoming(4).is_empty());
        assert!(view.pending().is_empty());
        assert!(view.recent_completed(10).is_empty());
        assert!(view.due_in_month(3, 2025).expect("valid month").is_empty());
        assert!(view.completed_in_month(3, 2025).expect("valid month").is_empty());
    }

    #[test]
    fn upcoming_is_ascending_stable_and_skips_completed() {
        let tasks = vec![
            pending("c", date(2025, 3, 20)),
            pending("a1", date(2025, 3, 7)),
            completed("done", date(2025, 3, 1), at(3, 1)),
            pending("a2", date(2025, 3, 7)),
            pending("d", date(2025, 4, 24)),
            pending("e", date(2025, 5, 1)),
        ];
        let view = ViewProjector::new(&tasks, now());

        assert_eq!(titles(&view.upcoming(4)), vec!["a1", "a2", "c", "d"]);
        assert_eq!(titles(&view.pending()), vec!["a1", "a2", "c", "d", "e"]);
        assert_eq!(view.upcoming(0).len(), 0);
        assert_eq!(view.upcoming(50).len(), 5);
    }

    #[test]
    fn recent_completed_is_descending_and_stable() {
        let tasks = vec![
            completed("old", date(2025, 1, 10), at(1, 9)),
            completed("tie1", date(2025, 2, 10), at(2, 9)),
            pending("open", date(2025, 6, 1)),
            completed("new", date(2025, 3, 1), at(3, 1)),
            completed("tie2", date(2025, 2, 10), at(2, 1)),
        ];
        let view = ViewProjector::new(&tasks, now());

        assert_eq!(titles(&view.recent_completed(10)), vec!["new", "tie1", "tie2", "old"]);
        assert_eq!(titles(&view.recent_completed(2)), vec!["new", "tie1"]);
    }

    #[test]
    fn rows_carry_read_time_urgency() {
        let tasks = vec![pending("soon", date(2025, 3, 7)), pending("later", date(2025, 3, 27))];
        let early = ViewProjector::new(&tasks, Utc.with_ymd_and_hms(2025, 2, 1, 12, 0, 0).single().expect("valid"));
        assert!(early.pending().iter().all(|r| !r.urgency.urgent));

        let late = ViewProjector::new(&tasks, Utc.with_ymd_and_hms(2025, 3, 26, 12, 0, 0).single().expect("valid"));
        assert!(late.pending().iter().all(|r| r.urgency.urgent));
    }

    #[test]
    fn by_id_finds_or_reports_not_found() {
        let tasks = vec![pending("a", date(2025, 3, 7))];
        let view = ViewProjector::new(&tasks, now());
        let id = tasks[0].id().clone();

        assert_eq!(view.by_id(&id).expect("present").task.title(), "a");
        assert!(view.by_id(&TaskId::from("nope")).expect_err("absent").is_not_found());
    }

    #[test]
    fn month_lists_split_this_month_from_later() {
        let tasks = vec![
            pending("feb", date(2025, 2, 27)),
            pending("mar20", date(2025, 3, 20)),
            pending("mar7", date(2025, 3, 7)),
            pending("apr", date(2025, 4, 24)),
            pending("next-jan", date(2026, 1, 2)),
            completed("mar-done", date(2025, 3, 2), at(3, 3)),
        ];
        let view = ViewProjector::new(&tasks, now());

        assert_eq!(titles(&view.due_in_month(3, 2025).expect("valid")), vec!["mar7", "mar20"]);
        assert_eq!(titles(&view.due_after_month(3, 2025).expect("valid")), vec!["apr", "next-jan"]);
        assert!(view.due_in_month(0, 2025).is_err());
        assert!(view.due_after_month(13, 2025).is_err());
    }

    #[test]
    fn completed_in_month_uses_completion_date() {
        let tasks = vec![
            completed("due-mar-done-apr", date(2025, 3, 5), at(4, 2)),
            completed("due-apr-done-apr", date(2025, 4, 1), at(4, 1)),
            completed("due-mar-done-mar", date(2025, 3, 1), at(3, 2)),
        ];
        let view = ViewProjector::new(&tasks, now());

        assert_eq!(
            titles(&view.completed_in_month(4, 2025).expect("valid")),
            vec!["due-apr-done-apr", "due-mar-done-apr"]
        );
        assert_eq!(titles(&view.completed_in_month(3, 2025).expect("valid")), vec!["due-mar-done-mar"]);
    }
}
