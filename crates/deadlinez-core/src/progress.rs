use std::collections::BTreeMap;

use chrono::Datelike;
use serde::Serialize;
use tracing::debug;

use crate::datetime::{days_in_month, in_month, to_local_date};
use crate::error::TaskError;
use crate::task::Task;
use crate::views::check_month;

/// Due and completion counts for one calendar month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthProgress {
    pub month: u32,
    pub year: i32,
    pub due_count: usize,
    pub completed_count: usize,
    /// Completions per local day of month. Days without completions are
    /// absent.
    pub histogram: BTreeMap<u32, usize>,
}

impl MonthProgress {
    /// Histogram with every day of the month present, zero-filled.
    pub fn dense(&self) -> Vec<(u32, usize)> {
        let days = days_in_month(self.month, self.year).unwrap_or(0);
        (1..=days)
            .map(|day| (day, self.histogram.get(&day).copied().unwrap_or(0)))
            .collect()
    }
}

/// Counts tasks due in `(month, year)` and tasks completed in it.
///
/// The two are bucketed independently: due by the due date, completion
/// by the local date of the completion instant. A task due in March and
/// finished in April counts toward March's due count and April's
/// completed count.
#[tracing::instrument(skip(tasks), fields(count = tasks.len()))]
pub fn aggregate(tasks: &[Task], month: u32, year: i32) -> Result<MonthProgress, TaskError> {
    check_month(month)?;

    let due_count = tasks
        .iter()
        .filter(|t| in_month(t.due_date(), month, year))
        .count();

    let mut histogram = BTreeMap::new();
    let mut completed_count = 0;
    for completed_on in tasks.iter().filter_map(|t| t.completed_at()).map(to_local_date) {
        if in_month(completed_on, month, year) {
            completed_count += 1;
            *histogram.entry(completed_on.day()).or_insert(0) += 1;
        }
    }

    debug!(due_count, completed_count, days = histogram.len(), "aggregated month");
    Ok(MonthProgress {
        month,
        year,
        due_count,
        completed_count,
        histogram,
    })
}
