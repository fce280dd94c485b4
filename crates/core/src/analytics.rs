//! Derived counts for the stats and calendar views.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::model::{Category, CustomCategory, Priority, Task};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryStats {
    pub key: String,
    pub label: String,
    pub total: usize,
    pub completed: usize,
    pub percent: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSummary {
    pub total: usize,
    pub completed: usize,
    pub pending: usize,
    pub completion_rate: u8,
    /// High-priority tasks still open.
    pub high_open: usize,
    pub high_completion_rate: u8,
    pub due_today: usize,
    pub categories: Vec<CategoryStats>,
}

impl TaskSummary {
    /// Built-in categories come first, then custom ones in creation order.
    pub fn from_tasks(tasks: &[Task], today: NaiveDate, custom: &[CustomCategory]) -> Self {
        let total = tasks.len();
        let completed = tasks.iter().filter(|task| task.completed).count();
        let high: Vec<&Task> = tasks
            .iter()
            .filter(|task| task.priority == Priority::High)
            .collect();
        let high_done = high.iter().filter(|task| task.completed).count();

        let keys = Category::BUILT_IN
            .iter()
            .map(|category| (category.key.to_string(), category.label.to_string()))
            .chain(
                custom
                    .iter()
                    .map(|category| (category.id.clone(), category.name.clone())),
            );
        let categories = keys
            .map(|(key, label)| {
                let in_category = tasks.iter().filter(|task| task.category == key);
                let total = in_category.clone().count();
                let completed = in_category.filter(|task| task.completed).count();
                CategoryStats {
                    key,
                    label,
                    total,
                    completed,
                    percent: percent(completed, total),
                }
            })
            .collect();

        Self {
            total,
            completed,
            pending: total - completed,
            completion_rate: percent(completed, total),
            high_open: high.len() - high_done,
            high_completion_rate: percent(high_done, high.len()),
            due_today: tasks
                .iter()
                .filter(|task| task.due_date == Some(today))
                .count(),
            categories,
        }
    }
}

/// Whole percent, rounding halves up. Zero when there is nothing to count.
pub fn percent(part: usize, whole: usize) -> u8 {
    if whole == 0 {
        return 0;
    }
    let scaled = (part * 200 + whole) / (whole * 2);
    scaled.min(100) as u8
}

/// Tasks grouped by due date, for the calendar. Undated tasks are skipped.
pub fn tasks_by_day(tasks: &[Task]) -> BTreeMap<NaiveDate, Vec<&Task>> {
    let mut days: BTreeMap<NaiveDate, Vec<&Task>> = BTreeMap::new();
    for task in tasks {
        if let Some(date) = task.due_date {
            days.entry(date).or_default().push(task);
        }
    }
    days
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn task(id: &str, priority: Priority, category: &str, completed: bool) -> Task {
        Task {
            id: id.into(),
            title: format!("Task {id}"),
            description: None,
            priority,
            category: category.into(),
            due_date: None,
            due_time: None,
            recurring: false,
            reminder: false,
            completed,
            created_at: DateTime::<Utc>::UNIX_EPOCH,
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, 21).unwrap()
    }

    #[rstest]
    #[case(0, 0, 0)]
    #[case(1, 3, 33)]
    #[case(2, 3, 67)]
    #[case(1, 8, 13)]
    #[case(3, 3, 100)]
    fn percent_rounds_half_up(#[case] part: usize, #[case] whole: usize, #[case] expected: u8) {
        assert_eq!(percent(part, whole), expected);
    }

    #[test]
    fn summary_counts_priorities_and_categories() {
        let mut due = task("4", Priority::Low, "study", false);
        due.due_date = Some(today());
        let tasks = vec![
            task("1", Priority::High, "work", true),
            task("2", Priority::High, "work", false),
            task("3", Priority::Medium, "errands-id", true),
            due,
        ];
        let custom = vec![CustomCategory {
            id: "errands-id".into(),
            name: "Errands".into(),
            color: "#123456".into(),
        }];

        let summary = TaskSummary::from_tasks(&tasks, today(), &custom);

        assert_eq!(summary.total, 4);
        assert_eq!(summary.completed, 2);
        assert_eq!(summary.pending, 2);
        assert_eq!(summary.completion_rate, 50);
        assert_eq!(summary.high_open, 1);
        assert_eq!(summary.high_completion_rate, 50);
        assert_eq!(summary.due_today, 1);

        let rows: Vec<(&str, usize, u8)> = summary
            .categories
            .iter()
            .map(|row| (row.label.as_str(), row.total, row.percent))
            .collect();
        assert_eq!(
            rows,
            vec![
                ("Work", 2, 50),
                ("Personal", 0, 0),
                ("Study", 1, 0),
                ("Health", 0, 0),
                ("Errands", 1, 100),
            ]
        );
    }

    #[test]
    fn empty_list_yields_zero_rates() {
        let summary = TaskSummary::from_tasks(&[], today(), &[]);
        assert_eq!(summary.completion_rate, 0);
        assert_eq!(summary.high_completion_rate, 0);
        assert_eq!(summary.categories.len(), Category::BUILT_IN.len());
    }

    #[test]
    fn calendar_groups_by_due_date_in_order() {
        let mut late = task("1", Priority::Low, "work", false);
        late.due_date = NaiveDate::from_ymd_opt(2026, 3, 2);
        let mut early = task("2", Priority::Low, "work", false);
        early.due_date = Some(today());
        let mut same_day = task("3", Priority::High, "health", true);
        same_day.due_date = Some(today());
        let undated = task("4", Priority::Low, "work", false);
        let tasks = vec![late, early, same_day, undated];

        let days = tasks_by_day(&tasks);

        let keys: Vec<NaiveDate> = days.keys().copied().collect();
        assert_eq!(keys, vec![today(), NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()]);
        let ids: Vec<&str> = days[&today()].iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["2", "3"]);
    }
}
