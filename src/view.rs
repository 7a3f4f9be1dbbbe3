use serde::{Deserialize, Serialize};

use crate::models::{Group, Priority, Task};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PriorityFilter {
    #[default]
    All,
    Low,
    Medium,
    High,
}

impl PriorityFilter {
    pub fn matches(self, priority: Priority) -> bool {
        match self {
            PriorityFilter::All => true,
            PriorityFilter::Low => priority == Priority::Low,
            PriorityFilter::Medium => priority == Priority::Medium,
            PriorityFilter::High => priority == Priority::High,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum SortBy {
    #[default]
    None,
    Priority,
    DueDate,
}

/// The task list as the user sees it. Sorting is stable, so ties keep their stored order.
pub fn filter_and_sort(tasks: &[Task], filter: PriorityFilter, sort: SortBy) -> Vec<&Task> {
    let mut view: Vec<&Task> = tasks
        .iter()
        .filter(|task| filter.matches(task.priority))
        .collect();
    match sort {
        SortBy::None => {}
        SortBy::Priority => view.sort_by(|a, b| b.priority.rank().cmp(&a.priority.rank())),
        // Undated tasks go last.
        SortBy::DueDate => view.sort_by_key(|task| (task.due_date.is_none(), task.due_date)),
    }
    view
}

/// Completion percentage in `0.0..=100.0`; an empty group reports 0.
pub fn progress(group: &Group) -> f64 {
    let total = group.tasks.len();
    if total == 0 {
        return 0.0;
    }
    let completed = group.tasks.iter().filter(|task| task.completed).count();
    completed as f64 / total as f64 * 100.0
}

pub fn all_completed(group: &Group) -> bool {
    !group.tasks.is_empty() && group.tasks.iter().all(|task| task.completed)
}
