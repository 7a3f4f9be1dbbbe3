use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::{Priority, Task};
use crate::state::{validate_required, StateError};

/// Working copy of the fields the add/edit dialog lets the user change.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct TaskDraft {
    pub title: String,
    pub time: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default, with = "crate::models::due_date")]
    pub due_date: Option<NaiveDate>,
}

impl TaskDraft {
    pub fn from_task(task: &Task) -> Self {
        Self {
            title: task.title.clone(),
            time: task.time.clone(),
            priority: task.priority,
            due_date: task.due_date,
        }
    }

    /// Title and time are both required before a draft can become a task.
    pub fn validate(&self) -> Result<(), StateError> {
        validate_required(&self.title, &self.time)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TaskDialog {
    #[default]
    Closed,
    Adding {
        draft: TaskDraft,
    },
    Editing {
        task_id: String,
        draft: TaskDraft,
    },
}

impl TaskDialog {
    pub fn is_open(&self) -> bool {
        !matches!(self, TaskDialog::Closed)
    }

    pub fn draft(&self) -> Option<&TaskDraft> {
        match self {
            TaskDialog::Closed => None,
            TaskDialog::Adding { draft } | TaskDialog::Editing { draft, .. } => Some(draft),
        }
    }

    /// Opening for add starts from a blank draft with the default priority.
    pub fn open_for_add(&mut self) {
        *self = TaskDialog::Adding {
            draft: TaskDraft::default(),
        };
    }

    pub fn open_for_edit(&mut self, task: &Task) {
        *self = TaskDialog::Editing {
            task_id: task.id.clone(),
            draft: TaskDraft::from_task(task),
        };
    }

    /// Replaces the working copy. Returns false when the dialog is closed.
    pub fn update(&mut self, next: TaskDraft) -> bool {
        match self {
            TaskDialog::Closed => false,
            TaskDialog::Adding { draft } | TaskDialog::Editing { draft, .. } => {
                *draft = next;
                true
            }
        }
    }

    pub fn close(&mut self) {
        *self = TaskDialog::Closed;
    }
}
