use crate::dialog::TaskDialog;
use crate::models::{Group, Task};
use crate::state::AppState;
use crate::view::{PriorityFilter, SortBy};

pub const EVENT_STATE_UPDATED: &str = "state_updated";
pub const EVENT_CONGRATULATIONS: &str = "congratulations";
pub const EVENT_CONGRATULATIONS_CLEARED: &str = "congratulations_cleared";

#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatePayload {
    pub groups: Vec<Group>,
    pub selected_group_id: Option<String>,
    pub filter: PriorityFilter,
    pub sort: SortBy,
    pub visible_tasks: Vec<Task>,
    pub progress: f64,
    pub dialog: TaskDialog,
}

impl StatePayload {
    pub fn from_state(state: &AppState) -> Self {
        Self {
            groups: state.groups(),
            selected_group_id: state.selected_group_id(),
            filter: state.filter(),
            sort: state.sort(),
            visible_tasks: state.visible_tasks(),
            progress: state.selected_progress(),
            dialog: state.dialog(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CongratulationsPayload {
    pub group_id: String,
    pub group_name: String,
}
