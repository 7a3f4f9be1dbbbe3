use crate::bridge::Bridge;
use crate::dialog::{TaskDialog, TaskDraft};
use crate::events::{CongratulationsPayload, StatePayload};
use crate::models::{DataFile, Group, IconName, Task};
use crate::state::AppState;
use crate::view::{PriorityFilter, SortBy};

#[cfg(all(feature = "app", not(test)))]
use crate::config::Settings;
#[cfg(all(feature = "app", not(test)))]
use crate::events::{EVENT_CONGRATULATIONS, EVENT_STATE_UPDATED};
#[cfg(all(feature = "app", not(test)))]
use crate::scheduler::{start_congratulations_timer, BannerTimer};
#[cfg(all(feature = "app", not(test)))]
use tauri::{AppHandle, Emitter, Manager, Runtime, State};

#[derive(Debug, serde::Serialize)]
pub struct CommandResult<T> {
    pub ok: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

pub trait CommandCtx {
    fn emit_state_updated(&self, payload: StatePayload);
    fn emit_congratulations(&self, payload: CongratulationsPayload);
}

fn ok<T>(data: T) -> CommandResult<T> {
    CommandResult {
        ok: true,
        data: Some(data),
        error: None,
    }
}

fn err<T>(message: &str) -> CommandResult<T> {
    CommandResult {
        ok: false,
        data: None,
        error: Some(message.to_string()),
    }
}

fn publish(ctx: &impl CommandCtx, state: &AppState) {
    ctx.emit_state_updated(StatePayload::from_state(state));
}

/// Emits the new state on success; failures are reported to the caller only.
fn respond<T, E: std::fmt::Display>(
    ctx: &impl CommandCtx,
    state: &AppState,
    command: &str,
    result: Result<T, E>,
) -> CommandResult<T> {
    match result {
        Ok(data) => {
            publish(ctx, state);
            ok(data)
        }
        Err(error) => {
            log::debug!("command rejected command={command} error={error}");
            err(&error.to_string())
        }
    }
}

#[cfg(all(feature = "app", not(test)))]
struct TauriCommandCtx<'a, R: Runtime> {
    app: &'a AppHandle<R>,
}

#[cfg(all(feature = "app", not(test)))]
impl<R: Runtime> CommandCtx for TauriCommandCtx<'_, R> {
    fn emit_state_updated(&self, payload: StatePayload) {
        let _ = self.app.emit(EVENT_STATE_UPDATED, payload);
    }

    fn emit_congratulations(&self, payload: CongratulationsPayload) {
        let _ = self.app.emit(EVENT_CONGRATULATIONS, payload);
        let delay = self.app.state::<Settings>().congratulations_ms;
        let timer = self.app.state::<BannerTimer>().inner().clone();
        start_congratulations_timer(
            self.app.clone(),
            timer,
            std::time::Duration::from_millis(delay),
        );
    }
}

fn load_state_impl(state: &AppState) -> CommandResult<StatePayload> {
    if !state.is_initialized() {
        return err("state not loaded");
    }
    ok(StatePayload::from_state(state))
}

fn add_group_impl(
    ctx: &impl CommandCtx,
    state: &AppState,
    name: String,
    icon_name: String,
) -> CommandResult<Group> {
    let result = state.add_group(&name, IconName::parse(&icon_name));
    respond(ctx, state, "add_group", result)
}

fn delete_group_impl(
    ctx: &impl CommandCtx,
    state: &AppState,
    group_id: String,
) -> CommandResult<bool> {
    let result = state.delete_group(&group_id).map(|()| true);
    respond(ctx, state, "delete_group", result)
}

fn select_group_impl(
    ctx: &impl CommandCtx,
    state: &AppState,
    group_id: String,
) -> CommandResult<Group> {
    let result = state.select_group(&group_id);
    respond(ctx, state, "select_group", result)
}

fn add_task_impl(ctx: &impl CommandCtx, state: &AppState, draft: TaskDraft) -> CommandResult<Task> {
    let result = state.add_task(draft);
    respond(ctx, state, "add_task", result)
}

fn toggle_task_impl(
    ctx: &impl CommandCtx,
    state: &AppState,
    task_id: String,
) -> CommandResult<Task> {
    let outcome = match state.toggle_task(&task_id) {
        Ok(outcome) => outcome,
        Err(error) => return err(&error.to_string()),
    };
    publish(ctx, state);
    if outcome.group_completed {
        if let Some(group) = state.selected_group() {
            log::info!("all tasks completed group={}", group.id);
            ctx.emit_congratulations(CongratulationsPayload {
                group_id: group.id,
                group_name: group.name,
            });
        }
    }
    ok(outcome.task)
}

fn edit_task_impl(
    ctx: &impl CommandCtx,
    state: &AppState,
    task_id: String,
    draft: TaskDraft,
) -> CommandResult<Task> {
    let result = state.edit_task(&task_id, draft.into());
    respond(ctx, state, "edit_task", result)
}

fn delete_task_impl(
    ctx: &impl CommandCtx,
    state: &AppState,
    task_id: String,
) -> CommandResult<bool> {
    let result = state.delete_task(&task_id).map(|_| true);
    respond(ctx, state, "delete_task", result)
}

fn reorder_tasks_impl(
    ctx: &impl CommandCtx,
    state: &AppState,
    source_index: usize,
    dest_index: usize,
) -> CommandResult<bool> {
    let result = state
        .reorder_tasks(source_index, dest_index)
        .map(|()| true);
    respond(ctx, state, "reorder_tasks", result)
}

fn set_filter_impl(
    ctx: &impl CommandCtx,
    state: &AppState,
    filter: PriorityFilter,
) -> CommandResult<Vec<Task>> {
    state.set_filter(filter);
    publish(ctx, state);
    ok(state.visible_tasks())
}

fn set_sort_impl(ctx: &impl CommandCtx, state: &AppState, sort: SortBy) -> CommandResult<Vec<Task>> {
    state.set_sort(sort);
    publish(ctx, state);
    ok(state.visible_tasks())
}

fn open_add_dialog_impl(ctx: &impl CommandCtx, state: &AppState) -> CommandResult<TaskDialog> {
    let result = state.open_add_dialog();
    respond(ctx, state, "open_add_dialog", result)
}

fn open_edit_dialog_impl(
    ctx: &impl CommandCtx,
    state: &AppState,
    task_id: String,
) -> CommandResult<TaskDialog> {
    let result = state.open_edit_dialog(&task_id);
    respond(ctx, state, "open_edit_dialog", result)
}

fn update_dialog_impl(
    ctx: &impl CommandCtx,
    state: &AppState,
    draft: TaskDraft,
) -> CommandResult<TaskDialog> {
    let result = state.update_dialog(draft);
    respond(ctx, state, "update_dialog", result)
}

fn cancel_dialog_impl(ctx: &impl CommandCtx, state: &AppState) -> CommandResult<TaskDialog> {
    state.cancel_dialog();
    publish(ctx, state);
    ok(state.dialog())
}

fn submit_dialog_impl(ctx: &impl CommandCtx, state: &AppState) -> CommandResult<Task> {
    let result = state.submit_dialog();
    respond(ctx, state, "submit_dialog", result)
}

/// Raw read of the stored collection. Failures degrade to an empty collection.
async fn load_data_impl(bridge: &Bridge) -> CommandResult<DataFile> {
    match bridge.load().await {
        Ok(data) => ok(data),
        Err(error) => {
            log::error!("load_data failed, returning empty collection: {error}");
            ok(DataFile::default())
        }
    }
}

/// Raw overwrite of the collection. It goes through the state manager so memory and disk
/// stay in step.
fn save_data_impl(ctx: &impl CommandCtx, state: &AppState, data: DataFile) -> CommandResult<bool> {
    let result = state.replace_groups(data.groups).map(|()| true);
    respond(ctx, state, "save_data", result)
}

#[cfg(all(feature = "app", not(test)))]
#[tauri::command]
pub fn load_state(state: State<AppState>) -> CommandResult<StatePayload> {
    load_state_impl(state.inner())
}

#[cfg(all(feature = "app", not(test)))]
#[tauri::command]
pub fn add_group(
    app: AppHandle,
    state: State<AppState>,
    name: String,
    icon_name: String,
) -> CommandResult<Group> {
    let ctx = TauriCommandCtx { app: &app };
    add_group_impl(&ctx, state.inner(), name, icon_name)
}

#[cfg(all(feature = "app", not(test)))]
#[tauri::command]
pub fn delete_group(app: AppHandle, state: State<AppState>, group_id: String) -> CommandResult<bool> {
    let ctx = TauriCommandCtx { app: &app };
    delete_group_impl(&ctx, state.inner(), group_id)
}

#[cfg(all(feature = "app", not(test)))]
#[tauri::command]
pub fn select_group(app: AppHandle, state: State<AppState>, group_id: String) -> CommandResult<Group> {
    let ctx = TauriCommandCtx { app: &app };
    select_group_impl(&ctx, state.inner(), group_id)
}

#[cfg(all(feature = "app", not(test)))]
#[tauri::command]
pub fn add_task(app: AppHandle, state: State<AppState>, draft: TaskDraft) -> CommandResult<Task> {
    let ctx = TauriCommandCtx { app: &app };
    add_task_impl(&ctx, state.inner(), draft)
}

#[cfg(all(feature = "app", not(test)))]
#[tauri::command]
pub fn toggle_task(app: AppHandle, state: State<AppState>, task_id: String) -> CommandResult<Task> {
    let ctx = TauriCommandCtx { app: &app };
    toggle_task_impl(&ctx, state.inner(), task_id)
}

#[cfg(all(feature = "app", not(test)))]
#[tauri::command]
pub fn edit_task(
    app: AppHandle,
    state: State<AppState>,
    task_id: String,
    draft: TaskDraft,
) -> CommandResult<Task> {
    let ctx = TauriCommandCtx { app: &app };
    edit_task_impl(&ctx, state.inner(), task_id, draft)
}

#[cfg(all(feature = "app", not(test)))]
#[tauri::command]
pub fn delete_task(app: AppHandle, state: State<AppState>, task_id: String) -> CommandResult<bool> {
    let ctx = TauriCommandCtx { app: &app };
    delete_task_impl(&ctx, state.inner(), task_id)
}

#[cfg(all(feature = "app", not(test)))]
#[tauri::command]
pub fn reorder_tasks(
    app: AppHandle,
    state: State<AppState>,
    source_index: usize,
    dest_index: usize,
) -> CommandResult<bool> {
    let ctx = TauriCommandCtx { app: &app };
    reorder_tasks_impl(&ctx, state.inner(), source_index, dest_index)
}

#[cfg(all(feature = "app", not(test)))]
#[tauri::command]
pub fn set_filter(
    app: AppHandle,
    state: State<AppState>,
    filter: PriorityFilter,
) -> CommandResult<Vec<Task>> {
    let ctx = TauriCommandCtx { app: &app };
    set_filter_impl(&ctx, state.inner(), filter)
}

#[cfg(all(feature = "app", not(test)))]
#[tauri::command]
pub fn set_sort(app: AppHandle, state: State<AppState>, sort: SortBy) -> CommandResult<Vec<Task>> {
    let ctx = TauriCommandCtx { app: &app };
    set_sort_impl(&ctx, state.inner(), sort)
}

#[cfg(all(feature = "app", not(test)))]
#[tauri::command]
pub fn open_add_dialog(app: AppHandle, state: State<AppState>) -> CommandResult<TaskDialog> {
    let ctx = TauriCommandCtx { app: &app };
    open_add_dialog_impl(&ctx, state.inner())
}

#[cfg(all(feature = "app", not(test)))]
#[tauri::command]
pub fn open_edit_dialog(
    app: AppHandle,
    state: State<AppState>,
    task_id: String,
) -> CommandResult<TaskDialog> {
    let ctx = TauriCommandCtx { app: &app };
    open_edit_dialog_impl(&ctx, state.inner(), task_id)
}

#[cfg(all(feature = "app", not(test)))]
#[tauri::command]
pub fn update_dialog(
    app: AppHandle,
    state: State<AppState>,
    draft: TaskDraft,
) -> CommandResult<TaskDialog> {
    let ctx = TauriCommandCtx { app: &app };
    update_dialog_impl(&ctx, state.inner(), draft)
}

#[cfg(all(feature = "app", not(test)))]
#[tauri::command]
pub fn cancel_dialog(app: AppHandle, state: State<AppState>) -> CommandResult<TaskDialog> {
    let ctx = TauriCommandCtx { app: &app };
    cancel_dialog_impl(&ctx, state.inner())
}

#[cfg(all(feature = "app", not(test)))]
#[tauri::command]
pub fn submit_dialog(app: AppHandle, state: State<AppState>) -> CommandResult<Task> {
    let ctx = TauriCommandCtx { app: &app };
    submit_dialog_impl(&ctx, state.inner())
}

#[cfg(all(feature = "app", not(test)))]
#[tauri::command]
pub async fn load_data(app: AppHandle) -> CommandResult<DataFile> {
    let bridge = app.state::<Bridge>().inner().clone();
    load_data_impl(&bridge).await
}

#[cfg(all(feature = "app", not(test)))]
#[tauri::command]
pub fn save_data(app: AppHandle, state: State<AppState>, data: DataFile) -> CommandResult<bool> {
    let ctx = TauriCommandCtx { app: &app };
    save_data_impl(&ctx, state.inner(), data)
}
