use std::collections::HashSet;
use std::fmt::Display;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{NaiveDate, Utc};

use crate::bridge::Bridge;
use crate::dialog::{TaskDialog, TaskDraft};
use crate::models::{DataFile, Group, IconName, Priority, Task};
use crate::view::{self, PriorityFilter, SortBy};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    BlankGroupName,
    BlankTitle,
    BlankTime,
    GroupNotFound(String),
    TaskNotFound(String),
    /// The last remaining group cannot be deleted.
    LastGroup,
    NoGroupSelected,
    IndexOutOfRange { index: usize, len: usize },
    EmptyCollection,
    DuplicateGroupId(String),
    DuplicateTaskId(String),
    DialogClosed,
}

impl std::fmt::Display for StateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StateError::BlankGroupName => write!(f, "group name is required"),
            StateError::BlankTitle => write!(f, "task title is required"),
            StateError::BlankTime => write!(f, "task time is required"),
            StateError::GroupNotFound(id) => write!(f, "group not found: {id}"),
            StateError::TaskNotFound(id) => write!(f, "task not found: {id}"),
            StateError::LastGroup => write!(f, "cannot delete the last group"),
            StateError::NoGroupSelected => write!(f, "no group selected"),
            StateError::IndexOutOfRange { index, len } => {
                write!(f, "index {index} out of range for {len} visible tasks")
            }
            StateError::EmptyCollection => write!(f, "at least one group is required"),
            StateError::DuplicateGroupId(id) => write!(f, "duplicate group id: {id}"),
            StateError::DuplicateTaskId(id) => write!(f, "duplicate task id: {id}"),
            StateError::DialogClosed => write!(f, "task dialog is not open"),
        }
    }
}

impl std::error::Error for StateError {}

/// Partial update for [`AppState::edit_task`]. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub time: Option<String>,
    pub priority: Option<Priority>,
    pub due_date: Option<Option<NaiveDate>>,
}

impl From<TaskDraft> for TaskPatch {
    fn from(draft: TaskDraft) -> Self {
        Self {
            title: Some(draft.title),
            time: Some(draft.time),
            priority: Some(draft.priority),
            due_date: Some(draft.due_date),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToggleOutcome {
    pub task: Task,
    /// Set when this toggle completed the last open task of the group.
    pub group_completed: bool,
}

/// Wall-clock millisecond ids that never repeat, even within the same millisecond.
#[derive(Debug, Default)]
pub struct IdGenerator {
    last: i64,
}

impl IdGenerator {
    /// Makes sure later ids sort after an id that already exists.
    pub fn observe(&mut self, id: &str) {
        if let Ok(value) = id.parse::<i64>() {
            self.last = self.last.max(value);
        }
    }

    pub fn next_at(&mut self, now_ms: i64) -> String {
        let next = now_ms.max(self.last.saturating_add(1));
        self.last = next;
        next.to_string()
    }

    pub fn next_id(&mut self) -> String {
        self.next_at(Utc::now().timestamp_millis())
    }
}

pub type Subscriber = Arc<dyn Fn(&DataFile) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Default)]
struct Subscribers {
    next_id: u64,
    entries: Vec<(SubscriptionId, Subscriber)>,
}

#[derive(Clone, Default)]
pub struct AppState {
    inner: Arc<Mutex<AppData>>,
    subscribers: Arc<Mutex<Subscribers>>,
    /// Held from mutation through notification so subscribers see snapshots in commit
    /// order. Subscribers may read state but must not mutate it.
    commits: Arc<Mutex<()>>,
}

impl AppState {
    /// An empty manager; call [`AppState::hydrate`] or [`AppState::load_initial`] next.
    pub fn new() -> Self {
        Self::default()
    }

    /// A manager that starts from `groups` (or the seed group) without persisting.
    pub fn with_groups(groups: Vec<Group>) -> Self {
        let state = Self::new();
        state.lock().install(sanitize_groups(groups));
        state
    }

    pub async fn load_initial(&self, bridge: &Bridge) -> bool {
        let loaded = bridge.load().await;
        self.hydrate(loaded)
    }

    /// Installs loaded data. An empty collection is replaced by the seed group, which is
    /// persisted when the load itself succeeded. A failed load also seeds, but only in
    /// memory, so unreadable data on disk is not overwritten before the first mutation.
    /// Returns true when the seed group was used.
    pub fn hydrate<E: Display>(&self, loaded: Result<DataFile, E>) -> bool {
        let (groups, persist_seed) = match loaded {
            Ok(data) => {
                let persist = data.groups.is_empty();
                (data.groups, persist)
            }
            Err(error) => {
                log::warn!("load failed, starting from the seed group: {error}");
                (Vec::new(), false)
            }
        };
        let _ordered = self.commit_lock();
        let snapshot = {
            let mut guard = self.lock();
            let seeded = guard.install(sanitize_groups(groups));
            log::info!(
                "state hydrated groups={} seeded={seeded}",
                guard.groups.len()
            );
            if !seeded {
                return false;
            }
            guard.snapshot()
        };
        if persist_seed {
            self.notify(&snapshot);
        }
        true
    }

    pub fn is_initialized(&self) -> bool {
        !self.lock().groups.is_empty()
    }

    pub fn groups(&self) -> Vec<Group> {
        self.lock().groups.clone()
    }

    pub fn data_file(&self) -> DataFile {
        self.lock().snapshot()
    }

    pub fn selected_group_id(&self) -> Option<String> {
        let guard = self.lock();
        guard
            .selected_index()
            .map(|index| guard.groups[index].id.clone())
    }

    pub fn selected_group(&self) -> Option<Group> {
        let guard = self.lock();
        guard
            .selected_index()
            .map(|index| guard.groups[index].clone())
    }

    /// Selection is view state and is not persisted.
    pub fn select_group(&self, group_id: &str) -> Result<Group, StateError> {
        let mut guard = self.lock();
        let group = guard
            .groups
            .iter()
            .find(|group| group.id == group_id)
            .cloned()
            .ok_or_else(|| StateError::GroupNotFound(group_id.to_string()))?;
        guard.selected_group_id = Some(group.id.clone());
        Ok(group)
    }

    pub fn add_group(&self, name: &str, icon: IconName) -> Result<Group, StateError> {
        self.commit(|data| {
            let name = name.trim();
            if name.is_empty() {
                return Err(StateError::BlankGroupName);
            }
            let group = Group {
                id: data.ids.next_id(),
                name: name.to_string(),
                icon_name: icon,
                tasks: Vec::new(),
            };
            data.groups.push(group.clone());
            log::debug!("group added id={} name={}", group.id, group.name);
            Ok(group)
        })
    }

    pub fn delete_group(&self, group_id: &str) -> Result<(), StateError> {
        self.commit(|data| {
            if data.groups.len() <= 1 {
                return Err(StateError::LastGroup);
            }
            let index = data
                .groups
                .iter()
                .position(|group| group.id == group_id)
                .ok_or_else(|| StateError::GroupNotFound(group_id.to_string()))?;
            data.groups.remove(index);
            if data.selected_group_id.as_deref() == Some(group_id) {
                data.selected_group_id = data.groups.first().map(|group| group.id.clone());
            }
            log::debug!("group deleted id={group_id}");
            Ok(())
        })
    }

    pub fn add_task(&self, draft: TaskDraft) -> Result<Task, StateError> {
        self.commit(|data| data.add_task(draft))
    }

    pub fn toggle_task(&self, task_id: &str) -> Result<ToggleOutcome, StateError> {
        self.commit(|data| {
            let group = data.selected_mut()?;
            let task = group
                .tasks
                .iter_mut()
                .find(|task| task.id == task_id)
                .ok_or_else(|| StateError::TaskNotFound(task_id.to_string()))?;
            task.completed = !task.completed;
            let task = task.clone();
            let group_completed = task.completed && view::all_completed(group);
            Ok(ToggleOutcome {
                task,
                group_completed,
            })
        })
    }

    pub fn edit_task(&self, task_id: &str, patch: TaskPatch) -> Result<Task, StateError> {
        self.commit(|data| data.edit_task(task_id, patch))
    }

    pub fn delete_task(&self, task_id: &str) -> Result<Task, StateError> {
        self.commit(|data| {
            let group = data.selected_mut()?;
            let index = group
                .tasks
                .iter()
                .position(|task| task.id == task_id)
                .ok_or_else(|| StateError::TaskNotFound(task_id.to_string()))?;
            Ok(group.tasks.remove(index))
        })
    }

    /// Moves a task using indices into the current filtered and sorted view. Both indices
    /// are translated to stored positions through the task ids they point at, so the
    /// stored order changes the way the drag looked on screen.
    pub fn reorder_tasks(&self, source_index: usize, dest_index: usize) -> Result<(), StateError> {
        self.commit(|data| {
            let (filter, sort) = (data.filter, data.sort);
            let index = data.selected_index().ok_or(StateError::NoGroupSelected)?;
            let (source_id, dest_id) = {
                let visible = view::filter_and_sort(&data.groups[index].tasks, filter, sort);
                let len = visible.len();
                for candidate in [source_index, dest_index] {
                    if candidate >= len {
                        return Err(StateError::IndexOutOfRange {
                            index: candidate,
                            len,
                        });
                    }
                }
                (
                    visible[source_index].id.clone(),
                    visible[dest_index].id.clone(),
                )
            };
            let tasks = &mut data.groups[index].tasks;
            let from = position_of(tasks, &source_id)?;
            let to = position_of(tasks, &dest_id)?;
            let task = tasks.remove(from);
            tasks.insert(to, task);
            Ok(())
        })
    }

    /// Replaces the whole collection (the raw save path used by the renderer).
    pub fn replace_groups(&self, groups: Vec<Group>) -> Result<(), StateError> {
        self.commit(|data| {
            validate_groups(&groups)?;
            data.groups = groups;
            for id in collect_ids(&data.groups) {
                data.ids.observe(&id);
            }
            if data.selected_index_strict().is_none() {
                data.selected_group_id = data.groups.first().map(|group| group.id.clone());
            }
            Ok(())
        })
    }

    pub fn filter(&self) -> PriorityFilter {
        self.lock().filter
    }

    pub fn sort(&self) -> SortBy {
        self.lock().sort
    }

    pub fn set_filter(&self, filter: PriorityFilter) {
        self.lock().filter = filter;
    }

    pub fn set_sort(&self, sort: SortBy) {
        self.lock().sort = sort;
    }

    pub fn visible_tasks(&self) -> Vec<Task> {
        let guard = self.lock();
        match guard.selected_index() {
            Some(index) => {
                view::filter_and_sort(&guard.groups[index].tasks, guard.filter, guard.sort)
                    .into_iter()
                    .cloned()
                    .collect()
            }
            None => Vec::new(),
        }
    }

    pub fn selected_progress(&self) -> f64 {
        let guard = self.lock();
        guard
            .selected_index()
            .map(|index| view::progress(&guard.groups[index]))
            .unwrap_or(0.0)
    }

    pub fn group_progress(&self, group_id: &str) -> Result<f64, StateError> {
        let guard = self.lock();
        guard
            .groups
            .iter()
            .find(|group| group.id == group_id)
            .map(view::progress)
            .ok_or_else(|| StateError::GroupNotFound(group_id.to_string()))
    }

    pub fn dialog(&self) -> TaskDialog {
        self.lock().dialog.clone()
    }

    pub fn open_add_dialog(&self) -> Result<TaskDialog, StateError> {
        let mut guard = self.lock();
        guard.selected_index().ok_or(StateError::NoGroupSelected)?;
        guard.dialog.open_for_add();
        Ok(guard.dialog.clone())
    }

    pub fn open_edit_dialog(&self, task_id: &str) -> Result<TaskDialog, StateError> {
        let mut guard = self.lock();
        let index = guard.selected_index().ok_or(StateError::NoGroupSelected)?;
        let task = guard.groups[index]
            .tasks
            .iter()
            .find(|task| task.id == task_id)
            .cloned()
            .ok_or_else(|| StateError::TaskNotFound(task_id.to_string()))?;
        guard.dialog.open_for_edit(&task);
        Ok(guard.dialog.clone())
    }

    pub fn update_dialog(&self, draft: TaskDraft) -> Result<TaskDialog, StateError> {
        let mut guard = self.lock();
        if !guard.dialog.update(draft) {
            return Err(StateError::DialogClosed);
        }
        Ok(guard.dialog.clone())
    }

    pub fn cancel_dialog(&self) {
        self.lock().dialog.close();
    }

    /// Applies the dialog's working copy. Validation failures leave the dialog open.
    pub fn submit_dialog(&self) -> Result<Task, StateError> {
        self.commit(|data| {
            let task = match data.dialog.clone() {
                TaskDialog::Closed => return Err(StateError::DialogClosed),
                TaskDialog::Adding { draft } => data.add_task(draft)?,
                TaskDialog::Editing { task_id, draft } => data.edit_task(&task_id, draft.into())?,
            };
            data.dialog.close();
            Ok(task)
        })
    }

    pub fn subscribe<F>(&self, subscriber: F) -> SubscriptionId
    where
        F: Fn(&DataFile) + Send + Sync + 'static,
    {
        let mut guard = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        guard.next_id += 1;
        let id = SubscriptionId(guard.next_id);
        let subscriber: Subscriber = Arc::new(subscriber);
        guard.entries.push((id, subscriber));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut guard = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let before = guard.entries.len();
        guard.entries.retain(|(entry_id, _)| *entry_id != id);
        guard.entries.len() != before
    }

    fn lock(&self) -> MutexGuard<'_, AppData> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn commit_lock(&self) -> MutexGuard<'_, ()> {
        self.commits.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs a mutation and, when it succeeds, hands the full collection to every
    /// subscriber. Subscribers run after the state lock is released but before the next
    /// commit starts.
    fn commit<T>(
        &self,
        mutate: impl FnOnce(&mut AppData) -> Result<T, StateError>,
    ) -> Result<T, StateError> {
        let _ordered = self.commit_lock();
        let (value, snapshot) = {
            let mut guard = self.lock();
            let value = mutate(&mut guard)?;
            (value, guard.snapshot())
        };
        self.notify(&snapshot);
        Ok(value)
    }

    fn notify(&self, snapshot: &DataFile) {
        let subscribers: Vec<Subscriber> = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .iter()
            .map(|(_, subscriber)| Arc::clone(subscriber))
            .collect();
        for subscriber in subscribers {
            subscriber(snapshot);
        }
    }
}

#[derive(Debug, Default)]
struct AppData {
    groups: Vec<Group>,
    selected_group_id: Option<String>,
    filter: PriorityFilter,
    sort: SortBy,
    dialog: TaskDialog,
    ids: IdGenerator,
}

impl AppData {
    /// Returns true when the seed group had to be created.
    fn install(&mut self, groups: Vec<Group>) -> bool {
        let seeded = groups.is_empty();
        self.groups = if seeded { vec![Group::seed()] } else { groups };
        for id in collect_ids(&self.groups) {
            self.ids.observe(&id);
        }
        self.selected_group_id = self.groups.first().map(|group| group.id.clone());
        self.dialog.close();
        seeded
    }

    fn selected_index_strict(&self) -> Option<usize> {
        let selected = self.selected_group_id.as_deref()?;
        self.groups.iter().position(|group| group.id == selected)
    }

    /// A stale selection resolves to the first group.
    fn selected_index(&self) -> Option<usize> {
        self.selected_index_strict()
            .or_else(|| (!self.groups.is_empty()).then_some(0))
    }

    fn selected_mut(&mut self) -> Result<&mut Group, StateError> {
        let index = self.selected_index().ok_or(StateError::NoGroupSelected)?;
        Ok(&mut self.groups[index])
    }

    fn add_task(&mut self, draft: TaskDraft) -> Result<Task, StateError> {
        draft.validate()?;
        let id = self.ids.next_id();
        let group = self.selected_mut()?;
        let task = Task {
            id,
            title: draft.title,
            completed: false,
            time: draft.time,
            priority: draft.priority,
            due_date: draft.due_date,
            tag: None,
            members: Vec::new(),
        };
        group.tasks.push(task.clone());
        log::debug!("task added id={} group={}", task.id, group.id);
        Ok(task)
    }

    fn edit_task(&mut self, task_id: &str, patch: TaskPatch) -> Result<Task, StateError> {
        let group = self.selected_mut()?;
        let task = group
            .tasks
            .iter_mut()
            .find(|task| task.id == task_id)
            .ok_or_else(|| StateError::TaskNotFound(task_id.to_string()))?;

        let title = patch.title.unwrap_or_else(|| task.title.clone());
        let time = patch.time.unwrap_or_else(|| task.time.clone());
        validate_required(&title, &time)?;

        task.title = title;
        task.time = time;
        if let Some(priority) = patch.priority {
            task.priority = priority;
        }
        if let Some(due_date) = patch.due_date {
            task.due_date = due_date;
        }
        Ok(task.clone())
    }

    fn snapshot(&self) -> DataFile {
        DataFile::new(self.groups.clone())
    }
}

pub(crate) fn validate_required(title: &str, time: &str) -> Result<(), StateError> {
    if title.trim().is_empty() {
        return Err(StateError::BlankTitle);
    }
    if time.trim().is_empty() {
        return Err(StateError::BlankTime);
    }
    Ok(())
}

fn position_of(tasks: &[Task], task_id: &str) -> Result<usize, StateError> {
    tasks
        .iter()
        .position(|task| task.id == task_id)
        .ok_or_else(|| StateError::TaskNotFound(task_id.to_string()))
}

fn collect_ids(groups: &[Group]) -> Vec<String> {
    groups
        .iter()
        .flat_map(|group| {
            std::iter::once(group.id.clone()).chain(group.tasks.iter().map(|task| task.id.clone()))
        })
        .collect()
}

fn validate_groups(groups: &[Group]) -> Result<(), StateError> {
    if groups.is_empty() {
        return Err(StateError::EmptyCollection);
    }
    let mut group_ids = HashSet::new();
    for group in groups {
        if !group_ids.insert(group.id.as_str()) {
            return Err(StateError::DuplicateGroupId(group.id.clone()));
        }
        let mut task_ids = HashSet::new();
        for task in &group.tasks {
            if !task_ids.insert(task.id.as_str()) {
                return Err(StateError::DuplicateTaskId(task.id.clone()));
            }
        }
    }
    Ok(())
}

/// Drops repeated group ids (and repeated task ids within a group) from loaded data,
/// keeping the first occurrence.
fn sanitize_groups(groups: Vec<Group>) -> Vec<Group> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(groups.len());
    for mut group in groups {
        if !seen.insert(group.id.clone()) {
            log::warn!("dropping group with duplicate id={}", group.id);
            continue;
        }
        let mut task_ids = HashSet::new();
        group.tasks.retain(|task| {
            let fresh = task_ids.insert(task.id.clone());
            if !fresh {
                log::warn!("dropping task with duplicate id={} group={}", task.id, group.id);
            }
            fresh
        });
        out.push(group);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::IconName;

    fn draft(title: &str, time: &str) -> TaskDraft {
        TaskDraft {
            title: title.to_string(),
            time: time.to_string(),
            ..TaskDraft::default()
        }
    }

    fn draft_with(title: &str, priority: Priority, due: Option<NaiveDate>) -> TaskDraft {
        TaskDraft {
            title: title.to_string(),
            time: "09:00 - 10:00".to_string(),
            priority,
            due_date: due,
        }
    }

    fn recording(state: &AppState) -> Arc<Mutex<Vec<DataFile>>> {
        let saved = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&saved);
        state.subscribe(move |data| sink.lock().unwrap().push(data.clone()));
        saved
    }

    fn seeded() -> AppState {
        let state = AppState::new();
        state.hydrate::<String>(Ok(DataFile::default()));
        state
    }

    fn titles(tasks: &[Task]) -> Vec<String> {
        tasks.iter().map(|task| task.title.clone()).collect()
    }

    #[test]
    fn id_generator_is_strictly_increasing() {
        let mut ids = IdGenerator::default();
        assert_eq!(ids.next_at(1000), "1000");
        assert_eq!(ids.next_at(1000), "1001");
        assert_eq!(ids.next_at(999), "1002");
        assert_eq!(ids.next_at(5000), "5000");

        ids.observe("9000");
        ids.observe("not-a-number");
        assert_eq!(ids.next_at(5000), "9001");
    }

    #[test]
    fn hydrate_seeds_home_and_persists_only_after_a_successful_load() {
        let state = AppState::new();
        assert!(!state.is_initialized());
        let saved = recording(&state);
        assert!(state.hydrate::<String>(Ok(DataFile::default())));
        assert_eq!(state.groups(), vec![Group::seed()]);
        assert_eq!(state.selected_group_id().as_deref(), Some("1"));
        assert_eq!(saved.lock().unwrap().len(), 1);

        let failed = AppState::new();
        let saved = recording(&failed);
        assert!(failed.hydrate::<String>(Err("disk error".to_string())));
        assert_eq!(failed.groups(), vec![Group::seed()]);
        assert!(saved.lock().unwrap().is_empty());
    }

    #[test]
    fn hydrate_keeps_loaded_groups_and_selects_the_first() {
        let mut work = Group::seed();
        work.id = "200".into();
        work.name = "Work".into();
        let duplicate = work.clone();
        let state = AppState::new();
        let saved = recording(&state);

        let seeded = state.hydrate::<String>(Ok(DataFile::new(vec![work.clone(), duplicate])));
        assert!(!seeded);
        assert_eq!(state.groups(), vec![work]);
        assert_eq!(state.selected_group_id().as_deref(), Some("200"));
        assert!(saved.lock().unwrap().is_empty());

        // New ids must not collide with loaded ones.
        let group = state.add_group("Later", IconName::Book).unwrap();
        assert!(group.id.parse::<i64>().unwrap() > 200);
    }

    #[test]
    fn scenario_add_toggle_and_refuse_deleting_the_only_group() {
        let state = seeded();
        let saved = recording(&state);

        let task = state.add_task(draft("Buy milk", "09:00 - 10:00")).unwrap();
        assert!(!task.completed);
        assert_eq!(state.visible_tasks().len(), 1);

        let outcome = state.toggle_task(&task.id).unwrap();
        assert!(outcome.task.completed);
        assert!(outcome.group_completed);
        assert_eq!(state.selected_progress(), 100.0);
        assert_eq!(state.group_progress("1").unwrap(), 100.0);

        let before = state.groups();
        assert_eq!(state.delete_group("1"), Err(StateError::LastGroup));
        assert_eq!(state.groups(), before);
        assert_eq!(saved.lock().unwrap().len(), 2);
    }

    #[test]
    fn scenario_blank_group_name_is_a_no_op() {
        let state = seeded();
        let saved = recording(&state);

        let work = state.add_group("Work", IconName::Briefcase).unwrap();
        assert_eq!(
            state.add_group("   ", IconName::Book),
            Err(StateError::BlankGroupName)
        );

        let groups = state.groups();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[1], work);
        assert_eq!(groups[1].icon_name, IconName::Briefcase);
        assert_eq!(saved.lock().unwrap().len(), 1);
    }

    #[test]
    fn scenario_switching_groups_preserves_task_order() {
        let state = seeded();
        let first = state.add_task(draft("First", "08:00 - 09:00")).unwrap();
        state.toggle_task(&first.id).unwrap();
        let a_tasks = state.selected_group().unwrap().tasks;

        let b = state.add_group("B", IconName::User).unwrap();
        state.select_group(&b.id).unwrap();
        assert!(state.visible_tasks().is_empty());
        assert_eq!(state.selected_progress(), 0.0);

        state.select_group("1").unwrap();
        assert_eq!(state.selected_group().unwrap().tasks, a_tasks);
        assert_eq!(
            state.select_group("missing"),
            Err(StateError::GroupNotFound("missing".into()))
        );
    }

    #[test]
    fn deleting_the_selected_group_moves_selection_to_the_first() {
        let state = seeded();
        let work = state.add_group("Work", IconName::Briefcase).unwrap();
        state.select_group(&work.id).unwrap();

        state.delete_group(&work.id).unwrap();
        assert_eq!(state.selected_group_id().as_deref(), Some("1"));

        let other = state.add_group("Other", IconName::Car).unwrap();
        state.select_group(&other.id).unwrap();
        state.delete_group("1").unwrap();
        assert_eq!(state.selected_group_id(), Some(other.id.clone()));
        assert_eq!(
            state.delete_group("missing"),
            Err(StateError::LastGroup)
        );
    }

    #[test]
    fn delete_unknown_group_fails_without_persisting() {
        let state = seeded();
        state.add_group("Work", IconName::Briefcase).unwrap();
        let saved = recording(&state);
        assert_eq!(
            state.delete_group("nope"),
            Err(StateError::GroupNotFound("nope".into()))
        );
        assert!(saved.lock().unwrap().is_empty());
    }

    #[test]
    fn add_task_rejects_blank_title_or_time() {
        let state = seeded();
        let saved = recording(&state);
        assert_eq!(
            state.add_task(draft(" ", "09:00 - 10:00")),
            Err(StateError::BlankTitle)
        );
        assert_eq!(state.add_task(draft("Buy milk", "")), Err(StateError::BlankTime));
        assert!(state.visible_tasks().is_empty());
        assert!(saved.lock().unwrap().is_empty());
    }

    #[test]
    fn add_task_requires_an_initialized_state() {
        let state = AppState::new();
        assert_eq!(
            state.add_task(draft("Buy milk", "09:00")),
            Err(StateError::NoGroupSelected)
        );
    }

    #[test]
    fn task_ids_are_unique_and_completed_never_exceeds_total() {
        let state = seeded();
        let mut ids = HashSet::new();
        for i in 0..20 {
            let task = state.add_task(draft(&format!("t{i}"), "10:00")).unwrap();
            assert!(ids.insert(task.id.clone()));
            if i % 3 == 0 {
                state.toggle_task(&task.id).unwrap();
            }
            if i % 5 == 0 {
                state.delete_task(&task.id).unwrap();
            }
            let group = state.selected_group().unwrap();
            let completed = group.tasks.iter().filter(|t| t.completed).count();
            assert!(completed <= group.tasks.len());
        }
        assert_eq!(
            state.toggle_task("missing"),
            Err(StateError::TaskNotFound("missing".into()))
        );
        assert_eq!(
            state.delete_task("missing"),
            Err(StateError::TaskNotFound("missing".into()))
        );
    }

    #[test]
    fn toggle_only_signals_when_the_group_becomes_complete() {
        let state = seeded();
        let a = state.add_task(draft("a", "09:00")).unwrap();
        let b = state.add_task(draft("b", "10:00")).unwrap();

        assert!(!state.toggle_task(&a.id).unwrap().group_completed);
        assert!(state.toggle_task(&b.id).unwrap().group_completed);
        let undone = state.toggle_task(&b.id).unwrap();
        assert!(!undone.task.completed);
        assert!(!undone.group_completed);
        assert_eq!(state.selected_progress(), 50.0);
    }

    #[test]
    fn edit_task_applies_patch_and_validates() {
        let state = seeded();
        let mut task = state.add_task(draft("Report", "09:00 - 10:00")).unwrap();

        let edited = state
            .edit_task(
                &task.id,
                TaskPatch {
                    title: Some("Quarterly report".into()),
                    priority: Some(Priority::High),
                    due_date: Some(NaiveDate::from_ymd_opt(2024, 3, 5)),
                    ..TaskPatch::default()
                },
            )
            .unwrap();
        task.title = "Quarterly report".into();
        task.priority = Priority::High;
        task.due_date = NaiveDate::from_ymd_opt(2024, 3, 5);
        assert_eq!(edited, task);

        assert_eq!(
            state.edit_task(
                &task.id,
                TaskPatch {
                    time: Some(" ".into()),
                    ..TaskPatch::default()
                }
            ),
            Err(StateError::BlankTime)
        );
        assert_eq!(state.visible_tasks()[0], task);

        let cleared = state
            .edit_task(
                &task.id,
                TaskPatch {
                    due_date: Some(None),
                    ..TaskPatch::default()
                },
            )
            .unwrap();
        assert_eq!(cleared.due_date, None);
        assert_eq!(cleared.id, task.id);
    }

    #[test]
    fn edit_keeps_display_only_fields() {
        let mut group = Group::seed();
        group.tasks.push(Task {
            id: "10".into(),
            title: "Plan trip".into(),
            completed: false,
            time: "09:00".into(),
            priority: Priority::Low,
            due_date: None,
            tag: Some("family".into()),
            members: vec!["ann".into(), "bo".into()],
        });
        let state = AppState::with_groups(vec![group]);
        let edited = state
            .edit_task("10", draft("Plan holiday", "10:00").into())
            .unwrap();
        assert_eq!(edited.tag.as_deref(), Some("family"));
        assert_eq!(edited.members.len(), 2);
    }

    #[test]
    fn reorder_without_view_is_a_splice_move() {
        let state = seeded();
        for title in ["a", "b", "c", "d"] {
            state.add_task(draft(title, "09:00")).unwrap();
        }
        state.reorder_tasks(0, 2).unwrap();
        assert_eq!(titles(&state.visible_tasks()), vec!["b", "c", "a", "d"]);
        state.reorder_tasks(3, 0).unwrap();
        assert_eq!(titles(&state.visible_tasks()), vec!["d", "b", "c", "a"]);

        assert_eq!(
            state.reorder_tasks(0, 4),
            Err(StateError::IndexOutOfRange { index: 4, len: 4 })
        );
    }

    #[test]
    fn reorder_under_a_filter_maps_back_to_stored_positions() {
        let state = seeded();
        state.add_task(draft_with("low-1", Priority::Low, None)).unwrap();
        state.add_task(draft_with("high-1", Priority::High, None)).unwrap();
        state.add_task(draft_with("low-2", Priority::Low, None)).unwrap();
        state.add_task(draft_with("high-2", Priority::High, None)).unwrap();

        state.set_filter(PriorityFilter::High);
        assert_eq!(titles(&state.visible_tasks()), vec!["high-1", "high-2"]);
        state.reorder_tasks(1, 0).unwrap();
        assert_eq!(titles(&state.visible_tasks()), vec!["high-2", "high-1"]);

        state.set_filter(PriorityFilter::All);
        assert_eq!(
            titles(&state.visible_tasks()),
            vec!["low-1", "high-2", "high-1", "low-2"]
        );
    }

    #[test]
    fn reorder_under_due_date_sort_moves_the_dragged_task() {
        let state = seeded();
        let date = |d| NaiveDate::from_ymd_opt(2024, 1, d);
        state.add_task(draft_with("late", Priority::Medium, date(20))).unwrap();
        state.add_task(draft_with("early", Priority::Medium, date(1))).unwrap();
        state.add_task(draft_with("none", Priority::Medium, None)).unwrap();

        state.set_sort(SortBy::DueDate);
        assert_eq!(titles(&state.visible_tasks()), vec!["early", "late", "none"]);
        // Drag "none" onto the slot of "early".
        state.reorder_tasks(2, 0).unwrap();

        state.set_sort(SortBy::None);
        assert_eq!(titles(&state.visible_tasks()), vec!["late", "none", "early"]);
    }

    #[test]
    fn filter_and_sort_do_not_persist_and_filter_is_non_destructive() {
        let state = seeded();
        state.add_task(draft_with("a", Priority::Low, None)).unwrap();
        state.add_task(draft_with("b", Priority::High, None)).unwrap();
        let full = state.visible_tasks();
        let saved = recording(&state);

        state.set_filter(PriorityFilter::High);
        assert_eq!(titles(&state.visible_tasks()), vec!["b"]);
        state.set_sort(SortBy::Priority);
        state.set_filter(PriorityFilter::All);
        state.set_sort(SortBy::None);
        assert_eq!(state.visible_tasks(), full);
        assert_eq!(state.filter(), PriorityFilter::All);
        assert_eq!(state.sort(), SortBy::None);
        assert!(saved.lock().unwrap().is_empty());
    }

    #[test]
    fn every_mutation_hands_the_full_collection_to_subscribers() {
        let state = seeded();
        let saved = recording(&state);
        let group = state.add_group("Work", IconName::Briefcase).unwrap();
        let task = state.add_task(draft("a", "09:00")).unwrap();
        state.toggle_task(&task.id).unwrap();
        state.delete_task(&task.id).unwrap();
        state.delete_group(&group.id).unwrap();

        let saved = saved.lock().unwrap();
        assert_eq!(saved.len(), 5);
        assert_eq!(saved[0].groups.len(), 2);
        assert_eq!(saved[1].groups[0].tasks.len(), 1);
        assert!(saved[2].groups[0].tasks[0].completed);
        assert!(saved[3].groups[0].tasks.is_empty());
        assert_eq!(saved[4], state.data_file());
    }

    #[test]
    fn unsubscribe_stops_notifications() {
        let state = seeded();
        let count = Arc::new(Mutex::new(0));
        let sink = Arc::clone(&count);
        let id = state.subscribe(move |_| *sink.lock().unwrap() += 1);

        state.add_group("Work", IconName::Briefcase).unwrap();
        assert!(state.unsubscribe(id));
        assert!(!state.unsubscribe(id));
        state.add_group("Home 2", IconName::Home).unwrap();
        assert_eq!(*count.lock().unwrap(), 1);
    }

    #[test]
    fn subscribers_can_read_state_without_deadlocking() {
        let state = seeded();
        let reader = state.clone();
        let seen = Arc::new(Mutex::new(0usize));
        let sink = Arc::clone(&seen);
        state.subscribe(move |_| *sink.lock().unwrap() = reader.groups().len());
        state.add_group("Work", IconName::Briefcase).unwrap();
        assert_eq!(*seen.lock().unwrap(), 2);
    }

    #[test]
    fn concurrent_commits_reach_subscribers_in_commit_order() {
        use std::sync::atomic::{AtomicBool, Ordering};
        use std::sync::mpsc;
        use std::thread;
        use std::time::Duration;

        let state = seeded();
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let release_rx = Mutex::new(release_rx);
        let first_call = AtomicBool::new(true);
        state.subscribe(move |_| {
            if first_call.swap(false, Ordering::SeqCst) {
                entered_tx.send(()).unwrap();
                release_rx.lock().unwrap().recv().unwrap();
            }
        });
        let saved = recording(&state);

        let first = {
            let state = state.clone();
            thread::spawn(move || state.add_group("First", IconName::Book).unwrap())
        };
        entered_rx.recv().unwrap();
        let second = {
            let state = state.clone();
            thread::spawn(move || state.add_group("Second", IconName::Car).unwrap())
        };
        thread::sleep(Duration::from_millis(50));
        release_tx.send(()).unwrap();
        first.join().unwrap();
        second.join().unwrap();

        let saved = saved.lock().unwrap();
        assert_eq!(saved.len(), 2);
        assert_eq!(saved[0].groups.len(), 2);
        assert_eq!(saved.last(), Some(&state.data_file()));
        assert_eq!(state.groups().len(), 3);
    }

    #[test]
    fn replace_groups_validates_and_repairs_selection() {
        let state = seeded();
        let mut work = Group::seed();
        work.id = "77".into();
        work.name = "Work".into();

        assert_eq!(state.replace_groups(Vec::new()), Err(StateError::EmptyCollection));
        assert_eq!(
            state.replace_groups(vec![work.clone(), work.clone()]),
            Err(StateError::DuplicateGroupId("77".into()))
        );

        let mut dup_tasks = work.clone();
        let task = Task {
            id: "5".into(),
            title: "x".into(),
            completed: false,
            time: "09:00".into(),
            priority: Priority::Medium,
            due_date: None,
            tag: None,
            members: Vec::new(),
        };
        dup_tasks.tasks = vec![task.clone(), task];
        assert_eq!(
            state.replace_groups(vec![dup_tasks]),
            Err(StateError::DuplicateTaskId("5".into()))
        );

        state.replace_groups(vec![work.clone()]).unwrap();
        assert_eq!(state.groups(), vec![work]);
        assert_eq!(state.selected_group_id().as_deref(), Some("77"));
    }

    #[test]
    fn dialog_add_flow_stays_open_on_invalid_submit() {
        let state = seeded();
        assert_eq!(state.submit_dialog(), Err(StateError::DialogClosed));
        assert_eq!(
            state.update_dialog(TaskDraft::default()),
            Err(StateError::DialogClosed)
        );

        state.open_add_dialog().unwrap();
        state.update_dialog(draft("Buy milk", "")).unwrap();
        assert_eq!(state.submit_dialog(), Err(StateError::BlankTime));
        assert!(state.dialog().is_open());

        state.update_dialog(draft("Buy milk", "09:00 - 10:00")).unwrap();
        let task = state.submit_dialog().unwrap();
        assert_eq!(task.title, "Buy milk");
        assert!(!state.dialog().is_open());
        assert_eq!(state.visible_tasks(), vec![task]);
    }

    #[test]
    fn dialog_edit_flow_and_cancel() {
        let state = seeded();
        let task = state.add_task(draft("Report", "09:00")).unwrap();

        let opened = state.open_edit_dialog(&task.id).unwrap();
        assert_eq!(opened.draft().unwrap().title, "Report");
        state.update_dialog(draft("Edited", "10:00")).unwrap();
        state.cancel_dialog();
        assert!(!state.dialog().is_open());
        assert_eq!(state.visible_tasks()[0].title, "Report");

        state.open_edit_dialog(&task.id).unwrap();
        state.update_dialog(draft("Edited", "10:00")).unwrap();
        let edited = state.submit_dialog().unwrap();
        assert_eq!(edited.id, task.id);
        assert_eq!(edited.title, "Edited");
        assert_eq!(edited.time, "10:00");

        assert_eq!(
            state.open_edit_dialog("missing"),
            Err(StateError::TaskNotFound("missing".into()))
        );
    }

    #[test]
    fn state_error_messages_are_readable() {
        assert_eq!(StateError::LastGroup.to_string(), "cannot delete the last group");
        assert_eq!(
            StateError::IndexOutOfRange { index: 3, len: 2 }.to_string(),
            "index 3 out of range for 2 visible tasks"
        );
    }
}
