//! Upgrades every persisted shape the renderer has ever written into [`DataFile`].
//!
//! * v0: a flat `Todo[]` of `{ id: number, text, completed }`.
//! * v1: `{ privateGroups: Group[] }`, priority and due date optional.
//! * v2: `{ schemaVersion: 2, groups: Group[] }`.

use serde::Deserialize;
use serde_json::Value;

use crate::models::{DataFile, Group, Priority, Task, SCHEMA_VERSION};
use crate::storage::json_kind;

#[derive(Debug)]
pub enum MigrateError {
    UnsupportedVersion(u32),
    Malformed(String),
}

impl std::fmt::Display for MigrateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MigrateError::UnsupportedVersion(version) => write!(
                f,
                "schema version {version} is newer than supported version {SCHEMA_VERSION}"
            ),
            MigrateError::Malformed(msg) => write!(f, "malformed data: {msg}"),
        }
    }
}

impl std::error::Error for MigrateError {}

impl From<serde_json::Error> for MigrateError {
    fn from(value: serde_json::Error) -> Self {
        MigrateError::Malformed(value.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct LegacyTodo {
    id: serde_json::Number,
    text: String,
    #[serde(default)]
    completed: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyGroupsFile {
    private_groups: Vec<Group>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VersionedFile {
    #[serde(default)]
    schema_version: Option<u32>,
    groups: Vec<Group>,
}

pub fn migrate(value: Value) -> Result<DataFile, MigrateError> {
    match value {
        Value::Null => Ok(DataFile::default()),
        Value::Array(_) => {
            let todos: Vec<LegacyTodo> = serde_json::from_value(value)?;
            log::info!("migrating flat todo list count={}", todos.len());
            Ok(from_flat_todos(todos))
        }
        Value::Object(ref map) if map.contains_key("privateGroups") => {
            let legacy: LegacyGroupsFile = serde_json::from_value(value)?;
            log::info!(
                "migrating privateGroups layout groups={}",
                legacy.private_groups.len()
            );
            Ok(DataFile::new(legacy.private_groups))
        }
        Value::Object(ref map) if map.contains_key("groups") => {
            let file: VersionedFile = serde_json::from_value(value)?;
            match file.schema_version {
                Some(version) if version > SCHEMA_VERSION => {
                    Err(MigrateError::UnsupportedVersion(version))
                }
                _ => Ok(DataFile::new(file.groups)),
            }
        }
        other => Err(MigrateError::Malformed(format!(
            "unrecognized top-level {}",
            json_kind(&other)
        ))),
    }
}

fn from_flat_todos(todos: Vec<LegacyTodo>) -> DataFile {
    let mut group = Group::seed();
    for todo in todos {
        let id = todo.id.to_string();
        // Flat lists never enforced unique ids.
        if group.tasks.iter().any(|task| task.id == id) {
            log::warn!("dropping duplicate legacy todo id={id}");
            continue;
        }
        group.tasks.push(Task {
            id,
            title: todo.text,
            completed: todo.completed,
            time: String::new(),
            priority: Priority::default(),
            due_date: None,
            tag: None,
            members: Vec::new(),
        });
    }
    DataFile::new(vec![group])
}
