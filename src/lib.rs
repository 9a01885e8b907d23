pub mod activity;
pub mod config;
pub mod error;
pub mod model;
pub mod reminder;
pub mod storage;
pub mod task_list;
pub mod validation;
pub mod view;

use std::path::Path;

use tracing::info;

pub use crate::error::{Error, Result};
pub use crate::model::{Category, Task, TaskDraft, TaskId};
pub use crate::task_list::{EngineState, TaskList};

use crate::config::Config;
use crate::storage::{Snapshot, export_json, import_json};

/// Restores the task list from the durable snapshot, or starts empty.
pub fn open_task_list(snapshot: &Snapshot, config: &Config) -> Result<TaskList> {
    let list = match snapshot.load()? {
        Some(state) => TaskList::from_state(state)?,
        None => TaskList::new(),
    };
    Ok(list.with_name_limit(config.name_limit))
}

/// Writes the current state to a user-chosen exchange file.
pub fn save_exchange(list: &TaskList, path: impl AsRef<Path>) -> Result<()> {
    export_json(path, list.state())
}

/// Replaces the current state with an exchange file and re-persists the
/// snapshot right away. On any failure the list is left as it was.
pub fn open_exchange(list: &mut TaskList, snapshot: &Snapshot, path: impl AsRef<Path>) -> Result<()> {
    let state = import_json(path)?;
    snapshot.save(&state)?;
    list.replace_state(state)?;
    Ok(())
}

/// Resets everything and deletes the durable snapshot.
pub fn clear_all(list: &mut TaskList, snapshot: &Snapshot) -> Result<()> {
    list.clear();
    snapshot.delete()?;
    info!("all tasks cleared");
    Ok(())
}
