// --- Snapshot and exchange-file persistence ---
//
// Two forms of the same `EngineState`:
// - the durable snapshot, bincode, auto-saved and auto-loaded;
// - the exchange file, JSON, written and read on explicit user request.

use std::{
    collections::BTreeSet,
    fs::{self, File},
    io::{ErrorKind, Read, Write},
    path::{Path, PathBuf},
};

use fs4::fs_std::FileExt;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile; // For atomic writes
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use tracing::info;

use crate::activity::{ActionKind, Activity, ActivityLog};
use crate::error::{Error, Result};
use crate::model::{Category, Task, TaskId, TimeStamp, local_now};
use crate::task_list::EngineState;
use crate::validation::REMINDER_FORMAT;

pub const SNAPSHOT_VERSION: u32 = 1;

pub const CREATION_DATE_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

// --- Durable snapshot ---

#[derive(Debug, Deserialize, Serialize)]
struct Meta {
    version: u32,
    saved_at: TimeStamp,
}

#[derive(Debug, Deserialize, Serialize)]
struct SnapshotFile {
    meta: Meta,
    state: EngineState,
}

/// The auto-managed binary snapshot at a single well-known path.
#[derive(Debug, Clone)]
pub struct Snapshot {
    path: PathBuf,
}

impl Snapshot {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the snapshot. A missing or zero-length file means "no prior state".
    pub fn load(&self) -> Result<Option<EngineState>> {
        let mut file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        lock_shared(&file)?;

        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;
        if bytes.is_empty() {
            return Ok(None);
        }

        let snapshot: SnapshotFile = bincode::deserialize(&bytes)?;
        if snapshot.meta.version != SNAPSHOT_VERSION {
            return Err(self.corrupt(format!(
                "unsupported snapshot version {}",
                snapshot.meta.version
            )));
        }
        snapshot
            .state
            .check_invariants()
            .map_err(|reason| self.corrupt(reason))?;

        info!(path = %self.path.display(), tasks = snapshot.state.tasks.len(), "snapshot loaded");
        Ok(Some(snapshot.state))
    }

    /// Overwrites the snapshot wholesale.
    pub fn save(&self, state: &EngineState) -> Result<()> {
        let snapshot = SnapshotFile {
            meta: Meta {
                version: SNAPSHOT_VERSION,
                saved_at: local_now(),
            },
            state: state.clone(),
        };
        let bytes = bincode::serialize(&snapshot)?;
        atomic_write(&self.path, &bytes)?;
        info!(path = %self.path.display(), tasks = state.tasks.len(), "snapshot saved");
        Ok(())
    }

    /// Removes the snapshot file. Returns whether one existed.
    pub fn delete(&self) -> Result<bool> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                info!(path = %self.path.display(), "snapshot deleted");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn corrupt(&self, reason: String) -> Error {
        Error::Corrupt {
            path: self.path.clone(),
            reason,
        }
    }
}

// --- Exchange file ---

#[derive(Debug, Deserialize, Serialize)]
struct ExchangeFile {
    tasks: Vec<ExchangeTask>,
    #[serde(rename = "progressTracker")]
    progress_tracker: Vec<(String, String)>,
    #[serde(rename = "tasksListFlipped")]
    tasks_list_flipped: bool,
    #[serde(rename = "bottomPriorityIndex")]
    bottom_priority_index: usize,
    #[serde(rename = "topDoneIndex")]
    top_done_index: usize,
}

#[derive(Debug, Deserialize, Serialize)]
struct ExchangeTask {
    /** Absent in files written by older versions; a fresh id is minted */
    #[serde(default)]
    id: Option<TaskId>,
    order: usize,
    name: String,
    deadline: String,
    category: Vec<String>,
    #[serde(rename = "creation date")]
    creation_date: String,
    description: String,
    done: bool,
    priority: bool,
    #[serde(default)]
    reminder: Option<String>,
}

impl ExchangeTask {
    fn from_task(task: &Task) -> Result<Self> {
        Ok(Self {
            id: Some(task.id),
            order: task.order,
            name: task.name.clone(),
            deadline: task.deadline.clone(),
            category: task.categories.iter().map(|c| c.label().to_string()).collect(),
            creation_date: task.created_at.format(CREATION_DATE_FORMAT)?,
            description: task.description.clone(),
            done: task.done,
            priority: task.priority,
            reminder: task.reminder.map(|r| r.format(REMINDER_FORMAT)).transpose()?,
        })
    }

    fn into_task(self) -> std::result::Result<Task, String> {
        let created_at = TimeStamp::parse(&self.creation_date, CREATION_DATE_FORMAT)
            .map_err(|e| format!("bad creation date '{}': {e}", self.creation_date))?;
        let reminder = self
            .reminder
            .map(|r| {
                TimeStamp::parse(&r, REMINDER_FORMAT).map_err(|e| format!("bad reminder '{r}': {e}"))
            })
            .transpose()?;
        let categories = self
            .category
            .iter()
            .map(|c| c.parse::<Category>().map_err(|e| e.to_string()))
            .collect::<std::result::Result<BTreeSet<Category>, String>>()?;

        Ok(Task {
            id: self.id.unwrap_or_default(),
            order: self.order,
            name: self.name,
            description: self.description,
            deadline: self.deadline,
            categories,
            created_at,
            done: self.done,
            priority: self.priority,
            reminder,
        })
    }
}

fn to_exchange(state: &EngineState) -> Result<ExchangeFile> {
    Ok(ExchangeFile {
        tasks: state
            .tasks
            .iter()
            .map(ExchangeTask::from_task)
            .collect::<Result<_>>()?,
        progress_tracker: state
            .activity
            .entries()
            .iter()
            .map(|a| (a.action.to_string(), format!("{:02}", a.month)))
            .collect(),
        tasks_list_flipped: state.reversed,
        bottom_priority_index: state.bottom_priority_index,
        top_done_index: state.top_done_index,
    })
}

fn from_exchange(file: ExchangeFile) -> std::result::Result<EngineState, String> {
    let mut tasks = file
        .tasks
        .into_iter()
        .map(ExchangeTask::into_task)
        .collect::<std::result::Result<Vec<_>, _>>()?;
    // Files may hold the list as last displayed (flipped or sorted).
    tasks.sort_by_key(|t| t.order);
    let activity = file
        .progress_tracker
        .into_iter()
        .map(|(action, month)| -> std::result::Result<Activity, String> {
            let action = action.parse::<ActionKind>().map_err(|e| e.to_string())?;
            let month = month
                .trim()
                .parse::<u8>()
                .map_err(|_| format!("bad month '{month}'"))?;
            Ok(Activity::new(action, month))
        })
        .collect::<std::result::Result<Vec<_>, String>>()?;

    let state = EngineState {
        tasks,
        activity: ActivityLog::from(activity),
        reversed: file.tasks_list_flipped,
        bottom_priority_index: file.bottom_priority_index,
        top_done_index: file.top_done_index,
    };
    state.check_invariants()?;
    Ok(state)
}

/// Writes the human-readable exchange form.
pub fn export_json(path: impl AsRef<Path>, state: &EngineState) -> Result<()> {
    let path = path.as_ref();
    let file = to_exchange(state)?;
    let bytes = serde_json::to_vec_pretty(&file)?;
    atomic_write(path, &bytes)?;
    info!(path = %path.display(), tasks = state.tasks.len(), "task list exported");
    Ok(())
}

/// Reads and fully validates an exchange file. Nothing is replaced here.
pub fn import_json(path: impl AsRef<Path>) -> Result<EngineState> {
    let path = path.as_ref();
    let raw = fs::read(path)?;
    let file: ExchangeFile = serde_json::from_slice(&raw)?;
    let state = from_exchange(file).map_err(|reason| Error::Corrupt {
        path: path.to_path_buf(),
        reason,
    })?;
    info!(path = %path.display(), tasks = state.tasks.len(), "task list imported");
    Ok(state)
}

/// Atomically replace `path` with `bytes`, only once the entire payload is
/// safely on disk.
pub fn atomic_write(path: impl AsRef<Path>, bytes: &[u8]) -> Result<()> {
    let path = path.as_ref();
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)?;

    // Write into a temp file in the *same* directory.
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.flush()?;
    tmp.as_file().sync_all()?;

    // atomic rename on POSIX, safe fallback on Windows
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

// --- Internal Helper: advisory locking ---
fn lock_shared(file: &File) -> Result<()> {
    FileExt::lock_shared(file)?;
    Ok(())
}
