//! Append-only record of mutating actions, and the per-month tallies the
//! progress chart is drawn from.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

pub const MONTH_LABELS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Add,
    Delete,
    Done,
    Undone,
}

impl ActionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::Add => "add",
            ActionKind::Delete => "delete",
            ActionKind::Done => "done",
            ActionKind::Undone => "undone",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "add" => Ok(ActionKind::Add),
            "delete" => Ok(ActionKind::Delete),
            "done" => Ok(ActionKind::Done),
            "undone" => Ok(ActionKind::Undone),
            other => Err(Error::validation(format!("unknown action '{other}'"))),
        }
    }
}

/// One logged action. `month` is 1-12.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    pub action: ActionKind,
    pub month: u8,
}

impl Activity {
    pub fn new(action: ActionKind, month: u8) -> Self {
        Self { action, month }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActivityLog(Vec<Activity>);

impl ActivityLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record(&mut self, action: ActionKind, month: u8) {
        self.0.push(Activity::new(action, month));
    }

    pub fn entries(&self) -> &[Activity] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Counts per action kind for each of the twelve months, Jan first.
    pub fn monthly_summary(&self) -> [MonthTally; 12] {
        let mut buckets = [MonthTally::default(); 12];
        for entry in &self.0 {
            let Some(bucket) = (entry.month as usize)
                .checked_sub(1)
                .and_then(|i| buckets.get_mut(i))
            else {
                continue;
            };
            match entry.action {
                ActionKind::Add => bucket.add += 1,
                ActionKind::Delete => bucket.delete += 1,
                ActionKind::Done => bucket.done += 1,
                ActionKind::Undone => bucket.undone += 1,
            }
        }
        buckets
    }
}

impl From<Vec<Activity>> for ActivityLog {
    fn from(entries: Vec<Activity>) -> Self {
        Self(entries)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MonthTally {
    pub add: u32,
    pub delete: u32,
    pub done: u32,
    pub undone: u32,
}

impl MonthTally {
    pub fn total(&self) -> u32 {
        self.add + self.delete + self.done + self.undone
    }
}
