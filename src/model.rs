use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::{OffsetDateTime, PrimitiveDateTime, Time};
use uuid::Uuid;

use crate::error::Error;

// Self documenting alias. Wall-clock local time, no offset, second precision.
pub type TimeStamp = PrimitiveDateTime;

/// Name stored when the user commits an empty name.
pub const UNTITLED: &str = "Untitled";

/// Current local time truncated to whole seconds.
///
/// Falls back to UTC when the local offset cannot be determined
/// (for example in multi-threaded test binaries).
pub fn local_now() -> TimeStamp {
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    let t = now.time();
    let time = Time::from_hms(t.hour(), t.minute(), t.second()).unwrap_or(t);
    PrimitiveDateTime::new(now.date(), time)
}

// --- Task identity ---

/// Stable opaque handle carried alongside every display projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(Uuid);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// First eight hex digits, enough to type on the command line.
    pub fn short(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }

    /// Accepts a full hyphenated UUID or any prefix of its simple form.
    pub fn matches_prefix(&self, prefix: &str) -> bool {
        let prefix = prefix.trim().to_ascii_lowercase();
        if prefix.is_empty() {
            return false;
        }
        self.0.hyphenated().to_string() == prefix || self.0.simple().to_string().starts_with(&prefix)
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// --- Categories ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    Work,
    Personal,
    Health,
    Social,
    Education,
    Financial,
    Hobby,
    Other,
}

impl Category {
    pub const ALL: [Category; 8] = [
        Category::Work,
        Category::Personal,
        Category::Health,
        Category::Social,
        Category::Education,
        Category::Financial,
        Category::Hobby,
        Category::Other,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Category::Work => "Work",
            Category::Personal => "Personal",
            Category::Health => "Health",
            Category::Social => "Social",
            Category::Education => "Education",
            Category::Financial => "Financial",
            Category::Hobby => "Hobby",
            Category::Other => "Other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Category {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.label().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                Error::validation(format!(
                    "unknown category '{s}' (expected one of Work, Personal, Health, Social, Education, Financial, Hobby, Other)"
                ))
            })
    }
}

// --- Task Object ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /** Identity, never reused */
    pub id: TaskId,

    /** Position in canonical order, always within [0, N) */
    pub order: usize,

    /** Short summary, never empty once committed */
    pub name: String,

    /** Free text, stored untruncated */
    pub description: String,

    /** `YYYY/M/D/H:MM` or empty */
    pub deadline: String,

    pub categories: BTreeSet<Category>,

    /** Set once at creation */
    pub created_at: TimeStamp,

    pub done: bool,

    pub priority: bool,

    /** Armed reminder instant, if any */
    pub reminder: Option<TimeStamp>,
}

impl Task {
    /// Month number (1-12) the task was created in.
    pub fn creation_month(&self) -> u8 {
        u8::from(self.created_at.month())
    }

    /// Does this task still have a reminder scheduled after `now`?
    pub fn has_pending_reminder(&self, now: TimeStamp) -> bool {
        self.reminder.is_some_and(|at| at > now)
    }
}

// --- Zero size markers for the "typed-state" builder ---
pub struct MissingName;
pub struct HasName;

/// User input for creating or editing a task. Not yet validated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskDraft {
    pub name: String,
    pub description: String,
    pub deadline: String,
    pub categories: BTreeSet<Category>,
}

pub struct DraftBuilder<NameState> {
    name: Option<String>,
    description: String,
    deadline: String,
    categories: BTreeSet<Category>,
    _state: std::marker::PhantomData<NameState>,
}

impl TaskDraft {
    /// Creates a new builder chain (*without* a name).
    pub fn builder() -> DraftBuilder<MissingName> {
        DraftBuilder {
            name: None,
            description: String::new(),
            deadline: String::new(),
            categories: BTreeSet::new(),
            _state: std::marker::PhantomData,
        }
    }
}

impl DraftBuilder<MissingName> {
    /// An empty name is allowed here and becomes "Untitled" on commit.
    pub fn name<S: Into<String>>(self, n: S) -> DraftBuilder<HasName> {
        DraftBuilder {
            name: Some(n.into()),
            description: self.description,
            deadline: self.deadline,
            categories: self.categories,
            _state: std::marker::PhantomData,
        }
    }
}

impl<NameState> DraftBuilder<NameState> {
    pub fn description<S: Into<String>>(mut self, d: S) -> Self {
        self.description = d.into();
        self
    }

    pub fn deadline<S: Into<String>>(mut self, d: S) -> Self {
        self.deadline = d.into();
        self
    }

    pub fn category(mut self, c: Category) -> Self {
        self.categories.insert(c);
        self
    }

    pub fn categories<I: IntoIterator<Item = Category>>(mut self, cs: I) -> Self {
        self.categories.extend(cs);
        self
    }
}

impl DraftBuilder<HasName> {
    pub fn build(self) -> TaskDraft {
        TaskDraft {
            name: self.name.unwrap_or_default(),
            description: self.description,
            deadline: self.deadline,
            categories: self.categories,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn category_parse_is_case_insensitive() {
        assert_eq!("work".parse::<Category>().unwrap(), Category::Work);
        assert_eq!(" HOBBY ".parse::<Category>().unwrap(), Category::Hobby);
        assert!("chores".parse::<Category>().is_err());
    }

    #[test]
    fn id_prefix_matching() {
        let id = TaskId::new();
        assert!(id.matches_prefix(&id.short()));
        assert!(id.matches_prefix(&id.to_string()));
        assert!(!id.matches_prefix(""));
    }

    #[test]
    fn builder_collects_fields() {
        let draft = TaskDraft::builder()
            .name("Gym")
            .category(Category::Health)
            .category(Category::Health)
            .deadline("2026/1/2/7:00")
            .build();
        assert_eq!(draft.name, "Gym");
        assert_eq!(draft.categories.len(), 1);
        assert_eq!(draft.deadline, "2026/1/2/7:00");
    }

    #[test]
    fn pending_reminder_is_strictly_future() {
        let now = datetime!(2026-10-16 12:00);
        let mut task = Task {
            id: TaskId::new(),
            order: 0,
            name: "x".into(),
            description: String::new(),
            deadline: String::new(),
            categories: BTreeSet::new(),
            created_at: now,
            done: false,
            priority: false,
            reminder: Some(now),
        };
        assert!(!task.has_pending_reminder(now));
        task.reminder = Some(datetime!(2026-10-16 12:01));
        assert!(task.has_pending_reminder(now));
        assert_eq!(task.creation_month(), 10);
    }
}
