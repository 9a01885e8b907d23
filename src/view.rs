//! Read-only projections of the canonical task sequence: search filter,
//! sort order and the one-line summaries a list widget draws.

use std::fmt;
use std::str::FromStr;

use time::format_description::BorrowedFormatItem;
use time::macros::format_description;

use crate::error::Error;
use crate::model::{Task, TaskId, TimeStamp};

/// Query text the search box shows while idle. Treated like an empty query.
pub const SEARCH_PLACEHOLDER: &str = "search";

/// Default width budget for `name + description` in a summary line.
pub const DEFAULT_SUMMARY_WIDTH: usize = 33;

const CREATION_SEARCH_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]/[month]/[day]/[hour]:[minute]");

const SUMMARY_DATE_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[day]/[month]/[year repr:last_two]");

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortKey {
    /// Canonical order: priority zone, normal zone, done zone.
    #[default]
    Default,
    Name,
    Deadline,
    CreationDate,
}

impl FromStr for SortKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['-', '_'], " ").as_str() {
            "default" => Ok(SortKey::Default),
            "name" => Ok(SortKey::Name),
            "deadline" => Ok(SortKey::Deadline),
            "creation date" | "created" => Ok(SortKey::CreationDate),
            other => Err(Error::validation(format!("unknown sort key '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SearchField {
    #[default]
    Name,
    Deadline,
    Category,
    CreationDate,
    Description,
}

impl FromStr for SearchField {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['-', '_'], " ").as_str() {
            "name" => Ok(SearchField::Name),
            "deadline" => Ok(SearchField::Deadline),
            "category" => Ok(SearchField::Category),
            "creation date" | "created" => Ok(SearchField::CreationDate),
            "description" => Ok(SearchField::Description),
            other => Err(Error::validation(format!("unknown search field '{other}'"))),
        }
    }
}

/// A search-box query against one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    needle: String,
    field: SearchField,
}

impl Filter {
    pub fn new(query: &str, field: SearchField) -> Self {
        Self {
            needle: query.to_lowercase(),
            field,
        }
    }

    /// Empty and placeholder queries show everything.
    pub fn is_active(&self) -> bool {
        !self.needle.is_empty() && self.needle != SEARCH_PLACEHOLDER
    }

    pub fn matches(&self, task: &Task) -> bool {
        if !self.is_active() {
            return true;
        }
        let needle = self.needle.as_str();
        match self.field {
            SearchField::Name => task.name.to_lowercase().contains(needle),
            SearchField::Deadline => task.deadline.to_lowercase().contains(needle),
            SearchField::Description => task.description.to_lowercase().contains(needle),
            SearchField::Category => task
                .categories
                .iter()
                .any(|c| c.label().to_lowercase().contains(needle)),
            SearchField::CreationDate => task
                .created_at
                .format(CREATION_SEARCH_FORMAT)
                .is_ok_and(|s| s.contains(needle)),
        }
    }
}

/// Filter, then sort (stable), then reverse when flipped.
pub fn project<'a>(
    tasks: &'a [Task],
    filter: Option<&Filter>,
    sort: SortKey,
    reversed: bool,
) -> Vec<&'a Task> {
    let mut out: Vec<&Task> = tasks
        .iter()
        .filter(|t| filter.is_none_or(|f| f.matches(t)))
        .collect();

    match sort {
        SortKey::Default => out.sort_by_key(|t| t.order),
        SortKey::Name => out.sort_by(|a, b| a.name.cmp(&b.name)),
        SortKey::Deadline => out.sort_by(|a, b| a.deadline.cmp(&b.deadline)),
        SortKey::CreationDate => out.sort_by_key(|t| t.created_at),
    }

    if reversed {
        out.reverse();
    }
    out
}

/// What one row of the list widget shows, plus the id to act on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSummary {
    pub id: TaskId,
    pub name: String,
    pub preview: String,
    pub created_at: TimeStamp,
    pub done: bool,
    pub priority: bool,
}

impl TaskSummary {
    pub fn new(task: &Task, width: usize) -> Self {
        let name_len = task.name.chars().count();
        let room = width.saturating_sub(name_len);
        let desc_len = task.description.chars().count();

        let preview = if desc_len > room {
            let cut: String = task.description.chars().take(room).collect();
            format!("{cut}... ")
        } else {
            let pad = (width + 4).saturating_sub(name_len + desc_len);
            format!("{}{}", task.description, " ".repeat(pad))
        };

        Self {
            id: task.id,
            name: task.name.clone(),
            preview,
            created_at: task.created_at,
            done: task.done,
            priority: task.priority,
        }
    }
}

impl fmt::Display for TaskSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let date = self
            .created_at
            .format(SUMMARY_DATE_FORMAT)
            .unwrap_or_default();
        write!(f, "  {}: {} {}", self.name, self.preview, date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Category;
    use std::collections::BTreeSet;
    use time::macros::datetime;

    fn task(order: usize, name: &str, deadline: &str, created: TimeStamp) -> Task {
        Task {
            id: TaskId::new(),
            order,
            name: name.to_string(),
            description: format!("about {name}"),
            deadline: deadline.to_string(),
            categories: BTreeSet::from([Category::Work]),
            created_at: created,
            done: false,
            priority: false,
            reminder: None,
        }
    }

    fn sample() -> Vec<Task> {
        vec![
            task(0, "Pay rent", "2026/11/1/9:00", datetime!(2026-10-03 08:00)),
            task(1, "buy milk", "", datetime!(2026-10-01 08:00)),
            task(2, "Call mom", "2026/10/20/18:00", datetime!(2026-10-02 08:00)),
        ]
    }

    fn names(tasks: &[&Task]) -> Vec<String> {
        tasks.iter().map(|t| t.name.clone()).collect()
    }

    #[test]
    fn placeholder_query_is_inactive() {
        assert!(!Filter::new("", SearchField::Name).is_active());
        assert!(!Filter::new("Search", SearchField::Name).is_active());
        assert!(Filter::new("milk", SearchField::Name).is_active());
    }

    #[test]
    fn filter_is_case_insensitive_per_field() {
        let tasks = sample();
        let by_name = Filter::new("MILK", SearchField::Name);
        assert_eq!(names(&project(&tasks, Some(&by_name), SortKey::Default, false)), ["buy milk"]);

        let by_category = Filter::new("wor", SearchField::Category);
        assert_eq!(project(&tasks, Some(&by_category), SortKey::Default, false).len(), 3);

        let by_created = Filter::new("2026/10/02", SearchField::CreationDate);
        assert_eq!(names(&project(&tasks, Some(&by_created), SortKey::Default, false)), ["Call mom"]);

        let by_description = Filter::new("about pay", SearchField::Description);
        assert_eq!(project(&tasks, Some(&by_description), SortKey::Default, false).len(), 1);
    }

    #[test]
    fn sorts_are_stable_projections() {
        let tasks = sample();
        assert_eq!(
            names(&project(&tasks, None, SortKey::Name, false)),
            ["Call mom", "Pay rent", "buy milk"]
        );
        assert_eq!(
            names(&project(&tasks, None, SortKey::Deadline, false)),
            ["buy milk", "Call mom", "Pay rent"]
        );
        assert_eq!(
            names(&project(&tasks, None, SortKey::CreationDate, true)),
            ["Pay rent", "Call mom", "buy milk"]
        );
        assert_eq!(tasks.iter().map(|t| t.order).collect::<Vec<_>>(), [0, 1, 2]);
    }

    #[test]
    fn summary_truncates_long_descriptions() {
        let mut t = task(0, "Report", "", datetime!(2026-10-16 09:00));
        t.description = "x".repeat(40);
        let summary = TaskSummary::new(&t, DEFAULT_SUMMARY_WIDTH);
        assert_eq!(summary.preview, format!("{}... ", "x".repeat(27)));
        assert_eq!(summary.to_string(), format!("  Report: {}...  16/10/26", "x".repeat(27)));

        t.description = "short".into();
        let summary = TaskSummary::new(&t, DEFAULT_SUMMARY_WIDTH);
        assert!(summary.preview.starts_with("short "));
    }

    #[test]
    fn parses_user_facing_names() {
        assert_eq!("Creation Date".parse::<SortKey>().unwrap(), SortKey::CreationDate);
        assert_eq!("creation-date".parse::<SearchField>().unwrap(), SearchField::CreationDate);
        assert!("priority".parse::<SortKey>().is_err());
    }
}
