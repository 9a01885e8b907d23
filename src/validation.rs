//! Input rules applied before a draft or reminder is committed.

use std::sync::LazyLock;

use regex::Regex;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;

use crate::error::{Error, Result};
use crate::model::{TaskDraft, TimeStamp, UNTITLED};

pub const DEFAULT_NAME_LIMIT: usize = 25;

/// Text the entry box shows before the user types anything.
pub const NAME_PLACEHOLDER: &str = "Limit To 25 Characters";

pub const REMINDER_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]");

static DEADLINE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{4}/\d{1,2}/\d{1,2}/\d{1,2}:\d{1,2}$").expect("deadline pattern compiles")
});

/// Rejects names longer than `limit` characters.
pub fn validate_name(name: &str, limit: usize) -> Result<()> {
    let len = name.chars().count();
    if len > limit {
        return Err(Error::validation(format!(
            "task name is {len} characters, the limit is {limit}"
        )));
    }
    Ok(())
}

/// Empty or placeholder input becomes "Untitled".
pub fn normalize_name(name: &str) -> String {
    let trimmed = name.trim();
    if trimmed.is_empty() || trimmed == NAME_PLACEHOLDER {
        UNTITLED.to_string()
    } else {
        name.to_string()
    }
}

pub fn validate_deadline(deadline: &str) -> Result<()> {
    if deadline.is_empty() || DEADLINE_PATTERN.is_match(deadline) {
        Ok(())
    } else {
        Err(Error::validation(
            "the deadline isn't in the correct format ('YYYY/M/D/H:M')",
        ))
    }
}

/// Parses `YYYY-MM-DD HH:MM` and requires the instant to be after `now`.
pub fn validate_reminder(input: &str, now: TimeStamp) -> Result<TimeStamp> {
    let at = TimeStamp::parse(input.trim(), REMINDER_FORMAT).map_err(|_| {
        Error::validation("invalid reminder format, please enter as 'YYYY-MM-DD HH:MM'")
    })?;
    if at <= now {
        return Err(Error::validation("the reminder time must be in the future"));
    }
    Ok(at)
}

/// Checks a draft and returns it with the name normalized.
pub fn commit_draft(draft: TaskDraft, name_limit: usize) -> Result<TaskDraft> {
    validate_name(&draft.name, name_limit)?;
    validate_deadline(&draft.deadline)?;
    Ok(TaskDraft {
        name: normalize_name(&draft.name),
        ..draft
    })
}
