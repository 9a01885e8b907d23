//! One-shot reminder timers.
//!
//! The scheduler never touches task state. A caller arms a timer per task,
//! polls it from its event loop and delivers whatever fired.

use std::collections::BTreeMap;
use std::fmt;

use time::Duration;
use tracing::debug;

use crate::model::{TaskId, TimeStamp};
use crate::task_list::TaskList;

pub const DEFAULT_SNOOZE_MINUTES: u32 = 5;

/// Handle returned by [`Scheduler::notify_at`]; pass it to `cancel`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Subscription(u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub subscription: Subscription,
    pub task: TaskId,
    pub name: String,
    pub due: TimeStamp,
    pub snoozed: bool,
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "It's time for \"{}\"!", self.name)
    }
}

#[derive(Debug, Clone)]
struct Timer {
    task: TaskId,
    name: String,
    due: TimeStamp,
    snoozed: bool,
}

#[derive(Debug)]
pub struct Scheduler {
    next: u64,
    timers: BTreeMap<Subscription, Timer>,
    snooze: Duration,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(Duration::minutes(i64::from(DEFAULT_SNOOZE_MINUTES)))
    }
}

impl Scheduler {
    pub fn new(snooze: Duration) -> Self {
        Self {
            next: 0,
            timers: BTreeMap::new(),
            snooze,
        }
    }

    pub fn notify_at(&mut self, due: TimeStamp, task: TaskId, name: impl Into<String>) -> Subscription {
        self.arm(due, task, name.into(), false)
    }

    fn arm(&mut self, due: TimeStamp, task: TaskId, name: String, snoozed: bool) -> Subscription {
        let sub = Subscription(self.next);
        self.next += 1;
        self.timers.insert(
            sub,
            Timer {
                task,
                name,
                due,
                snoozed,
            },
        );
        debug!(%task, %due, snoozed, "reminder armed");
        sub
    }

    /// Brings the timers in line with the reminders recorded on `list`.
    ///
    /// Timers of deleted tasks are cancelled, snoozed ones included. Timers
    /// whose reminder was changed or cleared are replaced. Returns how many
    /// timers were newly armed.
    pub fn sync(&mut self, list: &TaskList, now: TimeStamp) -> usize {
        self.timers.retain(|_, timer| match list.get(timer.task) {
            None => false,
            Some(_) if timer.snoozed => true,
            Some(task) => task.reminder == Some(timer.due),
        });

        let mut armed = 0;
        for (task, name, due) in list.pending_reminders(now) {
            let already = self
                .timers
                .values()
                .any(|t| t.task == task && !t.snoozed && t.due == due);
            if !already {
                self.arm(due, task, name, false);
                armed += 1;
            }
        }
        armed
    }

    pub fn cancel(&mut self, sub: Subscription) -> bool {
        self.timers.remove(&sub).is_some()
    }

    /// Drops every pending timer for a task. Used when the task is deleted.
    pub fn cancel_task(&mut self, task: TaskId) -> usize {
        let before = self.timers.len();
        self.timers.retain(|_, t| t.task != task);
        before - self.timers.len()
    }

    /// Removes and returns every timer due at or before `now`, earliest first.
    pub fn poll(&mut self, now: TimeStamp) -> Vec<Notification> {
        let due: Vec<Subscription> = self
            .timers
            .iter()
            .filter(|(_, t)| t.due <= now)
            .map(|(sub, _)| *sub)
            .collect();

        let mut fired: Vec<Notification> = due
            .into_iter()
            .filter_map(|sub| {
                self.timers.remove(&sub).map(|t| Notification {
                    subscription: sub,
                    task: t.task,
                    name: t.name,
                    due: t.due,
                    snoozed: t.snoozed,
                })
            })
            .collect();
        fired.sort_by_key(|n| (n.due, n.subscription));
        fired
    }

    /// Re-arms a fired reminder one snooze interval after `now`.
    pub fn snooze(&mut self, fired: &Notification, now: TimeStamp) -> Subscription {
        self.arm(now + self.snooze, fired.task, fired.name.clone(), true)
    }

    pub fn next_due(&self) -> Option<TimeStamp> {
        self.timers.values().map(|t| t.due).min()
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }
}
