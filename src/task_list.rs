//! The ordering engine.
//!
//! Tasks live in one vector kept in canonical order, partitioned front to
//! back into three contiguous zones:
//!
//! ```text
//! [0, bottom_priority_index)              priority zone
//! [bottom_priority_index, top_done_index) normal zone
//! [top_done_index, N)                     done zone
//! ```
//!
//! Every task's `order` equals its index. Flipping the list only sets a
//! flag that the projection honours; the vector itself is never reversed,
//! but the zone-changing operations still refuse to run while it is set.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::activity::{ActionKind, ActivityLog};
use crate::error::{Error, Result};
use crate::model::{Task, TaskDraft, TaskId, TimeStamp, local_now};
use crate::validation::{self, DEFAULT_NAME_LIMIT};
use crate::view::{self, Filter, SearchField, SortKey};

/// Everything that is persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineState {
    pub tasks: Vec<Task>,
    pub activity: ActivityLog,
    pub reversed: bool,
    pub bottom_priority_index: usize,
    pub top_done_index: usize,
}

impl EngineState {
    /// Checks order contiguity, zone partition and flag exclusion.
    pub fn check_invariants(&self) -> std::result::Result<(), String> {
        let n = self.tasks.len();
        let priority = self.tasks.iter().filter(|t| t.priority).count();
        let done = self.tasks.iter().filter(|t| t.done).count();

        if self.bottom_priority_index != priority {
            return Err(format!(
                "bottom priority index is {} but {priority} tasks are prioritized",
                self.bottom_priority_index
            ));
        }
        if self.top_done_index != n - done {
            return Err(format!(
                "top done index is {} but {done} of {n} tasks are done",
                self.top_done_index
            ));
        }
        for (i, task) in self.tasks.iter().enumerate() {
            if task.order != i {
                return Err(format!("task at position {i} has order {}", task.order));
            }
            if task.priority && task.done {
                return Err(format!("task '{}' is both done and prioritized", task.name));
            }
            if task.priority && i >= self.bottom_priority_index {
                return Err(format!("prioritized task '{}' is outside the priority zone", task.name));
            }
            if task.done && i < self.top_done_index {
                return Err(format!("done task '{}' is outside the done zone", task.name));
            }
        }
        if let Some(bad) = self.activity.entries().iter().find(|a| !(1..=12).contains(&a.month)) {
            return Err(format!("activity entry has month {}", bad.month));
        }
        Ok(())
    }
}

pub struct TaskList {
    state: EngineState,
    filter: Option<Filter>,
    sort: SortKey,
    name_limit: usize,
    clock: fn() -> TimeStamp,
}

impl Default for TaskList {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskList {
    pub fn new() -> Self {
        Self {
            state: EngineState::default(),
            filter: None,
            sort: SortKey::Default,
            name_limit: DEFAULT_NAME_LIMIT,
            clock: local_now,
        }
    }

    /// Adopts a previously persisted state after checking its invariants.
    pub fn from_state(state: EngineState) -> Result<Self> {
        let mut list = Self::new();
        list.replace_state(state)?;
        Ok(list)
    }

    pub fn with_clock(mut self, clock: fn() -> TimeStamp) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_name_limit(mut self, limit: usize) -> Self {
        self.name_limit = limit;
        self
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    pub fn into_state(self) -> EngineState {
        self.state
    }

    /// Tasks in canonical order.
    pub fn tasks(&self) -> &[Task] {
        &self.state.tasks
    }

    pub fn len(&self) -> usize {
        self.state.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.tasks.is_empty()
    }

    pub fn get(&self, id: TaskId) -> Option<&Task> {
        self.state.tasks.iter().find(|t| t.id == id)
    }

    pub fn activity(&self) -> &ActivityLog {
        &self.state.activity
    }

    pub fn is_reversed(&self) -> bool {
        self.state.reversed
    }

    pub fn bottom_priority_index(&self) -> usize {
        self.state.bottom_priority_index
    }

    pub fn top_done_index(&self) -> usize {
        self.state.top_done_index
    }

    pub fn sort_key(&self) -> SortKey {
        self.sort
    }

    /// Finds the task whose id equals or starts with `prefix`.
    pub fn resolve(&self, prefix: &str) -> Result<Option<TaskId>> {
        let mut hits = self.state.tasks.iter().filter(|t| t.id.matches_prefix(prefix));
        match (hits.next(), hits.next()) {
            (Some(t), None) => Ok(Some(t.id)),
            (None, _) => Ok(None),
            (Some(_), Some(_)) => Err(Error::Ambiguous(prefix.to_string())),
        }
    }

    // =========================================================================
    // Structural operations
    // =========================================================================

    /// Creates a task at the top of the done zone (bottom of the normal zone).
    pub fn add(&mut self, draft: TaskDraft) -> Result<&Task> {
        let draft = validation::commit_draft(draft, self.name_limit)?;
        let created_at = (self.clock)();
        let at = self.state.top_done_index;

        let task = Task {
            id: TaskId::new(),
            order: at,
            name: draft.name,
            description: draft.description,
            deadline: draft.deadline,
            categories: draft.categories,
            created_at,
            done: false,
            priority: false,
            reminder: None,
        };
        let month = task.creation_month();

        self.state.tasks.insert(at, task);
        self.state.top_done_index += 1;
        self.state.activity.record(ActionKind::Add, month);
        self.settle();

        let task = &self.state.tasks[at];
        debug!(id = %task.id, order = at, top_done = self.state.top_done_index, "task added");
        Ok(task)
    }

    /// Replaces the user-editable fields. Order, flags and creation date stay.
    pub fn edit(&mut self, id: TaskId, draft: TaskDraft) -> Result<bool> {
        let draft = validation::commit_draft(draft, self.name_limit)?;
        let Some(task) = self.state.tasks.iter_mut().find(|t| t.id == id) else {
            debug!(%id, "edit ignored, task is gone");
            return Ok(false);
        };
        task.name = draft.name;
        task.description = draft.description;
        task.deadline = draft.deadline;
        task.categories = draft.categories;
        debug!(%id, "task edited");
        Ok(true)
    }

    /// Deletes a task. Stale ids are ignored.
    pub fn remove(&mut self, id: TaskId) -> Option<Task> {
        let Some(idx) = self.position(id) else {
            debug!(%id, "remove ignored, task is gone");
            return None;
        };
        let task = self.state.tasks.remove(idx);

        if !task.done {
            self.state.top_done_index -= 1;
        }
        if idx < self.state.bottom_priority_index {
            self.state.bottom_priority_index -= 1;
        }
        if self.state.tasks.is_empty() {
            self.state.top_done_index = 0;
            self.state.bottom_priority_index = 0;
        }
        let month = self.current_month();
        self.state.activity.record(ActionKind::Delete, month);
        self.settle();

        debug!(
            %id,
            bottom_priority = self.state.bottom_priority_index,
            top_done = self.state.top_done_index,
            "task removed"
        );
        Some(task)
    }

    /// Marks a task done (moving it to the end) or not done (moving it to
    /// the top of the done zone). A prioritized task is unprioritized first.
    ///
    /// Returns the new `done` value, or `None` if the task is gone.
    pub fn toggle_done(&mut self, id: TaskId) -> Result<Option<bool>> {
        self.ensure_canonical_view()?;
        let Some(idx) = self.position(id) else {
            debug!(%id, "toggle done ignored, task is gone");
            return Ok(None);
        };
        let idx = self.clear_opposite_flag(idx, Zone::Done);
        let done = !self.state.tasks[idx].done;
        self.set_done(idx, done);
        self.settle();
        Ok(Some(done))
    }

    /// Moves a task into the priority zone (to the very top) or back out to
    /// the top of the normal zone. A done task is marked not done first.
    ///
    /// Returns the new `priority` value, or `None` if the task is gone.
    pub fn toggle_priority(&mut self, id: TaskId) -> Result<Option<bool>> {
        self.ensure_canonical_view()?;
        let Some(idx) = self.position(id) else {
            debug!(%id, "toggle priority ignored, task is gone");
            return Ok(None);
        };
        let idx = self.clear_opposite_flag(idx, Zone::Priority);
        let priority = !self.state.tasks[idx].priority;
        self.set_priority(idx, priority);
        self.settle();
        Ok(Some(priority))
    }

    pub fn reverse(&mut self) {
        self.state.reversed = !self.state.reversed;
        debug!(reversed = self.state.reversed, "list flipped");
    }

    /// Drops every task, the activity log and the flipped flag.
    pub fn clear(&mut self) {
        self.state = EngineState::default();
        self.filter = None;
        self.sort = SortKey::Default;
        debug!("task list cleared");
    }

    /// Swaps in a loaded state. On error the current state is untouched.
    pub fn replace_state(&mut self, state: EngineState) -> Result<()> {
        state
            .check_invariants()
            .map_err(|reason| Error::Corrupt {
                path: Default::default(),
                reason,
            })?;
        self.state = state;
        Ok(())
    }

    // =========================================================================
    // Reminders
    // =========================================================================

    /// Validates `input` and arms a reminder on the task.
    pub fn set_reminder(&mut self, id: TaskId, input: &str) -> Result<Option<TimeStamp>> {
        let at = validation::validate_reminder(input, (self.clock)())?;
        let Some(task) = self.state.tasks.iter_mut().find(|t| t.id == id) else {
            return Ok(None);
        };
        task.reminder = Some(at);
        debug!(%id, %at, "reminder set");
        Ok(Some(at))
    }

    pub fn clear_reminder(&mut self, id: TaskId) -> bool {
        match self.state.tasks.iter_mut().find(|t| t.id == id) {
            Some(task) => task.reminder.take().is_some(),
            None => false,
        }
    }

    /// Tasks whose reminder has not fired yet, as `(id, name, instant)`.
    pub fn pending_reminders(&self, now: TimeStamp) -> Vec<(TaskId, String, TimeStamp)> {
        self.state
            .tasks
            .iter()
            .filter(|t| t.has_pending_reminder(now))
            .filter_map(|t| t.reminder.map(|at| (t.id, t.name.clone(), at)))
            .collect()
    }

    // =========================================================================
    // Views
    // =========================================================================

    /// Sets the search query. Never touches any task.
    pub fn filter(&mut self, query: &str, field: SearchField) -> Vec<&Task> {
        self.filter = Some(Filter::new(query, field));
        self.visible()
    }

    pub fn clear_filter(&mut self) {
        self.filter = None;
    }

    pub fn is_filtered(&self) -> bool {
        self.filter.as_ref().is_some_and(Filter::is_active)
    }

    /// Sets the display order. Canonical order and zones are unaffected.
    pub fn sort(&mut self, by: SortKey) -> Vec<&Task> {
        self.sort = by;
        self.visible()
    }

    /// The filtered, sorted and possibly flipped sequence to draw.
    pub fn visible(&self) -> Vec<&Task> {
        view::project(
            &self.state.tasks,
            self.filter.as_ref(),
            self.sort,
            self.state.reversed,
        )
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn position(&self, id: TaskId) -> Option<usize> {
        self.state.tasks.iter().position(|t| t.id == id)
    }

    fn current_month(&self) -> u8 {
        u8::from((self.clock)().month())
    }

    fn ensure_canonical_view(&self) -> Result<()> {
        let reason = if self.is_filtered() {
            "this action isn't allowed while searching"
        } else if self.sort != SortKey::Default {
            "\"sort by\" must be set to default"
        } else if self.state.reversed {
            "tasks must not be flipped"
        } else {
            return Ok(());
        };
        warn!(reason, "zone change rejected");
        Err(Error::invalid_state(reason))
    }

    /// Priority and done are exclusive: leaving one zone before entering the
    /// other. Returns the task's index afterwards.
    fn clear_opposite_flag(&mut self, idx: usize, entering: Zone) -> usize {
        let task = &self.state.tasks[idx];
        match entering {
            Zone::Done if task.priority => self.set_priority(idx, false),
            Zone::Priority if task.done => self.set_done(idx, false),
            _ => idx,
        }
    }

    fn set_done(&mut self, idx: usize, done: bool) -> usize {
        let mut task = self.state.tasks.remove(idx);
        task.done = done;
        let id = task.id;
        let month = self.current_month();

        let at = if done {
            self.state.tasks.push(task);
            self.state.top_done_index -= 1;
            self.state.activity.record(ActionKind::Done, month);
            self.state.tasks.len() - 1
        } else {
            let at = self.state.top_done_index;
            self.state.tasks.insert(at, task);
            self.state.top_done_index += 1;
            self.state.activity.record(ActionKind::Undone, month);
            at
        };
        debug!(%id, done, top_done = self.state.top_done_index, "done toggled");
        at
    }

    fn set_priority(&mut self, idx: usize, priority: bool) -> usize {
        let mut task = self.state.tasks.remove(idx);
        task.priority = priority;
        let id = task.id;

        let at = if priority {
            self.state.tasks.insert(0, task);
            self.state.bottom_priority_index += 1;
            0
        } else {
            self.state.bottom_priority_index -= 1;
            let at = self.state.bottom_priority_index;
            self.state.tasks.insert(at, task);
            at
        };
        debug!(%id, priority, bottom_priority = self.state.bottom_priority_index, "priority toggled");
        at
    }

    /// Re-packs `order` to match positions.
    fn settle(&mut self) {
        for (i, task) in self.state.tasks.iter_mut().enumerate() {
            task.order = i;
        }
        debug_assert_eq!(self.state.check_invariants(), Ok(()));
    }
}

#[derive(Clone, Copy)]
enum Zone {
    Done,
    Priority,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::Activity;
    use time::macros::datetime;

    fn october() -> TimeStamp {
        datetime!(2026-10-16 09:30)
    }

    fn list() -> TaskList {
        TaskList::new().with_clock(october)
    }

    fn named(name: &str) -> TaskDraft {
        TaskDraft::builder().name(name).build()
    }

    fn add(list: &mut TaskList, name: &str) -> TaskId {
        list.add(named(name)).unwrap().id
    }

    fn order_of(list: &TaskList) -> Vec<String> {
        list.tasks().iter().map(|t| t.name.clone()).collect()
    }

    #[test]
    fn add_done_undone_scenario() {
        let mut list = list();
        let id = add(&mut list, "Buy milk");
        assert_eq!(list.get(id).unwrap().order, 0);
        assert_eq!(list.top_done_index(), 1);

        assert_eq!(list.toggle_done(id).unwrap(), Some(true));
        assert!(list.get(id).unwrap().done);
        assert_eq!(list.top_done_index(), 0);
        assert_eq!(list.get(id).unwrap().order, 0);

        assert_eq!(list.toggle_done(id).unwrap(), Some(false));
        assert_eq!(list.top_done_index(), 1);

        assert_eq!(
            list.activity().entries(),
            [
                Activity::new(ActionKind::Add, 10),
                Activity::new(ActionKind::Done, 10),
                Activity::new(ActionKind::Undone, 10),
            ]
        );
    }

    #[test]
    fn add_inserts_above_done_zone() {
        let mut list = list();
        let a = add(&mut list, "a");
        add(&mut list, "b");
        list.toggle_done(a).unwrap();
        add(&mut list, "c");
        assert_eq!(order_of(&list), ["b", "c", "a"]);
        assert_eq!(list.top_done_index(), 2);
        assert_eq!(list.get(a).unwrap().order, 2);
    }

    #[test]
    fn delete_repacks_orders() {
        let mut list = list();
        let a = add(&mut list, "a");
        add(&mut list, "b");
        add(&mut list, "c");
        list.remove(a).unwrap();
        assert_eq!(order_of(&list), ["b", "c"]);
        assert_eq!(list.tasks().iter().map(|t| t.order).collect::<Vec<_>>(), [0, 1]);
        assert_eq!(list.top_done_index(), 2);
    }

    #[test]
    fn deleting_below_priority_zone_keeps_boundary() {
        let mut list = list();
        add(&mut list, "a");
        add(&mut list, "b");
        let c = add(&mut list, "c");
        list.toggle_priority(c).unwrap();
        assert_eq!(list.get(c).unwrap().order, 0);
        assert_eq!(list.bottom_priority_index(), 1);

        let lowest = list.tasks()[2].id;
        list.remove(lowest).unwrap();
        assert_eq!(list.bottom_priority_index(), 1);
        assert_eq!(order_of(&list), ["c", "a"]);
    }

    #[test]
    fn deleting_priority_task_shrinks_zone() {
        let mut list = list();
        let a = add(&mut list, "a");
        add(&mut list, "b");
        list.toggle_priority(a).unwrap();
        list.remove(a).unwrap();
        assert_eq!(list.bottom_priority_index(), 0);
        assert_eq!(list.top_done_index(), 1);
    }

    #[test]
    fn deleting_done_task_keeps_top_done_index() {
        let mut list = list();
        add(&mut list, "a");
        let b = add(&mut list, "b");
        list.toggle_done(b).unwrap();
        assert_eq!(list.top_done_index(), 1);
        list.remove(b).unwrap();
        assert_eq!(list.top_done_index(), 1);
    }

    #[test]
    fn emptying_the_list_resets_boundaries() {
        let mut list = list();
        let a = add(&mut list, "a");
        list.toggle_priority(a).unwrap();
        list.remove(a).unwrap();
        assert_eq!(list.top_done_index(), 0);
        assert_eq!(list.bottom_priority_index(), 0);
        assert!(list.is_empty());
    }

    #[test]
    fn stale_ids_are_no_ops() {
        let mut list = list();
        let a = add(&mut list, "a");
        list.remove(a).unwrap();
        let logged = list.activity().len();
        assert!(list.remove(a).is_none());
        assert_eq!(list.toggle_done(a).unwrap(), None);
        assert_eq!(list.toggle_priority(a).unwrap(), None);
        assert!(!list.edit(a, named("x")).unwrap());
        assert_eq!(list.activity().len(), logged);
    }

    #[test]
    fn done_on_priority_task_unprioritizes_first() {
        let mut list = list();
        add(&mut list, "a");
        let b = add(&mut list, "b");
        list.toggle_priority(b).unwrap();
        assert_eq!(order_of(&list), ["b", "a"]);

        list.toggle_done(b).unwrap();
        let task = list.get(b).unwrap();
        assert!(task.done && !task.priority);
        assert_eq!(list.bottom_priority_index(), 0);
        assert_eq!(list.top_done_index(), 1);
        assert_eq!(order_of(&list), ["a", "b"]);
    }

    #[test]
    fn priority_on_done_task_undoes_first() {
        let mut list = list();
        let a = add(&mut list, "a");
        add(&mut list, "b");
        list.toggle_done(a).unwrap();

        list.toggle_priority(a).unwrap();
        let task = list.get(a).unwrap();
        assert!(task.priority && !task.done);
        assert_eq!(list.bottom_priority_index(), 1);
        assert_eq!(list.top_done_index(), 2);
        assert_eq!(order_of(&list), ["a", "b"]);
        assert_eq!(list.activity().entries().last().unwrap().action, ActionKind::Undone);
    }

    #[test]
    fn unprioritize_lands_at_top_of_normal_zone() {
        let mut list = list();
        let a = add(&mut list, "a");
        let b = add(&mut list, "b");
        add(&mut list, "c");
        list.toggle_priority(a).unwrap();
        list.toggle_priority(b).unwrap();
        assert_eq!(order_of(&list), ["b", "a", "c"]);

        list.toggle_priority(b).unwrap();
        assert_eq!(order_of(&list), ["a", "b", "c"]);
        assert_eq!(list.bottom_priority_index(), 1);
    }

    #[test]
    fn priority_toggles_are_not_logged() {
        let mut list = list();
        let a = add(&mut list, "a");
        list.toggle_priority(a).unwrap();
        list.toggle_priority(a).unwrap();
        assert_eq!(list.activity().len(), 1);
    }

    #[test]
    fn zone_changes_need_canonical_view() {
        let mut list = list();
        let a = add(&mut list, "a");

        list.filter("a", SearchField::Name);
        assert!(matches!(list.toggle_done(a), Err(Error::InvalidState(_))));
        list.filter("search", SearchField::Name);
        assert!(list.toggle_done(a).is_ok());
        list.clear_filter();

        list.sort(SortKey::Name);
        assert!(matches!(list.toggle_priority(a), Err(Error::InvalidState(_))));
        list.sort(SortKey::Default);

        list.reverse();
        assert!(matches!(list.toggle_priority(a), Err(Error::InvalidState(_))));
        list.reverse();
        assert!(list.toggle_priority(a).is_ok());
    }

    #[test]
    fn rejected_toggle_changes_nothing() {
        let mut list = list();
        let a = add(&mut list, "a");
        list.reverse();
        let before = list.state().clone();
        assert!(list.toggle_done(a).is_err());
        assert_eq!(list.state(), &before);
    }

    #[test]
    fn reverse_flips_visible_order_only() {
        let mut list = list();
        add(&mut list, "a");
        add(&mut list, "b");
        list.reverse();
        assert!(list.is_reversed());
        let shown: Vec<_> = list.visible().iter().map(|t| t.name.clone()).collect();
        assert_eq!(shown, ["b", "a"]);
        assert_eq!(order_of(&list), ["a", "b"]);
    }

    #[test]
    fn filter_does_not_mutate_tasks() {
        let mut list = list();
        add(&mut list, "Buy milk");
        add(&mut list, "Walk dog");
        let before = list.state().clone();
        assert_eq!(list.filter("MILK", SearchField::Name).len(), 1);
        assert_eq!(list.filter("", SearchField::Name).len(), 2);
        assert_eq!(list.state(), &before);
    }

    #[test]
    fn add_validates_before_mutating() {
        let mut list = list();
        let bad = TaskDraft::builder().name("x").deadline("soon").build();
        assert!(matches!(list.add(bad), Err(Error::Validation(_))));
        let long = named(&"n".repeat(26));
        assert!(list.add(long).is_err());
        assert!(list.is_empty());
        assert!(list.activity().is_empty());

        let untitled = list.add(named("")).unwrap();
        assert_eq!(untitled.name, "Untitled");
        assert_eq!(untitled.created_at, october());
    }

    #[test]
    fn edit_keeps_position_and_flags() {
        let mut list = list();
        let a = add(&mut list, "a");
        add(&mut list, "b");
        list.toggle_priority(a).unwrap();
        let draft = TaskDraft::builder()
            .name("renamed")
            .description("details")
            .deadline("2026/12/1/8:00")
            .build();
        assert!(list.edit(a, draft).unwrap());
        let task = list.get(a).unwrap();
        assert_eq!(task.name, "renamed");
        assert_eq!(task.deadline, "2026/12/1/8:00");
        assert!(task.priority);
        assert_eq!(task.order, 0);
    }

    #[test]
    fn reminders_must_be_future_and_can_be_cleared() {
        let mut list = list();
        let a = add(&mut list, "a");
        assert!(list.set_reminder(a, "2026-10-16 09:00").is_err());
        assert_eq!(
            list.set_reminder(a, "2026-10-16 10:00").unwrap(),
            Some(datetime!(2026-10-16 10:00))
        );
        assert_eq!(list.pending_reminders(october()).len(), 1);
        assert!(list.clear_reminder(a));
        assert!(list.pending_reminders(october()).is_empty());
    }

    #[test]
    fn resolve_by_prefix() {
        let mut list = list();
        let a = add(&mut list, "a");
        assert_eq!(list.resolve(&a.short()).unwrap(), Some(a));
        assert_eq!(list.resolve("zzzz").unwrap(), None);
    }

    #[test]
    fn corrupt_state_is_rejected() {
        let mut list = list();
        add(&mut list, "a");
        let mut state = list.state().clone();
        state.top_done_index = 0;
        assert!(matches!(TaskList::from_state(state), Err(Error::Corrupt { .. })));
    }
}
