use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::checklist::{self, ChecklistItem};
use crate::ids::{ChecklistItemId, RoutineItemId, StateItemId};

/// A task for one calendar day.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StateItem {
    pub id: StateItemId,
    pub title: String,
    pub order: u32,
    pub is_completed: bool,
    pub date: NaiveDate,
    pub checklist: Vec<ChecklistItem>,
}

impl StateItem {
    pub fn new(title: impl Into<String>, date: NaiveDate, order: u32) -> Self {
        Self {
            id: StateItemId::new(),
            title: title.into(),
            order,
            is_completed: false,
            date,
            checklist: Vec::new(),
        }
    }

    pub fn add_item(&mut self, title: impl Into<String>) -> ChecklistItemId {
        checklist::push_item(&mut self.checklist, title)
    }

    pub fn remove_item(&mut self, id: ChecklistItemId) -> bool {
        let removed = checklist::remove_item(&mut self.checklist, id);
        if removed {
            self.refresh_completion();
        }
        removed
    }

    /// Recompute the stored completion flag from the checklist and write it
    /// only on change. A state with no checklist keeps whatever was set
    /// directly. Returns whether the stored value changed.
    pub fn refresh_completion(&mut self) -> bool {
        if self.checklist.is_empty() {
            return false;
        }
        let derived = self.checklist.iter().all(|item| item.is_completed);
        if derived == self.is_completed {
            return false;
        }
        self.is_completed = derived;
        true
    }

    /// Set one checklist row's completion, stamping or clearing its
    /// completion date, then refresh the derived flag. Returns false when
    /// the row is unknown.
    pub fn set_item_completed(
        &mut self,
        item: ChecklistItemId,
        done: bool,
        today: NaiveDate,
    ) -> bool {
        let Some(row) = self.checklist.iter_mut().find(|row| row.id == item) else {
            return false;
        };
        row.set_completed(done, today);
        self.refresh_completion();
        true
    }

    /// Direct completion toggle; the flag is pushed down to every checklist
    /// row so the derived value agrees.
    pub fn set_completed(&mut self, done: bool, today: NaiveDate) {
        for row in &mut self.checklist {
            row.set_completed(done, today);
        }
        self.is_completed = done;
    }
}

/// Day-level grouping of states, created only by the whole-routine factory
/// path.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoutineItem {
    pub id: RoutineItemId,
    pub title: String,
    pub date: NaiveDate,
    pub state_items: Vec<StateItemId>,
}
