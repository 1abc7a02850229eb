use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::ids::ChecklistItemId;

/// One row of a checklist. Lives inline in its parent's collection, both in
/// templates (where it is blueprint text) and in live states.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChecklistItem {
    pub id: ChecklistItemId,
    pub title: String,
    pub is_completed: bool,
    pub completed_date: Option<NaiveDate>,
    pub order: u32,
}

impl ChecklistItem {
    pub fn new(title: impl Into<String>, order: u32) -> Self {
        Self {
            id: ChecklistItemId::new(),
            title: title.into(),
            is_completed: false,
            completed_date: None,
            order,
        }
    }

    /// Copy for instantiating a blueprint row: fresh identity, completion
    /// cleared.
    pub fn instantiate(&self, order: u32) -> Self {
        Self {
            id: ChecklistItemId::new(),
            title: self.title.clone(),
            is_completed: false,
            completed_date: None,
            order,
        }
    }

    pub fn set_completed(&mut self, done: bool, today: NaiveDate) {
        self.is_completed = done;
        self.completed_date = if done { Some(today) } else { None };
    }
}

pub fn push_item(items: &mut Vec<ChecklistItem>, title: impl Into<String>) -> ChecklistItemId {
    let item = ChecklistItem::new(title, items.len() as u32);
    let id = item.id;
    items.push(item);
    id
}

pub fn remove_item(items: &mut Vec<ChecklistItem>, id: ChecklistItemId) -> bool {
    let before = items.len();
    items.retain(|item| item.id != id);
    let removed = items.len() != before;
    if removed {
        renumber(items);
    }
    removed
}

/// Rewrite orders to the dense 0..N-1 sequence, keeping relative order.
pub fn renumber(items: &mut [ChecklistItem]) {
    items.sort_by_key(|item| item.order);
    for (index, item) in items.iter_mut().enumerate() {
        item.order = index as u32;
    }
}
