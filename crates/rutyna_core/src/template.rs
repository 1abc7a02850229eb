use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::checklist::{self, ChecklistItem};
use crate::ids::{ChecklistItemId, RoutineItemId, RoutineTemplateId, StateItemId, StateTemplateId};
use crate::state::{RoutineItem, StateItem};
use crate::store::ItemStore;
use crate::weekday::{Weekday, WeekdaySet};

/// Blueprint for a single task: a title plus default checklist text. The
/// blueprint rows are never completed themselves.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StateTemplate {
    pub id: StateTemplateId,
    pub title: String,
    pub checklist: Vec<ChecklistItem>,
}

impl StateTemplate {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: StateTemplateId::new(),
            title: title.into(),
            checklist: Vec::new(),
        }
    }

    pub fn add_item(&mut self, title: impl Into<String>) -> ChecklistItemId {
        checklist::push_item(&mut self.checklist, title)
    }

    pub fn remove_item(&mut self, id: ChecklistItemId) -> bool {
        checklist::remove_item(&mut self.checklist, id)
    }

    /// Instantiate this blueprint as a live state for `date`. Every blueprint
    /// row becomes a fresh checklist item at its blueprint index.
    pub fn create_state(&self, date: NaiveDate, order: u32, store: &mut ItemStore) -> StateItemId {
        let mut state = StateItem::new(self.title.clone(), date, order);
        for (index, blueprint) in self.checklist.iter().enumerate() {
            state.checklist.push(blueprint.instantiate(index as u32));
        }
        store.insert_state_item(state)
    }
}

/// An ordered collection of state templates, optionally bound to weekdays
/// for automatic recurrence. Member order becomes generation order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoutineTemplate {
    pub id: RoutineTemplateId,
    pub title: String,
    pub repeat_days: WeekdaySet,
    pub state_templates: Vec<StateTemplateId>,
}

impl RoutineTemplate {
    pub fn new(title: impl Into<String>, repeat_days: WeekdaySet) -> Self {
        Self {
            id: RoutineTemplateId::new(),
            title: title.into(),
            repeat_days,
            state_templates: Vec::new(),
        }
    }

    /// True when this template recurs automatically on the weekday of
    /// `date`. An empty `repeat_days` set means manual-only.
    pub fn matches_date(&self, date: NaiveDate) -> bool {
        self.repeat_days.contains(&Weekday::from_date(date))
    }

    /// Instantiate the whole routine for `date`, including the day-level
    /// grouping entity. Member states get orders 0..N in member order.
    pub fn create_routine(&self, date: NaiveDate, store: &mut ItemStore) -> RoutineItemId {
        let members = self.resolve_members(store);
        let mut state_ids = Vec::with_capacity(members.len());
        for (index, member) in members.iter().enumerate() {
            state_ids.push(member.create_state(date, index as u32, store));
        }
        let routine = RoutineItem {
            id: RoutineItemId::new(),
            title: self.title.clone(),
            date,
            state_items: state_ids,
        };
        store.insert_routine_item(routine)
    }

    /// Instantiate member states into an existing day without a grouping
    /// entity, at orders `start_order..start_order + N`.
    pub fn create_states(
        &self,
        date: NaiveDate,
        start_order: u32,
        store: &mut ItemStore,
    ) -> Vec<StateItemId> {
        let members = self.resolve_members(store);
        let mut created = Vec::with_capacity(members.len());
        for (index, member) in members.iter().enumerate() {
            created.push(member.create_state(date, start_order + index as u32, store));
        }
        created
    }

    pub(crate) fn resolve_members(&self, store: &ItemStore) -> Vec<StateTemplate> {
        self.state_templates
            .iter()
            .filter_map(|id| store.state_template(*id))
            .cloned()
            .collect()
    }
}
