use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::ids::{RoutineItemId, RoutineTemplateId, StateItemId, StateTemplateId};
use crate::state::{RoutineItem, StateItem};
use crate::template::{RoutineTemplate, StateTemplate};

/// Arena-style entity store keyed by identity. Owners cascade to their
/// children on delete, synchronously: once a delete returns, every query
/// reflects it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ItemStore {
    state_templates: HashMap<StateTemplateId, StateTemplate>,
    routine_templates: HashMap<RoutineTemplateId, RoutineTemplate>,
    /// Creation order of routine templates; generation scans it front to back.
    routine_sequence: Vec<RoutineTemplateId>,
    state_items: HashMap<StateItemId, StateItem>,
    routine_items: HashMap<RoutineItemId, RoutineItem>,
}

impl ItemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_state_template(&mut self, template: StateTemplate) -> StateTemplateId {
        let id = template.id;
        self.state_templates.insert(id, template);
        id
    }

    pub fn insert_routine_template(&mut self, template: RoutineTemplate) -> RoutineTemplateId {
        let id = template.id;
        if !self.routine_sequence.contains(&id) {
            self.routine_sequence.push(id);
        }
        self.routine_templates.insert(id, template);
        id
    }

    pub fn insert_state_item(&mut self, state: StateItem) -> StateItemId {
        let id = state.id;
        self.state_items.insert(id, state);
        id
    }

    pub fn insert_routine_item(&mut self, routine: RoutineItem) -> RoutineItemId {
        let id = routine.id;
        self.routine_items.insert(id, routine);
        id
    }

    pub fn state_template(&self, id: StateTemplateId) -> Option<&StateTemplate> {
        self.state_templates.get(&id)
    }

    pub fn state_template_mut(&mut self, id: StateTemplateId) -> Option<&mut StateTemplate> {
        self.state_templates.get_mut(&id)
    }

    pub fn routine_template(&self, id: RoutineTemplateId) -> Option<&RoutineTemplate> {
        self.routine_templates.get(&id)
    }

    pub fn routine_template_mut(&mut self, id: RoutineTemplateId) -> Option<&mut RoutineTemplate> {
        self.routine_templates.get_mut(&id)
    }

    pub fn state_item(&self, id: StateItemId) -> Option<&StateItem> {
        self.state_items.get(&id)
    }

    pub fn state_item_mut(&mut self, id: StateItemId) -> Option<&mut StateItem> {
        self.state_items.get_mut(&id)
    }

    pub fn routine_item(&self, id: RoutineItemId) -> Option<&RoutineItem> {
        self.routine_items.get(&id)
    }

    pub fn routine_sequence(&self) -> &[RoutineTemplateId] {
        &self.routine_sequence
    }

    pub fn routine_templates_in_order(&self) -> Vec<&RoutineTemplate> {
        self.routine_sequence
            .iter()
            .filter_map(|id| self.routine_templates.get(id))
            .collect()
    }

    pub fn state_templates(&self) -> Vec<&StateTemplate> {
        let mut templates: Vec<&StateTemplate> = self.state_templates.values().collect();
        templates.sort_by(|a, b| a.title.cmp(&b.title).then_with(|| a.id.0.cmp(&b.id.0)));
        templates
    }

    pub fn state_item_ids(&self) -> Vec<StateItemId> {
        self.state_items.keys().copied().collect()
    }

    /// All states for one calendar day, sorted by their in-day order.
    pub fn states_on(&self, date: NaiveDate) -> Vec<&StateItem> {
        let mut states: Vec<&StateItem> = self
            .state_items
            .values()
            .filter(|state| state.date == date)
            .collect();
        states.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.title.cmp(&b.title)));
        states
    }

    pub fn max_order_on(&self, date: NaiveDate) -> Option<u32> {
        self.state_items
            .values()
            .filter(|state| state.date == date)
            .map(|state| state.order)
            .max()
    }

    pub fn routine_items_on(&self, date: NaiveDate) -> Vec<&RoutineItem> {
        let mut routines: Vec<&RoutineItem> = self
            .routine_items
            .values()
            .filter(|routine| routine.date == date)
            .collect();
        routines.sort_by(|a, b| a.title.cmp(&b.title));
        routines
    }

    /// Delete a state template, detaching it from any routine template that
    /// listed it as a member.
    pub fn remove_state_template(&mut self, id: StateTemplateId) -> Option<StateTemplate> {
        let removed = self.state_templates.remove(&id)?;
        for routine in self.routine_templates.values_mut() {
            routine.state_templates.retain(|member| *member != id);
        }
        Some(removed)
    }

    /// Delete a routine template together with the member state templates it
    /// owns.
    pub fn remove_routine_template(&mut self, id: RoutineTemplateId) -> Option<RoutineTemplate> {
        let removed = self.routine_templates.remove(&id)?;
        self.routine_sequence.retain(|entry| *entry != id);
        for member in &removed.state_templates {
            self.state_templates.remove(member);
        }
        Some(removed)
    }

    /// Delete a live state, detaching it from any routine item and closing
    /// the order gap it leaves in its day.
    pub fn remove_state_item(&mut self, id: StateItemId) -> Option<StateItem> {
        let removed = self.state_items.remove(&id)?;
        for routine in self.routine_items.values_mut() {
            routine.state_items.retain(|member| *member != id);
        }
        self.renumber_day(removed.date);
        Some(removed)
    }

    /// Delete a routine item together with its member states.
    pub fn remove_routine_item(&mut self, id: RoutineItemId) -> Option<RoutineItem> {
        let removed = self.routine_items.remove(&id)?;
        for member in &removed.state_items {
            self.state_items.remove(member);
        }
        self.renumber_day(removed.date);
        Some(removed)
    }

    /// Referential integrity check, used when restoring a persisted store.
    pub fn validate(&self) -> Result<(), StoreError> {
        for id in &self.routine_sequence {
            if !self.routine_templates.contains_key(id) {
                return Err(StoreError::RoutineTemplateNotFound(*id));
            }
        }
        for routine in self.routine_templates.values() {
            for member in &routine.state_templates {
                if !self.state_templates.contains_key(member) {
                    return Err(StoreError::StateTemplateNotFound(*member));
                }
            }
        }
        for routine in self.routine_items.values() {
            for member in &routine.state_items {
                if !self.state_items.contains_key(member) {
                    return Err(StoreError::StateItemNotFound(*member));
                }
            }
        }
        Ok(())
    }

    fn renumber_day(&mut self, date: NaiveDate) {
        let mut entries: Vec<(u32, StateItemId)> = self
            .state_items
            .values()
            .filter(|state| state.date == date)
            .map(|state| (state.order, state.id))
            .collect();
        entries.sort_by_key(|entry| entry.0);
        for (index, (_, id)) in entries.iter().enumerate() {
            if let Some(state) = self.state_items.get_mut(id) {
                state.order = index as u32;
            }
        }
    }
}
