use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::StoreError;
use crate::ids::{
    ChecklistItemId, RoutineItemId, RoutineTemplateId, StateItemId, StateTemplateId,
};
use crate::occupancy;
use crate::state::{RoutineItem, StateItem};
use crate::store::ItemStore;
use crate::stream::StreamManager;
use crate::template::{RoutineTemplate, StateTemplate};
use crate::weekday::WeekdaySet;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlannerSnapshot {
    pub store: ItemStore,
    pub stream: StreamManager,
}

impl PlannerSnapshot {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("unable to read snapshot at {}", path.display()))?;
        let snapshot: Self = serde_json::from_str(&raw)
            .with_context(|| format!("snapshot at {} is not valid JSON", path.display()))?;
        snapshot.store.validate()?;
        Ok(snapshot)
    }
}

#[derive(Debug)]
pub struct PlannerService {
    store: ItemStore,
    stream: StreamManager,
    snapshot_path: Option<PathBuf>,
}

pub struct PlannerServiceBuilder {
    snapshot_path: Option<PathBuf>,
    window_hours: Option<i64>,
}

impl PlannerServiceBuilder {
    pub fn new() -> Self {
        Self {
            snapshot_path: None,
            window_hours: None,
        }
    }

    pub fn with_snapshot_path(mut self, path: impl AsRef<Path>) -> Self {
        self.snapshot_path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn with_window_hours(mut self, hours: i64) -> Self {
        self.window_hours = Some(hours);
        self
    }

    pub fn build(self) -> Result<PlannerService> {
        self.build_at(Local::now())
    }

    pub fn build_at(self, now: DateTime<Local>) -> Result<PlannerService> {
        let mut service = PlannerService {
            store: ItemStore::new(),
            stream: match self.window_hours {
                Some(hours) => StreamManager::with_window(now, hours),
                None => StreamManager::new(now),
            },
            snapshot_path: self.snapshot_path.clone(),
        };
        if let Some(path) = &self.snapshot_path {
            if path.exists() {
                let snapshot = PlannerSnapshot::load(path)?;
                info!(
                    path = %path.display(),
                    states = snapshot.store.state_item_ids().len(),
                    "snapshot restored"
                );
                service.store = snapshot.store;
                service.stream = snapshot.stream;
                if let Some(hours) = self.window_hours {
                    service.stream.set_window_hours(hours);
                }
            }
        }
        Ok(service)
    }
}

impl PlannerService {
    pub fn builder() -> PlannerServiceBuilder {
        PlannerServiceBuilder::new()
    }

    pub fn from_snapshot(snapshot: PlannerSnapshot) -> Self {
        Self {
            store: snapshot.store,
            stream: snapshot.stream,
            snapshot_path: None,
        }
    }

    pub fn snapshot(&self) -> PlannerSnapshot {
        PlannerSnapshot {
            store: self.store.clone(),
            stream: self.stream.clone(),
        }
    }

    pub fn save(&self) -> Result<()> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };
        self.save_to_path(path)
    }

    pub fn save_to_path(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let raw = serde_json::to_string_pretty(&self.snapshot())?;
        fs::write(path, raw)
            .with_context(|| format!("unable to write snapshot at {}", path.display()))?;
        debug!(path = %path.display(), "snapshot saved");
        Ok(())
    }

    pub fn needs_refresh(&self, now: DateTime<Local>) -> bool {
        self.stream.needs_refresh(now)
    }

    pub fn stream_dates(&self) -> Vec<NaiveDate> {
        self.stream.stream_dates()
    }

    pub fn window_hours(&self) -> i64 {
        self.stream.window_hours()
    }

    pub fn last_refresh(&self) -> DateTime<Local> {
        self.stream.last_refresh()
    }

    pub fn initialize(&mut self, now: DateTime<Local>) -> Vec<StateItemId> {
        let templates = self.store.routine_sequence().to_vec();
        let states = self.store.state_item_ids();
        self.stream
            .initialize_stream(now, &templates, &states, &mut self.store)
    }

    pub fn refresh(&mut self, now: DateTime<Local>) -> Vec<StateItemId> {
        let templates = self.store.routine_sequence().to_vec();
        let states = self.store.state_item_ids();
        self.stream
            .refresh_if_needed(now, &templates, &states, &mut self.store)
    }

    pub fn apply_routine(
        &mut self,
        id: RoutineTemplateId,
        now: DateTime<Local>,
    ) -> Result<Vec<StateItemId>> {
        let template = self
            .store
            .routine_template(id)
            .cloned()
            .ok_or(StoreError::RoutineTemplateNotFound(id))?;
        let today = now.date_naive();
        let current = self.current_state(today).map(|state| state.id);
        let states = self.store.state_item_ids();
        Ok(self
            .stream
            .apply_template(&template, current, &states, today, &mut self.store))
    }

    pub fn apply_state(
        &mut self,
        id: StateTemplateId,
        now: DateTime<Local>,
    ) -> Result<Vec<StateItemId>> {
        let template = self
            .store
            .state_template(id)
            .cloned()
            .ok_or(StoreError::StateTemplateNotFound(id))?;
        let today = now.date_naive();
        let current = self.current_state(today).map(|state| state.id);
        let states = self.store.state_item_ids();
        Ok(self
            .stream
            .apply_members(&[template], current, &states, today, &mut self.store))
    }

    pub fn materialize_routine(
        &mut self,
        id: RoutineTemplateId,
        date: NaiveDate,
    ) -> Result<RoutineItemId> {
        let template = self
            .store
            .routine_template(id)
            .cloned()
            .ok_or(StoreError::RoutineTemplateNotFound(id))?;
        Ok(template.create_routine(date, &mut self.store))
    }

    pub fn create_state_template(&mut self, title: impl Into<String>) -> StateTemplateId {
        let id = self.store.insert_state_template(StateTemplate::new(title));
        debug!(template = %id, "state template created");
        id
    }

    pub fn rename_state_template(
        &mut self,
        id: StateTemplateId,
        title: impl Into<String>,
    ) -> Result<()> {
        let template = self
            .store
            .state_template_mut(id)
            .ok_or(StoreError::StateTemplateNotFound(id))?;
        template.title = title.into();
        Ok(())
    }

    pub fn delete_state_template(&mut self, id: StateTemplateId) -> Result<()> {
        self.store
            .remove_state_template(id)
            .ok_or(StoreError::StateTemplateNotFound(id))?;
        Ok(())
    }

    pub fn add_blueprint_item(
        &mut self,
        template: StateTemplateId,
        title: impl Into<String>,
    ) -> Result<ChecklistItemId> {
        let blueprint = self
            .store
            .state_template_mut(template)
            .ok_or(StoreError::StateTemplateNotFound(template))?;
        Ok(blueprint.add_item(title))
    }

    pub fn remove_blueprint_item(
        &mut self,
        template: StateTemplateId,
        item: ChecklistItemId,
    ) -> Result<()> {
        let blueprint = self
            .store
            .state_template_mut(template)
            .ok_or(StoreError::StateTemplateNotFound(template))?;
        if !blueprint.remove_item(item) {
            return Err(StoreError::ChecklistItemNotFound(item).into());
        }
        Ok(())
    }

    pub fn state_templates(&self) -> Vec<StateTemplate> {
        self.store.state_templates().into_iter().cloned().collect()
    }

    pub fn state_template(&self, id: StateTemplateId) -> Result<StateTemplate> {
        self.store
            .state_template(id)
            .cloned()
            .ok_or_else(|| StoreError::StateTemplateNotFound(id).into())
    }

    pub fn create_routine_template(
        &mut self,
        title: impl Into<String>,
        repeat_days: WeekdaySet,
    ) -> (RoutineTemplateId, WeekdaySet) {
        let templates = self.store.routine_templates_in_order();
        let conflicts = occupancy::conflicting_days(&repeat_days, &templates, None);
        let id = self
            .store
            .insert_routine_template(RoutineTemplate::new(title, repeat_days));
        debug!(template = %id, conflicts = conflicts.len(), "routine template created");
        (id, conflicts)
    }

    pub fn rename_routine_template(
        &mut self,
        id: RoutineTemplateId,
        title: impl Into<String>,
    ) -> Result<()> {
        let template = self
            .store
            .routine_template_mut(id)
            .ok_or(StoreError::RoutineTemplateNotFound(id))?;
        template.title = title.into();
        Ok(())
    }

    pub fn set_repeat_days(
        &mut self,
        id: RoutineTemplateId,
        days: WeekdaySet,
    ) -> Result<WeekdaySet> {
        let templates = self.store.routine_templates_in_order();
        let conflicts = occupancy::conflicting_days(&days, &templates, Some(id));
        let template = self
            .store
            .routine_template_mut(id)
            .ok_or(StoreError::RoutineTemplateNotFound(id))?;
        template.repeat_days = days;
        Ok(conflicts)
    }

    pub fn add_routine_member(
        &mut self,
        routine: RoutineTemplateId,
        title: impl Into<String>,
    ) -> Result<StateTemplateId> {
        if self.store.routine_template(routine).is_none() {
            return Err(StoreError::RoutineTemplateNotFound(routine).into());
        }
        let member = self.store.insert_state_template(StateTemplate::new(title));
        if let Some(template) = self.store.routine_template_mut(routine) {
            template.state_templates.push(member);
        }
        Ok(member)
    }

    pub fn remove_routine_member(
        &mut self,
        routine: RoutineTemplateId,
        member: StateTemplateId,
    ) -> Result<()> {
        let template = self
            .store
            .routine_template(routine)
            .ok_or(StoreError::RoutineTemplateNotFound(routine))?;
        if !template.state_templates.contains(&member) {
            return Err(StoreError::StateTemplateNotFound(member).into());
        }
        self.store.remove_state_template(member);
        Ok(())
    }

    pub fn delete_routine_template(&mut self, id: RoutineTemplateId) -> Result<()> {
        self.store
            .remove_routine_template(id)
            .ok_or(StoreError::RoutineTemplateNotFound(id))?;
        Ok(())
    }

    pub fn routine_templates(&self) -> Vec<RoutineTemplate> {
        self.store
            .routine_templates_in_order()
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn routine_template(&self, id: RoutineTemplateId) -> Result<RoutineTemplate> {
        self.store
            .routine_template(id)
            .cloned()
            .ok_or_else(|| StoreError::RoutineTemplateNotFound(id).into())
    }

    pub fn occupied_days(&self, excluding: Option<RoutineTemplateId>) -> WeekdaySet {
        occupancy::occupied_days(&self.store.routine_templates_in_order(), excluding)
    }

    pub fn conflicting_days(
        &self,
        days: &WeekdaySet,
        excluding: Option<RoutineTemplateId>,
    ) -> WeekdaySet {
        occupancy::conflicting_days(days, &self.store.routine_templates_in_order(), excluding)
    }

    pub fn create_state(&mut self, title: impl Into<String>, date: NaiveDate) -> StateItemId {
        let order = self.store.max_order_on(date).map_or(0, |max| max + 1);
        self.store.insert_state_item(StateItem::new(title, date, order))
    }

    pub fn rename_state(&mut self, id: StateItemId, title: impl Into<String>) -> Result<()> {
        let state = self
            .store
            .state_item_mut(id)
            .ok_or(StoreError::StateItemNotFound(id))?;
        state.title = title.into();
        Ok(())
    }

    pub fn states_on(&self, date: NaiveDate) -> Vec<StateItem> {
        self.store.states_on(date).into_iter().cloned().collect()
    }

    pub fn routines_on(&self, date: NaiveDate) -> Vec<RoutineItem> {
        self.store.routine_items_on(date).into_iter().cloned().collect()
    }

    pub fn current_state(&self, date: NaiveDate) -> Option<StateItem> {
        self.store
            .states_on(date)
            .into_iter()
            .find(|state| !state.is_completed)
            .cloned()
    }

    pub fn set_state_completed(
        &mut self,
        id: StateItemId,
        done: bool,
        now: DateTime<Local>,
    ) -> Result<()> {
        let today = now.date_naive();
        let state = self
            .store
            .state_item_mut(id)
            .ok_or(StoreError::StateItemNotFound(id))?;
        state.set_completed(done, today);
        Ok(())
    }

    pub fn set_checklist_item_completed(
        &mut self,
        state: StateItemId,
        item: ChecklistItemId,
        done: bool,
        now: DateTime<Local>,
    ) -> Result<()> {
        let today = now.date_naive();
        let entry = self
            .store
            .state_item_mut(state)
            .ok_or(StoreError::StateItemNotFound(state))?;
        if !entry.set_item_completed(item, done, today) {
            return Err(StoreError::ChecklistItemNotFound(item).into());
        }
        Ok(())
    }

    pub fn add_checklist_item(
        &mut self,
        state: StateItemId,
        title: impl Into<String>,
    ) -> Result<ChecklistItemId> {
        let entry = self
            .store
            .state_item_mut(state)
            .ok_or(StoreError::StateItemNotFound(state))?;
        Ok(entry.add_item(title))
    }

    pub fn remove_checklist_item(
        &mut self,
        state: StateItemId,
        item: ChecklistItemId,
    ) -> Result<()> {
        let entry = self
            .store
            .state_item_mut(state)
            .ok_or(StoreError::StateItemNotFound(state))?;
        if !entry.remove_item(item) {
            return Err(StoreError::ChecklistItemNotFound(item).into());
        }
        Ok(())
    }

    pub fn delete_state(&mut self, id: StateItemId) -> Result<()> {
        self.store
            .remove_state_item(id)
            .ok_or(StoreError::StateItemNotFound(id))?;
        Ok(())
    }

    pub fn delete_routine(&mut self, id: RoutineItemId) -> Result<()> {
        self.store
            .remove_routine_item(id)
            .ok_or(StoreError::RoutineItemNotFound(id))?;
        Ok(())
    }
}
