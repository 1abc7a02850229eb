use chrono::{DateTime, Duration, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ids::{RoutineTemplateId, StateItemId};
use crate::store::ItemStore;
use crate::template::{RoutineTemplate, StateTemplate};

pub const DEFAULT_WINDOW_HOURS: i64 = 72;

/// Rolling window of generated days. The window starts at yesterday so that
/// today sits in the middle, and it only moves once a calendar-day boundary
/// has been crossed since the last refresh. There are no timers; callers
/// check at observation points such as app foregrounding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StreamManager {
    stream_start: NaiveDate,
    window_hours: i64,
    last_refresh: DateTime<Local>,
}

impl StreamManager {
    pub fn new(now: DateTime<Local>) -> Self {
        Self::with_window(now, DEFAULT_WINDOW_HOURS)
    }

    pub fn with_window(now: DateTime<Local>, window_hours: i64) -> Self {
        let today = now.date_naive();
        Self {
            stream_start: today.checked_sub_signed(Duration::days(1)).unwrap_or(today),
            window_hours: window_hours.max(24),
            last_refresh: now,
        }
    }

    pub fn stream_start(&self) -> NaiveDate {
        self.stream_start
    }

    pub fn window_hours(&self) -> i64 {
        self.window_hours
    }

    pub fn set_window_hours(&mut self, hours: i64) {
        self.window_hours = hours.max(24);
    }

    pub fn last_refresh(&self) -> DateTime<Local> {
        self.last_refresh
    }

    /// Every calendar day whose start-of-day lies inside the window.
    pub fn stream_dates(&self) -> Vec<NaiveDate> {
        let mut dates = Vec::new();
        let mut offset = 0;
        while offset * 24 < self.window_hours {
            if let Some(date) = self.stream_start.checked_add_signed(Duration::days(offset)) {
                dates.push(date);
            }
            offset += 1;
        }
        dates
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.stream_dates().contains(&date)
    }

    /// A refresh is due once at least one day boundary has been crossed
    /// since the previous one.
    pub fn needs_refresh(&self, now: DateTime<Local>) -> bool {
        self.last_refresh.date_naive() < now.date_naive()
    }

    /// Slide the window so it starts at yesterday again, then generate
    /// material for every day inside it that lacks any. No-op between day
    /// boundaries; idempotent per day.
    pub fn refresh_if_needed(
        &mut self,
        now: DateTime<Local>,
        templates: &[RoutineTemplateId],
        existing_states: &[StateItemId],
        store: &mut ItemStore,
    ) -> Vec<StateItemId> {
        if !self.needs_refresh(now) {
            return Vec::new();
        }
        let today = now.date_naive();
        self.stream_start = today.checked_sub_signed(Duration::days(1)).unwrap_or(today);
        self.last_refresh = now;
        let mut generated = Vec::new();
        for date in self.stream_dates() {
            generated.extend(self.generate_for_date(date, templates, existing_states, store));
        }
        debug!(
            window_start = %self.stream_start,
            generated = generated.len(),
            "stream window refreshed"
        );
        generated
    }

    /// Backfill pass over the current window, without sliding it and without
    /// consulting `needs_refresh`. Used once at cold start.
    pub fn initialize_stream(
        &mut self,
        now: DateTime<Local>,
        templates: &[RoutineTemplateId],
        existing_states: &[StateItemId],
        store: &mut ItemStore,
    ) -> Vec<StateItemId> {
        let mut generated = Vec::new();
        for date in self.stream_dates() {
            generated.extend(self.generate_for_date(date, templates, existing_states, store));
        }
        self.last_refresh = now;
        debug!(
            window_start = %self.stream_start,
            generated = generated.len(),
            "stream initialized"
        );
        generated
    }

    /// Generation for one day. The guard is keyed on whether the day has any
    /// material at all, not on which template produced it; the first
    /// template in sequence order whose recurrence matches wins.
    fn generate_for_date(
        &self,
        date: NaiveDate,
        templates: &[RoutineTemplateId],
        existing_states: &[StateItemId],
        store: &mut ItemStore,
    ) -> Vec<StateItemId> {
        let day_orders: Vec<u32> = existing_states
            .iter()
            .filter_map(|id| store.state_item(*id))
            .filter(|state| state.date == date)
            .map(|state| state.order)
            .collect();
        if !day_orders.is_empty() {
            return Vec::new();
        }
        let Some(template) = templates
            .iter()
            .filter_map(|id| store.routine_template(*id))
            .find(|template| template.matches_date(date))
            .cloned()
        else {
            return Vec::new();
        };
        let start_order = day_orders.iter().copied().max().map_or(0, |max| max + 1);
        debug!(%date, template = %template.id, start_order, "generating day from template");
        template.create_states(date, start_order, store)
    }

    /// Manual application of a routine template into today's list.
    pub fn apply_template(
        &self,
        template: &RoutineTemplate,
        current_state: Option<StateItemId>,
        all_states: &[StateItemId],
        today: NaiveDate,
        store: &mut ItemStore,
    ) -> Vec<StateItemId> {
        let members = template.resolve_members(store);
        self.apply_members(&members, current_state, all_states, today, store)
    }

    /// Shift-insert into today's list: states at and after the insertion
    /// point move up by the member count, preserving their relative
    /// sequence, and the members are instantiated into the gap. The
    /// insertion point is just after `current_state` (today's first
    /// incomplete state) when one exists, else the end of the day.
    pub fn apply_members(
        &self,
        members: &[StateTemplate],
        current_state: Option<StateItemId>,
        all_states: &[StateItemId],
        today: NaiveDate,
        store: &mut ItemStore,
    ) -> Vec<StateItemId> {
        let today_states: Vec<(StateItemId, u32)> = all_states
            .iter()
            .filter_map(|id| store.state_item(*id))
            .filter(|state| state.date == today)
            .map(|state| (state.id, state.order))
            .collect();

        let insert_order = current_state
            .and_then(|id| store.state_item(id))
            .filter(|state| state.date == today)
            .map(|state| state.order + 1)
            .unwrap_or_else(|| {
                today_states
                    .iter()
                    .map(|(_, order)| *order)
                    .max()
                    .map_or(0, |max| max + 1)
            });

        if members.is_empty() {
            return Vec::new();
        }
        let count = members.len() as u32;

        for (id, order) in &today_states {
            if *order >= insert_order {
                if let Some(state) = store.state_item_mut(*id) {
                    state.order += count;
                }
            }
        }

        let mut created = Vec::with_capacity(members.len());
        for (index, member) in members.iter().enumerate() {
            created.push(member.create_state(today, insert_order + index as u32, store));
        }
        debug!(
            insert_order,
            created = created.len(),
            "template applied into today"
        );
        created
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::StateItem;
    use crate::weekday::Weekday;

    fn monday_morning() -> DateTime<Local> {
        use chrono::TimeZone;
        Local
            .with_ymd_and_hms(2024, 1, 8, 9, 0, 0)
            .single()
            .expect("valid local time")
    }

    fn at(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> DateTime<Local> {
        use chrono::TimeZone;
        Local
            .with_ymd_and_hms(year, month, day, hour, minute, 0)
            .single()
            .expect("valid local time")
    }

    fn seed_routine(
        store: &mut ItemStore,
        title: &str,
        days: &[Weekday],
        steps: &[&str],
    ) -> RoutineTemplateId {
        let mut routine = RoutineTemplate::new(title, days.iter().copied().collect());
        for step in steps {
            let member = store.insert_state_template(StateTemplate::new(*step));
            routine.state_templates.push(member);
        }
        store.insert_routine_template(routine)
    }

    #[test]
    fn window_covers_yesterday_today_and_tomorrow() {
        let manager = StreamManager::new(monday_morning());
        let dates = manager.stream_dates();
        let today = monday_morning().date_naive();
        assert_eq!(
            dates,
            vec![
                today - Duration::days(1),
                today,
                today + Duration::days(1),
            ]
        );
        assert!(manager.contains(today));
        assert!(!manager.contains(today + Duration::days(2)));
    }

    #[test]
    fn wider_windows_round_up_to_whole_days() {
        let manager = StreamManager::with_window(monday_morning(), 80);
        assert_eq!(manager.stream_dates().len(), 4);
    }

    #[test]
    fn refresh_is_due_only_after_a_day_boundary() {
        let manager = StreamManager::new(monday_morning());
        assert!(!manager.needs_refresh(monday_morning()));
        assert!(!manager.needs_refresh(at(2024, 1, 8, 23, 59)));
        assert!(manager.needs_refresh(at(2024, 1, 9, 0, 5)));
    }

    #[test]
    fn initialize_generates_only_matching_days() {
        let mut store = ItemStore::new();
        let routine = seed_routine(&mut store, "Work", &[Weekday::Monday], &["Standup"]);
        let mut manager = StreamManager::new(monday_morning());

        let generated = manager.initialize_stream(
            monday_morning(),
            &[routine],
            &store.state_item_ids(),
            &mut store,
        );
        assert_eq!(generated.len(), 1);

        let monday = monday_morning().date_naive();
        assert_eq!(store.states_on(monday).len(), 1);
        assert_eq!(store.states_on(monday)[0].title, "Standup");
        assert_eq!(store.states_on(monday)[0].order, 0);
        assert!(store.states_on(monday - Duration::days(1)).is_empty());
        assert!(store.states_on(monday + Duration::days(1)).is_empty());
    }

    #[test]
    fn days_with_material_are_never_regenerated() {
        let mut store = ItemStore::new();
        let routine = seed_routine(&mut store, "Work", &[Weekday::Monday], &["Standup"]);
        let mut manager = StreamManager::new(monday_morning());

        let first = manager.initialize_stream(
            monday_morning(),
            &[routine],
            &store.state_item_ids(),
            &mut store,
        );
        assert_eq!(first.len(), 1);

        let second = manager.initialize_stream(
            monday_morning(),
            &[routine],
            &store.state_item_ids(),
            &mut store,
        );
        assert!(second.is_empty());
        assert_eq!(store.states_on(monday_morning().date_naive()).len(), 1);
    }

    #[test]
    fn manual_material_blocks_generation_for_that_day() {
        let mut store = ItemStore::new();
        let routine = seed_routine(&mut store, "Work", &[Weekday::Monday], &["Standup"]);
        let monday = monday_morning().date_naive();
        store.insert_state_item(StateItem::new("Hand-written task", monday, 0));

        let mut manager = StreamManager::new(monday_morning());
        let generated = manager.initialize_stream(
            monday_morning(),
            &[routine],
            &store.state_item_ids(),
            &mut store,
        );
        assert!(generated.is_empty());
        assert_eq!(store.states_on(monday).len(), 1);
    }

    #[test]
    fn first_matching_template_wins() {
        let mut store = ItemStore::new();
        let first = seed_routine(&mut store, "Early", &[Weekday::Monday], &["From early"]);
        let second = seed_routine(&mut store, "Late", &[Weekday::Monday], &["From late"]);
        let mut manager = StreamManager::new(monday_morning());

        manager.initialize_stream(
            monday_morning(),
            &[first, second],
            &store.state_item_ids(),
            &mut store,
        );
        let monday = monday_morning().date_naive();
        let titles: Vec<&str> = store
            .states_on(monday)
            .iter()
            .map(|s| s.title.as_str())
            .collect();
        assert_eq!(titles, vec!["From early"]);
    }

    #[test]
    fn refresh_slides_the_window_and_backfills() {
        let mut store = ItemStore::new();
        let routine = seed_routine(
            &mut store,
            "Daily",
            &[
                Weekday::Monday,
                Weekday::Tuesday,
                Weekday::Wednesday,
            ],
            &["Plan the day"],
        );
        let mut manager = StreamManager::new(monday_morning());
        manager.initialize_stream(
            monday_morning(),
            &[routine],
            &store.state_item_ids(),
            &mut store,
        );
        let monday = monday_morning().date_naive();
        // Sunday does not match; Monday and Tuesday do
        assert_eq!(store.states_on(monday).len(), 1);
        assert_eq!(store.states_on(monday + Duration::days(1)).len(), 1);

        let tuesday_night = at(2024, 1, 9, 0, 30);
        let generated = manager.refresh_if_needed(
            tuesday_night,
            &[routine],
            &store.state_item_ids(),
            &mut store,
        );
        assert_eq!(manager.stream_start(), monday);
        assert_eq!(generated.len(), 1, "only Wednesday was missing");
        assert_eq!(store.states_on(monday + Duration::days(2)).len(), 1);

        let repeat = manager.refresh_if_needed(
            tuesday_night,
            &[routine],
            &store.state_item_ids(),
            &mut store,
        );
        assert!(repeat.is_empty(), "same day refresh is a no-op");
    }

    #[test]
    fn shift_insert_makes_room_after_the_current_state() {
        let mut store = ItemStore::new();
        let monday = monday_morning().date_naive();
        let existing: Vec<StateItemId> = (0..4)
            .map(|order| {
                store.insert_state_item(StateItem::new(format!("task {order}"), monday, order))
            })
            .collect();
        let routine_id = seed_routine(&mut store, "Break", &[], &["Walk", "Water"]);
        let template = store.routine_template(routine_id).unwrap().clone();

        let manager = StreamManager::new(monday_morning());
        let created = manager.apply_template(
            &template,
            Some(existing[1]),
            &store.state_item_ids(),
            monday,
            &mut store,
        );

        assert_eq!(created.len(), 2);
        let created_orders: Vec<u32> = created
            .iter()
            .map(|id| store.state_item(*id).unwrap().order)
            .collect();
        assert_eq!(created_orders, vec![2, 3]);

        assert_eq!(store.state_item(existing[0]).unwrap().order, 0);
        assert_eq!(store.state_item(existing[1]).unwrap().order, 1);
        assert_eq!(store.state_item(existing[2]).unwrap().order, 4);
        assert_eq!(store.state_item(existing[3]).unwrap().order, 5);

        let mut all_orders: Vec<u32> = store.states_on(monday).iter().map(|s| s.order).collect();
        all_orders.sort_unstable();
        assert_eq!(all_orders, vec![0, 1, 2, 3, 4, 5], "no duplicate orders");
    }

    #[test]
    fn apply_without_a_current_state_appends_to_the_day() {
        let mut store = ItemStore::new();
        let monday = monday_morning().date_naive();
        store.insert_state_item(StateItem::new("done already", monday, 0));
        let routine_id = seed_routine(&mut store, "Break", &[], &["Walk"]);
        let template = store.routine_template(routine_id).unwrap().clone();

        let manager = StreamManager::new(monday_morning());
        let created = manager.apply_template(
            &template,
            None,
            &store.state_item_ids(),
            monday,
            &mut store,
        );
        assert_eq!(created.len(), 1);
        assert_eq!(store.state_item(created[0]).unwrap().order, 1);
    }

    #[test]
    fn apply_on_an_empty_day_starts_at_zero() {
        let mut store = ItemStore::new();
        let monday = monday_morning().date_naive();
        let routine_id = seed_routine(&mut store, "Break", &[], &["Walk"]);
        let template = store.routine_template(routine_id).unwrap().clone();

        let manager = StreamManager::new(monday_morning());
        let created = manager.apply_template(
            &template,
            None,
            &store.state_item_ids(),
            monday,
            &mut store,
        );
        assert_eq!(store.state_item(created[0]).unwrap().order, 0);
    }

    #[test]
    fn applying_an_empty_template_is_a_no_op() {
        let mut store = ItemStore::new();
        let monday = monday_morning().date_naive();
        store.insert_state_item(StateItem::new("untouched", monday, 0));
        let routine_id = seed_routine(&mut store, "Empty", &[], &[]);
        let template = store.routine_template(routine_id).unwrap().clone();

        let manager = StreamManager::new(monday_morning());
        let created = manager.apply_template(
            &template,
            None,
            &store.state_item_ids(),
            monday,
            &mut store,
        );
        assert!(created.is_empty());
        assert_eq!(store.states_on(monday)[0].order, 0);
    }

    #[test]
    fn states_on_other_days_are_left_alone_by_apply() {
        let mut store = ItemStore::new();
        let monday = monday_morning().date_naive();
        let tuesday = monday + Duration::days(1);
        let other = store.insert_state_item(StateItem::new("tomorrow", tuesday, 0));
        store.insert_state_item(StateItem::new("today", monday, 0));
        let routine_id = seed_routine(&mut store, "Break", &[], &["Walk", "Water"]);
        let template = store.routine_template(routine_id).unwrap().clone();

        let manager = StreamManager::new(monday_morning());
        manager.apply_template(
            &template,
            None,
            &store.state_item_ids(),
            monday,
            &mut store,
        );
        assert_eq!(store.state_item(other).unwrap().order, 0);
    }
}
