use crate::ids::RoutineTemplateId;
use crate::template::RoutineTemplate;
use crate::weekday::WeekdaySet;

/// Weekdays claimed by any routine template other than `excluding`.
/// Exclusion is by id so a template being edited never conflicts with
/// itself.
pub fn occupied_days(
    templates: &[&RoutineTemplate],
    excluding: Option<RoutineTemplateId>,
) -> WeekdaySet {
    let mut occupied = WeekdaySet::new();
    for template in templates {
        if excluding == Some(template.id) {
            continue;
        }
        occupied.extend(template.repeat_days.iter().copied());
    }
    occupied
}

/// Subset of the candidate `days` already claimed by another template.
/// Advisory only; assignments are never blocked on it.
pub fn conflicting_days(
    days: &WeekdaySet,
    templates: &[&RoutineTemplate],
    excluding: Option<RoutineTemplateId>,
) -> WeekdaySet {
    occupied_days(templates, excluding)
        .intersection(days)
        .copied()
        .collect()
}
