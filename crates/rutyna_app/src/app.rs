use std::collections::HashSet;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Local, NaiveDate};
use rutyna_core::ids::RoutineTemplateId;
use rutyna_core::state::StateItem;
use rutyna_core::weekday::{Weekday, WeekdaySet};
use rutyna_core::PlannerService;
use tracing::{debug, info};

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub(crate) snapshot_path: PathBuf,
    pub(crate) window_hours: Option<i64>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Ok(path) = std::env::var("RUTYNA_DATA") {
            if !path.trim().is_empty() {
                config.snapshot_path = PathBuf::from(path);
            }
        }
        if let Ok(hours) = std::env::var("RUTYNA_WINDOW_HOURS") {
            if let Ok(value) = hours.trim().parse::<i64>() {
                if value > 0 {
                    config.window_hours = Some(value);
                }
            }
        }
        Ok(config)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            snapshot_path: PathBuf::from("rutyna.json"),
            window_hours: None,
        }
    }
}

const HELP: &str = "Commands:
  stream                  show every day in the window
  today                   show today's list
  add <title>             add a state to today
  done <n>                toggle state n on today's list
  check <n> <m>           toggle row m of state n
  templates               list templates
  routine <title> [days]  new routine template (days like: mon tue fri)
  member <n> <title>      add a member state to routine n
  apply <n>               insert routine n into today
  occupied                show claimed weekdays
  save                    write the snapshot file
  quit                    save and exit";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Help,
    Stream,
    Today,
    Templates,
    Occupied,
    Add { title: String },
    Done { index: usize },
    Check { state: usize, row: usize },
    Routine { title: String, days: WeekdaySet },
    Member { routine: usize, title: String },
    Apply { routine: usize },
    Save,
    Quit,
}

impl Command {
    fn parse(line: &str) -> Result<Self, String> {
        let mut parts = line.split_whitespace();
        let head = parts.next().unwrap_or_default();
        let rest: Vec<&str> = parts.collect();
        match head {
            "help" => Ok(Self::Help),
            "stream" => Ok(Self::Stream),
            "today" => Ok(Self::Today),
            "templates" => Ok(Self::Templates),
            "occupied" => Ok(Self::Occupied),
            "save" => Ok(Self::Save),
            "quit" | "exit" => Ok(Self::Quit),
            "add" => {
                let title = rest.join(" ");
                if title.is_empty() {
                    return Err("usage: add <title>".to_string());
                }
                Ok(Self::Add { title })
            }
            "done" => Ok(Self::Done {
                index: parse_index(&rest, "usage: done <state#>")?,
            }),
            "check" => {
                let state = rest.first().and_then(|token| token.parse().ok());
                let row = rest.get(1).and_then(|token| token.parse().ok());
                match (state, row) {
                    (Some(state), Some(row)) => Ok(Self::Check { state, row }),
                    _ => Err("usage: check <state#> <row#>".to_string()),
                }
            }
            "routine" => {
                let (title, days) = split_trailing_days(&rest);
                if title.is_empty() {
                    return Err("usage: routine <title> [days]".to_string());
                }
                Ok(Self::Routine { title, days })
            }
            "member" => {
                let routine = parse_index(&rest, "usage: member <routine#> <title>")?;
                let title = rest.get(1..).map(|rest| rest.join(" ")).unwrap_or_default();
                if title.is_empty() {
                    return Err("usage: member <routine#> <title>".to_string());
                }
                Ok(Self::Member { routine, title })
            }
            "apply" => Ok(Self::Apply {
                routine: parse_index(&rest, "usage: apply <routine#>")?,
            }),
            other => Err(format!("unknown command '{other}', try 'help'")),
        }
    }
}

fn parse_index(rest: &[&str], usage: &str) -> Result<usize, String> {
    rest.first()
        .and_then(|token| token.parse().ok())
        .ok_or_else(|| usage.to_string())
}

// Trailing tokens that parse as weekday names become the recurrence set;
// everything before them is the title.
fn split_trailing_days(rest: &[&str]) -> (String, WeekdaySet) {
    let mut split = rest.len();
    while split > 0 && rest[split - 1].parse::<Weekday>().is_ok() {
        split -= 1;
    }
    let days = rest[split..]
        .iter()
        .filter_map(|token| token.parse().ok())
        .collect();
    (rest[..split].join(" "), days)
}

pub struct PlannerShell {
    service: PlannerService,
}

impl PlannerShell {
    pub fn new(config: &AppConfig) -> Result<Self> {
        Self::new_at(config, Local::now())
    }

    pub fn new_at(config: &AppConfig, now: DateTime<Local>) -> Result<Self> {
        let mut builder = PlannerService::builder().with_snapshot_path(&config.snapshot_path);
        if let Some(hours) = config.window_hours {
            builder = builder.with_window_hours(hours);
        }
        let mut service = builder.build_at(now)?;
        let slid = service.refresh(now);
        let backfilled = service.initialize(now);
        info!(
            slid = slid.len(),
            backfilled = backfilled.len(),
            "planner ready"
        );
        Ok(Self { service })
    }

    pub fn observe(&mut self, now: DateTime<Local>) -> usize {
        let generated = self.service.refresh(now);
        if !generated.is_empty() {
            debug!(
                generated = generated.len(),
                "stream extended at observation point"
            );
        }
        generated.len()
    }

    pub fn save(&self) -> Result<()> {
        self.service.save()
    }

    fn execute(&mut self, command: Command, now: DateTime<Local>, out: &mut impl Write) -> Result<()> {
        let today = now.date_naive();
        match command {
            Command::Help => writeln!(out, "{HELP}")?,
            Command::Stream => self.render_stream(out, today)?,
            Command::Today => self.render_day(out, today, today)?,
            Command::Templates => self.render_templates(out)?,
            Command::Occupied => {
                let occupied = self.service.occupied_days(None);
                if occupied.is_empty() {
                    writeln!(out, "No weekday is claimed yet.")?;
                } else {
                    writeln!(out, "Claimed weekdays: {}", format_days(&occupied))?;
                }
            }
            Command::Add { title } => {
                self.service.create_state(title, today);
                writeln!(out, "Added to today.")?;
            }
            Command::Done { index } => {
                let state = self.state_at(today, index)?;
                let done = !state.is_completed;
                self.service.set_state_completed(state.id, done, now)?;
                writeln!(out, "{}", if done { "Done." } else { "Reopened." })?;
            }
            Command::Check { state, row } => {
                let state = self.state_at(today, state)?;
                let item = state
                    .checklist
                    .get(row)
                    .map(|item| (item.id, item.is_completed))
                    .with_context(|| format!("no row #{row} in that state"))?;
                self.service
                    .set_checklist_item_completed(state.id, item.0, !item.1, now)?;
                writeln!(out, "{}", if item.1 { "Unchecked." } else { "Checked." })?;
            }
            Command::Routine { title, days } => {
                let (id, conflicts) = self.service.create_routine_template(title, days);
                writeln!(out, "Routine template {id} created.")?;
                if !conflicts.is_empty() {
                    writeln!(
                        out,
                        "Note: {} already claimed by another routine.",
                        format_days(&conflicts)
                    )?;
                }
            }
            Command::Member { routine, title } => {
                let id = self.routine_at(routine)?;
                self.service.add_routine_member(id, title)?;
                writeln!(out, "Member added.")?;
            }
            Command::Apply { routine } => {
                let id = self.routine_at(routine)?;
                let created = self.service.apply_routine(id, now)?;
                writeln!(out, "Inserted {} state(s) into today.", created.len())?;
            }
            Command::Save => {
                self.service.save()?;
                writeln!(out, "Saved.")?;
            }
            Command::Quit => {}
        }
        Ok(())
    }

    fn render_stream(&self, out: &mut impl Write, today: NaiveDate) -> Result<()> {
        for date in self.service.stream_dates() {
            self.render_day(out, date, today)?;
        }
        Ok(())
    }

    fn render_day(&self, out: &mut impl Write, date: NaiveDate, today: NaiveDate) -> Result<()> {
        writeln!(out, "{}", format_day_heading(date, today))?;
        let states = self.service.states_on(date);
        if states.is_empty() {
            writeln!(out, "  (nothing planned)")?;
        }
        for (index, state) in states.iter().enumerate() {
            writeln!(out, "  {}", format_state_line(index, state))?;
            for (row, item) in state.checklist.iter().enumerate() {
                writeln!(
                    out,
                    "      {} {}. {}",
                    check_mark(item.is_completed),
                    row,
                    item.title
                )?;
            }
        }
        Ok(())
    }

    fn render_templates(&self, out: &mut impl Write) -> Result<()> {
        let routines = self.service.routine_templates();
        if routines.is_empty() {
            writeln!(out, "No routine templates yet.")?;
        }
        for (index, routine) in routines.iter().enumerate() {
            let days = if routine.repeat_days.is_empty() {
                "manual".to_string()
            } else {
                format_days(&routine.repeat_days)
            };
            writeln!(
                out,
                "{index}. {} [{days}] ({} member(s))",
                routine.title,
                routine.state_templates.len()
            )?;
            for member in &routine.state_templates {
                if let Ok(template) = self.service.state_template(*member) {
                    writeln!(
                        out,
                        "   - {} ({} row(s))",
                        template.title,
                        template.checklist.len()
                    )?;
                }
            }
        }
        let owned: HashSet<_> = routines
            .iter()
            .flat_map(|routine| routine.state_templates.iter().copied())
            .collect();
        let standalone: Vec<_> = self
            .service
            .state_templates()
            .into_iter()
            .filter(|template| !owned.contains(&template.id))
            .collect();
        if !standalone.is_empty() {
            writeln!(out, "Standalone state templates:")?;
            for template in &standalone {
                writeln!(out, "   - {}", template.title)?;
            }
        }
        Ok(())
    }

    fn state_at(&self, today: NaiveDate, index: usize) -> Result<StateItem> {
        self.service
            .states_on(today)
            .into_iter()
            .nth(index)
            .with_context(|| format!("no state #{index} on today's list"))
    }

    fn routine_at(&self, index: usize) -> Result<RoutineTemplateId> {
        self.service
            .routine_templates()
            .get(index)
            .map(|routine| routine.id)
            .with_context(|| format!("no routine template #{index}"))
    }
}

pub fn run(config: AppConfig) -> Result<()> {
    info!(path = %config.snapshot_path.display(), "starting planner shell");
    let mut shell = PlannerShell::new(&config).context("failed to open the planner")?;
    let stdin = io::stdin();
    let mut out = io::stdout();
    shell.render_stream(&mut out, Local::now().date_naive())?;
    loop {
        write!(out, "> ")?;
        out.flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        if line.trim().is_empty() {
            continue;
        }
        let now = Local::now();
        shell.observe(now);
        match Command::parse(&line) {
            Ok(Command::Quit) => break,
            Ok(command) => {
                if let Err(err) = shell.execute(command, now, &mut out) {
                    writeln!(out, "Error: {err}")?;
                }
            }
            Err(message) => writeln!(out, "{message}")?,
        }
    }
    shell.save()?;
    Ok(())
}

fn format_day_heading(date: NaiveDate, today: NaiveDate) -> String {
    let calendar = date.format("%A, %B %d, %Y");
    let relative = format_relative_label(date, today);
    if relative.is_empty() {
        calendar.to_string()
    } else {
        format!("{} — {}", relative, calendar)
    }
}

fn format_relative_label(date: NaiveDate, today: NaiveDate) -> String {
    let diff = date.signed_duration_since(today).num_days();
    match diff {
        -1 => "Yesterday".to_string(),
        0 => "Today".to_string(),
        1 => "Tomorrow".to_string(),
        d if d < 0 => format!("{} days ago", -d),
        d => format!("In {} days", d),
    }
}

fn format_state_line(index: usize, state: &StateItem) -> String {
    let progress = if state.checklist.is_empty() {
        String::new()
    } else {
        let done = state
            .checklist
            .iter()
            .filter(|item| item.is_completed)
            .count();
        format!(" ({done}/{})", state.checklist.len())
    };
    format!(
        "{} {index}. {}{progress}",
        check_mark(state.is_completed),
        state.title
    )
}

fn check_mark(done: bool) -> &'static str {
    if done {
        "[x]"
    } else {
        "[ ]"
    }
}

fn format_days(days: &WeekdaySet) -> String {
    Weekday::monday_first()
        .into_iter()
        .filter(|day| days.contains(day))
        .map(|day| day.short_label())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use tempfile::tempdir;

    fn monday_morning() -> DateTime<Local> {
        Local
            .with_ymd_and_hms(2024, 1, 8, 9, 0, 0)
            .single()
            .expect("valid local time")
    }

    #[test]
    fn parses_commands_with_trailing_weekdays() {
        let command = Command::parse("routine Morning focus mon wed fri").unwrap();
        match command {
            Command::Routine { title, days } => {
                assert_eq!(title, "Morning focus");
                assert_eq!(days.len(), 3);
                assert!(days.contains(&Weekday::Monday));
                assert!(days.contains(&Weekday::Friday));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn a_routine_without_days_is_manual_only() {
        let command = Command::parse("routine Deep clean").unwrap();
        match command {
            Command::Routine { title, days } => {
                assert_eq!(title, "Deep clean");
                assert!(days.is_empty());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_commands_with_a_hint() {
        let err = Command::parse("frobnicate").unwrap_err();
        assert!(err.contains("help"));
    }

    #[test]
    fn add_requires_a_title() {
        assert!(Command::parse("add").is_err());
        assert_eq!(
            Command::parse("add Buy milk").unwrap(),
            Command::Add {
                title: "Buy milk".to_string()
            }
        );
    }

    #[test]
    fn relative_labels_cover_the_window() {
        let today = NaiveDate::from_ymd_opt(2024, 1, 8).unwrap();
        assert_eq!(format_relative_label(today - Duration::days(1), today), "Yesterday");
        assert_eq!(format_relative_label(today, today), "Today");
        assert_eq!(format_relative_label(today + Duration::days(1), today), "Tomorrow");
        assert_eq!(format_relative_label(today + Duration::days(3), today), "In 3 days");
        assert_eq!(format_relative_label(today - Duration::days(2), today), "2 days ago");
    }

    #[test]
    fn day_headings_include_the_calendar_date() {
        let today = NaiveDate::from_ymd_opt(2024, 1, 8).unwrap();
        let heading = format_day_heading(today, today);
        assert!(heading.starts_with("Today"));
        assert!(heading.contains("January 08, 2024"));
    }

    #[test]
    fn claimed_days_print_monday_first() {
        let days: WeekdaySet = [Weekday::Sunday, Weekday::Monday, Weekday::Friday]
            .into_iter()
            .collect();
        assert_eq!(format_days(&days), "Mon, Fri, Sun");
    }

    #[test]
    fn shell_round_trips_through_the_snapshot_file() {
        let temp = tempdir().expect("tempdir");
        let config = AppConfig {
            snapshot_path: temp.path().join("rutyna.json"),
            window_hours: None,
        };

        let mut shell = PlannerShell::new_at(&config, monday_morning()).expect("shell");
        let mut out = Vec::new();
        shell
            .execute(
                Command::parse("routine Work mon").unwrap(),
                monday_morning(),
                &mut out,
            )
            .expect("routine");
        shell
            .execute(
                Command::parse("member 0 Standup").unwrap(),
                monday_morning(),
                &mut out,
            )
            .expect("member");
        shell
            .execute(Command::parse("apply 0").unwrap(), monday_morning(), &mut out)
            .expect("apply");
        shell.save().expect("save");

        let mut shell = PlannerShell::new_at(&config, monday_morning()).expect("reopen");
        let mut out = Vec::new();
        shell
            .execute(Command::Today, monday_morning(), &mut out)
            .expect("today");
        let rendered = String::from_utf8(out).expect("utf8");
        assert!(rendered.contains("Standup"));
    }

    #[test]
    fn unknown_indexes_report_instead_of_exiting() {
        let temp = tempdir().expect("tempdir");
        let config = AppConfig {
            snapshot_path: temp.path().join("rutyna.json"),
            window_hours: None,
        };
        let mut shell = PlannerShell::new_at(&config, monday_morning()).expect("shell");
        let mut out = Vec::new();
        let err = shell
            .execute(Command::Done { index: 5 }, monday_morning(), &mut out)
            .expect_err("no such state");
        assert!(err.to_string().contains("no state #5"));
    }
}
