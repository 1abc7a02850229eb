use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// Calendar weekday with the stable ordinal numbering used everywhere in the
/// planner: Sunday is 1, Saturday is 7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Weekday {
    Sunday = 1,
    Monday = 2,
    Tuesday = 3,
    Wednesday = 4,
    Thursday = 5,
    Friday = 6,
    Saturday = 7,
}

pub type WeekdaySet = BTreeSet<Weekday>;

impl Weekday {
    pub const ALL: [Weekday; 7] = [
        Weekday::Sunday,
        Weekday::Monday,
        Weekday::Tuesday,
        Weekday::Wednesday,
        Weekday::Thursday,
        Weekday::Friday,
        Weekday::Saturday,
    ];

    pub fn from_date(date: NaiveDate) -> Self {
        match date.weekday() {
            chrono::Weekday::Sun => Weekday::Sunday,
            chrono::Weekday::Mon => Weekday::Monday,
            chrono::Weekday::Tue => Weekday::Tuesday,
            chrono::Weekday::Wed => Weekday::Wednesday,
            chrono::Weekday::Thu => Weekday::Thursday,
            chrono::Weekday::Fri => Weekday::Friday,
            chrono::Weekday::Sat => Weekday::Saturday,
        }
    }

    pub fn ordinal(self) -> u8 {
        self as u8
    }

    /// Ordering used by pickers: Monday through Saturday, Sunday last.
    pub fn monday_first() -> [Weekday; 7] {
        [
            Weekday::Monday,
            Weekday::Tuesday,
            Weekday::Wednesday,
            Weekday::Thursday,
            Weekday::Friday,
            Weekday::Saturday,
            Weekday::Sunday,
        ]
    }

    pub fn label(self) -> &'static str {
        match self {
            Weekday::Sunday => "Sunday",
            Weekday::Monday => "Monday",
            Weekday::Tuesday => "Tuesday",
            Weekday::Wednesday => "Wednesday",
            Weekday::Thursday => "Thursday",
            Weekday::Friday => "Friday",
            Weekday::Saturday => "Saturday",
        }
    }

    pub fn short_label(self) -> &'static str {
        match self {
            Weekday::Sunday => "Sun",
            Weekday::Monday => "Mon",
            Weekday::Tuesday => "Tue",
            Weekday::Wednesday => "Wed",
            Weekday::Thursday => "Thu",
            Weekday::Friday => "Fri",
            Weekday::Saturday => "Sat",
        }
    }
}

impl fmt::Display for Weekday {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Weekday {
    type Err = WeekdayParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "sun" | "sunday" => Ok(Weekday::Sunday),
            "mon" | "monday" => Ok(Weekday::Monday),
            "tue" | "tuesday" => Ok(Weekday::Tuesday),
            "wed" | "wednesday" => Ok(Weekday::Wednesday),
            "thu" | "thursday" => Ok(Weekday::Thursday),
            "fri" | "friday" => Ok(Weekday::Friday),
            "sat" | "saturday" => Ok(Weekday::Saturday),
            _ => Err(WeekdayParseError(s.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`Weekday`] string.
#[derive(Debug, Clone)]
pub struct WeekdayParseError(pub String);

impl fmt::Display for WeekdayParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid weekday: {:?}", self.0)
    }
}

impl std::error::Error for WeekdayParseError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_known_calendar_dates() {
        // 2024-01-07 was a Sunday
        let sunday = NaiveDate::from_ymd_opt(2024, 1, 7).unwrap();
        assert_eq!(Weekday::from_date(sunday), Weekday::Sunday);
        assert_eq!(Weekday::from_date(sunday).ordinal(), 1);

        let monday = NaiveDate::from_ymd_opt(2024, 1, 8).unwrap();
        assert_eq!(Weekday::from_date(monday), Weekday::Monday);
        assert_eq!(Weekday::from_date(monday).ordinal(), 2);
    }

    #[test]
    fn ordinals_run_sunday_through_saturday() {
        let ordinals: Vec<u8> = Weekday::ALL.iter().map(|day| day.ordinal()).collect();
        assert_eq!(ordinals, vec![1, 2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn monday_first_projection_is_fixed() {
        let days = Weekday::monday_first();
        assert_eq!(days[0], Weekday::Monday);
        assert_eq!(days[6], Weekday::Sunday);
        assert_eq!(days.len(), 7);
    }

    #[test]
    fn parses_short_and_long_names() {
        assert_eq!("mon".parse::<Weekday>().unwrap(), Weekday::Monday);
        assert_eq!("Wednesday".parse::<Weekday>().unwrap(), Weekday::Wednesday);
        assert_eq!("SAT".parse::<Weekday>().unwrap(), Weekday::Saturday);
        assert!("noday".parse::<Weekday>().is_err());
    }
}
