//! Source keys: which feed, with which parameters.
//!
//! A [`SourceKey`] identifies one cacheable download, e.g. the menu for
//! week 42 or the schedule for class TE20A. Keys have a stable textual form
//! (`menu:521:2026-w42`, `duty-roster`, `schedule:TE20A`) used in logs and on
//! the command line, and a store-safe form used as a document key.

use chrono::{Datelike, Days, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::FetchError;

/// Letters of the parallel classes in each cohort.
const CLASS_LETTERS: [char; 4] = ['A', 'B', 'C', 'D'];

/// Month (1-based) in which a new cohort starts and the oldest graduates.
const SCHOOL_YEAR_START_MONTH: u32 = 8;

/// An ISO-8601 week.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IsoWeekRef {
    /// ISO week-numbering year.
    pub year: i32,
    /// ISO week number (1-53).
    pub week: u32,
}

impl IsoWeekRef {
    /// The ISO week containing `date`.
    pub fn containing(date: NaiveDate) -> Self {
        let iso = date.iso_week();
        Self {
            year: iso.year(),
            week: iso.week(),
        }
    }

    /// The week before this one.
    pub fn previous(self) -> Self {
        NaiveDate::from_isoywd_opt(self.year, self.week, Weekday::Mon)
            .and_then(|monday| monday.checked_sub_days(Days::new(7)))
            .map_or(self, Self::containing)
    }
}

impl fmt::Display for IsoWeekRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-w{:02}", self.year, self.week)
    }
}

impl FromStr for IsoWeekRef {
    type Err = FetchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || FetchError::Config(format!("invalid ISO week '{s}', expected YYYY-wNN"));
        let (year, week) = s.split_once("-w").ok_or_else(bad)?;
        let year: i32 = year.parse().map_err(|_| bad())?;
        let week: u32 = week.parse().map_err(|_| bad())?;
        if NaiveDate::from_isoywd_opt(year, week, Weekday::Mon).is_none() {
            return Err(bad());
        }
        Ok(Self { year, week })
    }
}

/// Identifies one cacheable feed download.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceKey {
    /// Lunch menu of one restaurant for one week.
    Menu {
        /// Restaurant menu identifier.
        menu_id: String,
        /// Week the menu covers.
        week: IsoWeekRef,
    },
    /// Current duty roster ("pentryansvar").
    DutyRoster,
    /// Schedule of a single class.
    Schedule {
        /// Class name, e.g. `TE20A`.
        class_name: String,
    },
}

impl SourceKey {
    /// Menu key for `menu_id` and `week`.
    pub fn menu(menu_id: impl Into<String>, week: IsoWeekRef) -> Self {
        Self::Menu {
            menu_id: menu_id.into(),
            week,
        }
    }

    /// Schedule key for one class.
    pub fn schedule(class_name: impl Into<String>) -> Self {
        Self::Schedule {
            class_name: class_name.into(),
        }
    }

    /// Store-safe document key under `cache/`.
    ///
    /// Only lowercase ASCII, digits and `-` are produced.
    pub fn document_key(&self) -> String {
        let slug = match self {
            Self::Menu { menu_id, week } => format!("menu-{}-{week}", slugify(menu_id)),
            Self::DutyRoster => "duty-roster".to_owned(),
            Self::Schedule { class_name } => format!("schedule-{}", slugify(class_name)),
        };
        format!("cache/{slug}")
    }
}

impl fmt::Display for SourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Menu { menu_id, week } => write!(f, "menu:{menu_id}:{week}"),
            Self::DutyRoster => write!(f, "duty-roster"),
            Self::Schedule { class_name } => write!(f, "schedule:{class_name}"),
        }
    }
}

impl FromStr for SourceKey {
    type Err = FetchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.trim().splitn(3, ':');
        match (parts.next(), parts.next(), parts.next()) {
            (Some("duty-roster"), None, None) => Ok(Self::DutyRoster),
            (Some("schedule"), Some(class_name), None) if !class_name.is_empty() => {
                Ok(Self::schedule(class_name.to_uppercase()))
            }
            (Some("menu"), Some(menu_id), Some(week)) if !menu_id.is_empty() => {
                Ok(Self::menu(menu_id, week.parse()?))
            }
            _ => Err(FetchError::Config(format!(
                "unknown source key '{s}' (expected menu:<id>:<YYYY-wNN>, duty-roster or schedule:<class>)"
            ))),
        }
    }
}

/// Week whose menu should be shown on `date`.
///
/// On weekends the current week's menu is over, so the next week is used.
pub fn menu_week_for(date: NaiveDate) -> IsoWeekRef {
    let shifted = match date.weekday() {
        Weekday::Sat => date.checked_add_days(Days::new(2)),
        Weekday::Sun => date.checked_add_days(Days::new(1)),
        _ => Some(date),
    };
    IsoWeekRef::containing(shifted.unwrap_or(date))
}

/// Classes with ongoing education on `date`.
///
/// Three cohorts are enrolled at a time, each with four parallel classes.
/// The school year rolls over in August: in January 2022 the active cohorts
/// are TE19-TE21, from August 2022 they are TE20-TE22.
pub fn active_classes(date: NaiveDate) -> Vec<String> {
    let newest = if date.month() < SCHOOL_YEAR_START_MONTH {
        date.year() - 1
    } else {
        date.year()
    };
    (newest - 2..=newest)
        .flat_map(|year| {
            CLASS_LETTERS
                .iter()
                .map(move |letter| format!("TE{:02}{letter}", year.rem_euclid(100)))
        })
        .collect()
}

fn slugify(value: &str) -> String {
    value
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect()
}
