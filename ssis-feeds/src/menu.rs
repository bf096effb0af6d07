//! Lunch menu documents.
//!
//! The menu API wraps the week in an envelope: `{"menu": {...}}`. A missing
//! or null `menu` means no menu is published for that week yet.

use crate::error::FetchError;
use crate::types::{Document, FetchOutcome};
use chrono::Weekday;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Menu for one week.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MenuWeek {
    /// Human-readable title, e.g. "Meny vecka 42".
    pub title: String,
    /// ISO week number the menu covers.
    #[serde(alias = "weekNumber")]
    pub week_number: u32,
    /// Days keyed by lowercase English day name (`monday`, ...).
    pub days: BTreeMap<String, MenuDay>,
}

/// Menu for a single day.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MenuDay {
    /// Localised day names.
    #[serde(alias = "dayName")]
    pub day_name: DayName,
    /// Dishes served, in menu order.
    pub dishes: Vec<String>,
    /// Recurring themed days.
    #[serde(alias = "specialFeatures")]
    pub special_features: SpecialFeatures,
}

/// Localised day names.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DayName {
    /// Swedish name, shown to users.
    pub swedish: String,
    /// English name, if the feed provides it.
    pub english: Option<String>,
}

/// Themed days flagged by the menu feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SpecialFeatures {
    pub sweet_tuesday: bool,
    pub fruity_wednesday: bool,
    pub pancake_thursday: bool,
    pub burger_friday: bool,
}

impl MenuWeek {
    /// Parse a cached menu document.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Parse`] if the document is not a menu week.
    pub fn from_document(document: &Document) -> Result<Self, FetchError> {
        serde_json::from_value(document.clone())
            .map_err(|e| FetchError::Parse(format!("invalid menu document: {e}")))
    }

    /// Menu for the given weekday, if one is published.
    pub fn day(&self, weekday: Weekday) -> Option<&MenuDay> {
        self.days.get(day_key(weekday))
    }

    /// Days in week order (Monday first), skipping unknown keys last.
    pub fn days_in_order(&self) -> Vec<(&str, &MenuDay)> {
        let mut days: Vec<(&str, &MenuDay)> =
            self.days.iter().map(|(k, v)| (k.as_str(), v)).collect();
        days.sort_by_key(|(key, _)| day_order(key));
        days
    }

    /// `true` when at least one day has at least one dish.
    pub fn has_dishes(&self) -> bool {
        self.days.values().any(|day| !day.dishes.is_empty())
    }
}

/// Classify the body of a menu response.
///
/// # Errors
///
/// Returns [`FetchError::Parse`] if the envelope is not a JSON object.
pub fn unwrap_envelope(body: Document) -> Result<FetchOutcome, FetchError> {
    let Document::Object(mut envelope) = body else {
        return Err(FetchError::Parse("menu response is not an object".into()));
    };
    match envelope.remove("menu") {
        None | Some(Document::Null) => Ok(FetchOutcome::EmptyUpstream),
        Some(menu) => {
            // Validate the shape now so a broken feed never replaces a good cache.
            MenuWeek::from_document(&menu)?;
            Ok(FetchOutcome::Success(menu))
        }
    }
}

/// Feed key for a weekday.
pub fn day_key(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "monday",
        Weekday::Tue => "tuesday",
        Weekday::Wed => "wednesday",
        Weekday::Thu => "thursday",
        Weekday::Fri => "friday",
        Weekday::Sat => "saturday",
        Weekday::Sun => "sunday",
    }
}

fn day_order(key: &str) -> u8 {
    match key {
        "monday" => 0,
        "tuesday" => 1,
        "wednesday" => 2,
        "thursday" => 3,
        "friday" => 4,
        "saturday" => 5,
        "sunday" => 6,
        _ => 7,
    }
}
