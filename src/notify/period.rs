//! Notification periods: "at most once per day" and "at most once per week".

use chrono::{DateTime, Datelike, Days, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// How often a subscriber may be notified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationPeriod {
    /// Once per local calendar day.
    Daily,
    /// Once per local ISO week (Monday to Sunday).
    Weekly,
}

impl NotificationPeriod {
    /// Start of the period containing `now`, in `tz`, as a UTC instant.
    ///
    /// Subscribers last notified before this instant are due again.
    pub fn period_start<Tz: TimeZone>(&self, now: DateTime<Utc>, tz: &Tz) -> DateTime<Utc> {
        let today = now.with_timezone(tz).date_naive();
        let first_day = match self {
            Self::Daily => today,
            Self::Weekly => today
                .checked_sub_days(Days::new(u64::from(
                    today.weekday().num_days_from_monday(),
                )))
                .unwrap_or(today),
        };
        local_midnight(first_day, tz)
    }
}

/// First instant of `date` in `tz`.
///
/// Where midnight does not exist (a DST jump at 00:00) the first hour that
/// does exist is used.
fn local_midnight<Tz: TimeZone>(date: NaiveDate, tz: &Tz) -> DateTime<Utc> {
    (0..24)
        .filter_map(|hour| date.and_hms_opt(hour, 0, 0))
        .find_map(|naive| tz.from_local_datetime(&naive).earliest())
        .map(|local| local.with_timezone(&Utc))
        .unwrap_or_else(|| date.and_time(chrono::NaiveTime::MIN).and_utc())
}
