//! Plain-markdown message bodies for menus and the duty roster.
//!
//! Every renderer produces a message even without data, so readers see an
//! explicit "nothing available" notice instead of a stale or missing post.

use crate::store::{CachedResource, Payload};
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use ssis_feeds::{IsoWeekRef, MenuDay, MenuWeek, SourceKey, menu_week_for, parse_roster};
use std::fmt;
use tracing::warn;

/// What an announcement or notification shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    /// The whole week's menu.
    WeeklyMenu,
    /// Today's dishes.
    DailyMenu,
    /// Kitchenette duty roster.
    DutyRoster,
}

impl ContentKind {
    /// Cached source the content is rendered from on `date`.
    pub fn source_key(self, menu_id: &str, date: NaiveDate) -> SourceKey {
        match self {
            Self::WeeklyMenu | Self::DailyMenu => SourceKey::menu(menu_id, menu_week_for(date)),
            Self::DutyRoster => SourceKey::DutyRoster,
        }
    }

    pub fn is_menu(self) -> bool {
        matches!(self, Self::WeeklyMenu | Self::DailyMenu)
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::WeeklyMenu => "weekly_menu",
            Self::DailyMenu => "daily_menu",
            Self::DutyRoster => "duty_roster",
        })
    }
}

/// A rendered message: body plus freshness footer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage {
    pub body: String,
    pub footer: String,
    /// `false` when the body is a "nothing available" notice.
    pub has_data: bool,
}

impl RenderedMessage {
    /// Text sent to the platform.
    pub fn full_text(&self) -> String {
        if self.footer.is_empty() {
            self.body.clone()
        } else {
            format!("{}\n\n{}", self.body, self.footer)
        }
    }

    /// SHA-256 (hex) of the body. The footer is excluded so a new timestamp
    /// alone does not count as a change.
    pub fn content_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.body.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

/// Render `kind` from its cached source.
///
/// `today` is the local date the message is for, `updated_at` the local
/// time shown in the footer.
pub fn render(
    kind: ContentKind,
    cached: Option<&CachedResource>,
    today: NaiveDate,
    updated_at: NaiveDateTime,
) -> RenderedMessage {
    match kind {
        ContentKind::WeeklyMenu => render_weekly_menu(cached, updated_at),
        ContentKind::DailyMenu => render_daily_menu(cached, today, updated_at),
        ContentKind::DutyRoster => render_duty_roster(cached, updated_at),
    }
}

/// Render `kind` as seen at `now` in `tz`.
///
/// The footer carries the local time the data was downloaded, so an old
/// copy never looks current. Without data it carries `now`.
pub fn render_at<Tz: TimeZone>(
    kind: ContentKind,
    cached: Option<&CachedResource>,
    now: DateTime<Utc>,
    tz: &Tz,
) -> RenderedMessage {
    let local = now.with_timezone(tz);
    let updated_at = cached.map_or_else(
        || local.naive_local(),
        |resource| resource.downloaded_at.with_timezone(tz).naive_local(),
    );
    render(kind, cached, local.date_naive(), updated_at)
}

/// `false` for a missing cache, an empty upstream answer, or a week without
/// any days.
pub fn menu_is_available(cached: Option<&CachedResource>) -> bool {
    menu_week(cached).is_some_and(|week| !week.days.is_empty())
}

pub fn render_weekly_menu(
    cached: Option<&CachedResource>,
    updated_at: NaiveDateTime,
) -> RenderedMessage {
    let footer = menu_footer(updated_at);
    let week = menu_week(cached).filter(|week| !week.days.is_empty());
    let Some(week) = week else {
        return RenderedMessage {
            body: "**📄 Ingen veckomeny tillgänglig**\n\
                   Är det helg, så kom tillbaka på måndag. Annars har jag inte koll på \
                   menyn just nu, kolla på https://eatery.se/ istället."
                .to_owned(),
            footer,
            has_data: false,
        };
    };

    let title = if week.title.is_empty() {
        format!("Meny vecka {}", week.week_number)
    } else {
        week.title.clone()
    };
    let mut body = format!("**📄 {title}**\nNedan hittar du veckomenyn.");
    for (_, day) in week.days_in_order() {
        body.push_str(&format!("\n\n**{}**\n{}", day.day_name.swedish, dish_text(day)));
    }
    RenderedMessage {
        body,
        footer,
        has_data: true,
    }
}

pub fn render_daily_menu(
    cached: Option<&CachedResource>,
    today: NaiveDate,
    updated_at: NaiveDateTime,
) -> RenderedMessage {
    let heading = format!("**🍽 Mat för idag ({})**", today.format("%d/%m-%Y"));
    // On weekends the cached menu is next week's, which says nothing about today.
    let showing_this_week = menu_week_for(today) == IsoWeekRef::containing(today);
    let day = menu_week(cached)
        .filter(|_| showing_this_week)
        .and_then(|week| week.day(today.weekday()).cloned())
        .filter(|day| !day.dishes.is_empty());

    let (text, has_data) = match day {
        Some(day) => (dish_text(&day), true),
        None => ("Ingen meny finns tillgänglig.".to_owned(), false),
    };
    RenderedMessage {
        body: format!("{heading}\n{text}"),
        footer: menu_footer(updated_at),
        has_data,
    }
}

pub fn render_duty_roster(
    cached: Option<&CachedResource>,
    updated_at: NaiveDateTime,
) -> RenderedMessage {
    let footer = format!("Meddelande uppdaterat {}", updated_at.format("%Y-%m-%d %H:%M"));
    let roster = cached
        .and_then(|resource| resource.payload.document())
        .and_then(|doc| match parse_roster(doc) {
            Ok(roster) => Some(roster),
            Err(e) => {
                warn!(error = %e, "cached duty roster is unreadable");
                None
            }
        })
        .filter(|roster| !roster.is_empty());

    let Some(roster) = roster else {
        return RenderedMessage {
            body: "**🧽 Pentryansvar**\nIngen information om pentryansvar finns tillgänglig just nu."
                .to_owned(),
            footer,
            has_data: false,
        };
    };

    let mut body = "**🧽 Pentryansvar**".to_owned();
    for entry in roster {
        let name = if entry.pentry_name.is_empty() {
            format!("Pentry {}", entry.pentry_number)
        } else {
            format!("Pentry {} ({})", entry.pentry_number, entry.pentry_name)
        };
        body.push_str(&format!("\n**{name}**: {}", entry.responsible_class));
        if !entry.responsible_persons.is_empty() {
            body.push_str(&format!(" ({})", entry.responsible_persons.join(", ")));
        }
    }
    RenderedMessage {
        body,
        footer,
        has_data: true,
    }
}

fn menu_week(cached: Option<&CachedResource>) -> Option<MenuWeek> {
    let document = match &cached?.payload {
        Payload::Data(document) => document,
        Payload::Empty => return None,
    };
    match MenuWeek::from_document(document) {
        Ok(week) => Some(week),
        Err(e) => {
            warn!(error = %e, "cached menu is unreadable");
            None
        }
    }
}

fn menu_footer(updated_at: NaiveDateTime) -> String {
    format!(
        "Drivs av Eatery Lunch API | Meddelande uppdaterat {}",
        updated_at.format("%Y-%m-%d %H:%M")
    )
}

/// One dish per line, themed days highlighted.
fn dish_text(day: &MenuDay) -> String {
    let features = &day.special_features;
    let highlights = [
        (features.sweet_tuesday, "Sweet Tuesday", "**🍰 Sweet Tuesday**"),
        (features.fruity_wednesday, "Fruity Wednesday", "**🍓 Fruity Wednesday**"),
        (features.pancake_thursday, "Pancake Thursday", "**🥞 Pancake Thursday**"),
        (features.burger_friday, "Burger Friday", "**🍔 Burger Friday**"),
    ];
    day.dishes
        .iter()
        .map(|dish| {
            highlights
                .iter()
                .filter(|(active, _, _)| *active)
                .fold(dish.clone(), |text, (_, plain, marked)| text.replace(plain, marked))
        })
        .collect::<Vec<_>>()
        .join("\n")
}
