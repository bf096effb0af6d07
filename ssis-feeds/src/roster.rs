//! Duty roster ("pentryansvar") documents.
//!
//! The roster lists, per kitchenette, which class and which students are
//! responsible for keeping it tidy this week.

use crate::error::FetchError;
use crate::types::Document;
use serde::{Deserialize, Serialize};

/// One kitchenette and the people responsible for it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DutyRosterEntry {
    #[serde(alias = "pentryNumber")]
    pub pentry_number: u32,
    #[serde(alias = "pentryName")]
    pub pentry_name: String,
    #[serde(alias = "responsibleClass")]
    pub responsible_class: String,
    #[serde(alias = "responsiblePersons")]
    pub responsible_persons: Vec<String>,
}

/// Parse a cached roster document.
///
/// Accepts either a bare array or an object wrapping the array under
/// `pentryansvar`.
///
/// # Errors
///
/// Returns [`FetchError::Parse`] if the document has another shape.
pub fn parse_roster(document: &Document) -> Result<Vec<DutyRosterEntry>, FetchError> {
    let entries = match document {
        Document::Object(map) => map
            .get("pentryansvar")
            .cloned()
            .ok_or_else(|| FetchError::Parse("roster object lacks 'pentryansvar'".into()))?,
        other => other.clone(),
    };
    let mut roster: Vec<DutyRosterEntry> = serde_json::from_value(entries)
        .map_err(|e| FetchError::Parse(format!("invalid roster document: {e}")))?;
    roster.sort_by_key(|entry| entry.pentry_number);
    Ok(roster)
}
