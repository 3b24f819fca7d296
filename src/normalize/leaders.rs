use serde_json::Value;

use super::fields::{first_array, first_f64, first_text};
use crate::error::ShapeError;
use crate::models::{LeaderCategory, LeaderEntry, Leaders};

/// Classify a category by a case-insensitive substring of its display name.
pub fn classify_category(display_name: &str) -> Option<LeaderCategory> {
    let name = display_name.to_lowercase();
    if name.contains("point") || name.contains("scoring") {
        Some(LeaderCategory::Points)
    } else if name.contains("rebound") {
        Some(LeaderCategory::Rebounds)
    } else if name.contains("assist") {
        Some(LeaderCategory::Assists)
    } else if name.contains("steal") {
        Some(LeaderCategory::Steals)
    } else if name.contains("block") {
        Some(LeaderCategory::Blocks)
    } else {
        None
    }
}

/// Leaders from either the JSON endpoint or the page's embedded state. Both
/// carry a `categories[]` list, just under different roots.
pub fn normalize_leaders(raw: &Value) -> Result<Leaders, ShapeError> {
    let categories = first_array(
        raw,
        &[
            &["categories"],
            &["leaders", "categories"],
            &["leaders"],
            &["page", "content", "leaders", "categories"],
            &["page", "content", "statistics", "leaders"],
        ],
    )
    .ok_or_else(|| ShapeError::missing("categories"))?;

    let mut leaders = Leaders::default();
    for category in categories {
        let Some(kind) = first_text(category, &[&["displayName"], &["name"], &["title"]])
            .as_deref()
            .and_then(classify_category)
        else {
            continue;
        };
        let empty = Vec::new();
        let rows = first_array(category, &[&["leaders"], &["athletes"]]).unwrap_or(&empty);
        let entries: Vec<LeaderEntry> = rows.iter().filter_map(leader_entry).collect();
        // Later duplicates of a category never replace an earlier non-empty list.
        let slot = leaders.categories.entry(kind).or_default();
        if slot.is_empty() {
            *slot = entries;
        }
    }
    Ok(leaders)
}

fn leader_entry(row: &Value) -> Option<LeaderEntry> {
    Some(LeaderEntry {
        player_id: first_text(row, &[&["athlete", "id"], &["id"]]),
        name: first_text(
            row,
            &[&["athlete", "displayName"], &["athlete", "name"], &["name"]],
        )?,
        team: first_text(
            row,
            &[
                &["athlete", "team", "abbreviation"],
                &["team", "abbreviation"],
                &["team", "displayName"],
                &["teamAbbreviation"],
            ],
        ),
        value: first_f64(row, &[&["value"], &["displayValue"], &["statValue"]]),
        display_value: first_text(row, &[&["displayValue"], &["value"]]),
    })
}
