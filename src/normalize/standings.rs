use serde_json::Value;

use super::fields::{find_named, first_array, first_f64, first_text, require_text};
use super::team::short_conference;
use crate::aggregate::{rank_standings, TeamDirectory};
use crate::error::ShapeError;
use crate::models::{StandingsEntry, StandingsTable, TeamRecord};

/// Normalize the provider's own standings (`children[].standings.entries[]`).
///
/// Wins, losses and splits come from the provider; rank, win percentage and
/// games back are recomputed so provider and derived tables rank identically.
/// When the provider reports `gamesBehind`/`winPercent` those values are kept.
pub fn normalize_provider_standings(
    raw: &Value,
    directory: &TeamDirectory,
) -> Result<StandingsTable, ShapeError> {
    let conferences = first_array(raw, &[&["children"]])
        .ok_or_else(|| ShapeError::missing("children"))?;

    let mut entries = Vec::new();
    let mut reported = Vec::new();
    for conference in conferences {
        let conf_name = first_text(conference, &[&["abbreviation"], &["name"]])
            .map(|n| short_conference(&n));
        let empty = Vec::new();
        let rows = first_array(conference, &[&["standings", "entries"]]).unwrap_or(&empty);
        for row in rows {
            let (entry, provider_pct, provider_gb) = standings_row(row, conf_name.clone(), directory)?;
            reported.push((entry.team_id.clone(), provider_pct, provider_gb));
            entries.push(entry);
        }
    }

    let mut ranked = rank_standings(entries);
    for row in &mut ranked {
        if let Some((_, pct, gb)) = reported.iter().find(|(id, _, _)| *id == row.entry.team_id) {
            if let Some(pct) = pct {
                row.win_pct = *pct;
            }
            if let Some(gb) = gb {
                row.games_back = *gb;
            }
        }
    }

    Ok(StandingsTable {
        season: first_text(
            raw,
            &[
                &["season", "displayName"],
                &["seasons", "0", "displayName"],
                &["children", "0", "standings", "seasonDisplayName"],
                &["children", "0", "standings", "season"],
            ],
        )
        .unwrap_or_default(),
        entries: ranked,
    })
}

fn standings_row(
    row: &Value,
    conference: Option<String>,
    directory: &TeamDirectory,
) -> Result<(StandingsEntry, Option<f64>, Option<f64>), ShapeError> {
    let team_raw = row
        .get("team")
        .ok_or_else(|| ShapeError::missing("standings.entries[].team"))?;
    let name = require_text(team_raw, &[&["displayName"], &["name"]], "team.displayName")?;
    let known = directory.resolve(&name);
    let team = TeamRecord {
        id: first_text(team_raw, &[&["id"]])
            .or_else(|| known.map(|t| t.id.clone()))
            .unwrap_or_default(),
        abbreviation: first_text(team_raw, &[&["abbreviation"]])
            .or_else(|| known.map(|t| t.abbreviation.clone()))
            .unwrap_or_default(),
        conference: conference.or_else(|| known.and_then(|t| t.conference.clone())),
        division: known.and_then(|t| t.division.clone()),
        name,
        ..Default::default()
    };

    let empty = Vec::new();
    let stats = row.get("stats").and_then(Value::as_array).unwrap_or(&empty);
    let stat_value = |names: &[&str]| find_named(stats, names).and_then(|s| first_f64(s, &[&["value"], &["displayValue"]]));
    let summary = |names: &[&str]| {
        find_named(stats, names)
            .and_then(|s| first_text(s, &[&["summary"], &["displayValue"]]))
            .and_then(|s| parse_record(&s))
    };

    let mut entry = StandingsEntry::new(&team);
    let overall = summary(&["overall", "total"]);
    entry.wins = stat_value(&["wins"]).map(|w| w as u32).or(overall.map(|o| o.0)).unwrap_or(0);
    entry.losses = stat_value(&["losses"]).map(|l| l as u32).or(overall.map(|o| o.1)).unwrap_or(0);
    (entry.home_wins, entry.home_losses) = summary(&["Home", "home"]).unwrap_or((0, 0));
    (entry.road_wins, entry.road_losses) = summary(&["Road", "road", "away"]).unwrap_or((0, 0));
    (entry.conf_wins, entry.conf_losses) = summary(&["vs. Conf.", "vsconf", "vsConf"]).unwrap_or((0, 0));
    entry.streak = find_named(stats, &["streak"]).and_then(streak_text);

    Ok((entry, stat_value(&["winPercent"]), stat_value(&["gamesBehind"])))
}

/// "30-8" → (30, 8).
pub fn parse_record(text: &str) -> Option<(u32, u32)> {
    let (w, l) = text.trim().split_once('-')?;
    Some((w.trim().parse().ok()?, l.trim().parse().ok()?))
}

/// Streak stats carry either "W3" text or a signed count (3 / -2).
fn streak_text(stat: &Value) -> Option<String> {
    if let Some(text) = first_text(stat, &[&["displayValue"]]) {
        if text.starts_with('W') || text.starts_with('L') {
            return Some(text);
        }
    }
    let n = first_f64(stat, &[&["value"]])? as i64;
    match n {
        0 => None,
        n if n > 0 => Some(format!("W{n}")),
        n => Some(format!("L{}", -n)),
    }
}
