use serde_json::Value;

use super::boxscore::named_stat;
use super::fields::{find_named, first_array, first_text, lookup, parse_timestamp, require_text};
use super::games::normalize_game;
use crate::aggregate::compute_streak;
use crate::error::ShapeError;
use crate::models::{NextGame, RecordSummary, RosterEntry, StatCategory, TeamProfile, TeamRecord};

/// One team object from any ESPN endpoint (team page, teams list, boxscore,
/// `$ref` target). Only id and display name are mandatory.
pub fn team_record(raw: &Value) -> Result<TeamRecord, ShapeError> {
    Ok(TeamRecord {
        id: require_text(raw, &[&["id"]], "team.id")?,
        name: require_text(
            raw,
            &[&["displayName"], &["full_name"], &["name"]],
            "team.displayName",
        )?,
        abbreviation: first_text(raw, &[&["abbreviation"]]).unwrap_or_default(),
        location: first_text(raw, &[&["location"], &["city"]]),
        nickname: first_text(raw, &[&["name"], &["nickname"]]),
        conference: first_text(
            raw,
            &[&["conference"], &["groups", "parent", "name"], &["groups", "name"]],
        )
        .map(|c| short_conference(&c)),
        division: first_text(raw, &[&["division"]]),
        logo: first_text(raw, &[&["logos", "0", "href"], &["logo"]]),
        color: first_text(raw, &[&["color"]]),
        alternate_color: first_text(raw, &[&["alternateColor"]]),
    })
}

/// "Eastern Conference" → "East". Anything else passes through.
pub fn short_conference(name: &str) -> String {
    if name.contains("Eastern") || name == "East" {
        "East".to_string()
    } else if name.contains("Western") || name == "West" {
        "West".to_string()
    } else {
        name.to_string()
    }
}

/// ESPN teams list: `sports[0].leagues[0].teams[].team`.
pub fn normalize_teams(raw: &Value) -> Result<Vec<TeamRecord>, ShapeError> {
    let teams = first_array(
        raw,
        &[&["sports", "0", "leagues", "0", "teams"], &["teams"], &["data"]],
    )
    .ok_or_else(|| ShapeError::missing("sports[0].leagues[0].teams"))?;

    teams
        .iter()
        .map(|entry| team_record(entry.get("team").unwrap_or(entry)))
        .collect()
}

/// Statistics categories appear under several roots depending on endpoint.
pub fn stat_categories(raw: &Value) -> Option<Vec<StatCategory>> {
    let categories = first_array(
        raw,
        &[
            &["results", "stats", "categories"],
            &["splits", "categories"],
            &["statistics", "splits", "categories"],
            &["categories"],
        ],
    )?;
    Some(
        categories
            .iter()
            .filter_map(|c| {
                Some(StatCategory {
                    name: first_text(c, &[&["name"], &["displayName"]])?,
                    display_name: first_text(c, &[&["displayName"]]),
                    stats: c
                        .get("stats")
                        .and_then(Value::as_array)
                        .map(|s| s.iter().filter_map(named_stat).collect())
                        .unwrap_or_default(),
                })
            })
            .collect(),
    )
}

/// Raw pieces of a team page. Only `info` is required; the others come from
/// independent sub-fetches and may be missing.
pub struct TeamPayload<'a> {
    pub info: &'a Value,
    pub schedule: Option<&'a Value>,
    pub statistics: Option<&'a Value>,
    pub roster: Option<&'a Value>,
}

pub fn normalize_team_profile(payload: TeamPayload<'_>) -> Result<TeamProfile, ShapeError> {
    let team_raw = payload.info.get("team").unwrap_or(payload.info);
    let team = team_record(team_raw)?;

    let record_items = first_array(team_raw, &[&["record", "items"]]);
    let record_summary = |kind: &str| -> String {
        record_items
            .and_then(|items| find_named(items, &[kind]))
            .and_then(|item| first_text(item, &[&["summary"], &["displayValue"]]))
            .unwrap_or_else(|| "N/A".to_string())
    };
    let record = RecordSummary {
        overall: record_summary("total"),
        home: record_summary("home"),
        away: record_summary("road"),
        standing: first_text(team_raw, &[&["standingSummary"]]).unwrap_or_else(|| "N/A".into()),
    };

    let next_game = lookup(team_raw, &["nextEvent", "0"]).and_then(|event| {
        Some(NextGame {
            id: first_text(event, &[&["id"]])?,
            name: first_text(event, &[&["name"]]),
            short_name: first_text(event, &[&["shortName"]]),
            date: first_text(event, &[&["date"]]).and_then(|d| parse_timestamp(&d)),
        })
    });

    // A malformed schedule degrades to "no schedule" rather than failing the page.
    let schedule = payload.schedule.and_then(|raw| {
        raw.get("events")
            .and_then(Value::as_array)
            .map(|events| events.iter().filter_map(|e| normalize_game(e).ok()).collect::<Vec<_>>())
    });
    let season = payload.schedule.and_then(|raw| {
        first_text(
            raw,
            &[&["season", "displayName"], &["season", "year"], &["requestedSeason", "displayName"]],
        )
    });

    let roster = payload.roster.and_then(|raw| {
        first_array(raw, &[&["athletes"], &["roster"]]).map(|athletes| {
            athletes
                .iter()
                .filter_map(|a| {
                    Some(RosterEntry {
                        id: first_text(a, &[&["id"]])?,
                        display_name: first_text(a, &[&["displayName"], &["fullName"]])?,
                        jersey: first_text(a, &[&["jersey"]]),
                        position: first_text(
                            a,
                            &[&["position", "abbreviation"], &["position", "name"]],
                        ),
                    })
                })
                .collect()
        })
    });

    let streak = schedule
        .as_deref()
        .map(|games| compute_streak(&team.to_ref(), games))
        .unwrap_or_else(|| "-".to_string());

    Ok(TeamProfile {
        record,
        next_game,
        statistics: payload.statistics.and_then(stat_categories),
        schedule,
        season,
        roster,
        streak,
        team,
    })
}
