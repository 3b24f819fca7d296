//! Game / scoreboard normalization.
//!
//! Two upstream shapes are understood:
//! - **ESPN events** (`events[].competitions[0].competitors[]`, also used in
//!   team schedules where `score` may be an object)
//! - **BallDontLie games** (`data[]` with `home_team` / `visitor_team`), which
//!   also covers the flattened scoreboard rows the dashboard used to emit
//!
//! Both land in [`GameRecord`].

use serde_json::Value;
use tracing::warn;

use super::fields::{
    as_text, dedup_preserving_order, first_array, first_bool, first_text, first_u32, lookup,
    parse_timestamp, require_text,
};
use crate::error::ShapeError;
use crate::models::{GameRecord, GameState, TeamRef};

/// Tagged view of one raw game object.
enum RawGame<'a> {
    Espn(&'a Value),
    BallDontLie(&'a Value),
}

impl<'a> RawGame<'a> {
    fn detect(v: &'a Value) -> Option<Self> {
        if v.get("competitions").is_some() {
            Some(RawGame::Espn(v))
        } else if v.get("home_team").is_some() {
            Some(RawGame::BallDontLie(v))
        } else {
            None
        }
    }
}

/// Normalize a whole scoreboard/schedule payload. A payload with no game list at
/// all is an empty day, not an error. Malformed games are skipped; the list
/// only fails when none of its games parse.
pub fn normalize_games(raw: &Value) -> Result<Vec<GameRecord>, ShapeError> {
    let items: &[Value] = match first_array(raw, &[&["events"], &["data"]]) {
        Some(items) => items,
        None => match raw.as_array() {
            Some(items) => items,
            None => return Ok(vec![]),
        },
    };

    let mut games = Vec::with_capacity(items.len());
    let mut first_error = None;
    for item in items {
        match normalize_game(item) {
            Ok(game) => games.push(game),
            Err(e) => {
                warn!(
                    "Skipping game {}: {}",
                    item.get("id").and_then(as_text).unwrap_or_default(),
                    e
                );
                first_error.get_or_insert(e);
            }
        }
    }
    match first_error {
        Some(e) if games.is_empty() => Err(e),
        _ => Ok(games),
    }
}

/// Normalize one raw game of either shape.
pub fn normalize_game(raw: &Value) -> Result<GameRecord, ShapeError> {
    match RawGame::detect(raw) {
        Some(RawGame::Espn(v)) => parse_espn_event(v),
        Some(RawGame::BallDontLie(v)) => parse_balldontlie_game(v),
        None => Err(ShapeError::missing("game.competitions|home_team")),
    }
}

fn parse_espn_event(event: &Value) -> Result<GameRecord, ShapeError> {
    let id = require_text(event, &[&["id"]], "event.id")?;
    let competition = lookup(event, &["competitions", "0"])
        .ok_or_else(|| ShapeError::missing("event.competitions[0]"))?;
    let competitors = competition
        .get("competitors")
        .and_then(Value::as_array)
        .ok_or_else(|| ShapeError::missing("competition.competitors"))?;

    let home = find_competitor(competitors, "home")
        .ok_or_else(|| ShapeError::missing("competitors[homeAway=home]"))?;
    let away = find_competitor(competitors, "away")
        .ok_or_else(|| ShapeError::missing("competitors[homeAway=away]"))?;

    let state = espn_state(competition);
    let status_detail = first_text(
        competition,
        &[&["status", "type", "detail"], &["status", "type", "description"]],
    )
    .unwrap_or_default();
    let status_detail = match state {
        GameState::Final => "Final".to_string(),
        GameState::Live => first_text(competition, &[&["status", "type", "shortDetail"]])
            .unwrap_or(status_detail),
        GameState::Scheduled => status_detail,
    };

    let (home_score, away_score) = match state {
        GameState::Scheduled => (None, None),
        _ => (competitor_score(home), competitor_score(away)),
    };

    Ok(GameRecord {
        id,
        home: espn_team_ref(home)?,
        away: espn_team_ref(away)?,
        home_score,
        away_score,
        state,
        status_detail,
        period: first_u32(competition, &[&["status", "period"]]).filter(|p| *p > 0),
        clock: first_text(competition, &[&["status", "displayClock"]]),
        start_time: first_text(event, &[&["date"]])
            .or_else(|| first_text(competition, &[&["date"]]))
            .and_then(|d| parse_timestamp(&d)),
        broadcasts: espn_broadcasts(competition),
    })
}

fn find_competitor<'a>(competitors: &'a [Value], side: &str) -> Option<&'a Value> {
    competitors
        .iter()
        .find(|c| c.get("homeAway").and_then(Value::as_str) == Some(side))
}

/// ESPN marks completion with `completed`, progress with `state` ∈ {pre, in, post}.
fn espn_state(competition: &Value) -> GameState {
    let completed = first_bool(competition, &[&["status", "type", "completed"]]).unwrap_or(false);
    let state = first_text(competition, &[&["status", "type", "state"]]).unwrap_or_default();
    if completed || state == "post" {
        GameState::Final
    } else if state == "in" {
        GameState::Live
    } else {
        GameState::Scheduled
    }
}

fn competitor_score(competitor: &Value) -> Option<u32> {
    first_u32(
        competitor,
        &[&["score", "value"], &["score", "displayValue"], &["score"]],
    )
}

fn espn_team_ref(competitor: &Value) -> Result<TeamRef, ShapeError> {
    Ok(TeamRef {
        id: first_text(competitor, &[&["team", "id"], &["id"]])
            .ok_or_else(|| ShapeError::missing("competitor.team.id"))?,
        name: require_text(
            competitor,
            &[&["team", "displayName"], &["team", "name"]],
            "competitor.team.displayName",
        )?,
        abbreviation: first_text(competitor, &[&["team", "abbreviation"]]).unwrap_or_default(),
    })
}

/// National broadcasts first; regional `geoBroadcasts` only when there are none.
pub fn espn_broadcasts(competition: &Value) -> Vec<String> {
    let national: Vec<String> = competition
        .get("broadcasts")
        .and_then(Value::as_array)
        .map(|list| {
            list.iter()
                .flat_map(|b| {
                    b.get("names")
                        .and_then(Value::as_array)
                        .into_iter()
                        .flatten()
                        .filter_map(as_text)
                        .chain(first_text(b, &[&["media", "shortName"]]))
                })
                .collect()
        })
        .unwrap_or_default();
    if !national.is_empty() {
        return dedup_preserving_order(national);
    }

    let regional = competition
        .get("geoBroadcasts")
        .and_then(Value::as_array)
        .map(|list| {
            list.iter()
                .filter_map(|b| first_text(b, &[&["media", "shortName"]]))
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();
    dedup_preserving_order(regional)
}

fn parse_balldontlie_game(game: &Value) -> Result<GameRecord, ShapeError> {
    let id = require_text(game, &[&["id"]], "game.id")?;
    let home = game
        .get("home_team")
        .ok_or_else(|| ShapeError::missing("game.home_team"))?;
    let away = game
        .get("visitor_team")
        .ok_or_else(|| ShapeError::missing("game.visitor_team"))?;

    let status = first_text(game, &[&["status"]]).unwrap_or_default();
    let period = first_u32(game, &[&["period"]]).filter(|p| *p > 0);
    let state = balldontlie_state(
        &status,
        first_text(game, &[&["period_state"]]).as_deref(),
        period,
    );

    let (home_score, away_score) = match state {
        GameState::Scheduled => (None, None),
        _ => (
            first_u32(game, &[&["home_team_score"]]),
            first_u32(game, &[&["visitor_team_score"]]),
        ),
    };

    // Before tip-off `status` carries the start timestamp itself.
    let start_time = first_text(game, &[&["datetime"]])
        .and_then(|d| parse_timestamp(&d))
        .or_else(|| parse_timestamp(&status))
        .or_else(|| first_text(game, &[&["date"]]).and_then(|d| parse_timestamp(&d)));

    let status_detail = match state {
        GameState::Final => "Final".to_string(),
        GameState::Scheduled if parse_timestamp(&status).is_some() => "Scheduled".to_string(),
        _ => status,
    };

    Ok(GameRecord {
        id,
        home: balldontlie_team_ref(home, "home_team")?,
        away: balldontlie_team_ref(away, "visitor_team")?,
        home_score,
        away_score,
        state,
        status_detail,
        period,
        clock: first_text(game, &[&["time"]])
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty() && t != "Final"),
        start_time,
        broadcasts: game
            .get("broadcasts")
            .and_then(Value::as_array)
            .map(|b| dedup_preserving_order(b.iter().filter_map(as_text)))
            .unwrap_or_default(),
    })
}

fn balldontlie_state(status: &str, period_state: Option<&str>, period: Option<u32>) -> GameState {
    let lowered = status.to_ascii_lowercase();
    if lowered == "final" || period_state == Some("post") {
        return GameState::Final;
    }
    if period_state == Some("in")
        || ["qtr", "half", "ot"].iter().any(|m| lowered.contains(m))
    {
        return GameState::Live;
    }
    if parse_timestamp(status).is_some() || period_state == Some("pre") {
        return GameState::Scheduled;
    }
    if period.is_some() {
        GameState::Live
    } else {
        GameState::Scheduled
    }
}

fn balldontlie_team_ref(team: &Value, field: &str) -> Result<TeamRef, ShapeError> {
    Ok(TeamRef {
        id: first_text(team, &[&["id"]]).unwrap_or_default(),
        name: require_text(
            team,
            &[&["full_name"], &["displayName"], &["name"]],
            &format!("{field}.full_name"),
        )?,
        abbreviation: first_text(team, &[&["abbreviation"]]).unwrap_or_default(),
    })
}
