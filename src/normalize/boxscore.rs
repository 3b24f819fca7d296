use serde_json::Value;
use std::collections::BTreeMap;

use super::fields::{as_text, first_array, first_f64, first_text, lookup, require_text};
use super::games::{espn_broadcasts, normalize_game};
use super::team::team_record;
use crate::error::ShapeError;
use crate::models::{BoxScore, BoxScoreTeam, NamedStat, PlayerStatBlock, StatScope};

/// Normalize an ESPN game summary (`header` + `boxscore`).
///
/// The header is mandatory; the boxscore section is absent before tip-off and
/// then yields teams with empty stat lists.
pub fn normalize_box_score(raw: &Value) -> Result<BoxScore, ShapeError> {
    let header = raw
        .get("header")
        .ok_or_else(|| ShapeError::missing("header"))?;
    let mut game = normalize_game(header)?;
    let competition = lookup(header, &["competitions", "0"])
        .ok_or_else(|| ShapeError::missing("header.competitions[0]"))?;
    if game.broadcasts.is_empty() {
        game.broadcasts = espn_broadcasts(competition);
    }

    let boxscore = raw.get("boxscore").unwrap_or(&Value::Null);
    let home = box_score_team(boxscore, competition, &game.home.id, &game.id)?;
    let away = box_score_team(boxscore, competition, &game.away.id, &game.id)?;

    Ok(BoxScore {
        home: BoxScoreTeam {
            score: game.home_score,
            ..home
        },
        away: BoxScoreTeam {
            score: game.away_score,
            ..away
        },
        game,
    })
}

fn box_score_team(
    boxscore: &Value,
    competition: &Value,
    team_id: &str,
    game_id: &str,
) -> Result<BoxScoreTeam, ShapeError> {
    let team_entry = find_by_team_id(boxscore.get("teams"), team_id);
    let competitor = competition
        .get("competitors")
        .and_then(Value::as_array)
        .and_then(|list| {
            list.iter()
                .find(|c| first_text(c, &[&["team", "id"], &["id"]]).as_deref() == Some(team_id))
        });

    // Boxscore team blocks carry logo/colour; fall back to the header competitor.
    let team_value = team_entry
        .and_then(|t| t.get("team"))
        .or_else(|| competitor.and_then(|c| c.get("team")))
        .ok_or_else(|| ShapeError::missing("boxscore.teams[].team"))?;
    let team = team_record(team_value)?;

    let stats = team_entry
        .and_then(|t| t.get("statistics"))
        .and_then(Value::as_array)
        .map(|list| list.iter().filter_map(named_stat).collect())
        .unwrap_or_default();

    let players = find_by_team_id(boxscore.get("players"), team_id)
        .map(|entry| player_blocks(entry, game_id))
        .transpose()?
        .unwrap_or_default();

    Ok(BoxScoreTeam {
        team,
        score: None,
        stats,
        players,
    })
}

fn find_by_team_id<'a>(list: Option<&'a Value>, team_id: &str) -> Option<&'a Value> {
    list.and_then(Value::as_array)?
        .iter()
        .find(|entry| first_text(entry, &[&["team", "id"]]).as_deref() == Some(team_id))
}

pub fn named_stat(raw: &Value) -> Option<NamedStat> {
    let name = first_text(raw, &[&["name"], &["abbreviation"], &["label"]])?;
    Some(NamedStat {
        name,
        label: first_text(raw, &[&["label"], &["abbreviation"], &["displayName"]]),
        value: first_f64(raw, &[&["value"], &["displayValue"]]),
        display_value: first_text(raw, &[&["displayValue"], &["value"]]),
    })
}

/// Zip each athlete's positional `stats` with the group's `names` so the result
/// is keyed by label. Column order is per-payload and never assumed.
fn player_blocks(team_players: &Value, game_id: &str) -> Result<Vec<PlayerStatBlock>, ShapeError> {
    let mut blocks = Vec::new();
    let empty = Vec::new();
    let groups = team_players
        .get("statistics")
        .and_then(Value::as_array)
        .unwrap_or(&empty);

    for group in groups {
        let names = first_array(group, &[&["names"], &["labels"], &["keys"]]).unwrap_or(&empty);
        let athletes = group
            .get("athletes")
            .and_then(Value::as_array)
            .unwrap_or(&empty);

        for athlete in athletes {
            let player_id = require_text(athlete, &[&["athlete", "id"]], "athletes[].athlete.id")?;
            let values = athlete
                .get("stats")
                .and_then(Value::as_array)
                .unwrap_or(&empty);
            let stats: BTreeMap<String, String> = names
                .iter()
                .zip(values.iter())
                .filter_map(|(name, value)| Some((as_text(name)?, as_text(value)?)))
                .collect();

            blocks.push(PlayerStatBlock {
                player_id,
                player_name: first_text(
                    athlete,
                    &[&["athlete", "displayName"], &["athlete", "shortName"]],
                )
                .unwrap_or_default(),
                scope: StatScope::Game {
                    game_id: game_id.to_string(),
                },
                stats,
            });
        }
    }
    Ok(blocks)
}
