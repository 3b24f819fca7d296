use serde_json::Value;
use std::collections::BTreeMap;

use super::fields::{first_text, first_u32, is_ref_only, ref_link, require_text};
use super::team::{stat_categories, team_record};
use crate::error::ShapeError;
use crate::models::{
    PlayerProfile, PlayerRecord, PlayerStatBlock, SeasonAverages, StatCategory, StatScope,
};

const POINTS: &[&str] = &["avgPoints", "pointsPerGame", "PTS", "points"];
const REBOUNDS: &[&str] = &["avgRebounds", "reboundsPerGame", "REB", "rebounds"];
const ASSISTS: &[&str] = &["avgAssists", "assistsPerGame", "AST", "assists"];

/// The sub-resources an athlete may point to through `$ref` links.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AthleteLink {
    Team,
    Statistics,
    Position,
}

impl AthleteLink {
    fn field(self) -> &'static str {
        match self {
            AthleteLink::Team => "team",
            AthleteLink::Statistics => "statistics",
            AthleteLink::Position => "position",
        }
    }
}

/// Unwrap the site API's `{"athlete": {...}}` envelope if present.
pub fn athlete_root(raw: &Value) -> &Value {
    match raw.get("athlete") {
        Some(inner) if inner.is_object() => inner,
        _ => raw,
    }
}

/// `$ref` target for `link` when the athlete only carries a pointer.
pub fn pending_ref(raw: &Value, link: AthleteLink) -> Option<&str> {
    athlete_root(raw)
        .get(link.field())
        .filter(|v| is_ref_only(v))
        .and_then(ref_link)
}

/// An athlete payload plus whatever dereferenced sub-resources were fetched.
/// A sub-resource that was not fetched falls back to the inline object, if any.
pub struct PlayerPayload<'a> {
    pub athlete: &'a Value,
    pub team: Option<&'a Value>,
    pub statistics: Option<&'a Value>,
    pub position: Option<&'a Value>,
}

impl<'a> PlayerPayload<'a> {
    /// A payload with nothing dereferenced: everything comes from the athlete.
    #[cfg(test)]
    pub fn flat(athlete: &'a Value) -> Self {
        PlayerPayload {
            athlete,
            team: None,
            statistics: None,
            position: None,
        }
    }

    fn resolved(&self, link: AthleteLink) -> Option<&'a Value> {
        let fetched = match link {
            AthleteLink::Team => self.team,
            AthleteLink::Statistics => self.statistics,
            AthleteLink::Position => self.position,
        };
        fetched.or_else(|| {
            athlete_root(self.athlete)
                .get(link.field())
                .filter(|v| v.is_object() && !is_ref_only(v))
        })
    }
}

pub fn normalize_player(payload: PlayerPayload<'_>) -> Result<PlayerProfile, ShapeError> {
    let athlete = athlete_root(payload.athlete);
    let position = payload.resolved(AthleteLink::Position);
    let player = player_record(athlete, position)?;

    // A team object without an id is as good as missing.
    let team = payload
        .resolved(AthleteLink::Team)
        .and_then(|t| team_record(t.get("team").unwrap_or(t)).ok());

    let statistics = payload
        .resolved(AthleteLink::Statistics)
        .and_then(stat_categories);
    let season = statistics
        .as_deref()
        .map(|cats| season_block(&player, cats))
        .filter(|block| !block.stats.is_empty());
    let averages = season
        .as_ref()
        .map(season_averages)
        .unwrap_or_default();

    Ok(PlayerProfile {
        player,
        team,
        averages,
        season,
        statistics,
    })
}

fn player_record(athlete: &Value, position: Option<&Value>) -> Result<PlayerRecord, ShapeError> {
    let position = position.unwrap_or(&Value::Null);
    let birth_place = match (
        first_text(athlete, &[&["birthPlace", "city"]]),
        first_text(athlete, &[&["birthPlace", "country"]]),
    ) {
        (Some(city), Some(country)) => Some(format!("{city}, {country}")),
        _ => None,
    };

    Ok(PlayerRecord {
        id: require_text(athlete, &[&["id"]], "athlete.id")?,
        first_name: first_text(athlete, &[&["firstName"]]),
        last_name: first_text(athlete, &[&["lastName"]]),
        full_name: first_text(athlete, &[&["fullName"]]),
        display_name: require_text(
            athlete,
            &[&["displayName"], &["fullName"]],
            "athlete.displayName",
        )?,
        short_name: first_text(athlete, &[&["shortName"]]),
        jersey: first_text(athlete, &[&["jersey"]]),
        position: first_text(position, &[&["displayName"], &["name"], &["abbreviation"]])
            .unwrap_or_else(|| "N/A".to_string()),
        position_abbr: first_text(position, &[&["abbreviation"]])
            .unwrap_or_else(|| "N/A".to_string()),
        height: first_text(athlete, &[&["displayHeight"], &["height"]]),
        weight: first_text(athlete, &[&["displayWeight"], &["weight"]]),
        age: first_u32(athlete, &[&["age"]]),
        date_of_birth: first_text(athlete, &[&["dateOfBirth"]]),
        birth_place,
        college: first_text(athlete, &[&["college", "name"], &["college"]]),
        experience: first_u32(athlete, &[&["experience", "years"], &["experience"]]),
        headshot: first_text(athlete, &[&["headshot", "href"], &["headshot"]]),
        status: first_text(athlete, &[&["status", "name"], &["status", "type"]]),
    })
}

/// Flatten every category into one name → display value map.
/// The first category that mentions a stat keeps it.
fn season_block(player: &PlayerRecord, categories: &[StatCategory]) -> PlayerStatBlock {
    let mut stats = BTreeMap::new();
    for stat in categories.iter().flat_map(|c| c.stats.iter()) {
        let display = stat
            .display_value
            .clone()
            .or_else(|| stat.value.map(|v| v.to_string()));
        if let Some(display) = display {
            stats.entry(stat.name.clone()).or_insert(display);
        }
    }
    PlayerStatBlock {
        player_id: player.id.clone(),
        player_name: player.display_name.clone(),
        scope: StatScope::Season,
        stats,
    }
}

fn season_averages(block: &PlayerStatBlock) -> SeasonAverages {
    let pick = |keys: &[&str]| keys.iter().find_map(|k| block.get_f64(k));
    SeasonAverages {
        points: pick(POINTS),
        rebounds: pick(REBOUNDS),
        assists: pick(ASSISTS),
    }
}
