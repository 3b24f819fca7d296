use chrono::NaiveDate;

use crate::cache::CacheKey;
use crate::models::ResourceKind;

/// One resource query. Its parameters are exactly the ones that change the
/// result, which is what makes them the cache key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Scoreboard { date: NaiveDate },
    BoxScore { game_id: String },
    Player { player_id: String },
    Team { team_id: String },
    Teams,
    ProviderStandings,
    /// `season` is the year the season starts in (2025 for 2025-26).
    SeasonStandings { season: i32 },
    Leaders,
}

impl Request {
    pub fn resource(&self) -> ResourceKind {
        match self {
            Request::Scoreboard { .. } => ResourceKind::Scoreboard,
            Request::BoxScore { .. } => ResourceKind::BoxScore,
            Request::Player { .. } => ResourceKind::Player,
            Request::Team { .. } => ResourceKind::Team,
            Request::Teams => ResourceKind::Teams,
            Request::ProviderStandings => ResourceKind::ProviderStandings,
            Request::SeasonStandings { .. } => ResourceKind::SeasonStandings,
            Request::Leaders => ResourceKind::Leaders,
        }
    }

    pub fn cache_key(&self) -> CacheKey {
        let key = CacheKey::new(self.resource());
        match self {
            Request::Scoreboard { date } => key.with("date", date.format("%Y-%m-%d").to_string()),
            Request::BoxScore { game_id } => key.with("gameId", game_id.as_str()),
            Request::Player { player_id } => key.with("playerId", player_id.as_str()),
            Request::Team { team_id } => key.with("teamId", team_id.as_str()),
            Request::SeasonStandings { season } => key.with("season", season.to_string()),
            Request::Teams | Request::ProviderStandings | Request::Leaders => key,
        }
    }

    /// The caller-supplied id, for `NotFound` errors.
    pub fn id(&self) -> Option<&str> {
        match self {
            Request::BoxScore { game_id } => Some(game_id),
            Request::Player { player_id } => Some(player_id),
            Request::Team { team_id } => Some(team_id),
            _ => None,
        }
    }
}
