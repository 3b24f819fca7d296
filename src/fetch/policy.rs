use std::time::Duration;

use crate::models::{CanonicalValue, GameState, ResourceKind};

/// Where a freshly normalized value is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Permanent,
    Volatile(Duration),
}

/// Volatile-tier lifetimes per resource.
#[derive(Debug, Clone)]
pub struct TtlPolicy {
    pub scoreboard_live: Duration,
    pub scoreboard: Duration,
    pub box_score: Duration,
    pub player: Duration,
    pub team: Duration,
    pub teams: Duration,
    pub provider_standings: Duration,
    pub season_standings: Duration,
    pub leaders: Duration,
}

const MINUTE: Duration = Duration::from_secs(60);

impl Default for TtlPolicy {
    fn default() -> Self {
        TtlPolicy {
            scoreboard_live: MINUTE,
            scoreboard: 5 * MINUTE,
            box_score: MINUTE,
            player: 5 * MINUTE,
            team: 5 * MINUTE,
            teams: 10 * MINUTE,
            provider_standings: 2 * MINUTE,
            season_standings: 5 * MINUTE,
            leaders: 5 * MINUTE,
        }
    }
}

impl TtlPolicy {
    /// A scoreboard with a game in progress gets the short TTL.
    pub fn ttl_for(&self, resource: ResourceKind, value: &CanonicalValue) -> Duration {
        match resource {
            ResourceKind::Scoreboard => match value {
                CanonicalValue::Schedule(s) if s.games.iter().any(|g| g.state == GameState::Live) => {
                    self.scoreboard_live
                }
                _ => self.scoreboard,
            },
            ResourceKind::BoxScore => self.box_score,
            ResourceKind::Player => self.player,
            ResourceKind::Team => self.team,
            ResourceKind::Teams => self.teams,
            ResourceKind::ProviderStandings => self.provider_standings,
            ResourceKind::SeasonStandings => self.season_standings,
            ResourceKind::Leaders => self.leaders,
        }
    }

    pub fn placement(&self, closed: bool, resource: ResourceKind, value: &CanonicalValue) -> Placement {
        if closed {
            Placement::Permanent
        } else {
            Placement::Volatile(self.ttl_for(resource, value))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Schedule;
    use crate::normalize::games::fixtures::espn_event;
    use crate::normalize::games::normalize_game;
    use chrono::NaiveDate;

    fn schedule(state: &str) -> CanonicalValue {
        let game = normalize_game(&espn_event(
            "1",
            state,
            ("2", "Boston Celtics", "BOS", "50"),
            ("18", "New York Knicks", "NY", "48"),
        ))
        .unwrap();
        CanonicalValue::Schedule(Schedule {
            date: NaiveDate::from_ymd_opt(2025, 1, 5).unwrap(),
            games: vec![game],
        })
    }

    #[test]
    fn test_live_scoreboard_gets_short_ttl() {
        let policy = TtlPolicy::default();
        assert_eq!(policy.ttl_for(ResourceKind::Scoreboard, &schedule("in")), MINUTE);
        assert_eq!(policy.ttl_for(ResourceKind::Scoreboard, &schedule("pre")), 5 * MINUTE);
    }

    #[test]
    fn test_box_scores_shortest_team_metadata_longest() {
        let policy = TtlPolicy::default();
        let v = CanonicalValue::Teams(vec![]);
        assert_eq!(policy.ttl_for(ResourceKind::BoxScore, &v), MINUTE);
        assert_eq!(policy.ttl_for(ResourceKind::Teams, &v), 10 * MINUTE);
        assert_eq!(policy.placement(true, ResourceKind::Teams, &v), Placement::Permanent);
        assert_eq!(
            policy.placement(false, ResourceKind::ProviderStandings, &v),
            Placement::Volatile(2 * MINUTE)
        );
    }
}
