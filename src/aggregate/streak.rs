use std::cmp::Ordering;

use crate::models::{GameRecord, TeamRef};

/// Chronological order for games, with the game id as a stable tie-break so
/// the result never depends on input order. Numeric ids compare numerically.
pub(crate) fn chronological(a: &GameRecord, b: &GameRecord) -> Ordering {
    a.start_time
        .cmp(&b.start_time)
        .then_with(|| match (a.id.parse::<u64>(), b.id.parse::<u64>()) {
            (Ok(x), Ok(y)) => x.cmp(&y),
            _ => a.id.cmp(&b.id),
        })
}

/// Current run of wins or losses over the team's settled games, most recent
/// first: `"W3"`, `"L1"`, or `"-"` with no settled games.
pub fn compute_streak(team: &TeamRef, games: &[GameRecord]) -> String {
    let results = games
        .iter()
        .filter_map(|g| {
            let side = g.involves(team)?;
            let winner = g.winner()?;
            Some((g, winner == side))
        })
        .collect();
    streak_from_results(results)
}

/// Streak over `(game, won)` pairs already attributed to one team.
pub(crate) fn streak_from_results(mut results: Vec<(&GameRecord, bool)>) -> String {
    results.sort_by(|a, b| chronological(b.0, a.0));

    let Some(&(_, latest)) = results.first() else {
        return "-".to_string();
    };
    let run = results.iter().take_while(|(_, won)| *won == latest).count();
    format!("{}{}", if latest { 'W' } else { 'L' }, run)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GameState;
    use chrono::{TimeZone, Utc};

    fn team(name: &str) -> TeamRef {
        TeamRef {
            id: String::new(),
            name: name.into(),
            abbreviation: String::new(),
        }
    }

    fn result(id: &str, day: u32, home: &str, away: &str, hs: u32, aws: u32) -> GameRecord {
        GameRecord {
            id: id.into(),
            home: team(home),
            away: team(away),
            home_score: Some(hs),
            away_score: Some(aws),
            state: GameState::Final,
            status_detail: "Final".into(),
            period: Some(4),
            clock: None,
            start_time: Some(Utc.with_ymd_and_hms(2025, 1, day, 0, 0, 0).unwrap()),
            broadcasts: vec![],
        }
    }

    #[test]
    fn test_win_streak_most_recent_first() {
        let games = vec![
            result("1", 1, "Boston Celtics", "Miami Heat", 90, 100),
            result("2", 3, "Boston Celtics", "Chicago Bulls", 110, 100),
            result("3", 5, "Orlando Magic", "Boston Celtics", 99, 120),
        ];
        assert_eq!(compute_streak(&team("Boston Celtics"), &games), "W2");
        assert_eq!(compute_streak(&team("Miami Heat"), &games), "W1");
        assert_eq!(compute_streak(&team("Orlando Magic"), &games), "L1");
    }

    #[test]
    fn test_streak_ignores_input_order_and_unsettled_games() {
        let mut games = vec![
            result("3", 5, "Boston Celtics", "Miami Heat", 90, 100),
            result("1", 1, "Boston Celtics", "Chicago Bulls", 110, 100),
            result("2", 3, "Orlando Magic", "Boston Celtics", 120, 99),
        ];
        let mut live = result("4", 7, "Boston Celtics", "Utah Jazz", 50, 40);
        live.state = GameState::Live;
        games.push(live);
        assert_eq!(compute_streak(&team("Boston Celtics"), &games), "L2");
        games.reverse();
        assert_eq!(compute_streak(&team("Boston Celtics"), &games), "L2");
    }

    #[test]
    fn test_no_completed_games() {
        assert_eq!(compute_streak(&team("Boston Celtics"), &[]), "-");
    }
}
