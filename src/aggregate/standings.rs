//! Season standings derived from game results.
//!
//! `compute_standings` is a pure fold over settled games: the same game set
//! always yields the same entries, whatever order the games arrive in.
//! Ranking is a separate step so provider-reported records can share it.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};

use super::directory::TeamDirectory;
use super::streak::streak_from_results;
use crate::models::{GameRecord, RankedStanding, Side, StandingsEntry};

/// Win/loss records for every team in `directory`.
///
/// Only settled games count. Games with a team missing from the directory, or
/// with level scores, are skipped. Duplicate game ids count once.
pub fn compute_standings(games: &[GameRecord], directory: &TeamDirectory) -> Vec<StandingsEntry> {
    let mut entries: Vec<StandingsEntry> = directory.teams().iter().map(StandingsEntry::new).collect();
    let index: HashMap<&str, usize> = directory
        .teams()
        .iter()
        .enumerate()
        .map(|(i, t)| (t.id.as_str(), i))
        .collect();
    let mut results: Vec<Vec<(&GameRecord, bool)>> = vec![Vec::new(); entries.len()];
    let mut seen = HashSet::new();

    for game in games {
        let Some(winner) = game.winner() else {
            continue;
        };
        if !seen.insert(game.id.as_str()) {
            continue;
        }
        let (Some(home), Some(away)) = (
            directory.resolve_ref(&game.home),
            directory.resolve_ref(&game.away),
        ) else {
            continue;
        };
        let (Some(&h), Some(&a)) = (index.get(home.id.as_str()), index.get(away.id.as_str())) else {
            continue;
        };
        let same_conference = home.conference.is_some() && home.conference == away.conference;

        let (w, l) = match winner {
            Side::Home => (h, a),
            Side::Away => (a, h),
        };
        entries[w].wins += 1;
        entries[l].losses += 1;
        match winner {
            Side::Home => {
                entries[h].home_wins += 1;
                entries[a].road_losses += 1;
            }
            Side::Away => {
                entries[a].road_wins += 1;
                entries[h].home_losses += 1;
            }
        }
        if same_conference {
            entries[w].conf_wins += 1;
            entries[l].conf_losses += 1;
        }
        results[w].push((game, true));
        results[l].push((game, false));
    }

    for (entry, team_results) in entries.iter_mut().zip(results) {
        if !team_results.is_empty() {
            entry.streak = Some(streak_from_results(team_results));
        }
    }
    entries
}

/// `wins / games`, with 0-0 treated as 0/1 so it ranks below any winning record.
fn pct_fraction(wins: u32, losses: u32) -> (u64, u64) {
    (u64::from(wins), u64::from((wins + losses).max(1)))
}

/// Compare two fractions without floating point.
fn cmp_fraction(a: (u64, u64), b: (u64, u64)) -> Ordering {
    (a.0 * b.1).cmp(&(b.0 * a.1))
}

/// Order within a conference: win pct desc, wins desc, conference win pct
/// desc, then display name asc. Team id settles identical names.
pub fn compare_entries(a: &StandingsEntry, b: &StandingsEntry) -> Ordering {
    cmp_fraction(pct_fraction(b.wins, b.losses), pct_fraction(a.wins, a.losses))
        .then_with(|| b.wins.cmp(&a.wins))
        .then_with(|| {
            cmp_fraction(
                pct_fraction(b.conf_wins, b.conf_losses),
                pct_fraction(a.conf_wins, a.conf_losses),
            )
        })
        .then_with(|| a.name.cmp(&b.name))
        .then_with(|| a.team_id.cmp(&b.team_id))
}

/// `((leaderW - W) + (L - leaderL)) / 2`
pub fn games_back(leader: &StandingsEntry, entry: &StandingsEntry) -> f64 {
    let diff = (i64::from(leader.wins) - i64::from(entry.wins))
        + (i64::from(entry.losses) - i64::from(leader.losses));
    diff as f64 / 2.0
}

/// Rank entries per conference. Output is grouped by conference name, each
/// group in rank order. Entries without a conference form their own group.
pub fn rank_standings(entries: Vec<StandingsEntry>) -> Vec<RankedStanding> {
    let mut groups: BTreeMap<String, Vec<StandingsEntry>> = BTreeMap::new();
    for entry in entries {
        groups
            .entry(entry.conference.clone().unwrap_or_default())
            .or_default()
            .push(entry);
    }

    let mut ranked = Vec::new();
    for (_, mut group) in groups {
        group.sort_by(compare_entries);
        let Some(leader) = group.first().cloned() else {
            continue;
        };
        for (i, entry) in group.into_iter().enumerate() {
            ranked.push(RankedStanding {
                rank: i as u32 + 1,
                win_pct: entry.win_pct(),
                games_back: games_back(&leader, &entry),
                home_record: entry.home_record(),
                road_record: entry.road_record(),
                conference_record: entry.conference_record(),
                entry,
            });
        }
    }
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GameState, TeamRecord, TeamRef};
    use approx::assert_relative_eq;

    fn team_ref(name: &str) -> TeamRef {
        TeamRef {
            id: String::new(),
            name: name.into(),
            abbreviation: String::new(),
        }
    }

    fn game(id: &str, home: &str, away: &str, hs: u32, aws: u32) -> GameRecord {
        GameRecord {
            id: id.into(),
            home: team_ref(home),
            away: team_ref(away),
            home_score: Some(hs),
            away_score: Some(aws),
            state: GameState::Final,
            status_detail: "Final".into(),
            period: Some(4),
            clock: None,
            start_time: None,
            broadcasts: vec![],
        }
    }

    fn entry<'a>(entries: &'a [StandingsEntry], abbr: &str) -> &'a StandingsEntry {
        entries.iter().find(|e| e.abbreviation == abbr).unwrap()
    }

    fn sample_games() -> Vec<GameRecord> {
        vec![
            game("1", "Boston Celtics", "New York Knicks", 110, 100),
            game("2", "Los Angeles Lakers", "Boston Celtics", 105, 112),
            game("3", "New York Knicks", "Miami Heat", 99, 101),
            game("4", "Denver Nuggets", "Los Angeles Lakers", 120, 118),
            game("5", "Miami Heat", "Boston Celtics", 95, 104),
        ]
    }

    #[test]
    fn test_empty_input_gives_every_team_zero() {
        let entries = compute_standings(&[], &TeamDirectory::nba());
        assert_eq!(entries.len(), 30);
        assert!(entries.iter().all(|e| e.wins == 0 && e.losses == 0 && e.streak.is_none()));
    }

    #[test]
    fn test_splits_and_conference_record() {
        let entries = compute_standings(&sample_games(), &TeamDirectory::nba());
        let bos = entry(&entries, "BOS");
        assert_eq!((bos.wins, bos.losses), (3, 0));
        assert_eq!(bos.home_record(), "1-0");
        assert_eq!(bos.road_record(), "2-0");
        // LAL is West: that win is not a conference game.
        assert_eq!(bos.conference_record(), "2-0");
        assert_eq!(bos.division.as_deref(), Some("Atlantic"));
        assert_eq!(bos.streak.as_deref(), Some("W3"));

        let lal = entry(&entries, "LAL");
        assert_eq!((lal.wins, lal.losses), (0, 2));
        assert_eq!(lal.home_record(), "0-1");
        assert_eq!(lal.road_record(), "0-1");
        assert_eq!(lal.conference_record(), "0-1");
    }

    #[test]
    fn test_permutation_invariance() {
        let games = sample_games();
        let expected = compute_standings(&games, &TeamDirectory::nba());

        let mut reversed = games.clone();
        reversed.reverse();
        assert_eq!(compute_standings(&reversed, &TeamDirectory::nba()), expected);

        let mut rotated = games.clone();
        rotated.rotate_left(2);
        assert_eq!(compute_standings(&rotated, &TeamDirectory::nba()), expected);

        let mut swapped = games;
        swapped.swap(0, 3);
        assert_eq!(compute_standings(&swapped, &TeamDirectory::nba()), expected);
    }

    #[test]
    fn test_unknown_team_tie_and_unsettled_games_are_skipped() {
        let mut scheduled = game("7", "Boston Celtics", "Utah Jazz", 0, 0);
        scheduled.state = GameState::Scheduled;
        scheduled.home_score = None;
        scheduled.away_score = None;
        let games = vec![
            game("6", "Boston Celtics", "Seattle SuperSonics", 120, 90),
            game("8", "Boston Celtics", "Utah Jazz", 100, 100),
            scheduled,
        ];
        let entries = compute_standings(&games, &TeamDirectory::nba());
        assert!(entries.iter().all(|e| e.games_played() == 0));
    }

    #[test]
    fn test_duplicate_game_ids_count_once() {
        let games = vec![
            game("1", "Boston Celtics", "New York Knicks", 110, 100),
            game("1", "Boston Celtics", "New York Knicks", 110, 100),
        ];
        let entries = compute_standings(&games, &TeamDirectory::nba());
        assert_eq!(entry(&entries, "BOS").wins, 1);
        assert_eq!(entry(&entries, "NY").losses, 1);
    }

    fn standing(name: &str, conf: &str, w: u32, l: u32, cw: u32, cl: u32) -> StandingsEntry {
        let mut e = StandingsEntry::new(&TeamRecord {
            id: name.to_lowercase(),
            name: name.into(),
            conference: Some(conf.into()),
            ..Default::default()
        });
        e.wins = w;
        e.losses = l;
        e.conf_wins = cw;
        e.conf_losses = cl;
        e
    }

    #[test]
    fn test_rank_tie_break_chain() {
        let ranked = rank_standings(vec![
            standing("Zeta", "East", 10, 10, 5, 5),
            standing("Alpha", "East", 10, 10, 5, 5),
            standing("Beta", "East", 10, 10, 8, 2),
            // Same pct as the 10-10 teams, more wins.
            standing("Gamma", "East", 20, 20, 0, 0),
            standing("Leader", "East", 30, 5, 0, 0),
            standing("Fresh", "East", 0, 0, 0, 0),
        ]);
        let order: Vec<&str> = ranked.iter().map(|r| r.entry.name.as_str()).collect();
        assert_eq!(order, vec!["Leader", "Gamma", "Beta", "Alpha", "Zeta", "Fresh"]);
        assert_eq!(ranked[0].rank, 1);
        assert_eq!(ranked[5].rank, 6);
        assert_relative_eq!(ranked[5].win_pct, 0.0);
    }

    #[test]
    fn test_rank_is_per_conference_with_games_back() {
        let ranked = rank_standings(vec![
            standing("Thunder", "West", 31, 6, 0, 0),
            standing("Celtics", "East", 30, 8, 0, 0),
            standing("Knicks", "East", 25, 13, 0, 0),
            standing("Rockets", "West", 27, 11, 0, 0),
        ]);
        let east: Vec<_> = ranked.iter().filter(|r| r.entry.conference.as_deref() == Some("East")).collect();
        let west: Vec<_> = ranked.iter().filter(|r| r.entry.conference.as_deref() == Some("West")).collect();
        assert_eq!(east[0].entry.name, "Celtics");
        assert_eq!(west[0].rank, 1);
        assert_relative_eq!(east[0].games_back, 0.0);
        assert_relative_eq!(east[1].games_back, 5.0);
        assert_relative_eq!(west[1].games_back, 4.5);
        assert_relative_eq!(west[0].win_pct, 31.0 / 37.0);
    }
}
