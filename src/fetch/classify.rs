//! "Can this data still change?"
//!
//! Data is closed only when every in-scope game is settled *and* the query's
//! time scope ends strictly before the reference day (UTC date of the
//! reference time). Closed data goes to the permanent tier.

use chrono::{DateTime, NaiveDate, Utc};

use crate::models::{BoxScore, GameRecord, Schedule};

fn before_reference_day(day: NaiveDate, reference: DateTime<Utc>) -> bool {
    day < reference.date_naive()
}

fn all_settled(games: &[GameRecord]) -> bool {
    games.iter().all(GameRecord::is_settled)
}

/// A past date with no games is closed too: nothing can be added to it.
pub fn schedule_is_closed(schedule: &Schedule, reference: DateTime<Utc>) -> bool {
    before_reference_day(schedule.date, reference) && all_settled(&schedule.games)
}

/// Without a start time the game's day is unknown, so it stays volatile.
pub fn box_score_is_closed(box_score: &BoxScore, reference: DateTime<Utc>) -> bool {
    box_score.game.is_settled()
        && box_score
            .game
            .start_time
            .is_some_and(|start| before_reference_day(start.date_naive(), reference))
}

/// A season window is closed once it has ended, every game in it is settled,
/// and no part of it failed to load.
pub fn season_is_closed(
    games: &[GameRecord],
    window_end: NaiveDate,
    failed_windows: usize,
    reference: DateTime<Utc>,
) -> bool {
    failed_windows == 0 && before_reference_day(window_end, reference) && all_settled(games)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::games::fixtures::espn_event;
    use crate::normalize::games::normalize_game;
    use chrono::TimeZone;

    fn game(state: &str) -> GameRecord {
        normalize_game(&espn_event(
            "401",
            state,
            ("2", "Boston Celtics", "BOS", "110"),
            ("18", "New York Knicks", "NY", "100"),
        ))
        .unwrap()
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, d).unwrap()
    }

    fn at(d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, d, h, 0, 0).unwrap()
    }

    #[test]
    fn test_past_all_final_is_closed() {
        let s = Schedule { date: day(5), games: vec![game("post"), game("post")] };
        assert!(schedule_is_closed(&s, at(6, 0)));
    }

    #[test]
    fn test_same_day_is_never_closed() {
        let s = Schedule { date: day(5), games: vec![game("post")] };
        assert!(!schedule_is_closed(&s, at(5, 23)));
    }

    #[test]
    fn test_any_unsettled_game_keeps_it_open() {
        let s = Schedule { date: day(5), games: vec![game("post"), game("pre")] };
        assert!(!schedule_is_closed(&s, at(10, 0)));
        let mut missing_score = game("post");
        missing_score.away_score = None;
        let s = Schedule { date: day(5), games: vec![missing_score] };
        assert!(!schedule_is_closed(&s, at(10, 0)));
    }

    #[test]
    fn test_empty_past_date_is_closed_future_is_not() {
        assert!(schedule_is_closed(&Schedule { date: day(5), games: vec![] }, at(6, 0)));
        assert!(!schedule_is_closed(&Schedule { date: day(7), games: vec![] }, at(6, 0)));
    }

    #[test]
    fn test_box_score_uses_start_day() {
        let summary = crate::normalize::boxscore::fixtures::summary();
        let bs = crate::normalize::normalize_box_score(&summary).unwrap();
        // Fixture tips off 2025-01-06 00:30 UTC.
        assert!(!box_score_is_closed(&bs, at(6, 12)));
        assert!(box_score_is_closed(&bs, at(7, 0)));

        let mut no_start = bs.clone();
        no_start.game.start_time = None;
        assert!(!box_score_is_closed(&no_start, at(20, 0)));
    }

    #[test]
    fn test_season_closed_needs_complete_load() {
        let games = vec![game("post")];
        assert!(season_is_closed(&games, day(5), 0, at(6, 0)));
        assert!(!season_is_closed(&games, day(5), 1, at(6, 0)));
        assert!(!season_is_closed(&games, day(6), 0, at(6, 0)));
    }
}
