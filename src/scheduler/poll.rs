//! Adaptive refresh timing for one watched key.
//!
//! `idle → scheduled → firing → (scheduled | idle)`. At most one timer is
//! pending; every arm bumps a generation counter so a token from an earlier
//! arm can never fire.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, info};

use crate::models::{GameRecord, GameState};

/// What the dashboard is currently looking at.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WatchKey {
    Scoreboard { date: NaiveDate },
    Game { game_id: String },
}

impl fmt::Display for WatchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WatchKey::Scoreboard { date } => write!(f, "scoreboard {}", date),
            WatchKey::Game { game_id } => write!(f, "game {}", game_id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Idle,
    Scheduled,
    Firing,
}

/// Identifies one armed timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerToken(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Armed {
    pub token: TimerToken,
    pub delay: Duration,
}

#[derive(Debug, Clone)]
pub struct PollSettings {
    /// Delay while any game is live
    pub live_interval: Duration,
    /// Added to the earliest upcoming start time
    pub start_buffer: Duration,
    /// Ceiling for the delay before an upcoming game
    pub max_delay: Duration,
    /// Delay after a failed fetch
    pub retry_delay: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        PollSettings {
            live_interval: Duration::from_secs(30),
            start_buffer: Duration::from_secs(5 * 60),
            max_delay: Duration::from_secs(6 * 60 * 60),
            retry_delay: Duration::from_secs(30),
        }
    }
}

impl PollSettings {
    /// Delay until the next refresh for `games`, or `None` when nothing can
    /// change any more (everything final or no games).
    ///
    /// A scheduled game past its listed start (or without one) is about to
    /// tip off, so it is polled like a live one.
    pub fn next_delay(&self, games: &[GameRecord], now: DateTime<Utc>) -> Option<Duration> {
        if games.iter().any(|g| g.state == GameState::Live) {
            return Some(self.live_interval);
        }
        let mut earliest: Option<DateTime<Utc>> = None;
        for game in games.iter().filter(|g| g.state == GameState::Scheduled) {
            match game.start_time {
                Some(start) if start > now => {
                    earliest = Some(earliest.map_or(start, |e| e.min(start)));
                }
                _ => return Some(self.live_interval),
            }
        }
        earliest
            .and_then(|start| (start - now).to_std().ok())
            .map(|until| (until + self.start_buffer).min(self.max_delay))
    }
}

#[derive(Debug)]
pub struct PollScheduler {
    settings: PollSettings,
    key: Option<WatchKey>,
    phase: Phase,
    pending: Option<TimerToken>,
    generation: u64,
}

impl PollScheduler {
    pub fn new(settings: PollSettings) -> Self {
        PollScheduler {
            settings,
            key: None,
            phase: Phase::Idle,
            pending: None,
            generation: 0,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn key(&self) -> Option<&WatchKey> {
        self.key.as_ref()
    }

    /// Switch to `key`, dropping any pending timer, and fire immediately.
    pub fn watch(&mut self, key: WatchKey) -> Armed {
        if self.key.as_ref() != Some(&key) {
            info!("watching {}", key);
        }
        self.cancel();
        self.key = Some(key);
        self.arm(Duration::ZERO)
    }

    /// Immediate refresh of the current key, whatever the phase.
    pub fn refresh(&mut self) -> Option<Armed> {
        self.key.as_ref()?;
        Some(self.arm(Duration::ZERO))
    }

    /// Claim the timer. Returns the key to fetch, or `None` for a stale token.
    pub fn fire(&mut self, token: TimerToken) -> Option<WatchKey> {
        if self.pending != Some(token) {
            debug!("ignoring stale timer {:?}", token);
            return None;
        }
        self.pending = None;
        self.phase = Phase::Firing;
        self.key.clone()
    }

    /// Decide the next timer from a fresh game set.
    pub fn on_result(&mut self, games: &[GameRecord], now: DateTime<Utc>) -> Option<Armed> {
        match self.settings.next_delay(games, now) {
            Some(delay) => Some(self.arm(delay)),
            None => {
                if let Some(key) = &self.key {
                    info!("{}: nothing left to update, going idle", key);
                }
                self.cancel();
                None
            }
        }
    }

    /// A failed fetch is treated as "still live": retry after the fixed delay.
    pub fn on_error(&mut self) -> Armed {
        self.arm(self.settings.retry_delay)
    }

    /// Drop the pending timer. Safe to call at any time, any number of times.
    pub fn cancel(&mut self) {
        self.pending = None;
        self.phase = Phase::Idle;
    }

    /// Stop watching altogether.
    pub fn clear(&mut self) {
        self.cancel();
        self.key = None;
    }

    fn arm(&mut self, delay: Duration) -> Armed {
        self.generation += 1;
        let token = TimerToken(self.generation);
        self.pending = Some(token);
        self.phase = Phase::Scheduled;
        Armed { token, delay }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::games::fixtures::espn_event;
    use crate::normalize::games::normalize_game;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 5, 22, 0, 0).unwrap()
    }

    fn game(id: &str, state: &str, start: Option<DateTime<Utc>>) -> GameRecord {
        let mut g = normalize_game(&espn_event(
            id,
            state,
            ("2", "Boston Celtics", "BOS", "50"),
            ("18", "New York Knicks", "NY", "48"),
        ))
        .unwrap();
        g.start_time = start;
        g
    }

    fn key() -> WatchKey {
        WatchKey::Scoreboard {
            date: NaiveDate::from_ymd_opt(2025, 1, 5).unwrap(),
        }
    }

    #[test]
    fn test_live_game_wins_over_upcoming_start() {
        let settings = PollSettings::default();
        let games = vec![
            game("1", "in", None),
            game("2", "pre", Some(now() + chrono::Duration::hours(2))),
        ];
        assert_eq!(settings.next_delay(&games, now()), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_upcoming_start_plus_buffer_capped() {
        let settings = PollSettings::default();
        let games = vec![
            game("1", "pre", Some(now() + chrono::Duration::hours(3))),
            game("2", "pre", Some(now() + chrono::Duration::hours(2))),
            game("3", "post", None),
        ];
        assert_eq!(
            settings.next_delay(&games, now()),
            Some(Duration::from_secs(2 * 3600 + 300))
        );

        let far = vec![game("4", "pre", Some(now() + chrono::Duration::days(3)))];
        assert_eq!(settings.next_delay(&far, now()), Some(settings.max_delay));
    }

    #[test]
    fn test_nothing_to_wait_for() {
        let settings = PollSettings::default();
        assert_eq!(settings.next_delay(&[], now()), None);
        assert_eq!(settings.next_delay(&[game("1", "post", None)], now()), None);
    }

    #[test]
    fn test_late_tip_off_keeps_polling() {
        let settings = PollSettings::default();
        // Listed start already passed but the game still reports `pre`.
        let late = vec![
            game("1", "post", None),
            game("2", "pre", Some(now() - chrono::Duration::minutes(6))),
            game("3", "pre", Some(now() + chrono::Duration::hours(3))),
        ];
        assert_eq!(settings.next_delay(&late, now()), Some(settings.live_interval));

        let unlisted = vec![game("4", "pre", None)];
        assert_eq!(settings.next_delay(&unlisted, now()), Some(settings.live_interval));

        let mut s = PollScheduler::new(settings);
        let armed = s.watch(key());
        s.fire(armed.token);
        let next = s.on_result(&late, now());
        assert_eq!(next.map(|a| a.delay), Some(Duration::from_secs(30)));
        assert_eq!(s.phase(), Phase::Scheduled);
    }

    #[test]
    fn test_all_final_goes_idle_and_refresh_still_works() {
        let mut s = PollScheduler::new(PollSettings::default());
        let armed = s.watch(key());
        assert_eq!(armed.delay, Duration::ZERO);
        assert_eq!(s.fire(armed.token), Some(key()));
        assert_eq!(s.phase(), Phase::Firing);

        assert_eq!(s.on_result(&[game("1", "post", None)], now()), None);
        assert_eq!(s.phase(), Phase::Idle);

        let again = s.refresh().unwrap();
        assert_eq!(s.fire(again.token), Some(key()));
    }

    #[test]
    fn test_rearm_invalidates_previous_token() {
        let mut s = PollScheduler::new(PollSettings::default());
        let first = s.watch(key());
        let second = s.refresh().unwrap();
        assert_ne!(first.token, second.token);
        assert_eq!(s.fire(first.token), None);
        assert_eq!(s.phase(), Phase::Scheduled);
        assert_eq!(s.fire(second.token), Some(key()));
        // Already fired.
        assert_eq!(s.fire(second.token), None);
    }

    #[test]
    fn test_changing_key_cancels_pending_timer() {
        let mut s = PollScheduler::new(PollSettings::default());
        let old = s.watch(key());
        let game_key = WatchKey::Game {
            game_id: "401".into(),
        };
        let new = s.watch(game_key.clone());
        assert_eq!(s.fire(old.token), None);
        assert_eq!(s.fire(new.token), Some(game_key));
    }

    #[test]
    fn test_error_retries_instead_of_idling() {
        let mut s = PollScheduler::new(PollSettings::default());
        let armed = s.watch(key());
        s.fire(armed.token);
        let retry = s.on_error();
        assert_eq!(retry.delay, Duration::from_secs(30));
        assert_eq!(s.phase(), Phase::Scheduled);
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let mut s = PollScheduler::new(PollSettings::default());
        s.cancel();
        let armed = s.watch(key());
        s.cancel();
        s.cancel();
        assert_eq!(s.phase(), Phase::Idle);
        assert_eq!(s.fire(armed.token), None);
        assert_eq!(s.key(), Some(&key()));

        s.clear();
        assert_eq!(s.key(), None);
        assert_eq!(s.refresh(), None);
    }
}
