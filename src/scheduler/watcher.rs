use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tokio::time::Instant;
use tracing::{error, info, warn};

use super::poll::{Armed, Phase, PollScheduler, PollSettings, TimerToken, WatchKey};
use crate::error::FetchError;
use crate::fetch::FetchCoordinator;
use crate::models::GameRecord;

#[derive(Debug, Clone)]
pub enum WatchCommand {
    Watch(WatchKey),
    Refresh,
    Stop,
}

/// Latest state of the watch loop, as served by `/api/live`.
#[derive(Debug, Clone, Serialize)]
pub struct WatchSnapshot {
    pub key: Option<WatchKey>,
    pub games: Vec<GameRecord>,
    pub phase: Phase,
    pub next_refresh_secs: Option<u64>,
    pub last_error: Option<String>,
    pub refreshes: u64,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Default for WatchSnapshot {
    fn default() -> Self {
        WatchSnapshot {
            key: None,
            games: Vec::new(),
            phase: Phase::Idle,
            next_refresh_secs: None,
            last_error: None,
            refreshes: 0,
            updated_at: None,
        }
    }
}

/// Sender side of a running watch loop.
#[derive(Clone)]
pub struct WatchHandle {
    tx: mpsc::Sender<WatchCommand>,
    snapshot: Arc<RwLock<WatchSnapshot>>,
}

impl WatchHandle {
    pub async fn send(&self, command: WatchCommand) -> anyhow::Result<()> {
        self.tx
            .send(command)
            .await
            .map_err(|_| anyhow::anyhow!("watch loop has stopped"))
    }

    pub async fn snapshot(&self) -> WatchSnapshot {
        self.snapshot.read().await.clone()
    }
}

/// Spawns the watch loop. It owns the `PollScheduler`, fetches through the
/// coordinator whenever the armed timer fires and publishes a snapshot after
/// every transition.
pub fn start_watcher(coordinator: FetchCoordinator, settings: PollSettings) -> WatchHandle {
    let (tx, mut rx) = mpsc::channel(32);
    let snapshot = Arc::new(RwLock::new(WatchSnapshot::default()));
    let shared = Arc::clone(&snapshot);

    tokio::spawn(async move {
        info!(
            "Watcher started (live every {:?}, retry after {:?})",
            settings.live_interval, settings.retry_delay
        );
        let mut scheduler = PollScheduler::new(settings);
        let mut timer: Option<(TimerToken, Instant)> = None;

        loop {
            tokio::select! {
                command = rx.recv() => {
                    let Some(command) = command else {
                        info!("Watch channel closed, watcher exiting");
                        break;
                    };
                    let previous = scheduler.key().cloned();
                    timer = match command {
                        WatchCommand::Watch(key) => Some(deadline(scheduler.watch(key))),
                        WatchCommand::Refresh => scheduler.refresh().map(deadline),
                        WatchCommand::Stop => {
                            scheduler.clear();
                            None
                        }
                    };
                    let key_changed = scheduler.key() != previous.as_ref();
                    publish(&shared, &scheduler, timer, |s| {
                        if key_changed {
                            s.games.clear();
                            s.last_error = None;
                        }
                    })
                    .await;
                }
                _ = wait(timer) => {
                    let Some((token, _)) = timer.take() else { continue };
                    let Some(key) = scheduler.fire(token) else { continue };
                    publish(&shared, &scheduler, None, |_| {}).await;

                    let outcome = load(&coordinator, &key).await;
                    let now = coordinator.clock().now();
                    timer = match &outcome {
                        Ok(games) => scheduler.on_result(games, now).map(deadline),
                        Err(e) => {
                            warn!("{} refresh failed, retrying: {}", key, e);
                            Some(deadline(scheduler.on_error()))
                        }
                    };
                    if let Some((_, at)) = timer {
                        info!("{}: next refresh in {:?}", key, at.saturating_duration_since(Instant::now()));
                    }
                    publish(&shared, &scheduler, timer, |s| {
                        s.refreshes += 1;
                        s.updated_at = Some(now);
                        match outcome {
                            Ok(games) => {
                                s.games = games;
                                s.last_error = None;
                            }
                            Err(e) => s.last_error = Some(e.to_string()),
                        }
                    })
                    .await;
                }
            }
        }
        error!("Watcher stopped; /api/live will no longer update");
    });

    WatchHandle { tx, snapshot }
}

fn deadline(armed: Armed) -> (TimerToken, Instant) {
    (armed.token, Instant::now() + armed.delay)
}

async fn wait(timer: Option<(TimerToken, Instant)>) {
    match timer {
        Some((_, at)) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

async fn load(coordinator: &FetchCoordinator, key: &WatchKey) -> Result<Vec<GameRecord>, FetchError> {
    match key {
        WatchKey::Scoreboard { date } => Ok(coordinator.scoreboard(*date).await?.value.games),
        WatchKey::Game { game_id } => Ok(vec![coordinator.box_score(game_id).await?.value.game]),
    }
}

async fn publish(
    shared: &RwLock<WatchSnapshot>,
    scheduler: &PollScheduler,
    timer: Option<(TimerToken, Instant)>,
    update: impl FnOnce(&mut WatchSnapshot),
) {
    let mut snapshot = shared.write().await;
    snapshot.key = scheduler.key().cloned();
    snapshot.phase = scheduler.phase();
    snapshot.next_refresh_secs = timer.map(|(_, at)| {
        at.saturating_duration_since(Instant::now())
            .as_secs_f64()
            .round() as u64
    });
    update(&mut snapshot);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheStore;
    use crate::clock::{Clock, ManualClock};
    use crate::fetch::{FetchSettings, TtlPolicy};
    use crate::normalize::games::fixtures::espn_event;
    use crate::upstream::fake::{FakeResponse, FakeUpstream};
    use crate::upstream::Endpoints;
    use chrono::{NaiveDate, TimeZone};
    use serde_json::json;
    use std::time::Duration;

    fn coordinator(upstream: Arc<FakeUpstream>) -> FetchCoordinator {
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 1, 6, 1, 0, 0).unwrap(),
        ));
        FetchCoordinator::new(
            CacheStore::new(Arc::clone(&clock)),
            upstream,
            Endpoints::espn_defaults().unwrap(),
            clock,
            FetchSettings {
                sub_fetch_timeout: Duration::from_secs(2),
                ttl: TtlPolicy::default(),
                season: 2024,
                season_start: NaiveDate::from_ymd_opt(2024, 10, 22).unwrap(),
            },
        )
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 5).unwrap()
    }

    /// Let the watcher task run its due timers and fetches.
    async fn settle() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_live_scoreboard_is_polled_on_short_interval() {
        let upstream = Arc::new(FakeUpstream::new());
        let endpoints = Endpoints::espn_defaults().unwrap();
        upstream.json(
            &endpoints.scoreboard(date()),
            json!({"events": [espn_event("403", "in", ("1", "Atlanta Hawks", "ATL", "51"), ("10", "Houston Rockets", "HOU", "49"))]}),
        );
        let handle = start_watcher(coordinator(upstream.clone()), PollSettings::default());

        handle.send(WatchCommand::Watch(WatchKey::Scoreboard { date: date() })).await.unwrap();
        settle().await;
        let snap = handle.snapshot().await;
        assert_eq!(snap.refreshes, 1);
        assert_eq!(snap.games.len(), 1);
        assert_eq!(snap.phase, Phase::Scheduled);
        assert_eq!(snap.next_refresh_secs, Some(30));

        tokio::time::sleep(Duration::from_secs(31)).await;
        settle().await;
        assert_eq!(handle.snapshot().await.refreshes, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_final_scoreboard_goes_idle() {
        let upstream = Arc::new(FakeUpstream::new());
        let endpoints = Endpoints::espn_defaults().unwrap();
        upstream.json(
            &endpoints.scoreboard(date()),
            json!({"events": [espn_event("401", "post", ("2", "Boston Celtics", "BOS", "110"), ("18", "New York Knicks", "NY", "100"))]}),
        );
        let handle = start_watcher(coordinator(upstream.clone()), PollSettings::default());
        handle.send(WatchCommand::Watch(WatchKey::Scoreboard { date: date() })).await.unwrap();
        settle().await;

        let snap = handle.snapshot().await;
        assert_eq!(snap.phase, Phase::Idle);
        assert_eq!(snap.next_refresh_secs, None);

        tokio::time::sleep(Duration::from_secs(3600)).await;
        assert_eq!(handle.snapshot().await.refreshes, 1);

        handle.send(WatchCommand::Refresh).await.unwrap();
        settle().await;
        let snap = handle.snapshot().await;
        assert_eq!(snap.refreshes, 2);
        assert!(snap.last_error.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_switching_key_drops_previous_games_and_error() {
        let upstream = Arc::new(FakeUpstream::new());
        let endpoints = Endpoints::espn_defaults().unwrap();
        upstream.json(
            &endpoints.scoreboard(date()),
            json!({"events": [espn_event("401", "post", ("2", "Boston Celtics", "BOS", "110"), ("18", "New York Knicks", "NY", "100"))]}),
        );
        let other = NaiveDate::from_ymd_opt(2025, 1, 4).unwrap();
        upstream.route(&endpoints.scoreboard(other), FakeResponse::Status(503));
        upstream.route(&endpoints.summary("402"), FakeResponse::Hang);
        let handle = start_watcher(coordinator(upstream.clone()), PollSettings::default());

        handle.send(WatchCommand::Watch(WatchKey::Scoreboard { date: date() })).await.unwrap();
        settle().await;
        assert_eq!(handle.snapshot().await.games.len(), 1);

        handle.send(WatchCommand::Watch(WatchKey::Scoreboard { date: other })).await.unwrap();
        settle().await;
        let snap = handle.snapshot().await;
        assert!(snap.games.is_empty());
        assert!(snap.last_error.is_some());

        let game = WatchKey::Game { game_id: "402".into() };
        handle.send(WatchCommand::Watch(game.clone())).await.unwrap();
        settle().await;
        // The box score fetch never completes; the snapshot must not carry
        // over anything from the previous date.
        let snap = handle.snapshot().await;
        assert_eq!(snap.key, Some(game));
        assert_eq!(snap.phase, Phase::Firing);
        assert!(snap.games.is_empty());
        assert!(snap.last_error.is_none());
        assert_eq!(snap.refreshes, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_retries_and_records_error() {
        let upstream = Arc::new(FakeUpstream::new());
        let endpoints = Endpoints::espn_defaults().unwrap();
        upstream.route(&endpoints.scoreboard(date()), FakeResponse::Status(503));
        let handle = start_watcher(coordinator(upstream.clone()), PollSettings::default());
        handle.send(WatchCommand::Watch(WatchKey::Scoreboard { date: date() })).await.unwrap();
        settle().await;

        let snap = handle.snapshot().await;
        assert!(snap.last_error.is_some());
        assert_eq!(snap.phase, Phase::Scheduled);
        assert_eq!(snap.next_refresh_secs, Some(30));

        tokio::time::sleep(Duration::from_secs(31)).await;
        settle().await;
        assert_eq!(upstream.calls(), 2);

        handle.send(WatchCommand::Stop).await.unwrap();
        settle().await;
        let snap = handle.snapshot().await;
        assert_eq!(snap.key, None);
        assert_eq!(snap.phase, Phase::Idle);
    }
}
