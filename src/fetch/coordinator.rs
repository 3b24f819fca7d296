//! Cache-first resource assembly.
//!
//! Every resource goes through the same pipeline: cache lookup, upstream
//! fetch (sub-fetches in parallel, each bounded), normalization, closed-data
//! classification, tier write. Errors are returned to the caller and never
//! cached.

use chrono::{DateTime, Days, NaiveDate, Utc};
use futures_util::stream::{self, StreamExt};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use super::classify::{box_score_is_closed, schedule_is_closed, season_is_closed};
use super::policy::{Placement, TtlPolicy};
use super::request::Request;
use crate::aggregate::{compute_standings, rank_standings, TeamDirectory};
use crate::cache::{CacheOrigin, CacheStore, Tier};
use crate::clock::Clock;
use crate::error::{FetchError, ShapeError};
use crate::models::{
    BoxScore, CanonicalValue, GameRecord, Leaders, PlayerProfile, ResourceKind, Schedule,
    StandingsTable, TeamProfile, TeamRecord,
};
use crate::normalize::fields::lookup;
use crate::normalize::{
    normalize_box_score, normalize_games, normalize_leaders, normalize_player,
    normalize_provider_standings, normalize_team_profile, normalize_teams, pending_ref,
    AthleteLink, PlayerPayload, TeamPayload,
};
use crate::upstream::{extract_embedded_json, Endpoints, Upstream, ESPN_STATE_MARKER};

/// Upper bound on BallDontLie pages per 7-day window.
const MAX_PAGES_PER_WINDOW: usize = 20;

/// Season windows loaded at once.
const WINDOW_CONCURRENCY: usize = 3;

#[derive(Debug, Clone)]
pub struct FetchSettings {
    /// Bound on each optional sub-fetch (player refs, team schedule/stats/roster)
    pub sub_fetch_timeout: Duration,
    pub ttl: TtlPolicy,
    /// Season served when the caller does not name one
    pub season: i32,
    /// First day of `season`; other seasons start on October 1st
    pub season_start: NaiveDate,
}

/// A value plus where it was served from and which tier now holds it.
#[derive(Debug, Clone, PartialEq)]
pub struct Fetched<T> {
    pub value: T,
    pub origin: CacheOrigin,
    pub tier: Tier,
}

impl Fetched<CanonicalValue> {
    fn narrow<T>(
        self,
        resource: ResourceKind,
        pick: impl FnOnce(CanonicalValue) -> Option<T>,
    ) -> Result<Fetched<T>, FetchError> {
        let Fetched { value, origin, tier } = self;
        match pick(value) {
            Some(value) => Ok(Fetched { value, origin, tier }),
            None => Err(FetchError::UpstreamShapeMismatch {
                resource,
                field: "cached value kind".to_string(),
            }),
        }
    }
}

#[derive(Clone)]
pub struct FetchCoordinator {
    cache: CacheStore<CanonicalValue>,
    upstream: Arc<dyn Upstream>,
    endpoints: Arc<Endpoints>,
    clock: Arc<dyn Clock>,
    directory: Arc<TeamDirectory>,
    settings: FetchSettings,
}

impl FetchCoordinator {
    pub fn new(
        cache: CacheStore<CanonicalValue>,
        upstream: Arc<dyn Upstream>,
        endpoints: Endpoints,
        clock: Arc<dyn Clock>,
        settings: FetchSettings,
    ) -> Self {
        FetchCoordinator {
            cache,
            upstream,
            endpoints: Arc::new(endpoints),
            clock,
            directory: Arc::new(TeamDirectory::nba()),
            settings,
        }
    }

    pub fn cache(&self) -> &CacheStore<CanonicalValue> {
        &self.cache
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn default_season(&self) -> i32 {
        self.settings.season
    }

    /// Serve `request` with the current time as the reference time.
    pub async fn fetch(&self, request: &Request) -> Result<Fetched<CanonicalValue>, FetchError> {
        self.fetch_at(request, self.clock.now()).await
    }

    /// Serve `request`, classifying freshly fetched data against `reference`.
    pub async fn fetch_at(
        &self,
        request: &Request,
        reference: DateTime<Utc>,
    ) -> Result<Fetched<CanonicalValue>, FetchError> {
        let key = request.cache_key();
        if let Some(hit) = self.cache.get(&key).await {
            return Ok(Fetched {
                value: hit.value,
                origin: hit.tier.into(),
                tier: hit.tier,
            });
        }

        let resource = request.resource();
        let (value, closed) = self
            .assemble(request, reference)
            .await
            .map_err(|e| match request.id() {
                Some(id) => e.not_found_as(id),
                None => e,
            })?;

        let tier = match self.settings.ttl.placement(closed, resource, &value) {
            Placement::Permanent => {
                info!("{} is closed, storing permanently", key);
                self.cache
                    .put(key, value.clone(), Tier::Permanent, Duration::ZERO)
                    .await;
                Tier::Permanent
            }
            Placement::Volatile(ttl) => {
                // A concurrent request may already have closed this key.
                if self.cache.is_permanent(&key).await {
                    debug!("{} already permanent, skipping volatile write", key);
                    Tier::Permanent
                } else {
                    debug!("{} stored volatile for {:?}", key, ttl);
                    self.cache.put(key, value.clone(), Tier::Volatile, ttl).await;
                    Tier::Volatile
                }
            }
        };

        Ok(Fetched {
            value,
            origin: CacheOrigin::Upstream,
            tier,
        })
    }

    pub async fn scoreboard(&self, date: NaiveDate) -> Result<Fetched<Schedule>, FetchError> {
        self.fetch(&Request::Scoreboard { date })
            .await?
            .narrow(ResourceKind::Scoreboard, |v| match v {
                CanonicalValue::Schedule(s) => Some(s),
                _ => None,
            })
    }

    pub async fn box_score(&self, game_id: &str) -> Result<Fetched<BoxScore>, FetchError> {
        let request = Request::BoxScore {
            game_id: game_id.to_string(),
        };
        self.fetch(&request)
            .await?
            .narrow(ResourceKind::BoxScore, |v| match v {
                CanonicalValue::BoxScore(b) => Some(*b),
                _ => None,
            })
    }

    pub async fn player(&self, player_id: &str) -> Result<Fetched<PlayerProfile>, FetchError> {
        let request = Request::Player {
            player_id: player_id.to_string(),
        };
        self.fetch(&request)
            .await?
            .narrow(ResourceKind::Player, |v| match v {
                CanonicalValue::Player(p) => Some(*p),
                _ => None,
            })
    }

    pub async fn team(&self, team_id: &str) -> Result<Fetched<TeamProfile>, FetchError> {
        let request = Request::Team {
            team_id: team_id.to_string(),
        };
        self.fetch(&request)
            .await?
            .narrow(ResourceKind::Team, |v| match v {
                CanonicalValue::Team(t) => Some(*t),
                _ => None,
            })
    }

    pub async fn teams(&self) -> Result<Fetched<Vec<TeamRecord>>, FetchError> {
        self.fetch(&Request::Teams)
            .await?
            .narrow(ResourceKind::Teams, |v| match v {
                CanonicalValue::Teams(t) => Some(t),
                _ => None,
            })
    }

    pub async fn provider_standings(&self) -> Result<Fetched<StandingsTable>, FetchError> {
        self.fetch(&Request::ProviderStandings)
            .await?
            .narrow(ResourceKind::ProviderStandings, |v| match v {
                CanonicalValue::Standings(s) => Some(s),
                _ => None,
            })
    }

    pub async fn season_standings(&self, season: i32) -> Result<Fetched<StandingsTable>, FetchError> {
        self.fetch(&Request::SeasonStandings { season })
            .await?
            .narrow(ResourceKind::SeasonStandings, |v| match v {
                CanonicalValue::Standings(s) => Some(s),
                _ => None,
            })
    }

    pub async fn leaders(&self) -> Result<Fetched<Leaders>, FetchError> {
        self.fetch(&Request::Leaders)
            .await?
            .narrow(ResourceKind::Leaders, |v| match v {
                CanonicalValue::Leaders(l) => Some(l),
                _ => None,
            })
    }

    /// Fetch and normalize on a cache miss. The bool is "closed".
    async fn assemble(
        &self,
        request: &Request,
        reference: DateTime<Utc>,
    ) -> Result<(CanonicalValue, bool), FetchError> {
        match request {
            Request::Scoreboard { date } => {
                let schedule = self.load_scoreboard(*date).await?;
                let closed = schedule_is_closed(&schedule, reference);
                Ok((CanonicalValue::Schedule(schedule), closed))
            }
            Request::BoxScore { game_id } => {
                let box_score = self.load_box_score(game_id).await?;
                let closed = box_score_is_closed(&box_score, reference);
                Ok((CanonicalValue::BoxScore(Box::new(box_score)), closed))
            }
            Request::Player { player_id } => {
                let profile = self.load_player(player_id).await?;
                Ok((CanonicalValue::Player(Box::new(profile)), false))
            }
            Request::Team { team_id } => {
                let profile = self.load_team(team_id).await?;
                Ok((CanonicalValue::Team(Box::new(profile)), false))
            }
            Request::Teams => {
                let raw = self.get(ResourceKind::Teams, &self.endpoints.teams()).await?;
                let teams = shaped(ResourceKind::Teams, normalize_teams(&raw))?;
                let directory = TeamDirectory::from_teams(teams);
                debug!("teams: {} entries", directory.len());
                Ok((CanonicalValue::Teams(directory.teams().to_vec()), false))
            }
            Request::ProviderStandings => {
                let resource = ResourceKind::ProviderStandings;
                let raw = self.get(resource, &self.endpoints.standings()).await?;
                let table = shaped(resource, normalize_provider_standings(&raw, &self.directory))?;
                Ok((CanonicalValue::Standings(table), false))
            }
            Request::SeasonStandings { season } => {
                let (table, closed) = self.load_season_standings(*season, reference).await?;
                Ok((CanonicalValue::Standings(table), closed))
            }
            Request::Leaders => Ok((CanonicalValue::Leaders(self.load_leaders().await?), false)),
        }
    }

    async fn get(&self, resource: ResourceKind, url: &Url) -> Result<Value, FetchError> {
        self.upstream.get_json(resource, url).await
    }

    /// Optional sub-resource: any failure or timeout degrades to `None`.
    async fn sub_fetch(&self, resource: ResourceKind, url: Option<Url>) -> Option<Value> {
        let url = url?;
        let timeout = self.settings.sub_fetch_timeout;
        match tokio::time::timeout(timeout, self.upstream.get_json(resource, &url)).await {
            Ok(Ok(value)) => Some(value),
            Ok(Err(e)) => {
                warn!("{} sub-fetch failed, continuing without it: {}", resource, e);
                None
            }
            Err(_) => {
                warn!("{} sub-fetch {} timed out after {:?}", resource, url, timeout);
                None
            }
        }
    }

    async fn load_scoreboard(&self, date: NaiveDate) -> Result<Schedule, FetchError> {
        let resource = ResourceKind::Scoreboard;
        let raw = self.get(resource, &self.endpoints.scoreboard(date)).await?;
        let games = shaped(resource, normalize_games(&raw))?;
        debug!("scoreboard {}: {} games", date, games.len());
        Ok(Schedule { date, games })
    }

    async fn load_box_score(&self, game_id: &str) -> Result<BoxScore, FetchError> {
        let resource = ResourceKind::BoxScore;
        let raw = self.get(resource, &self.endpoints.summary(game_id)).await?;
        shaped(resource, normalize_box_score(&raw))
    }

    async fn load_player(&self, player_id: &str) -> Result<PlayerProfile, FetchError> {
        let resource = ResourceKind::Player;
        let athlete = self.get(resource, &self.endpoints.athlete(player_id)).await?;
        let link = |l: AthleteLink| pending_ref(&athlete, l).and_then(|r| Url::parse(r).ok());

        let (team, statistics, position) = tokio::join!(
            self.sub_fetch(resource, link(AthleteLink::Team)),
            self.sub_fetch(resource, link(AthleteLink::Statistics)),
            self.sub_fetch(resource, link(AthleteLink::Position)),
        );

        shaped(
            resource,
            normalize_player(PlayerPayload {
                athlete: &athlete,
                team: team.as_ref(),
                statistics: statistics.as_ref(),
                position: position.as_ref(),
            }),
        )
    }

    async fn load_team(&self, team_id: &str) -> Result<TeamProfile, FetchError> {
        let resource = ResourceKind::Team;
        let team_url = self.endpoints.team(team_id);
        let (info, schedule, statistics, roster) = tokio::join!(
            self.get(resource, &team_url),
            self.sub_fetch(resource, Some(self.endpoints.team_schedule(team_id))),
            self.sub_fetch(resource, Some(self.endpoints.team_statistics(team_id))),
            self.sub_fetch(resource, Some(self.endpoints.team_roster(team_id))),
        );
        let info = info?;

        shaped(
            resource,
            normalize_team_profile(TeamPayload {
                info: &info,
                schedule: schedule.as_ref(),
                statistics: statistics.as_ref(),
                roster: roster.as_ref(),
            }),
        )
    }

    /// JSON endpoint first; the stats page's embedded blob when that fails or
    /// comes back without any recognised category.
    async fn load_leaders(&self) -> Result<Leaders, FetchError> {
        let resource = ResourceKind::Leaders;
        let primary = match self.get(resource, &self.endpoints.leaders()).await {
            Ok(raw) => shaped(resource, normalize_leaders(&raw)),
            Err(e) => Err(e),
        };
        if let Ok(leaders) = &primary {
            if !leaders.categories.is_empty() {
                return primary;
            }
        }

        info!("leaders endpoint unusable, falling back to the stats page");
        match self.load_leaders_page().await {
            Ok(leaders) => Ok(leaders),
            Err(e) => {
                warn!("stats page fallback failed: {}", e);
                primary
            }
        }
    }

    async fn load_leaders_page(&self) -> Result<Leaders, FetchError> {
        let resource = ResourceKind::Leaders;
        let html = self
            .upstream
            .get_text(resource, &self.endpoints.leaders_page())
            .await?;
        let blob = shaped(resource, extract_embedded_json(&html, ESPN_STATE_MARKER))?;
        shaped(resource, normalize_leaders(&blob))
    }

    /// First day, last day of the regular season + playoffs for `season`.
    fn season_bounds(&self, season: i32) -> Option<(NaiveDate, NaiveDate)> {
        let start = if season == self.settings.season {
            self.settings.season_start
        } else {
            NaiveDate::from_ymd_opt(season, 10, 1)?
        };
        let end = NaiveDate::from_ymd_opt(season + 1, 6, 30)?;
        Some((start, end))
    }

    /// Standings derived from every game of the season so far, loaded in
    /// 7-day windows. A failed window is logged and skipped; the result then
    /// stays volatile. If every window fails the first error is returned.
    async fn load_season_standings(
        &self,
        season: i32,
        reference: DateTime<Utc>,
    ) -> Result<(StandingsTable, bool), FetchError> {
        let resource = ResourceKind::SeasonStandings;
        let (start, season_end) = self.season_bounds(season).ok_or_else(|| FetchError::NotFound {
            resource,
            id: season.to_string(),
        })?;
        let end = season_end.min(reference.date_naive());

        let windows = season_windows(start, end);
        let results: Vec<_> = stream::iter(windows.iter().copied())
            .map(|(from, to)| async move { (from, to, self.load_game_window(from, to).await) })
            .buffered(WINDOW_CONCURRENCY)
            .collect()
            .await;

        let mut games: Vec<GameRecord> = Vec::new();
        let mut failed = 0usize;
        let mut first_error = None;
        for (from, to, result) in results {
            match result {
                Ok(mut batch) => games.append(&mut batch),
                Err(e) => {
                    warn!("season {} window {}..{} failed: {}", season, from, to, e);
                    failed += 1;
                    first_error.get_or_insert(e);
                }
            }
        }
        if let Some(e) = first_error.filter(|_| failed == windows.len()) {
            return Err(e);
        }

        info!(
            "season {}: {} games over {} windows ({} failed)",
            season,
            games.len(),
            windows.len(),
            failed
        );
        let entries = compute_standings(&games, &self.directory);
        let table = StandingsTable {
            season: format!("{}-{:02}", season, (season + 1).rem_euclid(100)),
            entries: rank_standings(entries),
        };
        let closed = season_is_closed(&games, season_end, failed, reference);
        Ok((table, closed))
    }

    /// All pages of BallDontLie games for one window, following `next_cursor`.
    async fn load_game_window(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<GameRecord>, FetchError> {
        let resource = ResourceKind::SeasonStandings;
        let mut games = Vec::new();
        let mut cursor = None;
        for _ in 0..MAX_PAGES_PER_WINDOW {
            let url = self.endpoints.balldontlie_games(start, end, cursor);
            let raw = self.get(resource, &url).await?;
            games.extend(shaped(resource, normalize_games(&raw))?);
            cursor = lookup(&raw, &["meta", "next_cursor"]).and_then(Value::as_u64);
            if cursor.is_none() {
                return Ok(games);
            }
        }
        warn!("window {}..{} exceeded {} pages, truncating", start, end, MAX_PAGES_PER_WINDOW);
        Ok(games)
    }
}

/// Consecutive 7-day windows covering `start..=end`.
fn season_windows(start: NaiveDate, end: NaiveDate) -> Vec<(NaiveDate, NaiveDate)> {
    let mut windows = Vec::new();
    let mut from = start;
    while from <= end {
        let to = from.checked_add_days(Days::new(6)).map_or(end, |d| d.min(end));
        windows.push((from, to));
        match to.succ_opt() {
            Some(next) => from = next,
            None => break,
        }
    }
    windows
}

fn shaped<T>(resource: ResourceKind, result: Result<T, ShapeError>) -> Result<T, FetchError> {
    result.map_err(|e| {
        warn!("{} payload shape mismatch: {}", resource, e);
        e.into_fetch(resource)
    })
}
