use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::warn;

use crate::cache::{CacheOrigin, Tier};
use crate::error::FetchError;
use crate::fetch::{FetchCoordinator, Fetched};
use crate::models::ResourceKind;
use crate::scheduler::{WatchCommand, WatchHandle, WatchKey};

#[derive(Clone)]
pub struct AppState {
    pub coordinator: FetchCoordinator,
    pub watcher: WatchHandle,
}

/// Build the Axum router for the data API.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/games", get(games_handler))
        .route("/api/scrape-games", get(games_handler))
        .route("/api/game-details", get(game_details_handler))
        .route("/api/player-details", get(player_details_handler))
        .route("/api/team-details", get(team_details_handler))
        .route("/api/teams", get(teams_handler))
        .route("/api/standings", get(standings_handler))
        .route("/api/scrape-standings", get(season_standings_handler))
        .route("/api/leaders", get(leaders_handler))
        .route("/api/live", get(live_handler))
        .route("/api/watch", post(watch_handler).delete(unwatch_handler))
        .route("/api/watch/refresh", post(refresh_handler))
        .route("/api/cache", get(cache_handler))
        .layer(CorsLayer::permissive())
        .with_state(Arc::new(state))
}

/// Errors as the dashboard sees them: a status code and `{error, message}`.
#[derive(Debug)]
pub enum ApiError {
    Fetch(FetchError),
    BadRequest(String),
    WatcherGone(String),
}

impl From<FetchError> for ApiError {
    fn from(e: FetchError) -> Self {
        ApiError::Fetch(e)
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, message) = match self {
            ApiError::Fetch(e) => {
                let (status, kind) = match &e {
                    FetchError::NotFound { .. } => (StatusCode::NOT_FOUND, "not_found"),
                    FetchError::UpstreamShapeMismatch { .. } => {
                        (StatusCode::BAD_GATEWAY, "upstream_shape_mismatch")
                    }
                    FetchError::UpstreamUnavailable { status: Some(_), .. } => {
                        (StatusCode::BAD_GATEWAY, "upstream_unavailable")
                    }
                    FetchError::UpstreamUnavailable { status: None, .. } => {
                        (StatusCode::SERVICE_UNAVAILABLE, "upstream_unavailable")
                    }
                };
                warn!("{} request failed: {}", e.resource(), e);
                (status, kind, e.to_string())
            }
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, "bad_request", message),
            ApiError::WatcherGone(message) => {
                (StatusCode::SERVICE_UNAVAILABLE, "watcher_unavailable", message)
            }
        };
        (status, Json(ErrorBody { error, message })).into_response()
    }
}

#[derive(Serialize)]
struct Meta {
    resource: ResourceKind,
    origin: CacheOrigin,
    tier: Tier,
}

#[derive(Serialize)]
struct Envelope<T> {
    data: T,
    meta: Meta,
}

/// `{data, meta}` body plus `x-cache-*` headers naming where the value came from.
fn envelope<T: Serialize>(resource: ResourceKind, fetched: Fetched<T>) -> Response {
    let headers = [
        ("x-cache-tier", fetched.tier.as_str()),
        ("x-cache-origin", fetched.origin.as_str()),
    ];
    let body = Envelope {
        data: fetched.value,
        meta: Meta {
            resource,
            origin: fetched.origin,
            tier: fetched.tier,
        },
    };
    (headers, Json(body)).into_response()
}

#[derive(Debug, Default, Deserialize)]
pub struct ResourceQuery {
    date: Option<String>,
    #[serde(rename = "gameId")]
    game_id: Option<String>,
    #[serde(rename = "playerId")]
    player_id: Option<String>,
    #[serde(rename = "teamId")]
    team_id: Option<String>,
    season: Option<String>,
}

/// Accepts `2025-01-05` or `20250105`.
fn parse_date(raw: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y%m%d"))
        .map_err(|_| ApiError::BadRequest(format!("invalid date `{raw}`, expected YYYY-MM-DD")))
}

fn required<'a>(value: &'a Option<String>, name: &str) -> Result<&'a str, ApiError> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ApiError::BadRequest(format!("{name} is required"))),
    }
}

impl ResourceQuery {
    /// Requested date, or today (UTC) when omitted.
    fn date_or_today(&self, state: &AppState) -> Result<NaiveDate, ApiError> {
        match self.date.as_deref().map(str::trim).filter(|d| !d.is_empty()) {
            Some(raw) => parse_date(raw),
            None => Ok(state.coordinator.clock().now().date_naive()),
        }
    }

    /// `2024` or `2024-25`; defaults to the configured season.
    fn season(&self, state: &AppState) -> Result<i32, ApiError> {
        let Some(raw) = self.season.as_deref().map(str::trim).filter(|s| !s.is_empty()) else {
            return Ok(state.coordinator.default_season());
        };
        raw.split('-')
            .next()
            .and_then(|year| year.parse::<i32>().ok())
            .filter(|year| (1946..=2100).contains(year))
            .ok_or_else(|| ApiError::BadRequest(format!("invalid season `{raw}`")))
    }
}

/// GET /api/games?date=YYYY-MM-DD
async fn games_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ResourceQuery>,
) -> Result<Response, ApiError> {
    let date = query.date_or_today(&state)?;
    let fetched = state.coordinator.scoreboard(date).await?;
    Ok(envelope(ResourceKind::Scoreboard, fetched))
}

/// GET /api/game-details?gameId=...
async fn game_details_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ResourceQuery>,
) -> Result<Response, ApiError> {
    let game_id = required(&query.game_id, "gameId")?;
    let fetched = state.coordinator.box_score(game_id).await?;
    Ok(envelope(ResourceKind::BoxScore, fetched))
}

/// GET /api/player-details?playerId=...
async fn player_details_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ResourceQuery>,
) -> Result<Response, ApiError> {
    let player_id = required(&query.player_id, "playerId")?;
    let fetched = state.coordinator.player(player_id).await?;
    Ok(envelope(ResourceKind::Player, fetched))
}

/// GET /api/team-details?teamId=...
async fn team_details_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ResourceQuery>,
) -> Result<Response, ApiError> {
    let team_id = required(&query.team_id, "teamId")?;
    let fetched = state.coordinator.team(team_id).await?;
    Ok(envelope(ResourceKind::Team, fetched))
}

/// GET /api/teams
async fn teams_handler(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let fetched = state.coordinator.teams().await?;
    Ok(envelope(ResourceKind::Teams, fetched))
}

/// GET /api/standings (provider table)
async fn standings_handler(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let fetched = state.coordinator.provider_standings().await?;
    Ok(envelope(ResourceKind::ProviderStandings, fetched))
}

/// GET /api/scrape-standings?season=2024 (derived from game results)
async fn season_standings_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ResourceQuery>,
) -> Result<Response, ApiError> {
    let season = query.season(&state)?;
    let fetched = state.coordinator.season_standings(season).await?;
    Ok(envelope(ResourceKind::SeasonStandings, fetched))
}

/// GET /api/leaders
async fn leaders_handler(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let fetched = state.coordinator.leaders().await?;
    Ok(envelope(ResourceKind::Leaders, fetched))
}

/// GET /api/live
async fn live_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.watcher.snapshot().await)
}

/// POST /api/watch?date=... or ?gameId=...
async fn watch_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ResourceQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let key = match query.game_id.as_deref().map(str::trim).filter(|g| !g.is_empty()) {
        Some(game_id) => WatchKey::Game {
            game_id: game_id.to_string(),
        },
        None => WatchKey::Scoreboard {
            date: query.date_or_today(&state)?,
        },
    };
    send(&state, WatchCommand::Watch(key.clone())).await?;
    Ok((StatusCode::ACCEPTED, Json(key)))
}

/// POST /api/watch/refresh
async fn refresh_handler(State(state): State<Arc<AppState>>) -> Result<StatusCode, ApiError> {
    send(&state, WatchCommand::Refresh).await?;
    Ok(StatusCode::ACCEPTED)
}

/// DELETE /api/watch
async fn unwatch_handler(State(state): State<Arc<AppState>>) -> Result<StatusCode, ApiError> {
    send(&state, WatchCommand::Stop).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn send(state: &AppState, command: WatchCommand) -> Result<(), ApiError> {
    state
        .watcher
        .send(command)
        .await
        .map_err(|e| ApiError::WatcherGone(e.to_string()))
}

#[derive(Serialize)]
struct CacheStats {
    permanent: usize,
    volatile: usize,
}

/// GET /api/cache (expired volatile entries are swept first)
async fn cache_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.coordinator.cache().sweep().await;
    let (permanent, volatile) = state.coordinator.cache().len().await;
    Json(CacheStats { permanent, volatile })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheStore;
    use crate::clock::{Clock, ManualClock};
    use crate::fetch::{FetchSettings, TtlPolicy};
    use crate::normalize::games::fixtures::espn_event;
    use crate::scheduler::{start_watcher, PollSettings};
    use crate::upstream::fake::{FakeResponse, FakeUpstream};
    use crate::upstream::Endpoints;
    use chrono::{TimeZone, Utc};
    use serde_json::{json, Value};
    use std::time::Duration;

    fn state(upstream: Arc<FakeUpstream>) -> Arc<AppState> {
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 1, 6, 12, 0, 0).unwrap(),
        ));
        let coordinator = FetchCoordinator::new(
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
        );
        let watcher = start_watcher(coordinator.clone(), PollSettings::default());
        Arc::new(AppState {
            coordinator,
            watcher,
        })
    }

    fn query(pairs: &[(&str, &str)]) -> Query<ResourceQuery> {
        let mut q = ResourceQuery::default();
        for (k, v) in pairs {
            let v = Some(v.to_string());
            match *k {
                "date" => q.date = v,
                "gameId" => q.game_id = v,
                "playerId" => q.player_id = v,
                "teamId" => q.team_id = v,
                "season" => q.season = v,
                _ => panic!("unknown param {k}"),
            }
        }
        Query(q)
    }

    fn rejected(result: Result<Response, ApiError>) -> Response {
        match result {
            Ok(resp) => panic!("expected an error, got {}", resp.status()),
            Err(e) => e.into_response(),
        }
    }

    async fn body(resp: Response) -> Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_games_envelope_and_cache_headers() {
        let upstream = Arc::new(FakeUpstream::new());
        let endpoints = Endpoints::espn_defaults().unwrap();
        let date = NaiveDate::from_ymd_opt(2025, 1, 5).unwrap();
        upstream.json(
            &endpoints.scoreboard(date),
            json!({"events": [espn_event("401", "post", ("2", "Boston Celtics", "BOS", "110"), ("18", "New York Knicks", "NY", "100"))]}),
        );
        let state = state(upstream);

        let resp = games_handler(State(state.clone()), query(&[("date", "20250105")])).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()["x-cache-tier"], "permanent");
        assert_eq!(resp.headers()["x-cache-origin"], "upstream");
        let json = body(resp).await;
        assert_eq!(json["data"]["games"][0]["home_score"], 110);
        assert_eq!(json["meta"]["resource"], "scoreboard");

        let resp = games_handler(State(state), query(&[("date", "2025-01-05")])).await.unwrap();
        assert_eq!(resp.headers()["x-cache-origin"], "permanent");
    }

    #[tokio::test]
    async fn test_bad_params_are_400() {
        let state = state(Arc::new(FakeUpstream::new()));
        let resp = rejected(games_handler(State(state.clone()), query(&[("date", "yesterday")])).await);
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = rejected(player_details_handler(State(state.clone()), query(&[("playerId", "  ")])).await);
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body(resp).await["message"], "playerId is required");

        let resp = rejected(season_standings_handler(State(state), query(&[("season", "next")])).await);
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_fetch_errors_map_to_status() {
        let upstream = Arc::new(FakeUpstream::new());
        let endpoints = Endpoints::espn_defaults().unwrap();
        upstream.route(&endpoints.teams(), FakeResponse::Status(500));
        let state = state(upstream);

        let resp = rejected(player_details_handler(State(state.clone()), query(&[("playerId", "1")])).await);
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(body(resp).await["error"], "not_found");

        let resp = rejected(teams_handler(State(state)).await);
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);

        let timeout = ApiError::Fetch(FetchError::unavailable(ResourceKind::Leaders, "request timed out"));
        assert_eq!(timeout.into_response().status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_season_param_forms() {
        let state = state(Arc::new(FakeUpstream::new()));
        assert_eq!(query(&[("season", "2023-24")]).0.season(&state).unwrap(), 2023);
        assert_eq!(query(&[("season", "2022")]).0.season(&state).unwrap(), 2022);
        assert_eq!(query(&[]).0.season(&state).unwrap(), 2024);
        assert_eq!(
            query(&[]).0.date_or_today(&state).unwrap(),
            NaiveDate::from_ymd_opt(2025, 1, 6).unwrap()
        );
    }

    #[tokio::test]
    async fn test_watch_endpoint_feeds_live_snapshot() {
        let upstream = Arc::new(FakeUpstream::new());
        let endpoints = Endpoints::espn_defaults().unwrap();
        upstream.json(
            &endpoints.summary("401"),
            crate::normalize::boxscore::fixtures::summary(),
        );
        let state = state(upstream);

        let resp = watch_handler(State(state.clone()), query(&[("gameId", "401")]))
            .await
            .unwrap()
            .into_response();
        assert_eq!(resp.status(), StatusCode::ACCEPTED);

        let mut snapshot = state.watcher.snapshot().await;
        for _ in 0..50 {
            if snapshot.refreshes > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
            snapshot = state.watcher.snapshot().await;
        }
        assert_eq!(snapshot.games.len(), 1);
        assert_eq!(snapshot.games[0].id, "401");

        let status = unwatch_handler(State(state.clone())).await.unwrap();
        assert_eq!(status, StatusCode::NO_CONTENT);
    }
}
