use anyhow::Result;
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

mod aggregate;
mod cache;
mod clock;
mod config;
mod dashboard;
mod error;
mod fetch;
mod models;
mod normalize;
mod scheduler;
mod upstream;

use cache::CacheStore;
use clock::{Clock, SystemClock};
use config::Config;
use dashboard::AppState;
use fetch::{FetchCoordinator, FetchSettings, TtlPolicy};
use scheduler::{start_watcher, WatchCommand, WatchKey};
use upstream::{Endpoints, HttpUpstream, Upstream};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise tracing / logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    config.validate()?;

    let endpoints = Endpoints::new(
        &config.espn_site_url,
        &config.espn_core_url,
        &config.espn_standings_url,
        &config.balldontlie_url,
        &config.stats_page_url,
    )?;
    if config.balldontlie_api_key.is_none() {
        info!("No BALLDONTLIE_API_KEY set; season standings requests may be rejected upstream");
    }
    let upstream: Arc<dyn Upstream> = Arc::new(HttpUpstream::new(
        Duration::from_secs(config.upstream_timeout_secs),
        &endpoints.balldontlie,
        config.balldontlie_api_key.clone(),
    )?);
    info!("Upstream client ready ({})", upstream.name());

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let coordinator = FetchCoordinator::new(
        CacheStore::new(Arc::clone(&clock)),
        upstream,
        endpoints,
        clock,
        FetchSettings {
            sub_fetch_timeout: Duration::from_secs(config.sub_fetch_timeout_secs),
            ttl: TtlPolicy::default(),
            season: config.season,
            season_start: config.season_start_date()?,
        },
    );

    let watcher = start_watcher(coordinator.clone(), config.poll_settings());
    if let Some(date) = config.watch_date()? {
        watcher
            .send(WatchCommand::Watch(WatchKey::Scoreboard { date }))
            .await?;
    }

    let app = dashboard::router(AppState {
        coordinator,
        watcher,
    });
    let addr: SocketAddr = config.dashboard_addr.parse()?;
    info!("Dashboard API listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Run the API server (blocks until shutdown)
    if let Err(e) = axum::serve(listener, app).await {
        error!("Dashboard server failed: {}", e);
        return Err(e.into());
    }

    Ok(())
}
