use chrono::{Datelike, NaiveDate};
use clap::Parser;
use std::time::Duration;

use crate::scheduler::PollSettings;

/// Sports data sync service for a live scores dashboard
#[derive(Parser, Debug, Clone)]
#[command(name = "courtside", version, about)]
pub struct Config {
    /// Dashboard API listen address
    #[arg(long, env = "DASHBOARD_ADDR", default_value = "0.0.0.0:8080")]
    pub dashboard_addr: String,

    /// ESPN site API base URL
    #[arg(
        long,
        env = "ESPN_SITE_URL",
        default_value = "https://site.api.espn.com/apis/site/v2/sports/basketball/nba"
    )]
    pub espn_site_url: String,

    /// ESPN core API base URL (athletes and `$ref` targets)
    #[arg(
        long,
        env = "ESPN_CORE_URL",
        default_value = "https://sports.core.api.espn.com/v2/sports/basketball/leagues/nba"
    )]
    pub espn_core_url: String,

    /// ESPN standings URL
    #[arg(
        long,
        env = "ESPN_STANDINGS_URL",
        default_value = "https://site.api.espn.com/apis/v2/sports/basketball/nba/standings"
    )]
    pub espn_standings_url: String,

    /// BallDontLie API base URL (season game history)
    #[arg(long, env = "BALLDONTLIE_URL", default_value = "https://api.balldontlie.io/v1")]
    pub balldontlie_url: String,

    /// BallDontLie API key
    #[arg(long, env = "BALLDONTLIE_API_KEY")]
    pub balldontlie_api_key: Option<String>,

    /// Stats page carrying the embedded leaders blob (leaders fallback)
    #[arg(long, env = "STATS_PAGE_URL", default_value = "https://www.espn.com/nba/stats")]
    pub stats_page_url: String,

    /// Current season, by the year it starts in
    #[arg(long, env = "SEASON", default_value = "2025")]
    pub season: i32,

    /// First day of the current season (YYYY-MM-DD)
    #[arg(long, env = "SEASON_START", default_value = "2025-10-21")]
    pub season_start: String,

    /// Timeout for every upstream request, in seconds
    #[arg(long, env = "UPSTREAM_TIMEOUT_SECS", default_value = "10")]
    pub upstream_timeout_secs: u64,

    /// Bound on optional sub-fetches (player refs, team extras), in seconds
    #[arg(long, env = "SUB_FETCH_TIMEOUT_SECS", default_value = "4")]
    pub sub_fetch_timeout_secs: u64,

    /// Refresh interval while a watched game is live, in seconds
    #[arg(long, env = "LIVE_POLL_SECS", default_value = "30")]
    pub live_poll_secs: u64,

    /// Added to the next tip-off time before refreshing, in seconds
    #[arg(long, env = "START_BUFFER_SECS", default_value = "300")]
    pub start_buffer_secs: u64,

    /// Longest wait before an upcoming game, in seconds
    #[arg(long, env = "MAX_DELAY_SECS", default_value = "21600")]
    pub max_delay_secs: u64,

    /// Retry delay after a failed refresh, in seconds
    #[arg(long, env = "RETRY_DELAY_SECS", default_value = "30")]
    pub retry_delay_secs: u64,

    /// Start watching this date's scoreboard right away (YYYY-MM-DD)
    #[arg(long, env = "WATCH_DATE")]
    pub watch_date: Option<String>,
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.upstream_timeout_secs == 0 || self.sub_fetch_timeout_secs == 0 {
            anyhow::bail!("upstream and sub-fetch timeouts must be positive");
        }
        if self.live_poll_secs == 0 || self.retry_delay_secs == 0 || self.max_delay_secs == 0 {
            anyhow::bail!("live_poll_secs, retry_delay_secs and max_delay_secs must be positive");
        }
        if self.retry_delay_secs > self.max_delay_secs {
            anyhow::bail!("retry_delay_secs must not exceed max_delay_secs");
        }
        let start = self.season_start_date()?;
        if start.year() != self.season && start.year() != self.season + 1 {
            anyhow::bail!("season_start {} does not fall in season {}", start, self.season);
        }
        self.watch_date()?;
        Ok(())
    }

    pub fn season_start_date(&self) -> anyhow::Result<NaiveDate> {
        parse_date(&self.season_start, "SEASON_START")
    }

    pub fn watch_date(&self) -> anyhow::Result<Option<NaiveDate>> {
        self.watch_date
            .as_deref()
            .map(|d| parse_date(d, "WATCH_DATE"))
            .transpose()
    }

    pub fn poll_settings(&self) -> PollSettings {
        PollSettings {
            live_interval: Duration::from_secs(self.live_poll_secs),
            start_buffer: Duration::from_secs(self.start_buffer_secs),
            max_delay: Duration::from_secs(self.max_delay_secs),
            retry_delay: Duration::from_secs(self.retry_delay_secs),
        }
    }
}

fn parse_date(raw: &str, name: &str) -> anyhow::Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|e| anyhow::anyhow!("{name} must be YYYY-MM-DD, got `{raw}`: {e}"))
}
