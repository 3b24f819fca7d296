use anyhow::{Context, Result};
use chrono::NaiveDate;
use url::Url;

/// Base URLs for every upstream, overridable from config so tests and mirrors
/// can point elsewhere.
#[derive(Debug, Clone)]
pub struct Endpoints {
    /// `.../apis/site/v2/sports/basketball/nba/`
    pub espn_site: Url,
    /// `.../v2/sports/basketball/leagues/nba/`
    pub espn_core: Url,
    /// `.../apis/v2/sports/basketball/nba/standings`
    pub espn_standings: Url,
    /// `.../v1/`
    pub balldontlie: Url,
    /// HTML page carrying the embedded leaders blob
    pub stats_page: Url,
}

pub const BALLDONTLIE_PAGE_SIZE: u32 = 100;

impl Endpoints {
    pub fn new(
        espn_site: &str,
        espn_core: &str,
        espn_standings: &str,
        balldontlie: &str,
        stats_page: &str,
    ) -> Result<Self> {
        Ok(Endpoints {
            espn_site: base(espn_site).context("invalid ESPN site URL")?,
            espn_core: base(espn_core).context("invalid ESPN core URL")?,
            espn_standings: Url::parse(espn_standings).context("invalid ESPN standings URL")?,
            balldontlie: base(balldontlie).context("invalid BallDontLie URL")?,
            stats_page: Url::parse(stats_page).context("invalid stats page URL")?,
        })
    }

    /// Public defaults.
    pub fn espn_defaults() -> Result<Self> {
        Endpoints::new(
            "https://site.api.espn.com/apis/site/v2/sports/basketball/nba/",
            "https://sports.core.api.espn.com/v2/sports/basketball/leagues/nba/",
            "https://site.api.espn.com/apis/v2/sports/basketball/nba/standings",
            "https://api.balldontlie.io/v1/",
            "https://www.espn.com/nba/stats",
        )
    }

    pub fn scoreboard(&self, date: NaiveDate) -> Url {
        let mut url = join(&self.espn_site, &["scoreboard"]);
        url.query_pairs_mut()
            .append_pair("dates", &date.format("%Y%m%d").to_string());
        url
    }

    pub fn summary(&self, game_id: &str) -> Url {
        let mut url = join(&self.espn_site, &["summary"]);
        url.query_pairs_mut().append_pair("event", game_id);
        url
    }

    pub fn athlete(&self, player_id: &str) -> Url {
        let mut url = join(&self.espn_core, &["athletes", player_id]);
        url.query_pairs_mut()
            .append_pair("lang", "en")
            .append_pair("region", "us");
        url
    }

    pub fn team(&self, team_id: &str) -> Url {
        join(&self.espn_site, &["teams", team_id])
    }

    pub fn team_schedule(&self, team_id: &str) -> Url {
        join(&self.espn_site, &["teams", team_id, "schedule"])
    }

    pub fn team_statistics(&self, team_id: &str) -> Url {
        join(&self.espn_site, &["teams", team_id, "statistics"])
    }

    pub fn team_roster(&self, team_id: &str) -> Url {
        join(&self.espn_site, &["teams", team_id, "roster"])
    }

    pub fn teams(&self) -> Url {
        join(&self.espn_site, &["teams"])
    }

    pub fn standings(&self) -> Url {
        self.espn_standings.clone()
    }

    pub fn leaders(&self) -> Url {
        let mut url = join(&self.espn_site, &["leaders"]);
        url.query_pairs_mut().append_pair("limit", "10");
        url
    }

    pub fn leaders_page(&self) -> Url {
        self.stats_page.clone()
    }

    /// One page of BallDontLie games between two dates (inclusive).
    pub fn balldontlie_games(&self, start: NaiveDate, end: NaiveDate, cursor: Option<u64>) -> Url {
        let mut url = join(&self.balldontlie, &["games"]);
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("start_date", &start.format("%Y-%m-%d").to_string())
                .append_pair("end_date", &end.format("%Y-%m-%d").to_string())
                .append_pair("per_page", &BALLDONTLIE_PAGE_SIZE.to_string());
            if let Some(cursor) = cursor {
                query.append_pair("cursor", &cursor.to_string());
            }
        }
        url
    }
}

/// Base URLs must end in `/` for `join` to append rather than replace.
fn base(raw: &str) -> Result<Url, url::ParseError> {
    if raw.ends_with('/') {
        Url::parse(raw)
    } else {
        Url::parse(&format!("{raw}/"))
    }
}

fn join(base: &Url, segments: &[&str]) -> Url {
    let mut url = base.clone();
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(segments);
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_espn_urls() {
        let e = Endpoints::espn_defaults().unwrap();
        let date = NaiveDate::from_ymd_opt(2025, 1, 5).unwrap();
        assert_eq!(
            e.scoreboard(date).as_str(),
            "https://site.api.espn.com/apis/site/v2/sports/basketball/nba/scoreboard?dates=20250105"
        );
        assert_eq!(
            e.summary("401705000").as_str(),
            "https://site.api.espn.com/apis/site/v2/sports/basketball/nba/summary?event=401705000"
        );
        assert_eq!(
            e.athlete("3112335").as_str(),
            "https://sports.core.api.espn.com/v2/sports/basketball/leagues/nba/athletes/3112335?lang=en&region=us"
        );
        assert_eq!(
            e.team_roster("2").as_str(),
            "https://site.api.espn.com/apis/site/v2/sports/basketball/nba/teams/2/roster"
        );
    }

    #[test]
    fn test_balldontlie_cursor() {
        let e = Endpoints::espn_defaults().unwrap();
        let start = NaiveDate::from_ymd_opt(2025, 10, 21).unwrap();
        let end = NaiveDate::from_ymd_opt(2025, 10, 27).unwrap();
        assert_eq!(
            e.balldontlie_games(start, end, None).as_str(),
            "https://api.balldontlie.io/v1/games?start_date=2025-10-21&end_date=2025-10-27&per_page=100"
        );
        assert!(e
            .balldontlie_games(start, end, Some(4242))
            .as_str()
            .ends_with("&cursor=4242"));
    }

    #[test]
    fn test_base_without_trailing_slash() {
        let e = Endpoints::new(
            "http://127.0.0.1:9000/site",
            "http://127.0.0.1:9000/core",
            "http://127.0.0.1:9000/standings",
            "http://127.0.0.1:9000/bdl",
            "http://127.0.0.1:9000/stats",
        )
        .unwrap();
        assert_eq!(e.teams().as_str(), "http://127.0.0.1:9000/site/teams");
        assert!(Endpoints::new("not a url", "", "", "", "").is_err());
    }
}
