use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Kind of resource served by the fetch layer. Part of every cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Scoreboard,
    BoxScore,
    Player,
    Team,
    Teams,
    ProviderStandings,
    SeasonStandings,
    Leaders,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Scoreboard => "scoreboard",
            ResourceKind::BoxScore => "box_score",
            ResourceKind::Player => "player",
            ResourceKind::Team => "team",
            ResourceKind::Teams => "teams",
            ResourceKind::ProviderStandings => "provider_standings",
            ResourceKind::SeasonStandings => "season_standings",
            ResourceKind::Leaders => "leaders",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a game is in its real-world progression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameState {
    Scheduled,
    Live,
    Final,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Home,
    Away,
}

/// Minimal team identity carried on a game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamRef {
    pub id: String,
    pub name: String,
    pub abbreviation: String,
}

/// One game as reported by any schedule/scoreboard provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameRecord {
    /// Provider game id
    pub id: String,
    pub home: TeamRef,
    pub away: TeamRef,
    /// `None` until the game has started
    pub home_score: Option<u32>,
    pub away_score: Option<u32>,
    pub state: GameState,
    /// Display text: "Final", "3rd Qtr", "7:30 PM ET"
    pub status_detail: String,
    pub period: Option<u32>,
    pub clock: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    /// Deduplicated, first-seen order
    pub broadcasts: Vec<String>,
}

impl GameRecord {
    /// Final with both scores present: nothing about this game can change again.
    pub fn is_settled(&self) -> bool {
        self.state == GameState::Final && self.home_score.is_some() && self.away_score.is_some()
    }

    /// Winning side of a settled game. Level scores have no winner.
    pub fn winner(&self) -> Option<Side> {
        if !self.is_settled() {
            return None;
        }
        let (home, away) = (self.home_score?, self.away_score?);
        match home.cmp(&away) {
            std::cmp::Ordering::Greater => Some(Side::Home),
            std::cmp::Ordering::Less => Some(Side::Away),
            std::cmp::Ordering::Equal => None,
        }
    }

    pub fn involves(&self, team: &TeamRef) -> Option<Side> {
        if same_team(&self.home, team) {
            Some(Side::Home)
        } else if same_team(&self.away, team) {
            Some(Side::Away)
        } else {
            None
        }
    }
}

fn same_team(a: &TeamRef, b: &TeamRef) -> bool {
    (!a.id.is_empty() && a.id == b.id) || a.name.eq_ignore_ascii_case(&b.name)
}

/// Games for one calendar date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    pub date: NaiveDate,
    pub games: Vec<GameRecord>,
}

/// Team metadata. Logo and colours are display-only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamRecord {
    pub id: String,
    pub name: String,
    pub abbreviation: String,
    pub location: Option<String>,
    pub nickname: Option<String>,
    pub conference: Option<String>,
    pub division: Option<String>,
    pub logo: Option<String>,
    pub color: Option<String>,
    pub alternate_color: Option<String>,
}

impl TeamRecord {
    pub fn to_ref(&self) -> TeamRef {
        TeamRef {
            id: self.id.clone(),
            name: self.name.clone(),
            abbreviation: self.abbreviation.clone(),
        }
    }
}

/// Season record for one team, derived from game results or reported by a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StandingsEntry {
    pub team_id: String,
    pub name: String,
    pub abbreviation: String,
    pub conference: Option<String>,
    pub division: Option<String>,
    pub wins: u32,
    pub losses: u32,
    pub home_wins: u32,
    pub home_losses: u32,
    pub road_wins: u32,
    pub road_losses: u32,
    pub conf_wins: u32,
    pub conf_losses: u32,
    /// "W3" / "L1"
    pub streak: Option<String>,
}

impl StandingsEntry {
    pub fn new(team: &TeamRecord) -> Self {
        StandingsEntry {
            team_id: team.id.clone(),
            name: team.name.clone(),
            abbreviation: team.abbreviation.clone(),
            conference: team.conference.clone(),
            division: team.division.clone(),
            wins: 0,
            losses: 0,
            home_wins: 0,
            home_losses: 0,
            road_wins: 0,
            road_losses: 0,
            conf_wins: 0,
            conf_losses: 0,
            streak: None,
        }
    }

    #[cfg(test)]
    pub fn games_played(&self) -> u32 {
        self.wins + self.losses
    }

    /// 0.0 when no games have been played.
    pub fn win_pct(&self) -> f64 {
        pct(self.wins, self.losses)
    }

    pub fn home_record(&self) -> String {
        format!("{}-{}", self.home_wins, self.home_losses)
    }

    pub fn road_record(&self) -> String {
        format!("{}-{}", self.road_wins, self.road_losses)
    }

    pub fn conference_record(&self) -> String {
        format!("{}-{}", self.conf_wins, self.conf_losses)
    }
}

fn pct(wins: u32, losses: u32) -> f64 {
    let played = wins + losses;
    if played == 0 {
        0.0
    } else {
        f64::from(wins) / f64::from(played)
    }
}

/// A standings row after ranking within its conference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedStanding {
    pub rank: u32,
    pub win_pct: f64,
    pub games_back: f64,
    pub home_record: String,
    pub road_record: String,
    pub conference_record: String,
    #[serde(flatten)]
    pub entry: StandingsEntry,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandingsTable {
    pub season: String,
    pub entries: Vec<RankedStanding>,
}

/// Whether a stat block covers one game or a season aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StatScope {
    Game { game_id: String },
    Season,
}

/// Named stat values for one player. Keyed by label, never by column position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerStatBlock {
    pub player_id: String,
    pub player_name: String,
    pub scope: StatScope,
    pub stats: BTreeMap<String, String>,
}

impl PlayerStatBlock {
    pub fn get(&self, label: &str) -> Option<&str> {
        self.stats.get(label).map(String::as_str)
    }

    pub fn get_f64(&self, label: &str) -> Option<f64> {
        self.get(label).and_then(|v| v.trim().parse().ok())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedStat {
    pub name: String,
    pub label: Option<String>,
    pub value: Option<f64>,
    pub display_value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatCategory {
    pub name: String,
    pub display_name: Option<String>,
    pub stats: Vec<NamedStat>,
}

/// Biographical player data, shape-independent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerRecord {
    pub id: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub full_name: Option<String>,
    pub display_name: String,
    pub short_name: Option<String>,
    pub jersey: Option<String>,
    pub position: String,
    pub position_abbr: String,
    pub height: Option<String>,
    pub weight: Option<String>,
    pub age: Option<u32>,
    pub date_of_birth: Option<String>,
    pub birth_place: Option<String>,
    pub college: Option<String>,
    pub experience: Option<u32>,
    pub headshot: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeasonAverages {
    pub points: Option<f64>,
    pub rebounds: Option<f64>,
    pub assists: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerProfile {
    pub player: PlayerRecord,
    pub team: Option<TeamRecord>,
    pub averages: SeasonAverages,
    pub season: Option<PlayerStatBlock>,
    pub statistics: Option<Vec<StatCategory>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoxScoreTeam {
    pub team: TeamRecord,
    pub score: Option<u32>,
    pub stats: Vec<NamedStat>,
    pub players: Vec<PlayerStatBlock>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoxScore {
    pub game: GameRecord,
    pub home: BoxScoreTeam,
    pub away: BoxScoreTeam,
}

impl BoxScore {
    #[cfg(test)]
    pub fn player(&self, player_id: &str) -> Option<&PlayerStatBlock> {
        self.home
            .players
            .iter()
            .chain(self.away.players.iter())
            .find(|p| p.player_id == player_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSummary {
    pub overall: String,
    pub home: String,
    pub away: String,
    pub standing: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NextGame {
    pub id: String,
    pub name: Option<String>,
    pub short_name: Option<String>,
    pub date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub id: String,
    pub display_name: String,
    pub jersey: Option<String>,
    pub position: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamProfile {
    pub team: TeamRecord,
    pub record: RecordSummary,
    pub next_game: Option<NextGame>,
    pub statistics: Option<Vec<StatCategory>>,
    pub schedule: Option<Vec<GameRecord>>,
    pub season: Option<String>,
    pub roster: Option<Vec<RosterEntry>>,
    /// "W3", "L1" or "-"
    pub streak: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeaderCategory {
    Points,
    Rebounds,
    Assists,
    Steals,
    Blocks,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderEntry {
    pub player_id: Option<String>,
    pub name: String,
    pub team: Option<String>,
    pub value: Option<f64>,
    pub display_value: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Leaders {
    pub categories: BTreeMap<LeaderCategory, Vec<LeaderEntry>>,
}

/// Every value the cache can hold.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CanonicalValue {
    Schedule(Schedule),
    BoxScore(Box<BoxScore>),
    Player(Box<PlayerProfile>),
    Team(Box<TeamProfile>),
    Teams(Vec<TeamRecord>),
    Standings(StandingsTable),
    Leaders(Leaders),
}
