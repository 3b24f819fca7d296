use crate::models::{TeamRecord, TeamRef};

/// (ESPN id, display name, abbreviation, conference, division)
const NBA_TEAMS: [(&str, &str, &str, &str, &str); 30] = [
    ("1", "Atlanta Hawks", "ATL", "East", "Southeast"),
    ("2", "Boston Celtics", "BOS", "East", "Atlantic"),
    ("3", "New Orleans Pelicans", "NO", "West", "Southwest"),
    ("4", "Chicago Bulls", "CHI", "East", "Central"),
    ("5", "Cleveland Cavaliers", "CLE", "East", "Central"),
    ("6", "Dallas Mavericks", "DAL", "West", "Southwest"),
    ("7", "Denver Nuggets", "DEN", "West", "Northwest"),
    ("8", "Detroit Pistons", "DET", "East", "Central"),
    ("9", "Golden State Warriors", "GS", "West", "Pacific"),
    ("10", "Houston Rockets", "HOU", "West", "Southwest"),
    ("11", "Indiana Pacers", "IND", "East", "Central"),
    ("12", "LA Clippers", "LAC", "West", "Pacific"),
    ("13", "Los Angeles Lakers", "LAL", "West", "Pacific"),
    ("14", "Miami Heat", "MIA", "East", "Southeast"),
    ("15", "Milwaukee Bucks", "MIL", "East", "Central"),
    ("16", "Minnesota Timberwolves", "MIN", "West", "Northwest"),
    ("17", "Brooklyn Nets", "BKN", "East", "Atlantic"),
    ("18", "New York Knicks", "NY", "East", "Atlantic"),
    ("19", "Orlando Magic", "ORL", "East", "Southeast"),
    ("20", "Philadelphia 76ers", "PHI", "East", "Atlantic"),
    ("21", "Phoenix Suns", "PHX", "West", "Pacific"),
    ("22", "Portland Trail Blazers", "POR", "West", "Northwest"),
    ("23", "Sacramento Kings", "SAC", "West", "Pacific"),
    ("24", "San Antonio Spurs", "SA", "West", "Southwest"),
    ("25", "Oklahoma City Thunder", "OKC", "West", "Northwest"),
    ("26", "Utah Jazz", "UTAH", "West", "Northwest"),
    ("27", "Washington Wizards", "WSH", "East", "Southeast"),
    ("28", "Toronto Raptors", "TOR", "East", "Atlantic"),
    ("29", "Memphis Grizzlies", "MEM", "West", "Southwest"),
    ("30", "Charlotte Hornets", "CHA", "East", "Southeast"),
];

/// The set of teams standings are computed over.
///
/// Providers disagree on ids and abbreviations (BallDontLie's Knicks are
/// `20`/`NYK`, ESPN's are `18`/`NY`), so lookups try the display name first.
#[derive(Debug, Clone, Default)]
pub struct TeamDirectory {
    teams: Vec<TeamRecord>,
}

impl TeamDirectory {
    /// The 30 NBA franchises with conference and division.
    pub fn nba() -> Self {
        let teams = NBA_TEAMS
            .iter()
            .map(|(id, name, abbr, conference, division)| TeamRecord {
                id: id.to_string(),
                name: name.to_string(),
                abbreviation: abbr.to_string(),
                conference: Some(conference.to_string()),
                division: Some(division.to_string()),
                ..Default::default()
            })
            .collect();
        TeamDirectory { teams }
    }

    /// A fetched team list. Conference/division missing from the fetch are
    /// filled from the built-in NBA table when the team is known there.
    pub fn from_teams(teams: Vec<TeamRecord>) -> Self {
        let builtin = TeamDirectory::nba();
        let teams = teams
            .into_iter()
            .map(|mut team| {
                if let Some(known) = builtin.resolve(&team.name) {
                    team.conference = team.conference.or_else(|| known.conference.clone());
                    team.division = team.division.or_else(|| known.division.clone());
                }
                team
            })
            .collect();
        TeamDirectory { teams }
    }

    pub fn teams(&self) -> &[TeamRecord] {
        &self.teams
    }

    pub fn len(&self) -> usize {
        self.teams.len()
    }

    /// Look up by display name (case-insensitive), then abbreviation, then id.
    pub fn resolve(&self, query: &str) -> Option<&TeamRecord> {
        let query = query.trim();
        self.teams
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(query))
            .or_else(|| {
                self.teams
                    .iter()
                    .find(|t| t.abbreviation.eq_ignore_ascii_case(query))
            })
            .or_else(|| self.teams.iter().find(|t| t.id == query))
    }

    /// Resolve a game's team reference. Name wins over id because ids are
    /// provider-specific.
    pub fn resolve_ref(&self, team: &TeamRef) -> Option<&TeamRecord> {
        self.teams
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(&team.name))
            .or_else(|| {
                self.teams.iter().find(|t| {
                    !team.abbreviation.is_empty() && t.abbreviation.eq_ignore_ascii_case(&team.abbreviation)
                })
            })
            .or_else(|| self.teams.iter().find(|t| !team.id.is_empty() && t.id == team.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nba_directory_is_complete() {
        let dir = TeamDirectory::nba();
        assert_eq!(dir.len(), 30);
        let east = dir
            .teams()
            .iter()
            .filter(|t| t.conference.as_deref() == Some("East"))
            .count();
        assert_eq!(east, 15);
    }

    #[test]
    fn test_resolve_by_name_abbreviation_or_id() {
        let dir = TeamDirectory::nba();
        assert_eq!(dir.resolve("boston celtics").unwrap().id, "2");
        assert_eq!(dir.resolve("LAL").unwrap().name, "Los Angeles Lakers");
        assert_eq!(dir.resolve("25").unwrap().abbreviation, "OKC");
        assert!(dir.resolve("Seattle SuperSonics").is_none());
    }

    #[test]
    fn test_resolve_ref_prefers_name_over_foreign_id() {
        let dir = TeamDirectory::nba();
        // BallDontLie id 20 is the Knicks there, the 76ers at ESPN.
        let knicks = TeamRef {
            id: "20".into(),
            name: "New York Knicks".into(),
            abbreviation: "NYK".into(),
        };
        assert_eq!(dir.resolve_ref(&knicks).unwrap().abbreviation, "NY");
    }

    #[test]
    fn test_from_teams_fills_conference() {
        let dir = TeamDirectory::from_teams(vec![TeamRecord {
            id: "2".into(),
            name: "Boston Celtics".into(),
            abbreviation: "BOS".into(),
            ..Default::default()
        }]);
        let team = dir.resolve("BOS").unwrap();
        assert_eq!(team.conference.as_deref(), Some("East"));
        assert_eq!(team.division.as_deref(), Some("Atlantic"));
    }
}
