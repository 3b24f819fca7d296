//! Upstream JSON → canonical model.
//!
//! Every normalizer is a pure function over `serde_json::Value` that returns
//! `Result<_, ShapeError>`. A `ShapeError` only ever means a *mandatory* field
//! was missing after all fallbacks; optional fields degrade to `None`.

pub mod boxscore;
pub mod fields;
pub mod games;
pub mod leaders;
pub mod player;
pub mod standings;
pub mod team;

pub use boxscore::normalize_box_score;
pub use games::normalize_games;
pub use leaders::normalize_leaders;
pub use player::{normalize_player, pending_ref, AthleteLink, PlayerPayload};
pub use standings::normalize_provider_standings;
pub use team::{normalize_team_profile, normalize_teams, TeamPayload};
