pub mod directory;
pub mod standings;
pub mod streak;

pub use directory::TeamDirectory;
pub use standings::{compute_standings, rank_standings};
pub use streak::compute_streak;
