pub mod key;
pub mod store;

pub use key::CacheKey;
pub use store::{CacheOrigin, CacheStore, Tier};
