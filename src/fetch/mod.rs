pub mod classify;
pub mod coordinator;
pub mod policy;
pub mod request;

pub use coordinator::{FetchCoordinator, FetchSettings, Fetched};
pub use policy::TtlPolicy;
