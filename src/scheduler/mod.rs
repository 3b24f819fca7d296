pub mod poll;
pub mod watcher;

pub use poll::{PollSettings, WatchKey};
pub use watcher::{start_watcher, WatchCommand, WatchHandle};
