//! CodeEagle Watcher — filesystem events feeding incremental syncs

pub mod watcher;

pub use watcher::{FileWatcher, WatchEvent, WatchService};
