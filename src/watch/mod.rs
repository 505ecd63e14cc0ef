// src/watch/mod.rs

//! File watching: glob matching, content-hash change detection and the
//! notify-backed watcher that feeds the runtime.

pub mod cache;
pub mod patterns;
pub mod watcher;

pub use cache::FileCache;
pub use patterns::{build_watch_profiles, collect_matching_files, PatternSet, WatchProfile};
pub use watcher::{spawn_watcher, WatcherHandle};
