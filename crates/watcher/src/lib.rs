//! Config file watching: one [`ChangeWatcher`] per document, driven by
//! directory notifications, and a supervisor that routes each document's
//! events to its reload or reset routine.

mod supervisor;
mod watcher;

pub use supervisor::{watch_config_dir, ConfigWatchers};
pub use watcher::{watch_file, ChangeWatcher, FileEvent, WatchError, WatchTask};
