use std::{
    ffi::OsString,
    future::Future,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use panic_dashboard_domain::content_digest;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Outcome of observing a watched file after a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileEvent {
    /// The file exists and its content differs from the last seen state.
    Changed,
    /// The file does not exist. Reported on every notification.
    Deleted,
}

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("failed to watch `{}`: {source}", .path.display())]
    Setup {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },
    #[error("failed to digest `{}`: {source}", .path.display())]
    Digest {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("watch on `{}` stopped", .path.display())]
    Closed { path: PathBuf },
}

/// Content-digest state of one file. Owns the only copy of the last seen
/// digest; nothing else reads or writes it.
#[derive(Debug)]
pub struct ChangeWatcher {
    path: PathBuf,
    last_digest: Option<String>,
}

impl ChangeWatcher {
    /// Starts from the content present right now, so the first notification
    /// for an untouched file is not reported as a change.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, WatchError> {
        let path = path.into();
        let last_digest = match std::fs::read(&path) {
            Ok(bytes) => Some(content_digest(&bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => None,
            Err(source) => return Err(WatchError::Digest { path, source }),
        };
        Ok(Self { path, last_digest })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Compares the file against the last seen state. Returns `None` when
    /// the content is unchanged.
    pub fn observe(&mut self) -> Result<Option<FileEvent>, WatchError> {
        match std::fs::read(&self.path) {
            Ok(bytes) => {
                let digest = content_digest(&bytes);
                if self.last_digest.as_deref() == Some(digest.as_str()) {
                    return Ok(None);
                }
                self.last_digest = Some(digest);
                Ok(Some(FileEvent::Changed))
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                // A recreated file with the old content is a change again.
                self.last_digest = None;
                Ok(Some(FileEvent::Deleted))
            }
            Err(source) => Err(WatchError::Digest {
                path: self.path.clone(),
                source,
            }),
        }
    }
}

/// A registered watch that has not started delivering events yet.
pub struct WatchTask {
    watcher: RecommendedWatcher,
    changes: ChangeWatcher,
    signals: mpsc::Receiver<()>,
}

impl WatchTask {
    pub fn path(&self) -> &Path {
        self.changes.path()
    }

    /// Delivers events until the notification source goes away or a digest
    /// cannot be computed. Each handler future completes before the next
    /// notification is observed.
    pub async fn run<F, Fut>(self, mut on_event: F) -> Result<(), WatchError>
    where
        F: FnMut(FileEvent) -> Fut,
        Fut: Future<Output = ()>,
    {
        let WatchTask {
            watcher: _watcher,
            mut changes,
            mut signals,
        } = self;

        while signals.recv().await.is_some() {
            if let Some(event) = changes.observe()? {
                info!(path = %changes.path().display(), ?event, "change detected");
                on_event(event).await;
            }
        }

        Err(WatchError::Closed {
            path: changes.path().to_path_buf(),
        })
    }
}

/// Registers a watch on the directory containing `path`, so the watch
/// survives the file being deleted and recreated. Notifications for other
/// files in the directory are dropped.
pub fn watch_file(path: impl Into<PathBuf>) -> Result<WatchTask, WatchError> {
    let changes = ChangeWatcher::new(path)?;
    let path = changes.path().to_path_buf();
    let (dir, file_name) = split_path(&path)?;

    // One pending signal is enough: `observe` always reads the current state.
    let (sender, signals) = mpsc::channel::<()>(1);
    let watched = file_name.clone();
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
        Ok(event) => {
            if names_file(&event, &watched) {
                let _ = sender.try_send(());
            }
        }
        Err(err) => warn!(?err, "watch error"),
    })
    .map_err(|source| WatchError::Setup {
        path: path.clone(),
        source,
    })?;
    watcher
        .watch(&dir, RecursiveMode::NonRecursive)
        .map_err(|source| WatchError::Setup {
            path: path.clone(),
            source,
        })?;

    debug!(dir = %dir.display(), file = ?file_name, "watching config file");
    Ok(WatchTask {
        watcher,
        changes,
        signals,
    })
}

fn split_path(path: &Path) -> Result<(PathBuf, OsString), WatchError> {
    let file_name = path.file_name().ok_or_else(|| WatchError::Setup {
        path: path.to_path_buf(),
        source: notify::Error::generic("path has no file name"),
    })?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    Ok((dir, file_name.to_os_string()))
}

fn names_file(event: &Event, file_name: &OsString) -> bool {
    event
        .paths
        .iter()
        .any(|path| path.file_name() == Some(file_name.as_os_str()))
}
