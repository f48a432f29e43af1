use std::sync::Arc;

use metrics::counter;
use panic_dashboard_domain::{ConfigKind, ConfigSource, TopologyLoader};
use strum::IntoEnumIterator;
use tokio::task::JoinSet;
use tracing::error;

use crate::watcher::{watch_file, FileEvent, WatchError};

/// Running watches for every config document.
pub struct ConfigWatchers {
    tasks: JoinSet<Result<(), WatchError>>,
}

impl ConfigWatchers {
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Waits for the first watch to stop and returns its error. Dropping the
    /// returned future or `self` aborts every remaining watch.
    pub async fn supervise(mut self) -> Result<(), WatchError> {
        while let Some(joined) = self.tasks.join_next().await {
            match joined {
                Ok(Ok(())) => continue,
                Ok(Err(err)) => {
                    error!(%err, "config watch stopped");
                    return Err(err);
                }
                Err(join_err) if join_err.is_panic() => {
                    std::panic::resume_unwind(join_err.into_panic())
                }
                Err(_) => continue,
            }
        }
        Ok(())
    }
}

/// Registers one watch per config document and routes its events: a change
/// reloads the document, a deletion resets its domain. Reloads read and parse
/// files, so they run on the blocking pool.
///
/// Every watch is registered before any task is spawned, so a setup failure
/// is returned here and nothing keeps running. Call this before
/// [`TopologyLoader::load_initial`]: each watch remembers the content present
/// at registration, and an edit made after that point is always reloaded.
pub fn watch_config_dir<S>(loader: Arc<TopologyLoader<S>>) -> Result<ConfigWatchers, WatchError>
where
    S: ConfigSource + 'static,
{
    let registered = ConfigKind::iter()
        .map(|kind| watch_file(loader.source().path(kind)).map(|task| (kind, task)))
        .collect::<Result<Vec<_>, _>>()?;

    let mut tasks = JoinSet::new();
    for (kind, task) in registered {
        let loader = Arc::clone(&loader);
        tasks.spawn(task.run(move |event| {
            counter!("dashboard_config_events_total", "config" => kind.as_ref().to_owned(), "event" => event_label(event))
                .increment(1);
            let loader = Arc::clone(&loader);
            async move {
                let applied = tokio::task::spawn_blocking(move || match event {
                    FileEvent::Changed => loader.handle_change(kind),
                    FileEvent::Deleted => loader.reset(kind),
                })
                .await;
                if let Err(err) = applied {
                    error!(config = kind.as_ref(), %err, "config event handler failed");
                }
            }
        }));
    }

    Ok(ConfigWatchers { tasks })
}

fn event_label(event: FileEvent) -> &'static str {
    match event {
        FileEvent::Changed => "changed",
        FileEvent::Deleted => "deleted",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use panic_dashboard_domain::{IniConfigSource, TopologyStore};
    use std::{fs, path::Path, time::Duration};

    fn write_all(dir: &Path) {
        fs::write(
            dir.join(ConfigKind::UserMain.file_name()),
            "[general]\nunique_alerter_identifier = alerter\n\n[redis]\nenabled = true\nhost = localhost\nport = 6379\n",
        )
        .unwrap();
        fs::write(
            dir.join(ConfigKind::UserNodes.file_name()),
            "[node_0]\nnode_name = NodeA\nchain_name = Polka\nmonitor_node = true\nuse_as_data_source = true\n",
        )
        .unwrap();
        fs::write(
            dir.join(ConfigKind::UserRepos.file_name()),
            "[repo_0]\nrepo_name = panic\n",
        )
        .unwrap();
        fs::write(
            dir.join(ConfigKind::InternalMain.file_name()),
            "[redis]\nredis_database = 10\n",
        )
        .unwrap();
        fs::write(
            dir.join(ConfigKind::UserUi.file_name()),
            "[authentication]\nusername = admin\nhashed_password = 00\ncookie_secret = s\n",
        )
        .unwrap();
    }

    async fn eventually(store: &TopologyStore, check: impl Fn(&TopologyStore) -> bool) {
        tokio::time::timeout(Duration::from_secs(10), async {
            while !check(store) {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .expect("condition reached");
    }

    #[tokio::test]
    async fn edits_and_deletions_reach_the_store() {
        let dir = tempfile::tempdir().unwrap();
        write_all(dir.path());

        let store = Arc::new(TopologyStore::new());
        let loader = Arc::new(TopologyLoader::new(
            Arc::clone(&store),
            IniConfigSource::new(dir.path()),
        ));
        let watchers = watch_config_dir(Arc::clone(&loader)).expect("watches register");
        assert_eq!(watchers.len(), 5);
        loader.load_initial().expect("initial load");
        assert!(store.load().repo_names().contains("panic"));

        fs::write(
            dir.path().join(ConfigKind::UserRepos.file_name()),
            "[repo_0]\nrepo_name = panic\n\n[repo_1]\nrepo_name = other\n",
        )
        .unwrap();
        eventually(&store, |s| s.load().repo_names().contains("other")).await;

        fs::remove_file(dir.path().join(ConfigKind::UserNodes.file_name())).unwrap();
        eventually(&store, |s| s.load().chain_nodes().is_empty()).await;

        fs::remove_file(dir.path().join(ConfigKind::UserUi.file_name())).unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(store.load().auth().is_some());
    }

    #[tokio::test]
    async fn edit_landing_after_the_initial_read_is_reloaded() {
        let dir = tempfile::tempdir().unwrap();
        write_all(dir.path());

        let store = Arc::new(TopologyStore::new());
        let loader = Arc::new(TopologyLoader::new(
            Arc::clone(&store),
            IniConfigSource::new(dir.path()),
        ));
        let _watchers = watch_config_dir(Arc::clone(&loader)).expect("watches register");

        // Initial read sees the old content, the edit lands right after it.
        loader.load_initial().expect("initial load");
        fs::write(
            dir.path().join(ConfigKind::UserRepos.file_name()),
            "[repo_0]\nrepo_name = edited\n",
        )
        .unwrap();

        eventually(&store, |s| s.load().repo_names().contains("edited")).await;
        assert!(!store.load().repo_names().contains("panic"));
    }

    #[test]
    fn missing_config_dir_fails_registration() {
        let dir = tempfile::tempdir().unwrap();
        let loader = Arc::new(TopologyLoader::new(
            Arc::new(TopologyStore::new()),
            IniConfigSource::new(dir.path().join("missing")),
        ));
        let err = watch_config_dir(loader).err().expect("setup fails");
        assert!(matches!(err, WatchError::Setup { .. }));
    }
}
