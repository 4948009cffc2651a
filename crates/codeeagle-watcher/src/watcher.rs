//! Filesystem watcher implementation
//!
//! Watch mode is incremental sync on a trigger: notify events are
//! debounced into a change set, then handed to the indexer's normal
//! delete-then-insert pipeline.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use codeeagle_core::{CancelToken, GraphError, Result};
use codeeagle_indexer::{ChangeSet, Indexer};

/// Events emitted by the file watcher
#[derive(Debug, Clone)]
pub enum WatchEvent {
    /// File created
    Created(PathBuf),
    /// File modified
    Modified(PathBuf),
    /// File removed
    Removed(PathBuf),
}

/// File system watcher for monitoring working-tree changes
pub struct FileWatcher {
    watcher: RecommendedWatcher,
    event_rx: mpsc::UnboundedReceiver<WatchEvent>,
    root_path: PathBuf,
}

impl FileWatcher {
    /// Create a new file watcher for the given root path
    pub fn new(root_path: impl AsRef<Path>) -> Result<Self> {
        let root_path = root_path.as_ref().to_path_buf();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let watcher = notify::recommended_watcher(
            move |res: std::result::Result<notify::Event, notify::Error>| match res {
                Ok(event) => {
                    debug!("file system event: {:?}", event);
                    Self::handle_notify_event(event, &event_tx);
                }
                Err(err) => {
                    error!("file system watch error: {}", err);
                }
            },
        )
        .map_err(GraphError::external)?;

        Ok(Self {
            watcher,
            event_rx,
            root_path,
        })
    }

    fn handle_notify_event(event: notify::Event, event_tx: &mpsc::UnboundedSender<WatchEvent>) {
        let convert = match event.kind {
            notify::EventKind::Create(_) => WatchEvent::Created as fn(PathBuf) -> WatchEvent,
            notify::EventKind::Modify(_) => WatchEvent::Modified,
            notify::EventKind::Remove(_) => WatchEvent::Removed,
            _ => return,
        };
        for path in event.paths {
            if should_ignore_path(&path) {
                continue;
            }
            if event_tx.send(convert(path)).is_err() {
                warn!("watch event receiver dropped");
                return;
            }
        }
    }

    /// Watch the root directory recursively
    pub fn start(&mut self) -> Result<()> {
        info!("watching directory: {}", self.root_path.display());
        self.watcher
            .watch(&self.root_path, RecursiveMode::Recursive)
            .map_err(GraphError::external)
    }

    pub fn event_receiver(&mut self) -> &mut mpsc::UnboundedReceiver<WatchEvent> {
        &mut self.event_rx
    }

    pub fn root_path(&self) -> &Path {
        &self.root_path
    }
}

/// Long-running service: debounce watch events into change sets and run
/// incremental syncs through the indexer.
pub struct WatchService {
    indexer: Arc<Indexer>,
    root: PathBuf,
    debounce: Duration,
}

impl WatchService {
    pub fn new(indexer: Arc<Indexer>, root: impl Into<PathBuf>) -> Self {
        WatchService {
            indexer,
            root: root.into(),
            debounce: Duration::from_millis(400),
        }
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Run until cancelled. Each debounced batch becomes one sync; sync
    /// failures are logged and watching continues.
    pub async fn run(&self, branch: Option<&str>, cancel: CancelToken) -> Result<()> {
        let mut watcher = FileWatcher::new(&self.root)?;
        watcher.start()?;
        info!("watch mode started for {}", self.root.display());

        let mut pending: Vec<WatchEvent> = Vec::new();
        loop {
            if cancel.is_cancelled() {
                info!("watch mode cancelled");
                return Ok(());
            }

            let event = tokio::select! {
                event = watcher.event_receiver().recv() => event,
                _ = tokio::time::sleep(Duration::from_millis(200)) => {
                    continue;
                }
            };
            let Some(event) = event else {
                return Ok(());
            };
            pending.push(event);

            // Debounce: keep collecting until the tree settles
            loop {
                let more = tokio::select! {
                    event = watcher.event_receiver().recv() => event,
                    _ = tokio::time::sleep(self.debounce) => None,
                };
                match more {
                    Some(event) => pending.push(event),
                    None => break,
                }
            }

            let changes = self.to_change_set(std::mem::take(&mut pending));
            if changes.is_empty() {
                continue;
            }
            debug!(
                added = changes.added.len(),
                modified = changes.modified.len(),
                deleted = changes.deleted.len(),
                "watch batch"
            );
            let indexer = Arc::clone(&self.indexer);
            let root = self.root.clone();
            let branch_owned = branch.map(str::to_string);
            let sync_cancel = cancel.clone();
            let outcome = tokio::task::spawn_blocking(move || {
                indexer.sync_changes(
                    branch_owned.as_deref(),
                    &root,
                    &changes,
                    &sync_cancel,
                )
            })
            .await
            .map_err(GraphError::external)?;
            match outcome {
                Ok(stats) => {
                    info!(
                        files = stats.files_indexed,
                        deleted = stats.files_deleted,
                        errors = stats.errors.len(),
                        "watch sync done"
                    );
                }
                Err(err) => {
                    warn!(error = %err, "watch sync failed");
                }
            }
        }
    }

    /// Collapse raw events into repo-relative added/modified/deleted
    /// sets. Creation followed by modification is just an add.
    fn to_change_set(&self, events: Vec<WatchEvent>) -> ChangeSet {
        let mut added: HashSet<String> = HashSet::new();
        let mut modified: HashSet<String> = HashSet::new();
        let mut deleted: HashSet<String> = HashSet::new();

        for event in events {
            let path = match &event {
                WatchEvent::Created(path)
                | WatchEvent::Modified(path)
                | WatchEvent::Removed(path) => path,
            };
            let Ok(relative) = path.strip_prefix(&self.root) else {
                continue;
            };
            let Some(relative) = relative.to_str() else {
                continue;
            };
            let relative = relative.to_string();
            match event {
                WatchEvent::Created(_) => {
                    deleted.remove(&relative);
                    added.insert(relative);
                }
                WatchEvent::Modified(_) => {
                    if !added.contains(&relative) {
                        modified.insert(relative);
                    }
                }
                WatchEvent::Removed(_) => {
                    added.remove(&relative);
                    modified.remove(&relative);
                    deleted.insert(relative);
                }
            }
        }

        let mut changes = ChangeSet::default();
        changes.added.extend(added);
        changes.modified.extend(modified);
        changes.deleted.extend(deleted);
        changes.added.sort_unstable();
        changes.modified.sort_unstable();
        changes.deleted.sort_unstable();
        changes
    }
}

/// Paths that never feed a sync (the store's own directory included).
fn should_ignore_path(path: &Path) -> bool {
    for component in path.components() {
        if let Some(name) = component.as_os_str().to_str() {
            if name == ".git"
                || name == ".codeeagle"
                || name == "node_modules"
                || name == "target"
                || name == "__pycache__"
            {
                return true;
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio::time::{sleep, Duration};

    #[tokio::test]
    async fn test_file_watcher_creation() {
        let temp_dir = TempDir::new().unwrap();
        let watcher = FileWatcher::new(temp_dir.path());
        assert!(watcher.is_ok());
    }

    #[tokio::test]
    async fn test_watch_events() {
        let temp_dir = TempDir::new().unwrap();
        let mut watcher = FileWatcher::new(temp_dir.path()).unwrap();
        watcher.start().unwrap();

        let test_file = temp_dir.path().join("test.go");
        std::fs::write(&test_file, "package main\n").unwrap();

        // Give the watcher time to surface the event
        sleep(Duration::from_millis(300)).await;

        if let Ok(event) = watcher.event_receiver().try_recv() {
            match event {
                WatchEvent::Created(path) | WatchEvent::Modified(path) => {
                    assert_eq!(path, test_file)
                }
                other => panic!("unexpected event {other:?}"),
            }
        }
    }

    #[test]
    fn test_should_ignore_path() {
        assert!(should_ignore_path(Path::new("repo/.git/HEAD")));
        assert!(should_ignore_path(Path::new("repo/.codeeagle/graph.db/db")));
        assert!(should_ignore_path(Path::new("repo/node_modules/x/index.js")));
        assert!(!should_ignore_path(Path::new("repo/src/main.go")));
    }
}
