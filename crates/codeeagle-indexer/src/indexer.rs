//! Sync orchestration: drive the graph to be the image of the working
//! tree for the active branch, with minimum work
//!
//! Parse work is CPU-bound and runs on a bounded worker pool; all store
//! writes happen on the single drain loop, so the per-branch writer lock
//! is never contended from inside a sync. Producers block when the job
//! queue is full (backpressure); cancellation stops the producer, drains
//! what is in flight, and reports a cancelled outcome rather than an
//! error.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::UNIX_EPOCH;

use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;

use codeeagle_core::{project, CancelToken, GraphError, Node, NodeFilter, Result};
use codeeagle_store::BranchStore;

use crate::changes::{self, ChangeSet, ChangeSource, GitChangeSource, MtimeChangeSource};
use crate::config::ProjectConfig;
use crate::linker::{LinkReport, Linker};
use crate::parser::{ParseResult, ParserRegistry};
use crate::state::SyncState;

/// Optional post-link pass that writes a `summary` property on selected
/// nodes through `update_node`. The LLM client behind it is an external
/// collaborator.
pub trait Summarizer: Send + Sync {
    fn summarize(&self, node: &Node) -> Result<String>;
}

#[derive(Debug, Clone)]
pub struct IndexerOptions {
    /// Parse worker threads. Defaults to the hardware thread count.
    pub workers: usize,
    /// Job/result queue capacity; producers block when full.
    pub queue_capacity: usize,
}

impl Default for IndexerOptions {
    fn default() -> Self {
        let workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(2);
        IndexerOptions {
            workers,
            queue_capacity: workers * 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncError {
    pub path: String,
    pub message: String,
}

/// What one sync did. `errors` collects per-file parse failures — they
/// never abort the sync.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    pub branch: String,
    pub files_indexed: u64,
    pub files_deleted: u64,
    pub nodes_added: u64,
    pub edges_added: u64,
    pub imported: bool,
    pub link_report: LinkReport,
    pub summaries: u64,
    pub errors: Vec<SyncError>,
    pub cancelled: bool,
}

struct ParseJob {
    absolute: PathBuf,
    relative: String,
}

struct ParseOutput {
    relative: String,
    result: Result<ParseResult>,
}

pub struct Indexer {
    store: Arc<BranchStore>,
    registry: Arc<ParserRegistry>,
    root: PathBuf,
    config: ProjectConfig,
    options: IndexerOptions,
    summarizer: Option<Arc<dyn Summarizer>>,
}

impl Indexer {
    pub fn new(
        store: Arc<BranchStore>,
        registry: ParserRegistry,
        root: impl Into<PathBuf>,
        config: ProjectConfig,
    ) -> Self {
        let mut registry = registry;
        registry.retain_languages(&config.languages);
        Indexer {
            store,
            registry: Arc::new(registry),
            root: root.into(),
            config,
            options: IndexerOptions::default(),
            summarizer: None,
        }
    }

    pub fn with_options(mut self, options: IndexerOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_summarizer(mut self, summarizer: Arc<dyn Summarizer>) -> Self {
        self.summarizer = Some(summarizer);
        self
    }

    pub fn store(&self) -> &Arc<BranchStore> {
        &self.store
    }

    /// Explicit branch, else the checked-out git branch, else the
    /// configured default.
    pub fn resolve_branch(&self, requested: Option<&str>) -> String {
        if let Some(branch) = requested {
            return branch.to_string();
        }
        if changes::is_git_repo(&self.root) {
            match changes::current_branch(&self.root) {
                Ok(branch) => return branch,
                Err(err) => {
                    tracing::warn!(error = %err, "git branch lookup failed, using default")
                }
            }
        }
        self.config.graph.default_branch.clone()
    }

    fn excludes(&self) -> Result<GlobSet> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &self.config.excludes {
            let glob = Glob::new(pattern).map_err(|err| {
                GraphError::validation(format!("bad exclude pattern {pattern:?}: {err}"))
            })?;
            builder.add(glob);
        }
        builder.build().map_err(GraphError::storage)
    }

    fn repositories(&self) -> Vec<PathBuf> {
        self.config
            .repositories
            .iter()
            .map(|repo| {
                if repo.as_os_str() == "." {
                    self.root.clone()
                } else {
                    self.root.join(repo)
                }
            })
            .collect()
    }

    /// Full sync: enumerate every file under every configured repository
    /// path, parse and upsert all of them, then run the linker phases.
    pub fn full_sync(&self, branch: Option<&str>, cancel: &CancelToken) -> Result<SyncStats> {
        let branch = self.resolve_branch(branch);
        let mut stats = SyncStats {
            branch: branch.clone(),
            ..Default::default()
        };
        let mut state = SyncState::load(&project::sync_state_path(&self.root))?;
        self.auto_import(&branch, &mut state, &mut stats)?;

        let excludes = self.excludes()?;
        for repo in self.repositories() {
            let files = self.enumerate(&repo, &excludes)?;
            self.pipeline(&branch, files, &[], cancel, &mut stats)?;
            // Full scan resets incremental state for this repo
            if !cancel.is_cancelled() {
                let fresh = self.fresh_branch_state(&repo, &excludes)?;
                state.record_branch(&repo.to_string_lossy(), &branch, fresh);
            }
        }

        self.finish_sync(&branch, cancel, &mut stats)?;
        state.save(&project::sync_state_path(&self.root))?;
        Ok(stats)
    }

    /// Incremental sync: ask the change source for changed paths since
    /// the recorded state, then delete-then-insert just those.
    pub fn incremental_sync(
        &self,
        branch: Option<&str>,
        cancel: &CancelToken,
    ) -> Result<SyncStats> {
        let branch = self.resolve_branch(branch);
        let mut stats = SyncStats {
            branch: branch.clone(),
            ..Default::default()
        };
        let state_path = project::sync_state_path(&self.root);
        let mut state = SyncState::load(&state_path)?;
        self.auto_import(&branch, &mut state, &mut stats)?;

        let excludes = self.excludes()?;
        for repo in self.repositories() {
            let repo_key = repo.to_string_lossy().to_string();
            let branch_state = state.branch_state(&repo_key, &branch);
            let (changes, next_state) = self.detect_changes(&repo, &excludes, &branch_state)?;
            if changes.is_empty() {
                continue;
            }
            tracing::info!(
                repo = %repo.display(),
                added = changes.added.len(),
                modified = changes.modified.len(),
                deleted = changes.deleted.len(),
                "incremental changes"
            );

            let files: Vec<ParseJob> = changes
                .upserts()
                .filter(|rel| !excludes.is_match(rel.as_str()))
                .filter(|rel| self.registry.parser_for(rel).is_some())
                .map(|rel| ParseJob {
                    absolute: repo.join(rel),
                    relative: rel.clone(),
                })
                .collect();
            self.pipeline(&branch, files, &changes.deleted, cancel, &mut stats)?;
            if !cancel.is_cancelled() {
                state.record_branch(&repo_key, &branch, next_state);
            }
        }

        self.finish_sync(&branch, cancel, &mut stats)?;
        state.save(&state_path)?;
        Ok(stats)
    }

    /// One already-detected change set (watch mode feeds these in).
    pub fn sync_changes(
        &self,
        branch: Option<&str>,
        repo: &Path,
        changes: &ChangeSet,
        cancel: &CancelToken,
    ) -> Result<SyncStats> {
        let branch = self.resolve_branch(branch);
        let mut stats = SyncStats {
            branch: branch.clone(),
            ..Default::default()
        };
        let excludes = self.excludes()?;
        let files: Vec<ParseJob> = changes
            .upserts()
            .filter(|rel| !excludes.is_match(rel.as_str()))
            .filter(|rel| self.registry.parser_for(rel).is_some())
            .map(|rel| ParseJob {
                absolute: repo.join(rel),
                relative: rel.clone(),
            })
            .collect();
        self.pipeline(&branch, files, &changes.deleted, cancel, &mut stats)?;
        self.finish_sync(&branch, cancel, &mut stats)?;
        Ok(stats)
    }

    fn detect_changes(
        &self,
        repo: &Path,
        excludes: &GlobSet,
        branch_state: &crate::state::BranchSyncState,
    ) -> Result<(ChangeSet, crate::state::BranchSyncState)> {
        if changes::is_git_repo(repo) {
            match GitChangeSource.detect(repo, branch_state) {
                Ok(detected) => return Ok(detected),
                Err(err) => {
                    // Degraded mode: git trouble falls back to mtimes
                    tracing::warn!(error = %err, "git change detection failed, falling back to mtime");
                }
            }
        }
        MtimeChangeSource::new(excludes.clone()).detect(repo, branch_state)
    }

    fn enumerate(&self, repo: &Path, excludes: &GlobSet) -> Result<Vec<ParseJob>> {
        let mut files = Vec::new();
        for entry in WalkBuilder::new(repo).hidden(true).build() {
            let entry = entry.map_err(GraphError::external)?;
            if !entry.file_type().is_some_and(|ft| ft.is_file()) {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(repo) else {
                continue;
            };
            let Some(relative) = relative.to_str() else {
                continue;
            };
            if excludes.is_match(relative) {
                continue;
            }
            if self.registry.parser_for(relative).is_none() {
                continue;
            }
            files.push(ParseJob {
                absolute: entry.path().to_path_buf(),
                relative: relative.to_string(),
            });
        }
        Ok(files)
    }

    fn fresh_branch_state(
        &self,
        repo: &Path,
        excludes: &GlobSet,
    ) -> Result<crate::state::BranchSyncState> {
        let empty = crate::state::BranchSyncState::default();
        let (_, next) = self.detect_changes(repo, excludes, &empty)?;
        Ok(next)
    }

    /// Parse workers → single drain loop committing per-file batches.
    fn pipeline(
        &self,
        branch: &str,
        files: Vec<ParseJob>,
        deleted: &[String],
        cancel: &CancelToken,
        stats: &mut SyncStats,
    ) -> Result<()> {
        for path in deleted {
            if cancel.is_cancelled() {
                stats.cancelled = true;
                return Ok(());
            }
            self.store.delete_by_file(branch, path)?;
            stats.files_deleted += 1;
        }

        if files.is_empty() {
            return Ok(());
        }

        let (job_tx, job_rx) = mpsc::sync_channel::<ParseJob>(self.options.queue_capacity);
        let job_rx = Arc::new(Mutex::new(job_rx));
        let (out_tx, out_rx) = mpsc::sync_channel::<ParseOutput>(self.options.queue_capacity);

        // Set on a storage failure: the feeder stops, the drain loop
        // keeps consuming so no worker blocks on a full channel, and the
        // error surfaces once everything has wound down.
        let abort = std::sync::atomic::AtomicBool::new(false);
        let mut storage_error: Option<GraphError> = None;

        std::thread::scope(|scope| {
            for _ in 0..self.options.workers {
                let job_rx = Arc::clone(&job_rx);
                let out_tx = out_tx.clone();
                let registry = Arc::clone(&self.registry);
                scope.spawn(move || {
                    loop {
                        let job = match job_rx.lock().unwrap().recv() {
                            Ok(job) => job,
                            Err(_) => break,
                        };
                        let result = parse_one(&registry, &job);
                        if out_tx
                            .send(ParseOutput {
                                relative: job.relative,
                                result,
                            })
                            .is_err()
                        {
                            break;
                        }
                    }
                });
            }
            // The drain loop must see the channel close once workers are
            // done; only they hold clones now.
            drop(out_tx);

            let feeder_cancel = cancel.clone();
            let feeder_abort = &abort;
            scope.spawn(move || {
                for job in files {
                    if feeder_cancel.is_cancelled()
                        || feeder_abort.load(std::sync::atomic::Ordering::SeqCst)
                    {
                        break;
                    }
                    if job_tx.send(job).is_err() {
                        break;
                    }
                }
                // Dropping job_tx ends the workers
            });

            for output in out_rx.iter() {
                if storage_error.is_some() {
                    continue;
                }
                match output.result {
                    Ok(parsed) => {
                        let applied = self.store.apply_parse(
                            branch,
                            &output.relative,
                            &parsed.nodes,
                            &parsed.edges,
                        );
                        match applied {
                            Ok(()) => {
                                stats.files_indexed += 1;
                                stats.nodes_added += parsed.nodes.len() as u64;
                                stats.edges_added += parsed.edges.len() as u64;
                            }
                            Err(err) => {
                                abort.store(true, std::sync::atomic::Ordering::SeqCst);
                                storage_error = Some(err);
                            }
                        }
                    }
                    Err(err) => {
                        tracing::warn!(path = output.relative, error = %err, "parse failed");
                        stats.errors.push(SyncError {
                            path: output.relative,
                            message: err.to_string(),
                        });
                    }
                }
            }
        });

        if let Some(err) = storage_error {
            return Err(err);
        }

        if cancel.is_cancelled() {
            stats.cancelled = true;
        }
        Ok(())
    }

    /// Linker, optional summarization, stale-branch cleanup.
    fn finish_sync(
        &self,
        branch: &str,
        cancel: &CancelToken,
        stats: &mut SyncStats,
    ) -> Result<()> {
        if cancel.is_cancelled() {
            stats.cancelled = true;
            return Ok(());
        }
        stats.link_report = Linker::new(&self.store, branch).run_all(cancel);

        if self.config.agents.summarize && !cancel.is_cancelled() {
            stats.summaries = self.summarize_pass(branch, cancel)?;
        }

        if changes::is_git_repo(&self.root) && !cancel.is_cancelled() {
            match changes::list_branches(&self.root) {
                Ok(live) => {
                    self.store.cleanup_stale_branches(
                        &live,
                        branch,
                        &self.config.graph.default_branch,
                    )?;
                }
                Err(err) => {
                    tracing::warn!(error = %err, "branch cleanup skipped");
                }
            }
        }
        if cancel.is_cancelled() {
            stats.cancelled = true;
        }
        self.store.flush()?;
        Ok(())
    }

    /// Replace the target branch from the portable export file named by
    /// `.codeeagleproj`, when it is newer than the last recorded import.
    fn auto_import(
        &self,
        branch: &str,
        state: &mut SyncState,
        stats: &mut SyncStats,
    ) -> Result<()> {
        let Some(export_path) = project::read_project_conf(&self.root)? else {
            return Ok(());
        };
        if !export_path.exists() {
            return Ok(());
        }
        let mtime = export_path
            .metadata()?
            .modified()?
            .duration_since(UNIX_EPOCH)
            .map(|duration| duration.as_secs())
            .unwrap_or_default();
        let recorded = state.last_import.get(branch).copied().unwrap_or_default();
        if mtime <= recorded {
            return Ok(());
        }

        tracing::info!(file = %export_path.display(), branch, "auto-importing newer export");
        let file = std::fs::File::open(&export_path)?;
        let mut reader = std::io::BufReader::new(file);
        match self.store.import_into_branch(&mut reader, branch) {
            Ok(_) => {
                state.last_import.insert(branch.to_string(), mtime);
                stats.imported = true;
            }
            Err(err) => {
                // A bad export file degrades to a normal sync
                tracing::warn!(error = %err, "auto-import failed, continuing without it");
            }
        }
        Ok(())
    }

    fn summarize_pass(&self, branch: &str, cancel: &CancelToken) -> Result<u64> {
        let Some(summarizer) = &self.summarizer else {
            return Ok(0);
        };
        let mut summarized = 0;
        let mut targets = Vec::new();
        for node_type in [
            codeeagle_core::NodeType::Function,
            codeeagle_core::NodeType::Method,
            codeeagle_core::NodeType::Struct,
            codeeagle_core::NodeType::Class,
            codeeagle_core::NodeType::Interface,
        ] {
            targets.extend(
                self.store
                    .query_nodes(branch, &NodeFilter::of_type(node_type))?,
            );
        }
        for mut node in targets {
            if cancel.is_cancelled() {
                break;
            }
            if node.properties.contains_key("summary") {
                continue;
            }
            match summarizer.summarize(&node) {
                Ok(summary) => {
                    node.properties.insert("summary".to_string(), summary);
                    self.store.update_node(branch, node)?;
                    summarized += 1;
                }
                Err(err) => {
                    // Degraded mode: skip the node, keep the sync
                    tracing::warn!(node = %node.name, error = %err, "summarization failed");
                }
            }
        }
        Ok(summarized)
    }
}

/// Read and parse one file. A panicking parser is a per-file Parse
/// error, not a crashed sync.
fn parse_one(registry: &ParserRegistry, job: &ParseJob) -> Result<ParseResult> {
    let Some(parser) = registry.parser_for(&job.relative) else {
        return Err(GraphError::parse(&job.relative, "no parser registered"));
    };
    let content = std::fs::read(&job.absolute)
        .map_err(|err| GraphError::parse(&job.relative, err))?;
    catch_unwind(AssertUnwindSafe(|| {
        parser.parse_file(&job.relative, &content)
    }))
    .unwrap_or_else(|_| Err(GraphError::parse(&job.relative, "parser panicked")))
}
