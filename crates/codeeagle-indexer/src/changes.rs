//! Change detection: which paths differ from the last-indexed state
//!
//! Two implementations of the same narrow port: git (diff from the
//! last-indexed commit to HEAD, plus working-tree changes) and mtime
//! (walk and compare against recorded timestamps). Deleted paths are
//! surfaced explicitly. All paths are repository-relative.

use std::collections::HashMap;
use std::path::Path;
use std::process::Command;
use std::time::UNIX_EPOCH;

use globset::GlobSet;
use ignore::WalkBuilder;

use codeeagle_core::{GraphError, Result};

use crate::state::BranchSyncState;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    pub added: Vec<String>,
    pub modified: Vec<String>,
    pub deleted: Vec<String>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.deleted.is_empty()
    }

    /// Paths that need the delete-then-insert treatment.
    pub fn upserts(&self) -> impl Iterator<Item = &String> {
        self.added.iter().chain(self.modified.iter())
    }
}

/// Port over "what changed since the recorded state". Implementations
/// also return the state to record once the sync succeeds.
pub trait ChangeSource: Send + Sync {
    fn name(&self) -> &'static str;

    fn detect(&self, repo: &Path, state: &BranchSyncState)
        -> Result<(ChangeSet, BranchSyncState)>;
}

// ──────────────────────────────────────────────────────────────────────
// Git
// ──────────────────────────────────────────────────────────────────────

fn git(repo: &Path, args: &[&str]) -> Result<String> {
    let output = Command::new("git")
        .arg("-C")
        .arg(repo)
        .args(args)
        .output()
        .map_err(GraphError::external)?;
    if !output.status.success() {
        return Err(GraphError::external(format!(
            "git {} failed: {}",
            args.join(" "),
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

pub fn is_git_repo(repo: &Path) -> bool {
    repo.join(".git").exists()
}

/// Short name of the currently checked-out branch.
pub fn current_branch(repo: &Path) -> Result<String> {
    Ok(git(repo, &["rev-parse", "--abbrev-ref", "HEAD"])?.trim().to_string())
}

/// All local branch names.
pub fn list_branches(repo: &Path) -> Result<Vec<String>> {
    Ok(git(repo, &["for-each-ref", "refs/heads", "--format=%(refname:short)"])?
        .lines()
        .map(str::to_string)
        .collect())
}

fn head_commit(repo: &Path) -> Result<String> {
    Ok(git(repo, &["rev-parse", "HEAD"])?.trim().to_string())
}

pub struct GitChangeSource;

impl GitChangeSource {
    fn diff_since(repo: &Path, commit: &str, changes: &mut ChangeSet) -> Result<()> {
        let output = git(repo, &["diff", "--name-status", &format!("{commit}..HEAD")])?;
        for line in output.lines() {
            let mut parts = line.split('\t');
            let Some(status) = parts.next() else { continue };
            match status.chars().next() {
                Some('A') => {
                    if let Some(path) = parts.next() {
                        changes.added.push(path.to_string());
                    }
                }
                Some('M') | Some('T') => {
                    if let Some(path) = parts.next() {
                        changes.modified.push(path.to_string());
                    }
                }
                Some('D') => {
                    if let Some(path) = parts.next() {
                        changes.deleted.push(path.to_string());
                    }
                }
                // Renames and copies carry two paths
                Some('R') | Some('C') => {
                    if let (Some(old), Some(new)) = (parts.next(), parts.next()) {
                        changes.deleted.push(old.to_string());
                        changes.added.push(new.to_string());
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn working_tree(repo: &Path, changes: &mut ChangeSet) -> Result<()> {
        let output = git(repo, &["status", "--porcelain"])?;
        for line in output.lines() {
            if line.len() < 4 {
                continue;
            }
            let (status, path) = line.split_at(3);
            // Renames are listed as "old -> new"
            if let Some((old, new)) = path.split_once(" -> ") {
                changes.deleted.push(old.trim().to_string());
                changes.added.push(new.trim().to_string());
                continue;
            }
            let path = path.trim().to_string();
            if status.starts_with("??") {
                changes.added.push(path);
            } else if status.contains('D') {
                changes.deleted.push(path);
            } else if status.contains('M') || status.contains('A') || status.contains('T') {
                changes.modified.push(path);
            }
        }
        Ok(())
    }

    fn all_tracked(repo: &Path, changes: &mut ChangeSet) -> Result<()> {
        for path in git(repo, &["ls-files"])?.lines() {
            changes.added.push(path.to_string());
        }
        Ok(())
    }
}

impl ChangeSource for GitChangeSource {
    fn name(&self) -> &'static str {
        "git"
    }

    fn detect(
        &self,
        repo: &Path,
        state: &BranchSyncState,
    ) -> Result<(ChangeSet, BranchSyncState)> {
        let mut changes = ChangeSet::default();
        match &state.last_commit {
            Some(commit) => Self::diff_since(repo, commit, &mut changes)?,
            None => Self::all_tracked(repo, &mut changes)?,
        }
        Self::working_tree(repo, &mut changes)?;

        dedupe(&mut changes);
        let mut next = state.clone();
        next.last_commit = Some(head_commit(repo)?);
        Ok((changes, next))
    }
}

// ──────────────────────────────────────────────────────────────────────
// Mtime
// ──────────────────────────────────────────────────────────────────────

pub struct MtimeChangeSource {
    excludes: GlobSet,
}

impl MtimeChangeSource {
    pub fn new(excludes: GlobSet) -> Self {
        MtimeChangeSource { excludes }
    }
}

fn mtime_secs(path: &Path) -> Option<u64> {
    path.metadata()
        .and_then(|meta| meta.modified())
        .ok()
        .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
        .map(|duration| duration.as_secs())
}

impl ChangeSource for MtimeChangeSource {
    fn name(&self) -> &'static str {
        "mtime"
    }

    fn detect(
        &self,
        repo: &Path,
        state: &BranchSyncState,
    ) -> Result<(ChangeSet, BranchSyncState)> {
        let mut changes = ChangeSet::default();
        let mut seen: HashMap<String, u64> = HashMap::new();

        for entry in WalkBuilder::new(repo).hidden(true).build() {
            let entry = entry.map_err(GraphError::external)?;
            if !entry.file_type().is_some_and(|ft| ft.is_file()) {
                continue;
            }
            let Ok(rel) = entry.path().strip_prefix(repo) else {
                continue;
            };
            let Some(rel) = rel.to_str() else { continue };
            if self.excludes.is_match(rel) {
                continue;
            }
            let mtime = mtime_secs(entry.path()).unwrap_or_default();
            match state.mtimes.get(rel) {
                None => changes.added.push(rel.to_string()),
                Some(recorded) if *recorded != mtime => changes.modified.push(rel.to_string()),
                Some(_) => {}
            }
            seen.insert(rel.to_string(), mtime);
        }

        for path in state.mtimes.keys() {
            if !seen.contains_key(path) {
                changes.deleted.push(path.clone());
            }
        }

        dedupe(&mut changes);
        let mut next = state.clone();
        next.mtimes = seen;
        Ok((changes, next))
    }
}

/// Working-tree status can repeat paths the diff already listed.
fn dedupe(changes: &mut ChangeSet) {
    for list in [
        &mut changes.added,
        &mut changes.modified,
        &mut changes.deleted,
    ] {
        list.sort_unstable();
        list.dedup();
    }
    // A path both deleted and re-added counts as modified
    let deleted: std::collections::HashSet<String> = changes.deleted.iter().cloned().collect();
    let readded: Vec<String> = changes
        .added
        .iter()
        .filter(|path| deleted.contains(*path))
        .cloned()
        .collect();
    if !readded.is_empty() {
        changes.added.retain(|path| !readded.contains(path));
        changes.deleted.retain(|path| !readded.contains(path));
        changes.modified.extend(readded);
        changes.modified.sort_unstable();
        changes.modified.dedup();
    }
    // Upserts win over stale delete entries
    changes
        .deleted
        .retain(|path| !changes.modified.contains(path) && !changes.added.contains(path));
}
