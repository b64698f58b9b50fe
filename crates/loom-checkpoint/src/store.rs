// SPDX-License-Identifier: MIT
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use git2::{Oid, Repository, Signature, Sort, Tree};

use crate::checkpoint::Checkpoint;
use crate::error::CheckpointError;

const SIGNATURE_NAME: &str = "loom-checkpoint";
const SIGNATURE_EMAIL: &str = "loom-checkpoint@localhost";
const COMMIT_PREFIX: &str = "CHECKPOINT: ";
const ADVICE_ONLY_SUFFIX: &str = " (advice-only)";

/// Content-addressed, git-backed snapshot database for a workspace.
///
/// Stores blobs, trees and commits in a bare repository under
/// `<workspaceDataDir>/checkpoints`; the real working directory is never
/// turned into a git worktree, so this coexists with the project's own git
/// repository (if any) without interference.
pub struct CheckpointStore {
    repo: Repository,
    working_dir: PathBuf,
    exclude: Vec<PathBuf>,
}

impl CheckpointStore {
    /// Open the store, initializing it lazily on first use: a fresh bare
    /// repository with a deterministic identity and an initial empty commit.
    pub fn open(working_dir: impl Into<PathBuf>, store_dir: impl Into<PathBuf>) -> Result<Self, CheckpointError> {
        let working_dir = working_dir.into();
        let store_dir = store_dir.into();

        let repo = if store_dir.join("HEAD").exists() {
            Repository::open_bare(&store_dir)?
        } else {
            std::fs::create_dir_all(&store_dir)?;
            let repo = Repository::init_bare(&store_dir)?;
            let sig = Signature::now(SIGNATURE_NAME, SIGNATURE_EMAIL)?;
            let empty_tree_oid = repo.treebuilder(None)?.write()?;
            let empty_tree = repo.find_tree(empty_tree_oid)?;
            repo.commit(Some("HEAD"), &sig, &sig, &format!("{COMMIT_PREFIX}initial"), &empty_tree, &[])?;
            repo
        };

        let exclude = vec![store_dir];
        Ok(Self { repo, working_dir, exclude })
    }

    /// Snapshot the working directory. Records an advice-only checkpoint
    /// (suffix `(advice-only)`) when no file content changed.
    pub fn create_checkpoint(&self, name: &str) -> Result<String, CheckpointError> {
        let head_commit = self.head_commit()?;
        let parent_tree = head_commit.tree()?;
        let new_tree_oid = self.build_tree(&self.working_dir)?;
        let advice_only = new_tree_oid == parent_tree.id();

        let commit_name =
            if advice_only { format!("{COMMIT_PREFIX}{name}{ADVICE_ONLY_SUFFIX}") } else { format!("{COMMIT_PREFIX}{name}") };

        let sig = Signature::now(SIGNATURE_NAME, SIGNATURE_EMAIL)?;
        let new_tree = self.repo.find_tree(new_tree_oid)?;
        let commit_oid = self.repo.commit(Some("HEAD"), &sig, &sig, &commit_name, &new_tree, &[&head_commit])?;
        tracing::debug!(checkpoint = %commit_oid, advice_only, "created checkpoint");
        Ok(commit_oid.to_string())
    }

    pub fn get_checkpoint_details(&self, id: &str) -> Result<Checkpoint, CheckpointError> {
        let commit = self.find_commit(id)?;
        self.checkpoint_from_commit(&commit)
    }

    /// Chronological list (oldest first). Every commit in this store carries
    /// the `CHECKPOINT: ` prefix by construction; any commit lacking it is
    /// foreign and filtered out.
    pub fn list_checkpoints(&self) -> Result<Vec<Checkpoint>, CheckpointError> {
        let mut revwalk = self.repo.revwalk()?;
        revwalk.push_head()?;
        revwalk.set_sorting(Sort::TOPOLOGICAL | Sort::REVERSE)?;

        let mut out = Vec::new();
        for oid in revwalk {
            let commit = self.repo.find_commit(oid?)?;
            if !commit.message().unwrap_or_default().starts_with(COMMIT_PREFIX) {
                continue;
            }
            out.push(self.checkpoint_from_commit(&commit)?);
        }
        Ok(out)
    }

    /// Restore working-directory files to the checkpoint's snapshot. If the
    /// checkpoint is not advice-only, first records a backup checkpoint of
    /// the current state so the apply itself is undoable.
    pub fn apply_checkpoint(&self, id: &str) -> Result<(), CheckpointError> {
        let target_commit = self.find_commit(id)?;
        let checkpoint = self.checkpoint_from_commit(&target_commit)?;

        if !checkpoint.advice_only {
            let backup_name = format!("backup-before-applying-{}", short_id(&checkpoint.id));
            self.create_checkpoint(&backup_name)?;
        }

        let tree = target_commit.tree()?;
        self.restore_tree(&tree, &self.working_dir)?;
        tracing::info!(checkpoint = %checkpoint.id, "applied checkpoint");
        Ok(())
    }

    fn head_commit(&self) -> Result<git2::Commit<'_>, CheckpointError> {
        Ok(self.repo.head()?.peel_to_commit()?)
    }

    fn find_commit(&self, id: &str) -> Result<git2::Commit<'_>, CheckpointError> {
        let object = self.repo.revparse_single(id).map_err(|_| CheckpointError::NotFound(id.to_string()))?;
        object.peel_to_commit().map_err(|_| CheckpointError::NotFound(id.to_string()))
    }

    fn checkpoint_from_commit(&self, commit: &git2::Commit) -> Result<Checkpoint, CheckpointError> {
        let message = commit.message().unwrap_or_default();
        let (advice_only, raw_name) = match message.strip_prefix(COMMIT_PREFIX) {
            Some(rest) => match rest.strip_suffix(ADVICE_ONLY_SUFFIX) {
                Some(stripped) => (true, stripped.to_string()),
                None => (false, rest.to_string()),
            },
            None => (false, message.to_string()),
        };

        let timestamp = DateTime::<Utc>::from_timestamp(commit.time().seconds(), 0).unwrap_or_else(Utc::now);

        let files = if advice_only {
            Vec::new()
        } else if commit.parent_count() == 0 {
            diff_files(&self.repo, None, &commit.tree()?)?
        } else {
            let parent_tree = commit.parent(0)?.tree()?;
            diff_files(&self.repo, Some(&parent_tree), &commit.tree()?)?
        };

        Ok(Checkpoint { id: commit.id().to_string(), name: raw_name, timestamp, files, advice_only })
    }

    fn build_tree(&self, dir: &Path) -> Result<Oid, CheckpointError> {
        let builder = self.repo.treebuilder(None)?;
        let mut entries: Vec<_> = std::fs::read_dir(dir)?.filter_map(|e| e.ok()).collect();
        entries.sort_by_key(|e| e.file_name());

        for entry in entries {
            let path = entry.path();
            if self.exclude.iter().any(|ex| path == *ex) {
                continue;
            }
            let name = entry.file_name();
            let name = name.to_string_lossy();
            let file_type = entry.file_type()?;

            if file_type.is_dir() {
                let sub_oid = self.build_tree(&path)?;
                let sub_tree = self.repo.find_tree(sub_oid)?;
                if sub_tree.len() > 0 {
                    builder.insert(name.as_ref(), sub_oid, 0o040000)?;
                }
            } else if file_type.is_file() {
                let bytes = std::fs::read(&path)?;
                let oid = self.repo.blob(&bytes)?;
                builder.insert(name.as_ref(), oid, executable_mode(&path))?;
            }
        }

        Ok(builder.write()?)
    }

    fn restore_tree(&self, tree: &Tree, dir: &Path) -> Result<(), CheckpointError> {
        for entry in tree.iter() {
            let name = entry.name().unwrap_or_default();
            let path = dir.join(name);
            match entry.kind() {
                Some(git2::ObjectType::Blob) => {
                    let blob = self.repo.find_blob(entry.id())?;
                    if let Some(parent) = path.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    std::fs::write(&path, blob.content())?;
                }
                Some(git2::ObjectType::Tree) => {
                    std::fs::create_dir_all(&path)?;
                    let sub_tree = self.repo.find_tree(entry.id())?;
                    self.restore_tree(&sub_tree, &path)?;
                }
                _ => {}
            }
        }
        Ok(())
    }
}

fn diff_files(repo: &Repository, old: Option<&Tree>, new: &Tree) -> Result<Vec<PathBuf>, CheckpointError> {
    let diff = repo.diff_tree_to_tree(old, Some(new), None)?;
    let mut files = Vec::new();
    for delta in diff.deltas() {
        if let Some(path) = delta.new_file().path().or_else(|| delta.old_file().path()) {
            files.push(path.to_path_buf());
        }
    }
    Ok(files)
}

fn short_id(id: &str) -> &str {
    &id[..id.len().min(8)]
}

#[cfg(unix)]
fn executable_mode(path: &Path) -> i32 {
    use std::os::unix::fs::PermissionsExt;
    match std::fs::metadata(path) {
        Ok(meta) if meta.permissions().mode() & 0o111 != 0 => 0o100755,
        _ => 0o100644,
    }
}

#[cfg(not(unix))]
fn executable_mode(_path: &Path) -> i32 {
    0o100644
}
