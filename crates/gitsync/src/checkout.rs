//! Working clone: one-off reconciliation transactions against the
//! upstream repository.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{Result, SyncError};
use crate::git::exec::OpContext;
use crate::git::ops;

/// A parsed one-line log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Commit {
    pub revision: String,
    pub message: String,
}

/// Input to a commit transaction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitAction {
    /// Optional `--author` override for the commit, applied whenever
    /// present.
    pub author: Option<String>,
    pub message: String,
}

/// A local working clone of the remote repo, intended for one-off
/// transactions: commit changes, push upstream, advance the sync tag,
/// then discard. It has no locking — a single `Checkout` must not be
/// used from multiple tasks, while independent checkouts (even of the
/// same [`Repo`](crate::Repo)) are safe because each owns an isolated
/// directory.
#[derive(Debug)]
pub struct Checkout {
    dir: PathBuf,
    config: Config,
    upstream: String,
    // Canonical notes ref, resolved once at clone time; pushes must
    // reference this exact form to avoid ref-name ambiguity.
    notes_ref: String,
}

impl Checkout {
    pub(crate) fn new(dir: PathBuf, config: Config, upstream: String, notes_ref: String) -> Self {
        Self {
            dir,
            config,
            upstream,
            notes_ref,
        }
    }

    /// Path of the working clone.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Directory handed to the manifest-applying collaborator: the clone
    /// root joined with the configured subdirectory.
    pub fn manifest_dir(&self) -> PathBuf {
        self.dir.join(&self.config.path)
    }

    /// The config this checkout is bound to.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// URL of the upstream remote.
    pub fn upstream(&self) -> &str {
        &self.upstream
    }

    /// Commits changes made in this checkout, attaches `note` (JSON) to
    /// the new commit when given, and pushes the tracked branch — plus
    /// the notes ref, when it exists — upstream in one push call.
    ///
    /// Returns the [`SyncError::NoChanges`] sentinel when the working
    /// tree under the configured path does not differ from HEAD; no
    /// commit or push is performed in that case. The configured skip
    /// marker is appended to the message so the agent can recognize its
    /// own commits later. A push failure is wrapped as
    /// [`SyncError::Push`] carrying the upstream URL.
    pub async fn commit_and_push<N: Serialize>(
        &self,
        ctx: &OpContext,
        mut action: CommitAction,
        note: Option<&N>,
    ) -> Result<()> {
        if !ops::has_local_changes(ctx, &self.dir, &self.config.path).await? {
            return Err(SyncError::NoChanges {
                path: self.config.path.clone(),
            });
        }

        action.message.push_str(&self.config.skip_message);
        ops::commit(ctx, &self.dir, &action).await?;

        if let Some(note) = note {
            let head = ops::ref_revision(ctx, &self.dir, "HEAD").await?;
            ops::add_note(ctx, &self.dir, &head, &self.config.notes_ref, note).await?;
        }

        let mut refs = vec![self.config.branch.as_str()];
        if ops::ref_exists(ctx, &self.dir, &self.notes_ref).await? {
            refs.push(self.notes_ref.as_str());
        }

        ops::push(ctx, &self.dir, &self.upstream, &refs)
            .await
            .map_err(|source| SyncError::Push {
                upstream: self.upstream.clone(),
                source: Box::new(source),
            })
    }

    /// Reads the note attached to `revision`, or `None` when it has
    /// none. Absence is not an error.
    pub async fn get_note<T: DeserializeOwned>(
        &self,
        ctx: &OpContext,
        revision: &str,
    ) -> Result<Option<T>> {
        ops::get_note(ctx, &self.dir, &self.notes_ref, revision).await
    }

    /// All revisions bearing a note. Set semantics; the underlying tool
    /// does not order the listing chronologically.
    pub async fn note_rev_list(&self, ctx: &OpContext) -> Result<HashSet<String>> {
        ops::note_rev_list(ctx, &self.dir, &self.notes_ref).await
    }

    pub async fn head_revision(&self, ctx: &OpContext) -> Result<String> {
        ops::ref_revision(ctx, &self.dir, "HEAD").await
    }

    pub async fn sync_revision(&self, ctx: &OpContext) -> Result<String> {
        ops::ref_revision(ctx, &self.dir, &self.config.sync_tag).await
    }

    pub async fn dev_ops_sync_revision(&self, ctx: &OpContext) -> Result<String> {
        ops::ref_revision(ctx, &self.dir, &self.config.dev_ops_tag).await
    }

    /// Advances the sync tag to `reference` and force-pushes it: the
    /// record that reconciliation succeeded up to that commit.
    pub async fn move_sync_tag_and_push(
        &self,
        ctx: &OpContext,
        reference: &str,
        message: &str,
    ) -> Result<()> {
        ops::move_tag_and_push(
            ctx,
            &self.dir,
            &self.config.sync_tag,
            reference,
            message,
            &self.upstream,
        )
        .await
    }

    /// Files under the configured path that changed relative to
    /// `reference`, as `(absolute, repo-relative)` path lists. Files
    /// deleted relative to `reference` are not reported.
    pub async fn changed_files(
        &self,
        ctx: &OpContext,
        reference: &str,
    ) -> Result<(Vec<PathBuf>, Vec<String>)> {
        let relative = ops::changed_files(ctx, &self.dir, &self.config.path, reference).await?;
        let absolute = relative.iter().map(|file| self.dir.join(file)).collect();
        Ok((absolute, relative))
    }

    /// Most recent commit touching `file`.
    pub async fn file_last_commit(&self, ctx: &OpContext, file: &str) -> Result<String> {
        ops::file_last_commit(ctx, &self.dir, file).await
    }

    /// One-line log for `refspec`, scoped to the configured path when
    /// one is set.
    pub async fn commits(&self, ctx: &OpContext, refspec: &str) -> Result<Vec<Commit>> {
        let subdir = (!self.config.path.is_empty()).then_some(self.config.path.as_str());
        ops::oneline_log(ctx, &self.dir, refspec, subdir).await
    }

    /// All commit ids reachable from `reference`.
    pub async fn rev_list(&self, ctx: &OpContext, reference: &str) -> Result<Vec<String>> {
        ops::rev_list(ctx, &self.dir, reference).await
    }

    /// Fetches tags plus the given refspecs from the upstream; a refspec
    /// missing on the remote is not an error.
    pub async fn fetch(&self, ctx: &OpContext, refspecs: &[&str]) -> Result<()> {
        ops::fetch(ctx, &self.dir, &self.upstream, refspecs).await
    }

    /// Verifies write access to the upstream without mutating real
    /// history.
    pub async fn check_push(&self, ctx: &OpContext) -> Result<()> {
        ops::check_push(ctx, &self.dir, &self.upstream).await
    }

    /// Removes the working clone from disk. Idempotent: safe to call
    /// repeatedly or on a checkout whose directory is already gone.
    pub fn clean(&self) {
        if let Err(err) = std::fs::remove_dir_all(&self.dir) {
            if err.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(
                    dir = %self.dir.display(),
                    error = %err,
                    "failed to remove working clone"
                );
            }
        }
    }
}

impl Drop for Checkout {
    // Early-return failure paths in callers must not leak temp dirs.
    fn drop(&mut self) {
        self.clean();
    }
}
