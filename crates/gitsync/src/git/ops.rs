//! Thin wrappers, one per git operation. Each is a composition of
//! [`exec`](super::exec) plus an edge-case policy, not independent logic.

use std::collections::HashSet;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::exec::{exec_git, run, OpContext};
use super::parse::{note_object, split_list, split_log};
use crate::checkout::{Commit, CommitAction};
use crate::error::{Result, StderrKind, SyncError};

/// Throwaway tag used to verify write access to the upstream.
pub(crate) const CHECK_PUSH_TAG: &str = "sync-write-check";

/// Sets the commit identity in the clone; the first failure aborts.
pub(crate) async fn config(ctx: &OpContext, dir: &Path, name: &str, email: &str) -> Result<()> {
    run(ctx, Some(dir), &["config", "user.name", name]).await?;
    run(ctx, Some(dir), &["config", "user.email", email]).await?;
    Ok(())
}

/// Clones `url` into `dir`, scoped to `branch` when given.
pub(crate) async fn clone(
    ctx: &OpContext,
    dir: &Path,
    url: &str,
    branch: Option<&str>,
) -> Result<()> {
    let target = utf8_path(dir)?;
    let mut args = vec!["clone"];
    if let Some(branch) = branch.filter(|b| !b.is_empty()) {
        args.extend(["--branch", branch]);
    }
    args.extend([url, target]);
    run(ctx, None, &args).await?;
    Ok(())
}

/// Mirror-clones `url` into `dir` (all refs, no branch selection).
pub(crate) async fn mirror(ctx: &OpContext, dir: &Path, url: &str) -> Result<()> {
    run(ctx, None, &["clone", "--mirror", url, utf8_path(dir)?]).await?;
    Ok(())
}

/// Sanity-checks write access to the upstream without touching real
/// history: force-create a throwaway tag, push it, delete it remotely.
/// A failure on the final delete is still an error.
pub(crate) async fn check_push(ctx: &OpContext, dir: &Path, upstream: &str) -> Result<()> {
    // --force in case the tag came along with the clone
    run(ctx, Some(dir), &["tag", "--force", CHECK_PUSH_TAG]).await?;
    run(ctx, Some(dir), &["push", "--force", upstream, "tag", CHECK_PUSH_TAG]).await?;
    run(ctx, Some(dir), &["push", "--delete", upstream, "tag", CHECK_PUSH_TAG]).await?;
    Ok(())
}

/// Commits all tracked changes; the message is used verbatim.
pub(crate) async fn commit(ctx: &OpContext, dir: &Path, action: &CommitAction) -> Result<()> {
    match action.author.as_deref().filter(|author| !author.is_empty()) {
        Some(author) => {
            run(
                ctx,
                Some(dir),
                &[
                    "commit",
                    "--no-verify",
                    "-a",
                    "--author",
                    author,
                    "-m",
                    &action.message,
                ],
            )
            .await?
        }
        None => {
            run(
                ctx,
                Some(dir),
                &["commit", "--no-verify", "-a", "-m", &action.message],
            )
            .await?
        }
    };
    Ok(())
}

/// Pushes the given refs to the upstream; any failure aborts the whole
/// call, there is no partial-success signaling.
pub(crate) async fn push(ctx: &OpContext, dir: &Path, upstream: &str, refs: &[&str]) -> Result<()> {
    let mut args = vec!["push", upstream];
    args.extend_from_slice(refs);
    run(ctx, Some(dir), &args).await?;
    Ok(())
}

/// Fetches tags plus the given refspecs from the upstream. A refspec
/// missing on the remote is not an error.
pub(crate) async fn fetch(
    ctx: &OpContext,
    dir: &Path,
    upstream: &str,
    refspecs: &[&str],
) -> Result<()> {
    let mut args = vec!["fetch", "--tags", upstream];
    args.extend_from_slice(refspecs);
    match run(ctx, Some(dir), &args).await {
        Err(SyncError::Git {
            kind: StderrKind::MissingRemoteRef,
            ..
        }) => Ok(()),
        other => other.map(|_| ()),
    }
}

/// Whether `reference` resolves; an unknown revision is "does not
/// exist", not an error.
pub(crate) async fn ref_exists(ctx: &OpContext, dir: &Path, reference: &str) -> Result<bool> {
    match run(ctx, Some(dir), &["rev-list", reference]).await {
        Ok(_) => Ok(true),
        Err(SyncError::Git {
            kind: StderrKind::UnknownRevision,
            ..
        }) => Ok(false),
        Err(err) => Err(err),
    }
}

/// Resolves a shorthand notes ref to its fully qualified form.
pub(crate) async fn get_notes_ref(ctx: &OpContext, dir: &Path, shorthand: &str) -> Result<String> {
    let out = run(ctx, Some(dir), &["notes", "--ref", shorthand, "get-ref"]).await?;
    Ok(out.trim().to_string())
}

/// Attaches `note`, serialized as JSON, to `revision` under the
/// namespace.
pub(crate) async fn add_note<N: Serialize>(
    ctx: &OpContext,
    dir: &Path,
    revision: &str,
    notes_ref: &str,
    note: &N,
) -> Result<()> {
    let payload = serde_json::to_string(note)?;
    run(
        ctx,
        Some(dir),
        &["notes", "--ref", notes_ref, "add", "-m", &payload, revision],
    )
    .await?;
    Ok(())
}

/// Reads the note attached to `revision`, or `None` when it has none.
pub(crate) async fn get_note<T: DeserializeOwned>(
    ctx: &OpContext,
    dir: &Path,
    notes_ref: &str,
    revision: &str,
) -> Result<Option<T>> {
    match run(ctx, Some(dir), &["notes", "--ref", notes_ref, "show", revision]).await {
        Ok(out) => Ok(Some(serde_json::from_str(&out)?)),
        Err(SyncError::Git {
            kind: StderrKind::NoNoteFound,
            ..
        }) => Ok(None),
        Err(err) => Err(err),
    }
}

/// All revisions bearing a note under the namespace, as a set. Git
/// orders the listing by object id, not by time, so no ordering is
/// promised.
pub(crate) async fn note_rev_list(
    ctx: &OpContext,
    dir: &Path,
    notes_ref: &str,
) -> Result<HashSet<String>> {
    let out = run(ctx, Some(dir), &["notes", "--ref", notes_ref, "list"]).await?;
    Ok(split_list(&out)
        .iter()
        .filter_map(|line| note_object(line))
        .map(str::to_string)
        .collect())
}

/// Resolves `reference` to its latest commit id.
pub(crate) async fn ref_revision(ctx: &OpContext, dir: &Path, reference: &str) -> Result<String> {
    let out = run(ctx, Some(dir), &["rev-list", "--max-count", "1", reference]).await?;
    Ok(out.trim().to_string())
}

/// All commit ids reachable from `reference`.
pub(crate) async fn rev_list(ctx: &OpContext, dir: &Path, reference: &str) -> Result<Vec<String>> {
    let out = run(ctx, Some(dir), &["rev-list", reference]).await?;
    Ok(split_list(&out))
}

/// `(revision, message)` pairs for `refspec`, optionally scoped to a
/// subdirectory.
pub(crate) async fn oneline_log(
    ctx: &OpContext,
    dir: &Path,
    refspec: &str,
    subdir: Option<&str>,
) -> Result<Vec<Commit>> {
    let mut args = vec!["log", "--oneline", "--no-abbrev-commit", refspec];
    // An empty pathspec is invalid input to git, so the suffix is
    // omitted entirely when there is no subdirectory.
    if let Some(subdir) = subdir.filter(|s| !s.is_empty()) {
        args.extend(["--", subdir]);
    }
    let out = run(ctx, Some(dir), &args).await?;
    Ok(split_log(&out))
}

/// Force-moves the annotated `tag` to `reference`, then force-pushes it
/// upstream. The local move must succeed before the push is attempted.
pub(crate) async fn move_tag_and_push(
    ctx: &OpContext,
    dir: &Path,
    tag: &str,
    reference: &str,
    message: &str,
    upstream: &str,
) -> Result<()> {
    run(
        ctx,
        Some(dir),
        &["tag", "--force", "-a", "-m", message, tag, reference],
    )
    .await?;
    run(ctx, Some(dir), &["push", "--force", upstream, "tag", tag]).await?;
    Ok(())
}

/// Files under `subdir` that differ between `reference` and the working
/// tree. Only files still present in the working tree are reported
/// (added/copied/modified/renamed/type-changed); deletions are excluded.
pub(crate) async fn changed_files(
    ctx: &OpContext,
    dir: &Path,
    subdir: &str,
    reference: &str,
) -> Result<Vec<String>> {
    // diff misreads github-style root paths
    if subdir.starts_with('/') {
        return Err(SyncError::AbsoluteSubdir(subdir.to_string()));
    }
    let mut args = vec!["diff", "--name-only", "--diff-filter=ACMRT", reference];
    if !subdir.is_empty() {
        args.extend(["--", subdir]);
    }
    let out = run(ctx, Some(dir), &args).await?;
    Ok(split_list(&out))
}

/// Most recent commit touching `file`.
pub(crate) async fn file_last_commit(ctx: &OpContext, dir: &Path, file: &str) -> Result<String> {
    let out = run(
        ctx,
        Some(dir),
        &["log", "-n", "1", "--pretty=format:%H", "--", file],
    )
    .await?;
    Ok(out.trim().to_string())
}

/// True when the working tree differs from HEAD under `subdir`.
pub(crate) async fn has_local_changes(ctx: &OpContext, dir: &Path, subdir: &str) -> Result<bool> {
    // --quiet exits 1 when there are differences; nothing is captured
    let mut args = vec!["diff", "--quiet"];
    if !subdir.is_empty() {
        args.extend(["--", subdir]);
    }
    let out = exec_git(ctx, Some(dir), &args).await?;
    Ok(!out.success())
}

fn utf8_path(dir: &Path) -> Result<&str> {
    dir.to_str().ok_or_else(|| {
        SyncError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "working directory path is not valid UTF-8",
        ))
    })
}
