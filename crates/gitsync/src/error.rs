//! Error types and git stderr classification.

use thiserror::Error;

/// Closed set of recognized git stderr shapes.
///
/// Expected-absence kinds (`UnknownRevision`, `NoNoteFound`,
/// `MissingRemoteRef`) are converted to negative results by the operation
/// wrappers instead of being surfaced as errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StderrKind {
    /// The ref does not resolve to a revision.
    UnknownRevision,
    /// The revision carries no note under the namespace.
    NoNoteFound,
    /// A fetched refspec does not exist on the remote.
    MissingRemoteRef,
    /// Any other `fatal: `-prefixed line.
    Fatal,
    /// Any other `error:`-prefixed line.
    GenericError,
    /// No recognized marker in stderr.
    Unrecognized,
}

/// Errors surfaced by the synchronization core.
#[derive(Error, Debug)]
pub enum SyncError {
    /// The bounding deadline expired before the invocation completed.
    #[error("git {args}: deadline exceeded")]
    DeadlineExceeded { args: String },

    /// The bounding context was canceled before the invocation completed.
    #[error("git {args}: canceled")]
    Canceled { args: String },

    #[error("failed to spawn git: {source}")]
    Spawn {
        #[source]
        source: std::io::Error,
    },

    /// A git invocation exited nonzero; `message` is the first recognized
    /// stderr marker line, or the raw failure when none matched.
    #[error("{message}")]
    Git { kind: StderrKind, message: String },

    /// The working tree has no changes under the configured path.
    /// A sentinel for callers, not an operational failure.
    #[error("no local changes under '{path}'")]
    NoChanges { path: String },

    /// A push to the upstream failed. Likely transient (stale remote, a
    /// race with another writer), unlike a commit failure.
    #[error("failed to push to '{upstream}': {source}")]
    Push {
        upstream: String,
        #[source]
        source: Box<SyncError>,
    },

    /// diff misreads github-style root paths, so they are rejected before
    /// any subprocess is invoked.
    #[error("subdirectory must not have a leading forward slash: '{0}'")]
    AbsoluteSubdir(String),

    #[error("invalid note payload: {0}")]
    Note(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl SyncError {
    /// True for the "no local changes" sentinel.
    pub fn is_no_changes(&self) -> bool {
        matches!(self, SyncError::NoChanges { .. })
    }

    pub fn is_deadline_exceeded(&self) -> bool {
        match self {
            SyncError::DeadlineExceeded { .. } => true,
            SyncError::Push { source, .. } => source.is_deadline_exceeded(),
            _ => false,
        }
    }

    pub fn is_canceled(&self) -> bool {
        match self {
            SyncError::Canceled { .. } => true,
            SyncError::Push { source, .. } => source.is_canceled(),
            _ => false,
        }
    }

    /// Kind of the underlying classified git failure, when there is one.
    pub fn git_kind(&self) -> Option<StderrKind> {
        match self {
            SyncError::Git { kind, .. } => Some(*kind),
            SyncError::Push { source, .. } => source.git_kind(),
            _ => None,
        }
    }
}

/// Result type for synchronization operations.
pub type Result<T> = std::result::Result<T, SyncError>;

/// Classifies captured stderr into a [`StderrKind`] plus the first
/// recognized marker line, when one matched.
///
/// Pure function so the matching rules stay centralized and testable
/// without running a subprocess.
pub fn classify_stderr(stderr: &str) -> (StderrKind, Option<String>) {
    let lower = stderr.to_lowercase();

    if lower.contains("unknown revision") {
        return (StderrKind::UnknownRevision, first_marker_line(stderr));
    }
    if lower.contains("no note found for object") {
        return (StderrKind::NoNoteFound, first_marker_line(stderr));
    }
    if lower.contains("couldn't find remote ref") {
        return (StderrKind::MissingRemoteRef, first_marker_line(stderr));
    }

    for line in stderr.lines() {
        // "ERROR fatal: " shows up on some distributions
        if line.starts_with("fatal: ") || line.starts_with("ERROR fatal: ") {
            return (StderrKind::Fatal, Some(line.trim().to_string()));
        }
        if let Some(rest) = line.strip_prefix("error:") {
            return (StderrKind::GenericError, Some(rest.trim().to_string()));
        }
    }

    (StderrKind::Unrecognized, None)
}

fn first_marker_line(stderr: &str) -> Option<String> {
    stderr
        .lines()
        .find(|line| {
            line.starts_with("fatal: ")
                || line.starts_with("ERROR fatal: ")
                || line.starts_with("error:")
        })
        .map(|line| line.trim().to_string())
}
