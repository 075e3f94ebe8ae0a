//! Bounded execution of single git invocations.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::error::{classify_stderr, Result, SyncError};

/// Bounds one git invocation with an optional deadline and an optional
/// cancellation signal. `Default` is unbounded.
///
/// Expiry and cancellation abort the subprocess and are surfaced as
/// [`SyncError::DeadlineExceeded`] / [`SyncError::Canceled`], distinct
/// from the subprocess's own failure, so callers can tell "we gave up
/// waiting" from "the operation failed". A context that is already
/// expired or canceled short-circuits before the subprocess is spawned.
#[derive(Debug, Clone, Default)]
pub struct OpContext {
    deadline: Option<Instant>,
    cancel: Option<watch::Receiver<bool>>,
}

impl OpContext {
    /// A context with no deadline and no cancellation signal.
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// A context that expires `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            deadline: Some(Instant::now() + timeout),
            cancel: None,
        }
    }

    /// A context that expires at `deadline`.
    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
            cancel: None,
        }
    }

    /// An unbounded context paired with a handle that cancels it.
    pub fn cancellable() -> (Self, CancelHandle) {
        let (tx, rx) = watch::channel(false);
        (
            Self {
                deadline: None,
                cancel: Some(rx),
            },
            CancelHandle { tx },
        )
    }

    /// Adds a deadline `timeout` from now to this context.
    pub fn and_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    fn expired(&self) -> bool {
        self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }

    fn canceled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|rx| *rx.borrow())
    }
}

/// Cancels the [`OpContext`] it was created with.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

/// Typed result of one git invocation.
#[derive(Debug)]
pub(crate) struct GitOutput {
    /// Exit code; `None` when the process died to a signal.
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl GitOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }
}

/// Runs one `git` invocation under `ctx` and captures its output.
///
/// Interactive credential prompts are disabled, so the call either
/// completes non-interactively or fails fast. A nonzero exit is reported
/// in the returned [`GitOutput`], not as an error; use [`run`] when a
/// nonzero exit should become a classified error.
pub(crate) async fn exec_git(
    ctx: &OpContext,
    dir: Option<&Path>,
    args: &[&str],
) -> Result<GitOutput> {
    let rendered = args.join(" ");

    if ctx.canceled() {
        return Err(SyncError::Canceled { args: rendered });
    }
    if ctx.expired() {
        return Err(SyncError::DeadlineExceeded { args: rendered });
    }

    tracing::debug!(args = %rendered, "running git");

    let mut cmd = Command::new("git");
    cmd.args(args)
        .env("GIT_TERMINAL_PROMPT", "0")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = dir {
        cmd.current_dir(dir);
    }

    let child = cmd.spawn().map_err(|source| SyncError::Spawn { source })?;
    let wait = child.wait_with_output();
    tokio::pin!(wait);

    let mut cancel = ctx.cancel.clone();
    // Dropping the wait future kills the child (kill_on_drop).
    let output = tokio::select! {
        output = &mut wait => output.map_err(|source| SyncError::Spawn { source })?,
        _ = sleep_until_deadline(ctx.deadline) => {
            return Err(SyncError::DeadlineExceeded { args: rendered });
        }
        _ = wait_canceled(&mut cancel) => {
            return Err(SyncError::Canceled { args: rendered });
        }
    };

    // The context condition wins over whatever the subprocess reported,
    // so "we gave up waiting" is never masked by a racing exit.
    if ctx.canceled() {
        return Err(SyncError::Canceled { args: rendered });
    }
    if ctx.expired() {
        return Err(SyncError::DeadlineExceeded { args: rendered });
    }

    Ok(GitOutput {
        status: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

/// Runs git and errors on nonzero exit, surfacing the first recognized
/// stderr marker line as the message. Returns captured stdout.
pub(crate) async fn run(ctx: &OpContext, dir: Option<&Path>, args: &[&str]) -> Result<String> {
    let output = exec_git(ctx, dir, args).await?;
    if output.success() {
        return Ok(output.stdout);
    }

    let (kind, message) = classify_stderr(&output.stderr);
    let message = message.unwrap_or_else(|| {
        let status = output
            .status
            .map_or_else(|| "signal".to_string(), |code| code.to_string());
        format!(
            "git {} exited with status {}: {}",
            args.join(" "),
            status,
            output.stderr.trim()
        )
    });
    Err(SyncError::Git { kind, message })
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn wait_canceled(cancel: &mut Option<watch::Receiver<bool>>) {
    if let Some(rx) = cancel {
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                // Handle dropped without firing; never canceled.
                break;
            }
        }
    }
    std::future::pending::<()>().await
}
