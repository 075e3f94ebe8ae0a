//! Version-control-backed state synchronization core.
//!
//! Treats an upstream git repository as the replicated source of desired
//! state: produce an ephemeral working clone, detect what changed since the
//! last reconciled point, commit derived changes with out-of-band metadata
//! attached as notes, and advance a movable annotated tag marking "last
//! reconciled commit". All repository access goes through the external `git`
//! tool; this crate adds bounded execution, error classification, and
//! transaction composition, not a VCS implementation.
//!
//! The three layers, bottom up:
//! - [`git`] — failure-classifying wrappers around single git invocations.
//! - [`checkout`] — one ephemeral working clone, composing invocations into
//!   transactions (commit+push, tag move, note read/write).
//! - [`repo`] — long-lived remote descriptor producing fresh checkouts.

pub mod checkout;
pub mod config;
pub mod error;
pub mod git;
pub mod repo;

pub use checkout::{Checkout, Commit, CommitAction};
pub use config::Config;
pub use error::{classify_stderr, Result, StderrKind, SyncError};
pub use git::{CancelHandle, OpContext};
pub use repo::Repo;
