//! Reconciliation parameters bound to one working clone.

use serde::{Deserialize, Serialize};

/// Values used when working in a clone of the upstream repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Branch the agent syncs to and pushes.
    #[serde(default = "default_branch")]
    pub branch: String,

    /// Subdirectory within the repo containing the files of interest.
    /// Empty means the whole tree.
    #[serde(default)]
    pub path: String,

    /// Movable annotated tag marking the last commit reconciled against
    /// the cluster.
    #[serde(default = "default_sync_tag")]
    pub sync_tag: String,

    /// Secondary marker tag for a distinct reconciliation checkpoint.
    #[serde(default = "default_dev_ops_tag")]
    pub dev_ops_tag: String,

    /// Shorthand notes namespace for out-of-band commit metadata.
    #[serde(default = "default_notes_ref")]
    pub notes_ref: String,

    /// Git user name for agent-authored commits.
    #[serde(default = "default_user_name")]
    pub user_name: String,

    /// Git user email for agent-authored commits.
    #[serde(default = "default_user_email")]
    pub user_email: String,

    /// Whether callers embedding this config should attach an author
    /// override to the commits they produce. The commit path itself
    /// honours any override it is handed.
    #[serde(default)]
    pub set_author: bool,

    /// Suffix appended to every agent-authored commit message, so the
    /// agent can recognize and skip its own commits later.
    #[serde(default)]
    pub skip_message: String,

    /// Poll interval in seconds, consumed by the embedding
    /// reconciliation loop rather than by this crate.
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_sync_tag() -> String {
    "sync".to_string()
}

fn default_dev_ops_tag() -> String {
    "devops-sync".to_string()
}

fn default_notes_ref() -> String {
    "gitsync".to_string()
}

fn default_user_name() -> String {
    "Gitsync".to_string()
}

fn default_user_email() -> String {
    "gitsync@localhost".to_string()
}

fn default_poll_interval() -> u64 {
    300 // 5 minutes
}

impl Default for Config {
    fn default() -> Self {
        Self {
            branch: default_branch(),
            path: String::new(),
            sync_tag: default_sync_tag(),
            dev_ops_tag: default_dev_ops_tag(),
            notes_ref: default_notes_ref(),
            user_name: default_user_name(),
            user_email: default_user_email(),
            set_author: false,
            skip_message: String::new(),
            poll_interval: default_poll_interval(),
        }
    }
}
