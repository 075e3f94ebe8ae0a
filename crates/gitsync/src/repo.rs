//! Remote repository descriptor.

use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::checkout::Checkout;
use crate::config::Config;
use crate::error::Result;
use crate::git::exec::OpContext;
use crate::git::ops;

/// Descriptor of an upstream remote: URL plus where its working clones
/// are materialized. Immutable after construction; one `Repo` may
/// produce many checkouts, sequentially or concurrently, because each
/// checkout owns an isolated directory.
///
/// Credentials are supplied via the execution environment of the git
/// subprocess, not through this API.
#[derive(Debug, Clone)]
pub struct Repo {
    url: String,
    workdir_root: PathBuf,
}

impl Repo {
    /// A descriptor whose working clones live under the system temp
    /// directory.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            workdir_root: std::env::temp_dir(),
        }
    }

    /// Overrides where working clones are materialized.
    pub fn with_workdir_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.workdir_root = root.into();
        self
    }

    /// URL of the upstream remote.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Materializes a fresh working clone bound to `config`, scoped to
    /// the configured branch. The commit identity is applied and the
    /// shorthand notes ref resolved to its canonical form before the
    /// checkout is returned; any failure after the directory appears
    /// removes it first, so a partially initialized checkout is never
    /// handed out.
    pub async fn clone(&self, ctx: &OpContext, config: Config) -> Result<Checkout> {
        let dir = self.fresh_workdir();
        let branch = (!config.branch.is_empty()).then_some(config.branch.as_str());

        if let Err(err) = ops::clone(ctx, &dir, &self.url, branch).await {
            remove_workdir(&dir);
            return Err(err);
        }
        if let Err(err) = ops::config(ctx, &dir, &config.user_name, &config.user_email).await {
            remove_workdir(&dir);
            return Err(err);
        }
        let notes_ref = match ops::get_notes_ref(ctx, &dir, &config.notes_ref).await {
            Ok(canonical) => canonical,
            Err(err) => {
                remove_workdir(&dir);
                return Err(err);
            }
        };

        Ok(Checkout::new(dir, config, self.url.clone(), notes_ref))
    }

    /// Materializes a mirror clone (all refs, no branch selection).
    /// Mirrors author no commits, so no commit identity is applied.
    pub async fn mirror(&self, ctx: &OpContext, config: Config) -> Result<Checkout> {
        let dir = self.fresh_workdir();

        if let Err(err) = ops::mirror(ctx, &dir, &self.url).await {
            remove_workdir(&dir);
            return Err(err);
        }
        let notes_ref = match ops::get_notes_ref(ctx, &dir, &config.notes_ref).await {
            Ok(canonical) => canonical,
            Err(err) => {
                remove_workdir(&dir);
                return Err(err);
            }
        };

        Ok(Checkout::new(dir, config, self.url.clone(), notes_ref))
    }

    fn fresh_workdir(&self) -> PathBuf {
        self.workdir_root.join(format!("gitsync-{}", Uuid::new_v4()))
    }
}

fn remove_workdir(dir: &Path) {
    if let Err(err) = std::fs::remove_dir_all(dir) {
        if err.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(dir = %dir.display(), error = %err, "failed to remove working clone");
        }
    }
}
