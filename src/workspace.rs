use crate::error::{CheckerError, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use url::Url;

const WORKDIR_PREFIX: &str = "quality-checker-";
const CHECKOUT_DIR: &str = "checkout";
const ACCEPTED_SCHEMES: [&str; 5] = ["http", "https", "ssh", "git", "file"];

/// Materializes the file tree at `source` into `dest`.
#[async_trait]
pub trait RepoFetcher: Send + Sync {
    async fn fetch(&self, source: &str, dest: &Path) -> Result<()>;
}

/// Shallow `git clone` through the system git binary.
#[derive(Debug, Clone, Default)]
pub struct GitFetcher;

#[async_trait]
impl RepoFetcher for GitFetcher {
    async fn fetch(&self, source: &str, dest: &Path) -> Result<()> {
        let output = Command::new("git")
            .arg("clone")
            .arg("--depth")
            .arg("1")
            .arg("--quiet")
            .arg("--")
            .arg(source)
            .arg(dest)
            .env("GIT_TERMINAL_PROMPT", "0")
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| CheckerError::Fetch(format!("cannot run git: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CheckerError::Fetch(format!(
                "git clone of {source} failed: {}",
                stderr.trim()
            )));
        }
        Ok(())
    }
}

/// Invocation-scoped checkout. Removed by [`WorkingCopy::release`] or, as a
/// last resort, on drop.
#[derive(Debug)]
pub struct WorkingCopy {
    scratch: PathBuf,
    root: PathBuf,
    released: bool,
}

impl WorkingCopy {
    /// Root of the checked-out tree.
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Per-invocation directory holding the checkout.
    pub fn scratch_dir(&self) -> &Path {
        &self.scratch
    }

    /// Recursively deletes the scratch directory. Calling it again, or after
    /// the directory is already gone, is not an error.
    pub fn release(&mut self) -> Result<()> {
        if self.released {
            return Ok(());
        }
        remove_dir_if_exists(&self.scratch)?;
        self.released = true;
        tracing::debug!(path = %self.scratch.display(), "working copy released");
        Ok(())
    }
}

impl Drop for WorkingCopy {
    fn drop(&mut self) {
        if !self.released {
            if let Err(err) = self.release() {
                tracing::error!(
                    path = %self.scratch_dir().display(),
                    error = %err,
                    "failed to remove working copy"
                );
            }
        }
    }
}

/// Allocates a unique scratch directory under `work_root` (or the system temp
/// dir) and fetches `source` into it. Anything created is removed again if
/// the fetch fails.
pub async fn acquire(
    source: &str,
    work_root: Option<&Path>,
    fetcher: &dyn RepoFetcher,
) -> Result<WorkingCopy> {
    validate_source(source)?;

    let base = match work_root {
        Some(root) => root.to_path_buf(),
        None => std::env::temp_dir(),
    };
    std::fs::create_dir_all(&base).map_err(|e| {
        CheckerError::Fetch(format!(
            "cannot create working-directory root {}: {e}",
            base.display()
        ))
    })?;
    let scratch = tempfile::Builder::new()
        .prefix(WORKDIR_PREFIX)
        .tempdir_in(&base)
        .map_err(|e| CheckerError::Fetch(format!("cannot allocate working copy: {e}")))?
        .keep();

    let mut working_copy = WorkingCopy {
        root: scratch.join(CHECKOUT_DIR),
        scratch,
        released: false,
    };

    remove_dir_if_exists(working_copy.path()).map_err(|e| {
        CheckerError::Fetch(format!(
            "stale checkout at {} cannot be cleared: {e}",
            working_copy.path().display()
        ))
    })?;

    tracing::info!(source, dest = %working_copy.path().display(), "fetching repository");
    if let Err(err) = fetcher.fetch(source, working_copy.path()).await {
        if let Err(cleanup) = working_copy.release() {
            tracing::warn!(error = %cleanup, "cleanup after failed fetch did not complete");
        }
        return Err(err);
    }
    if !working_copy.path().is_dir() {
        working_copy.release()?;
        return Err(CheckerError::Fetch(format!(
            "fetch of {source} produced no checkout"
        )));
    }

    Ok(working_copy)
}

/// Accepts http(s)/ssh/git/file URLs and scp-style `user@host:path`.
pub fn validate_source(source: &str) -> Result<()> {
    let trimmed = source.trim();
    if trimmed.is_empty() {
        return Err(CheckerError::Fetch("repository location is empty".to_string()));
    }
    if trimmed.starts_with('-') {
        return Err(CheckerError::Fetch(format!(
            "repository location looks like an option: {trimmed}"
        )));
    }

    match Url::parse(trimmed) {
        Ok(url) if ACCEPTED_SCHEMES.contains(&url.scheme()) => {
            if url.scheme() != "file" && url.host_str().map_or(true, str::is_empty) {
                return Err(CheckerError::Fetch(format!(
                    "repository URL has no host: {trimmed}"
                )));
            }
            Ok(())
        }
        Ok(url) => Err(CheckerError::Fetch(format!(
            "unsupported repository URL scheme '{}': {trimmed}",
            url.scheme()
        ))),
        Err(_) if is_scp_like(trimmed) => Ok(()),
        Err(_) => Err(CheckerError::Fetch(format!(
            "malformed repository location: {trimmed}"
        ))),
    }
}

fn is_scp_like(source: &str) -> bool {
    let Some((host_part, path_part)) = source.split_once(':') else {
        return false;
    };
    let Some((user, host)) = host_part.split_once('@') else {
        return false;
    };
    !user.is_empty()
        && !host.is_empty()
        && !path_part.is_empty()
        && !host.contains('/')
        && !source.chars().any(char::is_whitespace)
}

fn remove_dir_if_exists(path: &Path) -> std::io::Result<()> {
    match std::fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err),
    }
}
