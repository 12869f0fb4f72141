use crate::corpus::{self, Corpus};
use crate::error::{CheckerError, Result};
use crate::oracle::Oracle;
use crate::parse;
use crate::scan::{self, ExtensionAllowlist};
use crate::types::config::{AggregateOptions, CheckerConfig};
use crate::types::summary::QualitySummary;
use crate::workspace::{self, RepoFetcher};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Fetch → discover → aggregate → analyze → parse, with the working copy
/// released on every exit path once it has been acquired.
pub struct Pipeline {
    fetcher: Arc<dyn RepoFetcher>,
    oracle: Arc<dyn Oracle>,
    allowlist: ExtensionAllowlist,
    exclude_dirs: Vec<String>,
    aggregate: AggregateOptions,
    work_root: Option<PathBuf>,
}

impl Pipeline {
    pub fn new(
        config: &CheckerConfig,
        fetcher: Arc<dyn RepoFetcher>,
        oracle: Arc<dyn Oracle>,
    ) -> Self {
        let discovery = config.discovery_settings();
        Self {
            fetcher,
            oracle,
            allowlist: ExtensionAllowlist::from(&discovery),
            exclude_dirs: discovery.exclude_dirs,
            aggregate: config.aggregate_options(),
            work_root: config.work_root(),
        }
    }

    pub fn with_work_root(mut self, work_root: Option<PathBuf>) -> Self {
        if work_root.is_some() {
            self.work_root = work_root;
        }
        self
    }

    pub async fn run(&self, source: &str, cancel: &CancellationToken) -> Result<QualitySummary> {
        let mut working_copy = or_cancel(
            cancel,
            workspace::acquire(source, self.work_root.as_deref(), self.fetcher.as_ref()),
        )
        .await??;

        let outcome = self.run_stages(working_copy.path(), cancel).await;
        let released = working_copy.release();

        match (outcome, released) {
            (Ok(summary), Ok(())) => Ok(summary),
            (Ok(_), Err(err)) => Err(err),
            (Err(err), Ok(())) => Err(err),
            (Err(err), Err(cleanup)) => {
                tracing::warn!(error = %cleanup, "working copy cleanup failed after pipeline error");
                Err(err)
            }
        }
    }

    async fn run_stages(&self, root: &Path, cancel: &CancellationToken) -> Result<QualitySummary> {
        let corpus = self.build_corpus(root).await?;
        if corpus.is_empty() {
            tracing::warn!("no matching source files; sending empty corpus");
        }
        tracing::debug!(
            files = corpus.files.len(),
            bytes = corpus.len_bytes(),
            skipped = corpus.skipped.len(),
            truncated = corpus.truncated.len(),
            boundary = %corpus.boundary,
            "corpus ready"
        );

        let raw = or_cancel(cancel, self.oracle.analyze(&corpus.text)).await??;
        let summary = parse::extract(&raw.text);
        tracing::info!(
            score = ?summary.score,
            improvements = summary.improvements.len(),
            "analysis parsed"
        );
        Ok(summary)
    }

    async fn build_corpus(&self, root: &Path) -> Result<Corpus> {
        let root = root.to_path_buf();
        let allowlist = self.allowlist.clone();
        let exclude_dirs = self.exclude_dirs.clone();
        let options = self.aggregate;
        tokio::task::spawn_blocking(move || {
            let paths = scan::discover(&root, &allowlist, &exclude_dirs)?;
            corpus::aggregate(&root, &paths, &options)
        })
        .await
        .map_err(|e| CheckerError::Io(std::io::Error::other(e)))?
    }
}

async fn or_cancel<F>(cancel: &CancellationToken, future: F) -> Result<F::Output>
where
    F: Future,
{
    tokio::select! {
        _ = cancel.cancelled() => Err(CheckerError::Cancelled),
        output = future => Ok(output),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::testing::{Reply, StubOracle};
    use crate::workspace::testing::StaticFetcher;
    use std::sync::atomic::Ordering;
    use std::time::Duration;
    use tempfile::TempDir;

    const CANNED: &str =
        "Score: 82\nImprovements:\n1. Add tests\n2. Reduce duplication\n3. Improve naming\n4. Extra line";

    fn config() -> CheckerConfig {
        toml::from_str(
            r#"
[discovery]
extensions = [".py"]
"#,
        )
        .expect("config should parse")
    }

    fn pipeline(
        work_root: &Path,
        fetcher: StaticFetcher,
        oracle: Arc<StubOracle>,
    ) -> Pipeline {
        Pipeline::new(&config(), Arc::new(fetcher), oracle)
            .with_work_root(Some(work_root.to_path_buf()))
    }

    fn is_empty_dir(path: &Path) -> bool {
        std::fs::read_dir(path)
            .expect("work root should be readable")
            .next()
            .is_none()
    }

    #[tokio::test]
    async fn run_produces_summary_and_removes_working_copy() {
        let work_root = TempDir::new().expect("temp dir should be created");
        let oracle = StubOracle::new(Reply::Text(CANNED));
        let fetcher = StaticFetcher::with_files(&[
            ("app/main.py", "print('hello')\n"),
            ("README.md", "# not code"),
        ]);

        let summary = pipeline(work_root.path(), fetcher, oracle.clone())
            .run("https://example.com/repo.git", &CancellationToken::new())
            .await
            .expect("pipeline should succeed");

        assert_eq!(
            summary,
            QualitySummary {
                score: Some(82),
                improvements: vec![
                    "1. Add tests".to_string(),
                    "2. Reduce duplication".to_string(),
                    "3. Improve naming".to_string(),
                ],
            }
        );
        let seen = oracle.seen.lock().expect("lock should not be poisoned");
        assert_eq!(seen.len(), 1);
        assert!(seen[0].contains("file=\"app/main.py\""));
        assert!(seen[0].contains("print('hello')"));
        assert!(!seen[0].contains("not code"));
        assert!(is_empty_dir(work_root.path()));
    }

    #[tokio::test]
    async fn oracle_failure_still_releases_working_copy() {
        let work_root = TempDir::new().expect("temp dir should be created");
        let oracle = StubOracle::new(Reply::Fail);
        let fetcher = StaticFetcher::with_files(&[("main.py", "x = 1")]);

        let err = pipeline(work_root.path(), fetcher, oracle)
            .run("https://example.com/repo.git", &CancellationToken::new())
            .await
            .expect_err("oracle failure should propagate");

        assert_eq!(err.category(), "oracle");
        assert!(is_empty_dir(work_root.path()));
    }

    #[tokio::test]
    async fn fetch_failure_skips_analysis() {
        let work_root = TempDir::new().expect("temp dir should be created");
        let oracle = StubOracle::new(Reply::Text(CANNED));
        let fetcher = StaticFetcher::failing("could not resolve host");

        let err = pipeline(work_root.path(), fetcher, oracle.clone())
            .run("https://example.com/repo.git", &CancellationToken::new())
            .await
            .expect_err("fetch failure should propagate");

        assert_eq!(err.category(), "fetch");
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 0);
        assert!(is_empty_dir(work_root.path()));
    }

    #[tokio::test]
    async fn read_failure_aborts_and_releases_working_copy() {
        let work_root = TempDir::new().expect("temp dir should be created");
        let oracle = StubOracle::new(Reply::Text(CANNED));
        let mut fetcher = StaticFetcher::with_files(&[("a.py", "ok = True")]);
        fetcher
            .files
            .insert("b.py".to_string(), vec![0xff, 0xfe, 0xfd]);

        let err = pipeline(work_root.path(), fetcher, oracle.clone())
            .run("https://example.com/repo.git", &CancellationToken::new())
            .await
            .expect_err("unreadable file should abort");

        assert_eq!(err.category(), "read");
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 0);
        assert!(is_empty_dir(work_root.path()));
    }

    #[tokio::test]
    async fn cancellation_aborts_analysis_and_releases_working_copy() {
        let work_root = TempDir::new().expect("temp dir should be created");
        let oracle = StubOracle::new(Reply::Hang);
        let fetcher = StaticFetcher::with_files(&[("main.py", "x = 1")]);
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let err = pipeline(work_root.path(), fetcher, oracle)
            .run("https://example.com/repo.git", &cancel)
            .await
            .expect_err("cancelled run should fail");

        assert!(matches!(err, CheckerError::Cancelled));
        assert!(is_empty_dir(work_root.path()));
    }

    #[tokio::test]
    async fn empty_tree_still_reaches_the_oracle() {
        let work_root = TempDir::new().expect("temp dir should be created");
        let oracle = StubOracle::new(Reply::Text("The codebase looks decent overall."));
        let fetcher = StaticFetcher::with_files(&[("notes.txt", "no code here")]);

        let summary = pipeline(work_root.path(), fetcher, oracle.clone())
            .run("https://example.com/repo.git", &CancellationToken::new())
            .await
            .expect("empty corpus is not an error");

        assert_eq!(summary, QualitySummary::default());
        assert_eq!(
            oracle.seen.lock().expect("lock should not be poisoned")[0],
            ""
        );
        assert!(is_empty_dir(work_root.path()));
    }

    #[tokio::test]
    async fn concurrent_runs_use_separate_working_copies() {
        let work_root = TempDir::new().expect("temp dir should be created");
        let first = pipeline(
            work_root.path(),
            StaticFetcher::with_files(&[("one.py", "a = 1")]),
            StubOracle::new(Reply::Text(CANNED)),
        );
        let second = pipeline(
            work_root.path(),
            StaticFetcher::with_files(&[("two.py", "b = 2")]),
            StubOracle::new(Reply::Text("Score: 40")),
        );
        let cancel = CancellationToken::new();

        let (a, b) = tokio::join!(
            first.run("https://example.com/one.git", &cancel),
            second.run("https://example.com/two.git", &cancel),
        );

        assert_eq!(a.expect("first run should succeed").score, Some(82));
        assert_eq!(b.expect("second run should succeed").score, Some(40));
        assert!(is_empty_dir(work_root.path()));
    }
}
