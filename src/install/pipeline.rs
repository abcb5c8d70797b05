//! Install pipeline executor.
//!
//! [`InstallPipeline`] runs the stages of one install in order
//! (Fetcher → Extractor → directory lookup) with:
//! - Async execution via `tokio`, extraction on the blocking pool
//! - Optional per-stage timeout
//! - Structured logging via `tracing`
//!
//! The pipeline never touches the process working directory. The resolved
//! folder is returned in [`InstallOutcome`]; call [`InstallOutcome::enter`]
//! to change into it.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::time::timeout;
use tracing::{info, instrument};

use crate::extract::safe_child;
use crate::model::{ExtractionReport, FetchReport, InstallRequest, InstallStats};
use crate::traits::{ExtractError, Extractor, FetchError, Fetcher};

// ============================================================================
// Pipeline Types
// ============================================================================

/// Result of a completed install.
#[derive(Debug, Clone, Serialize)]
pub struct InstallOutcome {
    /// Downloaded archive, left in place
    pub archive_path: PathBuf,

    /// Directory the archive unpacked into
    pub extracted_dir: PathBuf,

    pub fetch: FetchReport,

    pub extraction: ExtractionReport,

    pub stats: InstallStats,
}

impl InstallOutcome {
    /// Makes [`InstallOutcome::extracted_dir`] the process working directory.
    ///
    /// This changes process-wide state; relative paths held elsewhere
    /// resolve differently afterwards.
    pub fn enter(&self) -> std::io::Result<()> {
        std::env::set_current_dir(&self.extracted_dir)
    }
}

// ============================================================================
// Pipeline Errors
// ============================================================================

#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("Stage '{stage}' timed out after {timeout:?}")]
    StageTimeout { stage: String, timeout: Duration },

    #[error("Download failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("Extraction failed: {0}")]
    Extract(#[from] ExtractError),

    #[error("Stage '{stage}' task failed: {reason}")]
    Join { stage: String, reason: String },

    /// The configured extraction folder would resolve outside the workdir
    #[error("Path traversal attempt rejected: '{attempted}'")]
    PathTraversal { attempted: String },

    /// The archive did not unpack into the expected folder
    #[error("Expected directory not found after extraction: {}", .path.display())]
    MissingDirectory { path: PathBuf },
}

// ============================================================================
// Pipeline Executor
// ============================================================================

/// Sequential install pipeline.
///
/// ```ignore
/// use fetch_unzip::{HttpFetcher, InstallPipeline, InstallRequest, ZipExtractor};
///
/// let pipeline = InstallPipeline::new(HttpFetcher::new()?, ZipExtractor::new());
/// let outcome = pipeline.execute(&InstallRequest::default()).await?;
/// outcome.enter()?;
/// ```
pub struct InstallPipeline<F, E>
where
    F: Fetcher,
    E: Extractor,
{
    fetcher: F,

    /// Shared with the blocking task that runs extraction
    extractor: Arc<E>,

    /// Limit applied to each stage; `None` waits indefinitely
    stage_timeout: Option<Duration>,
}

impl<F, E> InstallPipeline<F, E>
where
    F: Fetcher,
    E: Extractor + 'static,
{
    /// Creates a pipeline with no stage timeout.
    pub fn new(fetcher: F, extractor: E) -> Self {
        Self {
            fetcher,
            extractor: Arc::new(extractor),
            stage_timeout: None,
        }
    }

    /// Bounds each stage by `timeout`.
    ///
    /// An extraction that overruns is reported as timed out but keeps running
    /// on its blocking thread until it finishes on its own.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.stage_timeout = Some(timeout);
        self
    }

    /// Runs fetch, extraction and directory lookup for `request`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if:
    /// - `request.extract_dir` is absolute or contains `..`
    /// - the download or the extraction fails
    /// - a stage exceeds the configured timeout
    /// - the expected folder does not exist after extraction
    ///
    /// Nothing is rolled back: a downloaded archive or partly extracted tree
    /// stays on disk.
    #[instrument(skip(self, request), fields(url = %request.url))]
    pub async fn execute(&self, request: &InstallRequest) -> Result<InstallOutcome, PipelineError> {
        let start = Instant::now();
        let mut stats = InstallStats::default();

        let extracted_dir =
            safe_child(&request.workdir, &request.extract_dir).map_err(|_| {
                PipelineError::PathTraversal {
                    attempted: request.extract_dir.display().to_string(),
                }
            })?;
        let archive_path = request.archive_path();

        // ====================================================================
        // Stage 1: Fetch
        // ====================================================================

        info!(destination = %archive_path.display(), "Starting fetch stage");
        let fetch_start = Instant::now();

        let fetch = self
            .bounded(
                self.fetcher.stage_name(),
                self.fetcher.download(&request.url, &archive_path),
            )
            .await??;

        stats.fetch_duration_ms = fetch_start.elapsed().as_millis() as u64;
        stats.bytes_downloaded = fetch.bytes;
        info!(
            duration_ms = stats.fetch_duration_ms,
            bytes = fetch.bytes,
            status = fetch.status,
            "Fetch completed"
        );

        // ====================================================================
        // Stage 2: Extraction
        // ====================================================================

        info!(workdir = %request.workdir.display(), "Starting extraction stage");
        let extraction_start = Instant::now();

        let extraction = self.extract(&archive_path, &request.workdir).await?;

        stats.extraction_duration_ms = extraction_start.elapsed().as_millis() as u64;
        stats.entries_extracted = extraction.entries.len();
        info!(
            duration_ms = stats.extraction_duration_ms,
            entries = stats.entries_extracted,
            "Extraction completed"
        );

        // ====================================================================
        // Stage 3: Locate extracted folder
        // ====================================================================

        if !extracted_dir.is_dir() {
            return Err(PipelineError::MissingDirectory {
                path: extracted_dir,
            });
        }

        stats.total_duration_ms = start.elapsed().as_millis() as u64;
        info!(
            path = %extracted_dir.display(),
            total_ms = stats.total_duration_ms,
            "Install completed"
        );

        Ok(InstallOutcome {
            archive_path,
            extracted_dir,
            fetch,
            extraction,
            stats,
        })
    }

    async fn extract(
        &self,
        archive: &Path,
        destination: &Path,
    ) -> Result<ExtractionReport, PipelineError> {
        let stage = self.extractor.stage_name();
        let extractor = Arc::clone(&self.extractor);
        let archive = archive.to_path_buf();
        let destination = destination.to_path_buf();

        let task =
            tokio::task::spawn_blocking(move || extractor.extract(&archive, &destination));

        let report = self
            .bounded(stage, task)
            .await?
            .map_err(|e| PipelineError::Join {
                stage: stage.to_string(),
                reason: e.to_string(),
            })??;
        Ok(report)
    }

    async fn bounded<T>(
        &self,
        stage: &str,
        stage_future: impl Future<Output = T>,
    ) -> Result<T, PipelineError> {
        match self.stage_timeout {
            Some(limit) => {
                timeout(limit, stage_future)
                    .await
                    .map_err(|_| PipelineError::StageTimeout {
                        stage: stage.to_string(),
                        timeout: limit,
                    })
            }
            None => Ok(stage_future.await),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::ZipExtractor;
    use crate::fetch::HttpFetcher;
    use crate::test_fixtures::build_archive;
    use async_trait::async_trait;
    use httpmock::prelude::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    // Mock fetcher serving a fixed body
    struct MockFetcher {
        body: Vec<u8>,
        calls: AtomicUsize,
    }

    impl MockFetcher {
        fn serving(body: Vec<u8>) -> Self {
            Self {
                body,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Fetcher for MockFetcher {
        async fn download(
            &self,
            source: &str,
            destination: &Path,
        ) -> Result<FetchReport, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(2)).await;
            std::fs::write(destination, &self.body).map_err(|source| FetchError::Io {
                path: destination.to_path_buf(),
                source,
            })?;
            Ok(FetchReport {
                url: source.to_string(),
                destination: destination.to_path_buf(),
                status: 200,
                bytes: self.body.len() as u64,
            })
        }

        fn stage_name(&self) -> &'static str {
            "mock_fetch"
        }
    }

    // Fetcher that never finishes in time
    struct StalledFetcher;

    #[async_trait]
    impl Fetcher for StalledFetcher {
        async fn download(&self, _: &str, _: &Path) -> Result<FetchReport, FetchError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            unreachable!("the pipeline timeout fires first")
        }

        fn stage_name(&self) -> &'static str {
            "stalled_fetch"
        }
    }

    fn two_entry_archive() -> Vec<u8> {
        build_archive(&[
            ("archive/", b""),
            ("archive/a.txt", b"alpha"),
            ("archive/dir/b.txt", b"beta"),
        ])
    }

    fn request_in(dir: &TempDir) -> InstallRequest {
        InstallRequest::default()
            .with_url("http://mock.invalid/archive.zip")
            .with_workdir(dir.path())
    }

    #[tokio::test]
    async fn test_pipeline_execution() {
        let dir = TempDir::new().unwrap();
        let pipeline =
            InstallPipeline::new(MockFetcher::serving(two_entry_archive()), ZipExtractor::new());

        let outcome = pipeline.execute(&request_in(&dir)).await.unwrap();

        assert_eq!(outcome.archive_path, dir.path().join("archive.zip"));
        assert!(outcome.archive_path.exists());
        assert_eq!(outcome.extracted_dir, dir.path().join("archive"));
        assert_eq!(
            std::fs::read(outcome.extracted_dir.join("dir/b.txt")).unwrap(),
            b"beta"
        );
    }

    #[tokio::test]
    async fn test_pipeline_stats() {
        let dir = TempDir::new().unwrap();
        let body = two_entry_archive();
        let size = body.len() as u64;
        let pipeline = InstallPipeline::new(MockFetcher::serving(body), ZipExtractor::new());

        let outcome = pipeline.execute(&request_in(&dir)).await.unwrap();

        assert_eq!(outcome.stats.bytes_downloaded, size);
        assert_eq!(outcome.stats.entries_extracted, 3);
        assert!(outcome.stats.total_duration_ms >= outcome.stats.fetch_duration_ms);
        assert!(outcome.stats.fetch_duration_ms > 0);
    }

    #[tokio::test]
    async fn test_pipeline_with_custom_timeout() {
        let dir = TempDir::new().unwrap();
        let pipeline =
            InstallPipeline::new(MockFetcher::serving(two_entry_archive()), ZipExtractor::new())
                .with_timeout(Duration::from_secs(10));

        assert!(pipeline.execute(&request_in(&dir)).await.is_ok());
    }

    #[tokio::test]
    async fn test_pipeline_stage_timeout() {
        let dir = TempDir::new().unwrap();
        let pipeline = InstallPipeline::new(StalledFetcher, ZipExtractor::new())
            .with_timeout(Duration::from_millis(50));

        let result = pipeline.execute(&request_in(&dir)).await;

        match result {
            Err(err @ PipelineError::StageTimeout { .. }) => {
                assert_eq!(
                    err.to_string(),
                    "Stage 'stalled_fetch' timed out after 50ms"
                );
            }
            other => panic!("expected StageTimeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_pipeline_rejects_escaping_extract_dir_before_fetching() {
        let dir = TempDir::new().unwrap();
        let fetcher = MockFetcher::serving(two_entry_archive());
        let pipeline = InstallPipeline::new(fetcher, ZipExtractor::new());

        let request = request_in(&dir).with_extract_dir("../outside");
        let result = pipeline.execute(&request).await;

        assert!(matches!(result, Err(PipelineError::PathTraversal { .. })));
        assert_eq!(pipeline.fetcher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_pipeline_missing_directory_keeps_extracted_files() {
        let dir = TempDir::new().unwrap();
        let pipeline =
            InstallPipeline::new(MockFetcher::serving(two_entry_archive()), ZipExtractor::new());

        let request = request_in(&dir).with_extract_dir("not-in-archive");
        let result = pipeline.execute(&request).await;

        match result {
            Err(PipelineError::MissingDirectory { path }) => {
                assert_eq!(path, dir.path().join("not-in-archive"))
            }
            other => panic!("expected MissingDirectory, got {other:?}"),
        }
        // No rollback
        assert!(dir.path().join("archive.zip").exists());
        assert!(dir.path().join("archive/a.txt").exists());
    }

    #[tokio::test]
    async fn test_pipeline_404_fails_before_extraction() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/archive.zip");
                then.status(404).body("404: Not Found");
            })
            .await;

        let dir = TempDir::new().unwrap();
        let pipeline = InstallPipeline::new(HttpFetcher::new().unwrap(), ZipExtractor::new());
        let request = request_in(&dir).with_url(server.url("/archive.zip"));

        let result = pipeline.execute(&request).await;

        assert!(matches!(
            result,
            Err(PipelineError::Fetch(FetchError::Status { status: 404, .. }))
        ));
        assert!(!dir.path().join("archive.zip").exists());
    }

    #[tokio::test]
    async fn test_pipeline_404_without_status_check_fails_at_extraction() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/archive.zip");
                then.status(404).body("404: Not Found");
            })
            .await;

        let dir = TempDir::new().unwrap();
        let fetcher = HttpFetcher::new().unwrap().with_status_check(false);
        let pipeline = InstallPipeline::new(fetcher, ZipExtractor::new());
        let request = request_in(&dir).with_url(server.url("/archive.zip"));

        let result = pipeline.execute(&request).await;

        assert!(matches!(
            result,
            Err(PipelineError::Extract(ExtractError::Archive(_)))
        ));
        assert_eq!(
            std::fs::read(dir.path().join("archive.zip")).unwrap(),
            b"404: Not Found"
        );
    }

    #[tokio::test]
    async fn test_outcome_serializes_to_json() {
        let dir = TempDir::new().unwrap();
        let pipeline =
            InstallPipeline::new(MockFetcher::serving(two_entry_archive()), ZipExtractor::new());

        let outcome = pipeline.execute(&request_in(&dir)).await.unwrap();
        let json = serde_json::to_value(&outcome).unwrap();

        assert_eq!(json["fetch"]["status"], 200);
        assert_eq!(json["stats"]["entries_extracted"], 3);
        assert!(json["extracted_dir"].as_str().unwrap().ends_with("archive"));
    }
}
