use crate::model::{ExtractionReport, FetchReport};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Server answered {status} for {url}")]
    Status { url: String, status: u16 },
    #[error("Failed to write {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid archive: {0}")]
    Archive(#[from] zip::result::ZipError),
    #[error("Archive entry escapes the destination: '{attempted}'")]
    PathTraversal { attempted: String },
    #[error("Extraction tool '{tool}' not found: {source}")]
    ToolNotFound {
        tool: String,
        #[source]
        source: which::Error,
    },
    #[error("Command failed: code {}, message: {stderr}", display_code(.code))]
    CommandFailed { code: Option<i32>, stderr: String },
}

fn display_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => code.to_string(),
        None => "none (terminated by signal)".to_string(),
    }
}

/// Downloads a remote resource to a local file.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetches `source` and writes the whole body to `destination`.
    ///
    /// The parent directory of `destination` must already exist.
    async fn download(&self, source: &str, destination: &Path) -> Result<FetchReport, FetchError>;

    /// Name used in logs and timeout errors.
    fn stage_name(&self) -> &'static str;
}

/// Unpacks an archive file into a directory.
///
/// Implementations block; the pipeline runs them on the blocking pool.
pub trait Extractor: Send + Sync {
    fn extract(&self, archive: &Path, destination: &Path)
        -> Result<ExtractionReport, ExtractError>;

    fn stage_name(&self) -> &'static str;
}
