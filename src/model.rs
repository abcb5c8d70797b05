use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Archive fetched when no URL is configured.
pub const DEFAULT_URL: &str =
    "https://raw.githubusercontent.com/mickaelvieira/deno-download-unzip-file/master/archive.zip";

/// File name the archive is written to, relative to the workdir.
pub const DEFAULT_ARCHIVE_NAME: &str = "archive.zip";

/// Top-level folder the archive is expected to unpack into.
pub const DEFAULT_EXTRACT_DIR: &str = "archive";

/// Everything one install run needs to know.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallRequest {
    pub url: String,
    pub workdir: PathBuf,
    pub archive_name: String,
    pub extract_dir: PathBuf,
}

impl Default for InstallRequest {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            workdir: PathBuf::from("."),
            archive_name: DEFAULT_ARCHIVE_NAME.to_string(),
            extract_dir: PathBuf::from(DEFAULT_EXTRACT_DIR),
        }
    }
}

impl InstallRequest {
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_workdir(mut self, workdir: impl Into<PathBuf>) -> Self {
        self.workdir = workdir.into();
        self
    }

    pub fn with_archive_name(mut self, name: impl Into<String>) -> Self {
        self.archive_name = name.into();
        self
    }

    pub fn with_extract_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.extract_dir = dir.into();
        self
    }

    /// Where the downloaded archive lands.
    pub fn archive_path(&self) -> PathBuf {
        self.workdir.join(&self.archive_name)
    }
}

/// Captured result of one external process run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessOutput {
    pub success: bool,
    /// `None` when the process was terminated by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl From<std::process::Output> for ProcessOutput {
    fn from(output: std::process::Output) -> Self {
        Self {
            success: output.status.success(),
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchReport {
    pub url: String,
    pub destination: PathBuf,
    /// HTTP status code of the response that was written.
    pub status: u16,
    pub bytes: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionReport {
    pub archive: PathBuf,
    pub destination: PathBuf,

    /// Paths written, relative to `destination`.
    ///
    /// Empty when an external tool did the extraction, since only the tool
    /// knows what it wrote.
    pub entries: Vec<PathBuf>,

    /// Uncompressed size of all file entries (bytes)
    pub total_size_bytes: u64,

    /// Decoded stdout of the external tool, if one ran.
    pub tool_output: Option<String>,
}

impl ExtractionReport {
    pub fn new(archive: &Path, destination: &Path) -> Self {
        Self {
            archive: archive.to_path_buf(),
            destination: destination.to_path_buf(),
            ..Self::default()
        }
    }
}

/// Timing and volume figures for one install run.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct InstallStats {
    pub total_duration_ms: u64,
    pub fetch_duration_ms: u64,
    pub extraction_duration_ms: u64,
    pub bytes_downloaded: u64,
    pub entries_extracted: usize,
}
