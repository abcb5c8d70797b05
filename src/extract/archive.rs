use std::fs::{self, File};
use std::io;
use std::path::Path;

use tracing::{debug, info};
use zip::ZipArchive;

use super::safe_child;
use crate::model::ExtractionReport;
use crate::traits::{ExtractError, Extractor};

/// rwx bits for user, group and other. setuid, setgid and sticky are dropped.
const PERMISSION_BITS: u32 = 0o777;

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> io::Result<()> {
    Ok(())
}

/// In-process ZIP extraction.
///
/// Entries are written under the destination following the archive's own
/// layout. An entry that would escape the destination aborts the extraction;
/// entries written before it stay on disk.
#[derive(Debug, Default, Clone, Copy)]
pub struct ZipExtractor;

impl ZipExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Extractor for ZipExtractor {
    fn extract(
        &self,
        archive: &Path,
        destination: &Path,
    ) -> Result<ExtractionReport, ExtractError> {
        let mut zip = ZipArchive::new(File::open(archive)?)?;
        let mut report = ExtractionReport::new(archive, destination);
        // Directory modes wait until every file is written; a read-only
        // directory would otherwise refuse its own contents.
        let mut dir_modes = Vec::new();

        for index in 0..zip.len() {
            let mut entry = zip.by_index(index)?;

            let relative = entry
                .enclosed_name()
                .ok_or_else(|| ExtractError::PathTraversal {
                    attempted: entry.name().to_string(),
                })?;
            let target = safe_child(destination, &relative)?;

            if entry.is_dir() {
                fs::create_dir_all(&target)?;
            } else {
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent)?;
                }
                let mut out = File::create(&target)?;
                let written = io::copy(&mut entry, &mut out)?;
                report.total_size_bytes += written;
            }

            if let Some(mode) = entry.unix_mode() {
                let mode = mode & PERMISSION_BITS;
                if entry.is_dir() {
                    dir_modes.push((target, mode));
                } else {
                    set_mode(&target, mode)?;
                }
            }

            debug!(entry = %relative.display(), "Extracted");
            report.entries.push(relative);
        }

        for (dir, mode) in dir_modes.into_iter().rev() {
            set_mode(&dir, mode)?;
        }

        info!(
            entries = report.entries.len(),
            size_bytes = report.total_size_bytes,
            "Archive extracted"
        );
        Ok(report)
    }

    fn stage_name(&self) -> &'static str {
        "zip"
    }
}
