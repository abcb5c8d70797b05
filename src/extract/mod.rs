//! [`Extractor`](crate::traits::Extractor) implementations.
//!
//! - [`ZipExtractor`] reads the archive in-process with the `zip` crate
//! - [`CommandExtractor`] shells out to an `unzip` executable on `PATH`

mod archive;
mod command;

pub use archive::ZipExtractor;
pub use command::CommandExtractor;

use std::path::{Component, Path, PathBuf};

use crate::traits::ExtractError;

/// Joins `relative` onto `root`, rejecting anything that would land outside it.
///
/// Works on components only, so the target does not need to exist yet.
pub(crate) fn safe_child(root: &Path, relative: &Path) -> Result<PathBuf, ExtractError> {
    let escapes = relative.is_absolute()
        || relative.components().any(|component| {
            matches!(
                component,
                Component::ParentDir | Component::RootDir | Component::Prefix(_)
            )
        });

    if escapes {
        return Err(ExtractError::PathTraversal {
            attempted: relative.display().to_string(),
        });
    }

    Ok(root.join(relative))
}
