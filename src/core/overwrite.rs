//! Overwrite resolution
//!
//! Decides what happens when an output file already exists.

use crate::core::uniquifier::uniquify_string;
use crate::domain::{BatcherError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Policy for an existing output file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverwriteMode {
    /// Overwrite the existing file
    Replace,
    /// Leave the existing file and do not export
    Skip,
    /// Export under a new, unique name
    #[default]
    RenameNew,
    /// Move the existing file to a unique name, then export
    RenameExisting,
    /// Abort the whole run
    Cancel,
}

/// Collaborator deciding how to resolve a conflict
pub trait OverwriteChooser {
    fn choose(&mut self, path: &Path) -> OverwriteMode;
}

/// Chooser returning a fixed policy
#[derive(Debug, Clone, Copy)]
pub struct NoninteractiveOverwriteChooser {
    overwrite_mode: OverwriteMode,
}

impl NoninteractiveOverwriteChooser {
    pub fn new(overwrite_mode: OverwriteMode) -> Self {
        Self { overwrite_mode }
    }

    pub fn overwrite_mode(&self) -> OverwriteMode {
        self.overwrite_mode
    }
}

impl OverwriteChooser for NoninteractiveOverwriteChooser {
    fn choose(&mut self, _path: &Path) -> OverwriteMode {
        self.overwrite_mode
    }
}

/// Resolves a conflict for `path`
///
/// Returns `(None, path)` when nothing exists at `path`. Otherwise asks
/// `chooser` and returns its choice with the path to export to. Renamed
/// paths get a ` (n)` suffix inserted at `position` (a byte offset into the
/// path string, end when `None`).
///
/// # Errors
///
/// Returns [`BatcherError::Cancelled`] for [`OverwriteMode::Cancel`] and an
/// I/O error if renaming the existing file fails.
pub fn handle_overwrite(
    path: &Path,
    chooser: &mut dyn OverwriteChooser,
    position: Option<usize>,
) -> Result<(Option<OverwriteMode>, PathBuf)> {
    if !path.exists() {
        return Ok((None, path.to_path_buf()));
    }

    let mode = chooser.choose(path);
    debug!(path = %path.display(), ?mode, "Output file exists");

    match mode {
        OverwriteMode::Replace | OverwriteMode::Skip => Ok((Some(mode), path.to_path_buf())),
        OverwriteMode::RenameNew => {
            let unique = uniquify_path(path, position);
            Ok((Some(mode), unique))
        }
        OverwriteMode::RenameExisting => {
            let unique = uniquify_path(path, position);
            fs::rename(path, &unique)?;
            info!(
                from = %path.display(),
                to = %unique.display(),
                "Renamed existing file"
            );
            Ok((Some(mode), path.to_path_buf()))
        }
        OverwriteMode::Cancel => Err(BatcherError::Cancelled("cancelled".to_string())),
    }
}

fn uniquify_path(path: &Path, position: Option<usize>) -> PathBuf {
    let path_str = path.to_string_lossy();
    PathBuf::from(uniquify_string(
        &path_str,
        |candidate| Path::new(candidate).exists(),
        position,
    ))
}
