//! Source tree walking and output path mirroring.
//!
//! Step 1 of a conversion run. Walks the source root for HEIC/HEIF files and
//! pairs each one with the path it will be written to under the destination
//! root:
//!
//! ```text
//! fotos_heic/                     fotos_jpeg/
//! ├── a.heic              →       ├── a.jpg
//! ├── notes.txt                   │
//! └── 2023/                       └── 2023/
//!     ├── IMG_0001.HEIC   →           ├── IMG_0001.jpg
//!     └── IMG_0002.heif   →           └── IMG_0002.jpg
//! ```
//!
//! ## Rules
//!
//! - Extensions are matched case-insensitively against `heic` and `heif`.
//! - Non-recursive walks only look at direct children of the root.
//! - Entries are yielded in file-name order within each directory.
//! - Symlinks are not followed.
//! - A missing source root is fatal; an unreadable entry mid-walk is logged
//!   and skipped.
//! - Output paths never leave the destination root.

use crate::imaging::{INPUT_EXTENSIONS, OutputFormat};
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("source directory '{0}' does not exist or is not a directory")]
    NotFound(PathBuf),
    #[error("path escapes the destination root: {0}")]
    UnsafePath(PathBuf),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// An input file found by the walker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Absolute path to read from.
    pub path: PathBuf,
    /// Path relative to the source root, used to mirror the layout.
    pub relative: PathBuf,
    pub size: u64,
}

/// One unit of work: where to read and where to write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionTask {
    pub source: SourceFile,
    pub target: PathBuf,
}

/// Whether `path` has a HEIC/HEIF extension (any case).
pub fn is_heif(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| {
            INPUT_EXTENSIONS
                .iter()
                .any(|candidate| ext.eq_ignore_ascii_case(candidate))
        })
}

/// Lazy iterator over the HEIC/HEIF files under a root.
///
/// Created by [`scan`]. Call [`scan`] again to start over.
pub struct SourceFiles {
    root: PathBuf,
    walker: walkdir::IntoIter,
}

impl Iterator for SourceFiles {
    type Item = SourceFile;

    fn next(&mut self) -> Option<SourceFile> {
        loop {
            let entry = match self.walker.next()? {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("skipping unreadable entry: {e}");
                    continue;
                }
            };
            if !entry.file_type().is_file() || !is_heif(entry.path()) {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(&self.root) else {
                continue;
            };
            let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
            return Some(SourceFile {
                relative: relative.to_path_buf(),
                path: entry.into_path(),
                size,
            });
        }
    }
}

/// Start walking `root` for HEIC/HEIF files.
///
/// Fails with [`ScanError::NotFound`] if `root` is missing or not a directory.
pub fn scan(root: &Path, recursive: bool) -> Result<SourceFiles, ScanError> {
    if !root.is_dir() {
        return Err(ScanError::NotFound(root.to_path_buf()));
    }
    let root = std::path::absolute(root)?;
    let walker = WalkDir::new(&root)
        .min_depth(1)
        .max_depth(if recursive { usize::MAX } else { 1 })
        .follow_links(false)
        .sort_by_file_name()
        .into_iter();
    Ok(SourceFiles { root, walker })
}

/// Mirror a source-relative path under `dest_root` with the format's extension.
///
/// Rejects relative paths that contain `..`, a root, or a drive prefix, so
/// the result always stays under `dest_root`.
pub fn output_target(
    dest_root: &Path,
    relative: &Path,
    format: OutputFormat,
) -> Result<PathBuf, ScanError> {
    let safe = relative
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if !safe || relative.file_name().is_none() {
        return Err(ScanError::UnsafePath(relative.to_path_buf()));
    }
    Ok(dest_root.join(relative).with_extension(format.extension()))
}

/// Walk `source_root` and pair every input with its output path.
///
/// Inputs whose mirrored path would be unsafe are logged and left out.
pub fn plan(
    source_root: &Path,
    dest_root: &Path,
    recursive: bool,
    format: OutputFormat,
) -> Result<Vec<ConversionTask>, ScanError> {
    let tasks = scan(source_root, recursive)?
        .filter_map(|source| match output_target(dest_root, &source.relative, format) {
            Ok(target) => Some(ConversionTask { source, target }),
            Err(e) => {
                tracing::warn!("{e}");
                None
            }
        })
        .collect();
    Ok(tasks)
}
