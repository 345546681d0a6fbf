//! One input file in, at most one output file out.
//!
//! Step 2 of a conversion run. [`convert_file`] is the whole job for a single
//! [`ConversionTask`]:
//!
//! ```text
//! exists? ──yes (no overwrite)──→ SkippedExisting
//!    │
//!    ▼
//! read → decode → 8-bit → upright / strip metadata → encode → write
//!                                                               │
//!                                                               ▼
//!                                                           Converted
//! ```
//!
//! Any error along the way ends the job as [`ConversionOutcome::Failed`] with
//! a readable reason. Errors never escape a job, so one bad file cannot stop
//! the rest of the run. The source file is only ever read.

use crate::imaging::{
    BackendError, ChromaSubsampling, EncodeParams, ImageBackend, OutputFormat, Quality,
};
use crate::scan::ConversionTask;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Options shared read-only by every job of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConversionOptions {
    pub format: OutputFormat,
    pub quality: Quality,
    pub subsampling: ChromaSubsampling,
    pub progressive: bool,
    pub optimize: bool,
    pub preserve_metadata: bool,
    pub overwrite: bool,
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self {
            format: OutputFormat::Jpeg,
            quality: Quality::default(),
            subsampling: ChromaSubsampling::Yuv444,
            progressive: true,
            optimize: true,
            preserve_metadata: true,
            overwrite: false,
        }
    }
}

impl ConversionOptions {
    pub fn encode_params(&self) -> EncodeParams {
        EncodeParams {
            format: self.format,
            quality: self.quality,
            subsampling: self.subsampling,
            progressive: self.progressive,
            optimize: self.optimize,
        }
    }
}

/// Result of one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionOutcome {
    Converted,
    SkippedExisting,
    Failed(String),
}

#[derive(Error, Debug)]
enum JobError {
    #[error("cannot read source: {0}")]
    Read(std::io::Error),
    #[error(transparent)]
    Codec(#[from] BackendError),
    #[error("cannot create directory {}: {source}", .path.display())]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot write output: {0}")]
    Write(std::io::Error),
}

/// Run the conversion job for one task.
pub fn convert_file(
    backend: &impl ImageBackend,
    task: &ConversionTask,
    options: &ConversionOptions,
) -> ConversionOutcome {
    if !options.overwrite && task.target.exists() {
        tracing::debug!(output = %task.target.display(), "output exists, skipping");
        return ConversionOutcome::SkippedExisting;
    }

    match run_job(backend, task, options) {
        Ok(()) => ConversionOutcome::Converted,
        Err(e) => {
            tracing::debug!(source = %task.source.path.display(), "conversion failed: {e}");
            ConversionOutcome::Failed(e.to_string())
        }
    }
}

fn run_job(
    backend: &impl ImageBackend,
    task: &ConversionTask,
    options: &ConversionOptions,
) -> Result<(), JobError> {
    let bytes = fs::read(&task.source.path).map_err(JobError::Read)?;
    let decoded = backend.decode(&bytes)?;
    tracing::debug!(
        source = %task.source.relative.display(),
        width = decoded.width(),
        height = decoded.height(),
        bit_depth = decoded.bit_depth,
        orientation = ?decoded.orientation,
        "decoded"
    );

    let raster = decoded.into_8bit();
    let raster = if options.preserve_metadata {
        raster.into_upright()
    } else {
        raster.without_metadata()
    };

    let encoded = backend.encode(&raster, &options.encode_params())?;

    if let Some(parent) = task.target.parent() {
        fs::create_dir_all(parent).map_err(|source| JobError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    write_atomic(&task.target, &encoded).map_err(JobError::Write)?;
    tracing::debug!(
        output = %task.target.display(),
        bytes = encoded.len(),
        "written"
    );
    Ok(())
}

/// Hidden sibling of `path` used while the output is being written.
fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.tmp"))
}

/// Write `data` to a sibling temp file, then rename it over `path`.
///
/// A failed write leaves neither a partial output nor the temp file behind.
fn write_atomic(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let temp = temp_path(path);
    let result = fs::File::create(&temp)
        .and_then(|mut file| {
            file.write_all(data)?;
            file.flush()
        })
        .and_then(|()| fs::rename(&temp, path));
    if result.is_err() {
        let _ = fs::remove_file(&temp);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::backend::tests::{MockBackend, RecordedOp};
    use crate::imaging::{Orientation, RasterImage};
    use crate::scan::SourceFile;
    use image::{DynamicImage, ImageBuffer, Rgb};
    use tempfile::TempDir;

    fn task_in(tmp: &Path, relative: &str, contents: &[u8]) -> ConversionTask {
        let path = tmp.join("src").join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, contents).unwrap();
        ConversionTask {
            source: SourceFile {
                path,
                relative: PathBuf::from(relative),
                size: contents.len() as u64,
            },
            target: tmp.join("out").join(relative).with_extension("jpg"),
        }
    }

    fn rgb8_backend(width: u32, height: u32) -> MockBackend {
        MockBackend::new(RasterImage::new(DynamicImage::new_rgb8(width, height)))
    }

    // =========================================================================
    // Outcomes
    // =========================================================================

    #[test]
    fn converts_and_writes_target() {
        let tmp = TempDir::new().unwrap();
        let task = task_in(tmp.path(), "sub/a.heic", b"heic bytes");
        let backend = rgb8_backend(4, 3);

        let outcome = convert_file(&backend, &task, &ConversionOptions::default());

        assert_eq!(outcome, ConversionOutcome::Converted);
        assert_eq!(fs::read(&task.target).unwrap(), b"jpeg");
        assert_eq!(backend.get_operations()[0], RecordedOp::Decode { len: 10 });
    }

    #[test]
    fn existing_target_is_skipped_without_decoding() {
        let tmp = TempDir::new().unwrap();
        let task = task_in(tmp.path(), "a.heic", b"heic bytes");
        fs::create_dir_all(task.target.parent().unwrap()).unwrap();
        fs::write(&task.target, b"old").unwrap();
        let backend = rgb8_backend(4, 3);

        let outcome = convert_file(&backend, &task, &ConversionOptions::default());

        assert_eq!(outcome, ConversionOutcome::SkippedExisting);
        assert!(backend.get_operations().is_empty());
        assert_eq!(fs::read(&task.target).unwrap(), b"old");
    }

    #[test]
    fn overwrite_replaces_existing_target() {
        let tmp = TempDir::new().unwrap();
        let task = task_in(tmp.path(), "a.heic", b"heic bytes");
        fs::create_dir_all(task.target.parent().unwrap()).unwrap();
        fs::write(&task.target, b"old").unwrap();
        let options = ConversionOptions {
            overwrite: true,
            ..Default::default()
        };

        let outcome = convert_file(&rgb8_backend(4, 3), &task, &options);

        assert_eq!(outcome, ConversionOutcome::Converted);
        assert_eq!(fs::read(&task.target).unwrap(), b"jpeg");
    }

    #[test]
    fn decode_failure_is_failed_and_writes_nothing() {
        let tmp = TempDir::new().unwrap();
        let task = task_in(tmp.path(), "bad.heic", b"corrupt!");

        let outcome = convert_file(&rgb8_backend(4, 3), &task, &ConversionOptions::default());

        match outcome {
            ConversionOutcome::Failed(reason) => assert!(reason.contains("decode failed")),
            other => panic!("expected Failed, got {other:?}"),
        }
        assert!(!task.target.exists());
    }

    #[test]
    fn missing_source_is_failed() {
        let tmp = TempDir::new().unwrap();
        let mut task = task_in(tmp.path(), "a.heic", b"x");
        fs::remove_file(&task.source.path).unwrap();
        task.source.size = 0;

        let outcome = convert_file(&rgb8_backend(1, 1), &task, &ConversionOptions::default());

        match outcome {
            ConversionOutcome::Failed(reason) => assert!(reason.contains("cannot read source")),
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[test]
    fn source_is_left_untouched() {
        let tmp = TempDir::new().unwrap();
        let task = task_in(tmp.path(), "a.heic", b"original");
        convert_file(&rgb8_backend(2, 2), &task, &ConversionOptions::default());
        assert_eq!(fs::read(&task.source.path).unwrap(), b"original");
    }

    // =========================================================================
    // Normalization handed to the encoder
    // =========================================================================

    #[test]
    fn deep_source_is_encoded_as_eight_bit() {
        let tmp = TempDir::new().unwrap();
        let task = task_in(tmp.path(), "a.heic", b"x");
        let mut raster = RasterImage::new(DynamicImage::ImageRgb16(ImageBuffer::from_pixel(
            2,
            2,
            Rgb([1000u16; 3]),
        )));
        raster.bit_depth = 10;
        let backend = MockBackend::new(raster);

        convert_file(&backend, &task, &ConversionOptions::default());

        match &backend.encoded()[0] {
            RecordedOp::Encode { bit_depth, .. } => assert_eq!(*bit_depth, 8),
            other => panic!("unexpected op {other:?}"),
        }
    }

    #[test]
    fn preserve_metadata_rotates_upright_and_keeps_metadata() {
        let tmp = TempDir::new().unwrap();
        let task = task_in(tmp.path(), "a.heic", b"x");
        let mut raster = RasterImage::new(DynamicImage::new_rgb8(6, 4));
        raster.orientation = Orientation::Rotate90CW;
        raster.icc_profile = Some(vec![1, 2, 3]);
        raster.exif = Some(crate::imaging::exif_block::tests::tiff_with_orientation(
            6, true,
        ));
        let backend = MockBackend::new(raster);

        convert_file(&backend, &task, &ConversionOptions::default());

        assert_eq!(
            backend.encoded(),
            vec![RecordedOp::Encode {
                format: OutputFormat::Jpeg,
                width: 4,
                height: 6,
                bit_depth: 8,
                quality: 95,
                has_icc: true,
                has_exif: true,
            }]
        );
    }

    #[test]
    fn no_metadata_keeps_stored_pixels_and_drops_blocks() {
        let tmp = TempDir::new().unwrap();
        let task = task_in(tmp.path(), "a.heic", b"x");
        let mut raster = RasterImage::new(DynamicImage::new_rgb8(6, 4));
        raster.orientation = Orientation::Rotate90CW;
        raster.icc_profile = Some(vec![1, 2, 3]);
        let backend = MockBackend::new(raster);
        let options = ConversionOptions {
            preserve_metadata: false,
            format: OutputFormat::Png,
            ..Default::default()
        };

        convert_file(&backend, &task, &options);

        match &backend.encoded()[0] {
            RecordedOp::Encode {
                format,
                width,
                height,
                has_icc,
                has_exif,
                ..
            } => {
                assert_eq!(*format, OutputFormat::Png);
                assert_eq!((*width, *height), (6, 4));
                assert!(!has_icc);
                assert!(!has_exif);
            }
            other => panic!("unexpected op {other:?}"),
        }
    }

    #[test]
    fn encode_params_follow_options() {
        let options = ConversionOptions {
            quality: Quality::new(80),
            subsampling: ChromaSubsampling::Yuv420,
            progressive: false,
            ..Default::default()
        };
        let params = options.encode_params();
        assert_eq!(params.quality.value(), 80);
        assert_eq!(params.subsampling, ChromaSubsampling::Yuv420);
        assert!(!params.progressive);
        assert!(params.optimize);
    }

    // =========================================================================
    // Atomic write
    // =========================================================================

    #[test]
    fn temp_path_is_hidden_sibling() {
        assert_eq!(
            temp_path(Path::new("/out/sub/a.jpg")),
            PathBuf::from("/out/sub/.a.jpg.tmp")
        );
    }

    #[test]
    fn write_atomic_leaves_no_temp_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("a.jpg");
        write_atomic(&path, b"data").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"data");
        assert!(!temp_path(&path).exists());
    }

    #[test]
    fn write_atomic_failure_cleans_up() {
        let tmp = TempDir::new().unwrap();
        // A directory in the way makes the rename fail.
        let path = tmp.path().join("a.jpg");
        fs::create_dir_all(path.join("occupied")).unwrap();
        assert!(write_atomic(&path, b"data").is_err());
        assert!(!temp_path(&path).exists());
    }

    #[test]
    fn unwritable_target_is_failed() {
        let tmp = TempDir::new().unwrap();
        let task = task_in(tmp.path(), "a.heic", b"x");
        // A file where the output directory should be.
        fs::write(tmp.path().join("out"), b"not a dir").unwrap();

        let outcome = convert_file(&rgb8_backend(1, 1), &task, &ConversionOptions::default());

        match outcome {
            ConversionOutcome::Failed(reason) => assert!(reason.contains("cannot create directory")),
            other => panic!("expected Failed, got {other:?}"),
        }
    }
}
