//! # heic-convert
//!
//! Batch conversion of HEIC/HEIF photos into JPEG or PNG. Point it at a
//! directory of phone photos and it writes one converted file per input under
//! a destination directory, keeping the folder layout, the color profile and
//! the EXIF block.
//!
//! # Architecture: Walk, Convert, Dispatch
//!
//! ```text
//! 1. Scan      fotos_heic/  →  [ConversionTask]   (input path + mirrored output path)
//! 2. Convert   one task     →  ConversionOutcome  (decode, normalize, encode, write)
//! 3. Process   all tasks    →  RunSummary         (parallel jobs on a rayon pool)
//! ```
//!
//! Jobs are independent and stateless: each reads one file and writes at
//! most one file, so they run in parallel without coordination. A bad input
//! becomes a `Failed` outcome in the summary instead of stopping the run.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`scan`] | Step 1: walks the source tree and mirrors each path under the destination |
//! | [`convert`] | Step 2: the conversion job for a single file |
//! | [`process`] | Step 3: runs jobs on a bounded worker pool, aggregates the summary |
//! | [`imaging`] | Codec boundary (`ImageBackend`), libheif decoder, JPEG/PNG encoders, orientation |
//! | [`config`] | Layered `config.toml` loading, merging and validation |
//! | [`output`] | CLI output formatting for progress and the summary |
//!
//! # Design Decisions
//!
//! ## Upright Pixels, Normal Orientation Tag
//!
//! HEIC files from phones usually store pixels sideways, with the rotation
//! recorded in the container and repeated in the EXIF orientation tag. The
//! decoder applies the container rotation, and the EXIF tag is rewritten to
//! "normal" (a backend that only reports the EXIF tag gets its pixels rotated
//! by the job instead). Viewers that ignore EXIF and viewers that honor it
//! then show the same picture. With `--sem-metadata` all metadata is dropped
//! and the pixels are written as decoded.
//!
//! ## Skip Instead of Resume
//!
//! There is no state file. An output that already exists is skipped, and
//! outputs are written to a temp file and renamed into place, so a partial
//! file never looks finished. Re-running after an interruption converts only
//! what is missing.
//!
//! ## Codec Behind a Trait
//!
//! HEVC decoding needs libheif; everything else is pure Rust. Keeping both
//! behind [`imaging::ImageBackend`] lets the pipeline be tested with a mock
//! backend and with synthetic images, without real HEIC fixtures.

pub mod config;
pub mod convert;
pub mod imaging;
pub mod output;
pub mod process;
pub mod scan;
