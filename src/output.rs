//! CLI output formatting.
//!
//! # Output Format
//!
//! ## Run header
//!
//! ```text
//! Source: fotos_heic (recursive)
//! Dest:   fotos_jpeg
//! Output: JPEG quality 95, 4:4:4, progressive, optimized, metadata kept
//! ```
//!
//! ## Progress
//!
//! ```text
//! Converting 3 files on 8 threads
//! [1/3] a.heic: converted
//! [3/3] 2023/c.heic: skipped (exists)
//! [2/3] 2023/b.heif: FAILED: decode failed: no ftyp box
//! ```
//!
//! Progress lines arrive in completion order; the bracketed index is the
//! file's position in the walk.
//!
//! ## Fatal errors
//!
//! ```text
//! Error: source directory 'fotos_heic' does not exist or is not a directory
//! ```
//!
//! ## Summary
//!
//! ```text
//! Done: 1 converted, 1 skipped, 1 failed (3 total)
//! Failures:
//!     2023/b.heif: decode failed: no ftyp box
//! ```
//!
//! # Architecture
//!
//! Each section has a `format_*` function (returns `Vec<String>`) for
//! testability and, where main needs it, a `print_*` wrapper that writes to
//! stdout. Format functions are pure and do no I/O.

use crate::config::ConvertConfig;
use crate::convert::ConversionOutcome;
use crate::imaging::OutputFormat;
use crate::process::{ProcessEvent, RunSummary};
use std::path::Path;

/// JPEG quality above which files grow without visible gain.
pub const QUALITY_WARNING_THRESHOLD: u32 = 95;

/// Display a relative path with forward slashes on every platform.
fn display_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

fn plural(n: usize, one: &str, many: &str) -> String {
    if n == 1 {
        format!("{n} {one}")
    } else {
        format!("{n} {many}")
    }
}

// ============================================================================
// Run header
// ============================================================================

/// Describe what a run is about to do.
pub fn format_run_header(config: &ConvertConfig) -> Vec<String> {
    let walk = if config.scan.recursive {
        "recursive"
    } else {
        "top level only"
    };
    let out = &config.output;
    let mut details = match out.format {
        OutputFormat::Jpeg => {
            let mut parts = vec![
                format!("JPEG quality {}", out.quality),
                out.subsampling.to_string(),
            ];
            if out.progressive {
                parts.push("progressive".to_string());
            }
            if out.optimize {
                parts.push("optimized".to_string());
            }
            parts
        }
        OutputFormat::Png => vec!["PNG lossless".to_string()],
    };
    details.push(if out.preserve_metadata {
        "metadata kept".to_string()
    } else {
        "metadata dropped".to_string()
    });
    if out.overwrite {
        details.push("overwrite".to_string());
    }

    vec![
        format!("Source: {} ({})", config.paths.source.display(), walk),
        format!("Dest:   {}", config.paths.dest.display()),
        format!("Output: {}", details.join(", ")),
    ]
}

pub fn print_run_header(config: &ConvertConfig) {
    for line in format_run_header(config) {
        println!("{}", line);
    }
}

/// Warning line for a JPEG quality past the useful range, if any.
pub fn format_quality_warning(format: OutputFormat, quality: u32) -> Option<String> {
    (format == OutputFormat::Jpeg && quality > QUALITY_WARNING_THRESHOLD).then(|| {
        format!(
            "Warning: quality {quality} > {QUALITY_WARNING_THRESHOLD} produces larger files without visible gain"
        )
    })
}

// ============================================================================
// Progress
// ============================================================================

/// Format a single progress event as display lines.
pub fn format_process_event(event: &ProcessEvent) -> Vec<String> {
    match event {
        ProcessEvent::Started { total: 0, .. } => {
            vec!["No HEIC/HEIF files found".to_string()]
        }
        ProcessEvent::Started { total, threads } => vec![format!(
            "Converting {} on {}",
            plural(*total, "file", "files"),
            plural(*threads, "thread", "threads")
        )],
        ProcessEvent::FileFinished {
            index,
            total,
            relative,
            outcome,
        } => {
            let status = match outcome {
                ConversionOutcome::Converted => "converted".to_string(),
                ConversionOutcome::SkippedExisting => "skipped (exists)".to_string(),
                ConversionOutcome::Failed(reason) => format!("FAILED: {reason}"),
            };
            vec![format!(
                "[{index}/{total}] {}: {status}",
                display_path(relative)
            )]
        }
    }
}

// ============================================================================
// Summary
// ============================================================================

/// Format the end-of-run totals and the failure list.
pub fn format_summary(summary: &RunSummary) -> Vec<String> {
    let mut lines = vec![format!(
        "Done: {} converted, {} skipped, {} failed ({} total)",
        summary.converted,
        summary.skipped,
        summary.failed,
        summary.total()
    )];
    if !summary.failures.is_empty() {
        lines.push("Failures:".to_string());
        for (path, reason) in &summary.failures {
            lines.push(format!("    {}: {}", display_path(path), reason));
        }
    }
    lines
}

pub fn print_summary(summary: &RunSummary) {
    for line in format_summary(summary) {
        println!("{}", line);
    }
}

// ============================================================================
// Fatal errors
// ============================================================================

/// Format an error that stopped the run before or instead of converting.
pub fn format_error(err: &dyn std::error::Error) -> Vec<String> {
    vec![format!("Error: {err}")]
}

pub fn print_error(err: &dyn std::error::Error) {
    for line in format_error(err) {
        eprintln!("{}", line);
    }
}
