//! Parameter types for encoding.
//!
//! These structs describe *what* the encoder should produce, not *how*. They
//! are the interface between the conversion job (which decides the output
//! format from the run options) and the [`backend`](super::backend) (which
//! does the actual byte work).
//!
//! ## Types
//!
//! - [`OutputFormat`]: JPEG (lossy) or PNG (lossless).
//! - [`Quality`]: JPEG quality (1–100, default 95). Clamped on construction.
//! - [`ChromaSubsampling`]: JPEG chroma layout, numbered like the CLI flag (0, 1, 2).
//! - [`EncodeParams`]: everything the encoder needs for one image.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Target file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Jpeg,
    Png,
}

impl OutputFormat {
    /// File extension written for this format, without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Png => "png",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Jpeg => write!(f, "jpeg"),
            OutputFormat::Png => write!(f, "png"),
        }
    }
}

/// Quality setting for lossy image encoding (1-100).
///
/// Always within range: the only ways in are [`Quality::new`] and `From<u32>`,
/// both of which clamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "u32", into = "u32")]
pub struct Quality(u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl From<u32> for Quality {
    fn from(value: u32) -> Self {
        Self::new(value)
    }
}

impl From<Quality> for u32 {
    fn from(quality: Quality) -> Self {
        quality.value()
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(95)
    }
}

/// JPEG chroma subsampling.
///
/// The numeric codes match the `--subsampling` flag: `0` keeps full color
/// resolution, `2` halves it in both directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ChromaSubsampling {
    #[default]
    Yuv444,
    Yuv422,
    Yuv420,
}

impl ChromaSubsampling {
    pub fn code(self) -> u8 {
        match self {
            ChromaSubsampling::Yuv444 => 0,
            ChromaSubsampling::Yuv422 => 1,
            ChromaSubsampling::Yuv420 => 2,
        }
    }
}

impl TryFrom<u8> for ChromaSubsampling {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(ChromaSubsampling::Yuv444),
            1 => Ok(ChromaSubsampling::Yuv422),
            2 => Ok(ChromaSubsampling::Yuv420),
            other => Err(format!(
                "subsampling must be 0 (4:4:4), 1 (4:2:2) or 2 (4:2:0), got {other}"
            )),
        }
    }
}

impl From<ChromaSubsampling> for u8 {
    fn from(value: ChromaSubsampling) -> Self {
        value.code()
    }
}

impl fmt::Display for ChromaSubsampling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ChromaSubsampling::Yuv444 => "4:4:4",
            ChromaSubsampling::Yuv422 => "4:2:2",
            ChromaSubsampling::Yuv420 => "4:2:0",
        };
        f.write_str(label)
    }
}

/// Everything the encoder needs for one image.
///
/// `quality`, `subsampling`, `progressive` and `optimize` only affect JPEG;
/// PNG output ignores them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeParams {
    pub format: OutputFormat,
    pub quality: Quality,
    pub subsampling: ChromaSubsampling,
    pub progressive: bool,
    pub optimize: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_clamps_to_valid_range() {
        assert_eq!(Quality::new(0).value(), 1);
        assert_eq!(Quality::new(50).value(), 50);
        assert_eq!(Quality::new(150).value(), 100);
    }

    #[test]
    fn quality_deserialize_clamps() {
        let q: Quality = toml::Value::Integer(300).try_into().unwrap();
        assert_eq!(q.value(), 100);
        let q: Quality = toml::Value::Integer(0).try_into().unwrap();
        assert_eq!(q.value(), 1);
    }

    #[test]
    fn quality_from_u32_clamps() {
        assert_eq!(Quality::from(1000).value(), 100);
        assert_eq!(u32::from(Quality::new(42)), 42);
    }

    #[test]
    fn quality_default_is_95() {
        assert_eq!(Quality::default().value(), 95);
    }

    #[test]
    fn subsampling_codes_roundtrip() {
        for code in 0..=2u8 {
            let s = ChromaSubsampling::try_from(code).unwrap();
            assert_eq!(s.code(), code);
        }
        assert!(ChromaSubsampling::try_from(3).is_err());
    }

    #[test]
    fn subsampling_display() {
        assert_eq!(ChromaSubsampling::Yuv444.to_string(), "4:4:4");
        assert_eq!(ChromaSubsampling::Yuv420.to_string(), "4:2:0");
    }

    #[test]
    fn format_extensions() {
        assert_eq!(OutputFormat::Jpeg.extension(), "jpg");
        assert_eq!(OutputFormat::Png.extension(), "png");
    }
}
