//! Codec backend trait and shared error type.
//!
//! The [`ImageBackend`] trait is the boundary between the conversion pipeline
//! and the codecs: `decode` turns container bytes into a [`RasterImage`],
//! `encode` turns a raster into output bytes. The pipeline never looks
//! inside either operation.
//!
//! The production implementation is
//! [`HeifBackend`](super::heif_backend::HeifBackend).

use super::params::EncodeParams;
use super::raster::RasterImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("decode failed: {0}")]
    Decode(String),
    #[error("encode failed: {0}")]
    Encode(String),
}

/// Trait for codec backends.
///
/// Backends are shared across rayon workers, hence `Sync`.
pub trait ImageBackend: Sync {
    /// Decode the primary image of a container, with its ICC profile, EXIF
    /// block and orientation.
    fn decode(&self, bytes: &[u8]) -> Result<RasterImage, BackendError>;

    /// Encode a raster into the format named by `params`.
    fn encode(&self, image: &RasterImage, params: &EncodeParams) -> Result<Vec<u8>, BackendError>;
}
