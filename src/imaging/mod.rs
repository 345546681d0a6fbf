//! Codec boundary and the pure raster steps around it.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Decode HEIC/HEIF** | `libheif-rs` |
//! | **Orientation** | container transforms in libheif; EXIF tag read with `kamadak-exif`, reset by in-place IFD0 patch |
//! | **Bit-depth / rotate** | `image::DynamicImage` conversions |
//! | **Encode JPEG** | `jpeg-encoder` |
//! | **Encode PNG** | `image::codecs::png` |
//!
//! The module is split into:
//! - **Parameters**: what to encode ([`OutputFormat`], [`Quality`], [`ChromaSubsampling`])
//! - **Raster**: [`RasterImage`] plus bit-depth and orientation normalization
//! - **Backend**: [`ImageBackend`] trait + [`HeifBackend`]

pub mod backend;
pub mod encode;
pub(crate) mod exif_block;
pub mod heif_backend;
mod orientation;
mod params;
mod raster;

pub use backend::{BackendError, ImageBackend};
pub use heif_backend::{HeifBackend, INPUT_EXTENSIONS};
pub use orientation::Orientation;
pub use params::{ChromaSubsampling, EncodeParams, OutputFormat, Quality};
pub use raster::RasterImage;
