//! JPEG and PNG encoders, pure Rust.
//!
//! | Format | Crate | Metadata |
//! |---|---|---|
//! | JPEG | `jpeg-encoder` (quality, subsampling, progressive, optimized Huffman) | ICC in APP2, EXIF in APP1 |
//! | PNG | `image::codecs::png` (lossless) | ICC in `iCCP`; EXIF omitted |
//!
//! Whatever metadata is on the [`RasterImage`] gets written; deciding what
//! to keep is the conversion job's business.

use super::backend::BackendError;
use super::exif_block;
use super::params::{ChromaSubsampling, EncodeParams, OutputFormat};
use super::raster::RasterImage;
use image::codecs::png::PngEncoder;
use image::{DynamicImage, ImageEncoder};
use jpeg_encoder::{ColorType, Encoder, SamplingFactor};

/// Encode `image` as described by `params`.
pub fn encode_raster(image: &RasterImage, params: &EncodeParams) -> Result<Vec<u8>, BackendError> {
    match params.format {
        OutputFormat::Jpeg => encode_jpeg(image, params),
        OutputFormat::Png => encode_png(image),
    }
}

fn sampling_factor(subsampling: ChromaSubsampling) -> SamplingFactor {
    match subsampling {
        ChromaSubsampling::Yuv444 => SamplingFactor::R_4_4_4,
        ChromaSubsampling::Yuv422 => SamplingFactor::R_4_2_2,
        ChromaSubsampling::Yuv420 => SamplingFactor::R_4_2_0,
    }
}

fn encode_jpeg(image: &RasterImage, params: &EncodeParams) -> Result<Vec<u8>, BackendError> {
    let (width, height) = (image.width(), image.height());
    let (Ok(w), Ok(h)) = (u16::try_from(width), u16::try_from(height)) else {
        return Err(BackendError::Encode(format!(
            "{width}x{height} exceeds the JPEG limit of 65535 pixels per side"
        )));
    };

    // JPEG has no alpha channel; grayscale stays single-channel.
    if image.has_alpha() {
        tracing::debug!("dropping alpha channel for JPEG output");
    }
    let (data, color) = match &image.pixels {
        DynamicImage::ImageLuma8(gray) => (gray.as_raw().clone(), ColorType::Luma),
        other => (other.to_rgb8().into_raw(), ColorType::Rgb),
    };

    let mut buf = Vec::new();
    let quality = u8::try_from(params.quality.value()).unwrap_or(100);
    let mut encoder = Encoder::new(&mut buf, quality);
    encoder.set_sampling_factor(sampling_factor(params.subsampling));
    encoder.set_progressive(params.progressive);
    encoder.set_optimized_huffman_tables(params.optimize);

    if let Some(icc) = &image.icc_profile {
        encoder
            .add_icc_profile(icc)
            .map_err(|e| BackendError::Encode(format!("ICC profile: {e}")))?;
    }
    if let Some(exif) = &image.exif {
        // APP1 caps out just under 64 KiB; oversized blocks are dropped, not fatal.
        if let Err(e) = encoder.add_app_segment(1, &exif_block::app1_payload(exif)) {
            tracing::warn!("EXIF block not written ({} bytes): {e}", exif.len());
        }
    }

    encoder
        .encode(&data, w, h, color)
        .map_err(|e| BackendError::Encode(format!("JPEG: {e}")))?;
    Ok(buf)
}

fn encode_png(image: &RasterImage) -> Result<Vec<u8>, BackendError> {
    let mut buf = Vec::new();
    let mut encoder = PngEncoder::new(&mut buf);

    if let Some(icc) = &image.icc_profile {
        if let Err(e) = encoder.set_icc_profile(icc.clone()) {
            tracing::debug!("ICC profile not written to PNG: {e}");
        }
    }
    if image.exif.is_some() {
        tracing::debug!("EXIF is not carried into PNG output");
    }

    let pixels = &image.pixels;
    encoder
        .write_image(
            pixels.as_bytes(),
            pixels.width(),
            pixels.height(),
            pixels.color().into(),
        )
        .map_err(|e| BackendError::Encode(format!("PNG: {e}")))?;
    Ok(buf)
}
