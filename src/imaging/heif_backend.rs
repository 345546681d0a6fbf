//! Production backend: libheif for decoding, pure Rust for encoding.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Container parse + HEVC decode | `libheif-rs` (`HeifContext`, `LibHeif::decode`) |
//! | ICC profile | `ImageHandle::color_profile_raw` |
//! | EXIF block | `ImageHandle::metadata` on the `Exif` item |
//! | Orientation | `irot`/`imir` applied by libheif; EXIF tag reset to normal |
//! | Encode → JPEG / PNG | [`encode_raster`](super::encode::encode_raster) |
//!
//! The container's `irot`/`imir` transforms are authoritative, so libheif
//! applies them while decoding and the raster comes out upright. The EXIF
//! orientation tag would only repeat that rotation, so the decoded EXIF
//! block is rewritten to "normal" (or dropped if it cannot be) and the
//! raster reports [`Orientation::Normal`].

use super::backend::{BackendError, ImageBackend};
use super::encode::encode_raster;
use super::exif_block;
use super::orientation::Orientation;
use super::params::EncodeParams;
use super::raster::RasterImage;
use image::{DynamicImage, ImageBuffer, Rgb, Rgba};
use libheif_rs::{ColorSpace, HeifContext, ImageHandle, LibHeif, RgbChroma};

/// Extensions (lowercase, no dot) this backend accepts as input.
pub const INPUT_EXTENSIONS: &[&str] = &["heic", "heif"];

/// libheif-backed codec.
///
/// A `LibHeif` handle is opened per decode; libheif reference-counts its
/// global initialisation, so this is cheap and keeps the backend `Sync`.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeifBackend;

impl HeifBackend {
    pub fn new() -> Self {
        Self
    }
}

fn decode_err(e: impl std::fmt::Display) -> BackendError {
    BackendError::Decode(e.to_string())
}

/// Read the first `Exif` metadata item of the primary image, if any.
fn read_exif(handle: &ImageHandle) -> Option<Vec<u8>> {
    let ids = handle.metadata_block_ids(b"Exif");
    let item = handle.metadata(*ids.first()?).ok()?;
    exif_from_item(&item)
}

/// TIFF block of a HEIF `Exif` item, with orientation already normal.
///
/// libheif has applied the container transforms, so a leftover rotation
/// tag would turn the pixels a second time in viewers.
fn exif_from_item(item: &[u8]) -> Option<Vec<u8>> {
    let mut exif = exif_block::tiff_from_heif_item(item).map(<[u8]>::to_vec);
    exif_block::clear_orientation(&mut exif);
    exif
}

/// Scale an `n`-bit sample to the full 16-bit range with rounding.
fn widen_sample(value: u16, bits: u8) -> u16 {
    let max = (1u32 << bits) - 1;
    let v = u32::from(value).min(max);
    ((v * 65535 + max / 2) / max) as u16
}

/// Convert an interleaved libheif plane into a `DynamicImage`.
///
/// 8-bit planes map straight onto `Rgb8`/`Rgba8`; deeper planes arrive as
/// little-endian `u16` samples holding `bits` significant bits and are
/// widened into `Rgb16`/`Rgba16`.
fn plane_to_image(
    data: &[u8],
    stride: usize,
    width: u32,
    height: u32,
    bits: u8,
    has_alpha: bool,
) -> Result<DynamicImage, BackendError> {
    let channels: usize = if has_alpha { 4 } else { 3 };
    let bytes_per_sample: usize = if bits > 8 { 2 } else { 1 };
    let row_len = width as usize * channels * bytes_per_sample;
    if stride < row_len || data.len() < stride * (height as usize).saturating_sub(1) + row_len {
        return Err(BackendError::Decode(format!(
            "plane too small for {width}x{height} ({} bytes, stride {stride})",
            data.len()
        )));
    }

    let rows = (0..height as usize).map(|y| &data[y * stride..y * stride + row_len]);
    let size_err = || BackendError::Decode("decoded buffer size mismatch".to_string());

    if bytes_per_sample == 1 {
        let raw: Vec<u8> = rows.flatten().copied().collect();
        return if has_alpha {
            ImageBuffer::<Rgba<u8>, _>::from_raw(width, height, raw)
                .map(DynamicImage::ImageRgba8)
                .ok_or_else(size_err)
        } else {
            ImageBuffer::<Rgb<u8>, _>::from_raw(width, height, raw)
                .map(DynamicImage::ImageRgb8)
                .ok_or_else(size_err)
        };
    }

    let raw: Vec<u16> = rows
        .flat_map(|row| row.chunks_exact(2))
        .map(|pair| widen_sample(u16::from_le_bytes([pair[0], pair[1]]), bits))
        .collect();
    if has_alpha {
        ImageBuffer::<Rgba<u16>, _>::from_raw(width, height, raw)
            .map(DynamicImage::ImageRgba16)
            .ok_or_else(size_err)
    } else {
        ImageBuffer::<Rgb<u16>, _>::from_raw(width, height, raw)
            .map(DynamicImage::ImageRgb16)
            .ok_or_else(size_err)
    }
}

impl ImageBackend for HeifBackend {
    fn decode(&self, bytes: &[u8]) -> Result<RasterImage, BackendError> {
        let lib = LibHeif::new();
        let ctx = HeifContext::read_from_bytes(bytes).map_err(decode_err)?;
        let handle = ctx.primary_image_handle().map_err(decode_err)?;

        let has_alpha = handle.has_alpha_channel();
        let bits = handle.luma_bits_per_pixel().clamp(8, 16);
        let chroma = match (bits > 8, has_alpha) {
            (false, false) => RgbChroma::Rgb,
            (false, true) => RgbChroma::Rgba,
            (true, false) => RgbChroma::HdrRrggbbLe,
            (true, true) => RgbChroma::HdrRrggbbaaLe,
        };

        let decoded = lib
            .decode(&handle, ColorSpace::Rgb(chroma), None)
            .map_err(decode_err)?;

        let planes = decoded.planes();
        let plane = planes
            .interleaved
            .ok_or_else(|| BackendError::Decode("no interleaved RGB plane".to_string()))?;
        let pixels = plane_to_image(
            plane.data,
            plane.stride,
            plane.width,
            plane.height,
            bits,
            has_alpha,
        )?;

        let exif = read_exif(&handle);

        tracing::debug!(
            width = plane.width,
            height = plane.height,
            bits,
            has_alpha,
            has_exif = exif.is_some(),
            "decoded HEIF primary image"
        );

        Ok(RasterImage {
            pixels,
            bit_depth: bits,
            icc_profile: handle.color_profile_raw().map(|p| p.data),
            exif,
            orientation: Orientation::Normal,
        })
    }

    fn encode(&self, image: &RasterImage, params: &EncodeParams) -> Result<Vec<u8>, BackendError> {
        encode_raster(image, params)
    }
}
