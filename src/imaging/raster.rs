//! Decoded image plus the metadata that travels with it.
//!
//! Everything here is a pure function of the raster with no I/O and no codec
//! calls, so the normalization steps of a conversion can be unit tested
//! on tiny synthetic images.

use super::exif_block;
use super::orientation::Orientation;
use image::{ColorType, DynamicImage};

/// A decoded image as handed between the backend and the conversion job.
///
/// `bit_depth` is the precision of the *source* samples, which can be lower
/// than the storage type: a 10-bit HEIC decodes into 16-bit buffers but
/// still reports `10`.
#[derive(Debug, Clone)]
pub struct RasterImage {
    pub pixels: DynamicImage,
    pub bit_depth: u8,
    pub icc_profile: Option<Vec<u8>>,
    /// Raw TIFF block (no `Exif\0\0` or HEIF offset prefix).
    pub exif: Option<Vec<u8>>,
    pub orientation: Orientation,
}

impl RasterImage {
    /// Wrap pixels with no metadata; bit depth is taken from the buffer type.
    pub fn new(pixels: DynamicImage) -> Self {
        let bit_depth = bits_per_channel(pixels.color());
        Self {
            pixels,
            bit_depth,
            icc_profile: None,
            exif: None,
            orientation: Orientation::Normal,
        }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn has_alpha(&self) -> bool {
        self.pixels.color().has_alpha()
    }

    /// Whether samples must be reduced before writing an 8-bit format.
    pub fn needs_downsample(&self) -> bool {
        self.bit_depth > 8 || bits_per_channel(self.pixels.color()) > 8
    }

    /// Reduce to 8 bits per channel, keeping the channel layout.
    ///
    /// Uses the `image` crate's rounding conversion; no dithering.
    pub fn into_8bit(self) -> Self {
        if !self.needs_downsample() {
            return self;
        }
        let color = self.pixels.color();
        let pixels = match (color.has_color(), color.has_alpha()) {
            (true, true) => DynamicImage::ImageRgba8(self.pixels.to_rgba8()),
            (true, false) => DynamicImage::ImageRgb8(self.pixels.to_rgb8()),
            (false, true) => DynamicImage::ImageLumaA8(self.pixels.to_luma_alpha8()),
            (false, false) => DynamicImage::ImageLuma8(self.pixels.to_luma8()),
        };
        Self {
            pixels,
            bit_depth: 8,
            ..self
        }
    }

    /// Store the pixels upright and mark the EXIF orientation as normal.
    ///
    /// An EXIF block whose orientation entry cannot be rewritten is dropped.
    pub fn into_upright(mut self) -> Self {
        if self.orientation == Orientation::Normal {
            return self;
        }
        self.pixels = self.orientation.apply(self.pixels);
        self.orientation = Orientation::Normal;
        exif_block::clear_orientation(&mut self.exif);
        self
    }

    /// Drop ICC, EXIF and orientation; pixels stay exactly as decoded.
    pub fn without_metadata(self) -> Self {
        Self {
            icc_profile: None,
            exif: None,
            orientation: Orientation::Normal,
            ..self
        }
    }
}

fn bits_per_channel(color: ColorType) -> u8 {
    let channels = color.channel_count().max(1);
    color.bytes_per_pixel() / channels * 8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::exif_block::tests::{tiff_with_long_orientation, tiff_with_orientation};
    use image::{ImageBuffer, Rgb, Rgba, RgbImage};

    fn rgb16(width: u32, height: u32, value: u16) -> DynamicImage {
        DynamicImage::ImageRgb16(ImageBuffer::from_pixel(width, height, Rgb([value; 3])))
    }

    #[test]
    fn new_reads_bit_depth_from_buffer() {
        assert_eq!(RasterImage::new(DynamicImage::new_rgb8(1, 1)).bit_depth, 8);
        assert_eq!(RasterImage::new(rgb16(1, 1, 0)).bit_depth, 16);
    }

    #[test]
    fn eight_bit_is_untouched() {
        let raster = RasterImage::new(DynamicImage::new_rgb8(4, 4));
        assert!(!raster.needs_downsample());
        let out = raster.into_8bit();
        assert_eq!(out.pixels.color(), ColorType::Rgb8);
    }

    #[test]
    fn sixteen_bit_rounds_to_eight() {
        let raster = RasterImage::new(rgb16(2, 2, 0x8080));
        assert!(raster.needs_downsample());
        let out = raster.into_8bit();
        assert_eq!(out.bit_depth, 8);
        assert_eq!(out.pixels.color(), ColorType::Rgb8);
        assert_eq!(out.pixels.to_rgb8().get_pixel(0, 0)[0], 0x80);
    }

    #[test]
    fn ten_bit_source_in_sixteen_bit_buffer_is_downsampled() {
        let mut raster = RasterImage::new(rgb16(1, 1, u16::MAX));
        raster.bit_depth = 10;
        let out = raster.into_8bit();
        assert_eq!(out.pixels.to_rgb8().get_pixel(0, 0)[0], 255);
    }

    #[test]
    fn alpha_is_kept_when_downsampling() {
        let img = ImageBuffer::from_pixel(1, 1, Rgba([0u16, 0, 0, u16::MAX]));
        let out = RasterImage::new(DynamicImage::ImageRgba16(img)).into_8bit();
        assert_eq!(out.pixels.color(), ColorType::Rgba8);
    }

    #[test]
    fn upright_rotates_and_resets_tag() {
        let mut raster = RasterImage::new(DynamicImage::ImageRgb8(RgbImage::new(4, 2)));
        raster.orientation = Orientation::Rotate90CW;
        raster.exif = Some(tiff_with_orientation(6, false));

        let out = raster.into_upright();
        assert_eq!((out.width(), out.height()), (2, 4));
        assert_eq!(out.orientation, Orientation::Normal);
        let exif = out.exif.unwrap();
        assert_eq!(exif_block::read_orientation(&exif), Orientation::Normal);
    }

    #[test]
    fn upright_drops_exif_it_cannot_patch() {
        let mut raster = RasterImage::new(DynamicImage::ImageRgb8(RgbImage::new(4, 2)));
        raster.orientation = Orientation::Rotate90CW;
        raster.exif = Some(tiff_with_long_orientation(6));

        let out = raster.into_upright();
        assert_eq!((out.width(), out.height()), (2, 4));
        assert!(out.exif.is_none());
    }

    #[test]
    fn upright_is_noop_for_normal() {
        let raster = RasterImage::new(DynamicImage::new_rgb8(4, 2));
        let out = raster.into_upright();
        assert_eq!((out.width(), out.height()), (4, 2));
    }

    #[test]
    fn without_metadata_keeps_pixels() {
        let mut raster = RasterImage::new(DynamicImage::new_rgb8(4, 2));
        raster.orientation = Orientation::Rotate90CW;
        raster.icc_profile = Some(vec![1, 2, 3]);
        raster.exif = Some(tiff_with_orientation(6, false));

        let out = raster.without_metadata();
        assert_eq!((out.width(), out.height()), (4, 2));
        assert!(out.icc_profile.is_none());
        assert!(out.exif.is_none());
        assert_eq!(out.orientation, Orientation::Normal);
    }
}
