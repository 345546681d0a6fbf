//! EXIF block handling: locate, read orientation, rewrite orientation.
//!
//! Blocks are kept as raw TIFF bytes (starting at the `II*\0` / `MM\0*`
//! header) everywhere inside the crate. HEIF stores them behind a 4-byte
//! offset prefix, JPEG behind an `Exif\0\0` APP1 signature; the helpers here
//! strip and add those wrappers.
//!
//! Reading goes through `kamadak-exif`. Writing is a single in-place patch
//! of the IFD0 orientation entry, so every other tag is carried through
//! byte-for-byte.

use super::orientation::Orientation;
use exif::{In, Reader, Tag};

/// Signature that precedes the TIFF header inside a JPEG APP1 segment.
pub const APP1_SIGNATURE: &[u8] = b"Exif\0\0";

const ORIENTATION_TAG: u16 = 0x0112;
const TYPE_SHORT: u16 = 3;

/// Extract the TIFF block from a HEIF `Exif` metadata item.
///
/// The item starts with a big-endian `u32` giving the offset of the TIFF
/// header from the end of that field. Some encoders also leave an
/// `Exif\0\0` signature in front of the header; it is skipped as well.
pub fn tiff_from_heif_item(item: &[u8]) -> Option<&[u8]> {
    if item.len() < 4 {
        return None;
    }
    let offset = u32::from_be_bytes([item[0], item[1], item[2], item[3]]) as usize;
    let mut rest = item.get(4usize.checked_add(offset)?..)?;
    if rest.starts_with(APP1_SIGNATURE) {
        rest = &rest[APP1_SIGNATURE.len()..];
    }
    has_tiff_header(rest).then_some(rest)
}

/// Wrap a TIFF block for a JPEG APP1 segment.
pub fn app1_payload(tiff: &[u8]) -> Vec<u8> {
    let mut payload = Vec::with_capacity(APP1_SIGNATURE.len() + tiff.len());
    payload.extend_from_slice(APP1_SIGNATURE);
    payload.extend_from_slice(tiff);
    payload
}

fn has_tiff_header(data: &[u8]) -> bool {
    data.starts_with(b"II*\0") || data.starts_with(b"MM\0*")
}

/// Read the orientation tag from a TIFF block.
///
/// Missing tags, unknown values and unparseable blocks all read as `Normal`.
pub fn read_orientation(tiff: &[u8]) -> Orientation {
    match Reader::new().read_raw(tiff.to_vec()) {
        Ok(exif) => exif
            .get_field(Tag::Orientation, In::PRIMARY)
            .and_then(|field| field.value.get_uint(0))
            .map(Orientation::from)
            .unwrap_or_default(),
        Err(_) => Orientation::Normal,
    }
}

/// Rewrite the IFD0 orientation entry to `1` (normal) in place.
///
/// Returns `true` when an orientation entry was found and patched. Blocks
/// without the entry are left untouched, which already reads as normal.
pub fn reset_orientation(tiff: &mut [u8]) -> bool {
    if tiff.len() < 8 || !has_tiff_header(tiff) {
        return false;
    }
    let big_endian = tiff[0] == b'M';

    let read_u16 = |data: &[u8], offset: usize| -> u16 {
        let bytes = [data[offset], data[offset + 1]];
        if big_endian {
            u16::from_be_bytes(bytes)
        } else {
            u16::from_le_bytes(bytes)
        }
    };

    let ifd_offset = {
        let bytes = [tiff[4], tiff[5], tiff[6], tiff[7]];
        if big_endian {
            u32::from_be_bytes(bytes)
        } else {
            u32::from_le_bytes(bytes)
        }
    } as usize;

    if ifd_offset + 2 > tiff.len() {
        return false;
    }
    let entry_count = read_u16(tiff, ifd_offset) as usize;

    for i in 0..entry_count {
        let entry = ifd_offset + 2 + i * 12;
        if entry + 12 > tiff.len() {
            return false;
        }
        if read_u16(tiff, entry) != ORIENTATION_TAG {
            continue;
        }
        if read_u16(tiff, entry + 2) != TYPE_SHORT {
            return false;
        }
        // A single SHORT sits left-aligned in the 4-byte value field.
        let value = if big_endian {
            1u16.to_be_bytes()
        } else {
            1u16.to_le_bytes()
        };
        tiff[entry + 8..entry + 10].copy_from_slice(&value);
        return true;
    }
    false
}

/// Make an optional EXIF block say "normal" orientation.
///
/// The tag is patched in place. When a block still reads as rotated but
/// cannot be patched (an entry typed LONG, a truncated IFD), the whole block
/// is dropped so no viewer rotates already-upright pixels again.
pub fn clear_orientation(exif: &mut Option<Vec<u8>>) {
    let Some(block) = exif.as_mut() else {
        return;
    };
    if reset_orientation(block) || read_orientation(block) == Orientation::Normal {
        return;
    }
    tracing::debug!(
        "EXIF orientation entry could not be rewritten; dropping EXIF block ({} bytes)",
        block.len()
    );
    *exif = None;
}
