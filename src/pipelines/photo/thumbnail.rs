// SPDX-License-Identifier: GPL-3.0-only

//! Thumbnails for saved photos
//!
//! The persistence collaborator stores a small JPEG next to each dish; it is
//! produced here from the captured bytes.

use image::codecs::jpeg::JpegEncoder;
use tracing::debug;

/// Longest edge of a dish thumbnail
pub const THUMBNAIL_MAX_EDGE: u32 = 160;
const THUMBNAIL_JPEG_QUALITY: u8 = 80;

/// Decode `data`, shrink it to fit `max_edge`, and re-encode as JPEG
///
/// Returns `None` for bytes the decoder does not understand.
pub fn make_thumbnail(data: &[u8], max_edge: u32) -> Option<Vec<u8>> {
    let image = image::load_from_memory(data)
        .map_err(|e| debug!(error = %e, "Photo bytes not decodable for thumbnail"))
        .ok()?;

    let thumbnail = image.thumbnail(max_edge, max_edge).to_rgb8();

    let mut buffer = Vec::new();
    JpegEncoder::new_with_quality(&mut buffer, THUMBNAIL_JPEG_QUALITY)
        .encode_image(&thumbnail)
        .map_err(|e| debug!(error = %e, "Thumbnail encoding failed"))
        .ok()?;

    debug!(
        width = thumbnail.width(),
        height = thumbnail.height(),
        bytes = buffer.len(),
        "Thumbnail created"
    );
    Some(buffer)
}
