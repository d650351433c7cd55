use image::{GenericImageView, ImageFormat};

use crate::error::CodecError;

/// Decode a grayscale raster and widen it to 16 bits per sample.
///
/// 8-bit rasters are widened the usual way (`v * 257`), so a JPEG8 payload
/// comes back on the same scale as a 16-bit PNG would.
pub(crate) fn decode_luma16(
    bytes: &[u8],
    format: ImageFormat,
    width: u32,
    height: u32,
) -> Result<Vec<u16>, CodecError> {
    let image = image::load_from_memory_with_format(bytes, format)?;
    let (actual_width, actual_height) = image.dimensions();
    if (actual_width, actual_height) != (width, height) {
        return Err(CodecError::RasterSize {
            width,
            height,
            actual_width,
            actual_height,
        });
    }
    Ok(image.into_luma16().into_raw())
}
