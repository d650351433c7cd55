//! Lossless 16-bit grayscale PNG of millimeter depth.

use std::io::Cursor;

use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, ImageFormat};

use super::buffer::DepthBuffer;
use super::quantize::{dequantize, quantize};
use super::raster;
use crate::error::CodecError;

pub fn encode(buffer: &DepthBuffer) -> Result<Vec<u8>, CodecError> {
    let millimeters = quantize(buffer.samples());

    // The encoder takes 16-bit channels in native byte order.
    let raw: Vec<u8> = millimeters.iter().flat_map(|mm| mm.to_ne_bytes()).collect();

    let mut out = Cursor::new(Vec::new());
    PngEncoder::new(&mut out).write_image(
        &raw,
        buffer.width(),
        buffer.height(),
        ExtendedColorType::L16,
    )?;
    Ok(out.into_inner())
}

pub fn decode(bytes: &[u8], width: u32, height: u32) -> Result<DepthBuffer, CodecError> {
    let millimeters = raster::decode_luma16(bytes, ImageFormat::Png, width, height)?;
    DepthBuffer::new(width, height, dequantize(&millimeters))
}
