use crate::error::TransformError;
use image::codecs::jpeg::JpegEncoder;
use image::{ColorType, Rgb, RgbImage};

/// Build a colour test-pattern JPEG; `phase` shifts the pattern between frames
pub fn synthetic_jpeg(width: u32, height: u32, phase: u32) -> Result<Vec<u8>, TransformError> {
    let width = width.max(1);
    let height = height.max(1);

    let image = RgbImage::from_fn(width, height, |x, y| {
        let shifted = x.wrapping_add(phase.wrapping_mul(7)) % width;
        Rgb([
            (shifted * 255 / width) as u8,
            (y * 255 / height) as u8,
            (phase.wrapping_mul(13).wrapping_add(x / 8 + y / 8) % 256) as u8,
        ])
    });

    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, 85)
        .encode(image.as_raw(), width, height, ColorType::Rgb8)
        .map_err(|e| TransformError::Encode {
            details: e.to_string(),
        })?;

    Ok(jpeg)
}
