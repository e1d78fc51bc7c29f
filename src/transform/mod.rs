use crate::error::TransformError;
use crate::frame::{has_jpeg_magic, CapturedFrame, RawFrame, CAPTURE_JPEG_QUALITY, CAPTURE_SIZE};
use image::codecs::jpeg::{JpegDecoder, JpegEncoder};
use image::imageops::{self, FilterType};
use image::{ColorType, DynamicImage, RgbaImage};
use std::io::Cursor;
use tracing::{debug, warn};

#[cfg(test)]
mod tests;

/// Luma weights applied to R, G and B
const LUMA_WEIGHTS: (f64, f64, f64) = (0.299, 0.587, 0.114);

/// Which decoder produced the bitmap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodePath {
    /// Dedicated JPEG decoder, used when the payload carries a JPEG marker
    Jpeg,
    /// Format-guessing decoder
    Generic,
}

/// Converts raw device frames into 96x96 grayscale JPEG stills
#[derive(Debug, Clone)]
pub struct FrameTransform {
    width: u32,
    height: u32,
    quality: u8,
}

impl Default for FrameTransform {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameTransform {
    pub fn new() -> Self {
        Self {
            width: CAPTURE_SIZE,
            height: CAPTURE_SIZE,
            quality: CAPTURE_JPEG_QUALITY,
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Transform a frame on the blocking pool
    pub async fn apply(&self, raw: RawFrame) -> Result<CapturedFrame, TransformError> {
        let transform = self.clone();
        tokio::task::spawn_blocking(move || transform.apply_blocking(&raw))
            .await
            .map_err(|e| TransformError::Worker {
                details: e.to_string(),
            })?
    }

    /// Decode, resample, desaturate and re-encode one frame
    pub fn apply_blocking(&self, raw: &RawFrame) -> Result<CapturedFrame, TransformError> {
        let (bitmap, path) = decode(&raw.data)?;
        debug!(
            "Decoded frame {} via {:?} path ({}x{})",
            raw.id,
            path,
            bitmap.width(),
            bitmap.height()
        );

        let mut resized = self.resample(&bitmap);
        apply_grayscale(&mut resized);
        let jpeg = self.encode(&resized)?;

        debug!(
            "Frame {} transformed to {}x{} still ({} bytes)",
            raw.id,
            self.width,
            self.height,
            jpeg.len()
        );

        Ok(CapturedFrame::new(
            raw.id,
            raw.fetched_at,
            self.width,
            self.height,
            jpeg,
        ))
    }

    /// Stretch the bitmap onto the full target area
    pub fn resample(&self, bitmap: &DynamicImage) -> RgbaImage {
        let rgba = bitmap.to_rgba8();
        if rgba.dimensions() == (self.width, self.height) {
            return rgba;
        }
        imageops::resize(&rgba, self.width, self.height, FilterType::Triangle)
    }

    fn encode(&self, image: &RgbaImage) -> Result<Vec<u8>, TransformError> {
        // JPEG carries no alpha; the gray value is the same in every channel
        let rgb = DynamicImage::ImageRgba8(image.clone()).to_rgb8();
        let mut jpeg = Vec::with_capacity((self.width * self.height) as usize);

        JpegEncoder::new_with_quality(&mut jpeg, self.quality)
            .encode(rgb.as_raw(), rgb.width(), rgb.height(), ColorType::Rgb8)
            .map_err(|e| TransformError::Encode {
                details: e.to_string(),
            })?;

        if jpeg.is_empty() {
            return Err(TransformError::Encode {
                details: "Failed to build resized image".to_string(),
            });
        }

        Ok(jpeg)
    }
}

/// Decode a payload, preferring the JPEG decoder and falling back to format detection
pub fn decode(data: &[u8]) -> Result<(DynamicImage, DecodePath), TransformError> {
    if data.is_empty() {
        return Err(TransformError::Decode {
            details: "empty payload".to_string(),
        });
    }

    if has_jpeg_magic(data) {
        match decode_jpeg(data) {
            Ok(image) => return Ok((image, DecodePath::Jpeg)),
            Err(e) => warn!("JPEG decoder rejected frame, trying generic decoder: {}", e),
        }
    }

    decode_generic(data).map(|image| (image, DecodePath::Generic))
}

pub fn decode_jpeg(data: &[u8]) -> Result<DynamicImage, TransformError> {
    let decoder = JpegDecoder::new(Cursor::new(data)).map_err(|e| TransformError::Decode {
        details: e.to_string(),
    })?;
    DynamicImage::from_decoder(decoder).map_err(|e| TransformError::Decode {
        details: e.to_string(),
    })
}

pub fn decode_generic(data: &[u8]) -> Result<DynamicImage, TransformError> {
    image::load_from_memory(data).map_err(|e| TransformError::Decode {
        details: e.to_string(),
    })
}

/// Replace R, G and B with the rounded luma value; alpha is left as is
pub fn apply_grayscale(image: &mut RgbaImage) {
    for pixel in image.pixels_mut() {
        let gray = luma(pixel[0], pixel[1], pixel[2]);
        pixel[0] = gray;
        pixel[1] = gray;
        pixel[2] = gray;
    }
}

pub fn luma(r: u8, g: u8, b: u8) -> u8 {
    let (wr, wg, wb) = LUMA_WEIGHTS;
    let value = wr * r as f64 + wg * g as f64 + wb * b as f64;
    value.round().clamp(0.0, 255.0) as u8
}
