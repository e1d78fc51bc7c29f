use bytes::Bytes;
use std::time::SystemTime;

/// Side length of every captured still
pub const CAPTURE_SIZE: u32 = 96;

/// JPEG quality used when re-encoding captured stills (0.92 on a 0-1 scale)
pub const CAPTURE_JPEG_QUALITY: u8 = 92;

/// JPEG start-of-image marker
const JPEG_MAGIC: [u8; 3] = [0xFF, 0xD8, 0xFF];

/// Whether `data` starts with the JPEG start-of-image marker
pub fn has_jpeg_magic(data: &[u8]) -> bool {
    data.starts_with(&JPEG_MAGIC)
}

/// Undecoded frame as returned by the camera endpoint
#[derive(Debug, Clone)]
pub struct RawFrame {
    /// Identifier assigned by the acquisition loop
    pub id: u64,
    /// Time the response body finished arriving
    pub fetched_at: SystemTime,
    /// Cache-defeating token sent with the request
    pub token: u64,
    /// Content type reported by the device, if any
    pub content_type: Option<String>,
    /// Raw payload (shared, cheap to clone)
    pub data: Bytes,
}

impl RawFrame {
    pub fn new(id: u64, token: u64, content_type: Option<String>, data: Bytes) -> Self {
        Self {
            id,
            fetched_at: SystemTime::now(),
            token,
            content_type,
            data,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Check the payload for the JPEG start-of-image marker
    pub fn looks_like_jpeg(&self) -> bool {
        has_jpeg_magic(&self.data)
    }

    /// Get frame age in milliseconds
    pub fn age_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(self.fetched_at)
            .unwrap_or_default()
            .as_millis() as u64
    }
}

/// Downscaled grayscale still ready to go into an archive
///
/// The payload is immutable once built; clones share the same bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedFrame {
    /// Id of the raw frame this still was produced from
    pub source_id: u64,
    /// Time the source frame was fetched
    pub captured_at: SystemTime,
    pub width: u32,
    pub height: u32,
    jpeg: Bytes,
}

impl CapturedFrame {
    pub fn new(source_id: u64, captured_at: SystemTime, width: u32, height: u32, jpeg: Vec<u8>) -> Self {
        Self {
            source_id,
            captured_at,
            width,
            height,
            jpeg: Bytes::from(jpeg),
        }
    }

    /// Encoded JPEG bytes
    pub fn jpeg(&self) -> &[u8] {
        &self.jpeg
    }

    pub fn len(&self) -> usize {
        self.jpeg.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jpeg.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_frame_jpeg_detection() {
        let jpeg = RawFrame::new(1, 10, None, Bytes::from_static(&[0xFF, 0xD8, 0xFF, 0xE0, 0x00]));
        let png = RawFrame::new(2, 11, None, Bytes::from_static(&[0x89, b'P', b'N', b'G']));

        assert!(jpeg.looks_like_jpeg());
        assert!(!png.looks_like_jpeg());
        assert!(has_jpeg_magic(&jpeg.data));
        assert!(!has_jpeg_magic(&[0xFF, 0xD8]));
        assert_eq!(jpeg.len(), 5);
        assert!(!jpeg.is_empty());
    }

    #[test]
    fn test_captured_frame_shares_payload() {
        let frame = CapturedFrame::new(7, SystemTime::now(), CAPTURE_SIZE, CAPTURE_SIZE, vec![1, 2, 3]);
        let clone = frame.clone();

        assert_eq!(frame.jpeg().as_ptr(), clone.jpeg().as_ptr());
        assert_eq!(clone.len(), 3);
        assert_eq!(clone.width, 96);
    }
}
