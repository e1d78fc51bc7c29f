use crate::error::ExportError;
use crate::frame::CapturedFrame;

/// Archive entry name for the frame at zero-based `index`
pub fn entry_name(index: usize) -> String {
    format!("capture_{:04}.jpg", index + 1)
}

/// Download filename for an archive built at `epoch_ms`
pub fn archive_filename(epoch_ms: i64) -> String {
    format!("tm_captures_{}.zip", epoch_ms)
}

/// Pack frames into a ZIP, one stored entry per frame in buffer order
#[cfg(feature = "archive")]
pub fn build_archive(frames: &[CapturedFrame]) -> Result<Vec<u8>, ExportError> {
    use std::io::{Cursor, Write};
    use zip::write::SimpleFileOptions;
    use zip::{CompressionMethod, ZipWriter};

    if frames.is_empty() {
        return Err(ExportError::EmptyBuffer);
    }

    let archive_error = |details: String| ExportError::Archive { details };
    let capacity = frames.iter().map(CapturedFrame::len).sum::<usize>() + frames.len() * 128;
    let mut writer = ZipWriter::new(Cursor::new(Vec::with_capacity(capacity)));

    for (index, frame) in frames.iter().enumerate() {
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        writer
            .start_file(entry_name(index), options)
            .map_err(|e| archive_error(e.to_string()))?;
        writer
            .write_all(frame.jpeg())
            .map_err(|e| archive_error(e.to_string()))?;
    }

    let cursor = writer
        .finish()
        .map_err(|e| archive_error(e.to_string()))?;
    Ok(cursor.into_inner())
}

#[cfg(not(feature = "archive"))]
pub fn build_archive(_frames: &[CapturedFrame]) -> Result<Vec<u8>, ExportError> {
    Err(ExportError::ArchiverUnavailable)
}
