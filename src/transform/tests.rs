use super::*;
use bytes::Bytes;
use image::codecs::png::PngEncoder;
use image::{ImageEncoder, Rgb, RgbImage, Rgba};

fn gradient(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([
            (x * 255 / width.max(1)) as u8,
            (y * 255 / height.max(1)) as u8,
            ((x + y) % 256) as u8,
        ])
    })
}

fn encode_jpeg(image: &RgbImage) -> Vec<u8> {
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, 90)
        .encode(image.as_raw(), image.width(), image.height(), ColorType::Rgb8)
        .unwrap();
    out
}

fn encode_png(image: &RgbImage) -> Vec<u8> {
    let mut out = Vec::new();
    PngEncoder::new(&mut out)
        .write_image(image.as_raw(), image.width(), image.height(), ColorType::Rgb8)
        .unwrap();
    out
}

fn raw(data: Vec<u8>) -> RawFrame {
    RawFrame::new(1, 1_700_000_000_000, Some("image/jpeg".to_string()), Bytes::from(data))
}

#[test]
fn test_luma_weights() {
    assert_eq!(luma(255, 0, 0), 76);
    assert_eq!(luma(0, 255, 0), 150);
    assert_eq!(luma(0, 0, 255), 29);
    assert_eq!(luma(255, 255, 255), 255);
    assert_eq!(luma(0, 0, 0), 0);
    // 0.299*10 + 0.587*20 + 0.114*30 = 18.15
    assert_eq!(luma(10, 20, 30), 18);
}

#[test]
fn test_grayscale_replicates_channels_and_keeps_alpha() {
    let mut image = RgbaImage::from_fn(4, 4, |x, y| {
        Rgba([(x * 60) as u8, (y * 60) as u8, 200, (x * 10 + y) as u8])
    });
    let alpha_before: Vec<u8> = image.pixels().map(|p| p[3]).collect();

    apply_grayscale(&mut image);

    for pixel in image.pixels() {
        assert_eq!(pixel[0], pixel[1]);
        assert_eq!(pixel[1], pixel[2]);
    }
    let alpha_after: Vec<u8> = image.pixels().map(|p| p[3]).collect();
    assert_eq!(alpha_before, alpha_after);
}

#[test]
fn test_transform_produces_96_square_jpeg() {
    let transform = FrameTransform::new();
    let frame = transform
        .apply_blocking(&raw(encode_jpeg(&gradient(320, 240))))
        .unwrap();

    assert_eq!((frame.width, frame.height), (96, 96));
    assert_eq!(frame.source_id, 1);

    let decoded = image::load_from_memory(frame.jpeg()).unwrap();
    assert_eq!(decoded.width(), 96);
    assert_eq!(decoded.height(), 96);

    let rgb = decoded.to_rgb8();
    let non_gray = rgb
        .pixels()
        .filter(|p| p[0] != p[1] || p[1] != p[2])
        .count();
    assert_eq!(non_gray, 0);
}

#[test]
fn test_resample_stretches_without_preserving_aspect() {
    let transform = FrameTransform::new();
    for (w, h) in [(640, 120), (50, 400), (96, 96), (1, 1)] {
        let bitmap = DynamicImage::ImageRgb8(gradient(w, h));
        let mut resized = transform.resample(&bitmap);
        apply_grayscale(&mut resized);

        assert_eq!(resized.dimensions(), (96, 96));
        assert!(resized.pixels().all(|p| p[0] == p[1] && p[1] == p[2]));
    }
}

#[test]
fn test_decode_paths_agree_on_jpeg() {
    let jpeg = encode_jpeg(&gradient(160, 120));

    let fast = decode_jpeg(&jpeg).unwrap().to_rgba8();
    let generic = decode_generic(&jpeg).unwrap().to_rgba8();

    assert_eq!(fast.dimensions(), generic.dimensions());
    assert_eq!(fast.as_raw(), generic.as_raw());

    let (_, path) = decode(&jpeg).unwrap();
    assert_eq!(path, DecodePath::Jpeg);
}

#[test]
fn test_non_jpeg_payload_uses_generic_decoder() {
    let png = encode_png(&gradient(64, 32));

    let (image, path) = decode(&png).unwrap();
    assert_eq!(path, DecodePath::Generic);
    assert_eq!((image.width(), image.height()), (64, 32));

    let frame = FrameTransform::new().apply_blocking(&raw(png)).unwrap();
    assert_eq!((frame.width, frame.height), (96, 96));
}

#[test]
fn test_invalid_payload_is_decode_error() {
    let transform = FrameTransform::new();

    let garbage = transform.apply_blocking(&raw(b"not an image".to_vec()));
    assert!(matches!(garbage, Err(TransformError::Decode { .. })));

    let empty = transform.apply_blocking(&raw(Vec::new()));
    assert!(matches!(empty, Err(TransformError::Decode { .. })));

    // JPEG marker followed by junk: both decoders reject it
    let truncated = transform.apply_blocking(&raw(vec![0xFF, 0xD8, 0xFF, 0x00, 0x01]));
    assert!(matches!(truncated, Err(TransformError::Decode { .. })));
}

#[test]
fn test_transform_is_deterministic() {
    let jpeg = encode_jpeg(&gradient(200, 150));
    let transform = FrameTransform::new();

    let a = transform.apply_blocking(&raw(jpeg.clone())).unwrap();
    let b = transform.apply_blocking(&raw(jpeg)).unwrap();
    assert_eq!(a.jpeg(), b.jpeg());
}

#[tokio::test]
async fn test_async_apply_runs_on_blocking_pool() {
    let frame = FrameTransform::new()
        .apply(raw(encode_jpeg(&gradient(100, 80))))
        .await
        .unwrap();
    assert_eq!(frame.width, 96);
}
