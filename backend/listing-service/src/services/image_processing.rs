/// Image processing service: normalizes uploaded photos before storage.
/// Every upload is decoded, bounded to 1920x1080, and re-encoded as JPEG,
/// so the stored asset never keeps the original bytes or metadata.
use image::{imageops::FilterType, DynamicImage, GenericImageView};
use thiserror::Error;

const MAX_WIDTH: u32 = 1920;
const MAX_HEIGHT: u32 = 1080;
const JPEG_QUALITY: u8 = 80;

#[derive(Debug, Error)]
pub enum ImageProcessingError {
    #[error("Invalid image data: {0}")]
    InvalidFormat(#[from] image::ImageError),

    #[error("Image encoding failed: {0}")]
    Encoding(String),

    #[error("Image task was cancelled")]
    TaskCancelled,
}

/// Decode, bound and re-encode an upload. CPU-bound, so the work runs on
/// the blocking pool.
pub async fn transcode(data: Vec<u8>) -> Result<Vec<u8>, ImageProcessingError> {
    tokio::task::spawn_blocking(move || {
        let img = image::load_from_memory(&data)?;
        let resized = resize_to_fit(&img, MAX_WIDTH, MAX_HEIGHT);
        encode_jpeg(&resized)
    })
    .await
    .map_err(|_| ImageProcessingError::TaskCancelled)?
}

/// Resize to fit within max_width x max_height while preserving aspect
/// ratio. Images already within bounds pass through untouched.
fn resize_to_fit(img: &DynamicImage, max_width: u32, max_height: u32) -> DynamicImage {
    let (width, height) = img.dimensions();

    let width_ratio = max_width as f32 / width as f32;
    let height_ratio = max_height as f32 / height as f32;
    let ratio = width_ratio.min(height_ratio);

    // Never upscale
    if ratio >= 1.0 {
        return img.clone();
    }

    let new_width = (width as f32 * ratio) as u32;
    let new_height = (height as f32 * ratio) as u32;

    img.resize(new_width, new_height, FilterType::Lanczos3)
}

fn encode_jpeg(img: &DynamicImage) -> Result<Vec<u8>, ImageProcessingError> {
    // JPEG has no alpha channel
    let rgb = img.to_rgb8();
    let (width, height) = rgb.dimensions();

    let mut out = Vec::new();
    let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY);
    encoder
        .encode(rgb.as_raw(), width, height, image::ColorType::Rgb8)
        .map_err(|e| ImageProcessingError::Encoding(e.to_string()))?;

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(
            width,
            height,
            image::Rgb([120, 80, 40]),
        ));
        let mut out = std::io::Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[tokio::test]
    async fn test_transcode_produces_jpeg() {
        let out = transcode(png_bytes(320, 200)).await.unwrap();
        // JPEG SOI marker
        assert_eq!(&out[..2], &[0xFF, 0xD8]);
    }

    #[tokio::test]
    async fn test_oversized_image_is_bounded() {
        let out = transcode(png_bytes(4000, 3000)).await.unwrap();
        let decoded = image::load_from_memory(&out).unwrap();
        let (w, h) = decoded.dimensions();
        assert!(w <= MAX_WIDTH && h <= MAX_HEIGHT);
        // Aspect ratio preserved: 4000x3000 bounded by height
        assert_eq!(h, 1080);
        assert_eq!(w, 1440);
    }

    #[tokio::test]
    async fn test_small_image_is_not_upscaled() {
        let out = transcode(png_bytes(320, 200)).await.unwrap();
        let decoded = image::load_from_memory(&out).unwrap();
        assert_eq!(decoded.dimensions(), (320, 200));
    }

    #[tokio::test]
    async fn test_garbage_bytes_rejected() {
        let result = transcode(b"definitely not an image".to_vec()).await;
        assert!(matches!(result, Err(ImageProcessingError::InvalidFormat(_))));
    }
}
