use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageResult};

const START_QUALITY: u8 = 92;
const QUALITY_STEP: u8 = 8;
const QUALITY_FLOOR: u8 = 45;
const SHRINK_QUALITY_STEP: u8 = 5;
const SHRINK_QUALITY_FLOOR: u8 = 50;
const MIN_SHRINK_WIDTH: u32 = 400;

/// Downscale and re-encode photos before they are stored.
///
/// The picture is scaled to at most `max_width` and written as JPEG. While
/// the result is above `target_bytes` the quality is lowered first, then
/// the width is cut by a tenth at a time down to 400 pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhotoCompression {
    pub max_width: u32,
    pub target_bytes: usize,
}

impl Default for PhotoCompression {
    fn default() -> Self {
        Self {
            max_width: 1280,
            target_bytes: 300 * 1024,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressedPhoto {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub quality: u8,
}

impl PhotoCompression {
    pub fn compress(&self, bytes: &[u8]) -> ImageResult<CompressedPhoto> {
        let source = image::load_from_memory(bytes)?;

        let mut width = source.width().min(self.max_width).max(1);
        let mut frame = scaled(&source, width);
        let mut quality = START_QUALITY;
        let mut encoded = encode_jpeg(&frame, quality)?;

        while encoded.len() > self.target_bytes && quality > QUALITY_FLOOR {
            quality = quality.saturating_sub(QUALITY_STEP);
            encoded = encode_jpeg(&frame, quality)?;
        }

        while encoded.len() > self.target_bytes && width > MIN_SHRINK_WIDTH {
            width = (f64::from(width) * 0.9).round() as u32;
            frame = scaled(&source, width);
            quality = quality.saturating_sub(SHRINK_QUALITY_STEP).max(SHRINK_QUALITY_FLOOR);
            encoded = encode_jpeg(&frame, quality)?;
        }

        Ok(CompressedPhoto {
            bytes: encoded,
            width: frame.width(),
            height: frame.height(),
            quality,
        })
    }
}

/// Aspect-preserving resize to `width`; never upscales.
fn scaled(source: &DynamicImage, width: u32) -> DynamicImage {
    if width >= source.width() {
        return source.clone();
    }
    let height = (f64::from(source.height()) * f64::from(width) / f64::from(source.width()))
        .round()
        .max(1.0) as u32;
    source.resize_exact(width, height, FilterType::Triangle)
}

fn encode_jpeg(frame: &DynamicImage, quality: u8) -> ImageResult<Vec<u8>> {
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality).encode_image(&frame.to_rgb8())?;
    Ok(out)
}

#[cfg(test)]
pub(crate) mod test_images {
    use image::{ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    /// Smooth gradient, compresses well.
    pub fn gradient_png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x * 255 / width) as u8, (y * 255 / height) as u8, 128])
        });
        encode_png(img)
    }

    /// Pixel noise, compresses badly.
    pub fn noisy_png(width: u32, height: u32) -> Vec<u8> {
        let mut state: u32 = 0x9e37_79b9;
        let img = RgbImage::from_fn(width, height, |_, _| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            let [r, g, b, _] = state.to_le_bytes();
            Rgb([r, g, b])
        });
        encode_png(img)
    }

    fn encode_png(img: RgbImage) -> Vec<u8> {
        let mut out = Vec::new();
        img.write_to(&mut Cursor::new(&mut out), ImageFormat::Png).unwrap();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::test_images::{gradient_png, noisy_png};
    use super::*;
    use image::ImageFormat;

    #[test]
    fn test_wide_photo_is_scaled_to_max_width() {
        let photo = PhotoCompression::default().compress(&gradient_png(1600, 1200)).unwrap();
        assert_eq!((photo.width, photo.height), (1280, 960));
        assert!(photo.bytes.len() <= 300 * 1024);
        assert_eq!(image::guess_format(&photo.bytes).unwrap(), ImageFormat::Jpeg);

        let decoded = image::load_from_memory(&photo.bytes).unwrap();
        assert_eq!(decoded.width(), 1280);
    }

    #[test]
    fn test_small_photo_keeps_its_size() {
        let photo = PhotoCompression::default().compress(&gradient_png(640, 480)).unwrap();
        assert_eq!((photo.width, photo.height), (640, 480));
        assert_eq!(photo.quality, 92);
    }

    #[test]
    fn test_heavy_photo_trades_quality_then_width() {
        let tight = PhotoCompression {
            max_width: 640,
            target_bytes: 20 * 1024,
        };
        let photo = tight.compress(&noisy_png(800, 600)).unwrap();
        assert!(photo.quality <= SHRINK_QUALITY_FLOOR);
        assert!(photo.width < 640);
        assert!(photo.width >= 360);
        // aspect ratio survives every shrink
        let expected_height = (f64::from(photo.width) * 0.75).round() as u32;
        assert!(photo.height.abs_diff(expected_height) <= 1);
    }

    #[test]
    fn test_undecodable_bytes_are_an_error() {
        assert!(PhotoCompression::default().compress(b"not an image").is_err());
    }
}
