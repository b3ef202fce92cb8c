/*!
 * Frame Encoder
 *
 * Writes RGBA frames as PNG, JPEG, TIFF or BMP. Only JPEG is lossy; its
 * quality is clamped to 1-100 here no matter what the configuration holds.
 */

use std::fs::File;
use std::io::{BufWriter, Seek, Write};
use std::path::Path;

use image::buffer::ConvertBuffer;
use image::codecs::jpeg::JpegEncoder;
use image::{ImageFormat, ImageResult, RgbImage, RgbaImage};
use tracing::debug;

use crate::config::OutputFormat;

/// Clamps a stored quality value into the range JPEG accepts.
pub fn clamp_quality(quality: u32) -> u8 {
    quality.clamp(1, 100) as u8
}

/// Encoder for one run's output format.
#[derive(Debug, Clone, Copy)]
pub struct FrameEncoder {
    format: OutputFormat,
    quality: u8,
}

impl FrameEncoder {
    pub fn new(format: OutputFormat, quality: u32) -> Self {
        Self {
            format,
            quality: clamp_quality(quality),
        }
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    /// Creates or overwrites `path` with the encoded frame.
    pub fn encode(&self, frame: &RgbaImage, path: &Path) -> ImageResult<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        self.encode_to(frame, &mut writer)?;
        writer.flush()?;

        debug!(
            "Encoded {}x{} {} frame to {}",
            frame.width(),
            frame.height(),
            self.format,
            path.display()
        );
        Ok(())
    }

    /// Encodes into any seekable writer.
    pub fn encode_to<W: Write + Seek>(&self, frame: &RgbaImage, writer: &mut W) -> ImageResult<()> {
        match self.format {
            OutputFormat::Png => frame.write_to(writer, ImageFormat::Png),
            OutputFormat::Tiff => frame.write_to(writer, ImageFormat::Tiff),
            OutputFormat::Bmp => frame.write_to(writer, ImageFormat::Bmp),
            OutputFormat::Jpeg => {
                // JPEG has no alpha channel.
                let rgb: RgbImage = frame.convert();
                let mut encoder = JpegEncoder::new_with_quality(writer, self.quality);
                encoder.encode_image(&rgb)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use std::io::Cursor;

    fn noisy_frame(width: u32, height: u32) -> RgbaImage {
        let mut state: u32 = 0x1234_5678;
        RgbaImage::from_fn(width, height, |_, _| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            let [r, g, b, _] = state.to_le_bytes();
            Rgba([r, g, b, 255])
        })
    }

    #[test]
    fn quality_is_clamped() {
        assert_eq!(clamp_quality(0), 1);
        assert_eq!(clamp_quality(55), 55);
        assert_eq!(clamp_quality(1000), 100);
        assert_eq!(FrameEncoder::new(OutputFormat::Jpeg, 0).quality(), 1);
    }

    #[test]
    fn writes_each_format_with_expected_magic() {
        let dir = tempfile::tempdir().unwrap();
        let frame = noisy_frame(16, 8);

        for (format, magic) in [
            (OutputFormat::Png, &b"\x89PNG"[..]),
            (OutputFormat::Jpeg, &b"\xFF\xD8"[..]),
            (OutputFormat::Bmp, &b"BM"[..]),
        ] {
            let path = dir.path().join(format!("frame.{}", format.extension()));
            FrameEncoder::new(format, 90).encode(&frame, &path).unwrap();
            let bytes = std::fs::read(&path).unwrap();
            assert!(bytes.starts_with(magic), "{} header mismatch", format);

            let decoded = image::open(&path).unwrap();
            assert_eq!((decoded.width(), decoded.height()), (16, 8));
        }

        let path = dir.path().join("frame.tiff");
        FrameEncoder::new(OutputFormat::Tiff, 90).encode(&frame, &path).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.starts_with(b"II*\0") || bytes.starts_with(b"MM\0*"));
    }

    #[test]
    fn lossless_formats_round_trip_pixels() {
        let frame = noisy_frame(6, 4);
        let mut buffer = Cursor::new(Vec::new());
        FrameEncoder::new(OutputFormat::Png, 1).encode_to(&frame, &mut buffer).unwrap();
        let decoded = image::load_from_memory(buffer.get_ref()).unwrap().to_rgba8();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn jpeg_quality_changes_output_size() {
        let frame = noisy_frame(64, 64);
        let mut low = Cursor::new(Vec::new());
        let mut high = Cursor::new(Vec::new());
        FrameEncoder::new(OutputFormat::Jpeg, 5).encode_to(&frame, &mut low).unwrap();
        FrameEncoder::new(OutputFormat::Jpeg, 100).encode_to(&frame, &mut high).unwrap();
        assert!(low.get_ref().len() < high.get_ref().len());
    }

    #[test]
    fn overwrites_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.png");
        std::fs::write(&path, b"stale").unwrap();
        FrameEncoder::new(OutputFormat::Png, 90).encode(&noisy_frame(4, 2), &path).unwrap();
        assert!(std::fs::read(&path).unwrap().starts_with(b"\x89PNG"));
    }

    #[test]
    fn missing_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("frame.png");
        assert!(FrameEncoder::new(OutputFormat::Png, 90).encode(&noisy_frame(4, 2), &path).is_err());
    }
}
