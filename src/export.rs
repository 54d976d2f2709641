//! Image encoding of surface snapshots

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::{ExtendedColorType, ImageEncoder};
use std::fmt;
use std::io::Cursor;
use std::str::FromStr;

use crate::error::{InstacamError, Result};
use crate::frame::{ImageFrame, BYTES_PER_PIXEL};

/// JPEG quality used when the requested one is outside 0..=1
pub const DEFAULT_QUALITY: f64 = 0.92;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    #[default]
    Png,
    Jpeg,
    Webp,
}

impl ExportFormat {
    pub fn name(&self) -> &'static str {
        match self {
            ExportFormat::Png => "png",
            ExportFormat::Jpeg => "jpeg",
            ExportFormat::Webp => "webp",
        }
    }

    pub fn mime(&self) -> String {
        format!("image/{}", self.name())
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ExportFormat {
    type Err = InstacamError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "png" => Ok(ExportFormat::Png),
            "jpeg" | "jpg" => Ok(ExportFormat::Jpeg),
            "webp" => Ok(ExportFormat::Webp),
            _ => Err(InstacamError::UnsupportedFormat(s.to_string())),
        }
    }
}

/// Maps a 0..=1 quality onto the JPEG encoder's 1..=100 scale
fn jpeg_quality(quality: f64) -> u8 {
    let quality = if (0.0..=1.0).contains(&quality) {
        quality
    } else {
        DEFAULT_QUALITY
    };
    (quality * 100.0).round().clamp(1.0, 100.0) as u8
}

/// Drops the alpha channel by compositing over black
fn rgb_over_black(frame: &ImageFrame) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(frame.w * frame.h * 3);
    for px in frame.buffer().chunks_exact(BYTES_PER_PIXEL) {
        let a = px[3] as u32;
        rgb.extend(px[..3].iter().map(|&c| ((c as u32 * a + 127) / 255) as u8));
    }
    rgb
}

/// Encodes `frame`; `quality` (0..=1) only affects JPEG
pub fn encode(frame: &ImageFrame, format: ExportFormat, quality: f64) -> Result<Vec<u8>> {
    let (w, h) = (frame.w as u32, frame.h as u32);
    let mut out = Cursor::new(Vec::new());

    match format {
        ExportFormat::Png => {
            PngEncoder::new(&mut out).write_image(frame.buffer(), w, h, ExtendedColorType::Rgba8)?
        }
        ExportFormat::Jpeg => JpegEncoder::new_with_quality(&mut out, jpeg_quality(quality))
            .write_image(&rgb_over_black(frame), w, h, ExtendedColorType::Rgb8)?,
        ExportFormat::Webp => WebPEncoder::new_lossless(&mut out).write_image(
            frame.buffer(),
            w,
            h,
            ExtendedColorType::Rgba8,
        )?,
    }

    Ok(out.into_inner())
}

/// Encodes `frame` as a `data:image/<format>;base64,` URI
pub fn data_uri(frame: &ImageFrame, format: ExportFormat, quality: f64) -> Result<String> {
    let bytes = encode(frame, format, quality)?;
    Ok(format!("data:{};base64,{}", format.mime(), STANDARD.encode(bytes)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ImageFrame {
        let mut frame = ImageFrame::new(8, 6).unwrap();
        frame.fill([200, 100, 50, 255]);
        frame.set_pixel(0, 0, [0, 0, 0, 0]);
        frame
    }

    #[test]
    fn parses_formats() {
        assert_eq!("png".parse::<ExportFormat>().unwrap(), ExportFormat::Png);
        assert_eq!("JPG".parse::<ExportFormat>().unwrap(), ExportFormat::Jpeg);
        assert_eq!("webp".parse::<ExportFormat>().unwrap(), ExportFormat::Webp);
        assert!(matches!(
            "gif".parse::<ExportFormat>(),
            Err(InstacamError::UnsupportedFormat(f)) if f == "gif"
        ));
    }

    #[test]
    fn quality_outside_range_uses_default() {
        assert_eq!(jpeg_quality(0.5), 50);
        assert_eq!(jpeg_quality(1.0), 100);
        assert_eq!(jpeg_quality(0.0), 1);
        assert_eq!(jpeg_quality(1.5), 92);
        assert_eq!(jpeg_quality(f64::NAN), 92);
    }

    #[test]
    fn png_is_lossless() {
        let frame = sample();
        let bytes = encode(&frame, ExportFormat::Png, 1.0).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap().to_rgba8();

        assert_eq!(decoded.dimensions(), (8, 6));
        assert_eq!(decoded.as_raw().as_slice(), frame.buffer());
    }

    #[test]
    fn jpeg_has_magic_bytes() {
        let bytes = encode(&sample(), ExportFormat::Jpeg, 0.5).unwrap();
        assert_eq!(&bytes[..3], &[0xFF, 0xD8, 0xFF]);
    }

    #[test]
    fn webp_is_riff() {
        let bytes = encode(&sample(), ExportFormat::Webp, 1.0).unwrap();
        assert_eq!(&bytes[..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"WEBP");
    }

    #[test]
    fn data_uri_prefix() {
        let uri = data_uri(&sample(), ExportFormat::Jpeg, 0.5).unwrap();
        assert!(uri.starts_with("data:image/jpeg;base64,"));

        let uri = data_uri(&sample(), ExportFormat::Png, 1.0).unwrap();
        assert!(uri.starts_with("data:image/png;base64,iVBORw0KGgo"));
    }
}
