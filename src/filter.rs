use std::fmt;

use crate::error::{InstacamError, Result};
use crate::frame::{ImageFrame, BYTES_PER_PIXEL};

/// A pixel handed to a per-pixel filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pixel {
    /// byte offset of the pixel in the RGBA buffer
    pub offset: usize,
    pub x: u32,
    pub y: u32,
    pub red: u8,
    pub green: u8,
    pub blue: u8,
    pub alpha: u8,
}

type FilterFn = dyn FnMut(Pixel) -> [f32; 4] + Send;

/// Caller-supplied transform run over every pixel of a frame.
///
/// The closure returns the new `[red, green, blue, alpha]` values. They are
/// rounded and clamped to 0-255 when written back; a non-finite value is a
/// malformed result and aborts the pass.
pub struct PixelFilter {
    f: Box<FilterFn>,
}

impl PixelFilter {
    pub fn new<F>(f: F) -> Self
    where
        F: FnMut(Pixel) -> [f32; 4] + Send + 'static,
    {
        Self { f: Box::new(f) }
    }

    /// Runs the filter over `frame` in row-major order
    pub fn apply(&mut self, frame: &mut ImageFrame) -> Result<()> {
        let w = frame.w;
        for (i, px) in frame
            .buffer_mut()
            .chunks_exact_mut(BYTES_PER_PIXEL)
            .enumerate()
        {
            let x = (i % w) as u32;
            let y = (i / w) as u32;

            let filtered = (self.f)(Pixel {
                offset: i * BYTES_PER_PIXEL,
                x,
                y,
                red: px[0],
                green: px[1],
                blue: px[2],
                alpha: px[3],
            });

            if filtered.iter().any(|v| !v.is_finite()) {
                return Err(InstacamError::MalformedFilter { x, y });
            }

            for (c, v) in px.iter_mut().zip(filtered) {
                *c = v.round().clamp(0.0, 255.0) as u8;
            }
        }

        Ok(())
    }
}

impl<F> From<F> for PixelFilter
where
    F: FnMut(Pixel) -> [f32; 4] + Send + 'static,
{
    fn from(f: F) -> Self {
        PixelFilter::new(f)
    }
}

impl fmt::Debug for PixelFilter {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("PixelFilter(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn visits_every_pixel_in_order() {
        let mut frame = ImageFrame::new(3, 2).unwrap();
        let mut seen = Vec::new();
        let (tx, rx) = std::sync::mpsc::channel();

        let mut filter = PixelFilter::new(move |p: Pixel| {
            tx.send((p.offset, p.x, p.y)).unwrap();
            [1.0, 2.0, 3.0, 4.0]
        });
        filter.apply(&mut frame).unwrap();
        seen.extend(rx.try_iter());

        assert_eq!(seen.len(), 6);
        assert_eq!(seen[0], (0, 0, 0));
        assert_eq!(seen[4], (16, 1, 1));
        assert_eq!(frame.get_pixel(2, 1), Some([1, 2, 3, 4]));
    }

    #[test]
    fn clamps_out_of_range_channels() {
        let mut frame = ImageFrame::new(1, 1).unwrap();
        PixelFilter::new(|_| [300.0, -5.0, 12.4, 254.6])
            .apply(&mut frame)
            .unwrap();
        assert_eq!(frame.get_pixel(0, 0), Some([255, 0, 12, 255]));
    }

    #[test]
    fn non_finite_result_is_malformed() {
        let mut frame = ImageFrame::new(2, 2).unwrap();
        let err = PixelFilter::new(|p| {
            if p.x == 1 && p.y == 1 {
                [f32::NAN, 0.0, 0.0, 0.0]
            } else {
                [0.0, 0.0, 0.0, 255.0]
            }
        })
        .apply(&mut frame)
        .unwrap_err();

        assert!(matches!(err, InstacamError::MalformedFilter { x: 1, y: 1 }));
    }
}
