//! Ready-made per-pixel filters

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::filter::{Pixel, PixelFilter};
use crate::frame::ImageFrame;

fn luminance(p: &Pixel) -> f32 {
    ImageFrame::calculate_intensity([p.red, p.green, p.blue])
}

/// Scales every pixel by a random factor (film grain)
pub fn noise() -> PixelFilter {
    let mut rng = StdRng::from_os_rng();
    PixelFilter::new(move |p| {
        let r: f32 = rng.random();
        [
            r * p.red as f32,
            r * p.green as f32,
            r * p.blue as f32,
            p.alpha as f32,
        ]
    })
}

pub fn grayscale() -> PixelFilter {
    PixelFilter::new(|p| {
        let g = luminance(&p);
        [g, g, g, p.alpha as f32]
    })
}

pub fn invert() -> PixelFilter {
    PixelFilter::new(|p| {
        [
            255.0 - p.red as f32,
            255.0 - p.green as f32,
            255.0 - p.blue as f32,
            p.alpha as f32,
        ]
    })
}

/// Black and white split at `level` (0-255 luminance)
pub fn threshold(level: f32) -> PixelFilter {
    PixelFilter::new(move |p| {
        if luminance(&p) >= level {
            [255.0, 255.0, 255.0, 255.0]
        } else {
            [0.0, 0.0, 0.0, 255.0]
        }
    })
}

/// Tints channels with the pixel coordinates
pub fn sobel() -> PixelFilter {
    PixelFilter::new(|p| {
        let v = p.x as f32;
        let h = p.y as f32;
        [
            p.red as f32 + v,
            p.green as f32 + h,
            p.blue as f32 + (v + h) / 4.0,
            255.0,
        ]
    })
}

/// Samples one pixel out of `step` and repeats its color on the following ones
pub fn pixelate(step: usize) -> PixelFilter {
    let step = step.max(1);
    let mut last = [0.0f32; 3];
    PixelFilter::new(move |p| {
        let index = p.offset / 4;
        if index % step == 0 {
            last = [p.red as f32, p.green as f32, p.blue as f32];
        }
        [last[0], last[1], last[2], 255.0]
    })
}

/// Looks a preset up by name, `none` yields no filter
pub fn by_name(name: &str) -> Option<Option<PixelFilter>> {
    match name {
        "none" => Some(None),
        "noise" => Some(Some(noise())),
        "grayscale" => Some(Some(grayscale())),
        "invert" => Some(Some(invert())),
        "threshold" => Some(Some(threshold(100.0))),
        "sobel" => Some(Some(sobel())),
        "pixel" | "pixelate" => Some(Some(pixelate(5))),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_with(rgba: [u8; 4]) -> ImageFrame {
        let mut frame = ImageFrame::new(4, 1).unwrap();
        frame.fill(rgba);
        frame
    }

    #[test]
    fn invert_preserves_alpha() {
        let mut frame = frame_with([10, 20, 30, 128]);
        invert().apply(&mut frame).unwrap();
        assert_eq!(frame.get_pixel(0, 0), Some([245, 235, 225, 128]));
    }

    #[test]
    fn threshold_is_binary() {
        let mut bright = frame_with([200, 200, 200, 10]);
        threshold(100.0).apply(&mut bright).unwrap();
        assert_eq!(bright.get_pixel(3, 0), Some([255, 255, 255, 255]));

        let mut dark = frame_with([20, 20, 20, 10]);
        threshold(100.0).apply(&mut dark).unwrap();
        assert_eq!(dark.get_pixel(3, 0), Some([0, 0, 0, 255]));
    }

    #[test]
    fn noise_never_brightens() {
        let mut frame = frame_with([100, 100, 100, 255]);
        noise().apply(&mut frame).unwrap();
        for x in 0..4 {
            let [r, _, _, a] = frame.get_pixel(x, 0).unwrap();
            assert!(r <= 100);
            assert_eq!(a, 255);
        }
    }

    #[test]
    fn pixelate_repeats_sample() {
        let mut frame = ImageFrame::new(4, 1).unwrap();
        frame.set_pixel(0, 0, [50, 60, 70, 255]);
        frame.set_pixel(1, 0, [1, 1, 1, 255]);
        pixelate(2).apply(&mut frame).unwrap();
        assert_eq!(frame.get_pixel(1, 0), Some([50, 60, 70, 255]));
    }

    #[test]
    fn lookup() {
        assert!(matches!(by_name("none"), Some(None)));
        assert!(matches!(by_name("invert"), Some(Some(_))));
        assert!(by_name("sharpen").is_none());
    }
}
