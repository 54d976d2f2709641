use std::fmt;

use crate::frame::{ImageFrame, BYTES_PER_PIXEL};

/// One term of the derived filter style, rendered the way CSS filter
/// functions are written
#[derive(Debug, Clone, PartialEq)]
pub enum FilterTerm {
    Opacity(f64),
    Brightness(f64),
    Contrast(f64),
    Saturate(f64),
    /// degrees
    HueRotate(f64),
    Invert(f64),
    Grayscale(f64),
    Sepia(f64),
    /// pixels
    Blur(f64),
    Url(String),
}

impl fmt::Display for FilterTerm {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FilterTerm::Opacity(v) => write!(f, "opacity({})", v),
            FilterTerm::Brightness(v) => write!(f, "brightness({})", v),
            FilterTerm::Contrast(v) => write!(f, "contrast({})", v),
            FilterTerm::Saturate(v) => write!(f, "saturate({})", v),
            FilterTerm::HueRotate(v) => write!(f, "hue-rotate({}deg)", v),
            FilterTerm::Invert(v) => write!(f, "invert({})", v),
            FilterTerm::Grayscale(v) => write!(f, "grayscale({})", v),
            FilterTerm::Sepia(v) => write!(f, "sepia({})", v),
            FilterTerm::Blur(v) => write!(f, "blur({}px)", v),
            FilterTerm::Url(v) => write!(f, "url({})", v),
        }
    }
}

/// Derived presentation of the visible surface.
///
/// Recomputed from the presentation parameters whenever one of them changes,
/// then handed to the surface. Surfaces backed by a compositor use the CSS
/// strings, the others render it in software with [`Style::apply`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Style {
    terms: Vec<FilterTerm>,
    mirror: bool,
}

impl Style {
    pub fn new(terms: Vec<FilterTerm>, mirror: bool) -> Self {
        Self { terms, mirror }
    }

    pub fn terms(&self) -> &[FilterTerm] {
        &self.terms
    }

    pub fn mirror(&self) -> bool {
        self.mirror
    }

    pub fn is_identity(&self) -> bool {
        self.terms.is_empty() && !self.mirror
    }

    /// Filter terms separated by a single space, empty when every
    /// parameter is at its default
    pub fn filter_css(&self) -> String {
        self.terms
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn transform_css(&self) -> String {
        if self.mirror {
            "scale(-1, 1)".to_string()
        } else {
            String::new()
        }
    }

    /// Renders the style onto `frame`, term by term in order
    pub fn apply(&self, frame: &mut ImageFrame) {
        for term in &self.terms {
            term.apply(frame);
        }

        if self.mirror {
            frame.flip_horizontal();
        }
    }
}

type Matrix = [[f64; 3]; 3];

impl FilterTerm {
    /// Software rendition of the filter function
    pub fn apply(&self, frame: &mut ImageFrame) {
        match *self {
            FilterTerm::Opacity(a) => {
                for px in frame.buffer_mut().chunks_exact_mut(BYTES_PER_PIXEL) {
                    px[3] = to_channel(px[3] as f64 * a);
                }
            }
            FilterTerm::Brightness(b) => transfer(frame, |c| c * b),
            // normalize, stretch around the mid point
            FilterTerm::Contrast(k) => transfer(frame, |c| (c - 0.5) * k + 0.5),
            FilterTerm::Invert(a) => transfer(frame, |c| c * (1.0 - 2.0 * a) + a),
            FilterTerm::Saturate(s) => apply_matrix(frame, saturate_matrix(s)),
            FilterTerm::HueRotate(deg) => apply_matrix(frame, hue_rotate_matrix(deg)),
            FilterTerm::Grayscale(a) => apply_matrix(frame, grayscale_matrix(a)),
            FilterTerm::Sepia(a) => apply_matrix(frame, sepia_matrix(a)),
            FilterTerm::Blur(px) => {
                // past the longest side every pixel already averages the whole frame
                let (w, h) = frame.dimensions();
                box_blur(frame, px.round().min(w.max(h) as f64) as usize)
            }
            FilterTerm::Url(ref url) => {
                tracing::trace!("svg filter {} has no software rendition", url);
            }
        }
    }
}

fn to_channel(v: f64) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

/// Applies `f` to the normalized (0.0 - 1.0) color channels
fn transfer(frame: &mut ImageFrame, f: impl Fn(f64) -> f64) {
    for px in frame.buffer_mut().chunks_exact_mut(BYTES_PER_PIXEL) {
        for c in px.iter_mut().take(3) {
            *c = to_channel(f(*c as f64 / 255.0).clamp(0.0, 1.0) * 255.0);
        }
    }
}

fn apply_matrix(frame: &mut ImageFrame, m: Matrix) {
    for px in frame.buffer_mut().chunks_exact_mut(BYTES_PER_PIXEL) {
        let (r, g, b) = (px[0] as f64, px[1] as f64, px[2] as f64);
        for (i, row) in m.iter().enumerate() {
            px[i] = to_channel(row[0] * r + row[1] * g + row[2] * b);
        }
    }
}

fn saturate_matrix(s: f64) -> Matrix {
    [
        [0.213 + 0.787 * s, 0.715 - 0.715 * s, 0.072 - 0.072 * s],
        [0.213 - 0.213 * s, 0.715 + 0.285 * s, 0.072 - 0.072 * s],
        [0.213 - 0.213 * s, 0.715 - 0.715 * s, 0.072 + 0.928 * s],
    ]
}

fn hue_rotate_matrix(deg: f64) -> Matrix {
    let (sin, cos) = deg.to_radians().sin_cos();
    [
        [
            0.213 + cos * 0.787 - sin * 0.213,
            0.715 - cos * 0.715 - sin * 0.715,
            0.072 - cos * 0.072 + sin * 0.928,
        ],
        [
            0.213 - cos * 0.213 + sin * 0.143,
            0.715 + cos * 0.285 + sin * 0.140,
            0.072 - cos * 0.072 - sin * 0.283,
        ],
        [
            0.213 - cos * 0.213 - sin * 0.787,
            0.715 - cos * 0.715 + sin * 0.715,
            0.072 + cos * 0.928 + sin * 0.072,
        ],
    ]
}

fn grayscale_matrix(amount: f64) -> Matrix {
    let s = 1.0 - amount;
    [
        [0.2126 + 0.7874 * s, 0.7152 - 0.7152 * s, 0.0722 - 0.0722 * s],
        [0.2126 - 0.2126 * s, 0.7152 + 0.2848 * s, 0.0722 - 0.0722 * s],
        [0.2126 - 0.2126 * s, 0.7152 - 0.7152 * s, 0.0722 + 0.9278 * s],
    ]
}

fn sepia_matrix(amount: f64) -> Matrix {
    let s = 1.0 - amount;
    [
        [0.393 + 0.607 * s, 0.769 - 0.769 * s, 0.189 - 0.189 * s],
        [0.349 - 0.349 * s, 0.686 + 0.314 * s, 0.168 - 0.168 * s],
        [0.272 - 0.272 * s, 0.534 - 0.534 * s, 0.131 + 0.869 * s],
    ]
}

/// Separable box blur, horizontal pass then vertical pass
fn box_blur(frame: &mut ImageFrame, radius: usize) {
    if radius == 0 {
        return;
    }

    let (w, h) = frame.dimensions();
    let src = frame.buffer().to_vec();
    let mut tmp = vec![0u8; src.len()];

    for y in 0..h {
        for x in 0..w {
            let lo = x.saturating_sub(radius);
            let hi = x.saturating_add(radius).min(w - 1);
            for c in 0..BYTES_PER_PIXEL {
                let sum: u32 = (lo..=hi)
                    .map(|k| src[(y * w + k) * BYTES_PER_PIXEL + c] as u32)
                    .sum();
                tmp[(y * w + x) * BYTES_PER_PIXEL + c] = (sum / (hi - lo + 1) as u32) as u8;
            }
        }
    }

    let out = frame.buffer_mut();
    for y in 0..h {
        let lo = y.saturating_sub(radius);
        let hi = y.saturating_add(radius).min(h - 1);
        for x in 0..w {
            for c in 0..BYTES_PER_PIXEL {
                let sum: u32 = (lo..=hi)
                    .map(|k| tmp[(k * w + x) * BYTES_PER_PIXEL + c] as u32)
                    .sum();
                out[(y * w + x) * BYTES_PER_PIXEL + c] = (sum / (hi - lo + 1) as u32) as u8;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(rgba: [u8; 4]) -> ImageFrame {
        let mut frame = ImageFrame::new(3, 3).unwrap();
        frame.fill(rgba);
        frame
    }

    #[test]
    fn css_strings() {
        let style = Style::new(
            vec![
                FilterTerm::Opacity(0.5),
                FilterTerm::HueRotate(90.0),
                FilterTerm::Blur(2.0),
                FilterTerm::Url("#wave".to_string()),
            ],
            true,
        );

        assert_eq!(
            style.filter_css(),
            "opacity(0.5) hue-rotate(90deg) blur(2px) url(#wave)"
        );
        assert_eq!(style.transform_css(), "scale(-1, 1)");
        assert_eq!(Style::default().filter_css(), "");
        assert_eq!(Style::default().transform_css(), "");
    }

    #[test]
    fn identity_values_leave_pixels_alone() {
        let original = solid([200, 100, 50, 255]);
        let mut frame = original.clone();
        for term in [
            FilterTerm::Brightness(1.0),
            FilterTerm::Contrast(1.0),
            FilterTerm::Saturate(1.0),
            FilterTerm::HueRotate(0.0),
            FilterTerm::Invert(0.0),
            FilterTerm::Grayscale(0.0),
            FilterTerm::Sepia(0.0),
            FilterTerm::Blur(0.0),
        ] {
            term.apply(&mut frame);
        }
        assert_eq!(frame, original);
    }

    #[test]
    fn full_invert_and_grayscale() {
        let mut frame = solid([200, 100, 50, 255]);
        FilterTerm::Invert(1.0).apply(&mut frame);
        assert_eq!(frame.get_pixel(0, 0), Some([55, 155, 205, 255]));

        let mut frame = solid([200, 100, 50, 255]);
        FilterTerm::Grayscale(1.0).apply(&mut frame);
        let [r, g, b, _] = frame.get_pixel(1, 1).unwrap();
        assert_eq!(r, g);
        assert_eq!(g, b);
    }

    #[test]
    fn opacity_scales_alpha() {
        let mut frame = solid([10, 10, 10, 200]);
        FilterTerm::Opacity(0.5).apply(&mut frame);
        assert_eq!(frame.get_pixel(0, 0), Some([10, 10, 10, 100]));
    }

    #[test]
    fn blur_averages_neighbours() {
        let mut frame = solid([0, 0, 0, 255]);
        frame.set_pixel(1, 1, [90, 90, 90, 255]);
        FilterTerm::Blur(1.0).apply(&mut frame);
        assert_eq!(frame.get_pixel(1, 1), Some([10, 10, 10, 255]));
    }

    #[test]
    fn huge_blur_averages_whole_frame() {
        let mut frame = solid([0, 0, 0, 255]);
        frame.set_pixel(0, 0, [90, 90, 90, 255]);
        FilterTerm::Blur(1e30).apply(&mut frame);

        assert_eq!(frame.get_pixel(0, 0), Some([10, 10, 10, 255]));
        assert_eq!(frame.get_pixel(2, 2), Some([10, 10, 10, 255]));
    }
}
