use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::InstacamError;
use crate::frame::{ImageFrame, BYTES_PER_PIXEL};

/// Separable blend modes used to composite a solid color layer over the frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BlendMode {
    Normal,
    Multiply,
    Screen,
    Overlay,
    Darken,
    Lighten,
    ColorDodge,
    ColorBurn,
    HardLight,
    SoftLight,
    Difference,
    Exclusion,
}

impl BlendMode {
    pub const ALL: [BlendMode; 12] = [
        BlendMode::Normal,
        BlendMode::Multiply,
        BlendMode::Screen,
        BlendMode::Overlay,
        BlendMode::Darken,
        BlendMode::Lighten,
        BlendMode::ColorDodge,
        BlendMode::ColorBurn,
        BlendMode::HardLight,
        BlendMode::SoftLight,
        BlendMode::Difference,
        BlendMode::Exclusion,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            BlendMode::Normal => "normal",
            BlendMode::Multiply => "multiply",
            BlendMode::Screen => "screen",
            BlendMode::Overlay => "overlay",
            BlendMode::Darken => "darken",
            BlendMode::Lighten => "lighten",
            BlendMode::ColorDodge => "color-dodge",
            BlendMode::ColorBurn => "color-burn",
            BlendMode::HardLight => "hard-light",
            BlendMode::SoftLight => "soft-light",
            BlendMode::Difference => "difference",
            BlendMode::Exclusion => "exclusion",
        }
    }

    /// B(Cb, Cs) on normalized channels, `cb` is the frame (backdrop) and
    /// `cs` the blend color (source)
    pub fn mix(&self, cb: f64, cs: f64) -> f64 {
        match self {
            BlendMode::Normal => cs,
            BlendMode::Multiply => cb * cs,
            BlendMode::Screen => cb + cs - cb * cs,
            BlendMode::Overlay => BlendMode::HardLight.mix(cs, cb),
            BlendMode::Darken => cb.min(cs),
            BlendMode::Lighten => cb.max(cs),
            BlendMode::ColorDodge => {
                if cb == 0.0 {
                    0.0
                } else if cs >= 1.0 {
                    1.0
                } else {
                    (cb / (1.0 - cs)).min(1.0)
                }
            }
            BlendMode::ColorBurn => {
                if cb >= 1.0 {
                    1.0
                } else if cs == 0.0 {
                    0.0
                } else {
                    1.0 - ((1.0 - cb) / cs).min(1.0)
                }
            }
            BlendMode::HardLight => {
                if cs <= 0.5 {
                    BlendMode::Multiply.mix(cb, 2.0 * cs)
                } else {
                    BlendMode::Screen.mix(cb, 2.0 * cs - 1.0)
                }
            }
            BlendMode::SoftLight => {
                if cs <= 0.5 {
                    cb - (1.0 - 2.0 * cs) * cb * (1.0 - cb)
                } else {
                    let d = if cb <= 0.25 {
                        ((16.0 * cb - 12.0) * cb + 4.0) * cb
                    } else {
                        cb.sqrt()
                    };
                    cb + (2.0 * cs - 1.0) * (d - cb)
                }
            }
            BlendMode::Difference => (cb - cs).abs(),
            BlendMode::Exclusion => cb + cs - 2.0 * cb * cs,
        }
    }
}

impl fmt::Display for BlendMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BlendMode {
    type Err = InstacamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        BlendMode::ALL
            .into_iter()
            .find(|mode| mode.name() == wanted)
            .ok_or_else(|| {
                InstacamError::property("blend mode", format!("unknown blend mode '{}'", s))
            })
    }
}

/// Opaque RGB color written as `#rgb` or `#rrggbb`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl Color {
    pub const fn new(red: u8, green: u8, blue: u8) -> Self {
        Self { red, green, blue }
    }
}

impl FromStr for Color {
    type Err = InstacamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || {
            InstacamError::property(
                "blend color",
                format!("expected #rgb or #rrggbb, got '{}'", s),
            )
        };

        let hex = s.trim().strip_prefix('#').ok_or_else(invalid)?;
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid());
        }

        let channel = |digits: &str| u8::from_str_radix(digits, 16).map_err(|_| invalid());
        match hex.len() {
            3 => {
                let expand = |i: usize| channel(&hex[i..i + 1].repeat(2));
                Ok(Color::new(expand(0)?, expand(1)?, expand(2)?))
            }
            6 => Ok(Color::new(
                channel(&hex[0..2])?,
                channel(&hex[2..4])?,
                channel(&hex[4..6])?,
            )),
            _ => Err(invalid()),
        }
    }
}

impl TryFrom<String> for Color {
    type Error = InstacamError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_string()
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.red, self.green, self.blue)
    }
}

/// Solid color layer blended over every rendered frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Blend {
    pub mode: BlendMode,
    pub color: Color,
}

impl Blend {
    pub fn new(mode: BlendMode, color: Color) -> Self {
        Self { mode, color }
    }

    /// Fills the frame with the blend color using `mode`. The source layer is
    /// opaque, so is the result.
    pub fn composite(&self, frame: &mut ImageFrame) {
        let cs = [
            self.color.red as f64 / 255.0,
            self.color.green as f64 / 255.0,
            self.color.blue as f64 / 255.0,
        ];

        for px in frame.buffer_mut().chunks_exact_mut(BYTES_PER_PIXEL) {
            let ab = px[3] as f64 / 255.0;
            for (c, &s) in px.iter_mut().zip(cs.iter()) {
                let cb = *c as f64 / 255.0;
                let out = (1.0 - ab) * s + ab * self.mode.mix(cb, s);
                *c = (out.clamp(0.0, 1.0) * 255.0).round() as u8;
            }
            px[3] = 255;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_colors() {
        assert_eq!("#217fcf".parse::<Color>().unwrap(), Color::new(0x21, 0x7f, 0xcf));
        assert_eq!("#fff".parse::<Color>().unwrap(), Color::new(255, 255, 255));
        assert!("217fcf".parse::<Color>().is_err());
        assert!("#12345".parse::<Color>().is_err());
        assert!("#gg0000".parse::<Color>().is_err());
        assert_eq!(Color::new(0x21, 0x7f, 0xcf).to_string(), "#217fcf");
    }

    #[test]
    fn parses_modes() {
        assert_eq!("color-dodge".parse::<BlendMode>().unwrap(), BlendMode::ColorDodge);
        assert_eq!("Multiply".parse::<BlendMode>().unwrap(), BlendMode::Multiply);
        assert!("plus-lighter".parse::<BlendMode>().is_err());
    }

    #[test]
    fn multiply_by_white_keeps_frame() {
        let mut frame = ImageFrame::new(2, 2).unwrap();
        frame.fill([120, 60, 30, 255]);

        Blend::new(BlendMode::Multiply, Color::new(255, 255, 255)).composite(&mut frame);
        assert_eq!(frame.get_pixel(0, 0), Some([120, 60, 30, 255]));
    }

    #[test]
    fn transparent_backdrop_shows_color() {
        let mut frame = ImageFrame::new(1, 1).unwrap();

        Blend::new(BlendMode::Difference, Color::new(10, 20, 30)).composite(&mut frame);
        assert_eq!(frame.get_pixel(0, 0), Some([10, 20, 30, 255]));
    }

    #[test]
    fn screen_and_difference() {
        assert!((BlendMode::Screen.mix(0.5, 0.5) - 0.75).abs() < 1e-9);
        assert!((BlendMode::Difference.mix(0.2, 0.7) - 0.5).abs() < 1e-9);
        assert!((BlendMode::Overlay.mix(0.0, 0.8)).abs() < 1e-9);
    }
}
