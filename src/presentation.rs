use serde::{Deserialize, Serialize};

use crate::blend::Blend;
use crate::error::{InstacamError, Result};
use crate::style::{FilterTerm, Style};

/// Cosmetic parameters of the visible surface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Presentation {
    /// mirror mode of the surface (horizontal flip)
    pub mirror: bool,
    /// [0..1] opacity of the surface
    pub opacity: f64,
    /// [0..*] brightness of the surface
    pub brightness: f64,
    /// [0..*] contrast of the surface
    pub contrast: f64,
    /// [0..*] saturation of the surface
    pub saturation: f64,
    /// [0..360] hue rotation of the surface, in degrees
    pub hue: f64,
    /// [0..1] color inversion of the surface
    pub invert: f64,
    /// [0..1] grayscale of the surface
    pub grayscale: f64,
    /// [0..1] sepia of the surface
    pub sepia: f64,
    /// [0..*] blur radius of the surface, in pixels
    pub blur: f64,
    /// svg filter reference
    pub url: String,
    /// solid color layer blended over each frame
    pub blend: Option<Blend>,
}

impl Default for Presentation {
    fn default() -> Self {
        Self {
            mirror: false,
            opacity: Self::DEFAULT_OPACITY,
            brightness: Self::DEFAULT_BRIGHTNESS,
            contrast: Self::DEFAULT_CONTRAST,
            saturation: Self::DEFAULT_SATURATION,
            hue: Self::DEFAULT_HUE,
            invert: Self::DEFAULT_INVERT,
            grayscale: Self::DEFAULT_GRAYSCALE,
            sepia: Self::DEFAULT_SEPIA,
            blur: Self::DEFAULT_BLUR,
            url: String::new(),
            blend: None,
        }
    }
}

impl Presentation {
    pub const DEFAULT_OPACITY: f64 = 1.0;
    pub const DEFAULT_BRIGHTNESS: f64 = 1.0;
    pub const DEFAULT_CONTRAST: f64 = 1.0;
    pub const DEFAULT_SATURATION: f64 = 1.0;
    pub const DEFAULT_HUE: f64 = 0.0;
    pub const DEFAULT_INVERT: f64 = 0.0;
    pub const DEFAULT_GRAYSCALE: f64 = 0.0;
    pub const DEFAULT_SEPIA: f64 = 0.0;
    pub const DEFAULT_BLUR: f64 = 0.0;

    pub fn set_opacity(&mut self, opacity: f64) -> Result<()> {
        self.opacity = within("opacity", opacity, 0.0, 1.0)?;
        Ok(())
    }

    pub fn set_brightness(&mut self, brightness: f64) -> Result<()> {
        self.brightness = non_negative("brightness", brightness)?;
        Ok(())
    }

    pub fn set_contrast(&mut self, contrast: f64) -> Result<()> {
        self.contrast = non_negative("contrast", contrast)?;
        Ok(())
    }

    pub fn set_saturation(&mut self, saturation: f64) -> Result<()> {
        self.saturation = non_negative("saturation", saturation)?;
        Ok(())
    }

    pub fn set_hue(&mut self, hue: f64) -> Result<()> {
        self.hue = within("hue", hue, 0.0, 360.0)?;
        Ok(())
    }

    pub fn set_invert(&mut self, invert: f64) -> Result<()> {
        self.invert = within("invert", invert, 0.0, 1.0)?;
        Ok(())
    }

    pub fn set_grayscale(&mut self, grayscale: f64) -> Result<()> {
        self.grayscale = within("grayscale", grayscale, 0.0, 1.0)?;
        Ok(())
    }

    pub fn set_sepia(&mut self, sepia: f64) -> Result<()> {
        self.sepia = within("sepia", sepia, 0.0, 1.0)?;
        Ok(())
    }

    pub fn set_blur(&mut self, blur: f64) -> Result<()> {
        self.blur = non_negative("blur", blur)?;
        Ok(())
    }

    /// Checks every parameter, reporting the first one out of range
    pub fn validate(&self) -> Result<()> {
        within("opacity", self.opacity, 0.0, 1.0)?;
        non_negative("brightness", self.brightness)?;
        non_negative("contrast", self.contrast)?;
        non_negative("saturation", self.saturation)?;
        within("hue", self.hue, 0.0, 360.0)?;
        within("invert", self.invert, 0.0, 1.0)?;
        within("grayscale", self.grayscale, 0.0, 1.0)?;
        within("sepia", self.sepia, 0.0, 1.0)?;
        non_negative("blur", self.blur)?;
        Ok(())
    }

    /// Derives the style: one term per parameter that differs from its
    /// default, always in the same order
    pub fn style(&self) -> Style {
        let numeric: [(f64, f64, fn(f64) -> FilterTerm); 9] = [
            (self.opacity, Self::DEFAULT_OPACITY, FilterTerm::Opacity),
            (self.brightness, Self::DEFAULT_BRIGHTNESS, FilterTerm::Brightness),
            (self.contrast, Self::DEFAULT_CONTRAST, FilterTerm::Contrast),
            (self.saturation, Self::DEFAULT_SATURATION, FilterTerm::Saturate),
            (self.hue, Self::DEFAULT_HUE, FilterTerm::HueRotate),
            (self.invert, Self::DEFAULT_INVERT, FilterTerm::Invert),
            (self.grayscale, Self::DEFAULT_GRAYSCALE, FilterTerm::Grayscale),
            (self.sepia, Self::DEFAULT_SEPIA, FilterTerm::Sepia),
            (self.blur, Self::DEFAULT_BLUR, FilterTerm::Blur),
        ];

        let mut terms: Vec<FilterTerm> = numeric
            .into_iter()
            .filter(|(value, default, _)| value != default)
            .map(|(value, _, term)| term(value))
            .collect();

        if !self.url.is_empty() {
            terms.push(FilterTerm::Url(self.url.clone()));
        }

        Style::new(terms, self.mirror)
    }
}

fn finite(property: &'static str, value: f64) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(InstacamError::property(
            property,
            format!("expected a finite number, got {}", value),
        ))
    }
}

/// Accepts `value` when it lies in `[min, max]`
pub(crate) fn within(property: &'static str, value: f64, min: f64, max: f64) -> Result<f64> {
    let value = finite(property, value)?;
    if value < min || value > max {
        return Err(InstacamError::property(
            property,
            format!("expected a number between {} and {}, got {}", min, max, value),
        ));
    }
    Ok(value)
}

pub(crate) fn non_negative(property: &'static str, value: f64) -> Result<f64> {
    let value = finite(property, value)?;
    if value < 0.0 {
        return Err(InstacamError::property(
            property,
            format!("expected a number of at least 0, got {}", value),
        ));
    }
    Ok(value)
}
