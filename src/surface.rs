use tracing::debug;

use crate::error::{InstacamError, Result};
use crate::frame::ImageFrame;
use crate::style::Style;

/// The visible drawing surface frames are presented on
pub trait Surface: Send {
    /// Sizes the surface to `w` x `h`; fails when it cannot present frames
    fn attach(&mut self, w: usize, h: usize) -> Result<()>;

    /// Draws `frame` over the whole surface, scaling it when the
    /// dimensions differ
    fn draw(&mut self, frame: &ImageFrame) -> Result<()>;

    /// Current surface pixels, as drawn (before the style is applied)
    fn pixels(&self) -> &ImageFrame;

    /// Presentation style of the surface
    fn apply_style(&mut self, style: &Style);
}

/// In-memory canvas.
///
/// The style is recorded as the filter / transform strings a compositor
/// would be given, the pixels are kept untouched.
#[derive(Debug)]
pub struct MemorySurface {
    canvas: ImageFrame,
    attachable: bool,
    filter: String,
    transform: String,
    draws: usize,
}

impl Default for MemorySurface {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySurface {
    pub fn new() -> Self {
        Self {
            canvas: ImageFrame::empty(),
            attachable: true,
            filter: String::new(),
            transform: String::new(),
            draws: 0,
        }
    }

    /// A surface that cannot be attached, like a canvas without a
    /// drawing context
    pub fn detached() -> Self {
        Self {
            attachable: false,
            ..Self::new()
        }
    }

    pub fn filter_css(&self) -> &str {
        &self.filter
    }

    pub fn transform_css(&self) -> &str {
        &self.transform
    }

    /// Number of frames drawn so far
    pub fn draws(&self) -> usize {
        self.draws
    }
}

impl Surface for MemorySurface {
    fn attach(&mut self, w: usize, h: usize) -> Result<()> {
        if !self.attachable {
            return Err(InstacamError::InvalidSurface(
                "no drawing context available".to_string(),
            ));
        }
        self.canvas = ImageFrame::new(w, h)?;
        Ok(())
    }

    fn draw(&mut self, frame: &ImageFrame) -> Result<()> {
        if self.canvas.w == 0 || self.canvas.h == 0 {
            return Err(InstacamError::InvalidSurface(
                "surface is not attached".to_string(),
            ));
        }
        self.canvas.copy_from(frame);
        self.draws += 1;
        Ok(())
    }

    fn pixels(&self) -> &ImageFrame {
        &self.canvas
    }

    fn apply_style(&mut self, style: &Style) {
        self.filter = style.filter_css();
        self.transform = style.transform_css();
        debug!(
            "surface style: filter '{}' transform '{}'",
            self.filter, self.transform
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::FilterTerm;

    #[test]
    fn draw_scales_into_canvas() {
        let mut surface = MemorySurface::new();
        surface.attach(4, 4).unwrap();

        let mut frame = ImageFrame::new(2, 2).unwrap();
        frame.fill([40, 50, 60, 255]);
        surface.draw(&frame).unwrap();

        assert_eq!(surface.pixels().dimensions(), (4, 4));
        assert_eq!(surface.pixels().get_pixel(3, 3), Some([40, 50, 60, 255]));
        assert_eq!(surface.draws(), 1);
    }

    #[test]
    fn detached_refuses_to_attach() {
        let mut surface = MemorySurface::detached();
        assert!(matches!(
            surface.attach(4, 4),
            Err(InstacamError::InvalidSurface(_))
        ));
    }

    #[test]
    fn records_style_strings() {
        let mut surface = MemorySurface::new();
        surface.apply_style(&Style::new(vec![FilterTerm::Sepia(0.5)], true));
        assert_eq!(surface.filter_css(), "sepia(0.5)");
        assert_eq!(surface.transform_css(), "scale(-1, 1)");

        surface.apply_style(&Style::default());
        assert_eq!(surface.filter_css(), "");
        assert_eq!(surface.transform_css(), "");
    }
}
