use std::io::Write;

use crate::error::{InstacamError, Result};
use crate::frame::ImageFrame;
use crate::style::Style;
use crate::surface::Surface;

/// Renders the surface to a terminal as ASCII art.
///
/// Terminals have no compositor, so the style is applied in software before
/// every frame is converted. Only the cells that changed since the previous
/// frame are written, to reduce flickering.
pub struct TerminalSurface<W: Write + Send> {
    out: W,
    /// what has been drawn, unstyled
    canvas: ImageFrame,
    /// scratch frame the style is rendered into
    styled: ImageFrame,
    style: Style,
    /// intensity ramp for terminal cells, darkest first
    ascii_intensity: Vec<char>,
    /// number of terminal columns
    cols: usize,
    /// number of terminal rows
    rows: usize,
    /// cells on screen, used to only redraw what changed
    prev_cells: Vec<char>,
}

impl<W: Write + Send> TerminalSurface<W> {
    pub const DEFAULT_ASCII_INTENSITY: &'static str = " .:coPO?@■";
    pub const DEFAULT_COLS: usize = 120;
    pub const DEFAULT_ROWS: usize = 40;

    pub fn new(out: W, cols: usize, rows: usize) -> Self {
        Self {
            out,
            canvas: ImageFrame::empty(),
            styled: ImageFrame::empty(),
            style: Style::default(),
            ascii_intensity: Self::DEFAULT_ASCII_INTENSITY.chars().collect(),
            cols,
            rows,
            prev_cells: Vec::new(),
        }
    }

    pub fn with_intensity(mut self, ramp: &str) -> Self {
        if !ramp.is_empty() {
            self.ascii_intensity = ramp.chars().collect();
        }
        self
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// Prints an ANSI escape code sequence that clears the screen
    /// and positions the cursor in the top-left corner (1, 1)
    fn clear_screen(&mut self) -> Result<()> {
        write!(self.out, "\x1B[2J\x1B[1;1H")?;
        self.out.flush()?;
        Ok(())
    }

    /// Maps a styled pixel to an intensity character, transparent pixels
    /// fade to the (black) terminal background
    fn cell(&self, [r, g, b, a]: [u8; 4]) -> char {
        let intensity = ImageFrame::calculate_intensity([r, g, b]) * a as f32 / 255.0;
        let char_i = (intensity / 255.0 * self.ascii_intensity.len() as f32) as usize;
        // bounds check (e.g. floating point rounding error)
        self.ascii_intensity[char_i.min(self.ascii_intensity.len() - 1)]
    }

    /// Output any cell that changed since the previous frame and record
    /// it into `prev_cells`
    fn render(&mut self) -> Result<()> {
        self.styled.clone_from(&self.canvas);
        self.style.apply(&mut self.styled);

        let scale_x = self.styled.w as f32 / self.cols as f32;
        let scale_y = self.styled.h as f32 / self.rows as f32;

        for y in 0..self.rows {
            for x in 0..self.cols {
                let i_x = ((x as f32 * scale_x) as usize).min(self.styled.w - 1);
                let i_y = ((y as f32 * scale_y) as usize).min(self.styled.h - 1);
                let Some(px) = self.styled.get_pixel(i_x, i_y) else {
                    continue;
                };

                let c = self.cell(px);
                let i = y * self.cols + x;
                if self.prev_cells[i] != c {
                    // ANSI escape code sequence, move cursor to specified
                    // row & column & change character
                    write!(self.out, "\x1B[{};{}H{}", y + 1, x + 1, c)?;
                    self.prev_cells[i] = c;
                }
            }
        }

        self.out.flush()?;
        Ok(())
    }
}

impl<W: Write + Send> Surface for TerminalSurface<W> {
    fn attach(&mut self, w: usize, h: usize) -> Result<()> {
        if self.cols == 0 || self.rows == 0 {
            return Err(InstacamError::InvalidSurface(format!(
                "terminal has no room to draw ({}x{} cells)",
                self.cols, self.rows
            )));
        }

        self.canvas = ImageFrame::new(w, h)?;
        self.styled = self.canvas.clone();
        self.prev_cells = vec![' '; self.cols * self.rows];
        self.clear_screen()
    }

    fn draw(&mut self, frame: &ImageFrame) -> Result<()> {
        if self.prev_cells.is_empty() {
            return Err(InstacamError::InvalidSurface(
                "surface is not attached".to_string(),
            ));
        }
        self.canvas.copy_from(frame);
        self.render()
    }

    fn pixels(&self) -> &ImageFrame {
        &self.canvas
    }

    fn apply_style(&mut self, style: &Style) {
        self.style = style.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drawn(surface: TerminalSurface<Vec<u8>>) -> String {
        String::from_utf8(surface.into_inner()).unwrap()
    }

    #[test]
    fn bright_frame_uses_top_of_ramp() {
        let mut surface = TerminalSurface::new(Vec::new(), 2, 1);
        surface.attach(4, 2).unwrap();

        let mut frame = ImageFrame::new(4, 2).unwrap();
        frame.fill([255, 255, 255, 255]);
        surface.draw(&frame).unwrap();

        let out = drawn(surface);
        assert!(out.starts_with("\x1B[2J\x1B[1;1H"));
        assert!(out.contains("\x1B[1;1H■"));
        assert!(out.contains("\x1B[1;2H■"));
    }

    #[test]
    fn unchanged_cells_are_not_rewritten() {
        let mut surface = TerminalSurface::new(Vec::new(), 2, 2);
        surface.attach(2, 2).unwrap();

        let mut frame = ImageFrame::new(2, 2).unwrap();
        frame.fill([255, 255, 255, 255]);
        surface.draw(&frame).unwrap();
        surface.draw(&frame).unwrap();

        assert_eq!(drawn(surface).matches('■').count(), 4);
    }

    #[test]
    fn style_is_rendered_in_software() {
        let mut surface = TerminalSurface::new(Vec::new(), 1, 1).with_intensity(" #");
        surface.attach(1, 1).unwrap();
        surface.apply_style(&Style::new(vec![crate::style::FilterTerm::Invert(1.0)], false));

        let mut frame = ImageFrame::new(1, 1).unwrap();
        frame.fill([0, 0, 0, 255]);
        surface.draw(&frame).unwrap();

        assert_eq!(surface.pixels().get_pixel(0, 0), Some([0, 0, 0, 255]));
        assert!(drawn(surface).ends_with('#'));
    }

    #[test]
    fn huge_blur_still_draws() {
        let mut surface = TerminalSurface::new(Vec::new(), 2, 2);
        surface.attach(4, 4).unwrap();
        surface.apply_style(&Style::new(vec![crate::style::FilterTerm::Blur(1e30)], false));

        let mut frame = ImageFrame::new(4, 4).unwrap();
        frame.fill([255, 255, 255, 255]);
        surface.draw(&frame).unwrap();

        assert_eq!(drawn(surface).matches('■').count(), 4);
    }

    #[test]
    fn no_room_to_draw() {
        let mut surface = TerminalSurface::new(Vec::new(), 0, 10);
        assert!(surface.attach(4, 4).is_err());
    }
}
