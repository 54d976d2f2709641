use crate::error::{InstacamError, Result};

/// The coefficients below are derived from Rec. ITU-R BT.601-7.
/// In the recommendation, these luminance coefficients represent
/// how much they influence / contribute to the human eye's
/// perception of brightness.
pub const R_LUMINANCE: f32 = 0.2989;
pub const G_LUMINANCE: f32 = 0.5870;
pub const B_LUMINANCE: f32 = 0.1140;

/// frames are always RGBA
pub const BYTES_PER_PIXEL: usize = 4;

/// Largest pixel buffer a frame may allocate (1 GiB)
pub const MAX_FRAME_BYTES: usize = 1 << 30;

/// RGBA pixel buffer used for every stage of the render pipeline
/// (intermediate media frame, hidden filter buffer, visible surface, snapshots)
#[derive(Clone, Debug, PartialEq)]
pub struct ImageFrame {
    /// width of image
    pub w: usize,
    /// height of image
    pub h: usize,
    /// frame data, row-major RGBA
    buffer: Vec<u8>,
}

impl ImageFrame {
    /// Creates a transparent black frame
    pub fn new(w: usize, h: usize) -> Result<Self> {
        if w == 0 || h == 0 {
            return Err(InstacamError::property(
                "dimensions",
                format!("width and height must be greater than zero (got {}x{})", w, h),
            ));
        }

        let len = Self::byte_len(w, h).ok_or_else(|| {
            InstacamError::property(
                "dimensions",
                format!("a {}x{} frame exceeds {} bytes", w, h, MAX_FRAME_BYTES),
            )
        })?;

        Ok(Self {
            w,
            h,
            buffer: vec![0; len],
        })
    }

    /// Buffer size of a `w` x `h` frame, `None` past [`MAX_FRAME_BYTES`]
    pub fn byte_len(w: usize, h: usize) -> Option<usize> {
        w.checked_mul(h)
            .and_then(|n| n.checked_mul(BYTES_PER_PIXEL))
            .filter(|&len| len <= MAX_FRAME_BYTES)
    }

    /// A 0x0 frame, stands in for a surface that is not attached yet
    pub fn empty() -> Self {
        Self {
            w: 0,
            h: 0,
            buffer: Vec::new(),
        }
    }

    /// Wraps an existing RGBA buffer
    pub fn from_rgba(w: usize, h: usize, buffer: Vec<u8>) -> Result<Self> {
        if w == 0 || h == 0 {
            return Err(InstacamError::property(
                "dimensions",
                "width and height must be greater than zero",
            ));
        }

        if Self::byte_len(w, h) != Some(buffer.len()) {
            return Err(InstacamError::property(
                "buffer",
                format!(
                    "expected {}x{}x{} bytes for a {}x{} RGBA frame but got {}",
                    w,
                    h,
                    BYTES_PER_PIXEL,
                    w,
                    h,
                    buffer.len()
                ),
            ));
        }

        Ok(Self { w, h, buffer })
    }

    /// Converts packed RGB24 data (as produced by `ffmpeg -pix_fmt rgb24`)
    /// into an opaque RGBA frame
    pub fn from_rgb(w: usize, h: usize, rgb: &[u8]) -> Result<Self> {
        if w.checked_mul(h).and_then(|n| n.checked_mul(3)) != Some(rgb.len()) {
            return Err(InstacamError::property(
                "buffer",
                format!(
                    "expected {}x{}x3 bytes for a {}x{} RGB frame but got {}",
                    w,
                    h,
                    w,
                    h,
                    rgb.len()
                ),
            ));
        }

        let mut frame = Self::new(w, h)?;
        for (dst, src) in frame
            .buffer
            .chunks_exact_mut(BYTES_PER_PIXEL)
            .zip(rgb.chunks_exact(3))
        {
            dst[..3].copy_from_slice(src);
            dst[3] = 255;
        }

        Ok(frame)
    }

    /// Return raw image data
    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    /// Return raw, mutable image data
    pub fn buffer_mut(&mut self) -> &mut [u8] {
        &mut self.buffer
    }

    pub fn dimensions(&self) -> (usize, usize) {
        (self.w, self.h)
    }

    /// Get pixel RGBA values, with bounds checking
    pub fn get_pixel(&self, x: usize, y: usize) -> Option<[u8; 4]> {
        if x >= self.w || y >= self.h {
            return None;
        }

        let i = (y * self.w + x) * BYTES_PER_PIXEL;
        let px = self.buffer.get(i..i + BYTES_PER_PIXEL)?;
        Some([px[0], px[1], px[2], px[3]])
    }

    /// Set pixel RGBA values, returns `false` when out of bounds
    pub fn set_pixel(&mut self, x: usize, y: usize, rgba: [u8; 4]) -> bool {
        if x >= self.w || y >= self.h {
            return false;
        }

        let i = (y * self.w + x) * BYTES_PER_PIXEL;
        match self.buffer.get_mut(i..i + BYTES_PER_PIXEL) {
            Some(px) => {
                px.copy_from_slice(&rgba);
                true
            }
            None => false,
        }
    }

    pub fn fill(&mut self, rgba: [u8; 4]) {
        for px in self.buffer.chunks_exact_mut(BYTES_PER_PIXEL) {
            px.copy_from_slice(&rgba);
        }
    }

    /// Copies `src` into this frame, scaling when the dimensions differ
    pub fn copy_from(&mut self, src: &ImageFrame) {
        if src.w == self.w && src.h == self.h {
            self.buffer.copy_from_slice(&src.buffer);
        } else {
            self.scale_from(src);
        }
    }

    /// Nearest neighbour scaling of `src` onto this frame's dimensions
    pub fn scale_from(&mut self, src: &ImageFrame) {
        if src.w == 0 || src.h == 0 {
            self.fill([0, 0, 0, 0]);
            return;
        }

        // scaling factors to map this frame's dimension
        // to the source image's dimension
        let scale_x = src.w as f32 / self.w as f32;
        let scale_y = src.h as f32 / self.h as f32;

        for y in 0..self.h {
            let s_y = ((y as f32 * scale_y) as usize).min(src.h - 1);
            for x in 0..self.w {
                let s_x = ((x as f32 * scale_x) as usize).min(src.w - 1);
                let s = (s_y * src.w + s_x) * BYTES_PER_PIXEL;
                let d = (y * self.w + x) * BYTES_PER_PIXEL;
                self.buffer[d..d + BYTES_PER_PIXEL]
                    .copy_from_slice(&src.buffer[s..s + BYTES_PER_PIXEL]);
            }
        }
    }

    /// Copies a rectangle out of the frame. Pixels of the rectangle that fall
    /// outside the frame are transparent black.
    pub fn region(&self, left: i64, top: i64, w: usize, h: usize) -> Result<ImageFrame> {
        let mut out = ImageFrame::new(w, h)?;

        for y in 0..h {
            let s_y = top.saturating_add(y as i64);
            if s_y < 0 || s_y >= self.h as i64 {
                continue;
            }
            for x in 0..w {
                let s_x = left.saturating_add(x as i64);
                if s_x < 0 || s_x >= self.w as i64 {
                    continue;
                }
                if let Some(px) = self.get_pixel(s_x as usize, s_y as usize) {
                    out.set_pixel(x, y, px);
                }
            }
        }

        Ok(out)
    }

    /// Mirrors the frame around its vertical axis
    pub fn flip_horizontal(&mut self) {
        let row_len = self.w * BYTES_PER_PIXEL;
        for row in self.buffer.chunks_exact_mut(row_len) {
            for x in 0..self.w / 2 {
                let a = x * BYTES_PER_PIXEL;
                let b = (self.w - 1 - x) * BYTES_PER_PIXEL;
                for c in 0..BYTES_PER_PIXEL {
                    row.swap(a + c, b + c);
                }
            }
        }
    }

    /// Calculate the grayscale intensity value (relative luminance)
    /// of a given pixel
    pub fn calculate_intensity([r, g, b]: [u8; 3]) -> f32 {
        R_LUMINANCE * r as f32 + G_LUMINANCE * g as f32 + B_LUMINANCE * b as f32
    }
}
