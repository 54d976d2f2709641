use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::debug;

use super::{CaptureBackend, MediaConstraints, MediaStream};
use crate::error::{InstacamError, Result};
use crate::frame::ImageFrame;

/// Test patterns for local development
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternType {
    Checkerboard,
    MovingLine,
    Gradient,
    Solid([u8; 4]),
}

#[derive(Debug, Clone)]
enum Behavior {
    Stream,
    Fail(String),
    Unsupported,
}

/// What the application did with the mock device
#[derive(Debug, Default)]
struct Observed {
    constraints: Option<MediaConstraints>,
    volume: Option<f64>,
    acquisitions: usize,
    stopped: bool,
}

/// Factory for "fake" camera streams to test locally.
///
/// Clones share what they observed, so a test can keep one handle and give
/// the other to an `Instacam`.
#[derive(Debug, Clone)]
pub struct MockCapture {
    pattern: PatternType,
    behavior: Behavior,
    /// how long acquisition blocks, like a permission prompt would
    delay: Duration,
    observed: Arc<Mutex<Observed>>,
}

impl MockCapture {
    pub fn new(pattern: PatternType) -> Self {
        Self {
            pattern,
            behavior: Behavior::Stream,
            delay: Duration::ZERO,
            observed: Arc::default(),
        }
    }

    /// A device whose acquisition is refused with `reason`
    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            behavior: Behavior::Fail(reason.into()),
            ..Self::new(PatternType::Checkerboard)
        }
    }

    /// A platform without any capture facility
    pub fn unsupported() -> Self {
        Self {
            behavior: Behavior::Unsupported,
            ..Self::new(PatternType::Checkerboard)
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Constraints of the last acquisition
    pub fn constraints(&self) -> Option<MediaConstraints> {
        self.observed.lock().constraints
    }

    /// Volume last applied to the stream, 0.0 to 1.0
    pub fn volume(&self) -> Option<f64> {
        self.observed.lock().volume
    }

    pub fn acquisitions(&self) -> usize {
        self.observed.lock().acquisitions
    }

    /// Whether the last stream has been released
    pub fn is_stopped(&self) -> bool {
        self.observed.lock().stopped
    }
}

impl CaptureBackend for MockCapture {
    fn is_supported(&self) -> bool {
        !matches!(self.behavior, Behavior::Unsupported)
    }

    fn acquire(&self, constraints: &MediaConstraints) -> Result<Box<dyn MediaStream>> {
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }

        {
            let mut observed = self.observed.lock();
            observed.constraints = Some(*constraints);
            observed.acquisitions += 1;
            observed.stopped = false;
        }

        match &self.behavior {
            Behavior::Stream => {}
            Behavior::Fail(reason) => return Err(InstacamError::Capture(reason.clone())),
            Behavior::Unsupported => return Err(InstacamError::Unsupported),
        }

        debug!("mock capture acquired with {:?}", constraints);

        let fps = constraints.video.map(|v| v.frame_rate.max(1)).unwrap_or(1);
        Ok(Box::new(MockStream {
            pattern: self.pattern,
            has_video: constraints.video.is_some(),
            started: Instant::now(),
            frame_delay: Duration::from_secs_f64(1.0 / fps as f64),
            observed: Arc::clone(&self.observed),
        }))
    }
}

struct MockStream {
    pattern: PatternType,
    has_video: bool,
    started: Instant,
    /// how long one pattern step lasts (effectively FPS)
    frame_delay: Duration,
    observed: Arc<Mutex<Observed>>,
}

impl MockStream {
    /// counter to determine how the pattern should look temporally
    fn frame_counter(&self) -> usize {
        (self.started.elapsed().as_nanos() / self.frame_delay.as_nanos().max(1)) as usize
    }

    fn generate(&self, frame: &mut ImageFrame) {
        let counter = self.frame_counter();
        let (w, h) = frame.dimensions();

        match self.pattern {
            PatternType::Solid(rgba) => frame.fill(rgba),
            PatternType::Checkerboard => {
                let colors = [[16, 16, 16, 255], [235, 235, 235, 255]];
                let pattern_offset = (counter / 5) % 2;
                for y in 0..h {
                    for x in 0..w {
                        let is_odd = (x / 8 + y / 8) % 2;
                        frame.set_pixel(x, y, colors[(is_odd + pattern_offset) % 2]);
                    }
                }
            }
            PatternType::MovingLine => {
                let line_pos = counter % h;
                for y in 0..h {
                    let color = if y == line_pos {
                        [255, 255, 255, 255]
                    } else {
                        [0, 0, 0, 255]
                    };
                    for x in 0..w {
                        frame.set_pixel(x, y, color);
                    }
                }
            }
            PatternType::Gradient => {
                let shift = counter % 256;
                for y in 0..h {
                    for x in 0..w {
                        let r = (x * 255 / w.max(2).saturating_sub(1)).min(255) as u8;
                        let g = (y * 255 / h.max(2).saturating_sub(1)).min(255) as u8;
                        let b = shift as u8;
                        frame.set_pixel(x, y, [r, g, b, 255]);
                    }
                }
            }
        }
    }
}

impl MediaStream for MockStream {
    fn read_frame(&mut self, target: &mut ImageFrame) -> Result<bool> {
        if !self.has_video || self.observed.lock().stopped {
            return Ok(false);
        }
        self.generate(target);
        Ok(true)
    }

    fn set_volume(&mut self, volume: f64) {
        self.observed.lock().volume = Some(volume);
    }

    fn stop(&mut self) {
        self.observed.lock().stopped = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::VideoConstraints;

    fn video() -> MediaConstraints {
        MediaConstraints {
            audio: false,
            video: Some(VideoConstraints {
                width: 8,
                height: 8,
                frame_rate: 30,
                aspect_ratio: 1.0,
            }),
        }
    }

    #[test]
    fn solid_stream_fills_target() {
        let capture = MockCapture::new(PatternType::Solid([9, 8, 7, 255]));
        let mut stream = capture.acquire(&video()).unwrap();
        let mut frame = ImageFrame::new(3, 2).unwrap();

        assert!(stream.read_frame(&mut frame).unwrap());
        assert_eq!(frame.get_pixel(2, 1), Some([9, 8, 7, 255]));
        assert_eq!(capture.constraints(), Some(video()));
    }

    #[test]
    fn stopped_stream_yields_nothing() {
        let capture = MockCapture::new(PatternType::Gradient);
        let mut stream = capture.acquire(&video()).unwrap();
        stream.set_volume(0.25);
        stream.stop();

        let mut frame = ImageFrame::new(2, 2).unwrap();
        assert!(!stream.read_frame(&mut frame).unwrap());
        assert!(capture.is_stopped());
        assert_eq!(capture.volume(), Some(0.25));
    }

    #[test]
    fn failing_and_unsupported() {
        let failing = MockCapture::failing("permission denied");
        assert!(failing.is_supported());
        assert!(matches!(
            failing.acquire(&video()),
            Err(InstacamError::Capture(reason)) if reason == "permission denied"
        ));
        assert_eq!(failing.acquisitions(), 1);

        assert!(!MockCapture::unsupported().is_supported());
    }
}
