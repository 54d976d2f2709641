//! Platform capture primitives.
//!
//! A [`CaptureBackend`] turns [`MediaConstraints`] into a live
//! [`MediaStream`]. Device backends own their device on a capture thread and
//! publish the latest frame into a [`FrameSlot`]; the render loop copies
//! whatever frame is current when it asks for one.

pub mod ffmpeg;
pub mod mock;
#[cfg(feature = "native")]
pub mod native;

use parking_lot::Mutex;
use std::sync::Arc;

use crate::error::Result;
use crate::frame::ImageFrame;

pub use ffmpeg::FfmpegCapture;
pub use mock::{MockCapture, PatternType};
#[cfg(feature = "native")]
pub use native::NativeCapture;

/// Requested video track
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoConstraints {
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
    pub aspect_ratio: f64,
}

/// Requested tracks, `video` is `None` when the camera is disabled
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MediaConstraints {
    pub audio: bool,
    pub video: Option<VideoConstraints>,
}

pub trait CaptureBackend: Send + Sync {
    /// Whether this platform can capture at all
    fn is_supported(&self) -> bool;

    /// Opens the device(s) matching `constraints`. May block, callers run it
    /// off the render thread.
    fn acquire(&self, constraints: &MediaConstraints) -> Result<Box<dyn MediaStream>>;
}

/// A live capture handle
pub trait MediaStream: Send {
    /// Copies the current frame into `target`, scaling it to the target's
    /// dimensions. Returns `false` while no frame has been produced yet.
    fn read_frame(&mut self, target: &mut ImageFrame) -> Result<bool>;

    /// Sets the audio volume, from 0.0 (muted) to 1.0
    fn set_volume(&mut self, volume: f64);

    /// Releases the underlying tracks. Calling it twice is harmless.
    fn stop(&mut self);
}

/// Latest frame published by a capture thread
#[derive(Clone, Default)]
pub struct FrameSlot {
    frame: Arc<Mutex<Option<ImageFrame>>>,
}

impl FrameSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the current frame
    pub fn publish(&self, frame: ImageFrame) {
        *self.frame.lock() = Some(frame);
    }

    /// Copies the current frame into `target`, `false` if there is none yet
    pub fn copy_into(&self, target: &mut ImageFrame) -> bool {
        match self.frame.lock().as_ref() {
            Some(frame) => {
                target.copy_from(frame);
                true
            }
            None => false,
        }
    }

    pub fn clear(&self) {
        *self.frame.lock() = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_hands_out_latest_frame() {
        let slot = FrameSlot::new();
        let mut target = ImageFrame::new(2, 2).unwrap();
        assert!(!slot.copy_into(&mut target));

        let mut first = ImageFrame::new(4, 4).unwrap();
        first.fill([1, 2, 3, 255]);
        slot.publish(first);

        let mut second = ImageFrame::new(4, 4).unwrap();
        second.fill([7, 8, 9, 255]);
        slot.clone().publish(second);

        assert!(slot.copy_into(&mut target));
        assert_eq!(target.get_pixel(1, 1), Some([7, 8, 9, 255]));

        slot.clear();
        assert!(!slot.copy_into(&mut target));
    }
}
