use nokhwa::pixel_format::RgbAFormat;
use nokhwa::utils::{
    ApiBackend, CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType,
    Resolution,
};
use nokhwa::Camera;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info, warn};

use super::{CaptureBackend, FrameSlot, MediaConstraints, MediaStream, VideoConstraints};
use crate::error::{InstacamError, Result};
use crate::frame::ImageFrame;

/// Consecutive read failures after which the device is considered gone
const MAX_CONSECUTIVE_ERRORS: u32 = 30;
const ERROR_RETRY_DELAY: Duration = Duration::from_millis(30);

/// Captures the camera through the operating system API via `nokhwa`
#[derive(Debug, Clone, Default)]
pub struct NativeCapture {
    index: u32,
}

impl NativeCapture {
    pub fn new(index: u32) -> Self {
        Self { index }
    }
}

impl CaptureBackend for NativeCapture {
    fn is_supported(&self) -> bool {
        match nokhwa::query(ApiBackend::Auto) {
            Ok(devices) => !devices.is_empty(),
            Err(e) => {
                debug!("camera query failed: {}", e);
                false
            }
        }
    }

    fn acquire(&self, constraints: &MediaConstraints) -> Result<Box<dyn MediaStream>> {
        let video = constraints.video.ok_or_else(|| {
            InstacamError::Capture("the native backend needs a video track".to_string())
        })?;

        if constraints.audio {
            warn!("audio is not captured by the native backend, volume changes have no effect");
        }

        let slot = FrameSlot::new();
        let running = Arc::new(AtomicBool::new(true));
        let (opened_tx, opened_rx) = mpsc::sync_channel(1);

        let index = self.index;
        let thread_slot = slot.clone();
        let thread_running = Arc::clone(&running);
        let handle = thread::Builder::new()
            .name("instacam-camera".to_string())
            .spawn(move || capture_loop(index, video, thread_slot, thread_running, opened_tx))?;

        // the camera lives on its thread, wait for it to report the open
        match opened_rx.recv() {
            Ok(Ok(())) => Ok(Box::new(NativeStream {
                slot,
                running,
                handle: Some(handle),
            })),
            Ok(Err(reason)) => {
                let _ = handle.join();
                Err(InstacamError::Capture(reason))
            }
            Err(_) => {
                let _ = handle.join();
                Err(InstacamError::Capture("camera thread exited".to_string()))
            }
        }
    }
}

fn open_camera(index: u32, video: VideoConstraints) -> std::result::Result<Camera, String> {
    let target = CameraFormat::new(
        Resolution::new(video.width, video.height),
        FrameFormat::MJPEG,
        video.frame_rate,
    );
    let requested = RequestedFormat::new::<RgbAFormat>(RequestedFormatType::Closest(target));

    let mut camera = Camera::new(CameraIndex::Index(index), requested)
        .map_err(|e| format!("failed to open camera {}: {}", index, e))?;
    camera
        .open_stream()
        .map_err(|e| format!("failed to open camera stream: {}", e))?;

    Ok(camera)
}

fn capture_loop(
    index: u32,
    video: VideoConstraints,
    slot: FrameSlot,
    running: Arc<AtomicBool>,
    opened: mpsc::SyncSender<std::result::Result<(), String>>,
) {
    let mut camera = match open_camera(index, video) {
        Ok(camera) => camera,
        Err(reason) => {
            let _ = opened.send(Err(reason));
            return;
        }
    };

    let resolution = camera.resolution();
    info!(
        "camera opened: {} ({}x{})",
        camera.info().human_name(),
        resolution.width(),
        resolution.height()
    );
    let _ = opened.send(Ok(()));

    let mut errors = 0u32;
    while running.load(Ordering::SeqCst) {
        let decoded = camera
            .frame()
            .and_then(|buffer| buffer.decode_image::<RgbAFormat>());

        match decoded {
            Ok(image) => {
                errors = 0;
                let (w, h) = (image.width() as usize, image.height() as usize);
                match ImageFrame::from_rgba(w, h, image.into_raw()) {
                    Ok(frame) => slot.publish(frame),
                    Err(e) => warn!("dropping camera frame: {}", e),
                }
            }
            Err(e) => {
                errors += 1;
                if errors >= MAX_CONSECUTIVE_ERRORS {
                    warn!("camera capture failed after {} consecutive errors: {}", errors, e);
                    break;
                }
                debug!("camera frame error ({}/{}): {}", errors, MAX_CONSECUTIVE_ERRORS, e);
                thread::sleep(ERROR_RETRY_DELAY);
            }
        }
    }

    let _ = camera.stop_stream();
    info!("camera stream closed");
}

struct NativeStream {
    slot: FrameSlot,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl MediaStream for NativeStream {
    fn read_frame(&mut self, target: &mut ImageFrame) -> Result<bool> {
        Ok(self.slot.copy_into(target))
    }

    fn set_volume(&mut self, _volume: f64) {}

    fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
            self.slot.clear();
        }
    }
}

impl Drop for NativeStream {
    fn drop(&mut self) {
        self.stop();
    }
}
