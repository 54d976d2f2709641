use parking_lot::{Mutex, MutexGuard};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{error, info};

use crate::error::{InstacamError, Result};
use crate::instacam::Instacam;
use crate::surface::Surface;

/// Signals the next display refresh
pub trait RefreshClock: Send {
    /// Blocks until the display is ready for the next frame
    fn wait_for_refresh(&mut self);
}

/// Paces the render loop at a fixed display refresh rate
#[derive(Debug, Clone)]
pub struct FrameTimer {
    /// Target duration per refresh
    frame_duration: Duration,
    /// Time of the last refresh
    last_refresh: Option<Instant>,
    /// Total refreshes signalled
    refresh_count: u64,
}

impl Default for FrameTimer {
    fn default() -> Self {
        Self::new(Self::DEFAULT_REFRESH_RATE)
    }
}

impl FrameTimer {
    pub const DEFAULT_REFRESH_RATE: u32 = 60;

    pub fn new(refresh_rate: u32) -> Self {
        Self {
            frame_duration: Duration::from_micros(1_000_000 / refresh_rate.max(1) as u64),
            last_refresh: None,
            refresh_count: 0,
        }
    }

    pub fn frame_duration(&self) -> Duration {
        self.frame_duration
    }

    pub fn refresh_count(&self) -> u64 {
        self.refresh_count
    }

    /// How long until the next refresh is due
    pub fn time_until_refresh(&self) -> Duration {
        match self.last_refresh {
            Some(last) => self.frame_duration.saturating_sub(last.elapsed()),
            None => Duration::ZERO,
        }
    }
}

impl RefreshClock for FrameTimer {
    fn wait_for_refresh(&mut self) {
        let wait = self.time_until_refresh();
        if !wait.is_zero() {
            thread::sleep(wait);
        }
        self.last_refresh = Some(Instant::now());
        self.refresh_count += 1;
    }
}

/// Runs render iterations of an [`Instacam`] on a dedicated thread, one per
/// display refresh.
///
/// Parameters are changed through [`RenderLoop::camera`] and take effect on
/// the next iteration. A failing iteration ends the loop, the error is kept
/// for [`RenderLoop::take_error`].
pub struct RenderLoop<S: Surface + 'static> {
    camera: Arc<Mutex<Instacam<S>>>,
    running: Arc<AtomicBool>,
    error: Arc<Mutex<Option<InstacamError>>>,
    handle: Option<JoinHandle<()>>,
}

impl<S: Surface + 'static> RenderLoop<S> {
    pub fn start<C>(instacam: Instacam<S>, mut clock: C) -> Result<Self>
    where
        C: RefreshClock + 'static,
    {
        let camera = Arc::new(Mutex::new(instacam));
        let running = Arc::new(AtomicBool::new(true));
        let error = Arc::new(Mutex::new(None));

        let thread_camera = Arc::clone(&camera);
        let thread_running = Arc::clone(&running);
        let thread_error = Arc::clone(&error);

        let handle = thread::Builder::new()
            .name("instacam-render".to_string())
            .spawn(move || {
                while thread_running.load(Ordering::SeqCst) {
                    clock.wait_for_refresh();
                    if !thread_running.load(Ordering::SeqCst) {
                        break;
                    }

                    let result = thread_camera.lock().render_frame();
                    if let Err(e) = result {
                        error!("render iteration failed: {}", e);
                        *thread_error.lock() = Some(e);
                        thread_running.store(false, Ordering::SeqCst);
                    }
                }
            })?;

        info!("render loop started");

        Ok(Self {
            camera,
            running,
            error,
            handle: Some(handle),
        })
    }

    /// Locks the camera; the loop waits for the guard to be released
    pub fn camera(&self) -> MutexGuard<'_, Instacam<S>> {
        self.camera.lock()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Error of the iteration that ended the loop
    pub fn take_error(&self) -> Option<InstacamError> {
        self.error.lock().take()
    }

    /// Signals the thread and waits for the current iteration to finish
    fn halt(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                *self.error.lock() = Some(InstacamError::RenderLoop(
                    "render thread panicked".to_string(),
                ));
            }
        }
    }

    /// Stops the loop, releases the media tracks and hands the camera back
    pub fn stop(mut self) -> Result<Instacam<S>> {
        self.halt();
        let camera = Arc::clone(&self.camera);
        drop(self);

        let mut instacam = Arc::try_unwrap(camera)
            .map_err(|_| InstacamError::RenderLoop("camera is still shared".to_string()))?
            .into_inner();
        instacam.stop();
        info!("render loop stopped");

        Ok(instacam)
    }
}

impl<S: Surface + 'static> Drop for RenderLoop<S> {
    fn drop(&mut self) {
        self.halt();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_refresh_is_immediate() {
        let mut timer = FrameTimer::new(10);
        assert_eq!(timer.time_until_refresh(), Duration::ZERO);

        let start = Instant::now();
        timer.wait_for_refresh();
        assert!(start.elapsed() < Duration::from_millis(50));

        assert!(timer.time_until_refresh() > Duration::ZERO);
        timer.wait_for_refresh();
        assert!(start.elapsed() >= Duration::from_millis(90));
        assert_eq!(timer.refresh_count(), 2);
    }

    #[test]
    fn default_refresh_rate() {
        let timer = FrameTimer::default();
        assert_eq!(timer.frame_duration(), Duration::from_micros(16_666));
    }
}
