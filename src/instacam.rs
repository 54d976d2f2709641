use std::sync::mpsc::{self, Receiver, RecvTimeoutError, TryRecvError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::blend::Blend;
use crate::capture::{CaptureBackend, MediaStream};
use crate::config::{validate_volume, InstacamConfig};
use crate::error::{InstacamError, Result};
use crate::export::{self, ExportFormat};
use crate::filter::PixelFilter;
use crate::frame::ImageFrame;
use crate::style::Style;
use crate::surface::Surface;

/// How often frame statistics are logged
const STATS_INTERVAL: u64 = 300;

/// Where the capture acquisition stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureStatus {
    /// the platform cannot capture, nothing will ever be drawn
    Unsupported,
    /// acquisition is running in the background
    Pending,
    /// the stream is bound and frames are drawn
    Streaming,
    /// acquisition was refused
    Failed,
    /// the stream has been released
    Stopped,
}

type Acquisition = Result<Box<dyn MediaStream>>;

enum CaptureState {
    Unsupported,
    Pending(Receiver<Acquisition>),
    Streaming(Box<dyn MediaStream>),
    Failed,
    Stopped,
}

impl CaptureState {
    fn status(&self) -> CaptureStatus {
        match self {
            CaptureState::Unsupported => CaptureStatus::Unsupported,
            CaptureState::Pending(_) => CaptureStatus::Pending,
            CaptureState::Streaming(_) => CaptureStatus::Streaming,
            CaptureState::Failed => CaptureStatus::Failed,
            CaptureState::Stopped => CaptureStatus::Stopped,
        }
    }
}

/// A live camera bound to a visible surface.
///
/// Every render iteration copies the current camera frame to the surface,
/// optionally through a per-pixel filter and a blend layer. Presentation
/// parameters restyle the surface as soon as they are set.
///
/// ```no_run
/// use instacam::capture::FfmpegCapture;
/// use instacam::config::InstacamConfig;
/// use instacam::surface::MemorySurface;
/// use instacam::{ExportFormat, Instacam};
/// use std::time::Duration;
///
/// let config = InstacamConfig::default().on_fail(|e| eprintln!("no camera: {}", e));
/// let mut camera = Instacam::new(MemorySurface::new(), FfmpegCapture::new(), config)?;
///
/// camera.await_capture(Duration::from_secs(5));
/// camera.set_sepia(0.6)?;
/// camera.render_frame()?;
///
/// let uri = camera.save(ExportFormat::Png, 1.0)?;
/// # Ok::<(), instacam::InstacamError>(())
/// ```
pub struct Instacam<S: Surface> {
    surface: S,
    config: InstacamConfig,
    /// intermediate frame the camera is read into
    media: ImageFrame,
    /// hidden buffer the filter and blend run on
    buffer: ImageFrame,
    style: Style,
    state: CaptureState,
    frames_rendered: u64,
}

impl<S: Surface> Instacam<S> {
    /// Attaches `surface`, styles it and starts acquiring the camera in the
    /// background.
    ///
    /// An unsupported platform is not an error: the `unsupported` callback
    /// runs and the instance stays inert.
    pub fn new<B>(mut surface: S, backend: B, mut config: InstacamConfig) -> Result<Self>
    where
        B: CaptureBackend + 'static,
    {
        config.validate()?;

        let (w, h) = (config.width as usize, config.height as usize);
        surface.attach(w, h)?;

        let style = config.presentation.style();
        surface.apply_style(&style);

        let state = if backend.is_supported() {
            CaptureState::Pending(Self::acquire(Arc::new(backend), &config)?)
        } else {
            info!("camera capture is not supported on this platform");
            if let Some(unsupported) = config.callbacks.unsupported.as_mut() {
                unsupported();
            }
            CaptureState::Unsupported
        };

        Ok(Self {
            surface,
            media: ImageFrame::new(w, h)?,
            buffer: ImageFrame::new(w, h)?,
            config,
            style,
            state,
            frames_rendered: 0,
        })
    }

    fn acquire(
        backend: Arc<dyn CaptureBackend>,
        config: &InstacamConfig,
    ) -> Result<Receiver<Acquisition>> {
        let constraints = config.constraints();
        let (tx, rx) = mpsc::channel();

        debug!("acquiring media stream with {:?}", constraints);
        thread::Builder::new()
            .name("instacam-acquire".to_string())
            .spawn(move || {
                // the owner may be gone already, the stream is then dropped
                let _ = tx.send(backend.acquire(&constraints));
            })?;

        Ok(rx)
    }

    /// Binds or rejects the acquired stream and runs the matching callback
    fn finish_capture(&mut self, acquisition: Acquisition) {
        match acquisition {
            Ok(mut stream) => {
                if self.config.sound {
                    stream.set_volume(self.config.volume / 100.0);
                }
                self.state = CaptureState::Streaming(stream);
                info!(
                    "media stream bound ({}x{} @ {} fps)",
                    self.config.width, self.config.height, self.config.framerate
                );
                if let Some(done) = self.config.callbacks.done.as_mut() {
                    done();
                }
            }
            Err(e) => {
                warn!("{}", e);
                self.state = CaptureState::Failed;
                if let Some(fail) = self.config.callbacks.fail.as_mut() {
                    fail(&e);
                }
            }
        }
    }

    /// Dispatches the acquisition result if it has arrived
    pub fn poll_capture(&mut self) -> CaptureStatus {
        if let CaptureState::Pending(rx) = &self.state {
            match rx.try_recv() {
                Ok(acquisition) => self.finish_capture(acquisition),
                Err(TryRecvError::Empty) => {}
                Err(TryRecvError::Disconnected) => self.finish_capture(Err(
                    InstacamError::Capture("acquisition thread exited".to_string()),
                )),
            }
        }
        self.status()
    }

    /// Waits up to `timeout` for the acquisition result and dispatches it
    pub fn await_capture(&mut self, timeout: Duration) -> CaptureStatus {
        if let CaptureState::Pending(rx) = &self.state {
            match rx.recv_timeout(timeout) {
                Ok(acquisition) => self.finish_capture(acquisition),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => self.finish_capture(Err(
                    InstacamError::Capture("acquisition thread exited".to_string()),
                )),
            }
        }
        self.status()
    }

    pub fn status(&self) -> CaptureStatus {
        self.state.status()
    }

    /// One render iteration: camera frame -> (filter -> blend) -> surface.
    ///
    /// Draws nothing until the stream is bound or while it has no frame.
    pub fn render_frame(&mut self) -> Result<()> {
        self.poll_capture();

        let CaptureState::Streaming(stream) = &mut self.state else {
            return Ok(());
        };
        if !stream.read_frame(&mut self.media)? {
            return Ok(());
        }

        let blend = self.config.presentation.blend;
        if self.config.filter.is_some() || blend.is_some() {
            self.buffer.copy_from(&self.media);
            if let Some(filter) = self.config.filter.as_mut() {
                filter.apply(&mut self.buffer)?;
            }
            if let Some(blend) = blend {
                blend.composite(&mut self.buffer);
            }
            self.surface.draw(&self.buffer)?;
        } else {
            self.surface.draw(&self.media)?;
        }

        self.frames_rendered += 1;
        if self.frames_rendered % STATS_INTERVAL == 0 {
            debug!("{} frames rendered", self.frames_rendered);
        }

        Ok(())
    }

    /// Releases the media tracks, nothing is drawn afterwards
    pub fn stop(&mut self) {
        match std::mem::replace(&mut self.state, CaptureState::Stopped) {
            CaptureState::Streaming(mut stream) => {
                stream.stop();
                info!("media stream stopped after {} frames", self.frames_rendered);
            }
            CaptureState::Pending(_) => debug!("acquisition abandoned"),
            CaptureState::Unsupported => self.state = CaptureState::Unsupported,
            CaptureState::Failed => self.state = CaptureState::Failed,
            CaptureState::Stopped => {}
        }
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    pub fn config(&self) -> &InstacamConfig {
        &self.config
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    /// Current derived style of the surface
    pub fn style(&self) -> &Style {
        &self.style
    }

    fn restyle(&mut self) -> &Style {
        self.style = self.config.presentation.style();
        self.surface.apply_style(&self.style);
        debug!("style recomputed: '{}'", self.style.filter_css());
        &self.style
    }

    // snapshots

    /// The whole visible surface
    pub fn snap(&self) -> ImageFrame {
        self.surface.pixels().clone()
    }

    /// A rectangle of the visible surface, parts outside of it are
    /// transparent black. The rectangle must be non-empty and fit in a frame
    /// buffer.
    pub fn snap_region(&self, left: i64, top: i64, width: i64, height: i64) -> Result<ImageFrame> {
        let area = usize::try_from(width)
            .ok()
            .zip(usize::try_from(height).ok())
            .filter(|&(w, h)| w > 0 && h > 0 && ImageFrame::byte_len(w, h).is_some());
        match area {
            Some((w, h)) => self.surface.pixels().region(left, top, w, h),
            None => Err(InstacamError::InvalidSnapArea { width, height }),
        }
    }

    /// The visible surface encoded as a `data:` URI
    pub fn save(&self, format: ExportFormat, quality: f64) -> Result<String> {
        export::data_uri(self.surface.pixels(), format, quality)
    }

    /// The visible surface encoded as `format`
    pub fn export(&self, format: ExportFormat, quality: f64) -> Result<Vec<u8>> {
        export::encode(self.surface.pixels(), format, quality)
    }

    // presentation parameters

    pub fn opacity(&self) -> f64 {
        self.config.presentation.opacity
    }

    pub fn set_opacity(&mut self, opacity: f64) -> Result<&Style> {
        self.config.presentation.set_opacity(opacity)?;
        Ok(self.restyle())
    }

    pub fn brightness(&self) -> f64 {
        self.config.presentation.brightness
    }

    pub fn set_brightness(&mut self, brightness: f64) -> Result<&Style> {
        self.config.presentation.set_brightness(brightness)?;
        Ok(self.restyle())
    }

    pub fn contrast(&self) -> f64 {
        self.config.presentation.contrast
    }

    pub fn set_contrast(&mut self, contrast: f64) -> Result<&Style> {
        self.config.presentation.set_contrast(contrast)?;
        Ok(self.restyle())
    }

    pub fn saturation(&self) -> f64 {
        self.config.presentation.saturation
    }

    pub fn set_saturation(&mut self, saturation: f64) -> Result<&Style> {
        self.config.presentation.set_saturation(saturation)?;
        Ok(self.restyle())
    }

    pub fn hue(&self) -> f64 {
        self.config.presentation.hue
    }

    pub fn set_hue(&mut self, hue: f64) -> Result<&Style> {
        self.config.presentation.set_hue(hue)?;
        Ok(self.restyle())
    }

    pub fn invert(&self) -> f64 {
        self.config.presentation.invert
    }

    pub fn set_invert(&mut self, invert: f64) -> Result<&Style> {
        self.config.presentation.set_invert(invert)?;
        Ok(self.restyle())
    }

    pub fn grayscale(&self) -> f64 {
        self.config.presentation.grayscale
    }

    pub fn set_grayscale(&mut self, grayscale: f64) -> Result<&Style> {
        self.config.presentation.set_grayscale(grayscale)?;
        Ok(self.restyle())
    }

    pub fn sepia(&self) -> f64 {
        self.config.presentation.sepia
    }

    pub fn set_sepia(&mut self, sepia: f64) -> Result<&Style> {
        self.config.presentation.set_sepia(sepia)?;
        Ok(self.restyle())
    }

    pub fn blur(&self) -> f64 {
        self.config.presentation.blur
    }

    pub fn set_blur(&mut self, blur: f64) -> Result<&Style> {
        self.config.presentation.set_blur(blur)?;
        Ok(self.restyle())
    }

    pub fn url(&self) -> &str {
        &self.config.presentation.url
    }

    pub fn set_url(&mut self, url: impl Into<String>) -> &Style {
        self.config.presentation.url = url.into();
        self.restyle()
    }

    pub fn mirror(&self) -> bool {
        self.config.presentation.mirror
    }

    pub fn set_mirror(&mut self, mirror: bool) -> &Style {
        self.config.presentation.mirror = mirror;
        self.restyle()
    }

    /// Volume of the audio track, 0 to 100
    pub fn volume(&self) -> f64 {
        self.config.volume
    }

    pub fn set_volume(&mut self, volume: f64) -> Result<()> {
        self.config.volume = validate_volume(volume)?;
        if let CaptureState::Streaming(stream) = &mut self.state {
            if self.config.sound {
                stream.set_volume(volume / 100.0);
            }
        }
        Ok(())
    }

    pub fn blend(&self) -> Option<&Blend> {
        self.config.presentation.blend.as_ref()
    }

    /// Blends a solid color over every frame, `None` disables it
    pub fn set_blend(&mut self, blend: Option<Blend>) {
        self.config.presentation.blend = blend;
    }

    pub fn has_filter(&self) -> bool {
        self.config.filter.is_some()
    }

    /// Runs `filter` over every frame, `None` disables it
    pub fn set_filter(&mut self, filter: Option<PixelFilter>) {
        self.config.filter = filter;
    }
}

impl<S: Surface> Drop for Instacam<S> {
    fn drop(&mut self) {
        self.stop();
    }
}
