use clap::{ArgAction, Parser, ValueEnum};
use std::error::Error;
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use tracing::{error, info, warn};

use instacam::capture::{CaptureBackend, FfmpegCapture, MockCapture, PatternType};
use instacam::logging::{self, LogConfig};
use instacam::{
    presets, Blend, BlendMode, CaptureStatus, Color, ExportFormat, FrameTimer, Instacam,
    InstacamConfig, RenderLoop, TerminalSurface,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Source {
    /// camera through an ffmpeg child process
    Ffmpeg,
    /// camera through the OS API (needs the `native` feature)
    Native,
    /// synthetic test pattern
    Mock,
}

/// Streams a camera to the terminal with cosmetic filters
///
/// If you want to test without a camera, can simply use:
///
/// ```bash
/// cargo run -- --source mock --filter sobel --frames 300
/// ```
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// TOML configuration file, the flags below override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Where frames come from
    #[arg(short, long, value_enum, default_value_t = Source::Ffmpeg)]
    source: Source,

    /// Capture device (ffmpeg input name or native camera index)
    #[arg(short, long)]
    device: Option<String>,

    #[arg(long)]
    width: Option<u32>,

    #[arg(long)]
    height: Option<u32>,

    #[arg(long)]
    framerate: Option<u32>,

    /// Per-pixel filter: none, noise, grayscale, invert, threshold, sobel, pixel
    #[arg(short, long, default_value = "none")]
    filter: String,

    /// Flip the surface horizontally
    #[arg(short, long, action = ArgAction::SetTrue)]
    mirror: bool,

    #[arg(long)]
    opacity: Option<f64>,

    #[arg(long)]
    brightness: Option<f64>,

    #[arg(long)]
    contrast: Option<f64>,

    #[arg(long)]
    saturation: Option<f64>,

    /// Hue rotation in degrees
    #[arg(long)]
    hue: Option<f64>,

    #[arg(long)]
    invert: Option<f64>,

    #[arg(long)]
    grayscale: Option<f64>,

    #[arg(long)]
    sepia: Option<f64>,

    /// Blur radius in pixels
    #[arg(long)]
    blur: Option<f64>,

    /// Blend mode of the color layer (multiply, screen, overlay, ...)
    #[arg(long)]
    blend_mode: Option<BlendMode>,

    /// Color of the blend layer
    #[arg(long, default_value = "#217fcf")]
    blend_color: Color,

    /// Terminal columns
    #[arg(long, default_value_t = TerminalSurface::<io::Stdout>::DEFAULT_COLS)]
    cols: usize,

    /// Terminal rows
    #[arg(long, default_value_t = TerminalSurface::<io::Stdout>::DEFAULT_ROWS)]
    rows: usize,

    /// Display refresh rate of the render loop
    #[arg(long, default_value_t = FrameTimer::DEFAULT_REFRESH_RATE)]
    refresh: u32,

    /// Stop after this many rendered frames (runs until interrupted otherwise)
    #[arg(long)]
    frames: Option<u64>,

    /// Save the last frame to this file on exit
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Snapshot format, guessed from the file extension when omitted
    #[arg(long)]
    format: Option<ExportFormat>,

    /// Snapshot quality (0..1, JPEG only)
    #[arg(long, default_value_t = 0.92)]
    quality: f64,

    /// Log file path, logs go to stderr when omitted
    #[arg(short, long)]
    log_file: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, action = ArgAction::SetTrue)]
    verbose: bool,
}

impl Args {
    /// Loads the configuration file and applies the flags on top of it
    fn config(&self) -> Result<InstacamConfig, Box<dyn Error>> {
        let mut config = match &self.config {
            Some(path) => InstacamConfig::load(path)?,
            None => InstacamConfig::default(),
        };

        if let Some(width) = self.width {
            config.width = width;
        }
        if let Some(height) = self.height {
            config.height = height;
        }
        if let Some(framerate) = self.framerate {
            config.framerate = framerate;
        }

        let p = &mut config.presentation;
        p.mirror |= self.mirror;
        let overrides = [
            (self.opacity, &mut p.opacity),
            (self.brightness, &mut p.brightness),
            (self.contrast, &mut p.contrast),
            (self.saturation, &mut p.saturation),
            (self.hue, &mut p.hue),
            (self.invert, &mut p.invert),
            (self.grayscale, &mut p.grayscale),
            (self.sepia, &mut p.sepia),
            (self.blur, &mut p.blur),
        ];
        for (value, field) in overrides {
            if let Some(value) = value {
                *field = value;
            }
        }
        if let Some(mode) = self.blend_mode {
            p.blend = Some(Blend::new(mode, self.blend_color));
        }

        config.filter = presets::by_name(&self.filter)
            .ok_or_else(|| format!("unknown filter '{}'", self.filter))?;

        Ok(config
            .on_done(|| info!("camera ready"))
            .on_fail(|e| error!("camera unavailable: {}", e))
            .on_unsupported(|| warn!("this platform cannot capture a camera")))
    }

    fn snapshot_format(&self, path: &Path) -> Result<ExportFormat, Box<dyn Error>> {
        if let Some(format) = self.format {
            return Ok(format);
        }
        let ext = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("png");
        Ok(ext.parse()?)
    }
}

/// Renders until the frame budget is spent, the camera fails or the loop
/// ends, then writes the optional snapshot
fn run<B>(args: &Args, config: InstacamConfig, backend: B) -> Result<(), Box<dyn Error>>
where
    B: CaptureBackend + 'static,
{
    let surface = TerminalSurface::new(io::stdout(), args.cols, args.rows);
    let camera = Instacam::new(surface, backend, config)?;
    let render = RenderLoop::start(camera, FrameTimer::new(args.refresh))?;

    loop {
        thread::sleep(Duration::from_millis(50));

        if !render.is_running() {
            break;
        }
        let (status, frames) = {
            let camera = render.camera();
            (camera.status(), camera.frames_rendered())
        };
        if matches!(status, CaptureStatus::Failed | CaptureStatus::Unsupported) {
            break;
        }
        if args.frames.is_some_and(|limit| frames >= limit) {
            break;
        }
    }

    let failure = render.take_error();
    let camera = render.stop()?;
    if let Some(e) = failure {
        return Err(e.into());
    }
    if camera.status() == CaptureStatus::Failed {
        return Err("no camera stream".into());
    }

    info!("{} frames rendered", camera.frames_rendered());

    if let Some(path) = &args.snapshot {
        let format = args.snapshot_format(path)?;
        std::fs::write(path, camera.export(format, args.quality)?)?;
        info!("snapshot saved to {}", path.display());
    }

    Ok(())
}

/// Entry point of the terminal camera preview.
///
/// Draws on stdout, so logs go to stderr or to `--log-file`.
fn main() -> Result<(), Box<dyn Error>> {
    // Parse command line arguments
    let args = Args::parse();

    logging::init(&LogConfig {
        log_file: args.log_file.clone(),
        verbose: args.verbose,
    })?;

    let config = args.config()?;

    match args.source {
        Source::Ffmpeg => {
            let backend = match &args.device {
                Some(device) => FfmpegCapture::with_device(device.clone()),
                None => FfmpegCapture::new(),
            };
            run(&args, config, backend)
        }
        Source::Mock => run(&args, config, MockCapture::new(PatternType::Checkerboard)),
        #[cfg(feature = "native")]
        Source::Native => {
            let index = match &args.device {
                Some(device) => device.parse()?,
                None => 0,
            };
            run(&args, config, instacam::capture::NativeCapture::new(index))
        }
        #[cfg(not(feature = "native"))]
        Source::Native => Err("built without the `native` feature".into()),
    }
}
