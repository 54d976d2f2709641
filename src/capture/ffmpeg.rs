use std::ffi::OsString;
use std::io::{BufReader, Read};
use std::process::{Child, ChildStdout, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, SyncSender};
use std::sync::{Arc, OnceLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info, warn};

use super::{CaptureBackend, FrameSlot, MediaConstraints, MediaStream, VideoConstraints};
use crate::error::{InstacamError, Result};
use crate::frame::ImageFrame;

const RGB_BYTES_PER_PIXEL: usize = 3;

/// How long ffmpeg gets to open the device and deliver its first frame
pub const DEFAULT_STARTUP_TIMEOUT: Duration = Duration::from_secs(10);

/// Captures the camera through an `ffmpeg` child process that writes raw
/// `rgb24` frames to its stdout.
///
/// Acquisition succeeds once the first frame has been read, so a missing
/// device or a refused permission ends up in the `fail` callback.
#[derive(Debug, Clone)]
pub struct FfmpegCapture {
    program: OsString,
    /// input device, the platform default when `None`
    device: Option<String>,
    startup_timeout: Duration,
    /// `ffmpeg -version` outcome, shared by clones
    version: Arc<OnceLock<std::result::Result<String, String>>>,
}

impl Default for FfmpegCapture {
    fn default() -> Self {
        Self {
            program: OsString::from("ffmpeg"),
            device: None,
            startup_timeout: DEFAULT_STARTUP_TIMEOUT,
            version: Arc::default(),
        }
    }
}

impl FfmpegCapture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_device(device: impl Into<String>) -> Self {
        Self {
            device: Some(device.into()),
            ..Self::default()
        }
    }

    /// Runs another executable in place of the `ffmpeg` found on `PATH`
    pub fn program(mut self, program: impl Into<OsString>) -> Self {
        self.program = program.into();
        self
    }

    pub fn startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = timeout;
        self
    }

    /// Determines if `ffmpeg` has been installed. Runs once per backend.
    fn probe(&self) -> Result<String> {
        self.version
            .get_or_init(|| {
                let output = Command::new(&self.program)
                    .arg("-version")
                    .output()
                    .map_err(|e| format!("ffmpeg not found or not accessible: {}", e))?;

                if !output.status.success() {
                    return Err(format!("ffmpeg -version exited with {}", output.status));
                }

                Ok(String::from_utf8_lossy(&output.stdout)
                    .lines()
                    .next()
                    .unwrap_or_default()
                    .to_string())
            })
            .clone()
            .map_err(InstacamError::Capture)
    }

    /// Determines the OS of the current system and structures the
    /// `ffmpeg` CLI with the appropriate arguments
    fn command(&self, video: &VideoConstraints) -> Result<Command> {
        let (input_format, default_device) = if cfg!(target_os = "macos") {
            ("avfoundation", "0:none")
        } else if cfg!(target_os = "linux") {
            ("v4l2", "/dev/video0")
        } else if cfg!(target_os = "windows") {
            ("dshow", "video=USB2.0 HD UVC WebCam")
        } else {
            return Err(InstacamError::Unsupported);
        };

        let device = self.device.as_deref().unwrap_or(default_device);
        let framerate = video.frame_rate.to_string();
        let size = format!("{}x{}", video.width, video.height);
        let scale = format!("scale={}:{}", video.width, video.height);

        let mut cmd = Command::new(&self.program);
        cmd.args([
            "-f",
            input_format,
            "-framerate",
            framerate.as_str(),
            "-video_size",
            size.as_str(),
        ]);
        if cfg!(target_os = "windows") {
            cmd.args(["-vcodec", "mjpeg"]);
        }
        cmd.args([
            "-i",
            device,
            // output opts
            "-vf",
            scale.as_str(),
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgb24",
            // latency opts
            "-probesize",
            "32",
            "-analyzeduration",
            "0",
            "-fflags",
            "nobuffer",
            "-flags",
            "low_delay",
            // pipe to stdout
            "pipe:1",
        ]);

        Ok(cmd)
    }
}

impl CaptureBackend for FfmpegCapture {
    /// Only the OS is checked here, the ffmpeg probe runs with `acquire` off
    /// the caller's thread
    fn is_supported(&self) -> bool {
        cfg!(any(target_os = "macos", target_os = "linux", target_os = "windows"))
    }

    fn acquire(&self, constraints: &MediaConstraints) -> Result<Box<dyn MediaStream>> {
        let video = constraints.video.ok_or_else(|| {
            InstacamError::Capture("the ffmpeg backend needs a video track".to_string())
        })?;

        if constraints.audio {
            warn!("audio is not captured by the ffmpeg backend, volume changes have no effect");
        }

        info!("ffmpeg found: {}", self.probe()?);

        let child = self
            .command(&video)?
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| InstacamError::Capture(format!("failed to spawn ffmpeg process: {}", e)))?;

        let w = video.width as usize;
        let h = video.height as usize;
        let stream = FfmpegStream::start(child, w, h, self.startup_timeout)?;

        info!("ffmpeg capture started at {}x{} {} fps", w, h, video.frame_rate);
        Ok(Box::new(stream))
    }
}

/// Reads whole frames until ffmpeg closes its stdout. The outcome of the
/// first read goes to `first`, `ended` is raised on the way out.
fn read_frames(
    stdout: ChildStdout,
    frame_size: (usize, usize),
    slot: FrameSlot,
    mut first: Option<SyncSender<std::result::Result<(), String>>>,
    ended: Arc<AtomicBool>,
) {
    let (w, h) = frame_size;
    let len = w * h * RGB_BYTES_PER_PIXEL;
    let mut reader = BufReader::with_capacity(len, stdout);
    let mut buffer = vec![0u8; len];
    let mut frames: u64 = 0;

    loop {
        if let Err(e) = reader.read_exact(&mut buffer) {
            debug!("ffmpeg stream ended after {} frames: {}", frames, e);
            if let Some(first) = first.take() {
                let _ = first.send(Err(format!("ffmpeg produced no frame: {}", e)));
            }
            break;
        }

        match ImageFrame::from_rgb(w, h, &buffer) {
            Ok(frame) => slot.publish(frame),
            Err(e) => warn!("dropping camera frame: {}", e),
        }
        if let Some(first) = first.take() {
            let _ = first.send(Ok(()));
        }
        frames += 1;
    }

    ended.store(true, Ordering::Release);
}

struct FfmpegStream {
    /// FFmpeg child process, this component actually feeds the images
    child: Child,
    slot: FrameSlot,
    reader: Option<JoinHandle<()>>,
    /// the reader hit EOF, ffmpeg is gone
    ended: Arc<AtomicBool>,
}

impl FfmpegStream {
    /// Starts the reader on `child`'s stdout and waits for the first frame
    fn start(mut child: Child, w: usize, h: usize, timeout: Duration) -> Result<Self> {
        if w.checked_mul(h)
            .and_then(|n| n.checked_mul(RGB_BYTES_PER_PIXEL))
            .is_none()
        {
            let _ = child.kill();
            let _ = child.wait();
            return Err(InstacamError::Capture(format!("{}x{} frames are too large", w, h)));
        }

        let Some(stdout) = child.stdout.take() else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(InstacamError::Capture("failed to get ffmpeg stdout".to_string()));
        };

        let slot = FrameSlot::new();
        let ended = Arc::new(AtomicBool::new(false));
        let (first_tx, first_rx) = mpsc::sync_channel(1);

        let reader_slot = slot.clone();
        let reader_ended = Arc::clone(&ended);
        let reader = match thread::Builder::new()
            .name("instacam-ffmpeg".to_string())
            .spawn(move || read_frames(stdout, (w, h), reader_slot, Some(first_tx), reader_ended))
        {
            Ok(reader) => reader,
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(e.into());
            }
        };

        let mut stream = Self {
            child,
            slot,
            reader: Some(reader),
            ended,
        };

        let failure = match first_rx.recv_timeout(timeout) {
            Ok(Ok(())) => return Ok(stream),
            Ok(Err(reason)) => reason,
            Err(RecvTimeoutError::Disconnected) => "ffmpeg reader exited".to_string(),
            Err(RecvTimeoutError::Timeout) => {
                format!("no frame from ffmpeg within {:?}", timeout)
            }
        };

        let exit = stream.child.try_wait().ok().flatten();
        stream.stop();
        Err(InstacamError::Capture(match exit {
            Some(status) => format!("{} (ffmpeg exited with {})", failure, status),
            None => failure,
        }))
    }
}

impl MediaStream for FfmpegStream {
    fn read_frame(&mut self, target: &mut ImageFrame) -> Result<bool> {
        if self.ended.load(Ordering::Acquire) {
            return Err(InstacamError::Capture("ffmpeg stream ended".to_string()));
        }
        Ok(self.slot.copy_into(target))
    }

    fn set_volume(&mut self, _volume: f64) {}

    fn stop(&mut self) {
        let Some(reader) = self.reader.take() else {
            return;
        };

        if let Err(e) = self.child.kill() {
            warn!("failed to kill ffmpeg: {}", e);
        }
        let _ = self.child.wait();
        let _ = reader.join();
        self.slot.clear();
        info!("ffmpeg capture stopped");
    }
}

impl Drop for FfmpegStream {
    fn drop(&mut self) {
        // kill ffmpeg when the stream is dropped
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_carries_constraints() {
        let video = VideoConstraints {
            width: 320,
            height: 240,
            frame_rate: 15,
            aspect_ratio: 4.0 / 3.0,
        };

        let Ok(cmd) = FfmpegCapture::with_device("cam0").command(&video) else {
            // platform without an ffmpeg input device
            return;
        };
        let args: Vec<String> = cmd
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();

        assert!(args.windows(2).any(|w| w[0] == "-framerate" && w[1] == "15"));
        assert!(args.windows(2).any(|w| w[0] == "-video_size" && w[1] == "320x240"));
        assert!(args.windows(2).any(|w| w[0] == "-i" && w[1] == "cam0"));
        assert_eq!(args.last().map(String::as_str), Some("pipe:1"));
    }

    #[test]
    fn audio_only_is_rejected() {
        let constraints = MediaConstraints {
            audio: true,
            video: None,
        };
        assert!(matches!(
            FfmpegCapture::new().acquire(&constraints),
            Err(InstacamError::Capture(_))
        ));
    }

    #[test]
    fn missing_program_fails_acquisition() {
        let capture = FfmpegCapture::new().program("instacam-no-such-ffmpeg");
        let constraints = MediaConstraints {
            audio: false,
            video: Some(VideoConstraints {
                width: 4,
                height: 4,
                frame_rate: 30,
                aspect_ratio: 1.0,
            }),
        };

        assert!(matches!(
            capture.acquire(&constraints),
            Err(InstacamError::Capture(_))
        ));
        // cached for clones
        assert!(capture.clone().probe().is_err());
    }

    #[cfg(unix)]
    fn piped(program: &str, args: &[&str]) -> Child {
        Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .spawn()
            .unwrap()
    }

    #[cfg(unix)]
    #[test]
    fn silent_exit_fails_start() {
        let child = piped("true", &[]);
        let result = FfmpegStream::start(child, 4, 4, Duration::from_secs(5));
        assert!(matches!(result, Err(InstacamError::Capture(_))));
    }

    #[cfg(unix)]
    #[test]
    fn ended_stream_reports_error() {
        // exactly one 2x2 rgb24 frame, then EOF
        let child = piped("head", &["-c", "12", "/dev/zero"]);
        let mut stream = FfmpegStream::start(child, 2, 2, Duration::from_secs(5)).unwrap();

        let mut target = ImageFrame::new(2, 2).unwrap();
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        let result = loop {
            match stream.read_frame(&mut target) {
                Ok(_) if std::time::Instant::now() < deadline => {
                    thread::sleep(Duration::from_millis(5))
                }
                other => break other,
            }
        };

        assert!(matches!(result, Err(InstacamError::Capture(_))));
        stream.stop();
    }
}
