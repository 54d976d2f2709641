use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::capture::{MediaConstraints, VideoConstraints};
use crate::error::{InstacamError, Result};
use crate::filter::PixelFilter;
use crate::presentation::{non_negative, within, Presentation};

type DoneFn = dyn FnMut() + Send;
type FailFn = dyn FnMut(&InstacamError) + Send;

/// Lifecycle callbacks of the capture acquisition
#[derive(Default)]
pub struct Callbacks {
    /// the stream is captured and bound to the surface
    pub done: Option<Box<DoneFn>>,
    /// the stream could not be captured
    pub fail: Option<Box<FailFn>>,
    /// the platform cannot capture at all
    pub unsupported: Option<Box<DoneFn>>,
}

impl fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Callbacks")
            .field("done", &self.done.is_some())
            .field("fail", &self.fail.is_some())
            .field("unsupported", &self.unsupported.is_some())
            .finish()
    }
}

/// Everything an `Instacam` is configured with.
///
/// The serializable part can be loaded from TOML, missing keys take the
/// defaults:
///
/// ```
/// use instacam::config::InstacamConfig;
///
/// let config = InstacamConfig::from_toml_str(r##"
///     width = 640
///     height = 480
///     mirror = true
///     sepia = 0.5
///
///     [blend]
///     mode = "multiply"
///     color = "#217fcf"
/// "##).unwrap();
///
/// assert_eq!(config.framerate, 30);
/// assert_eq!(config.presentation.sepia, 0.5);
/// ```
#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct InstacamConfig {
    /// width of the surface and of the requested video track
    pub width: u32,
    /// height of the surface and of the requested video track
    pub height: u32,
    /// request a video track
    pub camera: bool,
    /// requested frame rate of the video track
    pub framerate: u32,
    /// requested aspect ratio of the video track
    pub ratio: f64,
    /// request an audio track
    pub sound: bool,
    /// [0..100] volume of the audio track
    pub volume: f64,
    #[serde(flatten)]
    pub presentation: Presentation,
    #[serde(skip)]
    pub filter: Option<PixelFilter>,
    #[serde(skip)]
    pub callbacks: Callbacks,
}

impl Default for InstacamConfig {
    fn default() -> Self {
        Self {
            width: Self::DEFAULT_WIDTH,
            height: Self::DEFAULT_HEIGHT,
            camera: true,
            framerate: Self::DEFAULT_FRAMERATE,
            ratio: Self::DEFAULT_RATIO,
            sound: false,
            volume: Self::DEFAULT_VOLUME,
            presentation: Presentation::default(),
            filter: None,
            callbacks: Callbacks::default(),
        }
    }
}

impl InstacamConfig {
    pub const DEFAULT_WIDTH: u32 = 400;
    pub const DEFAULT_HEIGHT: u32 = 300;
    pub const DEFAULT_FRAMERATE: u32 = 30;
    pub const DEFAULT_RATIO: f64 = 4.0 / 3.0;
    pub const DEFAULT_VOLUME: f64 = 100.0;

    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn with_filter(mut self, filter: impl Into<PixelFilter>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn on_done(mut self, f: impl FnMut() + Send + 'static) -> Self {
        self.callbacks.done = Some(Box::new(f));
        self
    }

    pub fn on_fail(mut self, f: impl FnMut(&InstacamError) + Send + 'static) -> Self {
        self.callbacks.fail = Some(Box::new(f));
        self
    }

    pub fn on_unsupported(mut self, f: impl FnMut() + Send + 'static) -> Self {
        self.callbacks.unsupported = Some(Box::new(f));
        self
    }

    /// Checks every field, reporting the first one out of range
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 {
            return Err(InstacamError::property("width", "expected a positive number, got 0"));
        }
        if self.height == 0 {
            return Err(InstacamError::property("height", "expected a positive number, got 0"));
        }
        if self.framerate == 0 {
            return Err(InstacamError::property("framerate", "expected a positive number, got 0"));
        }
        if non_negative("ratio", self.ratio)? == 0.0 {
            return Err(InstacamError::property("ratio", "expected a positive number, got 0"));
        }
        validate_volume(self.volume)?;
        self.presentation.validate()
    }

    /// Audio / video constraints handed to the capture backend
    pub fn constraints(&self) -> MediaConstraints {
        MediaConstraints {
            audio: self.sound,
            video: self.camera.then(|| VideoConstraints {
                width: self.width,
                height: self.height,
                frame_rate: self.framerate,
                aspect_ratio: self.ratio,
            }),
        }
    }
}

pub(crate) fn validate_volume(volume: f64) -> Result<f64> {
    within("volume", volume, 0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blend::{BlendMode, Color};

    #[test]
    fn defaults_are_valid() {
        let config = InstacamConfig::default();
        config.validate().unwrap();
        assert_eq!((config.width, config.height), (400, 300));
        assert_eq!(config.framerate, 30);
        assert!(config.camera);
        assert!(!config.sound);
        assert_eq!(config.volume, 100.0);
    }

    #[test]
    fn loads_flat_toml() {
        let config = InstacamConfig::from_toml_str(
            r##"
            width = 640
            height = 480
            sound = true
            volume = 40
            brightness = 1.5
            url = "#wave"

            [blend]
            mode = "color-burn"
            color = "#fff"
            "##,
        )
        .unwrap();

        assert_eq!(config.width, 640);
        assert!(config.sound);
        assert_eq!(config.volume, 40.0);
        assert_eq!(config.presentation.brightness, 1.5);
        assert_eq!(config.presentation.url, "#wave");
        let blend = config.presentation.blend.unwrap();
        assert_eq!(blend.mode, BlendMode::ColorBurn);
        assert_eq!(blend.color, Color::new(255, 255, 255));
    }

    #[test]
    fn rejects_bad_values() {
        let config = InstacamConfig {
            volume: 101.0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(InstacamError::InvalidProperty { property: "volume", .. })
        ));

        let config = InstacamConfig {
            width: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = InstacamConfig {
            ratio: f64::NAN,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        assert!(InstacamConfig::from_toml_str("width = \"wide\"").is_err());
    }

    #[test]
    fn constraints_follow_flags() {
        let mut config = InstacamConfig::default();
        let constraints = config.constraints();
        assert!(!constraints.audio);
        assert_eq!(constraints.video.unwrap().frame_rate, 30);

        config.camera = false;
        config.sound = true;
        let constraints = config.constraints();
        assert!(constraints.audio);
        assert!(constraints.video.is_none());
    }
}
