use thiserror::Error;

pub type Result<T> = std::result::Result<T, InstacamError>;

#[derive(Debug, Error)]
pub enum InstacamError {
    /// The capture backend cannot run on this platform
    #[error("camera capture is not supported on this platform")]
    Unsupported,

    /// The visible surface cannot be used for presenting frames
    #[error("invalid surface: {0}")]
    InvalidSurface(String),

    /// A configuration or presentation value was rejected
    #[error("invalid {property}: {reason}")]
    InvalidProperty {
        property: &'static str,
        reason: String,
    },

    /// Acquiring the media stream failed (permission denied, no device, ...)
    #[error("failed to capture the media stream: {0}")]
    Capture(String),

    /// A per-pixel filter returned something that is not a pixel
    #[error(
        "invalid filter result at pixel ({x}, {y}), a filter must return finite [red, green, blue, alpha] values"
    )]
    MalformedFilter { x: u32, y: u32 },

    #[error("invalid snap area {width}x{height}, it must be non-empty and fit in a frame buffer")]
    InvalidSnapArea { width: i64, height: i64 },

    #[error("unsupported export format: {0}")]
    UnsupportedFormat(String),

    #[error("failed to encode image: {0}")]
    Encode(#[from] image::ImageError),

    #[error("failed to parse configuration: {0}")]
    Config(#[from] toml::de::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("render loop failure: {0}")]
    RenderLoop(String),
}

impl InstacamError {
    pub(crate) fn property(property: &'static str, reason: impl Into<String>) -> Self {
        InstacamError::InvalidProperty {
            property,
            reason: reason.into(),
        }
    }
}
