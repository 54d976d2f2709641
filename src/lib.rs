//! Binds a live camera stream to a drawing surface.
//!
//! Frames are copied to the surface once per display refresh, optionally
//! through a per-pixel filter and a blend layer. Cosmetic parameters
//! (opacity, brightness, contrast, saturation, hue, invert, grayscale,
//! sepia, blur, mirror) restyle the surface, and the surface can be
//! snapped or exported as PNG, JPEG or WebP.

pub mod blend;
pub mod capture;
pub mod config;
pub mod error;
pub mod export;
pub mod filter;
pub mod frame;
pub mod instacam;
pub mod logging;
pub mod presentation;
pub mod presets;
pub mod render;
pub mod style;
pub mod surface;
pub mod terminal;

pub use blend::{Blend, BlendMode, Color};
pub use config::InstacamConfig;
pub use error::{InstacamError, Result};
pub use export::ExportFormat;
pub use filter::{Pixel, PixelFilter};
pub use frame::ImageFrame;
pub use instacam::{CaptureStatus, Instacam};
pub use render::{FrameTimer, RefreshClock, RenderLoop};
pub use style::{FilterTerm, Style};
pub use surface::{MemorySurface, Surface};
pub use terminal::TerminalSurface;
