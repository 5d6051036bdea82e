//! glyphreel - render videos into colored glyph streams and play them in the terminal
//!
//! This crate converts decoded video frames into a compact binary frame stream
//! (one glyph and one color per terminal cell), packages it with an optional
//! audio track, and plays it back in place with frame pacing and audio sync.
//! Videos can also be streamed: frames are extracted in the background and
//! consumed as soon as they appear on disk.

pub mod actions;
pub mod audio;
pub mod cli;
pub mod codec;
pub mod config;
pub mod container;
pub mod extract;
pub mod quantizer;
pub mod renderer;
pub mod scheduler;
pub mod streaming;

pub use audio::{open_clip, Clip, ExternalClip};
pub use cli::{Cli, ColorTarget, Command};
pub use codec::{
    decode_frame, decode_header, encode_frame, encode_header, FrameReader, Header, HEADER_LEN,
};
pub use config::Config;
pub use container::{pack, unpack, StreamInfo, Unpacked};
pub use quantizer::{
    quantize, quantize_image, to_ansi256, ColorMode, ColorValue, Frame, GlyphPalette,
    QuantizedPixel, Rgb,
};
pub use renderer::{render_frame, Screen};
pub use scheduler::{PlaybackScheduler, PlaybackStats, TickBudget};
pub use streaming::{FrameDirectory, Producer};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Package name
pub const PACKAGE_NAME: &str = env!("CARGO_PKG_NAME");

/// Extension of packaged glyph streams
pub const FILE_EXTENSION: &str = "glr";

/// Glyph ramp used for rendering and playback, darkest first.
///
/// Both the renderer and the player must agree on it; it is not stored in the stream.
pub const DEFAULT_GLYPHS: &str = " ._-:!?71iIca234db56O089$W%#@Ñ";

/// Error types used throughout the application
#[derive(thiserror::Error, Debug)]
pub enum GlyphreelError {
    #[error("Malformed frame stream: {0}")]
    Format(String),

    #[error(
        "The stream is rendered in {stream} mode, but playback is restricted to {requested} mode"
    )]
    ModeMismatch { stream: ColorMode, requested: ColorMode },

    #[error(
        "The stream is rendered for terminal size {stream_width}x{stream_height}, \
         but the current terminal size is {terminal_width}x{terminal_height}"
    )]
    ResolutionMismatch {
        stream_width: u32,
        stream_height: u32,
        terminal_width: u32,
        terminal_height: u32,
    },

    #[error("Outran the frame producer at frame {frame} ({})", .dir.display())]
    Outrun { frame: u64, dir: std::path::PathBuf },

    #[error("Command failed with exit code {code:?}: {command}\n{output}")]
    ProducerFailure {
        command: String,
        code: Option<i32>,
        output: String,
    },

    #[error("Audio error: {0}")]
    Audio(String),

    #[error("Container error: {0}")]
    Container(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

/// Result type alias for this crate
pub type Result<T> = std::result::Result<T, GlyphreelError>;

/// Utility functions
pub mod utils {
    /// Format an ETA in seconds the way the render progress shows it
    pub fn format_eta(seconds: u64) -> String {
        let hours = seconds / 3600;
        let minutes = (seconds % 3600) / 60;
        let secs = seconds % 60;

        if hours > 0 {
            format!("{}hrs {}min {}sec", hours, minutes, secs)
        } else if minutes > 0 {
            format!("{}min {}sec", minutes, secs)
        } else {
            format!("{}sec", secs)
        }
    }

    /// Append the stream extension to `path` when it is missing
    pub fn with_stream_extension(path: &std::path::Path) -> std::path::PathBuf {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext == super::FILE_EXTENSION => path.to_path_buf(),
            _ => {
                let mut name = path.as_os_str().to_os_string();
                name.push(".");
                name.push(super::FILE_EXTENSION);
                std::path::PathBuf::from(name)
            }
        }
    }
}

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        decode_frame, decode_header, encode_frame, encode_header, open_clip, pack, quantize,
        quantize_image, render_frame, to_ansi256, unpack, utils::*, Cli, Clip, ColorMode,
        ColorTarget, ColorValue, Command, Config, ExternalClip, Frame, FrameDirectory,
        FrameReader, GlyphPalette, GlyphreelError, Header, PlaybackScheduler, PlaybackStats,
        Producer, QuantizedPixel, Result, Rgb, Screen, StreamInfo, TickBudget, Unpacked,
        DEFAULT_GLYPHS, FILE_EXTENSION, HEADER_LEN,
    };
}
