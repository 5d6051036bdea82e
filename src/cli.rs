use std::path::PathBuf;
use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Restrict output to the 256-color palette instead of truecolor
    #[arg(long = "256", global = true)]
    pub ansi256: bool,

    /// Temporary working directory (wiped on every run)
    #[arg(long, value_name = "DIR", global = true)]
    pub tmp: Option<PathBuf>,

    /// ffmpeg executable used to extract frames and audio
    #[arg(long, value_name = "EXE", default_value = "ffmpeg", global = true)]
    pub ffmpeg: String,

    /// Audio player executable used to play the soundtrack
    #[arg(long, value_name = "EXE", default_value = "ffplay", global = true)]
    pub ffplay: String,

    /// Set terminal width (override automatic detection)
    #[arg(long, global = true)]
    pub width: Option<u32>,

    /// Set terminal height (override automatic detection)
    #[arg(long, global = true)]
    pub height: Option<u32>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Render a video into a glyph stream file
    Render(RenderArgs),
    /// Play a rendered glyph stream file
    Play(PlayArgs),
    /// Play a video directly, rendering frames while playing
    Stream(StreamArgs),
    /// Print the stream header of a rendered file as JSON
    Inspect(InspectArgs),
}

#[derive(Args, Debug)]
pub struct RenderArgs {
    /// Video file to render
    #[arg(short, long)]
    pub input: PathBuf,

    /// Output file (the .glr extension is appended when missing)
    #[arg(short, long)]
    pub output: PathBuf,

    /// Frames extracted per second of video
    #[arg(long, default_value_t = 30, value_parser = clap::value_parser!(u8).range(1..))]
    pub fps: u8,

    /// Overwrite the output file if it exists
    #[arg(long)]
    pub force: bool,

    /// Do not include the audio track
    #[arg(long)]
    pub no_audio: bool,
}

#[derive(Args, Debug)]
pub struct PlayArgs {
    /// Rendered .glr file to play
    #[arg(short, long)]
    pub input: PathBuf,

    /// Play even when the stream was rendered for another terminal size
    #[arg(long)]
    pub ignore_resolution: bool,

    #[command(flatten)]
    pub audio: AudioArgs,

    /// What part of each cell is colored
    #[arg(long, value_enum, default_value = "text-only")]
    pub color: ColorTarget,
}

#[derive(Args, Debug)]
pub struct StreamArgs {
    /// Video file to stream
    #[arg(short, long)]
    pub input: PathBuf,

    /// Frames extracted and played per second
    #[arg(long, default_value_t = 25, value_parser = clap::value_parser!(u8).range(1..))]
    pub fps: u8,

    #[command(flatten)]
    pub audio: AudioArgs,

    /// What part of each cell is colored
    #[arg(long, value_enum, default_value = "text-only")]
    pub color: ColorTarget,
}

#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Rendered .glr file to inspect
    #[arg(short, long)]
    pub input: PathBuf,
}

#[derive(Args, Debug, Clone, Copy)]
pub struct AudioArgs {
    /// Play without sound
    #[arg(long, conflicts_with = "require_audio")]
    pub no_audio: bool,

    /// Fail instead of playing silently when audio cannot be played
    #[arg(long)]
    pub require_audio: bool,
}

/// How strictly playback needs its soundtrack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioPolicy {
    Off,
    Optional,
    Required,
}

impl AudioArgs {
    pub fn policy(&self) -> AudioPolicy {
        if self.no_audio {
            AudioPolicy::Off
        } else if self.require_audio {
            AudioPolicy::Required
        } else {
            AudioPolicy::Optional
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColorTarget {
    /// Color the glyphs
    TextOnly,
    /// Color the cell background and print no glyphs
    HighlightOnly,
    /// Color the cell background and print black glyphs
    BlackText,
}

impl Cli {
    /// Validate command line arguments
    pub fn validate(&self) -> Result<(), String> {
        let input = match &self.command {
            Command::Render(args) => &args.input,
            Command::Play(args) => &args.input,
            Command::Stream(args) => &args.input,
            Command::Inspect(args) => &args.input,
        };
        if !input.exists() {
            return Err(format!("Input file does not exist: {}", input.display()));
        }

        let needs_stream = matches!(self.command, Command::Play(_) | Command::Inspect(_));
        if needs_stream && !has_stream_extension(input) {
            return Err(format!(
                "Input file is not a .{} file: {}",
                crate::FILE_EXTENSION,
                input.display()
            ));
        }

        if self.width == Some(0) {
            return Err("Terminal width must be greater than 0".to_string());
        }
        if self.height == Some(0) {
            return Err("Terminal height must be greater than 0".to_string());
        }

        Ok(())
    }

    /// Get effective terminal dimensions.
    ///
    /// The last detected row is left free so printing a full frame never scrolls.
    pub fn get_terminal_size(&self) -> Result<(u32, u32), std::io::Error> {
        match (self.width, self.height) {
            (Some(w), Some(h)) => Ok((w, h)),
            (w, h) => {
                let (cols, rows) = crossterm::terminal::size()?;
                Ok((
                    w.unwrap_or(cols as u32),
                    h.unwrap_or((rows as u32).saturating_sub(1).max(1)),
                ))
            }
        }
    }
}

fn has_stream_extension(path: &std::path::Path) -> bool {
    path.extension().and_then(|ext| ext.to_str()) == Some(crate::FILE_EXTENSION)
}
