use crate::cli::Cli;
use crate::quantizer::{ColorMode, GlyphPalette};
use crate::{GlyphreelError, Result};
use log::debug;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the default temporary directory under the system temp dir
const TMP_DIR_NAME: &str = "glyphreel";

/// Runtime configuration, built once at startup and passed by reference
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    /// Terminal width in cells
    pub terminal_width: u32,
    /// Usable terminal height in cells
    pub terminal_height: u32,
    /// Color fidelity used for rendering, streaming and as the playback capability
    pub color_mode: ColorMode,
    /// Temporary working directory
    pub tmp_dir: PathBuf,
    /// ffmpeg executable
    pub ffmpeg: String,
    /// Audio player executable
    pub ffplay: String,
    /// Glyphs shared by rendering and playback
    pub palette: GlyphPalette,
}

/// Subdirectories of the temporary working directory
#[derive(Debug, Clone)]
pub struct Workspace {
    /// Extracted frames, extracted audio and the rendered stream
    pub render: PathBuf,
    /// Unpacked stream and audio for playback
    pub play: PathBuf,
}

impl Config {
    /// Build the configuration from parsed arguments, detecting the terminal size
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let (terminal_width, terminal_height) = cli.get_terminal_size()?;
        let color_mode = if cli.ansi256 {
            ColorMode::Ansi256
        } else {
            ColorMode::Truecolor
        };

        let config = Self {
            terminal_width,
            terminal_height,
            color_mode,
            tmp_dir: cli
                .tmp
                .clone()
                .unwrap_or_else(|| std::env::temp_dir().join(TMP_DIR_NAME)),
            ffmpeg: cli.ffmpeg.clone(),
            ffplay: cli.ffplay.clone(),
            palette: GlyphPalette::default(),
        };

        debug!(
            "Configuration: {}",
            serde_json::to_string(&config).unwrap_or_else(|e| format!("<unserializable: {}>", e))
        );
        Ok(config)
    }

    /// Terminal size as `(width, height)`
    pub fn terminal_size(&self) -> (u32, u32) {
        (self.terminal_width, self.terminal_height)
    }

    /// Wipe and recreate the temporary directory with its subdirectories
    pub fn prepare_workspace(&self) -> Result<Workspace> {
        prepare_workspace(&self.tmp_dir)
    }
}

fn prepare_workspace(root: &Path) -> Result<Workspace> {
    if root.exists() {
        fs::remove_dir_all(root).map_err(|e| {
            GlyphreelError::InvalidConfig(format!(
                "could not delete temporary directory {}: {}",
                root.display(),
                e
            ))
        })?;
    }

    let workspace = Workspace {
        render: root.join("render"),
        play: root.join("play"),
    };
    for dir in [&workspace.render, &workspace.play] {
        fs::create_dir_all(dir).map_err(|e| {
            GlyphreelError::InvalidConfig(format!(
                "could not create temporary directory {}: {}",
                dir.display(),
                e
            ))
        })?;
    }

    debug!("Temporary workspace prepared at {}", root.display());
    Ok(workspace)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_from_cli() {
        let cli = Cli::try_parse_from([
            "glyphreel", "--256", "--width", "100", "--height", "30", "--tmp", "/tmp/x",
            "--ffmpeg", "/opt/ffmpeg",
            "inspect", "-i", "a.glr",
        ])
        .unwrap();
        let config = Config::from_cli(&cli).unwrap();

        assert_eq!(config.terminal_size(), (100, 30));
        assert_eq!(config.color_mode, ColorMode::Ansi256);
        assert_eq!(config.tmp_dir, PathBuf::from("/tmp/x"));
        assert_eq!(config.ffmpeg, "/opt/ffmpeg");
        assert_eq!(config.ffplay, "ffplay");
    }

    #[test]
    fn test_prepare_workspace_wipes_previous_run() {
        let root = tempfile::tempdir().unwrap();
        let tmp = root.path().join("work");
        fs::create_dir_all(tmp.join("render")).unwrap();
        fs::write(tmp.join("render").join("1.jpg"), b"stale").unwrap();

        let workspace = prepare_workspace(&tmp).unwrap();

        assert!(workspace.render.is_dir());
        assert!(workspace.play.is_dir());
        assert!(!workspace.render.join("1.jpg").exists());
    }
}
