//! Frame and audio extraction with the ffmpeg command line tool.
//!
//! Frames are written as `1.jpg`, `2.jpg`, ... scaled to exactly one pixel per
//! terminal cell; audio is written as a WAV file.

use crate::{GlyphreelError, Result};
use log::{debug, info};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

/// File name of the extracted soundtrack
pub const AUDIO_FILE_NAME: &str = "audio.wav";

/// Extension of extracted frame images
const FRAME_EXTENSION: &str = "jpg";

/// A frame extraction job
#[derive(Debug, Clone)]
pub struct FrameRequest {
    pub input: PathBuf,
    pub output_dir: PathBuf,
    pub fps: u8,
    pub width: u32,
    pub height: u32,
}

impl FrameRequest {
    fn args(&self) -> Vec<OsString> {
        let mut pattern = self.output_dir.clone().into_os_string();
        pattern.push(format!("{}%d.{}", std::path::MAIN_SEPARATOR, FRAME_EXTENSION));

        vec![
            "-y".into(),
            "-i".into(),
            self.input.clone().into_os_string(),
            "-r".into(),
            self.fps.to_string().into(),
            "-an".into(),
            "-vf".into(),
            format!("scale={}:{}", self.width, self.height).into(),
            "-pix_fmt".into(),
            "yuvj420p".into(),
            "-q:v".into(),
            "1".into(),
            "-loglevel".into(),
            "warning".into(),
            pattern,
        ]
    }
}

fn audio_args(input: &Path, output: &Path) -> Vec<OsString> {
    vec![
        "-y".into(),
        "-i".into(),
        input.as_os_str().to_os_string(),
        "-map".into(),
        "0:a:0".into(),
        "-loglevel".into(),
        "warning".into(),
        output.as_os_str().to_os_string(),
    ]
}

/// Path of the frame file with the given 1-based index
pub fn frame_path(dir: &Path, index: u64) -> PathBuf {
    dir.join(format!("{}.{}", index, FRAME_EXTENSION))
}

/// Number of extracted frames: the highest frame index present in `dir`
pub fn count_frames(dir: &Path) -> Result<u64> {
    let mut highest = 0;
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some(FRAME_EXTENSION) {
            continue;
        }
        if let Some(index) = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .and_then(|stem| stem.parse::<u64>().ok())
        {
            highest = highest.max(index);
        }
    }
    Ok(highest)
}

/// Extract frames, blocking the calling task until ffmpeg exits
pub async fn extract_frames(ffmpeg: &str, request: &FrameRequest) -> Result<()> {
    info!("Extracting frames using {}...", ffmpeg);
    run(ffmpeg, request.args()).await?;
    info!("Frames extracted ({})", request.output_dir.display());
    Ok(())
}

/// Extract the first audio track of `input` into `output`
pub async fn extract_audio(ffmpeg: &str, input: &Path, output: &Path) -> Result<()> {
    info!("Extracting audio using {}...", ffmpeg);
    run(ffmpeg, audio_args(input, output)).await?;
    info!("Audio extracted ({})", output.display());
    Ok(())
}

/// Run a command to completion, failing with its captured output on a nonzero exit
async fn run(program: &str, args: Vec<OsString>) -> Result<()> {
    let command_line = std::iter::once(program.to_string())
        .chain(args.iter().map(|arg| arg.to_string_lossy().into_owned()))
        .collect::<Vec<_>>()
        .join(" ");
    debug!("$ {}", command_line);

    let output = Command::new(program)
        .args(&args)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| GlyphreelError::ProducerFailure {
            command: command_line.clone(),
            code: None,
            output: format!("could not execute: {}", e),
        })?;

    if !output.status.success() {
        let mut log = String::from_utf8_lossy(&output.stdout).into_owned();
        log.push_str(&String::from_utf8_lossy(&output.stderr));
        return Err(GlyphreelError::ProducerFailure {
            command: command_line,
            code: output.status.code(),
            output: log.trim_end().replace('\n', "\n\t"),
        });
    }

    Ok(())
}
