//! Packaged glyph stream: a tar archive with the frame stream and an optional soundtrack.

use crate::codec::{decode_header, Header, HEADER_LEN};
use crate::{GlyphreelError, Result};
use log::{debug, info};
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Archive entry holding the header and frame records
pub const VIDEO_ENTRY: &str = "video.dat";

/// Archive entry holding the raw WAV soundtrack
pub const AUDIO_ENTRY: &str = "audio.wav";

/// Files extracted from a container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unpacked {
    pub video: PathBuf,
    pub audio: Option<PathBuf>,
}

/// Package `video` and the optional `audio` file into `output`.
///
/// An existing output is only replaced when `overwrite` is set.
pub fn pack(video: &Path, audio: Option<&Path>, output: &Path, overwrite: bool) -> Result<()> {
    if output.exists() {
        if !overwrite {
            return Err(GlyphreelError::Container(format!(
                "output file {} already exists, use --force to overwrite it",
                output.display()
            )));
        }
        fs::remove_file(output)?;
        debug!("Removed existing output {}", output.display());
    }

    let mut builder = tar::Builder::new(BufWriter::new(File::create(output)?));
    builder.append_path_with_name(video, VIDEO_ENTRY)?;
    if let Some(audio) = audio {
        builder.append_path_with_name(audio, AUDIO_ENTRY)?;
    }
    builder.into_inner()?.flush()?;

    info!(
        "Packed {}{} into {}",
        video.display(),
        audio.map(|a| format!(" and {}", a.display())).unwrap_or_default(),
        output.display()
    );
    Ok(())
}

/// Extract a container into `dir`; the soundtrack is skipped unless `with_audio` is set
pub fn unpack(input: &Path, dir: &Path, with_audio: bool) -> Result<Unpacked> {
    let mut archive = tar::Archive::new(File::open(input)?);
    let mut video = None;
    let mut audio = None;

    for entry in archive.entries()? {
        let mut entry = entry?;
        let name = entry.path()?.to_string_lossy().into_owned();
        match name.as_str() {
            VIDEO_ENTRY => {
                let dest = dir.join(VIDEO_ENTRY);
                entry.unpack(&dest)?;
                video = Some(dest);
            }
            AUDIO_ENTRY if with_audio => {
                let dest = dir.join(AUDIO_ENTRY);
                entry.unpack(&dest)?;
                audio = Some(dest);
            }
            other => debug!("Skipping container entry {}", other),
        }
    }

    let video = video.ok_or_else(|| {
        GlyphreelError::Container(format!("{} has no {} entry", input.display(), VIDEO_ENTRY))
    })?;
    Ok(Unpacked { video, audio })
}

/// Summary of a packaged stream
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamInfo {
    pub header: Header,
    pub frames: u64,
    pub duration_secs: f64,
    pub has_audio: bool,
}

/// Read the stream header and sizes of a container without unpacking it
pub fn inspect(input: &Path) -> Result<StreamInfo> {
    let mut archive = tar::Archive::new(File::open(input)?);
    let mut video = None;
    let mut has_audio = false;

    for entry in archive.entries()? {
        let mut entry = entry?;
        let name = entry.path()?.to_string_lossy().into_owned();
        if name == VIDEO_ENTRY {
            let size = entry.header().size()?;
            let header = decode_header(&mut entry)?;
            video = Some((header, size));
        } else if name == AUDIO_ENTRY {
            has_audio = true;
        }
    }

    let (header, size) = video.ok_or_else(|| {
        GlyphreelError::Container(format!("{} has no {} entry", input.display(), VIDEO_ENTRY))
    })?;
    let frame_len = header.frame_len()? as u64;
    let frames = if frame_len == 0 {
        0
    } else {
        size.saturating_sub(HEADER_LEN as u64) / frame_len
    };

    Ok(StreamInfo {
        header,
        frames,
        duration_secs: frames as f64 / header.fps as f64,
        has_audio,
    })
}
