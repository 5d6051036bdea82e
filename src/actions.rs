//! Top-level commands: render, play, stream and inspect.

use crate::audio::{open_clip, ExternalClip};
use crate::cli::{AudioPolicy, PlayArgs, RenderArgs, StreamArgs};
use crate::codec::{decode_header, encode_frame, encode_header, FrameReader};
use crate::config::Config;
use crate::container::{self, pack, unpack, StreamInfo, VIDEO_ENTRY};
use crate::extract::{
    count_frames, extract_audio, extract_frames, frame_path, FrameRequest, AUDIO_FILE_NAME,
};
use crate::quantizer::quantize_image;
use crate::renderer::Screen;
use crate::scheduler::{PlaybackScheduler, PlaybackStats};
use crate::streaming::{FrameDirectory, Producer, PRODUCER_HEAD_START};
use crate::utils::{format_eta, with_stream_extension};
use crate::{GlyphreelError, Result};
use indicatif::{ProgressBar, ProgressState, ProgressStyle};
use log::{debug, info, warn};
use std::fmt::Write as _;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;

/// Render a video into a packaged glyph stream
pub async fn render(config: &Config, args: &RenderArgs) -> Result<()> {
    let output = with_stream_extension(&args.output);
    if output != args.output {
        warn!("Output file path changed to {}", output.display());
    }
    if output.exists() && !args.force {
        return Err(GlyphreelError::Container(format!(
            "output file {} already exists, use --force to overwrite it",
            output.display()
        )));
    }

    let workspace = config.prepare_workspace()?;

    let audio = if args.no_audio {
        None
    } else {
        let path = workspace.render.join(AUDIO_FILE_NAME);
        match extract_audio(&config.ffmpeg, &args.input, &path).await {
            Ok(()) => Some(path),
            Err(e) => {
                warn!("Rendering without audio: {}", e);
                None
            }
        }
    };

    let request = FrameRequest {
        input: args.input.clone(),
        output_dir: workspace.render.clone(),
        fps: args.fps,
        width: config.terminal_width,
        height: config.terminal_height,
    };
    extract_frames(&config.ffmpeg, &request).await?;

    let frame_count = count_frames(&workspace.render)?;
    if frame_count == 0 {
        return Err(GlyphreelError::Format(format!(
            "no frames were extracted from {}",
            args.input.display()
        )));
    }

    let video = workspace.render.join(VIDEO_ENTRY);
    encode_frames(config, &workspace.render, frame_count, args.fps, &video)?;

    info!("Packing...");
    pack(&video, audio.as_deref(), &output, args.force)?;
    info!("Done! The output file is located at {}", output.display());
    Ok(())
}

fn progress_bar(len: u64) -> ProgressBar {
    let style = ProgressStyle::default_bar()
        .template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) \
             ETA {eta_text}",
        )
        .map(|style| {
            style
                .with_key("eta_text", |state: &ProgressState, w: &mut dyn std::fmt::Write| {
                    let _ = write!(w, "{}", format_eta(state.eta().as_secs()));
                })
                .progress_chars("#>-")
        })
        .unwrap_or_else(|_| ProgressStyle::default_bar());

    let bar = ProgressBar::new(len);
    bar.set_style(style);
    bar
}

/// Quantize the extracted frame images and write them as one stream
fn encode_frames(
    config: &Config,
    dir: &Path,
    frame_count: u64,
    fps: u8,
    video: &Path,
) -> Result<()> {
    let (width, height) = config.terminal_size();
    let mut writer = BufWriter::new(File::create(video)?);
    writer.write_all(&encode_header(fps, width, height, config.color_mode))?;

    info!("Rendering {} frames...", frame_count);
    let bar = progress_bar(frame_count);
    for index in 1..=frame_count {
        let image = image::open(frame_path(dir, index))?.to_rgb8();
        if image.dimensions() != (width, height) {
            return Err(GlyphreelError::Format(format!(
                "frame {} is {}x{}, expected {}x{}",
                index,
                image.width(),
                image.height(),
                width,
                height
            )));
        }
        let frame = quantize_image(&image, &config.palette, config.color_mode);
        writer.write_all(&encode_frame(&frame)?)?;
        bar.inc(1);
    }
    writer.flush()?;
    bar.finish_and_clear();

    debug!("Wrote {} frames to {}", frame_count, video.display());
    Ok(())
}

/// Open the soundtrack according to `policy`; `None` means play silently
fn open_soundtrack(
    path: Option<&Path>,
    policy: AudioPolicy,
    player: &str,
) -> Result<Option<ExternalClip>> {
    if policy == AudioPolicy::Off {
        return Ok(None);
    }

    let Some(path) = path else {
        if policy == AudioPolicy::Required {
            return Err(GlyphreelError::Audio("the input has no audio track".to_string()));
        }
        warn!("The input has no audio track, playing without sound");
        return Ok(None);
    };

    match open_clip(path, player) {
        Ok(clip) => Ok(Some(clip)),
        Err(e) if policy == AudioPolicy::Required => Err(e),
        Err(e) => {
            warn!("{}, playing without sound", e);
            Ok(None)
        }
    }
}

/// Play a packaged glyph stream in place
pub async fn play(config: &Config, args: &PlayArgs) -> Result<PlaybackStats> {
    let workspace = config.prepare_workspace()?;
    let policy = args.audio.policy();

    info!("Unpacking {}...", args.input.display());
    let unpacked = unpack(&args.input, &workspace.play, policy != AudioPolicy::Off)?;

    let mut video = BufReader::new(File::open(&unpacked.video)?);
    let header = decode_header(&mut video)?;
    header.check_playable(config.color_mode, config.terminal_size(), args.ignore_resolution)?;
    let mut reader = FrameReader::with_header(video, header, &config.palette)?;
    debug!(
        "Stream {}x{} at {} fps in {} mode",
        header.width, header.height, header.fps, header.color_mode
    );

    let mut clip = open_soundtrack(unpacked.audio.as_deref(), policy, &config.ffplay)?;

    info!("Playing...");
    let mut screen = Screen::new(io::stdout(), header.height);
    let mut scheduler = PlaybackScheduler::new(header.fps, &config.palette, args.color);
    scheduler.run(&mut reader, clip.as_mut(), &mut screen).await
}

/// Play a video while its frames are still being extracted
pub async fn stream(config: &Config, args: &StreamArgs) -> Result<PlaybackStats> {
    let workspace = config.prepare_workspace()?;
    let policy = args.audio.policy();

    let audio = workspace.render.join(AUDIO_FILE_NAME);
    let has_audio = match policy {
        AudioPolicy::Off => false,
        _ => match extract_audio(&config.ffmpeg, &args.input, &audio).await {
            Ok(()) => true,
            Err(e) if policy == AudioPolicy::Required => return Err(e),
            Err(e) => {
                warn!("Could not extract audio: {}", e);
                false
            }
        },
    };

    let request = FrameRequest {
        input: args.input.clone(),
        output_dir: workspace.render.clone(),
        fps: args.fps,
        width: config.terminal_width,
        height: config.terminal_height,
    };
    let ffmpeg = config.ffmpeg.clone();
    let mut producer = Producer::spawn(async move { extract_frames(&ffmpeg, &request).await });

    tokio::time::sleep(PRODUCER_HEAD_START).await;

    let mut clip = open_soundtrack(has_audio.then_some(audio.as_path()), policy, &config.ffplay)?;
    let mut frames = FrameDirectory::new(
        &workspace.render,
        &mut producer,
        &config.palette,
        config.color_mode,
    );

    info!("Streaming...");
    let mut screen = Screen::new(io::stdout(), config.terminal_height);
    let mut scheduler = PlaybackScheduler::new(args.fps, &config.palette, args.color);
    scheduler.run(&mut frames, clip.as_mut(), &mut screen).await
}

/// Describe a packaged glyph stream
pub fn inspect(input: &Path) -> Result<StreamInfo> {
    container::inspect(input)
}
