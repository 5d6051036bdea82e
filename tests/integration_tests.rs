use glyphreel::prelude::*;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tempfile::tempdir;
use assert_cmd::Command;
use predicates::prelude::*;

/// Helper building a frame filled with one glyph and one color
fn solid_frame(width: u32, height: u32, glyph_index: u8, color: ColorValue) -> Frame {
    let mode = match color {
        ColorValue::Indexed(_) => ColorMode::Ansi256,
        ColorValue::Rgb(_) => ColorMode::Truecolor,
    };
    Frame {
        width,
        height,
        mode,
        pixels: vec![QuantizedPixel { glyph_index, color }; (width * height) as usize],
    }
}

/// Helper writing a packaged stream with the given frames and no audio
fn create_test_stream(dir: &Path, fps: u8, frames: &[Frame]) -> PathBuf {
    let first = &frames[0];
    let mut bytes = encode_header(fps, first.width, first.height, first.mode).to_vec();
    for frame in frames {
        bytes.extend(encode_frame(frame).unwrap());
    }

    let video = dir.join("video.bin");
    std::fs::write(&video, bytes).unwrap();
    let output = dir.join("clip.glr");
    pack(&video, None, &output, false).unwrap();
    output
}

#[test]
fn test_cli_help() {
    let mut cmd = Command::cargo_bin("glyphreel").unwrap();
    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("glyph streams"));
}

#[test]
fn test_cli_version() {
    let mut cmd = Command::cargo_bin("glyphreel").unwrap();
    cmd.arg("--version");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_cli_missing_file() {
    let mut cmd = Command::cargo_bin("glyphreel").unwrap();
    cmd.args(["play", "-i", "nonexistent.glr"]);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn test_cli_wrong_extension() {
    let dir = tempdir().unwrap();
    let video = dir.path().join("movie.mp4");
    std::fs::write(&video, b"dummy video content").unwrap();

    let mut cmd = Command::cargo_bin("glyphreel").unwrap();
    cmd.args(["play", "-i"]).arg(&video);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("is not a .glr file"));
}

#[test]
fn test_cli_invalid_fps() {
    let dir = tempdir().unwrap();
    let video = dir.path().join("movie.mp4");
    std::fs::write(&video, b"dummy video content").unwrap();

    let mut cmd = Command::cargo_bin("glyphreel").unwrap();
    cmd.args(["render", "--fps", "0", "-o", "out", "-i"]).arg(&video);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("invalid value"));
}

#[test]
fn test_cli_zero_width() {
    let dir = tempdir().unwrap();
    let frame = solid_frame(2, 1, 0, ColorValue::Indexed(0));
    let stream = create_test_stream(dir.path(), 10, &[frame]);

    let mut cmd = Command::cargo_bin("glyphreel").unwrap();
    cmd.args(["--width", "0", "inspect", "-i"]).arg(&stream);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("must be greater than 0"));
}

#[test]
fn test_cli_inspect() {
    let dir = tempdir().unwrap();
    let frame = solid_frame(4, 2, 5, ColorValue::Rgb(Rgb::new(1, 2, 3)));
    let stream = create_test_stream(dir.path(), 12, &[frame.clone(), frame.clone(), frame]);

    let mut cmd = Command::cargo_bin("glyphreel").unwrap();
    cmd.args(["inspect", "-i"]).arg(&stream);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("\"fps\": 12"))
        .stdout(predicate::str::contains("\"color_mode\": \"truecolor\""))
        .stdout(predicate::str::contains("\"frames\": 3"))
        .stdout(predicate::str::contains("\"has_audio\": false"));
}

#[test]
fn test_cli_play_restores_cursor() {
    let dir = tempdir().unwrap();
    let frames = [
        solid_frame(3, 2, 28, ColorValue::Rgb(Rgb::new(255, 0, 0))),
        solid_frame(3, 2, 0, ColorValue::Rgb(Rgb::new(0, 0, 255))),
    ];
    let stream = create_test_stream(dir.path(), 50, &frames);

    let mut cmd = Command::cargo_bin("glyphreel").unwrap();
    cmd.args(["--width", "3", "--height", "2", "--tmp"])
        .arg(dir.path().join("work"))
        .args(["play", "--no-audio", "-i"])
        .arg(&stream);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("\x1b[?25l"))
        .stdout(predicate::str::contains("\x1b[38;2;255;0;0m@"))
        .stdout(predicate::str::ends_with("\x1b[?25h"));
}

#[test]
fn test_cli_play_resolution_mismatch() {
    let dir = tempdir().unwrap();
    let frame = solid_frame(3, 2, 1, ColorValue::Indexed(9));
    let stream = create_test_stream(dir.path(), 50, &[frame]);

    let mut cmd = Command::cargo_bin("glyphreel").unwrap();
    cmd.args(["--width", "80", "--height", "24", "--tmp"])
        .arg(dir.path().join("work"))
        .args(["play", "--no-audio", "-i"])
        .arg(&stream);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("terminal size 3x2"));

    let mut cmd = Command::cargo_bin("glyphreel").unwrap();
    cmd.args(["--width", "80", "--height", "24", "--tmp"])
        .arg(dir.path().join("work"))
        .args(["play", "--no-audio", "--ignore-resolution", "-i"])
        .arg(&stream);
    cmd.assert().success();
}

#[test]
fn test_cli_play_mode_mismatch() {
    let dir = tempdir().unwrap();
    let frame = solid_frame(3, 2, 1, ColorValue::Rgb(Rgb::new(9, 9, 9)));
    let stream = create_test_stream(dir.path(), 50, &[frame]);

    let mut cmd = Command::cargo_bin("glyphreel").unwrap();
    cmd.args(["--256", "--width", "3", "--height", "2", "--tmp"])
        .arg(dir.path().join("work"))
        .args(["play", "--no-audio", "-i"])
        .arg(&stream);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("restricted to 256-color mode"))
        .stdout(predicate::str::contains("\x1b[?25l").not());
}

#[test]
fn test_quantize_encode_render_pipeline() {
    let palette = GlyphPalette::default();
    let image = image::RgbImage::from_fn(4, 2, |x, _| {
        let level = (x * 85) as u8;
        image::Rgb([level, level, level])
    });

    let frame = quantize_image(&image, &palette, ColorMode::Ansi256);
    let mut bytes = encode_header(24, 4, 2, ColorMode::Ansi256).to_vec();
    bytes.extend(encode_frame(&frame).unwrap());

    let mut reader = FrameReader::new(Cursor::new(bytes), &palette).unwrap();
    assert_eq!(reader.header().fps, 24);
    let decoded = reader.next_frame().unwrap().unwrap();
    assert_eq!(decoded, frame);
    assert!(reader.next_frame().unwrap().is_none());

    // Darker cells map to earlier glyphs
    let row: Vec<u8> = decoded.row(0).unwrap().iter().map(|p| p.glyph_index).collect();
    assert!(row.windows(2).all(|w| w[0] <= w[1]));

    let text = render_frame(&decoded, &palette, ColorTarget::TextOnly);
    assert_eq!(text.lines().count(), 2);
    assert!(!text.ends_with('\n'));
    assert!(text.starts_with("\x1b[38;5;16m "));
}

#[tokio::test]
async fn test_unpacked_stream_plays_to_end() {
    let dir = tempdir().unwrap();
    let frames = [
        solid_frame(2, 2, 3, ColorValue::Indexed(46)),
        solid_frame(2, 2, 4, ColorValue::Indexed(51)),
        solid_frame(2, 2, 5, ColorValue::Indexed(196)),
    ];
    let stream = create_test_stream(dir.path(), 100, &frames);
    let out = dir.path().join("out");
    std::fs::create_dir_all(&out).unwrap();
    let unpacked = unpack(&stream, &out, true).unwrap();
    assert!(unpacked.audio.is_none());

    let palette = GlyphPalette::default();
    let file = std::fs::File::open(&unpacked.video).unwrap();
    let mut reader = FrameReader::new(std::io::BufReader::new(file), &palette).unwrap();
    reader
        .header()
        .check_playable(ColorMode::Truecolor, (2, 2), false)
        .unwrap();

    let mut screen = Screen::new(Vec::new(), 2);
    let mut scheduler = PlaybackScheduler::new(100, &palette, ColorTarget::BlackText);
    let stats = scheduler
        .run(&mut reader, None::<&mut ExternalClip>, &mut screen)
        .await
        .unwrap();

    assert_eq!(stats.frames, 3);
    let output = String::from_utf8(screen.get_ref().clone()).unwrap();
    assert!(output.contains("\x1b[48;5;196m"));
    assert!(output.ends_with("\x1b[?25h"));
}

#[test]
fn test_cli_play_rejects_oversized_header() {
    let dir = tempdir().unwrap();
    let mut bytes = encode_header(30, 0x4000_0000, 0x4000, ColorMode::Truecolor).to_vec();
    bytes.extend([1, 2, 3, 4]);
    let video = dir.path().join("video.bin");
    std::fs::write(&video, bytes).unwrap();
    let stream = dir.path().join("huge.glr");
    pack(&video, None, &stream, false).unwrap();

    let mut cmd = Command::cargo_bin("glyphreel").unwrap();
    cmd.args(["--width", "80", "--height", "24", "--tmp"])
        .arg(dir.path().join("work"))
        .args(["play", "--no-audio", "-i"])
        .arg(&stream);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("terminal size 1073741824x16384"));

    let mut cmd = Command::cargo_bin("glyphreel").unwrap();
    cmd.args(["--width", "80", "--height", "24", "--tmp"])
        .arg(dir.path().join("work"))
        .args(["play", "--no-audio", "--ignore-resolution", "-i"])
        .arg(&stream);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("truncated"));
}
