//! Binary frame stream format.
//!
//! A stream is a fixed header followed by concatenated frame records:
//!
//! ```text
//! header:  [fps: u8][width: u32 BE][height: u32 BE][truecolor: u8 (0 or 1)]
//! 256:     [glyph_index, color_index]          per pixel, row-major
//! rgb:     [glyph_index, red, green, blue]     per pixel, row-major
//! ```
//!
//! All bytes are unsigned. There is no frame count; the stream ends at the first
//! frame boundary with no bytes left.

use crate::quantizer::{ColorMode, ColorValue, Frame, GlyphPalette, QuantizedPixel, Rgb};
use crate::{GlyphreelError, Result};
use log::debug;
use serde::Serialize;
use std::io::{ErrorKind, Read};

/// Encoded header size in bytes
pub const HEADER_LEN: usize = 10;

/// Stream header, written once before the first frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Header {
    pub fps: u8,
    pub width: u32,
    pub height: u32,
    pub color_mode: ColorMode,
}

impl Header {
    /// Size of one encoded frame record
    pub fn frame_len(&self) -> Result<usize> {
        frame_len(self.width, self.height, self.color_mode)
    }

    /// Reject streams this player cannot show.
    ///
    /// The resolution must match the terminal exactly unless `ignore_resolution` is set.
    pub fn check_playable(
        &self,
        player_mode: ColorMode,
        terminal: (u32, u32),
        ignore_resolution: bool,
    ) -> Result<()> {
        if !player_mode.can_play(self.color_mode) {
            return Err(GlyphreelError::ModeMismatch {
                stream: self.color_mode,
                requested: player_mode,
            });
        }

        if !ignore_resolution && (self.width, self.height) != terminal {
            return Err(GlyphreelError::ResolutionMismatch {
                stream_width: self.width,
                stream_height: self.height,
                terminal_width: terminal.0,
                terminal_height: terminal.1,
            });
        }

        Ok(())
    }
}

fn frame_len(width: u32, height: u32, mode: ColorMode) -> Result<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|cells| cells.checked_mul(mode.bytes_per_pixel()))
        .ok_or_else(|| GlyphreelError::Format(format!("frame size {}x{} overflows", width, height)))
}

/// Encode the stream header
pub fn encode_header(fps: u8, width: u32, height: u32, color_mode: ColorMode) -> [u8; HEADER_LEN] {
    let mut bytes = [0u8; HEADER_LEN];
    bytes[0] = fps;
    bytes[1..5].copy_from_slice(&width.to_be_bytes());
    bytes[5..9].copy_from_slice(&height.to_be_bytes());
    bytes[9] = (color_mode == ColorMode::Truecolor) as u8;
    bytes
}

/// Decode the stream header, failing on truncation or invalid fields
pub fn decode_header<R: Read>(reader: &mut R) -> Result<Header> {
    let mut bytes = [0u8; HEADER_LEN];
    let read = read_up_to(reader, &mut bytes)?;
    if read < HEADER_LEN {
        return Err(GlyphreelError::Format(format!(
            "header truncated: expected {} bytes, got {}",
            HEADER_LEN, read
        )));
    }

    let fps = bytes[0];
    if fps == 0 {
        return Err(GlyphreelError::Format("header fps is 0".to_string()));
    }

    let width = u32::from_be_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]);
    let height = u32::from_be_bytes([bytes[5], bytes[6], bytes[7], bytes[8]]);
    let color_mode = match bytes[9] {
        0 => ColorMode::Ansi256,
        1 => ColorMode::Truecolor,
        other => {
            return Err(GlyphreelError::Format(format!("invalid color mode flag {}", other)));
        }
    };

    let header = Header {
        fps,
        width,
        height,
        color_mode,
    };
    debug!("Decoded stream header: {:?}", header);
    Ok(header)
}

/// Encode one frame record
pub fn encode_frame(frame: &Frame) -> Result<Vec<u8>> {
    let cells = (frame.width as usize).checked_mul(frame.height as usize);
    if cells != Some(frame.pixels.len()) {
        return Err(GlyphreelError::Format(format!(
            "{}x{} frame holds {} pixels",
            frame.width,
            frame.height,
            frame.pixels.len()
        )));
    }

    let mut bytes = Vec::with_capacity(frame.pixels.len() * frame.mode.bytes_per_pixel());
    for pixel in &frame.pixels {
        bytes.push(pixel.glyph_index);
        match (frame.mode, pixel.color) {
            (ColorMode::Ansi256, ColorValue::Indexed(index)) => bytes.push(index),
            (ColorMode::Truecolor, ColorValue::Rgb(rgb)) => {
                bytes.extend_from_slice(&[rgb.r, rgb.g, rgb.b])
            }
            (mode, color) => {
                return Err(GlyphreelError::Format(format!(
                    "pixel color {:?} does not belong to a {} frame",
                    color, mode
                )));
            }
        }
    }

    Ok(bytes)
}

/// Decode the next frame record.
///
/// Returns `Ok(None)` when the reader is exhausted exactly at a frame boundary;
/// any partial record is a format error.
pub fn decode_frame<R: Read>(
    reader: &mut R,
    width: u32,
    height: u32,
    color_mode: ColorMode,
) -> Result<Option<Frame>> {
    decode_frame_into(reader, &mut Vec::new(), width, height, color_mode)
}

/// Decode one record into `buffer`.
///
/// The buffer grows with the bytes actually read, so a header announcing a
/// huge frame over a short stream fails as truncated instead of allocating
/// the announced size up front.
fn decode_frame_into<R: Read>(
    reader: &mut R,
    buffer: &mut Vec<u8>,
    width: u32,
    height: u32,
    color_mode: ColorMode,
) -> Result<Option<Frame>> {
    let expected = frame_len(width, height, color_mode)?;
    buffer.clear();
    let read = reader.by_ref().take(expected as u64).read_to_end(buffer)?;
    if read == 0 {
        return Ok(None);
    }
    if read < expected {
        return Err(GlyphreelError::Format(format!(
            "frame record truncated: expected {} bytes, got {}",
            expected, read
        )));
    }

    let pixels = match color_mode {
        ColorMode::Ansi256 => buffer
            .chunks_exact(2)
            .map(|p| QuantizedPixel {
                glyph_index: p[0],
                color: ColorValue::Indexed(p[1]),
            })
            .collect(),
        ColorMode::Truecolor => buffer
            .chunks_exact(4)
            .map(|p| QuantizedPixel {
                glyph_index: p[0],
                color: ColorValue::Rgb(Rgb::new(p[1], p[2], p[3])),
            })
            .collect(),
    };

    Ok(Some(Frame {
        width,
        height,
        mode: color_mode,
        pixels,
    }))
}

/// Fill `buf` as far as the reader allows, returning the number of bytes read
fn read_up_to<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Sequential frame decoder over a stream whose header was already read
pub struct FrameReader<R: Read> {
    reader: R,
    header: Header,
    palette_len: usize,
    buffer: Vec<u8>,
    frames_read: u64,
}

impl<R: Read> FrameReader<R> {
    /// Read the header from `reader` and prepare to decode frames
    pub fn new(mut reader: R, palette: &GlyphPalette) -> Result<Self> {
        let header = decode_header(&mut reader)?;
        Self::with_header(reader, header, palette)
    }

    /// Decode frames from `reader` positioned right after `header`
    pub fn with_header(reader: R, header: Header, palette: &GlyphPalette) -> Result<Self> {
        header.frame_len()?;
        Ok(Self {
            reader,
            header,
            palette_len: palette.len(),
            buffer: Vec::new(),
            frames_read: 0,
        })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn frames_read(&self) -> u64 {
        self.frames_read
    }

    /// Decode the next frame, `None` at end of stream
    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        let Header {
            width,
            height,
            color_mode,
            ..
        } = self.header;

        let decoded =
            decode_frame_into(&mut self.reader, &mut self.buffer, width, height, color_mode)?;
        let frame = match decoded {
            Some(frame) => frame,
            None => return Ok(None),
        };

        let unknown = frame
            .pixels
            .iter()
            .find(|p| p.glyph_index as usize >= self.palette_len);
        if let Some(bad) = unknown {
            return Err(GlyphreelError::Format(format!(
                "frame {} uses glyph index {}, but the palette has {} glyphs",
                self.frames_read + 1,
                bad.glyph_index,
                self.palette_len
            )));
        }

        self.frames_read += 1;
        Ok(Some(frame))
    }
}

impl<R: Read> Iterator for FrameReader<R> {
    type Item = Result<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_frame().transpose()
    }
}
