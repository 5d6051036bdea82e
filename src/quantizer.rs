use crate::{GlyphreelError, Result};
use image::RgbImage;
use log::debug;
use serde::Serialize;
use std::fmt;

/// Color fidelity of a frame stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    /// One 8-bit index into the standard 256-color terminal palette per cell
    Ansi256,
    /// Direct 24-bit RGB per cell
    Truecolor,
}

impl ColorMode {
    /// Number of bytes one encoded pixel takes in this mode
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            ColorMode::Ansi256 => 2,
            ColorMode::Truecolor => 4,
        }
    }

    /// Whether a player in `self` mode can show a stream rendered in `stream` mode
    pub fn can_play(self, stream: ColorMode) -> bool {
        !(stream == ColorMode::Truecolor && self == ColorMode::Ansi256)
    }
}

impl fmt::Display for ColorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColorMode::Ansi256 => write!(f, "256-color"),
            ColorMode::Truecolor => write!(f, "truecolor"),
        }
    }
}

/// An 8-bit RGB source pixel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Standard luma (`0.299 R + 0.587 G + 0.114 B`), rounded to the nearest integer
    pub fn luma(self) -> u8 {
        let luma = 0.299 * self.r as f64 + 0.587 * self.g as f64 + 0.114 * self.b as f64;
        luma.round().clamp(0.0, 255.0) as u8
    }
}

/// Color stored for one cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorValue {
    Indexed(u8),
    Rgb(Rgb),
}

/// One quantized terminal cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuantizedPixel {
    pub glyph_index: u8,
    pub color: ColorValue,
}

/// A `width x height` grid of quantized pixels, row-major
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub mode: ColorMode,
    pub pixels: Vec<QuantizedPixel>,
}

impl Frame {
    /// Whether the pixel count matches `width x height`
    pub fn is_complete(&self) -> bool {
        (self.width as usize).checked_mul(self.height as usize) == Some(self.pixels.len())
    }

    /// Pixels of row `y`, `None` when the row is out of range or cut short
    pub fn row(&self, y: u32) -> Option<&[QuantizedPixel]> {
        let width = self.width as usize;
        let start = (y as usize).checked_mul(width)?;
        self.pixels.get(start..start.checked_add(width)?)
    }

    /// Rows top to bottom; a short pixel buffer yields a short last row
    pub fn rows(&self) -> impl Iterator<Item = &[QuantizedPixel]> {
        self.pixels
            .chunks(self.width.max(1) as usize)
            .take(self.height as usize)
    }
}

/// Ordered glyphs, index 0 being the darkest
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GlyphPalette {
    glyphs: Vec<char>,
}

impl GlyphPalette {
    /// Maximum number of glyphs; indices must fit into one byte
    pub const MAX_LEN: usize = 255;

    pub fn new(glyphs: &str) -> Result<Self> {
        let glyphs: Vec<char> = glyphs.chars().collect();
        if glyphs.is_empty() {
            return Err(GlyphreelError::InvalidConfig("glyph palette is empty".to_string()));
        }
        if glyphs.len() > Self::MAX_LEN {
            return Err(GlyphreelError::InvalidConfig(format!(
                "glyph palette has {} glyphs, the maximum is {}",
                glyphs.len(),
                Self::MAX_LEN
            )));
        }
        Ok(Self { glyphs })
    }

    pub fn len(&self) -> usize {
        self.glyphs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.glyphs.is_empty()
    }

    pub fn glyph(&self, index: u8) -> Option<char> {
        self.glyphs.get(index as usize).copied()
    }

    /// Glyph for `index`, clamped to the brightest glyph
    pub fn glyph_clamped(&self, index: u8) -> char {
        let last = self.glyphs.len() - 1;
        self.glyphs[(index as usize).min(last)]
    }

    /// Glyph index for a luma value: the luma itself, clamped to the palette
    pub fn index_for_luma(&self, luma: u8) -> u8 {
        (luma as usize).min(self.glyphs.len() - 1) as u8
    }
}

impl Default for GlyphPalette {
    fn default() -> Self {
        Self {
            glyphs: crate::DEFAULT_GLYPHS.chars().collect(),
        }
    }
}

/// Map an RGB color onto the 6x6x6 cube of the 256-color palette (indices 16..=231)
pub fn to_ansi256(rgb: Rgb) -> u8 {
    let level = |channel: u8| (channel as f32 / 255.0 * 5.0).round() as u8;
    16 + 36 * level(rgb.r) + 6 * level(rgb.g) + level(rgb.b)
}

/// Quantize one pixel into a glyph index and a color in the given mode
#[inline]
pub fn quantize(rgb: Rgb, palette: &GlyphPalette, mode: ColorMode) -> QuantizedPixel {
    let color = match mode {
        ColorMode::Ansi256 => ColorValue::Indexed(to_ansi256(rgb)),
        ColorMode::Truecolor => ColorValue::Rgb(rgb),
    };

    QuantizedPixel {
        glyph_index: palette.index_for_luma(rgb.luma()),
        color,
    }
}

/// Quantize a whole decoded image; one pixel becomes one terminal cell
pub fn quantize_image(image: &RgbImage, palette: &GlyphPalette, mode: ColorMode) -> Frame {
    let (width, height) = image.dimensions();
    debug!("Quantizing {}x{} image in {} mode", width, height, mode);

    let pixels = image
        .pixels()
        .map(|p| quantize(Rgb::new(p[0], p[1], p[2]), palette, mode))
        .collect();

    Frame {
        width,
        height,
        mode,
        pixels,
    }
}
