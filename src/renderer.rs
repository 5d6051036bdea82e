use crate::cli::ColorTarget;
use crate::quantizer::{ColorValue, Frame, GlyphPalette};
use crossterm::{
    cursor::{Hide, MoveDown, MoveToColumn, MoveUp, Show},
    queue,
    style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor},
    terminal::{Clear, ClearType},
    Command,
};
use log::{debug, warn, LevelFilter};
use std::io::{self, Write};

const BLACK_256: Color = Color::AnsiValue(0);
const BLACK_RGB: Color = Color::Rgb { r: 0, g: 0, b: 0 };

fn terminal_color(color: ColorValue) -> Color {
    match color {
        ColorValue::Indexed(index) => Color::AnsiValue(index),
        ColorValue::Rgb(rgb) => Color::Rgb {
            r: rgb.r,
            g: rgb.g,
            b: rgb.b,
        },
    }
}

// Writing escape codes into a String cannot fail, so fmt results are dropped.
fn push_command(out: &mut String, command: impl Command) {
    let _ = command.write_ansi(out);
}

/// Build the escape-coded text of a frame.
///
/// One line per row joined by `\n`, without a trailing newline. Every cell is
/// followed by a color reset.
pub fn render_frame(frame: &Frame, palette: &GlyphPalette, target: ColorTarget) -> String {
    // Roughly 25 bytes of escape codes per truecolor cell
    let mut out = String::with_capacity(frame.pixels.len() * 25);
    let black = match frame.mode {
        crate::ColorMode::Ansi256 => BLACK_256,
        crate::ColorMode::Truecolor => BLACK_RGB,
    };

    if !frame.is_complete() {
        warn!(
            "Rendering incomplete {}x{} frame with {} pixels",
            frame.width,
            frame.height,
            frame.pixels.len()
        );
    }

    for (y, row) in frame.rows().enumerate() {
        if y > 0 {
            out.push('\n');
        }
        for pixel in row {
            let color = terminal_color(pixel.color);
            let glyph = palette.glyph_clamped(pixel.glyph_index);
            match target {
                ColorTarget::TextOnly => {
                    push_command(&mut out, SetForegroundColor(color));
                    out.push(glyph);
                }
                ColorTarget::HighlightOnly => {
                    push_command(&mut out, SetBackgroundColor(color));
                    out.push(' ');
                }
                ColorTarget::BlackText => {
                    push_command(&mut out, SetForegroundColor(black));
                    push_command(&mut out, SetBackgroundColor(color));
                    out.push(glyph);
                }
            }
            push_command(&mut out, ResetColor);
        }
    }

    out
}

/// In-place frame painter.
///
/// Between paints the cursor rests on the first row of the picture, so every
/// paint overwrites the previous frame instead of scrolling. Dropping an active
/// screen blanks the picture rows and shows the cursor again.
pub struct Screen<W: Write> {
    out: W,
    height: u32,
    active: bool,
    saved_log_level: LevelFilter,
}

impl<W: Write> Screen<W> {
    /// Create a screen painting `height` rows into `out`.
    ///
    /// Rows beyond what a cursor move can address are not tracked.
    pub fn new(out: W, height: u32) -> Self {
        Self {
            out,
            height: height.min(u16::MAX as u32),
            active: false,
            saved_log_level: log::max_level(),
        }
    }

    /// Hide the cursor and mute logging until the screen is finished
    pub fn begin(&mut self) -> io::Result<()> {
        self.saved_log_level = log::max_level();
        debug!("Screen active, {} rows", self.height);
        log::set_max_level(LevelFilter::Off);
        self.active = true;
        queue!(self.out, Hide)?;
        self.out.flush()
    }

    /// Print a rendered frame over the previous one
    pub fn paint(&mut self, text: &str) -> io::Result<()> {
        queue!(self.out, Print('\r'), Print(text))?;
        if self.height > 1 {
            queue!(self.out, MoveUp((self.height - 1) as u16))?;
        }
        self.out.flush()
    }

    /// Blank the picture rows, return to column 0 and show the cursor
    pub fn finish(&mut self) -> io::Result<()> {
        if !self.active {
            return Ok(());
        }
        self.active = false;
        log::set_max_level(self.saved_log_level);

        queue!(self.out, ResetColor)?;
        for row in 0..self.height {
            queue!(self.out, Clear(ClearType::CurrentLine))?;
            if row + 1 < self.height {
                queue!(self.out, MoveDown(1))?;
            }
        }
        if self.height > 1 {
            queue!(self.out, MoveUp((self.height - 1) as u16))?;
        }
        queue!(self.out, MoveToColumn(0), Show)?;
        self.out.flush()?;

        debug!("Screen restored");
        Ok(())
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn get_ref(&self) -> &W {
        &self.out
    }
}

impl<W: Write> Drop for Screen<W> {
    fn drop(&mut self) {
        // Ensure the terminal is restored on error and interruption
        let _ = self.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quantizer::{ColorMode, QuantizedPixel, Rgb};

    fn frame(mode: ColorMode) -> Frame {
        let color = |r, g, b| match mode {
            ColorMode::Ansi256 => ColorValue::Indexed(crate::to_ansi256(Rgb::new(r, g, b))),
            ColorMode::Truecolor => ColorValue::Rgb(Rgb::new(r, g, b)),
        };
        Frame {
            width: 2,
            height: 2,
            mode,
            pixels: vec![
                QuantizedPixel { glyph_index: 29, color: color(255, 0, 0) },
                QuantizedPixel { glyph_index: 0, color: color(0, 0, 0) },
                QuantizedPixel { glyph_index: 1, color: color(255, 255, 255) },
                QuantizedPixel { glyph_index: 2, color: color(0, 255, 255) },
            ],
        }
    }

    fn strip_escapes(text: &str) -> String {
        let mut plain = String::new();
        let mut chars = text.chars();
        while let Some(c) = chars.next() {
            if c == '\x1b' {
                // CSI sequences end with an ASCII letter
                for c in chars.by_ref() {
                    if c.is_ascii_alphabetic() {
                        break;
                    }
                }
            } else {
                plain.push(c);
            }
        }
        plain
    }

    #[test]
    fn test_text_only_256() {
        let palette = GlyphPalette::default();
        let text = render_frame(&frame(ColorMode::Ansi256), &palette, ColorTarget::TextOnly);

        assert!(text.starts_with("\x1b[38;5;196m"));
        assert_eq!(text.lines().count(), 2);
        assert!(!text.ends_with('\n'));
        assert_eq!(strip_escapes(&text), "Ñ \n._");
    }

    #[test]
    fn test_text_only_truecolor() {
        let palette = GlyphPalette::default();
        let text = render_frame(&frame(ColorMode::Truecolor), &palette, ColorTarget::TextOnly);
        assert!(text.starts_with("\x1b[38;2;255;0;0m"));
        assert!(text.contains("\x1b[38;2;0;255;255m"));
        assert!(text.contains("\x1b[0m"));
    }

    #[test]
    fn test_highlight_only_prints_no_glyphs() {
        let palette = GlyphPalette::default();
        let text = render_frame(&frame(ColorMode::Truecolor), &palette, ColorTarget::HighlightOnly);
        assert!(text.starts_with("\x1b[48;2;255;0;0m"));
        assert!(!text.contains("38;2"));
        assert_eq!(strip_escapes(&text), "  \n  ");
    }

    #[test]
    fn test_black_text() {
        let palette = GlyphPalette::default();
        let text = render_frame(&frame(ColorMode::Ansi256), &palette, ColorTarget::BlackText);
        assert!(text.starts_with("\x1b[38;5;0m\x1b[48;5;196m"));
        assert_eq!(strip_escapes(&text), "Ñ \n._");
    }

    #[test]
    fn test_paint_repositions_cursor() {
        let mut screen = Screen::new(Vec::new(), 3);
        screen.paint("a\nb\nc").unwrap();
        screen.paint("d\ne\nf").unwrap();

        let output = String::from_utf8(screen.get_ref().clone()).unwrap();
        assert_eq!(output, "\ra\nb\nc\x1b[2A\rd\ne\nf\x1b[2A");
    }

    #[test]
    fn test_incomplete_frame_renders_what_it_has() {
        let mut short = frame(ColorMode::Ansi256);
        short.width = 3;
        short.pixels.pop();

        let text = render_frame(&short, &GlyphPalette::default(), ColorTarget::TextOnly);
        assert_eq!(strip_escapes(&text), "Ñ .");
    }

    #[test]
    fn test_single_row_paint_does_not_move_up() {
        let mut screen = Screen::new(Vec::new(), 1);
        screen.paint("abc").unwrap();
        assert_eq!(screen.get_ref().as_slice(), b"\rabc");
    }

    #[test]
    fn test_finish_restores_cursor_once() {
        let mut screen = Screen::new(Vec::new(), 2);
        screen.begin().unwrap();
        assert!(screen.is_active());
        screen.finish().unwrap();
        screen.finish().unwrap();

        let output = String::from_utf8(screen.get_ref().clone()).unwrap();
        assert!(output.starts_with("\x1b[?25l"));
        assert!(output.ends_with("\x1b[?25h"));
        assert_eq!(output.matches("\x1b[2K").count(), 2);
        assert_eq!(output.matches("\x1b[?25h").count(), 1);
        assert!(!screen.is_active());
    }
}
