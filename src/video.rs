use crate::memory::{Byte, Word};

mod font;

pub use font::FONT;

pub const WIDTH: usize = 320;
pub const HEIGHT: usize = 200;
/// 320x200 8-bit indexed framebuffer, rendered by an external presentation
/// layer through a 256-entry palette.
pub const VIDEO_SIZE: usize = WIDTH * HEIGHT;

/// Glyphs are 8x8 pixels.
pub const GLYPH_SIZE: usize = 8;
const COLUMNS: usize = WIDTH / GLYPH_SIZE;
const ROWS: usize = HEIGHT / GLYPH_SIZE;

/// The memory-mapped video region plus the BIOS text cursor.
///
/// Only the interrupt layer writes here; program memory accesses never
/// reach this buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Video {
    /// One palette index per pixel, row major.
    pub mem: Box<[Byte]>,
    cursor_x: usize,
    cursor_y: usize,
}

impl Default for Video {
    fn default() -> Self {
        Video {
            mem: vec![0; VIDEO_SIZE].into_boxed_slice(),
            cursor_x: 0,
            cursor_y: 0,
        }
    }
}

impl Video {
    /// Clamps an address into the video region, mirroring the main
    /// memory mapper.
    pub fn map(position: Word) -> usize {
        let position = position as usize;
        if position < VIDEO_SIZE {
            position
        } else {
            VIDEO_SIZE - 1
        }
    }

    /// Current text cursor as (column, row).
    pub fn cursor(&self) -> (usize, usize) {
        (self.cursor_x, self.cursor_y)
    }

    /// Writes a 16-bit word into video memory (big endian, clamped).
    pub fn write_word(&mut self, position: Word, value: Word) {
        self.mem[Self::map(position)] = (value >> 8) as Byte;
        self.mem[Self::map(position.wrapping_add(1))] = value as Byte;
    }

    /// Draws the glyph for `ch` with its top-left corner at pixel (x, y).
    pub fn push_char(&mut self, x: usize, y: usize, ch: Byte, fg: Byte, bg: Byte) {
        let glyph = FONT.get(ch as usize).unwrap_or(&FONT[0x00]);

        for (row, line) in glyph.iter().enumerate() {
            for col in 0..GLYPH_SIZE {
                let mask = 1 << col;
                let color = if line & mask != 0 { fg } else { bg };
                let px = (y + row) * WIDTH + x + col;
                if px < VIDEO_SIZE {
                    self.mem[px] = color;
                }
            }
        }
    }

    /// Draws `ch` at the text cursor and advances the cursor. Line feed
    /// starts a new row, carriage return rewinds the column; the cursor
    /// wraps at the right edge and back to the top row.
    pub fn print_char(&mut self, ch: Byte, fg: Byte, bg: Byte) {
        match ch {
            0x0a => {
                self.cursor_x = 0;
                self.cursor_y += 1;
            }
            0x0d => {
                self.cursor_x = 0;
            }
            _ => {
                let x = self.cursor_x * GLYPH_SIZE;
                let y = self.cursor_y * GLYPH_SIZE;
                self.push_char(x, y, ch, fg, bg);
                self.cursor_x += 1;
            }
        }

        if self.cursor_x >= COLUMNS {
            self.cursor_x = 0;
            self.cursor_y += 1;
        }
        if self.cursor_y >= ROWS {
            self.cursor_y = 0;
        }
    }

    /// Prints every character of `text` at the cursor.
    pub fn print_str(&mut self, text: &str, fg: Byte, bg: Byte) {
        for ch in text.bytes() {
            self.print_char(ch, fg, bg);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use color_eyre::eyre::Result;

    #[test]
    fn test_map_clamps() -> Result<()> {
        assert_eq!(Video::map(0), 0);
        assert_eq!(Video::map(63999), 63999);
        assert_eq!(Video::map(64000), 63999);
        assert_eq!(Video::map(Word::MAX), 63999);

        Ok(())
    }

    #[test]
    fn test_write_word_is_big_endian() -> Result<()> {
        let mut video = Video::default();

        video.write_word(100, 0x1234);
        assert_eq!(video.mem[100], 0x12);
        assert_eq!(video.mem[101], 0x34);

        Ok(())
    }

    #[test]
    fn test_write_word_at_edge_clamps() -> Result<()> {
        let mut video = Video::default();

        video.write_word(63999, 0x1234);
        // Both bytes clamp onto the last pixel.
        assert_eq!(video.mem[63999], 0x34);

        Ok(())
    }

    #[test]
    fn test_push_char_draws_glyph() -> Result<()> {
        let mut video = Video::default();

        video.push_char(0, 0, b'A', 255, 1);

        for row in 0..GLYPH_SIZE {
            for col in 0..GLYPH_SIZE {
                let expected = if FONT[b'A' as usize][row] & (1 << col) != 0 {
                    255
                } else {
                    1
                };
                assert_eq!(video.mem[row * WIDTH + col], expected);
            }
        }

        Ok(())
    }

    #[test]
    fn test_print_char_advances_cursor() -> Result<()> {
        let mut video = Video::default();

        video.print_char(b'A', 255, 0);
        assert_eq!(video.cursor(), (1, 0));

        Ok(())
    }

    #[test]
    fn test_newline_moves_to_next_row() -> Result<()> {
        let mut video = Video::default();

        video.print_str("AB\nC", 255, 0);
        assert_eq!(video.cursor(), (1, 1));

        Ok(())
    }

    #[test]
    fn test_cursor_wraps_at_right_edge() -> Result<()> {
        let mut video = Video::default();

        for _ in 0..COLUMNS {
            video.print_char(b'x', 255, 0);
        }
        assert_eq!(video.cursor(), (0, 1));

        Ok(())
    }

    #[test]
    fn test_cursor_wraps_back_to_top() -> Result<()> {
        let mut video = Video::default();

        for _ in 0..ROWS {
            video.print_char(0x0a, 255, 0);
        }
        assert_eq!(video.cursor(), (0, 0));

        Ok(())
    }
}
