//! Fixed color tables for format codes
//!
//! Each of the sixteen color codes (`0-9`, `a-f`) maps to a foreground color
//! and a darker shadow tone. The shadow tone is looked up, never computed.

use image::Rgba;

/// Format codes that select a color, in table order
pub const COLOR_CODES: [char; 16] = [
    '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', 'a', 'b', 'c', 'd', 'e', 'f',
];

const PRIMARY: [u32; 16] = [
    0x000000, 0x0000AA, 0x00AA00, 0x00AAAA, 0xAA0000, 0xAA00AA, 0xFFAA00, 0xAAAAAA, 0x555555,
    0x5555FF, 0x55FF55, 0x55FFFF, 0xFF5555, 0xFF55FF, 0xFFFF55, 0xFFFFFF,
];

const SHADOW: [u32; 16] = [
    0x000000, 0x00002A, 0x002A00, 0x002A2A, 0x2A0000, 0x2A002A, 0x3F2A00, 0x2A2A2A, 0x151515,
    0x15153F, 0x153F15, 0x153F3F, 0x3F1515, 0x3F153F, 0x3F3F15, 0x3F3F3F,
];

/// Default color of main glyphs with no color span
pub const TEXT_COLOR: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Default color of shadow glyphs with no color span
pub const SHADOW_COLOR: Rgba<u8> = Rgba([63, 63, 63, 255]);

/// Translucent fill used behind text
pub const BACKGROUND_COLOR: Rgba<u8> = Rgba([0, 0, 0, 64]);

/// Which of the two tables a glyph run draws from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Palette {
    /// Foreground colors
    Primary,
    /// Darker shadow tones
    Shadow,
}

impl Palette {
    /// Color for a format code, or `None` if `code` is not a color code
    pub fn color(self, code: char) -> Option<Rgba<u8>> {
        let index = color_index(code)?;
        let table = match self {
            Palette::Primary => &PRIMARY,
            Palette::Shadow => &SHADOW,
        };
        Some(from_rgb(table[index]))
    }

    /// Color used when no color span covers a glyph
    pub fn default_color(self) -> Rgba<u8> {
        match self {
            Palette::Primary => TEXT_COLOR,
            Palette::Shadow => SHADOW_COLOR,
        }
    }
}

/// Position of `code` in [`COLOR_CODES`]
pub fn color_index(code: char) -> Option<usize> {
    match code {
        '0'..='9' => Some(code as usize - '0' as usize),
        'a'..='f' => Some(code as usize - 'a' as usize + 10),
        _ => None,
    }
}

/// Whether `code` selects a color
pub fn is_color_code(code: char) -> bool {
    color_index(code).is_some()
}

fn from_rgb(rgb: u32) -> Rgba<u8> {
    Rgba([
        ((rgb >> 16) & 0xFF) as u8,
        ((rgb >> 8) & 0xFF) as u8,
        (rgb & 0xFF) as u8,
        255,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_codes_resolve() {
        for code in COLOR_CODES {
            assert!(Palette::Primary.color(code).is_some());
            assert!(Palette::Shadow.color(code).is_some());
        }
        assert_eq!(Palette::Primary.color('g'), None);
        assert_eq!(Palette::Primary.color('A'), None);
    }

    #[test]
    fn test_shadow_is_darker_variant() {
        assert_eq!(Palette::Primary.color('a'), Some(Rgba([85, 255, 85, 255])));
        assert_eq!(Palette::Shadow.color('a'), Some(Rgba([21, 63, 21, 255])));
        assert_eq!(Palette::Primary.color('f'), Some(Rgba([255, 255, 255, 255])));
        assert_eq!(Palette::Shadow.color('f'), Some(Rgba([63, 63, 63, 255])));
    }

    #[test]
    fn test_default_colors() {
        assert_eq!(Palette::Primary.default_color(), TEXT_COLOR);
        assert_eq!(Palette::Shadow.default_color(), SHADOW_COLOR);
    }
}
