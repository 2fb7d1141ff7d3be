use image::Rgba;

/// A palette entry, kept both as the hex string shown in legends and as RGB.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaletteColor {
    pub hex: &'static str,
    pub rgb: [u8; 3],
}

impl PaletteColor {
    const fn new(hex: &'static str, r: u8, g: u8, b: u8) -> Self {
        Self { hex, rgb: [r, g, b] }
    }

    pub fn rgba(&self) -> Rgba<u8> {
        Rgba([self.rgb[0], self.rgb[1], self.rgb[2], 255])
    }
}

pub const PALETTE: [PaletteColor; 15] = [
    PaletteColor::new("#FF6B6B", 0xFF, 0x6B, 0x6B),
    PaletteColor::new("#4ECDC4", 0x4E, 0xCD, 0xC4),
    PaletteColor::new("#45B7D1", 0x45, 0xB7, 0xD1),
    PaletteColor::new("#96CEB4", 0x96, 0xCE, 0xB4),
    PaletteColor::new("#FECA57", 0xFE, 0xCA, 0x57),
    PaletteColor::new("#FF9FF3", 0xFF, 0x9F, 0xF3),
    PaletteColor::new("#54A0FF", 0x54, 0xA0, 0xFF),
    PaletteColor::new("#5F27CD", 0x5F, 0x27, 0xCD),
    PaletteColor::new("#00D2D3", 0x00, 0xD2, 0xD3),
    PaletteColor::new("#FF9F43", 0xFF, 0x9F, 0x43),
    PaletteColor::new("#10AC84", 0x10, 0xAC, 0x84),
    PaletteColor::new("#EE5A24", 0xEE, 0x5A, 0x24),
    PaletteColor::new("#0984E3", 0x09, 0x84, 0xE3),
    PaletteColor::new("#6C5CE7", 0x6C, 0x5C, 0xE7),
    PaletteColor::new("#A29BFE", 0xA2, 0x9B, 0xFE),
];

/// Color for a positional index; indices past the end wrap around.
pub fn color_at(index: usize) -> PaletteColor {
    PALETTE[index % PALETTE.len()]
}
