//! Color registers and the conversions defined by the SIXEL format.
//!
//! All functions here are pure integer arithmetic so the decoder and encoder
//! agree bit-for-bit on how percentages map to bytes.

use crate::SIXEL_PALETTE_MAX;

/// An 8-bit RGB color register value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);

    #[inline]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Returns the color as opaque RGBA bytes.
    #[inline]
    pub const fn to_rgba(self) -> [u8; 4] {
        [self.r, self.g, self.b, 0xFF]
    }
}

const fn percent_to_byte(value: u32) -> u8 {
    let clamped = if value > 100 { 100 } else { value };
    ((clamped * 255 + 50) / 100) as u8
}

const fn xrgb(r: u32, g: u32, b: u32) -> Rgb {
    Rgb::new(percent_to_byte(r), percent_to_byte(g), percent_to_byte(b))
}

/// VT340 power-on colors for registers 0-15.
const BASE_COLORS: [Rgb; 16] = [
    xrgb(0, 0, 0),    // black
    xrgb(20, 20, 80), // blue
    xrgb(80, 13, 13), // red
    xrgb(20, 80, 20), // green
    xrgb(80, 20, 80), // magenta
    xrgb(20, 80, 80), // cyan
    xrgb(80, 80, 20), // yellow
    xrgb(53, 53, 53), // gray 50%
    xrgb(26, 26, 26), // gray 25%
    xrgb(33, 33, 60),
    xrgb(60, 26, 26),
    xrgb(33, 60, 33),
    xrgb(60, 33, 60),
    xrgb(33, 60, 60),
    xrgb(60, 60, 33),
    xrgb(80, 80, 80), // gray 75%
];

const fn build_default_palette() -> [Rgb; SIXEL_PALETTE_MAX] {
    let mut colors = [Rgb::WHITE; SIXEL_PALETTE_MAX];

    let mut n = 0;
    while n < BASE_COLORS.len() {
        colors[n] = BASE_COLORS[n];
        n += 1;
    }

    // 16-231: 6x6x6 color cube
    let mut r = 0;
    while r < 6 {
        let mut g = 0;
        while g < 6 {
            let mut b = 0;
            while b < 6 {
                colors[n] = Rgb::new(r * 51, g * 51, b * 51);
                n += 1;
                b += 1;
            }
            g += 1;
        }
        r += 1;
    }

    // 232-255: grayscale ramp
    let mut level = 0;
    while level < 24 && n < SIXEL_PALETTE_MAX {
        let value = level * 11;
        colors[n] = Rgb::new(value, value, value);
        n += 1;
        level += 1;
    }

    colors
}

/// Register contents before any Color Introducer has redefined them.
pub const DEFAULT_PALETTE: [Rgb; SIXEL_PALETTE_MAX] = build_default_palette();

/// Returns a fresh copy of the 256-entry default palette.
///
/// Indices 0-15 hold the VT340 colors, 16-231 a 6x6x6 cube with axis steps
/// of 51, and 232-255 a gray ramp with steps of 11.
#[inline]
pub fn default_palette() -> [Rgb; SIXEL_PALETTE_MAX] {
    DEFAULT_PALETTE
}

/// Converts RGB percentages (each clamped to 0-100) to an 8-bit color.
///
/// ```rust
/// use sixel_codec::{rgb_from_percent, Rgb};
///
/// assert_eq!(rgb_from_percent(100, 20, 0), Rgb::new(255, 51, 0));
/// ```
#[inline]
pub fn rgb_from_percent(r: u32, g: u32, b: u32) -> Rgb {
    xrgb(r, g, b)
}

/// Converts one 8-bit channel to the 0-100 scale used by Color Introducers,
/// rounding half up.
#[inline]
pub fn rgb_to_percent(value: u8) -> u8 {
    ((value as u32 * 100 + 127) / 255) as u8
}

const HLS_MAX: i32 = 100;
const RGB_MAX: i32 = 255;

/// Converts hue, luminance and saturation, each on a 0-100 scale, to RGB.
///
/// Saturation 0 yields a gray of `lum * 255 / 100`.
///
/// ```rust
/// use sixel_codec::{hls_to_rgb, Rgb};
///
/// assert_eq!(hls_to_rgb(0, 50, 0), Rgb::new(127, 127, 127));
/// assert_eq!(hls_to_rgb(0, 50, 100), Rgb::new(255, 0, 0));
/// ```
pub fn hls_to_rgb(hue: u32, lum: u32, sat: u32) -> Rgb {
    let hue = hue.min(HLS_MAX as u32) as i32;
    let lum = lum.min(HLS_MAX as u32) as i32;
    let sat = sat.min(HLS_MAX as u32) as i32;

    if sat == 0 {
        let gray = channel(lum * RGB_MAX / HLS_MAX);
        return Rgb::new(gray, gray, gray);
    }

    let magic2 = if lum <= HLS_MAX / 2 {
        (lum * (HLS_MAX + sat) + HLS_MAX / 2) / HLS_MAX
    } else {
        lum + sat - (lum * sat + HLS_MAX / 2) / HLS_MAX
    };
    let magic1 = 2 * lum - magic2;

    let scale = |v: i32| channel((v * RGB_MAX + HLS_MAX / 2) / HLS_MAX);
    Rgb::new(
        scale(hue_to_rgb(magic1, magic2, hue + HLS_MAX / 3)),
        scale(hue_to_rgb(magic1, magic2, hue)),
        scale(hue_to_rgb(magic1, magic2, hue - HLS_MAX / 3)),
    )
}

fn hue_to_rgb(n1: i32, n2: i32, mut hue: i32) -> i32 {
    if hue < 0 {
        hue += HLS_MAX;
    }
    if hue > HLS_MAX {
        hue -= HLS_MAX;
    }

    let sixth = HLS_MAX / 6;
    let twelfth = HLS_MAX / 12;
    if hue < sixth {
        return n1 + ((n2 - n1) * hue + twelfth) / sixth;
    }
    if hue < HLS_MAX / 2 {
        return n2;
    }
    if hue < HLS_MAX * 2 / 3 {
        return n1 + ((n2 - n1) * (HLS_MAX * 2 / 3 - hue) + twelfth) / sixth;
    }
    n1
}

#[inline]
fn channel(value: i32) -> u8 {
    value.clamp(0, RGB_MAX) as u8
}
