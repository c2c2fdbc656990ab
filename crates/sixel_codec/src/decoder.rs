use crate::canvas::Canvas;
use crate::color::{default_palette, hls_to_rgb, rgb_from_percent, Rgb};
use crate::control::{next_token, ControlToken};
use crate::params::{scan_params, Params};
use crate::{Result, SIXEL_BAND_HEIGHT, SIXEL_PALETTE_MAX};

/// Initial canvas edge; grown on demand while decoding.
const DEFAULT_CANVAS_SIZE: usize = 2048;
const MAX_REPEAT: usize = 0xffff;
const BACKGROUND_INDEX: u8 = 0;

/// Pixel aspect ratio from SIXEL DCS parameters.
///
/// SIXEL images can specify a pixel aspect ratio that indicates how pixels
/// should be displayed. This is a historical feature from when terminals had
/// non-square pixels. Most modern terminals display square pixels and ignore
/// this setting, but the information is preserved for applications that need it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelAspectRatio {
    /// Pixel Aspect Numerator (horizontal component)
    pub pan: u16,
    /// Pixel Aspect Denominator (vertical component)
    pub pad: u16,
}

impl PixelAspectRatio {
    /// Returns the aspect ratio as a floating point value (pan/pad).
    /// Values > 1.0 mean pixels are wider than tall.
    /// Values < 1.0 mean pixels are taller than wide.
    #[inline]
    pub fn as_f32(&self) -> f32 {
        self.pan as f32 / self.pad as f32
    }

    /// Returns true if the aspect ratio represents square pixels.
    #[inline]
    pub fn is_square(&self) -> bool {
        self.pan == self.pad
    }
}

impl Default for PixelAspectRatio {
    fn default() -> Self {
        Self { pan: 1, pad: 1 }
    }
}

/// A decoded SIXEL image: indexed pixels plus the palette they refer to.
#[derive(Debug, Clone)]
pub struct SixelImage {
    /// Palette indices, one byte per pixel, row-major
    pub pixels: Vec<u8>,
    /// Image width in pixels
    pub width: usize,
    /// Image height in pixels
    pub height: usize,
    /// RGBA palette, 4 bytes per entry, alpha always 0xFF
    pub palette: Vec<u8>,
    /// Number of palette entries: highest referenced index + 1
    pub color_count: usize,
    /// Pixel aspect ratio from DCS and raster attributes
    pub aspect_ratio: PixelAspectRatio,
}

impl SixelImage {
    /// Returns the RGB value of palette entry `index`, if present.
    pub fn palette_rgb(&self, index: usize) -> Option<Rgb> {
        let start = index.checked_mul(4)?;
        let entry = self.palette.get(start..start.checked_add(4)?)?;
        Some(Rgb::new(entry[0], entry[1], entry[2]))
    }

    /// Expands the indexed pixels through the palette into RGBA bytes.
    pub fn to_rgba(&self) -> Vec<u8> {
        let mut rgba = Vec::with_capacity(self.pixels.len() * 4);
        for &index in &self.pixels {
            let color = self.palette_rgb(index as usize).unwrap_or(Rgb::WHITE);
            rgba.extend_from_slice(&color.to_rgba());
        }
        rgba
    }

    /// Returns the corrected dimensions if aspect ratio is applied.
    ///
    /// For non-square pixels, returns the dimensions that would result
    /// from scaling the image to have square pixels.
    pub fn corrected_dimensions(&self) -> (usize, usize) {
        let pan = self.aspect_ratio.pan.max(1) as usize;
        let pad = self.aspect_ratio.pad.max(1) as usize;
        if pan == pad {
            (self.width, self.height)
        } else if pan > pad {
            (self.width * pan / pad, self.height)
        } else {
            (self.width, self.height * pad / pan)
        }
    }
}

/// Decodes a SIXEL byte stream into an indexed image.
///
/// The stream is scanned from the first byte; a DCS introducer (`ESC P` or
/// 0x90) with its `q` final byte may appear anywhere before the data. Decoding
/// stops at a String Terminator (`ESC \` or 0x9C), a NUL byte, or the end of
/// the buffer, whichever comes first.
///
/// Malformed input never fails: unknown bytes are skipped, missing parameters
/// default, and out-of-range values are clamped. The only error is
/// [`SixelError::AllocationFailed`](crate::SixelError::AllocationFailed) when
/// the canvas cannot grow to the size the stream asks for.
///
/// # Example
///
/// ```rust
/// use sixel_codec::sixel_decode;
///
/// let image = sixel_decode(b"\x1bPq#2!10~\x1b\\")?;
/// assert_eq!((image.width, image.height), (10, 6));
/// assert!(image.pixels.iter().all(|&index| index == 2));
/// assert_eq!(image.color_count, 3);
/// # Ok::<(), sixel_codec::SixelError>(())
/// ```
#[must_use = "this returns the decoded SixelImage"]
pub fn sixel_decode(data: &[u8]) -> Result<SixelImage> {
    let mut decoder = SixelDecoder::new()?;
    decoder.process(data)?;
    let image = decoder.finalize()?;
    log::debug!(
        "decoded sixel: {} bytes -> {}x{}, {} colors",
        data.len(),
        image.width,
        image.height,
        image.color_count
    );
    Ok(image)
}

struct SixelDecoder {
    canvas: Canvas,
    palette: [Rgb; SIXEL_PALETTE_MAX],
    color_index: u8,
    max_color_index: u8,
    repeat: usize,
    pos_x: usize,
    pos_y: usize,
    max_x: usize,
    max_y: usize,
    pan: usize,
    pad: usize,
    target_width: usize,
    target_height: usize,
}

impl SixelDecoder {
    fn new() -> Result<Self> {
        Ok(Self {
            canvas: Canvas::new(DEFAULT_CANVAS_SIZE, DEFAULT_CANVAS_SIZE, BACKGROUND_INDEX)?,
            palette: default_palette(),
            color_index: 0,
            max_color_index: 0,
            repeat: 1,
            pos_x: 0,
            pos_y: 0,
            max_x: 0,
            max_y: 0,
            pan: 2,
            pad: 1,
            target_width: 0,
            target_height: 0,
        })
    }

    fn process(&mut self, data: &[u8]) -> Result<()> {
        let mut idx = 0usize;
        while idx < data.len() {
            let (token, len) = next_token(data, idx);
            idx += len;
            match token {
                ControlToken::DeviceControlString => {
                    let (params, next) = scan_params(data, idx);
                    idx = next;
                    if data.get(idx) == Some(&b'q') {
                        idx += 1;
                        self.apply_dcs(&params);
                    }
                }
                ControlToken::StringTerminator | ControlToken::Nul => break,
                ControlToken::RasterAttributes => {
                    let (params, next) = scan_params(data, idx);
                    idx = next;
                    self.handle_raster(&params)?;
                }
                ControlToken::RepeatIntroducer => {
                    let (params, next) = scan_params(data, idx);
                    idx = next;
                    self.repeat = params
                        .get(0)
                        .map_or(1, |count| (count as usize).clamp(1, MAX_REPEAT));
                }
                ControlToken::ColorIntroducer => {
                    let (params, next) = scan_params(data, idx);
                    idx = next;
                    self.handle_color(&params);
                }
                ControlToken::CarriageReturn => {
                    self.pos_x = 0;
                    self.repeat = 1;
                }
                ControlToken::NextLine => {
                    self.pos_x = 0;
                    self.pos_y = self.pos_y.saturating_add(SIXEL_BAND_HEIGHT);
                    self.repeat = 1;
                }
                ControlToken::Sixel(bits) => self.handle_sixel(bits)?,
                ControlToken::Other => {}
            }
        }
        Ok(())
    }

    /// Applies `DCS P1 ; P2 ; P3 q`: P1 picks the aspect preset, P3 the grid size.
    fn apply_dcs(&mut self, params: &Params) {
        if let Some(preset) = params.get(0) {
            self.pad = match preset {
                0 | 1 => 2,
                2 => 5,
                3 | 4 => 4,
                5 | 6 => 3,
                7 | 8 => 2,
                9 => 1,
                _ => self.pad,
            };
        }

        if let Some(grid) = params.get(2) {
            // 0 means the default grid of 1/10
            let grid = if grid == 0 { 10 } else { grid as usize };
            self.pan = (self.pan.saturating_mul(grid) / 10).max(1);
            self.pad = (self.pad.saturating_mul(grid) / 10).max(1);
        }
    }

    /// `" Pad ; Pan ; Ph ; Pv`
    fn handle_raster(&mut self, params: &Params) -> Result<()> {
        if let Some(pad) = params.get(0) {
            self.pad = pad as usize;
        }
        if let Some(pan) = params.get(1) {
            self.pan = pan as usize;
        }
        if let Some(ph) = params.get(2).filter(|&ph| ph > 0) {
            self.target_width = ph as usize;
        }
        if let Some(pv) = params.get(3).filter(|&pv| pv > 0) {
            self.target_height = pv as usize;
        }
        self.pan = self.pan.max(1);
        self.pad = self.pad.max(1);

        self.canvas.grow_to(self.target_width, self.target_height)
    }

    /// `# Pc ; Pu ; Px ; Py ; Pz`
    fn handle_color(&mut self, params: &Params) {
        let Some(index) = params.get(0) else {
            return;
        };
        self.color_index = index.min(SIXEL_PALETTE_MAX as u32 - 1) as u8;

        if params.len() < 5 {
            return;
        }
        let (x, y, z) = (
            params.get(2).unwrap_or(0),
            params.get(3).unwrap_or(0),
            params.get(4).unwrap_or(0),
        );
        let color = match params.get(1) {
            Some(1) => hls_to_rgb(x.min(360) * 100 / 360, y.min(100), z.min(100)),
            Some(2) => rgb_from_percent(x.min(100), y.min(100), z.min(100)),
            _ => return,
        };
        self.palette[self.color_index as usize] = color;
    }

    #[inline]
    fn handle_sixel(&mut self, bits: u8) -> Result<()> {
        let span = self.repeat;
        self.repeat = 1;

        let width_needed = self.pos_x.saturating_add(span);
        let height_needed = self.pos_y.saturating_add(SIXEL_BAND_HEIGHT);
        self.canvas.ensure_capacity(width_needed, height_needed)?;

        self.max_color_index = self.max_color_index.max(self.color_index);

        if bits == 0 {
            self.pos_x = width_needed;
            return Ok(());
        }

        let color = self.color_index;
        if span == 1 {
            for bit in 0..SIXEL_BAND_HEIGHT {
                if bits & (1 << bit) != 0 {
                    self.canvas.set(self.pos_x, self.pos_y + bit, color);
                    self.max_x = self.max_x.max(self.pos_x);
                    self.max_y = self.max_y.max(self.pos_y + bit);
                }
            }
        } else {
            // Runs of consecutive set bits become one span per covered row.
            let mut bit = 0;
            while bit < SIXEL_BAND_HEIGHT {
                if bits & (1 << bit) == 0 {
                    bit += 1;
                    continue;
                }
                let mut run = 1;
                while bit + run < SIXEL_BAND_HEIGHT && bits & (1 << (bit + run)) != 0 {
                    run += 1;
                }
                for y in self.pos_y + bit..self.pos_y + bit + run {
                    self.canvas.fill_span(self.pos_x, y, span, color);
                }
                self.max_x = self.max_x.max(self.pos_x + span - 1);
                self.max_y = self.max_y.max(self.pos_y + bit + run - 1);
                bit += run;
            }
        }

        self.pos_x = width_needed;
        Ok(())
    }

    fn finalize(self) -> Result<SixelImage> {
        let width = (self.max_x + 1).max(self.target_width);
        let height = (self.max_y + 1).max(self.target_height);
        let (pixels, width, height) = self.canvas.into_trimmed(width, height)?;

        let color_count = self.max_color_index as usize + 1;
        let palette = self.palette[..color_count]
            .iter()
            .flat_map(|color| color.to_rgba())
            .collect();

        Ok(SixelImage {
            pixels,
            width,
            height,
            palette,
            color_count,
            aspect_ratio: PixelAspectRatio {
                pan: self.pan.min(u16::MAX as usize) as u16,
                pad: self.pad.min(u16::MAX as usize) as u16,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(data: &[u8]) -> SixelImage {
        sixel_decode(data).expect("decoding should succeed")
    }

    #[test]
    fn test_bits_map_top_to_bottom() {
        // '@' = 1 -> only the top row; 'A' - '?' = 2 -> second row
        let image = decode(b"\x1bPq#1@A\x1b\\");
        assert_eq!((image.width, image.height), (2, 2));
        assert_eq!(image.pixels, vec![1, 0, 0, 1]);
    }

    #[test]
    fn test_repeat_fills_split_runs() {
        // 0b101101 = 45 -> '?' + 45 = 'l'
        let image = decode(b"#3!3l");
        assert_eq!((image.width, image.height), (3, 6));
        let column: Vec<u8> = (0..6).map(|y| image.pixels[y * 3 + 1]).collect();
        assert_eq!(column, vec![3, 0, 3, 3, 0, 3]);
    }

    #[test]
    fn test_blank_sixel_only_advances() {
        let image = decode(b"#5!4?@");
        assert_eq!((image.width, image.height), (5, 1));
        assert_eq!(image.pixels, vec![0, 0, 0, 0, 5]);
    }

    #[test]
    fn test_del_character_advances_without_drawing() {
        let image = decode(b"#1\x7f@");
        assert_eq!((image.width, image.height), (2, 1));
        assert_eq!(image.pixels, vec![0, 1]);
    }

    #[test]
    fn test_color_index_is_clamped() {
        let image = decode(b"#999@");
        assert_eq!(image.color_count, 256);
        assert_eq!(image.pixels, vec![255]);
    }

    #[test]
    fn test_bare_color_introducer_keeps_color() {
        let image = decode(b"#4@#@");
        assert_eq!(image.pixels, vec![4, 4]);
    }

    #[test]
    fn test_hls_and_rgb_definitions() {
        let image = decode(b"#1;1;0;50;100#2;2;0;100;0#1@#2@");
        assert_eq!(image.palette_rgb(1), Some(Rgb::new(255, 0, 0)));
        assert_eq!(image.palette_rgb(2), Some(Rgb::new(0, 255, 0)));
    }

    #[test]
    fn test_components_are_clamped() {
        let image = decode(b"#1;2;500;200;100#1@");
        assert_eq!(image.palette_rgb(1), Some(Rgb::WHITE));
    }

    #[test]
    fn test_unknown_color_space_is_ignored() {
        let image = decode(b"#1;3;10;10;10#1@");
        assert_eq!(image.palette_rgb(1), Some(default_palette()[1]));
    }

    #[test]
    fn test_dcs_aspect_presets() {
        let image = decode(b"\x1bP2q@\x1b\\");
        assert_eq!(image.aspect_ratio, PixelAspectRatio { pan: 2, pad: 5 });

        let image = decode(b"\x1bP9;0;20q@\x1b\\");
        assert_eq!(image.aspect_ratio, PixelAspectRatio { pan: 4, pad: 2 });

        let image = decode(b"\x1bP0;0;1q@\x1b\\");
        assert_eq!(image.aspect_ratio, PixelAspectRatio { pan: 1, pad: 1 });
    }

    #[test]
    fn test_dcs_without_final_q_is_skipped() {
        let image = decode(b"\x1bP2;1%#1@");
        assert_eq!(image.aspect_ratio, PixelAspectRatio { pan: 2, pad: 1 });
        assert_eq!(image.pixels, vec![1]);
    }

    #[test]
    fn test_raster_attributes_set_aspect_and_size() {
        let image = decode(b"\"3;7;4;9#1@");
        assert_eq!(image.aspect_ratio, PixelAspectRatio { pan: 7, pad: 3 });
        assert_eq!((image.width, image.height), (4, 9));
    }

    #[test]
    fn test_zero_raster_size_does_not_override() {
        let image = decode(b"\"1;1;5;5\"1;1;0;0@");
        assert_eq!((image.width, image.height), (5, 5));
    }

    #[test]
    fn test_nul_ends_the_stream() {
        let image = decode(b"#1@\0@@@");
        assert_eq!(image.width, 1);
    }

    #[test]
    fn test_eight_bit_controls() {
        let seven = decode(b"\x1bP0;0;0q#1!3~\x1b\\~~~");
        let eight = decode(b"\x900;0;0q#1!3~\x9c~~~");
        assert_eq!(seven.pixels, eight.pixels);
        assert_eq!((eight.width, eight.height), (3, 6));
    }

    #[test]
    fn test_corrected_dimensions() {
        let image = decode(b"\"2;1;4;6");
        assert_eq!(image.corrected_dimensions(), (4, 12));
    }

    #[test]
    fn test_palette_rgb_out_of_range() {
        let image = decode(b"#1;2;100;0;0#1@");
        assert_eq!(image.palette_rgb(1), Some(Rgb::new(255, 0, 0)));
        assert_eq!(image.palette_rgb(2), None);
        assert_eq!(image.palette_rgb(usize::MAX / 4 + 1), None);
        assert_eq!(image.palette_rgb(usize::MAX), None);
    }

    #[test]
    fn test_to_rgba_uses_palette() {
        let image = decode(b"#1;2;100;0;0#1@");
        assert_eq!(image.to_rgba(), vec![255, 0, 0, 255]);
    }
}
