//! RGBA front end: quantizes true-color pixels with quantette, then hands the
//! indexed result to the SIXEL encoder.

use quantette::{
    deps::palette::Srgb, dither::FloydSteinberg, ImageRef, PaletteSize, Pipeline, QuantizeMethod,
};

use crate::{
    encoder::{sixel_encode_indexed, EncodeOptions, IndexedImage},
    Result, SixelError, SIXEL_PALETTE_MAX,
};

/// Pixels with alpha below this are written as the transparent key color.
const ALPHA_THRESHOLD: u8 = 128;

fn palette_size(colors: usize) -> PaletteSize {
    u8::try_from(colors)
        .ok()
        .and_then(|n| PaletteSize::try_from(n).ok())
        .unwrap_or(PaletteSize::MAX)
}

/// Encode RGBA image data into SIXEL using quantette.
///
/// The image is reduced to at most `opts.max_colors` colors (clamped to
/// 2-256) with Wu's method and Floyd-Steinberg dithering. Pixels with
/// alpha < 128 map to an extra key color that is never drawn, so one palette
/// slot is reserved for it when the image has transparency.
///
/// A transparent image whose opaque pixels quantize to a single color is the
/// one exception to the `max_colors` cap: an unused entry is added before the
/// key color, giving three entries even when `max_colors` is 2. Two entries
/// with a key color would be written without palette definitions, leaving the
/// opaque color undefined.
///
/// # Example
/// ```rust
/// use sixel_codec::{sixel_encode, EncodeOptions};
///
/// let rgba = vec![255u8, 0, 0, 255, 0, 255, 0, 255]; // 2 pixels: red, green
/// let sixel = sixel_encode(&rgba, 2, 1, &EncodeOptions::default())?;
/// assert!(sixel.ends_with(b"\x1b\\"));
/// # Ok::<(), sixel_codec::SixelError>(())
/// ```
#[must_use = "this returns the encoded SIXEL bytes"]
pub fn sixel_encode(rgba: &[u8], width: usize, height: usize, opts: &EncodeOptions) -> Result<Vec<u8>> {
    if width == 0 || height == 0 {
        return Err(SixelError::InvalidDimensions { width, height });
    }
    let expected = width
        .checked_mul(height)
        .and_then(|n| n.checked_mul(4))
        .ok_or(SixelError::InvalidDimensions { width, height })?;
    if rgba.len() != expected {
        return Err(SixelError::BufferSizeMismatch {
            expected,
            actual: rgba.len(),
        });
    }
    let image_width = u32::try_from(width).map_err(|_| SixelError::InvalidDimensions { width, height })?;
    let image_height = u32::try_from(height).map_err(|_| SixelError::InvalidDimensions { width, height })?;

    let has_transparency = rgba.chunks_exact(4).any(|c| c[3] < ALPHA_THRESHOLD);

    let rgb_pixels: Vec<Srgb<u8>> = rgba
        .chunks_exact(4)
        .map(|c| Srgb::new(c[0], c[1], c[2]))
        .collect();

    let mut max_colors = usize::from(opts.max_colors).clamp(2, SIXEL_PALETTE_MAX);
    if has_transparency {
        max_colors -= 1;
    }

    let image = ImageRef::new(image_width, image_height, &rgb_pixels)
        .map_err(|e| SixelError::Quantization(e.to_string()))?;

    let indexed_image = Pipeline::new()
        .palette_size(palette_size(max_colors))
        .quantize_method(QuantizeMethod::Wu)
        .ditherer(FloydSteinberg::new())
        .input_image(image)
        .output_srgb8_indexed_image();

    let mut palette: Vec<u8> = indexed_image
        .palette()
        .iter()
        .flat_map(|c| [c.red, c.green, c.blue])
        .collect();
    let mut indices: Vec<u8> = indexed_image.indices().to_vec();
    if palette.is_empty() {
        return Err(SixelError::Quantization("quantizer produced an empty palette".into()));
    }

    let mut key_color = None;
    if has_transparency {
        // One opaque color plus the key would take the two-color shortcut,
        // which leaves the opaque color undefined; add an unused entry.
        if palette.len() == 3 {
            palette.extend_from_slice(&[0, 0, 0]);
        }
        let key = u8::try_from(palette.len() / 3)
            .map_err(|_| SixelError::Quantization("no palette slot left for transparency".into()))?;
        palette.extend_from_slice(&[0, 0, 0]);
        for (index, pixel) in indices.iter_mut().zip(rgba.chunks_exact(4)) {
            if pixel[3] < ALPHA_THRESHOLD {
                *index = key;
            }
        }
        key_color = Some(key);
    }

    log::debug!(
        "quantized {}x{} image to {} colors{}",
        width,
        height,
        palette.len() / 3,
        if key_color.is_some() { " with transparency" } else { "" }
    );

    let mut image = IndexedImage::new(&indices, width, height, &palette)?;
    if let Some(key) = key_color {
        image = image.with_key_color(key)?;
    }

    let mut out = Vec::new();
    sixel_encode_indexed(&image, opts, &mut out)?;
    Ok(out)
}
