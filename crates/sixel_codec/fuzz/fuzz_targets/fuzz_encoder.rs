#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use sixel_codec::{sixel_encode, sixel_encode_indexed_to_vec, EncodeOptions, IndexedImage};

#[derive(Arbitrary, Debug)]
struct FuzzInput {
    width: u8,
    height: u8,
    pixels: Vec<u8>,
    palette: Vec<u8>,
    key_color: Option<u8>,
    max_colors: u8,
    use_8bit_controls: bool,
    rgba: bool,
}

fuzz_target!(|input: FuzzInput| {
    let width = (input.width as usize).clamp(1, 256);
    let height = (input.height as usize).clamp(1, 256);
    let opts = EncodeOptions {
        max_colors: (input.max_colors as u16).clamp(2, 256),
        use_8bit_controls: input.use_8bit_controls,
    };

    if input.rgba {
        let expected_size = width * height * 4;
        if input.pixels.len() < expected_size {
            return;
        }
        let _ = sixel_encode(&input.pixels[..expected_size], width, height, &opts);
        return;
    }

    let expected_size = width * height;
    if input.pixels.len() < expected_size {
        return;
    }
    let Ok(mut image) = IndexedImage::new(&input.pixels[..expected_size], width, height, &input.palette) else {
        return;
    };
    if let Some(key) = input.key_color {
        match image.with_key_color(key) {
            Ok(keyed) => image = keyed,
            Err(_) => return,
        }
    }

    let sixel = sixel_encode_indexed_to_vec(&image, &opts).expect("in-memory encode cannot fail");
    assert!(!sixel.is_empty());
});
