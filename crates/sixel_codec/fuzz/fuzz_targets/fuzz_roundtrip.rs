#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use sixel_codec::{sixel_decode, sixel_encode_indexed_to_vec, EncodeOptions, IndexedImage};

#[derive(Arbitrary, Debug)]
struct FuzzInput {
    width: u8,
    height: u8,
    colors: u8,
    pixels: Vec<u8>,
}

fuzz_target!(|input: FuzzInput| {
    let width = (input.width as usize).clamp(1, 64);
    let height = (input.height as usize).clamp(1, 64);
    let colors = (input.colors as usize).max(1);

    let expected_size = width * height;
    if input.pixels.len() < expected_size {
        return;
    }
    let pixels: Vec<u8> = input.pixels[..expected_size]
        .iter()
        .map(|&p| (p as usize % colors) as u8)
        .collect();
    let palette: Vec<u8> = (0..colors * 3).map(|i| (i * 37) as u8).collect();

    let image = IndexedImage::new(&pixels, width, height, &palette).expect("valid image");
    let sixel = sixel_encode_indexed_to_vec(&image, &EncodeOptions::default()).expect("encodes");
    let decoded = sixel_decode(&sixel).expect("decodes");

    // The indexed path is lossless.
    assert_eq!((decoded.width, decoded.height), (width, height));
    assert_eq!(decoded.pixels, pixels);
});
