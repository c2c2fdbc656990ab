#![no_main]

use libfuzzer_sys::fuzz_target;
use sixel_codec::sixel_decode;

fuzz_target!(|data: &[u8]| {
    // Malformed input is normalized, never rejected.
    if let Ok(image) = sixel_decode(data) {
        assert_eq!(image.pixels.len(), image.width * image.height);
        assert_eq!(image.palette.len(), image.color_count * 4);
    }
});
