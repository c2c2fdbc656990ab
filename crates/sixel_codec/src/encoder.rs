//! Size-optimized SIXEL encoder for indexed images.
//!
//! Each six-row band is turned into per-color column masks. Runs of set
//! columns (allowing short gaps) become nodes, which are emitted left to
//! right so the cursor rarely has to return to the band start.

use std::io::Write;

use crate::{
    canvas::alloc_scratch, color::rgb_to_percent, control::ControlForm, output::SixelOutput,
    Result, SixelError, SIXEL_BAND_HEIGHT, SIXEL_HEIGHT_LIMIT, SIXEL_PALETTE_MAX,
    SIXEL_WIDTH_LIMIT,
};

/// A run absorbs a blank gap only when the gap is narrower than this.
const GAP_MERGE_LIMIT: usize = 10;

/// Options for the SIXEL encoders.
#[derive(Clone, Debug)]
pub struct EncodeOptions {
    /// Maximum number of colors in the palette (2-256).
    /// Only used when quantizing RGBA input; indexed images bring their own palette.
    pub max_colors: u16,

    /// Write DCS and ST as the single 8-bit bytes 0x90 and 0x9C instead of
    /// `ESC P` and `ESC \`.
    pub use_8bit_controls: bool,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            max_colors: 256,
            use_8bit_controls: false,
        }
    }
}

/// A borrowed indexed image ready for encoding.
///
/// `pixels` holds one palette index per pixel, row-major. `palette` holds
/// packed RGB triples. Indices at or beyond the palette length are not drawn.
#[derive(Clone, Copy, Debug)]
pub struct IndexedImage<'a> {
    pixels: &'a [u8],
    width: usize,
    height: usize,
    palette: &'a [u8],
    key_color: Option<u8>,
}

impl<'a> IndexedImage<'a> {
    /// Validates the buffers against each other.
    ///
    /// # Errors
    /// * [`SixelError::InvalidDimensions`] if either side is zero or over the limit
    /// * [`SixelError::BufferSizeMismatch`] if `pixels.len() != width * height`
    /// * [`SixelError::InvalidPalette`] if the palette is empty, not made of
    ///   RGB triples, or has more than 256 entries
    pub fn new(pixels: &'a [u8], width: usize, height: usize, palette: &'a [u8]) -> Result<Self> {
        if width == 0 || height == 0 || width > SIXEL_WIDTH_LIMIT || height > SIXEL_HEIGHT_LIMIT {
            return Err(SixelError::InvalidDimensions { width, height });
        }
        let expected = width * height;
        if pixels.len() != expected {
            return Err(SixelError::BufferSizeMismatch {
                expected,
                actual: pixels.len(),
            });
        }
        if palette.is_empty() || palette.len() % 3 != 0 {
            return Err(SixelError::InvalidPalette(format!(
                "expected RGB triples, got {} bytes",
                palette.len()
            )));
        }
        if palette.len() / 3 > SIXEL_PALETTE_MAX {
            return Err(SixelError::InvalidPalette(format!(
                "{} colors exceed the maximum of {SIXEL_PALETTE_MAX}",
                palette.len() / 3
            )));
        }

        Ok(Self {
            pixels,
            width,
            height,
            palette,
            key_color: None,
        })
    }

    /// Marks `index` as transparent: pixels with this index are never drawn.
    pub fn with_key_color(mut self, index: u8) -> Result<Self> {
        if usize::from(index) >= self.color_count() {
            return Err(SixelError::InvalidPalette(format!(
                "key color {index} is outside a palette of {} colors",
                self.color_count()
            )));
        }
        self.key_color = Some(index);
        Ok(self)
    }

    pub fn pixels(&self) -> &'a [u8] {
        self.pixels
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn palette(&self) -> &'a [u8] {
        self.palette
    }

    pub fn color_count(&self) -> usize {
        self.palette.len() / 3
    }

    pub fn key_color(&self) -> Option<u8> {
        self.key_color
    }

    /// Two colors where one is transparent: the palette and color
    /// introducers are left out entirely.
    fn is_binary_keyed(&self) -> bool {
        self.color_count() == 2 && self.key_color.is_some()
    }
}

/// One run `[sx, mx)` of a single color within the current band.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Node {
    color: usize,
    sx: usize,
    mx: usize,
}

#[derive(Clone, Copy, Debug)]
struct Slot {
    node: Node,
    next: Option<usize>,
}

/// Nodes of one band, kept ordered by ascending start and then descending
/// end. Slots are recycled through a free stack across bands.
#[derive(Default)]
struct NodeList {
    slots: Vec<Slot>,
    free: Vec<usize>,
    head: Option<usize>,
}

impl NodeList {
    fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    fn alloc(&mut self, node: Node) -> usize {
        let slot = Slot { node, next: None };
        match self.free.pop() {
            Some(handle) => {
                self.slots[handle] = slot;
                handle
            }
            None => {
                self.slots.push(slot);
                self.slots.len() - 1
            }
        }
    }

    fn insert_sorted(&mut self, node: Node) {
        let handle = self.alloc(node);

        let mut prev = None;
        let mut cursor = self.head;
        while let Some(current) = cursor {
            let other = self.slots[current].node;
            if node.sx < other.sx || (node.sx == other.sx && node.mx > other.mx) {
                break;
            }
            prev = cursor;
            cursor = self.slots[current].next;
        }

        self.slots[handle].next = cursor;
        match prev {
            Some(prev) => self.slots[prev].next = Some(handle),
            None => self.head = Some(handle),
        }
    }

    fn pop_front(&mut self) -> Option<Node> {
        let handle = self.head?;
        Some(self.remove(None, handle))
    }

    /// Removes and returns the first node starting at or after `x`.
    fn take_first_from(&mut self, x: usize) -> Option<Node> {
        let mut prev = None;
        let mut cursor = self.head;
        while let Some(current) = cursor {
            if self.slots[current].node.sx >= x {
                return Some(self.remove(prev, current));
            }
            prev = cursor;
            cursor = self.slots[current].next;
        }
        None
    }

    fn remove(&mut self, prev: Option<usize>, handle: usize) -> Node {
        let Slot { node, next } = self.slots[handle];
        match prev {
            Some(prev) => self.slots[prev].next = next,
            None => self.head = next,
        }
        self.free.push(handle);
        node
    }
}

/// Finds the next run in `row` at or after `from`.
///
/// A run starts at a nonzero column and extends over blank gaps narrower
/// than [`GAP_MERGE_LIMIT`] as long as another nonzero column follows.
fn next_run(row: &[u8], from: usize) -> Option<(usize, usize)> {
    let sx = from + row.get(from..)?.iter().position(|&bits| bits != 0)?;
    let mut mx = sx + 1;
    while mx < row.len() {
        if row[mx] != 0 {
            mx += 1;
            continue;
        }
        match row[mx..].iter().position(|&bits| bits != 0) {
            Some(gap) if gap < GAP_MERGE_LIMIT => mx += gap,
            _ => break,
        }
    }
    Some((sx, mx))
}

struct SixelEncoder<'a, 'w, W: Write> {
    image: &'a IndexedImage<'a>,
    output: SixelOutput<'w, W>,
    form: ControlForm,
    nodes: NodeList,
    /// `color_count` rows of `width` column masks for the current band.
    map: Vec<u8>,
    active_color: Option<usize>,
}

impl<'a, 'w, W: Write> SixelEncoder<'a, 'w, W> {
    fn encode_header(&mut self) -> Result<()> {
        self.output.puts(self.form.dcs())?;
        if self.image.key_color.is_some() {
            self.output.puts(b"0;1;0q")?;
        } else {
            self.output.puts(b"0;0;0q")?;
        }

        self.output.puts(b"\"1;1;")?;
        self.output.puti(self.image.width)?;
        self.output.putc(b';')?;
        self.output.puti(self.image.height)
    }

    fn encode_palette(&mut self) -> Result<()> {
        if self.image.is_binary_keyed() {
            return Ok(());
        }
        for (n, rgb) in self.image.palette.chunks_exact(3).enumerate() {
            // DECGCI: # Pc ; 2 ; Pr ; Pg ; Pb
            self.output.putc(b'#')?;
            self.output.puti(n)?;
            self.output.puts(b";2;")?;
            self.output.puti(rgb_to_percent(rgb[0]).into())?;
            self.output.putc(b';')?;
            self.output.puti(rgb_to_percent(rgb[1]).into())?;
            self.output.putc(b';')?;
            self.output.puti(rgb_to_percent(rgb[2]).into())?;
        }
        Ok(())
    }

    fn encode_body(&mut self) -> Result<()> {
        let width = self.image.width;
        let height = self.image.height;
        let color_count = self.image.color_count();

        for band_top in (0..height).step_by(SIXEL_BAND_HEIGHT) {
            if band_top > 0 {
                // DECGNL
                self.output.putc(b'-')?;
            }

            self.map.fill(0);
            let rows = SIXEL_BAND_HEIGHT.min(height - band_top);
            for row in 0..rows {
                let start = (band_top + row) * width;
                let line = &self.image.pixels[start..start + width];
                for (x, &pixel) in line.iter().enumerate() {
                    let color = usize::from(pixel);
                    if color < color_count && Some(pixel) != self.image.key_color {
                        self.map[color * width + x] |= 1 << row;
                    }
                }
            }

            for color in 0..color_count {
                let row = &self.map[color * width..(color + 1) * width];
                let mut from = 0;
                while let Some((sx, mx)) = next_run(row, from) {
                    self.nodes.insert_sorted(Node { color, sx, mx });
                    from = mx;
                }
            }

            self.emit_band()?;
        }
        Ok(())
    }

    fn emit_band(&mut self) -> Result<()> {
        let mut x = 0;
        while let Some(node) = self.nodes.pop_front() {
            if x > node.sx {
                // DECGCR
                self.output.putc(b'$')?;
                x = 0;
            }
            self.put_node(&mut x, node)?;

            while let Some(node) = self.nodes.take_first_from(x) {
                self.put_node(&mut x, node)?;
            }
        }
        debug_assert!(self.nodes.is_empty());
        Ok(())
    }

    fn put_node(&mut self, x: &mut usize, node: Node) -> Result<()> {
        if !self.image.is_binary_keyed() && self.active_color != Some(node.color) {
            self.output.putc(b'#')?;
            self.output.puti(node.color)?;
            self.active_color = Some(node.color);
        }

        let width = self.image.width;
        let row = &self.map[node.color * width..(node.color + 1) * width];
        while *x < node.sx {
            self.output.put_pixel(0)?;
            *x += 1;
        }
        while *x < node.mx {
            self.output.put_pixel(row[*x])?;
            *x += 1;
        }
        Ok(())
    }

    fn encode_footer(&mut self) -> Result<()> {
        self.output.puts(self.form.st())
    }
}

/// Encodes an indexed image as SIXEL, delivering the stream to `sink` in
/// packets of 16 KiB.
///
/// The stream starts with `DCS 0;0;0 q` (`0;1;0` when a key color is set),
/// declares `"1;1;width;height`, defines every palette entry in RGB percent
/// and ends with `ST`. With exactly two colors and a key color the palette and
/// color selection are omitted.
///
/// # Errors
/// [`SixelError::AllocationFailed`] if the band masks cannot be allocated and
/// [`SixelError::Sink`] if the sink rejects a write. Output may already have
/// been partially written when the sink fails.
pub fn sixel_encode_indexed<W: Write>(
    image: &IndexedImage<'_>,
    opts: &EncodeOptions,
    sink: &mut W,
) -> Result<()> {
    let map = alloc_scratch(image.width, image.color_count())?;
    let mut encoder = SixelEncoder {
        image,
        output: SixelOutput::new(sink),
        form: ControlForm::new(opts.use_8bit_controls),
        nodes: NodeList::default(),
        map,
        active_color: None,
    };

    encoder.encode_header()?;
    encoder.encode_palette()?;
    encoder.encode_body()?;
    encoder.encode_footer()?;
    let written = encoder.output.finish()?;

    log::debug!(
        "encoded {}x{} image with {} colors into {} sixel bytes",
        image.width,
        image.height,
        image.color_count(),
        written
    );
    Ok(())
}

/// Encodes an indexed image as SIXEL into a byte vector.
#[must_use = "this returns the encoded SIXEL bytes"]
pub fn sixel_encode_indexed_to_vec(image: &IndexedImage<'_>, opts: &EncodeOptions) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    sixel_encode_indexed(image, opts, &mut out)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    fn encode(image: &IndexedImage<'_>) -> Vec<u8> {
        sixel_encode_indexed_to_vec(image, &EncodeOptions::default()).unwrap()
    }

    fn runs(row: &[u8]) -> Vec<(usize, usize)> {
        let mut out = Vec::new();
        let mut from = 0;
        while let Some((sx, mx)) = next_run(row, from) {
            out.push((sx, mx));
            from = mx;
        }
        out
    }

    #[test]
    fn test_encode_single_pixel() {
        let image = IndexedImage::new(&[0], 1, 1, &[255, 0, 0]).unwrap();
        assert_eq!(
            encode(&image),
            b"\x1bP0;0;0q\"1;1;1;1#0;2;100;0;0#0@\x1b\\".to_vec()
        );
    }

    #[test]
    fn test_palette_rounds_half_up() {
        let image = IndexedImage::new(&[0], 1, 1, &[255, 128, 1]).unwrap();
        let out = encode(&image);
        assert!(out.windows(14).any(|w| w == b"#0;2;100;50;0#"));
    }

    #[test]
    fn test_second_band_keeps_active_color() {
        let image = IndexedImage::new(&[0; 7], 1, 7, &[0, 0, 0]).unwrap();
        assert_eq!(
            encode(&image),
            b"\x1bP0;0;0q\"1;1;1;7#0;2;0;0;0#0~-@\x1b\\".to_vec()
        );
    }

    #[test]
    fn test_gap_merge_and_carriage_return() {
        let mut pixels = [0u8; 20];
        pixels[0] = 1;
        pixels[10] = 1;
        let image = IndexedImage::new(&pixels, 20, 1, &[0, 0, 0, 255, 255, 255]).unwrap();
        assert_eq!(
            encode(&image),
            b"\x1bP0;0;0q\"1;1;20;1#0;2;0;0;0#1;2;100;100;100#1@!9?@$#0?!9@?!9@\x1b\\".to_vec()
        );
    }

    #[test]
    fn test_binary_keyed_image_skips_palette() {
        let image = IndexedImage::new(&[1, 1, 0], 3, 1, &[0, 0, 0, 255, 255, 255])
            .unwrap()
            .with_key_color(0)
            .unwrap();
        assert_eq!(encode(&image), b"\x1bP0;1;0q\"1;1;3;1@@\x1b\\".to_vec());
    }

    #[test]
    fn test_key_color_with_larger_palette_keeps_introducers() {
        let image = IndexedImage::new(&[2, 0, 1], 3, 1, &[0; 9])
            .unwrap()
            .with_key_color(0)
            .unwrap();
        let out = encode(&image);
        assert!(out.starts_with(b"\x1bP0;1;0q"));
        assert!(out.ends_with(b"#2@#1?@\x1b\\"));
    }

    #[test]
    fn test_out_of_range_indices_are_not_drawn() {
        let image = IndexedImage::new(&[5], 1, 1, &[0, 0, 0]).unwrap();
        assert_eq!(
            encode(&image),
            b"\x1bP0;0;0q\"1;1;1;1#0;2;0;0;0\x1b\\".to_vec()
        );
    }

    #[test]
    fn test_eight_bit_controls() {
        let image = IndexedImage::new(&[0], 1, 1, &[0, 0, 0]).unwrap();
        let opts = EncodeOptions {
            use_8bit_controls: true,
            ..Default::default()
        };
        let out = sixel_encode_indexed_to_vec(&image, &opts).unwrap();
        assert_eq!(out.first(), Some(&0x90));
        assert_eq!(out.last(), Some(&0x9c));
        assert!(!out.contains(&0x1b));
    }

    #[test]
    fn test_next_run_gap_threshold() {
        let mut row = vec![0u8; 12];
        row[0] = 1;
        row[10] = 1;
        assert_eq!(runs(&row), vec![(0, 11)]);

        let mut row = vec![0u8; 12];
        row[0] = 1;
        row[11] = 1;
        assert_eq!(runs(&row), vec![(0, 1), (11, 12)]);
    }

    #[test]
    fn test_next_run_stops_at_trailing_gap() {
        assert_eq!(runs(&[0, 3, 3, 0, 0]), vec![(1, 3)]);
        assert_eq!(runs(&[1, 0, 1]), vec![(0, 3)]);
        assert_eq!(runs(&[0, 0, 0]), vec![]);
    }

    #[test]
    fn test_node_list_ordering() {
        let mut nodes = NodeList::default();
        let node = |color, sx, mx| Node { color, sx, mx };
        nodes.insert_sorted(node(0, 5, 6));
        nodes.insert_sorted(node(1, 0, 2));
        nodes.insert_sorted(node(2, 0, 9));
        nodes.insert_sorted(node(3, 5, 6));

        assert_eq!(nodes.take_first_from(3), Some(node(0, 5, 6)));
        assert_eq!(nodes.pop_front(), Some(node(2, 0, 9)));
        assert_eq!(nodes.take_first_from(10), None);
        assert_eq!(nodes.pop_front(), Some(node(1, 0, 2)));
        assert_eq!(nodes.pop_front(), Some(node(3, 5, 6)));
        assert!(nodes.is_empty());
    }

    #[test]
    fn test_node_slots_are_recycled() {
        let mut nodes = NodeList::default();
        for sx in 0..4 {
            nodes.insert_sorted(Node { color: 0, sx, mx: sx + 1 });
        }
        while nodes.pop_front().is_some() {}
        for sx in 0..4 {
            nodes.insert_sorted(Node { color: 1, sx, mx: sx + 1 });
        }
        assert_eq!(nodes.slots.len(), 4);
    }

    #[test]
    fn test_invalid_inputs() {
        assert!(matches!(
            IndexedImage::new(&[], 0, 1, &[0, 0, 0]),
            Err(SixelError::InvalidDimensions { .. })
        ));
        assert!(matches!(
            IndexedImage::new(&[0; 3], 2, 2, &[0, 0, 0]),
            Err(SixelError::BufferSizeMismatch {
                expected: 4,
                actual: 3
            })
        ));
        assert!(matches!(
            IndexedImage::new(&[0], 1, 1, &[0, 0]),
            Err(SixelError::InvalidPalette(_))
        ));
        assert!(matches!(
            IndexedImage::new(&[0], 1, 1, &[0; 257 * 3]),
            Err(SixelError::InvalidPalette(_))
        ));
        let image = IndexedImage::new(&[0], 1, 1, &[0, 0, 0]).unwrap();
        assert!(matches!(
            image.with_key_color(1),
            Err(SixelError::InvalidPalette(_))
        ));
    }

    #[test]
    fn test_sink_failure_aborts_encode() {
        struct FailingSink;

        impl Write for FailingSink {
            fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
                Err(io::Error::other("disk full"))
            }

            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let image = IndexedImage::new(&[0], 1, 1, &[0, 0, 0]).unwrap();
        let result = sixel_encode_indexed(&image, &EncodeOptions::default(), &mut FailingSink);
        assert!(matches!(result, Err(SixelError::Sink(_))));
    }
}
