use std::io::Write;

use crate::Result;

/// Bytes handed to the sink per write.
pub(crate) const SIXEL_OUTPUT_PACKET_SIZE: usize = 16384;

/// Runs longer than this are written as DECGRI `!<count><char>`.
const REPEAT_THRESHOLD: usize = 3;

/// Buffers encoder output and forwards it to `W` in fixed-size packets.
///
/// Sixel characters go through [`put_pixel`](Self::put_pixel), which keeps
/// identical consecutive characters pending so they can be written as one
/// repeat command; every other write flushes that pending run first.
pub(crate) struct SixelOutput<'w, W: Write> {
    sink: &'w mut W,
    buffer: Vec<u8>,
    save_pixel: u8,
    save_count: usize,
    written: usize,
}

impl<'w, W: Write> SixelOutput<'w, W> {
    pub(crate) fn new(sink: &'w mut W) -> Self {
        Self {
            sink,
            buffer: Vec::with_capacity(SIXEL_OUTPUT_PACKET_SIZE * 2),
            save_pixel: 0,
            save_count: 0,
            written: 0,
        }
    }

    fn advance(&mut self) -> Result<()> {
        while self.buffer.len() >= SIXEL_OUTPUT_PACKET_SIZE {
            self.sink.write_all(&self.buffer[..SIXEL_OUTPUT_PACKET_SIZE])?;
            self.buffer.drain(..SIXEL_OUTPUT_PACKET_SIZE);
            self.written += SIXEL_OUTPUT_PACKET_SIZE;
            log::trace!("flushed sixel packet, {} bytes so far", self.written);
        }
        Ok(())
    }

    fn push(&mut self, bytes: &[u8]) -> Result<()> {
        self.buffer.extend_from_slice(bytes);
        self.advance()
    }

    /// Writes raw bytes after flushing any pending sixel run.
    pub(crate) fn puts(&mut self, bytes: &[u8]) -> Result<()> {
        self.flush_run()?;
        self.push(bytes)
    }

    pub(crate) fn putc(&mut self, byte: u8) -> Result<()> {
        self.puts(&[byte])
    }

    /// Writes a decimal number.
    pub(crate) fn puti(&mut self, mut n: usize) -> Result<()> {
        let mut buf = [0u8; 20];
        let mut i = buf.len();
        loop {
            i -= 1;
            buf[i] = b'0' + (n % 10) as u8;
            n /= 10;
            if n == 0 {
                break;
            }
        }
        self.puts(&buf[i..])
    }

    /// Queues one sixel column; `bits` holds the six-pixel mask (0-63).
    pub(crate) fn put_pixel(&mut self, bits: u8) -> Result<()> {
        let pixel = b'?' + (bits & 0x3f);
        if self.save_count > 0 && pixel == self.save_pixel {
            self.save_count += 1;
            return Ok(());
        }
        self.flush_run()?;
        self.save_pixel = pixel;
        self.save_count = 1;
        Ok(())
    }

    /// Writes the pending run, as DECGRI when it is long enough.
    pub(crate) fn flush_run(&mut self) -> Result<()> {
        let count = std::mem::take(&mut self.save_count);
        if count == 0 {
            return Ok(());
        }
        let pixel = self.save_pixel;
        if count > REPEAT_THRESHOLD {
            self.push(b"!")?;
            self.puti(count)?;
            self.push(&[pixel])
        } else {
            for _ in 0..count {
                self.push(&[pixel])?;
            }
            Ok(())
        }
    }

    /// Flushes everything still buffered, including a final partial packet.
    pub(crate) fn finish(mut self) -> Result<usize> {
        self.flush_run()?;
        if !self.buffer.is_empty() {
            self.sink.write_all(&self.buffer)?;
            self.written += self.buffer.len();
            self.buffer.clear();
        }
        self.sink.flush()?;
        Ok(self.written)
    }
}
