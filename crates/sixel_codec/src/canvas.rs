use crate::{Result, SixelError, SIXEL_HEIGHT_LIMIT, SIXEL_WIDTH_LIMIT};

/// Upper bound on canvas area (one byte per pixel).
const MAX_PIXELS: usize = 256 * 1024 * 1024;

/// A growable one-byte-per-pixel indexed raster, row-major.
///
/// Growth reallocates and copies the live rows; new area is filled with the
/// background index. Callers must not keep slices across a growing call.
pub(crate) struct Canvas {
    data: Vec<u8>,
    width: usize,
    height: usize,
    background: u8,
}

impl Canvas {
    pub(crate) fn new(width: usize, height: usize, background: u8) -> Result<Self> {
        let data = alloc_plane(width, height, background)?;
        Ok(Self {
            data,
            width,
            height,
            background,
        })
    }

    /// Makes at least `min_width x min_height` addressable, doubling both
    /// dimensions until the request fits.
    ///
    /// If the doubled size would exceed the canvas limits only the axes that
    /// are too small keep doubling, capped at their limit and at the pixel
    /// budget. An error is returned only when the exact fit is over the limits.
    pub(crate) fn ensure_capacity(&mut self, min_width: usize, min_height: usize) -> Result<()> {
        if min_width <= self.width && min_height <= self.height {
            return Ok(());
        }

        let mut new_width = self.width.max(1).saturating_mul(2);
        let mut new_height = self.height.max(1).saturating_mul(2);
        while new_width < min_width || new_height < min_height {
            new_width = new_width.saturating_mul(2);
            new_height = new_height.saturating_mul(2);
        }

        if check_limits(new_width, new_height).is_err() {
            let fit_width = self.width.max(min_width);
            let fit_height = self.height.max(min_height);
            new_width = grow_axis(self.width, min_width, SIXEL_WIDTH_LIMIT);
            new_height = grow_axis(self.height, min_height, SIXEL_HEIGHT_LIMIT);
            new_width = new_width.min(MAX_PIXELS / new_height.max(1)).max(fit_width);
            new_height = new_height.min(MAX_PIXELS / new_width.max(1)).max(fit_height);
        }
        self.resize(new_width, new_height)
    }

    /// Grows to exactly cover `width x height`; never shrinks either axis.
    pub(crate) fn grow_to(&mut self, width: usize, height: usize) -> Result<()> {
        if width <= self.width && height <= self.height {
            return Ok(());
        }
        self.resize(self.width.max(width), self.height.max(height))
    }

    fn resize(&mut self, new_width: usize, new_height: usize) -> Result<()> {
        log::trace!(
            "canvas grows {}x{} -> {}x{}",
            self.width,
            self.height,
            new_width,
            new_height
        );
        let mut new_data = alloc_plane(new_width, new_height, self.background)?;
        if self.width > 0 {
            for (src, dst) in self
                .data
                .chunks_exact(self.width)
                .zip(new_data.chunks_exact_mut(new_width))
            {
                dst[..self.width].copy_from_slice(src);
            }
        }

        self.data = new_data;
        self.width = new_width;
        self.height = new_height;
        Ok(())
    }

    #[inline]
    pub(crate) fn set(&mut self, x: usize, y: usize, index: u8) {
        if x < self.width && y < self.height {
            self.data[y * self.width + x] = index;
        }
    }

    /// Fills `len` pixels of row `y` starting at `x`, clipped to the canvas.
    #[inline]
    pub(crate) fn fill_span(&mut self, x: usize, y: usize, len: usize, index: u8) {
        if len == 0 || y >= self.height || x >= self.width {
            return;
        }
        let len = len.min(self.width - x);
        let start = y * self.width + x;
        self.data[start..start + len].fill(index);
    }

    /// Cuts the canvas down to its top-left `width x height` rectangle and
    /// hands the pixel buffer back to the caller.
    pub(crate) fn into_trimmed(self, width: usize, height: usize) -> Result<(Vec<u8>, usize, usize)> {
        let width = width.min(self.width);
        let height = height.min(self.height);
        if width == self.width && height == self.height {
            return Ok((self.data, width, height));
        }

        let mut data = alloc_plane(width, height, self.background)?;
        if width > 0 {
            for (src, dst) in self
                .data
                .chunks_exact(self.width)
                .zip(data.chunks_exact_mut(width))
            {
                dst.copy_from_slice(&src[..width]);
            }
        }
        Ok((data, width, height))
    }
}

/// Doubles `current`, or jumps straight to `needed` when that is larger,
/// without passing `limit` unless `needed` itself does.
fn grow_axis(current: usize, needed: usize, limit: usize) -> usize {
    if needed <= current {
        return current;
    }
    current.max(1).saturating_mul(2).max(needed).min(limit.max(needed))
}

fn check_limits(width: usize, height: usize) -> Result<usize> {
    let too_large = SixelError::AllocationFailed { width, height };
    if width > SIXEL_WIDTH_LIMIT || height > SIXEL_HEIGHT_LIMIT {
        return Err(too_large);
    }
    match width.checked_mul(height) {
        Some(len) if len <= MAX_PIXELS => Ok(len),
        _ => Err(too_large),
    }
}

fn alloc_plane(width: usize, height: usize, fill: u8) -> Result<Vec<u8>> {
    let len = check_limits(width, height)?;
    let mut data = Vec::new();
    data.try_reserve_exact(len)
        .map_err(|_| SixelError::AllocationFailed { width, height })?;
    data.resize(len, fill);
    Ok(data)
}

/// Allocates a zeroed scratch buffer of `width * rows` bytes.
pub(crate) fn alloc_scratch(width: usize, rows: usize) -> Result<Vec<u8>> {
    alloc_plane(width, rows, 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(canvas: &Canvas) -> Vec<Vec<u8>> {
        canvas
            .data
            .chunks_exact(canvas.width)
            .map(|row| row.to_vec())
            .collect()
    }

    #[test]
    fn test_ensure_capacity_doubles_and_keeps_content() {
        let mut canvas = Canvas::new(2, 2, 0).unwrap();
        canvas.set(0, 0, 1);
        canvas.set(1, 1, 2);
        canvas.ensure_capacity(5, 3).unwrap();
        assert_eq!((canvas.width, canvas.height), (8, 8));
        let rows = rows(&canvas);
        assert_eq!(&rows[0][..3], &[1, 0, 0]);
        assert_eq!(&rows[1][..3], &[0, 2, 0]);
        assert!(rows[2..].iter().all(|row| row.iter().all(|&v| v == 0)));
    }

    #[test]
    fn test_ensure_capacity_noop_when_fitting() {
        let mut canvas = Canvas::new(4, 4, 0).unwrap();
        canvas.ensure_capacity(4, 4).unwrap();
        assert_eq!((canvas.width, canvas.height), (4, 4));
    }

    #[test]
    fn test_grow_to_is_exact_and_uses_background() {
        let mut canvas = Canvas::new(2, 1, 7).unwrap();
        canvas.set(1, 0, 3);
        canvas.grow_to(3, 2).unwrap();
        assert_eq!((canvas.width, canvas.height), (3, 2));
        assert_eq!(rows(&canvas), vec![vec![7, 3, 7], vec![7, 7, 7]]);

        canvas.grow_to(1, 1).unwrap();
        assert_eq!((canvas.width, canvas.height), (3, 2));
    }

    #[test]
    fn test_fill_span_clips() {
        let mut canvas = Canvas::new(4, 2, 0).unwrap();
        canvas.fill_span(2, 1, 10, 9);
        canvas.fill_span(0, 5, 10, 9);
        assert_eq!(rows(&canvas), vec![vec![0, 0, 0, 0], vec![0, 0, 9, 9]]);
    }

    #[test]
    fn test_trim_keeps_top_left() {
        let mut canvas = Canvas::new(4, 4, 0).unwrap();
        canvas.fill_span(0, 0, 4, 1);
        canvas.fill_span(0, 1, 4, 2);
        let (data, width, height) = canvas.into_trimmed(3, 2).unwrap();
        assert_eq!((width, height), (3, 2));
        assert_eq!(data, vec![1, 1, 1, 2, 2, 2]);
    }

    #[test]
    fn test_limits_are_reported_as_allocation_failure() {
        assert!(matches!(
            Canvas::new(SIXEL_WIDTH_LIMIT + 1, 1, 0),
            Err(SixelError::AllocationFailed { .. })
        ));
        let mut canvas = Canvas::new(16, 16, 0).unwrap();
        assert!(canvas.ensure_capacity(100_000, 100_000).is_err());
        assert_eq!((canvas.width, canvas.height), (16, 16));
    }

    #[test]
    fn test_oversized_doubling_grows_only_the_short_axis() {
        let mut canvas = Canvas::new(64, 64, 0).unwrap();
        canvas.ensure_capacity(200_000, 6).unwrap();
        assert_eq!((canvas.width, canvas.height), (200_000, 64));
    }

    #[test]
    fn test_grow_axis() {
        assert_eq!(grow_axis(64, 10, 1000), 64);
        assert_eq!(grow_axis(64, 65, 1000), 128);
        assert_eq!(grow_axis(64, 500, 1000), 500);
        assert_eq!(grow_axis(600, 601, 1000), 1000);
        assert_eq!(grow_axis(600, 2000, 1000), 2000);
    }

    #[test]
    fn test_growth_past_the_budget_stays_geometric() {
        let mut canvas = Canvas::new(64, 6, 0).unwrap();
        let mut reallocations = 0;
        for x in 40_000..41_000 {
            let before = canvas.width;
            canvas.ensure_capacity(x + 1, 6).unwrap();
            if canvas.width != before {
                reallocations += 1;
            }
        }
        assert!(reallocations <= 3, "{reallocations} reallocations");
        assert!(canvas.width >= 41_000);
    }
}
