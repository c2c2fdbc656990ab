//! Numeric parameter scanning for SIXEL control functions.
//!
//! Every SIXEL control introducer (`DCS`, `"`, `!`, `#`) is followed by an
//! optional run of decimal numbers separated by `;`. The scanner never fails:
//! omitted values become `0`, parameters past [`MAX_PARAMS`] are consumed and
//! dropped, and the first byte that cannot belong to the run ends it.

/// Number of parameters retained per control function.
pub const MAX_PARAMS: usize = 10;

/// Parameters collected after a control introducer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Params {
    values: [u32; MAX_PARAMS],
    len: usize,
}

impl Params {
    /// Number of recognized parameters (at most [`MAX_PARAMS`]).
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns parameter `index`, or `None` if it was not present.
    #[inline]
    pub fn get(&self, index: usize) -> Option<u32> {
        self.as_slice().get(index).copied()
    }

    #[inline]
    pub fn as_slice(&self) -> &[u32] {
        &self.values[..self.len]
    }

    fn push(&mut self, value: u32) {
        if self.len < MAX_PARAMS {
            self.values[self.len] = value;
            self.len += 1;
        }
    }
}

/// Scans a parameter run starting at `start`.
///
/// Returns the parameters and the index of the first byte after the run.
/// Spaces and tabs are skipped around numbers and separators.
///
/// ```rust
/// use sixel_codec::params::scan_params;
///
/// let (params, next) = scan_params(b"1;;3 ; 4q", 0);
/// assert_eq!(params.as_slice(), &[1, 0, 3, 4]);
/// assert_eq!(next, 8);
/// ```
pub fn scan_params(data: &[u8], start: usize) -> (Params, usize) {
    let mut params = Params::default();
    let mut idx = start;

    while idx < data.len() {
        idx = skip_blanks(data, idx);
        match data.get(idx) {
            Some(b'0'..=b'9') => {
                let mut value: u32 = 0;
                while let Some(&(digit @ b'0'..=b'9')) = data.get(idx) {
                    value = value
                        .saturating_mul(10)
                        .saturating_add((digit - b'0') as u32);
                    idx += 1;
                }
                params.push(value);
                idx = skip_blanks(data, idx);
                if data.get(idx) == Some(&b';') {
                    idx += 1;
                }
            }
            Some(b';') => {
                params.push(0);
                idx += 1;
            }
            _ => break,
        }
    }

    (params, idx)
}

#[inline]
fn skip_blanks(data: &[u8], mut idx: usize) -> usize {
    while matches!(data.get(idx), Some(b' ' | b'\t')) {
        idx += 1;
    }
    idx
}
