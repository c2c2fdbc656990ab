//! Recognition of SIXEL control functions in either C1 representation.
//!
//! `DCS` and `ST` exist as a two-byte 7-bit escape (`ESC P`, `ESC \`) and as a
//! single 8-bit byte (0x90, 0x9C). Both forms collapse into one
//! [`ControlToken`] here so the decoder dispatch never sees the encoding.

const ESC: u8 = 0x1b;
const DCS_8BIT: u8 = 0x90;
const ST_8BIT: u8 = 0x9c;

/// One lexical unit of a SIXEL stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ControlToken {
    /// Device Control String introducer
    DeviceControlString,
    /// String Terminator
    StringTerminator,
    /// DECGRA `"`
    RasterAttributes,
    /// DECGRI `!`
    RepeatIntroducer,
    /// DECGCI `#`
    ColorIntroducer,
    /// DECGCR `$`
    CarriageReturn,
    /// DECGNL `-`
    NextLine,
    /// Sixel data character, carrying its value minus `?`
    Sixel(u8),
    /// NUL, treated as the end of a C-style string
    Nul,
    Other,
}

/// Reads the token at `idx`, returning it with the number of bytes it spans.
#[inline]
pub(crate) fn next_token(data: &[u8], idx: usize) -> (ControlToken, usize) {
    let token = match data[idx] {
        ESC => match data.get(idx + 1) {
            Some(b'P') => return (ControlToken::DeviceControlString, 2),
            Some(b'\\') => return (ControlToken::StringTerminator, 2),
            _ => ControlToken::Other,
        },
        DCS_8BIT => ControlToken::DeviceControlString,
        ST_8BIT => ControlToken::StringTerminator,
        b'"' => ControlToken::RasterAttributes,
        b'!' => ControlToken::RepeatIntroducer,
        b'#' => ControlToken::ColorIntroducer,
        b'$' => ControlToken::CarriageReturn,
        b'-' => ControlToken::NextLine,
        ch @ b'?'..=0x7f => ControlToken::Sixel(ch - b'?'),
        0 => ControlToken::Nul,
        _ => ControlToken::Other,
    };
    (token, 1)
}

/// Which C1 representation an encoder writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ControlForm {
    SevenBit,
    EightBit,
}

impl ControlForm {
    pub(crate) fn new(use_8bit_controls: bool) -> Self {
        if use_8bit_controls {
            ControlForm::EightBit
        } else {
            ControlForm::SevenBit
        }
    }

    pub(crate) fn dcs(self) -> &'static [u8] {
        match self {
            ControlForm::SevenBit => b"\x1bP",
            ControlForm::EightBit => &[DCS_8BIT],
        }
    }

    pub(crate) fn st(self) -> &'static [u8] {
        match self {
            ControlForm::SevenBit => b"\x1b\\",
            ControlForm::EightBit => &[ST_8BIT],
        }
    }
}
